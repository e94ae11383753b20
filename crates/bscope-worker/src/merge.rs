//! Span coalescing.

use std::collections::HashMap;

use bscope_models::{Behavior, Detection, Modality};

/// Coalesce overlapping or near-adjacent spans of the same
/// `(behavior, modality)` key.
///
/// Input is sorted by start (stable, so ties keep input order). A span whose
/// start is within `gap` seconds of the last merged span of its key extends
/// that span; different behaviors or modalities never merge. Deterministic
/// for a given input order.
pub fn merge_detections(mut items: Vec<Detection>, gap: f64) -> Vec<Detection> {
    items.sort_by(|a, b| {
        a.start_sec
            .partial_cmp(&b.start_sec)
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    let mut merged: Vec<Detection> = Vec::with_capacity(items.len());
    let mut last_by_key: HashMap<(Behavior, Modality), usize> = HashMap::new();

    for item in items {
        if let Some(&index) = last_by_key.get(&item.key()) {
            let last = &mut merged[index];
            if item.start_sec <= last.end_sec + gap {
                last.end_sec = last.end_sec.max(item.end_sec);
                append_notes(&mut last.notes, &item.notes);
                continue;
            }
        }
        last_by_key.insert(item.key(), merged.len());
        merged.push(item);
    }

    merged
}

/// Append a note unless an existing note already contains it.
fn append_notes(existing: &mut String, incoming: &str) {
    let incoming = incoming.trim();
    if incoming.is_empty() || existing.contains(incoming) {
        return;
    }
    if existing.is_empty() {
        existing.push_str(incoming);
    } else {
        existing.push_str("; ");
        existing.push_str(incoming);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const GAP: f64 = 2.5;

    fn span(behavior: Behavior, start: f64, end: f64) -> Detection {
        Detection {
            behavior,
            modality: behavior.modality(),
            start_sec: start,
            end_sec: end,
            notes: String::new(),
        }
    }

    #[test]
    fn fragmented_episodes_collapse_to_one_span() {
        let merged = merge_detections(
            vec![
                span(Behavior::BodyRocking, 10.0, 11.0),
                span(Behavior::BodyRocking, 11.5, 12.5),
                span(Behavior::BodyRocking, 13.0, 14.0),
                span(Behavior::BodyRocking, 14.5, 15.0),
            ],
            GAP,
        );
        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].start_sec, 10.0);
        assert_eq!(merged[0].end_sec, 15.0);
    }

    #[test]
    fn gap_boundary_is_inclusive() {
        let merged = merge_detections(
            vec![
                span(Behavior::Crying, 0.0, 1.0),
                span(Behavior::Crying, 3.5, 4.0),
            ],
            GAP,
        );
        assert_eq!(merged.len(), 1);

        let apart = merge_detections(
            vec![
                span(Behavior::Crying, 0.0, 1.0),
                span(Behavior::Crying, 3.6, 4.0),
            ],
            GAP,
        );
        assert_eq!(apart.len(), 2);
    }

    #[test]
    fn different_behaviors_never_merge() {
        let merged = merge_detections(
            vec![
                span(Behavior::BodyRocking, 0.0, 2.0),
                span(Behavior::HandFlapping, 2.5, 4.0),
                span(Behavior::Humming, 3.0, 5.0),
            ],
            GAP,
        );
        assert_eq!(merged.len(), 3);
    }

    #[test]
    fn contained_span_does_not_shrink_the_merged_end() {
        let merged = merge_detections(
            vec![
                span(Behavior::Spinning, 0.0, 10.0),
                span(Behavior::Spinning, 2.0, 4.0),
            ],
            GAP,
        );
        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].end_sec, 10.0);
    }

    #[test]
    fn merge_is_idempotent() {
        let input = vec![
            span(Behavior::BodyRocking, 10.0, 11.0),
            span(Behavior::BodyRocking, 12.0, 13.0),
            span(Behavior::Crying, 10.5, 11.5),
            span(Behavior::BodyRocking, 30.0, 31.0),
            span(Behavior::Crying, 13.0, 14.0),
        ];
        let once = merge_detections(input, GAP);
        let twice = merge_detections(once.clone(), GAP);
        assert_eq!(once, twice);
    }

    #[test]
    fn unsorted_input_is_ordered_by_start() {
        let merged = merge_detections(
            vec![
                span(Behavior::Laughing, 20.0, 21.0),
                span(Behavior::BodyRocking, 1.0, 2.0),
            ],
            GAP,
        );
        assert_eq!(merged[0].behavior, Behavior::BodyRocking);
        assert_eq!(merged[1].behavior, Behavior::Laughing);
    }

    #[test]
    fn notes_are_joined_and_deduplicated_by_substring() {
        let mut a = span(Behavior::Echolalia, 0.0, 1.0);
        a.notes = "repeats the prompt".to_string();
        let mut b = span(Behavior::Echolalia, 1.5, 2.0);
        b.notes = "repeats the prompt".to_string();
        let mut c = span(Behavior::Echolalia, 2.5, 3.0);
        c.notes = "louder this time".to_string();

        let merged = merge_detections(vec![a, b, c], GAP);
        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].notes, "repeats the prompt; louder this time");
    }
}
