//! Prompt templates and response schemas.
//!
//! Prompts are data-driven: the vocabulary section is rendered from the
//! static definitions table, so the model and the post-processor always
//! agree on the label set.

use std::fmt::Write as _;

use bscope_models::{format_seconds, Behavior, Detection, Modality, Segment, BEHAVIOR_DEFINITIONS};

/// Appended when the first response was not parseable JSON.
pub const STRICT_JSON_REMINDER: &str =
    "\n\nReturn ONLY strict JSON. No markdown fences, no commentary, no trailing text.";

fn vocabulary_section() -> String {
    let mut section = String::new();
    let _ = writeln!(
        section,
        "Visual behaviors ({}):",
        Behavior::labels_for(Modality::Visual).join(", ")
    );
    for def in BEHAVIOR_DEFINITIONS.iter().filter(|d| d.modality == Modality::Visual) {
        let _ = writeln!(section, "- {}: {}", def.label, def.definition);
    }
    let _ = writeln!(
        section,
        "\nAudio behaviors ({}):",
        Behavior::labels_for(Modality::Audio).join(", ")
    );
    for def in BEHAVIOR_DEFINITIONS.iter().filter(|d| d.modality == Modality::Audio) {
        let _ = writeln!(section, "- {}: {}", def.label, def.definition);
    }
    section
}

/// Detection prompt for one analysis window.
pub fn detection_prompt(segment: &Segment) -> String {
    format!(
        r#"You are analyzing a clip from a recorded therapy session video of a child.
The clip covers {start} to {end} of the full session recording.

Identify every occurrence of the following behaviors shown by the child. Use ONLY these labels:

{vocabulary}
Rules:
- Timestamps must be in seconds RELATIVE TO THIS CLIP (0 is the start of the clip).
- Report each continuous episode as ONE span with its start and end, never as per-second fragments.
- Set "modality" to "visual" or "audio" according to the lists above.
- Add a short observation to "notes" when it helps a reviewer.
- If none of the behaviors occur, return an empty array.

Return a JSON array of objects with keys "behavior", "modality", "startSec", "endSec", "notes"."#,
        start = format_seconds(segment.start_sec),
        end = format_seconds(segment.end_sec),
        vocabulary = vocabulary_section(),
    )
}

/// Validation prompt for one merged span against its margin-expanded clip.
pub fn validation_prompt(detection: &Detection, clip_start: f64, clip_end: f64) -> String {
    format!(
        r#"You are reviewing a clip from a recorded therapy session video of a child.
The clip covers {start} to {end} of the full session recording.

An automated pass flagged this clip as showing the child engaged in "{behavior}" ({modality}): {definition}

Decide whether the behavior is actually present IN THIS CLIP and performed by the child.
If it is, refine the start and end of the behavior in seconds RELATIVE TO THIS CLIP
(0 is the start of the clip).

Return a JSON object with keys "correct" (boolean) and, when correct is true,
"startSec" and "endSec" (numbers)."#,
        start = format_seconds(clip_start),
        end = format_seconds(clip_end),
        behavior = detection.behavior,
        modality = detection.modality,
        definition = detection.behavior.definition(),
    )
}

/// Response schema for the detection stage: a strict array of spans.
pub fn detection_schema() -> serde_json::Value {
    serde_json::json!({
        "type": "ARRAY",
        "items": {
            "type": "OBJECT",
            "properties": {
                "behavior": {"type": "STRING"},
                "modality": {"type": "STRING", "enum": ["visual", "audio"]},
                "startSec": {"type": "NUMBER"},
                "endSec": {"type": "NUMBER"},
                "notes": {"type": "STRING"}
            },
            "required": ["behavior", "modality", "startSec", "endSec"]
        }
    })
}

/// Response schema for the validation stage.
pub fn validation_schema() -> serde_json::Value {
    serde_json::json!({
        "type": "OBJECT",
        "properties": {
            "correct": {"type": "BOOLEAN"},
            "startSec": {"type": "NUMBER"},
            "endSec": {"type": "NUMBER"}
        },
        "required": ["correct"]
    })
}
