//! Analysis window planning.

use serde::{Deserialize, Serialize};

/// A fixed-length analysis window over the source video.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Segment {
    pub start_sec: f64,
    pub end_sec: f64,
}

impl Segment {
    pub fn len(&self) -> f64 {
        (self.end_sec - self.start_sec).max(0.0)
    }

    pub fn is_empty(&self) -> bool {
        self.end_sec <= self.start_sec
    }
}

/// Split `[0, duration)` into overlapping windows.
///
/// Windows start at 0 and advance by `chunk - overlap`; each is `chunk`
/// seconds long, truncated at the duration. The final window always ends at
/// the duration, so an action straddling a cut appears intact in at least one
/// window.
pub fn plan_segments(duration: f64, chunk: f64, overlap: f64) -> Vec<Segment> {
    let mut segments = Vec::new();
    if duration <= 0.0 || chunk <= 0.0 {
        return segments;
    }
    let step = (chunk - overlap).max(1.0);

    let mut start = 0.0;
    loop {
        let end = (start + chunk).min(duration);
        segments.push(Segment {
            start_sec: start,
            end_sec: end,
        });
        if end >= duration {
            break;
        }
        start += step;
    }
    segments
}
