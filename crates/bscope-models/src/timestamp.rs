//! Timestamp formatting utilities.

/// Format seconds as `HH:MM:SS` (fractional part truncated).
pub fn format_seconds(total_secs: f64) -> String {
    let total = total_secs.max(0.0);
    let hours = (total / 3600.0).floor() as u32;
    let mins = ((total % 3600.0) / 60.0).floor() as u32;
    let secs = (total % 60.0).floor() as u32;
    format!("{:02}:{:02}:{:02}", hours, mins, secs)
}

/// Format seconds as an SRT cue timestamp, `HH:MM:SS,mmm`.
pub fn format_srt_seconds(total_secs: f64) -> String {
    let total = total_secs.max(0.0);
    let millis = (total * 1000.0).round() as u64;
    let hours = millis / 3_600_000;
    let mins = (millis % 3_600_000) / 60_000;
    let secs = (millis % 60_000) / 1000;
    let ms = millis % 1000;
    format!("{:02}:{:02}:{:02},{:03}", hours, mins, secs, ms)
}

/// Round a time to 3 decimal places, the precision carried in artifacts.
pub fn round3(value: f64) -> f64 {
    (value * 1000.0).round() / 1000.0
}
