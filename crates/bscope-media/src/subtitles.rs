//! SRT rendering and subtitle burn-in.

use std::fmt::Write as _;
use std::path::Path;

use bscope_models::{format_srt_seconds, Detection};

use crate::command::FfmpegCommand;
use crate::error::MediaResult;

/// Render behavior spans as an SRT document.
///
/// Cues are sequence-numbered from 1 and labelled `[modality] behavior`.
pub fn render_srt(behaviors: &[Detection]) -> String {
    let mut srt = String::new();
    for (idx, b) in behaviors.iter().enumerate() {
        let _ = write!(
            srt,
            "{}\n{} --> {}\n[{}] {}\n\n",
            idx + 1,
            format_srt_seconds(b.start_sec),
            format_srt_seconds(b.end_sec),
            b.modality,
            b.behavior,
        );
    }
    srt
}

/// Re-encode `input` with the given SRT file drawn over the frames.
///
/// Failure here is fatal for the job: without the output video there is no
/// artifact set.
pub async fn burn_subtitles(
    input: impl AsRef<Path>,
    output: impl AsRef<Path>,
    srt: impl AsRef<Path>,
) -> MediaResult<()> {
    let filter = format!(
        "subtitles=filename='{}'",
        escape_filter_path(&srt.as_ref().to_string_lossy())
    );
    FfmpegCommand::new(input, output)
        .video_filter(filter)
        .standard_encode()
        .run()
        .await
}

/// Escape a path for embedding in a filter argument: the filter parser
/// treats `:` as an option separator and `'` as a quote.
fn escape_filter_path(path: &str) -> String {
    path.replace('\\', "\\\\")
        .replace(':', "\\:")
        .replace('\'', "\\'")
}
