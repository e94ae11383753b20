//! Wall-clock overlay burn-in.

use std::path::Path;

use crate::command::FfmpegCommand;
use crate::error::MediaResult;

/// drawtext filter rendering the presentation timestamp at (20,20). The
/// overlay gives the model wall-clock hints inside the frames themselves.
const TIMESTAMP_FILTER: &str = "drawtext=text='%{pts\\:hms}':x=20:y=20:fontsize=36:fontcolor=white:box=1:boxcolor=black@0.5:boxborderw=6";

/// Re-encode `input` with a readable `HH:MM:SS` overlay burned in.
///
/// The caller treats failure as non-fatal and falls back to the original
/// video as the analysis input.
pub async fn burn_timestamp_overlay(
    input: impl AsRef<Path>,
    output: impl AsRef<Path>,
) -> MediaResult<()> {
    FfmpegCommand::new(input, output)
        .video_filter(TIMESTAMP_FILTER)
        .standard_encode()
        .run()
        .await
}
