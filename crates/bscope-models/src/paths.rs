//! Bucket path layout.
//!
//! Source videos:  `<videos-prefix>/<icdKey>/<epoch>-<safeName>`
//! Sessions:       `<sessions-prefix>/<icdKey>/<epoch>.json`
//! Artifacts:      `<analysis-prefix>/<icdKey>/<epoch>/<artifact>`

/// Artifact file names emitted under the analysis prefix.
pub const BEHAVIORS_RAW_JSON: &str = "behaviors_raw.json";
pub const BEHAVIORS_VALIDATED_JSON: &str = "behaviors_validated.json";
pub const BEHAVIORS_FINAL_JSON: &str = "behaviors_final.json";
pub const PROCESSED_VIDEO_MP4: &str = "video_with_behaviors.mp4";

/// Prefix configuration for the platform bucket.
#[derive(Debug, Clone)]
pub struct PathLayout {
    pub videos_prefix: String,
    pub sessions_prefix: String,
    pub analysis_prefix: String,
}

impl Default for PathLayout {
    fn default() -> Self {
        Self {
            videos_prefix: "child-videos".to_string(),
            sessions_prefix: "sessions".to_string(),
            analysis_prefix: "analysis".to_string(),
        }
    }
}

impl PathLayout {
    /// Whether an object path is a session source video.
    pub fn is_source_video(&self, object_name: &str) -> bool {
        object_name.starts_with(&format!("{}/", self.videos_prefix))
    }

    /// Parse `(icdKey, uploadEpoch)` out of a source video path.
    ///
    /// The upload epoch is the leading numeric segment of the file name;
    /// `None` when the name does not start with digits.
    pub fn parse_source_video(&self, object_name: &str) -> Option<(String, Option<i64>)> {
        let rest = object_name.strip_prefix(&format!("{}/", self.videos_prefix))?;
        let (icd_key, file_name) = rest.split_once('/')?;
        if icd_key.is_empty() || file_name.is_empty() || file_name.contains('/') {
            return None;
        }
        let epoch = file_name
            .split('-')
            .next()
            .and_then(|lead| lead.parse::<i64>().ok());
        Some((icd_key.to_string(), epoch))
    }

    /// Key of the session record for `(icdKey, uploadEpoch)`.
    pub fn session_key(&self, icd_key: &str, epoch: i64) -> String {
        format!("{}/{}/{}.json", self.sessions_prefix, icd_key, epoch)
    }

    /// Listing prefix of all session records for a child.
    pub fn session_prefix(&self, icd_key: &str) -> String {
        format!("{}/{}/", self.sessions_prefix, icd_key)
    }

    /// Prefix under which a job's artifact set is published.
    pub fn artifact_prefix(&self, icd_key: &str, epoch: i64) -> String {
        format!("{}/{}/{}", self.analysis_prefix, icd_key, epoch)
    }

    pub fn artifact_key(&self, icd_key: &str, epoch: i64, file_name: &str) -> String {
        format!("{}/{}", self.artifact_prefix(icd_key, epoch), file_name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_icd_key_and_epoch() {
        let layout = PathLayout::default();
        let (icd, epoch) = layout
            .parse_source_video("child-videos/icd-f84/1712000000-session one.mp4")
            .unwrap();
        assert_eq!(icd, "icd-f84");
        assert_eq!(epoch, Some(1712000000));
    }

    #[test]
    fn epoch_is_none_without_leading_digits() {
        let layout = PathLayout::default();
        let (icd, epoch) = layout
            .parse_source_video("child-videos/icd-f84/video.mp4")
            .unwrap();
        assert_eq!(icd, "icd-f84");
        assert_eq!(epoch, None);
    }

    #[test]
    fn rejects_paths_outside_the_videos_prefix() {
        let layout = PathLayout::default();
        assert!(layout.parse_source_video("analysis/icd-f84/1/x.mp4").is_none());
        assert!(!layout.is_source_video("sessions/icd-f84/1.json"));
        // Prefix must match a whole path component.
        assert!(!layout.is_source_video("child-videos-old/icd-f84/1-a.mp4"));
    }

    #[test]
    fn rejects_nested_or_bare_paths() {
        let layout = PathLayout::default();
        assert!(layout.parse_source_video("child-videos/icd/1-a/b.mp4").is_none());
        assert!(layout.parse_source_video("child-videos/file.mp4").is_none());
    }

    #[test]
    fn key_construction() {
        let layout = PathLayout::default();
        assert_eq!(layout.session_key("icd-abc", 1234), "sessions/icd-abc/1234.json");
        assert_eq!(layout.session_prefix("icd-abc"), "sessions/icd-abc/");
        assert_eq!(
            layout.artifact_key("icd-abc", 1234, BEHAVIORS_FINAL_JSON),
            "analysis/icd-abc/1234/behaviors_final.json"
        );
    }
}
