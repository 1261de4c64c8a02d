use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Audio file extensions picked up from watched folders by default.
pub const DEFAULT_EXTENSIONS: &[&str] = &["mp3", "flac", "m4a", "ogg", "opus", "wav", "wma", "aac"];

/// Lifecycle of a track with respect to tagging, ordered by display priority
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum TrackState {
    #[default]
    Idle,
    Processing,
    Success,
    TagsNotFound,
    Conflicting,
    Fault,
}

impl TrackState {
    /// Whether a tagging pass has finished with this state.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, TrackState::Idle | TrackState::Processing)
    }
}

/// How the result of a tagging pass is merged into a track's existing record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum MergePolicy {
    /// Looked-up values win over what the track already has.
    #[default]
    #[serde(alias = "replace")]
    ReplaceWith,
    /// Existing values win; lookups only fill gaps.
    #[serde(alias = "union")]
    UnionWith,
}

impl std::str::FromStr for MergePolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "replace" | "replacewith" => Ok(MergePolicy::ReplaceWith),
            "union" | "unionwith" => Ok(MergePolicy::UnionWith),
            other => Err(format!("unknown merge policy: {other}")),
        }
    }
}

/// Persisted library configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LibrarySettings {
    /// Folders whose audio files are tracked.
    #[serde(default)]
    pub paths: Vec<PathBuf>,
    #[serde(default)]
    pub merge_policy: MergePolicy,
    /// Write merged tags back to the file right after a tagging pass.
    #[serde(default)]
    pub auto_save: bool,
    /// Lowercase file extensions (without dot) considered audio files.
    #[serde(default = "default_extensions")]
    pub extensions: Vec<String>,
}

fn default_extensions() -> Vec<String> {
    DEFAULT_EXTENSIONS.iter().map(|e| e.to_string()).collect()
}

impl Default for LibrarySettings {
    fn default() -> Self {
        Self {
            paths: Vec::new(),
            merge_policy: MergePolicy::default(),
            auto_save: false,
            extensions: default_extensions(),
        }
    }
}

/// Check a path against an extension filter, case-insensitively.
pub fn has_extension(path: &Path, extensions: &[String]) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| extensions.iter().any(|allowed| allowed.eq_ignore_ascii_case(ext)))
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extension_filter_ignores_case() {
        let extensions = LibrarySettings::default().extensions;
        assert!(has_extension(Path::new("/music/a.FLAC"), &extensions));
        assert!(has_extension(Path::new("b.mp3"), &extensions));
        assert!(!has_extension(Path::new("cover.jpg"), &extensions));
        assert!(!has_extension(Path::new("README"), &extensions));
    }

    #[test]
    fn merge_policy_parses_short_names() {
        assert_eq!("union".parse::<MergePolicy>(), Ok(MergePolicy::UnionWith));
        assert_eq!("Replace".parse::<MergePolicy>(), Ok(MergePolicy::ReplaceWith));
        assert!("both".parse::<MergePolicy>().is_err());
    }

    #[test]
    fn settings_fill_defaults_from_partial_json() {
        let settings: LibrarySettings =
            serde_json::from_str(r#"{ "paths": ["/music"], "merge_policy": "union" }"#).unwrap();
        assert_eq!(settings.merge_policy, MergePolicy::UnionWith);
        assert!(!settings.auto_save);
        assert_eq!(settings.extensions.len(), DEFAULT_EXTENSIONS.len());
    }
}
