//! Library configuration.
//!
//! Settings come either from environment variables (`from_env`) or from a JSON file
//! (`load`/`save`). Both paths validate up front so a bad value fails at startup.

use shared::library::{LibrarySettings, MergePolicy};
use std::path::{Path, PathBuf};
use tracing::info;

use crate::error::{Error, Result};

pub const ENV_PATHS: &str = "TUNEKEEP_PATHS";
pub const ENV_MERGE_POLICY: &str = "TUNEKEEP_MERGE_POLICY";
pub const ENV_AUTO_SAVE: &str = "TUNEKEEP_AUTO_SAVE";

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Settings {
    library: LibrarySettings,
}

impl Settings {
    pub fn new(library: LibrarySettings) -> Self {
        Self { library }
    }

    /// Load settings from the process environment.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build settings from any key lookup, defaulting what is missing.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mut library = LibrarySettings::default();

        if let Some(paths) = lookup(ENV_PATHS) {
            library.paths = std::env::split_paths(&paths)
                .filter(|p| !p.as_os_str().is_empty())
                .collect();
        }
        if let Some(policy) = lookup(ENV_MERGE_POLICY) {
            library.merge_policy = policy
                .parse()
                .map_err(|e: String| Error::invalid(format!("{ENV_MERGE_POLICY}: {e}")))?;
        }
        if let Some(flag) = lookup(ENV_AUTO_SAVE) {
            library.auto_save = parse_flag(&flag)
                .ok_or_else(|| Error::invalid(format!("{ENV_AUTO_SAVE}: not a boolean: {flag}")))?;
        }

        Ok(Self { library })
    }

    pub async fn load(path: &Path) -> Result<Self> {
        let raw = tokio::fs::read_to_string(path).await?;
        let library: LibrarySettings = serde_json::from_str(&raw)?;
        info!("Loaded settings from {}", path.display());
        Ok(Self { library })
    }

    pub async fn save(&self, path: &Path) -> Result<()> {
        let raw = serde_json::to_string_pretty(&self.library)?;
        tokio::fs::write(path, raw).await?;
        Ok(())
    }

    /// Get the settings handed to the library and the tagger.
    pub fn library(&self) -> &LibrarySettings {
        &self.library
    }

    /// Get the watched folders.
    pub fn paths(&self) -> &[PathBuf] {
        &self.library.paths
    }

    /// Get the merge policy for tagging results.
    pub fn merge_policy(&self) -> MergePolicy {
        self.library.merge_policy
    }

    /// Check if tagging writes to files right away.
    pub fn is_auto_save(&self) -> bool {
        self.library.auto_save
    }

    pub fn extensions(&self) -> &[String] {
        &self.library.extensions
    }
}

fn parse_flag(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" | "" => Some(false),
        _ => None,
    }
}
