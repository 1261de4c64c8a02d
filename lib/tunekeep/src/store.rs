//! The file metadata reader/writer contract and its implementations.

use async_trait::async_trait;
use lofty::config::WriteOptions;
use lofty::file::{AudioFile, TaggedFileExt};
use lofty::read_from_path;
use lofty::tag::Tag as FileTag;
use std::collections::HashMap;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::{debug, info};

use crate::error::{Error, Result};
use crate::observable::lock;
use crate::tags::{TagRegistry, TagValue};

/// Ordered `(tag name, value)` pairs as stored in a file.
pub type TagEntries = Vec<(String, TagValue)>;

/// Reads and writes the persisted tags of audio files. A write is all-or-nothing per file.
#[async_trait]
pub trait TagStore: Send + Sync {
    async fn read(&self, path: &Path) -> Result<TagEntries>;

    /// Replace every persisted tag of the file with `entries`; persisted tags missing from
    /// `entries` are removed from the file.
    async fn write(&self, path: &Path, entries: &[(String, TagValue)]) -> Result<()>;

    async fn rename(&self, from: &Path, to: &Path) -> Result<()> {
        tokio::fs::rename(from, to).await?;
        Ok(())
    }

    async fn delete(&self, path: &Path) -> Result<()> {
        tokio::fs::remove_file(path).await?;
        Ok(())
    }
}

/// `lofty`-backed store for real audio files.
#[derive(Debug, Clone)]
pub struct LoftyStore {
    registry: &'static TagRegistry,
}

impl LoftyStore {
    pub fn new() -> Self {
        Self {
            registry: TagRegistry::standard(),
        }
    }

    fn read_blocking(registry: &'static TagRegistry, path: &Path) -> Result<TagEntries> {
        let tagged_file = read_from_path(path)?;
        let Some(file_tag) = tagged_file.primary_tag().or_else(|| tagged_file.first_tag()) else {
            debug!("No tags found in {}", path.display());
            return Ok(Vec::new());
        };

        Ok(registry
            .persisted()
            .filter_map(|descriptor| descriptor.read_from(file_tag))
            .map(|tag| (tag.name().to_string(), tag.value().clone()))
            .collect())
    }

    fn write_blocking(
        registry: &'static TagRegistry,
        path: &Path,
        entries: &[(String, TagValue)],
    ) -> Result<()> {
        let mut tagged_file = read_from_path(path)?;
        let tag_type = tagged_file.primary_tag_type();
        if tagged_file.tag(tag_type).is_none() {
            tagged_file.insert_tag(FileTag::new(tag_type));
        }
        let file_tag = tagged_file.tag_mut(tag_type).ok_or_else(|| {
            Error::invalid(format!("no writable {tag_type:?} tag in {}", path.display()))
        })?;

        for descriptor in registry.persisted() {
            match entries.iter().find(|(name, _)| name == descriptor.name) {
                Some((_, value)) => descriptor.create(value.clone())?.apply_to(file_tag)?,
                None => descriptor.clear_from(file_tag),
            }
        }

        tagged_file.save_to_path(path, WriteOptions::default())?;
        info!("Wrote {} tags to {}", entries.len(), path.display());
        Ok(())
    }
}

impl Default for LoftyStore {
    fn default() -> Self {
        Self::new()
    }
}

fn join_error(e: tokio::task::JoinError) -> Error {
    Error::Io(io::Error::other(e))
}

#[async_trait]
impl TagStore for LoftyStore {
    async fn read(&self, path: &Path) -> Result<TagEntries> {
        let registry = self.registry;
        let path = path.to_path_buf();
        tokio::task::spawn_blocking(move || Self::read_blocking(registry, &path))
            .await
            .map_err(join_error)?
    }

    async fn write(&self, path: &Path, entries: &[(String, TagValue)]) -> Result<()> {
        let registry = self.registry;
        let path = path.to_path_buf();
        let entries = entries.to_vec();
        tokio::task::spawn_blocking(move || Self::write_blocking(registry, &path, &entries))
            .await
            .map_err(join_error)?
    }
}

/// In-memory store keyed by path, for previews and tests.
#[derive(Debug, Default)]
pub struct MemoryStore {
    files: Mutex<HashMap<PathBuf, TagEntries>>,
    read_only: Mutex<bool>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, path: impl Into<PathBuf>, entries: TagEntries) {
        lock(&self.files).insert(path.into(), entries);
    }

    pub fn get(&self, path: &Path) -> Option<TagEntries> {
        lock(&self.files).get(path).cloned()
    }

    /// Make every write, rename and delete fail.
    pub fn set_read_only(&self, read_only: bool) {
        *lock(&self.read_only) = read_only;
    }

    fn check_writable(&self, path: &Path) -> Result<()> {
        if *lock(&self.read_only) {
            return Err(Error::Io(io::Error::new(
                io::ErrorKind::PermissionDenied,
                format!("{} is read-only", path.display()),
            )));
        }
        Ok(())
    }

    fn not_found(path: &Path) -> Error {
        Error::Io(io::Error::new(
            io::ErrorKind::NotFound,
            format!("{} not found", path.display()),
        ))
    }
}

#[async_trait]
impl TagStore for MemoryStore {
    async fn read(&self, path: &Path) -> Result<TagEntries> {
        self.get(path).ok_or_else(|| Self::not_found(path))
    }

    async fn write(&self, path: &Path, entries: &[(String, TagValue)]) -> Result<()> {
        self.check_writable(path)?;
        lock(&self.files).insert(path.to_path_buf(), entries.to_vec());
        Ok(())
    }

    async fn rename(&self, from: &Path, to: &Path) -> Result<()> {
        self.check_writable(from)?;
        let mut files = lock(&self.files);
        let entries = files.remove(from).ok_or_else(|| Self::not_found(from))?;
        files.insert(to.to_path_buf(), entries);
        Ok(())
    }

    async fn delete(&self, path: &Path) -> Result<()> {
        self.check_writable(path)?;
        lock(&self.files)
            .remove(path)
            .map(|_| ())
            .ok_or_else(|| Self::not_found(path))
    }
}
