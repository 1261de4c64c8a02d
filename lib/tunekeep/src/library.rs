//! Watched folders and the live list of every track they contain.

use itertools::Itertools;
use shared::library::{has_extension, LibrarySettings};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::error::Result;
use crate::observable::{CollectionChange, Notifier, ObservableVec, Sequence};
use crate::projection::{MultiProjection, ProjectionBuilder};
use crate::store::TagStore;
use crate::track::Track;

/// Structural change reported by a directory watcher.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FolderEvent {
    Added(PathBuf),
    Removed(PathBuf),
    Renamed { from: PathBuf, to: PathBuf },
    /// The folder was re-read; `paths` is its full content. Files already listed keep
    /// their place and their track.
    Reset(Vec<PathBuf>),
}

/// The audio files of one watched folder, in discovery order.
pub struct LibraryFolder {
    root: PathBuf,
    extensions: Vec<String>,
    files: ObservableVec<PathBuf>,
}

impl LibraryFolder {
    pub fn new(root: impl Into<PathBuf>, extensions: Vec<String>) -> Self {
        Self {
            root: root.into(),
            extensions,
            files: ObservableVec::new(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn accepts(&self, path: &Path) -> bool {
        has_extension(path, &self.extensions)
    }

    pub fn contains(&self, path: &Path) -> bool {
        self.files.position(|file| file == path).is_some()
    }

    /// Apply a watcher event. Returns whether the file list changed.
    pub fn apply(&self, event: FolderEvent) -> bool {
        match event {
            FolderEvent::Added(path) => {
                if !self.accepts(&path) {
                    debug!("Ignoring {}: extension not watched", path.display());
                    return false;
                }
                if self.contains(&path) {
                    return false;
                }
                self.files.push(path);
                true
            }
            FolderEvent::Removed(path) => self.files.remove_first(|file| *file == path).is_some(),
            FolderEvent::Renamed { from, to } => {
                let index = self.files.position(|file| *file == from);
                match (index, self.accepts(&to)) {
                    (Some(index), true) => self.files.replace(index, to).is_some(),
                    (Some(index), false) => {
                        debug!("{} renamed to an unwatched extension", from.display());
                        self.files.remove(index).is_some()
                    }
                    (None, true) => self.apply(FolderEvent::Added(to)),
                    (None, false) => false,
                }
            }
            FolderEvent::Reset(paths) => {
                let accepted: Vec<PathBuf> = paths
                    .into_iter()
                    .filter(|path| self.accepts(path))
                    .unique()
                    .collect();
                self.sync(&accepted)
            }
        }
    }

    /// Walk the folder recursively and bring the file list in line with the disk, keeping
    /// files that are still present where they are.
    pub async fn scan(&self) -> Result<usize> {
        let mut found = Vec::new();
        let mut pending = vec![self.root.clone()];
        while let Some(dir) = pending.pop() {
            let mut entries = tokio::fs::read_dir(&dir).await?;
            while let Some(entry) = entries.next_entry().await? {
                let path = entry.path();
                if entry.file_type().await?.is_dir() {
                    pending.push(path);
                } else if self.accepts(&path) {
                    found.push(path);
                }
            }
        }
        found.sort();
        self.sync(&found);

        debug!("Scanned {}: {} audio files", self.root.display(), found.len());
        Ok(found.len())
    }
}

impl LibraryFolder {
    /// Bring the file list in line with `found` through removals and appends only, so files
    /// listed on both sides keep their tracks. Returns whether anything changed.
    fn sync(&self, found: &[PathBuf]) -> bool {
        let present: HashSet<&PathBuf> = found.iter().collect();
        let mut changed = false;
        for stale in self.files.snapshot().iter().filter(|file| !present.contains(file)) {
            changed |= self.files.remove_first(|file| file == stale).is_some();
        }
        for path in found {
            if !self.contains(path) {
                self.files.push(path.clone());
                changed = true;
            }
        }
        changed
    }
}

impl Sequence<PathBuf> for LibraryFolder {
    fn snapshot(&self) -> Vec<PathBuf> {
        self.files.snapshot()
    }

    fn len(&self) -> usize {
        self.files.len()
    }

    fn changes(&self) -> Option<&Notifier<CollectionChange<PathBuf>>> {
        self.files.changes()
    }
}

/// Every watched folder plus a live projection of all their files as tracks.
pub struct Library {
    settings: LibrarySettings,
    folders: ObservableVec<Arc<LibraryFolder>>,
    tracks: MultiProjection<PathBuf, Arc<Track>>,
}

impl Library {
    pub fn new(settings: LibrarySettings) -> Result<Self> {
        let folders = ObservableVec::from_vec(
            settings
                .paths
                .iter()
                .map(|root| Arc::new(LibraryFolder::new(root, settings.extensions.clone())))
                .collect(),
        );
        let tracks = ProjectionBuilder::with_back_map(
            |path: &PathBuf| Arc::new(Track::new(path.clone())),
            |track: &Arc<Track>, path: &PathBuf| track.path() == path.as_path(),
        )
        .forward_item_changes()
        .build_multi(&folders)?;

        Ok(Self {
            settings,
            folders,
            tracks,
        })
    }

    pub fn settings(&self) -> &LibrarySettings {
        &self.settings
    }

    pub fn folders(&self) -> Vec<Arc<LibraryFolder>> {
        self.folders.snapshot()
    }

    pub fn folder(&self, root: &Path) -> Option<Arc<LibraryFolder>> {
        self.folders().into_iter().find(|folder| folder.root() == root)
    }

    /// The folder currently listing `path`.
    pub fn folder_of(&self, path: &Path) -> Option<Arc<LibraryFolder>> {
        self.folders().into_iter().find(|folder| folder.contains(path))
    }

    /// Start watching `root`. Adding a folder twice returns the existing one.
    pub fn add_folder(&self, root: impl Into<PathBuf>) -> Arc<LibraryFolder> {
        let root = root.into();
        if let Some(existing) = self.folder(&root) {
            return existing;
        }
        let folder = Arc::new(LibraryFolder::new(root, self.settings.extensions.clone()));
        self.folders.push(Arc::clone(&folder));
        folder
    }

    /// Stop watching `root`; its tracks leave the library.
    pub fn remove_folder(&self, root: &Path) -> bool {
        self.folders
            .remove_first(|folder| folder.root() == root)
            .is_some()
    }

    /// Live, read-only list of every track in every folder.
    pub fn tracks(&self) -> &MultiProjection<PathBuf, Arc<Track>> {
        &self.tracks
    }

    pub fn track(&self, path: &Path) -> Option<Arc<Track>> {
        self.tracks
            .snapshot()
            .into_iter()
            .find(|track| track.path() == path)
    }

    pub async fn scan(&self) -> Result<usize> {
        let mut total = 0;
        for folder in self.folders() {
            total += folder.scan().await?;
        }
        info!("Library scan found {} tracks", total);
        Ok(total)
    }

    pub async fn load_track(&self, track: &Track, store: &dyn TagStore) -> Result<()> {
        track.load(store).await
    }

    /// Load every track, skipping the ones that fail. Returns how many loaded.
    pub async fn load_all(&self, store: &dyn TagStore) -> usize {
        let mut loaded = 0;
        for track in self.tracks.snapshot() {
            match track.load(store).await {
                Ok(()) => loaded += 1,
                Err(e) => warn!("Failed to load {}: {}", track.path().display(), e),
            }
        }
        loaded
    }

    /// Rename the track's file. The new track inherits the in-memory record; `None` when the
    /// new name falls outside the extension filter.
    pub async fn move_track(
        &self,
        track: &Track,
        to: impl Into<PathBuf>,
        store: &dyn TagStore,
    ) -> Result<Option<Arc<Track>>> {
        let to = to.into();
        let from = track.path().to_path_buf();
        store.rename(&from, &to).await?;

        let record = track.snapshot().await;
        if let Some(folder) = self.folder_of(&from) {
            folder.apply(FolderEvent::Renamed {
                from,
                to: to.clone(),
            });
        }
        let Some(moved) = self.track(&to) else {
            return Ok(None);
        };
        moved.commit(record).await?;
        Ok(Some(moved))
    }

    /// Delete the track's file, then drop it from its folder.
    pub async fn delete_track(&self, track: &Track, store: &dyn TagStore) -> Result<()> {
        store.delete(track.path()).await?;
        if let Some(folder) = self.folder_of(track.path()) {
            folder.apply(FolderEvent::Removed(track.path().to_path_buf()));
        }
        Ok(())
    }
}
