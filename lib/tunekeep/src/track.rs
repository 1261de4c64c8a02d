use shared::library::TrackState;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tokio::sync::MutexGuard;
use tracing::debug;
use uuid::Uuid;

use crate::error::Result;
use crate::metadata::MetadataRecord;
use crate::observable::{lock, Notifier, Subscription};
use crate::projection::NotifyChanged;
use crate::store::{TagEntries, TagStore};
use crate::tags::{names, TagRegistry};

#[derive(Debug, Clone, PartialEq)]
pub enum TrackChange {
    State(TrackState),
    Record,
}

/// One audio file and the metadata the library keeps for it.
///
/// The record is guarded by an async mutex. A tagging pass holds it across provider calls,
/// so edits made meanwhile wait for the pass instead of being overwritten by it. The state
/// is a plain value published on every transition.
pub struct Track {
    id: Uuid,
    path: PathBuf,
    record: tokio::sync::Mutex<MetadataRecord>,
    state: Mutex<TrackState>,
    changes: Notifier<TrackChange>,
}

impl Track {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self::with_record(path, MetadataRecord::new())
    }

    pub fn with_record(path: impl Into<PathBuf>, record: MetadataRecord) -> Self {
        Self {
            id: Uuid::new_v4(),
            path: path.into(),
            record: tokio::sync::Mutex::new(record),
            state: Mutex::new(TrackState::Idle),
            changes: Notifier::new(),
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn file_stem(&self) -> Option<&str> {
        self.path.file_stem().and_then(|stem| stem.to_str())
    }

    pub fn state(&self) -> TrackState {
        *lock(&self.state)
    }

    pub fn set_state(&self, state: TrackState) {
        let previous = std::mem::replace(&mut *lock(&self.state), state);
        if previous != state {
            self.changes.emit(&TrackChange::State(state));
        }
    }

    pub async fn record(&self) -> MutexGuard<'_, MetadataRecord> {
        self.record.lock().await
    }

    pub async fn snapshot(&self) -> MetadataRecord {
        self.record.lock().await.clone()
    }

    /// Replace the record and bump its revision counter.
    pub async fn commit(&self, record: MetadataRecord) -> Result<()> {
        Self::commit_held(&mut *self.record.lock().await, record)?;
        self.notify_record();
        Ok(())
    }

    /// Like [`Track::commit`], for a caller already holding the record lock. Call
    /// [`Track::notify_record`] once the guard is dropped.
    pub(crate) fn commit_held(
        current: &mut MetadataRecord,
        mut record: MetadataRecord,
    ) -> Result<()> {
        let revision = current.number(names::REVISION).unwrap_or(0) + 1;
        record.set_tag(names::REVISION, revision)?;
        *current = record;
        Ok(())
    }

    pub(crate) fn notify_record(&self) {
        self.changes.emit(&TrackChange::Record);
    }

    /// Persisted tags as file entries.
    pub async fn entries(&self) -> TagEntries {
        entries_of(&*self.record.lock().await)
    }

    /// Replace the persisted tags of the record with what the file holds. Virtual tags
    /// survive; unknown tag names in the file are skipped.
    pub async fn load(&self, store: &dyn TagStore) -> Result<()> {
        self.record.lock().await.set_tag(names::LOADING, true)?;
        let read = store.read(&self.path).await;

        let mut record = self.record.lock().await;
        record.set_tag(names::LOADING, false)?;
        let entries = read?;

        let registry = TagRegistry::standard();
        let persisted: Vec<&'static str> = record.persisted().map(|tag| tag.name()).collect();
        for name in persisted {
            record.remove(name);
        }
        for (name, value) in entries {
            match registry.create(&name, value) {
                Ok(tag) => {
                    record.push(tag);
                }
                Err(e) => debug!("Skipping tag read from {}: {}", self.path.display(), e),
            }
        }
        drop(record);

        self.notify_record();
        Ok(())
    }

    /// Write the persisted tags to the file.
    pub async fn save(&self, store: &dyn TagStore) -> Result<()> {
        let entries = self.entries().await;
        store.write(&self.path, &entries).await
    }

    pub fn changes(&self) -> &Notifier<TrackChange> {
        &self.changes
    }
}

pub(crate) fn entries_of(record: &MetadataRecord) -> TagEntries {
    record
        .persisted()
        .map(|tag| (tag.name().to_string(), tag.value().clone()))
        .collect()
}

impl std::fmt::Debug for Track {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Track")
            .field("id", &self.id)
            .field("path", &self.path)
            .field("state", &self.state())
            .finish()
    }
}

impl NotifyChanged for Track {
    fn subscribe_changed(&self, on_change: Box<dyn Fn() + Send + Sync>) -> Subscription {
        self.changes.subscribe(move |_| on_change())
    }
}
