//! Drives tagging passes over batches of tracks and applies manual resolutions.

use shared::library::{LibrarySettings, MergePolicy, TrackState};
use shared::tagging::{TaggingSummary, TrackOutcome};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::conflict::ConflictSet;
use crate::error::{Error, Result};
use crate::services::Services;
use crate::tag_service::TagService;
use crate::tags::{names, TagValue};
use crate::track::{entries_of, Track};
use crate::traits::TrackQuery;

/// A decision for one open conflict.
#[derive(Debug, Clone, PartialEq)]
pub enum Resolution {
    /// Commit the candidate at this index.
    Pick(usize),
    /// Commit a value typed in by the user.
    Manual(TagValue),
    /// Commit nothing.
    Reject,
}

/// Open conflicts left on one track after a tagging pass.
#[derive(Debug, Clone)]
pub struct TrackConflicts {
    pub track: Arc<Track>,
    pub conflicts: ConflictSet,
}

#[derive(Debug, Clone)]
pub struct BatchOutcome {
    pub summary: TaggingSummary,
    /// Only tracks that ended in `Conflicting`.
    pub conflicts: Vec<TrackConflicts>,
}

pub struct Tagger {
    services: Services,
    tag_service: TagService,
    merge_policy: MergePolicy,
    auto_save: bool,
}

impl Tagger {
    pub fn new(services: Services, settings: &LibrarySettings) -> Self {
        Self {
            tag_service: TagService::from_services(&services),
            services,
            merge_policy: settings.merge_policy,
            auto_save: settings.auto_save,
        }
    }

    pub fn services(&self) -> &Services {
        &self.services
    }

    pub fn merge_policy(&self) -> MergePolicy {
        self.merge_policy
    }

    pub fn is_auto_save(&self) -> bool {
        self.auto_save
    }

    /// Tag tracks one after another. Cancellation is checked before each track; tracks
    /// already tagged stay tagged.
    pub async fn tag_batch(&self, tracks: &[Arc<Track>], cancel: &CancellationToken) -> BatchOutcome {
        let mut summary = TaggingSummary::start();
        let mut conflicts = Vec::new();

        for track in tracks {
            if cancel.is_cancelled() {
                info!(
                    "Tagging cancelled after {} of {} tracks",
                    summary.processed(),
                    tracks.len()
                );
                summary.cancelled = true;
                break;
            }

            let (state, error, open) = match self.tag_track(track).await {
                Ok((state, set)) => {
                    let open = set.unresolved().count();
                    if state == TrackState::Conflicting {
                        conflicts.push(TrackConflicts {
                            track: Arc::clone(track),
                            conflicts: set,
                        });
                    }
                    (state, None, open)
                }
                Err(e) => {
                    warn!("Tagging {} failed: {}", track.path().display(), e);
                    track.set_state(TrackState::Fault);
                    (TrackState::Fault, Some(e.to_string()), 0)
                }
            };
            summary.outcomes.push(TrackOutcome {
                track_id: track.id(),
                state,
                open_conflicts: open,
                error,
            });
        }

        summary.finish();
        info!(
            "Tagged {} tracks in {}ms: {} succeeded, {} conflicting, {} not found, {} failed",
            summary.processed(),
            summary.elapsed().map_or(0, |d| d.num_milliseconds()),
            summary.count(TrackState::Success),
            summary.count(TrackState::Conflicting),
            summary.count(TrackState::TagsNotFound),
            summary.count(TrackState::Fault)
        );
        BatchOutcome { summary, conflicts }
    }

    /// Run one tagging pass over `track`, merge the agreed tags into its record and set its
    /// terminal state. The record stays locked for the whole pass. Errors leave the record
    /// untouched; the caller decides on `Fault`.
    pub async fn tag_track(&self, track: &Track) -> Result<(TrackState, ConflictSet)> {
        track.set_state(TrackState::Processing);
        debug!("Tagging {}", track.path().display());

        let mut record = track.record().await;
        let pass = self
            .tag_service
            .run(&TrackQuery::new(track.path(), &record))
            .await;

        if pass.found_nothing() {
            drop(record);
            track.set_state(TrackState::TagsNotFound);
            return Ok((TrackState::TagsNotFound, pass.conflicts));
        }

        if !pass.resolved.is_empty() {
            let mut merged = record.merge(&pass.resolved, self.merge_policy);
            merged.set_tag(names::SOURCE, pass.contributors.join(", "))?;
            if self.auto_save {
                self.services
                    .store()
                    .write(track.path(), &entries_of(&merged))
                    .await?;
            }
            Track::commit_held(&mut record, merged)?;
            drop(record);
            track.notify_record();
        } else {
            drop(record);
        }

        let state = if pass.conflicts.is_settled() {
            TrackState::Success
        } else {
            TrackState::Conflicting
        };
        track.set_state(state);
        Ok((state, pass.conflicts))
    }

    /// Settle the conflict for `tag` on the given track. A picked or manual value is
    /// committed to the record, and written to the file first when auto-save is on. When
    /// the write fails the conflict stays open and the record is unchanged.
    pub async fn resolve(
        &self,
        item: &mut TrackConflicts,
        tag: &str,
        resolution: Resolution,
    ) -> Result<()> {
        let conflict = item
            .conflicts
            .get_mut(tag)
            .ok_or_else(|| Error::UnknownConflict(tag.to_string()))?;

        let chosen = match &resolution {
            Resolution::Pick(index) => Some(conflict.candidate_tag(*index)?.clone()),
            Resolution::Manual(value) => Some(conflict.manual_tag(value.clone())?),
            Resolution::Reject => None,
        };

        match chosen {
            Some(chosen) => {
                let mut record = item.track.record().await;
                let mut updated = record.clone();
                updated.upsert(chosen.clone());
                if self.auto_save {
                    self.services
                        .store()
                        .write(item.track.path(), &entries_of(&updated))
                        .await?;
                }
                Track::commit_held(&mut record, updated)?;
                drop(record);
                item.track.notify_record();
                conflict.resolve_with(chosen)?;
            }
            None => conflict.reject()?,
        }
        debug!("Resolved '{}' on {} with {:?}", tag, item.track.path().display(), resolution);

        if item.conflicts.is_settled() {
            item.track.set_state(TrackState::Success);
        }
        Ok(())
    }

    pub async fn load(&self, track: &Track) -> Result<()> {
        track.load(self.services.store().as_ref()).await
    }

    pub async fn save(&self, track: &Track) -> Result<()> {
        track.save(self.services.store().as_ref()).await
    }
}
