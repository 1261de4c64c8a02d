use futures::future::join_all;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::conflict::ConflictSet;
use crate::metadata::MetadataRecord;
use crate::services::Services;
use crate::tags::{names, TagRegistry};
use crate::traits::{DetailProvider, LyricsProvider, TrackQuery};

/// Outcome of one tagging pass over a track.
#[derive(Debug, Clone, Default)]
pub struct TagPass {
    /// Tags every contributing provider agreed on.
    pub resolved: MetadataRecord,
    /// Tag names with two or more distinct candidates.
    pub conflicts: ConflictSet,
    /// Names of the providers that contributed at least one tag, in query order.
    pub contributors: Vec<&'static str>,
}

impl TagPass {
    pub fn found_nothing(&self) -> bool {
        self.resolved.is_empty() && self.conflicts.is_empty()
    }
}

/// Runs one tagging pass: every detail provider, then every lyrics provider, then
/// auto-resolve. Provider failures count as "no contribution".
#[derive(Clone)]
pub struct TagService {
    details: Vec<Arc<dyn DetailProvider>>,
    lyrics: Vec<Arc<dyn LyricsProvider>>,
}

impl TagService {
    pub fn new(details: Vec<Arc<dyn DetailProvider>>, lyrics: Vec<Arc<dyn LyricsProvider>>) -> Self {
        Self { details, lyrics }
    }

    pub fn from_services(services: &Services) -> Self {
        Self::new(services.details().to_vec(), services.lyrics().to_vec())
    }

    pub async fn run(&self, query: &TrackQuery<'_>) -> TagPass {
        let mut conflicts = ConflictSet::new();
        let mut contributors = Vec::new();

        let results = join_all(self.details.iter().map(|p| p.search_details(query))).await;
        for (provider, result) in self.details.iter().zip(results) {
            let record = match result {
                Ok(Some(record)) => record.without_virtual(),
                Ok(None) => {
                    debug!("{} had nothing for {}", provider.name(), query.path.display());
                    continue;
                }
                Err(e) => {
                    warn!("{} failed: {}", provider.name(), e);
                    continue;
                }
            };
            if record.is_empty() {
                debug!("{} returned an empty record", provider.name());
                continue;
            }
            match conflicts.add_record(&record, provider.name()) {
                Ok(()) => contributors.push(provider.name()),
                Err(e) => warn!("Discarding {} result: {}", provider.name(), e),
            }
        }

        let results = join_all(self.lyrics.iter().map(|p| p.search_lyrics(query))).await;
        for (provider, result) in self.lyrics.iter().zip(results) {
            let text = match result {
                Ok(Some(text)) if !text.trim().is_empty() => text,
                Ok(_) => {
                    debug!("{} had no lyrics for {}", provider.name(), query.path.display());
                    continue;
                }
                Err(e) => {
                    warn!("{} failed: {}", provider.name(), e);
                    continue;
                }
            };
            let added = TagRegistry::standard()
                .create(names::LYRICS, text)
                .and_then(|tag| conflicts.add(tag, provider.name()));
            match added {
                Ok(_) => contributors.push(provider.name()),
                Err(e) => warn!("Discarding {} lyrics: {}", provider.name(), e),
            }
        }

        let resolved = conflicts.auto_resolve();
        TagPass {
            resolved,
            conflicts,
            contributors,
        }
    }
}
