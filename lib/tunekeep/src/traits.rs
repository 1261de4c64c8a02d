use async_trait::async_trait;
use std::path::Path;

use crate::error::Result;
use crate::metadata::MetadataRecord;

/// What a provider gets to look at: the track's file and its current record.
#[derive(Debug, Clone, Copy)]
pub struct TrackQuery<'a> {
    pub path: &'a Path,
    pub record: &'a MetadataRecord,
}

impl<'a> TrackQuery<'a> {
    pub fn new(path: &'a Path, record: &'a MetadataRecord) -> Self {
        Self { path, record }
    }
}

#[async_trait]
pub trait DetailProvider: Send + Sync {
    fn id(&self) -> &'static str;
    fn name(&self) -> &'static str;

    /// Candidate metadata for the track. `Ok(None)` when the provider knows nothing.
    async fn search_details(&self, query: &TrackQuery<'_>) -> Result<Option<MetadataRecord>>;
}

#[async_trait]
pub trait LyricsProvider: Send + Sync {
    fn id(&self) -> &'static str;
    fn name(&self) -> &'static str;

    async fn search_lyrics(&self, query: &TrackQuery<'_>) -> Result<Option<String>>;
}
