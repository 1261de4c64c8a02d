//! Providers that work offline from what sits on disk.

use async_trait::async_trait;
use regex::Regex;
use std::io::ErrorKind;
use std::path::PathBuf;
use std::sync::LazyLock;
use tracing::debug;

use crate::error::{Error, Result};
use crate::metadata::MetadataRecord;
use crate::tags::names;
use crate::traits::{DetailProvider, LyricsProvider, TrackQuery};

static RE_TRACK_NUMBER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(?P<track>\d{1,3})\s*[-._)]\s*(?P<rest>.+)$").unwrap());
static RE_ARTIST_TITLE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(?P<artist>.+?)\s+-\s+(?P<title>.+)$").unwrap());
static RE_FEATURING: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\s+(?P<feat>(?:feat|ft)\.\s.+)$").unwrap());
static RE_LRC_NOISE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?m)^\[(?:ar|ti|al|au|by|re|ve|length|offset):[^\]]*\]\s*$|\[\d{1,3}:\d{2}(?:[.:]\d{1,3})?\]",
    )
    .unwrap()
});

/// Split an artist credit into performers, keeping "feat." guests as their own entry.
fn split_performers(credit: &str) -> Vec<String> {
    let (main, guest) = match RE_FEATURING.captures(credit) {
        Some(caps) => {
            let start = caps.get(0).map_or(credit.len(), |m| m.start());
            (&credit[..start], caps.name("feat").map(|m| m.as_str()))
        }
        None => (credit, None),
    };
    main.split([',', ';'])
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .map(str::to_string)
        .chain(guest.map(|g| g.trim().to_string()))
        .collect()
}

/// Guesses title, performers and track number from file names such as
/// `03 - Artist - Title.mp3` or `Artist - Title.flac`.
#[derive(Debug, Clone, Default)]
pub struct FileNameProvider;

impl FileNameProvider {
    pub fn new() -> Self {
        Self
    }

    pub fn parse(stem: &str) -> Result<MetadataRecord> {
        let cleaned = stem.replace('_', " ");
        let mut rest = cleaned.trim();
        let mut record = MetadataRecord::new();

        if let Some(caps) = RE_TRACK_NUMBER.captures(rest) {
            if let (Some(track), Some(tail)) = (caps.name("track"), caps.name("rest")) {
                if let Ok(number) = track.as_str().parse::<u32>() {
                    record.set_tag(names::TRACK, number)?;
                }
                rest = tail.as_str();
            }
        }

        match RE_ARTIST_TITLE.captures(rest) {
            Some(caps) => {
                let artist = caps.name("artist").map_or("", |m| m.as_str());
                let title = caps.name("title").map_or("", |m| m.as_str());
                record.set_tag(names::PERFORMERS, split_performers(artist))?;
                record.set_tag(names::TITLE, title.trim())?;
            }
            None => record.set_tag(names::TITLE, rest)?,
        }
        Ok(record)
    }
}

#[async_trait]
impl DetailProvider for FileNameProvider {
    fn id(&self) -> &'static str {
        "filename"
    }

    fn name(&self) -> &'static str {
        "File name"
    }

    async fn search_details(&self, query: &TrackQuery<'_>) -> Result<Option<MetadataRecord>> {
        let Some(stem) = query.path.file_stem().and_then(|s| s.to_str()) else {
            return Ok(None);
        };
        let record = Self::parse(stem)?;
        Ok((!record.is_empty()).then_some(record))
    }
}

/// Reads lyrics from a `.lrc` or `.txt` file next to the audio file, dropping LRC
/// timestamps and header lines.
#[derive(Debug, Clone)]
pub struct SidecarLyricsProvider {
    extensions: Vec<&'static str>,
}

impl SidecarLyricsProvider {
    pub fn new() -> Self {
        Self {
            extensions: vec!["lrc", "txt"],
        }
    }

    pub fn strip_lrc(text: &str) -> String {
        let stripped = RE_LRC_NOISE.replace_all(text, "");
        let lines: Vec<&str> = stripped.lines().map(str::trim_end).collect();
        lines.join("\n").trim().to_string()
    }

    fn candidates(&self, query: &TrackQuery<'_>) -> Vec<PathBuf> {
        self.extensions
            .iter()
            .map(|ext| query.path.with_extension(ext))
            .collect()
    }
}

impl Default for SidecarLyricsProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl LyricsProvider for SidecarLyricsProvider {
    fn id(&self) -> &'static str {
        "sidecar"
    }

    fn name(&self) -> &'static str {
        "Sidecar lyrics"
    }

    async fn search_lyrics(&self, query: &TrackQuery<'_>) -> Result<Option<String>> {
        for candidate in self.candidates(query) {
            match tokio::fs::read_to_string(&candidate).await {
                Ok(text) => {
                    let lyrics = Self::strip_lrc(&text);
                    if !lyrics.is_empty() {
                        debug!("Lyrics found in {}", candidate.display());
                        return Ok(Some(lyrics));
                    }
                }
                Err(e) if e.kind() == ErrorKind::NotFound => continue,
                Err(e) => return Err(Error::provider(self.name(), e)),
            }
        }
        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    #[test]
    fn parses_numbered_artist_title_stems() {
        let record = FileNameProvider::parse("03 - Daft Punk, Pharrell - Get_Lucky").unwrap();
        assert_eq!(record.number(names::TRACK), Some(3));
        assert_eq!(record.text(names::TITLE), Some("Get Lucky"));
        assert_eq!(
            record.list(names::PERFORMERS),
            Some(&["Daft Punk".to_string(), "Pharrell".to_string()][..])
        );
    }

    #[test]
    fn keeps_featured_artist_as_separate_performer() {
        let record = FileNameProvider::parse("Artist feat. Guest - Song").unwrap();
        assert_eq!(
            record.list(names::PERFORMERS),
            Some(&["Artist".to_string(), "feat. Guest".to_string()][..])
        );
        assert_eq!(record.performers(), "Artist feat. Guest");
    }

    #[test]
    fn stem_without_separator_is_a_title() {
        let record = FileNameProvider::parse("Interlude").unwrap();
        assert_eq!(record.text(names::TITLE), Some("Interlude"));
        assert!(!record.contains(names::PERFORMERS));
        assert!(!record.contains(names::TRACK));
    }

    #[test]
    fn strips_lrc_markup() {
        let text = "[ar:Someone]\n[ti:Song]\n[00:01.00]First line\n[00:05.20]Second line\n";
        assert_eq!(SidecarLyricsProvider::strip_lrc(text), "First line\nSecond line");
    }

    #[tokio::test]
    async fn reads_sidecar_next_to_track() {
        let dir = tempfile::tempdir().unwrap();
        let audio = dir.path().join("song.mp3");
        tokio::fs::write(dir.path().join("song.txt"), "Plain words\n")
            .await
            .unwrap();

        let record = MetadataRecord::new();
        let provider = SidecarLyricsProvider::new();
        let lyrics = provider
            .search_lyrics(&TrackQuery::new(&audio, &record))
            .await
            .unwrap();
        assert_eq!(lyrics.as_deref(), Some("Plain words"));

        let missing = provider
            .search_lyrics(&TrackQuery::new(Path::new("/nowhere/x.mp3"), &record))
            .await
            .unwrap();
        assert!(missing.is_none());
    }
}
