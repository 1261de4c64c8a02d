use std::collections::HashMap;
use std::sync::OnceLock;

use super::value::{TagValue, ValueKind};
use super::Tag;
use crate::error::{Error, Result};

/// Well-known tag names.
pub mod names {
    pub const TITLE: &str = "title";
    pub const SUBTITLE: &str = "subtitle";
    pub const PERFORMERS: &str = "performers";
    pub const ALBUM: &str = "album";
    pub const ALBUM_ARTISTS: &str = "album_artists";
    pub const GENRES: &str = "genres";
    pub const COMPOSERS: &str = "composers";
    pub const YEAR: &str = "year";
    pub const TRACK: &str = "track";
    pub const TRACK_COUNT: &str = "track_count";
    pub const DISC: &str = "disc";
    pub const DISC_COUNT: &str = "disc_count";
    pub const COMMENT: &str = "comment";
    pub const LYRICS: &str = "lyrics";
    pub const ARTWORK: &str = "artwork";

    pub const LOADING: &str = "loading";
    pub const SOURCE: &str = "source";
    pub const REVISION: &str = "revision";
}

/// Whether a tag round-trips to the audio file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TagKind {
    Persisted,
    /// In-memory only: loading state, provenance, counters.
    Virtual,
}

/// Prototype of a tag: its name, value shape and persistence.
#[derive(Debug, PartialEq, Eq)]
pub struct TagDescriptor {
    pub name: &'static str,
    pub value_kind: ValueKind,
    pub kind: TagKind,
}

impl TagDescriptor {
    pub const fn persisted(name: &'static str, value_kind: ValueKind) -> Self {
        Self {
            name,
            value_kind,
            kind: TagKind::Persisted,
        }
    }

    pub const fn virtual_tag(name: &'static str, value_kind: ValueKind) -> Self {
        Self {
            name,
            value_kind,
            kind: TagKind::Virtual,
        }
    }

    pub fn is_persisted(&self) -> bool {
        self.kind == TagKind::Persisted
    }

    /// Create a tag of this prototype. Fails when `value` has the wrong shape.
    pub fn create(&'static self, value: impl Into<TagValue>) -> Result<Tag> {
        Tag::new(self, value.into())
    }

    pub(crate) fn check(&self, value: &TagValue) -> Result<()> {
        if value.kind() != self.value_kind {
            return Err(Error::invalid(format!(
                "tag '{}' holds {:?} values, got {:?}",
                self.name,
                self.value_kind,
                value.kind()
            )));
        }
        Ok(())
    }
}

static STANDARD_TAGS: [TagDescriptor; 18] = [
    TagDescriptor::persisted(names::TITLE, ValueKind::Text),
    TagDescriptor::persisted(names::SUBTITLE, ValueKind::Text),
    TagDescriptor::persisted(names::PERFORMERS, ValueKind::List),
    TagDescriptor::persisted(names::ALBUM, ValueKind::Text),
    TagDescriptor::persisted(names::ALBUM_ARTISTS, ValueKind::List),
    TagDescriptor::persisted(names::GENRES, ValueKind::List),
    TagDescriptor::persisted(names::COMPOSERS, ValueKind::List),
    TagDescriptor::persisted(names::YEAR, ValueKind::Number),
    TagDescriptor::persisted(names::TRACK, ValueKind::Number),
    TagDescriptor::persisted(names::TRACK_COUNT, ValueKind::Number),
    TagDescriptor::persisted(names::DISC, ValueKind::Number),
    TagDescriptor::persisted(names::DISC_COUNT, ValueKind::Number),
    TagDescriptor::persisted(names::COMMENT, ValueKind::Text),
    TagDescriptor::persisted(names::LYRICS, ValueKind::Text),
    TagDescriptor::persisted(names::ARTWORK, ValueKind::Binary),
    TagDescriptor::virtual_tag(names::LOADING, ValueKind::Flag),
    TagDescriptor::virtual_tag(names::SOURCE, ValueKind::Text),
    TagDescriptor::virtual_tag(names::REVISION, ValueKind::Number),
];

/// Lookup table from tag name to prototype, built once.
#[derive(Debug)]
pub struct TagRegistry {
    descriptors: &'static [TagDescriptor],
    by_name: HashMap<&'static str, usize>,
}

impl TagRegistry {
    pub fn new(descriptors: &'static [TagDescriptor]) -> Self {
        let by_name = descriptors
            .iter()
            .enumerate()
            .map(|(index, descriptor)| (descriptor.name, index))
            .collect();
        Self {
            descriptors,
            by_name,
        }
    }

    /// The registry of every tag this crate knows about.
    pub fn standard() -> &'static TagRegistry {
        static INSTANCE: OnceLock<TagRegistry> = OnceLock::new();
        INSTANCE.get_or_init(|| TagRegistry::new(&STANDARD_TAGS))
    }

    pub fn get(&self, name: &str) -> Option<&'static TagDescriptor> {
        let descriptors: &'static [TagDescriptor] = self.descriptors;
        self.by_name.get(name).map(|&index| &descriptors[index])
    }

    pub fn require(&self, name: &str) -> Result<&'static TagDescriptor> {
        self.get(name)
            .ok_or_else(|| Error::invalid(format!("unknown tag '{name}'")))
    }

    /// Create a tag by name.
    pub fn create(&self, name: &str, value: impl Into<TagValue>) -> Result<Tag> {
        self.require(name)?.create(value)
    }

    pub fn iter(&self) -> impl Iterator<Item = &'static TagDescriptor> {
        let descriptors: &'static [TagDescriptor] = self.descriptors;
        descriptors.iter()
    }

    pub fn persisted(&self) -> impl Iterator<Item = &'static TagDescriptor> {
        self.iter().filter(|d| d.is_persisted())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn standard_registry_resolves_by_name() {
        let registry = TagRegistry::standard();
        let title = registry.get(names::TITLE).unwrap();
        assert_eq!(title.value_kind, ValueKind::Text);
        assert!(title.is_persisted());
        assert!(!registry.get(names::LOADING).unwrap().is_persisted());
        assert!(registry.get("bpm").is_none());
    }

    #[test]
    fn names_are_unique() {
        let registry = TagRegistry::standard();
        assert_eq!(registry.iter().count(), STANDARD_TAGS.len());
        assert_eq!(registry.by_name.len(), STANDARD_TAGS.len());
    }

    #[test]
    fn create_checks_value_shape() {
        let registry = TagRegistry::standard();
        assert!(registry.create(names::YEAR, 1999u32).is_ok());
        assert!(matches!(
            registry.create(names::YEAR, "1999"),
            Err(Error::InvalidArgument(_))
        ));
        assert!(registry.create("mood", "calm").is_err());
    }
}
