//! One track's metadata: an ordered set of tags, unique by name.

use std::sync::LazyLock;

use regex::Regex;
use shared::library::MergePolicy;

use crate::error::{Error, Result};
use crate::observable::{Notifier, Subscription};
use crate::projection::NotifyChanged;
use crate::tags::{names, Tag, TagRegistry, TagValue};

/// Title shown for records without one.
pub const UNTITLED: &str = "Untitled";

/// Read-only values computed from the record's tags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DerivedProperty {
    Title,
    Performers,
    DisplayName,
    HasArtwork,
    HasTitle,
}

impl DerivedProperty {
    pub const ALL: [DerivedProperty; 5] = [
        DerivedProperty::Title,
        DerivedProperty::Performers,
        DerivedProperty::DisplayName,
        DerivedProperty::HasArtwork,
        DerivedProperty::HasTitle,
    ];

    /// Derived properties whose value depends on the tag `name`.
    pub fn affected_by(name: &str) -> &'static [DerivedProperty] {
        match name {
            names::TITLE => &[
                DerivedProperty::Title,
                DerivedProperty::DisplayName,
                DerivedProperty::HasTitle,
            ],
            names::SUBTITLE => &[DerivedProperty::Title, DerivedProperty::DisplayName],
            names::PERFORMERS => &[DerivedProperty::Performers, DerivedProperty::DisplayName],
            names::ARTWORK => &[DerivedProperty::HasArtwork],
            _ => &[],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordChange {
    Added(&'static str),
    Updated(&'static str),
    Removed(&'static str),
    Derived(DerivedProperty),
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Derived {
    title: String,
    performers: String,
    display_name: String,
    has_artwork: bool,
    has_title: bool,
}

static RE_FEATURING: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^\s*(feat\.|ft\.)").unwrap());

/// Join performer names with ", ", attaching "feat."/"ft." entries to the previous name.
pub fn format_performers(performers: &[String]) -> String {
    let mut joined = String::new();
    for performer in performers.iter().map(|p| p.trim()).filter(|p| !p.is_empty()) {
        if !joined.is_empty() {
            joined.push_str(if RE_FEATURING.is_match(performer) { " " } else { ", " });
        }
        joined.push_str(performer);
    }
    joined
}

/// An ordered collection of tags where no two tags share a name and every stored tag holds
/// a significant value.
pub struct MetadataRecord {
    tags: Vec<Tag>,
    registry: &'static TagRegistry,
    derived: Derived,
    changes: Notifier<RecordChange>,
}

impl MetadataRecord {
    pub fn new() -> Self {
        Self::with_registry(TagRegistry::standard())
    }

    pub fn with_registry(registry: &'static TagRegistry) -> Self {
        let mut record = Self {
            tags: Vec::new(),
            registry,
            derived: Derived {
                title: String::new(),
                performers: String::new(),
                display_name: String::new(),
                has_artwork: false,
                has_title: false,
            },
            changes: Notifier::new(),
        };
        record.derived = record.compute();
        record
    }

    /// Build a record from tags that must have distinct names. Tags without a significant
    /// value are dropped.
    pub fn from_tags(tags: impl IntoIterator<Item = Tag>) -> Result<Self> {
        let mut record = Self::new();
        for tag in tags {
            if record.contains(tag.name()) {
                return Err(Error::invalid(format!("duplicate tag '{}'", tag.name())));
            }
            if tag.has_value() {
                record.tags.push(tag);
            }
        }
        record.derived = record.compute();
        Ok(record)
    }

    /// Build a record from `(name, value)` pairs, resolving prototypes through the registry.
    pub fn from_values<N, V>(values: impl IntoIterator<Item = (N, V)>) -> Result<Self>
    where
        N: AsRef<str>,
        V: Into<TagValue>,
    {
        let registry = TagRegistry::standard();
        let tags = values
            .into_iter()
            .map(|(name, value)| registry.create(name.as_ref(), value))
            .collect::<Result<Vec<_>>>()?;
        Self::from_tags(tags)
    }

    pub fn len(&self) -> usize {
        self.tags.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tags.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Tag> {
        self.tags.iter()
    }

    pub fn names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.tags.iter().map(Tag::name)
    }

    fn index_of(&self, name: &str) -> Option<usize> {
        self.tags.iter().position(|tag| tag.name() == name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.index_of(name).is_some()
    }

    pub fn get(&self, name: &str) -> Option<&Tag> {
        self.tags.iter().find(|tag| tag.name() == name)
    }

    pub fn value(&self, name: &str) -> Option<&TagValue> {
        self.get(name).map(Tag::value)
    }

    pub fn text(&self, name: &str) -> Option<&str> {
        self.value(name).and_then(TagValue::as_text)
    }

    pub fn list(&self, name: &str) -> Option<&[String]> {
        self.value(name).and_then(TagValue::as_list)
    }

    pub fn number(&self, name: &str) -> Option<u32> {
        self.value(name).and_then(TagValue::as_number)
    }

    /// Insert `tag` at `index`.
    ///
    /// A tag of the same name is replaced: in place when it sits at or after `index`,
    /// otherwise the old entry is dropped and the new one lands at the requested (later)
    /// position. Tags without a significant value are ignored. Returns whether the tag
    /// was stored.
    pub fn insert(&mut self, index: usize, tag: Tag) -> bool {
        if !tag.has_value() {
            return false;
        }
        let name = tag.name();
        match self.index_of(name) {
            Some(existing) if existing >= index => {
                self.tags[existing] = tag;
                self.after_change(RecordChange::Updated(name));
            }
            Some(existing) => {
                self.tags.remove(existing);
                let at = (index - 1).min(self.tags.len());
                self.tags.insert(at, tag);
                self.after_change(RecordChange::Updated(name));
            }
            None => {
                let at = index.min(self.tags.len());
                self.tags.insert(at, tag);
                self.after_change(RecordChange::Added(name));
            }
        }
        true
    }

    /// Append `tag`, replacing any tag of the same name.
    pub fn push(&mut self, tag: Tag) -> bool {
        self.insert(self.tags.len(), tag)
    }

    /// Store `tag`, replacing a same-named tag where it stands.
    pub fn upsert(&mut self, tag: Tag) -> bool {
        match self.index_of(tag.name()) {
            Some(existing) => self.insert(existing, tag),
            None => self.push(tag),
        }
    }

    pub fn remove(&mut self, name: &str) -> Option<Tag> {
        let index = self.index_of(name)?;
        let tag = self.tags.remove(index);
        self.after_change(RecordChange::Removed(tag.name()));
        Some(tag)
    }

    /// Set the tag `name` to `value`.
    ///
    /// An existing tag is updated in place (publishing the tag's own change) and removed
    /// when the new value is not significant. Otherwise a tag is created from the registered
    /// prototype and stored only when the value is significant.
    pub fn set_tag(&mut self, name: &str, value: impl Into<TagValue>) -> Result<()> {
        let value = value.into();
        if let Some(index) = self.index_of(name) {
            self.tags[index].set_value(value)?;
            let name = self.tags[index].name();
            if self.tags[index].has_value() {
                self.after_change(RecordChange::Updated(name));
            } else {
                self.tags.remove(index);
                self.after_change(RecordChange::Removed(name));
            }
            return Ok(());
        }

        let tag = self.registry.create(name, value)?;
        self.push(tag);
        Ok(())
    }

    pub fn clear(&mut self) {
        let names: Vec<&'static str> = self.names().collect();
        for name in names {
            self.remove(name);
        }
    }

    /// `base` with every tag of `overlay` applied on top.
    pub fn replace_with(&self, overlay: &MetadataRecord) -> MetadataRecord {
        let mut merged = self.clone();
        for tag in overlay.iter() {
            merged.upsert(tag.clone());
        }
        merged
    }

    /// `base` plus the tags of `overlay` whose names `base` does not have.
    pub fn union_with(&self, overlay: &MetadataRecord) -> MetadataRecord {
        let mut merged = self.clone();
        for tag in overlay.iter().filter(|tag| !self.contains(tag.name())) {
            merged.push(tag.clone());
        }
        merged
    }

    pub fn merge(&self, overlay: &MetadataRecord, policy: MergePolicy) -> MetadataRecord {
        match policy {
            MergePolicy::ReplaceWith => self.replace_with(overlay),
            MergePolicy::UnionWith => self.union_with(overlay),
        }
    }

    /// Persisted tags in record order.
    pub fn persisted(&self) -> impl Iterator<Item = &Tag> {
        self.tags.iter().filter(|tag| tag.is_persisted())
    }

    /// A copy holding only the persisted tags.
    pub fn without_virtual(&self) -> MetadataRecord {
        let mut copy = MetadataRecord::with_registry(self.registry);
        copy.tags = self.persisted().cloned().collect();
        copy.derived = copy.compute();
        copy
    }

    pub fn title(&self) -> &str {
        &self.derived.title
    }

    pub fn performers(&self) -> &str {
        &self.derived.performers
    }

    /// "{performers} - {title}", or just the title when there are no performers.
    pub fn display_name(&self) -> &str {
        &self.derived.display_name
    }

    pub fn has_artwork(&self) -> bool {
        self.derived.has_artwork
    }

    pub fn has_title(&self) -> bool {
        self.derived.has_title
    }

    pub fn changes(&self) -> &Notifier<RecordChange> {
        &self.changes
    }

    fn compute(&self) -> Derived {
        let raw_title = self.text(names::TITLE).map(str::trim).filter(|t| !t.is_empty());
        let mut title = raw_title.unwrap_or(UNTITLED).to_string();
        if let Some(subtitle) = self.text(names::SUBTITLE).map(str::trim).filter(|s| !s.is_empty()) {
            title = format!("{title} ({subtitle})");
        }
        let performers = format_performers(self.list(names::PERFORMERS).unwrap_or_default());
        // No performers: the title alone, never " - title".
        let display_name = if performers.is_empty() {
            title.clone()
        } else {
            format!("{performers} - {title}")
        };
        Derived {
            has_title: raw_title.is_some(),
            has_artwork: self
                .value(names::ARTWORK)
                .is_some_and(TagValue::has_value),
            title,
            performers,
            display_name,
        }
    }

    fn after_change(&mut self, change: RecordChange) {
        let name = match &change {
            RecordChange::Added(name) | RecordChange::Updated(name) | RecordChange::Removed(name) => {
                *name
            }
            RecordChange::Derived(_) => "",
        };
        self.changes.emit(&change);

        let affected = DerivedProperty::affected_by(name);
        if affected.is_empty() {
            return;
        }
        let next = self.compute();
        let previous = std::mem::replace(&mut self.derived, next);
        for property in affected {
            let changed = match property {
                DerivedProperty::Title => previous.title != self.derived.title,
                DerivedProperty::Performers => previous.performers != self.derived.performers,
                DerivedProperty::DisplayName => {
                    previous.display_name != self.derived.display_name
                }
                DerivedProperty::HasArtwork => previous.has_artwork != self.derived.has_artwork,
                DerivedProperty::HasTitle => previous.has_title != self.derived.has_title,
            };
            if changed {
                self.changes.emit(&RecordChange::Derived(*property));
            }
        }
    }
}

impl Default for MetadataRecord {
    fn default() -> Self {
        Self::new()
    }
}

impl Clone for MetadataRecord {
    fn clone(&self) -> Self {
        Self {
            tags: self.tags.clone(),
            registry: self.registry,
            derived: self.derived.clone(),
            changes: Notifier::new(),
        }
    }
}

impl PartialEq for MetadataRecord {
    fn eq(&self, other: &Self) -> bool {
        self.tags == other.tags
    }
}

impl std::fmt::Debug for MetadataRecord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(self.tags.iter()).finish()
    }
}

impl NotifyChanged for MetadataRecord {
    fn subscribe_changed(&self, on_change: Box<dyn Fn() + Send + Sync>) -> Subscription {
        self.changes.subscribe(move |_| on_change())
    }
}
