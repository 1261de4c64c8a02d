//! Per-tag candidate sets collected from providers during one tagging pass.

use tracing::debug;

use crate::error::{Error, Result};
use crate::metadata::MetadataRecord;
use crate::tags::{Tag, TagRegistry, TagValue};

/// A candidate value and the providers that proposed it.
#[derive(Debug, Clone, PartialEq)]
pub struct Candidate {
    pub tag: Tag,
    pub sources: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConflictState {
    Unresolved,
    Resolved,
    Rejected,
}

/// Candidates for one tag name. Leaves `Unresolved` at most once.
#[derive(Debug, Clone, PartialEq)]
pub struct Conflict {
    name: &'static str,
    candidates: Vec<Candidate>,
    state: ConflictState,
    chosen: Option<Tag>,
}

impl Conflict {
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            candidates: Vec::new(),
            state: ConflictState::Unresolved,
            chosen: None,
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn candidates(&self) -> &[Candidate] {
        &self.candidates
    }

    pub fn state(&self) -> ConflictState {
        self.state
    }

    /// The committed tag of a resolved conflict.
    pub fn chosen(&self) -> Option<&Tag> {
        self.chosen.as_ref()
    }

    pub fn is_open(&self) -> bool {
        self.state == ConflictState::Unresolved
    }

    /// Add a candidate. A value matching an existing candidate only adds `source` to it.
    /// Returns whether a new candidate was created.
    pub fn add(&mut self, tag: Tag, source: &str) -> Result<bool> {
        if tag.name() != self.name {
            return Err(Error::invalid(format!(
                "tag '{}' offered to conflict for '{}'",
                tag.name(),
                self.name
            )));
        }
        if !tag.has_value() {
            return Ok(false);
        }
        if let Some(existing) = self.candidates.iter_mut().find(|c| c.tag.matches(&tag)) {
            if !existing.sources.iter().any(|s| s == source) {
                existing.sources.push(source.to_string());
            }
            return Ok(false);
        }
        self.candidates.push(Candidate {
            tag,
            sources: vec![source.to_string()],
        });
        Ok(true)
    }

    fn ensure_open(&self) -> Result<()> {
        if !self.is_open() {
            return Err(Error::ConflictSettled {
                tag: self.name.to_string(),
            });
        }
        Ok(())
    }

    /// The tag that picking candidate `index` would commit, without settling the conflict.
    pub fn candidate_tag(&self, index: usize) -> Result<&Tag> {
        self.ensure_open()?;
        self.candidates
            .get(index)
            .map(|c| &c.tag)
            .ok_or_else(|| Error::CandidateOutOfRange {
                tag: self.name.to_string(),
                index,
            })
    }

    /// The tag a manual `value` would commit, without settling the conflict.
    pub fn manual_tag(&self, value: TagValue) -> Result<Tag> {
        self.ensure_open()?;
        if !value.has_value() {
            return Err(Error::invalid(format!(
                "manual value for '{}' is empty",
                self.name
            )));
        }
        TagRegistry::standard().create(self.name, value)
    }

    /// Settle on `tag`, which must carry this conflict's name.
    pub fn resolve_with(&mut self, tag: Tag) -> Result<&Tag> {
        self.ensure_open()?;
        if tag.name() != self.name {
            return Err(Error::invalid(format!(
                "cannot resolve '{}' with a '{}' tag",
                self.name,
                tag.name()
            )));
        }
        self.state = ConflictState::Resolved;
        Ok(self.chosen.insert(tag))
    }

    pub fn resolve(&mut self, index: usize) -> Result<&Tag> {
        let tag = self.candidate_tag(index)?.clone();
        self.resolve_with(tag)
    }

    pub fn reject(&mut self) -> Result<()> {
        self.ensure_open()?;
        self.state = ConflictState::Rejected;
        Ok(())
    }
}

/// Conflicts of one track, one per tag name, in first-contribution order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConflictSet {
    conflicts: Vec<Conflict>,
}

impl ConflictSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.conflicts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.conflicts.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Conflict> {
        self.conflicts.iter()
    }

    pub fn get(&self, name: &str) -> Option<&Conflict> {
        self.conflicts.iter().find(|c| c.name == name)
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut Conflict> {
        self.conflicts.iter_mut().find(|c| c.name == name)
    }

    pub fn names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.conflicts.iter().map(|c| c.name)
    }

    /// Locate or create the conflict for the tag's name and add the tag as a candidate.
    pub fn add(&mut self, tag: Tag, source: &str) -> Result<bool> {
        let index = match self.conflicts.iter().position(|c| c.name == tag.name()) {
            Some(index) => index,
            None => {
                self.conflicts.push(Conflict::new(tag.name()));
                self.conflicts.len() - 1
            }
        };
        self.conflicts[index].add(tag, source)
    }

    /// Add every tag of `record` on behalf of `source`.
    pub fn add_record(&mut self, record: &MetadataRecord, source: &str) -> Result<()> {
        for tag in record.iter() {
            self.add(tag.clone(), source)?;
        }
        Ok(())
    }

    /// Move every open conflict with exactly one candidate into the returned record.
    /// Conflicts that ended up with no candidate are dropped, not returned.
    pub fn auto_resolve(&mut self) -> MetadataRecord {
        let mut resolved = MetadataRecord::new();
        self.conflicts.retain(|conflict| {
            if !conflict.is_open() {
                return true;
            }
            match conflict.candidates.as_slice() {
                [] => false,
                [only] => {
                    resolved.push(only.tag.clone());
                    false
                }
                _ => true,
            }
        });
        debug!(
            "Auto-resolved {} tags, {} conflicts left",
            resolved.len(),
            self.conflicts.len()
        );
        resolved
    }

    pub fn unresolved(&self) -> impl Iterator<Item = &Conflict> {
        self.conflicts.iter().filter(|c| c.is_open())
    }

    /// Whether no conflict is waiting for a decision.
    pub fn is_settled(&self) -> bool {
        self.unresolved().next().is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tags::names;

    fn tag(name: &str, value: impl Into<TagValue>) -> Tag {
        TagRegistry::standard().create(name, value).unwrap()
    }

    #[test]
    fn equal_values_collapse_into_one_candidate() {
        let mut set = ConflictSet::new();
        assert!(set.add(tag(names::GENRES, vec!["Rock"]), "a").unwrap());
        assert!(!set.add(tag(names::GENRES, vec!["rock "]), "b").unwrap());

        let conflict = set.get(names::GENRES).unwrap();
        assert_eq!(conflict.candidates().len(), 1);
        assert_eq!(conflict.candidates()[0].sources, vec!["a", "b"]);
        assert_eq!(
            conflict.candidates()[0].tag.value(),
            &TagValue::from(vec!["Rock"])
        );
    }

    #[test]
    fn auto_resolve_splits_single_and_multiple_candidates() {
        let mut set = ConflictSet::new();
        set.add(tag(names::TITLE, "X"), "a").unwrap();
        set.add(tag(names::TITLE, "Y"), "b").unwrap();
        set.add(tag(names::ALBUM, "Only"), "a").unwrap();

        let resolved = set.auto_resolve();
        assert_eq!(resolved.text(names::ALBUM), Some("Only"));
        assert!(!resolved.contains(names::TITLE));
        assert_eq!(set.names().collect::<Vec<_>>(), vec![names::TITLE]);
        assert!(set.get(names::ALBUM).is_none());
    }

    #[test]
    fn empty_values_are_not_candidates() {
        let mut set = ConflictSet::new();
        set.add(tag(names::COMMENT, "  "), "a").unwrap();
        assert!(set.auto_resolve().is_empty());
        assert!(set.is_empty());
    }

    #[test]
    fn transitions_are_terminal() {
        let mut conflict = Conflict::new(names::TITLE);
        conflict.add(tag(names::TITLE, "X"), "a").unwrap();
        conflict.add(tag(names::TITLE, "Y"), "b").unwrap();

        assert!(matches!(
            conflict.resolve(5),
            Err(Error::CandidateOutOfRange { index: 5, .. })
        ));
        assert_eq!(conflict.resolve(1).unwrap().value(), &TagValue::from("Y"));
        assert_eq!(conflict.state(), ConflictState::Resolved);
        assert!(matches!(conflict.reject(), Err(Error::ConflictSettled { .. })));
        assert!(matches!(conflict.resolve(0), Err(Error::ConflictSettled { .. })));
    }

    #[test]
    fn manual_value_must_be_significant_and_well_typed() {
        let conflict = Conflict::new(names::YEAR);
        assert!(conflict.manual_tag(TagValue::Number(0)).is_err());
        assert!(conflict.manual_tag(TagValue::from("1999")).is_err());
        assert_eq!(
            conflict.manual_tag(TagValue::Number(1999)).unwrap().value(),
            &TagValue::Number(1999)
        );
    }

    #[test]
    fn rejects_tags_of_another_name() {
        let mut conflict = Conflict::new(names::TITLE);
        assert!(conflict.add(tag(names::ALBUM, "A"), "a").is_err());
        assert!(conflict.resolve_with(tag(names::ALBUM, "A")).is_err());
    }
}
