//! Typed tag values and their prototypes.

pub mod file;
pub mod registry;
pub mod value;

pub use registry::{names, TagDescriptor, TagKind, TagRegistry};
pub use value::{TagValue, ValueKind};

use crate::error::Result;
use crate::observable::{Notifier, Subscription};
use crate::projection::NotifyChanged;

/// Published by a tag when its value is reassigned.
#[derive(Debug, Clone, PartialEq)]
pub struct TagChanged {
    pub name: &'static str,
    pub old: TagValue,
    pub new: TagValue,
}

/// A named, typed metadata value.
pub struct Tag {
    descriptor: &'static TagDescriptor,
    value: TagValue,
    changed: Notifier<TagChanged>,
}

impl Tag {
    pub(crate) fn new(descriptor: &'static TagDescriptor, value: TagValue) -> Result<Self> {
        descriptor.check(&value)?;
        Ok(Self {
            descriptor,
            value,
            changed: Notifier::new(),
        })
    }

    pub fn name(&self) -> &'static str {
        self.descriptor.name
    }

    pub fn descriptor(&self) -> &'static TagDescriptor {
        self.descriptor
    }

    pub fn value(&self) -> &TagValue {
        &self.value
    }

    pub fn has_value(&self) -> bool {
        self.value.has_value()
    }

    pub fn is_persisted(&self) -> bool {
        self.descriptor.is_persisted()
    }

    /// A new tag of the same prototype carrying `value`. `self` is untouched.
    pub fn with_value(&self, value: impl Into<TagValue>) -> Result<Tag> {
        Tag::new(self.descriptor, value.into())
    }

    /// Reassign the value in place and notify subscribers when it actually changed.
    pub fn set_value(&mut self, value: impl Into<TagValue>) -> Result<()> {
        let value = value.into();
        self.descriptor.check(&value)?;
        if value == self.value {
            return Ok(());
        }
        let old = std::mem::replace(&mut self.value, value);
        self.changed.emit(&TagChanged {
            name: self.name(),
            old,
            new: self.value.clone(),
        });
        Ok(())
    }

    pub fn changed(&self) -> &Notifier<TagChanged> {
        &self.changed
    }

    /// Same name and a matching value (see [`TagValue::matches`]).
    pub fn matches(&self, other: &Tag) -> bool {
        self.name() == other.name() && self.value.matches(&other.value)
    }
}

impl Clone for Tag {
    fn clone(&self) -> Self {
        Self {
            descriptor: self.descriptor,
            value: self.value.clone(),
            changed: Notifier::new(),
        }
    }
}

impl PartialEq for Tag {
    fn eq(&self, other: &Self) -> bool {
        self.name() == other.name() && self.value == other.value
    }
}

impl std::fmt::Debug for Tag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Tag")
            .field("name", &self.name())
            .field("value", &self.value)
            .finish()
    }
}

impl NotifyChanged for Tag {
    fn subscribe_changed(&self, on_change: Box<dyn Fn() + Send + Sync>) -> Subscription {
        self.changed.subscribe(move |_| on_change())
    }
}
