pub mod config;
pub mod conflict;
pub mod error;
pub mod library;
pub mod metadata;
pub mod observable;
pub mod projection;
pub mod providers;
pub mod services;
pub mod store;
pub mod tag_service;
pub mod tagger;
pub mod tags;
pub mod track;
pub mod traits;

pub use conflict::{Candidate, Conflict, ConflictSet, ConflictState};
pub use error::{Error, Result};
pub use library::{FolderEvent, Library, LibraryFolder};
pub use metadata::MetadataRecord;
pub use observable::{CollectionChange, Notifier, ObservableVec, Sequence, Subscription};
pub use projection::{MultiProjection, ProjectedSlice, Projection, ProjectionBuilder};
pub use services::{Services, ServicesBuilder};
pub use store::{LoftyStore, MemoryStore, TagStore};
pub use tagger::{BatchOutcome, Resolution, Tagger, TrackConflicts};
pub use tags::{Tag, TagRegistry, TagValue};
pub use track::Track;
pub use traits::{DetailProvider, LyricsProvider, TrackQuery};
