use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::library::TrackState;

/// Terminal outcome of one track within a tagging batch
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackOutcome {
    pub track_id: Uuid,
    pub state: TrackState,
    /// Number of tag names left for manual resolution.
    pub open_conflicts: usize,
    pub error: Option<String>,
}

/// Counters for a finished (or cancelled) tagging batch
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaggingSummary {
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub outcomes: Vec<TrackOutcome>,
    pub cancelled: bool,
}

impl TaggingSummary {
    pub fn start() -> Self {
        Self {
            started_at: Utc::now(),
            finished_at: None,
            outcomes: Vec::new(),
            cancelled: false,
        }
    }

    pub fn finish(&mut self) {
        self.finished_at = Some(Utc::now());
    }

    pub fn count(&self, state: TrackState) -> usize {
        self.outcomes.iter().filter(|o| o.state == state).count()
    }

    pub fn processed(&self) -> usize {
        self.outcomes.len()
    }

    pub fn elapsed(&self) -> Option<Duration> {
        self.finished_at.map(|end| end - self.started_at)
    }
}
