//! Timeline store
//!
//! Append-only, timestamp-ordered sequence of feature snapshots for the
//! current session. The scoring engine reads either the whole sequence or its
//! most recent suffix (the live window).

use chrono::{DateTime, Utc};

use crate::error::RapportError;
use crate::types::FeatureSnapshot;

#[derive(Debug, Clone, Default)]
pub struct Timeline {
    entries: Vec<FeatureSnapshot>,
}

impl Timeline {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a snapshot. Snapshots sharing the latest timestamp are accepted;
    /// anything earlier is rejected and the timeline is left unchanged.
    pub fn append(&mut self, snapshot: FeatureSnapshot) -> Result<(), RapportError> {
        if let Some(last) = self.entries.last() {
            if snapshot.timestamp < last.timestamp {
                return Err(RapportError::OutOfOrderSnapshot(format!(
                    "{} precedes last entry at {}",
                    snapshot.timestamp.to_rfc3339(),
                    last.timestamp.to_rfc3339()
                )));
            }
        }
        self.entries.push(snapshot);
        Ok(())
    }

    /// Drop every entry (session start)
    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Full session history, oldest first
    pub fn entries(&self) -> &[FeatureSnapshot] {
        &self.entries
    }

    /// The most recent `size` entries (fewer when the timeline is shorter)
    pub fn window(&self, size: usize) -> &[FeatureSnapshot] {
        let start = self.entries.len().saturating_sub(size);
        &self.entries[start..]
    }

    pub fn first_timestamp(&self) -> Option<DateTime<Utc>> {
        self.entries.first().map(|s| s.timestamp)
    }

    pub fn last_timestamp(&self) -> Option<DateTime<Utc>> {
        self.entries.last().map(|s| s.timestamp)
    }
}
