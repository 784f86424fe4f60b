//! Suppression Tracker.
//!
//! A marker tells the reconciliation engine that the participant's next
//! membership change was issued by this service. Markers are never cleared
//! on read: they survive the notification they were meant for and then
//! expire on their own. Any engine-issued move must call
//! [`SuppressionTracker::suppress`] immediately beforehand.

use std::sync::Arc;
use std::time::Duration;

use mm_schemas::{MatchResult, ParticipantId};

use crate::keys::Keyspace;
use crate::store::StateStore;

/// Used when config does not say otherwise.
pub const DEFAULT_SUPPRESSION_TTL: Duration = Duration::from_secs(3);

#[derive(Clone)]
pub struct SuppressionTracker {
    store: Arc<dyn StateStore>,
    keys: Keyspace,
    ttl: Duration,
}

impl SuppressionTracker {
    pub fn new(store: Arc<dyn StateStore>, keys: Keyspace, ttl: Duration) -> Self {
        Self { store, keys, ttl }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub async fn suppress(&self, participant: &ParticipantId) -> MatchResult<()> {
        self.store
            .set_with_ttl(&self.keys.suppress_key(participant), "1".to_string(), self.ttl)
            .await
    }

    pub async fn is_suppressed(&self, participant: &ParticipantId) -> MatchResult<bool> {
        Ok(self
            .store
            .get(&self.keys.suppress_key(participant))
            .await?
            .is_some())
    }
}
