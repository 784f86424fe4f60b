//! Pending end-approval tokens, one slot per match.
//!
//! The slot expires with the approval timeout. A second request before
//! resolution replaces the first.

use std::sync::Arc;
use std::time::Duration;

use mm_schemas::{ApprovalToken, MatchId, MatchResult};

use crate::keys::Keyspace;
use crate::store::{get_json, to_json, StateStore};

pub const DEFAULT_APPROVAL_TIMEOUT: Duration = Duration::from_secs(600);

#[derive(Clone)]
pub struct ApprovalSlots {
    store: Arc<dyn StateStore>,
    keys: Keyspace,
    timeout: Duration,
}

impl ApprovalSlots {
    pub fn new(store: Arc<dyn StateStore>, keys: Keyspace, timeout: Duration) -> Self {
        Self {
            store,
            keys,
            timeout,
        }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub async fn put(&self, token: &ApprovalToken) -> MatchResult<()> {
        let key = self.keys.approval_key(&token.match_id);
        let raw = to_json(&key, token)?;
        self.store.set_with_ttl(&key, raw, self.timeout).await
    }

    pub async fn get(&self, match_id: &MatchId) -> MatchResult<Option<ApprovalToken>> {
        get_json(self.store.as_ref(), &self.keys.approval_key(match_id)).await
    }

    pub async fn discard(&self, match_id: &MatchId) -> MatchResult<()> {
        self.store.delete(&self.keys.approval_key(match_id)).await
    }
}
