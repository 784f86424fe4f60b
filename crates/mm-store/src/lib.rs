//! mm-store
//!
//! Store-backed state for managed matches: the [`StateStore`] boundary, an
//! in-memory implementation, and the three record families built on it
//! (match registry, participant ledger, suppression markers).
//!
//! There are no in-process globals here. Two service instances pointed at the
//! same store see the same matches.

mod approval;
mod keys;
mod ledger;
mod registry;
mod store;
mod suppress;

use std::sync::Arc;
use std::time::Duration;

pub use approval::{ApprovalSlots, DEFAULT_APPROVAL_TIMEOUT};
pub use keys::Keyspace;
pub use ledger::ParticipantLedger;
pub use registry::MatchRegistry;
pub use store::{MemoryStore, StateStore};
pub use suppress::{SuppressionTracker, DEFAULT_SUPPRESSION_TTL};

/// Every store-backed handle, sharing one store and keyspace.
#[derive(Clone)]
pub struct Stores {
    pub registry: MatchRegistry,
    pub ledger: ParticipantLedger,
    pub suppression: SuppressionTracker,
    pub approvals: ApprovalSlots,
}

impl Stores {
    pub fn new(
        store: Arc<dyn StateStore>,
        keys: Keyspace,
        suppression_ttl: Duration,
        approval_timeout: Duration,
    ) -> Self {
        let ledger = ParticipantLedger::new(Arc::clone(&store), keys.clone());
        Self {
            registry: MatchRegistry::new(Arc::clone(&store), keys.clone(), ledger.clone()),
            ledger,
            suppression: SuppressionTracker::new(Arc::clone(&store), keys.clone(), suppression_ttl),
            approvals: ApprovalSlots::new(store, keys, approval_timeout),
        }
    }

    /// Default TTLs, empty namespace.
    pub fn with_defaults(store: Arc<dyn StateStore>) -> Self {
        Self::new(
            store,
            Keyspace::default(),
            DEFAULT_SUPPRESSION_TTL,
            DEFAULT_APPROVAL_TIMEOUT,
        )
    }
}
