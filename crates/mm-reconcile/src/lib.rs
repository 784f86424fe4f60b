//! mm-reconcile
//!
//! Reconciliation engine: consumes platform-wide membership-change
//! notifications and keeps every tracked participant where the ledger says
//! they belong.
//!
//! Per notification, in order:
//!
//! 1. suppressed (engine-initiated) changes are discarded;
//! 2. untracked participants are ignored unless they walked into a locked
//!    match, in which case they are sent back;
//! 3. records pointing at a vanished match are cleared;
//! 4. the owner is never rolled back: moves inside the match are tracked,
//!    leaving the match zones triggers failover;
//! 5. members are judged by their role's move policy.
//!
//! # Invariants
//!
//! - Every move this crate issues is preceded by a suppression marker for
//!   the moved participant, so its own notification is discarded.
//! - A notification never reads or writes another match's records: the
//!   match is resolved from the participant's record or, for untracked
//!   walk-ins, from the zone index.
//! - Actuator failures never surface as errors from [`ReconcileEngine::handle`].

mod engine;
mod failover;
mod select;
mod types;

pub use engine::ReconcileEngine;
pub use failover::assign_owner;
pub use select::{choose, shuffle, RandomSource, SeededRandom, ThreadRandom};
pub use types::ReconcileOutcome;
