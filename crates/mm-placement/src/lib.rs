//! mm-placement
//!
//! Placement Controller: the one-shot match lifecycle commands.
//!
//! - `start`: create zones, snapshot original placements, create the match,
//!   enrol and move every roster member (explicit rosters or a random split
//!   of the caller's zone).
//! - `directed_move` / `swap`: owner directives, always override policy.
//! - `self_move`: participant-initiated, only under an `allow` policy.
//! - `lock` / `unlock` / `set_policy` / `transfer` / `status`.
//! - `end`: owner ends directly; others go through `request_end` and the
//!   owner's `resolve_end`.
//! - `start_timer` / `stop_timer`: cancellable countdown, optional auto-end.
//!
//! Owner-only commands on an ownerless match are open to any caller with
//! the management privilege.

mod controller;
mod lifecycle;
mod timer;
mod types;

pub use controller::PlacementController;
pub use timer::parse_duration;
pub use types::{
    Caller, EndOutcome, MatchStatus, PlacementSettings, ResolveOutcome, StartRequest,
    StartedMatch, TeardownReport, TimerInfo, ZoneOccupancy,
};
