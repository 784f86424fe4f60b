use mm_schemas::{MatchId, ParticipantId, ZoneId};
use serde::Serialize;

/// What the engine did with one membership-change notification.
///
/// Every notification yields exactly one outcome. Only `Corrected`,
/// `LockdownReverted` and `CorrectionFailed` involve an actuator move.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ReconcileOutcome {
    /// The change was caused by the engine itself.
    Suppressed,
    /// Participant has no record and walked into nothing locked.
    Untracked,
    /// Untracked walk-in into a locked match was sent back.
    LockdownReverted {
        match_id: MatchId,
        to: Option<ZoneId>,
    },
    /// Record pointed at a match that no longer exists and was removed.
    StaleRecordCleared { match_id: MatchId },
    /// Owner moved within the match; expected zone follows them.
    OwnerTracked { match_id: MatchId, zone: ZoneId },
    /// Owner left the match zones and ownership was handed over.
    OwnerFailover {
        match_id: MatchId,
        old_owner: ParticipantId,
        new_owner: ParticipantId,
    },
    /// Owner left and nobody was left to promote.
    Ownerless { match_id: MatchId },
    /// Unauthorized move undone.
    Corrected {
        match_id: MatchId,
        to: ZoneId,
    },
    /// Expected zone no longer exists; nothing to move back to.
    CorrectionSkipped { match_id: MatchId, missing: ZoneId },
    /// Corrective or revert move rejected by the platform.
    CorrectionFailed { match_id: MatchId, reason: String },
    /// Permitted move inside the match; ledger updated.
    Accepted { match_id: MatchId, zone: ZoneId },
    /// Permitted move out of the match; ledger left as it was.
    LeftMatch { match_id: MatchId },
    /// Participant disconnected; record retained.
    Disconnected { match_id: MatchId },
    /// Already where they are expected to be.
    NoChange,
}

impl ReconcileOutcome {
    /// `true` if the engine issued a move for this notification.
    pub fn moved_someone(&self) -> bool {
        matches!(
            self,
            ReconcileOutcome::Corrected { .. } | ReconcileOutcome::LockdownReverted { .. }
        )
    }

    pub fn is_suppressed(&self) -> bool {
        matches!(self, ReconcileOutcome::Suppressed)
    }

    pub fn label(&self) -> &'static str {
        match self {
            ReconcileOutcome::Suppressed => "suppressed",
            ReconcileOutcome::Untracked => "untracked",
            ReconcileOutcome::LockdownReverted { .. } => "lockdown_reverted",
            ReconcileOutcome::StaleRecordCleared { .. } => "stale_record_cleared",
            ReconcileOutcome::OwnerTracked { .. } => "owner_tracked",
            ReconcileOutcome::OwnerFailover { .. } => "owner_failover",
            ReconcileOutcome::Ownerless { .. } => "ownerless",
            ReconcileOutcome::Corrected { .. } => "corrected",
            ReconcileOutcome::CorrectionSkipped { .. } => "correction_skipped",
            ReconcileOutcome::CorrectionFailed { .. } => "correction_failed",
            ReconcileOutcome::Accepted { .. } => "accepted",
            ReconcileOutcome::LeftMatch { .. } => "left_match",
            ReconcileOutcome::Disconnected { .. } => "disconnected",
            ReconcileOutcome::NoChange => "no_change",
        }
    }
}
