use std::time::Duration;

use chrono::{DateTime, Utc};
use mm_schemas::{ApprovalToken, MatchId, MovePolicy, ParticipantId, ZoneId, ZoneSet};
use serde::{Deserialize, Serialize};

/// Who is issuing a command.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Caller {
    pub id: ParticipantId,
    /// Holds the platform's zone-management privilege.
    #[serde(default)]
    pub can_manage: bool,
}

impl Caller {
    pub fn new(id: impl Into<ParticipantId>) -> Self {
        Self {
            id: id.into(),
            can_manage: false,
        }
    }

    pub fn manager(id: impl Into<ParticipantId>) -> Self {
        Self {
            id: id.into(),
            can_manage: true,
        }
    }
}

/// Deployment-level knobs for the controller.
#[derive(Clone, Debug)]
pub struct PlacementSettings {
    /// Refuse to start a second match while one is running.
    pub single_match: bool,
    /// Create a spectator zone even when no spectators are named.
    pub spectator_zone: bool,
    pub name_prefix: String,
    /// How long before expiry the timer posts its warning.
    pub warning_lead: Duration,
}

impl Default for PlacementSettings {
    fn default() -> Self {
        Self {
            single_match: false,
            spectator_zone: false,
            name_prefix: "Match".to_string(),
            warning_lead: Duration::from_secs(300),
        }
    }
}

/// Arguments to `start`.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct StartRequest {
    pub team_a: Vec<ParticipantId>,
    pub team_b: Vec<ParticipantId>,
    pub spectators: Vec<ParticipantId>,
    /// Split the caller's current zone into this many teams instead of
    /// using explicit rosters. Only `2` is supported.
    pub random_teams: Option<u32>,
    pub participant_policy: Option<MovePolicy>,
    pub spectator_policy: Option<MovePolicy>,
    /// Overrides [`PlacementSettings::spectator_zone`].
    pub spectator_zone: Option<bool>,
}

#[derive(Clone, Debug, Serialize)]
pub struct StartedMatch {
    pub match_id: MatchId,
    pub name: String,
    pub zones: ZoneSet,
    pub team_a: Vec<ParticipantId>,
    pub team_b: Vec<ParticipantId>,
    pub spectators: Vec<ParticipantId>,
    /// Roster members whose initial move failed; their records still exist.
    pub unplaced: Vec<ParticipantId>,
}

#[derive(Clone, Debug, Serialize)]
pub struct ZoneOccupancy {
    pub label: &'static str,
    pub zone: ZoneId,
    pub occupants: Vec<ParticipantId>,
}

#[derive(Clone, Debug, Serialize)]
pub struct MatchStatus {
    pub match_id: MatchId,
    pub owner_id: Option<ParticipantId>,
    pub participant_policy: MovePolicy,
    pub spectator_policy: MovePolicy,
    pub locked: bool,
    pub created_at: DateTime<Utc>,
    pub elapsed_minutes: i64,
    pub zones: Vec<ZoneOccupancy>,
    pub timer_ends_at: Option<DateTime<Utc>>,
}

/// Result of a teardown. Per-entry failures are collected, never raised.
#[derive(Clone, Debug, Default, Serialize)]
pub struct TeardownReport {
    pub match_id: MatchId,
    /// Moved back to (or already in) their original zone.
    pub restored: Vec<ParticipantId>,
    /// Original placement was "none"; left where they are.
    pub untouched: Vec<ParticipantId>,
    pub failures: Vec<String>,
}

impl TeardownReport {
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

#[derive(Clone, Debug, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum EndOutcome {
    Ended(TeardownReport),
    AwaitingApproval(ApprovalToken),
}

#[derive(Clone, Debug, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ResolveOutcome {
    Ended(TeardownReport),
    Denied,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct TimerInfo {
    pub match_id: MatchId,
    pub ends_at: DateTime<Utc>,
    pub auto_end: bool,
}
