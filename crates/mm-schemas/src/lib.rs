//! mm-schemas
//!
//! Persisted state model for managed matches: identifiers, the match record,
//! per-participant placement records and the membership-change notification
//! delivered by the platform.
//!
//! # Invariants
//!
//! - Zone ids within one [`ZoneSet`] are pairwise distinct
//!   ([`ZoneSet::validate_distinct`]).
//! - A participant belongs to at most one active match; the placement record
//!   names that match.
//! - `original_placement` entries are written once, when a participant is
//!   first enrolled, and never overwritten afterwards.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

mod error;

pub use error::{MatchError, MatchResult};

// ---------------------------------------------------------------------------
// Identifiers
// ---------------------------------------------------------------------------

macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub String);

        impl $name {
            pub fn new(s: impl Into<String>) -> Self {
                Self(s.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                Self(s.to_string())
            }
        }

        impl From<String> for $name {
            fn from(s: String) -> Self {
                Self(s)
            }
        }
    };
}

string_id!(
    /// Platform-wide participant (member) identity.
    ParticipantId
);

string_id!(
    /// A room participants can physically occupy, or a grouping zone.
    ZoneId
);

string_id!(
    /// Stable match identity, derived from the match's grouping zone.
    MatchId
);

impl MatchId {
    pub fn from_group(group: &ZoneId) -> Self {
        Self(group.0.clone())
    }
}

// ---------------------------------------------------------------------------
// Policy / role
// ---------------------------------------------------------------------------

/// Whether members of a role may relocate themselves.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MovePolicy {
    Allow,
    Deny,
}

impl MovePolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            MovePolicy::Allow => "allow",
            MovePolicy::Deny => "deny",
        }
    }

    pub fn is_allowed(&self) -> bool {
        matches!(self, MovePolicy::Allow)
    }
}

impl FromStr for MovePolicy {
    type Err = MatchError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "allow" => Ok(MovePolicy::Allow),
            "deny" => Ok(MovePolicy::Deny),
            other => Err(MatchError::invalid(format!(
                "invalid move policy '{other}'. expected one of: allow | deny"
            ))),
        }
    }
}

/// A participant's assigned category within a match.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    TeamA,
    TeamB,
    Spectator,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::TeamA => "team_a",
            Role::TeamB => "team_b",
            Role::Spectator => "spectator",
        }
    }

    pub fn is_spectator(&self) -> bool {
        matches!(self, Role::Spectator)
    }
}

impl FromStr for Role {
    type Err = MatchError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "team_a" | "team-a" | "team1" | "a" => Ok(Role::TeamA),
            "team_b" | "team-b" | "team2" | "b" => Ok(Role::TeamB),
            "spectator" | "spectators" => Ok(Role::Spectator),
            other => Err(MatchError::invalid(format!(
                "invalid role '{other}'. expected one of: team_a | team_b | spectator"
            ))),
        }
    }
}

// ---------------------------------------------------------------------------
// Zone set
// ---------------------------------------------------------------------------

/// The occupiable zones owned by one match.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ZoneSet {
    pub lobby: ZoneId,
    pub team_a: ZoneId,
    pub team_b: ZoneId,
    pub spectator: Option<ZoneId>,
}

impl ZoneSet {
    /// Lobby, team A, team B, then spectator (if any).
    pub fn all(&self) -> Vec<&ZoneId> {
        let mut out = vec![&self.lobby, &self.team_a, &self.team_b];
        if let Some(s) = &self.spectator {
            out.push(s);
        }
        out
    }

    pub fn contains(&self, zone: &ZoneId) -> bool {
        self.all().into_iter().any(|z| z == zone)
    }

    /// Zone a role is assigned to. `None` only for spectators without a
    /// spectator zone.
    pub fn zone_for(&self, role: Role) -> Option<&ZoneId> {
        match role {
            Role::TeamA => Some(&self.team_a),
            Role::TeamB => Some(&self.team_b),
            Role::Spectator => self.spectator.as_ref(),
        }
    }

    /// Role whose assigned zone is `zone`. The lobby maps to no role.
    pub fn role_of(&self, zone: &ZoneId) -> Option<Role> {
        if zone == &self.team_a {
            Some(Role::TeamA)
        } else if zone == &self.team_b {
            Some(Role::TeamB)
        } else if self.spectator.as_ref() == Some(zone) {
            Some(Role::Spectator)
        } else {
            None
        }
    }

    pub fn validate_distinct(&self) -> MatchResult<()> {
        let zones = self.all();
        for (i, a) in zones.iter().enumerate() {
            if zones[i + 1..].contains(a) {
                return Err(MatchError::invalid(format!(
                    "zone {a} appears more than once in the match zone set"
                )));
            }
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Match record
// ---------------------------------------------------------------------------

/// Input to `create_match`.
#[derive(Clone, Debug)]
pub struct NewMatch {
    pub owner_id: ParticipantId,
    pub group: ZoneId,
    pub zones: ZoneSet,
    pub participant_move_policy: MovePolicy,
    pub spectator_move_policy: MovePolicy,
    pub original_placement: BTreeMap<ParticipantId, Option<ZoneId>>,
}

/// One managed team session. Source of truth for policy and
/// roster-independent config.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Match {
    pub id: MatchId,
    /// `None` after a failover that found nobody to promote.
    pub owner_id: Option<ParticipantId>,
    pub created_at: DateTime<Utc>,
    /// Grouping zone the occupiable zones live under.
    pub group: ZoneId,
    pub zones: ZoneSet,
    pub participant_move_policy: MovePolicy,
    pub spectator_move_policy: MovePolicy,
    pub locked: bool,
    /// participant -> zone occupied before enrolment (`None` = not connected).
    pub original_placement: BTreeMap<ParticipantId, Option<ZoneId>>,
}

impl Match {
    pub fn from_new(new_match: NewMatch, created_at: DateTime<Utc>) -> Self {
        Self {
            id: MatchId::from_group(&new_match.group),
            owner_id: Some(new_match.owner_id),
            created_at,
            group: new_match.group,
            zones: new_match.zones,
            participant_move_policy: new_match.participant_move_policy,
            spectator_move_policy: new_match.spectator_move_policy,
            locked: false,
            original_placement: new_match.original_placement,
        }
    }

    pub fn is_owner(&self, participant: &ParticipantId) -> bool {
        self.owner_id.as_ref() == Some(participant)
    }

    pub fn policy_for(&self, role: Role) -> MovePolicy {
        if role.is_spectator() {
            self.spectator_move_policy
        } else {
            self.participant_move_policy
        }
    }

    pub fn contains_zone(&self, zone: &ZoneId) -> bool {
        self.zones.contains(zone)
    }

    /// Record the pre-enrolment zone of `participant` unless one is already
    /// recorded. Returns `true` if a new entry was written.
    pub fn remember_original(&mut self, participant: &ParticipantId, zone: Option<ZoneId>) -> bool {
        if self.original_placement.contains_key(participant) {
            return false;
        }
        self.original_placement.insert(participant.clone(), zone);
        true
    }

    /// Every participant id this match may hold a ledger record for.
    pub fn enrolled_ids(&self) -> Vec<ParticipantId> {
        let mut ids: Vec<ParticipantId> = self.original_placement.keys().cloned().collect();
        if let Some(owner) = &self.owner_id {
            if !ids.contains(owner) {
                ids.push(owner.clone());
            }
        }
        ids
    }
}

// ---------------------------------------------------------------------------
// Participant placement record
// ---------------------------------------------------------------------------

/// Per-participant expected placement. Source of truth for where the
/// participant should physically be.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlacementRecord {
    pub participant_id: ParticipantId,
    pub match_id: MatchId,
    pub expected_zone: ZoneId,
    pub role: Role,
}

// ---------------------------------------------------------------------------
// Platform-facing shapes
// ---------------------------------------------------------------------------

/// A platform-wide zone membership change (`None` = not connected).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MembershipChange {
    pub participant_id: ParticipantId,
    pub before: Option<ZoneId>,
    pub after: Option<ZoneId>,
}

impl MembershipChange {
    pub fn new(
        participant_id: impl Into<ParticipantId>,
        before: Option<ZoneId>,
        after: Option<ZoneId>,
    ) -> Self {
        Self {
            participant_id: participant_id.into(),
            before,
            after,
        }
    }
}

/// Someone physically present in a zone.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Occupant {
    pub id: ParticipantId,
    pub is_bot: bool,
}

/// Pending request by a non-owner to end a match.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApprovalToken {
    pub token_id: Uuid,
    pub match_id: MatchId,
    pub owner_id: ParticipantId,
    pub requester_id: ParticipantId,
    pub requested_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
