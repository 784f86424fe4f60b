//! Request and response types for all mm-daemon HTTP endpoints.
//!
//! Every command body carries the issuing `caller`. Roles and policies
//! travel as strings and are parsed by the handlers, so a malformed value
//! is reported as `invalid_argument` rather than a JSON rejection.

use mm_placement::{Caller, StartRequest};
use mm_schemas::{ParticipantId, PlacementRecord, ZoneId};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ---------------------------------------------------------------------------
// /v1/health
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub ok: bool,
    pub service: String,
    pub version: String,
    pub config_hash: Option<String>,
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    /// Stable error kind: "not_found" | "permission_denied" | "conflict" |
    /// "invalid_argument" | "actuator_failure" | "storage"
    pub kind: String,
}

// ---------------------------------------------------------------------------
// /v1/matches
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StartMatchBody {
    pub caller: Caller,
    #[serde(flatten)]
    pub request: StartRequest,
}

/// Body for commands that need nothing but the caller (lock, unlock, end,
/// timer stop).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CallerBody {
    pub caller: Caller,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MoveBody {
    pub caller: Caller,
    pub participant: ParticipantId,
    pub role: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SelfMoveBody {
    pub caller: Caller,
    pub role: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SwapBody {
    pub caller: Caller,
    pub first: ParticipantId,
    pub second: ParticipantId,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SwapResponse {
    pub first: PlacementRecord,
    pub second: PlacementRecord,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PolicyBody {
    pub caller: Caller,
    #[serde(default)]
    pub participants: Option<String>,
    #[serde(default)]
    pub spectators: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransferBody {
    pub caller: Caller,
    pub target: ParticipantId,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResolveBody {
    pub caller: Caller,
    pub token_id: Uuid,
    pub approve: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimerBody {
    pub caller: Caller,
    /// `90s`, `20m`, `1h`, `2d`
    pub duration: String,
    #[serde(default)]
    pub auto_end: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimerStopped {
    pub stopped: bool,
}

// ---------------------------------------------------------------------------
// /v1/sim: simulated platform controls
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimZoneBody {
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimZoneResponse {
    pub zone_id: ZoneId,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimMemberBody {
    pub id: String,
    #[serde(default)]
    pub is_bot: bool,
    #[serde(default)]
    pub zone: Option<ZoneId>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimMemberResponse {
    pub participant_id: ParticipantId,
}

/// A participant moving on their own. `zone = null` disconnects them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimMoveBody {
    pub participant: ParticipantId,
    #[serde(default)]
    pub zone: Option<ZoneId>,
}
