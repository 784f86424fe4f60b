//! mm-actuator
//!
//! Boundary to the host platform. Three narrow traits:
//!
//! - [`ZoneActuator`]: create/delete zones, move participants, tighten or
//!   loosen join permissions.
//! - [`PresenceView`]: read-only view of who is physically where.
//! - [`Notifier`]: announcements to a match's notification channel and
//!   private messages.
//!
//! Implementations must be `Send + Sync` and object-safe; the engine and the
//! controller hold them as `Arc<dyn ...>`. No platform client lives in this
//! workspace; the simulated platform in `mm-testkit` implements all three.

use std::sync::Arc;

use mm_schemas::{MatchError, MatchId, Occupant, ParticipantId, ZoneId};
use serde::{Deserialize, Serialize};
use thiserror::Error;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Failure reported by a platform call.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ActuatorError {
    #[error("platform refused: {0}")]
    PermissionDenied(String),

    #[error("platform object missing: {0}")]
    NotFound(String),

    #[error("platform call failed: {0}")]
    Failed(String),
}

impl From<ActuatorError> for MatchError {
    fn from(e: ActuatorError) -> Self {
        MatchError::ActuatorFailure(e.to_string())
    }
}

// ---------------------------------------------------------------------------
// Zone access
// ---------------------------------------------------------------------------

/// Join permission applied to a zone.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ZoneAccess {
    /// Inherit the grouping zone's permissions.
    Open,
    /// Ordinary members may not join.
    Locked,
}

// ---------------------------------------------------------------------------
// Traits
// ---------------------------------------------------------------------------

#[async_trait::async_trait]
pub trait ZoneActuator: Send + Sync {
    /// Create a zone. `group = None` creates a grouping zone.
    async fn create_zone(&self, name: &str, group: Option<&ZoneId>) -> Result<ZoneId, ActuatorError>;

    async fn delete_zone(&self, zone: &ZoneId) -> Result<(), ActuatorError>;

    /// Move a participant; `None` disconnects them.
    async fn move_participant(
        &self,
        participant: &ParticipantId,
        zone: Option<&ZoneId>,
    ) -> Result<(), ActuatorError>;

    async fn set_zone_access(&self, zone: &ZoneId, access: ZoneAccess) -> Result<(), ActuatorError>;
}

#[async_trait::async_trait]
pub trait PresenceView: Send + Sync {
    /// Zone the participant currently occupies, `None` if not connected or
    /// unknown.
    async fn current_zone(&self, participant: &ParticipantId) -> Option<ZoneId>;

    async fn occupants(&self, zone: &ZoneId) -> Vec<Occupant>;

    async fn zone_exists(&self, zone: &ZoneId) -> bool;

    /// `None` if the participant is not a member of the space at all.
    async fn member(&self, participant: &ParticipantId) -> Option<Occupant>;
}

#[async_trait::async_trait]
pub trait Notifier: Send + Sync {
    /// Post to the match's notification channel.
    async fn announce(&self, match_id: &MatchId, message: &str) -> Result<(), ActuatorError>;

    /// Private message to one participant.
    async fn direct(&self, participant: &ParticipantId, message: &str) -> Result<(), ActuatorError>;
}

// ---------------------------------------------------------------------------
// Platform bundle
// ---------------------------------------------------------------------------

/// The three boundary handles, cloned cheaply into every component.
#[derive(Clone)]
pub struct Platform {
    pub zones: Arc<dyn ZoneActuator>,
    pub presence: Arc<dyn PresenceView>,
    pub notifier: Arc<dyn Notifier>,
}

impl Platform {
    pub fn new(
        zones: Arc<dyn ZoneActuator>,
        presence: Arc<dyn PresenceView>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            zones,
            presence,
            notifier,
        }
    }

    /// Non-bot occupants across `zones`, in zone order.
    pub async fn humans_in(&self, zones: &[&ZoneId]) -> Vec<ParticipantId> {
        let mut out = Vec::new();
        for zone in zones {
            for o in self.presence.occupants(zone).await {
                if !o.is_bot && !out.contains(&o.id) {
                    out.push(o.id);
                }
            }
        }
        out
    }
}
