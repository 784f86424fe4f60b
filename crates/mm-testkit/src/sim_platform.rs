//! Deterministic in-memory platform.
//!
//! Design decisions (kept simple and deterministic):
//! - Zone ids are `z1`, `z2`, ... in creation order.
//! - Every membership change, whether issued through [`ZoneActuator`] or by
//!   a participant via [`SimPlatform::user_move`], produces a
//!   [`MembershipChange`]. Changes are queued for [`SimPlatform::take_changes`]
//!   unless a subscriber channel is attached, in which case they are sent
//!   there instead.
//! - Only actuator-issued moves are recorded in [`SimPlatform::moves`], so
//!   tests can count exactly what the service did.
//! - A participant who is not connected cannot be pulled into a zone; the
//!   move fails like it does on the real platform.
//! - Join permissions are recorded, not enforced: walk-ins into locked
//!   zones are possible so lockdown enforcement can be observed.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Mutex, MutexGuard};

use mm_actuator::{ActuatorError, Notifier, PresenceView, ZoneAccess, ZoneActuator};
use mm_schemas::{MatchId, MembershipChange, Occupant, ParticipantId, ZoneId};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc::UnboundedSender;

/// One actuator-issued move.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MoveRecord {
    pub participant: ParticipantId,
    pub from: Option<ZoneId>,
    pub to: Option<ZoneId>,
}

#[derive(Clone, Debug)]
struct SimZone {
    name: String,
    group: Option<ZoneId>,
    access: ZoneAccess,
}

#[derive(Clone, Debug)]
struct SimMember {
    is_bot: bool,
    zone: Option<ZoneId>,
}

#[derive(Default)]
struct SimState {
    next_zone: u64,
    zones: BTreeMap<ZoneId, SimZone>,
    members: BTreeMap<ParticipantId, SimMember>,
    moves: Vec<MoveRecord>,
    announcements: Vec<(MatchId, String)>,
    directs: Vec<(ParticipantId, String)>,
    failing_moves: BTreeSet<ParticipantId>,
    closed_inboxes: BTreeSet<ParticipantId>,
    pending: Vec<MembershipChange>,
    subscriber: Option<UnboundedSender<MembershipChange>>,
}

impl SimState {
    fn emit(&mut self, change: MembershipChange) {
        match &self.subscriber {
            Some(tx) => {
                // A closed receiver means nobody is listening any more.
                let _ = tx.send(change);
            }
            None => self.pending.push(change),
        }
    }

    fn relocate(&mut self, participant: &ParticipantId, to: Option<ZoneId>) -> Option<MembershipChange> {
        let member = self.members.get_mut(participant)?;
        let before = member.zone.clone();
        if before == to {
            return None;
        }
        member.zone = to.clone();
        let change = MembershipChange {
            participant_id: participant.clone(),
            before,
            after: to,
        };
        self.emit(change.clone());
        Some(change)
    }
}

#[derive(Default)]
pub struct SimPlatform {
    state: Mutex<SimState>,
}

impl SimPlatform {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, SimState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Route every future membership change to `tx` instead of the queue.
    pub fn subscribe(&self, tx: UnboundedSender<MembershipChange>) {
        self.lock().subscriber = Some(tx);
    }

    // -----------------------------------------------------------------------
    // Scenario setup
    // -----------------------------------------------------------------------

    /// Create a free-standing zone (not part of any match).
    pub fn add_zone(&self, name: &str) -> ZoneId {
        let mut st = self.lock();
        st.next_zone += 1;
        let id = ZoneId::new(format!("z{}", st.next_zone));
        st.zones.insert(
            id.clone(),
            SimZone {
                name: name.to_string(),
                group: None,
                access: ZoneAccess::Open,
            },
        );
        id
    }

    /// Register a member, optionally already connected to `zone`. Silent:
    /// no membership change is emitted.
    pub fn add_member(&self, id: &str, is_bot: bool, zone: Option<&ZoneId>) -> ParticipantId {
        let pid = ParticipantId::new(id);
        self.lock().members.insert(
            pid.clone(),
            SimMember {
                is_bot,
                zone: zone.cloned(),
            },
        );
        pid
    }

    /// A participant moving themselves through the platform's own UI.
    pub fn user_move(&self, participant: &ParticipantId, to: Option<&ZoneId>) -> Option<MembershipChange> {
        self.lock().relocate(participant, to.cloned())
    }

    /// Make every actuator move of `participant` fail.
    pub fn fail_moves_for(&self, participant: &ParticipantId) {
        self.lock().failing_moves.insert(participant.clone());
    }

    /// Make private messages to `participant` fail.
    pub fn close_inbox(&self, participant: &ParticipantId) {
        self.lock().closed_inboxes.insert(participant.clone());
    }

    /// Delete a zone behind the service's back.
    pub fn remove_zone(&self, zone: &ZoneId) {
        let mut st = self.lock();
        st.zones.remove(zone);
        let inside: Vec<ParticipantId> = st
            .members
            .iter()
            .filter(|(_, m)| m.zone.as_ref() == Some(zone))
            .map(|(id, _)| id.clone())
            .collect();
        for id in inside {
            st.relocate(&id, None);
        }
    }

    // -----------------------------------------------------------------------
    // Inspection
    // -----------------------------------------------------------------------

    pub fn take_changes(&self) -> Vec<MembershipChange> {
        std::mem::take(&mut self.lock().pending)
    }

    pub fn moves(&self) -> Vec<MoveRecord> {
        self.lock().moves.clone()
    }

    pub fn moves_of(&self, participant: &ParticipantId) -> Vec<MoveRecord> {
        self.lock()
            .moves
            .iter()
            .filter(|m| &m.participant == participant)
            .cloned()
            .collect()
    }

    pub fn zone_of(&self, participant: &ParticipantId) -> Option<ZoneId> {
        self.lock().members.get(participant).and_then(|m| m.zone.clone())
    }

    pub fn has_zone(&self, zone: &ZoneId) -> bool {
        self.lock().zones.contains_key(zone)
    }

    pub fn zone_count(&self) -> usize {
        self.lock().zones.len()
    }

    pub fn zone_name(&self, zone: &ZoneId) -> Option<String> {
        self.lock().zones.get(zone).map(|z| z.name.clone())
    }

    pub fn zone_group(&self, zone: &ZoneId) -> Option<ZoneId> {
        self.lock().zones.get(zone).and_then(|z| z.group.clone())
    }

    pub fn zone_access(&self, zone: &ZoneId) -> Option<ZoneAccess> {
        self.lock().zones.get(zone).map(|z| z.access)
    }

    pub fn announcements(&self) -> Vec<(MatchId, String)> {
        self.lock().announcements.clone()
    }

    pub fn directs(&self) -> Vec<(ParticipantId, String)> {
        self.lock().directs.clone()
    }

    pub fn directs_to(&self, participant: &ParticipantId) -> Vec<String> {
        self.lock()
            .directs
            .iter()
            .filter(|(p, _)| p == participant)
            .map(|(_, m)| m.clone())
            .collect()
    }
}

// ---------------------------------------------------------------------------
// Boundary trait implementations
// ---------------------------------------------------------------------------

#[async_trait::async_trait]
impl ZoneActuator for SimPlatform {
    async fn create_zone(&self, name: &str, group: Option<&ZoneId>) -> Result<ZoneId, ActuatorError> {
        let mut st = self.lock();
        if let Some(g) = group {
            if !st.zones.contains_key(g) {
                return Err(ActuatorError::NotFound(format!("group zone {g}")));
            }
        }
        st.next_zone += 1;
        let id = ZoneId::new(format!("z{}", st.next_zone));
        st.zones.insert(
            id.clone(),
            SimZone {
                name: name.to_string(),
                group: group.cloned(),
                access: ZoneAccess::Open,
            },
        );
        Ok(id)
    }

    async fn delete_zone(&self, zone: &ZoneId) -> Result<(), ActuatorError> {
        if !self.has_zone(zone) {
            return Err(ActuatorError::NotFound(format!("zone {zone}")));
        }
        self.remove_zone(zone);
        Ok(())
    }

    async fn move_participant(
        &self,
        participant: &ParticipantId,
        zone: Option<&ZoneId>,
    ) -> Result<(), ActuatorError> {
        let mut st = self.lock();
        if st.failing_moves.contains(participant) {
            return Err(ActuatorError::Failed(format!("move of {participant} rejected")));
        }
        let Some(member) = st.members.get(participant) else {
            return Err(ActuatorError::NotFound(format!("participant {participant}")));
        };
        if let Some(z) = zone {
            if !st.zones.contains_key(z) {
                return Err(ActuatorError::NotFound(format!("zone {z}")));
            }
            if member.zone.is_none() {
                return Err(ActuatorError::Failed(format!(
                    "participant {participant} is not connected"
                )));
            }
        }
        let from = member.zone.clone();
        st.moves.push(MoveRecord {
            participant: participant.clone(),
            from,
            to: zone.cloned(),
        });
        st.relocate(participant, zone.cloned());
        Ok(())
    }

    async fn set_zone_access(&self, zone: &ZoneId, access: ZoneAccess) -> Result<(), ActuatorError> {
        let mut st = self.lock();
        let z = st
            .zones
            .get_mut(zone)
            .ok_or_else(|| ActuatorError::NotFound(format!("zone {zone}")))?;
        z.access = access;
        Ok(())
    }
}

#[async_trait::async_trait]
impl PresenceView for SimPlatform {
    async fn current_zone(&self, participant: &ParticipantId) -> Option<ZoneId> {
        self.zone_of(participant)
    }

    async fn occupants(&self, zone: &ZoneId) -> Vec<Occupant> {
        self.lock()
            .members
            .iter()
            .filter(|(_, m)| m.zone.as_ref() == Some(zone))
            .map(|(id, m)| Occupant {
                id: id.clone(),
                is_bot: m.is_bot,
            })
            .collect()
    }

    async fn zone_exists(&self, zone: &ZoneId) -> bool {
        self.has_zone(zone)
    }

    async fn member(&self, participant: &ParticipantId) -> Option<Occupant> {
        self.lock().members.get(participant).map(|m| Occupant {
            id: participant.clone(),
            is_bot: m.is_bot,
        })
    }
}

#[async_trait::async_trait]
impl Notifier for SimPlatform {
    async fn announce(&self, match_id: &MatchId, message: &str) -> Result<(), ActuatorError> {
        self.lock()
            .announcements
            .push((match_id.clone(), message.to_string()));
        Ok(())
    }

    async fn direct(&self, participant: &ParticipantId, message: &str) -> Result<(), ActuatorError> {
        let mut st = self.lock();
        if st.closed_inboxes.contains(participant) {
            return Err(ActuatorError::PermissionDenied(format!(
                "{participant} does not accept private messages"
            )));
        }
        st.directs.push((participant.clone(), message.to_string()));
        Ok(())
    }
}
