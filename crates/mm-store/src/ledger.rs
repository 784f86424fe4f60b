//! Participant Ledger: expected placement per participant.
//!
//! The ledger keeps no reverse index from match to participants; teardown
//! enumerates ids from the match's original-placement map.

use std::sync::Arc;

use mm_schemas::{MatchError, MatchId, MatchResult, ParticipantId, PlacementRecord, Role, ZoneId};

use crate::keys::Keyspace;
use crate::store::{get_json, to_json, StateStore};

#[derive(Clone)]
pub struct ParticipantLedger {
    store: Arc<dyn StateStore>,
    keys: Keyspace,
}

impl ParticipantLedger {
    pub fn new(store: Arc<dyn StateStore>, keys: Keyspace) -> Self {
        Self { store, keys }
    }

    pub async fn set_participant(
        &self,
        participant: &ParticipantId,
        match_id: &MatchId,
        zone: &ZoneId,
        role: Role,
    ) -> MatchResult<PlacementRecord> {
        let record = PlacementRecord {
            participant_id: participant.clone(),
            match_id: match_id.clone(),
            expected_zone: zone.clone(),
            role,
        };
        self.put(&record).await?;
        Ok(record)
    }

    /// Overwrite a record as-is.
    pub async fn put(&self, record: &PlacementRecord) -> MatchResult<()> {
        let key = self.keys.participant_key(&record.participant_id);
        let raw = to_json(&key, record)?;
        self.store.set(&key, raw).await
    }

    pub async fn find_participant(
        &self,
        participant: &ParticipantId,
    ) -> MatchResult<Option<PlacementRecord>> {
        get_json(self.store.as_ref(), &self.keys.participant_key(participant)).await
    }

    pub async fn get_participant(&self, participant: &ParticipantId) -> MatchResult<PlacementRecord> {
        self.find_participant(participant)
            .await?
            .ok_or_else(|| MatchError::not_found(format!("participant {participant}")))
    }

    pub async fn clear_participant(&self, participant: &ParticipantId) -> MatchResult<()> {
        self.store
            .delete(&self.keys.participant_key(participant))
            .await
    }

    /// Clear the record only if it still belongs to `match_id`. Returns
    /// whether a record was removed.
    pub async fn clear_if_in_match(
        &self,
        participant: &ParticipantId,
        match_id: &MatchId,
    ) -> MatchResult<bool> {
        match self.find_participant(participant).await? {
            Some(rec) if &rec.match_id == match_id => {
                self.clear_participant(participant).await?;
                Ok(true)
            }
            _ => Ok(false),
        }
    }
}
