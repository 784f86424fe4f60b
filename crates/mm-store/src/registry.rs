//! Match Registry: CRUD over match records and the zone -> match index.
//!
//! # Invariants
//!
//! - The zone index is a partial injective mapping: `create_match` refuses
//!   any zone already indexed, so two matches never share a zone.
//! - `update_match` is a plain read-modify-write. Mutations are rare and
//!   owner-serialized, so last writer wins.
//! - `delete_match` removes the match record *last*. A teardown interrupted
//!   half-way leaves the record in place and can simply be run again.

use std::sync::Arc;

use chrono::Utc;
use mm_schemas::{Match, MatchError, MatchId, MatchResult, NewMatch, ZoneId};
use tracing::debug;

use crate::keys::Keyspace;
use crate::ledger::ParticipantLedger;
use crate::store::{get_json, to_json, StateStore};

#[derive(Clone)]
pub struct MatchRegistry {
    store: Arc<dyn StateStore>,
    keys: Keyspace,
    ledger: ParticipantLedger,
}

impl MatchRegistry {
    pub fn new(store: Arc<dyn StateStore>, keys: Keyspace, ledger: ParticipantLedger) -> Self {
        Self {
            store,
            keys,
            ledger,
        }
    }

    pub async fn create_match(&self, new_match: NewMatch) -> MatchResult<MatchId> {
        new_match.zones.validate_distinct()?;
        if new_match.zones.contains(&new_match.group) {
            return Err(MatchError::invalid(format!(
                "grouping zone {} cannot also be an occupiable match zone",
                new_match.group
            )));
        }

        for zone in new_match.zones.all() {
            if let Some(owner) = self.store.get(&self.keys.zone_key(zone)).await? {
                return Err(MatchError::conflict(format!(
                    "zone {zone} already belongs to match {owner}"
                )));
            }
        }

        let m = Match::from_new(new_match, Utc::now());
        let match_key = self.keys.match_key(&m.id);
        if self.store.get(&match_key).await?.is_some() {
            return Err(MatchError::conflict(format!("match {} already exists", m.id)));
        }

        self.store.set(&match_key, to_json(&match_key, &m)?).await?;
        for zone in m.zones.all() {
            self.store
                .set(&self.keys.zone_key(zone), m.id.as_str().to_string())
                .await?;
        }

        debug!(match_id = %m.id, "match record created");
        Ok(m.id)
    }

    pub async fn find_match(&self, match_id: &MatchId) -> MatchResult<Option<Match>> {
        get_json(self.store.as_ref(), &self.keys.match_key(match_id)).await
    }

    pub async fn get_match(&self, match_id: &MatchId) -> MatchResult<Match> {
        self.find_match(match_id)
            .await?
            .ok_or_else(|| MatchError::not_found(format!("match {match_id}")))
    }

    /// Owning match id for `zone`, if the zone is tracked.
    pub async fn match_id_for_zone(&self, zone: &ZoneId) -> MatchResult<Option<MatchId>> {
        Ok(self
            .store
            .get(&self.keys.zone_key(zone))
            .await?
            .map(MatchId::new))
    }

    pub async fn get_match_by_zone(&self, zone: &ZoneId) -> MatchResult<Match> {
        let match_id = self
            .match_id_for_zone(zone)
            .await?
            .ok_or_else(|| MatchError::not_found(format!("no match owns zone {zone}")))?;
        self.get_match(&match_id).await
    }

    pub async fn find_match_by_zone(&self, zone: &ZoneId) -> MatchResult<Option<Match>> {
        match self.match_id_for_zone(zone).await? {
            Some(id) => self.find_match(&id).await,
            None => Ok(None),
        }
    }

    /// Read-modify-write. The mutator's error aborts without writing.
    pub async fn update_match<F, T>(&self, match_id: &MatchId, mutator: F) -> MatchResult<T>
    where
        F: FnOnce(&mut Match) -> MatchResult<T> + Send,
        T: Send,
    {
        let mut m = self.get_match(match_id).await?;
        let out = mutator(&mut m)?;
        let key = self.keys.match_key(match_id);
        self.store.set(&key, to_json(&key, &m)?).await?;
        Ok(out)
    }

    /// Remove participant records, index entries, approval slot, singleton
    /// claim and finally the match record. Returns the removed match.
    pub async fn delete_match(&self, match_id: &MatchId) -> MatchResult<Match> {
        let m = self.get_match(match_id).await?;

        for participant in m.enrolled_ids() {
            self.ledger.clear_if_in_match(&participant, match_id).await?;
        }

        for zone in m.zones.all() {
            let key = self.keys.zone_key(zone);
            if self.store.get(&key).await?.as_deref() == Some(match_id.as_str()) {
                self.store.delete(&key).await?;
            }
        }

        self.store.delete(&self.keys.approval_key(match_id)).await?;
        self.release_singleton(match_id).await?;
        self.store.delete(&self.keys.match_key(match_id)).await?;

        debug!(match_id = %match_id, "match record deleted");
        Ok(m)
    }

    // -----------------------------------------------------------------------
    // Single-match deployments
    // -----------------------------------------------------------------------

    /// Active match in a single-match deployment. A claim pointing at a
    /// match that no longer exists is treated as vacant.
    pub async fn singleton(&self) -> MatchResult<Option<MatchId>> {
        let Some(raw) = self.store.get(&self.keys.singleton_key()).await? else {
            return Ok(None);
        };
        let id = MatchId::new(raw);
        if self.find_match(&id).await?.is_some() {
            Ok(Some(id))
        } else {
            Ok(None)
        }
    }

    pub async fn claim_singleton(&self, match_id: &MatchId) -> MatchResult<()> {
        if let Some(active) = self.singleton().await? {
            if &active != match_id {
                return Err(MatchError::conflict(format!(
                    "match {active} is already running; end it first"
                )));
            }
        }
        self.store
            .set(&self.keys.singleton_key(), match_id.as_str().to_string())
            .await
    }

    async fn release_singleton(&self, match_id: &MatchId) -> MatchResult<()> {
        let key = self.keys.singleton_key();
        if self.store.get(&key).await?.as_deref() == Some(match_id.as_str()) {
            self.store.delete(&key).await?;
        }
        Ok(())
    }
}
