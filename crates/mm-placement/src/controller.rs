use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use chrono::Utc;
use mm_actuator::{Platform, ZoneAccess};
use mm_reconcile::{assign_owner, shuffle, RandomSource, ThreadRandom};
use mm_schemas::{
    Match, MatchError, MatchId, MatchResult, MovePolicy, NewMatch, ParticipantId, PlacementRecord,
    Role, ZoneId, ZoneSet,
};
use mm_store::Stores;
use tracing::{info, warn};

use crate::timer::TimerRegistry;
use crate::types::{
    Caller, MatchStatus, PlacementSettings, StartRequest, StartedMatch, ZoneOccupancy,
};

/// One-shot match lifecycle commands. Every mutation goes through the
/// store-backed registry and ledger; every move it issues is suppressed
/// first so the reconciliation engine ignores it.
#[derive(Clone)]
pub struct PlacementController {
    pub(crate) stores: Stores,
    pub(crate) platform: Platform,
    pub(crate) random: Arc<dyn RandomSource>,
    pub(crate) settings: Arc<PlacementSettings>,
    pub(crate) timers: Arc<TimerRegistry>,
}

impl PlacementController {
    pub fn new(stores: Stores, platform: Platform, settings: PlacementSettings) -> Self {
        Self::with_random(stores, platform, settings, Arc::new(ThreadRandom))
    }

    pub fn with_random(
        stores: Stores,
        platform: Platform,
        settings: PlacementSettings,
        random: Arc<dyn RandomSource>,
    ) -> Self {
        Self {
            stores,
            platform,
            random,
            settings: Arc::new(settings),
            timers: Arc::new(TimerRegistry::default()),
        }
    }

    pub fn settings(&self) -> &PlacementSettings {
        &self.settings
    }

    // -----------------------------------------------------------------------
    // Shared helpers
    // -----------------------------------------------------------------------

    /// Owner-only gate. An ownerless match accepts any caller holding the
    /// management privilege.
    pub(crate) fn authorize_owner(&self, m: &Match, caller: &Caller) -> MatchResult<()> {
        if m.is_owner(&caller.id) {
            return Ok(());
        }
        if m.owner_id.is_none() && caller.can_manage {
            return Ok(());
        }
        Err(MatchError::permission_denied(format!(
            "only the owner of match {} may do this",
            m.id
        )))
    }

    pub(crate) async fn suppressed_move(
        &self,
        participant: &ParticipantId,
        zone: Option<&ZoneId>,
    ) -> MatchResult<()> {
        self.stores.suppression.suppress(participant).await?;
        self.platform
            .zones
            .move_participant(participant, zone)
            .await
            .map_err(MatchError::from)
    }

    /// Refuse participants whose record belongs to another live match.
    async fn ensure_free(&self, participant: &ParticipantId, this: Option<&MatchId>) -> MatchResult<()> {
        let Some(rec) = self.stores.ledger.find_participant(participant).await? else {
            return Ok(());
        };
        if Some(&rec.match_id) == this {
            return Ok(());
        }
        if self.stores.registry.find_match(&rec.match_id).await?.is_some() {
            return Err(MatchError::conflict(format!(
                "participant {participant} already belongs to match {}",
                rec.match_id
            )));
        }
        Ok(())
    }

    async fn discard_zones(&self, created: &[ZoneId]) {
        for zone in created.iter().rev() {
            if let Err(e) = self.platform.zones.delete_zone(zone).await {
                warn!(zone = %zone, error = %e, "cleanup of half-created zone failed");
            }
        }
    }

    async fn announce(&self, match_id: &MatchId, message: &str) {
        if let Err(e) = self.platform.notifier.announce(match_id, message).await {
            warn!(match_id = %match_id, error = %e, "announcement not delivered");
        }
    }

    // -----------------------------------------------------------------------
    // Start
    // -----------------------------------------------------------------------

    pub async fn start(&self, caller: &Caller, req: StartRequest) -> MatchResult<StartedMatch> {
        if !caller.can_manage {
            return Err(MatchError::permission_denied(
                "starting a match requires the zone-management privilege",
            ));
        }
        if self.settings.single_match {
            if let Some(active) = self.stores.registry.singleton().await? {
                return Err(MatchError::conflict(format!(
                    "match {active} is already running; end it first"
                )));
            }
        }

        let (team_a, team_b, spectators) = self.resolve_rosters(caller, &req).await?;
        let want_spectator_zone = !spectators.is_empty()
            || req.spectator_zone.unwrap_or(self.settings.spectator_zone);

        let mut everyone: Vec<&ParticipantId> = team_a.iter().chain(&team_b).chain(&spectators).collect();
        if !everyone.contains(&&caller.id) {
            everyone.push(&caller.id);
        }
        for pid in &everyone {
            self.ensure_free(pid, None).await?;
        }

        let mut original_placement: BTreeMap<ParticipantId, Option<ZoneId>> = BTreeMap::new();
        for pid in &everyone {
            let zone = self.platform.presence.current_zone(pid).await;
            original_placement.insert((*pid).clone(), zone);
        }

        let name = format!("{}-{}", self.settings.name_prefix, 1000 + self.random.pick(9000));
        let (group, zones) = self.create_zones(&name, want_spectator_zone).await?;
        let mut created: Vec<ZoneId> = vec![group.clone()];
        created.extend(zones.all().into_iter().cloned());

        let new_match = NewMatch {
            owner_id: caller.id.clone(),
            group: group.clone(),
            zones: zones.clone(),
            participant_move_policy: req.participant_policy.unwrap_or(MovePolicy::Deny),
            spectator_move_policy: req.spectator_policy.unwrap_or(MovePolicy::Allow),
            original_placement,
        };
        let match_id = match self.stores.registry.create_match(new_match).await {
            Ok(id) => id,
            Err(e) => {
                self.discard_zones(&created).await;
                return Err(e);
            }
        };
        if self.settings.single_match {
            if let Err(e) = self.stores.registry.claim_singleton(&match_id).await {
                if let Err(del) = self.stores.registry.delete_match(&match_id).await {
                    warn!(match_id = %match_id, error = %del, "rollback of match record failed");
                }
                self.discard_zones(&created).await;
                return Err(e);
            }
        }

        let mut unplaced = Vec::new();
        let assignments = team_a
            .iter()
            .map(|p| (p, Role::TeamA))
            .chain(team_b.iter().map(|p| (p, Role::TeamB)))
            .chain(spectators.iter().map(|p| (p, Role::Spectator)));
        for (pid, role) in assignments {
            let zone = zones.zone_for(role).unwrap_or(&zones.lobby);
            self.stores
                .ledger
                .set_participant(pid, &match_id, zone, role)
                .await?;
            if let Err(e) = self.suppressed_move(pid, Some(zone)).await {
                warn!(match_id = %match_id, participant = %pid, error = %e, "initial placement failed");
                unplaced.push(pid.clone());
            }
        }
        let on_roster = team_a.iter().chain(&team_b).chain(&spectators).any(|p| p == &caller.id);
        if !on_roster {
            self.stores
                .ledger
                .set_participant(&caller.id, &match_id, &zones.lobby, Role::Spectator)
                .await?;
        }

        info!(
            match_id = %match_id,
            owner = %caller.id,
            team_a = team_a.len(),
            team_b = team_b.len(),
            spectators = spectators.len(),
            unplaced = unplaced.len(),
            "match started"
        );
        self.announce(
            &match_id,
            &format!("Match {name} started by {}.", caller.id),
        )
        .await;

        Ok(StartedMatch {
            match_id,
            name,
            zones,
            team_a,
            team_b,
            spectators,
            unplaced,
        })
    }

    async fn resolve_rosters(
        &self,
        caller: &Caller,
        req: &StartRequest,
    ) -> MatchResult<(Vec<ParticipantId>, Vec<ParticipantId>, Vec<ParticipantId>)> {
        if let Some(n) = req.random_teams {
            if n != 2 {
                return Err(MatchError::invalid(format!(
                    "random_teams supports only 2 teams, got {n}"
                )));
            }
            let Some(zone) = self.platform.presence.current_zone(&caller.id).await else {
                return Err(MatchError::invalid(
                    "random_teams requires the caller to be in a zone",
                ));
            };
            let mut humans = self.platform.humans_in(&[&zone]).await;
            shuffle(self.random.as_ref(), &mut humans);
            let mid = (humans.len() + 1) / 2;
            let team_b = humans.split_off(mid);
            return Ok((humans, team_b, Vec::new()));
        }

        if req.team_a.is_empty() && req.team_b.is_empty() {
            return Err(MatchError::invalid(
                "name team_a and team_b members, or use random_teams",
            ));
        }

        let mut seen = BTreeSet::new();
        let mut filtered = Vec::with_capacity(3);
        for list in [&req.team_a, &req.team_b, &req.spectators] {
            let mut out = Vec::new();
            for pid in list {
                if !seen.insert(pid.clone()) {
                    continue;
                }
                match self.platform.presence.member(pid).await {
                    Some(o) if !o.is_bot => out.push(pid.clone()),
                    Some(_) => info!(participant = %pid, "bot left off the roster"),
                    None => warn!(participant = %pid, "unknown participant left off the roster"),
                }
            }
            filtered.push(out);
        }
        let spectators = filtered.pop().unwrap_or_default();
        let team_b = filtered.pop().unwrap_or_default();
        let team_a = filtered.pop().unwrap_or_default();
        Ok((team_a, team_b, spectators))
    }

    async fn create_zones(&self, name: &str, spectator: bool) -> MatchResult<(ZoneId, ZoneSet)> {
        let zones = &self.platform.zones;
        let group = zones.create_zone(name, None).await?;
        let mut created = vec![group.clone()];

        let labels: Vec<String> = {
            let mut v = vec![
                name.to_string(),
                format!("{name} | Team1"),
                format!("{name} | Team2"),
            ];
            if spectator {
                v.push(format!("{name} | Spectators"));
            }
            v
        };
        for label in &labels {
            match zones.create_zone(label, Some(&group)).await {
                Ok(z) => created.push(z),
                Err(e) => {
                    self.discard_zones(&created).await;
                    return Err(e.into());
                }
            }
        }

        let mut it = created.into_iter().skip(1);
        let (Some(lobby), Some(team_a), Some(team_b)) = (it.next(), it.next(), it.next()) else {
            return Err(MatchError::ActuatorFailure(
                "zone creation returned too few zones".to_string(),
            ));
        };
        Ok((
            group,
            ZoneSet {
                lobby,
                team_a,
                team_b,
                spectator: it.next(),
            },
        ))
    }

    // -----------------------------------------------------------------------
    // Moves
    // -----------------------------------------------------------------------

    /// Owner directive: always overrides the move policy.
    pub async fn directed_move(
        &self,
        caller: &Caller,
        match_id: &MatchId,
        target: &ParticipantId,
        role: Role,
    ) -> MatchResult<PlacementRecord> {
        let m = self.stores.registry.get_match(match_id).await?;
        self.authorize_owner(&m, caller)?;
        self.place(&m, target, role).await
    }

    /// Enrol (if needed), record and move one participant. Errors from the
    /// move itself are returned.
    async fn place(&self, m: &Match, target: &ParticipantId, role: Role) -> MatchResult<PlacementRecord> {
        let zone = m
            .zones
            .zone_for(role)
            .ok_or_else(|| MatchError::invalid(format!("match {} has no {} zone", m.id, role.as_str())))?
            .clone();
        if self.platform.presence.member(target).await.is_none() {
            return Err(MatchError::not_found(format!("participant {target}")));
        }
        self.ensure_free(target, Some(&m.id)).await?;

        let current = self.platform.presence.current_zone(target).await;
        if !m.original_placement.contains_key(target) {
            let pid = target.clone();
            let before = current.clone();
            self.stores
                .registry
                .update_match(&m.id, move |m| {
                    let before = before.filter(|z| !m.contains_zone(z));
                    m.remember_original(&pid, before);
                    Ok(())
                })
                .await?;
        }

        let record = self
            .stores
            .ledger
            .set_participant(target, &m.id, &zone, role)
            .await?;
        if current.as_ref() != Some(&zone) {
            self.suppressed_move(target, Some(&zone)).await?;
        }
        info!(match_id = %m.id, participant = %target, zone = %zone, role = role.as_str(), "participant placed");
        Ok(record)
    }

    /// Caller moves themselves. Needs an `allow` policy for their role.
    pub async fn self_move(&self, caller: &Caller, match_id: &MatchId, role: Role) -> MatchResult<PlacementRecord> {
        let m = self.stores.registry.get_match(match_id).await?;
        let record = self
            .stores
            .ledger
            .find_participant(&caller.id)
            .await?
            .filter(|r| &r.match_id == match_id)
            .ok_or_else(|| {
                MatchError::permission_denied(format!("{} is not part of match {match_id}", caller.id))
            })?;
        if !m.is_owner(&caller.id) && !m.policy_for(record.role).is_allowed() {
            return Err(MatchError::permission_denied(format!(
                "moves are locked to the owner in match {match_id}; ask the owner to move you"
            )));
        }
        self.place(&m, &caller.id, role).await
    }

    /// Exchange two participants standing in different match zones.
    pub async fn swap(
        &self,
        caller: &Caller,
        match_id: &MatchId,
        first: &ParticipantId,
        second: &ParticipantId,
    ) -> MatchResult<(PlacementRecord, PlacementRecord)> {
        let m = self.stores.registry.get_match(match_id).await?;
        self.authorize_owner(&m, caller)?;

        let role_of = |zone: Option<ZoneId>| zone.and_then(|z| m.zones.role_of(&z));
        let r1 = role_of(self.platform.presence.current_zone(first).await);
        let r2 = role_of(self.platform.presence.current_zone(second).await);
        let (Some(r1), Some(r2)) = (r1, r2) else {
            return Err(MatchError::invalid(
                "both participants must be in a team or spectator zone of this match",
            ));
        };
        if r1 == r2 {
            return Err(MatchError::invalid("both participants are in the same zone"));
        }

        let a = self.place(&m, first, r2).await?;
        let b = self.place(&m, second, r1).await?;
        Ok((a, b))
    }

    // -----------------------------------------------------------------------
    // Match settings
    // -----------------------------------------------------------------------

    pub async fn lock(&self, caller: &Caller, match_id: &MatchId) -> MatchResult<Match> {
        self.set_locked(caller, match_id, true).await
    }

    pub async fn unlock(&self, caller: &Caller, match_id: &MatchId) -> MatchResult<Match> {
        self.set_locked(caller, match_id, false).await
    }

    async fn set_locked(&self, caller: &Caller, match_id: &MatchId, locked: bool) -> MatchResult<Match> {
        let m = self.stores.registry.get_match(match_id).await?;
        self.authorize_owner(&m, caller)?;
        let m = self
            .stores
            .registry
            .update_match(match_id, move |m| {
                m.locked = locked;
                Ok(m.clone())
            })
            .await?;

        let access = if locked { ZoneAccess::Locked } else { ZoneAccess::Open };
        for zone in m.zones.all() {
            if let Err(e) = self.platform.zones.set_zone_access(zone, access).await {
                warn!(match_id = %match_id, zone = %zone, error = %e, "zone access not updated");
            }
        }
        info!(match_id = %match_id, locked, "lock toggled");
        Ok(m)
    }

    pub async fn set_policy(
        &self,
        caller: &Caller,
        match_id: &MatchId,
        participants: Option<MovePolicy>,
        spectators: Option<MovePolicy>,
    ) -> MatchResult<Match> {
        if participants.is_none() && spectators.is_none() {
            return Err(MatchError::invalid("name at least one policy to change"));
        }
        let m = self.stores.registry.get_match(match_id).await?;
        self.authorize_owner(&m, caller)?;
        let m = self
            .stores
            .registry
            .update_match(match_id, move |m| {
                if let Some(p) = participants {
                    m.participant_move_policy = p;
                }
                if let Some(p) = spectators {
                    m.spectator_move_policy = p;
                }
                Ok(m.clone())
            })
            .await?;
        info!(
            match_id = %match_id,
            participants = m.participant_move_policy.as_str(),
            spectators = m.spectator_move_policy.as_str(),
            "move policy changed"
        );
        Ok(m)
    }

    /// Hand ownership to a human currently inside the match.
    pub async fn transfer(&self, caller: &Caller, match_id: &MatchId, target: &ParticipantId) -> MatchResult<Match> {
        let m = self.stores.registry.get_match(match_id).await?;
        self.authorize_owner(&m, caller)?;

        let member = self
            .platform
            .presence
            .member(target)
            .await
            .ok_or_else(|| MatchError::not_found(format!("participant {target}")))?;
        if member.is_bot {
            return Err(MatchError::invalid("ownership cannot go to a bot"));
        }
        if m.is_owner(target) {
            return Err(MatchError::invalid(format!("{target} already owns match {match_id}")));
        }
        let inside = self
            .platform
            .presence
            .current_zone(target)
            .await
            .is_some_and(|z| m.contains_zone(&z));
        if !inside {
            return Err(MatchError::invalid(format!(
                "{target} must be in one of the match zones"
            )));
        }
        self.ensure_free(target, Some(match_id)).await?;

        assign_owner(&self.stores, &self.platform, match_id, m.owner_id.as_ref(), target).await?;
        let old = m
            .owner_id
            .as_ref()
            .map(|o| o.to_string())
            .unwrap_or_else(|| "(none)".to_string());
        info!(match_id = %match_id, old_owner = %old, new_owner = %target, "ownership transferred");

        self.announce(match_id, &format!("Match owner changed: {old} -> {target}."))
            .await;
        if let Err(e) = self
            .platform
            .notifier
            .direct(target, &format!("You are now the owner of match {match_id}."))
            .await
        {
            warn!(participant = %target, error = %e, "transfer notice not delivered");
        }

        self.stores.registry.get_match(match_id).await
    }

    // -----------------------------------------------------------------------
    // Status
    // -----------------------------------------------------------------------

    pub async fn status(&self, match_id: &MatchId) -> MatchResult<MatchStatus> {
        let m = self.stores.registry.get_match(match_id).await?;

        let mut labelled: Vec<(&'static str, &ZoneId)> = vec![
            ("lobby", &m.zones.lobby),
            ("team_a", &m.zones.team_a),
            ("team_b", &m.zones.team_b),
        ];
        if let Some(s) = &m.zones.spectator {
            labelled.push(("spectators", s));
        }
        let mut zones = Vec::with_capacity(labelled.len());
        for (label, zone) in labelled {
            zones.push(ZoneOccupancy {
                label,
                zone: zone.clone(),
                occupants: self.platform.humans_in(&[zone]).await,
            });
        }

        Ok(MatchStatus {
            match_id: m.id.clone(),
            owner_id: m.owner_id.clone(),
            participant_policy: m.participant_move_policy,
            spectator_policy: m.spectator_move_policy,
            locked: m.locked,
            created_at: m.created_at,
            elapsed_minutes: (Utc::now() - m.created_at).num_minutes(),
            zones,
            timer_ends_at: self.timers.ends_at(match_id).map(|(at, _)| at),
        })
    }
}
