//! A store plus a simulated platform, and a shortcut for seeding a running
//! match without going through the placement controller.

use std::collections::BTreeMap;
use std::sync::Arc;

use mm_actuator::{Platform, ZoneActuator};
use mm_schemas::{
    MatchId, MatchResult, MovePolicy, NewMatch, ParticipantId, Role, ZoneId, ZoneSet,
};
use mm_store::{MemoryStore, StateStore, Stores};

use crate::sim_platform::SimPlatform;

pub struct World {
    pub sim: Arc<SimPlatform>,
    pub mem: Arc<MemoryStore>,
    pub stores: Stores,
    pub platform: Platform,
    /// Free-standing zone seeded members start from.
    pub home: ZoneId,
}

impl World {
    pub fn new() -> Self {
        let mem = Arc::new(MemoryStore::new());
        let stores = Stores::with_defaults(mem.clone() as Arc<dyn StateStore>);
        Self::with_stores(mem, stores)
    }

    /// Use pre-built store handles (custom TTLs or namespace) over `mem`.
    pub fn with_stores(mem: Arc<MemoryStore>, stores: Stores) -> Self {
        let sim = Arc::new(SimPlatform::new());
        let home = sim.add_zone("home");
        let platform = Platform::new(sim.clone(), sim.clone(), sim.clone());
        Self {
            sim,
            mem,
            stores,
            platform,
            home,
        }
    }

    /// Create zones, the match record and placement records, and put every
    /// roster member physically into their assigned zone. Nothing is moved
    /// through the actuator and no membership change is emitted.
    pub async fn seed_match(&self, seed: SeedMatch<'_>) -> MatchResult<SeededMatch> {
        let home = self.home.clone();
        let group = self.sim.create_zone(seed.name, None).await?;
        let lobby = self
            .sim
            .create_zone(&format!("{} | Lobby", seed.name), Some(&group))
            .await?;
        let team_a = self
            .sim
            .create_zone(&format!("{} | Team1", seed.name), Some(&group))
            .await?;
        let team_b = self
            .sim
            .create_zone(&format!("{} | Team2", seed.name), Some(&group))
            .await?;
        let spectator = if seed.spectator_zone {
            Some(
                self.sim
                    .create_zone(&format!("{} | Spectators", seed.name), Some(&group))
                    .await?,
            )
        } else {
            None
        };
        let zones = ZoneSet {
            lobby,
            team_a,
            team_b,
            spectator,
        };

        let mut roster: Vec<(ParticipantId, Role)> = Vec::new();
        for id in seed.team_a {
            roster.push((ParticipantId::new(*id), Role::TeamA));
        }
        for id in seed.team_b {
            roster.push((ParticipantId::new(*id), Role::TeamB));
        }
        for id in seed.spectators {
            roster.push((ParticipantId::new(*id), Role::Spectator));
        }

        let owner = ParticipantId::new(seed.owner);
        let mut original_placement = BTreeMap::new();
        for (pid, _) in &roster {
            original_placement.insert(pid.clone(), Some(home.clone()));
        }
        original_placement
            .entry(owner.clone())
            .or_insert_with(|| Some(home.clone()));

        let id = self
            .stores
            .registry
            .create_match(NewMatch {
                owner_id: owner.clone(),
                group: group.clone(),
                zones: zones.clone(),
                participant_move_policy: seed.participant_policy,
                spectator_move_policy: seed.spectator_policy,
                original_placement,
            })
            .await?;

        for (pid, role) in &roster {
            let zone = zones.zone_for(*role).unwrap_or(&zones.lobby).clone();
            self.stores.ledger.set_participant(pid, &id, &zone, *role).await?;
            self.sim.add_member(pid.as_str(), false, Some(&zone));
        }
        if !roster.iter().any(|(pid, _)| pid == &owner) {
            self.stores
                .ledger
                .set_participant(&owner, &id, &zones.lobby, Role::Spectator)
                .await?;
            self.sim.add_member(owner.as_str(), false, Some(&zones.lobby));
        }

        Ok(SeededMatch {
            id,
            group,
            zones,
            home,
        })
    }
}

impl Default for World {
    fn default() -> Self {
        Self::new()
    }
}

/// Roster and policy for [`World::seed_match`].
pub struct SeedMatch<'a> {
    pub name: &'a str,
    pub owner: &'a str,
    pub team_a: &'a [&'a str],
    pub team_b: &'a [&'a str],
    pub spectators: &'a [&'a str],
    pub spectator_zone: bool,
    pub participant_policy: MovePolicy,
    pub spectator_policy: MovePolicy,
}

impl<'a> SeedMatch<'a> {
    /// Deny for players, allow for spectators, no spectator zone.
    pub fn new(name: &'a str, owner: &'a str, team_a: &'a [&'a str], team_b: &'a [&'a str]) -> Self {
        Self {
            name,
            owner,
            team_a,
            team_b,
            spectators: &[],
            spectator_zone: false,
            participant_policy: MovePolicy::Deny,
            spectator_policy: MovePolicy::Allow,
        }
    }

    pub fn policy(mut self, participants: MovePolicy) -> Self {
        self.participant_policy = participants;
        self
    }

    pub fn spectators(mut self, ids: &'a [&'a str], policy: MovePolicy) -> Self {
        self.spectators = ids;
        self.spectator_zone = true;
        self.spectator_policy = policy;
        self
    }
}

#[derive(Clone, Debug)]
pub struct SeededMatch {
    pub id: MatchId,
    pub group: ZoneId,
    pub zones: ZoneSet,
    /// Free-standing zone every roster member came from.
    pub home: ZoneId,
}
