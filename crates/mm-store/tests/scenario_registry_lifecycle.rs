//! Scenario: match registry and participant ledger lifecycle.
//!
//! # Invariants under test
//!
//! 1. A zone already indexed to one match cannot be claimed by another
//!    (`Conflict`), and a failed create writes nothing.
//! 2. `get_match_by_zone` resolves through the zone index.
//! 3. `delete_match` leaves no match, index or participant keys behind, and
//!    never clears a record that now belongs to a different match.
//! 4. A failing mutator aborts `update_match` without writing.

use std::collections::BTreeMap;
use std::sync::Arc;

use mm_schemas::{MatchError, MovePolicy, NewMatch, ParticipantId, Role, ZoneId, ZoneSet};
use mm_store::{MemoryStore, StateStore, Stores};

fn zones(prefix: &str) -> ZoneSet {
    ZoneSet {
        lobby: ZoneId::new(format!("{prefix}-lobby")),
        team_a: ZoneId::new(format!("{prefix}-a")),
        team_b: ZoneId::new(format!("{prefix}-b")),
        spectator: None,
    }
}

fn new_match(group: &str, zones: ZoneSet, roster: &[&str]) -> NewMatch {
    let mut original_placement = BTreeMap::new();
    for id in roster {
        original_placement.insert(ParticipantId::new(*id), Some(ZoneId::new("home")));
    }
    NewMatch {
        owner_id: ParticipantId::new("owner"),
        group: ZoneId::new(group),
        zones,
        participant_move_policy: MovePolicy::Deny,
        spectator_move_policy: MovePolicy::Allow,
        original_placement,
    }
}

fn setup() -> (Arc<MemoryStore>, Stores) {
    let mem = Arc::new(MemoryStore::new());
    let stores = Stores::with_defaults(mem.clone() as Arc<dyn StateStore>);
    (mem, stores)
}

// ---------------------------------------------------------------------------
// 1. Zone overlap is a conflict
// ---------------------------------------------------------------------------

#[tokio::test]
async fn overlapping_zone_is_rejected_without_side_effects() {
    let (mem, stores) = setup();
    stores
        .registry
        .create_match(new_match("g1", zones("m1"), &[]))
        .await
        .unwrap();
    let before = mem.live_keys().await;

    let mut overlapping = zones("m2");
    overlapping.team_b = ZoneId::new("m1-b");
    let err = stores
        .registry
        .create_match(new_match("g2", overlapping, &[]))
        .await
        .unwrap_err();

    assert!(matches!(err, MatchError::Conflict(_)), "got {err:?}");
    assert_eq!(mem.live_keys().await, before, "failed create must not write");
}

#[tokio::test]
async fn duplicate_zone_inside_one_match_is_invalid() {
    let (_mem, stores) = setup();
    let mut z = zones("m1");
    z.lobby = z.team_a.clone();
    let err = stores
        .registry
        .create_match(new_match("g1", z, &[]))
        .await
        .unwrap_err();
    assert!(matches!(err, MatchError::InvalidArgument(_)));
}

// ---------------------------------------------------------------------------
// 2. Zone index lookup
// ---------------------------------------------------------------------------

#[tokio::test]
async fn match_resolves_from_any_of_its_zones() {
    let (_mem, stores) = setup();
    let id = stores
        .registry
        .create_match(new_match("g1", zones("m1"), &[]))
        .await
        .unwrap();

    for zone in ["m1-lobby", "m1-a", "m1-b"] {
        let m = stores
            .registry
            .get_match_by_zone(&ZoneId::new(zone))
            .await
            .unwrap();
        assert_eq!(m.id, id);
    }

    let err = stores
        .registry
        .get_match_by_zone(&ZoneId::new("elsewhere"))
        .await
        .unwrap_err();
    assert!(matches!(err, MatchError::NotFound(_)));
}

// ---------------------------------------------------------------------------
// 3. Delete leaves nothing behind
// ---------------------------------------------------------------------------

#[tokio::test]
async fn delete_removes_match_index_and_participant_keys() {
    let (mem, stores) = setup();
    let id = stores
        .registry
        .create_match(new_match("g1", zones("m1"), &["u1", "u2"]))
        .await
        .unwrap();
    for (u, role, zone) in [("u1", Role::TeamA, "m1-a"), ("u2", Role::TeamB, "m1-b")] {
        stores
            .ledger
            .set_participant(&ParticipantId::new(u), &id, &ZoneId::new(zone), role)
            .await
            .unwrap();
    }
    stores
        .ledger
        .set_participant(&ParticipantId::new("owner"), &id, &ZoneId::new("m1-lobby"), Role::Spectator)
        .await
        .unwrap();

    let removed = stores.registry.delete_match(&id).await.unwrap();
    assert_eq!(removed.id, id);
    assert!(
        mem.live_keys().await.is_empty(),
        "residual keys: {:?}",
        mem.live_keys().await
    );

    let err = stores.registry.delete_match(&id).await.unwrap_err();
    assert!(matches!(err, MatchError::NotFound(_)));
}

#[tokio::test]
async fn delete_keeps_records_that_moved_to_another_match() {
    let (_mem, stores) = setup();
    let m1 = stores
        .registry
        .create_match(new_match("g1", zones("m1"), &["u1"]))
        .await
        .unwrap();
    let m2 = stores
        .registry
        .create_match(new_match("g2", zones("m2"), &[]))
        .await
        .unwrap();
    let u1 = ParticipantId::new("u1");
    stores
        .ledger
        .set_participant(&u1, &m2, &ZoneId::new("m2-a"), Role::TeamA)
        .await
        .unwrap();

    stores.registry.delete_match(&m1).await.unwrap();

    let rec = stores.ledger.get_participant(&u1).await.unwrap();
    assert_eq!(rec.match_id, m2);
    assert!(stores.registry.find_match(&m2).await.unwrap().is_some());
}

// ---------------------------------------------------------------------------
// 4. update_match
// ---------------------------------------------------------------------------

#[tokio::test]
async fn failing_mutator_does_not_write() {
    let (_mem, stores) = setup();
    let id = stores
        .registry
        .create_match(new_match("g1", zones("m1"), &[]))
        .await
        .unwrap();

    let res: Result<(), MatchError> = stores
        .registry
        .update_match(&id, |m| {
            m.locked = true;
            Err(MatchError::invalid("nope"))
        })
        .await;
    assert!(res.is_err());
    assert!(!stores.registry.get_match(&id).await.unwrap().locked);

    stores
        .registry
        .update_match(&id, |m| {
            m.locked = true;
            Ok(())
        })
        .await
        .unwrap();
    assert!(stores.registry.get_match(&id).await.unwrap().locked);
}

// ---------------------------------------------------------------------------
// Single-match claim
// ---------------------------------------------------------------------------

#[tokio::test]
async fn singleton_claim_conflicts_until_the_match_is_deleted() {
    let (_mem, stores) = setup();
    let m1 = stores
        .registry
        .create_match(new_match("g1", zones("m1"), &[]))
        .await
        .unwrap();
    stores.registry.claim_singleton(&m1).await.unwrap();

    let m2 = stores
        .registry
        .create_match(new_match("g2", zones("m2"), &[]))
        .await
        .unwrap();
    let err = stores.registry.claim_singleton(&m2).await.unwrap_err();
    assert!(matches!(err, MatchError::Conflict(_)));

    stores.registry.delete_match(&m1).await.unwrap();
    assert_eq!(stores.registry.singleton().await.unwrap(), None);
    stores.registry.claim_singleton(&m2).await.unwrap();
}
