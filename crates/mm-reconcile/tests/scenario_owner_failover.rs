//! Scenario: owner tracking and failover.
//!
//! # Invariants under test
//!
//! 1. The owner is never rolled back; moves inside the match update the
//!    owner's expected zone.
//! 2. When the owner leaves every match zone, exactly one of the N >= 1
//!    non-bot participants still inside becomes owner, uniformly at random.
//! 3. With N = 0 the match becomes ownerless and no error is raised.
//! 4. The hand-over is announced and the new owner is told privately.
//! 5. A participant enrolled in another live match is never promoted, and
//!    ending that other match leaves this match's ownership alone.

use std::collections::BTreeMap;
use std::sync::Arc;

use mm_reconcile::{assign_owner, ReconcileEngine, ReconcileOutcome, SeededRandom};
use mm_schemas::{MovePolicy, ParticipantId};
use mm_testkit::{SeedMatch, World};

// ---------------------------------------------------------------------------
// 1. Owner is tracked, not corrected
// ---------------------------------------------------------------------------

#[tokio::test]
async fn owner_moves_inside_the_match_are_tracked() {
    let w = World::new();
    let m = w
        .seed_match(SeedMatch::new("M", "boss", &["u1"], &["u2"]))
        .await
        .unwrap();
    let eng = ReconcileEngine::new(w.stores.clone(), w.platform.clone());
    let boss = ParticipantId::new("boss");

    let change = w.sim.user_move(&boss, Some(&m.zones.team_b)).unwrap();
    assert_eq!(
        eng.handle(&change).await.unwrap(),
        ReconcileOutcome::OwnerTracked {
            match_id: m.id.clone(),
            zone: m.zones.team_b.clone(),
        }
    );
    assert!(w.sim.moves().is_empty(), "owner is exempt from policy");
    let rec = w.stores.ledger.get_participant(&boss).await.unwrap();
    assert_eq!(rec.expected_zone, m.zones.team_b);
}

// ---------------------------------------------------------------------------
// 2. Failover
// ---------------------------------------------------------------------------

#[tokio::test]
async fn owner_leaving_promotes_a_human_still_inside() {
    let w = World::new();
    let m = w
        .seed_match(SeedMatch::new("M", "boss", &["u1"], &["u2"]))
        .await
        .unwrap();
    w.sim.add_member("bot", true, Some(&m.zones.lobby));
    let first = |_: usize| 0;
    let eng = ReconcileEngine::with_random(w.stores.clone(), w.platform.clone(), Arc::new(first));

    let boss = ParticipantId::new("boss");
    let change = w.sim.user_move(&boss, None).unwrap();
    let outcome = eng.handle(&change).await.unwrap();

    // Candidates in zone order: lobby (bot only), team A (u1), team B (u2).
    assert_eq!(
        outcome,
        ReconcileOutcome::OwnerFailover {
            match_id: m.id.clone(),
            old_owner: boss.clone(),
            new_owner: ParticipantId::new("u1"),
        }
    );
    let after = w.stores.registry.get_match(&m.id).await.unwrap();
    assert_eq!(after.owner_id, Some(ParticipantId::new("u1")));
    assert!(w.sim.moves().is_empty());

    let announced = w.sim.announcements();
    assert_eq!(announced.len(), 1);
    assert!(announced[0].1.contains("boss") && announced[0].1.contains("u1"));
    assert_eq!(w.sim.directs_to(&ParticipantId::new("u1")).len(), 1);
}

#[tokio::test]
async fn moving_out_of_the_match_zones_counts_as_leaving() {
    let w = World::new();
    let m = w
        .seed_match(SeedMatch::new("M", "boss", &["u1"], &[]).policy(MovePolicy::Allow))
        .await
        .unwrap();
    let eng = ReconcileEngine::new(w.stores.clone(), w.platform.clone());
    let boss = ParticipantId::new("boss");

    let change = w.sim.user_move(&boss, Some(&m.home)).unwrap();
    assert!(matches!(
        eng.handle(&change).await.unwrap(),
        ReconcileOutcome::OwnerFailover { .. }
    ));
    let after = w.stores.registry.get_match(&m.id).await.unwrap();
    assert_eq!(after.owner_id, Some(ParticipantId::new("u1")));
}

#[tokio::test]
async fn failover_is_uniform_over_candidates() {
    let random = Arc::new(SeededRandom::new(0x5eed));
    let mut wins: BTreeMap<ParticipantId, usize> = BTreeMap::new();
    let trials = 1200;

    for _ in 0..trials {
        let w = World::new();
        w.seed_match(SeedMatch::new("M", "boss", &["u1", "u2"], &["u3"]))
            .await
            .unwrap();
        let eng = ReconcileEngine::with_random(w.stores.clone(), w.platform.clone(), random.clone());
        let change = w.sim.user_move(&ParticipantId::new("boss"), None).unwrap();
        match eng.handle(&change).await.unwrap() {
            ReconcileOutcome::OwnerFailover { new_owner, .. } => {
                *wins.entry(new_owner).or_default() += 1;
            }
            other => panic!("expected failover, got {other:?}"),
        }
    }

    assert_eq!(wins.len(), 3, "every candidate wins sometimes: {wins:?}");
    for (who, n) in &wins {
        // Expected 400 each; +/- 100 is over six standard deviations.
        assert!((300..=500).contains(n), "{who} won {n} of {trials}");
    }
}

// ---------------------------------------------------------------------------
// 3. Nobody left
// ---------------------------------------------------------------------------

#[tokio::test]
async fn empty_match_becomes_ownerless_without_error() {
    let w = World::new();
    let m = w
        .seed_match(SeedMatch::new("M", "boss", &[], &[]))
        .await
        .unwrap();
    w.sim.add_member("bot", true, Some(&m.zones.team_a));
    let eng = ReconcileEngine::new(w.stores.clone(), w.platform.clone());

    let change = w.sim.user_move(&ParticipantId::new("boss"), None).unwrap();
    assert_eq!(
        eng.handle(&change).await.unwrap(),
        ReconcileOutcome::Ownerless { match_id: m.id.clone() }
    );
    let after = w.stores.registry.get_match(&m.id).await.unwrap();
    assert_eq!(after.owner_id, None);
    assert!(w.sim.announcements().is_empty());
}

// ---------------------------------------------------------------------------
// 4. Delivery failures are not fatal
// ---------------------------------------------------------------------------

#[tokio::test]
async fn closed_inbox_does_not_undo_the_failover() {
    let w = World::new();
    let m = w
        .seed_match(SeedMatch::new("M", "boss", &["u1"], &[]))
        .await
        .unwrap();
    let u1 = ParticipantId::new("u1");
    w.sim.close_inbox(&u1);
    let eng = ReconcileEngine::new(w.stores.clone(), w.platform.clone());

    let change = w.sim.user_move(&ParticipantId::new("boss"), None).unwrap();
    assert!(matches!(
        eng.handle(&change).await.unwrap(),
        ReconcileOutcome::OwnerFailover { .. }
    ));
    assert_eq!(
        w.stores.registry.get_match(&m.id).await.unwrap().owner_id,
        Some(u1.clone())
    );
    assert!(w.sim.directs_to(&u1).is_empty());
    assert_eq!(w.sim.announcements().len(), 1);
}

// ---------------------------------------------------------------------------
// 5. Members of other matches are not candidates
// ---------------------------------------------------------------------------

#[tokio::test]
async fn walk_in_from_another_match_is_not_promoted() {
    let w = World::new();
    let a = w
        .seed_match(SeedMatch::new("A", "boss_a", &[], &[]))
        .await
        .unwrap();
    let b = w
        .seed_match(SeedMatch::new("B", "boss_b", &["p"], &[]).policy(MovePolicy::Allow))
        .await
        .unwrap();
    let eng = ReconcileEngine::new(w.stores.clone(), w.platform.clone());
    let p = ParticipantId::new("p");

    // Allowed to leave B; the record stays with B.
    let change = w.sim.user_move(&p, Some(&a.zones.team_a)).unwrap();
    eng.handle(&change).await.unwrap();
    assert_eq!(w.stores.ledger.get_participant(&p).await.unwrap().match_id, b.id);

    let change = w.sim.user_move(&ParticipantId::new("boss_a"), None).unwrap();
    assert_eq!(
        eng.handle(&change).await.unwrap(),
        ReconcileOutcome::Ownerless { match_id: a.id.clone() }
    );
    assert_eq!(w.stores.registry.get_match(&a.id).await.unwrap().owner_id, None);
    assert_eq!(w.stores.ledger.get_participant(&p).await.unwrap().match_id, b.id);
    assert!(!w
        .stores
        .registry
        .get_match(&a.id)
        .await
        .unwrap()
        .original_placement
        .contains_key(&p));
}

#[tokio::test]
async fn walk_in_is_passed_over_for_a_free_candidate() {
    let w = World::new();
    let a = w
        .seed_match(SeedMatch::new("A", "boss_a", &[], &[]))
        .await
        .unwrap();
    let b = w
        .seed_match(SeedMatch::new("B", "boss_b", &["p"], &[]).policy(MovePolicy::Allow))
        .await
        .unwrap();
    w.sim.add_member("q", false, Some(&a.zones.team_b));
    // Index 0 would be p (team A) if it were still a candidate.
    let first = |_: usize| 0;
    let eng = ReconcileEngine::with_random(w.stores.clone(), w.platform.clone(), Arc::new(first));
    let p = ParticipantId::new("p");

    let change = w.sim.user_move(&p, Some(&a.zones.team_a)).unwrap();
    eng.handle(&change).await.unwrap();

    let change = w.sim.user_move(&ParticipantId::new("boss_a"), None).unwrap();
    assert_eq!(
        eng.handle(&change).await.unwrap(),
        ReconcileOutcome::OwnerFailover {
            match_id: a.id.clone(),
            old_owner: ParticipantId::new("boss_a"),
            new_owner: ParticipantId::new("q"),
        }
    );
    assert_eq!(w.stores.ledger.get_participant(&p).await.unwrap().match_id, b.id);
}

#[tokio::test]
async fn assigning_a_member_of_another_live_match_conflicts() {
    let w = World::new();
    let a = w
        .seed_match(SeedMatch::new("A", "boss_a", &[], &[]))
        .await
        .unwrap();
    w.seed_match(SeedMatch::new("B", "boss_b", &["p"], &[]))
        .await
        .unwrap();
    let p = ParticipantId::new("p");

    let err = assign_owner(&w.stores, &w.platform, &a.id, None, &p)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), "conflict");
    assert_eq!(
        w.stores.registry.get_match(&a.id).await.unwrap().owner_id,
        Some(ParticipantId::new("boss_a"))
    );
}
