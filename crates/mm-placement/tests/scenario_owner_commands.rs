//! Scenario: owner directives and match settings.
//!
//! # Invariants under test
//!
//! 1. Directed moves and swaps are owner-only and override `deny`.
//! 2. Swap needs both participants in distinct role zones of the match.
//! 3. Self-move works only under `allow` and only for enrolled participants.
//! 4. Lock/unlock flip the flag and zone access without moving anyone.
//! 5. Transfer goes only to a human inside the match; ownerless matches
//!    accept managers.

use std::sync::Arc;

use mm_actuator::ZoneAccess;
use mm_placement::{Caller, PlacementController, PlacementSettings, StartRequest, StartedMatch};
use mm_schemas::{MatchError, MovePolicy, ParticipantId, Role};
use mm_testkit::World;

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

async fn running(policy: MovePolicy) -> (World, PlacementController, StartedMatch) {
    let w = World::new();
    for id in ["boss", "u1", "u2", "u3", "u4"] {
        w.sim.add_member(id, false, Some(&w.home));
    }
    let ctl = PlacementController::with_random(
        w.stores.clone(),
        w.platform.clone(),
        PlacementSettings::default(),
        Arc::new(|_: usize| 0),
    );
    let started = ctl
        .start(
            &Caller::manager("boss"),
            StartRequest {
                team_a: vec!["u1".into(), "u2".into()],
                team_b: vec!["u3".into(), "u4".into()],
                participant_policy: Some(policy),
                ..StartRequest::default()
            },
        )
        .await
        .unwrap();
    (w, ctl, started)
}

fn boss() -> Caller {
    Caller::new("boss")
}

fn pid(s: &str) -> ParticipantId {
    ParticipantId::new(s)
}

// ---------------------------------------------------------------------------
// 1. Directed move
// ---------------------------------------------------------------------------

#[tokio::test]
async fn directed_move_overrides_deny() {
    let (w, ctl, m) = running(MovePolicy::Deny).await;
    let before = w.sim.moves().len();

    let rec = ctl
        .directed_move(&boss(), &m.match_id, &pid("u1"), Role::TeamB)
        .await
        .unwrap();

    assert_eq!(rec.role, Role::TeamB);
    assert_eq!(rec.expected_zone, m.zones.team_b);
    assert_eq!(w.sim.zone_of(&pid("u1")), Some(m.zones.team_b.clone()));
    assert_eq!(w.sim.moves().len(), before + 1);
}

#[tokio::test]
async fn directed_move_checks_caller_and_role() {
    let (_w, ctl, m) = running(MovePolicy::Deny).await;

    let err = ctl
        .directed_move(&Caller::manager("u2"), &m.match_id, &pid("u1"), Role::TeamB)
        .await
        .unwrap_err();
    assert!(matches!(err, MatchError::PermissionDenied(_)));

    let err = ctl
        .directed_move(&boss(), &m.match_id, &pid("u1"), Role::Spectator)
        .await
        .unwrap_err();
    assert!(matches!(err, MatchError::InvalidArgument(_)), "no spectator zone");

    let err = ctl
        .directed_move(&boss(), &m.match_id, &pid("nobody"), Role::TeamA)
        .await
        .unwrap_err();
    assert!(matches!(err, MatchError::NotFound(_)));
}

#[tokio::test]
async fn directed_move_surfaces_actuator_failure() {
    let (w, ctl, m) = running(MovePolicy::Deny).await;
    w.sim.fail_moves_for(&pid("u1"));
    let err = ctl
        .directed_move(&boss(), &m.match_id, &pid("u1"), Role::TeamB)
        .await
        .unwrap_err();
    assert!(matches!(err, MatchError::ActuatorFailure(_)));
}

// ---------------------------------------------------------------------------
// 2. Swap
// ---------------------------------------------------------------------------

#[tokio::test]
async fn swap_exchanges_two_teams() {
    let (w, ctl, m) = running(MovePolicy::Deny).await;
    let (a, b) = ctl
        .swap(&boss(), &m.match_id, &pid("u1"), &pid("u3"))
        .await
        .unwrap();
    assert_eq!((a.role, b.role), (Role::TeamB, Role::TeamA));
    assert_eq!(w.sim.zone_of(&pid("u1")), Some(m.zones.team_b.clone()));
    assert_eq!(w.sim.zone_of(&pid("u3")), Some(m.zones.team_a.clone()));
}

#[tokio::test]
async fn swap_rejects_same_zone_and_outsiders() {
    let (w, ctl, m) = running(MovePolicy::Deny).await;

    let err = ctl
        .swap(&boss(), &m.match_id, &pid("u1"), &pid("u2"))
        .await
        .unwrap_err();
    assert!(matches!(err, MatchError::InvalidArgument(_)));

    // The owner stands outside the match zones.
    let err = ctl
        .swap(&boss(), &m.match_id, &pid("u1"), &pid("boss"))
        .await
        .unwrap_err();
    assert!(matches!(err, MatchError::InvalidArgument(_)));

    // The lobby has no role.
    w.sim.user_move(&pid("u3"), Some(&m.zones.lobby));
    let err = ctl
        .swap(&boss(), &m.match_id, &pid("u1"), &pid("u3"))
        .await
        .unwrap_err();
    assert!(matches!(err, MatchError::InvalidArgument(_)));
}

// ---------------------------------------------------------------------------
// 3. Self-move
// ---------------------------------------------------------------------------

#[tokio::test]
async fn self_move_needs_allow() {
    let (w, ctl, m) = running(MovePolicy::Deny).await;
    let err = ctl
        .self_move(&Caller::new("u1"), &m.match_id, Role::TeamB)
        .await
        .unwrap_err();
    assert!(matches!(err, MatchError::PermissionDenied(_)));

    ctl.set_policy(&boss(), &m.match_id, Some(MovePolicy::Allow), None)
        .await
        .unwrap();
    let rec = ctl
        .self_move(&Caller::new("u1"), &m.match_id, Role::TeamB)
        .await
        .unwrap();
    assert_eq!(rec.role, Role::TeamB);
    assert_eq!(w.sim.zone_of(&pid("u1")), Some(m.zones.team_b.clone()));

    w.sim.add_member("outsider", false, Some(&w.home));
    let err = ctl
        .self_move(&Caller::new("outsider"), &m.match_id, Role::TeamA)
        .await
        .unwrap_err();
    assert!(matches!(err, MatchError::PermissionDenied(_)));
}

// ---------------------------------------------------------------------------
// 4. Lock / policy
// ---------------------------------------------------------------------------

#[tokio::test]
async fn lock_and_unlock_touch_access_only() {
    let (w, ctl, m) = running(MovePolicy::Deny).await;
    let moves = w.sim.moves().len();

    let locked = ctl.lock(&boss(), &m.match_id).await.unwrap();
    assert!(locked.locked);
    for z in m.zones.all() {
        assert_eq!(w.sim.zone_access(z), Some(ZoneAccess::Locked));
    }

    let open = ctl.unlock(&boss(), &m.match_id).await.unwrap();
    assert!(!open.locked);
    for z in m.zones.all() {
        assert_eq!(w.sim.zone_access(z), Some(ZoneAccess::Open));
    }
    assert_eq!(w.sim.moves().len(), moves, "lock never moves anyone");

    let err = ctl.lock(&Caller::manager("u1"), &m.match_id).await.unwrap_err();
    assert!(matches!(err, MatchError::PermissionDenied(_)));
}

#[tokio::test]
async fn policy_toggle_needs_a_value() {
    let (_w, ctl, m) = running(MovePolicy::Deny).await;
    let err = ctl.set_policy(&boss(), &m.match_id, None, None).await.unwrap_err();
    assert!(matches!(err, MatchError::InvalidArgument(_)));

    let updated = ctl
        .set_policy(&boss(), &m.match_id, None, Some(MovePolicy::Deny))
        .await
        .unwrap();
    assert_eq!(updated.participant_move_policy, MovePolicy::Deny);
    assert_eq!(updated.spectator_move_policy, MovePolicy::Deny);
}

// ---------------------------------------------------------------------------
// 5. Transfer / ownerless / status
// ---------------------------------------------------------------------------

#[tokio::test]
async fn transfer_to_a_human_inside_the_match() {
    let (w, ctl, m) = running(MovePolicy::Deny).await;
    w.sim.add_member("bot", true, Some(&m.zones.lobby));

    let err = ctl.transfer(&boss(), &m.match_id, &pid("bot")).await.unwrap_err();
    assert!(matches!(err, MatchError::InvalidArgument(_)));
    w.sim.add_member("outsider", false, Some(&w.home));
    let err = ctl
        .transfer(&boss(), &m.match_id, &pid("outsider"))
        .await
        .unwrap_err();
    assert!(matches!(err, MatchError::InvalidArgument(_)));

    let after = ctl.transfer(&boss(), &m.match_id, &pid("u3")).await.unwrap();
    assert_eq!(after.owner_id, Some(pid("u3")));
    assert!(w
        .sim
        .announcements()
        .iter()
        .any(|(_, msg)| msg.contains("boss") && msg.contains("u3")));
    assert_eq!(w.sim.directs_to(&pid("u3")).len(), 1);

    // The previous owner lost their rights.
    let err = ctl.lock(&boss(), &m.match_id).await.unwrap_err();
    assert!(matches!(err, MatchError::PermissionDenied(_)));
}

#[tokio::test]
async fn ownerless_match_accepts_managers() {
    let (w, ctl, m) = running(MovePolicy::Deny).await;
    w.stores
        .registry
        .update_match(&m.match_id, |m| {
            m.owner_id = None;
            Ok(())
        })
        .await
        .unwrap();

    let err = ctl.lock(&Caller::new("u1"), &m.match_id).await.unwrap_err();
    assert!(matches!(err, MatchError::PermissionDenied(_)));
    ctl.lock(&Caller::manager("u1"), &m.match_id).await.unwrap();

    let after = ctl
        .transfer(&Caller::manager("u1"), &m.match_id, &pid("u4"))
        .await
        .unwrap();
    assert_eq!(after.owner_id, Some(pid("u4")));
}

#[tokio::test]
async fn status_lists_humans_per_zone() {
    let (w, ctl, m) = running(MovePolicy::Deny).await;
    w.sim.add_member("bot", true, Some(&m.zones.team_a));

    let st = ctl.status(&m.match_id).await.unwrap();
    assert_eq!(st.owner_id, Some(pid("boss")));
    assert!(!st.locked);
    assert_eq!(st.participant_policy, MovePolicy::Deny);
    let team_a = st.zones.iter().find(|z| z.label == "team_a").unwrap();
    assert_eq!(team_a.occupants, vec![pid("u1"), pid("u2")]);
    let lobby = st.zones.iter().find(|z| z.label == "lobby").unwrap();
    assert!(lobby.occupants.is_empty());
    assert!(st.timer_ends_at.is_none());
}
