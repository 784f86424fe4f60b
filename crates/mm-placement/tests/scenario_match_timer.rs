//! Scenario: per-match countdown.
//!
//! # Invariants under test
//!
//! 1. The warning is announced `warning_lead` before expiry, then expiry.
//! 2. Auto-end tears the match down when the timer fires.
//! 3. Restarting replaces the running timer; stop cancels it.
//! 4. Ending the match cancels its timer, so nothing fires afterwards.
//!
//! All tests run on paused tokio time.

use std::sync::Arc;
use std::time::Duration;

use mm_placement::{Caller, PlacementController, PlacementSettings, StartRequest, StartedMatch};
use mm_schemas::MatchError;
use mm_testkit::World;

async fn running() -> (World, PlacementController, StartedMatch) {
    let w = World::new();
    for id in ["boss", "u1", "u2"] {
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
                team_a: vec!["u1".into()],
                team_b: vec!["u2".into()],
                ..StartRequest::default()
            },
        )
        .await
        .unwrap();
    (w, ctl, started)
}

fn said(w: &World, text: &str) -> usize {
    w.sim
        .announcements()
        .iter()
        .filter(|(_, msg)| msg.contains(text))
        .count()
}

fn boss() -> Caller {
    Caller::new("boss")
}

#[tokio::test(start_paused = true)]
async fn warning_then_expiry() {
    let (w, ctl, m) = running().await;
    ctl.start_timer(&boss(), &m.match_id, "10m", false).await.unwrap();
    assert!(ctl.timer(&m.match_id).is_some());

    tokio::time::sleep(Duration::from_secs(5 * 60 - 1)).await;
    assert_eq!(said(&w, "5 minutes remaining"), 0);

    tokio::time::sleep(Duration::from_secs(2)).await;
    assert_eq!(said(&w, "5 minutes remaining"), 1);
    assert_eq!(said(&w, "Time is up"), 0);

    tokio::time::sleep(Duration::from_secs(5 * 60)).await;
    assert_eq!(said(&w, "Time is up"), 1);
    assert!(ctl.timer(&m.match_id).is_none());
    assert!(w.stores.registry.find_match(&m.match_id).await.unwrap().is_some());
}

#[tokio::test(start_paused = true)]
async fn short_timer_skips_the_warning_and_auto_ends() {
    let (w, ctl, m) = running().await;
    ctl.start_timer(&boss(), &m.match_id, "90s", true).await.unwrap();

    tokio::time::sleep(Duration::from_secs(91)).await;

    assert_eq!(said(&w, "remaining"), 0);
    assert_eq!(said(&w, "Time is up"), 1);
    assert!(w.stores.registry.find_match(&m.match_id).await.unwrap().is_none());
    assert_eq!(w.sim.zone_of(&"u1".into()), Some(w.home.clone()));
    assert_eq!(w.sim.zone_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn restart_replaces_and_stop_cancels() {
    let (w, ctl, m) = running().await;
    ctl.start_timer(&boss(), &m.match_id, "2m", false).await.unwrap();
    ctl.start_timer(&boss(), &m.match_id, "1h", false).await.unwrap();

    tokio::time::sleep(Duration::from_secs(3 * 60)).await;
    assert_eq!(said(&w, "Time is up"), 0, "the 2m timer was replaced");

    assert!(ctl.stop_timer(&boss(), &m.match_id).await.unwrap());
    assert!(!ctl.stop_timer(&boss(), &m.match_id).await.unwrap());

    tokio::time::sleep(Duration::from_secs(2 * 3600)).await;
    assert_eq!(said(&w, "Time is up"), 0);
    assert_eq!(said(&w, "remaining"), 0);
}

#[tokio::test(start_paused = true)]
async fn ending_the_match_cancels_its_timer() {
    let (w, ctl, m) = running().await;
    ctl.start_timer(&boss(), &m.match_id, "20m", true).await.unwrap();
    ctl.end(&boss(), &m.match_id).await.unwrap();
    assert!(ctl.timer(&m.match_id).is_none());

    tokio::time::sleep(Duration::from_secs(30 * 60)).await;
    assert_eq!(said(&w, "Time is up"), 0);
    assert_eq!(said(&w, "remaining"), 0);
}

#[tokio::test]
async fn timer_is_owner_only_and_validates_duration() {
    let (_w, ctl, m) = running().await;
    let err = ctl
        .start_timer(&Caller::new("u1"), &m.match_id, "20m", false)
        .await
        .unwrap_err();
    assert!(matches!(err, MatchError::PermissionDenied(_)));

    let err = ctl
        .start_timer(&boss(), &m.match_id, "soon", false)
        .await
        .unwrap_err();
    assert!(matches!(err, MatchError::InvalidArgument(_)));
}
