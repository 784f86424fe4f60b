//! Ownership hand-over.
//!
//! # Invariants
//!
//! - Candidates are the non-bot participants physically present in the
//!   match's zones at the moment of failover; one is chosen uniformly.
//! - A failover only replaces the owner it was triggered for. If ownership
//!   already changed in the meantime the hand-over is refused with
//!   `Conflict` and nothing is written.
//! - The new owner always ends up with a ledger record and an
//!   original-placement entry for this match, so teardown can find them.
//! - Someone enrolled in another live match is never promoted; their record
//!   stays with that match.

use mm_actuator::Platform;
use mm_schemas::{MatchError, MatchId, MatchResult, ParticipantId, Role};
use mm_store::Stores;
use tracing::{info, warn};

use crate::select::{choose, RandomSource};
use crate::types::ReconcileOutcome;

/// Make `new_owner` the owner of `match_id`.
///
/// `expected_old` guards against racing hand-overs: when set, the write only
/// happens if the match is still owned by that participant.
pub async fn assign_owner(
    stores: &Stores,
    platform: &Platform,
    match_id: &MatchId,
    expected_old: Option<&ParticipantId>,
    new_owner: &ParticipantId,
) -> MatchResult<()> {
    if let Some(other) = enrolled_elsewhere(stores, new_owner, match_id).await? {
        return Err(MatchError::conflict(format!(
            "participant {new_owner} already belongs to match {other}"
        )));
    }

    let current = platform.presence.current_zone(new_owner).await;
    let guard = expected_old.cloned();
    let recipient = new_owner.clone();
    let seen_at = current.clone();

    let m = stores
        .registry
        .update_match(match_id, move |m| {
            if let Some(old) = &guard {
                if !m.is_owner(old) {
                    return Err(MatchError::conflict(format!(
                        "ownership of {} already moved away from {old}",
                        m.id
                    )));
                }
            }
            m.owner_id = Some(recipient.clone());
            let before = seen_at.filter(|z| !m.contains_zone(z));
            m.remember_original(&recipient, before);
            Ok(m.clone())
        })
        .await?;

    let existing = stores.ledger.find_participant(new_owner).await?;
    if existing.map(|r| &r.match_id != match_id).unwrap_or(true) {
        let (zone, role) = match current.filter(|z| m.contains_zone(z)) {
            Some(z) => {
                let role = m.zones.role_of(&z).unwrap_or(Role::Spectator);
                (z, role)
            }
            None => (m.zones.lobby.clone(), Role::Spectator),
        };
        stores
            .ledger
            .set_participant(new_owner, match_id, &zone, role)
            .await?;
    }
    Ok(())
}

/// The live match other than `match_id` that `participant` is enrolled in.
/// Records pointing at a match that no longer exists do not count.
async fn enrolled_elsewhere(
    stores: &Stores,
    participant: &ParticipantId,
    match_id: &MatchId,
) -> MatchResult<Option<MatchId>> {
    let Some(rec) = stores.ledger.find_participant(participant).await? else {
        return Ok(None);
    };
    if &rec.match_id == match_id {
        return Ok(None);
    }
    Ok(stores.registry.find_match(&rec.match_id).await?.map(|m| m.id))
}

/// Owner left every match zone: promote someone still inside, or leave the
/// match ownerless if nobody is.
pub(crate) async fn fail_over(
    stores: &Stores,
    platform: &Platform,
    random: &dyn RandomSource,
    match_id: &MatchId,
    old_owner: &ParticipantId,
) -> MatchResult<ReconcileOutcome> {
    let m = stores.registry.get_match(match_id).await?;
    let mut candidates: Vec<ParticipantId> = Vec::new();
    for p in platform.humans_in(&m.zones.all()).await {
        if &p == old_owner {
            continue;
        }
        if let Some(other) = enrolled_elsewhere(stores, &p, match_id).await? {
            info!(match_id = %match_id, participant = %p, other = %other, "skipping failover candidate enrolled elsewhere");
            continue;
        }
        candidates.push(p);
    }

    let Some(new_owner) = choose(random, &candidates).cloned() else {
        let guard = old_owner.clone();
        stores
            .registry
            .update_match(match_id, move |m| {
                if m.is_owner(&guard) {
                    m.owner_id = None;
                }
                Ok(())
            })
            .await?;
        info!(match_id = %match_id, old_owner = %old_owner, "owner left; no one to promote, match is ownerless");
        return Ok(ReconcileOutcome::Ownerless {
            match_id: match_id.clone(),
        });
    };

    assign_owner(stores, platform, match_id, Some(old_owner), &new_owner).await?;
    info!(
        match_id = %match_id,
        old_owner = %old_owner,
        new_owner = %new_owner,
        candidates = candidates.len(),
        "owner failover"
    );

    let notice = format!(
        "The owner left the match, so ownership passed from {old_owner} to {new_owner}."
    );
    if let Err(e) = platform.notifier.announce(match_id, &notice).await {
        warn!(match_id = %match_id, error = %e, "failover announcement not delivered");
    }
    if let Err(e) = platform
        .notifier
        .direct(&new_owner, &format!("You are now the owner of match {match_id}."))
        .await
    {
        warn!(participant = %new_owner, error = %e, "failover private notice not delivered");
    }

    Ok(ReconcileOutcome::OwnerFailover {
        match_id: match_id.clone(),
        old_owner: old_owner.clone(),
        new_owner,
    })
}
