//! Ending matches: teardown, the owner-approval sub-flow for non-owner end
//! requests, and the per-match timer that can end a match on expiry.
//!
//! # Invariants
//!
//! - Teardown is an idempotent sequence of single-key operations. Any
//!   per-entry failure (participant gone, zone gone, move rejected) is
//!   recorded in the report and the rest of the teardown still runs.
//! - Placement records are cleared before the zones are deleted, so the
//!   disconnects caused by deleting zones reach the engine as untracked.
//! - At most one approval token per match; a second request replaces the
//!   first. Tokens expire with the store TTL.

use std::time::Duration;

use chrono::Utc;
use mm_actuator::ActuatorError;
use mm_schemas::{ApprovalToken, MatchError, MatchId, MatchResult};
use tracing::{info, warn};
use uuid::Uuid;

use crate::controller::PlacementController;
use crate::timer::{describe_lead, parse_duration};
use crate::types::{Caller, EndOutcome, ResolveOutcome, TeardownReport, TimerInfo};

impl PlacementController {
    // -----------------------------------------------------------------------
    // End
    // -----------------------------------------------------------------------

    /// The owner ends the match directly; anyone else files an approval
    /// request with the owner.
    pub async fn end(&self, caller: &Caller, match_id: &MatchId) -> MatchResult<EndOutcome> {
        let m = self.stores.registry.get_match(match_id).await?;
        if self.authorize_owner(&m, caller).is_ok() {
            let report = self.teardown(match_id, "ended by owner").await?;
            return Ok(EndOutcome::Ended(report));
        }
        self.request_end(caller, match_id).await.map(EndOutcome::AwaitingApproval)
    }

    /// File (or replace) the pending end request and present it to the owner.
    pub async fn request_end(&self, caller: &Caller, match_id: &MatchId) -> MatchResult<ApprovalToken> {
        let m = self.stores.registry.get_match(match_id).await?;
        let Some(owner) = m.owner_id.clone() else {
            return Err(MatchError::permission_denied(format!(
                "match {match_id} has no owner to approve the request; a manager can end it directly"
            )));
        };
        if owner == caller.id {
            return Err(MatchError::invalid("the owner ends the match directly"));
        }

        let token = ApprovalToken {
            token_id: Uuid::new_v4(),
            match_id: match_id.clone(),
            owner_id: owner.clone(),
            requester_id: caller.id.clone(),
            requested_at: Utc::now(),
        };
        if let Some(previous) = self.stores.approvals.get(match_id).await? {
            info!(match_id = %match_id, replaced = %previous.token_id, "pending end request replaced");
        }
        self.stores.approvals.put(&token).await?;

        let prompt = format!(
            "{} asks to end match {match_id}. Approve or deny request {} within {} minutes.",
            caller.id,
            token.token_id,
            self.stores.approvals.timeout().as_secs() / 60
        );
        if let Err(e) = self.platform.notifier.direct(&owner, &prompt).await {
            warn!(match_id = %match_id, owner = %owner, error = %e, "end request not delivered to owner");
        }
        info!(match_id = %match_id, requester = %caller.id, token = %token.token_id, "end approval requested");
        Ok(token)
    }

    /// Owner's answer to a pending request. Denial and every refusal below
    /// leave the match untouched.
    pub async fn resolve_end(
        &self,
        caller: &Caller,
        match_id: &MatchId,
        token_id: Uuid,
        approve: bool,
    ) -> MatchResult<ResolveOutcome> {
        let Some(token) = self.stores.approvals.get(match_id).await? else {
            return Err(MatchError::not_found(format!(
                "no pending end request for match {match_id}"
            )));
        };
        if token.token_id != token_id {
            return Err(MatchError::conflict(format!(
                "end request {token_id} was replaced by a newer one"
            )));
        }
        if caller.id != token.owner_id {
            return Err(MatchError::permission_denied(
                "only the owner the request was sent to can answer it",
            ));
        }

        let m = self.stores.registry.get_match(match_id).await?;
        if !m.is_owner(&token.owner_id) {
            self.stores.approvals.discard(match_id).await?;
            return Err(MatchError::conflict(format!(
                "ownership of match {match_id} changed since the request was made"
            )));
        }

        self.stores.approvals.discard(match_id).await?;
        if !approve {
            info!(match_id = %match_id, token = %token_id, "end request denied");
            return Ok(ResolveOutcome::Denied);
        }
        let report = self.teardown(match_id, "end approved by owner").await?;
        Ok(ResolveOutcome::Ended(report))
    }

    /// Restore everyone, clear records, delete zones, delete the match.
    pub(crate) async fn teardown(&self, match_id: &MatchId, reason: &str) -> MatchResult<TeardownReport> {
        if self.timers.cancel(match_id) {
            info!(match_id = %match_id, "match timer cancelled");
        }
        let m = self.stores.registry.get_match(match_id).await?;
        let mut report = TeardownReport {
            match_id: match_id.clone(),
            ..TeardownReport::default()
        };

        for (pid, original) in &m.original_placement {
            let Some(zone) = original else {
                report.untouched.push(pid.clone());
                continue;
            };
            if self.platform.presence.member(pid).await.is_none() {
                report.failures.push(format!("{pid}: no longer in the space"));
                continue;
            }
            if self.platform.presence.current_zone(pid).await.as_ref() == Some(zone) {
                report.restored.push(pid.clone());
                continue;
            }
            if !self.platform.presence.zone_exists(zone).await {
                report.failures.push(format!("{pid}: original zone {zone} is gone"));
                continue;
            }
            match self.suppressed_move(pid, Some(zone)).await {
                Ok(()) => report.restored.push(pid.clone()),
                Err(e) => {
                    warn!(match_id = %match_id, participant = %pid, error = %e, "restore move failed");
                    report.failures.push(format!("{pid}: {e}"));
                }
            }
        }

        for pid in m.enrolled_ids() {
            if let Err(e) = self.stores.ledger.clear_if_in_match(&pid, match_id).await {
                warn!(match_id = %match_id, participant = %pid, error = %e, "placement record not cleared");
                report.failures.push(format!("{pid}: {e}"));
            }
        }

        let mut doomed: Vec<_> = m.zones.all().into_iter().cloned().collect();
        doomed.push(m.group.clone());
        for zone in &doomed {
            match self.platform.zones.delete_zone(zone).await {
                Ok(()) | Err(ActuatorError::NotFound(_)) => {}
                Err(e) => {
                    warn!(match_id = %match_id, zone = %zone, error = %e, "zone deletion failed");
                    report.failures.push(format!("zone {zone}: {e}"));
                }
            }
        }

        self.stores.registry.delete_match(match_id).await?;
        info!(
            match_id = %match_id,
            reason,
            restored = report.restored.len(),
            untouched = report.untouched.len(),
            failures = report.failures.len(),
            "match ended"
        );
        if let Err(e) = self
            .platform
            .notifier
            .announce(match_id, &format!("Match ended ({reason})."))
            .await
        {
            warn!(match_id = %match_id, error = %e, "end announcement not delivered");
        }
        Ok(report)
    }

    // -----------------------------------------------------------------------
    // Timer
    // -----------------------------------------------------------------------

    /// Start (or restart) the match countdown.
    pub async fn start_timer(
        &self,
        caller: &Caller,
        match_id: &MatchId,
        duration: &str,
        auto_end: bool,
    ) -> MatchResult<TimerInfo> {
        let m = self.stores.registry.get_match(match_id).await?;
        self.authorize_owner(&m, caller)?;
        let total = parse_duration(duration)?;

        let ends_at = Utc::now()
            + chrono::Duration::from_std(total)
                .map_err(|_| MatchError::invalid(format!("duration {duration} is too long")))?;
        let generation = self.timers.next_generation();
        let lead = self.settings.warning_lead;
        let this = self.clone();
        let id = match_id.clone();

        let handle = tokio::spawn(async move {
            this.run_timer(id, generation, total, lead, auto_end).await;
        });
        self.timers
            .install(match_id.clone(), generation, ends_at, auto_end, handle);

        info!(match_id = %match_id, duration, auto_end, "match timer started");
        if let Err(e) = self
            .platform
            .notifier
            .announce(match_id, &format!("Timer started: {duration}."))
            .await
        {
            warn!(match_id = %match_id, error = %e, "timer announcement not delivered");
        }

        Ok(TimerInfo {
            match_id: match_id.clone(),
            ends_at,
            auto_end,
        })
    }

    /// Returns `true` if a timer was running.
    pub async fn stop_timer(&self, caller: &Caller, match_id: &MatchId) -> MatchResult<bool> {
        let m = self.stores.registry.get_match(match_id).await?;
        self.authorize_owner(&m, caller)?;
        let was_running = self.timers.cancel(match_id);
        info!(match_id = %match_id, was_running, "match timer stopped");
        Ok(was_running)
    }

    pub fn timer(&self, match_id: &MatchId) -> Option<TimerInfo> {
        self.timers.ends_at(match_id).map(|(ends_at, auto_end)| TimerInfo {
            match_id: match_id.clone(),
            ends_at,
            auto_end,
        })
    }

    async fn run_timer(&self, match_id: MatchId, generation: u64, total: Duration, lead: Duration, auto_end: bool) {
        if total > lead {
            tokio::time::sleep(total - lead).await;
            let msg = format!("{} remaining.", describe_lead(lead));
            if let Err(e) = self.platform.notifier.announce(&match_id, &msg).await {
                warn!(match_id = %match_id, error = %e, "timer warning not delivered");
            }
            tokio::time::sleep(lead).await;
        } else {
            tokio::time::sleep(total).await;
        }

        if let Err(e) = self.platform.notifier.announce(&match_id, "Time is up.").await {
            warn!(match_id = %match_id, error = %e, "timer expiry not delivered");
        }
        self.timers.detach(&match_id, generation);

        if auto_end {
            match self.teardown(&match_id, "ended by timer").await {
                Ok(_) => {}
                Err(MatchError::NotFound(_)) => {}
                Err(e) => warn!(match_id = %match_id, error = %e, "timer auto-end failed"),
            }
        }
    }
}
