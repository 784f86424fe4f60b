use std::sync::Arc;

use mm_actuator::Platform;
use mm_schemas::{Match, MatchResult, MembershipChange, PlacementRecord, ZoneId};
use mm_store::Stores;
use tracing::{debug, info, warn};

use crate::failover::fail_over;
use crate::select::{RandomSource, ThreadRandom};
use crate::types::ReconcileOutcome;

/// Event-driven policy enforcement. Holds no per-notification state: every
/// decision is made from store reads, so any number of notifications may be
/// handled concurrently.
#[derive(Clone)]
pub struct ReconcileEngine {
    stores: Stores,
    platform: Platform,
    random: Arc<dyn RandomSource>,
}

impl ReconcileEngine {
    pub fn new(stores: Stores, platform: Platform) -> Self {
        Self::with_random(stores, platform, Arc::new(ThreadRandom))
    }

    pub fn with_random(stores: Stores, platform: Platform, random: Arc<dyn RandomSource>) -> Self {
        Self {
            stores,
            platform,
            random,
        }
    }

    /// Handle one membership-change notification.
    ///
    /// Store errors are returned; actuator failures are logged and reported
    /// through the outcome.
    pub async fn handle(&self, change: &MembershipChange) -> MatchResult<ReconcileOutcome> {
        let pid = &change.participant_id;

        // 1. Self-inflicted.
        if self.stores.suppression.is_suppressed(pid).await? {
            debug!(participant = %pid, "suppressed membership change ignored");
            return Ok(ReconcileOutcome::Suppressed);
        }

        // 2. Untracked participant.
        let Some(record) = self.stores.ledger.find_participant(pid).await? else {
            return self.untracked(change).await;
        };

        // 3. Orphaned record.
        let Some(m) = self.stores.registry.find_match(&record.match_id).await? else {
            self.stores.ledger.clear_participant(pid).await?;
            info!(participant = %pid, match_id = %record.match_id, "stale placement record cleared");
            return Ok(ReconcileOutcome::StaleRecordCleared {
                match_id: record.match_id,
            });
        };

        // 4. Owner.
        if m.is_owner(pid) {
            return self.owner_moved(change, record, &m).await;
        }

        // 5. Member.
        self.member_moved(change, record, &m).await
    }

    async fn untracked(&self, change: &MembershipChange) -> MatchResult<ReconcileOutcome> {
        let Some(after) = &change.after else {
            return Ok(ReconcileOutcome::Untracked);
        };
        let Some(m) = self.stores.registry.find_match_by_zone(after).await? else {
            return Ok(ReconcileOutcome::Untracked);
        };
        if !m.locked {
            return Ok(ReconcileOutcome::Untracked);
        }

        let pid = &change.participant_id;
        let back = change.before.clone();
        self.stores.suppression.suppress(pid).await?;
        match self.platform.zones.move_participant(pid, back.as_ref()).await {
            Ok(()) => {
                info!(participant = %pid, match_id = %m.id, zone = %after, "walk-in into locked match reverted");
                Ok(ReconcileOutcome::LockdownReverted {
                    match_id: m.id,
                    to: back,
                })
            }
            Err(e) => {
                warn!(participant = %pid, match_id = %m.id, error = %e, "lockdown revert failed");
                Ok(ReconcileOutcome::CorrectionFailed {
                    match_id: m.id,
                    reason: e.to_string(),
                })
            }
        }
    }

    async fn owner_moved(
        &self,
        change: &MembershipChange,
        mut record: PlacementRecord,
        m: &Match,
    ) -> MatchResult<ReconcileOutcome> {
        match &change.after {
            Some(zone) if m.contains_zone(zone) => {
                if &record.expected_zone != zone {
                    record.expected_zone = zone.clone();
                    self.stores.ledger.put(&record).await?;
                }
                debug!(match_id = %m.id, zone = %zone, "owner position tracked");
                Ok(ReconcileOutcome::OwnerTracked {
                    match_id: m.id.clone(),
                    zone: zone.clone(),
                })
            }
            _ => {
                fail_over(
                    &self.stores,
                    &self.platform,
                    self.random.as_ref(),
                    &m.id,
                    &change.participant_id,
                )
                .await
            }
        }
    }

    async fn member_moved(
        &self,
        change: &MembershipChange,
        mut record: PlacementRecord,
        m: &Match,
    ) -> MatchResult<ReconcileOutcome> {
        let Some(after) = &change.after else {
            debug!(participant = %change.participant_id, match_id = %m.id, "participant disconnected; record retained");
            return Ok(ReconcileOutcome::Disconnected {
                match_id: m.id.clone(),
            });
        };

        if !m.policy_for(record.role).is_allowed() {
            if after == &record.expected_zone {
                return Ok(ReconcileOutcome::NoChange);
            }
            return self.correct(&record, m).await;
        }

        if !m.contains_zone(after) {
            debug!(participant = %change.participant_id, match_id = %m.id, zone = %after, "participant left the match zones");
            return Ok(ReconcileOutcome::LeftMatch {
                match_id: m.id.clone(),
            });
        }
        if after == &record.expected_zone {
            return Ok(ReconcileOutcome::NoChange);
        }

        record.expected_zone = after.clone();
        self.stores.ledger.put(&record).await?;
        info!(participant = %record.participant_id, match_id = %m.id, zone = %after, "voluntary move accepted");
        Ok(ReconcileOutcome::Accepted {
            match_id: m.id.clone(),
            zone: after.clone(),
        })
    }

    async fn correct(&self, record: &PlacementRecord, m: &Match) -> MatchResult<ReconcileOutcome> {
        let pid = &record.participant_id;
        let target: &ZoneId = &record.expected_zone;

        if !self.platform.presence.zone_exists(target).await {
            warn!(participant = %pid, match_id = %m.id, zone = %target, "expected zone is gone; correction skipped");
            return Ok(ReconcileOutcome::CorrectionSkipped {
                match_id: m.id.clone(),
                missing: target.clone(),
            });
        }

        self.stores.suppression.suppress(pid).await?;
        match self.platform.zones.move_participant(pid, Some(target)).await {
            Ok(()) => {
                info!(participant = %pid, match_id = %m.id, zone = %target, "unauthorized move corrected");
                Ok(ReconcileOutcome::Corrected {
                    match_id: m.id.clone(),
                    to: target.clone(),
                })
            }
            Err(e) => {
                warn!(participant = %pid, match_id = %m.id, error = %e, "corrective move failed");
                Ok(ReconcileOutcome::CorrectionFailed {
                    match_id: m.id.clone(),
                    reason: e.to_string(),
                })
            }
        }
    }
}
