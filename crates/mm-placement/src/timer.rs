//! Per-match countdown tasks.
//!
//! # Invariants
//!
//! - At most one timer per match; starting a new one aborts the old one.
//! - Teardown cancels the match's timer before touching anything else.
//! - A timer that auto-ends its match first detaches itself from the
//!   registry, so the teardown it runs cannot abort it half-way.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use chrono::{DateTime, Utc};
use mm_schemas::{MatchError, MatchId, MatchResult};
use tokio::task::JoinHandle;

/// Parse `90s`, `20m`, `1h`, `2d`.
pub fn parse_duration(text: &str) -> MatchResult<Duration> {
    let t = text.trim().to_ascii_lowercase();
    let bad = || MatchError::invalid(format!("duration must be like 20m / 1h / 90s / 2d, got '{text}'"));

    let unit = t.chars().last().ok_or_else(bad)?;
    let mult: u64 = match unit {
        's' => 1,
        'm' => 60,
        'h' => 3_600,
        'd' => 86_400,
        _ => return Err(bad()),
    };
    let digits = &t[..t.len() - 1];
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return Err(bad());
    }
    let value: u64 = digits.parse().map_err(|_| bad())?;
    let secs = value.checked_mul(mult).ok_or_else(bad)?;
    if secs == 0 {
        return Err(MatchError::invalid("duration must be positive"));
    }
    Ok(Duration::from_secs(secs))
}

/// Human wording for the warning lead, e.g. "5 minutes".
pub(crate) fn describe_lead(lead: Duration) -> String {
    let secs = lead.as_secs();
    match secs {
        60 => "1 minute".to_string(),
        s if s % 60 == 0 => format!("{} minutes", s / 60),
        1 => "1 second".to_string(),
        s => format!("{s} seconds"),
    }
}

struct Slot {
    generation: u64,
    ends_at: DateTime<Utc>,
    auto_end: bool,
    handle: JoinHandle<()>,
}

#[derive(Default)]
pub(crate) struct TimerRegistry {
    next_generation: Mutex<u64>,
    slots: Mutex<HashMap<MatchId, Slot>>,
}

impl TimerRegistry {
    fn slots(&self) -> MutexGuard<'_, HashMap<MatchId, Slot>> {
        self.slots.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub(crate) fn next_generation(&self) -> u64 {
        let mut g = self.next_generation.lock().unwrap_or_else(|e| e.into_inner());
        *g += 1;
        *g
    }

    /// Install a running timer, aborting any previous one for the match.
    pub(crate) fn install(
        &self,
        match_id: MatchId,
        generation: u64,
        ends_at: DateTime<Utc>,
        auto_end: bool,
        handle: JoinHandle<()>,
    ) {
        let previous = self.slots().insert(
            match_id,
            Slot {
                generation,
                ends_at,
                auto_end,
                handle,
            },
        );
        if let Some(old) = previous {
            old.handle.abort();
        }
    }

    /// Abort the match's timer. Returns `true` if one was running.
    pub(crate) fn cancel(&self, match_id: &MatchId) -> bool {
        match self.slots().remove(match_id) {
            Some(slot) => {
                let running = !slot.handle.is_finished();
                slot.handle.abort();
                running
            }
            None => false,
        }
    }

    /// Drop the slot without aborting, if it still belongs to `generation`.
    pub(crate) fn detach(&self, match_id: &MatchId, generation: u64) {
        let mut slots = self.slots();
        if slots.get(match_id).map(|s| s.generation) == Some(generation) {
            slots.remove(match_id);
        }
    }

    pub(crate) fn ends_at(&self, match_id: &MatchId) -> Option<(DateTime<Utc>, bool)> {
        self.slots()
            .get(match_id)
            .filter(|s| !s.handle.is_finished())
            .map(|s| (s.ends_at, s.auto_end))
    }
}
