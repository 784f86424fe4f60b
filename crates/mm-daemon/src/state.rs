//! Shared runtime state for mm-daemon.
//!
//! Handlers receive `State<Arc<AppState>>` from Axum. The controller, the
//! engine and the store handles are all cheap clones over shared `Arc`s.

use std::sync::Arc;
use std::time::Duration;

use mm_actuator::{Notifier, Platform};
use mm_config::ManagerConfig;
use mm_placement::{PlacementController, PlacementSettings};
use mm_reconcile::{ReconcileEngine, ReconcileOutcome};
use mm_schemas::{MatchId, MatchResult, MembershipChange, ParticipantId};
use mm_store::{Keyspace, MemoryStore, StateStore, Stores};
use mm_testkit::SimPlatform;
use serde::Serialize;
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::notify::BusNotifier;

// ---------------------------------------------------------------------------
// BusMsg: SSE event bus payload
// ---------------------------------------------------------------------------

/// Messages broadcast over the internal event bus and surfaced as SSE events.
#[derive(Clone, Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BusMsg {
    Heartbeat {
        ts_millis: i64,
    },
    Announcement {
        match_id: MatchId,
        message: String,
    },
    Direct {
        participant: ParticipantId,
        message: String,
    },
    Outcome {
        participant: ParticipantId,
        outcome: ReconcileOutcome,
    },
}

impl BusMsg {
    /// SSE event name.
    pub fn event_name(&self) -> &'static str {
        match self {
            BusMsg::Heartbeat { .. } => "heartbeat",
            BusMsg::Announcement { .. } => "announcement",
            BusMsg::Direct { .. } => "direct",
            BusMsg::Outcome { .. } => "outcome",
        }
    }
}

// ---------------------------------------------------------------------------
// BuildInfo
// ---------------------------------------------------------------------------

#[derive(Clone, Debug, Serialize)]
pub struct BuildInfo {
    pub service: &'static str,
    pub version: &'static str,
}

// ---------------------------------------------------------------------------
// AppState
// ---------------------------------------------------------------------------

pub struct AppState {
    /// Broadcast bus for SSE.
    pub bus: broadcast::Sender<BusMsg>,
    pub build: BuildInfo,
    pub config: ManagerConfig,
    /// Hash of the loaded config layers, `None` when running on defaults.
    pub config_hash: Option<String>,
    /// Simulated platform standing in for the host service.
    pub sim: Arc<SimPlatform>,
    pub stores: Stores,
    pub controller: PlacementController,
    pub engine: ReconcileEngine,
}

impl Default for AppState {
    fn default() -> Self {
        Self::new(ManagerConfig::default())
    }
}

impl AppState {
    pub fn new(config: ManagerConfig) -> Self {
        let (bus, _rx) = broadcast::channel::<BusMsg>(1024);

        let store: Arc<dyn StateStore> = Arc::new(MemoryStore::new());
        let stores = Stores::new(
            store,
            Keyspace::new(config.store_namespace.clone()),
            config.suppression_ttl,
            config.approval_timeout,
        );

        let sim = Arc::new(SimPlatform::new());
        let notifier: Arc<dyn Notifier> = Arc::new(BusNotifier::new(sim.clone(), bus.clone()));
        let platform = Platform::new(sim.clone(), sim.clone(), notifier);

        let settings = PlacementSettings {
            single_match: config.single_match,
            spectator_zone: config.spectator_zone,
            name_prefix: config.name_prefix.clone(),
            warning_lead: config.warning_lead,
        };
        let controller = PlacementController::new(stores.clone(), platform.clone(), settings);
        let engine = ReconcileEngine::new(stores.clone(), platform);

        Self {
            bus,
            build: BuildInfo {
                service: "mm-daemon",
                version: env!("CARGO_PKG_VERSION"),
            },
            config,
            config_hash: None,
            sim,
            stores,
            controller,
            engine,
        }
    }

    pub fn with_config_hash(mut self, hash: impl Into<String>) -> Self {
        self.config_hash = Some(hash.into());
        self
    }

    /// Run one change through the engine and publish the outcome.
    pub async fn reconcile(&self, change: &MembershipChange) -> MatchResult<ReconcileOutcome> {
        let outcome = self.engine.handle(change).await?;
        debug!(participant = %change.participant_id, outcome = outcome.label(), "change reconciled");
        let _ = self.bus.send(BusMsg::Outcome {
            participant: change.participant_id.clone(),
            outcome: outcome.clone(),
        });
        Ok(outcome)
    }
}

// ---------------------------------------------------------------------------
// Background tasks
// ---------------------------------------------------------------------------

/// Spawn a background task that emits a heartbeat SSE every `interval`.
pub fn spawn_heartbeat(bus: broadcast::Sender<BusMsg>, interval: Duration) {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        loop {
            ticker.tick().await;
            let ts = chrono::Utc::now().timestamp_millis();
            let _ = bus.send(BusMsg::Heartbeat { ts_millis: ts });
        }
    });
}

/// Feed platform membership changes to the engine, each on its own task.
///
/// The engine keeps no per-change state, so changes for different
/// participants are handled concurrently. The pump ends when every sender
/// is dropped.
pub fn spawn_notification_pump(
    state: Arc<AppState>,
    mut rx: mpsc::UnboundedReceiver<MembershipChange>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(change) = rx.recv().await {
            let st = Arc::clone(&state);
            tokio::spawn(async move {
                if let Err(e) = st.reconcile(&change).await {
                    warn!(participant = %change.participant_id, error = %e, "membership change not reconciled");
                }
            });
        }
    })
}
