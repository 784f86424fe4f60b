//! Axum router and all HTTP handlers for mm-daemon.
//!
//! `build_router` is the single entry point; `main.rs` calls it and attaches
//! middleware layers. Handlers translate bodies into controller/engine calls
//! and map `MatchError` onto HTTP status codes.

use std::{convert::Infallible, str::FromStr, sync::Arc};

use axum::{
    extract::{Path, State},
    http::{HeaderMap, HeaderValue, StatusCode},
    response::{
        sse::{Event, KeepAlive, Sse},
        IntoResponse, Response,
    },
    routing::{get, post},
    Json, Router,
};
use futures_util::{Stream, StreamExt};
use mm_actuator::PresenceView;
use mm_placement::{EndOutcome, MatchStatus, ResolveOutcome, StartedMatch, TimerInfo};
use mm_reconcile::ReconcileOutcome;
use mm_schemas::{Match, MatchError, MatchId, MembershipChange, MovePolicy, PlacementRecord, Role};
use tokio::sync::broadcast;
use tokio_stream::wrappers::BroadcastStream;
use tracing::info;

use crate::{
    api_types::{
        CallerBody, ErrorResponse, HealthResponse, MoveBody, PolicyBody, ResolveBody, SelfMoveBody,
        SimMemberBody, SimMemberResponse, SimMoveBody, SimZoneBody, SimZoneResponse, StartMatchBody,
        SwapBody, SwapResponse, TimerBody, TimerStopped, TransferBody,
    },
    state::{AppState, BusMsg},
};

// ---------------------------------------------------------------------------
// Router
// ---------------------------------------------------------------------------

/// Build the complete application router wired to the given shared state.
///
/// Middleware layers (CORS, tracing) are **not** applied here; `main.rs`
/// attaches them after this call so tests can use the bare router.
pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/v1/health", get(health))
        .route("/v1/stream", get(stream))
        .route("/v1/matches", post(start_match))
        .route("/v1/matches/:id", get(match_status))
        .route("/v1/matches/:id/move", post(move_participant))
        .route("/v1/matches/:id/self-move", post(self_move))
        .route("/v1/matches/:id/swap", post(swap))
        .route("/v1/matches/:id/lock", post(lock))
        .route("/v1/matches/:id/unlock", post(unlock))
        .route("/v1/matches/:id/policy", post(set_policy))
        .route("/v1/matches/:id/transfer", post(transfer))
        .route("/v1/matches/:id/end", post(end))
        .route("/v1/matches/:id/end/resolve", post(resolve_end))
        .route(
            "/v1/matches/:id/timer",
            get(timer_get).post(timer_start).delete(timer_stop),
        )
        .route("/v1/notifications", post(notification))
        .route("/v1/sim/zones", post(sim_zone))
        .route("/v1/sim/members", post(sim_member))
        .route("/v1/sim/move", post(sim_move))
        .with_state(state)
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

pub(crate) struct ApiError(MatchError);

impl From<MatchError> for ApiError {
    fn from(e: MatchError) -> Self {
        Self(e)
    }
}

pub(crate) fn status_for(e: &MatchError) -> StatusCode {
    match e {
        MatchError::NotFound(_) => StatusCode::NOT_FOUND,
        MatchError::PermissionDenied(_) => StatusCode::FORBIDDEN,
        MatchError::Conflict(_) => StatusCode::CONFLICT,
        MatchError::InvalidArgument(_) => StatusCode::BAD_REQUEST,
        MatchError::ActuatorFailure(_) => StatusCode::BAD_GATEWAY,
        MatchError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = status_for(&self.0);
        if status.is_server_error() {
            tracing::error!(error = %self.0, "request failed");
        }
        (
            status,
            Json(ErrorResponse {
                error: self.0.to_string(),
                kind: self.0.kind().to_string(),
            }),
        )
            .into_response()
    }
}

type ApiResult<T> = Result<Json<T>, ApiError>;

fn parse_role(s: &str) -> Result<Role, ApiError> {
    Role::from_str(s).map_err(ApiError)
}

fn parse_policy(s: Option<&str>) -> Result<Option<MovePolicy>, ApiError> {
    s.map(MovePolicy::from_str).transpose().map_err(ApiError)
}

// ---------------------------------------------------------------------------
// GET /v1/health
// ---------------------------------------------------------------------------

pub(crate) async fn health(State(st): State<Arc<AppState>>) -> impl IntoResponse {
    (
        StatusCode::OK,
        Json(HealthResponse {
            ok: true,
            service: st.build.service.to_string(),
            version: st.build.version.to_string(),
            config_hash: st.config_hash.clone(),
        }),
    )
}

// ---------------------------------------------------------------------------
// /v1/matches
// ---------------------------------------------------------------------------

pub(crate) async fn start_match(
    State(st): State<Arc<AppState>>,
    Json(body): Json<StartMatchBody>,
) -> Result<(StatusCode, Json<StartedMatch>), ApiError> {
    let started = st.controller.start(&body.caller, body.request).await?;
    info!(match_id = %started.match_id, caller = %body.caller.id, "matches/start");
    Ok((StatusCode::CREATED, Json(started)))
}

pub(crate) async fn match_status(
    State(st): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> ApiResult<MatchStatus> {
    Ok(Json(st.controller.status(&MatchId::new(id)).await?))
}

pub(crate) async fn move_participant(
    State(st): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(body): Json<MoveBody>,
) -> ApiResult<PlacementRecord> {
    let role = parse_role(&body.role)?;
    let rec = st
        .controller
        .directed_move(&body.caller, &MatchId::new(id), &body.participant, role)
        .await?;
    Ok(Json(rec))
}

pub(crate) async fn self_move(
    State(st): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(body): Json<SelfMoveBody>,
) -> ApiResult<PlacementRecord> {
    let role = parse_role(&body.role)?;
    let rec = st
        .controller
        .self_move(&body.caller, &MatchId::new(id), role)
        .await?;
    Ok(Json(rec))
}

pub(crate) async fn swap(
    State(st): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(body): Json<SwapBody>,
) -> ApiResult<SwapResponse> {
    let (first, second) = st
        .controller
        .swap(&body.caller, &MatchId::new(id), &body.first, &body.second)
        .await?;
    Ok(Json(SwapResponse { first, second }))
}

pub(crate) async fn lock(
    State(st): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(body): Json<CallerBody>,
) -> ApiResult<Match> {
    Ok(Json(st.controller.lock(&body.caller, &MatchId::new(id)).await?))
}

pub(crate) async fn unlock(
    State(st): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(body): Json<CallerBody>,
) -> ApiResult<Match> {
    Ok(Json(st.controller.unlock(&body.caller, &MatchId::new(id)).await?))
}

pub(crate) async fn set_policy(
    State(st): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(body): Json<PolicyBody>,
) -> ApiResult<Match> {
    let participants = parse_policy(body.participants.as_deref())?;
    let spectators = parse_policy(body.spectators.as_deref())?;
    let m = st
        .controller
        .set_policy(&body.caller, &MatchId::new(id), participants, spectators)
        .await?;
    Ok(Json(m))
}

pub(crate) async fn transfer(
    State(st): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(body): Json<TransferBody>,
) -> ApiResult<Match> {
    let m = st
        .controller
        .transfer(&body.caller, &MatchId::new(id), &body.target)
        .await?;
    Ok(Json(m))
}

/// 200 when the match ended, 202 when the request awaits the owner.
pub(crate) async fn end(
    State(st): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(body): Json<CallerBody>,
) -> Result<(StatusCode, Json<EndOutcome>), ApiError> {
    let outcome = st.controller.end(&body.caller, &MatchId::new(id)).await?;
    let status = match outcome {
        EndOutcome::Ended(_) => StatusCode::OK,
        EndOutcome::AwaitingApproval(_) => StatusCode::ACCEPTED,
    };
    Ok((status, Json(outcome)))
}

pub(crate) async fn resolve_end(
    State(st): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(body): Json<ResolveBody>,
) -> ApiResult<ResolveOutcome> {
    let outcome = st
        .controller
        .resolve_end(&body.caller, &MatchId::new(id), body.token_id, body.approve)
        .await?;
    Ok(Json(outcome))
}

pub(crate) async fn timer_get(
    State(st): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> ApiResult<TimerInfo> {
    let match_id = MatchId::new(id);
    st.controller
        .timer(&match_id)
        .map(Json)
        .ok_or_else(|| ApiError(MatchError::not_found(format!("timer for match {match_id}"))))
}

pub(crate) async fn timer_start(
    State(st): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(body): Json<TimerBody>,
) -> ApiResult<TimerInfo> {
    let info = st
        .controller
        .start_timer(&body.caller, &MatchId::new(id), &body.duration, body.auto_end)
        .await?;
    Ok(Json(info))
}

pub(crate) async fn timer_stop(
    State(st): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(body): Json<CallerBody>,
) -> ApiResult<TimerStopped> {
    let stopped = st
        .controller
        .stop_timer(&body.caller, &MatchId::new(id))
        .await?;
    Ok(Json(TimerStopped { stopped }))
}

// ---------------------------------------------------------------------------
// POST /v1/notifications
// ---------------------------------------------------------------------------

/// Ingest one membership change from the platform and reconcile it inline.
pub(crate) async fn notification(
    State(st): State<Arc<AppState>>,
    Json(change): Json<MembershipChange>,
) -> ApiResult<ReconcileOutcome> {
    Ok(Json(st.reconcile(&change).await?))
}

// ---------------------------------------------------------------------------
// /v1/sim
// ---------------------------------------------------------------------------

pub(crate) async fn sim_zone(
    State(st): State<Arc<AppState>>,
    Json(body): Json<SimZoneBody>,
) -> Result<(StatusCode, Json<SimZoneResponse>), ApiError> {
    let zone_id = st.sim.add_zone(&body.name);
    Ok((StatusCode::CREATED, Json(SimZoneResponse { zone_id })))
}

pub(crate) async fn sim_member(
    State(st): State<Arc<AppState>>,
    Json(body): Json<SimMemberBody>,
) -> Result<(StatusCode, Json<SimMemberResponse>), ApiError> {
    if let Some(zone) = &body.zone {
        if !st.sim.has_zone(zone) {
            return Err(MatchError::not_found(format!("zone {zone}")).into());
        }
    }
    let participant_id = st.sim.add_member(&body.id, body.is_bot, body.zone.as_ref());
    Ok((StatusCode::CREATED, Json(SimMemberResponse { participant_id })))
}

/// The resulting change is emitted to the platform's subscriber (the
/// notification pump) and echoed back; `null` if nothing changed.
pub(crate) async fn sim_move(
    State(st): State<Arc<AppState>>,
    Json(body): Json<SimMoveBody>,
) -> ApiResult<Option<MembershipChange>> {
    if st.sim.member(&body.participant).await.is_none() {
        return Err(MatchError::not_found(format!("participant {}", body.participant)).into());
    }
    if let Some(zone) = &body.zone {
        if !st.sim.has_zone(zone) {
            return Err(MatchError::not_found(format!("zone {zone}")).into());
        }
    }
    Ok(Json(st.sim.user_move(&body.participant, body.zone.as_ref())))
}

// ---------------------------------------------------------------------------
// GET /v1/stream  (SSE)
// ---------------------------------------------------------------------------

pub(crate) async fn stream(State(st): State<Arc<AppState>>) -> Response {
    let mut headers = HeaderMap::new();
    headers.insert("Cache-Control", HeaderValue::from_static("no-cache"));
    headers.insert("Connection", HeaderValue::from_static("keep-alive"));

    let rx = st.bus.subscribe();
    let events = broadcast_to_sse(rx);

    (headers, Sse::new(events).keep_alive(KeepAlive::new())).into_response()
}

fn broadcast_to_sse(
    rx: broadcast::Receiver<BusMsg>,
) -> impl Stream<Item = Result<Event, Infallible>> {
    BroadcastStream::new(rx).filter_map(|msg| async move {
        match msg {
            Ok(m) => {
                let data = serde_json::to_string(&m).ok()?;
                Some(Ok(Event::default().event(m.event_name()).data(data)))
            }
            Err(_) => None, // lagged / closed
        }
    })
}
