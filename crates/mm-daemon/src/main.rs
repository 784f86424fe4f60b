//! mm-daemon entry point.
//!
//! Thin on purpose: load configuration, set up tracing, build the shared
//! state, start the background tasks, and serve. Route handlers live in
//! `routes.rs`; shared state and the background tasks in `state.rs`.

use std::{net::SocketAddr, sync::Arc, time::Duration};

use anyhow::Context;
use axum::http::{HeaderValue, Method};
use clap::Parser;
use mm_config::{
    load_layered_yaml, report_unused_keys, ManagerConfig, UnusedKeyPolicy,
};
use mm_daemon::{routes, state};
use tokio::sync::mpsc;
use tower_http::{
    cors::CorsLayer,
    trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer},
};
use tracing::{info, warn, Level};

#[derive(Parser)]
#[command(name = "mm-daemon")]
#[command(about = "Match manager daemon", long_about = None)]
struct Args {
    /// Config YAML paths in merge order (base -> deployment -> local).
    #[arg(long = "config")]
    config: Vec<String>,

    /// Fail startup when the config contains keys nothing reads.
    #[arg(long, default_value_t = false)]
    strict_config: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Silent if the file does not exist; production injects env vars directly.
    let _ = dotenvy::from_filename(".env.local");

    init_tracing();
    let args = Args::parse();

    let (config, config_hash) = load_config(&args)?;
    let addr = bind_addr_from_env().unwrap_or(config.daemon_addr);

    let mut app_state = state::AppState::new(config);
    if let Some(hash) = config_hash {
        app_state = app_state.with_config_hash(hash);
    }
    let shared = Arc::new(app_state);

    let (tx, rx) = mpsc::unbounded_channel();
    shared.sim.subscribe(tx);
    state::spawn_notification_pump(Arc::clone(&shared), rx);
    state::spawn_heartbeat(shared.bus.clone(), Duration::from_secs(1));

    let app = routes::build_router(Arc::clone(&shared))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        .layer(cors_localhost_only());

    info!("mm-daemon listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server crashed")?;

    Ok(())
}

fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()),
        )
        .init();
}

fn load_config(args: &Args) -> anyhow::Result<(ManagerConfig, Option<String>)> {
    if args.config.is_empty() {
        info!("no config layers given; running on defaults");
        return Ok((ManagerConfig::default(), None));
    }

    let paths: Vec<&str> = args.config.iter().map(String::as_str).collect();
    let loaded = load_layered_yaml(&paths).context("config load failed")?;

    let policy = if args.strict_config {
        UnusedKeyPolicy::Fail
    } else {
        UnusedKeyPolicy::Warn
    };
    let report = report_unused_keys(&loaded.config_json, policy)?;
    for leaf in &report.unused_leaf_pointers {
        warn!(leaf = %leaf, "config key is not read by anything");
    }

    let config = ManagerConfig::from_config_json(&loaded.config_json)
        .context("config rejected")?;
    info!(config_hash = %loaded.config_hash, layers = paths.len(), "config loaded");
    Ok((config, Some(loaded.config_hash)))
}

fn bind_addr_from_env() -> Option<SocketAddr> {
    std::env::var("MM_DAEMON_ADDR").ok()?.parse().ok()
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "ctrl-c handler unavailable; running until killed");
        std::future::pending::<()>().await;
    }
    info!("shutdown requested");
}

/// CORS: allow only localhost origins.
fn cors_localhost_only() -> CorsLayer {
    let allowed_origins = [
        "http://localhost",
        "http://127.0.0.1",
        "http://localhost:3000",
        "http://127.0.0.1:3000",
        "http://localhost:5173",
        "http://127.0.0.1:5173",
    ];

    let origins: Vec<HeaderValue> = allowed_origins
        .iter()
        .filter_map(|o| HeaderValue::from_str(o).ok())
        .collect();

    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([Method::GET, Method::POST, Method::DELETE])
        .allow_headers(tower_http::cors::Any)
}
