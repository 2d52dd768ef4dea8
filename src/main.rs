//! ==============================================================================
//! main.rs - air quality monitor entry point
//! ==============================================================================
//!
//! purpose:
//!     this is the supervisor process for the air quality station. it wires
//!     two sensor links into a shared reading cache, persists combined rows
//!     to a bounded rolling CSV, recomputes the CPCB AQI over the freshest
//!     window, and serves the result to the dashboard.
//!
//! responsibilities:
//!     - load configuration (monitor.toml) and initialize logging
//!     - spawn the pm decoder and gas parser loops (blocking threads)
//!     - spawn the store writer and aqi cycle (periodic async tasks)
//!     - serve the json query interface consumed by the dashboard
//!     - keep running through any single sensor failure (log-and-continue)
//!
//! architecture:
//!
//!     ┌──────────────────────────────────────────────────────────────┐
//!     │                     monitor (this file)                      │
//!     │  ┌────────────┐  ┌────────────┐  ┌──────────┐  ┌──────────┐  │
//!     │  │ pm decoder │  │ gas parser │  │  writer  │  │ aqi cycle│  │
//!     │  │ (2s cycle) │  │ (1s cycle) │  │(15s cycle)│ │(10s cycle)│ │
//!     │  └─────┬──────┘  └─────┬──────┘  └────┬─────┘  └────┬─────┘  │
//!     │        └──────┬────────┘              │             │        │
//!     │               ▼                       ▼             ▼        │
//!     │      shared reading state ──▶ rolling store ──▶ aqi engine   │
//!     │                                       │             │        │
//!     │                      web server (/api/readings, /api/aqi)    │
//!     └──────────────────────────────────────────────────────────────┘
//!
//! ==============================================================================

use airmon::{aqi, config, domain, state, store, tasks, telemetry};

use anyhow::Result;
use axum::{extract::State, response::Json, routing::get, Router};
use serde_json::json;
use std::sync::Arc;
use tokio::sync::watch;
use tower_http::cors::CorsLayer;

use airmon::domain::Pollutant;
use airmon::error::MonitorError;

// ==============================================================================
// shared state for the http layer
// ==============================================================================
// handlers only read: the latest snapshot, the store (via tail) and the
// cached background aqi. all mutation happens in the tasks.

#[derive(Clone)]
struct ApiState {
    readings: Arc<state::ReadingState>,
    store: Arc<store::RollingStore>,
    engine: Arc<aqi::AqiEngine>,
    latest: tasks::SharedAqi,
    window_rows: usize,
}

// ==============================================================================
// main entry point
// ==============================================================================

#[tokio::main]
async fn main() -> Result<()> {
    // startup banner
    println!("===========================================================");
    println!("  airmon - Air Quality Monitor");
    println!("  SDS011 + gas board -> rolling store -> CPCB AQI");
    println!("===========================================================");

    // step 1: load configuration
    let config = config::MonitorConfig::load_or_default();
    config.print_summary();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_new(&config.logging.level)
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    // step 2: shared components
    let readings = Arc::new(state::ReadingState::new());
    let store = Arc::new(store::RollingStore::open(
        &config.store.path,
        config.store.max_rows,
    )?);
    let engine = Arc::new(aqi::AqiEngine::from_config(&config.aqi)?);
    let latest: tasks::SharedAqi = Arc::new(tokio::sync::RwLock::new(None));
    let telemetry = telemetry::TelemetryClient::from_config(&config.telemetry);
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    // step 3: web server in background
    let api_state = ApiState {
        readings: readings.clone(),
        store: store.clone(),
        engine: engine.clone(),
        latest: latest.clone(),
        window_rows: config.aqi.window_rows,
    };
    let bind = config.server.bind.clone();
    tokio::spawn(async move {
        println!("[STARTUP] ✓ Query interface live at http://{}", bind);
        if let Err(e) = run_server(&bind, api_state).await {
            eprintln!("[ERROR] Web server error: {}", e);
        }
    });

    // step 4: sensor loops on the blocking pool
    let show_data = config.logging.show_sensor_data;
    {
        let config = config.links.pm.clone();
        let readings = readings.clone();
        let shutdown = shutdown_rx.clone();
        tokio::task::spawn_blocking(move || tasks::pm_loop(config, readings, shutdown, show_data));
    }
    {
        let config = config.links.gas.clone();
        let readings = readings.clone();
        let shutdown = shutdown_rx.clone();
        tokio::task::spawn_blocking(move || tasks::gas_loop(config, readings, shutdown, show_data));
    }

    // step 5: periodic tasks
    tokio::spawn(tasks::store_writer_task(
        store.clone(),
        readings.clone(),
        config.store.combine_seconds,
        show_data,
        shutdown_rx.clone(),
    ));
    tokio::spawn(tasks::aqi_cycle_task(
        store,
        engine,
        readings,
        latest,
        telemetry,
        config.aqi.window_rows,
        config.aqi.compute_seconds,
        shutdown_rx,
    ));

    println!("\n[RUNTIME] Monitor running - Ctrl-C to stop");
    println!("────────────────────────────────────────────────────────────");

    // step 6: run until the operator stops us
    tokio::signal::ctrl_c().await?;
    println!("\n[SHUTDOWN] Stopping tasks...");
    shutdown_tx.send(true).ok();
    // let the blocking loops notice the signal; in-flight store writes are
    // already crash-safe via the atomic rename
    tokio::time::sleep(std::time::Duration::from_millis(200)).await;
    println!("[SHUTDOWN] Done");
    Ok(())
}

// ==============================================================================
// web server
// ==============================================================================

async fn run_server(bind: &str, api_state: ApiState) -> Result<()> {
    let app = Router::new()
        .route("/api/readings", get(readings_handler))
        .route("/api/aqi", get(aqi_handler))
        .layer(CorsLayer::permissive())
        .with_state(api_state);

    let listener = tokio::net::TcpListener::bind(bind).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

/// latest known value per pollutant, plus the cached background aqi.
/// absent pollutants are omitted, not defaulted.
async fn readings_handler(State(api): State<ApiState>) -> Json<serde_json::Value> {
    let snapshot = api.readings.snapshot();
    let mut readings = serde_json::Map::new();
    for pollutant in Pollutant::ALL {
        if let Some(reading) = snapshot.get(pollutant) {
            readings.insert(
                pollutant.label().to_string(),
                json!({
                    "concentration": reading.concentration,
                    "observedAt": reading.observed_at.to_rfc3339(),
                }),
            );
        }
    }
    let last_aqi = api
        .latest
        .read()
        .await
        .as_ref()
        .map(|result| aqi_json(result));
    Json(json!({
        "readings": readings,
        "complete": snapshot.is_complete(),
        "lastAqi": last_aqi,
    }))
}

/// on-demand aqi over the freshest window. reads only the store.
async fn aqi_handler(State(api): State<ApiState>) -> Json<serde_json::Value> {
    let window_rows = api.window_rows;
    let store = api.store.clone();
    let engine = api.engine.clone();
    let computed = tokio::task::spawn_blocking(move || {
        store.tail(window_rows).and_then(|rows| engine.compute(&rows))
    })
    .await;

    match computed {
        Ok(Ok(result)) => Json(aqi_json(&result)),
        Ok(Err(MonitorError::InsufficientData { have, need })) => Json(json!({
            "error": "insufficient data",
            "have": have,
            "need": need,
        })),
        Ok(Err(e)) => Json(json!({ "error": e.to_string() })),
        Err(e) => Json(json!({ "error": format!("task join error: {}", e) })),
    }
}

/// the query-interface shape the dashboard consumes
fn aqi_json(result: &domain::AqiResult) -> serde_json::Value {
    json!({
        "overallIndex": result.overall_index,
        "dominantPollutant": result.dominant.label(),
        "category": result.category.label(),
        "perPollutant": result.per_pollutant_json(),
    })
}
