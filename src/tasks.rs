//! ==============================================================================
//! tasks.rs - long-running monitor tasks
//! ==============================================================================
//!
//! purpose:
//!     the four independent tasks that make up the monitor:
//!     - pm decoder loop     (blocking thread, ~2s cadence)
//!     - gas parser loop     (blocking thread, ~1s cadence)
//!     - store writer        (async, ~15s cadence)
//!     - aqi cycle           (async, ~10s cadence)
//!
//! supervision model:
//!     no task owns another's lifecycle. every per-frame/per-line error is
//!     local; link and store failures are logged and retried on the task's
//!     next cycle, indefinitely. nothing here terminates the process - a dead
//!     sensor produces warnings, not exits. shutdown is a watch signal the
//!     blocking loops poll and the async loops select on.
//!
//! relationships:
//!     - spawned by: main.rs
//!     - uses: link.rs, frame.rs, line.rs, state.rs, store.rs, aqi.rs,
//!       telemetry.rs
//!
//! ==============================================================================

use crate::aqi::AqiEngine;
use crate::config::LinkConfig;
use crate::domain::{AqiResult, Pollutant, TimeSeriesRow};
use crate::error::MonitorError;
use crate::frame::FrameDecoder;
use crate::line::LineParser;
use crate::link::{self, SensorLink};
use crate::state::ReadingState;
use crate::store::RollingStore;
use crate::telemetry::TelemetryClient;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{watch, RwLock};

/// Latest background AQI computation, shared with the HTTP layer.
pub type SharedAqi = Arc<RwLock<Option<AqiResult>>>;

// ==============================================================================
// pm decoder loop (blocking)
// ==============================================================================

/// Reads the particulate link, feeds the frame decoder, publishes PM pairs.
/// Runs on the blocking pool until the shutdown signal flips.
pub fn pm_loop(
    config: LinkConfig,
    state: Arc<ReadingState>,
    shutdown: watch::Receiver<bool>,
    show_data: bool,
) {
    let mut decoder = FrameDecoder::new();
    let mut active: Option<Box<dyn SensorLink>> = None;
    let mut buf = [0u8; 64];
    let cadence = Duration::from_secs(config.poll_seconds);

    while !*shutdown.borrow() {
        if active.is_none() {
            match link::open_pm_link(&config) {
                Ok(l) => active = Some(l),
                Err(e) => {
                    tracing::warn!("pm link unavailable, retrying next cycle: {}", e);
                    std::thread::sleep(cadence);
                    continue;
                }
            }
        }
        let read = match active.as_mut() {
            Some(l) => l.read(&mut buf),
            None => continue,
        };
        match read {
            Ok(0) => {} // read timeout, no data this cycle
            Ok(n) => {
                for frame in decoder.feed(&buf[..n]) {
                    if show_data {
                        tracing::info!(
                            "[PM] PM2.5: {:.1} µg/m³ | PM10: {:.1} µg/m³",
                            frame.pm25,
                            frame.pm10
                        );
                    }
                    state.publish(&[
                        (Pollutant::Pm25, frame.pm25),
                        (Pollutant::Pm10, frame.pm10),
                    ]);
                }
            }
            Err(e) => {
                tracing::warn!("pm link error, reopening next cycle: {}", e);
                active = None;
            }
        }
        std::thread::sleep(cadence);
    }
    tracing::info!("pm decoder loop stopped");
}

// ==============================================================================
// gas parser loop (blocking)
// ==============================================================================

/// Reads the gas link, feeds the line parser, publishes (CO, NO2, O3)
/// triples. Same supervision as the pm loop.
pub fn gas_loop(
    config: LinkConfig,
    state: Arc<ReadingState>,
    shutdown: watch::Receiver<bool>,
    show_data: bool,
) {
    let mut parser = LineParser::new();
    let mut active: Option<Box<dyn SensorLink>> = None;
    let mut buf = [0u8; 256];
    let cadence = Duration::from_secs(config.poll_seconds);

    while !*shutdown.borrow() {
        if active.is_none() {
            match link::open_gas_link(&config) {
                Ok(l) => active = Some(l),
                Err(e) => {
                    tracing::warn!("gas link unavailable, retrying next cycle: {}", e);
                    std::thread::sleep(cadence);
                    continue;
                }
            }
        }
        let read = match active.as_mut() {
            Some(l) => l.read(&mut buf),
            None => continue,
        };
        match read {
            Ok(0) => {}
            Ok(n) => {
                for record in parser.feed(&buf[..n]) {
                    if show_data {
                        tracing::info!(
                            "[GAS] CO: {:.2} | NO2: {:.1} | O3: {:.1}",
                            record.co,
                            record.no2,
                            record.o3
                        );
                    }
                    state.publish(&[
                        (Pollutant::Co, record.co),
                        (Pollutant::No2, record.no2),
                        (Pollutant::O3, record.o3),
                    ]);
                }
            }
            Err(e) => {
                tracing::warn!("gas link error, reopening next cycle: {}", e);
                active = None;
            }
        }
        std::thread::sleep(cadence);
    }
    tracing::info!("gas parser loop stopped");
}

// ==============================================================================
// store writer (async)
// ==============================================================================

/// Combines the latest readings into a row every cycle, once every pollutant
/// has reported at least once. Store failures retry next cycle.
pub async fn store_writer_task(
    store: Arc<RollingStore>,
    state: Arc<ReadingState>,
    interval_seconds: u64,
    show_data: bool,
    mut shutdown: watch::Receiver<bool>,
) {
    let mut ticker = tokio::time::interval(Duration::from_secs(interval_seconds));
    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let snapshot = state.snapshot();
                if !snapshot.is_complete() {
                    tracing::info!("waiting for sensors to report all pollutants");
                    continue;
                }
                let row = TimeSeriesRow::now(snapshot.row_values());
                let line = row.to_csv_line();
                let store = store.clone();
                match tokio::task::spawn_blocking(move || store.append(&row)).await {
                    Ok(Ok(())) => {
                        if show_data {
                            tracing::info!("saved: {}", line);
                        }
                    }
                    Ok(Err(e)) => {
                        tracing::warn!("store append failed, retrying next cycle: {}", e);
                    }
                    Err(e) => {
                        tracing::warn!("store writer join error: {}", e);
                    }
                }
            }
            _ = shutdown.changed() => break,
        }
    }
    tracing::info!("store writer stopped");
}

// ==============================================================================
// aqi cycle (async)
// ==============================================================================

/// Recomputes the AQI from the freshest window every cycle, caches it for the
/// HTTP layer, and pushes telemetry when configured.
pub async fn aqi_cycle_task(
    store: Arc<RollingStore>,
    engine: Arc<AqiEngine>,
    state: Arc<ReadingState>,
    latest: SharedAqi,
    telemetry: Option<TelemetryClient>,
    window_rows: usize,
    interval_seconds: u64,
    mut shutdown: watch::Receiver<bool>,
) {
    let mut ticker = tokio::time::interval(Duration::from_secs(interval_seconds));
    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let computed = {
                    let store = store.clone();
                    let engine = engine.clone();
                    tokio::task::spawn_blocking(move || {
                        store.tail(window_rows).and_then(|rows| engine.compute(&rows))
                    })
                    .await
                };
                match computed {
                    Ok(Ok(result)) => {
                        tracing::info!(
                            "[AQI] {} ({}) | dominant: {}",
                            result.overall_index,
                            result.category.label(),
                            result.dominant.label()
                        );
                        *latest.write().await = Some(result.clone());
                        if let Some(client) = &telemetry {
                            client.push(&result, &state.snapshot()).await;
                        }
                    }
                    Ok(Err(MonitorError::InsufficientData { have, need })) => {
                        tracing::info!("aqi deferred: {}/{} rows collected", have, need);
                    }
                    Ok(Err(e)) => {
                        tracing::warn!("aqi cycle failed, retrying next cycle: {}", e);
                    }
                    Err(e) => {
                        tracing::warn!("aqi cycle join error: {}", e);
                    }
                }
            }
            _ = shutdown.changed() => break,
        }
    }
    tracing::info!("aqi cycle stopped");
}
