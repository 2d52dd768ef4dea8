//! End-to-end pipeline test: synthetic link bytes through the decoder and
//! parser, into shared state, combined into the rolling store, and out as a
//! deterministic AQI.

// the synthetic links only exist in non-hardware builds
#![cfg(not(feature = "hardware"))]

use airmon::aqi::{AqiEngine, BreakpointTables};
use airmon::config::OutOfRangePolicy;
use airmon::domain::{AqiCategory, Pollutant, TimeSeriesRow};
use airmon::error::MonitorError;
use airmon::frame::FrameDecoder;
use airmon::line::LineParser;
use airmon::link::SimulatedPmLink;
use airmon::state::ReadingState;
use airmon::store::RollingStore;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};

fn temp_store(tag: &str) -> PathBuf {
    static COUNTER: AtomicUsize = AtomicUsize::new(0);
    let n = COUNTER.fetch_add(1, Ordering::Relaxed);
    std::env::temp_dir().join(format!(
        "airmon-pipeline-{}-{}-{}.csv",
        tag,
        std::process::id(),
        n
    ))
}

fn engine() -> AqiEngine {
    AqiEngine::with_tables(BreakpointTables::default(), OutOfRangePolicy::Unmapped)
}

/// One combine cycle: both producers publish, then the writer snapshots and
/// appends - the same sequence the tasks run, minus the clocks.
fn combine_cycle(
    state: &ReadingState,
    decoder: &mut FrameDecoder,
    parser: &mut LineParser,
    store: &RollingStore,
    minute: usize,
) {
    // pm25 45.0 µg/m³ = 450 deci, pm10 80.0 µg/m³ = 800 deci
    let frame = SimulatedPmLink::encode_frame(450, 800);
    for decoded in decoder.feed(&frame) {
        state.publish(&[
            (Pollutant::Pm25, decoded.pm25),
            (Pollutant::Pm10, decoded.pm10),
        ]);
    }
    for record in parser.feed(b"1.5,30.0,60.0\n") {
        state.publish(&[
            (Pollutant::Co, record.co),
            (Pollutant::No2, record.no2),
            (Pollutant::O3, record.o3),
        ]);
    }

    let snapshot = state.snapshot();
    assert!(snapshot.is_complete(), "both producers have published");
    let row = TimeSeriesRow {
        timestamp: format!("07-08-2026 10:{:02}", minute),
        values: snapshot.row_values(),
    };
    store.append(&row).expect("append");
}

#[test]
fn pipeline_yields_deterministic_aqi() {
    let path = temp_store("aqi");
    let store = RollingStore::open(&path, 1440).expect("open store");
    let state = ReadingState::new();
    let mut decoder = FrameDecoder::new();
    let mut parser = LineParser::new();

    for minute in 0..24 {
        combine_cycle(&state, &mut decoder, &mut parser, &store, minute);
    }

    let rows = store.tail(24).expect("24 rows persisted");
    let result = engine().compute(&rows).expect("compute");

    // hand-computed from the CPCB tables:
    //   pm25 45.0 -> 75, pm10 80.0 -> 80, no2 30.0 -> 38,
    //   co 1.5 -> 73, o3 60.0 -> 60
    assert_eq!(
        result.per_pollutant,
        vec![
            (Pollutant::Pm25, 75),
            (Pollutant::Pm10, 80),
            (Pollutant::No2, 38),
            (Pollutant::Co, 73),
            (Pollutant::O3, 60),
        ]
    );
    assert_eq!(result.overall_index, 80);
    assert_eq!(result.dominant, Pollutant::Pm10);
    assert_eq!(result.category, AqiCategory::Satisfactory);

    let _ = std::fs::remove_file(&path);
}

#[test]
fn writer_gate_holds_until_all_sensors_report() {
    // only the pm producer has published: the writer must not append
    let state = ReadingState::new();
    let mut decoder = FrameDecoder::new();
    for decoded in decoder.feed(&SimulatedPmLink::encode_frame(450, 800)) {
        state.publish(&[
            (Pollutant::Pm25, decoded.pm25),
            (Pollutant::Pm10, decoded.pm10),
        ]);
    }
    assert!(!state.snapshot().is_complete());
}

#[test]
fn short_window_reports_insufficient_data() {
    let path = temp_store("short");
    let store = RollingStore::open(&path, 1440).expect("open store");
    let state = ReadingState::new();
    let mut decoder = FrameDecoder::new();
    let mut parser = LineParser::new();

    for minute in 0..5 {
        combine_cycle(&state, &mut decoder, &mut parser, &store, minute);
    }

    match store.tail(24) {
        Err(MonitorError::InsufficientData { have, need }) => {
            assert_eq!(have, 5);
            assert_eq!(need, 24);
        }
        other => panic!("expected InsufficientData, got {:?}", other),
    }

    let _ = std::fs::remove_file(&path);
}

#[test]
fn corrupted_frames_never_reach_the_store() {
    let path = temp_store("corrupt");
    let store = RollingStore::open(&path, 1440).expect("open store");
    let state = ReadingState::new();
    let mut decoder = FrameDecoder::new();
    let mut parser = LineParser::new();

    // a corrupted frame and a garbage line publish nothing
    let mut bad_frame = SimulatedPmLink::encode_frame(990, 990);
    bad_frame[8] = bad_frame[8].wrapping_add(1);
    assert!(decoder.feed(&bad_frame).is_empty());
    assert!(parser.feed(b"oops,not,numbers\n").is_empty());
    assert!(!state.snapshot().is_complete());

    // the pipeline recovers on the next good cycle
    combine_cycle(&state, &mut decoder, &mut parser, &store, 0);
    let rows = store.tail(1).expect("one good row");
    assert_eq!(rows[0].get(Pollutant::Pm25), Some(45.0));

    let _ = std::fs::remove_file(&path);
}
