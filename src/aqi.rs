//! ==============================================================================
//! aqi.rs - breakpoint tables and AQI computation
//! ==============================================================================
//!
//! purpose:
//!     converts a window of raw concentrations into CPCB AQI sub-indices via
//!     piecewise-linear breakpoint interpolation, picks the dominant
//!     pollutant, and classifies the overall index.
//!     the breakpoint tables are configuration data, not logic: the built-in
//!     defaults are the CPCB tables, and `aqi.breakpoints_path` can point at
//!     a TOML file that replaces them. the file is re-checked by mtime before
//!     each computation and hot-swapped on change; a file that fails to parse
//!     or validate leaves the previous tables in place.
//!
//! relationships:
//!     - reads: store.rs rows (via tasks.rs and the /api/aqi handler)
//!     - config: config.rs (AqiConfig, OutOfRangePolicy)
//!
//! ==============================================================================

use crate::config::{AqiConfig, OutOfRangePolicy};
use crate::domain::{AqiCategory, AqiResult, Pollutant, TimeSeriesRow};
use crate::error::MonitorError;
use serde::Deserialize;
use std::path::PathBuf;
use std::sync::{Mutex, RwLock};
use std::time::SystemTime;

/// One concentration sub-range mapped linearly to an index sub-range.
///
/// A bucket-style table is the degenerate case `index_low == index_high`.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct BreakpointSegment {
    pub conc_low: f64,
    pub conc_high: f64,
    pub index_low: u16,
    pub index_high: u16,
}

fn seg(conc_low: f64, conc_high: f64, index_low: u16, index_high: u16) -> BreakpointSegment {
    BreakpointSegment {
        conc_low,
        conc_high,
        index_low,
        index_high,
    }
}

/// Per-pollutant segment sequences, each sorted by `conc_low` and
/// non-overlapping.
#[derive(Debug, Clone, Deserialize)]
pub struct BreakpointTables {
    pub pm25: Vec<BreakpointSegment>,
    pub pm10: Vec<BreakpointSegment>,
    pub no2: Vec<BreakpointSegment>,
    pub co: Vec<BreakpointSegment>,
    pub o3: Vec<BreakpointSegment>,
}

impl BreakpointTables {
    pub fn segments(&self, pollutant: Pollutant) -> &[BreakpointSegment] {
        match pollutant {
            Pollutant::Pm25 => &self.pm25,
            Pollutant::Pm10 => &self.pm10,
            Pollutant::No2 => &self.no2,
            Pollutant::Co => &self.co,
            Pollutant::O3 => &self.o3,
        }
    }

    /// Rejects empty, unsorted, inverted or overlapping sequences.
    pub fn validate(&self) -> anyhow::Result<()> {
        for pollutant in Pollutant::ALL {
            let segments = self.segments(pollutant);
            if segments.is_empty() {
                anyhow::bail!("{}: no breakpoint segments", pollutant.label());
            }
            for (i, segment) in segments.iter().enumerate() {
                if segment.conc_high < segment.conc_low {
                    anyhow::bail!(
                        "{}: segment {} has conc_high < conc_low",
                        pollutant.label(),
                        i
                    );
                }
                if i > 0 && segment.conc_low <= segments[i - 1].conc_high {
                    anyhow::bail!(
                        "{}: segment {} overlaps or is out of order",
                        pollutant.label(),
                        i
                    );
                }
            }
        }
        Ok(())
    }

    /// Parses and validates a TOML override file.
    pub fn load<P: AsRef<std::path::Path>>(path: P) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())?;
        let tables: BreakpointTables = toml::from_str(&content)?;
        tables.validate()?;
        Ok(tables)
    }
}

impl Default for BreakpointTables {
    /// CPCB breakpoint tables (µg/m³; CO in mg/m³).
    fn default() -> Self {
        Self {
            pm25: vec![
                seg(0.0, 30.0, 0, 50),
                seg(31.0, 60.0, 51, 100),
                seg(61.0, 90.0, 101, 200),
                seg(91.0, 120.0, 201, 300),
                seg(121.0, 250.0, 301, 400),
                seg(251.0, 500.0, 401, 500),
            ],
            pm10: vec![
                seg(0.0, 50.0, 0, 50),
                seg(51.0, 100.0, 51, 100),
                seg(101.0, 250.0, 101, 200),
                seg(251.0, 350.0, 201, 300),
                seg(351.0, 430.0, 301, 400),
                seg(431.0, 1000.0, 401, 500),
            ],
            no2: vec![
                seg(0.0, 40.0, 0, 50),
                seg(41.0, 80.0, 51, 100),
                seg(81.0, 180.0, 101, 200),
                seg(181.0, 280.0, 201, 300),
                seg(281.0, 400.0, 301, 400),
                seg(401.0, 1000.0, 401, 500),
            ],
            co: vec![
                seg(0.0, 1.0, 0, 50),
                seg(1.1, 2.0, 51, 100),
                seg(2.1, 10.0, 101, 200),
                seg(10.1, 17.0, 201, 300),
                seg(17.1, 34.0, 301, 400),
                seg(34.1, 50.0, 401, 500),
            ],
            o3: vec![
                seg(0.0, 50.0, 0, 50),
                seg(51.0, 100.0, 51, 100),
                seg(101.0, 168.0, 101, 200),
                seg(169.0, 208.0, 201, 300),
                seg(209.0, 748.0, 301, 400),
                seg(749.0, 1000.0, 401, 500),
            ],
        }
    }
}

/// Linear interpolation within the first matching segment.
///
/// `None` means the concentration fell outside every segment - an explicit
/// "unmapped" outcome, distinct from a true zero sub-index. Boundary
/// concentrations map to exactly `index_low` / `index_high`.
pub fn sub_index(concentration: f64, segments: &[BreakpointSegment]) -> Option<u16> {
    for segment in segments {
        if segment.conc_low <= concentration && concentration <= segment.conc_high {
            let index_span = f64::from(segment.index_high) - f64::from(segment.index_low);
            let conc_span = segment.conc_high - segment.conc_low;
            let index = if conc_span == 0.0 {
                f64::from(segment.index_low)
            } else {
                (index_span / conc_span) * (concentration - segment.conc_low)
                    + f64::from(segment.index_low)
            };
            return Some(index.round() as u16);
        }
    }
    None
}

/// Max of the mapped sub-indices. `per` must be in canonical pollutant order;
/// ties keep the earlier pollutant.
pub fn overall(per: &[(Pollutant, u16)]) -> Option<(u16, Pollutant)> {
    let mut best: Option<(u16, Pollutant)> = None;
    for (pollutant, index) in per {
        match best {
            Some((best_index, _)) if *index <= best_index => {}
            _ => best = Some((*index, *pollutant)),
        }
    }
    best
}

/// CPCB severity thresholds.
pub fn classify(index: u16) -> AqiCategory {
    match index {
        0..=50 => AqiCategory::Good,
        51..=100 => AqiCategory::Satisfactory,
        101..=200 => AqiCategory::Moderate,
        201..=300 => AqiCategory::Poor,
        301..=400 => AqiCategory::VeryPoor,
        _ => AqiCategory::Severe,
    }
}

/// Mean concentration of one pollutant over the window, ignoring absent
/// cells. `None` when the pollutant never appears.
pub fn window_mean(rows: &[TimeSeriesRow], pollutant: Pollutant) -> Option<f64> {
    let values: Vec<f64> = rows.iter().filter_map(|row| row.get(pollutant)).collect();
    if values.is_empty() {
        return None;
    }
    Some(values.iter().sum::<f64>() / values.len() as f64)
}

/// Tracks the optional table override file for mtime-based hot reload.
struct TableSource {
    path: PathBuf,
    last_modified: Mutex<Option<SystemTime>>,
}

/// The calculator: swappable tables + out-of-range policy.
pub struct AqiEngine {
    tables: RwLock<BreakpointTables>,
    policy: OutOfRangePolicy,
    source: Option<TableSource>,
}

impl AqiEngine {
    /// Builds the engine from config, loading the override file when set.
    pub fn from_config(config: &AqiConfig) -> anyhow::Result<Self> {
        let (tables, source) = match &config.breakpoints_path {
            Some(path) => {
                let tables = BreakpointTables::load(path)?;
                let last_modified = std::fs::metadata(path).and_then(|m| m.modified()).ok();
                println!("[AQI] Breakpoint tables loaded from {}", path.display());
                (
                    tables,
                    Some(TableSource {
                        path: path.clone(),
                        last_modified: Mutex::new(last_modified),
                    }),
                )
            }
            None => (BreakpointTables::default(), None),
        };
        Ok(Self {
            tables: RwLock::new(tables),
            policy: config.out_of_range,
            source,
        })
    }

    pub fn with_tables(tables: BreakpointTables, policy: OutOfRangePolicy) -> Self {
        Self {
            tables: RwLock::new(tables),
            policy,
            source: None,
        }
    }

    /// Computes the AQI for a window of rows.
    ///
    /// Window sizing is the caller's job: `RollingStore::tail` already
    /// reports `InsufficientData` for short windows. Here a window where no
    /// pollutant maps is `NoMappedPollutant`.
    pub fn compute(&self, rows: &[TimeSeriesRow]) -> Result<AqiResult, MonitorError> {
        self.check_reload();
        let tables = self.tables.read().unwrap();

        let mut per_pollutant = Vec::new();
        for pollutant in Pollutant::ALL {
            let Some(mean) = window_mean(rows, pollutant) else {
                continue;
            };
            match sub_index(mean, tables.segments(pollutant)) {
                Some(index) => per_pollutant.push((pollutant, index)),
                None => match self.policy {
                    OutOfRangePolicy::Zero => per_pollutant.push((pollutant, 0)),
                    OutOfRangePolicy::Unmapped => {
                        tracing::warn!(
                            "{} mean {:.1} outside every breakpoint segment",
                            pollutant.label(),
                            mean
                        );
                    }
                },
            }
        }

        let (overall_index, dominant) =
            overall(&per_pollutant).ok_or(MonitorError::NoMappedPollutant)?;
        Ok(AqiResult {
            per_pollutant,
            overall_index,
            dominant,
            category: classify(overall_index),
        })
    }

    /// Swaps in a changed override file; keeps the old tables when the new
    /// file is broken. A bad file logs once per change.
    fn check_reload(&self) {
        let Some(source) = &self.source else {
            return;
        };
        let Ok(modified) = std::fs::metadata(&source.path).and_then(|m| m.modified()) else {
            return;
        };
        let mut last = source.last_modified.lock().unwrap();
        let changed = last.map_or(true, |t| modified > t);
        if !changed {
            return;
        }
        *last = Some(modified);
        match BreakpointTables::load(&source.path) {
            Ok(new_tables) => {
                *self.tables.write().unwrap() = new_tables;
                tracing::info!("breakpoint tables reloaded from {}", source.path.display());
            }
            Err(e) => {
                tracing::warn!(
                    "breakpoint reload failed, keeping previous tables: {:#}",
                    e
                );
            }
        }
    }
}
