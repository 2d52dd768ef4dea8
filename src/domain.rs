//! ==============================================================================
//! domain.rs - shared data types
//! ==============================================================================
//!
//! purpose:
//!     the types that flow between the decoders, the shared reading state,
//!     the rolling store and the AQI engine.
//!
//! relationships:
//!     - produced by: frame.rs, line.rs (readings), store.rs (rows)
//!     - consumed by: state.rs, store.rs, aqi.rs, telemetry.rs, main.rs
//!
//! ==============================================================================

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};

/// Row timestamp format: local time, minute precision.
pub const TIMESTAMP_FORMAT: &str = "%d-%m-%Y %H:%M";

/// The five pollutants the station measures.
///
/// `ALL` is the canonical precedence order. Ties in the overall AQI resolve
/// to the first pollutant in this order, so don't reorder it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Pollutant {
    Pm25,
    Pm10,
    No2,
    Co,
    O3,
}

impl Pollutant {
    pub const ALL: [Pollutant; 5] = [
        Pollutant::Pm25,
        Pollutant::Pm10,
        Pollutant::No2,
        Pollutant::Co,
        Pollutant::O3,
    ];

    /// Display label, matching the store header and API keys.
    pub fn label(self) -> &'static str {
        match self {
            Pollutant::Pm25 => "PM2.5",
            Pollutant::Pm10 => "PM10",
            Pollutant::No2 => "NO2",
            Pollutant::Co => "CO",
            Pollutant::O3 => "O3",
        }
    }

    /// Flat key for the telemetry payload (e.g. "pm25").
    pub fn key(self) -> &'static str {
        match self {
            Pollutant::Pm25 => "pm25",
            Pollutant::Pm10 => "pm10",
            Pollutant::No2 => "no2",
            Pollutant::Co => "co",
            Pollutant::O3 => "o3",
        }
    }

    /// Slot index in per-pollutant arrays (canonical order).
    pub fn slot(self) -> usize {
        match self {
            Pollutant::Pm25 => 0,
            Pollutant::Pm10 => 1,
            Pollutant::No2 => 2,
            Pollutant::Co => 3,
            Pollutant::O3 => 4,
        }
    }
}

/// One decoded sensor value. Immutable once produced.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PollutantReading {
    pub pollutant: Pollutant,
    /// µg/m³ for PM2.5/PM10/NO2/O3, mg/m³ for CO (sensor-native units)
    pub concentration: f64,
    pub observed_at: DateTime<Local>,
}

/// One combined sample, as persisted in the rolling store.
///
/// Values sit in canonical pollutant order. A `None` cell round-trips as an
/// empty CSV field; the writer task only appends complete rows, so `None`
/// normally only appears when re-reading a file produced elsewhere.
#[derive(Debug, Clone, PartialEq)]
pub struct TimeSeriesRow {
    /// local time, minute precision, `DD-MM-YYYY HH:MM`
    pub timestamp: String,
    pub values: [Option<f64>; 5],
}

impl TimeSeriesRow {
    pub const HEADER: &'static str = "Timestamp,PM2.5,PM10,NO2,CO,O3";

    /// Builds a row stamped with the current local minute.
    pub fn now(values: [Option<f64>; 5]) -> Self {
        Self {
            timestamp: Local::now().format(TIMESTAMP_FORMAT).to_string(),
            values,
        }
    }

    pub fn get(&self, pollutant: Pollutant) -> Option<f64> {
        self.values[pollutant.slot()]
    }

    pub fn to_csv_line(&self) -> String {
        let mut line = self.timestamp.clone();
        for value in &self.values {
            line.push(',');
            if let Some(v) = value {
                line.push_str(&v.to_string());
            }
        }
        line
    }

    /// Parses one data line. `None` means the line is malformed (wrong field
    /// count or unparseable number) and should be skipped by the reader.
    pub fn from_csv_line(line: &str) -> Option<Self> {
        let mut fields = line.split(',');
        let timestamp = fields.next()?.to_string();
        if timestamp.is_empty() {
            return None;
        }
        let mut values = [None; 5];
        for slot in values.iter_mut() {
            let field = fields.next()?;
            if field.is_empty() {
                continue;
            }
            *slot = Some(field.trim().parse::<f64>().ok()?);
        }
        // trailing fields mean the line isn't ours
        if fields.next().is_some() {
            return None;
        }
        Some(Self { timestamp, values })
    }
}

/// CPCB severity buckets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum AqiCategory {
    Good,
    Satisfactory,
    Moderate,
    Poor,
    VeryPoor,
    Severe,
}

impl AqiCategory {
    pub fn label(self) -> &'static str {
        match self {
            AqiCategory::Good => "Good",
            AqiCategory::Satisfactory => "Satisfactory",
            AqiCategory::Moderate => "Moderate",
            AqiCategory::Poor => "Poor",
            AqiCategory::VeryPoor => "Very Poor",
            AqiCategory::Severe => "Severe",
        }
    }
}

/// Computed AQI for one window. Derived data - recomputed per request, never
/// persisted as authoritative state.
#[derive(Debug, Clone, PartialEq)]
pub struct AqiResult {
    /// mapped sub-indices only, in canonical pollutant order. pollutants whose
    /// window mean fell outside every breakpoint segment are absent.
    pub per_pollutant: Vec<(Pollutant, u16)>,
    pub overall_index: u16,
    pub dominant: Pollutant,
    pub category: AqiCategory,
}

impl AqiResult {
    /// `{"PM2.5": 120, ...}`, the shape the dashboard consumes.
    pub fn per_pollutant_json(&self) -> serde_json::Map<String, serde_json::Value> {
        self.per_pollutant
            .iter()
            .map(|(p, idx)| (p.label().to_string(), serde_json::Value::from(*idx)))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_row_csv_round_trip() {
        let row = TimeSeriesRow {
            timestamp: "07-08-2026 14:30".to_string(),
            values: [Some(12.5), Some(40.0), Some(18.2), Some(0.9), Some(33.0)],
        };
        let line = row.to_csv_line();
        assert_eq!(line, "07-08-2026 14:30,12.5,40,18.2,0.9,33");
        assert_eq!(TimeSeriesRow::from_csv_line(&line), Some(row));
    }

    #[test]
    fn test_row_with_missing_cell() {
        let row = TimeSeriesRow::from_csv_line("07-08-2026 14:30,12.5,,18.2,0.9,33")
            .expect("row with empty cell should parse");
        assert_eq!(row.get(Pollutant::Pm10), None);
        assert_eq!(row.get(Pollutant::Pm25), Some(12.5));
    }

    #[test]
    fn test_malformed_row_rejected() {
        // wrong field count
        assert_eq!(TimeSeriesRow::from_csv_line("07-08-2026 14:30,1,2,3"), None);
        // non-numeric cell
        assert_eq!(
            TimeSeriesRow::from_csv_line("07-08-2026 14:30,abc,2,3,4,5"),
            None
        );
        // truncated write remnant with extra fields
        assert_eq!(
            TimeSeriesRow::from_csv_line("07-08-2026 14:30,1,2,3,4,5,6"),
            None
        );
    }

    #[test]
    fn test_canonical_order_is_stable() {
        let labels: Vec<_> = Pollutant::ALL.iter().map(|p| p.label()).collect();
        assert_eq!(labels, ["PM2.5", "PM10", "NO2", "CO", "O3"]);
        for (i, p) in Pollutant::ALL.iter().enumerate() {
            assert_eq!(p.slot(), i);
        }
    }
}
