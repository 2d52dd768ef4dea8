//! ==============================================================================
//! line.rs - gas sensor line parser
//! ==============================================================================
//!
//! purpose:
//!     turns the gas board's byte stream into (CO, NO2, O3) records. the board
//!     writes one comma-separated line per sample, newline-terminated. records
//!     are all-or-nothing: a malformed line never yields a partial update, so
//!     stale and fresh gas values can't mix.
//!
//! wire format:
//!     "<co>,<no2>,<o3>\n"  - three decimal numbers, positional
//!
//! relationships:
//!     - fed by: tasks.rs (gas parser loop, reading from link.rs)
//!     - emits: GasRecord, published as one event into state.rs
//!
//! ==============================================================================

use crate::error::MonitorError;

/// Longest plausible record; anything beyond this without a newline is noise.
const MAX_PENDING: usize = 1024;

/// One complete gas sample.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GasRecord {
    pub co: f64,
    pub no2: f64,
    pub o3: f64,
}

/// Parses one record. Wrong field count or a non-numeric field rejects the
/// whole line.
pub fn parse_record(line: &str) -> Result<GasRecord, MonitorError> {
    let fields: Vec<&str> = line.split(',').collect();
    if fields.len() != 3 {
        return Err(MonitorError::ParseError(format!(
            "expected 3 fields, got {} in {:?}",
            fields.len(),
            line
        )));
    }
    let mut values = [0f64; 3];
    for (slot, field) in values.iter_mut().zip(&fields) {
        *slot = field.trim().parse::<f64>().map_err(|_| {
            MonitorError::ParseError(format!("non-numeric field {:?} in {:?}", field, line))
        })?;
    }
    Ok(GasRecord {
        co: values[0],
        no2: values[1],
        o3: values[2],
    })
}

/// Accumulates link bytes and yields a record per complete, well-formed line.
pub struct LineParser {
    pending: String,
    discarded: u64,
}

impl LineParser {
    pub fn new() -> Self {
        Self {
            pending: String::new(),
            discarded: 0,
        }
    }

    /// Feeds a chunk, collecting every record completed by it. Malformed
    /// lines are logged and dropped; blank lines are ignored as link noise.
    pub fn feed(&mut self, bytes: &[u8]) -> Vec<GasRecord> {
        // the protocol is plain ascii; junk bytes become U+FFFD and fail the
        // numeric parse below
        self.pending.push_str(&String::from_utf8_lossy(bytes));

        let mut records = Vec::new();
        while let Some(pos) = self.pending.find('\n') {
            let line: String = self.pending.drain(..=pos).collect();
            let line = line.trim_end_matches(['\n', '\r']);
            if line.is_empty() {
                continue;
            }
            match parse_record(line) {
                Ok(record) => records.push(record),
                Err(e) => {
                    self.discarded += 1;
                    tracing::warn!("gas record dropped: {}", e);
                }
            }
        }

        if self.pending.len() > MAX_PENDING {
            tracing::warn!(
                "gas link produced {} bytes with no newline, flushing",
                self.pending.len()
            );
            self.pending.clear();
        }
        records
    }

    pub fn discarded(&self) -> u64 {
        self.discarded
    }
}

impl Default for LineParser {
    fn default() -> Self {
        Self::new()
    }
}

// ==============================================================================
// tests
// ==============================================================================
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_record() {
        let record = parse_record("0.8,24.5,31.2").expect("should parse");
        assert_eq!(
            record,
            GasRecord {
                co: 0.8,
                no2: 24.5,
                o3: 31.2
            }
        );
    }

    #[test]
    fn test_wrong_field_count_rejected() {
        assert!(parse_record("0.8,24.5").is_err());
        assert!(parse_record("0.8,24.5,31.2,99.0").is_err());
    }

    #[test]
    fn test_non_numeric_field_rejected() {
        // no partial update: the whole record fails even though two fields
        // are fine
        assert!(parse_record("0.8,abc,31.2").is_err());
    }

    #[test]
    fn test_feed_across_chunks() {
        let mut parser = LineParser::new();
        assert!(parser.feed(b"0.8,24").is_empty());
        assert!(parser.feed(b".5,31").is_empty());
        let records = parser.feed(b".2\n1.0,25.0,30.0\n");
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].no2, 24.5);
        assert_eq!(records[1].co, 1.0);
    }

    #[test]
    fn test_crlf_tolerated() {
        let mut parser = LineParser::new();
        let records = parser.feed(b"0.8,24.5,31.2\r\n");
        assert_eq!(records.len(), 1);
    }

    #[test]
    fn test_malformed_line_skipped_stream_continues() {
        let mut parser = LineParser::new();
        let records = parser.feed(b"garbage line\n0.8,24.5,31.2\n");
        assert_eq!(records.len(), 1);
        assert_eq!(parser.discarded(), 1);
    }

    #[test]
    fn test_blank_lines_ignored() {
        let mut parser = LineParser::new();
        let records = parser.feed(b"\n\r\n0.8,24.5,31.2\n");
        assert_eq!(records.len(), 1);
        assert_eq!(parser.discarded(), 0);
    }

    #[test]
    fn test_runaway_noise_flushed() {
        let mut parser = LineParser::new();
        let noise = vec![b'x'; 2000];
        assert!(parser.feed(&noise).is_empty());
        // buffer was flushed; a fresh record still parses
        let records = parser.feed(b"0.8,24.5,31.2\n");
        assert_eq!(records.len(), 1);
    }
}
