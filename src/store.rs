//! ==============================================================================
//! store.rs - bounded rolling time-series store
//! ==============================================================================
//!
//! purpose:
//!     persists combined sensor rows to a CSV file the dashboard and the
//!     forecaster both read. the file is capped at `max_rows` data rows -
//!     oldest evicted first - with the header always preserved.
//!
//! crash tolerance:
//!     every mutation rewrites the file to a sibling temp path and renames it
//!     into place. rename is atomic on the same filesystem, so a writer dying
//!     mid-cycle leaves either the old file or the new one, never a torn mix,
//!     and concurrent readers always see a complete file.
//!
//! relationships:
//!     - written by: tasks.rs (store writer, the single writer task)
//!     - read by: aqi.rs consumers via tail(), external processes (forecaster)
//!
//! ==============================================================================

use crate::domain::TimeSeriesRow;
use crate::error::MonitorError;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

pub struct RollingStore {
    path: PathBuf,
    max_rows: usize,
    /// serializes all file mutation; one writer task exists today, but the
    /// trim invariant must survive any future second caller
    lock: Mutex<()>,
}

impl RollingStore {
    /// Opens the store, creating the file with its header when missing or
    /// empty.
    pub fn open<P: AsRef<Path>>(path: P, max_rows: usize) -> Result<Self, MonitorError> {
        let store = Self {
            path: path.as_ref().to_path_buf(),
            max_rows,
            lock: Mutex::new(()),
        };
        let needs_header = match fs::metadata(&store.path) {
            Ok(meta) => meta.len() == 0,
            Err(_) => true,
        };
        if needs_header {
            let _guard = store.lock.lock().unwrap();
            store.write_file(&[])?;
            tracing::info!("initialized rolling store at {}", store.path.display());
        }
        Ok(store)
    }

    /// Appends one row, then trims to `max_rows` newest data rows.
    pub fn append(&self, row: &TimeSeriesRow) -> Result<(), MonitorError> {
        let _guard = self.lock.lock().unwrap();
        let mut rows = self.read_rows()?;
        rows.push(row.clone());
        if rows.len() > self.max_rows {
            let excess = rows.len() - self.max_rows;
            rows.drain(..excess);
        }
        self.write_file(&rows)
    }

    /// The most recent `n` rows in chronological order, or the short-read
    /// indicator when fewer exist.
    pub fn tail(&self, n: usize) -> Result<Vec<TimeSeriesRow>, MonitorError> {
        let _guard = self.lock.lock().unwrap();
        let rows = self.read_rows()?;
        if rows.len() < n {
            return Err(MonitorError::InsufficientData {
                have: rows.len(),
                need: n,
            });
        }
        Ok(rows[rows.len() - n..].to_vec())
    }

    /// Current data-row count.
    pub fn row_count(&self) -> Result<usize, MonitorError> {
        let _guard = self.lock.lock().unwrap();
        Ok(self.read_rows()?.len())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Reads every data row, skipping the header and any malformed line (a
    /// remnant of a foreign writer or a pre-rename crash of an old version).
    fn read_rows(&self) -> Result<Vec<TimeSeriesRow>, MonitorError> {
        let content = fs::read_to_string(&self.path)?;
        let mut rows = Vec::new();
        for line in content.lines() {
            if line == TimeSeriesRow::HEADER || line.is_empty() {
                continue;
            }
            match TimeSeriesRow::from_csv_line(line) {
                Some(row) => rows.push(row),
                None => tracing::warn!("skipping malformed store line: {:?}", line),
            }
        }
        Ok(rows)
    }

    /// Writes header + rows to a temp file, syncs, and renames into place.
    fn write_file(&self, rows: &[TimeSeriesRow]) -> Result<(), MonitorError> {
        let tmp_path = self.tmp_path();
        {
            let mut file = fs::File::create(&tmp_path)?;
            let mut content = String::with_capacity((rows.len() + 1) * 48);
            content.push_str(TimeSeriesRow::HEADER);
            content.push('\n');
            for row in rows {
                content.push_str(&row.to_csv_line());
                content.push('\n');
            }
            file.write_all(content.as_bytes())?;
            file.sync_all()?;
        }
        fs::rename(&tmp_path, &self.path)?;
        Ok(())
    }

    fn tmp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_else(|| "store".into());
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}
