//! ==============================================================================
//! config.rs - Runtime Configuration Loader
//! ==============================================================================
//!
//! purpose:
//!     defines the schema for `monitor.toml`.
//!     loads configuration from file or falls back to defaults.
//!
//! structure:
//!     - LinksConfig: serial ports, bauds and poll cadence for both sensors.
//!     - StoreConfig: rolling CSV path, row cap, combine cadence.
//!     - AqiConfig: window length, compute cadence, out-of-range policy,
//!       optional breakpoint-table override file.
//!     - TelemetryConfig: identity (node_id) and hub URL to push payloads to.
//!
//! ==============================================================================

use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Root configuration structure
#[derive(Debug, Deserialize, Clone)]
pub struct MonitorConfig {
    pub links: LinksConfig,
    pub store: StoreConfig,
    #[serde(default)]
    pub aqi: AqiConfig,
    #[serde(default)]
    pub telemetry: TelemetryConfig,
    pub server: ServerConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct LinksConfig {
    pub pm: LinkConfig,
    pub gas: LinkConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct LinkConfig {
    /// serial device path, e.g. "/dev/ttyUSB0"
    pub port: String,
    pub baud: u32,
    /// seconds between read cycles
    pub poll_seconds: u64,
    /// blocking read timeout in milliseconds
    pub read_timeout_ms: u64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct StoreConfig {
    pub path: PathBuf,
    /// data-row cap; oldest rows are evicted first
    pub max_rows: usize,
    /// seconds between combine-and-append cycles
    pub combine_seconds: u64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct AqiConfig {
    /// rows averaged per computation
    pub window_rows: usize,
    /// seconds between background computations
    pub compute_seconds: u64,
    /// "unmapped" (default) or "zero" for concentrations outside every segment
    pub out_of_range: OutOfRangePolicy,
    /// optional TOML file overriding the built-in CPCB breakpoint tables;
    /// hot-reloaded when its mtime changes
    #[serde(default)]
    pub breakpoints_path: Option<PathBuf>,
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum OutOfRangePolicy {
    /// out-of-range concentration yields no sub-index (the pollutant is
    /// omitted from the result)
    #[default]
    Unmapped,
    /// degenerate fallback used by bucket-style calculator variants
    Zero,
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct TelemetryConfig {
    pub enabled: bool,
    pub node_id: String,
    /// URL to push payloads to (webhook or hub)
    pub hub_url: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub bind: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct LoggingConfig {
    pub level: String,
    pub show_sensor_data: bool,
}

impl MonitorConfig {
    /// Load configuration from file
    pub fn load<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())
            .map_err(|e| anyhow::anyhow!("Failed to read config file: {}", e))?;

        let config: MonitorConfig = toml::from_str(&content)
            .map_err(|e| anyhow::anyhow!("Failed to parse config: {}", e))?;

        Ok(config)
    }

    /// Load with default fallback
    pub fn load_or_default() -> Self {
        let paths = [
            std::path::PathBuf::from("config").join("monitor.toml"),
            std::path::PathBuf::from("..").join("config").join("monitor.toml"),
        ];

        for path in &paths {
            if path.exists() {
                match Self::load(path) {
                    Ok(config) => {
                        println!("[CONFIG] Loaded from {}", path.display());
                        return config;
                    }
                    Err(e) => {
                        println!("[CONFIG] Warning: Failed to load {}: {}", path.display(), e);
                    }
                }
            }
        }

        println!("[CONFIG] Warning: No config file found - using defaults");
        Self::default()
    }

    /// Print configuration summary
    pub fn print_summary(&self) {
        println!("┌─────────────────────────────────────────┐");
        println!("│         MONITOR CONFIGURATION           │");
        println!("├─────────────────────────────────────────┤");
        println!("│ PM link: {} @ {}         │", self.links.pm.port, self.links.pm.baud);
        println!("│ Gas link: {} @ {}        │", self.links.gas.port, self.links.gas.baud);
        println!("│ Store: {} (cap {})       │", self.store.path.display(), self.store.max_rows);
        println!("│ AQI window: {} rows                     │", self.aqi.window_rows);
        println!("│ Log Level: {}                        │", self.logging.level);
        println!("├─────────────────────────────────────────┤");
    }
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            links: LinksConfig {
                pm: LinkConfig {
                    port: "/dev/ttyUSB0".to_string(),
                    baud: 9600,
                    poll_seconds: 2,
                    read_timeout_ms: 2000,
                },
                gas: LinkConfig {
                    port: "/dev/ttyACM0".to_string(),
                    baud: 9600,
                    poll_seconds: 1,
                    read_timeout_ms: 2000,
                },
            },
            store: StoreConfig {
                path: PathBuf::from("livedata.csv"),
                max_rows: 1440,
                combine_seconds: 15,
            },
            aqi: AqiConfig::default(),
            telemetry: TelemetryConfig::default(),
            server: ServerConfig {
                bind: "0.0.0.0:3000".to_string(),
            },
            logging: LoggingConfig {
                level: "info".to_string(),
                show_sensor_data: true,
            },
        }
    }
}

impl Default for AqiConfig {
    fn default() -> Self {
        Self {
            window_rows: 24,
            compute_seconds: 10,
            out_of_range: OutOfRangePolicy::Unmapped,
            breakpoints_path: None,
        }
    }
}
