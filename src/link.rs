//! ==============================================================================
//! link.rs - sensor link abstraction
//! ==============================================================================
//!
//! purpose:
//!     provides byte-level access to the two serial sensor links:
//!     - link A: SDS011 particulate sensor (binary framing)
//!     - link B: gas sensor board (newline-delimited text)
//!     abstracts away the difference between running on a real Raspberry Pi
//!     (using `rppal`) and a development machine (using simulated links).
//!
//! design philosophy:
//!     - "Compile Anywhere": The monitor should compile on Windows/Mac/Linux.
//!     - "Zero Cost": On the Pi, this compiles down to direct `rppal` calls.
//!
//! relationships:
//!     - used by: tasks.rs (decoder loops own one link each)
//!     - uses: rppal::uart (on feature="hardware")
//!
//! ==============================================================================

use crate::config::LinkConfig;
use crate::error::MonitorError;

/// A byte-stream sensor link.
///
/// `read` blocks up to the configured timeout; `Ok(0)` means no data arrived
/// this cycle (not an error). Any I/O failure is `LinkUnavailable` - the
/// caller drops the link and reopens it on its next cycle.
pub trait SensorLink: Send {
    fn read(&mut self, buf: &mut [u8]) -> Result<usize, MonitorError>;
}

// ==============================================================================================
// SIMULATED IMPLEMENTATION (For Development / Non-Hardware Build)
// ==============================================================================================

/// Emits one well-formed SDS011 frame per read, with slowly drifting values.
#[cfg(not(feature = "hardware"))]
pub struct SimulatedPmLink {
    seq: u32,
}

#[cfg(not(feature = "hardware"))]
impl SimulatedPmLink {
    pub fn new() -> Self {
        tracing::info!("using SIMULATED pm link (no hardware access)");
        Self { seq: 0 }
    }

    /// Builds a valid 10-byte frame for the given decivalues (µg/m³ × 10).
    pub fn encode_frame(pm25_deci: u16, pm10_deci: u16) -> [u8; 10] {
        let mut frame = [0u8; 10];
        frame[0] = 0xAA;
        frame[1] = 0xC0;
        frame[2] = (pm25_deci & 0xFF) as u8;
        frame[3] = (pm25_deci >> 8) as u8;
        frame[4] = (pm10_deci & 0xFF) as u8;
        frame[5] = (pm10_deci >> 8) as u8;
        // bytes 6-7 carry the device id on real hardware
        frame[6] = 0x42;
        frame[7] = 0x4D;
        frame[8] = crate::frame::checksum(&frame);
        frame[9] = 0xAB;
        frame
    }
}

#[cfg(not(feature = "hardware"))]
impl SensorLink for SimulatedPmLink {
    fn read(&mut self, buf: &mut [u8]) -> Result<usize, MonitorError> {
        self.seq = self.seq.wrapping_add(1);
        // drift around 12.0 / 40.0 µg/m³
        let pm25_deci = 120 + (self.seq * 7 % 40) as u16;
        let pm10_deci = 400 + (self.seq * 11 % 90) as u16;
        let frame = Self::encode_frame(pm25_deci, pm10_deci);
        let n = frame.len().min(buf.len());
        buf[..n].copy_from_slice(&frame[..n]);
        tracing::debug!("[sim pm] emitted frame seq={}", self.seq);
        Ok(n)
    }
}

/// Emits one `CO,NO2,O3` line per read.
#[cfg(not(feature = "hardware"))]
pub struct SimulatedGasLink {
    seq: u32,
}

#[cfg(not(feature = "hardware"))]
impl SimulatedGasLink {
    pub fn new() -> Self {
        tracing::info!("using SIMULATED gas link (no hardware access)");
        Self { seq: 0 }
    }
}

#[cfg(not(feature = "hardware"))]
impl SensorLink for SimulatedGasLink {
    fn read(&mut self, buf: &mut [u8]) -> Result<usize, MonitorError> {
        self.seq = self.seq.wrapping_add(1);
        let co = 0.8 + f64::from(self.seq % 5) * 0.1;
        let no2 = 24.0 + f64::from(self.seq % 9);
        let o3 = 30.0 + f64::from(self.seq % 7);
        let line = format!("{:.1},{:.1},{:.1}\n", co, no2, o3);
        let bytes = line.as_bytes();
        let n = bytes.len().min(buf.len());
        buf[..n].copy_from_slice(&bytes[..n]);
        tracing::debug!("[sim gas] emitted line seq={}", self.seq);
        Ok(n)
    }
}

#[cfg(not(feature = "hardware"))]
pub fn open_pm_link(_cfg: &LinkConfig) -> Result<Box<dyn SensorLink>, MonitorError> {
    Ok(Box::new(SimulatedPmLink::new()))
}

#[cfg(not(feature = "hardware"))]
pub fn open_gas_link(_cfg: &LinkConfig) -> Result<Box<dyn SensorLink>, MonitorError> {
    Ok(Box::new(SimulatedGasLink::new()))
}

// ==============================================================================================
// REAL IMPLEMENTATION (For Raspberry Pi)
// ==============================================================================================

#[cfg(feature = "hardware")]
pub struct UartLink {
    uart: rppal::uart::Uart,
    port: String,
}

#[cfg(feature = "hardware")]
impl UartLink {
    pub fn open(cfg: &LinkConfig) -> Result<Self, MonitorError> {
        use rppal::uart::{Parity, Uart};
        use std::time::Duration;

        let mut uart = Uart::with_path(&cfg.port, cfg.baud, Parity::None, 8, 1)
            .map_err(|e| MonitorError::LinkUnavailable(format!("{}: {}", cfg.port, e)))?;
        // block until at least one byte or the timeout elapses
        uart.set_read_mode(1, Duration::from_millis(cfg.read_timeout_ms))
            .map_err(|e| MonitorError::LinkUnavailable(format!("{}: {}", cfg.port, e)))?;
        tracing::info!("opened uart link {} @ {} baud", cfg.port, cfg.baud);
        Ok(Self {
            uart,
            port: cfg.port.clone(),
        })
    }
}

#[cfg(feature = "hardware")]
impl SensorLink for UartLink {
    fn read(&mut self, buf: &mut [u8]) -> Result<usize, MonitorError> {
        self.uart
            .read(buf)
            .map_err(|e| MonitorError::LinkUnavailable(format!("{}: {}", self.port, e)))
    }
}

#[cfg(feature = "hardware")]
pub fn open_pm_link(cfg: &LinkConfig) -> Result<Box<dyn SensorLink>, MonitorError> {
    Ok(Box::new(UartLink::open(cfg)?))
}

#[cfg(feature = "hardware")]
pub fn open_gas_link(cfg: &LinkConfig) -> Result<Box<dyn SensorLink>, MonitorError> {
    Ok(Box::new(UartLink::open(cfg)?))
}
