//! ==============================================================================
//! frame.rs - particulate sensor frame decoder
//! ==============================================================================
//!
//! purpose:
//!     decodes the SDS011's fixed 10-byte binary frames out of a raw byte
//!     stream. the stream offers no alignment guarantees - frames may straddle
//!     reads, and line noise can corrupt any byte - so the decoder keeps a
//!     sliding window and rescans after every rejection.
//!
//! frame layout:
//!     AA C0 <pm25_lo> <pm25_hi> <pm10_lo> <pm10_hi> <id1> <id2> <checksum> AB
//!     checksum = sum of bytes 2..=7 mod 256
//!
//! relationships:
//!     - fed by: tasks.rs (pm decoder loop, reading from link.rs)
//!     - emits: PmFrame, published as one event into state.rs
//!
//! ==============================================================================

use crate::error::MonitorError;

pub const FRAME_LEN: usize = 10;

const HEAD: u8 = 0xAA;
const CMD: u8 = 0xC0;
const TAIL: u8 = 0xAB;

/// One decoded particulate sample, µg/m³.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PmFrame {
    pub pm25: f64,
    pub pm10: f64,
}

/// sum of bytes 2..=7 mod 256
pub fn checksum(frame: &[u8; FRAME_LEN]) -> u8 {
    frame[2..8].iter().fold(0u32, |acc, b| acc + u32::from(*b)) as u8
}

/// Validates markers and checksum of a full window.
pub fn validate(frame: &[u8; FRAME_LEN]) -> Result<(), MonitorError> {
    if frame[0] != HEAD || frame[1] != CMD {
        return Err(MonitorError::FrameInvalid {
            reason: "bad header markers",
            frame: hex::encode(frame),
        });
    }
    if frame[FRAME_LEN - 1] != TAIL {
        return Err(MonitorError::FrameInvalid {
            reason: "bad tail marker",
            frame: hex::encode(frame),
        });
    }
    if checksum(frame) != frame[8] {
        return Err(MonitorError::FrameInvalid {
            reason: "checksum mismatch",
            frame: hex::encode(frame),
        });
    }
    Ok(())
}

/// Stateful sliding-window decoder.
///
/// Feed it bytes in whatever chunk sizes the link delivers; it emits a
/// `PmFrame` for every valid frame and silently rescans past rejected ones.
/// It never fails - a decoder survives arbitrary garbage indefinitely.
pub struct FrameDecoder {
    window: [u8; FRAME_LEN],
    len: usize,
    accepted: u64,
    rejected: u64,
}

impl FrameDecoder {
    pub fn new() -> Self {
        Self {
            window: [0; FRAME_LEN],
            len: 0,
            accepted: 0,
            rejected: 0,
        }
    }

    /// Pushes one byte; returns a frame when the window completes and
    /// validates.
    pub fn push(&mut self, byte: u8) -> Option<PmFrame> {
        // a frame can only start at a head marker; skip stray bytes cheaply
        if self.len == 0 && byte != HEAD {
            return None;
        }
        self.window[self.len] = byte;
        self.len += 1;
        if self.len < FRAME_LEN {
            return None;
        }
        match validate(&self.window) {
            Ok(()) => {
                self.len = 0;
                self.accepted += 1;
                Some(self.decode())
            }
            Err(e) => {
                self.rejected += 1;
                tracing::warn!("pm frame rejected: {}", e);
                self.resync();
                None
            }
        }
    }

    /// Feeds a chunk, collecting every frame it completes.
    pub fn feed(&mut self, bytes: &[u8]) -> Vec<PmFrame> {
        bytes.iter().filter_map(|b| self.push(*b)).collect()
    }

    pub fn accepted(&self) -> u64 {
        self.accepted
    }

    pub fn rejected(&self) -> u64 {
        self.rejected
    }

    fn decode(&self) -> PmFrame {
        let w = &self.window;
        PmFrame {
            pm25: f64::from(u16::from(w[2]) + u16::from(w[3]) * 256) / 10.0,
            pm10: f64::from(u16::from(w[4]) + u16::from(w[5]) * 256) / 10.0,
        }
    }

    /// Slides the window to the next head-marker candidate after a rejection.
    fn resync(&mut self) {
        match self.window[1..].iter().position(|&b| b == HEAD) {
            Some(i) => {
                self.window.copy_within(i + 1.., 0);
                self.len = FRAME_LEN - (i + 1);
            }
            None => self.len = 0,
        }
    }
}

impl Default for FrameDecoder {
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

    /// builds a valid frame for the given decivalues (µg/m³ × 10)
    fn frame(pm25_deci: u16, pm10_deci: u16) -> [u8; FRAME_LEN] {
        let mut f = [0u8; FRAME_LEN];
        f[0] = HEAD;
        f[1] = CMD;
        f[2] = (pm25_deci & 0xFF) as u8;
        f[3] = (pm25_deci >> 8) as u8;
        f[4] = (pm10_deci & 0xFF) as u8;
        f[5] = (pm10_deci >> 8) as u8;
        f[6] = 0x01;
        f[7] = 0x02;
        f[8] = checksum(&f);
        f[9] = TAIL;
        f
    }

    #[test]
    fn test_valid_frame_decodes() {
        let mut dec = FrameDecoder::new();
        // 125 deci = 12.5 µg/m³, 438 deci = 43.8 µg/m³ (exercises the hi byte)
        let frames = dec.feed(&frame(125, 438));
        assert_eq!(
            frames,
            vec![PmFrame {
                pm25: 12.5,
                pm10: 43.8
            }]
        );
        assert_eq!(dec.accepted(), 1);
        assert_eq!(dec.rejected(), 0);
    }

    #[test]
    fn test_decode_formula() {
        // pm25 = (b2 + b3*256)/10, pm10 = (b4 + b5*256)/10
        let mut dec = FrameDecoder::new();
        let f = frame(0x01FF, 0x0203);
        let frames = dec.feed(&f);
        assert_eq!(frames[0].pm25, f64::from(0xFF + 0x01 * 256) / 10.0);
        assert_eq!(frames[0].pm10, f64::from(0x03 + 0x02 * 256) / 10.0);
    }

    #[test]
    fn test_checksum_mismatch_rejected() {
        let mut corrupted = frame(125, 438);
        corrupted[8] = corrupted[8].wrapping_add(1);
        let mut dec = FrameDecoder::new();
        assert!(dec.feed(&corrupted).is_empty());
        assert_eq!(dec.rejected(), 1);

        // decoder resumes scanning: the next valid frame still decodes
        let frames = dec.feed(&frame(80, 200));
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].pm25, 8.0);
    }

    #[test]
    fn test_bad_markers_rejected() {
        let mut bad_cmd = frame(125, 438);
        bad_cmd[1] = 0xC1;
        let mut dec = FrameDecoder::new();
        assert!(dec.feed(&bad_cmd).is_empty());
        assert_eq!(dec.rejected(), 1);

        let mut bad_tail = frame(125, 438);
        bad_tail[9] = 0x00;
        bad_tail[8] = checksum(&bad_tail);
        let mut dec = FrameDecoder::new();
        assert!(dec.feed(&bad_tail).is_empty());
        assert_eq!(dec.rejected(), 1);
    }

    #[test]
    fn test_frame_straddles_reads() {
        let f = frame(125, 438);
        let mut dec = FrameDecoder::new();
        assert!(dec.feed(&f[..3]).is_empty());
        assert!(dec.feed(&f[3..7]).is_empty());
        let frames = dec.feed(&f[7..]);
        assert_eq!(frames.len(), 1);
    }

    #[test]
    fn test_garbage_prefix_skipped() {
        let mut stream = vec![0x00, 0x13, 0x37, 0xFF];
        stream.extend_from_slice(&frame(125, 438));
        let mut dec = FrameDecoder::new();
        let frames = dec.feed(&stream);
        assert_eq!(frames.len(), 1);
        // stray bytes before the head marker are not counted as rejections
        assert_eq!(dec.rejected(), 0);
    }

    #[test]
    fn test_back_to_back_frames() {
        let mut stream = Vec::new();
        stream.extend_from_slice(&frame(100, 300));
        stream.extend_from_slice(&frame(110, 310));
        let mut dec = FrameDecoder::new();
        let frames = dec.feed(&stream);
        assert_eq!(frames.len(), 2);
        assert_eq!(frames[0].pm25, 10.0);
        assert_eq!(frames[1].pm25, 11.0);
    }

    #[test]
    fn test_recovers_after_truncated_frame() {
        // a frame cut short mid-stream, immediately followed by a full one:
        // the decoder must reject the mangled window and still find the
        // genuine frame behind it
        let good = frame(90, 250);
        let mut stream = Vec::new();
        stream.extend_from_slice(&frame(100, 300)[..6]);
        stream.extend_from_slice(&good);
        let mut dec = FrameDecoder::new();
        let frames = dec.feed(&stream);
        assert_eq!(frames.last(), Some(&PmFrame { pm25: 9.0, pm10: 25.0 }));
        assert!(dec.rejected() >= 1);
    }
}
