//! ==============================================================================
//! state.rs - shared latest-reading state
//! ==============================================================================
//!
//! purpose:
//!     the one resource both decoders write and the combiner reads: a
//!     per-pollutant cache of the most recent decoded value. no history is
//!     kept here - the rolling store owns that.
//!
//! concurrency contract:
//!     - publish() takes the write lock ONCE per decode event, so the PM pair
//!       and the gas triple each land atomically. a snapshot can never see
//!       half of one event.
//!     - snapshot() never blocks waiting for data; absent pollutants stay
//!       absent. readers get "most recent known value, age unspecified" -
//!       each reading carries its own observed_at.
//!
//! relationships:
//!     - written by: tasks.rs (pm and gas decoder loops)
//!     - read by: tasks.rs (store writer), main.rs (readings endpoint)
//!
//! ==============================================================================

use crate::domain::{Pollutant, PollutantReading};
use chrono::Local;
use std::sync::RwLock;

/// Process-wide latest-value cache. Exactly one instance, shared by handle.
pub struct ReadingState {
    slots: RwLock<[Option<PollutantReading>; 5]>,
}

/// A point-in-time copy of the cache.
#[derive(Debug, Clone, Copy, Default)]
pub struct Snapshot {
    slots: [Option<PollutantReading>; 5],
}

impl ReadingState {
    pub fn new() -> Self {
        Self {
            slots: RwLock::new([None; 5]),
        }
    }

    /// Publishes one decode event. All values in the slice become visible
    /// together; values never revert to absent once set.
    pub fn publish(&self, event: &[(Pollutant, f64)]) {
        let observed_at = Local::now();
        let mut slots = self.slots.write().unwrap();
        for (pollutant, concentration) in event {
            slots[pollutant.slot()] = Some(PollutantReading {
                pollutant: *pollutant,
                concentration: *concentration,
                observed_at,
            });
        }
    }

    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            slots: *self.slots.read().unwrap(),
        }
    }
}

impl Default for ReadingState {
    fn default() -> Self {
        Self::new()
    }
}

impl Snapshot {
    pub fn get(&self, pollutant: Pollutant) -> Option<PollutantReading> {
        self.slots[pollutant.slot()]
    }

    pub fn concentration(&self, pollutant: Pollutant) -> Option<f64> {
        self.get(pollutant).map(|r| r.concentration)
    }

    /// True once every pollutant has reported at least once. The store writer
    /// gates its first append on this.
    pub fn is_complete(&self) -> bool {
        self.slots.iter().all(|slot| slot.is_some())
    }

    /// Row cells in canonical pollutant order.
    pub fn row_values(&self) -> [Option<f64>; 5] {
        let mut values = [None; 5];
        for (value, slot) in values.iter_mut().zip(&self.slots) {
            *value = slot.map(|r| r.concentration);
        }
        values
    }
}
