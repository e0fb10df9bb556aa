//! Cross-event per-cell detector conditions
//!
//! Most digitization randomness is redrawn for every event, but a detector
//! channel that is miscalibrated or dead stays that way for the whole run.
//! When the corresponding keep-flags are set, the digitizer records the
//! first factor (or death sentence) drawn for each cell here and reuses it
//! for every later event.
//!
//! This is the only state in the crate whose lifetime spans events. The
//! maps are internally synchronized so that a host running parallel event
//! streams over a shared [`CellConditions`] stays memory-safe; note that
//! the lazily drawn values then depend on which event reaches a cell
//! first, so bit-exact reproducibility across runs holds only for
//! sequential processing.

use crate::numeric::Float;
use std::collections::HashMap;
use std::sync::Mutex;

/// Persistent per-cell miscalibration factors and dead-channel flags
#[derive(Default)]
pub struct CellConditions {
    miscalibrations: Mutex<HashMap<u64, Float>>,
    dead_cells: Mutex<HashMap<u64, bool>>,
}
//
impl CellConditions {
    /// Start with no cell recorded yet
    pub fn new() -> Self {
        Self::default()
    }

    /// Miscalibration factor of a cell, drawing and recording it on first
    /// encounter
    pub fn miscalibration(&self, cell_id: u64, draw: impl FnOnce() -> Float) -> Float {
        let mut map = self
            .miscalibrations
            .lock()
            .expect("cell conditions mutex poisoned");
        *map.entry(cell_id).or_insert_with(draw)
    }

    /// Dead flag of a cell, drawing and recording it on first encounter
    pub fn is_dead(&self, cell_id: u64, draw: impl FnOnce() -> bool) -> bool {
        let mut map = self
            .dead_cells
            .lock()
            .expect("cell conditions mutex poisoned");
        *map.entry(cell_id).or_insert_with(draw)
    }
}
