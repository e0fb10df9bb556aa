//! Timing-window clustering of simulated hit contributions
//!
//! A simulated hit carries every individual particle crossing of its cell.
//! The readout electronics only integrate what arrives inside an
//! acceptance window around the collision time, so before any energy
//! smearing the contributions are reduced to (time, energy) pairs: the
//! energy collected inside the window, stamped with the earliest in-window
//! arrival.

use crate::{
    hits::SimHit,
    numeric::{constants::SPEED_OF_LIGHT_MM_PER_NS, Float},
};

/// Configuration of the contribution clustering
#[derive(Clone, Copy, Debug)]
pub struct TimingCuts {
    /// Apply the window at all? When off, the full deposited energy is
    /// taken and assigned to time zero.
    pub apply: bool,
    /// Subtract the straight-line time of flight from the interaction
    /// point before comparing against the window
    pub correct_for_propagation: bool,
    /// Window lower bound in ns (inclusive)
    pub window_min: Float,
    /// Window upper bound in ns (exclusive)
    pub window_max: Float,
}
//
impl Default for TimingCuts {
    fn default() -> Self {
        Self {
            apply: false,
            correct_for_propagation: false,
            window_min: -0.5,
            window_max: 10.0,
        }
    }
}
//
impl TimingCuts {
    /// Reduce a hit's contributions to clustered (time, energy) pairs
    ///
    /// The return shape allows several pairs per hit so that slicing a hit
    /// into multiple time buckets stays possible; the present algorithm
    /// emits at most one.
    pub fn cluster(&self, hit: &SimHit) -> Vec<(Float, Float)> {
        if !self.apply {
            // just take the full energy, assigned to time 0
            return vec![(0.0, hit.energy)];
        }
        // time of flight from the interaction point to this cell
        let time_correction = if self.correct_for_propagation {
            hit.position.coords.norm() / SPEED_OF_LIGHT_MM_PER_NS
        } else {
            0.0
        };
        // collect the energy arriving inside the window and remember the
        // earliest in-window arrival, which stamps the output pair
        let mut energy_sum = 0.0;
        let mut earliest = Float::MAX;
        for contribution in &hit.contributions {
            let relative_time = contribution.time - time_correction;
            if self.in_window(relative_time) {
                energy_sum += contribution.energy;
                if relative_time < earliest {
                    earliest = relative_time;
                }
            }
        }
        if self.in_window(earliest) {
            vec![(earliest, energy_sum)]
        } else {
            Vec::new()
        }
    }

    fn in_window(&self, time: Float) -> bool {
        time >= self.window_min && time < self.window_max
    }
}
