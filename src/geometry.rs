//! Reduced detector-description interface
//!
//! The gap filler only needs two numbers per calorimeter layer: the cell
//! pitch along each readout axis. This module models that slice of the
//! detector description, keyed by detector region.

use crate::{hittype::Layout, numeric::Float};

/// Cell pitches of one calorimeter layer, in mm
#[derive(Clone, Copy, Debug)]
pub struct LayerPitch {
    /// Cell period along the first readout axis
    pub cell_size_a: Float,
    /// Cell period along the second readout axis
    pub cell_size_b: Float,
}

/// Per-layer geometry of one calorimeter region
#[derive(Clone, Debug)]
pub struct LayeredGeometry {
    /// The region this description covers
    pub layout: Layout,
    /// Pitches per layer, indexed by layer number
    pub layers: Vec<LayerPitch>,
}
//
impl LayeredGeometry {
    /// Uniform-pitch description, the common case for test setups
    pub fn uniform(layout: Layout, num_layers: usize, pitch: Float) -> Self {
        Self {
            layout,
            layers: vec![
                LayerPitch {
                    cell_size_a: pitch,
                    cell_size_b: pitch,
                };
                num_layers
            ],
        }
    }
}
