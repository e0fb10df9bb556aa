//! Per-layer-group calibration table
//!
//! Sampling calorimeters change absorber thickness along the shower
//! direction, so the MIP-to-shower-GeV factor is calibrated per group of
//! consecutive layers: group k covers the next `group_sizes[k]` layers and
//! scales them by `coefficients[k]`.

use crate::{numeric::Float, Result};
use anyhow::ensure;

/// Calibration coefficients per contiguous layer group
pub struct LayerCalibration {
    coefficients: Vec<Float>,
    group_sizes: Vec<u32>,
}
//
impl LayerCalibration {
    /// Validate and store the two configured tables
    ///
    /// The tables must be non-empty and of equal length; anything else is
    /// a configuration error caught before the first event.
    pub fn new(coefficients: Vec<Float>, group_sizes: Vec<u32>) -> Result<Self> {
        ensure!(
            !coefficients.is_empty() && coefficients.len() == group_sizes.len(),
            "calibration coefficient and layer group tables must have equal non-zero length"
        );
        Ok(Self {
            coefficients,
            group_sizes,
        })
    }

    /// Calibration coefficient of one layer
    ///
    /// Walks the running `[min, max)` partition spanned by the group
    /// sizes, starting at layer 0. A layer beyond the last group gets a
    /// coefficient of 0, which silently zeroes its reconstructed energy;
    /// this mirrors long-standing behaviour that downstream cuts rely on.
    pub fn layer_calib(&self, layer: u32) -> Float {
        let mut min = 0;
        let mut max = 0;
        for (coefficient, size) in self.coefficients.iter().zip(&self.group_sizes) {
            max += size;
            if layer >= min && layer < max {
                return *coefficient;
            }
            min += size;
        }
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn groups_partition_the_layers() {
        let calibration = LayerCalibration::new(vec![1.5, 2.0], vec![2, 3]).unwrap();
        // group 0 covers layers [0, 2), group 1 covers [2, 5)
        assert_eq!(calibration.layer_calib(0), 1.5);
        assert_eq!(calibration.layer_calib(1), 1.5);
        assert_eq!(calibration.layer_calib(2), 2.0);
        assert_eq!(calibration.layer_calib(4), 2.0);
        // beyond the last group the coefficient drops to zero
        assert_eq!(calibration.layer_calib(5), 0.0);
        assert_eq!(calibration.layer_calib(10), 0.0);
    }

    #[test]
    fn mismatched_tables_are_fatal() {
        assert!(LayerCalibration::new(vec![1.5], vec![2, 3]).is_err());
        assert!(LayerCalibration::new(vec![], vec![]).is_err());
    }
}
