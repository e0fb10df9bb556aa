//! Fast-simulation smearing of calorimeter cluster four-vectors
//!
//! Detector-level fast simulation replaces full shower digitization by a
//! Gaussian smearing of the cluster energy, with a resolution that depends
//! on the polar angle (barrel and endcap resolutions differ). The smearer
//! draws from an explicitly passed generator, so concurrent event streams
//! never share random state.

use crate::{numeric::Float, random::RandomGenerator, Result};
use anyhow::ensure;
use nalgebra::{Vector3, Vector4};
use prefix_num_ops::real::*;
use rand_distr::{Distribution, Normal};

/// Index of the energy component of a four-vector
const E: usize = 3;

/// Energy resolution of one polar-angle band
///
/// The relative resolution at energy `E` is `sqrt(a^2 + b^2 / E)`:
/// a constant term plus a sampling term.
#[derive(Clone, Copy, Debug)]
pub struct ClusterResolution {
    /// Constant resolution term
    pub a: Float,
    /// Sampling (stochastic) resolution term
    pub b: Float,
    /// Lower polar-angle bound of the band, exclusive, in radians
    pub theta_min: Float,
    /// Upper polar-angle bound of the band, inclusive, in radians
    pub theta_max: Float,
}

/// Polar-angle-banded Gaussian energy smearer for massless clusters
pub struct ClusterSmearer {
    resolutions: Vec<ClusterResolution>,
}
//
impl ClusterSmearer {
    /// Set up the smearer from its resolution bands
    pub fn new(resolutions: Vec<ClusterResolution>) -> Self {
        Self { resolutions }
    }

    /// Set up the smearer from the flat parameter list used in steering
    /// files: consecutive (a, b, theta_min, theta_max) quadruplets
    pub fn from_flat(parameters: &[Float]) -> Result<Self> {
        ensure!(
            parameters.len() % 4 == 0,
            "cluster resolutions must come as (a, b, thetaMin, thetaMax) quadruplets"
        );
        let resolutions = parameters
            .chunks_exact(4)
            .map(|quad| ClusterResolution {
                a: quad[0],
                b: quad[1],
                theta_min: quad[2],
                theta_max: quad[3],
            })
            .collect();
        Ok(Self::new(resolutions))
    }

    /// Smear a cluster four-vector's energy, keeping its direction
    ///
    /// Clusters are treated as massless, so the momentum is rescaled to
    /// the smeared energy. Returns `None` when no resolution band covers
    /// the cluster's polar angle.
    pub fn smear(
        &self,
        four_momentum: &Vector4<Float>,
        generator: &mut RandomGenerator,
    ) -> Option<Vector4<Float>> {
        let spatial = Vector3::new(four_momentum.x, four_momentum.y, four_momentum.z);
        let energy = four_momentum[E];
        // polar angle, folded into [0, pi/2]: the detector is symmetric
        // under z reflection
        let mut theta = sqrt(spatial.x * spatial.x + spatial.y * spatial.y).atan2(spatial.z);
        if theta > crate::numeric::reals::consts::FRAC_PI_2 {
            theta = crate::numeric::reals::consts::PI - theta;
        }
        let band = self
            .resolutions
            .iter()
            .find(|band| theta > band.theta_min && theta <= band.theta_max)?;
        let sigma = energy * sqrt(band.a * band.a + band.b * band.b / energy);
        let delta = Normal::new(0.0, sigma as f64)
            .ok()?
            .sample(generator) as Float;
        // massless cluster: rescale the momentum onto the new energy
        let smeared_energy = energy + delta;
        let direction = spatial.normalize();
        let momentum = direction * smeared_energy;
        Some(Vector4::new(
            momentum.x,
            momentum.y,
            momentum.z,
            smeared_energy,
        ))
    }
}
