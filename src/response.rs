//! Technology-specific detector response models
//!
//! The digitization chain is technology-blind except for one step: turning
//! a deposited energy into what the readout actually measures. The two
//! readout families in use are modeled here as a closed set of strategies:
//!
//! * silicon diodes, which count electron-hole pairs and report in MIP
//!   units,
//! * scintillator tiles read out by pixelated photodetectors (SiPM/MPPC),
//!   which count photoelectrons and saturate as pixels run out.
//!
//! Each strategy also knows how to convert between the supported energy
//! scales (for threshold handling) and how to invert its own response
//! (for reconstruction).

use crate::{numeric::Float, random::RandomGenerator, units::EnergyScale, Result};
use anyhow::bail;
use prefix_num_ops::real::*;
use rand_distr::{Binomial, Distribution, Normal, Poisson};

/// Fraction of the pixel count above which the log de-saturation is
/// replaced by its linear continuation; 0.95 corresponds to an energy
/// correction of roughly a factor 3.
const LINEARIZATION_FRACTION: Float = 0.95;

/// Silicon diode readout parameters
#[derive(Clone, Copy, Debug)]
pub struct SiliconResponse {
    /// Most probable MIP energy deposit in the active material, in GeV
    pub mip_gev: Float,
    /// Energy required to create one electron-hole pair, in eV;
    /// non-positive disables the pair-counting fluctuation
    pub eh_pair_ev: Float,
}

/// Scintillator + pixelated photodetector readout parameters
#[derive(Clone, Copy, Debug)]
pub struct ScintPpdResponse {
    /// Most probable MIP energy deposit in the active material, in GeV
    pub mip_gev: Float,
    /// Photoelectrons produced per MIP
    pub pe_per_mip: Float,
    /// Total number of photodetector pixels; zero disables saturation and
    /// quantization
    pub n_pixels: u32,
    /// Relative spread of the single-pixel signal; non-positive disables
    /// the capacitance-variation smearing
    pub pixel_spread: Float,
}

/// The closed set of readout technologies
pub enum TechnologyResponse {
    /// Silicon diode readout
    Silicon(SiliconResponse),
    /// Scintillator + pixelated photodetector readout
    ScintPpd(ScintPpdResponse),
}
//
impl TechnologyResponse {
    /// Native unit of this technology's digitized energies
    pub fn unit(&self) -> EnergyScale {
        match self {
            TechnologyResponse::Silicon(_) => EnergyScale::Mip,
            TechnologyResponse::ScintPpd(_) => EnergyScale::Npe,
        }
    }

    /// Simulate the detector response to a deposit of `energy` GeV,
    /// in native units
    pub fn digitise(&self, gen: &mut RandomGenerator, energy: Float) -> Float {
        match self {
            TechnologyResponse::Silicon(silicon) => silicon.digitise(gen, energy),
            TechnologyResponse::ScintPpd(scint) => scint.digitise(gen, energy),
        }
    }

    /// Convert an energy from the given scale into native units
    pub fn convert(&self, energy: Float, from: EnergyScale) -> Result<Float> {
        match self {
            TechnologyResponse::Silicon(silicon) => silicon.convert(energy, from),
            TechnologyResponse::ScintPpd(scint) => scint.convert(energy, from),
        }
    }

    /// Invert the response: digitized native units back to the MIP scale
    pub fn reconstruct(&self, energy: Float) -> Float {
        match self {
            TechnologyResponse::Silicon(_) => energy,
            TechnologyResponse::ScintPpd(scint) => scint.reconstruct(energy),
        }
    }
}
//
impl SiliconResponse {
    /// Detector response of a silicon diode: fluctuate the electron-hole
    /// pair count, then express the deposit on the MIP scale
    pub fn digitise(&self, gen: &mut RandomGenerator, energy: Float) -> Float {
        let mut smeared = energy;
        if self.eh_pair_ev > 0.0 {
            // expected number of e-h pairs; eh_pair_ev is in eV, energy in GeV
            let n_pairs = 1e9 * energy as f64 / self.eh_pair_ev as f64;
            // fluctuate by Poisson statistics. This slightly overestimates
            // the width (the Fano factor makes it smaller), and the effect
            // is tiny at calorimetric deposit sizes anyway.
            if let Ok(poisson) = Poisson::new(n_pairs) {
                let draw: f64 = poisson.sample(gen);
                smeared *= (draw / n_pairs) as Float;
            }
        }
        smeared / self.mip_gev
    }

    /// Convert to the MIP scale
    pub fn convert(&self, energy: Float, from: EnergyScale) -> Result<Float> {
        match from {
            EnergyScale::Mip => Ok(energy),
            EnergyScale::GevDep => Ok(energy / self.mip_gev),
            EnergyScale::Npe => {
                bail!("photoelectron counts cannot be converted on a silicon readout")
            }
        }
    }
}
//
impl ScintPpdResponse {
    /// Detector response of a scintillator tile seen by a pixelated
    /// photodetector: saturation, pixel quantization, capacitance spread
    pub fn digitise(&self, gen: &mut RandomGenerator, energy: Float) -> Float {
        // convert to the photoelectron scale
        let mut npe = energy * self.pe_per_mip / self.mip_gev;
        if self.n_pixels > 0 {
            let n_pixels = self.n_pixels as Float;
            // average saturation behaviour of the pixel array
            npe = n_pixels * (1.0 - exp(-npe / n_pixels));
            // quantize to fired pixels
            let fired_fraction = (npe / n_pixels) as f64;
            if let Ok(binomial) = Binomial::new(u64::from(self.n_pixels), fired_fraction) {
                npe = binomial.sample(gen) as Float;
            }
            if self.pixel_spread > 0.0 && npe > 0.0 {
                // variations in pixel capacitance
                let sigma = self.pixel_spread as f64 / sqrt(npe as f64);
                if let Ok(gauss) = Normal::new(1.0, sigma) {
                    npe *= gauss.sample(gen) as Float;
                }
            }
        }
        npe
    }

    /// Convert to the photoelectron scale
    pub fn convert(&self, energy: Float, from: EnergyScale) -> Result<Float> {
        match from {
            EnergyScale::Npe => Ok(energy),
            EnergyScale::Mip => Ok(self.pe_per_mip * energy),
            EnergyScale::GevDep => Ok(self.pe_per_mip * energy / self.mip_gev),
        }
    }

    /// Undo the average saturation and return to the MIP scale
    ///
    /// Below `LINEARIZATION_FRACTION` of the pixel count the saturation
    /// curve is inverted exactly; above it a linear continuation avoids
    /// the log singularity at full occupancy.
    pub fn reconstruct(&self, energy: Float) -> Float {
        let mut energy = energy;
        if self.n_pixels > 0 {
            let n_pixels = self.n_pixels as Float;
            let r = LINEARIZATION_FRACTION;
            if energy < r * n_pixels {
                energy = -n_pixels * ln(1.0 - energy / n_pixels);
            } else {
                energy = 1.0 / (1.0 - r) * (energy - r * n_pixels) - n_pixels * ln(1.0 - r);
            }
        }
        energy / self.pe_per_mip
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn silicon() -> SiliconResponse {
        SiliconResponse {
            mip_gev: 1e-4,
            eh_pair_ev: 3.6,
        }
    }

    fn scintillator() -> ScintPpdResponse {
        ScintPpdResponse {
            mip_gev: 1e-4,
            pe_per_mip: 10.0,
            n_pixels: 10000,
            pixel_spread: 0.05,
        }
    }

    #[test]
    fn silicon_gev_to_mip_round_trips() {
        let response = silicon();
        let deposited = 0.0123;
        let in_mips = response.convert(deposited, EnergyScale::GevDep).unwrap();
        let recovered = in_mips * response.mip_gev;
        assert!((recovered - deposited).abs() < 1e-12);
        // MIP input is already in native units
        assert_eq!(response.convert(2.5, EnergyScale::Mip).unwrap(), 2.5);
    }

    #[test]
    fn silicon_rejects_photoelectron_input() {
        assert!(silicon().convert(1.0, EnergyScale::Npe).is_err());
    }

    #[test]
    fn silicon_pair_fluctuation_stays_near_the_mean() {
        let response = silicon();
        let mut gen = RandomGenerator::from_seed(42);
        // 0.5 MeV deposit -> ~139k pairs -> relative width ~0.3%
        let digitized = response.digitise(&mut gen, 0.0005);
        assert!((digitized - 5.0).abs() < 0.1);
    }

    #[test]
    fn silicon_without_pair_energy_is_deterministic() {
        let response = SiliconResponse {
            mip_gev: 1e-4,
            eh_pair_ev: 0.0,
        };
        let mut gen = RandomGenerator::from_seed(42);
        assert!((response.digitise(&mut gen, 0.0005) - 5.0).abs() < 1e-12);
    }

    #[test]
    fn scintillator_conversions() {
        let response = scintillator();
        assert_eq!(response.convert(7.0, EnergyScale::Npe).unwrap(), 7.0);
        assert_eq!(response.convert(2.0, EnergyScale::Mip).unwrap(), 20.0);
        let from_gev = response.convert(1e-4, EnergyScale::GevDep).unwrap();
        assert!((from_gev - 10.0).abs() < 1e-9);
    }

    #[test]
    fn scintillator_response_is_monotonic_on_average() {
        let response = scintillator();
        let mut gen = RandomGenerator::from_seed(7);
        let mean_response = |gen: &mut RandomGenerator, energy: Float| -> Float {
            let samples = 300;
            (0..samples)
                .map(|_| response.digitise(gen, energy))
                .sum::<Float>()
                / samples as Float
        };
        let mut previous = 0.0;
        for mips in [1.0, 5.0, 20.0, 100.0, 500.0] {
            let mean = mean_response(&mut gen, mips * response.mip_gev);
            assert!(
                mean > previous,
                "mean response {mean} did not grow at {mips} MIPs"
            );
            previous = mean;
        }
    }

    #[test]
    fn desaturation_inverts_the_average_response() {
        let response = scintillator();
        // forward saturation without any stochastic term
        for true_mips in [0.5, 3.0, 25.0] {
            let npe = true_mips * response.pe_per_mip;
            let n_pixels = response.n_pixels as Float;
            let saturated = n_pixels * (1.0 - exp(-npe / n_pixels));
            let reconstructed = response.reconstruct(saturated);
            assert!(
                (reconstructed - true_mips).abs() / true_mips < 1e-6,
                "de-saturation of {true_mips} MIPs returned {reconstructed}"
            );
        }
    }

    #[test]
    fn desaturation_is_finite_above_the_linearization_point() {
        let response = scintillator();
        let n_pixels = response.n_pixels as Float;
        let below = response.reconstruct(0.949 * n_pixels);
        let above = response.reconstruct(0.999 * n_pixels);
        assert!(above.is_finite());
        assert!(above > below);
    }
}
