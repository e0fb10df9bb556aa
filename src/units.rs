//! Energy scales understood by the digitization chain
//!
//! Calorimeter readout technologies count in different currencies: silicon
//! diodes in MIP-equivalents, photodetectors in photoelectrons, while the
//! simulation delivers deposited GeV. Thresholds can be configured in any
//! of the three and are converted once, at processor construction, into
//! the native unit of the selected technology.

use crate::Result;
use anyhow::bail;
use std::fmt;

/// The unit an energy value is expressed in
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EnergyScale {
    /// Energy deposit in most-probable-MIP-deposit units
    Mip,
    /// Energy deposit in GeV
    GevDep,
    /// Number of photoelectrons
    Npe,
}
//
impl EnergyScale {
    /// Resolve a configured threshold unit string
    ///
    /// Unknown units are a configuration error and abort initialization.
    pub fn parse(unit: &str) -> Result<Self> {
        match unit {
            "MIP" => Ok(EnergyScale::Mip),
            "GeV" => Ok(EnergyScale::GevDep),
            "px" => Ok(EnergyScale::Npe),
            other => bail!(
                "could not identify threshold unit \"{other}\", please use \"GeV\", \"MIP\" or \"px\""
            ),
        }
    }
}
//
impl fmt::Display for EnergyScale {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            EnergyScale::Mip => "MIP",
            EnergyScale::GevDep => "GeV",
            EnergyScale::Npe => "px",
        };
        write!(fmt, "{text}")
    }
}
