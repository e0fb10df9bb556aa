//! calorec: realistic calorimeter hit processing
//!
//!
//! # Introduction (for the physicist)
//!
//! A sampling calorimeter does not hand you shower energies. It hands you
//! whatever its readout managed to record: energy integrated over a finite
//! time window, fluctuated by pair-creation or photoelectron statistics,
//! distorted by gain miscalibration, electronics noise, saturation and the
//! occasional dead channel. This crate models that chain in the forward
//! direction (digitization of simulated hits), inverts it layer group by
//! layer group (calibration reconstruction), and patches up the energy
//! that never reached sensitive material at all because the shower crossed
//! a wafer or module boundary (gap filling).
//!
//!
//! # Introduction (for the numerical guy)
//!
//! Digitization is a per-hit chain of draws from coupled distributions
//! (Poisson pair counts, binomial pixel counts, Gaussian gains and noise),
//! all fed from one generator seeded per event, so any event can be
//! reproduced in isolation. Reconstruction is a deterministic inverse with
//! one table lookup. Gap filling is a nearest-neighbor search over a
//! dense layer/stave/module binning of each event's hits.
//!
//!
//! # Introduction (for the computer guy)
//!
//! Each processor is constructed once from a validated configuration and
//! then applied to events, which are plain key/value stores of named hit
//! collections:
//!
//! * [`digi::CaloDigitizer`]: simulated hits in, digitized hits plus
//!   provenance relations out; the detector response is pluggable per
//!   readout technology ([`response::TechnologyResponse`])
//! * [`reco::CaloReconstructor`]: digitized hits in, calibrated hits plus
//!   sim-hit relations out
//! * [`gapfill::EcalGapFiller`]: hits in, synthetic gap hits out
//!
//! Events are independent; [`scheduling::run_pipeline`] folds a run of
//! them sequentially, or in parallel when the `multi-threading` feature is
//! enabled.

#![warn(missing_docs)]

pub mod calibration;
pub mod cellid;
pub mod conditions;
pub mod config;
pub mod digi;
pub mod event;
pub mod gapfill;
pub mod geometry;
pub mod hits;
pub mod hittype;
pub mod numeric;
pub mod random;
pub mod reco;
pub mod response;
pub mod scheduling;
pub mod smearing;
pub mod timing;
pub mod units;

/// We'll use anyhow's type-erased result type throughout the crate
pub type Result<T> = anyhow::Result<T>;
