//! Stochastic digitization of simulated calorimeter hits
//!
//! [`CaloDigitizer`] turns simulated energy deposits into what the readout
//! electronics would have recorded: contributions are clustered in time,
//! pushed through the technology response model, degraded by
//! miscalibration, limited dynamic range, electronics noise and dead
//! channels, and finally compared against the hit threshold. Accepted hits
//! are written out together with a provenance relation back to their
//! simulated hit.
//!
//! All randomness of one event comes from one generator seeded at the
//! start of that event, so the same (seed, input) pair always digitizes
//! identically, no matter how events are scheduled.

use crate::{
    cellid::CellIdCodec,
    conditions::CellConditions,
    event::{CaloHitCollection, Event, RelationCollection, CALORIMETER_HIT, SIM_CALORIMETER_HIT},
    hits::{CaloHit, HitRelation},
    hittype::HitType,
    numeric::Float,
    random::RandomGenerator,
    response::TechnologyResponse,
    timing::TimingCuts,
    units::EnergyScale,
    Result,
};
use anyhow::{ensure, Context};
use rand_distr::{Distribution, Normal};
use std::sync::Arc;
use tracing::{debug, info};

/// Digitizer settings
///
/// Every degradation stage is opt-in: a non-positive fraction, noise or
/// range value disables the corresponding effect.
#[derive(Clone, Debug)]
pub struct DigiConfig {
    /// Simulated input collection names
    pub input_collections: Vec<String>,
    /// Digitized output collection names, one per input
    pub output_collections: Vec<String>,
    /// Output relation collection names, one per input
    pub output_relation_collections: Vec<String>,
    /// Hit acceptance threshold, in `threshold_unit`
    pub threshold: Float,
    /// Unit of `threshold`: "MIP", "GeV" or "px"
    pub threshold_unit: String,
    /// Contribution clustering window
    pub timing: TimingCuts,
    /// Width of the per-channel gain miscalibration
    pub miscal_uncorrel: Float,
    /// Reuse each channel's miscalibration across events
    pub miscal_uncorrel_keep: bool,
    /// Width of the event-wide gain miscalibration, fully correlated
    /// across channels
    pub miscal_correl: Float,
    /// Fraction of randomly dead channels
    pub dead_cell_fraction: Float,
    /// Keep the same channels dead across events
    pub dead_cell_keep: bool,
    /// Electronics noise as a fraction of one MIP
    pub elec_noise_mip: Float,
    /// Electronics dynamic range in MIPs
    pub elec_range_mip: Float,
    /// Name of the cell-ID sub-field holding the layer number
    pub cell_id_layer_field: String,
}
//
impl Default for DigiConfig {
    fn default() -> Self {
        Self {
            input_collections: Vec::new(),
            output_collections: Vec::new(),
            output_relation_collections: Vec::new(),
            threshold: 0.5,
            threshold_unit: "MIP".to_owned(),
            timing: TimingCuts::default(),
            miscal_uncorrel: 0.0,
            miscal_uncorrel_keep: false,
            miscal_correl: 0.0,
            dead_cell_fraction: 0.0,
            dead_cell_keep: false,
            elec_noise_mip: 0.0,
            elec_range_mip: 2500.0,
            cell_id_layer_field: "layer".to_owned(),
        }
    }
}

/// Random state scoped to the processing of one event
struct EventData {
    generator: RandomGenerator,
    correl_miscalib: Float,
}

/// The technology-blind digitization processor
pub struct CaloDigitizer {
    config: DigiConfig,
    response: TechnologyResponse,
    conditions: Option<Arc<CellConditions>>,
    /// Threshold converted into native units, once
    threshold: Float,
    /// One MIP in native units, precomputed for range and noise handling
    one_mip: Float,
}
//
impl CaloDigitizer {
    /// Validate the configuration and set up the processor
    ///
    /// Fails on mismatched collection lists, an unrecognized threshold
    /// unit, a threshold unit the technology cannot convert, or a
    /// keep-across-events flag without a [`CellConditions`] store.
    pub fn new(
        config: DigiConfig,
        response: TechnologyResponse,
        conditions: Option<Arc<CellConditions>>,
    ) -> Result<Self> {
        ensure!(
            config.output_collections.len() == config.input_collections.len()
                && config.output_relation_collections.len() == config.input_collections.len(),
            "input/output collection list sizes are different"
        );
        if config.miscal_uncorrel_keep || config.dead_cell_keep {
            ensure!(
                conditions.is_some(),
                "keeping per-cell miscalibrations or dead channels across events \
                 requires a cell conditions store"
            );
        }
        let threshold_unit = EnergyScale::parse(&config.threshold_unit)?;
        // convert the threshold to the appropriate unit, once
        let threshold = response
            .convert(config.threshold, threshold_unit)
            .context("converting the hit threshold to native units")?;
        let one_mip = response.convert(1.0, EnergyScale::Mip)?;
        Ok(Self {
            config,
            response,
            conditions,
            threshold,
            one_mip,
        })
    }

    /// Digitize every configured input collection of one event
    ///
    /// Missing input collections are skipped with a diagnostic; the
    /// remaining ones are still processed.
    pub fn process_event(&self, event: &mut Event, seed: u64) -> Result<()> {
        let mut event_data = EventData {
            generator: RandomGenerator::from_seed(seed),
            correl_miscalib: 1.0,
        };
        // decide on this event's correlated miscalibration, drawn exactly
        // once and applied to every hit below
        if self.config.miscal_correl > 0.0 {
            event_data.correl_miscalib =
                gaussian_factor(&mut event_data.generator, self.config.miscal_correl);
        }
        for (i, input_name) in self.config.input_collections.iter().enumerate() {
            debug!("looking for collection: {}", input_name);
            let Some(input) = event.sim_collection(input_name) else {
                debug!("could not find input collection {}", input_name);
                continue;
            };
            debug!("{} number of elements = {}", input_name, input.hits.len());
            if input.hits.is_empty() {
                continue;
            }
            let codec = CellIdCodec::parse(&input.encoding)
                .with_context(|| format!("bad cell ID encoding on \"{input_name}\""))?;
            let region = HitType::from_collection_name(input_name);
            let mut output = CaloHitCollection::with_encoding(input.encoding.clone());
            let mut relations = RelationCollection::new(CALORIMETER_HIT, SIM_CALORIMETER_HIT);
            for (j, sim_hit) in input.hits.iter().enumerate() {
                for (time, deposited) in self.config.timing.cluster(sim_hit) {
                    let digitized = self.energy_digi(&mut event_data, sim_hit.cell_id, deposited);
                    debug!(
                        "hit {} time: {} eDep: {} eDigi: {} threshold: {}",
                        j, time, deposited, digitized, self.threshold
                    );
                    if digitized > self.threshold {
                        let layer = codec
                            .decode(sim_hit.cell_id, &self.config.cell_id_layer_field)?
                            as u32;
                        output.hits.push(CaloHit {
                            cell_id: sim_hit.cell_id,
                            position: sim_hit.position,
                            energy: digitized,
                            time,
                            hit_type: region.with_layer(layer),
                            raw: Some(j),
                        });
                        relations.relations.push(HitRelation {
                            from: output.hits.len() - 1,
                            to: j,
                            weight: 1.0,
                        });
                    }
                }
            }
            event.add_calo_collection(&self.config.output_collections[i], output)?;
            event.add_relation_collection(&self.config.output_relation_collections[i], relations)?;
        }
        info!("end of event {}", event.number);
        Ok(())
    }

    /// Degrade one clustered energy deposit into its digitized value
    ///
    /// The input is in GeV; the output is in the technology's native unit,
    /// the same unit the threshold was converted to.
    fn energy_digi(&self, event_data: &mut EventData, cell_id: u64, energy: Float) -> Float {
        let mut e_out = self.response.digitise(&mut event_data.generator, energy);
        // random miscalibration, uncorrelated between channels
        if self.config.miscal_uncorrel > 0.0 {
            let sigma = self.config.miscal_uncorrel;
            let factor = match (&self.conditions, self.config.miscal_uncorrel_keep) {
                (Some(conditions), true) => conditions
                    .miscalibration(cell_id, || gaussian_factor(&mut event_data.generator, sigma)),
                _ => gaussian_factor(&mut event_data.generator, sigma),
            };
            e_out *= factor;
        }
        // random miscalibration, correlated across the channels of one event
        if self.config.miscal_correl > 0.0 {
            e_out *= event_data.correl_miscalib;
        }
        // limited electronics dynamic range
        if self.config.elec_range_mip > 0.0 {
            e_out = e_out.min(self.config.elec_range_mip * self.one_mip);
        }
        // additive electronics noise
        if self.config.elec_noise_mip > 0.0 {
            let sigma = (self.config.elec_noise_mip * self.one_mip) as f64;
            if let Ok(gauss) = Normal::new(0.0, sigma) {
                e_out += gauss.sample(&mut event_data.generator) as Float;
            }
        }
        // random channel kill
        if self.config.dead_cell_fraction > 0.0 {
            let fraction = self.config.dead_cell_fraction;
            let dead = match (&self.conditions, self.config.dead_cell_keep) {
                (Some(conditions), true) => {
                    conditions.is_dead(cell_id, || event_data.generator.random() < fraction)
                }
                _ => event_data.generator.random() < fraction,
            };
            if dead {
                e_out = 0.0;
            }
        }
        e_out
    }
}

/// Draw a multiplicative factor from `Normal(1, sigma)`
fn gaussian_factor(generator: &mut RandomGenerator, sigma: Float) -> Float {
    Normal::new(1.0, sigma as f64)
        .map(|gauss| gauss.sample(generator) as Float)
        .unwrap_or(1.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{hits::SimHit, response::SiliconResponse};
    use nalgebra::point;

    const ENCODING: &str = "module:3,stave:4,layer:6,cell:10";

    fn silicon() -> TechnologyResponse {
        TechnologyResponse::Silicon(SiliconResponse {
            mip_gev: 1e-4,
            eh_pair_ev: 3.6,
        })
    }

    fn deterministic_silicon() -> TechnologyResponse {
        TechnologyResponse::Silicon(SiliconResponse {
            mip_gev: 1e-4,
            eh_pair_ev: 0.0,
        })
    }

    fn config() -> DigiConfig {
        DigiConfig {
            input_collections: vec!["EcalBarrelCollection".to_owned()],
            output_collections: vec!["EcalBarrelDigi".to_owned()],
            output_relation_collections: vec!["EcalBarrelDigiRelations".to_owned()],
            ..DigiConfig::default()
        }
    }

    fn event_with_deposits(deposits: &[Float]) -> Event {
        let codec = CellIdCodec::parse(ENCODING).unwrap();
        let hits = deposits
            .iter()
            .enumerate()
            .map(|(i, &energy)| SimHit {
                cell_id: codec
                    .encode(&[("layer", 3), ("cell", i as i64)])
                    .unwrap(),
                position: point![1800.0, 10.0 * i as Float, 25.0],
                energy,
                contributions: Vec::new(),
            })
            .collect();
        let mut event = Event::new(1, 1);
        event
            .add_sim_collection(
                "EcalBarrelCollection",
                crate::event::SimHitCollection {
                    encoding: ENCODING.to_owned(),
                    hits,
                },
            )
            .unwrap();
        event
    }

    fn accepted_hits(event: &Event) -> &[CaloHit] {
        &event.calo_collection("EcalBarrelDigi").unwrap().hits
    }

    #[test]
    fn list_length_mismatch_is_fatal() {
        let mut bad = config();
        bad.output_collections.push("Extra".to_owned());
        assert!(CaloDigitizer::new(bad, silicon(), None).is_err());
    }

    #[test]
    fn unknown_threshold_unit_is_fatal() {
        let mut bad = config();
        bad.threshold_unit = "joules".to_owned();
        assert!(CaloDigitizer::new(bad, silicon(), None).is_err());
    }

    #[test]
    fn photoelectron_threshold_on_silicon_is_fatal() {
        let mut bad = config();
        bad.threshold_unit = "px".to_owned();
        assert!(CaloDigitizer::new(bad, silicon(), None).is_err());
    }

    #[test]
    fn keep_flags_require_a_conditions_store() {
        let mut bad = config();
        bad.dead_cell_keep = true;
        bad.dead_cell_fraction = 0.1;
        assert!(CaloDigitizer::new(bad.clone(), silicon(), None).is_err());
        let conditions = Some(Arc::new(CellConditions::new()));
        assert!(CaloDigitizer::new(bad, silicon(), conditions).is_ok());
    }

    #[test]
    fn missing_input_collection_is_skipped() {
        let digitizer = CaloDigitizer::new(config(), silicon(), None).unwrap();
        let mut event = Event::new(1, 1);
        digitizer.process_event(&mut event, 42).unwrap();
        assert!(event.calo_collection("EcalBarrelDigi").is_none());
    }

    #[test]
    fn accepted_hits_carry_relations_and_layers() {
        let digitizer = CaloDigitizer::new(config(), silicon(), None).unwrap();
        // 5 MIP and 0.1 MIP deposits against the default 0.5 MIP threshold
        let mut event = event_with_deposits(&[0.0005, 0.00001]);
        digitizer.process_event(&mut event, 42).unwrap();
        let hits = accepted_hits(&event);
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].hit_type.layer, 3);
        assert_eq!(hits[0].raw, Some(0));
        let relations = &event
            .relation_collection("EcalBarrelDigiRelations")
            .unwrap()
            .relations;
        assert_eq!(relations.len(), 1);
        assert_eq!((relations[0].from, relations[0].to), (0, 0));
        assert_eq!(relations[0].weight, 1.0);
    }

    #[test]
    fn raising_the_threshold_cannot_accept_more_hits() {
        let deposits: Vec<Float> = (1..40).map(|i| i as Float * 2.5e-5).collect();
        let mut accepted_counts = Vec::new();
        for threshold in [0.25, 0.5, 1.0, 2.0, 4.0] {
            let mut cfg = config();
            cfg.threshold = threshold;
            let digitizer = CaloDigitizer::new(cfg, silicon(), None).unwrap();
            let mut event = event_with_deposits(&deposits);
            digitizer.process_event(&mut event, 42).unwrap();
            accepted_counts.push(accepted_hits(&event).len());
        }
        assert!(accepted_counts.windows(2).all(|pair| pair[0] >= pair[1]));
    }

    #[test]
    fn correlated_miscalibration_is_shared_within_an_event() {
        let mut cfg = config();
        cfg.miscal_correl = 0.1;
        let digitizer = CaloDigitizer::new(cfg, deterministic_silicon(), None).unwrap();
        // with a deterministic response, the accepted energy is
        // deposit / mip_gev times the event factor
        let mut event = event_with_deposits(&[0.0005, 0.0010]);
        digitizer.process_event(&mut event, 42).unwrap();
        let hits = accepted_hits(&event);
        assert_eq!(hits.len(), 2);
        let factor_a = hits[0].energy / 5.0;
        let factor_b = hits[1].energy / 10.0;
        assert!((factor_a - factor_b).abs() < 1e-9);

        // a different event seed draws a different factor
        let mut other = event_with_deposits(&[0.0005, 0.0010]);
        let digitizer = {
            let mut cfg = config();
            cfg.miscal_correl = 0.1;
            CaloDigitizer::new(cfg, deterministic_silicon(), None).unwrap()
        };
        digitizer.process_event(&mut other, 43).unwrap();
        let other_factor = accepted_hits(&other)[0].energy / 5.0;
        assert!((factor_a - other_factor).abs() > 1e-6);
    }

    #[test]
    fn kept_miscalibrations_survive_across_events() {
        let conditions = Arc::new(CellConditions::new());
        let mut cfg = config();
        cfg.miscal_uncorrel = 0.2;
        cfg.miscal_uncorrel_keep = true;
        let digitizer =
            CaloDigitizer::new(cfg, deterministic_silicon(), Some(Arc::clone(&conditions)))
                .unwrap();
        let mut first = event_with_deposits(&[0.0005]);
        digitizer.process_event(&mut first, 42).unwrap();
        let mut second = event_with_deposits(&[0.0005]);
        digitizer.process_event(&mut second, 999).unwrap();
        // same cell, same recorded miscalibration, despite different seeds
        assert_eq!(
            accepted_hits(&first)[0].energy,
            accepted_hits(&second)[0].energy
        );
    }

    #[test]
    fn dead_cells_swallow_every_deposit() {
        let mut cfg = config();
        cfg.dead_cell_fraction = 1.0;
        let digitizer = CaloDigitizer::new(cfg, silicon(), None).unwrap();
        let mut event = event_with_deposits(&[0.0005, 0.0010, 0.0020]);
        digitizer.process_event(&mut event, 42).unwrap();
        assert!(accepted_hits(&event).is_empty());
    }

    #[test]
    fn dynamic_range_clips_large_deposits() {
        let mut cfg = config();
        cfg.elec_range_mip = 10.0;
        let digitizer = CaloDigitizer::new(cfg, deterministic_silicon(), None).unwrap();
        // 50 MIPs in, 10 MIPs out
        let mut event = event_with_deposits(&[0.005]);
        digitizer.process_event(&mut event, 42).unwrap();
        assert_eq!(accepted_hits(&event)[0].energy, 10.0);
    }
}
