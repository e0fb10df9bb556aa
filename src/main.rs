//! Demo driver for the calorimeter processing pipeline
//!
//! Assembles the silicon ECAL chain (stochastic digitization, calibration
//! reconstruction, gap filling) from a steering file or built-in defaults,
//! runs it over a batch of synthetic single-shower events, and prints the
//! accumulated results.

use anyhow::Context;
use calorec::{
    calibration::LayerCalibration,
    cellid::CellIdCodec,
    config::Configuration,
    digi::{CaloDigitizer, DigiConfig},
    event::{Event, SimHitCollection},
    gapfill::{EcalGapFiller, GapFillConfig},
    geometry::LayeredGeometry,
    hits::{SimHit, SimHitContribution},
    hittype::Layout,
    numeric::{constants::SPEED_OF_LIGHT_MM_PER_NS, Float},
    random::EventSeeder,
    reco::{CaloReconstructor, RecoConfig},
    response::{SiliconResponse, TechnologyResponse},
    scheduling::{self, EventSummary},
    timing::TimingCuts,
    Result,
};
use nalgebra::point;
use std::time::Instant;

/// Cell-ID layout of the synthetic events
const ENCODING: &str = "module:4,stave:4,layer:6,cell:10";

/// Number of layers in the demo barrel geometry
const NUM_LAYERS: usize = 30;

fn main() -> Result<()> {
    // ### CONFIGURATION READOUT ###

    let config = match std::env::args().nth(1) {
        Some(path) => Configuration::load(&path).context("Failed to load the configuration")?,
        None => Configuration::default(),
    };

    // ### PIPELINE INITIALIZATION ###

    // NOTE: Started after configuration I/O to avoid IO-induced timing
    //       fluctuations
    let saved_time = Instant::now();

    let digitizer = CaloDigitizer::new(
        DigiConfig {
            input_collections: vec!["EcalBarrelCollection".to_owned()],
            output_collections: vec!["EcalBarrelDigi".to_owned()],
            output_relation_collections: vec!["EcalBarrelDigiRelations".to_owned()],
            threshold: config.threshold,
            threshold_unit: config.threshold_unit.clone(),
            timing: TimingCuts {
                apply: config.time_apply,
                correct_for_propagation: config.time_correct_for_propagation,
                window_min: config.time_window_min,
                window_max: config.time_window_max,
            },
            miscal_uncorrel: config.miscal_uncorrel,
            miscal_correl: config.miscal_correl,
            dead_cell_fraction: config.dead_cell_fraction,
            elec_noise_mip: config.elec_noise_mip,
            elec_range_mip: config.elec_range_mip,
            ..DigiConfig::default()
        },
        TechnologyResponse::Silicon(SiliconResponse {
            mip_gev: config.mip_calibration,
            eh_pair_ev: config.eh_pair_energy,
        }),
        None,
    )
    .context("Failed to set up the digitizer")?;

    let reconstructor = CaloReconstructor::new(
        RecoConfig {
            input_collections: vec!["EcalBarrelDigi".to_owned()],
            input_relation_collections: vec!["EcalBarrelDigiRelations".to_owned()],
            output_collections: vec!["EcalBarrelReco".to_owned()],
            output_relation_collections: vec!["EcalBarrelRecoRelations".to_owned()],
            ..RecoConfig::default()
        },
        LayerCalibration::new(
            config.calib_coefficients.clone(),
            config.calib_layer_groups.clone(),
        )?,
        TechnologyResponse::Silicon(SiliconResponse {
            mip_gev: config.mip_calibration,
            eh_pair_ev: config.eh_pair_energy,
        }),
    )
    .context("Failed to set up the reconstruction")?;

    let gap_filler = EcalGapFiller::new(
        GapFillConfig {
            input_collection: "EcalBarrelReco".to_owned(),
            output_collection: "EcalBarrelGapHits".to_owned(),
            inter_module_distance: config.inter_module_distance,
            ..GapFillConfig::default()
        },
        Some(LayeredGeometry::uniform(
            Layout::Barrel,
            NUM_LAYERS,
            config.cell_pitch,
        )),
        None,
    )
    .context("Failed to set up the gap filler")?;

    // ### PIPELINE EXECUTION ###

    // This kernel processes one event: build its synthetic input, run the
    // three processors in sequence, and report what came out
    let seeder = EventSeeder::new(config.base_seed);
    let process_event = |number: u32, seed: u64| -> Result<EventSummary> {
        let mut event = synthetic_event(&config, number)?;
        digitizer.process_event(&mut event, seed)?;
        reconstructor.process_event(&mut event)?;
        gap_filler.process_event(&mut event)?;

        let hits_of = |name: &str| event.calo_collection(name).map_or(0, |c| c.hits.len());
        let reconstructed_energy = event
            .calo_collection("EcalBarrelReco")
            .map_or(0.0, |c| c.hits.iter().map(|hit| hit.energy).sum());
        Ok(EventSummary {
            digitized_hits: hits_of("EcalBarrelDigi"),
            reconstructed_hits: hits_of("EcalBarrelReco"),
            gap_hits: hits_of("EcalBarrelGapHits"),
            reconstructed_energy,
        })
    };
    let summary = scheduling::run_pipeline(
        config.num_events,
        config.run_number,
        &seeder,
        process_event,
    )?;

    // ### RESULTS DISPLAY ###

    let elapsed = saved_time.elapsed();
    println!();
    println!("Processed events       : {}", summary.events);
    println!("Digitized hits         : {}", summary.digitized_hits);
    println!("Reconstructed hits     : {}", summary.reconstructed_hits);
    println!("Gap hits               : {}", summary.gap_hits);
    println!(
        "Reconstructed energy   : {:.4} GeV",
        summary.reconstructed_energy
    );
    println!(
        "Time per event         : {:.2} us",
        elapsed.as_secs_f64() * 1e6 / f64::from(config.num_events)
    );

    // ...and we're done
    Ok(())
}

/// Build one synthetic single-shower event
///
/// A short row of energy deposits in one barrel wafer, with one cell
/// skipped so that the gap filler has a wafer boundary to bridge, plus a
/// late afterglow contribution that the timing window is meant to drop.
fn synthetic_event(config: &Configuration, number: u32) -> Result<Event> {
    let codec = CellIdCodec::parse(ENCODING)?;
    let layer = 2 + (number as i64 % 8);
    let radius = 1850.0;
    // deposits along the row as (cell, position in pitch units, MIPs); the
    // wafer boundary between cells 1 and 3 adds half a pitch of dead space
    let deposits: [(i64, Float, Float); 4] =
        [(0, 0.0, 1.2), (1, 1.0, 2.4), (3, 2.5, 1.8), (4, 3.5, 0.3)];
    let mut hits = Vec::with_capacity(deposits.len());
    for &(cell, pitches, mips) in &deposits {
        let position = point![radius, pitches * config.cell_pitch, 25.0];
        let energy = mips * config.mip_calibration;
        let arrival = position.coords.norm() / SPEED_OF_LIGHT_MM_PER_NS;
        hits.push(SimHit {
            cell_id: codec.encode(&[("layer", layer), ("stave", 2), ("module", 1), ("cell", cell)])?,
            position,
            energy,
            contributions: vec![
                SimHitContribution {
                    time: arrival + 0.2,
                    energy: 0.9 * energy,
                    pdg: 22,
                },
                SimHitContribution {
                    time: arrival + 150.0,
                    energy: 0.1 * energy,
                    pdg: 2112,
                },
            ],
        });
    }
    let mut event = Event::new(config.run_number, number);
    event.add_sim_collection(
        "EcalBarrelCollection",
        SimHitCollection {
            encoding: ENCODING.to_owned(),
            hits,
        },
    )?;
    Ok(event)
}
