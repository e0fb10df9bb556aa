//! Calibration reconstruction of digitized calorimeter hits
//!
//! [`CaloReconstructor`] maps digitized hits from detector-native units
//! back to absolute shower energy: the technology's response is inverted
//! (de-saturation for photodetectors, nothing for silicon) and the result
//! is scaled by the per-layer-group calibration coefficient. Provenance
//! relations are rewired transitively, so a reconstructed hit points at
//! the simulated hit it descends from rather than at the digitized
//! intermediate.

use crate::{
    calibration::LayerCalibration,
    cellid::CellIdCodec,
    event::{
        CaloHitCollection, Event, RelationCollection, RelationNavigator, CALORIMETER_HIT,
        SIM_CALORIMETER_HIT,
    },
    hits::{CaloHit, HitRelation},
    response::TechnologyResponse,
    Result,
};
use anyhow::{ensure, Context};
use tracing::{debug, warn};

/// Reconstruction settings
#[derive(Clone, Debug)]
pub struct RecoConfig {
    /// Digitized input collection names
    pub input_collections: Vec<String>,
    /// Input relation collection names, one per input
    pub input_relation_collections: Vec<String>,
    /// Reconstructed output collection names, one per input
    pub output_collections: Vec<String>,
    /// Output relation collection names, one per input
    pub output_relation_collections: Vec<String>,
    /// Name of the cell-ID sub-field holding the layer number
    pub cell_id_layer_field: String,
}
//
impl Default for RecoConfig {
    fn default() -> Self {
        Self {
            input_collections: Vec::new(),
            input_relation_collections: Vec::new(),
            output_collections: Vec::new(),
            output_relation_collections: Vec::new(),
            cell_id_layer_field: "layer".to_owned(),
        }
    }
}

/// The technology-blind reconstruction processor
pub struct CaloReconstructor {
    config: RecoConfig,
    calibration: LayerCalibration,
    response: TechnologyResponse,
}
//
impl CaloReconstructor {
    /// Validate the configuration and set up the processor
    pub fn new(
        config: RecoConfig,
        calibration: LayerCalibration,
        response: TechnologyResponse,
    ) -> Result<Self> {
        ensure!(
            config.input_relation_collections.len() == config.input_collections.len()
                && config.output_collections.len() == config.input_collections.len()
                && config.output_relation_collections.len() == config.input_collections.len(),
            "input/output collection list sizes are different"
        );
        Ok(Self {
            config,
            calibration,
            response,
        })
    }

    /// Reconstruct every configured input collection of one event
    pub fn process_event(&self, event: &mut Event) -> Result<()> {
        for (i, input_name) in self.config.input_collections.iter().enumerate() {
            let relation_name = &self.config.input_relation_collections[i];
            debug!(
                "looking for hit, relation collection: {} {}",
                input_name, relation_name
            );
            let (Some(input), Some(input_relations)) = (
                event.calo_collection(input_name),
                event.relation_collection(relation_name),
            ) else {
                warn!(
                    "could not find input collection {} or its relations {}",
                    input_name, relation_name
                );
                continue;
            };
            let codec = CellIdCodec::parse(&input.encoding)
                .with_context(|| format!("bad cell ID encoding on \"{input_name}\""))?;
            let navigator = RelationNavigator::new(input_relations);
            let mut output = CaloHitCollection::with_encoding(input.encoding.clone());
            let mut relations = RelationCollection::new(CALORIMETER_HIT, SIM_CALORIMETER_HIT);
            for (j, hit) in input.hits.iter().enumerate() {
                let layer = codec.decode(hit.cell_id, &self.config.cell_id_layer_field)? as u32;
                // invert the detector response, then correct for the
                // sampling fraction of this layer group
                let energy =
                    self.response.reconstruct(hit.energy) * self.calibration.layer_calib(layer);
                output.hits.push(CaloHit {
                    energy,
                    ..hit.clone()
                });
                // keep relations from reconstructed to simulated hits
                match navigator.related_to(j) {
                    Some(sim_index) => relations.relations.push(HitRelation {
                        from: output.hits.len() - 1,
                        to: sim_index,
                        weight: 1.0,
                    }),
                    None => warn!("could not find relation to sim calo hit!"),
                }
            }
            event.add_calo_collection(&self.config.output_collections[i], output)?;
            event.add_relation_collection(&self.config.output_relation_collections[i], relations)?;
        }
        Ok(())
    }
}
