//! Brute-force search for energy lost in ECAL detector gaps
//!
//! Silicon ECAL modules cannot be tiled seamlessly: wafers, towers and
//! module boundaries leave small insensitive regions. Showers crossing
//! them lose a roughly predictable amount of energy, which this processor
//! restores by scanning every digitized hit pair for the telltale
//! signature of a gap (two hits more than one but less than two cell
//! periods apart, or facing each other across a module boundary) and
//! planting a synthetic hit between them.
//!
//! The pair search is brute force over a dense layer x stave x module
//! binning of the input hits; the bins are small enough in practice for
//! the quadratic pair loop to be a non-issue.

use crate::{
    cellid::CellIdCodec,
    event::{CaloHitCollection, Event},
    geometry::{LayerPitch, LayeredGeometry},
    hits::CaloHit,
    hittype::{CaloId, CaloType, HitType, Layout},
    numeric::Float,
    Result,
};
use anyhow::{ensure, Context};
use prefix_num_ops::real::*;
use tracing::{debug, warn};

/// Upper bound on decoded layer numbers
pub const MAX_LAYERS: usize = 50;
/// Upper bound on decoded stave numbers
pub const MAX_STAVES: usize = 15;
/// Upper bound on decoded module numbers
pub const MAX_MODULES: usize = 10;

// don't consider differences below this distance to be a gap
const DISTANCE_LIMIT: Float = 0.01;
// flexibility on the pitch-multiple windows, as a ratio
const SLOP: Float = 0.01;

/// Gap filler settings
#[derive(Clone, Debug)]
pub struct GapFillConfig {
    /// Digitized or reconstructed hit collection to scan
    pub input_collection: String,
    /// Name under which the synthetic gap hits are registered
    pub output_collection: String,
    /// Name of the cell-ID sub-field holding the layer number
    pub cell_id_layer_field: String,
    /// Name of the cell-ID sub-field holding the stave number
    pub cell_id_stave_field: String,
    /// Name of the cell-ID sub-field holding the module number
    pub cell_id_module_field: String,
    /// Expected cell-edge-to-cell-edge distance across module boundaries,
    /// in mm; accuracy below one cell size is sufficient
    pub inter_module_distance: Float,
    /// Nonlinearity f of the inter-module energy compression
    /// `E = factor * ln(1 + f * E_calc) / f`
    pub inter_module_nonlinear_factor: Float,
    /// Nonlinearity f of the intra-module energy compression
    pub intra_module_nonlinear_factor: Float,
    /// Scale factor applied to inter-module gap hit energies
    pub inter_module_factor: Float,
    /// Scale factor applied to intra-module gap hit energies
    pub intra_module_factor: Float,
}
//
impl Default for GapFillConfig {
    fn default() -> Self {
        Self {
            input_collection: "EcalBarrelReco".to_owned(),
            output_collection: "EcalBarrelGapHits".to_owned(),
            cell_id_layer_field: "layer".to_owned(),
            cell_id_stave_field: "stave".to_owned(),
            cell_id_module_field: "module".to_owned(),
            inter_module_distance: 7.0,
            inter_module_nonlinear_factor: 1.0,
            intra_module_nonlinear_factor: 1.0,
            inter_module_factor: 0.35,
            intra_module_factor: 1.0,
        }
    }
}

/// Dense layer x stave x module binning of one collection's hit indices
struct HitGrid {
    cells: Vec<Vec<usize>>,
}
//
impl HitGrid {
    /// Bin every hit of a collection by its decoded cell-ID sub-fields
    ///
    /// A decoded index outside the grid bounds means the cell-ID encoding
    /// does not match the detector geometry, which no amount of skipping
    /// can repair: it is reported as a fatal error.
    fn build(
        collection: &CaloHitCollection,
        codec: &CellIdCodec,
        config: &GapFillConfig,
    ) -> Result<Self> {
        let mut cells = vec![Vec::new(); MAX_LAYERS * MAX_STAVES * MAX_MODULES];
        for (index, hit) in collection.hits.iter().enumerate() {
            let layer = codec.decode(hit.cell_id, &config.cell_id_layer_field)?;
            let stave = codec.decode(hit.cell_id, &config.cell_id_stave_field)?;
            let module = codec.decode(hit.cell_id, &config.cell_id_module_field)?;
            let in_bounds = (0..MAX_LAYERS as i64).contains(&layer)
                && (0..MAX_STAVES as i64).contains(&stave)
                && (0..MAX_MODULES as i64).contains(&module);
            ensure!(in_bounds, "hit with incorrect layer, module or stave number");
            cells[Self::index(layer as usize, stave as usize, module as usize)].push(index);
        }
        Ok(Self { cells })
    }

    fn index(layer: usize, stave: usize, module: usize) -> usize {
        (layer * MAX_STAVES + stave) * MAX_MODULES + module
    }

    fn cell(&self, layer: usize, stave: usize, module: usize) -> &[usize] {
        &self.cells[Self::index(layer, stave, module)]
    }
}

/// The gap-filling processor
pub struct EcalGapFiller {
    config: GapFillConfig,
    barrel: Option<LayeredGeometry>,
    endcap: Option<LayeredGeometry>,
}
//
impl EcalGapFiller {
    /// Validate the configuration and attach the available geometries
    ///
    /// At least one of the barrel and endcap descriptions must be present;
    /// a missing one restricts the processor to the other region.
    pub fn new(
        config: GapFillConfig,
        barrel: Option<LayeredGeometry>,
        endcap: Option<LayeredGeometry>,
    ) -> Result<Self> {
        ensure!(
            barrel.is_some() || endcap.is_some(),
            "couldn't find any of the ecal calorimeters (endcap and barrel)!"
        );
        ensure!(
            config.intra_module_nonlinear_factor > 0.0
                && config.inter_module_nonlinear_factor > 0.0,
            "gap hit nonlinearity factors must be positive"
        );
        if barrel.is_none() {
            warn!("ECal barrel calorimeter data not found!");
        }
        if endcap.is_none() {
            warn!("ECal endcap calorimeter data not found!");
        }
        Ok(Self {
            config,
            barrel,
            endcap,
        })
    }

    /// Scan one event's input collection and register the synthetic hits
    ///
    /// Events whose hits belong to a region without geometry are skipped
    /// with a warning; an empty or absent input collection is not an
    /// error.
    pub fn process_event(&self, event: &mut Event) -> Result<()> {
        debug!("looking for collection: {}", self.config.input_collection);
        let Some(input) = event.calo_collection(&self.config.input_collection) else {
            debug!(
                "could not find input collection {}",
                self.config.input_collection
            );
            return Ok(());
        };
        debug!(
            "{} number of elements = {}",
            self.config.input_collection,
            input.hits.len()
        );
        if input.hits.is_empty() {
            return Ok(());
        }
        // the first hit's region decides which geometry applies
        let Some(geometry) = self.geometry_for(input.hits[0].hit_type.layout) else {
            return Ok(());
        };
        let codec = CellIdCodec::parse(&input.encoding).with_context(|| {
            format!(
                "bad cell ID encoding on \"{}\"",
                self.config.input_collection
            )
        })?;
        let grid = HitGrid::build(input, &codec, &self.config)?;
        let mut output = CaloHitCollection::with_encoding(input.encoding.clone());
        self.add_intra_module_gap_hits(&mut output, &input.hits, &grid, geometry);
        self.add_inter_module_gap_hits(&mut output, &input.hits, &grid, geometry);
        event.add_calo_collection(&self.config.output_collection, output)
    }

    /// Geometry description for a hit region, `None` when the event has to
    /// be skipped
    fn geometry_for(&self, layout: Layout) -> Option<&LayeredGeometry> {
        let geometry = match layout {
            Layout::Barrel => self.barrel.as_ref(),
            Layout::Endcap => self.endcap.as_ref(),
            _ => {
                warn!("input ecal hit collection is neither barrel nor endcap");
                return None;
            }
        };
        if geometry.is_none() {
            warn!("no calorimeter data found for the ecal input hit collection!");
        }
        geometry
    }

    /// Look for gaps within modules, i.e. between wafers and towers
    fn add_intra_module_gap_hits(
        &self,
        output: &mut CaloHitCollection,
        hits: &[CaloHit],
        grid: &HitGrid,
        geometry: &LayeredGeometry,
    ) {
        debug!("starting intra-module gap search");
        for (layer, pitch) in geometry.layers.iter().enumerate().take(MAX_LAYERS) {
            debug!(
                "cell sizes in layer {} = {} {} mm",
                layer, pitch.cell_size_a, pitch.cell_size_b
            );
            for stave in 0..MAX_STAVES {
                for module in 0..MAX_MODULES {
                    let cell = grid.cell(layer, stave, module);
                    for (i, &first) in cell.iter().enumerate() {
                        for &second in &cell[i + 1..] {
                            let pair = (&hits[first], &hits[second]);
                            let Some(fraction) =
                                intra_gap_fraction(pair.0, pair.1, pitch, geometry.layout)
                            else {
                                continue;
                            };
                            output.hits.push(self.synthesize_gap_hit(
                                pair,
                                fraction,
                                layer as u32,
                                geometry.layout,
                                self.config.intra_module_factor,
                                self.config.intra_module_nonlinear_factor,
                            ));
                        }
                    }
                }
            }
        }
        debug!("done intra-module gap search: {}", output.hits.len());
    }

    /// Look for gaps between modules: compare hits of a module with those
    /// of the next module in the same layer and stave
    fn add_inter_module_gap_hits(
        &self,
        output: &mut CaloHitCollection,
        hits: &[CaloHit],
        grid: &HitGrid,
        geometry: &LayeredGeometry,
    ) {
        debug!("starting inter-module gap search");
        for (layer, pitch) in geometry.layers.iter().enumerate().take(MAX_LAYERS) {
            for stave in 0..MAX_STAVES {
                for module in 0..MAX_MODULES - 1 {
                    let cell = grid.cell(layer, stave, module);
                    let next = grid.cell(layer, stave, module + 1);
                    for &first in cell {
                        for &second in next {
                            let pair = (&hits[first], &hits[second]);
                            let Some(fraction) =
                                self.inter_gap_fraction(pair.0, pair.1, pitch, geometry.layout)
                            else {
                                continue;
                            };
                            output.hits.push(self.synthesize_gap_hit(
                                pair,
                                fraction,
                                layer as u32,
                                geometry.layout,
                                self.config.inter_module_factor,
                                self.config.inter_module_nonlinear_factor,
                            ));
                        }
                    }
                }
            }
        }
        debug!("done inter-module gap search: {}", output.hits.len());
    }

    /// Inter-module gap test: a configured physical distance plus a
    /// pitch-dependent margin, along the module stacking axis
    fn inter_gap_fraction(
        &self,
        a: &CaloHit,
        b: &CaloHit,
        pitch: &LayerPitch,
        layout: Layout,
    ) -> Option<Float> {
        let delta = (a.position - b.position).abs();
        let margin = self.config.inter_module_distance;
        if layout == Layout::Barrel {
            // barrel modules stack along z, so require the same transverse
            // coordinate and a moderate z separation
            let transverse = sqrt(delta.x * delta.x + delta.y * delta.y);
            if transverse < DISTANCE_LIMIT && delta.z < margin + 1.9 * pitch.cell_size_b {
                return Some(delta.z / pitch.cell_size_b);
            }
        } else {
            // watch out: should the cell sizes differ along x and y, this
            // would need to account for the stave orientation
            if delta.y < DISTANCE_LIMIT && delta.x < margin + 1.9 * pitch.cell_size_a {
                return Some(delta.x / pitch.cell_size_a);
            }
            if delta.x < DISTANCE_LIMIT && delta.y < margin + 1.9 * pitch.cell_size_b {
                return Some(delta.y / pitch.cell_size_b);
            }
        }
        None
    }

    /// Build the synthetic hit for a detected gap
    ///
    /// The linear extrapolation `fraction * average energy` overestimates
    /// the loss at large separations, so the energy is log-compressed with
    /// a configurable nonlinearity.
    fn synthesize_gap_hit(
        &self,
        pair: (&CaloHit, &CaloHit),
        fraction: Float,
        layer: u32,
        layout: Layout,
        factor: Float,
        nonlinearity: Float,
    ) -> CaloHit {
        let (a, b) = pair;
        let position = nalgebra::center(&a.position, &b.position);
        let extra_energy = fraction * (a.energy + b.energy) / 2.0;
        CaloHit {
            cell_id: 0,
            position,
            energy: factor * ln(1.0 + nonlinearity * extra_energy) / nonlinearity,
            time: a.time.min(b.time),
            hit_type: HitType::new(CaloType::Em, CaloId::Ecal, layout, layer),
            raw: None,
        }
    }
}

/// Intra-module gap test: two hits more than one but less than two cell
/// periods apart along one readout axis, aligned along the other
fn intra_gap_fraction(
    a: &CaloHit,
    b: &CaloHit,
    pitch: &LayerPitch,
    layout: Layout,
) -> Option<Float> {
    let delta = (a.position - b.position).abs();
    let window = |distance: Float, cell_size: Float| {
        distance > (1.0 + SLOP) * cell_size && distance < (2.0 - SLOP) * cell_size
    };
    if layout == Layout::Barrel {
        // in the barrel, one readout axis follows the transverse plane and
        // the other follows z
        let transverse = sqrt(delta.x * delta.x + delta.y * delta.y);
        if delta.z < DISTANCE_LIMIT && window(transverse, pitch.cell_size_a) {
            return Some((transverse - pitch.cell_size_a) / pitch.cell_size_a);
        }
        if transverse < DISTANCE_LIMIT && window(delta.z, pitch.cell_size_b) {
            return Some((delta.z - pitch.cell_size_b) / pitch.cell_size_b);
        }
    } else {
        // watch out: should the cell sizes differ along x and y, this
        // would need to account for the stave orientation
        if delta.y < DISTANCE_LIMIT && window(delta.x, pitch.cell_size_a) {
            return Some((delta.x - pitch.cell_size_a) / pitch.cell_size_a);
        }
        if delta.x < DISTANCE_LIMIT && window(delta.y, pitch.cell_size_b) {
            return Some((delta.y - pitch.cell_size_b) / pitch.cell_size_b);
        }
    }
    None
}
