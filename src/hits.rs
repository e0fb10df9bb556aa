//! Hit records exchanged between the processors

use crate::{hittype::HitType, numeric::Float};
use nalgebra::Point3;

/// One recorded sub-deposit of a simulated hit
///
/// The simulation records each particle crossing separately; the timing
/// clusterer later decides which of them end up in a digitized hit.
#[derive(Clone, Debug)]
pub struct SimHitContribution {
    /// Absolute deposit time in ns
    pub time: Float,
    /// Deposited energy in GeV
    pub energy: Float,
    /// PDG code of the contributing particle
    pub pdg: i32,
}

/// A simulated calorimeter hit, as delivered by the simulation (immutable)
#[derive(Clone, Debug)]
pub struct SimHit {
    /// Packed composite cell identifier
    pub cell_id: u64,
    /// Cell position in mm
    pub position: Point3<Float>,
    /// Total deposited energy in GeV
    pub energy: Float,
    /// Per-particle sub-deposits
    pub contributions: Vec<SimHitContribution>,
}

/// A digitized or reconstructed calorimeter hit
///
/// The energy unit depends on the producing stage: detector-native units
/// (MIP or photoelectrons) after digitization, absolute shower GeV after
/// reconstruction.
#[derive(Clone, Debug)]
pub struct CaloHit {
    /// Packed composite cell identifier
    pub cell_id: u64,
    /// Cell position in mm
    pub position: Point3<Float>,
    /// Hit energy, unit per producing stage
    pub energy: Float,
    /// Hit time in ns
    pub time: Float,
    /// Region / layer classification
    pub hit_type: HitType,
    /// Index of the originating sim hit in its input collection,
    /// `None` for synthetic hits
    pub raw: Option<usize>,
}

/// A directed, weighted provenance link between two collection entries
#[derive(Clone, Copy, Debug)]
pub struct HitRelation {
    /// Index of the source hit in the collection the relation was
    /// registered for
    pub from: usize,
    /// Index of the target hit in the related collection
    pub to: usize,
    /// Relation weight, 1.0 throughout this crate
    pub weight: Float,
}
