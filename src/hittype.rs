//! Classification tag carried by every digitized and reconstructed hit
//!
//! A hit is tagged with the shower type sampled by its subdetector, the
//! subdetector identity, the detector region (barrel, endcap, ...) and the
//! layer the cell sits in. Downstream consumers, the gap filler in
//! particular, use the region part of the tag to select the right geometry
//! description.

/// Shower type sampled by the subdetector
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CaloType {
    /// Electromagnetic
    Em,
    /// Hadronic
    Had,
    /// Muon system
    Muon,
}

/// Subdetector identity
#[allow(missing_docs)]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CaloId {
    Ecal,
    Hcal,
    Yoke,
    Lcal,
    Lhcal,
    Bcal,
    /// Could not be derived from the collection name
    Unknown,
}

/// Detector region
#[allow(missing_docs)]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Layout {
    Barrel,
    Endcap,
    Plug,
    Ring,
    /// Could not be derived from the collection name
    Unknown,
}

/// Full hit classification: type x identity x region x layer
#[allow(missing_docs)]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct HitType {
    pub calo_type: CaloType,
    pub calo_id: CaloId,
    pub layout: Layout,
    pub layer: u32,
}
//
impl HitType {
    /// Tag a hit from its collection's classification plus its decoded layer
    pub fn new(calo_type: CaloType, calo_id: CaloId, layout: Layout, layer: u32) -> Self {
        Self {
            calo_type,
            calo_id,
            layout,
            layer,
        }
    }

    /// Derive the classification from a hit collection name
    ///
    /// Collection names follow the usual convention of spelling out the
    /// subdetector and region, e.g. "EcalBarrelCollection" or
    /// "HcalEndcapsHits". Unrecognized parts map to `Unknown` rather than
    /// failing: the digitizer tags what it can and the gap filler decides
    /// per event whether an unknown region is acceptable.
    pub fn from_collection_name(name: &str) -> Self {
        let upper = name.to_uppercase();
        // longest names first: "LHCAL" would otherwise match "HCAL"
        let calo_id = if upper.contains("LHCAL") {
            CaloId::Lhcal
        } else if upper.contains("ECAL") {
            CaloId::Ecal
        } else if upper.contains("HCAL") {
            CaloId::Hcal
        } else if upper.contains("YOKE") || upper.contains("MUON") {
            CaloId::Yoke
        } else if upper.contains("LCAL") {
            CaloId::Lcal
        } else if upper.contains("BCAL") {
            CaloId::Bcal
        } else {
            CaloId::Unknown
        };
        let calo_type = match calo_id {
            CaloId::Ecal | CaloId::Lcal | CaloId::Bcal => CaloType::Em,
            CaloId::Hcal | CaloId::Lhcal => CaloType::Had,
            CaloId::Yoke => CaloType::Muon,
            CaloId::Unknown => CaloType::Em,
        };
        let layout = if upper.contains("BARREL") {
            Layout::Barrel
        } else if upper.contains("ENDCAP") {
            Layout::Endcap
        } else if upper.contains("PLUG") {
            Layout::Plug
        } else if upper.contains("RING") {
            Layout::Ring
        } else {
            Layout::Unknown
        };
        Self::new(calo_type, calo_id, layout, 0)
    }

    /// Same tag with the layer filled in
    pub fn with_layer(self, layer: u32) -> Self {
        Self { layer, ..self }
    }
}
