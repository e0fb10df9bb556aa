//! In-memory event store
//!
//! An [`Event`] is a key/value store of named hit and relation collections,
//! the unit of work every processor consumes and extends. Collections are
//! ordered; provenance relations refer to hits by their index within the
//! collection they were registered for.

use crate::{
    hits::{CaloHit, HitRelation, SimHit},
    Result,
};
use anyhow::ensure;
use std::collections::HashMap;

/// Collection type tag for digitized/reconstructed hits
pub const CALORIMETER_HIT: &str = "CalorimeterHit";
/// Collection type tag for simulated hits
pub const SIM_CALORIMETER_HIT: &str = "SimCalorimeterHit";

/// An ordered collection of simulated hits
#[derive(Clone, Debug)]
pub struct SimHitCollection {
    /// Cell-ID encoding descriptor for the hits' composite identifiers
    pub encoding: String,
    /// The hits, in simulation order
    pub hits: Vec<SimHit>,
}

/// An ordered collection of digitized or reconstructed hits
#[derive(Clone, Debug)]
pub struct CaloHitCollection {
    /// Cell-ID encoding descriptor for the hits' composite identifiers
    pub encoding: String,
    /// The hits, in production order
    pub hits: Vec<CaloHit>,
}
//
impl CaloHitCollection {
    /// Start an empty collection carrying over an encoding descriptor
    pub fn with_encoding(encoding: impl Into<String>) -> Self {
        Self {
            encoding: encoding.into(),
            hits: Vec::new(),
        }
    }
}

/// An ordered collection of provenance relations
#[derive(Clone, Debug)]
pub struct RelationCollection {
    /// Type tag of the source collection's records
    pub from_type: &'static str,
    /// Type tag of the target collection's records
    pub to_type: &'static str,
    /// The relations
    pub relations: Vec<HitRelation>,
}
//
impl RelationCollection {
    /// Start an empty relation collection between two record types
    pub fn new(from_type: &'static str, to_type: &'static str) -> Self {
        Self {
            from_type,
            to_type,
            relations: Vec::new(),
        }
    }
}

/// One event's worth of collections
#[derive(Default)]
pub struct Event {
    /// Run number, part of the event identifier
    pub run: u32,
    /// Event number within the run
    pub number: u32,
    sim: HashMap<String, SimHitCollection>,
    calo: HashMap<String, CaloHitCollection>,
    relations: HashMap<String, RelationCollection>,
}
//
impl Event {
    /// Start an empty event
    pub fn new(run: u32, number: u32) -> Self {
        Self {
            run,
            number,
            ..Self::default()
        }
    }

    /// Look up a simulated hit collection
    pub fn sim_collection(&self, name: &str) -> Option<&SimHitCollection> {
        self.sim.get(name)
    }

    /// Look up a digitized/reconstructed hit collection
    pub fn calo_collection(&self, name: &str) -> Option<&CaloHitCollection> {
        self.calo.get(name)
    }

    /// Look up a relation collection
    pub fn relation_collection(&self, name: &str) -> Option<&RelationCollection> {
        self.relations.get(name)
    }

    /// Register a simulated hit collection under a unique name
    pub fn add_sim_collection(
        &mut self,
        name: impl Into<String>,
        collection: SimHitCollection,
    ) -> Result<()> {
        let name = name.into();
        ensure!(
            !self.sim.contains_key(&name),
            "collection \"{name}\" already registered in event"
        );
        self.sim.insert(name, collection);
        Ok(())
    }

    /// Register a digitized/reconstructed hit collection under a unique name
    pub fn add_calo_collection(
        &mut self,
        name: impl Into<String>,
        collection: CaloHitCollection,
    ) -> Result<()> {
        let name = name.into();
        ensure!(
            !self.calo.contains_key(&name),
            "collection \"{name}\" already registered in event"
        );
        self.calo.insert(name, collection);
        Ok(())
    }

    /// Register a relation collection under a unique name
    pub fn add_relation_collection(
        &mut self,
        name: impl Into<String>,
        collection: RelationCollection,
    ) -> Result<()> {
        let name = name.into();
        ensure!(
            !self.relations.contains_key(&name),
            "collection \"{name}\" already registered in event"
        );
        self.relations.insert(name, collection);
        Ok(())
    }
}

/// Fast source-to-target lookup over one relation collection
pub struct RelationNavigator {
    from_to: HashMap<usize, usize>,
}
//
impl RelationNavigator {
    /// Index a relation collection for lookup by source index
    ///
    /// Should a source appear in several relations, the first one wins,
    /// matching the "assume the first related object" convention of the
    /// reconstruction stage.
    pub fn new(collection: &RelationCollection) -> Self {
        let mut from_to = HashMap::with_capacity(collection.relations.len());
        for relation in &collection.relations {
            from_to.entry(relation.from).or_insert(relation.to);
        }
        Self { from_to }
    }

    /// Target index related to the given source index, if any
    pub fn related_to(&self, from: usize) -> Option<usize> {
        self.from_to.get(&from).copied()
    }
}
