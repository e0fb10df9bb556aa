//! Driving a processing pipeline over a run of events
//!
//! Events are mutually independent, so a run can be processed sequentially
//! or fanned out across threads without changing any per-event result:
//! each event derives its own generator seed from the run's [`EventSeeder`]
//! either way. Only the order in which per-event summaries are folded
//! differs, and summary folding is associative.

use crate::{numeric::Float, random::EventSeeder, Result};
#[cfg(feature = "multi-threading")]
use rayon::prelude::*;

/// What one event contributed to the run
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct EventSummary {
    /// Hits accepted by the digitizer
    pub digitized_hits: usize,
    /// Hits produced by the reconstruction
    pub reconstructed_hits: usize,
    /// Synthetic hits planted by the gap filler
    pub gap_hits: usize,
    /// Total reconstructed energy in GeV
    pub reconstructed_energy: Float,
}

/// Accumulated results of a pipeline run
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct PipelineSummary {
    /// Number of processed events
    pub events: usize,
    /// Hits accepted by the digitizer
    pub digitized_hits: usize,
    /// Hits produced by the reconstruction
    pub reconstructed_hits: usize,
    /// Synthetic hits planted by the gap filler
    pub gap_hits: usize,
    /// Total reconstructed energy in GeV
    pub reconstructed_energy: Float,
}
//
impl PipelineSummary {
    /// Integrate one event's contribution
    fn integrate(mut self, event: EventSummary) -> Self {
        self.events += 1;
        self.digitized_hits += event.digitized_hits;
        self.reconstructed_hits += event.reconstructed_hits;
        self.gap_hits += event.gap_hits;
        self.reconstructed_energy += event.reconstructed_energy;
        self
    }

    /// Merge the accumulators of two worker threads
    #[cfg(feature = "multi-threading")]
    fn merge(mut self, other: Self) -> Self {
        self.events += other.events;
        self.digitized_hits += other.digitized_hits;
        self.reconstructed_hits += other.reconstructed_hits;
        self.gap_hits += other.gap_hits;
        self.reconstructed_energy += other.reconstructed_energy;
        self
    }
}

/// Process a run of events and accumulate their summaries
///
/// The pipeline kernel receives the event number and the event's derived
/// seed; it owns everything else about processing one event. Event
/// processing errors abort the run.
pub fn run_pipeline(
    num_events: u32,
    run: u32,
    seeder: &EventSeeder,
    process_event: impl Fn(u32, u64) -> Result<EventSummary> + Send + Sync,
) -> Result<PipelineSummary> {
    // should have been checked at configuration time, but bugs happen...
    assert!(num_events > 0, "must process at least one event");

    // ...in sequential mode
    #[cfg(not(feature = "multi-threading"))]
    {
        let mut summary = PipelineSummary::default();
        for number in 0..num_events {
            let seed = seeder.event_seed(run, number);
            summary = summary.integrate(process_event(number, seed)?);
        }
        Ok(summary)
    }

    // ...in multi-threaded mode
    #[cfg(feature = "multi-threading")]
    {
        (0..num_events)
            .into_par_iter()
            .map(|number| process_event(number, seeder.event_seed(run, number)))
            .try_fold(PipelineSummary::default, |summary, event| {
                event.map(|event| summary.integrate(event))
            })
            .try_reduce(PipelineSummary::default, |left, right| {
                Ok(left.merge(right))
            })
    }
}
