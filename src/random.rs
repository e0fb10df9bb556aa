//! Random number generation for the digitization processors
//!
//! Every stochastic component of this crate samples from an explicitly
//! passed [`RandomGenerator`], never from a process-wide engine. One
//! generator is created per processed event, seeded through [`EventSeeder`]
//! so that parallel event streams stay reproducible and collision-free.

use crate::numeric::Float;
use rand::{Rng, RngCore, SeedableRng};

// Select random number generation engine in use
#[cfg(feature = "f32")]
type Engine = rand_xoshiro::Xoshiro128Plus;
#[cfg(not(feature = "f32"))]
type Engine = rand_xoshiro::Xoshiro256Plus;

/// Facade which hides the concrete engine from the rest of the crate
#[derive(Clone)]
pub struct RandomGenerator {
    rng: Engine,
}
//
impl RandomGenerator {
    /// Spawn a generator for one event from its per-event seed
    pub fn from_seed(seed: u64) -> Self {
        Self {
            rng: Engine::seed_from_u64(seed),
        }
    }

    /// Generate a random floating-point number between 0 and 1
    pub fn random(&mut self) -> Float {
        self.rng.gen()
    }
}
//
// Distributions from rand_distr sample directly from the facade
impl RngCore for RandomGenerator {
    fn next_u32(&mut self) -> u32 {
        self.rng.next_u32()
    }

    fn next_u64(&mut self) -> u64 {
        self.rng.next_u64()
    }

    fn fill_bytes(&mut self, dest: &mut [u8]) {
        self.rng.fill_bytes(dest)
    }

    fn try_fill_bytes(&mut self, dest: &mut [u8]) -> Result<(), rand::Error> {
        self.rng.try_fill_bytes(dest)
    }
}

/// Deterministic per-event seed source
///
/// Given a base seed and an event identifier, derives one well-mixed seed
/// per (run, event) pair. Two distinct events get unrelated generator
/// states even when their identifiers differ in a single bit, which is what
/// makes clone-per-event-stream processing reproducible.
pub struct EventSeeder {
    base: u64,
}
//
impl EventSeeder {
    /// Set up seed derivation from a base seed
    pub fn new(base: u64) -> Self {
        Self { base }
    }

    /// Derive the seed for one event
    pub fn event_seed(&self, run: u32, event: u32) -> u64 {
        // splitmix64 finalizer over the packed event identifier
        let mut z = self.base ^ (u64::from(run) << 32 | u64::from(event));
        z = z.wrapping_add(0x9e37_79b9_7f4a_7c15);
        z = (z ^ (z >> 30)).wrapping_mul(0xbf58_476d_1ce4_e5b9);
        z = (z ^ (z >> 27)).wrapping_mul(0x94d0_49bb_1331_11eb);
        z ^ (z >> 31)
    }
}
