//! Deterministic episode RNG.
//!
//! # Determinism strategy
//!
//! One `DemandRng` is created per episode from the `reset` seed and consumed
//! once, at episode start, to draw every OD pair's Poisson demand series in
//! declared OD order.  After that the simulation is fully deterministic, so
//! the same seed always reproduces the same demand tensor and therefore the
//! same state and reward trajectories.  (Byte identity across *different*
//! implementations is not promised — only per-seed reproducibility.)

use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use rand_distr::{Distribution, Poisson};

/// Episode-level deterministic RNG for demand generation.
pub struct DemandRng(SmallRng);

impl DemandRng {
    /// Seed deterministically from an episode seed.
    pub fn new(seed: u64) -> Self {
        DemandRng(SmallRng::seed_from_u64(seed))
    }

    /// Draw `len` independent Poisson counts with mean `rate` (veh/timestep).
    ///
    /// A non-positive or non-finite rate yields all zeros rather than an
    /// error: a zero-volume OD is legal input and simply loads no trips.
    pub fn poisson_series(&mut self, rate: f64, len: usize) -> Vec<f64> {
        let Ok(dist) = Poisson::new(rate) else {
            return vec![0.0; len];
        };
        (0..len).map(|_| dist.sample(&mut self.0)).collect()
    }

    /// Expose the inner `SmallRng` for use with `rand` distribution types.
    #[inline]
    pub fn inner(&mut self) -> &mut SmallRng {
        &mut self.0
    }

    /// Generate a value uniformly in `range`.
    #[inline]
    pub fn gen_range<T, R>(&mut self, range: R) -> T
    where
        T: rand::distributions::uniform::SampleUniform,
        R: rand::distributions::uniform::SampleRange<T>,
    {
        self.0.gen_range(range)
    }
}
