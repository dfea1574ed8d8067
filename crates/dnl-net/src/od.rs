//! Origin–destination pairs and their demand profiles.

use dnl_core::{DemandRng, NodeId, PathId};

/// One OD pair: endpoints, a per-timestep demand profile, and the paths the
/// assignment may load (attached at `finalize_ods`).
pub struct OdPair {
    pub origin:       NodeId,
    pub destination:  NodeId,
    /// Vehicles departing per timestep; length equals the time horizon.
    pub demand_rates: Vec<f64>,
    pub paths:        Vec<PathId>,
}

impl OdPair {
    pub fn new(origin: NodeId, destination: NodeId, demand_rates: Vec<f64>) -> OdPair {
        OdPair { origin, destination, demand_rates, paths: Vec::new() }
    }

    /// Draw a Poisson demand profile with mean `rate` veh/timestep.
    ///
    /// All ODs of an episode draw from one shared `DemandRng`, in declared
    /// order, so a fixed seed reproduces the whole demand tensor.
    pub fn stochastic(
        origin:       NodeId,
        destination:  NodeId,
        time_horizon: i64,
        rate:         f64,
        rng:          &mut DemandRng,
    ) -> OdPair {
        let demand_rates = rng.poisson_series(rate, time_horizon as usize);
        OdPair::new(origin, destination, demand_rates)
    }

    /// Total vehicles this OD pair wants to send over the horizon.
    pub fn total_demand(&self) -> f64 {
        self.demand_rates.iter().sum()
    }
}
