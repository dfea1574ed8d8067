//! The episode environment an RL agent drives.
//!
//! # Episode shape
//!
//! `reset(seed)` rebuilds the corridor, applies the current configuration,
//! draws a fresh Poisson demand tensor from `seed`, assigns it all-or-nothing
//! to shortest paths, and loads a warm-up interval so the agent starts from
//! a flowing network.  Each `step` then applies an action as clamped
//! configuration deltas, loads one control interval, and returns
//!
//! ```text
//! state  = [elapsed_intervals] ++ link densities (30) ++ config (20)
//! reward = TFFT − TSTT over the interval   (0 at free flow, negative when congested)
//! done   = elapsed_intervals == num_intervals
//! ```
//!
//! Everything after `reset` is deterministic, so a fixed seed reproduces the
//! whole trajectory bit for bit.

use dnl_core::DemandRng;
use dnl_corridor::{ACTION_DIM, Config, Corridor, NUM_LINKS, TIMESTEP};
use dnl_net::NetResult;
use log::{debug, info};
use rand::Rng;
use rand::rngs::SmallRng;
use rand::SeedableRng;

/// Length of the observation vector: interval counter, link densities, config.
pub const STATE_DIM: usize = 1 + NUM_LINKS + ACTION_DIM;

/// One observation.
pub type State = [f64; STATE_DIM];
/// One action: normalised deltas in [−1, 1] per configuration slot.
pub type Action = [f64; ACTION_DIM];

// ── Env ───────────────────────────────────────────────────────────────────────

/// Episode environment over the fixed corridor.
pub struct Env {
    /// Timesteps per control interval.
    interval:      i64,
    /// Control intervals per episode.
    num_intervals: u32,
    /// Warm-up timesteps loaded by `reset` before the first interval.
    warmup:        i64,

    time_horizon: i64,
    cfg:          Config,
    corridor:     Corridor,

    cur_time:          i64,
    elapsed_intervals: u32,

    action_rng: SmallRng,
}

impl Env {
    /// Build an environment; all arguments are in timesteps (1 s each).
    pub fn new(interval: i64, num_intervals: u32, warmup: i64) -> NetResult<Env> {
        let time_horizon = warmup + interval * num_intervals as i64;
        Ok(Env {
            interval,
            num_intervals,
            warmup,
            time_horizon,
            cfg: Config::initial(TIMESTEP),
            corridor: Corridor::build(time_horizon)?,
            cur_time: warmup,
            elapsed_intervals: 0,
            action_rng: SmallRng::seed_from_u64(0),
        })
    }

    /// Start a fresh episode.  The configuration carries over from the
    /// previous episode; demand is redrawn from `seed`.
    pub fn reset(&mut self, seed: u64) -> NetResult<State> {
        info!("reset(seed={seed}): horizon {} warmup {}", self.time_horizon, self.warmup);
        self.corridor = Corridor::build(self.time_horizon)?;
        self.corridor.set_config(&self.cfg);

        let mut rng = DemandRng::new(seed);
        self.corridor.set_demand(&mut rng);
        self.corridor.net.finalize_ods()?;
        self.corridor.net.initialize_path_flows()?;

        self.corridor.net.load_network(0..self.warmup, true);
        self.corridor.net.calculate_travel_times(0..self.warmup);

        self.cur_time = self.warmup;
        self.elapsed_intervals = 0;
        self.action_rng = SmallRng::seed_from_u64(seed ^ 0x5eed_ac71_0a_u64);
        Ok(self.state())
    }

    /// Apply `action` (if any), load one control interval, and observe.
    pub fn step(&mut self, action: Option<&Action>) -> NetResult<(State, f64, bool)> {
        if let Some(action) = action {
            self.update_config(action);
        }

        let interval = self.cur_time..self.cur_time + self.interval;
        self.corridor.net.load_network(interval.clone(), false);
        self.cur_time += self.interval;
        self.elapsed_intervals += 1;

        self.corridor.net.calculate_travel_times(interval.clone());
        let tstt = self.corridor.net.calculate_tstt(interval.clone());
        let tfft = self.corridor.net.calculate_tfft(interval);
        let reward = tfft - tstt;
        debug!(
            "interval {}: TSTT {tstt:.1}, TFFT {tfft:.1}, reward {reward:.1}",
            self.elapsed_intervals
        );

        let done = self.elapsed_intervals == self.num_intervals;
        Ok((self.state(), reward, done))
    }

    /// Convert an action into clamped configuration deltas and push the
    /// result to the meters and intersections.
    fn update_config(&mut self, action: &Action) {
        self.cfg.apply_action(action);
        self.corridor.set_config(&self.cfg);
    }

    /// A uniform random action on [−1, 1]^20, for warm-up exploration.
    pub fn random_action(&mut self) -> Action {
        let mut action = [0.0; ACTION_DIM];
        for slot in &mut action {
            *slot = self.action_rng.gen_range(-1.0..=1.0);
        }
        action
    }

    /// Structured per-field action bounds `(mins, maxs)`.
    pub fn constraints(&self) -> (Config, Config) {
        Config::constraints()
    }

    /// The current configuration record.
    pub fn config(&self) -> &Config {
        &self.cfg
    }

    /// Assemble the observation vector.
    fn state(&self) -> State {
        let mut state = [0.0; STATE_DIM];
        state[0] = self.elapsed_intervals as f64;
        for (slot, density) in state[1..1 + NUM_LINKS]
            .iter_mut()
            .zip(self.corridor.link_densities())
        {
            *slot = density;
        }
        state[1 + NUM_LINKS..].copy_from_slice(&self.cfg.vectorize());
        state
    }
}
