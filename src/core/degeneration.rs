// Sampled-without-replacement victim selection for degeneration experiments.

use tracing::{info, warn};

use crate::prng::Prng;

/// What happens to a victim once it is drawn.
///
/// Fields only support `Deactivate`; couplings support all three.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum DegenerationMode {
    /// Force the victim to zero permanently (dead neuron, severed synapse).
    #[default]
    Deactivate,
    /// Resample the victim uniformly from the captured weight bounds.
    Randomize,
    /// Scale the victim by the configured reduction factor.
    Reduce,
}

/// Draws victims uniformly from a shrinking pool, one batch per arming.
///
/// The state machine is deliberately small: `arm()` moves the engine from
/// idle to armed, the owner's next `step` consumes exactly one batch and the
/// engine falls back to idle. Arming while armed is rejected, never queued.
/// An empty pool is a normal terminal state, not an error.
#[derive(Debug, Clone)]
pub struct DegenerationEngine<T> {
    pool: Vec<T>,
    rng: Prng,
    armed: bool,
    count_per_batch: usize,
    exhaustion_reported: bool,
    label: &'static str,
}

impl<T> DegenerationEngine<T> {
    pub fn new(label: &'static str, seed: u64) -> Self {
        Self {
            pool: Vec::new(),
            rng: Prng::new(seed),
            armed: false,
            count_per_batch: 1,
            exhaustion_reported: false,
            label,
        }
    }

    /// Start a new epoch with a fresh victim pool. Disarms the engine.
    pub fn repopulate(&mut self, victims: impl IntoIterator<Item = T>) {
        self.pool.clear();
        self.pool.extend(victims);
        self.armed = false;
        self.exhaustion_reported = false;
    }

    /// Request one batch of degeneration on the owner's next step.
    ///
    /// Returns false (and logs) if a batch is already pending.
    pub fn arm(&mut self) -> bool {
        if self.armed {
            warn!(
                pool = self.label,
                "degeneration already armed, ignoring request"
            );
            return false;
        }
        self.armed = true;
        true
    }

    pub fn is_armed(&self) -> bool {
        self.armed
    }

    pub fn set_count(&mut self, count: usize) {
        self.count_per_batch = count;
    }

    pub fn count(&self) -> usize {
        self.count_per_batch
    }

    pub fn remaining(&self) -> usize {
        self.pool.len()
    }

    pub fn is_exhausted(&self) -> bool {
        self.pool.is_empty()
    }

    /// Consume the pending batch, if any. Called by the owner inside `step`.
    ///
    /// Draws `min(count_per_batch, remaining)` victims without replacement.
    /// When the pool runs dry the exhaustion is logged once per epoch.
    pub fn take_batch(&mut self) -> Vec<T> {
        if !self.armed {
            return Vec::new();
        }
        self.armed = false;
        let n = self.count_per_batch.min(self.pool.len());
        let mut victims = Vec::with_capacity(n);
        for _ in 0..n {
            let idx = self.rng.gen_range_usize(0, self.pool.len());
            victims.push(self.pool.swap_remove(idx));
        }
        if self.pool.is_empty() && !self.exhaustion_reported {
            info!(pool = self.label, "degeneration pool exhausted");
            self.exhaustion_reported = true;
        }
        victims
    }

    /// Drop the pool and pending state; `repopulate` starts the next epoch.
    pub fn clear(&mut self) {
        self.pool.clear();
        self.armed = false;
        self.exhaustion_reported = false;
    }

    pub(crate) fn pool(&self) -> &[T] {
        &self.pool
    }

    pub(crate) fn set_pool(&mut self, pool: Vec<T>) {
        self.exhaustion_reported = pool.is_empty();
        self.pool = pool;
        self.armed = false;
    }

    pub(crate) fn rng_state(&self) -> u64 {
        self.rng.state()
    }

    pub(crate) fn set_rng_state(&mut self, state: u64) {
        self.rng = Prng::from_state(state);
    }
}
