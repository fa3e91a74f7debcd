// Leaky-integrator neural field over a circular 1-D domain.

use std::io;

use hashbrown::HashSet;

use crate::decoder;
use crate::degeneration::{DegenerationEngine, DegenerationMode};
use crate::element::Steppable;
use crate::ring::RingGeometry;
use crate::storage;

/// Pointwise nonlinearity applied to the activation to produce the output.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ActivationFunction {
    Heaviside { threshold: f64 },
    Sigmoid { x_shift: f64, steepness: f64 },
}

impl ActivationFunction {
    #[inline]
    pub fn apply(&self, x: f64) -> f64 {
        match *self {
            ActivationFunction::Heaviside { threshold } => {
                if x > threshold {
                    1.0
                } else {
                    0.0
                }
            }
            ActivationFunction::Sigmoid { x_shift, steepness } => {
                1.0 / (1.0 + (-steepness * (x - x_shift)).exp())
            }
        }
    }
}

impl Default for ActivationFunction {
    fn default() -> Self {
        ActivationFunction::Sigmoid {
            x_shift: 0.0,
            steepness: 10.0,
        }
    }
}

/// Construction parameters for a [`Field`].
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct FieldConfig {
    /// Number of grid points on the ring.
    pub size: usize,
    /// Physical units per grid point.
    pub step_size: f64,
    /// Relaxation time constant of the integrator.
    pub tau: f64,
    /// Baseline the activation relaxes to without input.
    pub resting_level: f64,
    pub activation_fn: ActivationFunction,
    /// Seed for the degeneration sampler. `None` falls back to 1.
    pub seed: Option<u64>,
}

impl Default for FieldConfig {
    fn default() -> Self {
        Self {
            size: 100,
            step_size: 1.0,
            tau: 25.0,
            resting_level: -5.0,
            activation_fn: ActivationFunction::default(),
            seed: None,
        }
    }
}

impl FieldConfig {
    pub fn with_size(size: usize, step_size: f64) -> Self {
        Self {
            size,
            step_size,
            ..Default::default()
        }
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn validate(&self) -> Result<(), &'static str> {
        if self.size == 0 {
            return Err("size must be non-zero");
        }
        if !(self.step_size > 0.0 && self.step_size.is_finite()) {
            return Err("step_size must be positive and finite");
        }
        if !(self.tau > 0.0 && self.tau.is_finite()) {
            return Err("tau must be positive and finite");
        }
        if !self.resting_level.is_finite() {
            return Err("resting_level must be finite");
        }
        Ok(())
    }
}

/// A 1-D dynamic neural field with an injectable dead-neuron mask.
///
/// Per tick: integrate the accumulated input with a leaky Euler step, apply
/// any pending degeneration batch, recompute the output through the
/// activation function, clear the input. A dead neuron's activation is
/// forced to zero on every tick until the next `init`.
#[derive(Debug, Clone)]
pub struct Field {
    ring: RingGeometry,
    tau: f64,
    resting: Vec<f64>,
    activation_fn: ActivationFunction,
    activation: Vec<f64>,
    input: Vec<f64>,
    output: Vec<f64>,
    dead: HashSet<usize>,
    engine: DegenerationEngine<usize>,
}

impl Field {
    pub fn new(cfg: FieldConfig) -> Self {
        if let Err(msg) = cfg.validate() {
            panic!("field config: {msg}");
        }
        let size = cfg.size;
        let mut field = Self {
            ring: RingGeometry::new(size, cfg.step_size),
            tau: cfg.tau,
            resting: vec![cfg.resting_level; size],
            activation_fn: cfg.activation_fn,
            activation: vec![cfg.resting_level; size],
            input: vec![0.0; size],
            output: vec![0.0; size],
            dead: HashSet::new(),
            engine: DegenerationEngine::new("neurons", cfg.seed.unwrap_or(1)),
        };
        field.init();
        field
    }

    #[inline]
    pub fn size(&self) -> usize {
        self.ring.size
    }

    pub fn ring(&self) -> RingGeometry {
        self.ring
    }

    pub fn activation(&self) -> &[f64] {
        &self.activation
    }

    pub fn output(&self) -> &[f64] {
        &self.output
    }

    /// Accumulate one upstream contribution into this tick's input.
    pub fn add_input(&mut self, contribution: &[f64]) {
        assert_eq!(
            contribution.len(),
            self.input.len(),
            "input length must match field size"
        );
        for (acc, c) in self.input.iter_mut().zip(contribution) {
            *acc += c;
        }
    }

    /// Decode the current activation peak, `NO_PEAK` when the field is silent.
    pub fn centroid(&self) -> f64 {
        decoder::decode_centroid(&self.activation, self.ring)
    }

    /// Reset activation to the resting level without touching the dead set
    /// or the degeneration pool. Used between probe trials.
    pub fn reset_activation(&mut self) {
        self.activation.copy_from_slice(&self.resting);
        for (i, a) in self.activation.iter_mut().enumerate() {
            if self.dead.contains(&i) {
                *a = 0.0;
            }
        }
        self.input.iter_mut().for_each(|v| *v = 0.0);
        self.recompute_output();
    }

    pub fn is_dead(&self, i: usize) -> bool {
        self.dead.contains(&i)
    }

    pub fn dead_count(&self) -> usize {
        self.dead.len()
    }

    /// Fields only support deactivation; other modes are rejected.
    pub fn set_degeneration_mode(&mut self, mode: DegenerationMode) -> bool {
        if mode != DegenerationMode::Deactivate {
            tracing::warn!(?mode, "fields only support Deactivate degeneration");
            return false;
        }
        true
    }

    pub fn set_degeneration_count(&mut self, count: usize) {
        self.engine.set_count(count);
    }

    /// Arm one batch of neuron deactivation for the next step.
    pub fn start_degeneration(&mut self) -> bool {
        self.engine.arm()
    }

    pub fn remaining_degeneration_targets(&self) -> usize {
        self.engine.remaining()
    }

    fn recompute_output(&mut self) {
        for (o, a) in self.output.iter_mut().zip(&self.activation) {
            *o = self.activation_fn.apply(*a);
        }
    }

    fn apply_degeneration_batch(&mut self) {
        for i in self.engine.take_batch() {
            self.dead.insert(i);
            self.activation[i] = 0.0;
        }
    }

    pub(crate) fn write_state_payload(&self, buf: &mut Vec<u8>) {
        storage::put_u32(buf, self.ring.size as u32);
        for &a in &self.activation {
            storage::put_f64(buf, a);
        }
        let mut dead: Vec<u32> = self.dead.iter().map(|&i| i as u32).collect();
        dead.sort_unstable();
        storage::put_u32(buf, dead.len() as u32);
        for i in dead {
            storage::put_u32(buf, i);
        }
        storage::put_u64(buf, self.engine.rng_state());
        storage::put_u32(buf, self.engine.count() as u32);
        let pool = self.engine.pool();
        storage::put_u32(buf, pool.len() as u32);
        for &i in pool {
            storage::put_u32(buf, i as u32);
        }
    }

    pub(crate) fn apply_state_payload(&mut self, mut data: &[u8]) -> io::Result<()> {
        let data = &mut data;
        let size = storage::take_u32(data)? as usize;
        if size != self.ring.size {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                "field size mismatch in image",
            ));
        }
        for a in self.activation.iter_mut() {
            *a = storage::take_f64(data)?;
        }
        let dead_len = storage::take_u32(data)? as usize;
        self.dead.clear();
        for _ in 0..dead_len {
            let i = storage::take_u32(data)? as usize;
            if i >= size {
                return Err(io::Error::new(
                    io::ErrorKind::InvalidData,
                    "dead index out of range in image",
                ));
            }
            self.dead.insert(i);
        }
        self.engine.set_rng_state(storage::take_u64(data)?);
        self.engine.set_count(storage::take_u32(data)? as usize);
        let pool_len = storage::take_u32(data)? as usize;
        let mut pool = Vec::with_capacity(pool_len);
        for _ in 0..pool_len {
            pool.push(storage::take_u32(data)? as usize);
        }
        self.engine.set_pool(pool);
        self.input.iter_mut().for_each(|v| *v = 0.0);
        self.recompute_output();
        Ok(())
    }
}

impl Steppable for Field {
    fn init(&mut self) {
        self.activation.copy_from_slice(&self.resting);
        self.input.iter_mut().for_each(|v| *v = 0.0);
        self.dead.clear();
        self.engine.repopulate(0..self.ring.size);
        self.recompute_output();
    }

    fn step(&mut self, _t: f64, dt: f64) {
        let rate = dt / self.tau;
        for i in 0..self.activation.len() {
            if self.dead.contains(&i) {
                self.activation[i] = 0.0;
            } else {
                let a = self.activation[i];
                self.activation[i] = a + rate * (-a + self.resting[i] + self.input[i]);
            }
        }
        self.apply_degeneration_batch();
        self.recompute_output();
        self.input.iter_mut().for_each(|v| *v = 0.0);
    }

    fn close(&mut self) {
        self.dead.clear();
        self.engine.clear();
    }

    fn component(&self, name: &str) -> Option<&[f64]> {
        match name {
            "activation" => Some(&self.activation),
            "input" => Some(&self.input),
            "output" => Some(&self.output),
            "resting level" => Some(&self.resting),
            _ => None,
        }
    }
}
