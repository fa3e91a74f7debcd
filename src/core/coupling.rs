// Dense trainable coupling between two fields, with synapse degeneration.

use std::fs::File;
use std::io::{self, BufRead, BufReader, Read, Write};
use std::path::{Path, PathBuf};

use tracing::{info, warn};

use crate::degeneration::{DegenerationEngine, DegenerationMode};
use crate::element::Steppable;
use crate::prng::Prng;
use crate::storage;

/// Weight decay constant of the Krogh-Hertz rule.
const KROGH_HERTZ_DECAY: f64 = 0.5;

/// Supervised update rule applied by [`Coupling::update_weights`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum LearningRule {
    /// Pure correlation: `w += lr * pre * target`.
    Hebbian,
    /// Error-driven: `w += lr * (target - actual) * pre`.
    WidrowHoff,
    /// Error-driven with weight decay, the rule the degeneration
    /// experiments exercise.
    #[default]
    KroghHertz,
}

/// Construction parameters for a [`Coupling`].
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct CouplingConfig {
    pub input_size: usize,
    pub output_size: usize,
    /// Gain applied to the rectified transform output.
    pub scalar: f64,
    pub learning_rate: f64,
    pub rule: LearningRule,
    /// When false, Krogh-Hertz updates skip synapses that have already been
    /// degenerated, so relearning cannot repair severed connections.
    pub update_all_weights: bool,
    /// Multiplier applied by Reduce degeneration. Must lie in (0, 1).
    pub reduction_factor: f64,
    /// Seed for weight initialization and the degeneration sampler.
    pub seed: Option<u64>,
    /// Text file to load weights from on init, if it exists.
    pub weights_file: Option<PathBuf>,
}

impl Default for CouplingConfig {
    fn default() -> Self {
        Self {
            input_size: 360,
            output_size: 28,
            scalar: 0.4,
            learning_rate: 0.01,
            rule: LearningRule::default(),
            update_all_weights: true,
            reduction_factor: 0.005,
            seed: None,
            weights_file: None,
        }
    }
}

impl CouplingConfig {
    pub fn with_sizes(input_size: usize, output_size: usize) -> Self {
        Self {
            input_size,
            output_size,
            ..Default::default()
        }
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn validate(&self) -> Result<(), &'static str> {
        if self.input_size == 0 || self.output_size == 0 {
            return Err("coupling sizes must be non-zero");
        }
        if !self.scalar.is_finite() {
            return Err("scalar must be finite");
        }
        if !(self.learning_rate > 0.0 && self.learning_rate.is_finite()) {
            return Err("learning_rate must be positive and finite");
        }
        if !(self.reduction_factor > 0.0 && self.reduction_factor < 1.0) {
            return Err("reduction_factor must lie in (0, 1)");
        }
        Ok(())
    }
}

/// A fully connected weight matrix from one field's output to another
/// field's input.
///
/// Per tick: rectify the accumulated input, multiply through the matrix,
/// rectify and scale the result, clear the input, then apply any pending
/// synapse degeneration. Damage applied this tick is first visible in the
/// next tick's output.
#[derive(Debug, Clone)]
pub struct Coupling {
    input_size: usize,
    output_size: usize,
    scalar: f64,
    learning_rate: f64,
    rule: LearningRule,
    update_all_weights: bool,
    reduction_factor: f64,
    weights_file: Option<PathBuf>,
    /// Row-major, `input_size` rows by `output_size` columns.
    weights: Vec<f64>,
    input: Vec<f64>,
    output: Vec<f64>,
    /// Weight bounds captured at init, used by Randomize degeneration.
    min_weight: f64,
    max_weight: f64,
    trained: bool,
    mode: DegenerationMode,
    rng: Prng,
    engine: DegenerationEngine<(usize, usize)>,
}

impl Coupling {
    pub fn new(cfg: CouplingConfig) -> Self {
        if let Err(msg) = cfg.validate() {
            panic!("coupling config: {msg}");
        }
        let seed = cfg.seed.unwrap_or(1);
        let mut coupling = Self {
            input_size: cfg.input_size,
            output_size: cfg.output_size,
            scalar: cfg.scalar,
            learning_rate: cfg.learning_rate,
            rule: cfg.rule,
            update_all_weights: cfg.update_all_weights,
            reduction_factor: cfg.reduction_factor,
            weights_file: cfg.weights_file,
            weights: vec![0.0; cfg.input_size * cfg.output_size],
            input: vec![0.0; cfg.input_size],
            output: vec![0.0; cfg.output_size],
            min_weight: -1.0,
            max_weight: 1.0,
            trained: false,
            mode: DegenerationMode::default(),
            rng: Prng::new(seed),
            engine: DegenerationEngine::new(
                "synapses",
                seed.wrapping_add(0x9E3779B97F4A7C15),
            ),
        };
        coupling.randomize_weights();
        coupling.init();
        coupling
    }

    #[inline]
    pub fn input_size(&self) -> usize {
        self.input_size
    }

    #[inline]
    pub fn output_size(&self) -> usize {
        self.output_size
    }

    pub fn weights(&self) -> &[f64] {
        &self.weights
    }

    #[inline]
    pub fn weight(&self, i: usize, j: usize) -> f64 {
        self.weights[i * self.output_size + j]
    }

    pub fn output(&self) -> &[f64] {
        &self.output
    }

    pub fn is_trained(&self) -> bool {
        self.trained
    }

    /// Extrema of the weight matrix, captured at init and again whenever a
    /// trained matrix is read in.
    pub fn captured_bounds(&self) -> (f64, f64) {
        (self.min_weight, self.max_weight)
    }

    /// Accumulate one upstream contribution into this tick's input.
    pub fn add_input(&mut self, contribution: &[f64]) {
        assert_eq!(
            contribution.len(),
            self.input.len(),
            "input length must match coupling input size"
        );
        for (acc, c) in self.input.iter_mut().zip(contribution) {
            *acc += c;
        }
    }

    /// Apply one supervised update for a single (pre, target) pair.
    ///
    /// Marks the coupling trained. Hebbian and Widrow-Hoff always touch the
    /// whole matrix; Krogh-Hertz honors `update_all_weights`.
    pub fn update_weights(&mut self, pre: &[f64], target: &[f64]) {
        assert_eq!(pre.len(), self.input_size, "pre length must match input size");
        assert_eq!(
            target.len(),
            self.output_size,
            "target length must match output size"
        );
        let m = self.output_size;
        match self.rule {
            LearningRule::Hebbian => {
                for (i, &p) in pre.iter().enumerate() {
                    for (j, &t) in target.iter().enumerate() {
                        self.weights[i * m + j] += self.learning_rate * p * t;
                    }
                }
            }
            LearningRule::WidrowHoff => {
                let actual = self.matvec(pre);
                for (i, &p) in pre.iter().enumerate() {
                    for j in 0..m {
                        let err = target[j] - actual[j];
                        self.weights[i * m + j] += self.learning_rate * err * p;
                    }
                }
            }
            LearningRule::KroghHertz => {
                let actual = self.matvec(pre);
                let intact: Option<hashbrown::HashSet<(usize, usize)>> =
                    if self.update_all_weights {
                        None
                    } else {
                        Some(self.engine.pool().iter().copied().collect())
                    };
                for (i, &p) in pre.iter().enumerate() {
                    for j in 0..m {
                        if let Some(set) = &intact {
                            if !set.contains(&(i, j)) {
                                continue;
                            }
                        }
                        let idx = i * m + j;
                        let err = target[j] - actual[j];
                        self.weights[idx] +=
                            self.learning_rate * (err - KROGH_HERTZ_DECAY * self.weights[idx]) * p;
                    }
                }
            }
        }
        self.trained = true;
    }

    /// Zero every weight and drop the trained flag.
    pub fn reset_weights(&mut self) {
        self.weights.iter_mut().for_each(|w| *w = 0.0);
        self.trained = false;
    }

    pub fn set_learning_rate(&mut self, rate: f64) {
        assert!(
            rate > 0.0 && rate.is_finite(),
            "coupling: learning rate must be positive and finite"
        );
        self.learning_rate = rate;
    }

    pub(crate) fn weight_values(&self) -> Vec<f64> {
        self.weights.clone()
    }

    /// Overwrite the matrix values, leaving every other piece of state alone.
    pub(crate) fn set_weight_values(&mut self, values: &[f64]) {
        self.weights.copy_from_slice(values);
    }

    /// Couplings accept every degeneration mode.
    pub fn set_degeneration_mode(&mut self, mode: DegenerationMode) -> bool {
        self.mode = mode;
        true
    }

    pub fn set_degeneration_count(&mut self, count: usize) {
        self.engine.set_count(count);
    }

    /// Arm one batch of synapse degeneration for the next step.
    pub fn start_degeneration(&mut self) -> bool {
        self.engine.arm()
    }

    pub fn remaining_degeneration_targets(&self) -> usize {
        self.engine.remaining()
    }

    /// Write the matrix as text, one row per line, values space-separated.
    pub fn write_weights_to<W: Write>(&self, out: &mut W) -> io::Result<()> {
        for row in self.weights.chunks(self.output_size) {
            for (j, v) in row.iter().enumerate() {
                if j > 0 {
                    write!(out, " ")?;
                }
                write!(out, "{v}")?;
            }
            writeln!(out)?;
        }
        Ok(())
    }

    /// Parse a matrix in the format of [`Coupling::write_weights_to`].
    ///
    /// The matrix is only replaced once the whole input parsed and the value
    /// count matched. Marks the coupling trained.
    pub fn read_weights_from<R: Read>(&mut self, r: &mut R) -> io::Result<()> {
        let reader = BufReader::new(r);
        let mut values = Vec::with_capacity(self.weights.len());
        for line in reader.lines() {
            for tok in line?.split_whitespace() {
                let v: f64 = tok.parse().map_err(|_| {
                    io::Error::new(io::ErrorKind::InvalidData, "malformed weight value")
                })?;
                values.push(v);
            }
        }
        if values.len() != self.weights.len() {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                "weight count does not match coupling dimensions",
            ));
        }
        self.weights = values;
        self.trained = true;
        // A freshly read matrix carries its own extrema.
        self.capture_bounds();
        Ok(())
    }

    /// Load weights from a text file. On any failure the error is logged,
    /// the matrix re-randomized and false returned; the step loop never sees
    /// an error.
    pub fn load_weights(&mut self, path: &Path) -> bool {
        let result = File::open(path).and_then(|mut f| self.read_weights_from(&mut f));
        match result {
            Ok(()) => {
                info!(path = %path.display(), "loaded coupling weights");
                true
            }
            Err(e) => {
                warn!(
                    path = %path.display(),
                    error = %e,
                    "failed to load weights, falling back to random"
                );
                self.randomize_weights();
                self.trained = false;
                false
            }
        }
    }

    /// Save weights to a text file. Failures are logged and reported via the
    /// return value, state is untouched either way.
    pub fn save_weights(&self, path: &Path) -> bool {
        let result = File::create(path).and_then(|mut f| self.write_weights_to(&mut f));
        match result {
            Ok(()) => true,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "failed to save weights");
                false
            }
        }
    }

    fn randomize_weights(&mut self) {
        for w in self.weights.iter_mut() {
            *w = self.rng.gen_range_f64(-1.0, 1.0);
        }
    }

    fn matvec(&self, pre: &[f64]) -> Vec<f64> {
        let m = self.output_size;
        let mut out = vec![0.0; m];
        for (i, &p) in pre.iter().enumerate() {
            let row = &self.weights[i * m..(i + 1) * m];
            for (o, &w) in out.iter_mut().zip(row) {
                *o += w * p;
            }
        }
        out
    }

    #[cfg(not(feature = "parallel"))]
    fn compute_output(&mut self) {
        let m = self.output_size;
        let weights = &self.weights;
        let input = &self.input;
        let output = &mut self.output;
        output.iter_mut().for_each(|o| *o = 0.0);
        for (i, &x) in input.iter().enumerate() {
            let row = &weights[i * m..(i + 1) * m];
            for (o, &w) in output.iter_mut().zip(row) {
                *o += w * x;
            }
        }
    }

    // Column-parallel version. Each column sums rows in ascending order, so
    // the result is bitwise identical to the scalar path.
    #[cfg(feature = "parallel")]
    fn compute_output(&mut self) {
        use rayon::prelude::*;
        let m = self.output_size;
        let weights = &self.weights;
        let input = &self.input;
        self.output.par_iter_mut().enumerate().for_each(|(j, o)| {
            let mut acc = 0.0;
            for (i, &x) in input.iter().enumerate() {
                acc += weights[i * m + j] * x;
            }
            *o = acc;
        });
    }

    fn apply_degeneration_batch(&mut self) {
        for (i, j) in self.engine.take_batch() {
            let idx = i * self.output_size + j;
            match self.mode {
                DegenerationMode::Deactivate => self.weights[idx] = 0.0,
                DegenerationMode::Randomize => {
                    self.weights[idx] = self.rng.gen_range_f64(self.min_weight, self.max_weight);
                }
                DegenerationMode::Reduce => self.weights[idx] *= self.reduction_factor,
            }
        }
    }

    /// Record the current weight extrema as the sampling interval for
    /// [`DegenerationMode::Randomize`]. Runs at init and whenever a trained
    /// matrix replaces the current one.
    pub(crate) fn capture_bounds(&mut self) {
        let mut min = f64::INFINITY;
        let mut max = f64::NEG_INFINITY;
        for &w in &self.weights {
            min = min.min(w);
            max = max.max(w);
        }
        self.min_weight = min;
        self.max_weight = max;
    }

    fn all_pairs(&self) -> impl Iterator<Item = (usize, usize)> {
        let m = self.output_size;
        (0..self.input_size).flat_map(move |i| (0..m).map(move |j| (i, j)))
    }

    pub(crate) fn write_state_payload(&self, buf: &mut Vec<u8>) {
        storage::put_u32(buf, self.input_size as u32);
        storage::put_u32(buf, self.output_size as u32);
        for &w in &self.weights {
            storage::put_f64(buf, w);
        }
        storage::put_f64(buf, self.min_weight);
        storage::put_f64(buf, self.max_weight);
        storage::put_u32(buf, self.trained as u32);
        storage::put_u32(buf, match self.mode {
            DegenerationMode::Deactivate => 0,
            DegenerationMode::Randomize => 1,
            DegenerationMode::Reduce => 2,
        });
        storage::put_u64(buf, self.rng.state());
        storage::put_u64(buf, self.engine.rng_state());
        storage::put_u32(buf, self.engine.count() as u32);
        let pool = self.engine.pool();
        storage::put_u32(buf, pool.len() as u32);
        for &(i, j) in pool {
            storage::put_u32(buf, i as u32);
            storage::put_u32(buf, j as u32);
        }
    }

    pub(crate) fn apply_state_payload(&mut self, mut data: &[u8]) -> io::Result<()> {
        let data = &mut data;
        let n = storage::take_u32(data)? as usize;
        let m = storage::take_u32(data)? as usize;
        if n != self.input_size || m != self.output_size {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                "coupling size mismatch in image",
            ));
        }
        for w in self.weights.iter_mut() {
            *w = storage::take_f64(data)?;
        }
        self.min_weight = storage::take_f64(data)?;
        self.max_weight = storage::take_f64(data)?;
        self.trained = storage::take_u32(data)? != 0;
        self.mode = match storage::take_u32(data)? {
            0 => DegenerationMode::Deactivate,
            1 => DegenerationMode::Randomize,
            2 => DegenerationMode::Reduce,
            _ => {
                return Err(io::Error::new(
                    io::ErrorKind::InvalidData,
                    "unknown degeneration mode in image",
                ))
            }
        };
        self.rng = Prng::from_state(storage::take_u64(data)?);
        self.engine.set_rng_state(storage::take_u64(data)?);
        self.engine.set_count(storage::take_u32(data)? as usize);
        let pool_len = storage::take_u32(data)? as usize;
        let mut pool = Vec::with_capacity(pool_len);
        for _ in 0..pool_len {
            let i = storage::take_u32(data)? as usize;
            let j = storage::take_u32(data)? as usize;
            if i >= n || j >= m {
                return Err(io::Error::new(
                    io::ErrorKind::InvalidData,
                    "synapse index out of range in image",
                ));
            }
            pool.push((i, j));
        }
        self.engine.set_pool(pool);
        self.input.iter_mut().for_each(|v| *v = 0.0);
        self.output.iter_mut().for_each(|v| *v = 0.0);
        Ok(())
    }
}

impl Steppable for Coupling {
    fn init(&mut self) {
        if let Some(path) = self.weights_file.clone() {
            self.load_weights(&path);
        }
        self.capture_bounds();
        let pairs: Vec<_> = self.all_pairs().collect();
        self.engine.repopulate(pairs);
        self.input.iter_mut().for_each(|v| *v = 0.0);
        self.output.iter_mut().for_each(|v| *v = 0.0);
    }

    fn step(&mut self, _t: f64, _dt: f64) {
        for x in self.input.iter_mut() {
            *x = x.max(0.0);
        }
        self.compute_output();
        for o in self.output.iter_mut() {
            *o = o.max(0.0) * self.scalar;
        }
        self.input.iter_mut().for_each(|v| *v = 0.0);
        self.apply_degeneration_batch();
    }

    fn close(&mut self) {
        self.engine.clear();
        self.input.iter_mut().for_each(|v| *v = 0.0);
        self.output.iter_mut().for_each(|v| *v = 0.0);
    }

    fn component(&self, name: &str) -> Option<&[f64]> {
        match name {
            "input" => Some(&self.input),
            "output" => Some(&self.output),
            "weights" => Some(&self.weights),
            _ => None,
        }
    }
}
