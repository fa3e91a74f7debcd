// The two-field architecture: perceptual field, trainable coupling,
// output field, with lateral kernels and optional noise.

use std::io::{self, Read, Write};
use std::path::PathBuf;

use tracing::info;

use crate::coupling::{Coupling, CouplingConfig, LearningRule};
use crate::degeneration::DegenerationMode;
use crate::element::Steppable;
use crate::field::{ActivationFunction, Field, FieldConfig};
use crate::kernel::{
    GaussStimulus, GaussStimulusConfig, InteractionKernel, InteractionKernelConfig, NormalNoise,
    NormalNoiseConfig,
};
use crate::storage;

const CHUNK_CONFIG: &[u8; 4] = b"CFG0";
const CHUNK_PRNG: &[u8; 4] = b"PRNG";
const CHUNK_PERCEPTUAL: &[u8; 4] = b"FLDP";
const CHUNK_OUTPUT: &[u8; 4] = b"FLDO";
const CHUNK_COUPLING: &[u8; 4] = b"COUP";
const CHUNK_STATE: &[u8; 4] = b"STAT";

// Activation range the training snapshots are normalized from.
const NORM_MIN: f64 = -30.0;
const NORM_MAX: f64 = 20.0;

// Smoothing kernel the noise sources run through on their way to a field.
const NOISE_KERNEL_AMPLITUDE: f64 = 0.25;
const NOISE_KERNEL_SIGMA: f64 = 0.02;

/// The seven hue to angle associations, in grid index units of the
/// perceptual and output rings respectively.
pub fn hue_angle_pairs() -> [(f64, f64); 7] {
    [
        (0.0, 2.0),
        (41.0, 6.0),
        (60.0, 10.0),
        (120.0, 14.0),
        (240.0, 18.0),
        (274.0, 22.0),
        (300.0, 26.0),
    ]
}

/// Which part of the rig a degeneration request targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum DegenerationTarget {
    /// Neurons of the perceptual field.
    PerceptualField,
    /// Neurons of the output field.
    OutputField,
    /// Synapses of the coupling.
    Coupling,
}

/// Construction parameters for a [`Rig`].
///
/// The defaults are the reference architecture: a 360-site perceptual ring
/// coupled to a 28-site output ring through a Krogh-Hertz trained matrix.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct RigConfig {
    pub perceptual_size: usize,
    pub perceptual_step_size: f64,
    pub output_size: usize,
    pub output_step_size: f64,
    pub tau: f64,
    pub resting_level: f64,
    pub sigmoid_steepness: f64,
    pub perceptual_kernel_amplitude: f64,
    pub output_kernel_amplitude: f64,
    /// Lateral kernel widths, each in grid index units of its own ring. The
    /// output ring is an order of magnitude coarser than the perceptual one,
    /// so its kernel must be correspondingly narrower to stay selective.
    pub perceptual_kernel_sigma: f64,
    pub output_kernel_sigma: f64,
    pub kernel_amplitude_global: f64,
    pub coupling_scalar: f64,
    pub learning_rate: f64,
    pub rule: LearningRule,
    pub update_all_weights: bool,
    pub reduction_factor: f64,
    /// Set to 0.0 for a deterministic rig.
    pub noise_amplitude: f64,
    pub stimulus_sigma: f64,
    pub stimulus_amplitude: f64,
    pub dt: f64,
    pub seed: Option<u64>,
    /// Weights are loaded from here on init and saved here after training.
    pub weights_file: Option<PathBuf>,
}

impl Default for RigConfig {
    fn default() -> Self {
        Self {
            perceptual_size: 360,
            perceptual_step_size: 0.5,
            output_size: 28,
            output_step_size: 0.1,
            tau: 25.0,
            resting_level: -5.0,
            sigmoid_steepness: 10.0,
            perceptual_kernel_amplitude: 40.0,
            output_kernel_amplitude: 20.0,
            perceptual_kernel_sigma: 25.0,
            output_kernel_sigma: 2.5,
            kernel_amplitude_global: -0.12,
            coupling_scalar: 0.4,
            learning_rate: 0.01,
            rule: LearningRule::KroghHertz,
            update_all_weights: true,
            reduction_factor: 0.005,
            noise_amplitude: 0.01,
            stimulus_sigma: 3.0,
            stimulus_amplitude: 10.0,
            dt: 1.0,
            seed: None,
            weights_file: None,
        }
    }
}

impl RigConfig {
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn validate(&self) -> Result<(), &'static str> {
        if self.perceptual_size == 0 || self.output_size == 0 {
            return Err("field sizes must be non-zero");
        }
        if !(self.perceptual_step_size > 0.0 && self.output_step_size > 0.0) {
            return Err("step sizes must be positive");
        }
        if !(self.tau > 0.0 && self.tau.is_finite()) {
            return Err("tau must be positive and finite");
        }
        if !(self.dt > 0.0 && self.dt.is_finite()) {
            return Err("dt must be positive and finite");
        }
        if !(self.reduction_factor > 0.0 && self.reduction_factor < 1.0) {
            return Err("reduction_factor must lie in (0, 1)");
        }
        Ok(())
    }

    fn perceptual_field(&self, seed: u64) -> FieldConfig {
        FieldConfig {
            size: self.perceptual_size,
            step_size: self.perceptual_step_size,
            tau: self.tau,
            resting_level: self.resting_level,
            activation_fn: ActivationFunction::Sigmoid {
                x_shift: 0.0,
                steepness: self.sigmoid_steepness,
            },
            seed: Some(seed),
        }
    }

    fn output_field(&self, seed: u64) -> FieldConfig {
        FieldConfig {
            size: self.output_size,
            step_size: self.output_step_size,
            ..self.perceptual_field(seed)
        }
    }

    fn coupling(&self, seed: u64) -> CouplingConfig {
        CouplingConfig {
            input_size: self.perceptual_size,
            output_size: self.output_size,
            scalar: self.coupling_scalar,
            learning_rate: self.learning_rate,
            rule: self.rule,
            update_all_weights: self.update_all_weights,
            reduction_factor: self.reduction_factor,
            seed: Some(seed),
            weights_file: self.weights_file.clone(),
        }
    }

    fn kernel(&self, size: usize, sigma: f64, amplitude: f64) -> InteractionKernelConfig {
        InteractionKernelConfig {
            size,
            sigma,
            amplitude,
            amplitude_global: self.kernel_amplitude_global,
            normalized: true,
        }
    }

    // Each noise source passes through a near-delta kernel before reaching
    // its field, which attenuates it without spatial spread.
    fn noise_kernel(size: usize) -> InteractionKernelConfig {
        InteractionKernelConfig {
            size,
            sigma: NOISE_KERNEL_SIGMA,
            amplitude: NOISE_KERNEL_AMPLITUDE,
            amplitude_global: 0.0,
            normalized: false,
        }
    }

    fn noise(&self, size: usize, seed: u64) -> NormalNoiseConfig {
        NormalNoiseConfig {
            size,
            amplitude: self.noise_amplitude,
            seed: Some(seed),
        }
    }
}

/// An owned aggregate of the whole architecture with a fixed tick order.
///
/// Per tick: the lateral kernels and noise feed the perceptual field from
/// the previous tick's output, the perceptual field steps, the coupling
/// transforms the fresh perceptual activation, then the output field is fed
/// and stepped. There is no general scheduler; the wiring is this function.
#[derive(Debug)]
pub struct Rig {
    cfg: RigConfig,
    perceptual: Field,
    output: Field,
    coupling: Coupling,
    perceptual_kernel: InteractionKernel,
    output_kernel: InteractionKernel,
    perceptual_noise: NormalNoise,
    output_noise: NormalNoise,
    perceptual_noise_kernel: InteractionKernel,
    output_noise_kernel: InteractionKernel,
    stimulus: Option<GaussStimulus>,
    /// Teaching signal placed on the output field during training only.
    teach_stimulus: Option<GaussStimulus>,
    tick: u64,
}

impl Rig {
    pub fn new(cfg: RigConfig) -> Self {
        if let Err(msg) = cfg.validate() {
            panic!("rig config: {msg}");
        }
        let seed = cfg.seed.unwrap_or(1);
        Self {
            perceptual: Field::new(cfg.perceptual_field(seed.wrapping_add(1))),
            output: Field::new(cfg.output_field(seed.wrapping_add(2))),
            coupling: Coupling::new(cfg.coupling(seed.wrapping_add(3))),
            perceptual_kernel: InteractionKernel::new(cfg.kernel(
                cfg.perceptual_size,
                cfg.perceptual_kernel_sigma,
                cfg.perceptual_kernel_amplitude,
            )),
            output_kernel: InteractionKernel::new(cfg.kernel(
                cfg.output_size,
                cfg.output_kernel_sigma,
                cfg.output_kernel_amplitude,
            )),
            perceptual_noise: NormalNoise::new(cfg.noise(cfg.perceptual_size, seed.wrapping_add(4))),
            output_noise: NormalNoise::new(cfg.noise(cfg.output_size, seed.wrapping_add(5))),
            perceptual_noise_kernel: InteractionKernel::new(RigConfig::noise_kernel(
                cfg.perceptual_size,
            )),
            output_noise_kernel: InteractionKernel::new(RigConfig::noise_kernel(cfg.output_size)),
            stimulus: None,
            teach_stimulus: None,
            tick: 0,
            cfg,
        }
    }

    pub fn config(&self) -> &RigConfig {
        &self.cfg
    }

    pub fn tick(&self) -> u64 {
        self.tick
    }

    pub fn time(&self) -> f64 {
        self.tick as f64 * self.cfg.dt
    }

    pub fn perceptual(&self) -> &Field {
        &self.perceptual
    }

    pub fn output_field(&self) -> &Field {
        &self.output
    }

    pub fn coupling(&self) -> &Coupling {
        &self.coupling
    }

    /// Re-initialize every element and reset the clock.
    pub fn init(&mut self) {
        let mut elements: Vec<&mut dyn Steppable> = vec![
            &mut self.perceptual,
            &mut self.output,
            &mut self.coupling,
            &mut self.perceptual_kernel,
            &mut self.output_kernel,
            &mut self.perceptual_noise,
            &mut self.output_noise,
            &mut self.perceptual_noise_kernel,
            &mut self.output_noise_kernel,
        ];
        if let Some(stim) = self.stimulus.as_mut() {
            elements.push(stim);
        }
        for element in elements {
            element.init();
        }
        self.teach_stimulus = None;
        self.tick = 0;
    }

    /// Tear down every element. Degeneration pools refill on the next init.
    pub fn close(&mut self) {
        let mut elements: Vec<&mut dyn Steppable> = vec![
            &mut self.perceptual,
            &mut self.output,
            &mut self.coupling,
            &mut self.perceptual_kernel,
            &mut self.output_kernel,
            &mut self.perceptual_noise,
            &mut self.output_noise,
            &mut self.perceptual_noise_kernel,
            &mut self.output_noise_kernel,
        ];
        if let Some(stim) = self.stimulus.as_mut() {
            elements.push(stim);
        }
        for element in elements {
            element.close();
        }
        self.teach_stimulus = None;
    }

    /// Advance the whole architecture by one tick.
    pub fn step(&mut self) {
        let t = self.time();
        let dt = self.cfg.dt;

        self.perceptual_kernel.add_input(self.perceptual.output());
        self.perceptual_kernel.step(t, dt);
        self.perceptual_noise.step(t, dt);
        self.perceptual_noise_kernel
            .add_input(self.perceptual_noise.output());
        self.perceptual_noise_kernel.step(t, dt);

        if let Some(stim) = &self.stimulus {
            self.perceptual.add_input(stim.output());
        }
        self.perceptual.add_input(self.perceptual_kernel.output());
        self.perceptual
            .add_input(self.perceptual_noise_kernel.output());
        self.perceptual.step(t, dt);

        // The coupling reads the raw activation, not the sigmoided output;
        // its own rectification suppresses the sub-zero part.
        self.coupling.add_input(self.perceptual.activation());
        self.coupling.step(t, dt);

        self.output_kernel.add_input(self.output.output());
        self.output_kernel.step(t, dt);
        self.output_noise.step(t, dt);
        self.output_noise_kernel
            .add_input(self.output_noise.output());
        self.output_noise_kernel.step(t, dt);

        self.output.add_input(self.output_kernel.output());
        self.output.add_input(self.output_noise_kernel.output());
        self.output.add_input(self.coupling.output());
        if let Some(stim) = &self.teach_stimulus {
            self.output.add_input(stim.output());
        }
        self.output.step(t, dt);

        self.tick += 1;
    }

    pub fn settle(&mut self, ticks: u64) {
        for _ in 0..ticks {
            self.step();
        }
    }

    /// Place (or move) the hue stimulus, position in perceptual index units.
    pub fn set_stimulus(&mut self, position: f64) {
        match self.stimulus.as_mut() {
            Some(stim) => stim.set_position(position),
            None => {
                self.stimulus = Some(GaussStimulus::new(GaussStimulusConfig {
                    size: self.cfg.perceptual_size,
                    sigma: self.cfg.stimulus_sigma,
                    amplitude: self.cfg.stimulus_amplitude,
                    position,
                }));
            }
        }
    }

    pub fn clear_stimulus(&mut self) {
        self.stimulus = None;
    }

    pub fn perceptual_centroid(&self) -> f64 {
        self.perceptual.centroid()
    }

    pub fn output_centroid(&self) -> f64 {
        self.output.centroid()
    }

    /// Reset both fields to their resting activation. Dead neurons and
    /// degeneration pools are untouched.
    pub fn reset_activity(&mut self) {
        self.perceptual.reset_activation();
        self.output.reset_activation();
    }

    /// Present a stimulus from rest, settle, read out both centroids.
    ///
    /// Returns (perceptual centroid, output centroid) in physical
    /// coordinates; either may be `NO_PEAK`.
    pub fn probe(&mut self, position: f64, settle_ticks: u64) -> (f64, f64) {
        self.reset_activity();
        self.set_stimulus(position);
        self.settle(settle_ticks);
        let result = (self.perceptual_centroid(), self.output_centroid());
        self.clear_stimulus();
        result
    }

    /// Configure degeneration for one target. Returns false when the mode is
    /// not supported by that target (fields only deactivate).
    pub fn set_degeneration(
        &mut self,
        target: DegenerationTarget,
        mode: DegenerationMode,
        count: usize,
    ) -> bool {
        match target {
            DegenerationTarget::PerceptualField => {
                configure_field_degeneration(&mut self.perceptual, mode, count)
            }
            DegenerationTarget::OutputField => {
                configure_field_degeneration(&mut self.output, mode, count)
            }
            DegenerationTarget::Coupling => {
                self.coupling.set_degeneration_mode(mode);
                self.coupling.set_degeneration_count(count);
                true
            }
        }
    }

    /// Arm one degeneration batch on the target. Returns false when a batch
    /// is already pending.
    pub fn start_degeneration(&mut self, target: DegenerationTarget) -> bool {
        match target {
            DegenerationTarget::PerceptualField => self.perceptual.start_degeneration(),
            DegenerationTarget::OutputField => self.output.start_degeneration(),
            DegenerationTarget::Coupling => self.coupling.start_degeneration(),
        }
    }

    pub fn remaining_targets(&self, target: DegenerationTarget) -> usize {
        match target {
            DegenerationTarget::PerceptualField => {
                self.perceptual.remaining_degeneration_targets()
            }
            DegenerationTarget::OutputField => self.output.remaining_degeneration_targets(),
            DegenerationTarget::Coupling => self.coupling.remaining_degeneration_targets(),
        }
    }

    /// Swap the coupling's learning rate, for retraining at a different pace.
    pub fn set_learning_rate(&mut self, rate: f64) {
        self.coupling.set_learning_rate(rate);
    }

    /// Train the coupling from a clean slate by simulated association.
    ///
    /// The weights are zeroed, then every pair is re-demonstrated; see
    /// [`Rig::redemonstrate`] for the procedure.
    pub fn train_associations(
        &mut self,
        pairs: &[(f64, f64)],
        settle_ticks: u64,
        epochs: usize,
    ) {
        self.coupling.reset_weights();
        self.redemonstrate(pairs, settle_ticks, epochs);
    }

    /// Re-demonstrate associations on top of the current weights.
    ///
    /// For every (hue, angle) pair a Gaussian bump is placed on each field
    /// and the rig settles; the hue stimulus is then removed and the rig
    /// settles again, so the pre snapshot is the self-sustained peak rather
    /// than the driven one. The normalized snapshots are cycled through the
    /// coupling's learning rule for `epochs` full passes, starting from the
    /// weights as they are. This is the retraining path for a damaged
    /// coupling; updates still honor `update_all_weights`. When a weights
    /// file is configured the result is saved there.
    pub fn redemonstrate(&mut self, pairs: &[(f64, f64)], settle_ticks: u64, epochs: usize) {
        let samples = self.collect_association_snapshots(pairs, settle_ticks);
        for _ in 0..epochs {
            for (pre, target) in &samples {
                self.coupling.update_weights(pre, target);
            }
        }
        // Randomize degeneration samples from the trained extrema, not the
        // bounds of whatever matrix preceded training.
        self.coupling.capture_bounds();
        info!(
            pairs = pairs.len(),
            epochs, "association training complete"
        );
        if let Some(path) = self.cfg.weights_file.clone() {
            self.coupling.save_weights(&path);
        }
    }

    /// Settle each association and normalize the activation snapshots.
    ///
    /// The coupling is silenced while the snapshots form, so the output
    /// field shows only its teaching bump; the matrix comes back untouched
    /// before returning.
    fn collect_association_snapshots(
        &mut self,
        pairs: &[(f64, f64)],
        settle_ticks: u64,
    ) -> Vec<(Vec<f64>, Vec<f64>)> {
        let kept = self.coupling.weight_values();
        self.coupling.reset_weights();
        let mut samples: Vec<(Vec<f64>, Vec<f64>)> = Vec::with_capacity(pairs.len());
        for &(hue, angle) in pairs {
            self.reset_activity();
            self.set_stimulus(hue);
            self.teach_stimulus = Some(GaussStimulus::new(GaussStimulusConfig {
                size: self.cfg.output_size,
                sigma: self.cfg.stimulus_sigma,
                amplitude: self.cfg.stimulus_amplitude,
                position: angle,
            }));
            self.settle(settle_ticks);
            self.clear_stimulus();
            self.settle(settle_ticks);
            let pre = normalize(self.perceptual.activation());
            let target = normalize(self.output.activation());
            samples.push((pre, target));
        }
        self.teach_stimulus = None;
        self.reset_activity();
        self.coupling.set_weight_values(&kept);
        samples
    }

    /// Capture the coupling's weight matrix in the text format.
    pub fn export_weights(&self) -> io::Result<Vec<u8>> {
        let mut buf = Vec::new();
        self.coupling.write_weights_to(&mut buf)?;
        Ok(buf)
    }

    /// Restore a matrix captured by [`Rig::export_weights`].
    ///
    /// Only the weight values change; degeneration pools keep their damage
    /// ledger, so a restore mid-experiment does not resurrect lost synapses.
    pub fn import_weights(&mut self, data: &[u8]) -> io::Result<()> {
        self.coupling.read_weights_from(&mut &data[..])
    }

    /// Serialize the whole rig into the chunked image format.
    pub fn save_image_to<W: Write>(&self, w: &mut W) -> io::Result<()> {
        storage::write_header(w)?;
        #[cfg(feature = "serde")]
        {
            let cfg = serde_json::to_vec(&self.cfg)
                .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, format!("config: {e}")))?;
            storage::write_chunk(w, CHUNK_CONFIG, &cfg)?;
        }

        let mut payload = Vec::new();
        storage::put_u64(&mut payload, self.perceptual_noise.rng_state());
        storage::put_u64(&mut payload, self.output_noise.rng_state());
        storage::write_chunk(w, CHUNK_PRNG, &payload)?;

        payload.clear();
        self.perceptual.write_state_payload(&mut payload);
        storage::write_chunk(w, CHUNK_PERCEPTUAL, &payload)?;

        payload.clear();
        self.output.write_state_payload(&mut payload);
        storage::write_chunk(w, CHUNK_OUTPUT, &payload)?;

        payload.clear();
        self.coupling.write_state_payload(&mut payload);
        storage::write_chunk(w, CHUNK_COUPLING, &payload)?;

        payload.clear();
        storage::put_u64(&mut payload, self.tick);
        match &self.stimulus {
            Some(stim) => {
                storage::put_u32(&mut payload, 1);
                storage::put_f64(&mut payload, stim.position());
            }
            None => storage::put_u32(&mut payload, 0),
        }
        storage::write_chunk(w, CHUNK_STATE, &payload)?;
        Ok(())
    }

    /// Restore a rig from an image written by [`Rig::save_image_to`].
    ///
    /// The rig must have been built with a matching architecture; chunks
    /// with unknown tags are skipped.
    pub fn load_image_from<R: Read>(&mut self, r: &mut R) -> io::Result<()> {
        storage::read_header(r)?;
        let mut seen_perceptual = false;
        let mut seen_output = false;
        let mut seen_coupling = false;
        while let Some((tag, payload)) = storage::read_chunk(r)? {
            match &tag {
                t if t == CHUNK_CONFIG => {
                    #[cfg(feature = "serde")]
                    {
                        let cfg: RigConfig = serde_json::from_slice(&payload).map_err(|e| {
                            io::Error::new(io::ErrorKind::InvalidData, format!("config: {e}"))
                        })?;
                        if cfg.perceptual_size != self.cfg.perceptual_size
                            || cfg.output_size != self.cfg.output_size
                        {
                            return Err(io::Error::new(
                                io::ErrorKind::InvalidData,
                                "image was built for a different architecture",
                            ));
                        }
                    }
                }
                t if t == CHUNK_PRNG => {
                    let mut data = payload.as_slice();
                    let data = &mut data;
                    self.perceptual_noise.set_rng_state(storage::take_u64(data)?);
                    self.output_noise.set_rng_state(storage::take_u64(data)?);
                }
                t if t == CHUNK_PERCEPTUAL => {
                    self.perceptual.apply_state_payload(&payload)?;
                    seen_perceptual = true;
                }
                t if t == CHUNK_OUTPUT => {
                    self.output.apply_state_payload(&payload)?;
                    seen_output = true;
                }
                t if t == CHUNK_COUPLING => {
                    self.coupling.apply_state_payload(&payload)?;
                    seen_coupling = true;
                }
                t if t == CHUNK_STATE => {
                    let mut data = payload.as_slice();
                    let data = &mut data;
                    self.tick = storage::take_u64(data)?;
                    if storage::take_u32(data)? != 0 {
                        let position = storage::take_f64(data)?;
                        if !(position >= 0.0 && position < self.cfg.perceptual_size as f64) {
                            return Err(io::Error::new(
                                io::ErrorKind::InvalidData,
                                "stimulus position out of range in image",
                            ));
                        }
                        self.set_stimulus(position);
                    } else {
                        self.stimulus = None;
                    }
                }
                _ => {
                    tracing::debug!(
                        tag = %String::from_utf8_lossy(&tag),
                        "skipping unknown image chunk"
                    );
                }
            }
        }
        if !(seen_perceptual && seen_output && seen_coupling) {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                "image is missing required chunks",
            ));
        }
        Ok(())
    }
}

/// Map an activation snapshot from the fixed simulation range onto [-1, 1].
fn normalize(activation: &[f64]) -> Vec<f64> {
    activation
        .iter()
        .map(|&v| (v - NORM_MIN) / (NORM_MAX - NORM_MIN) * 2.0 - 1.0)
        .collect()
}

fn configure_field_degeneration(field: &mut Field, mode: DegenerationMode, count: usize) -> bool {
    if !field.set_degeneration_mode(mode) {
        return false;
    }
    field.set_degeneration_count(count);
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decoder::NO_PEAK;

    fn quiet_cfg() -> RigConfig {
        RigConfig {
            noise_amplitude: 0.0,
            seed: Some(42),
            ..Default::default()
        }
    }

    fn small_cfg() -> RigConfig {
        RigConfig {
            perceptual_size: 40,
            perceptual_step_size: 0.5,
            output_size: 10,
            output_step_size: 0.1,
            perceptual_kernel_sigma: 4.0,
            output_kernel_sigma: 1.0,
            noise_amplitude: 0.0,
            seed: Some(42),
            ..Default::default()
        }
    }

    #[test]
    fn default_architecture_dimensions() {
        let rig = Rig::new(RigConfig::default().with_seed(1));
        assert_eq!(rig.perceptual().size(), 360);
        assert_eq!(rig.output_field().size(), 28);
        assert_eq!(rig.coupling().weights().len(), 360 * 28);
        assert_eq!(rig.tick(), 0);
        assert!(!rig.coupling().is_trained());
    }

    #[test]
    fn resting_rig_is_silent() {
        let mut rig = Rig::new(quiet_cfg());
        rig.settle(20);
        assert_eq!(rig.perceptual_centroid(), NO_PEAK);
        assert_eq!(rig.output_centroid(), NO_PEAK);
    }

    #[test]
    fn stimulus_forms_a_perceptual_peak() {
        let mut rig = Rig::new(quiet_cfg());
        rig.set_stimulus(120.0);
        rig.settle(100);
        let c = rig.perceptual_centroid();
        let expected = rig.perceptual().ring().coord_of(120);
        assert!(
            (c - expected).abs() < 2.0,
            "centroid {c} too far from {expected}"
        );
    }

    #[test]
    fn detection_peak_survives_stimulus_removal() {
        let mut rig = Rig::new(quiet_cfg());
        rig.set_stimulus(200.0);
        rig.settle(150);
        rig.clear_stimulus();
        rig.settle(150);
        let c = rig.perceptual_centroid();
        let expected = rig.perceptual().ring().coord_of(200);
        assert_ne!(c, NO_PEAK);
        assert!(
            (c - expected).abs() < 3.0,
            "sustained centroid {c} drifted from {expected}"
        );
    }

    #[test]
    fn tick_counter_advances_with_dt() {
        let mut rig = Rig::new(RigConfig {
            dt: 0.5,
            ..quiet_cfg()
        });
        rig.settle(4);
        assert_eq!(rig.tick(), 4);
        assert_eq!(rig.time(), 2.0);
    }

    #[test]
    fn degeneration_targets_route_to_their_element() {
        let mut rig = Rig::new(quiet_cfg());
        assert!(rig.set_degeneration(
            DegenerationTarget::PerceptualField,
            DegenerationMode::Deactivate,
            50,
        ));
        assert!(rig.start_degeneration(DegenerationTarget::PerceptualField));
        rig.step();
        assert_eq!(rig.perceptual().dead_count(), 50);
        assert_eq!(
            rig.remaining_targets(DegenerationTarget::PerceptualField),
            310
        );

        assert!(rig.set_degeneration(
            DegenerationTarget::OutputField,
            DegenerationMode::Deactivate,
            4,
        ));
        assert!(rig.start_degeneration(DegenerationTarget::OutputField));
        rig.step();
        assert_eq!(rig.output_field().dead_count(), 4);
        assert_eq!(rig.remaining_targets(DegenerationTarget::OutputField), 24);

        assert!(rig.set_degeneration(
            DegenerationTarget::Coupling,
            DegenerationMode::Deactivate,
            100,
        ));
        assert!(rig.start_degeneration(DegenerationTarget::Coupling));
        rig.step();
        assert_eq!(
            rig.remaining_targets(DegenerationTarget::Coupling),
            360 * 28 - 100
        );
    }

    #[test]
    fn weight_export_survives_further_degeneration() {
        let mut rig = Rig::new(small_cfg());
        rig.train_associations(&[(10.0, 3.0), (30.0, 7.0)], 40, 10);
        let saved = rig.export_weights().unwrap();

        rig.set_degeneration(
            DegenerationTarget::Coupling,
            DegenerationMode::Deactivate,
            50,
        );
        rig.start_degeneration(DegenerationTarget::Coupling);
        rig.step();
        let remaining = rig.remaining_targets(DegenerationTarget::Coupling);
        assert_ne!(saved, rig.export_weights().unwrap());

        // Restoring brings the values back but keeps the damage ledger.
        rig.import_weights(&saved).unwrap();
        assert_eq!(saved, rig.export_weights().unwrap());
        assert_eq!(rig.remaining_targets(DegenerationTarget::Coupling), remaining);
    }

    #[test]
    fn fields_reject_non_deactivate_modes() {
        let mut rig = Rig::new(quiet_cfg());
        assert!(!rig.set_degeneration(
            DegenerationTarget::PerceptualField,
            DegenerationMode::Randomize,
            5,
        ));
        assert!(rig.set_degeneration(
            DegenerationTarget::Coupling,
            DegenerationMode::Randomize,
            5,
        ));
    }

    #[test]
    fn training_marks_the_coupling_and_maps_the_probe() {
        let mut rig = Rig::new(quiet_cfg());
        rig.train_associations(&hue_angle_pairs(), 100, 30);
        assert!(rig.coupling().is_trained());
        assert!(rig.coupling().weights().iter().all(|w| w.is_finite()));
        assert!(rig.coupling().weights().iter().any(|&w| w != 0.0));

        // Probing a trained hue drives the coupling output toward the
        // associated angle. Settle past the probe so the perceptual peak is
        // in the self-sustained state the training snapshots used.
        rig.probe(120.0, 100);
        rig.settle(60);
        let out = rig.coupling().output();
        let peak = out
            .iter()
            .enumerate()
            .max_by(|a, b| a.1.total_cmp(b.1))
            .map(|(j, _)| j as f64)
            .unwrap();
        let ring = rig.output_field().ring();
        assert!(
            ring.index_distance(peak, 14.0) <= 3.0,
            "coupling peak at {peak}, expected near 14"
        );
    }

    #[test]
    fn redemonstration_preserves_untouched_associations() {
        let mut rig = Rig::new(quiet_cfg());
        rig.train_associations(&hue_angle_pairs(), 100, 30);
        let before = rig.coupling().weights().to_vec();

        // One pair re-demonstrated incrementally; the matrix moves but the
        // other associations keep working.
        rig.redemonstrate(&[(240.0, 18.0)], 100, 5);
        assert_ne!(before.as_slice(), rig.coupling().weights());

        rig.probe(120.0, 100);
        rig.settle(60);
        let out = rig.coupling().output();
        let peak = out
            .iter()
            .enumerate()
            .max_by(|a, b| a.1.total_cmp(b.1))
            .map(|(j, _)| j as f64)
            .unwrap();
        let ring = rig.output_field().ring();
        assert!(
            ring.index_distance(peak, 14.0) <= 3.0,
            "coupling peak at {peak}, expected near 14"
        );
    }

    #[test]
    fn trained_rig_decodes_each_association() {
        let mut rig = Rig::new(quiet_cfg());
        rig.train_associations(&hue_angle_pairs(), 100, 30);
        let ring = rig.output_field().ring();
        for &(hue, angle) in &hue_angle_pairs() {
            let (_, decoded) = rig.probe(hue, 100);
            let expected = ring.coord_of(angle as usize);
            assert_ne!(decoded, NO_PEAK, "hue {hue} decoded to silence");
            assert!(
                ring.circular_distance(decoded, expected) <= 0.5,
                "hue {hue}: decoded {decoded}, expected {expected}"
            );
            // The driven output peak outlives the stimulus.
            rig.settle(100);
            let sustained = rig.output_centroid();
            assert_ne!(sustained, NO_PEAK, "hue {hue} faded after removal");
            assert!(
                ring.circular_distance(sustained, expected) <= 0.5,
                "hue {hue}: sustained {sustained}, expected {expected}"
            );
        }
    }

    #[test]
    fn training_recaptures_randomize_bounds() {
        let mut rig = Rig::new(small_cfg());
        rig.train_associations(&[(10.0, 3.0), (30.0, 7.0)], 40, 10);
        let weights = rig.coupling().weights();
        let min = weights.iter().cloned().fold(f64::INFINITY, f64::min);
        let max = weights.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
        assert_eq!(rig.coupling().captured_bounds(), (min, max));
    }

    #[test]
    fn probe_resets_between_trials() {
        let mut rig = Rig::new(quiet_cfg());
        let (first, _) = rig.probe(60.0, 100);
        let (second, _) = rig.probe(240.0, 100);
        let ring = rig.perceptual().ring();
        assert!((first - ring.coord_of(60)).abs() < 2.0);
        assert!((second - ring.coord_of(240)).abs() < 2.0);
    }

    #[test]
    fn init_restores_a_fresh_rig() {
        let mut rig = Rig::new(quiet_cfg());
        rig.set_degeneration(
            DegenerationTarget::PerceptualField,
            DegenerationMode::Deactivate,
            30,
        );
        rig.start_degeneration(DegenerationTarget::PerceptualField);
        rig.set_stimulus(100.0);
        rig.settle(50);
        rig.init();
        assert_eq!(rig.tick(), 0);
        assert_eq!(rig.perceptual().dead_count(), 0);
        assert_eq!(
            rig.remaining_targets(DegenerationTarget::PerceptualField),
            360
        );
    }

    #[test]
    fn image_roundtrip_is_exact() {
        let mut rig = Rig::new(small_cfg());
        rig.train_associations(&[(10.0, 3.0), (30.0, 7.0)], 40, 10);
        rig.set_stimulus(10.0);
        rig.settle(25);
        rig.set_degeneration(
            DegenerationTarget::Coupling,
            DegenerationMode::Deactivate,
            20,
        );
        rig.start_degeneration(DegenerationTarget::Coupling);
        rig.step();

        let mut image = Vec::new();
        rig.save_image_to(&mut image).unwrap();

        let mut restored = Rig::new(small_cfg());
        restored.load_image_from(&mut image.as_slice()).unwrap();
        assert_eq!(restored.tick(), rig.tick());
        assert_eq!(
            restored.perceptual().activation(),
            rig.perceptual().activation()
        );
        assert_eq!(
            restored.output_field().activation(),
            rig.output_field().activation()
        );
        assert_eq!(restored.coupling().weights(), rig.coupling().weights());
        assert_eq!(
            restored.remaining_targets(DegenerationTarget::Coupling),
            rig.remaining_targets(DegenerationTarget::Coupling)
        );
        assert_eq!(restored.perceptual_centroid(), rig.perceptual_centroid());

        // Both rigs continue identically.
        rig.settle(5);
        restored.settle(5);
        assert_eq!(
            restored.perceptual().activation(),
            rig.perceptual().activation()
        );
    }

    #[test]
    fn image_with_missing_chunks_is_rejected() {
        let mut image = Vec::new();
        storage::write_header(&mut image).unwrap();
        let mut rig = Rig::new(small_cfg());
        let err = rig.load_image_from(&mut image.as_slice()).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidData);
    }

    #[test]
    fn file_roundtrip_through_tempdir() {
        let dir = tempfile::TempDir::new().expect("tempdir");
        let path = dir.path().join("rig.image");
        let mut rig = Rig::new(small_cfg());
        rig.set_stimulus(20.0);
        rig.settle(30);
        let mut file = std::fs::File::create(&path).unwrap();
        rig.save_image_to(&mut file).unwrap();
        drop(file);

        let mut restored = Rig::new(small_cfg());
        let mut file = std::fs::File::open(&path).unwrap();
        restored.load_image_from(&mut file).unwrap();
        assert_eq!(restored.perceptual_centroid(), rig.perceptual_centroid());
    }
}
