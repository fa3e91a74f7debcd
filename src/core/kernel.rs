// Input elements: Gaussian stimulus, lateral interaction kernel, noise.

use crate::element::Steppable;
use crate::prng::Prng;
use crate::ring::RingGeometry;

/// Construction parameters for a [`GaussStimulus`].
///
/// `sigma` and `position` are in grid index units, not physical coordinates.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct GaussStimulusConfig {
    pub size: usize,
    pub sigma: f64,
    pub amplitude: f64,
    pub position: f64,
}

impl Default for GaussStimulusConfig {
    fn default() -> Self {
        Self {
            size: 100,
            sigma: 3.0,
            amplitude: 10.0,
            position: 0.0,
        }
    }
}

impl GaussStimulusConfig {
    pub fn validate(&self) -> Result<(), &'static str> {
        if self.size == 0 {
            return Err("size must be non-zero");
        }
        if !(self.sigma > 0.0 && self.sigma.is_finite()) {
            return Err("sigma must be positive and finite");
        }
        if !self.amplitude.is_finite() {
            return Err("amplitude must be finite");
        }
        if !(self.position >= 0.0 && self.position < self.size as f64) {
            return Err("position must lie within [0, size)");
        }
        Ok(())
    }
}

/// A circular Gaussian bump, constant until repositioned.
#[derive(Debug, Clone)]
pub struct GaussStimulus {
    ring: RingGeometry,
    sigma: f64,
    amplitude: f64,
    position: f64,
    output: Vec<f64>,
}

impl GaussStimulus {
    pub fn new(cfg: GaussStimulusConfig) -> Self {
        if let Err(msg) = cfg.validate() {
            panic!("gauss stimulus config: {msg}");
        }
        let mut stim = Self {
            ring: RingGeometry::new(cfg.size, 1.0),
            sigma: cfg.sigma,
            amplitude: cfg.amplitude,
            position: cfg.position,
            output: vec![0.0; cfg.size],
        };
        stim.recompute();
        stim
    }

    pub fn position(&self) -> f64 {
        self.position
    }

    /// Move the bump. Takes effect immediately.
    pub fn set_position(&mut self, position: f64) {
        assert!(
            position >= 0.0 && position < self.ring.size as f64,
            "position must lie within [0, size)"
        );
        self.position = position;
        self.recompute();
    }

    pub fn output(&self) -> &[f64] {
        &self.output
    }

    fn recompute(&mut self) {
        let denom = 2.0 * self.sigma * self.sigma;
        for (i, o) in self.output.iter_mut().enumerate() {
            let d = self.ring.index_distance(i as f64, self.position);
            *o = self.amplitude * (-d * d / denom).exp();
        }
    }
}

impl Steppable for GaussStimulus {
    fn init(&mut self) {
        self.recompute();
    }

    fn step(&mut self, _t: f64, _dt: f64) {
        // Output is constant between repositionings.
    }

    fn close(&mut self) {
        self.output.iter_mut().for_each(|v| *v = 0.0);
    }

    fn component(&self, name: &str) -> Option<&[f64]> {
        match name {
            "output" => Some(&self.output),
            _ => None,
        }
    }
}

/// Construction parameters for an [`InteractionKernel`].
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct InteractionKernelConfig {
    pub size: usize,
    pub sigma: f64,
    pub amplitude: f64,
    /// Uniform term added for every unit of total input, typically negative
    /// (global inhibition).
    pub amplitude_global: f64,
    /// When set, the Gaussian profile is normalized to unit sum before
    /// scaling by `amplitude`.
    pub normalized: bool,
}

impl Default for InteractionKernelConfig {
    fn default() -> Self {
        Self {
            size: 100,
            sigma: 25.0,
            amplitude: 40.0,
            amplitude_global: -0.12,
            normalized: true,
        }
    }
}

impl InteractionKernelConfig {
    pub fn validate(&self) -> Result<(), &'static str> {
        if self.size == 0 {
            return Err("size must be non-zero");
        }
        if !(self.sigma > 0.0 && self.sigma.is_finite()) {
            return Err("sigma must be positive and finite");
        }
        if !self.amplitude.is_finite() || !self.amplitude_global.is_finite() {
            return Err("amplitudes must be finite");
        }
        Ok(())
    }
}

/// Lateral interaction: circular convolution with a Gaussian profile plus a
/// global (uniform) term. This is what lets a detection peak sustain itself
/// once the stimulus is removed.
#[derive(Debug, Clone)]
pub struct InteractionKernel {
    ring: RingGeometry,
    kernel: Vec<f64>,
    amplitude_global: f64,
    input: Vec<f64>,
    output: Vec<f64>,
}

impl InteractionKernel {
    pub fn new(cfg: InteractionKernelConfig) -> Self {
        if let Err(msg) = cfg.validate() {
            panic!("interaction kernel config: {msg}");
        }
        let ring = RingGeometry::new(cfg.size, 1.0);
        let denom = 2.0 * cfg.sigma * cfg.sigma;
        let mut kernel: Vec<f64> = (0..cfg.size)
            .map(|j| {
                let d = ring.index_distance(j as f64, 0.0);
                (-d * d / denom).exp()
            })
            .collect();
        if cfg.normalized {
            let sum: f64 = kernel.iter().sum();
            for k in kernel.iter_mut() {
                *k /= sum;
            }
        }
        for k in kernel.iter_mut() {
            *k *= cfg.amplitude;
        }
        Self {
            ring,
            kernel,
            amplitude_global: cfg.amplitude_global,
            input: vec![0.0; cfg.size],
            output: vec![0.0; cfg.size],
        }
    }

    pub fn kernel(&self) -> &[f64] {
        &self.kernel
    }

    pub fn output(&self) -> &[f64] {
        &self.output
    }

    /// Accumulate one upstream contribution into this tick's input.
    pub fn add_input(&mut self, contribution: &[f64]) {
        assert_eq!(
            contribution.len(),
            self.input.len(),
            "input length must match kernel size"
        );
        for (acc, c) in self.input.iter_mut().zip(contribution) {
            *acc += c;
        }
    }
}

impl Steppable for InteractionKernel {
    fn init(&mut self) {
        self.input.iter_mut().for_each(|v| *v = 0.0);
        self.output.iter_mut().for_each(|v| *v = 0.0);
    }

    fn step(&mut self, _t: f64, _dt: f64) {
        let n = self.ring.size;
        let input_sum: f64 = self.input.iter().sum();
        for i in 0..n {
            let mut acc = 0.0;
            for (j, &x) in self.input.iter().enumerate() {
                acc += self.kernel[self.ring.wrap_index(i as isize - j as isize)] * x;
            }
            self.output[i] = acc + self.amplitude_global * input_sum;
        }
        self.input.iter_mut().for_each(|v| *v = 0.0);
    }

    fn close(&mut self) {
        self.input.iter_mut().for_each(|v| *v = 0.0);
        self.output.iter_mut().for_each(|v| *v = 0.0);
    }

    fn component(&self, name: &str) -> Option<&[f64]> {
        match name {
            "input" => Some(&self.input),
            "output" => Some(&self.output),
            _ => None,
        }
    }
}

/// Construction parameters for a [`NormalNoise`] source.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct NormalNoiseConfig {
    pub size: usize,
    pub amplitude: f64,
    pub seed: Option<u64>,
}

impl Default for NormalNoiseConfig {
    fn default() -> Self {
        Self {
            size: 100,
            amplitude: 0.01,
            seed: None,
        }
    }
}

/// Per-tick Gaussian noise, scaled by `sqrt(1/dt)` so the integrated noise
/// power is independent of the step size.
#[derive(Debug, Clone)]
pub struct NormalNoise {
    amplitude: f64,
    seed: u64,
    rng: Prng,
    output: Vec<f64>,
}

impl NormalNoise {
    pub fn new(cfg: NormalNoiseConfig) -> Self {
        assert!(cfg.size > 0, "size must be non-zero");
        assert!(cfg.amplitude.is_finite(), "amplitude must be finite");
        let seed = cfg.seed.unwrap_or(1);
        Self {
            amplitude: cfg.amplitude,
            seed,
            rng: Prng::new(seed),
            output: vec![0.0; cfg.size],
        }
    }

    pub fn output(&self) -> &[f64] {
        &self.output
    }

    pub(crate) fn rng_state(&self) -> u64 {
        self.rng.state()
    }

    pub(crate) fn set_rng_state(&mut self, state: u64) {
        self.rng = Prng::from_state(state);
    }
}

impl Steppable for NormalNoise {
    fn init(&mut self) {
        self.rng = Prng::new(self.seed);
        self.output.iter_mut().for_each(|v| *v = 0.0);
    }

    fn step(&mut self, _t: f64, dt: f64) {
        let scale = self.amplitude * (1.0 / dt).sqrt();
        for o in self.output.iter_mut() {
            *o = scale * self.rng.next_gaussian();
        }
    }

    fn close(&mut self) {
        self.output.iter_mut().for_each(|v| *v = 0.0);
    }

    fn component(&self, name: &str) -> Option<&[f64]> {
        match name {
            "output" => Some(&self.output),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stimulus_peaks_at_its_position() {
        let stim = GaussStimulus::new(GaussStimulusConfig {
            size: 100,
            sigma: 3.0,
            amplitude: 10.0,
            position: 20.0,
        });
        let out = stim.output();
        assert_eq!(out[20], 10.0);
        assert!((out[17] - out[23]).abs() < 1e-12);
        assert!(out[20] > out[19] && out[19] > out[18]);
    }

    #[test]
    fn stimulus_wraps_around_the_seam() {
        let stim = GaussStimulus::new(GaussStimulusConfig {
            size: 100,
            sigma: 3.0,
            amplitude: 10.0,
            position: 0.0,
        });
        let out = stim.output();
        assert!((out[99] - out[1]).abs() < 1e-12);
        assert!(out[99] > out[95]);
    }

    #[test]
    #[should_panic]
    fn stimulus_position_out_of_range_panics() {
        GaussStimulus::new(GaussStimulusConfig {
            size: 100,
            position: 100.0,
            ..Default::default()
        });
    }

    #[test]
    fn normalized_kernel_sums_to_its_amplitude() {
        let kernel = InteractionKernel::new(InteractionKernelConfig {
            size: 50,
            sigma: 5.0,
            amplitude: 40.0,
            amplitude_global: 0.0,
            normalized: true,
        });
        let sum: f64 = kernel.kernel().iter().sum();
        assert!((sum - 40.0).abs() < 1e-9);
    }

    #[test]
    fn delta_input_reproduces_the_kernel_profile() {
        let mut kernel = InteractionKernel::new(InteractionKernelConfig {
            size: 10,
            sigma: 2.0,
            amplitude: 1.0,
            amplitude_global: -0.5,
            normalized: false,
        });
        let mut delta = vec![0.0; 10];
        delta[3] = 1.0;
        kernel.add_input(&delta);
        kernel.step(0.0, 1.0);
        let out = kernel.output();
        assert!((out[3] - (1.0 - 0.5)).abs() < 1e-12);
        assert!((out[2] - out[4]).abs() < 1e-12);
        // Input was consumed; a second step without input is flat.
        kernel.step(0.0, 1.0);
        for &o in kernel.output() {
            assert_eq!(o, 0.0);
        }
    }

    #[test]
    fn near_delta_kernel_acts_as_a_pure_gain() {
        // The configuration the noise-smoothing kernels use: unnormalized,
        // sigma far below one site, so only the center tap survives.
        let mut kernel = InteractionKernel::new(InteractionKernelConfig {
            size: 8,
            sigma: 0.02,
            amplitude: 0.25,
            amplitude_global: 0.0,
            normalized: false,
        });
        let input = [0.0, 4.0, -2.0, 0.0, 1.0, 0.0, 0.0, 8.0];
        kernel.add_input(&input);
        kernel.step(0.0, 1.0);
        for (o, i) in kernel.output().iter().zip(&input) {
            assert!((o - 0.25 * i).abs() < 1e-12);
        }
    }

    #[test]
    fn noise_is_deterministic_per_seed() {
        let cfg = NormalNoiseConfig {
            size: 16,
            amplitude: 0.01,
            seed: Some(7),
        };
        let mut a = NormalNoise::new(cfg.clone());
        let mut b = NormalNoise::new(cfg);
        a.step(0.0, 1.0);
        b.step(0.0, 1.0);
        assert_eq!(a.output(), b.output());
    }

    #[test]
    fn noise_scales_with_the_time_step() {
        let cfg = NormalNoiseConfig {
            size: 16,
            amplitude: 0.01,
            seed: Some(7),
        };
        let mut fine = NormalNoise::new(cfg.clone());
        let mut coarse = NormalNoise::new(cfg);
        fine.step(0.0, 1.0);
        coarse.step(0.0, 4.0);
        for (f, c) in fine.output().iter().zip(coarse.output()) {
            assert!((f - 2.0 * c).abs() < 1e-12);
        }
    }

    #[test]
    fn zero_amplitude_noise_is_silent() {
        let mut noise = NormalNoise::new(NormalNoiseConfig {
            size: 8,
            amplitude: 0.0,
            seed: Some(3),
        });
        noise.step(0.0, 1.0);
        assert!(noise.output().iter().all(|&v| v == 0.0));
    }
}
