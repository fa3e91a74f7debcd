//! Degeneration and relearning experiment drivers.
//!
//! Both experiments read their settings from one optional JSON file with a
//! section per concern:
//!
//! ```json
//! {
//!   "experiment_parameters":   { "numberOfTrials": 1, "settleTicks": 100 },
//!   "degeneration_parameters": { "experimentType": "WEIGHTS_DEACTIVATE" },
//!   "relearning_parameters":   { "relearningType": "ALL_CASES" }
//! }
//! ```
//!
//! Missing sections and fields fall back to the defaults below.

pub mod degeneration;
pub mod relearning;

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::Deserialize;

use dynafield::decoder::NO_PEAK;
use dynafield::rig::{hue_angle_pairs, Rig};

/// Shared run settings, the `experiment_parameters` section.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ExperimentParams {
    pub number_of_trials: usize,
    /// Largest accepted circular deviation of the decoded output position,
    /// in physical units of the output ring.
    pub decision_tolerance: f64,
    /// Ticks per settling phase.
    pub settle_ticks: u64,
    /// Full passes over the association pairs during initial training.
    pub training_epochs: usize,
    pub seed: u64,
    /// Trained-weights cache. Loaded when present, written after training.
    pub weights_file: Option<PathBuf>,
}

impl Default for ExperimentParams {
    fn default() -> Self {
        Self {
            number_of_trials: 1,
            decision_tolerance: 0.5,
            settle_ticks: 100,
            training_epochs: 100,
            seed: 1,
            weights_file: None,
        }
    }
}

/// One association probed after settling, scored against its target.
#[derive(Debug, Clone, Copy)]
pub struct Measurement {
    pub hue: f64,
    pub angle: f64,
    pub expected: f64,
    pub decoded: f64,
    pub deviation: f64,
    pub ok: bool,
}

/// Read one named section out of an experiment parameter file.
fn load_section<T>(path: Option<&Path>, section: &str) -> io::Result<T>
where
    T: DeserializeOwned + Default,
{
    let Some(path) = path else {
        return Ok(T::default());
    };
    let text = fs::read_to_string(path)?;
    let root: serde_json::Value = serde_json::from_str(&text)
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, format!("{section}: {e}")))?;
    match root.get(section) {
        Some(value) => serde_json::from_value(value.clone())
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, format!("{section}: {e}"))),
        None => Ok(T::default()),
    }
}

/// Present a hue from rest, settle, withdraw the stimulus, settle again, and
/// read out both centroids. The read-out sees the self-sustained peak, the
/// same state the training snapshots are taken from.
fn present_and_read(rig: &mut Rig, hue: f64, settle_ticks: u64) -> (f64, f64) {
    rig.reset_activity();
    rig.set_stimulus(hue);
    rig.settle(settle_ticks);
    rig.clear_stimulus();
    rig.settle(settle_ticks);
    (rig.perceptual_centroid(), rig.output_centroid())
}

/// Probe every association and score it against the decision tolerance.
fn measure_pairs(
    rig: &mut Rig,
    pairs: &[(f64, f64)],
    settle_ticks: u64,
    tolerance: f64,
) -> Vec<Measurement> {
    let ring = rig.output_field().ring();
    pairs
        .iter()
        .map(|&(hue, angle)| {
            let (_, decoded) = present_and_read(rig, hue, settle_ticks);
            let expected = ring.coord_of(angle as usize);
            // A silent output field is never a hit.
            let (deviation, ok) = if decoded == NO_PEAK {
                (f64::INFINITY, false)
            } else {
                let d = ring.circular_distance(decoded, expected);
                (d, d <= tolerance)
            };
            Measurement {
                hue,
                angle,
                expected,
                decoded,
                deviation,
                ok,
            }
        })
        .collect()
}

/// Bring the coupling to a trained state: from the weights cache when one
/// matches the architecture, otherwise by simulated association (writing the
/// cache back afterwards).
fn train_or_load(rig: &mut Rig, params: &ExperimentParams) -> io::Result<()> {
    if let Some(path) = &params.weights_file {
        if let Ok(data) = fs::read(path) {
            if rig.import_weights(&data).is_ok() {
                println!("weights=loaded file={}", path.display());
                return Ok(());
            }
            println!("weights=stale file={}", path.display());
        }
    }
    rig.train_associations(&hue_angle_pairs(), params.settle_ticks, params.training_epochs);
    println!("weights=trained epochs={}", params.training_epochs);
    if let Some(path) = &params.weights_file {
        fs::write(path, rig.export_weights()?)?;
        println!("weights_cache=written file={}", path.display());
    }
    Ok(())
}
