//! Degeneration run: form a self-sustained memory peak, then remove random
//! elements batch by batch until the output field loses the detection.

use std::io;
use std::path::Path;

use serde::Deserialize;

use dynafield::degeneration::DegenerationMode;
use dynafield::rig::{hue_angle_pairs, DegenerationTarget, Rig, RigConfig};

use super::{load_section, present_and_read, train_or_load, ExperimentParams};

/// Which element class is removed, and how.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ExperimentKind {
    WeightsDeactivate,
    NeuronsDeactivate,
    WeightsRandomize,
    WeightsReduce,
}

impl ExperimentKind {
    pub fn label(self) -> &'static str {
        match self {
            Self::WeightsDeactivate => "deactivate weights",
            Self::NeuronsDeactivate => "deactivate neurons",
            Self::WeightsRandomize => "randomize weights",
            Self::WeightsReduce => "reduce weights",
        }
    }
}

/// Which field a neuron experiment damages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldName {
    Perceptual,
    Output,
}

impl FieldName {
    pub fn label(self) -> &'static str {
        match self {
            Self::Perceptual => "perceptual",
            Self::Output => "output",
        }
    }
}

/// The `degeneration_parameters` section.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DegenerationParams {
    pub experiment_type: ExperimentKind,
    /// Only consulted for neuron experiments; weights always live in the
    /// coupling.
    pub field_to_degenerate: FieldName,
    pub initial_percentage_of_degeneration: u32,
    pub target_percentage_of_degeneration: u32,
    pub number_of_elements_to_degenerate_per_iteration: usize,
    /// 0 derives the total from the target's pool size.
    pub total_number_of_elements_to_degenerate: usize,
    /// When positive, overrides the absolute per-iteration count.
    pub increment_of_degeneration_in_percentage: f64,
}

impl Default for DegenerationParams {
    fn default() -> Self {
        Self {
            experiment_type: ExperimentKind::WeightsDeactivate,
            field_to_degenerate: FieldName::Perceptual,
            initial_percentage_of_degeneration: 0,
            target_percentage_of_degeneration: 80,
            number_of_elements_to_degenerate_per_iteration: 100,
            total_number_of_elements_to_degenerate: 0,
            increment_of_degeneration_in_percentage: 0.0,
        }
    }
}

impl DegenerationParams {
    pub fn target(&self) -> DegenerationTarget {
        match self.experiment_type {
            ExperimentKind::NeuronsDeactivate => match self.field_to_degenerate {
                FieldName::Perceptual => DegenerationTarget::PerceptualField,
                FieldName::Output => DegenerationTarget::OutputField,
            },
            _ => DegenerationTarget::Coupling,
        }
    }

    pub fn mode(&self) -> DegenerationMode {
        match self.experiment_type {
            ExperimentKind::WeightsRandomize => DegenerationMode::Randomize,
            ExperimentKind::WeightsReduce => DegenerationMode::Reduce,
            _ => DegenerationMode::Deactivate,
        }
    }

    /// Per-batch element count for a pool of `total` elements.
    pub fn batch_size(&self, total: usize) -> usize {
        let batch = if self.increment_of_degeneration_in_percentage > 0.0 {
            (total as f64 / 100.0 * self.increment_of_degeneration_in_percentage).round() as usize
        } else {
            self.number_of_elements_to_degenerate_per_iteration
        };
        batch.max(1)
    }

    /// Percentage of the pool one batch removes.
    pub fn increment_percentage(&self, total: usize) -> f64 {
        self.batch_size(total) as f64 / total as f64 * 100.0
    }
}

#[derive(Debug, Clone)]
struct PairOutcome {
    removed: usize,
    lost: bool,
}

/// Run the degeneration experiment, with parameters from `params_path` when
/// given and defaults otherwise.
pub fn run(params_path: Option<&Path>) -> io::Result<()> {
    let exp: ExperimentParams = load_section(params_path, "experiment_parameters")?;
    let deg: DegenerationParams = load_section(params_path, "degeneration_parameters")?;

    println!("dynafield degeneration run");
    println!("seed={}", exp.seed);
    println!("kind={}", deg.experiment_type.label());
    println!("field={}", deg.field_to_degenerate.label());
    println!("trials={}", exp.number_of_trials);
    println!("settle_ticks={}", exp.settle_ticks);

    let mut rig = Rig::new(RigConfig::default().with_seed(exp.seed));
    train_or_load(&mut rig, &exp)?;

    // Everything restarts from this trained image: weights, full pools,
    // resting activity.
    let mut image = Vec::new();
    rig.save_image_to(&mut image)?;

    let target = deg.target();
    let mode = deg.mode();
    let pool = rig.remaining_targets(target);
    let total = if deg.total_number_of_elements_to_degenerate == 0 {
        pool
    } else {
        deg.total_number_of_elements_to_degenerate
    };
    let batch = deg.batch_size(pool);
    println!("pool={pool}");
    println!("batch={batch}");

    let mut outcomes: Vec<PairOutcome> = Vec::new();
    for trial in 1..=exp.number_of_trials {
        for &(hue, angle) in &hue_angle_pairs() {
            rig.load_image_from(&mut image.as_slice())?;
            rig.set_degeneration(target, mode, batch);

            let (_, baseline) = present_and_read(&mut rig, hue, exp.settle_ticks);

            let mut history: Vec<f64> = Vec::new();
            let mut batches = 0usize;
            let mut lost = false;
            loop {
                let centroid = rig.output_centroid();
                if centroid < 0.0 {
                    lost = true;
                    break;
                }
                history.push(centroid);
                if rig.remaining_targets(target) == 0 {
                    break;
                }
                rig.start_degeneration(target);
                rig.settle(exp.settle_ticks);
                batches += 1;
            }

            let removed = pool - rig.remaining_targets(target);
            println!(
                "trial={trial} hue={hue:.0} angle={angle:.0} baseline={baseline:.2} \
                 batches={batches} removed={removed}/{total} lost={lost}"
            );
            print!("centroid_history=");
            for (i, c) in history.iter().enumerate() {
                if i > 0 {
                    print!(" ");
                }
                print!("{c:.2}");
            }
            println!();
            outcomes.push(PairOutcome { removed, lost });
        }
    }

    if !outcomes.is_empty() {
        let lost_count = outcomes.iter().filter(|o| o.lost).count();
        let avg_removed =
            outcomes.iter().map(|o| o.removed as f64).sum::<f64>() / outcomes.len() as f64;
        println!("pairs={}", outcomes.len());
        println!("detection_lost={lost_count}/{}", outcomes.len());
        println!("avg_removed={avg_removed:.0}");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn neuron_experiments_route_to_the_named_field() {
        let mut params = DegenerationParams {
            experiment_type: ExperimentKind::NeuronsDeactivate,
            ..Default::default()
        };
        assert_eq!(params.target(), DegenerationTarget::PerceptualField);
        params.field_to_degenerate = FieldName::Output;
        assert_eq!(params.target(), DegenerationTarget::OutputField);
        assert_eq!(params.mode(), DegenerationMode::Deactivate);
    }

    #[test]
    fn weight_experiments_carry_their_mode() {
        let mut params = DegenerationParams::default();
        assert_eq!(params.target(), DegenerationTarget::Coupling);
        assert_eq!(params.mode(), DegenerationMode::Deactivate);
        params.experiment_type = ExperimentKind::WeightsRandomize;
        assert_eq!(params.mode(), DegenerationMode::Randomize);
        params.experiment_type = ExperimentKind::WeightsReduce;
        assert_eq!(params.mode(), DegenerationMode::Reduce);
    }

    #[test]
    fn percentage_increment_overrides_the_absolute_count() {
        let params = DegenerationParams {
            number_of_elements_to_degenerate_per_iteration: 100,
            increment_of_degeneration_in_percentage: 5.0,
            ..Default::default()
        };
        assert_eq!(params.batch_size(10_080), 504);
        assert!((params.increment_percentage(10_080) - 5.0).abs() < 1e-9);
    }

    #[test]
    fn absolute_count_applies_when_no_percentage_is_set() {
        let params = DegenerationParams::default();
        assert_eq!(params.batch_size(10_080), 100);
    }

    #[test]
    fn batch_is_never_zero() {
        let params = DegenerationParams {
            increment_of_degeneration_in_percentage: 0.1,
            ..Default::default()
        };
        assert_eq!(params.batch_size(28), 1);
    }

    #[test]
    fn experiment_kind_parses_by_original_name() {
        let kind: ExperimentKind = serde_json::from_str("\"WEIGHTS_DEACTIVATE\"").unwrap();
        assert_eq!(kind, ExperimentKind::WeightsDeactivate);
        let kind: ExperimentKind = serde_json::from_str("\"NEURONS_DEACTIVATE\"").unwrap();
        assert_eq!(kind, ExperimentKind::NeuronsDeactivate);
    }
}
