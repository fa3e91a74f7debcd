//! Relearning run: damage the coupling in steps, and after each step
//! re-demonstrate associations until every probe lands inside the decision
//! tolerance again or the demonstration budget runs out.

use std::io;
use std::path::Path;

use serde::Deserialize;

use dynafield::rig::{hue_angle_pairs, Rig, RigConfig};

use super::degeneration::DegenerationParams;
use super::{load_section, measure_pairs, train_or_load, ExperimentParams};

/// Which associations a demonstration re-teaches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RelearningKind {
    AllCases,
    OnlyDegeneratedCases,
}

impl RelearningKind {
    pub fn label(self) -> &'static str {
        match self {
            Self::AllCases => "all cases",
            Self::OnlyDegeneratedCases => "only degenerated cases",
        }
    }
}

/// The `relearning_parameters` section.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RelearningParams {
    pub relearning_type: RelearningKind,
    pub learning_rate: f64,
    pub number_of_epochs: usize,
    pub max_amount_of_demonstrations: usize,
    /// When false, updates only reach synapses still in the degeneration
    /// pool, so relearning cannot lean on already-removed hardware.
    pub update_all_weights: bool,
}

impl Default for RelearningParams {
    fn default() -> Self {
        Self {
            relearning_type: RelearningKind::AllCases,
            learning_rate: 0.01,
            number_of_epochs: 100,
            max_amount_of_demonstrations: 10,
            update_all_weights: false,
        }
    }
}

#[derive(Debug, Clone)]
struct LevelOutcome {
    demonstrations: usize,
    recovered: bool,
}

/// Run the relearning experiment, with parameters from `params_path` when
/// given and defaults otherwise.
pub fn run(params_path: Option<&Path>) -> io::Result<()> {
    let exp: ExperimentParams = load_section(params_path, "experiment_parameters")?;
    let deg: DegenerationParams = load_section(params_path, "degeneration_parameters")?;
    let rel: RelearningParams = load_section(params_path, "relearning_parameters")?;

    println!("dynafield relearning run");
    println!("seed={}", exp.seed);
    println!("kind={}", deg.experiment_type.label());
    println!("relearning={}", rel.relearning_type.label());
    println!("trials={}", exp.number_of_trials);
    println!("tolerance={}", exp.decision_tolerance);
    println!("epochs_per_demonstration={}", rel.number_of_epochs);

    let mut cfg = RigConfig::default().with_seed(exp.seed);
    cfg.update_all_weights = rel.update_all_weights;
    let mut rig = Rig::new(cfg);
    train_or_load(&mut rig, &exp)?;

    // Every trial restarts from this trained image.
    let mut image = Vec::new();
    rig.save_image_to(&mut image)?;

    let pairs = hue_angle_pairs();
    let target = deg.target();
    let mode = deg.mode();
    let target_pct = f64::from(deg.target_percentage_of_degeneration);

    for trial in 1..=exp.number_of_trials {
        rig.load_image_from(&mut image.as_slice())?;
        rig.set_learning_rate(rel.learning_rate);

        let pool = rig.remaining_targets(target);
        let batch = deg.batch_size(pool);
        let increment = deg.increment_percentage(pool);

        let baseline = measure_pairs(&mut rig, &pairs, exp.settle_ticks, exp.decision_tolerance);
        for m in &baseline {
            println!(
                "trial={trial} probe hue={:.0} expected={:.2} decoded={:.2} deviation={:.2} ok={}",
                m.hue, m.expected, m.decoded, m.deviation, m.ok
            );
        }
        let baseline_ok = baseline.iter().filter(|m| m.ok).count();
        println!("trial={trial} baseline_ok={baseline_ok}/{}", baseline.len());

        // Jump straight to the starting damage level with one large batch.
        let initial = pool * deg.initial_percentage_of_degeneration as usize / 100;
        let mut current_pct = f64::from(deg.initial_percentage_of_degeneration);
        if initial > 0 {
            rig.set_degeneration(target, mode, initial);
            rig.start_degeneration(target);
            rig.settle(exp.settle_ticks);
        }
        rig.set_degeneration(target, mode, batch);

        let mut levels: Vec<LevelOutcome> = Vec::new();
        let mut demonstrations = 0usize;
        let mut backup: Option<Vec<u8>> = None;
        let mut dead = false;

        while current_pct < target_pct && !dead {
            let probes =
                measure_pairs(&mut rig, &pairs, exp.settle_ticks, exp.decision_tolerance);
            let failed: Vec<(f64, f64)> =
                probes.iter().filter(|m| !m.ok).map(|m| (m.hue, m.angle)).collect();

            if !failed.is_empty() && demonstrations < rel.max_amount_of_demonstrations {
                if backup.is_none() {
                    backup = Some(rig.export_weights()?);
                }
                let selection: &[(f64, f64)] = match rel.relearning_type {
                    RelearningKind::AllCases => &pairs,
                    RelearningKind::OnlyDegeneratedCases => &failed,
                };
                rig.redemonstrate(selection, exp.settle_ticks, rel.number_of_epochs);
                demonstrations += 1;
                continue;
            }

            let recovered = failed.is_empty();
            println!(
                "trial={trial} level={current_pct:.1}% failures={} demonstrations={demonstrations} recovered={recovered}",
                failed.len()
            );
            levels.push(LevelOutcome { demonstrations, recovered });

            // The next level measures relearning effort from scratch, so the
            // demonstrations made at this one are rolled back.
            if let Some(saved) = backup.take() {
                rig.import_weights(&saved)?;
            }
            demonstrations = 0;

            if !recovered {
                dead = true;
            } else if rig.remaining_targets(target) == 0 {
                break;
            } else {
                rig.start_degeneration(target);
                rig.settle(exp.settle_ticks);
                current_pct += increment;
            }
        }

        let recovered_levels = levels.iter().filter(|l| l.recovered).count();
        let total_demonstrations: usize = levels.iter().map(|l| l.demonstrations).sum();
        println!(
            "trial={trial} levels={} recovered={recovered_levels} demonstrations={total_demonstrations} dead={dead}",
            levels.len()
        );
    }
    Ok(())
}
