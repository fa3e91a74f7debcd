use crate::coupling::Coupling;
use crate::field::Field;
use crate::rig::Rig;

/// A read-only snapshot of a field's state.
///
/// Design intent:
/// - Observers cannot mutate or steer the simulation.
/// - Snapshotting is *on-demand* and can allocate; the step loop stays unchanged.
#[derive(Debug, Clone)]
pub struct FieldSnapshot {
    pub size: usize,
    /// Decoded peak position, `NO_PEAK` when silent.
    pub centroid: f64,
    pub dead_neurons: usize,
    pub activation_min: f64,
    pub activation_max: f64,
    pub activation_mean: f64,
}

pub struct FieldAdapter<'a> {
    field: &'a Field,
}

impl<'a> FieldAdapter<'a> {
    pub fn new(field: &'a Field) -> Self {
        Self { field }
    }

    pub fn snapshot(&self) -> FieldSnapshot {
        let (min, max, mean) = stats(self.field.activation());
        FieldSnapshot {
            size: self.field.size(),
            centroid: self.field.centroid(),
            dead_neurons: self.field.dead_count(),
            activation_min: min,
            activation_max: max,
            activation_mean: mean,
        }
    }
}

#[derive(Debug, Clone)]
pub struct CouplingSnapshot {
    pub input_size: usize,
    pub output_size: usize,
    pub trained: bool,
    /// Synapses still in the degeneration pool.
    pub remaining_synapses: usize,
    pub weight_min: f64,
    pub weight_max: f64,
    pub weight_mean: f64,
}

pub struct CouplingAdapter<'a> {
    coupling: &'a Coupling,
}

impl<'a> CouplingAdapter<'a> {
    pub fn new(coupling: &'a Coupling) -> Self {
        Self { coupling }
    }

    pub fn snapshot(&self) -> CouplingSnapshot {
        let (min, max, mean) = stats(self.coupling.weights());
        CouplingSnapshot {
            input_size: self.coupling.input_size(),
            output_size: self.coupling.output_size(),
            trained: self.coupling.is_trained(),
            remaining_synapses: self.coupling.remaining_degeneration_targets(),
            weight_min: min,
            weight_max: max,
            weight_mean: mean,
        }
    }
}

#[derive(Debug, Clone)]
pub struct RigSnapshot {
    pub tick: u64,
    pub time: f64,
    pub perceptual: FieldSnapshot,
    pub output: FieldSnapshot,
    pub coupling: CouplingSnapshot,
}

pub struct RigAdapter<'a> {
    rig: &'a Rig,
}

impl<'a> RigAdapter<'a> {
    pub fn new(rig: &'a Rig) -> Self {
        Self { rig }
    }

    pub fn snapshot(&self) -> RigSnapshot {
        RigSnapshot {
            tick: self.rig.tick(),
            time: self.rig.time(),
            perceptual: FieldAdapter::new(self.rig.perceptual()).snapshot(),
            output: FieldAdapter::new(self.rig.output_field()).snapshot(),
            coupling: CouplingAdapter::new(self.rig.coupling()).snapshot(),
        }
    }
}

fn stats(values: &[f64]) -> (f64, f64, f64) {
    let mut min = f64::INFINITY;
    let mut max = f64::NEG_INFINITY;
    let mut sum = 0.0;
    for &v in values {
        min = min.min(v);
        max = max.max(v);
        sum += v;
    }
    (min, max, sum / values.len() as f64)
}
