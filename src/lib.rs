//! # dynafield
//!
//! Dynamic neural fields with trainable couplings and structured degeneration.
//!
//! This crate simulates populations of neuron-like units on circular sensory
//! and motor dimensions, couples them through trainable weight matrices, and
//! damages neurons or synapses under a sample-without-replacement discipline
//! to study how the system degrades and recovers.
//!
//! ## Quick Start
//!
//! ```
//! use dynafield::prelude::*;
//!
//! // A field of 100 neurons on a circular domain, 0.5 units per grid point.
//! let cfg = FieldConfig::with_size(100, 0.5).with_seed(42);
//! let mut field = Field::new(cfg);
//!
//! // Deliver an input contribution and advance one tick.
//! field.add_input(&vec![10.0; 100]);
//! field.step(0.0, 1.0);
//!
//! // Decode the activation bump into a position (or -1.0 when silent).
//! let _position = field.centroid();
//! ```
//!
//! ## Feature Flags
//!
//! - `serde` (default): Enable serialization for configs and reports
//! - `parallel`: Multi-threaded coupling transforms via rayon
//!
//! ## Modules
//!
//! - [`field`]: Leaky-integrator field dynamics with a dead-neuron mask
//! - [`coupling`]: Trainable weight-matrix coupling with three learning rules
//! - [`degeneration`]: Exhaustible random-victim selection machinery
//! - [`decoder`]: Circular population read-out (centroid)
//! - [`rig`]: The wired two-field architecture with snapshot persistence
//! - [`observer`]: Read-only observation adapters

#[path = "core/prng.rs"]
pub mod prng;

#[path = "core/ring.rs"]
pub mod ring;

#[path = "core/element.rs"]
pub mod element;

#[path = "core/degeneration.rs"]
pub mod degeneration;

#[path = "core/field.rs"]
pub mod field;

#[path = "core/coupling.rs"]
pub mod coupling;

#[path = "core/decoder.rs"]
pub mod decoder;

#[path = "core/kernel.rs"]
pub mod kernel;

#[path = "core/storage.rs"]
pub mod storage;

#[path = "core/rig.rs"]
pub mod rig;

pub mod observer;

/// Prelude module for convenient imports.
///
/// ```
/// use dynafield::prelude::*;
/// ```
pub mod prelude {
    pub use crate::coupling::{Coupling, CouplingConfig, LearningRule};
    pub use crate::decoder::{decode_centroid, DETECTION_THRESHOLD, NO_PEAK};
    pub use crate::degeneration::{DegenerationEngine, DegenerationMode};
    pub use crate::element::Steppable;
    pub use crate::field::{ActivationFunction, Field, FieldConfig};
    pub use crate::kernel::{
        GaussStimulus, GaussStimulusConfig, InteractionKernel, InteractionKernelConfig, NormalNoise,
    };
    pub use crate::prng::Prng;
    pub use crate::rig::{hue_angle_pairs, DegenerationTarget, Rig, RigConfig};
    pub use crate::ring::RingGeometry;
}
