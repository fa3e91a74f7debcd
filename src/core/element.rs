// Capability seam between simulator elements and whatever drives them.

/// A simulator element with a bounded per-tick update.
///
/// Fields, couplings, stimuli, kernels and noise sources all implement this.
/// The driver owns the clock; elements never block or poll.
pub trait Steppable {
    /// Reset internal state for a fresh run. Called before the first step
    /// and whenever the owner restarts an experiment epoch.
    fn init(&mut self);

    /// Advance by one tick. `t` is the current simulation time, `dt` the
    /// integration step. Must be a bounded computation.
    fn step(&mut self, t: f64, dt: f64);

    /// Tear down transient state (pools, masks) without destroying the
    /// element. A closed element can be re-initialized.
    fn close(&mut self);

    /// Read-only access to a named state buffer, for observation layers.
    /// Returns `None` for names the element does not expose.
    fn component(&self, _name: &str) -> Option<&[f64]> {
        None
    }
}
