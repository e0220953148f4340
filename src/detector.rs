use crate::error::Result;

/// The capability every drift detector exposes to its consumers.
///
/// Observations must be supplied in strict arrival order; the statistics
/// behind each detector are defined over that exact sequence.
pub trait DriftDetector: Send {
    fn name(&self) -> &str;

    /// Feed one observation. `Ok(true)` iff a drift was signaled by this call.
    fn observe(&mut self, value: f64) -> Result<bool>;

    /// Return to the freshly-constructed state, keeping the configuration.
    fn reset(&mut self);
}

impl<D: DriftDetector + ?Sized> DriftDetector for Box<D> {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn observe(&mut self, value: f64) -> Result<bool> {
        (**self).observe(value)
    }

    fn reset(&mut self) {
        (**self).reset()
    }
}
