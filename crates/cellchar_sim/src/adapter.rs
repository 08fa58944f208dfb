//! The simulator boundary.

use crate::error::SimError;
use crate::stimulus::Stimulus;

/// A propagation measurement, in seconds.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Measurement {
    /// Input threshold crossing to output threshold crossing.
    pub delay: f64,
    /// Output transition between the slew thresholds.
    pub transition: f64,
}

/// The reduced result of one simulation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Outcome {
    /// Answer to [`Probe::Timing`](crate::Probe::Timing).
    Measured(Measurement),
    /// Answer to [`Probe::StateCheck`](crate::Probe::StateCheck): whether
    /// the expected state was registered.
    Registered(bool),
}

impl Outcome {
    /// The measurement, if this is a timing outcome.
    pub fn measurement(self) -> Option<Measurement> {
        match self {
            Outcome::Measured(m) => Some(m),
            Outcome::Registered(_) => None,
        }
    }

    /// The registration result, if this is a state check outcome.
    pub fn registered(self) -> Option<bool> {
        match self {
            Outcome::Registered(ok) => Some(ok),
            Outcome::Measured(_) => None,
        }
    }
}

/// Runs one stimulus to completion and reduces the waveform to an
/// [`Outcome`].
///
/// Implementations are called concurrently from worker threads and must not
/// share mutable state between calls.
pub trait SimulatorAdapter: Send + Sync {
    /// Simulates `stimulus`. Blocks until the simulator finishes.
    fn simulate(&self, stimulus: &Stimulus) -> Result<Outcome, SimError>;

    /// Whether a perturbed [`Stimulus`] is simulated differently.
    fn supports_perturbation(&self) -> bool {
        false
    }
}

impl<A: SimulatorAdapter + ?Sized> SimulatorAdapter for &A {
    fn simulate(&self, stimulus: &Stimulus) -> Result<Outcome, SimError> {
        (**self).simulate(stimulus)
    }

    fn supports_perturbation(&self) -> bool {
        (**self).supports_perturbation()
    }
}

impl<A: SimulatorAdapter + ?Sized> SimulatorAdapter for Box<A> {
    fn simulate(&self, stimulus: &Stimulus) -> Result<Outcome, SimError> {
        (**self).simulate(stimulus)
    }

    fn supports_perturbation(&self) -> bool {
        (**self).supports_perturbation()
    }
}
