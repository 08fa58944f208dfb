//! Retry of recoverable failures with perturbed initial conditions.

use crate::adapter::{Outcome, SimulatorAdapter};
use crate::error::SimError;
use crate::stimulus::Stimulus;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Wraps an adapter so that a non-converging or timed-out stimulus is tried
/// once more with perturbed initial conditions.
///
/// When the inner adapter cannot perturb, errors pass through unchanged.
#[derive(Debug)]
pub struct RetryingAdapter<A> {
    inner: A,
    retries: AtomicUsize,
    recovered: AtomicUsize,
}

impl<A: SimulatorAdapter> RetryingAdapter<A> {
    /// Wraps `inner`.
    pub fn new(inner: A) -> Self {
        Self {
            inner,
            retries: AtomicUsize::new(0),
            recovered: AtomicUsize::new(0),
        }
    }

    /// Number of retries attempted so far.
    pub fn retries(&self) -> usize {
        self.retries.load(Ordering::Relaxed)
    }

    /// Number of retries that succeeded.
    pub fn recovered(&self) -> usize {
        self.recovered.load(Ordering::Relaxed)
    }

    /// The wrapped adapter.
    pub fn inner(&self) -> &A {
        &self.inner
    }
}

impl<A: SimulatorAdapter> SimulatorAdapter for RetryingAdapter<A> {
    fn simulate(&self, stimulus: &Stimulus) -> Result<Outcome, SimError> {
        match self.inner.simulate(stimulus) {
            Err(err)
                if err.is_recoverable()
                    && !stimulus.perturbed
                    && self.inner.supports_perturbation() =>
            {
                tracing::warn!(stimulus = %stimulus.title, error = %err, "retrying with perturbed initial conditions");
                self.retries.fetch_add(1, Ordering::Relaxed);
                let outcome = self.inner.simulate(&stimulus.perturbed())?;
                self.recovered.fetch_add(1, Ordering::Relaxed);
                Ok(outcome)
            }
            other => other,
        }
    }

    fn supports_perturbation(&self) -> bool {
        self.inner.supports_perturbation()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stimulus::{Circuit, Levels, Probe};
    use std::path::PathBuf;
    use std::sync::Mutex;

    fn stimulus() -> Stimulus {
        Stimulus {
            title: "INV A rise".into(),
            circuit: Circuit {
                subcircuit: "INV".into(),
                netlist: PathBuf::from("inv.sp"),
                models: vec![],
                pins: vec!["A".into(), "Y".into()],
            },
            supplies: vec![],
            sources: vec![],
            loads: vec![],
            initial: vec![],
            levels: Levels {
                delay_rise: 0.5,
                delay_fall: 0.5,
                slew_low: 0.2,
                slew_high: 0.8,
            },
            probe: Probe::StateCheck {
                node: "Y".into(),
                expected_high: true,
                at: 1e-9,
            },
            stop: 2e-9,
            step: None,
            temperature: 25.0,
            perturbed: false,
        }
    }

    /// Fails every unperturbed stimulus with non-convergence.
    struct Stiff {
        perturb: bool,
        seen: Mutex<Vec<bool>>,
    }

    impl SimulatorAdapter for Stiff {
        fn simulate(&self, stimulus: &Stimulus) -> Result<Outcome, SimError> {
            self.seen.lock().unwrap().push(stimulus.perturbed);
            if stimulus.perturbed {
                Ok(Outcome::Registered(true))
            } else {
                Err(SimError::NonConvergence {
                    detail: "timestep too small".into(),
                })
            }
        }

        fn supports_perturbation(&self) -> bool {
            self.perturb
        }
    }

    #[test]
    fn retries_once_perturbed() {
        let adapter = RetryingAdapter::new(Stiff {
            perturb: true,
            seen: Mutex::new(vec![]),
        });
        assert_eq!(adapter.simulate(&stimulus()).unwrap(), Outcome::Registered(true));
        assert_eq!(*adapter.inner().seen.lock().unwrap(), vec![false, true]);
        assert_eq!(adapter.retries(), 1);
        assert_eq!(adapter.recovered(), 1);
    }

    #[test]
    fn passes_error_through_without_perturbation() {
        let adapter = RetryingAdapter::new(Stiff {
            perturb: false,
            seen: Mutex::new(vec![]),
        });
        let err = adapter.simulate(&stimulus()).unwrap_err();
        assert!(matches!(err, SimError::NonConvergence { .. }));
        assert_eq!(adapter.retries(), 0);
    }

    #[test]
    fn unrecoverable_errors_are_not_retried() {
        struct Missing;
        impl SimulatorAdapter for Missing {
            fn simulate(&self, _: &Stimulus) -> Result<Outcome, SimError> {
                Err(SimError::MissingMeasurement {
                    name: "delay".into(),
                })
            }
            fn supports_perturbation(&self) -> bool {
                true
            }
        }
        let adapter = RetryingAdapter::new(Missing);
        assert!(adapter.simulate(&stimulus()).is_err());
        assert_eq!(adapter.retries(), 0);
    }
}
