//! Constraint search by bisection.
//!
//! The interval `[lower, upper]` of a [`SearchBounds`] is divided into a
//! grid of `n = ceil((upper - lower) / resolution)` equal steps, so adjacent
//! grid offsets are never more than one resolution apart. The search probes
//! the upper bound first (if it fails, nothing in the interval passes), then
//! the lower bound, then bisects the grid between the last failing and the
//! first passing offset until they are adjacent. The passing side is the
//! result: a constraint is the smallest offset at which the cell still
//! registers correctly.
//!
//! Every probe decides which half of the interval survives, so a probe that
//! fails to simulate leaves the search without an answer: it ends with
//! [`SearchFailure::Simulation`] rather than guessing either way.
//!
//! The bisection is a state machine ([`Bisection`]) so that a driver can
//! interleave probes with its own bookkeeping; [`search`] is the common
//! driver over a probe closure.

use cellchar_config::SearchBounds;
use cellchar_sim::SimError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Slack allowed when dividing the interval, so that a width that is an
/// exact multiple of the resolution up to rounding does not gain a step.
const STEP_EPSILON: f64 = 1e-9;

/// Why a search ended without a constraint value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "reason", rename_all = "kebab-case")]
pub enum SearchFailure {
    /// Even the upper bound failed.
    NeverPassed {
        /// The widest offset tried.
        upper: f64,
    },
    /// The iteration budget ran out before the interval narrowed to the
    /// resolution.
    IterationLimit {
        /// Bisection steps taken.
        iterations: u32,
        /// Last failing offset.
        lower: f64,
        /// Last passing offset.
        upper: f64,
    },
    /// A probe ended in a simulator error, so the side of the boundary it
    /// lies on is unknown.
    Simulation {
        /// The offset that could not be simulated.
        offset: f64,
        /// Probes run, including the failed one.
        probes: u32,
        /// The simulator's error.
        error: String,
    },
}

impl fmt::Display for SearchFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SearchFailure::NeverPassed { upper } => {
                write!(f, "never passed, even at the upper bound {upper}")
            }
            SearchFailure::IterationLimit {
                iterations,
                lower,
                upper,
            } => write!(
                f,
                "no convergence after {iterations} iterations (interval {lower}..{upper})"
            ),
            SearchFailure::Simulation {
                offset,
                probes,
                error,
            } => write!(
                f,
                "probe {probes} at offset {offset} failed to simulate: {error}"
            ),
        }
    }
}

/// Where a bisection stands.
#[derive(Debug, Clone, PartialEq)]
pub enum SearchState {
    /// Still narrowing `[lower, upper]`.
    Searching {
        /// Largest offset known to fail, or the lower bound before it is probed.
        lower: f64,
        /// Smallest offset known to pass, or the upper bound before it is probed.
        upper: f64,
    },
    /// The passing boundary.
    Converged(f64),
    /// Gave up.
    Failed(SearchFailure),
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Phase {
    Upper,
    Lower,
    Bisect,
}

/// Grid-snapped bisection over one [`SearchBounds`].
#[derive(Debug, Clone)]
pub struct Bisection {
    bounds: SearchBounds,
    steps: u64,
    lo: u64,
    hi: u64,
    phase: Phase,
    iterations: u32,
    max_iterations: u32,
    done: Option<Result<f64, SearchFailure>>,
}

impl Bisection {
    /// Starts a search. `max_iterations` caps bisection steps, not counting
    /// the two boundary probes.
    pub fn new(bounds: SearchBounds, max_iterations: u32) -> Self {
        let width = bounds.upper() - bounds.lower();
        let steps = ((width / bounds.resolution()) - STEP_EPSILON).ceil().max(1.0) as u64;
        Self {
            bounds,
            steps,
            lo: 0,
            hi: steps,
            phase: Phase::Upper,
            iterations: 0,
            max_iterations,
            done: None,
        }
    }

    /// Number of grid steps between the bounds.
    pub fn grid_steps(&self) -> u64 {
        self.steps
    }

    fn offset(&self, index: u64) -> f64 {
        if index == self.steps {
            return self.bounds.upper();
        }
        let width = self.bounds.upper() - self.bounds.lower();
        self.bounds.lower() + width * (index as f64 / self.steps as f64)
    }

    fn mid(&self) -> u64 {
        self.lo + (self.hi - self.lo) / 2
    }

    /// The offset to probe next, or `None` once the search has ended.
    pub fn next_offset(&self) -> Option<f64> {
        self.done.is_none().then(|| self.pending())
    }

    fn pending(&self) -> f64 {
        match self.phase {
            Phase::Upper => self.offset(self.steps),
            Phase::Lower => self.offset(0),
            Phase::Bisect => self.offset(self.mid()),
        }
    }

    /// Records the outcome of probing [`next_offset`](Self::next_offset).
    pub fn record(&mut self, passed: bool) {
        if self.done.is_some() {
            return;
        }
        match self.phase {
            Phase::Upper if !passed => {
                self.done = Some(Err(SearchFailure::NeverPassed {
                    upper: self.bounds.upper(),
                }));
            }
            Phase::Upper => self.phase = Phase::Lower,
            Phase::Lower if passed => self.done = Some(Ok(self.bounds.lower())),
            Phase::Lower => self.phase = Phase::Bisect,
            Phase::Bisect => {
                let mid = self.mid();
                if passed {
                    self.hi = mid;
                } else {
                    self.lo = mid;
                }
                self.iterations += 1;
            }
        }
        if self.done.is_none() && self.phase == Phase::Bisect {
            if self.hi - self.lo <= 1 {
                self.done = Some(Ok(self.offset(self.hi)));
            } else if self.iterations >= self.max_iterations {
                self.done = Some(Err(SearchFailure::IterationLimit {
                    iterations: self.iterations,
                    lower: self.offset(self.lo),
                    upper: self.offset(self.hi),
                }));
            }
        }
    }

    /// Bisection steps taken so far.
    pub fn iterations(&self) -> u32 {
        self.iterations
    }

    /// The current state.
    pub fn state(&self) -> SearchState {
        match &self.done {
            Some(Ok(value)) => SearchState::Converged(*value),
            Some(Err(failure)) => SearchState::Failed(failure.clone()),
            None => SearchState::Searching {
                lower: self.offset(self.lo),
                upper: self.offset(self.hi),
            },
        }
    }
}

/// The result of one constraint search.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchReport {
    /// The constraint, or why there is none.
    pub result: Result<f64, SearchFailure>,
    /// Simulations run, including boundary probes.
    pub probes: u32,
    /// Bisection steps.
    pub iterations: u32,
}

/// Runs a bisection to completion.
///
/// `probe` simulates one offset and says whether the cell registered
/// correctly. A local simulator error ends the search with
/// [`SearchFailure::Simulation`]. A fatal error stops the search and is
/// returned.
pub fn search(
    bounds: SearchBounds,
    max_iterations: u32,
    mut probe: impl FnMut(f64) -> Result<bool, SimError>,
) -> Result<SearchReport, SimError> {
    let mut bisection = Bisection::new(bounds, max_iterations);
    let mut probes = 0;

    let result = loop {
        if let Some(outcome) = &bisection.done {
            break outcome.clone();
        }
        let offset = bisection.pending();
        probes += 1;
        match probe(offset) {
            Ok(passed) => bisection.record(passed),
            Err(err) if err.is_fatal() => return Err(err),
            Err(err) => {
                tracing::debug!(offset, error = %err, "probe failed to simulate");
                break Err(SearchFailure::Simulation {
                    offset,
                    probes,
                    error: err.to_string(),
                });
            }
        }
    };

    Ok(SearchReport {
        result,
        probes,
        iterations: bisection.iterations(),
    })
}
