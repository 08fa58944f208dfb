//! Conformance test helpers for the cellchar characterization engine.
//!
//! Provides behavioral simulator models that answer a [`Stimulus`] from its
//! edges and loads instead of running SPICE, configuration builders for a
//! few reference cells, and a pipeline function that characterizes a
//! configuration and returns structured results for assertion in
//! integration tests.

#![warn(missing_docs)]

use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use cellchar_config::{load_config_from_str, CharConfig};
use cellchar_diagnostics::{Diagnostic, DiagnosticSink};
use cellchar_engine::{CellReport, Characterizer, EngineError};
use cellchar_sim::{Measurement, Outcome, Probe, SimError, SimulatorAdapter, Source, Stimulus};

/// Result of characterizing every cell of a configuration.
pub struct RunResult {
    /// One report per cell, in configuration order.
    pub reports: Vec<CellReport>,
    /// All diagnostics emitted during the run.
    pub diagnostics: Vec<Diagnostic>,
    /// Whether any errors were emitted.
    pub has_errors: bool,
    /// Number of error-severity diagnostics.
    pub error_count: usize,
    /// Number of warning-severity diagnostics.
    pub warning_count: usize,
}

impl RunResult {
    /// Diagnostics with the given code, e.g. `"T401"`.
    pub fn with_code(&self, code: &str) -> Vec<&Diagnostic> {
        self.diagnostics
            .iter()
            .filter(|d| d.code.to_string() == code)
            .collect()
    }
}

/// Parses a configuration, panicking on errors.
pub fn config(toml: &str) -> CharConfig {
    load_config_from_str(toml, Path::new("/lib")).unwrap()
}

/// A two-input AND gate swept over the given data slews and loads.
pub fn and2_toml(data_slews: &[f64], loads: &[f64], procedure: &str) -> String {
    format!(
        r#"
[simulator]
workers = 2

[cells.AND2X1]
netlist = "and2x1.sp"
inputs = ["A", "B"]
outputs = ["Y"]
functions = ["Y = A & B"]
procedures = ["{procedure}"]
data_slews = {data_slews:?}
loads = {loads:?}
"#
    )
}

/// A D flip-flop with an active-low clear, searched over one nanosecond at
/// picosecond resolution.
pub fn dff_toml(procedures: &[&str]) -> String {
    let procedures: Vec<String> = procedures.iter().map(|p| format!("\"{p}\"")).collect();
    format!(
        r#"
[simulator]
workers = 4
settle_time = 1.0
window = 2.0

[cells.DFFRX1]
netlist = "dffrx1.sp"
inputs = ["D", "CLK", "RN"]
outputs = ["Q"]
functions = ["Q = IQ"]
clock = "CLK"
reset = "!RN"
next_state = "D"
procedures = [{procedures}]
data_slews = [0.01, 0.05]
clock_slews = [0.02]
loads = [0.001, 0.004]
setup_bounds = [0.0, 1.0, 0.001]
hold_bounds = [0.0, 1.0, 0.001]
recovery_bounds = [0.0, 1.0, 0.001]
removal_bounds = [0.0, 1.0, 0.001]
"#,
        procedures = procedures.join(", ")
    )
}

/// Characterizes every cell of `config` against `adapter`.
pub fn characterize(
    config: &CharConfig,
    adapter: &dyn SimulatorAdapter,
    workers: usize,
) -> Result<RunResult, EngineError> {
    let engine = Characterizer::with_workers(&config.settings, adapter, workers)?;
    let sink = DiagnosticSink::new();
    let reports = engine.characterize_all(&config.cells, &sink)?;
    Ok(RunResult {
        reports,
        has_errors: sink.has_errors(),
        error_count: sink.error_count(),
        warning_count: sink.warning_count(),
        diagnostics: sink.take_all(),
    })
}

fn source<'s>(stimulus: &'s Stimulus, node: &str) -> Option<&'s Source> {
    stimulus.sources.iter().find(|s| s.node == node)
}

/// The level of `source` at time `t`, switching at each edge midpoint.
pub fn level_at(source: &Source, t: f64) -> bool {
    source
        .edges
        .iter()
        .filter(|e| e.midpoint() <= t)
        .fold(source.initial_high, |_, e| e.rising)
}

/// Delay that grows linearly with the output load and the input ramp.
///
/// All coefficients are SI: seconds, seconds per farad, and seconds per
/// second of input ramp.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LinearDelay {
    /// Delay at zero load and an ideal input edge.
    pub intrinsic: f64,
    /// Delay added per farad of load.
    pub drive: f64,
    /// Delay added per second of input ramp.
    pub ramp: f64,
}

impl LinearDelay {
    /// 10 ps intrinsic, 1 ps/fF, a tenth of the input ramp.
    pub fn typical() -> Self {
        Self {
            intrinsic: 1e-11,
            drive: 1e3,
            ramp: 0.1,
        }
    }

    /// The measurement of a timing probe.
    pub fn measure(&self, stimulus: &Stimulus) -> Result<Measurement, SimError> {
        let Probe::Timing { trigger, .. } = &stimulus.probe else {
            return Err(SimError::MissingMeasurement {
                name: "delay".into(),
            });
        };
        let ramp = source(stimulus, &trigger.node)
            .and_then(|s| s.edges.first())
            .map_or(0.0, |e| e.duration);
        let farads: f64 = stimulus.loads.iter().map(|l| l.farads).sum();
        let delay = self.intrinsic + self.drive * farads + self.ramp * ramp;
        Ok(Measurement {
            delay,
            transition: 2.0 * (self.intrinsic + self.drive * farads),
        })
    }
}

impl SimulatorAdapter for LinearDelay {
    fn simulate(&self, stimulus: &Stimulus) -> Result<Outcome, SimError> {
        self.measure(stimulus).map(Outcome::Measured)
    }
}

/// An active-low clear and its timing window around the clock.
#[derive(Debug, Clone, PartialEq)]
pub struct Clear {
    /// The control node.
    pub node: String,
    /// Recovery time, seconds.
    pub recovery: f64,
    /// Removal time, seconds.
    pub removal: f64,
}

/// A behavioral flip-flop.
///
/// The clock captures the data level when the data is stable from `setup`
/// before to `hold` after the clock midpoint; otherwise the state keeps its
/// initial value. A [`Clear`] asserted at time zero lets the clock capture
/// when released at least `recovery` before it, and keeps the state cleared
/// when released at least `removal` after it. A release in between never
/// registers the expected state.
///
/// Timing probes are answered by a [`LinearDelay`].
#[derive(Debug, Clone, PartialEq)]
pub struct Flop {
    /// The data node.
    pub data: String,
    /// The clock node; captures on its first edge.
    pub clock: String,
    /// Setup time, seconds.
    pub setup: f64,
    /// Hold time, seconds.
    pub hold: f64,
    /// Optional asynchronous clear.
    pub clear: Option<Clear>,
    /// Answers timing probes.
    pub delay: LinearDelay,
}

impl Flop {
    /// A flip-flop on `D` and `CLK` with a clear on `RN`.
    pub fn dffr(setup: f64, hold: f64, recovery: f64, removal: f64) -> Self {
        Self {
            data: "D".into(),
            clock: "CLK".into(),
            setup,
            hold,
            clear: Some(Clear {
                node: "RN".into(),
                recovery,
                removal,
            }),
            delay: LinearDelay::typical(),
        }
    }

    /// Whether the clock edge at `t_clk` loads the data, or `None` when the
    /// clear is released inside its timing window.
    fn captures(&self, stimulus: &Stimulus, t_clk: f64) -> Option<bool> {
        let Some(clear) = &self.clear else {
            return Some(true);
        };
        let Some(control) = source(stimulus, &clear.node) else {
            return Some(true);
        };
        if control.initial_high {
            return Some(true);
        }
        let Some(release) = control.edges.iter().find(|e| e.rising) else {
            return Some(false);
        };
        let t = release.midpoint();
        if t <= t_clk - clear.recovery {
            Some(true)
        } else if t >= t_clk + clear.removal {
            Some(false)
        } else {
            None
        }
    }

    fn registered(&self, stimulus: &Stimulus) -> Result<Outcome, SimError> {
        let Probe::StateCheck {
            node,
            expected_high,
            ..
        } = &stimulus.probe
        else {
            return self.delay.simulate(stimulus);
        };
        let initial = stimulus
            .initial
            .iter()
            .find(|(n, _)| n == node)
            .is_some_and(|(_, high)| *high);
        let (Some(data), Some(clock)) =
            (source(stimulus, &self.data), source(stimulus, &self.clock))
        else {
            return Err(SimError::MissingMeasurement {
                name: "state".into(),
            });
        };
        let Some(edge) = clock.edges.first() else {
            return Ok(Outcome::Registered(initial == *expected_high));
        };
        let t_clk = edge.midpoint();
        let state = match self.captures(stimulus, t_clk) {
            // metastable
            None => return Ok(Outcome::Registered(false)),
            Some(false) => initial,
            Some(true) => {
                let early = level_at(data, t_clk - self.setup);
                let late = level_at(data, t_clk + self.hold);
                if early == late {
                    early
                } else {
                    initial
                }
            }
        };
        Ok(Outcome::Registered(state == *expected_high))
    }
}

impl SimulatorAdapter for Flop {
    fn simulate(&self, stimulus: &Stimulus) -> Result<Outcome, SimError> {
        self.registered(stimulus)
    }
}

/// Fails with non-convergence whenever `fails` says so.
pub struct FailWhen<A, F> {
    inner: A,
    fails: F,
}

impl<A, F> FailWhen<A, F>
where
    A: SimulatorAdapter,
    F: Fn(&Stimulus) -> bool + Send + Sync,
{
    /// Wraps `inner`.
    pub fn new(inner: A, fails: F) -> Self {
        Self { inner, fails }
    }
}

impl<A, F> SimulatorAdapter for FailWhen<A, F>
where
    A: SimulatorAdapter,
    F: Fn(&Stimulus) -> bool + Send + Sync,
{
    fn simulate(&self, stimulus: &Stimulus) -> Result<Outcome, SimError> {
        if (self.fails)(stimulus) {
            return Err(SimError::NonConvergence {
                detail: "timestep too small".into(),
            });
        }
        self.inner.simulate(stimulus)
    }
}

/// Fails every unperturbed stimulus once; perturbed retries succeed.
pub struct Flaky<A> {
    inner: A,
}

impl<A: SimulatorAdapter> Flaky<A> {
    /// Wraps `inner`.
    pub fn new(inner: A) -> Self {
        Self { inner }
    }
}

impl<A: SimulatorAdapter> SimulatorAdapter for Flaky<A> {
    fn simulate(&self, stimulus: &Stimulus) -> Result<Outcome, SimError> {
        if !stimulus.perturbed {
            return Err(SimError::NonConvergence {
                detail: "gmin stepping failed".into(),
            });
        }
        self.inner.simulate(stimulus)
    }

    fn supports_perturbation(&self) -> bool {
        true
    }
}

/// Counts calls and records titles in call order.
pub struct Recording<A> {
    inner: A,
    calls: AtomicUsize,
    titles: Mutex<Vec<String>>,
}

impl<A: SimulatorAdapter> Recording<A> {
    /// Wraps `inner`.
    pub fn new(inner: A) -> Self {
        Self {
            inner,
            calls: AtomicUsize::new(0),
            titles: Mutex::new(Vec::new()),
        }
    }

    /// Number of simulations run.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::Relaxed)
    }

    /// Titles of every stimulus seen, in call order.
    pub fn titles(&self) -> Vec<String> {
        self.titles.lock().unwrap().clone()
    }
}

impl<A: SimulatorAdapter> SimulatorAdapter for Recording<A> {
    fn simulate(&self, stimulus: &Stimulus) -> Result<Outcome, SimError> {
        self.calls.fetch_add(1, Ordering::Relaxed);
        self.titles.lock().unwrap().push(stimulus.title.clone());
        self.inner.simulate(stimulus)
    }

    fn supports_perturbation(&self) -> bool {
        self.inner.supports_perturbation()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cellchar_sim::Edge;

    #[test]
    fn level_follows_midpoints() {
        let source = Source {
            node: "D".into(),
            initial_high: false,
            edges: vec![Edge {
                start: 1.0,
                duration: 0.5,
                rising: true,
            }],
        };
        assert!(!level_at(&source, 1.2));
        assert!(level_at(&source, 1.25));
        assert!(!level_at(&Source::steady("D", false), 5.0));
    }
}
