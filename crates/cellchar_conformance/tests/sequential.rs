//! End-to-end characterization of a flip-flop with an asynchronous clear:
//! clock and clear delays, and the four constraint searches against a
//! behavioral flip-flop with known setup, hold, recovery and removal times.

use cellchar_cell::PathKind;
use cellchar_conformance::{
    and2_toml, characterize, config, dff_toml, level_at, FailWhen, Flop, LinearDelay, Recording,
};
use cellchar_config::{Axis, Procedure};
use cellchar_engine::{Measure, PathStatus};
use cellchar_sim::{Outcome, Probe, SimError, SimulatorAdapter, Stimulus};

const NS: f64 = 1e-9;

/// Setup 200 ps, hold 50 ps, recovery 150 ps, removal 100 ps.
fn flop() -> Flop {
    Flop::dffr(0.2 * NS, 0.05 * NS, 0.15 * NS, 0.1 * NS)
}

fn assert_near(actual: Option<f64>, expected: f64) {
    let actual = actual.unwrap();
    // one grid step of the picosecond search either way
    assert!(
        (expected - 0.0011..=expected + 0.0021).contains(&actual),
        "{actual} is not near {expected}"
    );
}

#[test]
fn clock_and_clear_delays() {
    let config = config(&dff_toml(&["worst-case"]));
    let adapter = Recording::new(flop());
    let result = characterize(&config, &adapter, 4).unwrap();

    assert!(!result.has_errors);
    let paths = &result.reports[0].procedures[0].paths;
    let kinds: Vec<PathKind> = paths.iter().map(|p| p.kind).collect();
    assert_eq!(kinds, vec![PathKind::Trigger, PathKind::Trigger, PathKind::Async]);
    for path in paths {
        assert_eq!(path.status, PathStatus::Complete, "{}", path.path);
        let delay = path.table(Measure::Delay).unwrap();
        let axes: Vec<Axis> = delay.axes.iter().map(|a| a.axis).collect();
        assert_eq!(axes, vec![Axis::DataSlew, Axis::Load, Axis::ClockSlew]);
        assert_eq!(delay.values.len(), 4);
    }
    assert!(adapter.calls() >= 12);
}

#[test]
fn setup_and_hold_converge() {
    let config = config(&dff_toml(&["binary-search-constraint"]));
    let result = characterize(&config, &flop(), 4).unwrap();

    assert!(!result.has_errors, "{:?}", result.diagnostics);
    let report = result.reports[0]
        .procedure(Procedure::BinarySearchConstraint)
        .unwrap();
    assert_eq!(report.paths.len(), 2);
    for path in &report.paths {
        assert_eq!(path.kind, PathKind::Data);
        assert_eq!(path.status, PathStatus::Complete, "{}", path.path);
        assert_near(path.summary(Measure::Setup), 0.2);
        assert_near(path.summary(Measure::Hold), 0.05);

        let setup = path.table(Measure::Setup).unwrap();
        let axes: Vec<Axis> = setup.axes.iter().map(|a| a.axis).collect();
        assert_eq!(axes, vec![Axis::DataSlew, Axis::ClockSlew]);
        // the behavioral flop ignores slews
        for value in &setup.values {
            assert_near(Some(*value), 0.2);
        }
        assert!(path.table(Measure::Hold).is_some());
        assert!(path.table(Measure::Delay).is_none());
    }
}

/// A flip-flop loading `D & (E | F)`, so each edge of `D` has three
/// sensitizing conditions.
const GATED: &str = r#"
[simulator]
settle_time = 1.0
window = 2.0

[cells.GDFFX1]
netlist = "gdffx1.sp"
inputs = ["D", "E", "F", "CLK"]
outputs = ["Q"]
functions = ["Q = IQ"]
clock = "CLK"
next_state = "D & E | D & F"
procedures = ["binary-search-constraint"]
data_slews = [0.01, 0.05]
clock_slews = [0.02]
loads = [0.001]
setup_bounds = [0.0, 1.0, 0.001]
hold_bounds = [0.0, 1.0, 0.001]
"#;

/// Setup is 100 ps plus 100 ps for each of `E` and `F` held high; hold is
/// 50 ps.
struct Gated;

impl SimulatorAdapter for Gated {
    fn simulate(&self, stimulus: &Stimulus) -> Result<Outcome, SimError> {
        let Probe::StateCheck {
            node,
            expected_high,
            ..
        } = &stimulus.probe
        else {
            return LinearDelay::typical().simulate(stimulus);
        };
        let source = |name: &str| stimulus.sources.iter().find(|s| s.node == name);
        let Some(edge) = source("CLK").and_then(|s| s.edges.first()) else {
            return Err(SimError::MissingMeasurement {
                name: "state".into(),
            });
        };
        let t_clk = edge.midpoint();
        let held_high = ["E", "F"]
            .iter()
            .filter_map(|name| source(*name))
            .filter(|s| s.edges.is_empty() && s.initial_high)
            .count() as f64;
        let setup = 0.1 * NS * (1.0 + held_high);
        let hold = 0.05 * NS;

        let level = |name: &str, t: f64| source(name).is_some_and(|s| level_at(s, t));
        let next = |t: f64| level("D", t) && (level("E", t) || level("F", t));
        let initial = stimulus
            .initial
            .iter()
            .find(|(n, _)| n == node)
            .is_some_and(|(_, high)| *high);
        let (early, late) = (next(t_clk - setup), next(t_clk + hold));
        let state = if early == late { early } else { initial };
        Ok(Outcome::Registered(state == *expected_high))
    }
}

#[test]
fn setup_is_the_worst_condition() {
    let config = config(GATED);
    let result = characterize(&config, &Gated, 4).unwrap();
    assert!(!result.has_errors, "{:?}", result.diagnostics);

    let paths = &result.reports[0].procedures[0].paths;
    assert_eq!(paths.iter().filter(|p| p.input == "D").count(), 2);
    for path in paths {
        assert_eq!(path.status, PathStatus::Complete, "{}", path.path);
        // E=0 F=1 and E=1 F=0 need 200 ps, E=1 F=1 needs 300 ps
        let expected = if path.input == "D" { 0.3 } else { 0.1 };
        assert_near(path.summary(Measure::Setup), expected);
        for value in &path.table(Measure::Setup).unwrap().values {
            assert_near(Some(*value), expected);
        }
        assert_near(path.summary(Measure::Hold), 0.05);
    }

    let serial = characterize(&config, &Gated, 1).unwrap();
    assert_eq!(serial.reports, result.reports);
}

#[test]
fn recovery_and_removal_converge() {
    let config = config(&dff_toml(&["recovery-search", "removal-search"]));
    let result = characterize(&config, &flop(), 2).unwrap();

    assert!(!result.has_errors, "{:?}", result.diagnostics);
    let cell = &result.reports[0];
    let recovery = cell.procedure(Procedure::RecoverySearch).unwrap();
    assert_eq!(recovery.paths.len(), 1);
    assert_eq!(recovery.paths[0].kind, PathKind::Async);
    assert_near(recovery.paths[0].summary(Measure::Recovery), 0.15);
    assert!(recovery.paths[0].summary(Measure::Removal).is_none());

    let removal = cell.procedure(Procedure::RemovalSearch).unwrap();
    assert_near(removal.paths[0].summary(Measure::Removal), 0.1);
}

#[test]
fn unreachable_setup_degrades_the_path() {
    let config = config(&dff_toml(&["binary-search-constraint"]));
    // setup beyond the one nanosecond search window
    let flop = Flop::dffr(2.0 * NS, 0.05 * NS, 0.15 * NS, 0.1 * NS);
    let result = characterize(&config, &flop, 4).unwrap();

    let searches = result.with_code("R301");
    assert!(!searches.is_empty());
    assert!(searches
        .iter()
        .all(|d| d.message.contains("never passed")));
    for path in &result.reports[0].procedures[0].paths {
        assert_eq!(path.status, PathStatus::Degraded);
        assert!(path.summary(Measure::Setup).is_none());
        assert_near(path.summary(Measure::Hold), 0.05);
        assert!(path
            .failed_conditions
            .iter()
            .all(|f| f.measure == Measure::Setup));
    }
    let holes = result.with_code("T401");
    assert_eq!(holes.len(), 2);
    assert!(holes
        .iter()
        .all(|d| d.context_value("measure") == Some("setup")));
}

/// Whether the data edge of a state check lands inside `window` seconds
/// before the clock.
fn data_edge_before_clock(stimulus: &Stimulus, window: f64) -> bool {
    if !matches!(stimulus.probe, Probe::StateCheck { .. }) {
        return false;
    }
    let midpoints = |node: &str| -> Vec<f64> {
        stimulus
            .sources
            .iter()
            .filter(|s| s.node == node)
            .flat_map(|s| s.edges.iter().map(|e| e.midpoint()))
            .collect()
    };
    let Some(&clock) = midpoints("CLK").first() else {
        return false;
    };
    midpoints("D")
        .iter()
        .any(|&t| t > clock - window && t < clock - 1e-13)
}

#[test]
fn unsimulated_offsets_do_not_move_the_setup() {
    let config = config(&dff_toml(&["binary-search-constraint"]));
    let adapter = FailWhen::new(flop(), |s: &Stimulus| {
        data_edge_before_clock(s, 0.9 * NS)
    });
    let result = characterize(&config, &adapter, 4).unwrap();

    for path in &result.reports[0].procedures[0].paths {
        assert_eq!(path.status, PathStatus::Degraded, "{}", path.path);
        // no setup value rather than the upper bound
        assert!(path.summary(Measure::Setup).is_none());
        assert!(path.table(Measure::Setup).is_none());
        assert_near(path.summary(Measure::Hold), 0.05);
        assert_eq!(path.failed_conditions.len(), 2);
        assert!(path
            .failed_conditions
            .iter()
            .all(|f| f.measure == Measure::Setup && f.reason.contains("failed to simulate")));
    }

    let stimuli = result.with_code("S201");
    assert_eq!(stimuli.len(), 4);
    for diagnostic in stimuli {
        assert!(diagnostic.message.starts_with("setup search failed"));
        assert_eq!(diagnostic.context_value("measure"), Some("setup"));
        assert!(diagnostic.context_value("variation").is_some());
        assert!(diagnostic.context_value("condition").is_some());
    }
    assert!(result.with_code("R301").is_empty());
}

#[test]
fn procedure_without_arcs_is_a_warning() {
    // a combinational cell has nothing for a removal search
    let mut config = config(&and2_toml(&[0.01], &[0.001], "worst-case"));
    config.cells[0].procedures = vec![Procedure::RemovalSearch];
    config.cells[0].sweeps.clock_slews = vec![0.02];

    let result = characterize(&config, &flop(), 1).unwrap();
    let warnings = result.with_code("W501");
    assert_eq!(warnings.len(), 1);
    assert_eq!(warnings[0].context_value("procedure"), Some("removal-search"));
    assert!(result.reports[0].procedures[0].paths.is_empty());
    assert!(!result.has_errors);
}
