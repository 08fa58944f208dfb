//! End-to-end characterization of a combinational cell against behavioral
//! simulator models: table shape, diagnostics for holes and inversions, and
//! independence from scheduling and sweep order.

use std::sync::Mutex;
use std::time::Duration;

use cellchar_conformance::{and2_toml, characterize, config, FailWhen, LinearDelay, Recording};
use cellchar_config::Axis;
use cellchar_engine::{Measure, PathReport, PathStatus};
use cellchar_sim::{Measurement, Outcome, Probe, SimError, SimulatorAdapter, Stimulus};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};

const SLEWS: [f64; 2] = [0.01, 0.05];
const LOADS: [f64; 2] = [0.001, 0.005];

/// Answers after a random pause so that workers finish out of order.
struct Jitter<A> {
    inner: A,
    rng: Mutex<StdRng>,
}

impl<A: SimulatorAdapter> SimulatorAdapter for Jitter<A> {
    fn simulate(&self, stimulus: &Stimulus) -> Result<Outcome, SimError> {
        let pause = self.rng.lock().unwrap().gen_range(0..200);
        std::thread::sleep(Duration::from_micros(pause));
        self.inner.simulate(stimulus)
    }
}

/// An AND-OR gate whose `C` arcs have three sensitizing conditions.
fn ao21_toml(procedure: &str) -> String {
    format!(
        r#"
[cells.AO21X1]
netlist = "ao21x1.sp"
inputs = ["A", "B", "C"]
outputs = ["Y"]
functions = ["Y = A & B | C"]
procedures = ["{procedure}"]
data_slews = {SLEWS:?}
loads = {LOADS:?}
"#
    )
}

/// Slows the `C` arcs by 10 ps for every side input held high and speeds
/// up their output edge by the same amount, so the slowest condition for
/// delay is not the slowest for transition. The input ramp and the load add
/// to the delay one to one (seconds per second, and 1 ps/fF).
struct SideInputs;

impl SimulatorAdapter for SideInputs {
    fn simulate(&self, stimulus: &Stimulus) -> Result<Outcome, SimError> {
        let Probe::Timing { trigger, .. } = &stimulus.probe else {
            return LinearDelay::typical().simulate(stimulus);
        };
        if trigger.node != "C" {
            return LinearDelay::typical().simulate(stimulus);
        }
        let high = stimulus
            .sources
            .iter()
            .filter(|s| s.node == "A" || s.node == "B")
            .filter(|s| s.edges.is_empty() && s.initial_high)
            .count() as f64;
        let farads: f64 = stimulus.loads.iter().map(|l| l.farads).sum();
        Ok(Outcome::Measured(Measurement {
            delay: 1e-11 * (1.0 + high) + 1e3 * farads + trigger_ramp(stimulus),
            transition: 1e-11 * (3.0 - high),
        }))
    }
}

fn path<'r>(paths: &'r [PathReport], name: &str) -> &'r PathReport {
    paths
        .iter()
        .find(|p| p.path == name)
        .unwrap_or_else(|| panic!("no path {name}"))
}

fn trigger_ramp(stimulus: &Stimulus) -> f64 {
    let Probe::Timing { trigger, .. } = &stimulus.probe else {
        return 0.0;
    };
    stimulus
        .sources
        .iter()
        .find(|s| s.node == trigger.node)
        .and_then(|s| s.edges.first())
        .map_or(0.0, |e| e.duration)
}

// ---------------------------------------------------------------------------
// Complete runs
// ---------------------------------------------------------------------------

#[test]
fn and2_worst_case_tables() {
    let config = config(&and2_toml(&SLEWS, &LOADS, "worst-case"));
    let adapter = Recording::new(LinearDelay::typical());
    let result = characterize(&config, &adapter, 2).unwrap();

    assert!(!result.has_errors);
    assert_eq!(result.warning_count, 0);
    let report = &result.reports[0];
    assert_eq!(report.cell, "AND2X1");
    let paths = &report.procedures[0].paths;
    let names: Vec<&str> = paths.iter().map(|p| p.path.as_str()).collect();
    assert_eq!(
        names,
        vec![
            "A rise -> Y rise",
            "A fall -> Y fall",
            "B rise -> Y rise",
            "B fall -> Y fall"
        ]
    );
    // one sensitizing condition per path, four grid points
    assert_eq!(adapter.calls(), 16);

    for path in paths {
        assert_eq!(path.status, PathStatus::Complete);
        for measure in [Measure::Delay, Measure::Transition] {
            let table = path.table(measure).unwrap();
            assert_eq!(table.axes.len(), 2);
            assert_eq!(table.axes[0].axis, Axis::DataSlew);
            assert_eq!(table.axes[0].values, SLEWS.to_vec());
            assert_eq!(table.axes[1].axis, Axis::Load);
            assert_eq!(table.axes[1].values, LOADS.to_vec());
            assert_eq!(table.values.len(), 4);
            assert!(table.values.iter().all(|v| v.is_finite() && *v > 0.0));
        }
        let delay = path.table(Measure::Delay).unwrap();
        // grows along the load axis and along the slew axis
        assert!(delay.get(&[0, 1]).unwrap() > delay.get(&[0, 0]).unwrap());
        assert!(delay.get(&[1, 0]).unwrap() > delay.get(&[0, 0]).unwrap());
        // values are in nanoseconds: 10 ps + 1 ps/fF at the lightest load
        let light = delay.get(&[0, 0]).unwrap();
        assert!(light > 0.011 && light < 0.02, "{light}");
        let summary = path.summary(Measure::Delay).unwrap();
        assert!((summary - delay.max().unwrap()).abs() < 1e-12);
    }
}

#[test]
fn average_matches_worst_case_for_a_single_condition() {
    let worst = characterize(
        &config(&and2_toml(&SLEWS, &LOADS, "worst-case")),
        &LinearDelay::typical(),
        2,
    )
    .unwrap();
    let average = characterize(
        &config(&and2_toml(&SLEWS, &LOADS, "average")),
        &LinearDelay::typical(),
        2,
    )
    .unwrap();
    let worst = &worst.reports[0].procedures[0].paths;
    let average = &average.reports[0].procedures[0].paths;
    for (w, a) in worst.iter().zip(average) {
        assert_eq!(w.tables, a.tables);
    }
}

#[test]
fn conditions_reduce_per_grid_point() {
    let worst = config(&ao21_toml("worst-case"));
    let average = config(&ao21_toml("average"));
    let thresholds = &worst.settings.thresholds;
    let worst = characterize(&worst, &SideInputs, 3).unwrap();
    let average = characterize(&average, &SideInputs, 3).unwrap();
    assert!(!worst.has_errors && !average.has_errors);

    for name in ["C rise -> Y rise", "C fall -> Y fall"] {
        let w = path(&worst.reports[0].procedures[0].paths, name);
        let a = path(&average.reports[0].procedures[0].paths, name);
        assert_eq!(w.status, PathStatus::Complete);
        assert_eq!(a.status, PathStatus::Complete);
        // A=0 B=0, A=0 B=1 and A=1 B=0 sensitize C
        let w_delay = w.table(Measure::Delay).unwrap();
        let a_delay = a.table(Measure::Delay).unwrap();
        let w_transition = w.table(Measure::Transition).unwrap();
        let a_transition = a.table(Measure::Transition).unwrap();
        for (i, &slew) in SLEWS.iter().enumerate() {
            for (j, &load) in LOADS.iter().enumerate() {
                let base = load + thresholds.full_swing(slew);
                let at = [i, j];
                let close = |value: Option<f64>, expected: f64| {
                    let value = value.unwrap();
                    assert!(
                        (value - expected).abs() < 1e-9,
                        "{name} {at:?}: {value} != {expected}"
                    );
                };
                close(w_delay.get(&at), 0.02 + base);
                close(a_delay.get(&at), 0.05 / 3.0 + base);
                // taken from a different condition than the delay
                close(w_transition.get(&at), 0.03);
                close(a_transition.get(&at), 0.07 / 3.0);
            }
        }

        let max = w_delay.max().unwrap();
        assert!((w.summary(Measure::Delay).unwrap() - max).abs() < 1e-12);
        let mean = a_delay.values.iter().sum::<f64>() / a_delay.values.len() as f64;
        assert!((a.summary(Measure::Delay).unwrap() - mean).abs() < 1e-9);
    }
}

#[test]
fn condition_completion_order_does_not_change_the_reduction() {
    for procedure in ["worst-case", "average"] {
        let config = config(&ao21_toml(procedure));
        let serial = characterize(&config, &SideInputs, 1).unwrap();
        for seed in 0..3 {
            let jitter = Jitter {
                inner: SideInputs,
                rng: Mutex::new(StdRng::seed_from_u64(seed)),
            };
            let parallel = characterize(&config, &jitter, 8).unwrap();
            assert_eq!(serial.reports, parallel.reports, "{procedure}, seed {seed}");
        }
    }
}

// ---------------------------------------------------------------------------
// Degraded runs
// ---------------------------------------------------------------------------

#[test]
fn grid_incomplete_names_the_missing_point() {
    let config = config(&and2_toml(&SLEWS, &LOADS, "worst-case"));
    // the slow edge into the heavy load never converges
    let adapter = FailWhen::new(LinearDelay::typical(), |s: &Stimulus| {
        trigger_ramp(s) > 5e-11 && s.loads[0].farads > 2e-15
    });
    let result = characterize(&config, &adapter, 3).unwrap();

    assert!(result.has_errors);
    for path in &result.reports[0].procedures[0].paths {
        assert_eq!(path.status, PathStatus::Degraded);
        assert_eq!(path.failed_conditions.len(), 1);
        assert_eq!(path.failed_conditions[0].variation, "data_slew=0.05, load=0.005");
        assert!(path.table(Measure::Delay).is_none());
        assert!(path.summary(Measure::Delay).is_some());
    }

    let holes = result.with_code("T401");
    // delay and transition for each of the four paths
    assert_eq!(holes.len(), 8);
    for diagnostic in holes {
        assert!(
            diagnostic
                .message
                .contains("1 of 4 grid points missing: (0.05, 0.005)"),
            "{}",
            diagnostic.message
        );
        assert_eq!(diagnostic.context_value("cell"), Some("AND2X1"));
    }
    assert_eq!(result.with_code("S201").len(), 4);
}

#[test]
fn every_condition_failing_fails_the_path() {
    let config = config(&and2_toml(&SLEWS, &LOADS, "worst-case"));
    let adapter = FailWhen::new(LinearDelay::typical(), |s: &Stimulus| {
        matches!(&s.probe, Probe::Timing { trigger, .. } if trigger.node == "B")
    });
    let result = characterize(&config, &adapter, 2).unwrap();
    let report = &result.reports[0];
    assert_eq!(report.count(PathStatus::Complete), 2);
    assert_eq!(report.count(PathStatus::Failed), 2);
    let failed = result.with_code("R302");
    assert_eq!(failed.len(), 2);
    assert!(failed
        .iter()
        .all(|d| d.context_value("path").is_some_and(|p| p.starts_with("B "))));
    // no table holes are reported for a path with nothing in it
    assert!(result.with_code("T401").is_empty());
}

#[test]
fn delay_falling_with_load_is_a_warning() {
    let config = config(&and2_toml(&SLEWS, &LOADS, "worst-case"));
    let adapter = LinearDelay {
        intrinsic: 1e-10,
        drive: -1e3,
        ramp: 0.0,
    };
    let result = characterize(&config, &adapter, 2).unwrap();

    assert!(!result.has_errors);
    let inversions = result.with_code("T402");
    // one inversion per slew row, for both measures of all four paths
    assert_eq!(inversions.len(), 16);
    assert!(inversions
        .iter()
        .any(|d| d.context_value("measure") == Some("delay")));
    // the tables are kept
    let report = &result.reports[0];
    assert_eq!(report.count(PathStatus::Complete), 4);
}

// ---------------------------------------------------------------------------
// Determinism
// ---------------------------------------------------------------------------

#[test]
fn results_do_not_depend_on_completion_order() {
    let config = config(&and2_toml(&SLEWS, &LOADS, "worst-case"));
    let serial = characterize(&config, &LinearDelay::typical(), 1).unwrap();
    let jitter = Jitter {
        inner: LinearDelay::typical(),
        rng: Mutex::new(StdRng::seed_from_u64(7)),
    };
    let parallel = characterize(&config, &jitter, 8).unwrap();
    assert_eq!(serial.reports, parallel.reports);
}

#[test]
fn tables_do_not_depend_on_sweep_order() {
    let mut rng = StdRng::seed_from_u64(42);
    let slews = vec![0.01, 0.02, 0.05, 0.1];
    let loads = vec![0.001, 0.002, 0.005];
    let reference = characterize(
        &config(&and2_toml(&slews, &loads, "worst-case")),
        &LinearDelay::typical(),
        2,
    )
    .unwrap();

    for _ in 0..4 {
        let mut s = slews.clone();
        let mut l = loads.clone();
        s.shuffle(&mut rng);
        l.shuffle(&mut rng);
        let shuffled = characterize(
            &config(&and2_toml(&s, &l, "worst-case")),
            &LinearDelay::typical(),
            2,
        )
        .unwrap();
        let expected = &reference.reports[0].procedures[0].paths;
        let actual = &shuffled.reports[0].procedures[0].paths;
        for (e, a) in expected.iter().zip(actual) {
            assert_eq!(e.tables, a.tables, "slews {s:?} loads {l:?}");
        }
    }
}

#[test]
fn stimuli_are_reproducible() {
    let config = config(&and2_toml(&SLEWS, &LOADS, "worst-case"));
    let first = Recording::new(LinearDelay::typical());
    let second = Recording::new(LinearDelay::typical());
    characterize(&config, &first, 1).unwrap();
    characterize(&config, &second, 4).unwrap();
    let mut a = first.titles();
    let mut b = second.titles();
    a.sort();
    b.sort();
    assert_eq!(a, b);
    assert_eq!(a.len(), 16);
    a.dedup();
    assert_eq!(a.len(), 16);
}
