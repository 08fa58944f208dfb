//! Resolution: one validation pass from [`RawConfig`] to [`CharConfig`].
//!
//! Every section is checked and every problem is recorded before anything
//! is returned, so a broken file produces a single
//! [`ConfigError::Invalid`] listing all of them.

use crate::error::ConfigError;
use crate::procedure::Procedure;
use crate::settings::{
    CellJob, CharConfig, ConstraintBounds, LibrarySettings, NamedNode, SearchBounds, Settings,
    SimulatorSettings, Supplies, Sweeps, Thresholds,
};
use crate::types::{CellSection, NodeSection, RawConfig, SimulatorSection, UnitsSection};
use cellchar_cell::{AsyncAction, Cell, NetlistRef, PathKind, Polarity, PortRole};
use cellchar_common::{EngineeringUnit, Quantity, UnitSystem};
use std::path::Path;
use std::time::Duration;

/// The simulator looked up on `PATH` when none is configured.
pub const DEFAULT_SIMULATOR: &str = "ngspice";

/// Collects validation problems.
#[derive(Default)]
struct Problems(Vec<String>);

impl Problems {
    fn push(&mut self, message: impl Into<String>) {
        self.0.push(message.into());
    }
}

/// Resolves a raw configuration. Relative paths are taken relative to
/// `base_dir`.
pub fn resolve(raw: RawConfig, base_dir: &Path) -> Result<CharConfig, ConfigError> {
    let mut problems = Problems::default();

    if raw.library.name.trim().is_empty() {
        problems.push("library.name must not be empty");
    }
    let lib = raw.library;
    let library = LibrarySettings {
        dotlib_name: lib
            .dotlib_name
            .unwrap_or_else(|| format!("{}.lib", lib.name)),
        verilog_name: lib
            .verilog_name
            .unwrap_or_else(|| format!("{}.v", lib.name)),
        name: lib.name,
        cell_prefix: lib.cell_prefix,
        cell_suffix: lib.cell_suffix,
        process: lib.process,
        operating_conditions: lib.operating_conditions,
        delay_model: lib.delay_model,
        temperature: lib.temperature,
    };

    let units = resolve_units(&raw.units, &mut problems);
    let supplies = resolve_supplies(raw.supplies, &mut problems);
    let t = raw.thresholds;
    let thresholds = Thresholds {
        logic_low: t.logic_low,
        logic_high: t.logic_high,
        high_to_low: t.high_to_low,
        low_to_high: t.low_to_high,
        energy_low: t.energy_low,
        energy_high: t.energy_high,
        energy_time_extent: t.energy_time_extent,
    };
    check_thresholds(&thresholds, &mut problems);
    let simulator = resolve_simulator(raw.simulator, &units, base_dir, &mut problems);

    let settings = Settings {
        library,
        units,
        supplies,
        thresholds,
        simulator,
    };

    let mut cells = Vec::with_capacity(raw.cells.len());
    for (name, section) in raw.cells {
        if let Some(job) = resolve_cell(&name, section, &settings, base_dir, &mut problems) {
            cells.push(job);
        }
    }

    if !problems.0.is_empty() {
        return Err(ConfigError::Invalid(problems.0));
    }
    tracing::debug!(cells = cells.len(), "configuration resolved");
    Ok(CharConfig { settings, cells })
}

fn resolve_units(raw: &UnitsSection, problems: &mut Problems) -> UnitSystem {
    let defaults = UnitSystem::default();
    let mut parse = |key: &str, quantity: Quantity, text: &str, fallback: EngineeringUnit| {
        EngineeringUnit::parse(quantity, text).unwrap_or_else(|err| {
            problems.push(format!("units.{key}: {err}"));
            fallback
        })
    };
    UnitSystem {
        voltage: parse("voltage", Quantity::Voltage, &raw.voltage, defaults.voltage),
        current: parse("current", Quantity::Current, &raw.current, defaults.current),
        resistance: parse(
            "resistance",
            Quantity::Resistance,
            &raw.resistance,
            defaults.resistance,
        ),
        capacitance: parse(
            "capacitance",
            Quantity::Capacitance,
            &raw.capacitance,
            defaults.capacitance,
        ),
        time: parse("time", Quantity::Time, &raw.time, defaults.time),
        power: parse("power", Quantity::Power, &raw.power, defaults.power),
        energy: parse("energy", Quantity::Energy, &raw.energy, defaults.energy),
    }
}

fn node(raw: NodeSection, name: &str, voltage: f64) -> NamedNode {
    NamedNode {
        name: raw.name.unwrap_or_else(|| name.to_string()),
        voltage: raw.voltage.unwrap_or(voltage),
    }
}

fn resolve_supplies(raw: crate::types::SuppliesSection, problems: &mut Problems) -> Supplies {
    let vdd = node(raw.vdd, "VDD", 1.8);
    let vss = node(raw.vss, "VSS", 0.0);
    let pwell = node(raw.pwell, "VPW", vss.voltage);
    let nwell = node(raw.nwell, "VNW", vdd.voltage);
    if vdd.voltage <= vss.voltage {
        problems.push(format!(
            "supplies.vdd ({}) must be above supplies.vss ({})",
            vdd.voltage, vss.voltage
        ));
    }
    let names = [&vdd.name, &vss.name, &pwell.name, &nwell.name];
    for (i, a) in names.iter().enumerate() {
        if names[..i].contains(a) {
            problems.push(format!("supplies: node name `{a}` is used twice"));
        }
    }
    Supplies {
        vdd,
        vss,
        pwell,
        nwell,
    }
}

fn check_thresholds(t: &Thresholds, problems: &mut Problems) {
    for (key, value) in [
        ("logic_low", t.logic_low),
        ("logic_high", t.logic_high),
        ("high_to_low", t.high_to_low),
        ("low_to_high", t.low_to_high),
        ("energy_low", t.energy_low),
        ("energy_high", t.energy_high),
    ] {
        if !(value > 0.0 && value < 1.0) {
            problems.push(format!(
                "thresholds.{key} must be strictly between 0 and 1, got {value}"
            ));
        }
    }
    if t.logic_low >= t.logic_high {
        problems.push("thresholds.logic_low must be below thresholds.logic_high");
    }
    if t.energy_low >= t.energy_high {
        problems.push("thresholds.energy_low must be below thresholds.energy_high");
    }
    if t.energy_time_extent <= 0.0 {
        problems.push("thresholds.energy_time_extent must be positive");
    }
}

fn resolve_simulator(
    raw: SimulatorSection,
    units: &UnitSystem,
    base_dir: &Path,
    problems: &mut Problems,
) -> SimulatorSettings {
    let executable = match raw.executable {
        Some(path) => {
            let path = base_dir.join(path);
            if !path.is_file() {
                problems.push(format!(
                    "simulator.executable: `{}` is not a file",
                    path.display()
                ));
            }
            Some(path)
        }
        None => {
            let found = which::which(DEFAULT_SIMULATOR).ok();
            tracing::debug!(?found, "looked up {DEFAULT_SIMULATOR} on PATH");
            found
        }
    };

    let workers = match raw.workers {
        Some(0) => {
            problems.push("simulator.workers must be at least 1");
            1
        }
        Some(n) => n,
        None => std::thread::available_parallelism().map_or(1, |n| n.get()),
    };

    let mut positive_time = |key: &str, value: Option<f64>| -> Option<f64> {
        let value = value?;
        if value > 0.0 && value.is_finite() {
            Some(units.time.to_si(value))
        } else {
            problems.push(format!("simulator.{key} must be positive, got {value}"));
            None
        }
    };
    let settle_time = positive_time("settle_time", raw.settle_time).unwrap_or(1e-9);
    let window = positive_time("window", raw.window).unwrap_or(10.0 * settle_time);
    let step = positive_time("step", raw.step);
    let timeout = raw.timeout.and_then(|secs| match Duration::try_from_secs_f64(secs) {
        Ok(limit) if !limit.is_zero() => Some(limit),
        _ => {
            problems.push(format!("simulator.timeout must be positive, got {secs}"));
            None
        }
    });

    SimulatorSettings {
        executable,
        work_dir: base_dir.join(raw.work_dir),
        workers,
        retry_on_failure: raw.retry_on_failure,
        keep_decks: raw.keep_decks,
        settle_time,
        window,
        step,
        timeout,
    }
}

/// Splits `"!NAME"` into `("NAME", ActiveLow)`.
fn polarized(text: &str) -> (String, Polarity) {
    match text.trim().strip_prefix('!') {
        Some(name) => (name.trim().to_string(), Polarity::ActiveLow),
        None => (text.trim().to_string(), Polarity::ActiveHigh),
    }
}

fn build_cell(
    name: &str,
    section: &CellSection,
    settings: &Settings,
    base_dir: &Path,
    problems: &mut Problems,
) -> Option<Cell> {
    let clock = section.clock.as_deref().map(polarized);
    let set = section.set.as_deref().map(polarized);
    let reset = section.reset.as_deref().map(polarized);
    let special: Vec<&str> = [&clock, &set, &reset]
        .into_iter()
        .flatten()
        .map(|(n, _)| n.as_str())
        .collect();

    let mut functions = Vec::new();
    for text in &section.functions {
        match text.split_once('=') {
            Some((output, expr)) => {
                let output = output.trim();
                if !section.outputs.iter().any(|o| o == output) {
                    problems.push(format!(
                        "cells.{name}: function `{text}` drives undeclared output `{output}`"
                    ));
                }
                functions.push((output.to_string(), expr.trim().to_string()));
            }
            None => problems.push(format!(
                "cells.{name}: function `{text}` must have the form `OUTPUT = EXPRESSION`"
            )),
        }
    }

    let mut builder = Cell::builder(name).netlist(NetlistRef {
        path: base_dir.join(&section.netlist),
        models: section.models.iter().map(|m| base_dir.join(m)).collect(),
        pins: section.pins.clone(),
    });
    for input in &section.inputs {
        if !special.contains(&input.as_str()) {
            builder = builder.input(input.as_str());
        }
    }
    if let Some((clock, polarity)) = &clock {
        builder = builder.clock(clock.as_str(), *polarity);
    }
    for (control, action) in [(&set, AsyncAction::Set), (&reset, AsyncAction::Clear)] {
        if let Some((control, polarity)) = control {
            builder = builder.async_control(control.as_str(), action, *polarity);
        }
    }
    for output in &section.outputs {
        let function = functions
            .iter()
            .find(|(o, _)| o == output)
            .map(|(_, f)| f.clone());
        match function {
            Some(function) => builder = builder.output(output.as_str(), function),
            None => {
                problems.push(format!("cells.{name}: output `{output}` has no function"));
                return None;
            }
        }
    }
    match (&clock, &section.next_state) {
        (Some(_), Some(next_state)) => {
            let state = section.state.as_deref().unwrap_or("IQ");
            builder = builder.state(state, next_state.as_str());
        }
        (Some(_), None) => {
            problems.push(format!("cells.{name}: a clocked cell needs `next_state`"));
            return None;
        }
        (None, Some(_)) => {
            problems.push(format!("cells.{name}: `next_state` needs a `clock`"));
            return None;
        }
        (None, None) => {}
    }

    let cell = match builder.build() {
        Ok(cell) => cell,
        Err(err) => {
            problems.push(format!("cells.{name}: {err}"));
            return None;
        }
    };

    if !section.pins.is_empty() {
        let supplies: Vec<&str> = settings
            .supplies
            .nodes()
            .iter()
            .map(|n| n.name.as_str())
            .collect();
        for pin in &section.pins {
            let known = supplies.contains(&pin.as_str())
                || cell
                    .find_port(pin)
                    .is_some_and(|p| p.role != PortRole::State);
            if !known {
                problems.push(format!("cells.{name}: pin `{pin}` is not a port or supply"));
            }
        }
        for port in cell.ports().iter().filter(|p| p.role != PortRole::State) {
            if !section.pins.contains(&port.name) {
                problems.push(format!(
                    "cells.{name}: port `{}` is missing from `pins`",
                    port.name
                ));
            }
        }
    }
    Some(cell)
}

fn bounds(
    name: &str,
    key: &str,
    raw: Option<[f64; 3]>,
    default: SearchBounds,
    problems: &mut Problems,
) -> SearchBounds {
    match raw {
        None => default,
        Some([lower, upper, resolution]) => SearchBounds::new(lower, upper, resolution)
            .unwrap_or_else(|err| {
                problems.push(format!("cells.{name}.{key}: {err}"));
                default
            }),
    }
}

fn resolve_cell(
    name: &str,
    section: CellSection,
    settings: &Settings,
    base_dir: &Path,
    problems: &mut Problems,
) -> Option<CellJob> {
    let cell = build_cell(name, &section, settings, base_dir, problems)?;

    if section.procedures.is_empty() {
        problems.push(format!("cells.{name}: no procedures configured"));
    }

    let sweeps = Sweeps {
        data_slews: section.data_slews,
        clock_slews: section.clock_slews,
        loads: section.loads,
    };
    let mut checked = Vec::new();
    for procedure in &section.procedures {
        for &axis in procedure.axes(cell.is_sequential()) {
            if checked.contains(&axis) {
                continue;
            }
            checked.push(axis);
            let values = sweeps.values(axis);
            if values.is_empty() {
                problems.push(format!(
                    "cells.{name}: `{}` is required by {procedure} but is empty",
                    axis.key()
                ));
            }
            if values.iter().any(|v| !(v.is_finite() && *v > 0.0)) {
                problems.push(format!(
                    "cells.{name}: `{}` values must be positive",
                    axis.key()
                ));
            }
            let mut sorted = values.to_vec();
            sorted.sort_by(f64::total_cmp);
            if sorted.windows(2).any(|w| w[0] == w[1]) {
                problems.push(format!(
                    "cells.{name}: `{}` contains a duplicate value",
                    axis.key()
                ));
            }
        }
        check_procedure_fits(name, *procedure, &cell, problems);
    }

    // default window: zero to one settle time, resolved to a thousandth of it
    let settle = settings.units.time.from_si(settings.simulator.settle_time);
    let Ok(default) = SearchBounds::new(0.0, settle, settle / 1000.0) else {
        problems.push(format!(
            "cells.{name}: settle time {settle} {} cannot bound a search",
            settings.units.time
        ));
        return None;
    };
    let bounds = ConstraintBounds {
        setup: bounds(name, "setup_bounds", section.setup_bounds, default, problems),
        hold: bounds(name, "hold_bounds", section.hold_bounds, default, problems),
        recovery: bounds(name, "recovery_bounds", section.recovery_bounds, default, problems),
        removal: bounds(name, "removal_bounds", section.removal_bounds, default, problems),
    };

    if section.max_iterations == 0 {
        problems.push(format!("cells.{name}: max_iterations must be at least 1"));
    }
    if !(section.search_load > 0.0 && section.search_load.is_finite()) {
        problems.push(format!("cells.{name}: search_load must be positive"));
    }

    Some(CellJob {
        cell,
        procedures: section.procedures,
        sweeps,
        bounds,
        max_iterations: section.max_iterations,
        search_load: section.search_load,
    })
}

fn check_procedure_fits(name: &str, procedure: Procedure, cell: &Cell, problems: &mut Problems) {
    let needs = match procedure {
        Procedure::WorstCase | Procedure::Average => return,
        Procedure::BinarySearchConstraint => PathKind::Data,
        Procedure::RecoverySearch | Procedure::RemovalSearch => PathKind::Async,
    };
    let Some(seq) = cell.sequential() else {
        problems.push(format!(
            "cells.{name}: {procedure} needs a clocked cell"
        ));
        return;
    };
    let has = match needs {
        PathKind::Async => !seq.async_controls.is_empty(),
        _ => cell
            .ports_with_role(PortRole::Input)
            .any(|p| seq.next_state.references(p.id)),
    };
    if !has {
        let what = if needs == PathKind::Async {
            "an asynchronous set or reset"
        } else {
            "a data input in `next_state`"
        };
        problems.push(format!("cells.{name}: {procedure} needs {what}"));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loader::load_config_from_str;
    use crate::procedure::Axis;
    use std::path::PathBuf;

    const AND2: &str = r#"
[simulator]
executable = "/bin/sh"
workers = 2

[cells.AND2X1]
netlist = "and2.sp"
inputs = ["A", "B"]
outputs = ["Y"]
functions = ["Y = A & B"]
procedures = ["worst-case"]
data_slews = [0.01, 0.05]
loads = [0.001, 0.005]
"#;

    #[test]
    fn resolves_combinational_cell() {
        let config = load_config_from_str(AND2, Path::new("/lib")).unwrap();
        assert_eq!(config.settings.simulator.workers, 2);
        assert_eq!(config.settings.library.dotlib_name, "unnamed_lib.lib");
        let job = config.cell("AND2X1").unwrap();
        assert_eq!(job.cell.netlist().path, PathBuf::from("/lib/and2.sp"));
        assert_eq!(job.sweeps.values(Axis::Load), &[0.001, 0.005]);
        assert_eq!(job.procedures, [Procedure::WorstCase]);
        assert_eq!(job.max_iterations, 64);
        assert!(!job.cell.is_sequential());
    }

    #[test]
    fn default_settings() {
        let config = load_config_from_str(AND2, Path::new("/lib")).unwrap();
        let s = &config.settings;
        assert_eq!(s.units.time.to_string(), "ns");
        assert_eq!(s.units.capacitance.to_string(), "pF");
        assert_eq!(s.supplies.vdd.name, "VDD");
        assert_eq!(s.supplies.nwell.voltage, s.supplies.vdd.voltage);
        assert_eq!(s.thresholds.logic_low, 0.2);
        assert_eq!(s.simulator.settle_time, 1e-9);
        assert!((s.simulator.window - 1e-8).abs() < 1e-20);
        assert_eq!(s.simulator.work_dir, PathBuf::from("/lib/work"));
        assert!(s.simulator.retry_on_failure);
        assert!((s.logic_threshold_high_voltage() - 1.44).abs() < 1e-12);
    }

    #[test]
    fn sequential_cell_with_reset() {
        let toml = r#"
[simulator]
executable = "/bin/sh"

[cells.DFFRX1]
netlist = "dff.sp"
inputs = ["D", "CLK", "RN"]
outputs = ["Q", "QN"]
functions = ["Q = IQ", "QN = !IQ"]
clock = "CLK"
reset = "!RN"
next_state = "D"
procedures = ["binary-search-constraint", "removal-search"]
data_slews = [0.01]
clock_slews = [0.02]
setup_bounds = [0.0, 1.0, 0.001]
"#;
        let config = load_config_from_str(toml, Path::new(".")).unwrap();
        let job = config.cell("DFFRX1").unwrap();
        let seq = job.cell.sequential().unwrap();
        assert_eq!(job.cell.port_name(seq.state), "IQ");
        assert_eq!(seq.async_controls.len(), 1);
        assert_eq!(
            job.cell.find_port("RN").unwrap().polarity,
            Polarity::ActiveLow
        );
        assert_eq!(job.bounds.setup.upper(), 1.0);
        // unspecified bounds span one settle time
        assert_eq!(job.bounds.hold.upper(), 1.0);
        assert!((job.bounds.hold.resolution() - 0.001).abs() < 1e-15);
    }

    #[test]
    fn every_problem_is_reported() {
        let toml = r#"
[units]
time = "parsecs"

[thresholds]
logic_low = 0.9

[simulator]
executable = "/bin/sh"
workers = 0
timeout = -1.0

[cells.INV]
netlist = "inv.sp"
inputs = ["A"]
outputs = ["Y"]
functions = ["Y = !A"]
procedures = ["worst-case", "recovery-search"]
data_slews = [0.01, 0.01]
"#;
        let err = load_config_from_str(toml, Path::new(".")).unwrap_err();
        let ConfigError::Invalid(problems) = err else {
            panic!("expected Invalid, got {err:?}");
        };
        let joined = problems.join("\n");
        assert!(joined.contains("units.time"), "{joined}");
        assert!(joined.contains("logic_low must be below"), "{joined}");
        assert!(joined.contains("workers"), "{joined}");
        assert!(joined.contains("simulator.timeout"), "{joined}");
        assert!(joined.contains("`loads` is required"), "{joined}");
        assert!(joined.contains("duplicate"), "{joined}");
        assert!(joined.contains("recovery-search needs a clocked cell"), "{joined}");
    }

    #[test]
    fn cell_description_errors_are_collected() {
        let toml = r#"
[simulator]
executable = "/bin/sh"

[cells.BAD]
netlist = "bad.sp"
inputs = ["A"]
outputs = ["Y"]
functions = ["Y = A & Z"]
procedures = ["worst-case"]
data_slews = [0.01]
loads = [0.01]

[cells.NOFUNC]
netlist = "nofunc.sp"
inputs = ["A"]
outputs = ["Y"]
procedures = ["worst-case"]
data_slews = [0.01]
loads = [0.01]
"#;
        let err = load_config_from_str(toml, Path::new(".")).unwrap_err();
        let ConfigError::Invalid(problems) = err else {
            panic!("expected Invalid");
        };
        assert_eq!(problems.len(), 2, "{problems:?}");
        assert!(problems[0].starts_with("cells.BAD:"));
        assert!(problems[1].contains("`Y` has no function"));
    }

    #[test]
    fn pins_must_cover_ports() {
        let toml = r#"
[simulator]
executable = "/bin/sh"

[cells.INV]
netlist = "inv.sp"
pins = ["A", "VDD", "VSS", "VBOGUS"]
inputs = ["A"]
outputs = ["Y"]
functions = ["Y = !A"]
procedures = ["worst-case"]
data_slews = [0.01]
loads = [0.01]
"#;
        let err = load_config_from_str(toml, Path::new(".")).unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("`VBOGUS` is not a port or supply"), "{msg}");
        assert!(msg.contains("`Y` is missing from `pins`"), "{msg}");
    }

    #[test]
    fn missing_executable_is_reported() {
        let toml = r#"
[simulator]
executable = "definitely/not/here"
"#;
        let err = load_config_from_str(toml, Path::new("/nonexistent")).unwrap_err();
        assert!(err.to_string().contains("is not a file"));
    }

    #[test]
    fn select_cells() {
        let config = load_config_from_str(AND2, Path::new(".")).unwrap();
        assert_eq!(config.select(&[]).unwrap().len(), 1);
        assert!(matches!(
            config.select(&["NOPE".to_string()]),
            Err(ConfigError::UnknownCell(_))
        ));
    }
}
