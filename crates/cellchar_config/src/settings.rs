//! The validated, immutable configuration consumed by a characterization run.

use crate::error::ConfigError;
use crate::procedure::{Axis, Procedure};
use cellchar_cell::Cell;
use cellchar_common::UnitSystem;
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

/// A fully resolved configuration: library-wide settings plus one job per cell.
#[derive(Debug)]
pub struct CharConfig {
    /// Library-wide settings.
    pub settings: Settings,
    /// Cells to characterize, sorted by name.
    pub cells: Vec<CellJob>,
}

impl CharConfig {
    /// Looks a cell job up by cell name.
    pub fn cell(&self, name: &str) -> Result<&CellJob, ConfigError> {
        self.cells
            .iter()
            .find(|job| job.cell.name() == name)
            .ok_or_else(|| ConfigError::UnknownCell(name.to_string()))
    }

    /// Returns the named jobs in the order given, or every job when `names`
    /// is empty.
    pub fn select(&self, names: &[String]) -> Result<Vec<&CellJob>, ConfigError> {
        if names.is_empty() {
            return Ok(self.cells.iter().collect());
        }
        names.iter().map(|name| self.cell(name)).collect()
    }
}

/// Library-wide settings.
#[derive(Debug, Clone)]
pub struct Settings {
    /// Naming and operating point.
    pub library: LibrarySettings,
    /// Units of every value in the configuration and the output tables.
    pub units: UnitSystem,
    /// Supply nodes.
    pub supplies: Supplies,
    /// Measurement thresholds.
    pub thresholds: Thresholds,
    /// Simulator location and run control.
    pub simulator: SimulatorSettings,
}

impl Settings {
    /// Supply swing in volts.
    pub fn swing_volts(&self) -> f64 {
        self.supplies.vdd.normalized_voltage(&self.units)
            - self.supplies.vss.normalized_voltage(&self.units)
    }

    /// Lower slew threshold in library voltage units.
    pub fn logic_threshold_low_voltage(&self) -> f64 {
        self.thresholds.logic_low * self.supplies.vdd.voltage
    }

    /// Upper slew threshold in library voltage units.
    pub fn logic_threshold_high_voltage(&self) -> f64 {
        self.thresholds.logic_high * self.supplies.vdd.voltage
    }

    /// Falling delay threshold in library voltage units.
    pub fn logic_high_to_low_threshold_voltage(&self) -> f64 {
        self.thresholds.high_to_low * self.supplies.vdd.voltage
    }

    /// Rising delay threshold in library voltage units.
    pub fn logic_low_to_high_threshold_voltage(&self) -> f64 {
        self.thresholds.low_to_high * self.supplies.vdd.voltage
    }

    /// Lower energy threshold in library voltage units.
    pub fn energy_low_threshold_voltage(&self) -> f64 {
        self.thresholds.energy_low * self.supplies.vdd.voltage
    }

    /// Upper energy threshold in library voltage units.
    pub fn energy_high_threshold_voltage(&self) -> f64 {
        self.thresholds.energy_high * self.supplies.vdd.voltage
    }
}

impl fmt::Display for Settings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let v = self.units.voltage;
        let lib = &self.library;
        writeln!(f, "Library name:         {}", lib.name)?;
        writeln!(f, ".lib name:            {}", lib.dotlib_name)?;
        writeln!(f, ".v name:              {}", lib.verilog_name)?;
        writeln!(f, "Cell prefix:          {}", lib.cell_prefix)?;
        writeln!(f, "Cell suffix:          {}", lib.cell_suffix)?;
        writeln!(f, "Units:")?;
        for line in self.units.to_string().lines() {
            writeln!(f, "    {line}")?;
        }
        match &self.simulator.executable {
            Some(path) => writeln!(f, "Simulator:            {}", path.display())?,
            None => writeln!(f, "Simulator:            (not found)")?,
        }
        writeln!(f, "Work directory:       {}", self.simulator.work_dir.display())?;
        writeln!(f, "Workers:              {}", self.simulator.workers)?;
        writeln!(
            f,
            "Process:              {}",
            lib.process.as_deref().unwrap_or("-")
        )?;
        writeln!(f, "Temperature:          {}", lib.temperature)?;
        for (label, node) in [
            ("vdd", &self.supplies.vdd),
            ("vss", &self.supplies.vss),
            ("pwell", &self.supplies.pwell),
            ("nwell", &self.supplies.nwell),
        ] {
            writeln!(f, "{label:<22}{} = {} {v}", node.name, node.voltage)?;
        }
        writeln!(f, "Logic thresholds:")?;
        writeln!(f, "    Low:              {} {v}", self.logic_threshold_low_voltage())?;
        writeln!(f, "    High:             {} {v}", self.logic_threshold_high_voltage())?;
        writeln!(
            f,
            "    High to low:      {} {v}",
            self.logic_high_to_low_threshold_voltage()
        )?;
        writeln!(
            f,
            "    Low to high:      {} {v}",
            self.logic_low_to_high_threshold_voltage()
        )?;
        writeln!(f, "Energy thresholds:")?;
        writeln!(f, "    Low:              {} {v}", self.energy_low_threshold_voltage())?;
        writeln!(f, "    High:             {} {v}", self.energy_high_threshold_voltage())?;
        writeln!(
            f,
            "Operating conditions: {}",
            lib.operating_conditions.as_deref().unwrap_or("-")
        )?;
        write!(f, "Delay model:          {}", lib.delay_model)
    }
}

/// Library naming and operating point.
#[derive(Debug, Clone)]
pub struct LibrarySettings {
    /// Library name.
    pub name: String,
    /// Liberty file name.
    pub dotlib_name: String,
    /// Verilog model file name.
    pub verilog_name: String,
    /// Cell name prefix.
    pub cell_prefix: String,
    /// Cell name suffix.
    pub cell_suffix: String,
    /// Process corner label.
    pub process: Option<String>,
    /// Operating conditions label.
    pub operating_conditions: Option<String>,
    /// Delay model.
    pub delay_model: String,
    /// Temperature in degrees Celsius.
    pub temperature: f64,
}

/// A named supply node.
#[derive(Debug, Clone, PartialEq)]
pub struct NamedNode {
    /// Netlist node name.
    pub name: String,
    /// Voltage in library voltage units.
    pub voltage: f64,
}

impl NamedNode {
    /// The voltage in volts.
    pub fn normalized_voltage(&self, units: &UnitSystem) -> f64 {
        units.voltage.to_si(self.voltage)
    }
}

/// The four supply nodes every cell is connected to.
#[derive(Debug, Clone)]
pub struct Supplies {
    /// Primary power.
    pub vdd: NamedNode,
    /// Primary ground.
    pub vss: NamedNode,
    /// P-well bias.
    pub pwell: NamedNode,
    /// N-well bias.
    pub nwell: NamedNode,
}

impl Supplies {
    /// All nodes in the order they follow the signal pins.
    pub fn nodes(&self) -> [&NamedNode; 4] {
        [&self.vdd, &self.vss, &self.nwell, &self.pwell]
    }
}

/// Measurement thresholds as fractions of the supply.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Thresholds {
    /// Lower slew threshold.
    pub logic_low: f64,
    /// Upper slew threshold.
    pub logic_high: f64,
    /// Delay threshold for falling signals.
    pub high_to_low: f64,
    /// Delay threshold for rising signals.
    pub low_to_high: f64,
    /// Lower energy threshold.
    pub energy_low: f64,
    /// Upper energy threshold.
    pub energy_high: f64,
    /// Energy integration window, in input slews.
    pub energy_time_extent: f64,
}

impl Thresholds {
    /// Full-rail ramp duration for a slew measured between the logic
    /// thresholds.
    pub fn full_swing(&self, slew: f64) -> f64 {
        slew / (self.logic_high - self.logic_low)
    }

    /// The delay threshold for a signal moving to `rising` or falling.
    pub fn delay_threshold(&self, rising: bool) -> f64 {
        if rising {
            self.low_to_high
        } else {
            self.high_to_low
        }
    }
}

/// Simulator location and run control. Times are in seconds.
#[derive(Debug, Clone)]
pub struct SimulatorSettings {
    /// The simulator executable, resolved at configuration time.
    pub executable: Option<PathBuf>,
    /// Directory for generated decks.
    pub work_dir: PathBuf,
    /// Worker pool size.
    pub workers: usize,
    /// Retry a failed stimulus once with perturbed initial conditions.
    pub retry_on_failure: bool,
    /// Keep generated decks after the run.
    pub keep_decks: bool,
    /// Settling time before and after an edge.
    pub settle_time: f64,
    /// Observation window after the last edge.
    pub window: f64,
    /// Maximum time step.
    pub step: Option<f64>,
    /// Wall-clock limit for one simulator invocation.
    pub timeout: Option<Duration>,
}

/// The sweep values configured for a cell, in library units.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Sweeps {
    /// Data input transition times.
    pub data_slews: Vec<f64>,
    /// Clock transition times.
    pub clock_slews: Vec<f64>,
    /// Output loads.
    pub loads: Vec<f64>,
}

impl Sweeps {
    /// The values configured for `axis`.
    pub fn values(&self, axis: Axis) -> &[f64] {
        match axis {
            Axis::DataSlew => &self.data_slews,
            Axis::ClockSlew => &self.clock_slews,
            Axis::Load => &self.loads,
        }
    }
}

/// Why a bisection interval was rejected.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum BoundsError {
    /// A bound is NaN or infinite.
    #[error("bounds must be finite")]
    NonFinite,
    /// `lower >= upper`.
    #[error("lower bound {lower} must be below upper bound {upper}")]
    Inverted {
        /// The lower bound.
        lower: f64,
        /// The upper bound.
        upper: f64,
    },
    /// `resolution <= 0`.
    #[error("resolution {0} must be positive")]
    Resolution(f64),
}

/// The interval and resolution of a constraint bisection, in library time units.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SearchBounds {
    lower: f64,
    upper: f64,
    resolution: f64,
}

impl SearchBounds {
    /// Validates `lower < upper` and `resolution > 0`.
    pub fn new(lower: f64, upper: f64, resolution: f64) -> Result<Self, BoundsError> {
        if !(lower.is_finite() && upper.is_finite() && resolution.is_finite()) {
            return Err(BoundsError::NonFinite);
        }
        if lower >= upper {
            return Err(BoundsError::Inverted { lower, upper });
        }
        if resolution <= 0.0 {
            return Err(BoundsError::Resolution(resolution));
        }
        Ok(Self {
            lower,
            upper,
            resolution,
        })
    }

    /// The smallest offset probed.
    pub fn lower(&self) -> f64 {
        self.lower
    }

    /// The largest offset probed.
    pub fn upper(&self) -> f64 {
        self.upper
    }

    /// The convergence width.
    pub fn resolution(&self) -> f64 {
        self.resolution
    }
}

/// Search intervals for each constraint kind.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ConstraintBounds {
    /// Setup search.
    pub setup: SearchBounds,
    /// Hold search.
    pub hold: SearchBounds,
    /// Recovery search.
    pub recovery: SearchBounds,
    /// Removal search.
    pub removal: SearchBounds,
}

/// Everything needed to characterize one cell.
#[derive(Debug, Clone)]
pub struct CellJob {
    /// The cell.
    pub cell: Cell,
    /// Procedures to run, in configuration order.
    pub procedures: Vec<Procedure>,
    /// Sweep values.
    pub sweeps: Sweeps,
    /// Constraint search intervals.
    pub bounds: ConstraintBounds,
    /// Probe budget per constraint search.
    pub max_iterations: u32,
    /// Output load during constraint searches, library capacitance units.
    pub search_load: f64,
}
