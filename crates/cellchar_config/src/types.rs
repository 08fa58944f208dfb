//! Raw configuration types deserialized from `cellchar.toml`.
//!
//! These mirror the file layout and carry serde defaults only. Cross-field
//! checks, unit parsing, and cell construction happen in
//! [`resolve`](crate::resolve::resolve), which turns a [`RawConfig`] into an
//! immutable [`CharConfig`](crate::settings::CharConfig).

use crate::procedure::Procedure;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::PathBuf;

/// The top-level configuration file.
#[derive(Debug, Default, Deserialize)]
pub struct RawConfig {
    /// Library naming and operating point.
    #[serde(default)]
    pub library: LibrarySection,
    /// Unit of every physical quantity written in the file.
    #[serde(default)]
    pub units: UnitsSection,
    /// Supply node names and voltages.
    #[serde(default)]
    pub supplies: SuppliesSection,
    /// Measurement thresholds as fractions of the supply.
    #[serde(default)]
    pub thresholds: ThresholdsSection,
    /// Simulator location and run control.
    #[serde(default)]
    pub simulator: SimulatorSection,
    /// Cells to characterize, keyed by cell name.
    #[serde(default)]
    pub cells: BTreeMap<String, CellSection>,
}

/// `[library]`
#[derive(Debug, Deserialize)]
pub struct LibrarySection {
    /// Library name.
    #[serde(default = "default_library_name")]
    pub name: String,
    /// Liberty file name; defaults to `<name>.lib`.
    pub dotlib_name: Option<String>,
    /// Verilog model file name; defaults to `<name>.v`.
    pub verilog_name: Option<String>,
    /// Prepended to every cell name in the output.
    #[serde(default)]
    pub cell_prefix: String,
    /// Appended to every cell name in the output.
    #[serde(default)]
    pub cell_suffix: String,
    /// Process corner label.
    pub process: Option<String>,
    /// Operating conditions label.
    pub operating_conditions: Option<String>,
    /// Delay model written to the library.
    #[serde(default = "default_delay_model")]
    pub delay_model: String,
    /// Simulation temperature in degrees Celsius.
    #[serde(default = "default_temperature")]
    pub temperature: f64,
}

impl Default for LibrarySection {
    fn default() -> Self {
        Self {
            name: default_library_name(),
            dotlib_name: None,
            verilog_name: None,
            cell_prefix: String::new(),
            cell_suffix: String::new(),
            process: None,
            operating_conditions: None,
            delay_model: default_delay_model(),
            temperature: default_temperature(),
        }
    }
}

fn default_library_name() -> String {
    "unnamed_lib".to_string()
}

fn default_delay_model() -> String {
    "table_lookup".to_string()
}

fn default_temperature() -> f64 {
    25.0
}

/// `[units]`: each value is an SI prefix followed by a unit symbol or name.
#[derive(Debug, Deserialize)]
pub struct UnitsSection {
    /// e.g. `"V"`, `"mV"`.
    #[serde(default = "default_voltage_unit")]
    pub voltage: String,
    /// e.g. `"uA"`.
    #[serde(default = "default_current_unit")]
    pub current: String,
    /// e.g. `"ohm"`, `"kohm"`.
    #[serde(default = "default_resistance_unit")]
    pub resistance: String,
    /// e.g. `"pF"`, `"fF"`.
    #[serde(default = "default_capacitance_unit")]
    pub capacitance: String,
    /// e.g. `"ns"`, `"ps"`.
    #[serde(default = "default_time_unit")]
    pub time: String,
    /// e.g. `"nW"`.
    #[serde(default = "default_power_unit")]
    pub power: String,
    /// e.g. `"pJ"`.
    #[serde(default = "default_energy_unit")]
    pub energy: String,
}

impl Default for UnitsSection {
    fn default() -> Self {
        Self {
            voltage: default_voltage_unit(),
            current: default_current_unit(),
            resistance: default_resistance_unit(),
            capacitance: default_capacitance_unit(),
            time: default_time_unit(),
            power: default_power_unit(),
            energy: default_energy_unit(),
        }
    }
}

fn default_voltage_unit() -> String {
    "V".to_string()
}

fn default_current_unit() -> String {
    "uA".to_string()
}

fn default_resistance_unit() -> String {
    "ohm".to_string()
}

fn default_capacitance_unit() -> String {
    "pF".to_string()
}

fn default_time_unit() -> String {
    "ns".to_string()
}

fn default_power_unit() -> String {
    "nW".to_string()
}

fn default_energy_unit() -> String {
    "pJ".to_string()
}

/// `[supplies]`
#[derive(Debug, Default, Deserialize)]
pub struct SuppliesSection {
    /// Primary power; defaults to `VDD` at 1.8 voltage units.
    #[serde(default)]
    pub vdd: NodeSection,
    /// Primary ground; defaults to `VSS` at 0.
    #[serde(default)]
    pub vss: NodeSection,
    /// P-well bias; defaults to `VPW` at the ground voltage.
    #[serde(default)]
    pub pwell: NodeSection,
    /// N-well bias; defaults to `VNW` at the power voltage.
    #[serde(default)]
    pub nwell: NodeSection,
}

/// A supply node entry. Omitted fields take the node's default.
#[derive(Debug, Default, Deserialize)]
pub struct NodeSection {
    /// Node name in the netlist.
    pub name: Option<String>,
    /// Voltage in library voltage units.
    pub voltage: Option<f64>,
}

/// `[thresholds]`
#[derive(Debug, Deserialize)]
pub struct ThresholdsSection {
    /// Lower slew measurement threshold, fraction of the supply.
    #[serde(default = "default_logic_low")]
    pub logic_low: f64,
    /// Upper slew measurement threshold, fraction of the supply.
    #[serde(default = "default_logic_high")]
    pub logic_high: f64,
    /// Delay threshold for falling signals.
    #[serde(default = "default_half")]
    pub high_to_low: f64,
    /// Delay threshold for rising signals.
    #[serde(default = "default_half")]
    pub low_to_high: f64,
    /// Lower energy integration threshold.
    #[serde(default = "default_energy_low")]
    pub energy_low: f64,
    /// Upper energy integration threshold.
    #[serde(default = "default_energy_high")]
    pub energy_high: f64,
    /// Energy integration window, in multiples of the input slew.
    #[serde(default = "default_energy_time_extent")]
    pub energy_time_extent: f64,
}

impl Default for ThresholdsSection {
    fn default() -> Self {
        Self {
            logic_low: default_logic_low(),
            logic_high: default_logic_high(),
            high_to_low: default_half(),
            low_to_high: default_half(),
            energy_low: default_energy_low(),
            energy_high: default_energy_high(),
            energy_time_extent: default_energy_time_extent(),
        }
    }
}

fn default_logic_low() -> f64 {
    0.2
}

fn default_logic_high() -> f64 {
    0.8
}

fn default_half() -> f64 {
    0.5
}

fn default_energy_low() -> f64 {
    0.01
}

fn default_energy_high() -> f64 {
    0.99
}

fn default_energy_time_extent() -> f64 {
    10.0
}

/// `[simulator]`
#[derive(Debug, Deserialize)]
pub struct SimulatorSection {
    /// Path to the simulator; looked up as `ngspice` on `PATH` when omitted.
    pub executable: Option<PathBuf>,
    /// Directory for generated decks.
    #[serde(default = "default_work_dir")]
    pub work_dir: PathBuf,
    /// Worker threads; defaults to the available parallelism.
    pub workers: Option<usize>,
    /// Retry a failed stimulus once with perturbed initial conditions.
    #[serde(default = "default_true")]
    pub retry_on_failure: bool,
    /// Keep generated decks after the run.
    #[serde(default)]
    pub keep_decks: bool,
    /// Time allowed for the circuit to settle before and after an edge,
    /// in library time units. Defaults to 1 ns.
    pub settle_time: Option<f64>,
    /// Observation window after the last edge; defaults to ten settle times.
    pub window: Option<f64>,
    /// Maximum simulator time step.
    pub step: Option<f64>,
    /// Wall-clock limit for one simulator invocation, in seconds.
    pub timeout: Option<f64>,
}

impl Default for SimulatorSection {
    fn default() -> Self {
        Self {
            executable: None,
            work_dir: default_work_dir(),
            workers: None,
            retry_on_failure: true,
            keep_decks: false,
            settle_time: None,
            window: None,
            step: None,
            timeout: None,
        }
    }
}

fn default_work_dir() -> PathBuf {
    PathBuf::from("work")
}

fn default_true() -> bool {
    true
}

/// `[cells.<name>]`
#[derive(Debug, Deserialize)]
pub struct CellSection {
    /// SPICE netlist containing the cell subcircuit.
    pub netlist: PathBuf,
    /// Device model files.
    #[serde(default)]
    pub models: Vec<PathBuf>,
    /// Subcircuit pin order.
    #[serde(default)]
    pub pins: Vec<String>,
    /// Data inputs in declaration order. Clock and async control names
    /// listed here are ignored.
    #[serde(default)]
    pub inputs: Vec<String>,
    /// Outputs in declaration order.
    #[serde(default)]
    pub outputs: Vec<String>,
    /// One `"<output> = <expression>"` per output.
    #[serde(default)]
    pub functions: Vec<String>,
    /// Clock name; prefix with `!` for a falling-edge clock.
    pub clock: Option<String>,
    /// Internal state name, e.g. `IQ`.
    pub state: Option<String>,
    /// Value captured on the active clock edge.
    pub next_state: Option<String>,
    /// Asynchronous set; prefix with `!` when active low.
    pub set: Option<String>,
    /// Asynchronous reset; prefix with `!` when active low.
    pub reset: Option<String>,
    /// Procedures to run.
    #[serde(default)]
    pub procedures: Vec<Procedure>,
    /// Data input transition times, library time units.
    #[serde(default)]
    pub data_slews: Vec<f64>,
    /// Clock transition times, library time units.
    #[serde(default)]
    pub clock_slews: Vec<f64>,
    /// Output loads, library capacitance units.
    #[serde(default)]
    pub loads: Vec<f64>,
    /// Setup search `[lower, upper, resolution]`, library time units.
    pub setup_bounds: Option<[f64; 3]>,
    /// Hold search bounds.
    pub hold_bounds: Option<[f64; 3]>,
    /// Recovery search bounds.
    pub recovery_bounds: Option<[f64; 3]>,
    /// Removal search bounds.
    pub removal_bounds: Option<[f64; 3]>,
    /// Probe budget per constraint search.
    #[serde(default = "default_max_iterations")]
    pub max_iterations: u32,
    /// Output load during constraint searches, library capacitance units.
    #[serde(default = "default_search_load")]
    pub search_load: f64,
}

fn default_max_iterations() -> u32 {
    64
}

fn default_search_load() -> f64 {
    1e-3
}
