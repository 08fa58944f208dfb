//! A fully specified simulation request.
//!
//! Everything is in SI units (seconds, volts, farads). Node names refer to
//! the nets of the test bench, which share their names with the cell pins.

use std::path::PathBuf;

/// One ramp of a piecewise-linear source.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Edge {
    /// When the ramp starts.
    pub start: f64,
    /// Full-rail ramp duration.
    pub duration: f64,
    /// Direction of the ramp.
    pub rising: bool,
}

impl Edge {
    /// When the ramp crosses mid-rail.
    pub fn midpoint(&self) -> f64 {
        self.start + self.duration / 2.0
    }

    /// When the ramp reaches its final level.
    pub fn end(&self) -> f64 {
        self.start + self.duration
    }
}

/// A voltage source driving one input node between the supply rails.
#[derive(Debug, Clone, PartialEq)]
pub struct Source {
    /// The driven node.
    pub node: String,
    /// Level at time zero.
    pub initial_high: bool,
    /// Ramps in time order. Each one toggles the level.
    pub edges: Vec<Edge>,
}

impl Source {
    /// A source held at one level for the whole run.
    pub fn steady(node: impl Into<String>, high: bool) -> Self {
        Self {
            node: node.into(),
            initial_high: high,
            edges: Vec::new(),
        }
    }

    /// The piecewise-linear breakpoints `(time, high)` of this source.
    pub fn breakpoints(&self) -> Vec<(f64, bool)> {
        let mut points = vec![(0.0, self.initial_high)];
        let mut level = self.initial_high;
        for edge in &self.edges {
            points.push((edge.start, level));
            level = edge.rising;
            points.push((edge.end(), level));
        }
        points
    }

    /// The level after the last edge.
    pub fn final_high(&self) -> bool {
        self.edges.last().map_or(self.initial_high, |e| e.rising)
    }
}

/// A DC supply node.
#[derive(Debug, Clone, PartialEq)]
pub struct Supply {
    /// Node name.
    pub node: String,
    /// Voltage.
    pub volts: f64,
}

/// A capacitive load on an output node.
#[derive(Debug, Clone, PartialEq)]
pub struct Load {
    /// The loaded node.
    pub node: String,
    /// Capacitance.
    pub farads: f64,
}

/// The subcircuit under test and how to instantiate it.
#[derive(Debug, Clone, PartialEq)]
pub struct Circuit {
    /// Subcircuit name.
    pub subcircuit: String,
    /// File defining the subcircuit.
    pub netlist: PathBuf,
    /// Model files included ahead of the netlist.
    pub models: Vec<PathBuf>,
    /// Nodes connected to the subcircuit pins, in pin order.
    pub pins: Vec<String>,
}

/// Threshold levels as fractions of the supply swing.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Levels {
    /// Delay threshold for rising signals.
    pub delay_rise: f64,
    /// Delay threshold for falling signals.
    pub delay_fall: f64,
    /// Lower transition threshold.
    pub slew_low: f64,
    /// Upper transition threshold.
    pub slew_high: f64,
}

impl Levels {
    /// The delay threshold for a signal moving in the given direction.
    pub fn delay(&self, rising: bool) -> f64 {
        if rising {
            self.delay_rise
        } else {
            self.delay_fall
        }
    }
}

/// A threshold crossing on one node.
#[derive(Debug, Clone, PartialEq)]
pub struct Crossing {
    /// The node.
    pub node: String,
    /// Direction of the crossing.
    pub rising: bool,
}

/// What the simulator is asked to report.
#[derive(Debug, Clone, PartialEq)]
pub enum Probe {
    /// Propagation delay from `trigger` to `target`, and the transition
    /// time of `target`. Crossings before `after` are ignored.
    Timing {
        /// The input crossing starting the measurement.
        trigger: Crossing,
        /// The output crossing ending it.
        target: Crossing,
        /// Start of the measurement window.
        after: f64,
    },
    /// Whether `node` is at the `expected_high` level at time `at`.
    StateCheck {
        /// The observed node.
        node: String,
        /// The level that counts as registered.
        expected_high: bool,
        /// Sampling time.
        at: f64,
    },
}

/// A complete, self-describing simulation request.
#[derive(Debug, Clone, PartialEq)]
pub struct Stimulus {
    /// Short human-readable label, written into the deck title.
    pub title: String,
    /// The device under test.
    pub circuit: Circuit,
    /// DC supplies. The first is the high rail, the second the low rail.
    pub supplies: Vec<Supply>,
    /// Input drivers.
    pub sources: Vec<Source>,
    /// Output loads.
    pub loads: Vec<Load>,
    /// Nodes pinned to a level at time zero, e.g. a storage output.
    pub initial: Vec<(String, bool)>,
    /// Measurement thresholds.
    pub levels: Levels,
    /// The measurement requested.
    pub probe: Probe,
    /// End of the transient run.
    pub stop: f64,
    /// Maximum time step.
    pub step: Option<f64>,
    /// Temperature in degrees Celsius.
    pub temperature: f64,
    /// Skip the operating point and pin every driven node instead. Set by a
    /// retry after a convergence failure.
    pub perturbed: bool,
}

impl Stimulus {
    /// The high rail voltage.
    pub fn vdd(&self) -> f64 {
        self.supplies.first().map_or(0.0, |s| s.volts)
    }

    /// The low rail voltage.
    pub fn vss(&self) -> f64 {
        self.supplies.get(1).map_or(0.0, |s| s.volts)
    }

    /// The voltage at `fraction` of the way from the low to the high rail.
    pub fn level(&self, fraction: f64) -> f64 {
        self.vss() + fraction * (self.vdd() - self.vss())
    }

    /// The same stimulus marked for a perturbed retry.
    pub fn perturbed(&self) -> Self {
        Self {
            perturbed: true,
            ..self.clone()
        }
    }
}
