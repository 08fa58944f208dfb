//! Test benches: turning a path, a condition and a variation point into a
//! simulator [`Stimulus`].
//!
//! Every input, clock and asynchronous control of the cell gets a driver.
//! Ports fixed by the condition sit at that level, the clock and unassigned
//! controls idle at their inactive level, and any other input idles low.
//! Times and loads are converted from library units to SI here; nothing past
//! this module sees library units.
//!
//! Timelines (`settle` is the configured settling time):
//!
//! - combinational: the input edge starts at `settle`;
//! - clock to output: data inputs ramp into their condition levels at
//!   `settle`, the active clock edge starts one settling time after the data
//!   has arrived;
//! - asynchronous control to output: the control asserts at `settle`;
//! - constraints: the clock edge is placed late enough that the moving edge
//!   fits before it at the largest offset searched. Offsets are measured
//!   between the midpoints of the two edges.

use crate::error::EngineError;
use crate::report::Measure;
use crate::variation::{VariationError, VariationPoint};
use cellchar_cell::{
    Cell, CellError, Condition, Path, PathKind, Port, PortId, PortRole, Sequential, Transition,
};
use cellchar_common::{EngineeringUnit, Logic};
use cellchar_config::{Axis, CellJob, ConstraintBounds, SearchBounds, Settings};
use cellchar_sim::{Circuit, Crossing, Edge, Levels, Load, Probe, Source, Stimulus, Supply};

/// A timing constraint between a moving input edge and the clock.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConstraintKind {
    /// Data must arrive this long before the clock.
    Setup,
    /// Data must stay this long after the clock.
    Hold,
    /// An asynchronous control must be released this long before the clock.
    Recovery,
    /// An asynchronous control must stay asserted this long after the clock.
    Removal,
}

impl ConstraintKind {
    /// The table measure.
    pub fn measure(self) -> Measure {
        match self {
            ConstraintKind::Setup => Measure::Setup,
            ConstraintKind::Hold => Measure::Hold,
            ConstraintKind::Recovery => Measure::Recovery,
            ConstraintKind::Removal => Measure::Removal,
        }
    }

    /// The search interval configured for this kind.
    pub fn bounds(self, bounds: &ConstraintBounds) -> SearchBounds {
        match self {
            ConstraintKind::Setup => bounds.setup,
            ConstraintKind::Hold => bounds.hold,
            ConstraintKind::Recovery => bounds.recovery,
            ConstraintKind::Removal => bounds.removal,
        }
    }

    /// The arcs the constraint is measured on.
    pub fn path_kind(self) -> PathKind {
        match self {
            ConstraintKind::Setup | ConstraintKind::Hold => PathKind::Data,
            ConstraintKind::Recovery | ConstraintKind::Removal => PathKind::Async,
        }
    }

    /// Whether the moving edge comes after the clock at positive offsets.
    fn after_clock(self) -> bool {
        matches!(self, ConstraintKind::Hold | ConstraintKind::Removal)
    }
}

/// A constraint bench with the moving edge left open.
#[derive(Debug, Clone)]
pub struct ConstraintBench {
    template: Stimulus,
    moving: usize,
    anchor: f64,
    half_ramp: f64,
    after_clock: bool,
    time: EngineeringUnit,
}

impl ConstraintBench {
    /// The stimulus with the moving edge `offset` (library time units) from
    /// the clock.
    pub fn at(&self, offset: f64) -> Stimulus {
        let mut stimulus = self.template.clone();
        let shift = self.time.to_si(offset);
        let midpoint = if self.after_clock {
            self.anchor + shift
        } else {
            self.anchor - shift
        };
        if let Some(edge) = stimulus.sources[self.moving].edges.first_mut() {
            edge.start = midpoint - self.half_ramp;
        }
        stimulus.title = format!("{} offset={offset}", stimulus.title);
        stimulus
    }
}

/// Builds stimuli for one cell job.
#[derive(Debug, Clone, Copy)]
pub struct Bench<'a> {
    settings: &'a Settings,
    job: &'a CellJob,
}

fn high(level: Logic) -> bool {
    level == Logic::One
}

fn require(point: &VariationPoint, axis: Axis) -> Result<f64, VariationError> {
    point.get(axis).ok_or(VariationError::UnknownAxis(axis))
}

impl<'a> Bench<'a> {
    /// A bench for `job` under `settings`.
    pub fn new(settings: &'a Settings, job: &'a CellJob) -> Self {
        Self { settings, job }
    }

    fn cell(&self) -> &'a Cell {
        &self.job.cell
    }

    fn settle(&self) -> f64 {
        self.settings.simulator.settle_time
    }

    fn window(&self) -> f64 {
        self.settings.simulator.window
    }

    fn seconds(&self, time: f64) -> f64 {
        self.settings.units.time.to_si(time)
    }

    /// Full-rail ramp duration in seconds for a slew in library units.
    fn ramp(&self, slew: f64) -> f64 {
        self.seconds(self.settings.thresholds.full_swing(slew))
    }

    fn load(&self, port: PortId, load: f64) -> Load {
        Load {
            node: self.cell().port_name(port).to_string(),
            farads: self.settings.units.capacitance.to_si(load),
        }
    }

    fn axis(&self, point: &VariationPoint, axis: Axis) -> Result<f64, EngineError> {
        require(point, axis).map_err(|source| EngineError::Variation {
            cell: self.cell().name().to_string(),
            source,
        })
    }

    fn invalid(&self, path: &Path, message: &str) -> EngineError {
        EngineError::Cell {
            cell: self.cell().name().to_string(),
            source: CellError::InvalidPath {
                cell: self.cell().name().to_string(),
                path: path.describe(self.cell()),
                message: message.to_string(),
            },
        }
    }

    fn sequential(&self, path: &Path) -> Result<&'a Sequential, EngineError> {
        self.cell()
            .sequential()
            .ok_or_else(|| self.invalid(path, "the cell has no state"))
    }

    fn circuit(&self) -> Circuit {
        let cell = self.cell();
        let netlist = cell.netlist();
        let pins = if netlist.pins.is_empty() {
            cell.ports()
                .iter()
                .filter(|p| p.role != PortRole::State)
                .map(|p| p.name.clone())
                .chain(self.settings.supplies.nodes().iter().map(|n| n.name.clone()))
                .collect()
        } else {
            netlist.pins.clone()
        };
        Circuit {
            subcircuit: cell.name().to_string(),
            netlist: netlist.path.clone(),
            models: netlist.models.clone(),
            pins,
        }
    }

    fn idle_high(port: &Port, condition: &Condition) -> bool {
        match condition.value(port.id).and_then(Logic::to_bool) {
            Some(level) => level,
            None => match port.role {
                PortRole::Clock | PortRole::AsyncControl => high(port.polarity.inactive_level()),
                _ => false,
            },
        }
    }

    /// Steady drivers for every driven port, in declaration order.
    fn drivers(&self, condition: &Condition) -> Vec<Source> {
        self.cell()
            .ports()
            .iter()
            .filter(|p| {
                matches!(
                    p.role,
                    PortRole::Input | PortRole::Clock | PortRole::AsyncControl
                )
            })
            .map(|p| Source::steady(p.name.clone(), Self::idle_high(p, condition)))
            .collect()
    }

    /// Replaces the driver of `port` with a single edge; returns its index.
    fn drive(&self, sources: &mut [Source], port: PortId, edge: Edge) -> Option<usize> {
        let name = self.cell().port_name(port);
        let index = sources.iter().position(|s| s.node == name)?;
        sources[index] = Source {
            node: name.to_string(),
            initial_high: !edge.rising,
            edges: vec![edge],
        };
        Some(index)
    }

    fn stimulus(
        &self,
        title: String,
        sources: Vec<Source>,
        loads: Vec<Load>,
        initial: Vec<(String, bool)>,
        probe: Probe,
        stop: f64,
    ) -> Stimulus {
        let thresholds = &self.settings.thresholds;
        Stimulus {
            title,
            circuit: self.circuit(),
            supplies: self
                .settings
                .supplies
                .nodes()
                .iter()
                .map(|n| Supply {
                    node: n.name.clone(),
                    volts: n.normalized_voltage(&self.settings.units),
                })
                .collect(),
            sources,
            loads,
            initial,
            levels: Levels {
                delay_rise: thresholds.low_to_high,
                delay_fall: thresholds.high_to_low,
                slew_low: thresholds.logic_low,
                slew_high: thresholds.logic_high,
            },
            probe,
            stop,
            step: self.settings.simulator.step,
            temperature: self.settings.library.temperature,
            perturbed: false,
        }
    }

    fn title(&self, path: &Path, condition: &Condition, point: &VariationPoint) -> String {
        format!(
            "{} {} [{}] {point}",
            self.cell().name(),
            path.describe(self.cell()),
            condition.describe(self.cell())
        )
    }

    /// The observer node and the direction it moves for a state change.
    fn observed(&self, seq: &Sequential, state: Transition) -> (String, bool) {
        let node = self.cell().port_name(seq.observer.output).to_string();
        (node, (state == Transition::Rise) != seq.observer.inverted)
    }

    /// The delay stimulus of a combinational, clock or asynchronous arc.
    pub fn delay(
        &self,
        path: &Path,
        condition: &Condition,
        point: &VariationPoint,
    ) -> Result<Stimulus, EngineError> {
        match path.kind {
            PathKind::Combinational => self.combinational_delay(path, condition, point),
            PathKind::Trigger => self.clock_delay(path, condition, point),
            PathKind::Async => self.async_delay(path, condition, point),
            PathKind::Data => Err(self.invalid(path, "data arcs have no delay")),
        }
    }

    fn combinational_delay(
        &self,
        path: &Path,
        condition: &Condition,
        point: &VariationPoint,
    ) -> Result<Stimulus, EngineError> {
        let ramp = self.ramp(self.axis(point, Axis::DataSlew)?);
        let load = self.axis(point, Axis::Load)?;
        let rising = path.input_transition == Transition::Rise;
        let start = self.settle();

        let mut sources = self.drivers(condition);
        let edge = Edge {
            start,
            duration: ramp,
            rising,
        };
        self.drive(&mut sources, path.input, edge)
            .ok_or_else(|| self.invalid(path, "the input is not driven"))?;

        let probe = Probe::Timing {
            trigger: Crossing {
                node: self.cell().port_name(path.input).to_string(),
                rising,
            },
            target: Crossing {
                node: self.cell().port_name(path.output).to_string(),
                rising: path.output_transition == Transition::Rise,
            },
            after: start / 2.0,
        };
        Ok(self.stimulus(
            self.title(path, condition, point),
            sources,
            vec![self.load(path.output, load)],
            Vec::new(),
            probe,
            start + ramp + self.window(),
        ))
    }

    fn initial_state(
        &self,
        path: &Path,
        seq: &Sequential,
        condition: &Condition,
    ) -> Result<(String, bool), EngineError> {
        let state = condition
            .initial_state
            .and_then(Logic::to_bool)
            .ok_or_else(|| self.invalid(path, "the condition fixes no initial state"))?;
        let node = self.cell().port_name(seq.observer.output).to_string();
        Ok((node, state != seq.observer.inverted))
    }

    fn clock_delay(
        &self,
        path: &Path,
        condition: &Condition,
        point: &VariationPoint,
    ) -> Result<Stimulus, EngineError> {
        let seq = self.sequential(path)?;
        let data_ramp = self.ramp(self.axis(point, Axis::DataSlew)?);
        let clock_ramp = self.ramp(self.axis(point, Axis::ClockSlew)?);
        let load = self.axis(point, Axis::Load)?;
        let settle = self.settle();

        let mut sources = self.drivers(condition);
        for port in seq.next_state.support() {
            let data = self.cell().port(port);
            if data.role != PortRole::Input {
                continue;
            }
            if let Some(level) = condition.value(port).and_then(Logic::to_bool) {
                let edge = Edge {
                    start: settle,
                    duration: data_ramp,
                    rising: level,
                };
                self.drive(&mut sources, port, edge);
            }
        }

        let clock_start = 2.0 * settle + data_ramp;
        let clock_rising = path.input_transition == Transition::Rise;
        let edge = Edge {
            start: clock_start,
            duration: clock_ramp,
            rising: clock_rising,
        };
        self.drive(&mut sources, seq.clock, edge)
            .ok_or_else(|| self.invalid(path, "the clock is not driven"))?;

        let (node, rising) = self.observed(seq, path.output_transition);
        let probe = Probe::Timing {
            trigger: Crossing {
                node: self.cell().port_name(seq.clock).to_string(),
                rising: clock_rising,
            },
            target: Crossing { node, rising },
            after: clock_start,
        };
        Ok(self.stimulus(
            self.title(path, condition, point),
            sources,
            vec![self.load(seq.observer.output, load)],
            vec![self.initial_state(path, seq, condition)?],
            probe,
            clock_start + clock_ramp + self.window(),
        ))
    }

    fn async_delay(
        &self,
        path: &Path,
        condition: &Condition,
        point: &VariationPoint,
    ) -> Result<Stimulus, EngineError> {
        let seq = self.sequential(path)?;
        let ramp = self.ramp(self.axis(point, Axis::DataSlew)?);
        let load = self.axis(point, Axis::Load)?;
        let start = self.settle();
        let rising = path.input_transition == Transition::Rise;

        let mut sources = self.drivers(condition);
        let edge = Edge {
            start,
            duration: ramp,
            rising,
        };
        self.drive(&mut sources, path.input, edge)
            .ok_or_else(|| self.invalid(path, "the control is not driven"))?;

        let (node, target_rising) = self.observed(seq, path.output_transition);
        let probe = Probe::Timing {
            trigger: Crossing {
                node: self.cell().port_name(path.input).to_string(),
                rising,
            },
            target: Crossing {
                node,
                rising: target_rising,
            },
            after: start / 2.0,
        };
        Ok(self.stimulus(
            self.title(path, condition, point),
            sources,
            vec![self.load(seq.observer.output, load)],
            vec![self.initial_state(path, seq, condition)?],
            probe,
            start + ramp + self.window(),
        ))
    }

    /// The constraint bench of `kind` on a data or asynchronous arc.
    ///
    /// Setup and hold move the data input of a data arc: setup switches it
    /// to the captured level before the clock, hold switches it back away
    /// from the captured level after the clock. Recovery and removal move the
    /// release of an asynchronous control: a pass for recovery is the clock
    /// capturing over the released control, a pass for removal is the
    /// control still holding the state through the clock.
    pub fn constraint(
        &self,
        kind: ConstraintKind,
        path: &Path,
        condition: &Condition,
        point: &VariationPoint,
    ) -> Result<ConstraintBench, EngineError> {
        if path.kind != kind.path_kind() {
            return Err(self.invalid(path, "the constraint does not apply to this arc"));
        }
        let seq = self.sequential(path)?;
        let data_ramp = self.ramp(self.axis(point, Axis::DataSlew)?);
        let clock_ramp = self.ramp(self.axis(point, Axis::ClockSlew)?);
        let bounds = kind.bounds(&self.job.bounds);
        let reach = self.seconds(bounds.lower().abs().max(bounds.upper().abs()));
        let settle = self.settle();

        let clock_start = settle + reach + data_ramp;
        let anchor = clock_start + clock_ramp / 2.0;
        let clock_level = self.cell().port(seq.clock).polarity.active_level();

        // The moving edge: which way it goes and the state it should leave.
        let (rising, expected) = match kind {
            ConstraintKind::Setup => (
                path.input_transition == Transition::Rise,
                path.output_transition,
            ),
            ConstraintKind::Hold => (
                path.input_transition != Transition::Rise,
                path.output_transition,
            ),
            ConstraintKind::Recovery => (
                path.input_transition != Transition::Rise,
                path.output_transition.inverted(),
            ),
            ConstraintKind::Removal => (
                path.input_transition != Transition::Rise,
                path.output_transition,
            ),
        };

        let mut sources = self.drivers(condition);
        let edge = Edge {
            start: anchor - data_ramp / 2.0,
            duration: data_ramp,
            rising,
        };
        let moving = self
            .drive(&mut sources, path.input, edge)
            .ok_or_else(|| self.invalid(path, "the input is not driven"))?;
        let clock_edge = Edge {
            start: clock_start,
            duration: clock_ramp,
            rising: high(clock_level),
        };
        self.drive(&mut sources, seq.clock, clock_edge)
            .ok_or_else(|| self.invalid(path, "the clock is not driven"))?;

        let initial = match kind {
            ConstraintKind::Setup | ConstraintKind::Hold => {
                self.initial_state(path, seq, condition)?
            }
            // the control is asserted from time zero
            ConstraintKind::Recovery | ConstraintKind::Removal => {
                self.observed(seq, path.output_transition)
            }
        };
        let (node, expected_high) = self.observed(seq, expected);
        let at = clock_start + clock_ramp + reach + data_ramp + self.window();
        let template = self.stimulus(
            format!(
                "{} {}",
                self.title(path, condition, point),
                kind.measure()
            ),
            sources,
            vec![self.load(seq.observer.output, self.job.search_load)],
            vec![initial],
            Probe::StateCheck {
                node,
                expected_high,
                at,
            },
            at + settle,
        );
        Ok(ConstraintBench {
            template,
            moving,
            anchor,
            half_ramp: data_ramp / 2.0,
            after_clock: kind.after_clock(),
            time: self.settings.units.time,
        })
    }
}
