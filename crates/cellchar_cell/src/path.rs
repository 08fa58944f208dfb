//! Timing arcs through a cell.
//!
//! [`enumerate_paths`] walks the cell in a fixed order so that repeated
//! enumeration of an unchanged cell yields identical sequences:
//!
//! 1. combinational arcs, by output then input declaration order;
//! 2. data-to-state arcs of a sequential cell, by input declaration order;
//! 3. the clock-to-state arcs (state rising, then falling);
//! 4. asynchronous control-to-state arcs, by declaration order.
//!
//! Within one input, the input's rising edge comes before its falling edge,
//! and a rising output before a falling one. Arcs the logic cannot produce
//! (an AND gate input rising while its output falls) are left out.

use crate::cell::Cell;
use crate::condition::conditions;
use crate::ids::PortId;
use crate::port::{Polarity, PortRole};
use cellchar_common::Logic;
use serde::{Deserialize, Serialize};
use std::fmt;

/// The direction of a signal change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Transition {
    /// Low to high.
    Rise,
    /// High to low.
    Fall,
    /// No change.
    Steady,
}

/// The two edges, in enumeration order.
pub const EDGES: [Transition; 2] = [Transition::Rise, Transition::Fall];

impl Transition {
    /// The edge that asserts a port of the given polarity.
    pub fn asserting(polarity: Polarity) -> Self {
        match polarity {
            Polarity::ActiveHigh => Transition::Rise,
            Polarity::ActiveLow => Transition::Fall,
        }
    }

    /// The edge that moves a signal to `level`.
    pub fn toward(level: Logic) -> Option<Self> {
        match level {
            Logic::One => Some(Transition::Rise),
            Logic::Zero => Some(Transition::Fall),
            Logic::X => None,
        }
    }

    /// Level before the change, if the transition is an edge.
    pub fn before(self) -> Option<Logic> {
        match self {
            Transition::Rise => Some(Logic::Zero),
            Transition::Fall => Some(Logic::One),
            Transition::Steady => None,
        }
    }

    /// Level after the change, if the transition is an edge.
    pub fn after(self) -> Option<Logic> {
        self.before().map(|l| !l)
    }

    /// Returns `true` for [`Rise`](Transition::Rise) and [`Fall`](Transition::Fall).
    pub fn is_edge(self) -> bool {
        self != Transition::Steady
    }

    /// The opposite edge; `Steady` stays `Steady`.
    pub fn inverted(self) -> Self {
        match self {
            Transition::Rise => Transition::Fall,
            Transition::Fall => Transition::Rise,
            Transition::Steady => Transition::Steady,
        }
    }
}

impl fmt::Display for Transition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Transition::Rise => "rise",
            Transition::Fall => "fall",
            Transition::Steady => "steady",
        };
        f.write_str(s)
    }
}

/// How the arc's input relates to its output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PathKind {
    /// Input to output through a logic function.
    Combinational,
    /// Data input to the state it is captured into.
    Data,
    /// Active clock edge to state.
    Trigger,
    /// Asynchronous control assertion to state.
    Async,
}

/// One timing arc: an input edge and the output change it causes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Path {
    /// How input and output are related.
    pub kind: PathKind,
    /// The switching input (data, clock or async control).
    pub input: PortId,
    /// Its edge.
    pub input_transition: Transition,
    /// The output or state port.
    pub output: PortId,
    /// The resulting change.
    pub output_transition: Transition,
}

impl Path {
    /// Renders the path with port names, e.g. `A rise -> Y rise`.
    pub fn describe(&self, cell: &Cell) -> String {
        format!(
            "{} {} -> {} {}",
            cell.port_name(self.input),
            self.input_transition,
            cell.port_name(self.output),
            self.output_transition
        )
    }
}

/// Enumerates every timing arc of `cell`, lazily and in a stable order.
///
/// The returned iterator can be dropped and recreated at will; each call
/// starts from the beginning.
pub fn enumerate_paths(cell: &Cell) -> impl Iterator<Item = Path> + '_ {
    combinational_paths(cell)
        .chain(data_paths(cell))
        .chain(trigger_paths(cell))
        .chain(async_paths(cell))
}

fn sensitizable(cell: &Cell, path: &Path) -> bool {
    conditions(cell, path).is_ok()
}

fn edge_pairs(
    kind: PathKind,
    input: PortId,
    output: PortId,
) -> impl Iterator<Item = Path> {
    EDGES.into_iter().flat_map(move |input_transition| {
        EDGES.into_iter().map(move |output_transition| Path {
            kind,
            input,
            input_transition,
            output,
            output_transition,
        })
    })
}

fn combinational_paths(cell: &Cell) -> impl Iterator<Item = Path> + '_ {
    let state = cell.sequential().map(|s| s.state);
    cell.functions()
        .iter()
        .filter(move |f| state.map_or(true, |s| !f.expr.references(s)))
        .flat_map(move |f| {
            cell.ports_with_role(PortRole::Input)
                .filter(move |p| f.expr.references(p.id))
                .flat_map(move |p| edge_pairs(PathKind::Combinational, p.id, f.output))
        })
        .filter(move |path| sensitizable(cell, path))
}

fn data_paths(cell: &Cell) -> impl Iterator<Item = Path> + '_ {
    cell.sequential()
        .into_iter()
        .flat_map(move |seq| {
            cell.ports_with_role(PortRole::Input)
                .filter(move |p| seq.next_state.references(p.id))
                .flat_map(move |p| edge_pairs(PathKind::Data, p.id, seq.state))
        })
        .filter(move |path| sensitizable(cell, path))
}

fn trigger_paths(cell: &Cell) -> impl Iterator<Item = Path> + '_ {
    cell.sequential()
        .into_iter()
        .flat_map(move |seq| {
            let edge = Transition::asserting(cell.port(seq.clock).polarity);
            EDGES.into_iter().map(move |output_transition| Path {
                kind: PathKind::Trigger,
                input: seq.clock,
                input_transition: edge,
                output: seq.state,
                output_transition,
            })
        })
        .filter(move |path| sensitizable(cell, path))
}

fn async_paths(cell: &Cell) -> impl Iterator<Item = Path> + '_ {
    cell.sequential().into_iter().flat_map(move |seq| {
        seq.async_controls.iter().filter_map(move |control| {
            Some(Path {
                kind: PathKind::Async,
                input: control.port,
                input_transition: Transition::asserting(cell.port(control.port).polarity),
                output: seq.state,
                output_transition: Transition::toward(control.action.forced_level())?,
            })
        })
    })
}
