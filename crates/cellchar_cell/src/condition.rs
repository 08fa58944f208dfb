//! Sensitizing conditions: side-input assignments that make a path
//! observable.
//!
//! Side inputs are enumerated exhaustively in binary counting order (the
//! first side input in declaration order is the most significant bit) and
//! filtered lazily, so the sequence is a pure function of the cell and the
//! path. Inputs the function does not read are left out of the assignment.
//!
//! For sequential paths the condition also fixes the state the cell holds
//! before the stimulus, and holds every asynchronous control not on the path
//! at its inactive level.

use crate::cell::{Cell, Sequential};
use crate::error::CellError;
use crate::function::Expr;
use crate::ids::PortId;
use crate::path::{Path, PathKind, Transition};
use crate::port::PortRole;
use cellchar_common::Logic;

/// One assignment of fixed levels to the side inputs of a path.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Condition {
    /// Fixed levels, sorted by port declaration order.
    pub assignments: Vec<(PortId, Logic)>,
    /// The state held before the stimulus, for sequential paths.
    pub initial_state: Option<Logic>,
}

impl Condition {
    /// The level assigned to `port`, if any.
    pub fn value(&self, port: PortId) -> Option<Logic> {
        self.assignments
            .iter()
            .find(|(id, _)| *id == port)
            .map(|(_, level)| *level)
    }

    /// Renders the condition with port names, e.g. `B=1, RN=1, IQ=0`.
    pub fn describe(&self, cell: &Cell) -> String {
        let mut parts: Vec<String> = self
            .assignments
            .iter()
            .map(|(id, level)| format!("{}={level}", cell.port_name(*id)))
            .collect();
        if let (Some(level), Some(seq)) = (self.initial_state, cell.sequential()) {
            parts.push(format!("{}={level}", cell.port_name(seq.state)));
        }
        if parts.is_empty() {
            "(none)".to_string()
        } else {
            parts.join(", ")
        }
    }
}

/// Lazily yields the sensitizing conditions of one path.
#[derive(Debug, Clone)]
pub struct Conditions<'c> {
    path: Path,
    target: &'c Expr,
    state: Option<PortId>,
    side: Vec<PortId>,
    fixed: Vec<(PortId, Logic)>,
    port_count: usize,
    next: u64,
    end: u64,
}

/// Returns the sensitizing conditions of `path` through `cell`.
///
/// Fails if the path does not fit the cell (wrong port roles or edges), or
/// if no assignment sensitizes it: an empty condition set means the cell
/// description is inconsistent.
pub fn conditions<'c>(cell: &'c Cell, path: &Path) -> Result<Conditions<'c>, CellError> {
    let invalid = |message: &str| CellError::InvalidPath {
        cell: cell.name().to_string(),
        path: path.describe(cell),
        message: message.to_string(),
    };

    if !path.input_transition.is_edge() {
        return Err(invalid("the input must switch"));
    }
    let input = cell.port(path.input);
    let output = cell.port(path.output);

    let (target, state, side, fixed) = match path.kind {
        PathKind::Combinational => {
            if input.role != PortRole::Input || output.role != PortRole::Output {
                return Err(invalid("expected an input and an output"));
            }
            let expr = cell
                .function(path.output)
                .ok_or_else(|| invalid("the output has no function"))?;
            if cell.sequential().is_some_and(|s| expr.references(s.state)) {
                return Err(invalid("the output depends on the state"));
            }
            let side = side_inputs(expr, Some(path.input), None);
            (expr, None, side, Vec::new())
        }
        kind => {
            let seq = cell
                .sequential()
                .ok_or_else(|| invalid("the cell has no state"))?;
            if path.output != seq.state {
                return Err(invalid("the path must end at the state"));
            }
            if !path.output_transition.is_edge() {
                return Err(invalid("the state must switch"));
            }
            match kind {
                PathKind::Data if input.role != PortRole::Input => {
                    return Err(invalid("expected a data input"));
                }
                PathKind::Trigger
                    if path.input != seq.clock
                        || path.input_transition != Transition::asserting(input.polarity) =>
                {
                    return Err(invalid("expected the active clock edge"));
                }
                PathKind::Async => {
                    let control = cell
                        .async_control(path.input)
                        .ok_or_else(|| invalid("expected an asynchronous control"))?;
                    if path.input_transition != Transition::asserting(input.polarity) {
                        return Err(invalid("expected the asserting edge"));
                    }
                    if Transition::toward(control.action.forced_level())
                        != Some(path.output_transition)
                    {
                        return Err(invalid("the state must move to the forced level"));
                    }
                }
                _ => {}
            }
            let data = (kind == PathKind::Data).then_some(path.input);
            let side = side_inputs(&seq.next_state, data, Some(seq.state));
            let skip = (kind == PathKind::Async).then_some(path.input);
            (
                &seq.next_state,
                Some(seq.state),
                side,
                inactive_controls(cell, seq, skip),
            )
        }
    };

    let found = Conditions {
        path: *path,
        target,
        state,
        end: 1u64 << side.len(),
        side,
        fixed,
        port_count: cell.ports().len(),
        next: 0,
    };

    if found.clone().next().is_none() {
        return Err(CellError::NoSensitizingCondition {
            cell: cell.name().to_string(),
            path: path.describe(cell),
        });
    }
    Ok(found)
}

fn side_inputs(expr: &Expr, switching: Option<PortId>, state: Option<PortId>) -> Vec<PortId> {
    expr.support()
        .into_iter()
        .filter(|id| Some(*id) != switching && Some(*id) != state)
        .collect()
}

fn inactive_controls(
    cell: &Cell,
    seq: &Sequential,
    skip: Option<PortId>,
) -> Vec<(PortId, Logic)> {
    seq.async_controls
        .iter()
        .filter(|c| Some(c.port) != skip)
        .map(|c| (c.port, cell.port(c.port).polarity.inactive_level()))
        .collect()
}

impl Conditions<'_> {
    fn candidate(&self, index: u64) -> Option<Condition> {
        let mut levels = vec![Logic::X; self.port_count];
        let width = self.side.len();
        for (bit, id) in self.side.iter().enumerate() {
            let set = (index >> (width - 1 - bit)) & 1 == 1;
            levels[id.index()] = Logic::from(set);
        }

        let eval = |levels: &[Logic]| self.target.eval(&|id: PortId| levels[id.index()]);

        let before = self.path.output_transition.before();
        let after = self.path.output_transition.after();
        let initial_state = match self.path.kind {
            PathKind::Combinational => {
                let input = self.path.input;
                levels[input.index()] = self.path.input_transition.before()?;
                let was = eval(&levels);
                levels[input.index()] = self.path.input_transition.after()?;
                let now = eval(&levels);
                let sensitized = match (before, after) {
                    (Some(b), Some(a)) => was == b && now == a,
                    _ => was == now && was.is_known(),
                };
                if !sensitized {
                    return None;
                }
                None
            }
            PathKind::Data => {
                let (s0, s1) = (before?, after?);
                let state = self.state?;
                levels[state.index()] = s0;
                levels[self.path.input.index()] = self.path.input_transition.before()?;
                let held = eval(&levels);
                levels[self.path.input.index()] = self.path.input_transition.after()?;
                let captured = eval(&levels);
                if held != s0 || captured != s1 {
                    return None;
                }
                Some(s0)
            }
            PathKind::Trigger => {
                let (s0, s1) = (before?, after?);
                levels[self.state?.index()] = s0;
                if eval(&levels) != s1 {
                    return None;
                }
                Some(s0)
            }
            PathKind::Async => {
                // the clock must be able to move the state off the forced level
                let forced = after?;
                levels[self.state?.index()] = forced;
                if eval(&levels) != !forced {
                    return None;
                }
                Some(!forced)
            }
        };

        let mut assignments: Vec<(PortId, Logic)> = self
            .side
            .iter()
            .map(|id| (*id, levels[id.index()]))
            .chain(self.fixed.iter().copied())
            .collect();
        assignments.sort_by_key(|(id, _)| *id);
        Some(Condition {
            assignments,
            initial_state,
        })
    }
}

impl Iterator for Conditions<'_> {
    type Item = Condition;

    fn next(&mut self) -> Option<Condition> {
        while self.next < self.end {
            let index = self.next;
            self.next += 1;
            if let Some(condition) = self.candidate(index) {
                return Some(condition);
            }
        }
        None
    }
}
