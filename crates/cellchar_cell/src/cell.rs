//! The characterized cell: ports, logic functions, storage behavior, and
//! the netlist that implements them.
//!
//! A [`Cell`] is immutable once built. [`CellBuilder`] collects port and
//! function declarations by name and resolves them in one validation pass,
//! so forward references between declarations are allowed.

use crate::error::CellError;
use crate::function::{Expr, ParseError};
use crate::ids::PortId;
use crate::port::{Polarity, Port, PortRole};
use cellchar_common::Logic;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;

/// Functions reading more ports than this are rejected, since their
/// sensitizing conditions are enumerated exhaustively.
pub const MAX_FUNCTION_INPUTS: usize = 16;

/// Where the transistor-level implementation of a cell lives.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetlistRef {
    /// The SPICE file defining the cell's subcircuit.
    pub path: PathBuf,
    /// Device model files included ahead of the netlist.
    pub models: Vec<PathBuf>,
    /// Subcircuit pin order. Empty means port declaration order followed by
    /// the supply nodes.
    pub pins: Vec<String>,
}

/// What an asynchronous control forces the state to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AsyncAction {
    /// Forces the state to `1`.
    Set,
    /// Forces the state to `0`.
    Clear,
}

impl AsyncAction {
    /// The state level the control forces while asserted.
    pub fn forced_level(self) -> Logic {
        match self {
            AsyncAction::Set => Logic::One,
            AsyncAction::Clear => Logic::Zero,
        }
    }
}

/// An asynchronous control port and its action.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AsyncControl {
    /// The control port.
    pub port: PortId,
    /// What it forces.
    pub action: AsyncAction,
}

/// The output through which the state of a sequential cell is observed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Observer {
    /// The observing output.
    pub output: PortId,
    /// `true` when the output carries the complement of the state.
    pub inverted: bool,
}

/// Storage behavior of a sequential cell.
#[derive(Debug, Clone)]
pub struct Sequential {
    /// The sampling clock.
    pub clock: PortId,
    /// The internal state port.
    pub state: PortId,
    /// The value captured on the active clock edge.
    pub next_state: Expr,
    /// Asynchronous controls in declaration order.
    pub async_controls: Vec<AsyncControl>,
    /// The output that makes the state visible to the simulator.
    pub observer: Observer,
}

/// The logic function driving one output.
#[derive(Debug, Clone)]
pub struct OutputFunction {
    /// The driven output.
    pub output: PortId,
    /// Its function over inputs and state.
    pub expr: Expr,
}

/// A standard cell under characterization.
#[derive(Debug, Clone)]
pub struct Cell {
    name: String,
    ports: Vec<Port>,
    functions: Vec<OutputFunction>,
    sequential: Option<Sequential>,
    netlist: NetlistRef,
}

impl Cell {
    /// Starts describing a cell called `name`.
    pub fn builder(name: impl Into<String>) -> CellBuilder {
        CellBuilder::new(name)
    }

    /// The cell name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// All ports in declaration order.
    pub fn ports(&self) -> &[Port] {
        &self.ports
    }

    /// Returns the port with the given ID.
    pub fn port(&self, id: PortId) -> &Port {
        &self.ports[id.index()]
    }

    /// Returns the name of the port with the given ID.
    pub fn port_name(&self, id: PortId) -> &str {
        &self.ports[id.index()].name
    }

    /// Looks a port up by name.
    pub fn find_port(&self, name: &str) -> Option<&Port> {
        self.ports.iter().find(|p| p.name == name)
    }

    /// Ports with the given role, in declaration order.
    pub fn ports_with_role(&self, role: PortRole) -> impl Iterator<Item = &Port> + '_ {
        self.ports.iter().filter(move |p| p.role == role)
    }

    /// Output functions in output declaration order.
    pub fn functions(&self) -> &[OutputFunction] {
        &self.functions
    }

    /// The function driving `output`.
    pub fn function(&self, output: PortId) -> Option<&Expr> {
        self.functions
            .iter()
            .find(|f| f.output == output)
            .map(|f| &f.expr)
    }

    /// Storage behavior, if the cell is sequential.
    pub fn sequential(&self) -> Option<&Sequential> {
        self.sequential.as_ref()
    }

    /// Returns `true` if the cell has a clocked state.
    pub fn is_sequential(&self) -> bool {
        self.sequential.is_some()
    }

    /// The async control declared on `port`.
    pub fn async_control(&self, port: PortId) -> Option<&AsyncControl> {
        self.sequential
            .as_ref()
            .and_then(|s| s.async_controls.iter().find(|a| a.port == port))
    }

    /// The netlist implementing the cell.
    pub fn netlist(&self) -> &NetlistRef {
        &self.netlist
    }
}

/// Collects a cell description and validates it in [`build`](Self::build).
#[derive(Debug, Clone)]
pub struct CellBuilder {
    name: String,
    ports: Vec<(String, PortRole, Polarity)>,
    functions: Vec<(String, String)>,
    next_state: Option<String>,
    async_actions: Vec<(String, AsyncAction)>,
    netlist: NetlistRef,
}

impl CellBuilder {
    /// Creates an empty description for a cell called `name`.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ports: Vec::new(),
            functions: Vec::new(),
            next_state: None,
            async_actions: Vec::new(),
            netlist: NetlistRef::default(),
        }
    }

    /// Sets the netlist reference.
    pub fn netlist(mut self, netlist: NetlistRef) -> Self {
        self.netlist = netlist;
        self
    }

    /// Declares a data input.
    pub fn input(mut self, name: impl Into<String>) -> Self {
        self.ports
            .push((name.into(), PortRole::Input, Polarity::ActiveHigh));
        self
    }

    /// Declares an output driven by `function`.
    pub fn output(mut self, name: impl Into<String>, function: impl Into<String>) -> Self {
        let name = name.into();
        self.functions.push((name.clone(), function.into()));
        self.ports.push((name, PortRole::Output, Polarity::ActiveHigh));
        self
    }

    /// Declares the clock; [`Polarity::ActiveLow`] samples on the falling edge.
    pub fn clock(mut self, name: impl Into<String>, polarity: Polarity) -> Self {
        self.ports.push((name.into(), PortRole::Clock, polarity));
        self
    }

    /// Declares the internal state and the value it captures on the active
    /// clock edge.
    pub fn state(mut self, name: impl Into<String>, next_state: impl Into<String>) -> Self {
        self.ports
            .push((name.into(), PortRole::State, Polarity::ActiveHigh));
        self.next_state = Some(next_state.into());
        self
    }

    /// Declares an asynchronous set or clear.
    pub fn async_control(
        mut self,
        name: impl Into<String>,
        action: AsyncAction,
        polarity: Polarity,
    ) -> Self {
        let name = name.into();
        self.async_actions.push((name.clone(), action));
        self.ports.push((name, PortRole::AsyncControl, polarity));
        self
    }

    /// Resolves and validates the description.
    pub fn build(self) -> Result<Cell, CellError> {
        let cell = self.name;

        let mut by_name: HashMap<&str, PortId> = HashMap::new();
        let mut ports = Vec::with_capacity(self.ports.len());
        for (index, (name, role, polarity)) in self.ports.iter().enumerate() {
            let id = PortId::from_raw(index as u32);
            if by_name.insert(name.as_str(), id).is_some() {
                return Err(CellError::DuplicatePort {
                    cell,
                    port: name.clone(),
                });
            }
            ports.push(Port {
                id,
                name: name.clone(),
                role: *role,
                polarity: *polarity,
            });
        }

        let has_role = |role: PortRole| ports.iter().any(|p| p.role == role);
        if !has_role(PortRole::Input) && !has_role(PortRole::Clock) {
            return Err(CellError::Incomplete {
                cell,
                missing: "input",
            });
        }
        if !has_role(PortRole::Output) {
            return Err(CellError::Incomplete {
                cell,
                missing: "output",
            });
        }

        let parse = |text: &str, context: &str| -> Result<Expr, CellError> {
            let expr = Expr::parse(text, |name| by_name.get(name).copied()).map_err(
                |err| match err {
                    ParseError::Syntax { column, message } => CellError::Parse {
                        text: text.to_string(),
                        column,
                        message,
                    },
                    ParseError::UnknownName(name) => CellError::UnknownPort {
                        cell: cell.clone(),
                        text: text.to_string(),
                        name,
                    },
                },
            )?;
            let support = expr.support();
            for id in &support {
                let port = &ports[id.index()];
                if !matches!(port.role, PortRole::Input | PortRole::State) {
                    return Err(CellError::RoleMisuse {
                        cell: cell.clone(),
                        port: port.name.clone(),
                        role: port.role,
                        context: context.to_string(),
                    });
                }
            }
            if support.len() > MAX_FUNCTION_INPUTS {
                return Err(CellError::TooManyInputs {
                    cell: cell.clone(),
                    count: support.len(),
                    limit: MAX_FUNCTION_INPUTS,
                });
            }
            Ok(expr)
        };

        let mut functions = Vec::new();
        for port in ports.iter().filter(|p| p.role == PortRole::Output) {
            let Some((_, text)) = self.functions.iter().find(|(n, _)| *n == port.name) else {
                return Err(CellError::MissingFunction {
                    cell,
                    output: port.name.clone(),
                });
            };
            let expr = parse(text, &format!("the function of `{}`", port.name))?;
            if expr.support().is_empty() {
                return Err(CellError::Unreachable {
                    cell,
                    output: port.name.clone(),
                });
            }
            functions.push(OutputFunction {
                output: port.id,
                expr,
            });
        }

        let clocks: Vec<PortId> = ports
            .iter()
            .filter(|p| p.role == PortRole::Clock)
            .map(|p| p.id)
            .collect();
        let states: Vec<PortId> = ports
            .iter()
            .filter(|p| p.role == PortRole::State)
            .map(|p| p.id)
            .collect();
        let sequential_error = |message: &str| CellError::Sequential {
            cell: cell.clone(),
            message: message.to_string(),
        };

        let sequential = match (clocks.as_slice(), states.as_slice()) {
            ([], []) => {
                if !self.async_actions.is_empty() {
                    return Err(sequential_error(
                        "asynchronous controls require a clocked state",
                    ));
                }
                None
            }
            ([clock], [state]) => {
                let text = self.next_state.as_deref().unwrap_or_default();
                let next_state = parse(text, "the next-state function")?;
                let observer = functions
                    .iter()
                    .find_map(|f| match f.expr.as_port() {
                        Some((id, inverted)) if id == *state => Some(Observer {
                            output: f.output,
                            inverted,
                        }),
                        _ => None,
                    })
                    .ok_or_else(|| CellError::UnobservedState {
                        cell: cell.clone(),
                        state: ports[state.index()].name.clone(),
                    })?;
                let async_controls = self
                    .async_actions
                    .iter()
                    .map(|(name, action)| AsyncControl {
                        port: by_name[name.as_str()],
                        action: *action,
                    })
                    .collect();
                Some(Sequential {
                    clock: *clock,
                    state: *state,
                    next_state,
                    async_controls,
                    observer,
                })
            }
            ([], [_]) => return Err(sequential_error("a state needs a clock")),
            ([_], []) => return Err(sequential_error("a clock needs a state")),
            _ => {
                return Err(sequential_error(
                    "at most one clock and one state are supported",
                ))
            }
        };

        Ok(Cell {
            name: cell,
            ports,
            functions,
            sequential,
            netlist: self.netlist,
        })
    }
}
