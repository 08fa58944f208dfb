//! Port definitions for cell interfaces.
//!
//! A [`Port`] is one named terminal of a cell, tagged with the role it plays
//! during characterization and the polarity of its active level or edge.

use crate::ids::PortId;
use cellchar_common::Logic;
use serde::{Deserialize, Serialize};
use std::fmt;

/// The role a port plays in the cell's behavior.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PortRole {
    /// A data input.
    Input,
    /// A primary output driven by a logic function.
    Output,
    /// The edge that samples the next state.
    Clock,
    /// An asynchronous set or clear.
    AsyncControl,
    /// The internal storage node of a sequential cell.
    State,
}

impl fmt::Display for PortRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PortRole::Input => "input",
            PortRole::Output => "output",
            PortRole::Clock => "clock",
            PortRole::AsyncControl => "async control",
            PortRole::State => "state",
        };
        f.write_str(name)
    }
}

/// Whether a port is active on its high level (rising edge) or low level
/// (falling edge).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Polarity {
    /// Active high; a clock with this polarity triggers on its rising edge.
    #[default]
    ActiveHigh,
    /// Active low; a clock with this polarity triggers on its falling edge.
    ActiveLow,
}

impl Polarity {
    /// The level at which the port is asserted.
    pub fn active_level(self) -> Logic {
        match self {
            Polarity::ActiveHigh => Logic::One,
            Polarity::ActiveLow => Logic::Zero,
        }
    }

    /// The level at which the port is idle.
    pub fn inactive_level(self) -> Logic {
        !self.active_level()
    }
}

/// A port in a cell's interface.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Port {
    /// The unique ID of this port; also its declaration position.
    pub id: PortId,
    /// The port name as it appears in the netlist.
    pub name: String,
    /// The characterization role of the port.
    pub role: PortRole,
    /// Active level or triggering edge.
    pub polarity: Polarity,
}
