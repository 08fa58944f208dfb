//! The fixed set of characterization procedures and the sweep axes they request.

use serde::{Deserialize, Serialize};
use std::fmt;

/// An independent sweep parameter.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Axis {
    /// Transition time of the switching data (or async control) input.
    DataSlew,
    /// Transition time of the clock.
    ClockSlew,
    /// Capacitive load on the observed output.
    Load,
}

impl Axis {
    /// The configuration key listing this axis' values.
    pub fn key(self) -> &'static str {
        match self {
            Axis::DataSlew => "data_slews",
            Axis::ClockSlew => "clock_slews",
            Axis::Load => "loads",
        }
    }
}

impl fmt::Display for Axis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Axis::DataSlew => "data_slew",
            Axis::ClockSlew => "clock_slew",
            Axis::Load => "load",
        };
        f.write_str(name)
    }
}

/// A characterization procedure selectable per cell.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Procedure {
    /// Delay and transition tables, worst case over sensitizing conditions.
    WorstCase,
    /// Delay and transition tables, arithmetic mean over sensitizing conditions.
    Average,
    /// Setup and hold tables found by bisection.
    BinarySearchConstraint,
    /// Recovery tables for asynchronous controls, found by bisection.
    RecoverySearch,
    /// Removal tables for asynchronous controls, found by bisection.
    RemovalSearch,
}

/// Every procedure, in display order.
pub const ALL_PROCEDURES: [Procedure; 5] = [
    Procedure::WorstCase,
    Procedure::Average,
    Procedure::BinarySearchConstraint,
    Procedure::RecoverySearch,
    Procedure::RemovalSearch,
];

impl Procedure {
    /// The name used in configuration files.
    pub fn name(self) -> &'static str {
        match self {
            Procedure::WorstCase => "worst-case",
            Procedure::Average => "average",
            Procedure::BinarySearchConstraint => "binary-search-constraint",
            Procedure::RecoverySearch => "recovery-search",
            Procedure::RemovalSearch => "removal-search",
        }
    }

    /// Returns `true` for procedures that bisect a constraint.
    pub fn is_search(self) -> bool {
        matches!(
            self,
            Procedure::BinarySearchConstraint
                | Procedure::RecoverySearch
                | Procedure::RemovalSearch
        )
    }

    /// The axes swept by this procedure, in table index order.
    pub fn axes(self, sequential: bool) -> &'static [Axis] {
        match self {
            Procedure::WorstCase | Procedure::Average if sequential => {
                &[Axis::DataSlew, Axis::Load, Axis::ClockSlew]
            }
            Procedure::WorstCase | Procedure::Average => &[Axis::DataSlew, Axis::Load],
            _ => &[Axis::DataSlew, Axis::ClockSlew],
        }
    }
}

impl fmt::Display for Procedure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
