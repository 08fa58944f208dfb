//! Characterization results.
//!
//! A [`CellReport`] holds, per procedure, one [`PathReport`] per timing arc
//! in enumeration order. All values are in library units. Reports are plain
//! data and serialize to JSON for downstream library writers.

use crate::table::LookupTable;
use cellchar_cell::{PathKind, Transition};
use cellchar_config::Procedure;
use serde::{Deserialize, Serialize};
use std::fmt;

/// The quantity a table holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Measure {
    /// Propagation delay.
    Delay,
    /// Output transition time.
    Transition,
    /// Setup time.
    Setup,
    /// Hold time.
    Hold,
    /// Recovery time.
    Recovery,
    /// Removal time.
    Removal,
}

impl fmt::Display for Measure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Measure::Delay => "delay",
            Measure::Transition => "transition",
            Measure::Setup => "setup",
            Measure::Hold => "hold",
            Measure::Recovery => "recovery",
            Measure::Removal => "removal",
        })
    }
}

/// A table of one measure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MeasuredTable {
    /// What the values are.
    pub measure: Measure,
    /// The grid.
    pub table: LookupTable,
}

/// A single summary value of one measure.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Summary {
    /// What the value is.
    pub measure: Measure,
    /// The value.
    pub value: f64,
}

/// A stimulus (or search) that produced no value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FailedCondition {
    /// The measure the stimulus was for.
    pub measure: Measure,
    /// The sensitizing condition, rendered with port names.
    pub condition: String,
    /// The variation point.
    pub variation: String,
    /// Why it failed.
    pub reason: String,
}

/// How much of a path was characterized.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PathStatus {
    /// Every stimulus succeeded and every table is complete.
    Complete,
    /// Some stimuli failed or a table has holes.
    Degraded,
    /// No stimulus succeeded.
    Failed,
}

impl fmt::Display for PathStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            PathStatus::Complete => "complete",
            PathStatus::Degraded => "degraded",
            PathStatus::Failed => "failed",
        })
    }
}

/// The results for one timing arc under one procedure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PathReport {
    /// The arc, e.g. `A rise -> Y rise`.
    pub path: String,
    /// Arc kind.
    pub kind: PathKind,
    /// Switching input.
    pub input: String,
    /// Its edge.
    pub input_transition: Transition,
    /// Observed output.
    pub output: String,
    /// Its change.
    pub output_transition: Transition,
    /// Complete tables, one per measure.
    pub tables: Vec<MeasuredTable>,
    /// One value per measure summarizing the whole arc.
    pub summary: Vec<Summary>,
    /// Stimuli that produced nothing.
    pub failed_conditions: Vec<FailedCondition>,
    /// Tables that could not be built.
    pub table_errors: Vec<String>,
    /// Overall status.
    pub status: PathStatus,
}

impl PathReport {
    /// The table of `measure`, if it was built.
    pub fn table(&self, measure: Measure) -> Option<&LookupTable> {
        self.tables
            .iter()
            .find(|t| t.measure == measure)
            .map(|t| &t.table)
    }

    /// The summary value of `measure`, if any stimulus produced one.
    pub fn summary(&self, measure: Measure) -> Option<f64> {
        self.summary
            .iter()
            .find(|s| s.measure == measure)
            .map(|s| s.value)
    }
}

/// The results of one procedure on one cell.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcedureReport {
    /// The procedure.
    pub procedure: Procedure,
    /// One report per arc the procedure applies to, in enumeration order.
    pub paths: Vec<PathReport>,
}

/// Everything measured for one cell.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CellReport {
    /// The cell name.
    pub cell: String,
    /// One report per requested procedure, in configuration order.
    pub procedures: Vec<ProcedureReport>,
}

impl CellReport {
    /// The report of `procedure`, if it was requested.
    pub fn procedure(&self, procedure: Procedure) -> Option<&ProcedureReport> {
        self.procedures.iter().find(|p| p.procedure == procedure)
    }

    /// Every path report across procedures.
    pub fn paths(&self) -> impl Iterator<Item = &PathReport> + '_ {
        self.procedures.iter().flat_map(|p| p.paths.iter())
    }

    /// The number of path reports with `status`.
    pub fn count(&self, status: PathStatus) -> usize {
        self.paths().filter(|p| p.status == status).count()
    }
}
