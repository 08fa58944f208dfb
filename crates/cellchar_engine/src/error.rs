//! Errors that abort a characterization run, and the diagnostic codes the
//! engine reports.
//!
//! Everything recoverable (a stimulus that did not simulate, a search that
//! did not converge, a table with holes) is reported through the
//! [`DiagnosticSink`](cellchar_diagnostics::DiagnosticSink) instead and the
//! run continues.

use crate::table::TableError;
use crate::variation::VariationError;
use cellchar_cell::CellError;
use cellchar_diagnostics::{Category, Diagnostic, DiagnosticCode};
use cellchar_sim::SimError;

/// A cell or procedure that cannot be characterized as configured.
pub const CONFIGURATION: DiagnosticCode = DiagnosticCode::new(Category::Configuration, 101);
/// The worker pool could not be started.
pub const WORKER_POOL: DiagnosticCode = DiagnosticCode::new(Category::Configuration, 102);
/// One stimulus failed to simulate.
pub const STIMULUS_FAILED: DiagnosticCode = DiagnosticCode::new(Category::Simulation, 201);
/// Stimuli that succeeded only after a perturbed retry.
pub const STIMULUS_RETRIED: DiagnosticCode = DiagnosticCode::new(Category::Simulation, 203);
/// The simulator itself is unusable.
pub const SIMULATOR_FATAL: DiagnosticCode = DiagnosticCode::new(Category::Simulation, 202);
/// One constraint search ended without a value.
pub const SEARCH_FAILED: DiagnosticCode = DiagnosticCode::new(Category::Search, 301);
/// No condition of a path produced a result.
pub const PATH_FAILED: DiagnosticCode = DiagnosticCode::new(Category::Search, 302);
/// A table has grid points without a value.
pub const GRID_INCOMPLETE: DiagnosticCode = DiagnosticCode::new(Category::Table, 401);
/// A delay or transition shrank as the load grew.
pub const NON_MONOTONIC: DiagnosticCode = DiagnosticCode::new(Category::Table, 402);
/// A procedure has no arc to measure on the cell.
pub const NOTHING_TO_MEASURE: DiagnosticCode = DiagnosticCode::new(Category::Warning, 501);

/// A fatal characterization error.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// The cell description does not support the requested procedure.
    #[error("cell `{cell}`: {source}")]
    Cell {
        /// The cell.
        cell: String,
        /// What is wrong with it.
        #[source]
        source: CellError,
    },

    /// The sweep values cannot be enumerated.
    #[error("cell `{cell}`: {source}")]
    Variation {
        /// The cell.
        cell: String,
        /// The sweep problem.
        #[source]
        source: VariationError,
    },

    /// The sweep values cannot index a table.
    #[error("cell `{cell}`: {source}")]
    Table {
        /// The cell.
        cell: String,
        /// The index problem.
        #[source]
        source: TableError,
    },

    /// The simulator cannot be run at all.
    #[error("simulator unavailable: {0}")]
    Simulator(#[from] SimError),

    /// The worker pool could not be created.
    #[error("cannot start worker pool: {0}")]
    Pool(#[from] rayon::ThreadPoolBuildError),
}

impl EngineError {
    /// The diagnostic code for this error.
    pub fn code(&self) -> DiagnosticCode {
        match self {
            EngineError::Cell { .. }
            | EngineError::Variation { .. }
            | EngineError::Table { .. } => CONFIGURATION,
            EngineError::Simulator(_) => SIMULATOR_FATAL,
            EngineError::Pool(_) => WORKER_POOL,
        }
    }

    /// Converts the error into an error diagnostic.
    pub fn to_diagnostic(&self) -> Diagnostic {
        let diagnostic = Diagnostic::error(self.code(), self.to_string());
        match self {
            EngineError::Cell { cell, .. }
            | EngineError::Variation { cell, .. }
            | EngineError::Table { cell, .. } => diagnostic.with_context("cell", cell.clone()),
            EngineError::Simulator(SimError::NoExecutable) => diagnostic
                .with_help("set `simulator.executable` or put ngspice on the PATH"),
            EngineError::Simulator(_) | EngineError::Pool(_) => diagnostic,
        }
    }
}

/// A note summarizing perturbed retries, if any stimulus was recovered.
pub fn retried(retries: usize, recovered: usize) -> Option<Diagnostic> {
    (recovered > 0).then(|| {
        let message = format!(
            "{recovered} of {retries} retried stimuli succeeded with perturbed initial \
             conditions"
        );
        Diagnostic::note(STIMULUS_RETRIED, message)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use cellchar_config::Axis;

    #[test]
    fn codes_by_kind() {
        let err = EngineError::Variation {
            cell: "AND2".into(),
            source: VariationError::EmptyAxis(Axis::Load),
        };
        assert_eq!(err.code().to_string(), "E101");
        let diagnostic = err.to_diagnostic();
        assert_eq!(diagnostic.context_value("cell"), Some("AND2"));
        assert!(diagnostic.message.contains("load"));

        let err = EngineError::from(SimError::NoExecutable);
        assert_eq!(err.code().to_string(), "S202");
        assert_eq!(err.to_diagnostic().help.len(), 1);
    }

    #[test]
    fn retry_note_only_when_something_recovered() {
        assert!(retried(0, 0).is_none());
        assert!(retried(3, 0).is_none());
        let note = retried(4, 3).unwrap();
        assert_eq!(note.code.to_string(), "S203");
        assert!(!note.severity.is_error());
        assert!(note.message.starts_with("3 of 4 retried stimuli"));
    }
}
