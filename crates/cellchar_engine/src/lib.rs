//! The characterization engine.
//!
//! Given a resolved [`CellJob`](cellchar_config::CellJob) and a
//! [`SimulatorAdapter`](cellchar_sim::SimulatorAdapter), the
//! [`Characterizer`] enumerates the cell's timing arcs and their sensitizing
//! conditions, sweeps the configured [`VariationSpace`], and produces one
//! [`CellReport`] per cell:
//!
//! - delay procedures ([`Aggregation`]) measure propagation delay and output
//!   transition for every arc, reducing over conditions;
//! - search procedures bisect setup, hold, recovery and removal times with
//!   [`search()`](search::search), keeping the largest value over conditions;
//! - every result is assembled into a [`LookupTable`] by [`TableBuilder`],
//!   which rejects incomplete grids and flags delays that shrink with load.
//!
//! Simulations run in parallel on a worker pool; see [`run`] for how the
//! results are kept independent of completion order.

#![warn(missing_docs)]

pub mod bench;
pub mod delay;
pub mod error;
pub mod report;
pub mod run;
pub mod search;
pub mod table;
pub mod variation;

pub use bench::{Bench, ConstraintBench, ConstraintKind};
pub use delay::{aggregate, Aggregation, DelaySample};
pub use error::EngineError;
pub use report::{
    CellReport, FailedCondition, Measure, MeasuredTable, PathReport, PathStatus, ProcedureReport,
    Summary,
};
pub use run::{applies, constraint_kinds, Characterizer};
pub use search::{search, Bisection, SearchFailure, SearchReport, SearchState};
pub use table::{LookupTable, MonotonicityViolation, TableAxis, TableBuilder, TableError};
pub use variation::{VariationError, VariationPoint, VariationSpace, Variations};
