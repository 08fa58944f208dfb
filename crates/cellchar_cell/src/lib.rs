//! The cell model: ports, logic functions, timing arcs, and sensitizing
//! conditions.
//!
//! A [`Cell`] is built once from its description and never changes. Timing
//! arcs ([`Path`]s) and the input assignments that sensitize them
//! ([`Condition`]s) are derived from it on demand by [`enumerate_paths`] and
//! [`conditions`]; both are lazy and deterministic.

#![warn(missing_docs)]

pub mod cell;
pub mod condition;
pub mod error;
pub mod function;
pub mod ids;
pub mod path;
pub mod port;

pub use cell::{
    AsyncAction, AsyncControl, Cell, CellBuilder, NetlistRef, Observer, OutputFunction,
    Sequential, MAX_FUNCTION_INPUTS,
};
pub use condition::{conditions, Condition, Conditions};
pub use error::CellError;
pub use function::{Expr, ParseError};
pub use ids::PortId;
pub use path::{enumerate_paths, Path, PathKind, Transition, EDGES};
pub use port::{Polarity, Port, PortRole};
