//! Shared foundational types used across the cellchar workspace.
//!
//! This crate provides engineering units with SI prefixes, three-state logic
//! values for evaluating cell functions, and content hashing for simulation decks.

#![warn(missing_docs)]

pub mod hash;
pub mod logic;
pub mod units;

pub use hash::ContentHash;
pub use logic::Logic;
pub use units::{EngineeringUnit, ParseUnitError, Prefix, Quantity, UnitSystem};
