//! The simulator boundary for cell characterization.
//!
//! A [`Stimulus`] fully describes one transient simulation: the subcircuit,
//! supplies, piecewise-linear input sources, output loads, and a single
//! [`Probe`]. A [`SimulatorAdapter`] runs it and returns only the reduced
//! [`Outcome`], either a delay/transition [`Measurement`] or whether the
//! expected state was registered. Raw waveforms never cross this boundary.
//!
//! [`NgspiceAdapter`] drives an external simulator in batch mode;
//! [`RetryingAdapter`] wraps any adapter with one perturbed retry of
//! recoverable failures.

#![warn(missing_docs)]

pub mod adapter;
pub mod deck;
pub mod error;
pub mod ngspice;
pub mod retry;
pub mod stimulus;

pub use adapter::{Measurement, Outcome, SimulatorAdapter};
pub use error::SimError;
pub use ngspice::NgspiceAdapter;
pub use retry::RetryingAdapter;
pub use stimulus::{Circuit, Crossing, Edge, Levels, Load, Probe, Source, Stimulus, Supply};
