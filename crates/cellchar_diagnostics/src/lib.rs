//! Diagnostic creation, severity management, and rendering.
//!
//! Characterization problems that do not abort a run (a stimulus the simulator
//! could not solve, a condition whose constraint search never converged, a
//! delay that shrank as the load grew) are reported as structured
//! [`Diagnostic`]s. Each one carries a code, a severity, and the
//! [`ContextEntry`] list needed to reproduce it (cell, path, variation,
//! condition). The thread-safe [`DiagnosticSink`] collects them from every
//! worker, and [`DiagnosticRenderer`] implementations format them for a
//! terminal or as JSON.

#![warn(missing_docs)]

pub mod code;
pub mod context;
pub mod diagnostic;
pub mod renderer;
pub mod severity;
pub mod sink;

pub use code::{Category, DiagnosticCode};
pub use context::ContextEntry;
pub use diagnostic::Diagnostic;
pub use renderer::{DiagnosticRenderer, JsonRenderer, TerminalRenderer};
pub use severity::Severity;
pub use sink::DiagnosticSink;
