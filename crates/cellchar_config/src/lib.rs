//! Parsing and validation of `cellchar.toml` characterization configuration.
//!
//! The file is deserialized into raw section structs, then resolved in one
//! pass into an immutable [`CharConfig`]: units parsed, supplies and
//! thresholds checked, the simulator located, and every cell description
//! built into a [`Cell`](cellchar_cell::Cell). All problems found are
//! reported together.

#![warn(missing_docs)]

pub mod error;
pub mod loader;
pub mod procedure;
pub mod resolve;
pub mod settings;
pub mod types;

pub use error::ConfigError;
pub use loader::{load_config, load_config_from_str, CONFIG_FILE};
pub use procedure::{Axis, Procedure, ALL_PROCEDURES};
pub use resolve::{resolve, DEFAULT_SIMULATOR};
pub use settings::{
    BoundsError, CellJob, CharConfig, ConstraintBounds, LibrarySettings, NamedNode,
    SearchBounds, Settings, SimulatorSettings, Supplies, Sweeps, Thresholds,
};
pub use types::RawConfig;
