//! Simulation error types.
//!
//! Errors fall into two classes. Local errors concern one stimulus and are
//! recorded against it while sibling work continues; a recoverable subset of
//! them may be retried with perturbed initial conditions. Fatal errors mean a
//! resource every stimulus needs is missing, so the run stops.

use std::io;
use std::path::PathBuf;

/// Errors returned by a [`SimulatorAdapter`](crate::SimulatorAdapter).
#[derive(Debug, thiserror::Error)]
pub enum SimError {
    /// No simulator executable was configured or found.
    #[error("no simulator executable configured")]
    NoExecutable,

    /// The simulator process could not be started.
    #[error("failed to launch `{}`: {source}", executable.display())]
    Launch {
        /// The executable that failed to start.
        executable: PathBuf,
        /// The underlying error.
        source: io::Error,
    },

    /// The work directory or deck could not be written or read.
    #[error("simulation I/O error: {0}")]
    Io(#[from] io::Error),

    /// The transient analysis did not converge.
    #[error("simulation did not converge: {detail}")]
    NonConvergence {
        /// The simulator's complaint.
        detail: String,
    },

    /// The simulator exceeded its wall-clock limit and was killed.
    #[error("simulation timed out after {seconds:.1} s")]
    Timeout {
        /// The limit that was exceeded.
        seconds: f64,
    },

    /// The simulator finished without reporting a requested measurement,
    /// typically because the expected crossing never happened.
    #[error("measurement `{name}` missing from simulator output")]
    MissingMeasurement {
        /// The measurement name.
        name: String,
    },

    /// The simulator exited unsuccessfully for an unrecognized reason.
    #[error("simulator exited with {status}: {detail}")]
    Failed {
        /// Exit status description.
        status: String,
        /// Last line of simulator output.
        detail: String,
    },
}

impl SimError {
    /// Whether the error means no stimulus can be simulated.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            SimError::NoExecutable | SimError::Launch { .. } | SimError::Io(_)
        )
    }

    /// Whether a retry with perturbed initial conditions may succeed.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            SimError::NonConvergence { .. } | SimError::Timeout { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn non_convergence_display() {
        let e = SimError::NonConvergence {
            detail: "timestep too small".into(),
        };
        assert_eq!(
            e.to_string(),
            "simulation did not converge: timestep too small"
        );
        assert!(e.is_recoverable());
        assert!(!e.is_fatal());
    }

    #[test]
    fn timeout_display() {
        let e = SimError::Timeout { seconds: 30.0 };
        assert_eq!(e.to_string(), "simulation timed out after 30.0 s");
        assert!(e.is_recoverable());
    }

    #[test]
    fn launch_is_fatal() {
        let e = SimError::Launch {
            executable: PathBuf::from("/opt/ngspice"),
            source: io::Error::new(io::ErrorKind::NotFound, "not found"),
        };
        assert!(e.to_string().starts_with("failed to launch `/opt/ngspice`"));
        assert!(e.is_fatal());
        assert!(!e.is_recoverable());
    }

    #[test]
    fn missing_measurement_is_local() {
        let e = SimError::MissingMeasurement {
            name: "delay".into(),
        };
        assert!(!e.is_fatal());
        assert!(!e.is_recoverable());
    }
}
