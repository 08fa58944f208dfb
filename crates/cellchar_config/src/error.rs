//! Error types for configuration loading and validation.

/// Errors that can occur when loading or validating a `cellchar.toml` configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// An I/O error occurred while reading the configuration file.
    #[error("failed to read configuration: {0}")]
    IoError(#[from] std::io::Error),

    /// The TOML content could not be parsed.
    #[error("failed to parse configuration: {0}")]
    ParseError(String),

    /// A referenced cell name does not exist in the configuration.
    #[error("unknown cell '{0}'")]
    UnknownCell(String),

    /// One or more values failed validation. Every problem found in the
    /// validation pass is listed.
    #[error("invalid configuration:\n  - {}", .0.join("\n  - "))]
    Invalid(Vec<String>),
}
