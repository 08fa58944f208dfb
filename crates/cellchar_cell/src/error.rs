//! Errors raised while building or analyzing a cell description.
//!
//! Every variant is a configuration error: the cell description is
//! malformed or internally inconsistent, and characterization of the cell
//! cannot proceed.

/// An error in a cell description or a path derived from it.
#[derive(Debug, thiserror::Error)]
pub enum CellError {
    /// Two ports share a name.
    #[error("cell `{cell}`: port `{port}` is declared more than once")]
    DuplicatePort {
        /// The cell being built.
        cell: String,
        /// The repeated name.
        port: String,
    },

    /// A logic function could not be parsed.
    #[error("cannot parse `{text}` at column {column}: {message}")]
    Parse {
        /// The function text.
        text: String,
        /// 1-based column of the offending character.
        column: usize,
        /// What was expected.
        message: String,
    },

    /// A function references a name that is not a port of the cell.
    #[error("cell `{cell}`: function `{text}` references unknown port `{name}`")]
    UnknownPort {
        /// The cell being built.
        cell: String,
        /// The function text.
        text: String,
        /// The unresolved name.
        name: String,
    },

    /// A function references a port whose role may not appear there.
    #[error("cell `{cell}`: {role} `{port}` cannot appear in {context}")]
    RoleMisuse {
        /// The cell being built.
        cell: String,
        /// The misused port.
        port: String,
        /// Its role.
        role: crate::PortRole,
        /// Which function referenced it.
        context: String,
    },

    /// An output has no logic function.
    #[error("cell `{cell}`: output `{output}` has no function")]
    MissingFunction {
        /// The cell being built.
        cell: String,
        /// The output port.
        output: String,
    },

    /// An output's function depends on no input or state.
    #[error("cell `{cell}`: output `{output}` is not reachable from any input")]
    Unreachable {
        /// The cell being built.
        cell: String,
        /// The output port.
        output: String,
    },

    /// The cell has no input or no output.
    #[error("cell `{cell}`: a cell needs at least one {missing}")]
    Incomplete {
        /// The cell being built.
        cell: String,
        /// `"input"` or `"output"`.
        missing: &'static str,
    },

    /// A sequential cell's state is not driven onto any output.
    #[error("cell `{cell}`: no output observes state `{state}` (expected an output `Q = {state}` or `QN = !{state}`)")]
    UnobservedState {
        /// The cell being built.
        cell: String,
        /// The state port.
        state: String,
    },

    /// Sequential declarations are partially present.
    #[error("cell `{cell}`: {message}")]
    Sequential {
        /// The cell being built.
        cell: String,
        /// What is inconsistent.
        message: String,
    },

    /// A function depends on more inputs than can be enumerated exhaustively.
    #[error("cell `{cell}`: {count} inputs exceed the limit of {limit} for exhaustive condition enumeration")]
    TooManyInputs {
        /// The cell being analyzed.
        cell: String,
        /// Number of side inputs.
        count: usize,
        /// The supported maximum.
        limit: usize,
    },

    /// A path is not shaped correctly for its kind.
    #[error("cell `{cell}`: invalid path {path}: {message}")]
    InvalidPath {
        /// The cell being analyzed.
        cell: String,
        /// The path, rendered with port names.
        path: String,
        /// What is wrong.
        message: String,
    },

    /// No input assignment sensitizes the path.
    #[error("cell `{cell}`: no sensitizing condition exists for path {path}")]
    NoSensitizingCondition {
        /// The cell being analyzed.
        cell: String,
        /// The path, rendered with port names.
        path: String,
    },
}
