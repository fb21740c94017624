use thiserror::Error;

/// Failure of a single computer action.
///
/// Every variant is reported back to the conversation as a failed tool
/// result; none of them is retried.
#[derive(Debug, Error)]
pub enum ComputerError {
    /// Malformed or contradictory action request.
    #[error("{0}")]
    InvalidArgument(String),

    /// The automation backend has no way to perform the action.
    #[error("Action {0} is not supported by cliclick on macOS")]
    UnsupportedAction(String),

    #[error("Coordinates {x}, {y} are out of bounds for a {width}x{height} display")]
    OutOfBounds {
        x: u32,
        y: u32,
        width: u32,
        height: u32,
    },

    /// Backend output that could not be understood.
    #[error("Failed to parse {what}: {raw:?}")]
    ParseError { what: &'static str, raw: String },

    #[error("Failed to execute {program}: {source}")]
    ExecutionError {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to take screenshot: {0}")]
    CaptureError(String),
}

impl ComputerError {
    pub fn invalid(msg: impl Into<String>) -> Self {
        Self::InvalidArgument(msg.into())
    }

    /// Short machine-friendly name of the error kind, used in logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::InvalidArgument(_) => "invalid_argument",
            Self::UnsupportedAction(_) => "unsupported_action",
            Self::OutOfBounds { .. } => "out_of_bounds",
            Self::ParseError { .. } => "parse_error",
            Self::ExecutionError { .. } => "execution_error",
            Self::CaptureError(_) => "capture_error",
        }
    }
}

pub type ComputerResult<T> = Result<T, ComputerError>;
