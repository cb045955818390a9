use thiserror::Error;

/// Process-level error: a message plus the exit code the binary returns.
#[derive(Clone)]
pub struct AppError {
    exit_code: u8,
    message: String,
}

impl AppError {
    pub fn new(exit_code: u8, message: impl Into<String>) -> Self {
        Self {
            exit_code,
            message: message.into(),
        }
    }

    pub fn exit_code(&self) -> u8 {
        self.exit_code
    }
}

impl std::fmt::Display for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::fmt::Debug for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppError")
            .field("exit_code", &self.exit_code)
            .field("message", &self.message)
            .finish()
    }
}

impl std::error::Error for AppError {}

/// Failure surface of the inversion engine.
///
/// Every entry point returns one of these instead of a physical result. None of
/// them is fatal: callers skip the affected product for the current cycle.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InversionError {
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("invalid grid: {0}")]
    InvalidGrid(String),
    #[error("insufficient data to invert: {used} usable sites < {required} required")]
    InsufficientData { used: usize, required: usize },
    #[error("not implemented: {0}")]
    NotImplemented(&'static str),
    #[error("least-squares failure: {0}")]
    Solver(String),
    #[error("grid search failed at {failed} of {total} points")]
    GridSearch { failed: usize, total: usize },
}

impl InversionError {
    /// Exit code used when the error reaches the binary.
    pub fn exit_code(&self) -> u8 {
        match self {
            Self::InvalidInput(_) | Self::InvalidGrid(_) => 2,
            Self::InsufficientData { .. } => 3,
            Self::Solver(_) | Self::GridSearch { .. } => 4,
            Self::NotImplemented(_) => 5,
        }
    }
}

impl From<InversionError> for AppError {
    fn from(err: InversionError) -> Self {
        AppError::new(err.exit_code(), err.to_string())
    }
}

pub type InversionResult<T> = Result<T, InversionError>;
