use thiserror::Error;

/// Application error types
#[derive(Error, Debug)]
pub enum AppError {
    /// Configuration errors (invalid calendar/policy data)
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Validation errors
    #[error("Validation error: {0}")]
    Validation(String),

    /// Not found errors
    #[error("Not found: {0}")]
    NotFound(String),

    /// Unrecognized condition operator name
    #[error("Unknown operator: {0}")]
    UnknownOperator(String),

    /// Operands cannot be coerced to a common comparable type
    #[error("Type mismatch: {0}")]
    TypeMismatch(String),

    /// Action type not present in the dispatch registry
    #[error("Unsupported action: {0}")]
    UnsupportedAction(String),

    /// Business-time walk exceeded its lookahead bound
    #[error("Out of range: {0}")]
    OutOfRange(String),

    /// Internal errors
    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// Get error code string
    pub fn error_code(&self) -> &str {
        match self {
            AppError::Configuration(_) => "CONFIGURATION_ERROR",
            AppError::Validation(_) => "VALIDATION_ERROR",
            AppError::NotFound(_) => "NOT_FOUND",
            AppError::UnknownOperator(_) => "UNKNOWN_OPERATOR",
            AppError::TypeMismatch(_) => "TYPE_MISMATCH",
            AppError::UnsupportedAction(_) => "UNSUPPORTED_ACTION",
            AppError::OutOfRange(_) => "OUT_OF_RANGE",
            AppError::Internal(_) => "INTERNAL_ERROR",
        }
    }
}

/// Conversion from validator::ValidationErrors
impl From<validator::ValidationErrors> for AppError {
    fn from(err: validator::ValidationErrors) -> Self {
        AppError::Validation(err.to_string())
    }
}

/// Result type alias
pub type Result<T> = std::result::Result<T, AppError>;
