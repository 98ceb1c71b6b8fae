//! Error types for Haulboard operations

use thiserror::Error;

/// SQLSTATE raised by Postgres for an unknown column.
pub const SQLSTATE_UNDEFINED_COLUMN: &str = "42703";

/// PostgREST code for a column missing from its schema cache.
pub const POSTGREST_UNKNOWN_COLUMN: &str = "PGRST204";

/// Backend (hosted database service) errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum BackendError {
    #[error("Request to {operation} failed: {reason}")]
    Request { operation: String, reason: String },

    #[error("Backend returned status {status} for {operation}: {message}")]
    Status {
        operation: String,
        status: u16,
        code: Option<String>,
        message: String,
    },

    #[error("Could not decode {operation} payload: {reason}")]
    Decode { operation: String, reason: String },

    #[error("Invalid identifier: {name}")]
    InvalidIdentifier { name: String },

    #[error("Backend capability unavailable: {capability}")]
    Unavailable { capability: String },
}

impl BackendError {
    /// Error code reported by the backend, if any.
    pub fn code(&self) -> Option<&str> {
        match self {
            Self::Status { code, .. } => code.as_deref(),
            _ => None,
        }
    }

    /// Whether this error says a referenced column does not exist.
    pub fn is_missing_column(&self) -> bool {
        match self {
            Self::Status { code, message, .. } => {
                matches!(
                    code.as_deref(),
                    Some(SQLSTATE_UNDEFINED_COLUMN) | Some(POSTGREST_UNKNOWN_COLUMN)
                ) || (message.contains("column") && message.contains("does not exist"))
            }
            _ => false,
        }
    }
}

/// Schema probing errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SchemaError {
    #[error("Column probe failed for table {table}: {reason}")]
    ProbeFailed { table: String, reason: String },

    #[error("Schema verification unavailable for table {table} after {attempts} attempts")]
    VerificationUnavailable { table: String, attempts: u32 },
}

/// Validation errors on caller-supplied records.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Required field missing: {field}")]
    RequiredFieldMissing { field: String },

    #[error("Login already exists: {login}")]
    DuplicateLogin { login: String },

    #[error("Invalid value for {field}: {reason}")]
    InvalidValue { field: String, reason: String },

    #[error("No {entity} row returned for id {id}")]
    RowMissing { entity: String, id: i64 },
}

/// Configuration errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Missing required configuration field: {field}")]
    MissingRequired { field: String },

    #[error("Invalid value for {field}: {value} - {reason}")]
    InvalidValue {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Failed to read config file {path}: {reason}")]
    Io { path: String, reason: String },

    #[error("Failed to parse config: {reason}")]
    Parse { reason: String },
}

/// Master error type for all Haulboard errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum HaulError {
    #[error("Backend error: {0}")]
    Backend(#[from] BackendError),

    #[error("Schema error: {0}")]
    Schema(#[from] SchemaError),

    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("Config error: {0}")]
    Config(#[from] ConfigError),
}

impl HaulError {
    /// Shorthand for a payload that did not match the expected shape.
    pub fn decode(operation: impl Into<String>, reason: impl std::fmt::Display) -> Self {
        Self::Backend(BackendError::Decode {
            operation: operation.into(),
            reason: reason.to_string(),
        })
    }

    /// Whether the underlying backend error reports a missing column.
    pub fn is_missing_column(&self) -> bool {
        matches!(self, Self::Backend(err) if err.is_missing_column())
    }
}

/// Result type alias for Haulboard operations.
pub type HaulResult<T> = Result<T, HaulError>;

// =============================================================================
// TESTS
// =============================================================================
