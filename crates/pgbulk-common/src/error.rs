//! Error types for pgbulk

use thiserror::Error;

/// Result type alias for pgbulk operations
pub type Result<T> = std::result::Result<T, BulkError>;

/// Unified error type for all bulk write operations
#[derive(Error, Debug, Clone)]
pub enum BulkError {
    /// Invalid call: unknown field, missing primary key, no dialect installed.
    /// Raised before any statement is built.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// A value could not be converted to its column's storage representation
    #[error("Encoding error: {0}")]
    Encoding(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Query error: {0}")]
    Query(String),

    #[error("Internal error: {0}")]
    Internal(String),

    // Backend-reported errors, classified by SQLSTATE

    /// Unique/exclusion violation, conflict target without a matching
    /// constraint, or a row hit twice by one ON CONFLICT DO UPDATE
    /// (SQLSTATE 23505, 23P01, 42P10, 21000)
    #[error("Constraint violation: {0}")]
    ConstraintViolation(String),

    /// Foreign key constraint violation (SQLSTATE 23503)
    #[error("Foreign key constraint violation: {0}")]
    ForeignKey(String),

    /// Not-null or check constraint violation (SQLSTATE 23502, 23514)
    #[error("Check constraint violation: {0}")]
    CheckViolation(String),

    /// Deadlock detected (SQLSTATE 40P01) - retryable
    #[error("Deadlock detected: {0}")]
    Deadlock(String),

    /// Serialization failure or other transaction rollback (class 40) - retryable
    #[error("Serialization failure: {0}")]
    SerializationFailure(String),

    /// Connection pool timeout - retryable
    #[error("Timeout: {0}")]
    Timeout(String),
}

impl BulkError {
    /// Returns true if the caller may retry the whole statement.
    ///
    /// The engine itself never retries.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            BulkError::Deadlock(_)
                | BulkError::SerializationFailure(_)
                | BulkError::Timeout(_)
        )
    }

    /// Returns true if this is a constraint violation error
    pub fn is_constraint_violation(&self) -> bool {
        matches!(
            self,
            BulkError::ConstraintViolation(_)
                | BulkError::ForeignKey(_)
                | BulkError::CheckViolation(_)
        )
    }

    /// Returns true if the error was raised before a statement reached the backend.
    pub fn is_configuration(&self) -> bool {
        matches!(self, BulkError::Configuration(_) | BulkError::Encoding(_))
    }
}

impl From<serde_json::Error> for BulkError {
    fn from(err: serde_json::Error) -> Self {
        BulkError::Encoding(err.to_string())
    }
}

/// Classifies a PostgreSQL SQLSTATE code.
///
/// Returns `None` for codes without a dedicated variant so the caller can
/// keep the backend message as a plain `Database` error.
/// See: https://www.postgresql.org/docs/current/errcodes-appendix.html
pub fn classify_sqlstate(code: &str, message: String) -> Option<BulkError> {
    let err = match code {
        // Unique violation, exclusion violation
        "23505" | "23P01" => BulkError::ConstraintViolation(message),
        // ON CONFLICT target without a matching unique/exclusion constraint
        "42P10" => BulkError::ConstraintViolation(message),
        // ON CONFLICT DO UPDATE command cannot affect row a second time
        "21000" => BulkError::ConstraintViolation(message),
        "23503" => BulkError::ForeignKey(message),
        "23502" | "23514" => BulkError::CheckViolation(message),
        "40P01" => BulkError::Deadlock(message),
        "40001" => BulkError::SerializationFailure(message),
        code if code.starts_with("40") => BulkError::SerializationFailure(message),
        code if code.starts_with("08") => BulkError::Connection(message),
        // Operator intervention / admin shutdown (class 57)
        "57P01" | "57P02" | "57P03" => BulkError::Connection(message),
        _ => return None,
    };
    Some(err)
}

// PostgreSQL-specific error conversions (when postgres-errors feature is enabled)
#[cfg(feature = "postgres-errors")]
impl From<sqlx::Error> for BulkError {
    fn from(err: sqlx::Error) -> Self {
        use sqlx::Error;
        match &err {
            Error::Configuration(_) => BulkError::Configuration(err.to_string()),
            Error::Database(db_err) => {
                if let Some(code) = db_err.code() {
                    let code_str: &str = &code;
                    if let Some(classified) = classify_sqlstate(code_str, err.to_string()) {
                        return classified;
                    }
                }
                BulkError::Database(err.to_string())
            }
            Error::Io(_) => BulkError::Connection(err.to_string()),
            Error::Tls(_) => BulkError::Connection(err.to_string()),
            Error::Protocol(_) => BulkError::Connection(err.to_string()),
            Error::RowNotFound => BulkError::Query("Row not found".to_string()),
            Error::TypeNotFound { .. } => BulkError::Encoding(err.to_string()),
            Error::ColumnIndexOutOfBounds { .. } => BulkError::Query(err.to_string()),
            Error::ColumnNotFound(_) => BulkError::Query(err.to_string()),
            Error::ColumnDecode { .. } => BulkError::Encoding(err.to_string()),
            Error::Decode(_) => BulkError::Encoding(err.to_string()),
            Error::Encode(_) => BulkError::Encoding(err.to_string()),
            Error::PoolTimedOut => BulkError::Timeout("Connection pool timed out".to_string()),
            Error::PoolClosed => BulkError::Connection("Connection pool closed".to_string()),
            Error::WorkerCrashed => BulkError::Internal("Worker thread crashed".to_string()),
            _ => BulkError::Database(err.to_string()),
        }
    }
}
