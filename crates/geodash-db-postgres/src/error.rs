//! Error types for the PostgreSQL query runner.

use geodash_core::DataviewError;
use sqlx_core::error::Error as SqlxError;

/// PostgreSQL error code raised when `statement_timeout` cancels a query (57014).
pub const PG_QUERY_CANCELED: &str = "57014";

/// Checks if a sqlx error has a specific PostgreSQL error code.
pub fn has_pg_error_code(err: &SqlxError, code: &str) -> bool {
    if let SqlxError::Database(db_err) = err {
        db_err.code().as_deref() == Some(code)
    } else {
        false
    }
}

pub fn is_query_canceled(err: &SqlxError) -> bool {
    has_pg_error_code(err, PG_QUERY_CANCELED)
}

#[derive(Debug, thiserror::Error)]
pub enum PostgresError {
    #[error("Database connection error: {0}")]
    Connection(#[from] SqlxError),

    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("Pool error: {message}")]
    Pool { message: String },
}

impl PostgresError {
    #[must_use]
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    #[must_use]
    pub fn pool(message: impl Into<String>) -> Self {
        Self::Pool {
            message: message.into(),
        }
    }
}

impl From<PostgresError> for DataviewError {
    fn from(err: PostgresError) -> Self {
        match err {
            PostgresError::Connection(e) if is_query_canceled(&e) => {
                DataviewError::timeout(database_message(&e))
            }
            PostgresError::Connection(e) => DataviewError::database(database_message(&e)),
            PostgresError::Config { message } => DataviewError::configuration(message),
            PostgresError::Pool { message } => {
                DataviewError::database(format!("Pool error: {message}"))
            }
        }
    }
}

/// The server's own message for database errors, the sqlx rendering otherwise.
fn database_message(err: &SqlxError) -> String {
    match err {
        SqlxError::Database(db_err) => db_err.message().to_string(),
        other => other.to_string(),
    }
}

pub type Result<T> = std::result::Result<T, PostgresError>;
