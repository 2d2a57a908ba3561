use thiserror::Error;

/// Domain-specific error types for the catalog indexer.
#[derive(Error, Debug)]
pub enum CatalogError {
    /// The remote archive could not be reached or kept timing out.
    #[error("Archive unreachable: {message}")]
    ArchiveUnreachable { message: String },

    /// The archive was fetched but its payload is not a valid snapshot.
    #[error("Archive malformed: {message}")]
    ArchiveMalformed { message: String },

    /// A single registry document failed to parse. Non-terminal: the run
    /// records the error and continues with the next registry.
    #[error("Failed to parse registry '{registry}': {reason}")]
    RegistryParseFailed { registry: String, reason: String },

    /// A trigger arrived while a run was already active.
    #[error("Indexing already in progress")]
    IndexingInProgress,

    /// A free-text query exceeded the matcher complexity bound.
    #[error("Search query too long: {length} characters (max {max})")]
    QueryTooComplex { length: usize, max: usize },

    /// A pagination cursor could not be decoded.
    #[error("Invalid pagination cursor: {message}")]
    InvalidCursor { message: String },

    /// Database connection errors
    #[error("Database connection failed: {message}")]
    DatabaseConnectionFailed { message: String },

    /// Database transaction errors
    #[error("Database transaction failed: {operation}")]
    DatabaseTransactionFailed { operation: String },

    /// Database query errors
    #[error("Database query failed: {query}")]
    DatabaseQueryFailed { query: String },

    /// Configuration errors
    #[error("Configuration error: {parameter} - {message}")]
    ConfigurationError { parameter: String, message: String },

    /// Generic internal errors
    #[error("Internal error: {message}")]
    InternalError { message: String },
}

impl CatalogError {
    /// Create an archive-unreachable error
    pub fn archive_unreachable(message: impl Into<String>) -> Self {
        Self::ArchiveUnreachable {
            message: message.into(),
        }
    }

    /// Create a malformed-archive error
    pub fn archive_malformed(message: impl Into<String>) -> Self {
        Self::ArchiveMalformed {
            message: message.into(),
        }
    }

    /// Create a per-registry parse error
    pub fn registry_parse(registry: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::RegistryParseFailed {
            registry: registry.into(),
            reason: reason.into(),
        }
    }

    /// Create a query-complexity error
    #[must_use]
    pub const fn query_too_complex(length: usize, max: usize) -> Self {
        Self::QueryTooComplex { length, max }
    }

    /// Create an invalid-cursor error
    pub fn invalid_cursor(message: impl Into<String>) -> Self {
        Self::InvalidCursor {
            message: message.into(),
        }
    }

    /// Create a database connection error
    pub fn database_connection(message: impl Into<String>) -> Self {
        Self::DatabaseConnectionFailed {
            message: message.into(),
        }
    }

    /// Create a database transaction error
    pub fn database_transaction(operation: impl Into<String>) -> Self {
        Self::DatabaseTransactionFailed {
            operation: operation.into(),
        }
    }

    /// Create a database query error
    pub fn database_query(query: impl Into<String>) -> Self {
        Self::DatabaseQueryFailed {
            query: query.into(),
        }
    }

    /// Create a configuration error
    pub fn configuration(parameter: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ConfigurationError {
            parameter: parameter.into(),
            message: message.into(),
        }
    }

    /// Create an internal error
    pub fn internal(message: impl Into<String>) -> Self {
        Self::InternalError {
            message: message.into(),
        }
    }
}

/// Result type alias for catalog operations
pub type Result<T> = std::result::Result<T, CatalogError>;

/// Convert from standard database errors
impl From<sqlx::Error> for CatalogError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::Database(db_err) => {
                Self::database_query(format!("Database error: {db_err}"))
            }
            sqlx::Error::PoolClosed => {
                Self::database_connection("Connection pool closed".to_string())
            }
            sqlx::Error::PoolTimedOut => {
                Self::database_connection("Connection pool timed out".to_string())
            }
            _ => Self::database_connection(format!("SQLx error: {err}")),
        }
    }
}

/// Convert from reqwest errors
impl From<reqwest::Error> for CatalogError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::archive_unreachable(format!("Request timed out: {err}"))
        } else if err.is_connect() {
            Self::archive_unreachable(format!("Connection error: {err}"))
        } else {
            Self::archive_unreachable(format!("Request error: {err}"))
        }
    }
}

/// Convert from serde JSON errors
impl From<serde_json::Error> for CatalogError {
    fn from(err: serde_json::Error) -> Self {
        Self::archive_malformed(format!("JSON parsing error: {err}"))
    }
}

/// Convert from eyre errors at the binary boundary
impl From<eyre::Report> for CatalogError {
    fn from(err: eyre::Report) -> Self {
        Self::internal(format!("{err}"))
    }
}
