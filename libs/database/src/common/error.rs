/// Error type for connection management (connect, ping, configuration).
///
/// Query-level failures are classified by the domain crates, which know what a
/// duplicate key or a missing document means for them.
#[derive(Debug, thiserror::Error)]
pub enum DatabaseError {
    /// Driver error while building or using a client
    #[cfg(feature = "mongodb")]
    #[error("MongoDB error: {0}")]
    Mongo(#[from] mongodb::error::Error),

    /// Connection could not be established or verified
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// Health check failed
    #[error("Health check failed: {0}")]
    HealthCheckFailed(String),

    /// Invalid connection settings
    #[error("Configuration error: {0}")]
    ConfigError(String),
}

impl DatabaseError {
    /// Whether retrying the same operation could succeed.
    ///
    /// Configuration problems never fix themselves; everything else might be a
    /// server that is still starting up.
    pub fn is_transient(&self) -> bool {
        !matches!(self, DatabaseError::ConfigError(_))
    }
}

/// Result type alias for database operations
pub type DatabaseResult<T> = Result<T, DatabaseError>;
