use thiserror::Error;

#[derive(Error, Debug)]
pub enum SyncError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Connection error: {0}")]
    ConnectionError(String),

    #[error("Database error: {0}")]
    DatabaseError(String),

    #[error("Schema error: {0}")]
    SchemaError(String),

    #[error("Schema creation failed: {reason} (statement: {statement})")]
    SchemaCreationError { statement: String, reason: String },

    #[error("Encoding error: {0}")]
    EncodingError(String),

    #[error("Row write failed on {table}: {reason} (statement: {statement})")]
    RowWriteError {
        table: String,
        statement: String,
        reason: String,
    },

    #[error("Transfer aborted: {0}")]
    Aborted(String),
}

impl SyncError {
    /// Row write failures are the only errors a job may choose to skip.
    pub fn is_row_write(&self) -> bool {
        matches!(self, SyncError::RowWriteError { .. })
    }
}

impl From<scylla::transport::errors::QueryError> for SyncError {
    fn from(err: scylla::transport::errors::QueryError) -> Self {
        SyncError::DatabaseError(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_row_write_error_message() {
        let err = SyncError::RowWriteError {
            table: "ks.users".to_string(),
            statement: "INSERT INTO ks.users (id) VALUES (1)".to_string(),
            reason: "timeout".to_string(),
        };
        assert!(err.is_row_write());
        assert!(err.to_string().contains("ks.users"));
        assert!(err.to_string().contains("timeout"));
    }

    #[test]
    fn test_other_errors_are_not_row_writes() {
        assert!(!SyncError::EncodingError("bad".into()).is_row_write());
        assert!(!SyncError::ConfigError("bad".into()).is_row_write());
    }
}
