use ferrobank_core::StorageError;
use thiserror::Error;

/// Errors that can occur during warehouse operations.
#[derive(Debug, Error)]
pub enum WarehouseError {
    /// `DuckDB` database error.
    #[error(transparent)]
    DuckDb(#[from] ::duckdb::Error),

    /// I/O error (file system operations).
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// Budget categories column could not be encoded or decoded.
    #[error(transparent)]
    Json(#[from] serde_json::Error),

    /// A stored column could not be mapped back to a domain value.
    #[error("column '{field}' holds an invalid value: {message}")]
    InvalidData { field: &'static str, message: String },

    #[error("{entity} '{id}' not found")]
    RecordNotFound { entity: &'static str, id: String },
}

impl WarehouseError {
    pub(crate) fn invalid(field: &'static str, message: impl ToString) -> Self {
        Self::InvalidData {
            field,
            message: message.to_string(),
        }
    }
}

impl From<WarehouseError> for StorageError {
    fn from(error: WarehouseError) -> Self {
        match error {
            WarehouseError::InvalidData { field, message } => Self::Corrupt { field, message },
            WarehouseError::Json(error) => Self::Corrupt {
                field: "categories",
                message: error.to_string(),
            },
            WarehouseError::RecordNotFound { entity, id } => Self::NotFound { entity, id },
            other => Self::Backend(other.to_string()),
        }
    }
}
