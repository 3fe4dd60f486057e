use ferrobank_core::{ApiError, ConfigError, StorageError, SyncError, ValidationError};
use ferrobank_warehouse::WarehouseError;
use thiserror::Error;

/// CLI-level error categories mapped to exit codes.
#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("command error: {0}")]
    Command(String),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("{message}")]
    Api { message: String, code: &'static str },

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error(transparent)]
    Warehouse(#[from] WarehouseError),

    #[error(transparent)]
    Serialization(#[from] serde_json::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl From<ApiError> for CliError {
    fn from(error: ApiError) -> Self {
        Self::Api {
            message: format!("{} ({error})", error.user_message()),
            code: error.code(),
        }
    }
}

impl From<SyncError> for CliError {
    fn from(error: SyncError) -> Self {
        match error {
            SyncError::Api(error) => error.into(),
            SyncError::Storage(error) => Self::Storage(error),
            SyncError::UnknownProvider(id) => {
                Self::Command(format!("provider '{id}' is not configured"))
            }
            SyncError::ProviderInactive(id) => {
                Self::Command(format!("provider '{id}' is disconnected, connect it again"))
            }
        }
    }
}

impl CliError {
    /// Stable provider error code, when the failure came from a provider.
    pub const fn code(&self) -> Option<&'static str> {
        match self {
            Self::Api { code, .. } => Some(*code),
            _ => None,
        }
    }

    pub const fn exit_code(&self) -> u8 {
        match self {
            Self::Validation(_) => 2,
            Self::Command(_) => 2,
            Self::Config(_) => 2,
            Self::Serialization(_) => 4,
            Self::Api { .. } => 6,
            Self::Storage(_) => 7,
            Self::Warehouse(_) => 7,
            Self::Io(_) => 10,
        }
    }
}
