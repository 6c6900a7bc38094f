use thiserror::Error;

#[derive(Error, Debug)]
pub enum DocketError {
    #[error("Not in a docket project. Run 'docket init' first.")]
    NotInitialized,

    #[error("Already initialized. Remove .docket/ to reinitialize.")]
    AlreadyInitialized,

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Not ready: {0}")]
    NotReady(String),

    #[error("Persistence unavailable: {0}")]
    PersistenceUnavailable(String),

    #[error("Corrupt order record: {0}")]
    CorruptOrderRecord(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Config error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

impl From<rusqlite::Error> for DocketError {
    fn from(e: rusqlite::Error) -> Self {
        DocketError::Storage(format!("SQLite error: {}", e))
    }
}

impl From<tokio::task::JoinError> for DocketError {
    fn from(e: tokio::task::JoinError) -> Self {
        DocketError::PersistenceUnavailable(format!("storage task failed: {}", e))
    }
}

pub type Result<T> = std::result::Result<T, DocketError>;
