use thiserror::Error;

#[derive(Debug, Error)]
pub enum CoreError {
    #[error("storage read failed: {0}")]
    StorageRead(String),

    #[error("storage write failed: {0}")]
    StorageWrite(String),

    #[error("storage error: {0}")]
    Storage(#[from] rusqlite::Error),

    #[error("config error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
