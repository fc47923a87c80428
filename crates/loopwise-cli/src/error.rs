use crate::storage::StoreError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum LoopError {
    #[error("Config error: {0}")]
    ConfigParsing(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Dialogue error: {0}")]
    Dialogue(#[from] dialoguer::Error),

    #[error("Header error: {0}")]
    Header(#[from] reqwest::header::InvalidHeaderValue),

    #[error("Storage error: {0}")]
    Storage(#[from] StoreError),

    #[error("Remote error: {0}")]
    Remote(String),

    #[error("Config error: {0}")]
    Config(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Invalid input: {0}")]
    Validation(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Pipeline error: {0}")]
    Pipeline(String),
}

impl From<toml::de::Error> for LoopError {
    fn from(err: toml::de::Error) -> Self {
        LoopError::ConfigParsing(err.to_string())
    }
}

impl From<rusqlite::Error> for LoopError {
    fn from(err: rusqlite::Error) -> Self {
        LoopError::Database(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, LoopError>;
