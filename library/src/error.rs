use thiserror::Error;

#[derive(Error, Debug)]
pub enum GraphError {
    #[error("Connection error: {0}")]
    Connection(String),
    #[error("Cycle error: {0}")]
    Cycle(String),
    #[error("Configuration error: {0}")]
    Configuration(String),
    #[error("Processing error: {0}")]
    Processing(String),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl GraphError {
    pub fn connection(msg: impl Into<String>) -> Self {
        GraphError::Connection(msg.into())
    }

    pub fn cycle(msg: impl Into<String>) -> Self {
        GraphError::Cycle(msg.into())
    }

    pub fn configuration(msg: impl Into<String>) -> Self {
        GraphError::Configuration(msg.into())
    }

    pub fn processing(msg: impl Into<String>) -> Self {
        GraphError::Processing(msg.into())
    }
}
