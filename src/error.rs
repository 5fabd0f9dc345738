use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    /// Transport failure or device-reported error status while polling.
    #[error("SNMP connectivity error: {0}")]
    Connectivity(String),

    #[error("Decode error: {0}")]
    Decode(String),

    #[error("State file error: {0}")]
    State(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML parsing error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl AppError {
    pub fn is_connectivity(&self) -> bool {
        matches!(self, AppError::Connectivity(_))
    }
}

pub type Result<T> = std::result::Result<T, AppError>;
