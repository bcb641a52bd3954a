//! Pulumi error types

use sheetflow_cloud::CloudError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum PulumiError {
    #[error("Invalid pulumi command: {0}")]
    InvalidCommand(String),

    #[error("Stack '{0}' has no update history")]
    NoHistory(String),

    #[error("Unexpected pulumi output: {0}")]
    UnexpectedOutput(String),

    #[error(transparent)]
    Cloud(#[from] CloudError),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, PulumiError>;
