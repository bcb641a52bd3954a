//! Cloud error types

use sheetflow_core::ConfigError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CloudError {
    #[error("Authentication failed - ensure you are logged in to Azure CLI: {0}")]
    AuthenticationFailed(String),

    #[error("Subscription {0} not found in your credentials")]
    SubscriptionNotFound(String),

    #[error("Resource group '{name}' does not exist in subscription '{subscription}'")]
    ResourceGroupNotFound { name: String, subscription: String },

    #[error("Resource already exists: {0}")]
    ResourceAlreadyExists(String),

    #[error("Remote provisioning failed: {0}")]
    RemoteProvisioningFailure(String),

    #[error("Invalid program: {0}")]
    InvalidProgram(String),

    #[error("`{command}` failed with {status}")]
    ScriptFailed { status: String, command: String },

    #[error("Invalid configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, CloudError>;
