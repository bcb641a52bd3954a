//! Azure provider error types

use sheetflow_cloud::CloudError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AzureError {
    #[error("az not found. Please install the Azure CLI: https://aka.ms/installazurecli")]
    AzNotFound,

    #[error("Azure CLI authentication failed, run `az login`: {0}")]
    AuthenticationFailed(String),

    #[error("Resource already exists: {0}")]
    AlreadyExists(String),

    #[error("`az {command}` failed: {stderr}")]
    CommandFailed { command: String, stderr: String },

    #[error("Unexpected az output: {0}")]
    UnexpectedOutput(String),

    #[error("JSON parse error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, AzureError>;

impl From<AzureError> for CloudError {
    fn from(err: AzureError) -> Self {
        match err {
            AzureError::AuthenticationFailed(msg) => CloudError::AuthenticationFailed(msg),
            AzureError::AlreadyExists(msg) => CloudError::ResourceAlreadyExists(msg),
            AzureError::JsonError(e) => CloudError::Json(e),
            AzureError::IoError(e) => CloudError::Io(e),
            other => CloudError::RemoteProvisioningFailure(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_conversion_to_cloud_error() {
        assert!(matches!(
            CloudError::from(AzureError::AlreadyExists("acmestate".into())),
            CloudError::ResourceAlreadyExists(name) if name == "acmestate"
        ));
        assert!(matches!(
            CloudError::from(AzureError::AuthenticationFailed("expired".into())),
            CloudError::AuthenticationFailed(_)
        ));
        assert!(matches!(
            CloudError::from(AzureError::AzNotFound),
            CloudError::RemoteProvisioningFailure(_)
        ));
    }
}
