//! Azure API abstraction
//!
//! Everything SheetFlow needs from Azure outside of Pulumi: subscriptions,
//! resource groups, storage accounts, blob containers and blobs. The real
//! implementation lives in `sheetflow-cloud-azure`; tests use in-memory fakes.

use crate::error::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::Path;

#[async_trait]
pub trait AzureApi: Send + Sync {
    /// Fail early when the tooling behind this API is unusable
    async fn check_available(&self) -> Result<()> {
        Ok(())
    }

    /// Every subscription visible to the current credentials
    async fn list_subscriptions(&self) -> Result<Vec<Subscription>>;

    async fn resource_group_exists(&self, subscription_id: &str, name: &str) -> Result<bool>;

    async fn get_resource_group(&self, subscription_id: &str, name: &str) -> Result<ResourceGroup>;

    async fn create_resource_group(
        &self,
        subscription_id: &str,
        name: &str,
        location: &str,
    ) -> Result<ResourceGroup>;

    async fn list_storage_accounts(
        &self,
        subscription_id: &str,
        resource_group: &str,
    ) -> Result<Vec<StorageAccount>>;

    /// Create a `Standard_LRS` `StorageV2` account.
    ///
    /// Returns `CloudError::ResourceAlreadyExists` when the name is taken.
    async fn create_storage_account(
        &self,
        subscription_id: &str,
        resource_group: &str,
        name: &str,
        location: &str,
    ) -> Result<()>;

    async fn list_storage_keys(
        &self,
        subscription_id: &str,
        resource_group: &str,
        account: &str,
    ) -> Result<Vec<StorageKey>>;

    async fn container_exists(&self, storage: &StorageCredentials, container: &str)
    -> Result<bool>;

    async fn create_container(&self, storage: &StorageCredentials, container: &str) -> Result<()>;

    /// Blobs in `container`, optionally restricted to names starting with `prefix`
    async fn list_blobs(
        &self,
        storage: &StorageCredentials,
        container: &str,
        prefix: Option<&str>,
    ) -> Result<Vec<BlobItem>>;

    /// Upload a local file, replacing any blob with the same name
    async fn upload_blob(
        &self,
        storage: &StorageCredentials,
        container: &str,
        file: &Path,
        blob_name: &str,
    ) -> Result<()>;
}

/// Subscription as listed by `az account list`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subscription {
    #[serde(rename = "id")]
    pub subscription_id: String,

    #[serde(rename = "name")]
    pub display_name: String,

    #[serde(rename = "tenantId")]
    pub tenant_id: String,

    #[serde(default)]
    pub state: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceGroup {
    pub id: String,
    pub name: String,
    pub location: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorageAccount {
    pub name: String,

    #[serde(default)]
    pub location: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorageKey {
    #[serde(rename = "keyName")]
    pub key_name: String,

    pub value: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlobItem {
    pub name: String,
}

/// Account name and key for data-plane storage calls
#[derive(Clone, PartialEq, Eq)]
pub struct StorageCredentials {
    pub account_name: String,
    pub account_key: String,
}

impl StorageCredentials {
    pub fn new(account_name: impl Into<String>, account_key: impl Into<String>) -> Self {
        Self {
            account_name: account_name.into(),
            account_key: account_key.into(),
        }
    }

    /// Blob endpoint of the account
    pub fn blob_url(&self) -> String {
        format!("https://{}.blob.core.windows.net", self.account_name)
    }
}

// The key never appears in logs.
impl std::fmt::Debug for StorageCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StorageCredentials")
            .field("account_name", &self.account_name)
            .field("account_key", &"***")
            .finish()
    }
}
