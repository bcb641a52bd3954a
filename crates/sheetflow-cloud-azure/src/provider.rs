//! Azure provider implementation

use crate::az::AzCli;
use crate::error::AzureError;
use async_trait::async_trait;
use sheetflow_cloud::{
    AzureApi, BlobItem, ResourceGroup, StorageAccount, StorageCredentials, StorageKey,
    Subscription,
};
use std::path::Path;

type CloudResult<T> = sheetflow_cloud::Result<T>;

/// `AzureApi` backed by the az CLI and its ambient login
pub struct AzureCliProvider {
    az: AzCli,
}

impl Default for AzureCliProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl AzureCliProvider {
    pub fn new() -> Self {
        Self { az: AzCli::new() }
    }

    pub fn with_cli(az: AzCli) -> Self {
        Self { az }
    }
}

#[async_trait]
impl AzureApi for AzureCliProvider {
    async fn check_available(&self) -> CloudResult<()> {
        Ok(self.az.check_installed().await?)
    }

    async fn list_subscriptions(&self) -> CloudResult<Vec<Subscription>> {
        Ok(self.az.list_accounts().await?)
    }

    async fn resource_group_exists(&self, subscription_id: &str, name: &str) -> CloudResult<bool> {
        Ok(self.az.group_exists(subscription_id, name).await?)
    }

    async fn get_resource_group(
        &self,
        subscription_id: &str,
        name: &str,
    ) -> CloudResult<ResourceGroup> {
        Ok(self.az.group_show(subscription_id, name).await?)
    }

    async fn create_resource_group(
        &self,
        subscription_id: &str,
        name: &str,
        location: &str,
    ) -> CloudResult<ResourceGroup> {
        Ok(self.az.group_create(subscription_id, name, location).await?)
    }

    async fn list_storage_accounts(
        &self,
        subscription_id: &str,
        resource_group: &str,
    ) -> CloudResult<Vec<StorageAccount>> {
        Ok(self
            .az
            .storage_account_list(subscription_id, resource_group)
            .await?)
    }

    async fn create_storage_account(
        &self,
        subscription_id: &str,
        resource_group: &str,
        name: &str,
        location: &str,
    ) -> CloudResult<()> {
        match self
            .az
            .storage_account_create(subscription_id, resource_group, name, location)
            .await
        {
            Ok(()) => Ok(()),
            // Report the account name rather than az's stderr
            Err(AzureError::AlreadyExists(_)) => Err(AzureError::AlreadyExists(name.to_string()).into()),
            Err(e) => Err(e.into()),
        }
    }

    async fn list_storage_keys(
        &self,
        subscription_id: &str,
        resource_group: &str,
        account: &str,
    ) -> CloudResult<Vec<StorageKey>> {
        Ok(self
            .az
            .storage_account_keys(subscription_id, resource_group, account)
            .await?)
    }

    async fn container_exists(
        &self,
        storage: &StorageCredentials,
        container: &str,
    ) -> CloudResult<bool> {
        Ok(self
            .az
            .container_exists(&storage.account_name, &storage.account_key, container)
            .await?)
    }

    async fn create_container(
        &self,
        storage: &StorageCredentials,
        container: &str,
    ) -> CloudResult<()> {
        Ok(self
            .az
            .container_create(&storage.account_name, &storage.account_key, container)
            .await?)
    }

    async fn list_blobs(
        &self,
        storage: &StorageCredentials,
        container: &str,
        prefix: Option<&str>,
    ) -> CloudResult<Vec<BlobItem>> {
        Ok(self
            .az
            .blob_list(&storage.account_name, &storage.account_key, container, prefix)
            .await?)
    }

    async fn upload_blob(
        &self,
        storage: &StorageCredentials,
        container: &str,
        file: &Path,
        blob_name: &str,
    ) -> CloudResult<()> {
        Ok(self
            .az
            .blob_upload(
                &storage.account_name,
                &storage.account_key,
                container,
                file,
                blob_name,
            )
            .await?)
    }
}
