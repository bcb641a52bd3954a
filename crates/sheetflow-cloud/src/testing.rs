//! In-memory fakes for `AzureApi` and `ScriptRunner`

use crate::azure::{
    AzureApi, BlobItem, ResourceGroup, StorageAccount, StorageCredentials, StorageKey,
    Subscription,
};
use crate::error::{CloudError, Result};
use crate::script::ScriptRunner;
use async_trait::async_trait;
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;
use std::sync::Mutex;

#[derive(Default)]
struct AzureState {
    subscriptions: Vec<Subscription>,
    groups: BTreeMap<String, String>,
    accounts: BTreeSet<String>,
    /// Accounts owned by someone else; creating them fails with AlreadyExists
    taken_accounts: BTreeSet<String>,
    containers: BTreeSet<String>,
    blobs: BTreeSet<String>,
    fail_auth: bool,
    fail_upload: bool,
    calls: Vec<String>,
}

#[derive(Default)]
pub struct FakeAzure {
    state: Mutex<AzureState>,
}

pub const SUBSCRIPTION_ID: &str = "00000000-0000-0000-0000-000000000001";
pub const TENANT_ID: &str = "11111111-1111-1111-1111-111111111111";

impl FakeAzure {
    pub fn new() -> Self {
        Self::default()
    }

    /// One subscription named `name`
    pub fn with_subscription(self, name: &str) -> Self {
        self.state.lock().unwrap().subscriptions.push(Subscription {
            subscription_id: SUBSCRIPTION_ID.to_string(),
            display_name: name.to_string(),
            tenant_id: TENANT_ID.to_string(),
            state: Some("Enabled".to_string()),
        });
        self
    }

    pub fn with_group(self, name: &str, location: &str) -> Self {
        self.state
            .lock()
            .unwrap()
            .groups
            .insert(name.to_string(), location.to_string());
        self
    }

    pub fn with_account(self, name: &str) -> Self {
        self.state.lock().unwrap().accounts.insert(name.to_string());
        self
    }

    pub fn with_taken_account(self, name: &str) -> Self {
        self.state
            .lock()
            .unwrap()
            .taken_accounts
            .insert(name.to_string());
        self
    }

    pub fn with_container(self, name: &str) -> Self {
        self.state.lock().unwrap().containers.insert(name.to_string());
        self
    }

    pub fn with_blob(self, name: &str) -> Self {
        self.state.lock().unwrap().blobs.insert(name.to_string());
        self
    }

    pub fn failing_auth(self) -> Self {
        self.state.lock().unwrap().fail_auth = true;
        self
    }

    pub fn failing_upload(self) -> Self {
        self.state.lock().unwrap().fail_upload = true;
        self
    }

    /// Every call made so far, as `method arg...`
    pub fn calls(&self) -> Vec<String> {
        self.state.lock().unwrap().calls.clone()
    }

    pub fn creation_calls(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter(|c| c.starts_with("create_") || c.starts_with("upload_"))
            .collect()
    }

    fn record(&self, call: String) {
        self.state.lock().unwrap().calls.push(call);
    }
}

#[async_trait]
impl AzureApi for FakeAzure {
    async fn list_subscriptions(&self) -> Result<Vec<Subscription>> {
        self.record("list_subscriptions".to_string());
        let state = self.state.lock().unwrap();
        if state.fail_auth {
            return Err(CloudError::AuthenticationFailed(
                "Please run 'az login' to setup account.".to_string(),
            ));
        }
        Ok(state.subscriptions.clone())
    }

    async fn resource_group_exists(&self, subscription_id: &str, name: &str) -> Result<bool> {
        self.record(format!("resource_group_exists {} {}", subscription_id, name));
        Ok(self.state.lock().unwrap().groups.contains_key(name))
    }

    async fn get_resource_group(&self, subscription_id: &str, name: &str) -> Result<ResourceGroup> {
        self.record(format!("get_resource_group {} {}", subscription_id, name));
        let state = self.state.lock().unwrap();
        let location = state
            .groups
            .get(name)
            .ok_or_else(|| CloudError::RemoteProvisioningFailure(format!("no group {}", name)))?;
        Ok(ResourceGroup {
            id: format!("/subscriptions/{}/resourceGroups/{}", subscription_id, name),
            name: name.to_string(),
            location: location.clone(),
        })
    }

    async fn create_resource_group(
        &self,
        subscription_id: &str,
        name: &str,
        location: &str,
    ) -> Result<ResourceGroup> {
        self.record(format!("create_resource_group {} {}", name, location));
        self.state
            .lock()
            .unwrap()
            .groups
            .insert(name.to_string(), location.to_string());
        Ok(ResourceGroup {
            id: format!("/subscriptions/{}/resourceGroups/{}", subscription_id, name),
            name: name.to_string(),
            location: location.to_string(),
        })
    }

    async fn list_storage_accounts(
        &self,
        _subscription_id: &str,
        resource_group: &str,
    ) -> Result<Vec<StorageAccount>> {
        self.record(format!("list_storage_accounts {}", resource_group));
        Ok(self
            .state
            .lock()
            .unwrap()
            .accounts
            .iter()
            .map(|name| StorageAccount {
                name: name.clone(),
                location: None,
            })
            .collect())
    }

    async fn create_storage_account(
        &self,
        _subscription_id: &str,
        _resource_group: &str,
        name: &str,
        _location: &str,
    ) -> Result<()> {
        self.record(format!("create_storage_account {}", name));
        let mut state = self.state.lock().unwrap();
        if state.taken_accounts.contains(name) {
            return Err(CloudError::ResourceAlreadyExists(name.to_string()));
        }
        state.accounts.insert(name.to_string());
        Ok(())
    }

    async fn list_storage_keys(
        &self,
        _subscription_id: &str,
        _resource_group: &str,
        account: &str,
    ) -> Result<Vec<StorageKey>> {
        self.record(format!("list_storage_keys {}", account));
        Ok(vec![
            StorageKey {
                key_name: "key1".to_string(),
                value: format!("{}-key1", account),
            },
            StorageKey {
                key_name: "key2".to_string(),
                value: format!("{}-key2", account),
            },
        ])
    }

    async fn container_exists(
        &self,
        storage: &StorageCredentials,
        container: &str,
    ) -> Result<bool> {
        self.record(format!("container_exists {} {}", storage.account_name, container));
        Ok(self.state.lock().unwrap().containers.contains(container))
    }

    async fn create_container(&self, storage: &StorageCredentials, container: &str) -> Result<()> {
        self.record(format!("create_container {} {}", storage.account_name, container));
        self.state
            .lock()
            .unwrap()
            .containers
            .insert(container.to_string());
        Ok(())
    }

    async fn list_blobs(
        &self,
        storage: &StorageCredentials,
        container: &str,
        prefix: Option<&str>,
    ) -> Result<Vec<BlobItem>> {
        self.record(format!("list_blobs {} {}", storage.account_name, container));
        Ok(self
            .state
            .lock()
            .unwrap()
            .blobs
            .iter()
            .filter(|name| prefix.is_none_or(|p| name.starts_with(p)))
            .map(|name| BlobItem { name: name.clone() })
            .collect())
    }

    async fn upload_blob(
        &self,
        storage: &StorageCredentials,
        container: &str,
        _file: &Path,
        blob_name: &str,
    ) -> Result<()> {
        self.record(format!(
            "upload_blob {} {} {}",
            storage.account_name, container, blob_name
        ));
        let mut state = self.state.lock().unwrap();
        if state.fail_upload {
            return Err(CloudError::RemoteProvisioningFailure(format!(
                "upload of {} refused",
                blob_name
            )));
        }
        state.blobs.insert(blob_name.to_string());
        Ok(())
    }
}

/// Records scripts instead of running them
#[derive(Default)]
pub struct FakeScripts {
    scripts: Mutex<Vec<String>>,
    output: Mutex<String>,
    fail_on: Mutex<Option<String>>,
}

impl FakeScripts {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stdout returned by `run_captured`
    pub fn with_output(self, output: &str) -> Self {
        *self.output.lock().unwrap() = output.to_string();
        self
    }

    /// Fail any script containing `needle`
    pub fn failing_on(self, needle: &str) -> Self {
        *self.fail_on.lock().unwrap() = Some(needle.to_string());
        self
    }

    pub fn scripts(&self) -> Vec<String> {
        self.scripts.lock().unwrap().clone()
    }

    fn record(&self, script: &str) -> Result<()> {
        self.scripts.lock().unwrap().push(script.to_string());
        if let Some(needle) = self.fail_on.lock().unwrap().as_deref()
            && script.contains(needle)
        {
            return Err(CloudError::ScriptFailed {
                status: "exit status: 1".to_string(),
                command: needle.to_string(),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl ScriptRunner for FakeScripts {
    async fn run(&self, script: &str) -> Result<()> {
        self.record(script)
    }

    async fn run_captured(&self, script: &str) -> Result<String> {
        self.record(script)?;
        Ok(self.output.lock().unwrap().clone())
    }
}
