//! Pulumi state backend
//!
//! Pulumi keeps its state in an Azure blob container. Before any deployment
//! the resource group, storage account, container, Pulumi project and stack
//! must all exist. `BackingStoreProvisioner::ensure` checks each in turn and
//! creates only what is missing, so a second run against an initialised
//! stack makes no creation calls.

use crate::azure::{AzureApi, StorageCredentials};
use crate::error::{CloudError, Result};
use crate::script::{ScriptRunner, compose};
use crate::subscription::SubscriptionContext;
use sheetflow_core::StateBackend;
use tracing::{debug, info, warn};

/// Pulumi project that owns every stack
pub const PROJECT_NAME: &str = "devops";

/// Blob name prefix Pulumi writes its metadata under
const PULUMI_PREFIX: &str = ".pulumi";

/// What the backend must look like
#[derive(Debug, Clone)]
pub struct BackingStoreSpec {
    pub resource_group: String,
    pub storage_account: String,
    pub location: String,
    pub container: String,
    pub project: String,
    pub stack: String,
    pub passphrase: String,
}

impl BackingStoreSpec {
    pub fn new(state: &StateBackend, stack: impl Into<String>, passphrase: impl Into<String>) -> Self {
        Self {
            resource_group: state.resource_group.clone(),
            storage_account: state.storage_account.clone(),
            location: state.location.clone(),
            container: state.container.clone(),
            project: PROJECT_NAME.to_string(),
            stack: stack.into(),
            passphrase: passphrase.into(),
        }
    }

    /// Blob Pulumi writes for the stack
    pub fn stack_blob(&self) -> String {
        format!("{}/stacks/{}/{}.json", PULUMI_PREFIX, self.project, self.stack)
    }

    pub fn backend_url(&self) -> String {
        format!("azblob://{}", self.container)
    }
}

/// A ready backend
#[derive(Debug, Clone)]
pub struct BackendHandle {
    pub storage_url: String,
    pub credentials: StorageCredentials,
    pub container: String,
    pub backend_url: String,
    /// Preamble every Pulumi script starts with
    pub init_script: String,
    /// Human readable list of what this run created
    pub created: Vec<String>,
}

pub struct BackingStoreProvisioner<'a> {
    azure: &'a dyn AzureApi,
    scripts: &'a dyn ScriptRunner,
    subscription: &'a SubscriptionContext,
}

impl<'a> BackingStoreProvisioner<'a> {
    pub fn new(
        azure: &'a dyn AzureApi,
        scripts: &'a dyn ScriptRunner,
        subscription: &'a SubscriptionContext,
    ) -> Self {
        Self {
            azure,
            scripts,
            subscription,
        }
    }

    pub async fn ensure(&self, spec: &BackingStoreSpec) -> Result<BackendHandle> {
        let mut created = Vec::new();
        let sub = self.subscription.subscription_id.as_str();

        if !self.azure.resource_group_exists(sub, &spec.resource_group).await? {
            self.azure
                .create_resource_group(sub, &spec.resource_group, &spec.location)
                .await?;
            info!(resource_group = %spec.resource_group, location = %spec.location, "Created resource group");
            created.push(format!("resource group {}", spec.resource_group));
        }

        let accounts = self
            .azure
            .list_storage_accounts(sub, &spec.resource_group)
            .await?;
        if !accounts.iter().any(|a| a.name == spec.storage_account) {
            match self
                .azure
                .create_storage_account(sub, &spec.resource_group, &spec.storage_account, &spec.location)
                .await
            {
                Ok(()) => {
                    info!(storage_account = %spec.storage_account, "Created storage account");
                    created.push(format!("storage account {}", spec.storage_account));
                }
                Err(CloudError::ResourceAlreadyExists(name)) => {
                    warn!(storage_account = %name, "Storage account already exists, continuing");
                }
                Err(e) => return Err(e),
            }
        }

        let credentials = self.credentials(spec).await?;

        if !self.azure.container_exists(&credentials, &spec.container).await? {
            self.azure.create_container(&credentials, &spec.container).await?;
            info!(container = %spec.container, "Created blob container");
            created.push(format!("container {}", spec.container));
        }

        let blobs = self
            .azure
            .list_blobs(&credentials, &spec.container, Some(PULUMI_PREFIX))
            .await?;
        let project_exists = blobs.iter().any(|b| b.name.starts_with(PULUMI_PREFIX));
        let stack_blob = spec.stack_blob();
        let stack_exists = blobs.iter().any(|b| b.name == stack_blob);
        debug!(project_exists, stack_exists, "Pulumi backend state");

        let init_script =
            initialisation_script(&credentials, &spec.container, &spec.passphrase);

        if !project_exists {
            // Creates the stack along with the project
            let bootstrap = format!(
                "pulumi new yaml --name {} --stack {} --yes --force",
                shell_words::quote(&spec.project),
                shell_words::quote(&spec.stack)
            );
            self.scripts.run(&compose(&init_script, &bootstrap)).await?;
            info!(project = %spec.project, stack = %spec.stack, "Created Pulumi project");
            created.push(format!("pulumi project {}", spec.project));
            created.push(format!("pulumi stack {}", spec.stack));
        } else if !stack_exists {
            let init = format!("pulumi stack init {}", shell_words::quote(&spec.stack));
            self.scripts.run(&compose(&init_script, &init)).await?;
            info!(stack = %spec.stack, "Created Pulumi stack");
            created.push(format!("pulumi stack {}", spec.stack));
        }

        Ok(BackendHandle {
            storage_url: credentials.blob_url(),
            credentials,
            container: spec.container.clone(),
            backend_url: spec.backend_url(),
            init_script,
            created,
        })
    }

    async fn credentials(&self, spec: &BackingStoreSpec) -> Result<StorageCredentials> {
        let keys = self
            .azure
            .list_storage_keys(
                &self.subscription.subscription_id,
                &spec.resource_group,
                &spec.storage_account,
            )
            .await?;
        let key = keys.into_iter().next().ok_or_else(|| {
            CloudError::RemoteProvisioningFailure(format!(
                "storage account '{}' returned no access keys",
                spec.storage_account
            ))
        })?;
        Ok(StorageCredentials::new(&spec.storage_account, key.value))
    }
}

/// Shell preamble that points Pulumi at the blob backend
pub fn initialisation_script(
    credentials: &StorageCredentials,
    container: &str,
    passphrase: &str,
) -> String {
    format!(
        "#!/bin/bash\n\
         set -e\n\
         export AZURE_STORAGE_ACCOUNT={}\n\
         export AZURE_STORAGE_KEY={}\n\
         export PULUMI_CONFIG_PASSPHRASE={}\n\
         pulumi login --cloud-url {}\n",
        shell_words::quote(&credentials.account_name),
        shell_words::quote(&credentials.account_key),
        shell_words::quote(passphrase),
        shell_words::quote(&format!("azblob://{}", container)),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{FakeAzure, FakeScripts, SUBSCRIPTION_ID, TENANT_ID};

    fn context() -> SubscriptionContext {
        SubscriptionContext {
            subscription_id: SUBSCRIPTION_ID.to_string(),
            tenant_id: TENANT_ID.to_string(),
            name: "Acme".to_string(),
        }
    }

    fn spec() -> BackingStoreSpec {
        BackingStoreSpec {
            resource_group: "pulumi-state".to_string(),
            storage_account: "acmestate".to_string(),
            location: "uksouth".to_string(),
            container: "pulumi".to_string(),
            project: PROJECT_NAME.to_string(),
            stack: "acme-prod".to_string(),
            passphrase: "No secrets here".to_string(),
        }
    }

    #[test]
    fn test_stack_blob_path() {
        assert_eq!(spec().stack_blob(), ".pulumi/stacks/devops/acme-prod.json");
        assert_eq!(spec().backend_url(), "azblob://pulumi");
    }

    #[test]
    fn test_initialisation_script() {
        let creds = StorageCredentials::new("acmestate", "abc+def==");
        let script = initialisation_script(&creds, "pulumi", "No secrets here");

        assert!(script.starts_with("#!/bin/bash\nset -e\n"));
        assert!(script.contains("export AZURE_STORAGE_ACCOUNT=acmestate\n"));
        assert!(script.contains("export AZURE_STORAGE_KEY='abc+def=='\n"));
        assert!(script.contains("export PULUMI_CONFIG_PASSPHRASE='No secrets here'\n"));
        assert!(script.ends_with("pulumi login --cloud-url azblob://pulumi\n"));
    }

    #[tokio::test]
    async fn test_fresh_backend_creates_everything() {
        let azure = FakeAzure::new();
        let scripts = FakeScripts::new();
        let ctx = context();

        let handle = BackingStoreProvisioner::new(&azure, &scripts, &ctx)
            .ensure(&spec())
            .await
            .unwrap();

        assert_eq!(
            azure.creation_calls(),
            vec![
                "create_resource_group pulumi-state uksouth",
                "create_storage_account acmestate",
                "create_container acmestate pulumi",
            ]
        );
        let scripts = scripts.scripts();
        assert_eq!(scripts.len(), 1);
        assert!(scripts[0].starts_with(&handle.init_script));
        assert!(scripts[0].contains("pulumi new yaml --name devops --stack acme-prod --yes --force"));

        assert_eq!(handle.storage_url, "https://acmestate.blob.core.windows.net");
        assert_eq!(handle.credentials.account_key, "acmestate-key1");
        assert_eq!(handle.created.len(), 5);
    }

    #[tokio::test]
    async fn test_initialised_stack_makes_no_creation_calls() {
        let azure = FakeAzure::new()
            .with_group("pulumi-state", "uksouth")
            .with_account("acmestate")
            .with_container("pulumi")
            .with_blob(".pulumi/meta.yaml")
            .with_blob(".pulumi/stacks/devops/acme-prod.json");
        let scripts = FakeScripts::new();
        let ctx = context();

        let provisioner = BackingStoreProvisioner::new(&azure, &scripts, &ctx);
        let first = provisioner.ensure(&spec()).await.unwrap();
        let second = provisioner.ensure(&spec()).await.unwrap();

        assert!(azure.creation_calls().is_empty());
        assert!(scripts.scripts().is_empty());
        assert!(first.created.is_empty());
        assert_eq!(first.init_script, second.init_script);
    }

    #[tokio::test]
    async fn test_missing_stack_only_runs_stack_init() {
        let azure = FakeAzure::new()
            .with_group("pulumi-state", "uksouth")
            .with_account("acmestate")
            .with_container("pulumi")
            .with_blob(".pulumi/stacks/devops/other.json");
        let scripts = FakeScripts::new();
        let ctx = context();

        BackingStoreProvisioner::new(&azure, &scripts, &ctx)
            .ensure(&spec())
            .await
            .unwrap();

        let scripts = scripts.scripts();
        assert_eq!(scripts.len(), 1);
        assert!(scripts[0].ends_with("pulumi stack init acme-prod"));
    }

    #[tokio::test]
    async fn test_storage_account_race_is_tolerated() {
        let azure = FakeAzure::new()
            .with_group("pulumi-state", "uksouth")
            .with_taken_account("acmestate");
        let scripts = FakeScripts::new();
        let ctx = context();

        let handle = BackingStoreProvisioner::new(&azure, &scripts, &ctx)
            .ensure(&spec())
            .await
            .unwrap();

        assert!(azure.calls().contains(&"create_storage_account acmestate".to_string()));
        assert!(!handle.created.iter().any(|c| c.starts_with("storage account")));
    }

    #[tokio::test]
    async fn test_bootstrap_failure_propagates() {
        let azure = FakeAzure::new();
        let scripts = FakeScripts::new().failing_on("pulumi new");
        let ctx = context();

        let result = BackingStoreProvisioner::new(&azure, &scripts, &ctx)
            .ensure(&spec())
            .await;
        assert!(matches!(result, Err(CloudError::ScriptFailed { .. })));
    }
}
