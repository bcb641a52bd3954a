//! az CLI wrapper
//!
//! Wraps the Azure CLI commands SheetFlow needs. Every command asks for JSON
//! output. Storage data-plane commands receive the account key through the
//! `AZURE_STORAGE_KEY` environment variable so it never shows up in argv or
//! logs.

use crate::error::{AzureError, Result};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use sheetflow_cloud::{BlobItem, ResourceGroup, StorageAccount, StorageKey, Subscription};
use std::path::Path;
use std::process::Stdio;
use tokio::process::Command;

/// az CLI wrapper
pub struct AzCli {
    program: String,
}

impl Default for AzCli {
    fn default() -> Self {
        Self::new()
    }
}

impl AzCli {
    pub fn new() -> Self {
        Self {
            program: "az".to_string(),
        }
    }

    /// Use a different executable, e.g. a wrapper script
    pub fn with_program(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }

    /// Check that the CLI is on PATH
    pub async fn check_installed(&self) -> Result<()> {
        let which = Command::new("which")
            .arg(&self.program)
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .await;

        // No `which` at all counts as not installed
        if !which.is_ok_and(|status| status.success()) {
            return Err(AzureError::AzNotFound);
        }
        Ok(())
    }

    /// Run an az command and return stdout
    async fn run_command(&self, args: &[&str], envs: &[(&str, &str)]) -> Result<String> {
        let mut cmd = Command::new(&self.program);
        cmd.args(args);
        cmd.envs(envs.iter().copied());
        cmd.stdout(Stdio::piped());
        cmd.stderr(Stdio::piped());

        tracing::debug!("Running: {} {}", self.program, args.join(" "));

        let output = cmd.output().await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                AzureError::AzNotFound
            } else {
                AzureError::IoError(e)
            }
        })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(classify_failure(&args.join(" "), stderr.trim()));
        }

        Ok(String::from_utf8_lossy(&output.stdout).to_string())
    }

    async fn run_json<T: DeserializeOwned>(&self, args: &[&str], envs: &[(&str, &str)]) -> Result<T> {
        let output = self.run_command(args, envs).await?;
        Ok(serde_json::from_str(&output)?)
    }

    /// `az account list --all`
    pub async fn list_accounts(&self) -> Result<Vec<Subscription>> {
        let output = self
            .run_command(&["account", "list", "--all", "--output", "json"], &[])
            .await?;
        parse_list(&output)
    }

    pub async fn group_exists(&self, subscription: &str, name: &str) -> Result<bool> {
        let output = self
            .run_command(
                &[
                    "group",
                    "exists",
                    "--name",
                    name,
                    "--subscription",
                    subscription,
                    "--output",
                    "json",
                ],
                &[],
            )
            .await?;
        parse_bool(&output)
    }

    pub async fn group_show(&self, subscription: &str, name: &str) -> Result<ResourceGroup> {
        self.run_json(
            &[
                "group",
                "show",
                "--name",
                name,
                "--subscription",
                subscription,
                "--output",
                "json",
            ],
            &[],
        )
        .await
    }

    pub async fn group_create(
        &self,
        subscription: &str,
        name: &str,
        location: &str,
    ) -> Result<ResourceGroup> {
        self.run_json(
            &[
                "group",
                "create",
                "--name",
                name,
                "--location",
                location,
                "--subscription",
                subscription,
                "--output",
                "json",
            ],
            &[],
        )
        .await
    }

    pub async fn storage_account_list(
        &self,
        subscription: &str,
        resource_group: &str,
    ) -> Result<Vec<StorageAccount>> {
        let output = self
            .run_command(
                &[
                    "storage",
                    "account",
                    "list",
                    "--resource-group",
                    resource_group,
                    "--subscription",
                    subscription,
                    "--output",
                    "json",
                ],
                &[],
            )
            .await?;
        parse_list(&output)
    }

    pub async fn storage_account_create(
        &self,
        subscription: &str,
        resource_group: &str,
        name: &str,
        location: &str,
    ) -> Result<()> {
        self.run_command(
            &[
                "storage",
                "account",
                "create",
                "--name",
                name,
                "--resource-group",
                resource_group,
                "--location",
                location,
                "--sku",
                "Standard_LRS",
                "--kind",
                "StorageV2",
                "--subscription",
                subscription,
                "--output",
                "json",
            ],
            &[],
        )
        .await?;
        Ok(())
    }

    pub async fn storage_account_keys(
        &self,
        subscription: &str,
        resource_group: &str,
        account: &str,
    ) -> Result<Vec<StorageKey>> {
        let output = self
            .run_command(
                &[
                    "storage",
                    "account",
                    "keys",
                    "list",
                    "--account-name",
                    account,
                    "--resource-group",
                    resource_group,
                    "--subscription",
                    subscription,
                    "--output",
                    "json",
                ],
                &[],
            )
            .await?;
        parse_list(&output)
    }

    pub async fn container_exists(&self, account: &str, key: &str, container: &str) -> Result<bool> {
        let exists: ExistsResponse = self
            .run_json(
                &[
                    "storage",
                    "container",
                    "exists",
                    "--name",
                    container,
                    "--account-name",
                    account,
                    "--output",
                    "json",
                ],
                &[(STORAGE_KEY_ENV, key)],
            )
            .await?;
        Ok(exists.exists)
    }

    pub async fn container_create(&self, account: &str, key: &str, container: &str) -> Result<()> {
        self.run_command(
            &[
                "storage",
                "container",
                "create",
                "--name",
                container,
                "--account-name",
                account,
                "--output",
                "json",
            ],
            &[(STORAGE_KEY_ENV, key)],
        )
        .await?;
        Ok(())
    }

    pub async fn blob_list(
        &self,
        account: &str,
        key: &str,
        container: &str,
        prefix: Option<&str>,
    ) -> Result<Vec<BlobItem>> {
        let mut args = vec![
            "storage",
            "blob",
            "list",
            "--container-name",
            container,
            "--account-name",
            account,
            "--num-results",
            "*",
            "--output",
            "json",
        ];
        if let Some(prefix) = prefix {
            args.push("--prefix");
            args.push(prefix);
        }

        let output = self.run_command(&args, &[(STORAGE_KEY_ENV, key)]).await?;
        parse_list(&output)
    }

    pub async fn blob_upload(
        &self,
        account: &str,
        key: &str,
        container: &str,
        file: &Path,
        blob_name: &str,
    ) -> Result<()> {
        let file = file.to_string_lossy();
        self.run_command(
            &[
                "storage",
                "blob",
                "upload",
                "--container-name",
                container,
                "--account-name",
                account,
                "--file",
                &*file,
                "--name",
                blob_name,
                "--overwrite",
                "--output",
                "json",
            ],
            &[(STORAGE_KEY_ENV, key)],
        )
        .await?;
        Ok(())
    }
}

const STORAGE_KEY_ENV: &str = "AZURE_STORAGE_KEY";

/// Response of `az storage container exists`
#[derive(Debug, Clone, Serialize, Deserialize)]
struct ExistsResponse {
    exists: bool,
}

/// Parse a JSON array, treating empty output as an empty list
fn parse_list<T: DeserializeOwned>(output: &str) -> Result<Vec<T>> {
    if output.trim().is_empty() || output.trim() == "[]" {
        return Ok(Vec::new());
    }
    Ok(serde_json::from_str(output)?)
}

fn parse_bool(output: &str) -> Result<bool> {
    match output.trim() {
        "true" => Ok(true),
        "false" => Ok(false),
        other => Err(AzureError::UnexpectedOutput(other.to_string())),
    }
}

/// Map az's stderr to an error kind
fn classify_failure(command: &str, stderr: &str) -> AzureError {
    if stderr.contains("az login") || stderr.contains("AADSTS") {
        AzureError::AuthenticationFailed(stderr.to_string())
    } else if stderr.contains("AlreadyExists") || stderr.contains("already taken") {
        AzureError::AlreadyExists(stderr.to_string())
    } else {
        AzureError::CommandFailed {
            command: command.to_string(),
            stderr: stderr.to_string(),
        }
    }
}
