//! Disposable shell scripts
//!
//! Pulumi is driven through short bash scripts that first run the
//! initialisation preamble (exports + `pulumi login`). Each script is written
//! to its own temporary file, which is removed when the run finishes, whether
//! or not bash succeeded.

use crate::error::{CloudError, Result};
use async_trait::async_trait;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::process::Command;
use tracing::debug;

#[async_trait]
pub trait ScriptRunner: Send + Sync {
    /// Run a script with the terminal attached
    async fn run(&self, script: &str) -> Result<()>;

    /// Run a script and return its stdout
    async fn run_captured(&self, script: &str) -> Result<String>;
}

/// Join an initialisation preamble and a script body
pub fn compose(initialiser: &str, script: &str) -> String {
    if initialiser.is_empty() {
        script.to_string()
    } else {
        format!("{}\n{}", initialiser, script)
    }
}

/// Runs scripts with `bash` inside a working directory
pub struct BashScriptRunner {
    work_dir: PathBuf,
    envs: Vec<(String, String)>,
}

impl BashScriptRunner {
    pub fn new(work_dir: impl AsRef<Path>) -> Self {
        Self {
            work_dir: work_dir.as_ref().to_path_buf(),
            envs: Vec::new(),
        }
    }

    /// Extra environment variable for every script
    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.envs.push((key.into(), value.into()));
        self
    }

    fn write_script(&self, script: &str) -> Result<tempfile::NamedTempFile> {
        let mut file = tempfile::Builder::new()
            .prefix("sheetflow-")
            .suffix(".sh")
            .tempfile()?;
        file.write_all(script.as_bytes())?;
        file.flush()?;
        Ok(file)
    }

    fn command(&self, path: &Path) -> Command {
        let mut cmd = Command::new("bash");
        cmd.arg(path);
        cmd.current_dir(&self.work_dir);
        cmd.envs(self.envs.iter().map(|(k, v)| (k.as_str(), v.as_str())));
        cmd
    }
}

#[async_trait]
impl ScriptRunner for BashScriptRunner {
    async fn run(&self, script: &str) -> Result<()> {
        let file = self.write_script(script)?;
        debug!(script = %file.path().display(), command = %last_command(script), "Running script");

        let status = self.command(file.path()).status().await?;
        // `file` is dropped (and deleted) on every path out of this function
        if !status.success() {
            return Err(CloudError::ScriptFailed {
                status: status.to_string(),
                command: last_command(script).to_string(),
            });
        }
        Ok(())
    }

    async fn run_captured(&self, script: &str) -> Result<String> {
        let file = self.write_script(script)?;
        debug!(script = %file.path().display(), command = %last_command(script), "Running script (captured)");

        let output = self
            .command(file.path())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            debug!(stderr = %stderr.trim(), "Script failed");
            return Err(CloudError::ScriptFailed {
                status: output.status.to_string(),
                command: last_command(script).to_string(),
            });
        }
        Ok(String::from_utf8_lossy(&output.stdout).to_string())
    }
}

/// Last non-empty line of a script, used in logs and errors instead of the
/// whole text, which may hold credentials
fn last_command(script: &str) -> &str {
    script
        .lines()
        .map(str::trim)
        .rfind(|line| !line.is_empty())
        .unwrap_or_default()
}
