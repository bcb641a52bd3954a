//! Pulumi stack operations
//!
//! Every command runs as a disposable script that starts with the backend
//! initialisation preamble, so Pulumi is always logged in to the blob
//! backend of this run.

use crate::error::{PulumiError, Result};
use crate::program::{PROJECT_FILE, render_project};
use serde::{Deserialize, Serialize};
use sheetflow_cloud::{Program, ScriptRunner, compose};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// One entry of `pulumi stack history`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateSummary {
    pub kind: String,
    pub result: String,
    #[serde(default)]
    pub resource_changes: BTreeMap<String, u64>,
}

impl UpdateSummary {
    pub fn succeeded(&self) -> bool {
        self.result == "succeeded"
    }

    /// Changes that actually modified something
    pub fn changed(&self) -> impl Iterator<Item = (&str, u64)> {
        self.resource_changes
            .iter()
            .filter(|(op, count)| op.as_str() != "same" && **count > 0)
            .map(|(op, count)| (op.as_str(), *count))
    }
}

/// A Pulumi project directory bound to one stack
pub struct PulumiWorkspace<'a> {
    dir: PathBuf,
    scripts: &'a dyn ScriptRunner,
    init_script: String,
    project: String,
    stack: String,
    subscription_id: String,
}

impl<'a> PulumiWorkspace<'a> {
    pub fn new(
        dir: impl AsRef<Path>,
        scripts: &'a dyn ScriptRunner,
        init_script: impl Into<String>,
        project: impl Into<String>,
        stack: impl Into<String>,
        subscription_id: impl Into<String>,
    ) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
            scripts,
            init_script: init_script.into(),
            project: project.into(),
            stack: stack.into(),
            subscription_id: subscription_id.into(),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn stack(&self) -> &str {
        &self.stack
    }

    /// Write `Pulumi.yaml` into the project directory
    pub fn write_program(&self, program: &Program, backend_url: &str) -> Result<PathBuf> {
        std::fs::create_dir_all(&self.dir)?;
        let path = self.dir.join(PROJECT_FILE);
        std::fs::write(&path, render_project(&self.project, backend_url, program)?)?;
        debug!(path = %path.display(), resources = program.len(), "Wrote Pulumi program");
        Ok(path)
    }

    fn select_stack(&self) -> String {
        format!(
            "export ARM_SUBSCRIPTION_ID={}\npulumi stack select {}",
            shell_words::quote(&self.subscription_id),
            shell_words::quote(&self.stack)
        )
    }

    /// `pulumi up` without a preview
    pub async fn up(&self) -> Result<()> {
        info!(stack = %self.stack, "Running pulumi up");
        let script = format!("{}\npulumi up --yes --skip-preview", self.select_stack());
        self.scripts.run(&compose(&self.init_script, &script)).await?;
        Ok(())
    }

    /// Run `pulumi <args>` against the stack.
    ///
    /// `args` is split like a shell would and re-quoted, so only Pulumi's own
    /// arguments reach bash.
    pub async fn run_raw(&self, args: &str) -> Result<()> {
        let words = shell_words::split(args)
            .map_err(|e| PulumiError::InvalidCommand(format!("{}: {}", args, e)))?;
        if words.is_empty() {
            return Err(PulumiError::InvalidCommand("empty command".to_string()));
        }

        let script = format!(
            "{}\npulumi {}",
            self.select_stack(),
            shell_words::join(&words)
        );
        info!(stack = %self.stack, command = %shell_words::join(&words), "Running pulumi");
        self.scripts.run(&compose(&self.init_script, &script)).await?;
        Ok(())
    }

    /// The most recent update of the stack
    pub async fn last_update(&self) -> Result<UpdateSummary> {
        let script = format!(
            "pulumi stack history --stack {} --json --page-size 1",
            shell_words::quote(&self.stack)
        );
        let output = self
            .scripts
            .run_captured(&compose(&self.init_script, &script))
            .await?;
        parse_history(&output)?
            .into_iter()
            .next()
            .ok_or_else(|| PulumiError::NoHistory(self.stack.clone()))
    }
}

/// Parse `pulumi stack history --json`, skipping anything `pulumi login`
/// printed before the JSON
fn parse_history(output: &str) -> Result<Vec<UpdateSummary>> {
    let start = if output.trim_start().starts_with('[') {
        0
    } else {
        output
            .find("\n[")
            .map(|at| at + 1)
            .ok_or_else(|| PulumiError::UnexpectedOutput(output.trim().to_string()))?
    };

    Ok(serde_json::from_str(&output[start..])?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingScripts {
        scripts: Mutex<Vec<String>>,
        output: String,
    }

    #[async_trait]
    impl ScriptRunner for RecordingScripts {
        async fn run(&self, script: &str) -> sheetflow_cloud::Result<()> {
            self.scripts.lock().unwrap().push(script.to_string());
            Ok(())
        }

        async fn run_captured(&self, script: &str) -> sheetflow_cloud::Result<String> {
            self.scripts.lock().unwrap().push(script.to_string());
            Ok(self.output.clone())
        }
    }

    const HISTORY: &str = r#"Logged in to build-agent as runner (azblob://pulumi)
[
    {
        "kind": "update",
        "startTime": "2024-05-01T10:00:00Z",
        "message": "",
        "environment": {},
        "config": {},
        "result": "succeeded",
        "endTime": "2024-05-01T10:02:00Z",
        "resourceChanges": {"create": 2, "same": 10, "update": 1}
    }
]
"#;

    fn workspace<'a>(dir: &Path, scripts: &'a RecordingScripts) -> PulumiWorkspace<'a> {
        PulumiWorkspace::new(dir, scripts, "#!/bin/bash\nset -e", "devops", "acme-prod", "sub-1")
    }

    #[test]
    fn test_parse_history_after_login_banner() {
        let history = parse_history(HISTORY).unwrap();
        assert_eq!(history.len(), 1);
        assert!(history[0].succeeded());
        assert_eq!(
            history[0].changed().collect::<Vec<_>>(),
            vec![("create", 2), ("update", 1)]
        );
    }

    #[test]
    fn test_parse_history_without_json() {
        assert!(matches!(
            parse_history("error: no stack selected"),
            Err(PulumiError::UnexpectedOutput(_))
        ));
    }

    #[tokio::test]
    async fn test_up_script() {
        let dir = tempfile::tempdir().unwrap();
        let scripts = RecordingScripts::default();
        workspace(dir.path(), &scripts).up().await.unwrap();

        let recorded = scripts.scripts.lock().unwrap().clone();
        assert_eq!(
            recorded,
            vec![
                "#!/bin/bash\nset -e\n\
                 export ARM_SUBSCRIPTION_ID=sub-1\n\
                 pulumi stack select acme-prod\n\
                 pulumi up --yes --skip-preview"
            ]
        );
    }

    #[tokio::test]
    async fn test_run_raw_requotes_arguments() {
        let dir = tempfile::tempdir().unwrap();
        let scripts = RecordingScripts::default();
        let ws = workspace(dir.path(), &scripts);

        ws.run_raw("config set greeting 'hello world'").await.unwrap();
        assert!(matches!(ws.run_raw("   ").await, Err(PulumiError::InvalidCommand(_))));
        assert!(matches!(ws.run_raw("config set 'oops").await, Err(PulumiError::InvalidCommand(_))));

        let recorded = scripts.scripts.lock().unwrap().clone();
        assert_eq!(recorded.len(), 1);
        assert!(recorded[0].ends_with("pulumi config set greeting 'hello world'"));
    }

    #[tokio::test]
    async fn test_last_update() {
        let dir = tempfile::tempdir().unwrap();
        let scripts = RecordingScripts {
            output: HISTORY.to_string(),
            ..Default::default()
        };
        let summary = workspace(dir.path(), &scripts).last_update().await.unwrap();
        assert_eq!(summary.resource_changes["same"], 10);
    }

    #[tokio::test]
    async fn test_empty_history() {
        let dir = tempfile::tempdir().unwrap();
        let scripts = RecordingScripts {
            output: "[]".to_string(),
            ..Default::default()
        };
        assert!(matches!(
            workspace(dir.path(), &scripts).last_update().await,
            Err(PulumiError::NoHistory(stack)) if stack == "acme-prod"
        ));
    }

    #[test]
    fn test_write_program() {
        let dir = tempfile::tempdir().unwrap();
        let scripts = RecordingScripts::default();
        let path = workspace(&dir.path().join("project"), &scripts)
            .write_program(&Program::new(), "azblob://pulumi")
            .unwrap();

        assert_eq!(path.file_name().unwrap(), PROJECT_FILE);
        let text = std::fs::read_to_string(path).unwrap();
        assert!(text.contains("runtime: yaml"));
    }
}
