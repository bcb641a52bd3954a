use crate::Cli;
use crate::commands::pulumi;
use anyhow::Context;
use colored::Colorize;
use sheetflow_cloud::{
    AzureApi, BackendHandle, BackingStoreProvisioner, BackingStoreSpec, BashScriptRunner,
    PROJECT_NAME, Planner, ScriptRunner, validate_subscription,
};
use sheetflow_cloud_azure::AzureCliProvider;
use sheetflow_core::{SheetConfig, load_sheet_config, stack_name};
use sheetflow_pulumi::{PulumiWorkspace, render_project};
use std::path::Path;

/// Per-run settings taken from the command line
pub struct ApplyOptions<'a> {
    pub stack: &'a str,
    pub passphrase: &'a str,
    pub dry_run: bool,
    pub pulumi: Option<&'a str>,
}

#[derive(Debug, PartialEq, Eq)]
pub enum Outcome {
    /// Rendered `Pulumi.yaml`; nothing was created
    DryRun { project: String },
    PulumiCommand,
    Applied { config_uploaded: bool },
}

pub async fn handle(cli: &Cli) -> anyhow::Result<()> {
    let path = &cli.config_file;
    if !path.is_file() {
        anyhow::bail!("Configuration file not found: {}", path.display());
    }
    let stack = stack_name(path)
        .with_context(|| format!("Cannot derive a stack name from {}", path.display()))?;

    println!("{}", "Reading configuration...".blue().bold());
    let sheet = load_sheet_config(path)
        .with_context(|| format!("Failed to load {}", path.display()))?;
    println!("  Stack: {}", stack.cyan());
    println!("  Subscription: {}", sheet.configuration.subscription.cyan());

    // Keep the temporary project directory alive until the run ends
    let (work_dir, _temp_dir) = match &cli.work_dir {
        Some(dir) => (dir.clone(), None),
        None => {
            let temp = tempfile::Builder::new().prefix("sheetflow-").tempdir()?;
            (temp.path().to_path_buf(), Some(temp))
        }
    };
    if !cli.dry_run {
        std::fs::create_dir_all(&work_dir)
            .with_context(|| format!("Cannot create {}", work_dir.display()))?;
    }

    let options = ApplyOptions {
        stack: &stack,
        passphrase: &cli.passphrase,
        dry_run: cli.dry_run,
        pulumi: cli.pulumi.as_deref(),
    };
    let azure = AzureCliProvider::new();
    let scripts = BashScriptRunner::new(&work_dir);
    match run(&sheet, path, &options, &azure, &scripts, &work_dir).await? {
        Outcome::DryRun { project } => {
            println!();
            println!("{}", "Dry run, nothing was changed. Pulumi program:".yellow());
            println!();
            print!("{}", project);
        }
        Outcome::PulumiCommand => {}
        Outcome::Applied { config_uploaded } => {
            if !config_uploaded {
                println!(
                    "{}",
                    "Deployed, but the state container has no copy of this workbook".yellow()
                );
            }
        }
    }
    Ok(())
}

/// Validate, prepare the state backend and deploy.
///
/// Everything that can reject the sheet, including the program build, runs
/// before the backing store is touched.
pub async fn run(
    sheet: &SheetConfig,
    config_path: &Path,
    options: &ApplyOptions<'_>,
    azure: &dyn AzureApi,
    scripts: &dyn ScriptRunner,
    work_dir: &Path,
) -> anyhow::Result<Outcome> {
    let config = &sheet.configuration;

    let planner = Planner::new(&sheet.templates, &config.subscription_slug);
    let intents = planner.prepare(&sheet.deployments, &sheet.deployment_columns)?;
    println!("  {} {} deployment rows", "✓".green(), intents.len());

    println!();
    println!("{}", "Checking Azure...".blue().bold());
    azure.check_available().await?;
    let ctx = validate_subscription(azure, &config.subscription).await?;
    println!("  {} Subscription {}", "✓".green(), ctx.subscription_id);

    let plan = planner.resolve_resource_groups(intents, azure, &ctx).await?;
    for group in plan.resource_groups.values() {
        println!("  {} Resource group {} ({})", "✓".green(), group.name, group.location);
    }
    let program = plan.into_program(&ctx)?;

    if options.dry_run {
        let backend_url = format!("azblob://{}", config.state.container);
        let project = render_project(PROJECT_NAME, &backend_url, &program)?;
        return Ok(Outcome::DryRun { project });
    }

    println!();
    println!("{}", "Preparing Pulumi state backend...".blue().bold());
    let spec = BackingStoreSpec::new(&config.state, options.stack, options.passphrase);
    let backend = BackingStoreProvisioner::new(azure, scripts, &ctx)
        .ensure(&spec)
        .await?;
    for created in &backend.created {
        println!("  {} Created {}", "+".green(), created);
    }
    println!("  {} {}", "✓".green(), backend.storage_url);

    let workspace = PulumiWorkspace::new(
        work_dir,
        scripts,
        backend.init_script.clone(),
        PROJECT_NAME,
        options.stack,
        &ctx.subscription_id,
    );
    workspace.write_program(&program, &backend.backend_url)?;
    println!("  {} Pulumi project in {}", "✓".green(), workspace.dir().display());

    if let Some(command) = options.pulumi {
        println!();
        pulumi::run_raw(&workspace, command).await?;
        return Ok(Outcome::PulumiCommand);
    }

    println!();
    println!(
        "{}",
        format!("Deploying {} resources...", program.len()).blue().bold()
    );
    workspace.up().await?;
    pulumi::print_summary(&workspace).await;

    let config_uploaded = upload_config(azure, &backend, config_path).await;
    Ok(Outcome::Applied { config_uploaded })
}

/// Keep a copy of the spreadsheet next to the state it produced
async fn upload_config(azure: &dyn AzureApi, backend: &BackendHandle, path: &Path) -> bool {
    let Some(blob_name) = path.file_name().and_then(|n| n.to_str()) else {
        return false;
    };

    match azure
        .upload_blob(&backend.credentials, &backend.container, path, blob_name)
        .await
    {
        Ok(()) => {
            println!(
                "  {} Uploaded {} to {}",
                "✓".green(),
                blob_name,
                backend.container
            );
            true
        }
        Err(e) => {
            tracing::warn!(error = %e, "Configuration upload failed");
            println!(
                "  {} Could not upload {}: {}",
                "⚠".yellow(),
                blob_name,
                e
            );
            false
        }
    }
}
