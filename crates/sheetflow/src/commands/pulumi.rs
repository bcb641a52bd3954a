use colored::Colorize;
use sheetflow_pulumi::PulumiWorkspace;

pub async fn run_raw(workspace: &PulumiWorkspace<'_>, command: &str) -> anyhow::Result<()> {
    println!(
        "{} pulumi {} ({})",
        "Running".blue().bold(),
        command,
        workspace.stack().cyan()
    );
    workspace.run_raw(command).await?;
    Ok(())
}

/// Print the resource changes of the last update
pub async fn print_summary(workspace: &PulumiWorkspace<'_>) {
    let summary = match workspace.last_update().await {
        Ok(summary) => summary,
        Err(e) => {
            tracing::warn!(error = %e, "Could not read the update summary");
            return;
        }
    };

    println!();
    if summary.succeeded() {
        println!("{}", "✓ Deployment complete".green().bold());
    } else {
        println!("{}", format!("Update {}: {}", summary.kind, summary.result).yellow());
    }

    let mut changed = summary.changed().peekable();
    if changed.peek().is_none() {
        println!("  No changes");
    }
    for (op, count) in changed {
        println!("  {:<8} {}", op, count);
    }
    if let Some(same) = summary.resource_changes.get("same") {
        println!("  {:<8} {}", "same".dimmed(), same);
    }
}
