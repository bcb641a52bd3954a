mod commands;

use clap::Parser;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "sheetflow", version)]
#[command(about = "Deploy Azure app services described in a spreadsheet", long_about = None)]
pub struct Cli {
    /// Configuration workbook (.xlsx). Its file name, without extension, names the stack
    pub config_file: PathBuf,

    /// Run `pulumi <COMMAND>` against the stack instead of deploying
    #[arg(long, value_name = "COMMAND", allow_hyphen_values = true)]
    pub pulumi: Option<String>,

    /// Validate everything and print the Pulumi program without changing anything
    #[arg(long, conflicts_with = "pulumi")]
    pub dry_run: bool,

    /// Pulumi project directory (a temporary directory by default)
    #[arg(long, value_name = "DIR", env = "SHEETFLOW_WORK_DIR")]
    pub work_dir: Option<PathBuf>,

    /// Passphrase for Pulumi's secrets provider
    #[arg(
        long,
        env = "PULUMI_CONFIG_PASSPHRASE",
        default_value = "No secrets here",
        hide_env_values = true
    )]
    pub passphrase: String,

    /// More log output (-v info, -vv debug). RUST_LOG takes precedence
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    commands::apply::handle(&cli).await
}
