use anyhow::{bail, Result};
use clap::{Args, Parser, Subcommand};
use colored::*;
use dx_mirror::{logging, ConsoleSink, MirrorConfig, SectionPlan, Supervisor};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

#[derive(Parser)]
#[command(name = "dx-mirror")]
#[command(
    about = "Mirror filtered folders of a workspace into other folders and keep them in sync",
    version
)]
#[command(after_help = "Configuration is read from .dx/mirror.toml or .dx/mirror.json in the workspace,
or from the file given with --config. Each [[sections]] entry needs source, destination
and an explicit deleteEnabled.")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Log debug output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Also write logs to this file
    #[arg(long, global = true, value_name = "FILE")]
    log_file: Option<PathBuf>,
}

#[derive(Args, Clone)]
struct Target {
    /// Workspace root that relative section paths are resolved against
    #[arg(short, long, default_value = ".")]
    workspace: PathBuf,

    /// Config file (defaults to .dx/mirror.toml or .dx/mirror.json)
    #[arg(short, long)]
    config: Option<PathBuf>,
}

impl Default for Target {
    fn default() -> Self {
        Self {
            workspace: ".".into(),
            config: None,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Run the initial copy, then keep watching until Ctrl-C
    Watch(Target),

    /// Run the initial copy once and exit
    Sync(Target),

    /// Show which sections would be activated
    Check(Target),
}

fn load_config(target: &Target) -> Result<MirrorConfig> {
    if let Some(path) = &target.config {
        return MirrorConfig::load(path);
    }

    match MirrorConfig::discover(&target.workspace)? {
        Some((path, config)) => {
            tracing::info!("Using config {}", path.display());
            Ok(config)
        }
        None => bail!(
            "No mirror config found in {} (expected .dx/mirror.toml or .dx/mirror.json)",
            target.workspace.display()
        ),
    }
}

#[tokio::main(flavor = "multi_thread")]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let _log_guard = logging::init(cli.verbose, cli.log_file.as_deref())?;

    let command = cli
        .command
        .unwrap_or_else(|| Commands::Watch(Target::default()));

    match command {
        Commands::Watch(target) => {
            let config = load_config(&target)?;
            println!("{}", "👁  Starting folder mirroring...".cyan().bold());

            let mut supervisor = Supervisor::new(&target.workspace, Arc::new(ConsoleSink))
                .with_debounce(Duration::from_millis(config.debounce_ms));
            let summary = supervisor.activate(&config).await?;
            println!(
                "{} {} section(s) active, {} file(s) copied, {} failed",
                "✓".green(),
                summary.activated,
                summary.copied,
                summary.failed
            );

            if supervisor.sections().is_empty() {
                println!("{}", "No active sections, nothing to watch".yellow());
                return Ok(());
            }
            if !supervisor.watch()? {
                println!(
                    "{}",
                    "Watcher unavailable, initial copy kept but live mirroring is off".yellow()
                );
                return Ok(());
            }

            tokio::signal::ctrl_c().await?;
            supervisor.dispose();
            println!("{}", "Stopped watching".bright_black());
        }

        Commands::Sync(target) => {
            let config = load_config(&target)?;
            let summary =
                Supervisor::reconcile_once(&target.workspace, &config, Arc::new(ConsoleSink)).await?;
            println!(
                "{} {} section(s), {} file(s) copied, {} failed",
                "✓".green(),
                summary.activated,
                summary.copied,
                summary.failed
            );
            if summary.failed > 0 {
                bail!("{} file(s) failed to copy", summary.failed);
            }
        }

        Commands::Check(target) => {
            let config = load_config(&target)?;
            let supervisor = Supervisor::new(&target.workspace, Arc::new(ConsoleSink));

            println!("{}", "Mirror sections".cyan().bold());
            println!("{}", "═".repeat(80).bright_black());

            for plan in supervisor.plan(&config).await {
                match plan {
                    SectionPlan::Active {
                        label,
                        source,
                        destination,
                    } => println!(
                        "{} {} {} → {}",
                        "ACTIVE".green().bold(),
                        label.bright_white(),
                        source.display(),
                        destination.display()
                    ),
                    SectionPlan::Skipped { index } => println!(
                        "{} section {} (missing source or destination)",
                        "SKIP".bright_black().bold(),
                        index + 1
                    ),
                    SectionPlan::NotActivated { label, destination } => println!(
                        "{} {} (destination {} does not exist)",
                        "INACTIVE".yellow().bold(),
                        label.bright_white(),
                        destination.display()
                    ),
                    SectionPlan::Invalid { label, message } => println!(
                        "{} {}: {}",
                        "INVALID".red().bold(),
                        label.bright_white(),
                        message
                    ),
                }
            }
        }
    }

    Ok(())
}
