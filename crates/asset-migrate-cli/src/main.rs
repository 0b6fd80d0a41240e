//! asset-migrate CLI - dependency-ordered asset tree migration.

mod init;

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use asset_migrate::{
    Config, ContentStore, FsContentStore, InMemoryContentStore, MigrateError, Orchestrator,
    RunStatus,
};
use clap::{Parser, Subcommand};
use tokio_util::sync::CancellationToken;
use tracing::{info, Level};

#[cfg(unix)]
use tokio::signal::unix::{signal, SignalKind};

/// Exit code when `--fail-on-anomalies` is set and the run recorded any.
const EXIT_ANOMALIES: u8 = 4;

#[derive(Parser)]
#[command(name = "asset-migrate")]
#[command(about = "Migrate sidecar-described asset trees into a target project")]
#[command(version)]
struct Cli {
    /// Path to YAML configuration file
    #[arg(short, long, default_value = "migrate.yaml")]
    config: PathBuf,

    /// Output JSON result to stdout
    #[arg(long)]
    output_json: bool,

    /// Log format: text or json
    #[arg(long, default_value = "text")]
    log_format: String,

    /// Log verbosity: debug, info, warn, error
    #[arg(long, default_value = "info")]
    verbosity: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the migration
    Run {
        /// Override the source project directory
        #[arg(long)]
        source: Option<PathBuf>,

        /// Override the destination folder inside the target project
        #[arg(long)]
        destination: Option<PathBuf>,

        /// Dry run: translate into memory without writing the target project
        #[arg(long)]
        dry_run: bool,

        /// Write the identifier registry to this file after the run
        #[arg(long)]
        registry_file: Option<PathBuf>,

        /// Start from the registry file written by a previous run
        #[arg(long)]
        incremental: bool,

        /// Exit with code 4 when the run recorded anomalies
        #[arg(long)]
        fail_on_anomalies: bool,
    },

    /// Show what each migrator would handle
    Plan,

    /// Write a starter configuration file
    Init {
        /// Output path for configuration file [default: migrate.yaml]
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Force overwrite existing file
        #[arg(long, short)]
        force: bool,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    match run().await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("{}", e.format_detailed());
            ExitCode::from(e.exit_code())
        }
    }
}

async fn run() -> Result<ExitCode, MigrateError> {
    let cli = Cli::parse();

    // Init does not need an existing config
    if let Commands::Init { output, force } = cli.command {
        let output_path = output.unwrap_or_else(|| PathBuf::from("migrate.yaml"));
        init::write_config(&output_path, force)?;
        println!("Wrote {}", output_path.display());
        return Ok(ExitCode::SUCCESS);
    }

    setup_logging(&cli.verbosity, &cli.log_format);

    let mut config = Config::load(&cli.config)?;
    info!("Loaded configuration from {:?}", cli.config);

    match cli.command {
        Commands::Init { .. } => unreachable!(), // Handled above
        Commands::Plan => {
            let orchestrator = Orchestrator::new(config, Arc::new(InMemoryContentStore::new()));
            let plan = orchestrator.plan()?;

            if cli.output_json {
                println!("{}", plan.to_json()?);
            } else {
                println!("Migration plan:");
                println!("  Source: {}", plan.source_root.display());
                println!("  Destination: {}", plan.destination_root.display());
                for migrator in &plan.migrators {
                    println!(
                        "  {:<9} {} assets ({} without sidecar)",
                        migrator.kind.as_str(), migrator.assets, migrator.missing_sidecars
                    );
                }
                println!("  Total: {} assets", plan.total_assets());
            }
        }

        Commands::Run {
            source,
            destination,
            dry_run,
            registry_file,
            incremental,
            fail_on_anomalies,
        } => {
            // Apply overrides
            if let Some(source) = source {
                config.source.project = source;
            }
            if let Some(destination) = destination {
                config.target.destination = destination;
            }
            config.validate()?;

            let paths = config.project_paths()?;
            let store: Arc<dyn ContentStore> = if dry_run {
                Arc::new(InMemoryContentStore::new())
            } else {
                Arc::new(FsContentStore::new(paths.target_project))
            };

            let mut orchestrator = Orchestrator::new(config, store).incremental(incremental);
            if let Some(path) = registry_file {
                orchestrator = orchestrator.with_registry_file(path);
            }

            let cancel_token = setup_signal_handler();
            let result = orchestrator.run(Some(cancel_token)).await?;

            if cli.output_json {
                println!("{}", result.to_json()?);
            } else {
                let status_msg = match (dry_run, result.status) {
                    (_, RunStatus::Cancelled) => "Migration cancelled.",
                    (true, _) => "Dry run completed!",
                    (false, _) => "Migration completed!",
                };
                println!("\n{}", status_msg);
                println!("  Run ID: {}", result.run_id);
                println!("  Duration: {:.2}s", result.duration_seconds);
                println!(
                    "  Assets: {}/{}",
                    result.assets_migrated, result.assets_discovered
                );
                for summary in &result.migrators {
                    println!(
                        "    {:<9} {}/{} ({} anomalies)",
                        summary.kind.as_str(), summary.migrated, summary.discovered, summary.anomalies
                    );
                }
                if result.has_anomalies {
                    println!(
                        "  Anomalies: {} errors, {} warnings",
                        result.error_count(),
                        result.warning_count()
                    );
                    for anomaly in &result.anomalies {
                        println!("    {}", anomaly);
                    }
                }
                if !result.skipped_migrators.is_empty() {
                    println!("  Skipped migrators: {:?}", result.skipped_migrators);
                }
            }

            if result.status == RunStatus::Cancelled {
                return Err(MigrateError::Cancelled);
            }
            if fail_on_anomalies && result.has_anomalies {
                return Ok(ExitCode::from(EXIT_ANOMALIES));
            }
        }
    }

    Ok(ExitCode::SUCCESS)
}

fn setup_logging(verbosity: &str, format: &str) {
    let level = match verbosity.to_lowercase().as_str() {
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    // stdout carries results only.
    let subscriber = tracing_subscriber::fmt()
        .with_max_level(level)
        .with_target(false)
        .with_writer(std::io::stderr);

    if format == "json" {
        subscriber.json().init();
    } else {
        subscriber.init();
    }
}

/// Cancel the returned token on SIGINT or SIGTERM. The orchestrator checks
/// it between migrators.
#[cfg(unix)]
fn setup_signal_handler() -> CancellationToken {
    let cancel_token = CancellationToken::new();

    for (kind, name) in [
        (SignalKind::interrupt(), "SIGINT"),
        (SignalKind::terminate(), "SIGTERM"),
    ] {
        let token = cancel_token.clone();
        match signal(kind) {
            Ok(mut stream) => {
                tokio::spawn(async move {
                    stream.recv().await;
                    eprintln!("\nReceived {}. Stopping after the current migrator...", name);
                    token.cancel();
                });
            }
            Err(e) => eprintln!("Failed to set up {} handler: {}", name, e),
        }
    }

    cancel_token
}

/// Setup signal handler for Windows (only Ctrl-C)
#[cfg(not(unix))]
fn setup_signal_handler() -> CancellationToken {
    let cancel_token = CancellationToken::new();
    let token = cancel_token.clone();

    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            eprintln!("\nReceived Ctrl-C. Stopping after the current migrator...");
            token.cancel();
        }
    });

    cancel_token
}
