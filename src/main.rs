mod cli_logger;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use std::path::PathBuf;
use std::process::ExitCode;

use cli_logger::CliLogger;
use pprof_report::{Config, ReportArgs, env_command, report_command};

#[derive(Debug, Parser)]
#[command(name = "pprof-report", version, about = "Collect runtime profiles from a service into one report")]
struct Cli {
    /// Config file; missing files fall back to defaults.
    #[arg(long, global = true, default_value = "pprof-report.toml")]
    config: PathBuf,
    /// Print machine-readable JSON instead of text.
    #[arg(long, global = true)]
    json: bool,
    #[arg(long, global = true)]
    no_color: bool,
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Collect profiles, trace and graphs from a running service.
    Report(ReportArgs),
    /// Show which external tools a report run would use.
    Env,
    /// Print the version.
    Version,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing();
    let logger = CliLogger::new(cli.json, cli.no_color);

    match run(&cli, &logger) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            logger.print_error(&format!("{err:#}"));
            ExitCode::FAILURE
        }
    }
}

fn run(cli: &Cli, logger: &CliLogger) -> Result<()> {
    let config = Config::load_optional(&cli.config);
    match &cli.command {
        Command::Report(args) => {
            let summary = report_command(&config, args)?;
            logger.print_run_summary(&summary)
        }
        Command::Env => logger.print_serialized(&env_command(&config)),
        Command::Version => logger.print_serialized(&serde_json::json!({
            "name": env!("CARGO_PKG_NAME"),
            "version": env!("CARGO_PKG_VERSION"),
        })),
    }
}

/// Logs go to stderr so `--json` output on stdout stays parseable.
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}
