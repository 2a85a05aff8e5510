use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use consta_common::observability::{init_logging, LogConfig, LogFormat};
use consta_config::{ConstaConfig, ConstaConfigLoader, LogFormatSetting};

mod commands;

#[derive(Parser)]
#[command(
    name = "consta",
    about = "Clean-record certificates from the DETRAN-RJ portal",
    version
)]
struct Cli {
    /// Configuration file; `consta.toml` in the working directory is used
    /// when present.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Echo log events to stderr regardless of the logging section.
    #[arg(long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Fetch and classify one clean-record certificate.
    Certificate {
        /// CPF, with or without separators.
        #[arg(long, env = "CONSTA_CPF")]
        cpf: String,
        /// CNH registration number.
        #[arg(long, env = "CONSTA_CNH")]
        cnh: String,
        /// Output PDF path; defaults to `certidao-<case_id>.pdf`.
        #[arg(long)]
        out: Option<PathBuf>,
        /// Retry transient failures per the configured policy.
        #[arg(long)]
        retry: bool,
        /// Known CNH point balance, to refine the risk assessment.
        #[arg(long)]
        points: Option<u32>,
    },
    /// Query the solving service account balance.
    Balance,
    /// Inspect or update the lead registry.
    Leads {
        #[command(subcommand)]
        command: commands::LeadsCommand,
    },
    /// Extract identifiers from OCR'd license text.
    ParseIntake {
        /// Text file to parse; stdin when absent.
        #[arg(long)]
        file: Option<PathBuf>,
        /// Record the parsed identifiers in the lead registry.
        #[arg(long)]
        observe: bool,
        /// Source tag for the observation.
        #[arg(long, value_enum, default_value_t = commands::SourceArg::Camera)]
        source: commands::SourceArg,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let loader = match &cli.config {
        Some(path) => ConstaConfigLoader::new().with_file(path),
        None => ConstaConfigLoader::new().with_optional_file("consta.toml"),
    };
    let config: ConstaConfig = loader.load().context("loading configuration")?;

    init_logging(log_config(&config, cli.verbose))?;

    match cli.command {
        Command::Certificate {
            cpf,
            cnh,
            out,
            retry,
            points,
        } => commands::run_certificate(&config, &cpf, &cnh, out, retry, points).await,
        Command::Balance => commands::run_balance(&config).await,
        Command::Leads { command } => commands::run_leads(&config, command).await,
        Command::ParseIntake {
            file,
            observe,
            source,
        } => commands::run_parse_intake(&config, file, observe, source).await,
    }
}

fn log_config(config: &ConstaConfig, verbose: bool) -> LogConfig {
    LogConfig {
        app_name: "consta-app",
        log_dir: config.logging.dir.clone(),
        emit_stderr: config.logging.stderr || verbose,
        format: match config.logging.format {
            LogFormatSetting::Text => LogFormat::Text,
            LogFormatSetting::Json => LogFormat::Json,
        },
        default_filter: config.logging.filter.clone(),
    }
}
