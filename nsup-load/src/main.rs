//! nsup-load - load a local typing schema into a nomenclature registry
//!
//! Validates the local schema, then creates (or resumes) the registry schema
//! and uploads every locus with its annotation, alleles and allele lengths.

use anyhow::{Context, Result};
use clap::Parser;
use nsup_common::config::{load_or_default, LoggingConfig};
use nsup_load::config::{CliSettings, LoaderSettings};
use nsup_load::services::{prepare_local_schema, LoadRequest, LoadWorkflow, NsClient, UniprotClient};
use nsup_load::LoadError;
use std::fs::OpenOptions;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

/// Command-line arguments for nsup-load
#[derive(Parser, Debug)]
#[command(name = "nsup-load")]
#[command(about = "Load a local typing schema into a nomenclature registry")]
#[command(version)]
struct Args {
    /// Local schema directory
    #[arg(short = 'i', long = "schema-dir")]
    schema_dir: PathBuf,

    /// Registry species identifier or species name
    #[arg(long)]
    species: String,

    /// Schema description (unique per species)
    #[arg(long)]
    description: String,

    /// Prefix for the registry locus identifiers
    #[arg(long)]
    prefix: String,

    /// Worker count for quality control
    #[arg(long = "cpu")]
    cpu_cores: Option<usize>,

    /// Concurrent annotation lookups
    #[arg(long)]
    threads: Option<usize>,

    /// Registry API base URL
    #[arg(long)]
    ns_url: Option<String>,

    #[arg(long)]
    username: Option<String>,

    #[arg(long)]
    password: Option<String>,

    /// Resume an interrupted upload
    #[arg(long)]
    continue_up: bool,

    /// Keep intermediate work files
    #[arg(long)]
    keep_intermediate: bool,

    /// Bootstrap TOML config file
    #[arg(long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();

    let toml = match load_or_default(args.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("{}", e);
            return ExitCode::FAILURE;
        }
    };

    if let Err(e) = init_tracing(&toml.logging) {
        eprintln!("Failed to initialize logging: {:#}", e);
        return ExitCode::FAILURE;
    }

    info!(
        "Starting nsup-load v{} [{}] built {} ({})",
        env!("CARGO_PKG_VERSION"),
        env!("GIT_HASH"),
        env!("BUILD_TIMESTAMP"),
        env!("BUILD_PROFILE")
    );

    match run(args, toml).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => match e.downcast_ref::<LoadError>() {
            Some(load_error) if load_error.is_informational() => {
                info!("{}", load_error);
                ExitCode::SUCCESS
            }
            _ => {
                error!("{:#}", e);
                ExitCode::FAILURE
            }
        },
    }
}

/// RUST_LOG wins over the configured level
fn init_tracing(logging: &LoggingConfig) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&logging.level))
        .context("Invalid log level")?;

    match &logging.file {
        Some(path) => {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("Cannot open log file {}", path.display()))?;

            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_ansi(false)
                .with_writer(Arc::new(file))
                .try_init()
                .map_err(|e| anyhow::anyhow!(e))
        }
        None => tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .try_init()
            .map_err(|e| anyhow::anyhow!(e)),
    }
}

async fn run(args: Args, toml: nsup_common::config::TomlConfig) -> Result<()> {
    let settings = LoaderSettings::resolve(
        CliSettings {
            ns_url: args.ns_url,
            username: args.username,
            password: args.password,
            cpu_cores: args.cpu_cores,
            threads: args.threads,
        },
        &toml,
    )
    .map_err(LoadError::from)?;

    let request = LoadRequest {
        schema_dir: args.schema_dir,
        species: args.species,
        description: args.description,
        prefix: args.prefix,
        cpu_cores: settings.cpu_cores,
        threads: settings.threads,
        continue_up: args.continue_up,
        keep_intermediate: args.keep_intermediate || settings.keep_intermediate,
    };

    // Local checks come before any network contact
    let schema = prepare_local_schema(&request.schema_dir)?;

    let registry = NsClient::login(
        &settings.ns_url,
        &settings.username,
        &settings.password,
        settings.request_timeout,
    )
    .await
    .map_err(LoadError::from)?;

    let knowledge_base = UniprotClient::new(
        &settings.sparql_endpoint,
        settings.sparql_timeout,
        settings.sparql_requests_per_second,
    )
    .context("Failed to build knowledge-base client")?;

    let workflow = LoadWorkflow::new(Arc::new(registry), Arc::new(knowledge_base));
    info!(run_id = %workflow.run_id(), "Uploading schema from {}", request.schema_dir.display());

    let report = workflow.run(&request, &schema).await?;
    for line in report.summary_lines() {
        info!("{}", line);
    }

    Ok(())
}
