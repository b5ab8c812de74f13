use agri_yield_core::YieldModel;
use agri_yield_rpc::{start_server, AppState};
use agri_yield_service::{DataService, PredictionService};
use anyhow::Result;
use clap::{value_parser, Arg, ArgAction, Command};
use std::net::TcpListener;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

mod config;
mod version;

use config::{load_config_with_overrides, AppConfig};
use version::{git_commit_hash, NODE_VERSION};

pub(crate) fn cli() -> Command {
    Command::new("agri-yield-node")
        .version(NODE_VERSION)
        .about("Crop yield prediction API and dashboard")
        .arg(
            Arg::new("config")
                .short('c')
                .long("config")
                .value_name("FILE")
                .help("Configuration file path (defaults to config/default.toml when present)"),
        )
        .arg(
            Arg::new("data-dir")
                .short('d')
                .long("data-dir")
                .value_name("DIR")
                .help("Data directory holding raw/ and models/"),
        )
        .arg(
            Arg::new("model-path")
                .long("model-path")
                .value_name("FILE")
                .help("Model artifact path"),
        )
        .arg(
            Arg::new("scaler-path")
                .long("scaler-path")
                .value_name("FILE")
                .help("Scaler artifact path"),
        )
        .arg(
            Arg::new("host")
                .long("host")
                .value_name("HOST")
                .help("Interface to bind"),
        )
        .arg(
            Arg::new("port")
                .short('p')
                .long("port")
                .value_name("PORT")
                .value_parser(value_parser!(u16))
                .help("Port to bind"),
        )
        .arg(
            Arg::new("debug")
                .long("debug")
                .action(ArgAction::SetTrue)
                .help("Enable debug mode (debug logging)"),
        )
        .arg(
            Arg::new("check")
                .long("check")
                .action(ArgAction::SetTrue)
                .help("Run configuration and environment self-checks, then exit"),
        )
        .arg(
            Arg::new("log-level")
                .long("log-level")
                .value_name("LEVEL")
                .value_parser(["trace", "debug", "info", "warn", "error"])
                .help("Override the log level"),
        )
        .arg(
            Arg::new("log-format")
                .long("log-format")
                .value_name("FORMAT")
                .value_parser(["pretty", "compact"])
                .help("Select log output format"),
        )
}

#[tokio::main]
async fn main() -> Result<()> {
    let matches = cli().get_matches();
    let config = load_config_with_overrides(&matches)?;

    if matches.get_flag("check") {
        return run_self_check(&config);
    }

    init_logging(&config)?;
    for warning in config.warnings() {
        warn!("{}", warning);
    }

    info!(
        "Starting agri-yield-node {} (commit {})",
        NODE_VERSION,
        git_commit_hash()
    );
    if let Some(path) = &config.config_path {
        info!("Configuration file: {}", path.display());
    }
    info!("Data directory: {}", config.data_dir.display());
    info!("Debug mode: {}", config.debug);

    let prediction = PredictionService::from_paths(&config.model_path, &config.scaler_path);
    if !prediction.is_ready() {
        warn!("No trained model available; /api/predict will fail until `agri-trainer train` has run");
    }
    let data = DataService::new(&config.dataset_path);

    start_server(AppState::new(prediction, data), &config.bind_addr()).await
}

fn init_logging(config: &AppConfig) -> Result<()> {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    if config.log_format == "compact" {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().compact())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().pretty())
            .init();
    }

    Ok(())
}

fn run_self_check(config: &AppConfig) -> Result<()> {
    println!("Running agri-yield-node self-check...");
    let mut issues = Vec::new();
    let mut notes = config.warnings();

    if let Err(err) = ensure_port_available(&config.host, config.port) {
        issues.push(err);
    }

    if !config.data_dir.is_dir() {
        issues.push(format!(
            "Data directory {} does not exist",
            config.data_dir.display()
        ));
    }

    match YieldModel::load(&config.model_path) {
        Ok(model) => println!("Model: {} ({})", config.model_path.display(), model.kind()),
        Err(err) => notes.push(format!(
            "Model {} unusable ({err}); predictions will fail",
            config.model_path.display()
        )),
    }

    if !config.scaler_path.exists() {
        notes.push(format!("Scaler {} not found", config.scaler_path.display()));
    }

    if !config.dataset_path.exists() {
        notes.push(format!(
            "Dataset {} not found; statistics will be empty",
            config.dataset_path.display()
        ));
    }

    for note in &notes {
        println!("! {note}");
    }

    if issues.is_empty() {
        println!("OK");
        Ok(())
    } else {
        for issue in &issues {
            eprintln!("- {issue}");
        }
        anyhow::bail!("self-check failed")
    }
}

fn ensure_port_available(host: &str, port: u16) -> Result<(), String> {
    let addr = format!("{host}:{port}");
    match TcpListener::bind(&addr) {
        Ok(listener) => drop(listener),
        Err(err) => return Err(format!("HTTP port {addr} is not available for binding: {err}")),
    }
    Ok(())
}
