//! Calibrate CLI Application
//!
//! Interactive generator of calibration stimuli: ramped pure tones and
//! band-limited noise, played on one channel of an output device.

mod line;
mod session;
mod tui;

use anyhow::Context;
use calibrate_core::domain::audio::AudioEnumerator;
use calibrate_core::domain::config::{CalibrateConfig, ConfigManager, FrontEnd};
use calibrate_core::domain::params::ParameterStore;
use calibrate_infra::audio::{CpalBackend, CpalEnumerator};
use clap::Parser;
use session::Session;
use std::fs::File;
use std::io;
use std::path::PathBuf;
use std::sync::Mutex;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "calibrate")]
#[command(about = "Generate and play calibration tones and band-limited noise", long_about = None)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Configuration file (default: <config dir>/calibrate/config.toml)
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Write logs to this file (the full-screen menu otherwise discards them)
    #[arg(long, value_name = "PATH")]
    log_file: Option<PathBuf>,

    /// Use the line-based menu instead of the full-screen one
    #[arg(long)]
    line: bool,

    /// List output devices with their ids and exit
    #[arg(long)]
    list_devices: bool,

    /// Seed for the noise generator
    #[arg(long)]
    seed: Option<u64>,
}

fn init_tracing(verbose: bool, front_end: FrontEnd, log_file: Option<&PathBuf>) -> anyhow::Result<()> {
    let default_level = if verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    match (front_end, log_file) {
        (_, Some(path)) => {
            let file = File::create(path)
                .with_context(|| format!("cannot create log file {}", path.display()))?;
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_ansi(false)
                .with_writer(Mutex::new(file))
                .init();
        }
        // The full-screen menu owns the terminal
        (FrontEnd::Tui, None) => {}
        (FrontEnd::Line, None) => {
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_writer(io::stderr)
                .init();
        }
    }
    Ok(())
}

fn config_manager(path: Option<PathBuf>) -> Option<ConfigManager> {
    match path {
        Some(path) => Some(ConfigManager::new(path)),
        None => ConfigManager::default_config_dir()
            .ok()
            .map(ConfigManager::from_dir),
    }
}

fn list_devices() -> anyhow::Result<()> {
    let devices = CpalEnumerator::new().output_devices()?;
    if devices.is_empty() {
        println!("No output devices found");
    }
    for device in devices {
        let rate = device
            .default_sample_rate
            .map(|hz| format!(", default {} Hz", hz))
            .unwrap_or_default();
        println!(
            "{}: {} ({} output channels{})",
            device.id, device.name, device.max_output_channels, rate
        );
    }
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let (config, config_error) = match config_manager(cli.config.clone()) {
        Some(manager) => match manager.try_load().await {
            Ok(config) => (config.unwrap_or_default(), None),
            Err(e) => (
                CalibrateConfig::default(),
                Some(format!("{}: {}", manager.config_path().display(), e)),
            ),
        },
        None => (CalibrateConfig::default(), None),
    };

    let front_end = if cli.line || cli.list_devices {
        FrontEnd::Line
    } else {
        config.app.front_end
    };
    init_tracing(cli.verbose, front_end, cli.log_file.as_ref())?;

    if let Some(e) = &config_error {
        warn!(error = %e, "Ignoring configuration file");
        eprintln!("Configuration error, using defaults: {}", e);
    }

    if cli.list_devices {
        return list_devices();
    }

    let mut params = ParameterStore::new();
    for (id, e) in config.apply_starting_values(&mut params) {
        eprintln!("Ignoring configured {}: {}", id, e);
    }

    let seed = cli.seed.or(config.noise.seed);
    let mut session = Session::new(CpalBackend::new(), params, seed);
    let poll_interval = config.app.poll_interval();

    info!(?front_end, "Calibrate starting");
    match front_end {
        FrontEnd::Tui => tui::run(&mut session, poll_interval)?,
        FrontEnd::Line => {
            let stdin = io::stdin();
            line::run(&mut session, stdin.lock(), io::stdout(), poll_interval)?
        }
    }

    Ok(())
}
