//! Texnouz charge point simulator: interactive CLI
//!
//! Connects one simulated OCPP 2.0.1 charging station to a CSMS and hands
//! control to an operator REPL.
//!
//! ```sh
//! # Run with default config (~/.config/texnouz-cp/config.toml)
//! cp-simulator ws://localhost:9000/ocpp
//!
//! # Override identity and EVSE count
//! cp-simulator ws://localhost:9000/ocpp --cp-id CP042 --evses 4
//!
//! # Validate config without connecting
//! cp-simulator --check
//! ```

mod repl;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tracing::{error, info, warn};

use texnouz_cp::config::AppConfig;
use texnouz_cp::infrastructure::storage::JsonFileStore;
use texnouz_cp::infrastructure::transport::{connect, run_session, WsCsmsClient};
use texnouz_cp::support::errors::{AppError, InfraError};
use texnouz_cp::support::shutdown::ShutdownSignal;
use texnouz_cp::{default_config_path, init_tracing, ChargePoint};

/// Texnouz charge point simulator: OCPP 2.0.1 charging station with a REPL.
#[derive(Parser, Debug)]
#[command(
    name = "cp-simulator",
    version,
    about = "Simulated OCPP 2.0.1 charging station",
    long_about = "Texnouz charge point simulator. Connects to <WS_URL>/<cp-id> \
                  and accepts operator commands on stdin.\n\n\
                  Default config: ~/.config/texnouz-cp/config.toml"
)]
struct Cli {
    /// WebSocket URL of the CSMS; the station id is appended.
    ws_url: Option<String>,

    /// Path to the configuration file (TOML).
    #[arg(short, long, env = "CP_CONFIG")]
    config: Option<PathBuf>,

    /// Charging station identifier.
    #[arg(long)]
    cp_id: Option<String>,

    /// Vendor name reported in BootNotification.
    #[arg(long)]
    vendor: Option<String>,

    /// Model reported in BootNotification.
    #[arg(long)]
    model: Option<String>,

    /// Firmware version reported in BootNotification.
    #[arg(long)]
    firmware: Option<String>,

    /// Number of EVSEs on a fresh start.
    #[arg(long)]
    evses: Option<u32>,

    /// Snapshot file.
    #[arg(long)]
    state_file: Option<PathBuf>,

    /// Override the log level (trace, debug, info, warn, error).
    #[arg(short, long)]
    log_level: Option<String>,

    /// Validate the configuration and exit without connecting.
    #[arg(long)]
    check: bool,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // ── Load configuration ─────────────────────────────────
    let config_path = cli.config.clone().unwrap_or_else(default_config_path);

    let (mut config, load_error) = match AppConfig::load(&config_path) {
        Ok(cfg) => (cfg, None),
        Err(e) => (AppConfig::default(), Some(e)),
    };
    if let Some(ref level) = cli.log_level {
        config.logging.level = level.clone();
    }
    init_tracing(&config);

    match load_error {
        None => info!("Configuration loaded from {}", config_path.display()),
        Some(e) => {
            error!("Failed to load config from {}: {}", config_path.display(), e);
            error!("Using default configuration.");
        }
    }

    // ── Apply CLI overrides ────────────────────────────────
    apply_overrides(&cli, &mut config);

    // ── Config validation mode ─────────────────────────────
    if cli.check {
        println!("Configuration is valid");
        println!("   Config file : {}", config_path.display());
        println!("   Endpoint    : {}", config.endpoint());
        println!("   EVSEs       : {}", config.station.evse_count);
        println!("   State file  : {}", config.storage.state_file.display());
        println!("   Log level   : {}", config.logging.level);
        return Ok(());
    }

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;
    let result = runtime.block_on(run(config)).map_err(Into::into);
    // stdin is read on a blocking thread that cannot be interrupted
    runtime.shutdown_timeout(Duration::from_millis(500));
    result
}

fn apply_overrides(cli: &Cli, config: &mut AppConfig) {
    if let Some(ref url) = cli.ws_url {
        info!("CLI override: csms.url = {}", url);
        config.csms.url = url.clone();
    }
    if let Some(ref id) = cli.cp_id {
        info!("CLI override: station.id = {}", id);
        config.station.id = id.clone();
    }
    if let Some(ref vendor) = cli.vendor {
        info!("CLI override: station.vendor = {}", vendor);
        config.station.vendor = vendor.clone();
    }
    if let Some(ref model) = cli.model {
        info!("CLI override: station.model = {}", model);
        config.station.model = model.clone();
    }
    if let Some(ref firmware) = cli.firmware {
        info!("CLI override: station.firmware_version = {}", firmware);
        config.station.firmware_version = Some(firmware.clone());
    }
    if let Some(evses) = cli.evses {
        info!("CLI override: station.evse_count = {}", evses);
        config.station.evse_count = evses;
    }
    if let Some(ref path) = cli.state_file {
        info!("CLI override: storage.state_file = {}", path.display());
        config.storage.state_file = path.clone();
    }
    if let Some(ref level) = cli.log_level {
        info!("CLI override: logging.level = {}", level);
    }
}

async fn run(config: AppConfig) -> Result<(), AppError> {
    info!("Starting Charge Point '{}'...", config.station.id);

    let shutdown = ShutdownSignal::new();
    shutdown.listen_for_ctrl_c();

    let (client, outbound) = WsCsmsClient::new(config.csms.request_timeout());
    let store = Arc::new(JsonFileStore::new(config.storage.state_file.clone()));
    let cp = ChargePoint::new(config.to_settings(), client.clone(), store, shutdown.clone());

    let ws_stream = connect(&config.endpoint()).await?;
    let mut session = tokio::spawn(run_session(
        ws_stream,
        client,
        outbound,
        Arc::new(cp.clone()),
        shutdown.clone(),
    ));

    let booting = cp.clone();
    tokio::spawn(async move {
        match booting.boot().await {
            Ok(status) => info!(?status, "Boot finished"),
            Err(e) => error!(error = %e, "BootNotification failed"),
        }
    });

    let session_finished = tokio::select! {
        _ = repl::run(cp.clone()) => false,
        _ = shutdown.wait() => false,
        result = &mut session => {
            report_session(result);
            true
        }
    };

    cp.shutdown().await;
    if !session_finished {
        report_session(session.await);
    }
    Ok(())
}

fn report_session(result: Result<Result<(), InfraError>, tokio::task::JoinError>) {
    match result {
        Ok(Ok(())) => info!("Connection closed"),
        Ok(Err(e)) => warn!(error = %e, "Connection ended with an error"),
        Err(e) => warn!(error = %e, "Connection task failed"),
    }
}
