//! Configuration module
//!
//! TOML file with one table per concern. Every table and field is optional;
//! a missing file yields the defaults.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::application::station::StationSettings;
use crate::infrastructure::storage::DEFAULT_STATE_FILE;
use crate::support::errors::InfraError;

/// Environment variable naming an alternative config file.
pub const CONFIG_ENV: &str = "CP_CONFIG";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub station: StationConfig,
    pub csms: CsmsConfig,
    pub charging: ChargingConfig,
    pub storage: StorageConfig,
    pub logging: LoggingConfig,
}

/// Identity reported in BootNotification.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StationConfig {
    pub id: String,
    pub vendor: String,
    pub model: String,
    pub serial_number: Option<String>,
    pub firmware_version: Option<String>,
    pub evse_count: u32,
}

impl Default for StationConfig {
    fn default() -> Self {
        Self {
            id: "CP001".to_string(),
            vendor: "AcmeCorp".to_string(),
            model: "ModelX".to_string(),
            serial_number: None,
            firmware_version: None,
            evse_count: 2,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CsmsConfig {
    /// Base URL; the station id is appended as the last path segment.
    pub url: String,
    pub request_timeout_secs: u64,
}

impl Default for CsmsConfig {
    fn default() -> Self {
        Self {
            url: "ws://localhost:9000/ocpp".to_string(),
            request_timeout_secs: 30,
        }
    }
}

impl CsmsConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs.max(1))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChargingConfig {
    pub meter_interval_secs: u64,
}

impl Default for ChargingConfig {
    fn default() -> Self {
        Self {
            meter_interval_secs: 10,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub state_file: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            state_file: PathBuf::from(DEFAULT_STATE_FILE),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// EnvFilter directive, e.g. `info` or `texnouz_cp=debug`.
    pub level: String,
    /// `text` or `json`.
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "text".to_string(),
        }
    }
}

impl AppConfig {
    /// Read `path`. A missing file is not an error.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, InfraError> {
        let path = path.as_ref();
        if !path.exists() {
            return Ok(Self::default());
        }
        let text = std::fs::read_to_string(path)?;
        Self::parse(&text)
    }

    pub fn parse(text: &str) -> Result<Self, InfraError> {
        Ok(toml::from_str(text)?)
    }

    /// Station identity and tuning for the application layer.
    pub fn to_settings(&self) -> StationSettings {
        let station = &self.station;
        StationSettings {
            station_id: station.id.clone(),
            vendor: station.vendor.clone(),
            model: station.model.clone(),
            serial_number: Some(
                station
                    .serial_number
                    .clone()
                    .unwrap_or_else(|| format!("afef3d68-{}", station.id)),
            ),
            firmware_version: station.firmware_version.clone(),
            evse_count: station.evse_count.max(1),
            meter_interval: Duration::from_secs(self.charging.meter_interval_secs.max(1)),
        }
    }

    /// WebSocket endpoint for this station: `<csms url>/<station id>`.
    pub fn endpoint(&self) -> String {
        format!("{}/{}", self.csms.url.trim_end_matches('/'), self.station.id)
    }
}

/// `$CP_CONFIG`, else `~/.config/texnouz-cp/config.toml`.
pub fn default_config_path() -> PathBuf {
    if let Ok(path) = std::env::var(CONFIG_ENV) {
        if !path.is_empty() {
            return PathBuf::from(path);
        }
    }
    dirs_next::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("texnouz-cp")
        .join("config.toml")
}

/// Install the global subscriber. `RUST_LOG` wins over the configured
/// level. Output goes to stderr so the REPL keeps stdout.
pub fn init_tracing(config: &AppConfig) {
    use tracing_subscriber::layer::SubscriberExt;
    use tracing_subscriber::util::SubscriberInitExt;

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.logging.level));

    match config.logging.format.to_lowercase().as_str() {
        "json" => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
                .init();
        }
        _ => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
                .init();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_gives_defaults() {
        let config = AppConfig::parse("").unwrap();
        assert_eq!(config, AppConfig::default());
        assert_eq!(config.csms.request_timeout(), Duration::from_secs(30));
        assert_eq!(config.storage.state_file, PathBuf::from(DEFAULT_STATE_FILE));
    }

    #[test]
    fn partial_tables_keep_other_defaults() {
        let config = AppConfig::parse(
            r#"
            [station]
            id = "CP042"
            evse_count = 4

            [csms]
            url = "ws://csms.local:9000/ocpp/"

            [charging]
            meter_interval_secs = 5

            [logging]
            level = "debug"
            "#,
        )
        .unwrap();

        assert_eq!(config.station.vendor, "AcmeCorp");
        assert_eq!(config.endpoint(), "ws://csms.local:9000/ocpp/CP042");

        let settings = config.to_settings();
        assert_eq!(settings.station_id, "CP042");
        assert_eq!(settings.evse_count, 4);
        assert_eq!(settings.meter_interval, Duration::from_secs(5));
        assert_eq!(settings.serial_number.as_deref(), Some("afef3d68-CP042"));
        assert_eq!(config.logging.level, "debug");
    }

    #[test]
    fn invalid_toml_is_an_error() {
        assert!(matches!(
            AppConfig::parse("[station\nid = 1"),
            Err(InfraError::Config(_))
        ));
    }

    #[test]
    fn missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = AppConfig::load(dir.path().join("absent.toml")).unwrap();
        assert_eq!(config, AppConfig::default());
    }

    #[test]
    fn loads_file_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[storage]\nstate_file = \"/var/lib/cp/state.json\"\n").unwrap();
        let config = AppConfig::load(&path).unwrap();
        assert_eq!(
            config.storage.state_file,
            PathBuf::from("/var/lib/cp/state.json")
        );
    }
}
