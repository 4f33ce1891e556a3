//! Configuration loading and config file resolution
//!
//! Bootstrap configuration comes from a TOML file. Resolution priority:
//! 1. Explicit path (command-line argument or `SEIS_GATEWAY_CONFIG`)
//! 2. Per-user config file (`~/.config/seis/gateway.toml`)
//! 3. Compiled defaults
//!
//! A missing file is never fatal; every field has a built-in default.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Environment variable naming an explicit config file
pub const CONFIG_ENV_VAR: &str = "SEIS_GATEWAY_CONFIG";

/// Bootstrap configuration loaded from TOML
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TomlConfig {
    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub logging: LoggingConfig,

    /// Upstream collaborator endpoints
    #[serde(default)]
    pub services: ServicesConfig,

    #[serde(default)]
    pub fk: FkDefaults,

    #[serde(default)]
    pub beam: BeamDefaults,

    #[serde(default)]
    pub events: EventsConfig,
}

/// HTTP listener settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

/// Base URL and endpoint paths of the upstream services
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServicesConfig {
    pub base_url: String,
    pub timeout_seconds: u64,
    pub channel_segments_by_ids: String,
    pub channel_segments_by_channels: String,
    pub compute_fk: String,
    pub compute_beam: String,
    pub filter_waveforms: String,
    pub signal_detection_by_id: String,
    pub signal_detection_store: String,
    pub station_by_id: String,
}

impl Default for ServicesConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8080".to_string(),
            timeout_seconds: 60,
            channel_segments_by_ids: "/coi/channel-segments/query/segment-ids".to_string(),
            channel_segments_by_channels: "/coi/channel-segments/query/channel-ids".to_string(),
            compute_fk: "/signal-enhancement/fk/spectra/interactive".to_string(),
            compute_beam: "/signal-enhancement/beam/streaming".to_string(),
            filter_waveforms: "/signal-enhancement/waveform-filtering/streaming".to_string(),
            signal_detection_by_id: "/coi/signal-detections/query/id".to_string(),
            signal_detection_store: "/coi/signal-detections/store".to_string(),
            station_by_id: "/coi/stations/query/id".to_string(),
        }
    }
}

impl ServicesConfig {
    /// Join the base URL and an endpoint path
    pub fn url(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.base_url.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }
}

/// One frequency band, in Hz
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FrequencyBandConfig {
    pub min_frequency_hz: f64,
    pub max_frequency_hz: f64,
}

/// FK request defaults
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FkDefaults {
    /// Substring a channel name must contain to contribute to an FK
    pub vertical_channel_pattern: String,
    /// Bands used for thumbnails when the caller supplies none
    pub default_frequency_bands: Vec<FrequencyBandConfig>,
}

impl Default for FkDefaults {
    fn default() -> Self {
        let band = |min_frequency_hz, max_frequency_hz| FrequencyBandConfig {
            min_frequency_hz,
            max_frequency_hz,
        };
        Self {
            vertical_channel_pattern: "SHZ".to_string(),
            default_frequency_bands: vec![
                band(0.5, 2.0),
                band(1.0, 2.5),
                band(1.5, 3.0),
                band(2.0, 4.0),
                band(3.0, 6.0),
            ],
        }
    }
}

/// Beam request defaults
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BeamDefaults {
    /// Seconds of waveform before the arrival
    pub lead_beam_seconds: f64,
    /// Seconds of waveform after the arrival
    pub lag_beam_seconds: f64,
    pub coherent: bool,
    pub snapped_sampling: bool,
    pub two_dimensional: bool,
    pub sample_rate_tolerance: f64,
    pub minimum_waveforms_for_beam: u32,
}

impl Default for BeamDefaults {
    fn default() -> Self {
        Self {
            lead_beam_seconds: 30.0,
            lag_beam_seconds: 60.0,
            coherent: true,
            snapped_sampling: true,
            two_dimensional: true,
            sample_rate_tolerance: 0.5,
            minimum_waveforms_for_beam: 1,
        }
    }
}

/// Event bus settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventsConfig {
    #[serde(default = "default_event_capacity")]
    pub capacity: usize,
}

impl Default for EventsConfig {
    fn default() -> Self {
        Self {
            capacity: default_event_capacity(),
        }
    }
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    5790
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_event_capacity() -> usize {
    100
}

/// Per-user config file location, if the platform has a config directory
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("seis").join("gateway.toml"))
}

/// Read and parse a TOML config file
pub fn load_toml_config(path: &Path) -> Result<TomlConfig> {
    let content = std::fs::read_to_string(path)?;
    let config: TomlConfig = toml::from_str(&content)?;
    config.validate()?;
    Ok(config)
}

impl TomlConfig {
    /// Resolve and load configuration, degrading to defaults
    ///
    /// An explicit path that cannot be read or parsed is reported as a
    /// warning; the per-user file is only consulted when no explicit path
    /// is given.
    pub fn resolve(explicit: Option<&Path>) -> Self {
        let candidate = match explicit {
            Some(path) => Some(path.to_path_buf()),
            None => std::env::var(CONFIG_ENV_VAR)
                .ok()
                .map(PathBuf::from)
                .or_else(default_config_path),
        };

        let Some(path) = candidate else {
            warn!("No config directory available; using built-in defaults");
            return Self::default();
        };

        if !path.exists() {
            warn!("Config file {} not found; using built-in defaults", path.display());
            return Self::default();
        }

        match load_toml_config(&path) {
            Ok(config) => {
                info!("Loaded configuration from {}", path.display());
                config
            }
            Err(e) => {
                warn!("Failed to load {}: {}; using built-in defaults", path.display(), e);
                Self::default()
            }
        }
    }

    /// Reject values the gateway cannot work with
    pub fn validate(&self) -> Result<()> {
        let beam_seconds = [self.beam.lead_beam_seconds, self.beam.lag_beam_seconds];
        if beam_seconds.iter().any(|s| !s.is_finite() || *s < 0.0) {
            return Err(Error::Config(
                "beam lead and lag seconds must be finite and not negative".to_string(),
            ));
        }
        if self.services.timeout_seconds == 0 {
            return Err(Error::Config("service timeout must be positive".to_string()));
        }
        if self.events.capacity == 0 {
            return Err(Error::Config("event bus capacity must be positive".to_string()));
        }
        if let Some(band) = self
            .fk
            .default_frequency_bands
            .iter()
            .find(|b| b.min_frequency_hz > b.max_frequency_hz)
        {
            return Err(Error::Config(format!(
                "frequency band {}-{} Hz is inverted",
                band.min_frequency_hz, band.max_frequency_hz
            )));
        }
        Ok(())
    }
}
