//! TOML configuration file loading
//!
//! Supports `~/.config/chime/config.toml` as a persistent config source.
//! All fields are optional — the file is a partial overlay on top of the
//! compiled defaults.

use std::path::PathBuf;

use serde::Deserialize;

/// Top-level TOML configuration file schema
#[derive(Debug, Default, Deserialize)]
pub struct ChimeConfigFile {
    /// Base URL of the processing service
    #[serde(default)]
    pub base_url: Option<String>,

    /// Data directory for the audio blobs
    #[serde(default)]
    pub data_dir: Option<PathBuf>,

    /// Network credentials
    #[serde(default)]
    pub network: NetworkFileConfig,

    /// Capture pipeline tunables
    #[serde(default)]
    pub capture: CaptureFileConfig,

    /// Workflow timing tunables
    #[serde(default)]
    pub workflow: WorkflowFileConfig,

    /// Playback streaming tunables
    #[serde(default)]
    pub playback: PlaybackFileConfig,

    /// Connectivity retry tunables
    #[serde(default)]
    pub connectivity: ConnectivityFileConfig,

    /// Provisioning portal configuration
    #[serde(default)]
    pub portal: PortalFileConfig,
}

/// Network credential configuration
#[derive(Debug, Default, Deserialize)]
pub struct NetworkFileConfig {
    /// Statically configured network name
    pub ssid: Option<String>,

    /// Statically configured passphrase
    pub password: Option<String>,

    /// Fallback network adopted on provisioning timeout
    pub fallback_ssid: Option<String>,

    /// Fallback passphrase
    pub fallback_password: Option<String>,
}

/// Capture pipeline configuration
#[derive(Debug, Default, Deserialize)]
pub struct CaptureFileConfig {
    /// Recording duration in seconds
    pub record_secs: Option<u32>,

    /// Pre-roll delay before the first counted block (ms)
    pub pre_roll_ms: Option<u64>,

    /// Peripheral read block size in bytes
    pub block_bytes: Option<usize>,

    /// Number of discarded reads used to purge stale audio
    pub flush_reads: Option<u32>,
}

/// Workflow timing configuration
#[derive(Debug, Default, Deserialize)]
pub struct WorkflowFileConfig {
    /// Button debounce interval (ms)
    pub debounce_ms: Option<u64>,

    /// Main loop poll cadence (ms)
    pub tick_ms: Option<u64>,

    /// Post-workflow cool-down (ms)
    pub cooldown_ms: Option<u64>,

    /// Readiness poll spacing (ms)
    pub poll_interval_ms: Option<u64>,

    /// Readiness poll attempt budget
    pub poll_max_attempts: Option<u32>,

    /// Upload request timeout (seconds)
    pub upload_timeout_secs: Option<u64>,
}

/// Playback streaming configuration
#[derive(Debug, Default, Deserialize)]
pub struct PlaybackFileConfig {
    /// Chunk size written to the playback peripheral
    pub chunk_bytes: Option<usize>,

    /// Per-write timeout on the playback peripheral (ms)
    pub write_timeout_ms: Option<u64>,
}

/// Connectivity retry configuration
#[derive(Debug, Default, Deserialize)]
pub struct ConnectivityFileConfig {
    /// Attempts with the static credentials before provisioning
    pub direct_attempts: Option<u32>,

    /// Attempts with the active credentials after provisioning/reconnect
    pub configured_attempts: Option<u32>,

    /// Delay between join attempts (ms)
    pub retry_delay_ms: Option<u64>,
}

/// Provisioning portal configuration
#[derive(Debug, Default, Deserialize)]
pub struct PortalFileConfig {
    /// Access point network name
    pub ssid: Option<String>,

    /// Address the device claims while provisioning
    pub address: Option<std::net::Ipv4Addr>,

    /// Portal HTTP port
    pub http_port: Option<u16>,

    /// Captive DNS responder port
    pub dns_port: Option<u16>,

    /// Overall provisioning timeout (seconds)
    pub timeout_secs: Option<u64>,
}

/// Load the TOML config file from the standard path
///
/// Returns `ChimeConfigFile::default()` if the file doesn't exist or can't
/// be parsed.
pub fn load_config_file() -> ChimeConfigFile {
    let Some(path) = config_file_path() else {
        return ChimeConfigFile::default();
    };

    if !path.exists() {
        return ChimeConfigFile::default();
    }

    match std::fs::read_to_string(&path) {
        Ok(content) => match toml::from_str(&content) {
            Ok(config) => {
                tracing::info!(path = %path.display(), "loaded config file");
                config
            }
            Err(e) => {
                tracing::warn!(
                    path = %path.display(),
                    error = %e,
                    "failed to parse config file, using defaults"
                );
                ChimeConfigFile::default()
            }
        },
        Err(e) => {
            tracing::warn!(
                path = %path.display(),
                error = %e,
                "failed to read config file"
            );
            ChimeConfigFile::default()
        }
    }
}

/// Return the config file path: `~/.config/chime/config.toml`
pub fn config_file_path() -> Option<PathBuf> {
    directories::BaseDirs::new().map(|d| d.config_dir().join("chime").join("config.toml"))
}
