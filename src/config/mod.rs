//! Configuration management for the chime device controller
//!
//! Layered like the rest of the stack expects: compiled defaults, then an
//! optional TOML overlay, then CLI/environment overrides supplied by
//! `main.rs`. The retry and timeout constants are configuration defaults,
//! not protocol requirements.

pub mod file;

use std::net::Ipv4Addr;
use std::path::PathBuf;
use std::time::Duration;

use crate::connectivity::Credentials;
use crate::{Error, Result};

/// Outbound clip blob name
pub const CLIP_BLOB: &str = "recording.wav";

/// Inbound response blob name
pub const RESPONSE_BLOB: &str = "voiced.wav";

/// Device controller configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Base URL of the processing service; endpoint paths derive from it
    pub base_url: String,

    /// Directory holding the clip and response blobs
    pub data_dir: PathBuf,

    /// Statically configured credentials tried first at boot
    pub credentials: Credentials,

    /// Compiled-in fallback adopted when provisioning times out
    pub fallback_credentials: Option<Credentials>,

    /// Capture pipeline tunables
    pub capture: CaptureConfig,

    /// Workflow timing tunables
    pub workflow: WorkflowConfig,

    /// Playback streaming tunables
    pub playback: PlaybackConfig,

    /// Connectivity retry tunables
    pub connectivity: ConnectivityConfig,

    /// Provisioning portal configuration
    pub portal: PortalConfig,
}

/// Capture pipeline configuration
#[derive(Debug, Clone)]
pub struct CaptureConfig {
    /// Recording duration in seconds
    pub record_secs: u32,

    /// Pre-roll delay before counted capture begins
    pub pre_roll: Duration,

    /// Peripheral read block size in bytes
    pub block_bytes: usize,

    /// Discarded reads used to purge stale peripheral audio
    pub flush_reads: u32,
}

/// Workflow timing configuration
#[derive(Debug, Clone)]
pub struct WorkflowConfig {
    /// Button debounce interval
    pub debounce: Duration,

    /// Main loop poll cadence
    pub tick: Duration,

    /// Post-workflow cool-down
    pub cooldown: Duration,

    /// Readiness poll spacing
    pub poll_interval: Duration,

    /// Readiness poll attempt budget
    pub poll_max_attempts: u32,

    /// Upload request timeout
    pub upload_timeout: Duration,
}

/// Playback streaming configuration
#[derive(Debug, Clone)]
pub struct PlaybackConfig {
    /// Chunk size written to the playback peripheral
    pub chunk_bytes: usize,

    /// Per-write timeout on the playback peripheral
    pub write_timeout: Duration,
}

/// Connectivity retry configuration
#[derive(Debug, Clone)]
pub struct ConnectivityConfig {
    /// Attempts with the static credentials before provisioning
    pub direct_attempts: u32,

    /// Attempts with the active credentials after provisioning/reconnect
    pub configured_attempts: u32,

    /// Delay between join attempts
    pub retry_delay: Duration,
}

/// Provisioning portal configuration
#[derive(Debug, Clone)]
pub struct PortalConfig {
    /// Access point network name
    pub ssid: String,

    /// Address the device claims while provisioning
    pub address: Ipv4Addr,

    /// Portal HTTP port
    pub http_port: u16,

    /// Captive DNS responder port
    pub dns_port: u16,

    /// Overall provisioning timeout
    pub timeout: Duration,
}

/// Overrides supplied by the CLI/environment
#[derive(Debug, Default)]
pub struct Overrides {
    pub base_url: Option<String>,
    pub data_dir: Option<PathBuf>,
    pub ssid: Option<String>,
    pub password: Option<String>,
    pub record_secs: Option<u32>,
}

impl Config {
    /// Load configuration: defaults ← TOML file ← CLI overrides
    ///
    /// # Errors
    ///
    /// Returns error if no data directory can be determined.
    pub fn load(overrides: Overrides) -> Result<Self> {
        let f = file::load_config_file();

        let base_url = overrides
            .base_url
            .or(f.base_url)
            .unwrap_or_else(|| "http://192.168.1.34:3000".to_string());
        let base_url = base_url.trim_end_matches('/').to_string();

        let data_dir = overrides
            .data_dir
            .or(f.data_dir)
            .or_else(|| {
                directories::BaseDirs::new().map(|d| d.data_dir().join("chime"))
            })
            .ok_or_else(|| Error::Config("could not determine data directory".to_string()))?;

        let ssid = overrides.ssid.or(f.network.ssid).unwrap_or_default();
        let password = overrides.password.or(f.network.password).unwrap_or_default();
        if ssid.is_empty() {
            tracing::warn!(
                "no static network ssid configured; the device will go straight to provisioning"
            );
        }

        let fallback_credentials = match (f.network.fallback_ssid, f.network.fallback_password) {
            (Some(ssid), Some(passphrase)) if !ssid.is_empty() => {
                Some(Credentials { ssid, passphrase })
            }
            _ => None,
        };

        Ok(Self {
            base_url,
            data_dir,
            credentials: Credentials {
                ssid,
                passphrase: password,
            },
            fallback_credentials,
            capture: CaptureConfig {
                record_secs: overrides
                    .record_secs
                    .or(f.capture.record_secs)
                    .unwrap_or(5),
                pre_roll: Duration::from_millis(f.capture.pre_roll_ms.unwrap_or(500)),
                block_bytes: f.capture.block_bytes.unwrap_or(16 * 1024),
                flush_reads: f.capture.flush_reads.unwrap_or(5),
            },
            workflow: WorkflowConfig {
                debounce: Duration::from_millis(f.workflow.debounce_ms.unwrap_or(500)),
                tick: Duration::from_millis(f.workflow.tick_ms.unwrap_or(100)),
                cooldown: Duration::from_millis(f.workflow.cooldown_ms.unwrap_or(1000)),
                poll_interval: Duration::from_millis(f.workflow.poll_interval_ms.unwrap_or(500)),
                poll_max_attempts: f.workflow.poll_max_attempts.unwrap_or(30),
                upload_timeout: Duration::from_secs(f.workflow.upload_timeout_secs.unwrap_or(30)),
            },
            playback: PlaybackConfig {
                chunk_bytes: f.playback.chunk_bytes.unwrap_or(1024),
                write_timeout: Duration::from_millis(f.playback.write_timeout_ms.unwrap_or(100)),
            },
            connectivity: ConnectivityConfig {
                direct_attempts: f.connectivity.direct_attempts.unwrap_or(3),
                configured_attempts: f.connectivity.configured_attempts.unwrap_or(30),
                retry_delay: Duration::from_millis(f.connectivity.retry_delay_ms.unwrap_or(500)),
            },
            portal: PortalConfig {
                ssid: f.portal.ssid.unwrap_or_else(|| "chime-setup".to_string()),
                address: f.portal.address.unwrap_or(Ipv4Addr::new(192, 168, 4, 1)),
                http_port: f.portal.http_port.unwrap_or(80),
                dns_port: f.portal.dns_port.unwrap_or(53),
                timeout: Duration::from_secs(f.portal.timeout_secs.unwrap_or(300)),
            },
        })
    }

    /// Upload endpoint (audio/wav POST)
    #[must_use]
    pub fn upload_url(&self) -> String {
        format!("{}/uploadAudio", self.base_url)
    }

    /// Readiness endpoint (polled GET)
    #[must_use]
    pub fn readiness_url(&self) -> String {
        format!("{}/checkVariable", self.base_url)
    }

    /// Audio-response endpoint (streamed GET)
    #[must_use]
    pub fn audio_url(&self) -> String {
        format!("{}/broadcastAudio", self.base_url)
    }

    /// Target clip data size in bytes for the configured duration
    #[must_use]
    pub const fn clip_data_size(&self) -> u32 {
        crate::wav::clip_data_size(self.capture.record_secs)
    }
}
