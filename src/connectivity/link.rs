//! Network link control
//!
//! Narrow interface over the platform's wireless stack. The production
//! implementation shells out to `nmcli`, the NetworkManager CLI present on
//! the appliance image.

use std::net::Ipv4Addr;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tokio::process::Command;

use super::Credentials;
use crate::{Error, Result};

/// How long an `is_up` probe result stays cached; the main loop asks every
/// tick and spawning nmcli that often would swamp the device.
const PROBE_CACHE: Duration = Duration::from_secs(3);

/// Wireless link control
#[async_trait(?Send)]
pub trait NetworkLink {
    /// Join the network described by `credentials`
    async fn join(&self, credentials: &Credentials) -> Result<()>;

    /// Whether the link is currently up
    async fn is_up(&self) -> bool;

    /// Become an access point at the given address (provisioning mode)
    async fn start_access_point(&self, ssid: &str, address: Ipv4Addr) -> Result<()>;

    /// Tear the access point down and return to station mode
    async fn stop_access_point(&self) -> Result<()>;
}

/// `nmcli`-backed link control
pub struct NmcliLink {
    interface: Option<String>,
    probe: Mutex<Option<(Instant, bool)>>,
}

impl NmcliLink {
    /// Create the link controller, optionally pinned to one interface
    #[must_use]
    pub fn new(interface: Option<String>) -> Self {
        Self {
            interface,
            probe: Mutex::new(None),
        }
    }

    async fn nmcli(&self, args: &[&str]) -> Result<String> {
        let output = Command::new("nmcli")
            .args(args)
            .output()
            .await
            .map_err(|e| Error::Connectivity(format!("nmcli: {e}")))?;

        if output.status.success() {
            Ok(String::from_utf8_lossy(&output.stdout).into_owned())
        } else {
            Err(Error::Connectivity(
                String::from_utf8_lossy(&output.stderr).trim().to_string(),
            ))
        }
    }
}

#[async_trait(?Send)]
impl NetworkLink for NmcliLink {
    async fn join(&self, credentials: &Credentials) -> Result<()> {
        let mut args = vec![
            "dev",
            "wifi",
            "connect",
            credentials.ssid.as_str(),
            "password",
            credentials.passphrase.as_str(),
        ];
        if let Some(ifname) = &self.interface {
            args.extend(["ifname", ifname.as_str()]);
        }
        self.nmcli(&args).await?;

        if let Ok(mut probe) = self.probe.lock() {
            *probe = Some((Instant::now(), true));
        }
        Ok(())
    }

    async fn is_up(&self) -> bool {
        if let Ok(probe) = self.probe.lock() {
            if let Some((at, up)) = *probe {
                if at.elapsed() < PROBE_CACHE {
                    return up;
                }
            }
        }

        let up = matches!(
            self.nmcli(&["-t", "-f", "STATE", "general"]).await,
            Ok(state) if state.trim() == "connected"
        );

        if let Ok(mut probe) = self.probe.lock() {
            *probe = Some((Instant::now(), up));
        }
        up
    }

    async fn start_access_point(&self, ssid: &str, address: Ipv4Addr) -> Result<()> {
        // NetworkManager's shared mode assigns the AP address; the portal
        // binds on all interfaces so the exact value matters only to DNS.
        tracing::info!(ssid, %address, "starting provisioning access point");
        let mut args = vec!["dev", "wifi", "hotspot", "ssid", ssid];
        if let Some(ifname) = &self.interface {
            args.extend(["ifname", ifname.as_str()]);
        }
        self.nmcli(&args).await.map(|_| ())
    }

    async fn stop_access_point(&self) -> Result<()> {
        tracing::info!("stopping provisioning access point");
        self.nmcli(&["connection", "down", "Hotspot"]).await.map(|_| ())
    }
}
