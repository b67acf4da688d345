//! Connectivity state machine
//!
//! Keeps the device reachable: a bounded direct-connect attempt at boot, a
//! one-shot captive-portal provisioning fallback, and synchronous
//! reconnection when the link drops. All attempt counts and delays are
//! configuration defaults.

pub mod dns;
mod link;
pub mod portal;

use async_trait::async_trait;

pub use link::{NetworkLink, NmcliLink};

use crate::config::{ConnectivityConfig, PortalConfig};
use crate::{Error, Result};

/// Network name and passphrase pair
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credentials {
    pub ssid: String,
    pub passphrase: String,
}

/// Connectivity state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkState {
    Disconnected,
    AttemptingDirect,
    Provisioning,
    AttemptingConfigured,
    Connected,
}

/// Source of credentials when the direct attempt fails.
///
/// The production implementation runs the captive portal; tests script it.
#[async_trait(?Send)]
pub trait Provisioner {
    /// Collect credentials, returning `None` on timeout
    async fn provision(&self, link: &dyn NetworkLink) -> Result<Option<Credentials>>;
}

/// Captive-portal provisioner
pub struct PortalProvisioner {
    config: PortalConfig,
}

impl PortalProvisioner {
    #[must_use]
    pub const fn new(config: PortalConfig) -> Self {
        Self { config }
    }
}

#[async_trait(?Send)]
impl Provisioner for PortalProvisioner {
    async fn provision(&self, link: &dyn NetworkLink) -> Result<Option<Credentials>> {
        portal::run(link, &self.config).await
    }
}

/// Drives the link through the connectivity state machine
pub struct ConnectivityManager {
    link: Box<dyn NetworkLink>,
    provisioner: Box<dyn Provisioner>,
    config: ConnectivityConfig,
    state: LinkState,
    /// Currently active credentials; overwritten only by a successful
    /// portal submission or fallback adoption, never cleared implicitly
    active: Credentials,
    fallback: Option<Credentials>,
    /// Provisioning runs at most once per boot cycle
    provisioned: bool,
}

impl ConnectivityManager {
    #[must_use]
    pub fn new(
        link: Box<dyn NetworkLink>,
        provisioner: Box<dyn Provisioner>,
        config: ConnectivityConfig,
        credentials: Credentials,
        fallback: Option<Credentials>,
    ) -> Self {
        Self {
            link,
            provisioner,
            config,
            state: LinkState::Disconnected,
            active: credentials,
            fallback,
            provisioned: false,
        }
    }

    /// Current state
    #[must_use]
    pub const fn state(&self) -> LinkState {
        self.state
    }

    /// Whether the link is believed up
    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.state == LinkState::Connected
    }

    /// Credentials currently in use
    #[must_use]
    pub const fn active_credentials(&self) -> &Credentials {
        &self.active
    }

    /// Boot-time path: direct attempt, provisioning fallback, configured
    /// attempt.
    ///
    /// # Errors
    ///
    /// Returns error when every stage exhausts its budget; the device stays
    /// `Disconnected` but alive.
    pub async fn establish(&mut self) -> Result<()> {
        self.state = LinkState::AttemptingDirect;
        tracing::info!(ssid = %self.active.ssid, "attempting direct connection");

        if self.try_join(self.config.direct_attempts).await {
            self.state = LinkState::Connected;
            return Ok(());
        }

        if !self.provisioned {
            self.provisioned = true;
            self.state = LinkState::Provisioning;
            tracing::warn!("direct connection failed, entering provisioning");

            match self.provisioner.provision(self.link.as_ref()).await {
                Ok(Some(credentials)) => self.active = credentials,
                Ok(None) => {
                    if let Some(fallback) = self.fallback.clone() {
                        tracing::info!(ssid = %fallback.ssid, "adopting fallback credentials");
                        self.active = fallback;
                    }
                }
                Err(e) => tracing::error!(error = %e, "provisioning failed"),
            }
        }

        self.attempt_configured().await
    }

    /// Try the active credentials with the larger attempt budget.
    ///
    /// # Errors
    ///
    /// Returns error on exhaustion; the device stays `Disconnected`.
    pub async fn attempt_configured(&mut self) -> Result<()> {
        self.state = LinkState::AttemptingConfigured;
        tracing::info!(ssid = %self.active.ssid, "attempting configured connection");

        if self.try_join(self.config.configured_attempts).await {
            self.state = LinkState::Connected;
            Ok(())
        } else {
            self.state = LinkState::Disconnected;
            Err(Error::Connectivity(format!(
                "could not join {} after {} attempts",
                self.active.ssid, self.config.configured_attempts
            )))
        }
    }

    /// Idle-tick link check. On loss while connected, re-enters
    /// `AttemptingConfigured` synchronously before any new workflow may
    /// start.
    pub async fn check(&mut self) {
        if self.state == LinkState::Connected && !self.link.is_up().await {
            tracing::warn!("network link lost");
            self.state = LinkState::Disconnected;
            if let Err(e) = self.attempt_configured().await {
                tracing::error!(error = %e, "reconnection failed");
            }
        }
    }

    async fn try_join(&mut self, attempts: u32) -> bool {
        for attempt in 1..=attempts {
            match self.link.join(&self.active).await {
                Ok(()) => {
                    tracing::info!(ssid = %self.active.ssid, attempt, "network joined");
                    return true;
                }
                Err(e) => {
                    tracing::debug!(attempt, attempts, error = %e, "join attempt failed");
                }
            }
            tokio::time::sleep(self.config.retry_delay).await;
        }
        false
    }
}
