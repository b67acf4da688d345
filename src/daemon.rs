//! Daemon - the main device control loop
//!
//! Polls the debounced trigger at a fixed cadence, keeps the link alive
//! through the connectivity manager, and runs one workflow at a time under
//! the single-flight guard.

use std::sync::Arc;

use crate::config::Config;
use crate::connectivity::ConnectivityManager;
use crate::device::{AudioBus, ByteStore, Transport};
use crate::trigger::TriggerButton;
use crate::workflow::{self, Workflow};
use crate::Result;

/// The chime daemon - owns the collaborators and the control loop
pub struct Daemon {
    config: Config,
    trigger: Arc<TriggerButton>,
    bus: Box<dyn AudioBus>,
    store: Box<dyn ByteStore>,
    transport: Box<dyn Transport>,
    connectivity: ConnectivityManager,
}

impl Daemon {
    /// Assemble the daemon from its collaborators
    #[must_use]
    pub fn new(
        config: Config,
        bus: Box<dyn AudioBus>,
        store: Box<dyn ByteStore>,
        transport: Box<dyn Transport>,
        connectivity: ConnectivityManager,
    ) -> Self {
        let trigger = Arc::new(TriggerButton::new(config.workflow.debounce));
        Self {
            config,
            trigger,
            bus,
            store,
            transport,
            connectivity,
        }
    }

    /// Handle for edge sources (GPIO callback, stdin listener, tests)
    #[must_use]
    pub fn trigger(&self) -> Arc<TriggerButton> {
        Arc::clone(&self.trigger)
    }

    /// Run the daemon until interrupted
    ///
    /// # Errors
    ///
    /// Returns error only on signal-handler installation failure; workflow
    /// and connectivity failures are logged and absorbed.
    pub async fn run(mut self) -> Result<()> {
        // Boot-time connect; exhaustion leaves the device idle but alive
        if let Err(e) = self.connectivity.establish().await {
            tracing::error!(error = %e, "initial connection failed, device idle");
        }

        tracing::info!("chime ready, press the button to talk");

        let mut tick = tokio::time::interval(self.config.workflow.tick);
        let ctrl_c = tokio::signal::ctrl_c();
        tokio::pin!(ctrl_c);

        loop {
            tokio::select! {
                _ = &mut ctrl_c => {
                    tracing::info!("shutting down");
                    return Ok(());
                }
                _ = tick.tick() => {
                    self.tick().await;
                }
            }
        }
    }

    /// One main-loop iteration: link check, then at most one workflow
    async fn tick(&mut self) {
        self.connectivity.check().await;

        if !self.trigger.take_pending() {
            return;
        }

        if !self.connectivity.is_connected() {
            // Reconnect synchronously before giving up on the press
            if self.connectivity.attempt_configured().await.is_err() {
                tracing::warn!("no connectivity, aborting pending workflow");
                return;
            }
        }

        if !self.trigger.try_begin() {
            return;
        }

        // Run accounting is logged by the workflow itself; the run record
        // does not outlive the press that created it
        let _run = workflow::run(Workflow {
            bus: self.bus.as_mut(),
            store: self.store.as_ref(),
            transport: self.transport.as_ref(),
            config: &self.config,
        })
        .await;

        self.trigger.finish();

        // Absorb accidental re-presses right after a workflow
        tokio::time::sleep(self.config.workflow.cooldown).await;
    }
}
