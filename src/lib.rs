//! Chime - push-to-talk voice assistant appliance controller
//!
//! Client-side control logic for a one-button voice assistant: a debounced
//! trigger starts a workflow that records a fixed-duration clip, uploads it
//! to the processing service, polls for the synthesized response, and
//! streams it to the speaker. A connectivity state machine keeps the device
//! reachable, falling back to a captive-portal provisioning session when
//! the configured network cannot be joined.
//!
//! # Architecture
//!
//! ```text
//! button edge ──▶ TriggerButton ──▶ Daemon main loop
//!                                       │ (single-flight)
//!                     ┌─────────────────▼──────────────────┐
//!                     │ capture → upload → poll → playback │
//!                     └─────────────────┬──────────────────┘
//!                                       │
//!                  AudioBus · ByteStore · Transport · NetworkLink
//! ```
//!
//! Peripherals, storage, HTTP, and the wireless stack sit behind the
//! narrow traits in [`device`] and [`connectivity`]; everything above them
//! is deterministic and tested against scripted fakes.

pub mod config;
pub mod connectivity;
pub mod daemon;
pub mod device;
pub mod error;
pub mod trigger;
pub mod wav;
pub mod workflow;

pub use config::Config;
pub use connectivity::{ConnectivityManager, Credentials, LinkState};
pub use daemon::Daemon;
pub use error::{Error, Result};
pub use trigger::TriggerButton;
pub use workflow::WorkflowRun;
