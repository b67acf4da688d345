//! Voice interaction workflow
//!
//! One run per accepted button press, phases strictly in sequence:
//! capture → upload → readiness poll → playback. Every failure is local to
//! the run; the device returns to idle regardless.

pub mod capture;
pub mod playback;
pub mod upload;

use std::time::SystemTime;

use crate::config::{Config, CLIP_BLOB, RESPONSE_BLOB};
use crate::device::{AudioBus, ByteStore, Transport};
use crate::Error;

/// Accounting for a single workflow run
#[derive(Debug)]
pub struct WorkflowRun {
    /// When the debounced trigger was observed
    pub triggered_at: SystemTime,
    /// Target clip data size in bytes
    pub capture_target: u32,
    /// Upload status code, if the request completed
    pub upload_status: Option<u16>,
    /// Readiness poll attempts used
    pub poll_attempts: u32,
    /// PCM bytes written to the playback peripheral
    pub playback_bytes: u64,
}

/// Collaborators for one workflow run
pub struct Workflow<'a> {
    pub bus: &'a mut dyn AudioBus,
    pub store: &'a dyn ByteStore,
    pub transport: &'a dyn Transport,
    pub config: &'a Config,
}

/// Execute one full workflow run.
///
/// Never fails the device: each phase's failure is logged and the run
/// accounting is returned as far as it got. The caller holds the
/// single-flight guard for the duration.
pub async fn run(w: Workflow<'_>) -> WorkflowRun {
    let config = w.config;
    let mut run = WorkflowRun {
        triggered_at: SystemTime::now(),
        capture_target: config.clip_data_size(),
        upload_status: None,
        poll_attempts: 0,
        playback_bytes: 0,
    };

    // Drop leftovers from an earlier run
    cleanup(w.store, &[CLIP_BLOB, RESPONSE_BLOB]);

    // Capture; storage/peripheral failure aborts the run, no retry
    if let Err(e) = capture::capture_clip(w.bus, w.store, CLIP_BLOB, &config.capture).await {
        tracing::error!(error = %e, "capture failed, aborting workflow run");
        cleanup(w.store, &[CLIP_BLOB]);
        finish(&run);
        return run;
    }

    // Upload; a failed upload does not abort the run — the service may
    // still produce a response
    match upload::upload_clip(
        w.transport,
        w.store,
        CLIP_BLOB,
        &config.upload_url(),
        config.workflow.upload_timeout,
    )
    .await
    {
        Ok(status) => run.upload_status = Some(status),
        Err(e) => tracing::warn!(error = %e, "upload failed, continuing to poll"),
    }
    cleanup(w.store, &[CLIP_BLOB]);

    // Poll, then play
    match playback::await_readiness(
        w.transport,
        &config.readiness_url(),
        config.workflow.poll_interval,
        config.workflow.poll_max_attempts,
    )
    .await
    {
        Ok(attempts) => {
            run.poll_attempts = attempts;
            match playback::stream_response(
                w.transport,
                w.bus,
                &config.audio_url(),
                &config.playback,
            )
            .await
            {
                Ok(bytes) => run.playback_bytes = bytes,
                Err(e) => tracing::error!(error = %e, "playback failed"),
            }
        }
        Err(Error::PollTimeout(attempts)) => {
            run.poll_attempts = attempts;
            tracing::warn!(attempts, "service response timeout, skipping playback");
        }
        Err(e) => tracing::error!(error = %e, "readiness poll failed"),
    }

    cleanup(w.store, &[RESPONSE_BLOB]);
    finish(&run);
    run
}

fn cleanup(store: &dyn ByteStore, names: &[&str]) {
    for name in names {
        if let Err(e) = store.remove(name) {
            tracing::warn!(blob = name, error = %e, "cleanup failed");
        }
    }
}

fn finish(run: &WorkflowRun) {
    tracing::info!(
        capture_target = run.capture_target,
        upload_status = ?run.upload_status,
        poll_attempts = run.poll_attempts,
        playback_bytes = run.playback_bytes,
        "workflow run complete"
    );
}
