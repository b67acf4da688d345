//! Upload client
//!
//! One POST of the finalized clip per workflow run. A non-success status is
//! logged and surfaced, not retried; the run proceeds to polling either
//! way, since the service may still produce a response.

use std::time::Duration;

use crate::device::{ByteStore, Transport};
use crate::Result;

/// Upload the stored clip, returning the service status code.
///
/// The declared length is taken from the stored blob's size. On 200 the
/// service's immediate body (the transcription) is logged; it is not needed
/// by later phases.
///
/// # Errors
///
/// Returns error if the blob cannot be read or the request never completes;
/// the caller logs and continues rather than aborting the run.
pub async fn upload_clip(
    transport: &dyn Transport,
    store: &dyn ByteStore,
    clip_name: &str,
    url: &str,
    timeout: Duration,
) -> Result<u16> {
    let body = store.read(clip_name)?;
    let content_length = body.len() as u64;

    tracing::info!(bytes = content_length, url, "uploading clip");

    let response = transport
        .post(url, "audio/wav", body, content_length, timeout)
        .await?;

    if response.status == 200 {
        tracing::info!(transcription = %response.body.trim(), "upload accepted");
    } else {
        tracing::warn!(status = response.status, "upload rejected by service");
    }

    Ok(response.status)
}
