//! Response poll and playback streamer
//!
//! Two phases: poll the readiness endpoint with a bounded attempt budget,
//! then stream the synthesized WAV response straight into the playback
//! peripheral, skipping its 44-byte header and accounting for every byte
//! written.

use std::time::Duration;

use bytes::Bytes;

use crate::config::PlaybackConfig;
use crate::device::{read_to_string, AudioBus, ByteStream, Transport};
use crate::{wav, Error, Result};

/// Literal substring signalling that the service has a response ready
pub const READINESS_MARKER: &str = "\"ready\":true";

/// Cap on readiness body size; the endpoint returns a small JSON object
const POLL_BODY_LIMIT: usize = 16 * 1024;

/// Brief yield when the playback peripheral accepts nothing, so device
/// housekeeping isn't starved
const IDLE_YIELD: Duration = Duration::from_millis(10);

/// Consecutive zero-accept writes tolerated before the peripheral is
/// declared wedged (~1 s at the idle yield)
const MAX_STALLED_WRITES: u32 = 100;

/// Poll the readiness endpoint until the marker appears.
///
/// Returns the 1-based attempt on which the marker was seen. Transport
/// failures count against the attempt budget.
///
/// # Errors
///
/// Returns [`Error::PollTimeout`] when the budget is exhausted.
pub async fn await_readiness(
    transport: &dyn Transport,
    url: &str,
    interval: Duration,
    max_attempts: u32,
) -> Result<u32> {
    for attempt in 1..=max_attempts {
        match transport.get(url).await {
            Ok(mut response) => {
                let body = read_to_string(response.stream.as_mut(), POLL_BODY_LIMIT)
                    .await
                    .unwrap_or_default();
                if body.contains(READINESS_MARKER) {
                    tracing::info!(attempt, "service response ready");
                    return Ok(attempt);
                }
                tracing::debug!(attempt, status = response.status, "response not ready");
            }
            Err(e) => {
                tracing::debug!(attempt, error = %e, "readiness poll failed");
            }
        }
        tokio::time::sleep(interval).await;
    }

    Err(Error::PollTimeout(max_attempts))
}

/// Stream the audio response into the playback peripheral.
///
/// Consumes the leading 44-byte WAV header, then writes the remainder in
/// bounded chunks until the declared remaining length is written or the
/// stream disconnects. The peripheral is flushed and restarted afterwards.
///
/// Returns the number of PCM bytes written to the peripheral.
///
/// # Errors
///
/// Returns error on a non-success status, a stream failure, a stream that
/// ends inside the header, or a peripheral that stops accepting data. All
/// are terminal for the run; on failure the peripheral is cleared and
/// flushed so queued samples cannot bleed into the next interaction.
pub async fn stream_response(
    transport: &dyn Transport,
    bus: &mut dyn AudioBus,
    url: &str,
    config: &PlaybackConfig,
) -> Result<u64> {
    let response = transport.get(url).await?;
    if response.status != 200 {
        return Err(Error::Transfer(format!(
            "audio fetch failed with status {}",
            response.status
        )));
    }

    // No residue from a previous interaction
    bus.clear_playback();

    let mut stream = response.stream;
    let leftover = skip_header(stream.as_mut()).await?;

    let target = response
        .declared_len
        .map(|len| len.saturating_sub(wav::HEADER_SIZE as u64));

    match pump(stream.as_mut(), bus, config, leftover, target).await {
        Ok(written) => {
            bus.flush_playback().await?;
            tracing::info!(bytes = written, "playback complete");
            Ok(written)
        }
        Err(e) => {
            // Drop the partial tail rather than leaving it queued
            bus.clear_playback();
            if let Err(flush_err) = bus.flush_playback().await {
                tracing::debug!(error = %flush_err, "peripheral flush after playback failure");
            }
            Err(e)
        }
    }
}

/// Write the post-header stream to the peripheral in bounded chunks until
/// the declared remaining length is written or the stream ends.
async fn pump(
    stream: &mut dyn ByteStream,
    bus: &mut dyn AudioBus,
    config: &PlaybackConfig,
    leftover: Option<Bytes>,
    target: Option<u64>,
) -> Result<u64> {
    let mut written = 0u64;
    let mut pending = leftover;
    'stream: loop {
        let chunk = match pending.take() {
            Some(chunk) => chunk,
            None => match stream.next_chunk().await? {
                Some(chunk) => chunk,
                None => break,
            },
        };

        for piece in chunk.chunks(config.chunk_bytes) {
            let mut offset = 0;
            let mut stalled = 0u32;
            while offset < piece.len() {
                let accepted = bus.write(&piece[offset..], config.write_timeout).await?;
                written += accepted as u64;
                offset += accepted;
                if accepted == 0 {
                    stalled += 1;
                    if stalled >= MAX_STALLED_WRITES {
                        return Err(Error::Audio(
                            "playback peripheral stopped accepting data".to_string(),
                        ));
                    }
                    tokio::time::sleep(IDLE_YIELD).await;
                } else {
                    stalled = 0;
                }
            }
        }

        if let Some(target) = target {
            if written >= target {
                break 'stream;
            }
        }
    }

    Ok(written)
}

/// Consume exactly the 44 header bytes, tolerating partial chunks.
/// Returns the non-header remainder of the last chunk, if any.
async fn skip_header(stream: &mut dyn ByteStream) -> Result<Option<Bytes>> {
    let mut skipped = 0;
    while skipped < wav::HEADER_SIZE {
        match stream.next_chunk().await? {
            Some(chunk) => {
                let need = wav::HEADER_SIZE - skipped;
                if chunk.len() > need {
                    return Ok(Some(chunk.slice(need..)));
                }
                skipped += chunk.len();
            }
            None => {
                return Err(Error::Transfer(
                    "response stream ended inside the WAV header".to_string(),
                ));
            }
        }
    }
    Ok(None)
}
