//! Duplex audio bus: microphone capture and speaker playback
//!
//! The bus carries raw little-endian 16-bit PCM bytes at the fixed 16 kHz
//! capture rate. Reads and writes block (with a bounded timeout) the way
//! the underlying peripheral does; the production implementation adapts
//! cpal's callback streams to that contract through shared sample queues.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{SampleRate, Stream, StreamConfig};

use crate::wav::SAMPLE_RATE;
use crate::{Error, Result};

/// Interval between polls of the shared sample queues
const POLL_INTERVAL: Duration = Duration::from_millis(5);

/// Cap on queued playback samples (~1 s at 16 kHz)
const PLAYBACK_QUEUE_CAP: usize = 16_384;

/// Duplex PCM bus to the capture and playback peripherals
#[async_trait(?Send)]
pub trait AudioBus {
    /// Fill `buf` with captured PCM bytes, blocking until the buffer is
    /// full or the timeout elapses.
    async fn read(&mut self, buf: &mut [u8], timeout: Duration) -> Result<()>;

    /// Queue PCM bytes for playback, blocking up to `timeout`. Returns the
    /// number of bytes accepted, which may be short of `data.len()`.
    async fn write(&mut self, data: &[u8], timeout: Duration) -> Result<usize>;

    /// Drop any samples queued for playback without playing them
    fn clear_playback(&mut self);

    /// Drain queued playback samples, then stop, clear, and restart the
    /// playback peripheral so nothing bleeds into the next interaction.
    async fn flush_playback(&mut self) -> Result<()>;
}

/// cpal-backed implementation of [`AudioBus`]
pub struct CpalAudioBus {
    capture_queue: Arc<Mutex<VecDeque<u8>>>,
    playback_queue: Arc<Mutex<VecDeque<i16>>>,
    _capture_stream: Stream,
    playback_stream: Stream,
}

impl CpalAudioBus {
    /// Open the default capture and playback devices at the fixed format
    ///
    /// # Errors
    ///
    /// Returns error if either device cannot be opened at 16 kHz.
    pub fn new() -> Result<Self> {
        let host = cpal::default_host();

        let capture_queue = Arc::new(Mutex::new(VecDeque::new()));
        let playback_queue = Arc::new(Mutex::new(VecDeque::new()));

        let capture_stream = build_capture_stream(&host, Arc::clone(&capture_queue))?;
        let playback_stream = build_playback_stream(&host, Arc::clone(&playback_queue))?;

        capture_stream
            .play()
            .map_err(|e| Error::Audio(e.to_string()))?;
        playback_stream
            .play()
            .map_err(|e| Error::Audio(e.to_string()))?;

        Ok(Self {
            capture_queue,
            playback_queue,
            _capture_stream: capture_stream,
            playback_stream,
        })
    }

    fn queued_playback(&self) -> usize {
        self.playback_queue.lock().map(|q| q.len()).unwrap_or(0)
    }
}

#[async_trait(?Send)]
impl AudioBus for CpalAudioBus {
    async fn read(&mut self, buf: &mut [u8], timeout: Duration) -> Result<()> {
        let start = Instant::now();
        let mut filled = 0;

        while filled < buf.len() {
            {
                let mut queue = self
                    .capture_queue
                    .lock()
                    .map_err(|_| Error::Audio("capture queue poisoned".to_string()))?;
                while filled < buf.len() {
                    match queue.pop_front() {
                        Some(b) => {
                            buf[filled] = b;
                            filled += 1;
                        }
                        None => break,
                    }
                }
            }

            if filled < buf.len() {
                if start.elapsed() > timeout {
                    return Err(Error::Audio(format!(
                        "capture read timed out with {filled}/{} bytes",
                        buf.len()
                    )));
                }
                tokio::time::sleep(POLL_INTERVAL).await;
            }
        }

        Ok(())
    }

    async fn write(&mut self, data: &[u8], timeout: Duration) -> Result<usize> {
        let start = Instant::now();
        let mut accepted = 0;

        // Whole samples only
        let data = &data[..data.len() & !1];

        while accepted < data.len() {
            {
                let mut queue = self
                    .playback_queue
                    .lock()
                    .map_err(|_| Error::Audio("playback queue poisoned".to_string()))?;
                while accepted < data.len() && queue.len() < PLAYBACK_QUEUE_CAP {
                    let sample = i16::from_le_bytes([data[accepted], data[accepted + 1]]);
                    queue.push_back(sample);
                    accepted += 2;
                }
            }

            if accepted < data.len() {
                if start.elapsed() > timeout {
                    break;
                }
                tokio::time::sleep(POLL_INTERVAL).await;
            }
        }

        Ok(accepted)
    }

    fn clear_playback(&mut self) {
        if let Ok(mut queue) = self.playback_queue.lock() {
            queue.clear();
        }
    }

    async fn flush_playback(&mut self) -> Result<()> {
        // Drain whatever is queued, bounded so a stalled device can't hang
        // the workflow.
        let deadline = Instant::now() + Duration::from_secs(5);
        while self.queued_playback() > 0 && Instant::now() < deadline {
            tokio::time::sleep(POLL_INTERVAL).await;
        }
        // Let the tail of the hardware buffer play out
        tokio::time::sleep(Duration::from_millis(100)).await;

        self.playback_stream
            .pause()
            .map_err(|e| Error::Audio(e.to_string()))?;
        self.clear_playback();
        self.playback_stream
            .play()
            .map_err(|e| Error::Audio(e.to_string()))?;

        tracing::debug!("playback peripheral flushed and restarted");
        Ok(())
    }
}

/// Build the capture stream feeding the shared byte queue
fn build_capture_stream(host: &cpal::Host, queue: Arc<Mutex<VecDeque<u8>>>) -> Result<Stream> {
    let device = host
        .default_input_device()
        .ok_or_else(|| Error::Audio("no input device available".to_string()))?;

    let supported = device
        .supported_input_configs()
        .map_err(|e| Error::Audio(e.to_string()))?
        .find(|c| {
            c.channels() == 1
                && c.min_sample_rate() <= SampleRate(SAMPLE_RATE)
                && c.max_sample_rate() >= SampleRate(SAMPLE_RATE)
        })
        .ok_or_else(|| Error::Audio("no suitable capture config found".to_string()))?;

    let config: StreamConfig = supported.with_sample_rate(SampleRate(SAMPLE_RATE)).config();

    tracing::debug!(
        device = device.name().unwrap_or_default(),
        sample_rate = SAMPLE_RATE,
        "capture peripheral initialized"
    );

    device
        .build_input_stream(
            &config,
            move |data: &[f32], _: &cpal::InputCallbackInfo| {
                if let Ok(mut q) = queue.lock() {
                    for &sample in data {
                        #[allow(clippy::cast_possible_truncation)]
                        let s = (sample * 32767.0).clamp(-32768.0, 32767.0) as i16;
                        q.extend(s.to_le_bytes());
                    }
                }
            },
            |err| {
                tracing::error!(error = %err, "audio capture error");
            },
            None,
        )
        .map_err(|e| Error::Audio(e.to_string()))
}

/// Build the playback stream draining the shared sample queue
fn build_playback_stream(host: &cpal::Host, queue: Arc<Mutex<VecDeque<i16>>>) -> Result<Stream> {
    let device = host
        .default_output_device()
        .ok_or_else(|| Error::Audio("no output device available".to_string()))?;

    let supported = device
        .supported_output_configs()
        .map_err(|e| Error::Audio(e.to_string()))?
        .find(|c| {
            c.min_sample_rate() <= SampleRate(SAMPLE_RATE)
                && c.max_sample_rate() >= SampleRate(SAMPLE_RATE)
        })
        .ok_or_else(|| Error::Audio("no suitable playback config found".to_string()))?;

    let config: StreamConfig = supported.with_sample_rate(SampleRate(SAMPLE_RATE)).config();
    let channels = config.channels as usize;

    tracing::debug!(
        device = device.name().unwrap_or_default(),
        sample_rate = SAMPLE_RATE,
        channels,
        "playback peripheral initialized"
    );

    device
        .build_output_stream(
            &config,
            move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                let mut q = match queue.lock() {
                    Ok(q) => q,
                    Err(_) => return,
                };
                for frame in data.chunks_mut(channels) {
                    let sample = q
                        .pop_front()
                        .map_or(0.0, |s| f32::from(s) / 32768.0);
                    for out in frame.iter_mut() {
                        *out = sample;
                    }
                }
            },
            |err| {
                tracing::error!(error = %err, "audio playback error");
            },
            None,
        )
        .map_err(|e| Error::Audio(e.to_string()))
}
