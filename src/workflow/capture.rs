//! Audio capture pipeline
//!
//! Produces a byte-exact WAV clip of fixed duration in the byte store:
//! purge stale peripheral audio, wait out the pre-roll, then run
//! read-transform-append cycles until the target size is met or exceeded.

use std::time::Duration;

use crate::config::CaptureConfig;
use crate::device::{AudioBus, ByteStore};
use crate::{wav, Result};

/// Amplification ratio applied by the sample transform. Tunable constants,
/// not derived from the peripheral format.
const GAIN_NUMERATOR: u32 = 512;
const GAIN_DENOMINATOR: u32 = 2048;

/// Per-block read timeout; a 16 KiB block at 16 kHz/16-bit arrives in
/// half a second.
const READ_TIMEOUT: Duration = Duration::from_secs(5);

/// Transform one block of captured samples.
///
/// Each input pair `(lo, hi)` is reduced to a single significant byte:
/// the 12-bit value `((hi & 0x0F) << 8) | lo` scaled by the amplification
/// ratio, placed in the high byte of the output pair with a zero low byte.
#[must_use]
pub fn scale_block(input: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(input.len());
    for pair in input.chunks_exact(2) {
        let value = (u32::from(pair[1] & 0x0F) << 8) | u32::from(pair[0]);
        out.push(0);
        #[allow(clippy::cast_possible_truncation)]
        out.push((value * GAIN_NUMERATOR / GAIN_DENOMINATOR) as u8);
    }
    out
}

/// Record a clip into `clip_name`, returning the achieved data byte count.
///
/// The WAV header declares the computed target size; the data section may
/// exceed it by up to one block (the loop never stops under target).
///
/// # Errors
///
/// Returns error on any storage or peripheral failure; the caller aborts
/// the whole workflow run, there is no retry for capture I/O.
pub async fn capture_clip(
    bus: &mut dyn AudioBus,
    store: &dyn ByteStore,
    clip_name: &str,
    config: &CaptureConfig,
) -> Result<u32> {
    let target = wav::clip_data_size(config.record_secs);

    let mut writer = store.create(clip_name)?;
    writer.append(&wav::header(target))?;

    let mut block = vec![0u8; config.block_bytes];

    // Purge audio buffered before the user was prompted to speak
    for _ in 0..config.flush_reads {
        bus.read(&mut block, READ_TIMEOUT).await?;
    }

    // Give the user time to begin speaking
    tokio::time::sleep(config.pre_roll).await;

    tracing::info!(target, secs = config.record_secs, "recording started");

    let mut written = 0u32;
    while written < target {
        bus.read(&mut block, READ_TIMEOUT).await?;
        writer.append(&scale_block(&block))?;
        written += u32::try_from(block.len()).unwrap_or(u32::MAX);
        tracing::debug!(percent = written.saturating_mul(100) / target, "recording");
    }

    writer.close()?;
    tracing::info!(bytes = written, "recording complete");
    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Reference transform for a single pair, straight from the contract
    fn reference(lo: u8, hi: u8) -> (u8, u8) {
        let value = ((u32::from(hi & 0x0F) << 8) | u32::from(lo)) * 512 / 2048;
        (0, (value & 0xFF) as u8)
    }

    #[test]
    fn scale_matches_exact_formula() {
        for (lo, hi) in [(0x00, 0x00), (0x34, 0x12), (0xFF, 0xFF), (0x01, 0xF0), (0x80, 0x08)] {
            let out = scale_block(&[lo, hi]);
            assert_eq!((out[0], out[1]), reference(lo, hi), "pair ({lo:#x}, {hi:#x})");
        }
    }

    #[test]
    fn scale_masks_high_nibble() {
        // 0xF0 and 0x00 high bytes carry the same 12-bit value
        assert_eq!(scale_block(&[0x42, 0xF3]), scale_block(&[0x42, 0x03]));
    }

    #[test]
    fn scale_zeroes_low_bytes() {
        let out = scale_block(&[0x11, 0x22, 0x33, 0x44, 0x55, 0x66]);
        assert_eq!(out.len(), 6);
        assert_eq!(out[0], 0);
        assert_eq!(out[2], 0);
        assert_eq!(out[4], 0);
    }

    #[test]
    fn scale_is_not_idempotent() {
        // (0x34, 0x12) -> (0, 141); re-applying gives a different pair
        let once = scale_block(&[0x34, 0x12]);
        assert_eq!(once, vec![0, 141]);
        let twice = scale_block(&once);
        assert_eq!(twice, vec![0, 64]);
        assert_ne!(once, twice);
    }

    #[test]
    fn scale_fixed_point_is_stable() {
        // All-zero input maps to itself
        let zeros = scale_block(&[0, 0, 0, 0]);
        assert_eq!(zeros, vec![0, 0, 0, 0]);
        assert_eq!(scale_block(&zeros), zeros);
    }
}
