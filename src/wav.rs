//! WAV/RIFF container header handling
//!
//! The capture pipeline writes a fixed 44-byte header before any samples.
//! The declared data size is always recomputed from the configured capture
//! format and duration, never measured from the peripheral.

/// Size of the fixed RIFF/WAVE header in bytes
pub const HEADER_SIZE: usize = 44;

/// Fixed capture sample rate (Hz)
pub const SAMPLE_RATE: u32 = 16_000;

/// Fixed capture bit depth
pub const BITS_PER_SAMPLE: u16 = 16;

/// Fixed capture channel count (mono)
pub const CHANNELS: u16 = 1;

/// Build the 44-byte PCM WAV header for a clip with `data_size` bytes of
/// sample data at the fixed mono/16-bit/16 kHz capture format.
#[must_use]
pub fn header(data_size: u32) -> [u8; HEADER_SIZE] {
    let byte_rate = SAMPLE_RATE * u32::from(CHANNELS) * u32::from(BITS_PER_SAMPLE) / 8;
    let block_align = CHANNELS * BITS_PER_SAMPLE / 8;
    let riff_size = data_size + (HEADER_SIZE as u32) - 8;

    let mut h = [0u8; HEADER_SIZE];
    h[0..4].copy_from_slice(b"RIFF");
    h[4..8].copy_from_slice(&riff_size.to_le_bytes());
    h[8..12].copy_from_slice(b"WAVE");
    h[12..16].copy_from_slice(b"fmt ");
    h[16..20].copy_from_slice(&16u32.to_le_bytes()); // fmt chunk size
    h[20..22].copy_from_slice(&1u16.to_le_bytes()); // PCM
    h[22..24].copy_from_slice(&CHANNELS.to_le_bytes());
    h[24..28].copy_from_slice(&SAMPLE_RATE.to_le_bytes());
    h[28..32].copy_from_slice(&byte_rate.to_le_bytes());
    h[32..34].copy_from_slice(&block_align.to_le_bytes());
    h[34..36].copy_from_slice(&BITS_PER_SAMPLE.to_le_bytes());
    h[36..40].copy_from_slice(b"data");
    h[40..44].copy_from_slice(&data_size.to_le_bytes());
    h
}

/// Target clip data size for a capture of `record_secs` seconds at the
/// fixed format: `channels × rate × bytes_per_sample × seconds`.
#[must_use]
pub const fn clip_data_size(record_secs: u32) -> u32 {
    CHANNELS as u32 * SAMPLE_RATE * (BITS_PER_SAMPLE as u32 / 8) * record_secs
}
