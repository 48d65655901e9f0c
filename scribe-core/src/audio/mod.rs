//! Audio file decoding.
//!
//! Session recordings arrive as WAV files at whatever rate the recorder used.
//! `load_mono` decodes them to mono f32 by averaging channels; conversion to
//! the analysis rate lives in [`resample`].

pub mod chunk;
pub mod resample;

use std::path::Path;

use tracing::debug;

use crate::error::{Result, ScribeError};

pub use chunk::AudioChunk;

/// Decode a WAV file into a mono chunk at its native sample rate.
///
/// Integer PCM is scaled by `2^(bits-1)` so negative full scale maps to -1.0.
///
/// # Errors
/// Returns `ScribeError::AudioDecode` if the file is unreadable or malformed.
pub fn load_mono(path: &Path) -> Result<AudioChunk> {
    let mut reader = hound::WavReader::open(path)
        .map_err(|e| ScribeError::AudioDecode(format!("{}: {e}", path.display())))?;
    let spec = reader.spec();
    let channels = usize::from(spec.channels.max(1));

    let interleaved: Vec<f32> = match spec.sample_format {
        hound::SampleFormat::Float => reader
            .samples::<f32>()
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(|e| ScribeError::AudioDecode(e.to_string()))?,
        hound::SampleFormat::Int => {
            let scale = (1_i64 << (spec.bits_per_sample.max(1) - 1)) as f32;
            reader
                .samples::<i32>()
                .map(|s| s.map(|v| v as f32 / scale))
                .collect::<std::result::Result<Vec<_>, _>>()
                .map_err(|e| ScribeError::AudioDecode(e.to_string()))?
        }
    };

    debug!(
        path = %path.display(),
        sample_rate = spec.sample_rate,
        channels,
        "decoded wav"
    );

    Ok(AudioChunk::new(
        downmix(&interleaved, channels),
        spec.sample_rate,
    ))
}

/// Average interleaved frames down to a single channel.
pub fn downmix(interleaved: &[f32], channels: usize) -> Vec<f32> {
    if channels <= 1 {
        return interleaved.to_vec();
    }
    interleaved
        .chunks(channels)
        .map(|frame| frame.iter().sum::<f32>() / channels as f32)
        .collect()
}
