//! Whole-file sample-rate conversion using a rubato `FastFixedIn` resampler.
//!
//! ## Design
//!
//! Recordings come in at 44.1/48 kHz; every frame-based statistic in the
//! analyzer assumes 16 kHz. The [`Resample`] trait is the capability the
//! analyzer is constructed with. When no implementation is supplied and the
//! file is not already at the analysis rate, analysis fails with
//! `ScribeError::ResamplerUnavailable` instead of computing statistics on the
//! wrong time base.
//!
//! When source rate == target rate, `RubatoResampler` is a passthrough; no
//! rubato session is created at all.

use rubato::{FastFixedIn, PolynomialDegree, Resampler};
use tracing::info;

use crate::error::{Result, ScribeError};

/// Converts a complete mono signal from one sample rate to another.
pub trait Resample: Send {
    fn resample(&mut self, samples: &[f32], from_rate: u32, to_rate: u32) -> Result<Vec<f32>>;
}

/// Rubato-backed resampler processing the signal in fixed input blocks.
#[derive(Debug, Clone)]
pub struct RubatoResampler {
    /// How many input samples rubato expects per process call.
    chunk_size: usize,
}

impl RubatoResampler {
    pub fn new(chunk_size: usize) -> Self {
        Self {
            chunk_size: chunk_size.max(64),
        }
    }
}

impl Default for RubatoResampler {
    fn default() -> Self {
        Self::new(1024)
    }
}

impl Resample for RubatoResampler {
    fn resample(&mut self, samples: &[f32], from_rate: u32, to_rate: u32) -> Result<Vec<f32>> {
        if from_rate == to_rate || samples.is_empty() {
            return Ok(samples.to_vec());
        }
        if from_rate == 0 || to_rate == 0 {
            return Err(ScribeError::Resample(format!(
                "invalid sample rates {from_rate} → {to_rate}"
            )));
        }

        let ratio = to_rate as f64 / from_rate as f64;
        let mut resampler = FastFixedIn::<f32>::new(
            ratio,
            1.0, // fixed ratio, no dynamic adjustment
            PolynomialDegree::Cubic,
            self.chunk_size,
            1, // mono
        )
        .map_err(|e| ScribeError::Resample(format!("resampler init: {e}")))?;

        let delay = resampler.output_delay();
        let expected = (samples.len() as f64 * ratio).round() as usize;
        let mut output_buf = vec![vec![0f32; resampler.output_frames_max()]; 1];
        let mut result = Vec::with_capacity(expected + delay);
        let mut block = vec![0f32; self.chunk_size];
        let mut offset = 0usize;

        // Zero blocks past the end flush the filter delay.
        while result.len() < expected + delay {
            let end = (offset + self.chunk_size).min(samples.len());
            block.fill(0.0);
            if offset < end {
                block[..end - offset].copy_from_slice(&samples[offset..end]);
            }
            let (_consumed, produced) = resampler
                .process_into_buffer(&[block.as_slice()], &mut output_buf, None)
                .map_err(|e| ScribeError::Resample(e.to_string()))?;
            result.extend_from_slice(&output_buf[0][..produced]);
            offset += self.chunk_size;
        }

        info!(
            from_rate,
            to_rate,
            input = samples.len(),
            output = expected,
            "resampled analysis signal"
        );

        Ok(result[delay..delay + expected].to_vec())
    }
}
