//! Energy-based VAD using a percentile-relative RMS threshold.
//!
//! ## Algorithm
//!
//! 1. Compute RMS of every frame (plus a tiny epsilon so silence is non-zero).
//! 2. Threshold = `max(floor, percentile(energies, p) * scale)`.
//! 3. A frame is `Speech` when its energy is strictly above the threshold.
//!
//! The threshold adapts to the recording: with the defaults (p75 × 0.5) a
//! frame must carry at least half the energy of the loud quartile.

use super::{FrameClassifier, VadDecision};
use crate::analysis::stats::{percentile, rms};
use crate::audio::AudioChunk;

const ENERGY_EPSILON: f64 = 1e-8;

/// Recording-relative energy classifier, used when no dedicated VAD is available.
#[derive(Debug, Clone)]
pub struct EnergyPercentileVad {
    /// Percentile of frame energies the threshold is derived from.
    percentile: f64,
    /// Multiplier applied to that percentile.
    scale: f64,
    /// Absolute lower bound on the threshold.
    floor: f64,
}

impl EnergyPercentileVad {
    pub fn new(percentile: f64, scale: f64, floor: f64) -> Self {
        Self {
            percentile: percentile.clamp(0.0, 100.0),
            scale,
            floor,
        }
    }

    fn frame_energy(frame: &[f32]) -> f64 {
        rms(frame) + ENERGY_EPSILON
    }
}

impl Default for EnergyPercentileVad {
    fn default() -> Self {
        Self::new(75.0, 0.5, 1e-7)
    }
}

impl FrameClassifier for EnergyPercentileVad {
    fn classify_frames(&mut self, frames: &[AudioChunk]) -> Vec<VadDecision> {
        let energies: Vec<f64> = frames
            .iter()
            .map(|f| Self::frame_energy(&f.samples))
            .collect();
        let threshold = (percentile(&energies, self.percentile) * self.scale).max(self.floor);
        energies
            .into_iter()
            .map(|e| VadDecision::from(e > threshold))
            .collect()
    }

    fn name(&self) -> &'static str {
        "energy"
    }
}
