//! Voice Activity Detection (VAD) abstraction.
//!
//! The `FrameClassifier` trait is the capability the analyzer segments speech
//! with: `SileroVad` (feature `onnx`) when a model is available, otherwise the
//! `EnergyPercentileVad` fallback. Selection happens once, at construction.

pub mod energy;

#[cfg(feature = "onnx")]
pub mod silero;

use std::path::PathBuf;

use tracing::warn;

#[cfg(feature = "onnx")]
pub use silero::SileroVad;

pub use energy::EnergyPercentileVad;

use crate::audio::AudioChunk;

/// Whether a given audio frame contains speech or silence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VadDecision {
    Speech,
    Silence,
}

impl VadDecision {
    pub fn is_speech(self) -> bool {
        self == VadDecision::Speech
    }
}

impl From<bool> for VadDecision {
    fn from(speech: bool) -> Self {
        if speech {
            VadDecision::Speech
        } else {
            VadDecision::Silence
        }
    }
}

/// Classifies a whole recording, frame by frame.
///
/// Frames are equally sized (zero-padded at the tail) and share the analysis
/// sample rate. Implementations must return exactly one decision per frame.
pub trait FrameClassifier: Send {
    fn classify_frames(&mut self, frames: &[AudioChunk]) -> Vec<VadDecision>;

    /// Short identifier recorded in logs.
    fn name(&self) -> &'static str;
}

/// Which classifier to try first when building an analyzer.
#[derive(Debug, Clone)]
pub struct ClassifierConfig {
    /// Path to a Silero VAD model. Only consulted with the `onnx` feature.
    pub silero_model: Option<PathBuf>,
    /// Silero speech probability threshold in [0, 1].
    pub silero_threshold: f32,
    /// Energy fallback tuning.
    pub energy: EnergyPercentileVad,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            silero_model: None,
            silero_threshold: 0.5,
            energy: EnergyPercentileVad::default(),
        }
    }
}

/// Build the dedicated classifier if one is available, else the energy fallback.
pub fn default_classifier(config: &ClassifierConfig) -> Box<dyn FrameClassifier> {
    #[cfg(feature = "onnx")]
    {
        let path = config
            .silero_model
            .clone()
            .unwrap_or_else(SileroVad::default_model_path);
        match SileroVad::new(&path, config.silero_threshold) {
            Ok(vad) => return Box::new(vad),
            Err(e) => warn!("Silero VAD unavailable ({e}); falling back to energy-based segmentation"),
        }
    }
    #[cfg(not(feature = "onnx"))]
    {
        if config.silero_model.is_some() {
            warn!("compiled without onnx feature; ignoring Silero model path");
        }
        warn!("no dedicated VAD classifier; falling back to energy-based segmentation");
    }
    Box::new(config.energy.clone())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decision_from_bool() {
        assert_eq!(VadDecision::from(true), VadDecision::Speech);
        assert!(!VadDecision::from(false).is_speech());
    }

    #[cfg(not(feature = "onnx"))]
    #[test]
    fn default_classifier_without_model_is_energy() {
        let classifier = default_classifier(&ClassifierConfig::default());
        assert_eq!(classifier.name(), "energy");
    }
}
