//! Heuristic thresholds and decoder guardrails for the auto-tune preflight.
//!
//! Both records are plain values passed into [`AudioAnalyzer`] and
//! [`AutoTuner`] at construction, so alternate sets can be exercised side by
//! side. `Default` carries the production values.
//!
//! [`AudioAnalyzer`]: crate::analysis::AudioAnalyzer
//! [`AutoTuner`]: crate::tuning::AutoTuner

use serde::{Deserialize, Serialize};

/// Tags cache entries; bump whenever analysis or suggestion output changes shape.
pub const AUTO_TUNE_VERSION: &str = "1.0.0";

/// Classification and pre-normalisation trigger levels.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Thresholds {
    pub low_snr_db: f64,
    pub high_snr_db: f64,
    pub high_flatness: f64,
    pub micro_segment_ratio_high: f64,
    pub micro_segment_ratio_low: f64,
    /// Speech segments shorter than this count as micro-segments.
    pub micro_segment_limit_s: f64,
    pub pre_norm_peak_dbfs: f64,
    pub pre_norm_rms_dbfs: f64,
    pub pre_norm_snr_db: f64,
    pub clipping_ratio: f64,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            low_snr_db: 10.0,
            high_snr_db: 20.0,
            high_flatness: 0.5,
            micro_segment_ratio_high: 0.30,
            micro_segment_ratio_low: 0.20,
            micro_segment_limit_s: 1.2,
            pre_norm_peak_dbfs: -2.0,
            pre_norm_rms_dbfs: -28.0,
            pre_norm_snr_db: 12.0,
            clipping_ratio: 0.005,
        }
    }
}

/// Decoder and VAD bounds every suggestion is held within.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Guardrails {
    pub compression_ratio_threshold: f64,
    pub log_prob_threshold: f64,
    pub no_speech_threshold_noisy: f64,
    pub no_speech_threshold_clean: f64,
    pub vad_min_speech_ms_min: u32,
    pub vad_min_speech_ms_max: u32,
    pub vad_min_silence_ms_min: u32,
    pub vad_min_silence_ms_max: u32,
    pub vad_max_speech_min: f64,
    pub vad_max_speech_max: f64,
    pub vad_speech_pad_short_gap: u32,
    pub vad_speech_pad_default: u32,
}

impl Default for Guardrails {
    fn default() -> Self {
        Self {
            compression_ratio_threshold: 2.3,
            log_prob_threshold: -0.8,
            no_speech_threshold_noisy: 0.78,
            no_speech_threshold_clean: 0.68,
            vad_min_speech_ms_min: 900,
            vad_min_speech_ms_max: 2200,
            vad_min_silence_ms_min: 1000,
            vad_min_silence_ms_max: 2200,
            vad_max_speech_min: 25.0,
            vad_max_speech_max: 60.0,
            vad_speech_pad_short_gap: 300,
            vad_speech_pad_default: 450,
        }
    }
}
