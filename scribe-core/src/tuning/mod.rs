//! Auto-tune: map audio diagnostics to decoder/VAD suggestions.
//!
//! ## Classification
//!
//! ```text
//! noisy  = snr < low_snr  || flatness > high_flatness || micro ≥ micro_high
//! clean  = !noisy && snr ≥ high_snr && micro < micro_low
//! mixed  = otherwise
//! ```
//!
//! Noisy is evaluated first and wins. Only two no-speech guardrails exist;
//! mixed audio gets the clean one.
//!
//! `AutoTuner::suggest` is pure: identical diagnostics and guardrails give
//! identical output.

pub mod config;

use serde::{Deserialize, Serialize};

use crate::analysis::AudioDiagnostics;
use crate::thresholds::{Guardrails, Thresholds};

pub use config::{ConfigMap, DecodingMode, PreNorm, Rationale, Temperature, TuneConfig, VadProfile};

/// Micro-segment VAD profile: long minimum speech/silence to glue fragments.
const MICRO_MIN_SPEECH_MS: u32 = 2000;
const MICRO_MIN_SILENCE_MS: u32 = 1900;
/// Headroom added to p95 speech duration before clamping `vad_max_speech_s`.
const MAX_SPEECH_HEADROOM_S: f64 = 10.0;
/// Median gaps below this get the short-gap speech pad.
const SHORT_GAP_S: f64 = 0.5;

/// A suggestion plus the trace of how it was derived.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AutoTuneSuggestion {
    pub cfg: TuneConfig,
    pub rationale: Rationale,
}

/// Suggestion engine bound to one threshold/guardrail set.
#[derive(Debug, Clone, Copy, Default)]
pub struct AutoTuner {
    thresholds: Thresholds,
    guardrails: Guardrails,
}

impl AutoTuner {
    pub fn new(thresholds: Thresholds, guardrails: Guardrails) -> Self {
        Self {
            thresholds,
            guardrails,
        }
    }

    pub fn suggest(&self, diag: &AudioDiagnostics) -> AutoTuneSuggestion {
        let t = &self.thresholds;
        let g = &self.guardrails;

        let noisy = diag.snr_db < t.low_snr_db
            || diag.spectral_flatness_mean > t.high_flatness
            || diag.micro_segment_ratio >= t.micro_segment_ratio_high;
        let clean = !noisy
            && diag.snr_db >= t.high_snr_db
            && diag.micro_segment_ratio < t.micro_segment_ratio_low;

        let (decoding_mode, beam_size, best_of, temperature, patience) = if noisy {
            (
                DecodingMode::Sampling,
                None,
                Some(5),
                Temperature::Schedule(vec![0.2, 0.4, 0.6]),
                1.0,
            )
        } else if clean {
            (DecodingMode::Beam, Some(3), None, Temperature::Fixed(0.0), 1.2)
        } else {
            (
                DecodingMode::SamplingMixed,
                None,
                Some(5),
                Temperature::Schedule(vec![0.2, 0.4]),
                1.0,
            )
        };

        let no_speech_threshold = if noisy {
            g.no_speech_threshold_noisy
        } else {
            g.no_speech_threshold_clean
        };

        let vad_max_speech_s = clamp(
            diag.p95_speech_s + MAX_SPEECH_HEADROOM_S,
            g.vad_max_speech_min,
            g.vad_max_speech_max,
        );

        let (vad_profile, vad_min_speech_ms, vad_min_silence_ms) =
            if diag.micro_segment_ratio >= t.micro_segment_ratio_high {
                (
                    VadProfile::MicroSegments,
                    MICRO_MIN_SPEECH_MS,
                    MICRO_MIN_SILENCE_MS,
                )
            } else {
                let min_speech = clamp(
                    (diag.p25_speech_s * 0.9).max(0.9) * 1000.0,
                    f64::from(g.vad_min_speech_ms_min),
                    f64::from(g.vad_min_speech_ms_max),
                );
                let min_silence = clamp(
                    (diag.median_gap_s * 0.9).max(1.2) * 1000.0,
                    f64::from(g.vad_min_silence_ms_min),
                    f64::from(g.vad_min_silence_ms_max),
                );
                (VadProfile::Balanced, min_speech as u32, min_silence as u32)
            };

        let vad_speech_pad_ms = if diag.median_gap_s < SHORT_GAP_S {
            g.vad_speech_pad_short_gap
        } else {
            g.vad_speech_pad_default
        };

        let pre_norm = if diag.pre_norm_recommended {
            PreNorm::Apply
        } else {
            PreNorm::Off
        };

        AutoTuneSuggestion {
            cfg: TuneConfig {
                use_vad: true,
                beam_size,
                best_of,
                temperature,
                patience,
                no_speech_threshold,
                compression_ratio_threshold: g.compression_ratio_threshold,
                log_prob_threshold: g.log_prob_threshold,
                condition_on_previous_text: false,
                vad_max_speech_s,
                vad_min_speech_ms,
                vad_min_silence_ms,
                vad_speech_pad_ms,
                pre_norm,
            },
            rationale: Rationale {
                snr_db: diag.snr_db,
                spectral_flatness_mean: diag.spectral_flatness_mean,
                micro_segment_ratio: diag.micro_segment_ratio,
                p95_speech_s: diag.p95_speech_s,
                median_gap_s: diag.median_gap_s,
                decoding_mode,
                vad_profile,
            },
        }
    }
}

/// `max(lo, min(hi, v))`; unlike `f64::clamp` never panics on inverted bounds.
fn clamp(v: f64, lo: f64, hi: f64) -> f64 {
    lo.max(hi.min(v))
}
