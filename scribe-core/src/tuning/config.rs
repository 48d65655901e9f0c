//! Typed decoder/VAD suggestion values.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{Result, ScribeError};

/// Flat key → value mapping handed to the recognizer configuration.
pub type ConfigMap = BTreeMap<String, Value>;

/// Either a single decoding temperature or a fallback schedule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Temperature {
    Fixed(f64),
    Schedule(Vec<f64>),
}

/// Pre-normalisation state: a suggestion, a caller mode, or a final decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PreNorm {
    Off,
    Suggest,
    Apply,
}

impl PreNorm {
    pub fn as_str(self) -> &'static str {
        match self {
            PreNorm::Off => "off",
            PreNorm::Suggest => "suggest",
            PreNorm::Apply => "apply",
        }
    }
}

impl fmt::Display for PreNorm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PreNorm {
    type Err = ScribeError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "off" => Ok(PreNorm::Off),
            "suggest" => Ok(PreNorm::Suggest),
            "apply" => Ok(PreNorm::Apply),
            other => Err(ScribeError::InvalidPreNormMode(other.to_string())),
        }
    }
}

/// Decoding strategy picked from the audio classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DecodingMode {
    Sampling,
    Beam,
    SamplingMixed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VadProfile {
    MicroSegments,
    Balanced,
}

/// Suggested recognizer settings.
///
/// `beam_size` is serialized as `null` when beam search is disabled so the
/// key still takes part in override clipping; `best_of` is only emitted by
/// the sampling profiles.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TuneConfig {
    pub use_vad: bool,
    pub beam_size: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub best_of: Option<u32>,
    pub temperature: Temperature,
    pub patience: f64,
    pub no_speech_threshold: f64,
    pub compression_ratio_threshold: f64,
    pub log_prob_threshold: f64,
    pub condition_on_previous_text: bool,
    pub vad_max_speech_s: f64,
    pub vad_min_speech_ms: u32,
    pub vad_min_silence_ms: u32,
    pub vad_speech_pad_ms: u32,
    pub pre_norm: PreNorm,
}

impl TuneConfig {
    /// Flatten into the key → value form used for override merging.
    pub fn to_map(&self) -> Result<ConfigMap> {
        match serde_json::to_value(self)? {
            Value::Object(map) => Ok(map.into_iter().collect()),
            other => Err(ScribeError::Other(anyhow::anyhow!(
                "tune config serialized to non-object: {other}"
            ))),
        }
    }
}

/// Inputs and labels explaining a suggestion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Rationale {
    pub snr_db: f64,
    pub spectral_flatness_mean: f64,
    pub micro_segment_ratio: f64,
    pub p95_speech_s: f64,
    pub median_gap_s: f64,
    pub decoding_mode: DecodingMode,
    pub vad_profile: VadProfile,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pre_norm_parses_known_values_only() {
        assert_eq!("apply".parse::<PreNorm>().unwrap(), PreNorm::Apply);
        assert_eq!("off".parse::<PreNorm>().unwrap(), PreNorm::Off);
        let err = "Apply".parse::<PreNorm>().unwrap_err();
        assert!(matches!(err, ScribeError::InvalidPreNormMode(v) if v == "Apply"));
    }

    #[test]
    fn temperature_serializes_untagged() {
        assert_eq!(serde_json::to_string(&Temperature::Fixed(0.0)).unwrap(), "0.0");
        assert_eq!(
            serde_json::to_string(&Temperature::Schedule(vec![0.2, 0.4])).unwrap(),
            "[0.2,0.4]"
        );
        let back: Temperature = serde_json::from_str("[0.2,0.4,0.6]").unwrap();
        assert_eq!(back, Temperature::Schedule(vec![0.2, 0.4, 0.6]));
    }

    #[test]
    fn labels_use_snake_case() {
        assert_eq!(
            serde_json::to_value(DecodingMode::SamplingMixed).unwrap(),
            "sampling_mixed"
        );
        assert_eq!(
            serde_json::to_value(VadProfile::MicroSegments).unwrap(),
            "micro_segments"
        );
    }
}
