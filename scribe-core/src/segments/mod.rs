//! Recognizer segment post-processing.
//!
//! All operations take the caller's segments by reference and return a new
//! list; nothing is modified in place.
//!
//! ```text
//! recognizer → scrub → find_hard_spans → (precise rerun) → splice → clamp_to_duration → alignment
//! ```

pub mod spans;

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

pub use spans::{clamp_to_duration, find_hard_spans, splice, HardSpan, HardSpanCriteria, Replacement};

/// Texts at least this long (spaces removed) are checked for character loops.
const REPEAT_CHECK_MIN_CHARS: usize = 12;

/// One time-stamped recognizer segment.
///
/// `start`/`end` are required; a record without them fails to deserialize.
/// Fields this crate does not interpret (words, speaker, tokens, …) are kept
/// verbatim in `extra`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Segment {
    #[serde(default)]
    pub id: usize,
    pub start: f64,
    pub end: f64,
    #[serde(default)]
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avg_logprob: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub compression_ratio: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub no_speech_prob: Option<f64>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Segment {
    pub fn new(start: f64, end: f64, text: impl Into<String>) -> Self {
        Self {
            id: 0,
            start,
            end,
            text: text.into(),
            avg_logprob: None,
            compression_ratio: None,
            no_speech_prob: None,
            extra: Map::new(),
        }
    }

    pub fn with_id(mut self, id: usize) -> Self {
        self.id = id;
        self
    }

    pub fn with_avg_logprob(mut self, v: f64) -> Self {
        self.avg_logprob = Some(v);
        self
    }

    pub fn with_compression_ratio(mut self, v: f64) -> Self {
        self.compression_ratio = Some(v);
        self
    }

    pub fn with_no_speech_prob(mut self, v: f64) -> Self {
        self.no_speech_prob = Some(v);
        self
    }

    pub fn duration(&self) -> f64 {
        self.end - self.start
    }
}

/// Post-recognition filter for loops and junk output.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScrubConfig {
    pub drop_if_avg_logprob_lt: f64,
    pub drop_if_compratio_gt: f64,
    pub drop_if_nospeech_gt: f64,
    /// Long texts whose distinct-character ratio falls below this are loops.
    pub unique_char_ratio_min: f64,
    pub min_segment_len_s: f64,
}

impl Default for ScrubConfig {
    fn default() -> Self {
        Self {
            drop_if_avg_logprob_lt: -1.1,
            drop_if_compratio_gt: 2.6,
            drop_if_nospeech_gt: 0.60,
            unique_char_ratio_min: 0.15,
            min_segment_len_s: 0.2,
        }
    }
}

/// Drop segments that are too short, low-confidence, or repetitive.
///
/// Survivors keep their relative order and their `id`.
pub fn scrub(segments: &[Segment], cfg: &ScrubConfig) -> Vec<Segment> {
    segments
        .iter()
        .filter(|s| keep_after_scrub(s, cfg))
        .cloned()
        .collect()
}

fn keep_after_scrub(s: &Segment, cfg: &ScrubConfig) -> bool {
    if s.duration() < cfg.min_segment_len_s {
        return false;
    }
    if s.avg_logprob.is_some_and(|lp| lp < cfg.drop_if_avg_logprob_lt) {
        return false;
    }
    if s.compression_ratio.is_some_and(|cr| cr > cfg.drop_if_compratio_gt) {
        return false;
    }
    if s.no_speech_prob.is_some_and(|ns| ns > cfg.drop_if_nospeech_gt) {
        return false;
    }
    let chars: Vec<char> = s.text.trim().chars().filter(|c| *c != ' ').collect();
    if chars.len() >= REPEAT_CHECK_MIN_CHARS {
        let unique = chars.iter().collect::<HashSet<_>>().len();
        if (unique as f64 / chars.len() as f64) < cfg.unique_char_ratio_min {
            return false;
        }
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scrub_filters_problematic_entries() {
        let cfg = ScrubConfig {
            min_segment_len_s: 0.5,
            drop_if_avg_logprob_lt: -0.2,
            drop_if_compratio_gt: 1.2,
            drop_if_nospeech_gt: 0.5,
            unique_char_ratio_min: 0.3,
        };
        let segments = vec![
            Segment::new(0.0, 0.3, "tiny"),
            Segment::new(0.0, 2.0, "avg").with_avg_logprob(-0.3),
            Segment::new(0.0, 2.0, "compr").with_compression_ratio(1.5),
            Segment::new(0.0, 2.0, "ns").with_no_speech_prob(0.7),
            Segment::new(0.0, 3.0, "aaaaaaaaaabbbb"),
            Segment::new(1.0, 2.0, "Keep one").with_avg_logprob(-0.1),
            Segment::new(3.0, 4.0, "Also keep").with_avg_logprob(0.0),
        ];

        let result = scrub(&segments, &cfg);
        assert_eq!(result, vec![segments[5].clone(), segments[6].clone()]);
    }

    #[test]
    fn scrub_never_keeps_segments_below_duration_floor() {
        let cfg = ScrubConfig::default();
        let segments = vec![
            Segment::new(5.0, 5.1, "a perfectly fine sentence")
                .with_avg_logprob(-0.01)
                .with_compression_ratio(1.0)
                .with_no_speech_prob(0.0),
            Segment::new(6.0, 5.5, "inverted"),
        ];
        assert!(scrub(&segments, &cfg).is_empty());
    }

    #[test]
    fn repeat_check_ignores_spaces_and_short_texts() {
        let cfg = ScrubConfig::default();
        // 11 non-space chars: below the length gate, kept despite repetition.
        let short = Segment::new(0.0, 1.0, "aaaa aaaa aaa");
        // 16 non-space chars, 2 distinct → ratio 0.125 < 0.15.
        let looped = Segment::new(0.0, 1.0, "ha ha ha ha ha ha ha ha");
        let out = scrub(&[short.clone(), looped], &cfg);
        assert_eq!(out, vec![short]);
    }

    #[test]
    fn scrub_preserves_ids_and_order() {
        let segments = vec![
            Segment::new(2.0, 3.0, "second").with_id(7),
            Segment::new(0.0, 1.0, "first").with_id(3),
        ];
        let out = scrub(&segments, &ScrubConfig::default());
        assert_eq!(out.iter().map(|s| s.id).collect::<Vec<_>>(), vec![7, 3]);
    }

    #[test]
    fn unknown_fields_survive_round_trip() {
        let json = r#"{"id":1,"start":0.5,"end":1.5,"text":"hi","speaker":"SPEAKER_01"}"#;
        let seg: Segment = serde_json::from_str(json).unwrap();
        assert_eq!(seg.extra["speaker"], "SPEAKER_01");
        let back = serde_json::to_value(&seg).unwrap();
        assert_eq!(back["speaker"], "SPEAKER_01");
        assert!(back.get("avg_logprob").is_none());
    }

    #[test]
    fn missing_bounds_fail_to_deserialize() {
        let err = serde_json::from_str::<Segment>(r#"{"id":1,"text":"no times"}"#);
        assert!(err.is_err());
    }
}
