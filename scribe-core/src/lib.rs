//! # scribe-core
//!
//! Preflight and post-processing for long-form session transcription.
//!
//! ## Architecture
//!
//! ```text
//! audio file ─► AudioAnalyzer ─► AudioDiagnostics ─► AutoTuner ─► AutoTuneSuggestion
//!                                                                   │
//!                          overrides ─► Preflight (cache, merge, pre-norm) ─► applied config
//!
//! recognizer segments ─► scrub ─► find_hard_spans ─► (precise rerun) ─► splice ─► clamp_to_duration
//! ```
//!
//! The two halves share no state: the preflight decides how the recognizer
//! runs, the segment processor cleans up what it produced.

#![forbid(unsafe_code)]
#![warn(clippy::all)]

pub mod analysis;
pub mod audio;
pub mod error;
pub mod preflight;
pub mod segments;
pub mod thresholds;
pub mod tuning;
pub mod vad;

// Convenience re-exports for downstream crates
pub use analysis::{AnalyzerConfig, AudioAnalyzer, AudioDiagnostics};
pub use error::{Result, ScribeError};
pub use preflight::{
    preflight, Preflight, PreflightOptions, PreflightOutcome, PreflightReport, TuneMode,
};
pub use segments::{
    clamp_to_duration, find_hard_spans, scrub, splice, HardSpan, HardSpanCriteria, Replacement,
    ScrubConfig, Segment,
};
pub use thresholds::{Guardrails, Thresholds, AUTO_TUNE_VERSION};
pub use tuning::{AutoTuneSuggestion, AutoTuner, PreNorm, TuneConfig};

#[cfg(feature = "onnx")]
pub use vad::SileroVad;
