//! Preflight orchestration: analyse, suggest, cache, merge with overrides.
//!
//! ```text
//! sha1(audio) ──► cache hit? ──yes──────────────┐
//!                    │ no                       │
//!                    ▼                          ▼
//!              AudioAnalyzer ─► AutoTuner ─► merge(overrides) ─► pre-norm ─► PreflightOutcome
//!                    │                                             │
//!                    └─► cache write                               └─► Normalizer (apply only)
//! ```
//!
//! Overrides always win. A suggested key the caller already set is dropped
//! and reported in `clipped_keys` rather than silently discarded.
//!
//! The `deferred` normaliser status means pre-norm was recommended and
//! `pre_norm_mode=apply` was requested, but `mode=suggest` held it back.
//! Earlier releases reported `skipped` for that combination.

pub mod artifacts;
pub mod cache;
pub mod normalize;

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::analysis::{AnalyzerConfig, AudioAnalyzer, AudioDiagnostics};
use crate::error::{Result, ScribeError};
use crate::thresholds::{Guardrails, Thresholds};
use crate::tuning::{AutoTuneSuggestion, AutoTuner, ConfigMap, DecodingMode, PreNorm};

pub use artifacts::{write_artifacts, write_json_atomic, ArtifactPaths};
pub use cache::{hash_file, CachedAnalysis, DiagnosticsCache};
pub use normalize::{normalized_path, FfmpegNormalizer, NormalizeStatus, Normalizer};

/// Default cache entry lifetime: one day.
pub const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(86_400);

const PRE_NORM_KEY: &str = "pre_norm";
const CONDITION_KEY: &str = "condition_on_previous_text";

/// Whether suggestions are merged into the returned config or only reported.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TuneMode {
    #[default]
    Apply,
    Suggest,
}

impl fmt::Display for TuneMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            TuneMode::Apply => "apply",
            TuneMode::Suggest => "suggest",
        })
    }
}

impl FromStr for TuneMode {
    type Err = ScribeError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "apply" => Ok(TuneMode::Apply),
            "suggest" => Ok(TuneMode::Suggest),
            other => Err(ScribeError::InvalidMode(other.to_string())),
        }
    }
}

/// Caller-side knobs for one preflight call.
#[derive(Debug, Clone)]
pub struct PreflightOptions {
    /// Keys the caller has set explicitly; never overwritten.
    pub overrides: ConfigMap,
    pub mode: TuneMode,
    pub pre_norm_mode: PreNorm,
    pub cache_ttl: Duration,
    pub no_cache: bool,
    /// Where the normalised audio goes; defaults to the source directory.
    pub artifact_dir: Option<PathBuf>,
}

impl Default for PreflightOptions {
    fn default() -> Self {
        Self {
            overrides: ConfigMap::new(),
            mode: TuneMode::Apply,
            pre_norm_mode: PreNorm::Suggest,
            cache_ttl: DEFAULT_CACHE_TTL,
            no_cache: false,
            artifact_dir: None,
        }
    }
}

impl PreflightOptions {
    /// Options from the string forms used on the command line.
    ///
    /// # Errors
    /// `InvalidMode` / `InvalidPreNormMode` for unknown values.
    pub fn from_modes(mode: &str, pre_norm_mode: &str) -> Result<Self> {
        Ok(Self {
            mode: mode.parse()?,
            pre_norm_mode: pre_norm_mode.parse()?,
            ..Self::default()
        })
    }

    pub fn with_override(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.overrides.insert(key.into(), value.into());
        self
    }

    pub fn with_cache_ttl(mut self, ttl: Duration) -> Self {
        self.cache_ttl = ttl;
        self
    }

    pub fn without_cache(mut self) -> Self {
        self.no_cache = true;
        self
    }

    pub fn with_artifact_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.artifact_dir = Some(dir.into());
        self
    }
}

/// Pre-normalisation detail in the report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PreNormReport {
    pub suggested: PreNorm,
    #[serde(rename = "final")]
    pub final_state: PreNorm,
    pub applied_path: Option<PathBuf>,
    pub ffmpeg: NormalizeStatus,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheReport {
    pub hit: bool,
}

/// Everything a preflight call learned, written verbatim as artifacts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PreflightReport {
    pub metrics: AudioDiagnostics,
    pub suggestion: AutoTuneSuggestion,
    pub final_config: ConfigMap,
    pub pre_norm: PreNormReport,
    pub cache: CacheReport,
    pub clipped_keys: Vec<String>,
    pub elapsed_ms: u64,
}

/// One-line digest the pipeline logs after preflight.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PreflightSummary {
    pub snr_db: f64,
    pub micro_ratio: f64,
    pub decision: DecodingMode,
}

impl PreflightReport {
    pub fn summary(&self) -> PreflightSummary {
        PreflightSummary {
            snr_db: self.metrics.snr_db,
            micro_ratio: self.metrics.micro_segment_ratio,
            decision: self.suggestion.rationale.decoding_mode,
        }
    }
}

/// Result of [`Preflight::run`].
#[derive(Debug, Clone)]
pub struct PreflightOutcome {
    /// Keys to merge into the recognizer configuration. Empty in suggest mode.
    pub applied_cfg: ConfigMap,
    pub report: PreflightReport,
    source: PathBuf,
}

impl PreflightOutcome {
    /// The normalised file when pre-normalisation ran, else the input file.
    pub fn audio_path(&self) -> &Path {
        self.report
            .pre_norm
            .applied_path
            .as_deref()
            .unwrap_or(self.source.as_path())
    }
}

/// Combine the suggested pre-norm state with the caller's wishes.
pub fn resolve_pre_norm(suggested: PreNorm, pre_norm_mode: PreNorm, mode: TuneMode) -> PreNorm {
    if suggested != PreNorm::Apply || pre_norm_mode == PreNorm::Off {
        return PreNorm::Off;
    }
    if pre_norm_mode == PreNorm::Apply && mode == TuneMode::Apply {
        PreNorm::Apply
    } else {
        PreNorm::Suggest
    }
}

/// Suggestion keys merged against overrides.
struct Merged {
    applied: ConfigMap,
    final_config: ConfigMap,
    clipped_keys: Vec<String>,
}

fn merge_with_overrides(suggested: &ConfigMap, overrides: &ConfigMap, mode: TuneMode) -> Merged {
    let mut applied = ConfigMap::new();
    let mut final_config = overrides.clone();
    let mut clipped_keys = Vec::new();

    if mode == TuneMode::Apply {
        for (key, value) in suggested {
            if key == PRE_NORM_KEY {
                continue;
            }
            if overrides.contains_key(key) {
                clipped_keys.push(key.clone());
            } else {
                applied.insert(key.clone(), value.clone());
                final_config.insert(key.clone(), value.clone());
            }
        }
    }

    if let Some(v) = suggested.get(CONDITION_KEY) {
        final_config
            .entry(CONDITION_KEY.to_string())
            .or_insert_with(|| v.clone());
    }

    Merged {
        applied,
        final_config,
        clipped_keys,
    }
}

/// Analyzer + tuner + cache + normaliser, wired together.
pub struct Preflight {
    analyzer: AudioAnalyzer,
    tuner: AutoTuner,
    cache: DiagnosticsCache,
    normalizer: Box<dyn Normalizer>,
}

impl Preflight {
    pub fn new(
        analyzer: AudioAnalyzer,
        tuner: AutoTuner,
        cache: DiagnosticsCache,
        normalizer: Box<dyn Normalizer>,
    ) -> Self {
        Self {
            analyzer,
            tuner,
            cache,
            normalizer,
        }
    }

    /// Default analyzer and thresholds, user cache dir, ffmpeg from `PATH`.
    pub fn with_defaults() -> Self {
        let thresholds = Thresholds::default();
        Self::new(
            AudioAnalyzer::new(AnalyzerConfig::default(), thresholds),
            AutoTuner::new(thresholds, Guardrails::default()),
            DiagnosticsCache::new(DiagnosticsCache::default_dir()),
            Box::new(FfmpegNormalizer::new()),
        )
    }

    pub fn cache(&self) -> &DiagnosticsCache {
        &self.cache
    }

    /// Analyse `audio_path` (or reuse a cached analysis) and derive the
    /// configuration to apply.
    ///
    /// # Errors
    /// Unreadable or undecodable audio, a missing resampler, or a suggestion
    /// that fails to serialize. Cache and normaliser problems never fail the call.
    pub fn run(&mut self, audio_path: &Path, options: &PreflightOptions) -> Result<PreflightOutcome> {
        let started = Instant::now();
        let source = std::fs::canonicalize(audio_path)?;
        let key = hash_file(&source)?;

        let cached = if options.no_cache {
            None
        } else {
            self.cache.load(&key, options.cache_ttl)
        };
        let hit = cached.is_some();

        let (metrics, suggestion) = match cached {
            Some(entry) => {
                debug!(key = %key, "preflight cache hit");
                (entry.diagnostics, entry.suggestion)
            }
            None => {
                debug!(key = %key, "preflight cache miss");
                let diag = self.analyzer.analyze(&source)?;
                let suggestion = self.tuner.suggest(&diag);
                if !options.no_cache {
                    self.cache.store(&key, &diag, &suggestion);
                }
                (diag, suggestion)
            }
        };

        let suggested_map = suggestion.cfg.to_map()?;
        let Merged {
            mut applied,
            mut final_config,
            clipped_keys,
        } = merge_with_overrides(&suggested_map, &options.overrides, options.mode);
        if !clipped_keys.is_empty() {
            warn!(keys = ?clipped_keys, "auto-tune suggestions skipped due to user overrides");
        }

        let suggested_pre_norm = suggestion.cfg.pre_norm;
        let final_pre_norm = resolve_pre_norm(suggested_pre_norm, options.pre_norm_mode, options.mode);
        final_config.insert(PRE_NORM_KEY.to_string(), Value::from(final_pre_norm.as_str()));

        let (ffmpeg, applied_path) = match (final_pre_norm, options.mode) {
            (PreNorm::Apply, TuneMode::Apply) => {
                let dest = normalized_path(&source, options.artifact_dir.as_deref());
                let status = self.normalizer.normalize(&source, &dest);
                let path = (status == NormalizeStatus::Applied).then_some(dest);
                (status, path)
            }
            // Application was requested but suggest mode holds it back.
            (PreNorm::Suggest, TuneMode::Suggest) if options.pre_norm_mode == PreNorm::Apply => {
                (NormalizeStatus::Deferred, None)
            }
            _ => (NormalizeStatus::Skipped, None),
        };

        match options.mode {
            TuneMode::Apply => {
                applied.insert(PRE_NORM_KEY.to_string(), Value::from(final_pre_norm.as_str()));
            }
            TuneMode::Suggest => applied.clear(),
        }

        let report = PreflightReport {
            metrics,
            suggestion,
            final_config,
            pre_norm: PreNormReport {
                suggested: suggested_pre_norm,
                final_state: final_pre_norm,
                applied_path,
                ffmpeg,
            },
            cache: CacheReport { hit },
            clipped_keys,
            elapsed_ms: started.elapsed().as_millis() as u64,
        };

        info!(
            mode = %options.mode,
            cache_hit = hit,
            decision = ?report.suggestion.rationale.decoding_mode,
            pre_norm = %final_pre_norm,
            ffmpeg = ?report.pre_norm.ffmpeg,
            elapsed_ms = report.elapsed_ms,
            "preflight complete"
        );

        Ok(PreflightOutcome {
            applied_cfg: applied,
            report,
            source,
        })
    }
}

/// Run preflight with the default analyzer, cache location and ffmpeg.
pub fn preflight(audio_path: &Path, options: &PreflightOptions) -> Result<PreflightOutcome> {
    Preflight::with_defaults().run(audio_path, options)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn suggested() -> ConfigMap {
        [
            ("beam_size", json!(3)),
            ("temperature", json!(0.0)),
            ("condition_on_previous_text", json!(false)),
            ("pre_norm", json!("apply")),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v))
        .collect()
    }

    #[test]
    fn modes_reject_unknown_strings() {
        assert!(matches!(
            "Apply".parse::<TuneMode>(),
            Err(ScribeError::InvalidMode(v)) if v == "Apply"
        ));
        assert!(matches!(
            PreflightOptions::from_modes("apply", "always"),
            Err(ScribeError::InvalidPreNormMode(v)) if v == "always"
        ));
        let ok = PreflightOptions::from_modes("suggest", "off").unwrap();
        assert_eq!(ok.mode, TuneMode::Suggest);
        assert_eq!(ok.pre_norm_mode, PreNorm::Off);
        assert_eq!(ok.cache_ttl, DEFAULT_CACHE_TTL);
    }

    #[test]
    fn pre_norm_resolution_table() {
        use PreNorm::*;
        use TuneMode::{Apply as A, Suggest as S};

        for mode in [A, S] {
            for pn in [Off, Suggest, Apply] {
                assert_eq!(resolve_pre_norm(Off, pn, mode), Off);
            }
            assert_eq!(resolve_pre_norm(Apply, Off, mode), Off);
            assert_eq!(resolve_pre_norm(Apply, Suggest, mode), Suggest);
        }
        assert_eq!(resolve_pre_norm(Apply, Apply, A), Apply);
        assert_eq!(resolve_pre_norm(Apply, Apply, S), Suggest);
    }

    #[test]
    fn overrides_win_and_collisions_are_reported() {
        let overrides: ConfigMap = [("beam_size".to_string(), json!(7))].into_iter().collect();
        let merged = merge_with_overrides(&suggested(), &overrides, TuneMode::Apply);

        assert_eq!(merged.clipped_keys, vec!["beam_size".to_string()]);
        assert!(!merged.applied.contains_key("beam_size"));
        assert!(!merged.applied.contains_key("pre_norm"));
        assert_eq!(merged.applied["temperature"], json!(0.0));
        assert_eq!(merged.final_config["beam_size"], json!(7));
        assert_eq!(merged.final_config["temperature"], json!(0.0));
    }

    #[test]
    fn suggest_mode_applies_nothing() {
        let overrides: ConfigMap = [("language".to_string(), json!("de"))].into_iter().collect();
        let merged = merge_with_overrides(&suggested(), &overrides, TuneMode::Suggest);

        assert!(merged.applied.is_empty());
        assert!(merged.clipped_keys.is_empty());
        assert_eq!(merged.final_config.len(), 2);
        assert_eq!(merged.final_config["language"], json!("de"));
        assert_eq!(merged.final_config["condition_on_previous_text"], json!(false));
    }

    #[test]
    fn condition_default_never_replaces_override() {
        let overrides: ConfigMap = [("condition_on_previous_text".to_string(), json!(true))]
            .into_iter()
            .collect();
        let merged = merge_with_overrides(&suggested(), &overrides, TuneMode::Suggest);
        assert_eq!(merged.final_config["condition_on_previous_text"], json!(true));
    }

    #[test]
    fn builder_collects_overrides() {
        let opts = PreflightOptions::default()
            .with_override("beam_size", 7)
            .with_cache_ttl(Duration::from_secs(5))
            .without_cache();
        assert_eq!(opts.overrides["beam_size"], json!(7));
        assert_eq!(opts.cache_ttl, Duration::from_secs(5));
        assert!(opts.no_cache);
    }
}
