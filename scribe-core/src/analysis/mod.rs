//! Audio diagnostics for the auto-tune preflight.
//!
//! ## Stages
//!
//! ```text
//! load_mono → resample to 16 kHz → level/clipping
//!                                 → 30 ms frames → FrameClassifier → speech segments
//!                                                                   → gaps, percentiles, micro ratio
//!                                                                   → SNR (speech vs. non-speech RMS)
//!                                 → spectral flatness
//!                                 → pre-norm heuristic
//! ```
//!
//! Every output is finite except `rms_dbfs`/`peak_dbfs`, which are `-inf`
//! for a digitally silent file.

pub mod flatness;
pub mod stats;

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::{
    audio::{self, resample::Resample, resample::RubatoResampler, AudioChunk},
    error::{Result, ScribeError},
    thresholds::Thresholds,
    vad::{default_classifier, ClassifierConfig, FrameClassifier},
};

use self::flatness::SpectralFlatness;

/// Aggregate metrics describing one audio file. Built once, never mutated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AudioDiagnostics {
    /// Duration at the native sample rate, before resampling.
    pub duration_s: f64,
    /// Analysis sample rate.
    pub sr: u32,
    #[serde(with = "nullable_dbfs")]
    pub rms_dbfs: f64,
    #[serde(with = "nullable_dbfs")]
    pub peak_dbfs: f64,
    pub clipping_ratio: f64,
    pub snr_db: f64,
    pub spectral_flatness_mean: f64,
    pub p25_speech_s: f64,
    pub median_speech_s: f64,
    pub p90_speech_s: f64,
    pub p95_speech_s: f64,
    pub median_gap_s: f64,
    pub p90_gap_s: f64,
    pub micro_segment_ratio: f64,
    pub num_segments: usize,
    pub pre_norm_recommended: bool,
}

/// JSON has no infinities: silent files store their dBFS levels as `null`.
mod nullable_dbfs {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &f64, s: S) -> Result<S::Ok, S::Error> {
        if value.is_finite() {
            s.serialize_f64(*value)
        } else {
            s.serialize_none()
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<f64, D::Error> {
        Ok(Option::<f64>::deserialize(d)?.unwrap_or(f64::NEG_INFINITY))
    }
}

/// Fixed analysis parameters.
#[derive(Debug, Clone)]
pub struct AnalyzerConfig {
    /// Rate every statistic is computed at (Hz). Default: 16000.
    pub analysis_rate: u32,
    /// VAD frame length in milliseconds. Default: 30.
    pub frame_ms: u32,
    /// Samples at or above this magnitude count as clipped. Default: 0.999.
    pub clip_level: f32,
    /// Below this much non-speech audio (seconds) the SNR is not estimated.
    pub snr_min_noise_s: f64,
    /// SNR reported when there is too little non-speech audio.
    pub snr_neutral_db: f64,
    /// SNR reported when the non-speech audio is digitally silent.
    pub snr_ceiling_db: f64,
    pub snr_floor_db: f64,
    pub flatness_n_fft: usize,
    pub flatness_hop: usize,
    pub classifier: ClassifierConfig,
}

impl Default for AnalyzerConfig {
    fn default() -> Self {
        Self {
            analysis_rate: 16_000,
            frame_ms: 30,
            clip_level: 0.999,
            snr_min_noise_s: 0.3,
            snr_neutral_db: 15.0,
            snr_ceiling_db: 60.0,
            snr_floor_db: -10.0,
            flatness_n_fft: 1024,
            flatness_hop: 512,
            classifier: ClassifierConfig::default(),
        }
    }
}

/// Speech regions found by the frame classifier.
struct SpeechMap {
    /// `(start_s, end_s)` on the frame grid.
    segments: Vec<(f64, f64)>,
    /// Per-sample speech flag, same length as the analysed signal.
    mask: Vec<bool>,
}

/// Computes [`AudioDiagnostics`] for audio files.
pub struct AudioAnalyzer {
    config: AnalyzerConfig,
    thresholds: Thresholds,
    resampler: Option<Box<dyn Resample>>,
    classifier: Box<dyn FrameClassifier>,
    flatness: Option<SpectralFlatness>,
}

impl AudioAnalyzer {
    /// Analyzer with the rubato resampler, the best available VAD and FFT flatness.
    pub fn new(config: AnalyzerConfig, thresholds: Thresholds) -> Self {
        let classifier = default_classifier(&config.classifier);
        let flatness = SpectralFlatness::new(config.flatness_n_fft, config.flatness_hop);
        Self {
            config,
            thresholds,
            resampler: Some(Box::new(RubatoResampler::default())),
            classifier,
            flatness: Some(flatness),
        }
    }

    /// Replace (or remove, with `None`) the resampling capability.
    pub fn with_resampler(mut self, resampler: Option<Box<dyn Resample>>) -> Self {
        self.resampler = resampler;
        self
    }

    pub fn with_classifier(mut self, classifier: Box<dyn FrameClassifier>) -> Self {
        self.classifier = classifier;
        self
    }

    /// Disable spectral flatness; diagnostics then report `0.0`.
    pub fn without_flatness(mut self) -> Self {
        self.flatness = None;
        self
    }

    pub fn thresholds(&self) -> &Thresholds {
        &self.thresholds
    }

    /// Decode `path` and analyse it.
    pub fn analyze(&mut self, path: &Path) -> Result<AudioDiagnostics> {
        let chunk = audio::load_mono(path)?;
        let diag = self.analyze_chunk(chunk)?;
        info!(
            path = %path.display(),
            duration_s = diag.duration_s,
            snr_db = diag.snr_db,
            flatness = diag.spectral_flatness_mean,
            segments = diag.num_segments,
            pre_norm = diag.pre_norm_recommended,
            "audio diagnostics computed"
        );
        Ok(diag)
    }

    /// Analyse an already decoded mono signal at its native rate.
    ///
    /// # Errors
    /// `ScribeError::ResamplerUnavailable` when the signal is not at the
    /// analysis rate and no resampler was configured.
    pub fn analyze_chunk(&mut self, chunk: AudioChunk) -> Result<AudioDiagnostics> {
        let duration_s = chunk.duration_secs();
        let rate = self.config.analysis_rate;

        let signal = if chunk.sample_rate == rate {
            chunk
        } else {
            let resampler =
                self.resampler
                    .as_mut()
                    .ok_or(ScribeError::ResamplerUnavailable {
                        from: chunk.sample_rate,
                        to: rate,
                    })?;
            AudioChunk::new(
                resampler.resample(&chunk.samples, chunk.sample_rate, rate)?,
                rate,
            )
        };
        let samples = &signal.samples;

        let rms_dbfs = stats::dbfs(stats::rms(samples));
        let peak_dbfs = stats::dbfs(stats::peak(samples));
        let clipping_ratio = stats::clipping_ratio(samples, self.config.clip_level);

        let speech = self.segment_speech(&signal);
        let speech_durations: Vec<f64> = speech.segments.iter().map(|(s, e)| e - s).collect();
        let gap_durations = stats::gaps(&speech.segments, duration_s);

        let snr_db = self.estimate_snr(samples, &speech.mask);
        let spectral_flatness_mean = self
            .flatness
            .as_ref()
            .map(|f| f.mean(samples))
            .unwrap_or(0.0);
        let micro_segment_ratio =
            stats::micro_segment_ratio(&speech_durations, self.thresholds.micro_segment_limit_s);

        let pre_norm_recommended = self.should_pre_norm(
            snr_db,
            spectral_flatness_mean,
            clipping_ratio,
            peak_dbfs,
            rms_dbfs,
        );

        Ok(AudioDiagnostics {
            duration_s,
            sr: rate,
            rms_dbfs,
            peak_dbfs,
            clipping_ratio,
            snr_db,
            spectral_flatness_mean,
            p25_speech_s: stats::percentile(&speech_durations, 25.0),
            median_speech_s: stats::percentile(&speech_durations, 50.0),
            p90_speech_s: stats::percentile(&speech_durations, 90.0),
            p95_speech_s: stats::percentile(&speech_durations, 95.0),
            median_gap_s: stats::percentile(&gap_durations, 50.0),
            p90_gap_s: stats::percentile(&gap_durations, 90.0),
            micro_segment_ratio,
            num_segments: speech.segments.len(),
            pre_norm_recommended,
        })
    }

    fn segment_speech(&mut self, signal: &AudioChunk) -> SpeechMap {
        let frame_len = (signal.sample_rate as usize * self.config.frame_ms as usize / 1000).max(1);
        let frame_s = f64::from(self.config.frame_ms) / 1000.0;
        let frames = signal.frames(frame_len);
        let decisions = self.classifier.classify_frames(&frames);
        debug!(
            classifier = self.classifier.name(),
            frames = frames.len(),
            speech_frames = decisions.iter().filter(|d| d.is_speech()).count(),
            "frame classification done"
        );

        let mut segments = Vec::new();
        let mut mask = vec![false; frames.len() * frame_len];
        let mut current_start: Option<f64> = None;

        for idx in 0..frames.len() {
            let start_time = idx as f64 * frame_s;
            let speech = decisions.get(idx).is_some_and(|d| d.is_speech());
            if speech {
                mask[idx * frame_len..(idx + 1) * frame_len].fill(true);
                current_start.get_or_insert(start_time);
            } else if let Some(start) = current_start.take() {
                segments.push((start, start_time));
            }
        }
        if let Some(start) = current_start {
            segments.push((start, frames.len() as f64 * frame_s));
        }

        mask.truncate(signal.samples.len());
        SpeechMap { segments, mask }
    }

    fn estimate_snr(&self, samples: &[f32], mask: &[bool]) -> f64 {
        let (speech, noise): (Vec<f32>, Vec<f32>) = {
            let mut speech = Vec::new();
            let mut noise = Vec::new();
            for (&s, &is_speech) in samples.iter().zip(mask) {
                if is_speech {
                    speech.push(s);
                } else {
                    noise.push(s);
                }
            }
            (speech, noise)
        };

        if speech.is_empty() {
            return 0.0;
        }
        let min_noise = (f64::from(self.config.analysis_rate) * self.config.snr_min_noise_s) as usize;
        if noise.len() < min_noise {
            return self.config.snr_neutral_db;
        }
        let noise_rms = stats::rms(&noise);
        if noise_rms <= 0.0 {
            return self.config.snr_ceiling_db;
        }
        let speech_rms = stats::rms(&speech) + 1e-12;
        (20.0 * (speech_rms / noise_rms).log10())
            .clamp(self.config.snr_floor_db, self.config.snr_ceiling_db)
    }

    fn should_pre_norm(
        &self,
        snr_db: f64,
        flatness: f64,
        clipping_ratio: f64,
        peak_dbfs: f64,
        rms_dbfs: f64,
    ) -> bool {
        let t = &self.thresholds;
        snr_db < t.pre_norm_snr_db
            || flatness > t.high_flatness
            || clipping_ratio > t.clipping_ratio
            || peak_dbfs > t.pre_norm_peak_dbfs
            || rms_dbfs < t.pre_norm_rms_dbfs
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vad::{EnergyPercentileVad, VadDecision};
    use approx::assert_relative_eq;

    const SR: u32 = 16_000;

    fn tone(seconds: f64, amplitude: f32) -> Vec<f32> {
        let n = (seconds * SR as f64) as usize;
        (0..n)
            .map(|i| (2.0 * std::f32::consts::PI * 220.0 * i as f32 / SR as f32).sin() * amplitude)
            .collect()
    }

    fn analyzer() -> AudioAnalyzer {
        AudioAnalyzer::new(AnalyzerConfig::default(), Thresholds::default())
            .with_classifier(Box::new(EnergyPercentileVad::default()))
    }

    /// Marks fixed frame indices as speech.
    struct ScriptedVad(Vec<bool>);

    impl FrameClassifier for ScriptedVad {
        fn classify_frames(&mut self, frames: &[AudioChunk]) -> Vec<VadDecision> {
            (0..frames.len())
                .map(|i| VadDecision::from(self.0.get(i).copied().unwrap_or(false)))
                .collect()
        }

        fn name(&self) -> &'static str {
            "scripted"
        }
    }

    #[test]
    fn silence_has_no_speech_and_zero_snr() {
        let diag = analyzer()
            .analyze_chunk(AudioChunk::new(vec![0.0; SR as usize * 2], SR))
            .unwrap();
        assert_eq!(diag.num_segments, 0);
        assert_eq!(diag.snr_db, 0.0);
        assert_eq!(diag.rms_dbfs, f64::NEG_INFINITY);
        assert_eq!(diag.peak_dbfs, f64::NEG_INFINITY);
        assert_eq!(diag.micro_segment_ratio, 0.0);
        assert_eq!(diag.median_gap_s, 0.0);
        assert!(diag.pre_norm_recommended);
    }

    #[test]
    fn tone_pause_tone_yields_two_segments() {
        let mut samples = tone(1.2, 0.1);
        samples.extend(vec![0.0; (0.42 * SR as f64) as usize]);
        samples.extend(tone(1.2, 0.1));

        let diag = analyzer()
            .analyze_chunk(AudioChunk::new(samples, SR))
            .unwrap();
        assert_eq!(diag.num_segments, 2);
        assert_eq!(diag.sr, SR);
        // Digitally silent pause ≥ 300 ms → ceiling.
        assert_eq!(diag.snr_db, 60.0);
        let expected_rms = 0.1f64 / 2f64.sqrt() * (2.4f64 / 2.82).sqrt();
        assert_relative_eq!(diag.rms_dbfs, 20.0 * expected_rms.log10(), epsilon = 0.2);
        assert!(diag.clipping_ratio == 0.0);
        assert!(diag.p25_speech_s > 1.0 && diag.p95_speech_s < 1.4);
    }

    #[test]
    fn short_pause_uses_neutral_snr() {
        let mut samples = tone(1.0, 0.2);
        samples.extend(vec![0.0; (0.09 * SR as f64) as usize]);
        samples.extend(tone(1.0, 0.2));
        let diag = analyzer()
            .analyze_chunk(AudioChunk::new(samples, SR))
            .unwrap();
        assert_eq!(diag.snr_db, 15.0);
    }

    #[test]
    fn snr_is_clamped_and_finite_with_noise_floor() {
        let mut samples = tone(1.0, 0.5);
        samples.extend(tone(1.0, 0.5).iter().map(|s| s * 0.01));
        // Frames 0..=33 hold the loud tone, the rest is the quiet copy.
        let mask: Vec<bool> = (0..70).map(|i| i < 34).collect();
        let diag = analyzer()
            .with_classifier(Box::new(ScriptedVad(mask)))
            .analyze_chunk(AudioChunk::new(samples, SR))
            .unwrap();
        assert!(diag.snr_db.is_finite());
        assert!(diag.snr_db > 30.0 && diag.snr_db <= 60.0, "snr={}", diag.snr_db);
    }

    #[test]
    fn trailing_segment_is_closed_at_end_of_stream() {
        let samples = tone(0.9, 0.3);
        let diag = analyzer()
            .with_classifier(Box::new(ScriptedVad(vec![true; 30])))
            .analyze_chunk(AudioChunk::new(samples, SR))
            .unwrap();
        assert_eq!(diag.num_segments, 1);
        assert_relative_eq!(diag.median_speech_s, 0.9, epsilon = 1e-9);
        assert_relative_eq!(diag.micro_segment_ratio, 1.0);
    }

    #[test]
    fn missing_resampler_is_fatal_for_foreign_rates() {
        let err = analyzer()
            .with_resampler(None)
            .analyze_chunk(AudioChunk::new(vec![0.1; 44_100], 44_100))
            .unwrap_err();
        assert!(matches!(
            err,
            ScribeError::ResamplerUnavailable {
                from: 44_100,
                to: 16_000
            }
        ));
    }

    #[test]
    fn native_rate_needs_no_resampler() {
        let diag = analyzer()
            .with_resampler(None)
            .analyze_chunk(AudioChunk::new(tone(0.5, 0.1), SR))
            .unwrap();
        assert_relative_eq!(diag.duration_s, 0.5);
    }

    #[test]
    fn resampled_input_keeps_original_duration() {
        let n = 48_000;
        let samples: Vec<f32> = (0..n)
            .map(|i| (2.0 * std::f32::consts::PI * 220.0 * i as f32 / 48_000.0).sin() * 0.1)
            .collect();
        let diag = analyzer()
            .analyze_chunk(AudioChunk::new(samples, 48_000))
            .unwrap();
        assert_relative_eq!(diag.duration_s, 1.0);
        assert_eq!(diag.sr, SR);
    }

    #[test]
    fn flatness_disabled_reports_zero() {
        let diag = analyzer()
            .without_flatness()
            .analyze_chunk(AudioChunk::new(tone(0.5, 0.1), SR))
            .unwrap();
        assert_eq!(diag.spectral_flatness_mean, 0.0);
    }

    #[test]
    fn clipping_triggers_pre_norm() {
        let samples = vec![1.0f32; SR as usize];
        let diag = analyzer()
            .analyze_chunk(AudioChunk::new(samples, SR))
            .unwrap();
        assert_relative_eq!(diag.clipping_ratio, 1.0);
        assert!(diag.pre_norm_recommended);
    }

    #[test]
    fn silent_levels_round_trip_through_json() {
        let diag = analyzer()
            .analyze_chunk(AudioChunk::new(vec![0.0; 1600], SR))
            .unwrap();
        let json = serde_json::to_value(&diag).unwrap();
        assert!(json["rms_dbfs"].is_null());
        let back: AudioDiagnostics = serde_json::from_value(json).unwrap();
        assert_eq!(back, diag);
    }
}
