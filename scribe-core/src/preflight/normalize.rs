//! External pre-normalisation pass.
//!
//! Band-passes and loudness-normalises a recording into a new mono 16 kHz
//! PCM file. Failures are reported as a [`NormalizeStatus`], never as an
//! error: the original file stays usable.

use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

const PRE_NORM_SUFFIX: &str = ".autonorm.wav";
const FILTER_CHAIN: &str = "highpass=f=100,lowpass=f=8000,dynaudnorm=f=75:s=10";

/// What happened to the pre-normalisation step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NormalizeStatus {
    /// Not requested.
    Skipped,
    /// Recommended, but the caller only asked for suggestions.
    Deferred,
    Applied,
    Failed,
    MissingFfmpeg,
}

/// Capability that writes a normalised copy of `src` to `dest`.
pub trait Normalizer: Send + Sync {
    fn normalize(&self, src: &Path, dest: &Path) -> NormalizeStatus;
}

/// `<dest_dir or src dir>/<stem>.autonorm.wav`.
pub fn normalized_path(src: &Path, dest_dir: Option<&Path>) -> PathBuf {
    let dir = dest_dir
        .map(Path::to_path_buf)
        .or_else(|| src.parent().map(Path::to_path_buf))
        .unwrap_or_default();
    let stem = src
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "audio".into());
    dir.join(format!("{stem}{PRE_NORM_SUFFIX}"))
}

/// Runs `ffmpeg` found on `PATH` (or an explicit binary).
#[derive(Debug, Clone, Default)]
pub struct FfmpegNormalizer {
    program: Option<PathBuf>,
}

impl FfmpegNormalizer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Use a specific ffmpeg binary instead of searching `PATH`.
    pub fn with_program(program: impl Into<PathBuf>) -> Self {
        Self {
            program: Some(program.into()),
        }
    }

    fn resolve(&self) -> Option<PathBuf> {
        match &self.program {
            Some(p) => p.exists().then(|| p.clone()),
            None => which::which("ffmpeg").ok(),
        }
    }
}

impl Normalizer for FfmpegNormalizer {
    fn normalize(&self, src: &Path, dest: &Path) -> NormalizeStatus {
        let Some(ffmpeg) = self.resolve() else {
            warn!("FFmpeg not available; cannot apply pre-normalisation");
            return NormalizeStatus::MissingFfmpeg;
        };
        if let Some(parent) = dest.parent() {
            if let Err(e) = fs::create_dir_all(parent) {
                warn!(dir = %parent.display(), "pre-normalisation output dir: {e}");
                return NormalizeStatus::Failed;
            }
        }

        let output = Command::new(&ffmpeg)
            .arg("-y")
            .arg("-i")
            .arg(src)
            .args(["-ac", "1", "-ar", "16000", "-af", FILTER_CHAIN, "-c:a", "pcm_s16le"])
            .arg(dest)
            .output();

        match output {
            Ok(out) if out.status.success() => {
                info!(dest = %dest.display(), "pre-normalisation applied");
                NormalizeStatus::Applied
            }
            Ok(out) => {
                let stderr = String::from_utf8_lossy(&out.stderr);
                let tail: String = stderr.lines().last().unwrap_or_default().to_string();
                warn!(status = %out.status, "pre-normalisation failed: {tail}");
                NormalizeStatus::Failed
            }
            Err(e) => {
                warn!("pre-normalisation failed to start: {e}");
                NormalizeStatus::Failed
            }
        }
    }
}
