use thiserror::Error;

/// All errors produced by scribe-core.
#[derive(Debug, Error)]
pub enum ScribeError {
    #[error("mode must be 'apply' or 'suggest', got '{0}'")]
    InvalidMode(String),

    #[error("pre_norm_mode must be 'off', 'suggest', or 'apply', got '{0}'")]
    InvalidPreNormMode(String),

    #[error("resampling {from} Hz → {to} Hz is required but no resampler is available")]
    ResamplerUnavailable { from: u32, to: u32 },

    #[error("resampler error: {0}")]
    Resample(String),

    #[error("audio decode error: {0}")]
    AudioDecode(String),

    #[error("VAD model error: {0}")]
    VadModel(String),

    #[error("model file not found: {path}")]
    ModelNotFound { path: std::path::PathBuf },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, ScribeError>;
