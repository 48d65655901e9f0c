//! Silero VAD as the dedicated frame classifier.
//!
//! Wraps the Silero VAD v5 ONNX model (<https://github.com/snakers4/silero-vad>).
//! Analysis frames are 30 ms (480 samples at 16 kHz); Silero expects 512
//! samples, so each frame is zero-padded to one model window. The recurrent
//! state is reset at the start of every recording.
//!
//! | Name     | Shape       | DType | Direction |
//! |----------|-------------|-------|-----------|
//! | `input`  | `[1, 512]`  | f32   | in        |
//! | `sr`     | `[1]`       | i64   | in        |
//! | `state`  | `[2,1,128]` | f32   | in/out    |
//! | `output` | `[1, 1]`    | f32   | out       |
//! | `stateN` | `[2,1,128]` | f32   | out       |
//!
//! Models without a `state` input are run statelessly.

use std::path::{Path, PathBuf};

use ndarray::{Array1, Array2, Array3};
use ort::session::builder::SessionBuilder;
use ort::session::{Session, SessionInputValue};
use ort::value::Value;
use tracing::{debug, info};

use super::{FrameClassifier, VadDecision};
use crate::audio::AudioChunk;
use crate::error::{Result, ScribeError};

/// Window size expected by Silero VAD (samples at 16 kHz = 32 ms).
const WINDOW: usize = 512;
/// GRU state size: 2 layers × 1 batch × 128 units.
const STATE_SIZE: usize = 256;

fn onnx_err(e: impl std::fmt::Display) -> ScribeError {
    ScribeError::VadModel(e.to_string())
}

/// Neural VAD using the Silero VAD ONNX model.
pub struct SileroVad {
    session: Session,
    input_name: String,
    sr_name: Option<String>,
    output_name: String,
    state_name: Option<String>,
    state_out_name: Option<String>,
    state: Vec<f32>,
    threshold: f32,
}

impl SileroVad {
    /// Load the Silero VAD ONNX model from `path` with the given `threshold`.
    pub fn new(path: &Path, threshold: f32) -> Result<Self> {
        if !path.exists() {
            return Err(ScribeError::ModelNotFound {
                path: path.to_path_buf(),
            });
        }

        let session = SessionBuilder::new()
            .map_err(onnx_err)?
            .commit_from_file(path)
            .map_err(onnx_err)?;

        let input_names: Vec<String> = session
            .inputs()
            .iter()
            .map(|outlet| outlet.name().to_string())
            .collect();
        let output_names: Vec<String> = session
            .outputs()
            .iter()
            .map(|outlet| outlet.name().to_string())
            .collect();

        let input_name = resolve_name(&input_names, &["input", "audio", "x"])
            .or_else(|| input_names.first().cloned())
            .ok_or_else(|| onnx_err("Silero model has no inputs"))?;
        let output_name = resolve_name(&output_names, &["output", "speech_prob", "prob"])
            .or_else(|| output_names.first().cloned())
            .ok_or_else(|| onnx_err("Silero model has no outputs"))?;

        let vad = Self {
            sr_name: resolve_name(&input_names, &["sr", "sample_rate"]),
            state_name: resolve_name(&input_names, &["state", "h_0", "hidden"]),
            state_out_name: resolve_name(&output_names, &["stateN", "state_out", "hn_out"]),
            session,
            input_name,
            output_name,
            state: vec![0.0; STATE_SIZE],
            threshold: threshold.clamp(0.0, 1.0),
        };

        info!(
            path = %path.display(),
            threshold = vad.threshold,
            stateful = vad.state_name.is_some(),
            "Silero VAD loaded"
        );
        Ok(vad)
    }

    /// Default path for the Silero VAD model file.
    pub fn default_model_path() -> PathBuf {
        directories::BaseDirs::new()
            .map(|dirs| dirs.data_dir().to_path_buf())
            .unwrap_or_else(|| PathBuf::from("."))
            .join("scribe")
            .join("models")
            .join("silero_vad.onnx")
    }

    /// Run one 512-sample window through the model; return speech probability.
    fn run_window(&mut self, window: &[f32]) -> Result<f32> {
        let input_arr =
            Array2::<f32>::from_shape_vec((1, WINDOW), window.to_vec()).map_err(onnx_err)?;
        let mut inputs: Vec<(String, SessionInputValue<'_>)> = vec![(
            self.input_name.clone(),
            Value::from_array(input_arr).map_err(onnx_err)?.into(),
        )];

        if let Some(sr_name) = &self.sr_name {
            let sr_arr = Array1::<i64>::from_elem(1, 16_000i64);
            inputs.push((
                sr_name.clone(),
                Value::from_array(sr_arr).map_err(onnx_err)?.into(),
            ));
        }
        if let Some(state_name) = &self.state_name {
            let state_arr = Array3::<f32>::from_shape_vec((2, 1, 128), self.state.clone())
                .map_err(onnx_err)?;
            inputs.push((
                state_name.clone(),
                Value::from_array(state_arr).map_err(onnx_err)?.into(),
            ));
        }

        let outputs = self.session.run(inputs).map_err(onnx_err)?;

        let prob_output = outputs
            .get(self.output_name.as_str())
            .ok_or_else(|| onnx_err("Silero output tensor missing"))?;
        let (_, prob_data) = prob_output.try_extract_tensor::<f32>().map_err(onnx_err)?;
        let prob = prob_data.first().copied().unwrap_or(0.0);

        if let Some(out) = self
            .state_out_name
            .as_deref()
            .and_then(|name| outputs.get(name))
        {
            let (_, state_data) = out.try_extract_tensor::<f32>().map_err(onnx_err)?;
            self.state = state_data.to_vec();
        }

        Ok(prob)
    }
}

fn resolve_name(candidates: &[String], preferred: &[&str]) -> Option<String> {
    preferred.iter().find_map(|needle| {
        candidates
            .iter()
            .find(|name| name.eq_ignore_ascii_case(needle))
            .cloned()
    })
}

impl FrameClassifier for SileroVad {
    fn classify_frames(&mut self, frames: &[AudioChunk]) -> Vec<VadDecision> {
        self.state.iter_mut().for_each(|v| *v = 0.0);
        let mut window = vec![0f32; WINDOW];

        frames
            .iter()
            .enumerate()
            .map(|(idx, frame)| {
                window.fill(0.0);
                let n = frame.samples.len().min(WINDOW);
                window[..n].copy_from_slice(&frame.samples[..n]);
                match self.run_window(&window) {
                    Ok(prob) => VadDecision::from(prob >= self.threshold),
                    Err(e) => {
                        debug!("Silero VAD failed on frame {idx}: {e}");
                        VadDecision::Silence
                    }
                }
            })
            .collect()
    }

    fn name(&self) -> &'static str {
        "silero"
    }
}
