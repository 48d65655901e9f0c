//! Mean spectral flatness (Wiener entropy) over a centered STFT.
//!
//! Per frame: `exp(mean(ln S)) / mean(S)` over the power spectrum `S`,
//! floored at `1e-10`. Frames are Hann-windowed and the signal is
//! zero-padded by `n_fft / 2` on both sides so frame `t` is centered on
//! sample `t * hop`. Result is the mean over all frames and bins, in `[0, 1]`.

use std::sync::Arc;

use rustfft::{num_complex::Complex, Fft, FftPlanner};

const POWER_FLOOR: f64 = 1e-10;

pub struct SpectralFlatness {
    n_fft: usize,
    hop: usize,
    window: Vec<f32>,
    fft: Arc<dyn Fft<f32>>,
}

impl SpectralFlatness {
    pub fn new(n_fft: usize, hop: usize) -> Self {
        let n_fft = n_fft.max(2);
        Self {
            n_fft,
            hop: hop.max(1),
            window: build_hann_window(n_fft),
            fft: FftPlanner::<f32>::new().plan_fft_forward(n_fft),
        }
    }

    /// Mean flatness of `samples`; `0.0` for an empty signal.
    pub fn mean(&self, samples: &[f32]) -> f64 {
        if samples.is_empty() {
            return 0.0;
        }
        let pad = self.n_fft / 2;
        let mut padded = vec![0f32; samples.len() + 2 * pad];
        padded[pad..pad + samples.len()].copy_from_slice(samples);

        let n_frames = 1 + (padded.len() - self.n_fft) / self.hop;
        let n_bins = self.n_fft / 2 + 1;
        let mut buf = vec![Complex::new(0.0f32, 0.0); self.n_fft];
        let mut total = 0.0f64;

        for frame in 0..n_frames {
            let start = frame * self.hop;
            for (i, slot) in buf.iter_mut().enumerate() {
                *slot = Complex::new(padded[start + i] * self.window[i], 0.0);
            }
            self.fft.process(&mut buf);

            let mut log_sum = 0.0f64;
            let mut lin_sum = 0.0f64;
            for bin in &buf[..n_bins] {
                let power = f64::from(bin.norm_sqr()).max(POWER_FLOOR);
                log_sum += power.ln();
                lin_sum += power;
            }
            let geometric = (log_sum / n_bins as f64).exp();
            let arithmetic = lin_sum / n_bins as f64;
            total += geometric / arithmetic;
        }

        (total / n_frames as f64).clamp(0.0, 1.0)
    }
}

/// Periodic Hann window.
fn build_hann_window(n: usize) -> Vec<f32> {
    (0..n)
        .map(|i| {
            let phase = 2.0 * std::f64::consts::PI * i as f64 / n as f64;
            (0.5 - 0.5 * phase.cos()) as f32
        })
        .collect()
}
