//! Typed audio chunk passed from the decoder to the VAD and analysis stages.

/// A contiguous block of mono PCM samples at a known sample rate.
#[derive(Debug, Clone)]
pub struct AudioChunk {
    /// Mono f32 samples in [-1.0, 1.0].
    pub samples: Vec<f32>,
    /// Sample rate in Hz (e.g. 16000, 44100, 48000).
    pub sample_rate: u32,
}

impl AudioChunk {
    pub fn new(samples: Vec<f32>, sample_rate: u32) -> Self {
        Self {
            samples,
            sample_rate,
        }
    }

    /// Returns the duration of this chunk in seconds.
    pub fn duration_secs(&self) -> f64 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.samples.len() as f64 / self.sample_rate as f64
    }

    /// Returns true if the chunk contains no samples.
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Split into fixed-size frames, zero-padding the final partial frame.
    ///
    /// An empty chunk yields no frames.
    pub fn frames(&self, frame_len: usize) -> Vec<AudioChunk> {
        if frame_len == 0 {
            return Vec::new();
        }
        self.samples
            .chunks(frame_len)
            .map(|block| {
                let mut samples = block.to_vec();
                samples.resize(frame_len, 0.0);
                AudioChunk::new(samples, self.sample_rate)
            })
            .collect()
    }
}
