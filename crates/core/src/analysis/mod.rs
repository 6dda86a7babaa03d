use serde::{Deserialize, Serialize};

use crate::{Result, SpeechSyncError};

/// Mono amplitude samples together with their sample rate.
#[derive(Debug, Clone, PartialEq)]
pub struct SampleBuffer {
    samples: Vec<f32>,
    sample_rate: u32,
}

impl SampleBuffer {
    pub fn new(samples: Vec<f32>, sample_rate: u32) -> Result<Self> {
        if sample_rate == 0 {
            return Err(SpeechSyncError::Decode(
                "sample buffer requires a positive sample rate".to_string(),
            ));
        }

        Ok(Self {
            samples,
            sample_rate,
        })
    }

    pub fn samples(&self) -> &[f32] {
        &self.samples
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn duration_seconds(&self) -> f64 {
        self.samples.len() as f64 / self.sample_rate as f64
    }
}

/// Energy of one analysis window.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WindowEnergy {
    pub start: f64,
    pub end: f64,
    pub rms: f32,
}

/// Splits a buffer into non-overlapping windows of fixed wall-clock length.
#[derive(Debug, Clone, Copy)]
pub struct SignalWindower {
    sample_rate: u32,
    window_len: usize,
}

impl SignalWindower {
    /// Window length in samples is `round(sample_rate * window_ms / 1000)`,
    /// never less than one sample.
    pub fn new(sample_rate: u32, window_ms: f64) -> Self {
        let window_len = (sample_rate as f64 * window_ms / 1000.0).round().max(1.0) as usize;
        Self {
            sample_rate,
            window_len,
        }
    }

    pub fn window_len(&self) -> usize {
        self.window_len
    }

    /// Yields the RMS energy of every window in order. A trailing partial
    /// window is measured over the samples it has.
    pub fn windows<'a>(&self, samples: &'a [f32]) -> impl Iterator<Item = WindowEnergy> + 'a {
        let rate = self.sample_rate.max(1) as f64;
        let window_len = self.window_len;

        samples
            .chunks(window_len)
            .enumerate()
            .map(move |(index, chunk)| {
                let first = index * window_len;
                WindowEnergy {
                    start: first as f64 / rate,
                    end: (first + chunk.len()) as f64 / rate,
                    rms: compute_rms(chunk),
                }
            })
    }
}

pub fn compute_rms(samples: &[f32]) -> f32 {
    if samples.is_empty() {
        return 0.0;
    }

    let sum: f32 = samples.iter().map(|sample| sample * sample).sum();
    (sum / samples.len() as f32).sqrt()
}
