use std::{cell::Cell, fmt, io::Cursor, rc::Rc};

use crate::{PauseDetector, PauseTimeline, Result, SampleBuffer, SpeechSyncError};

/// Readable playback position of whatever is playing the speech audio.
pub trait AudioClock {
    fn position_seconds(&self) -> f64;
}

impl<F> AudioClock for F
where
    F: Fn() -> f64,
{
    fn position_seconds(&self) -> f64 {
        self()
    }
}

/// Manually advanced playback clock. Clones share the same position, so one
/// copy can be handed to the animator while the host keeps advancing another.
#[derive(Debug, Default, Clone)]
pub struct PlaybackClock {
    position: Rc<Cell<f64>>,
}

impl PlaybackClock {
    pub fn start() -> Self {
        Self::default()
    }

    pub fn position(&self) -> f64 {
        self.position.get()
    }

    pub fn reset(&self) {
        self.position.set(0.0);
    }

    pub fn advance(&self, delta_seconds: f64) {
        self.position.set((self.position.get() + delta_seconds).max(0.0));
    }

    pub fn seek(&self, seconds: f64) {
        self.position.set(seconds.max(0.0));
    }
}

impl AudioClock for PlaybackClock {
    fn position_seconds(&self) -> f64 {
        self.position()
    }
}

/// Turns encoded audio bytes into a mono sample buffer.
pub trait AudioDecoder {
    fn decode(&self, bytes: &[u8]) -> Result<SampleBuffer>;
}

/// WAV decoder covering integer and float PCM. Multi-channel input is mixed
/// down to mono by averaging.
#[derive(Debug, Default, Clone, Copy)]
pub struct WavDecoder;

impl AudioDecoder for WavDecoder {
    fn decode(&self, bytes: &[u8]) -> Result<SampleBuffer> {
        let mut reader = hound::WavReader::new(Cursor::new(bytes))?;
        let spec = reader.spec();
        let channels = usize::from(spec.channels.max(1));

        let interleaved: Vec<f32> = match spec.sample_format {
            hound::SampleFormat::Float => reader
                .samples::<f32>()
                .collect::<std::result::Result<Vec<f32>, hound::Error>>()?,
            hound::SampleFormat::Int => {
                if !(1..=32).contains(&spec.bits_per_sample) {
                    return Err(SpeechSyncError::Decode(format!(
                        "unsupported integer sample width: {} bits",
                        spec.bits_per_sample
                    )));
                }
                let scale = 2f32.powi(i32::from(spec.bits_per_sample) - 1);
                reader
                    .samples::<i32>()
                    .map(|sample| sample.map(|value| value as f32 / scale))
                    .collect::<std::result::Result<Vec<f32>, hound::Error>>()?
            }
        };

        let mono = if channels == 1 {
            interleaved
        } else {
            interleaved
                .chunks(channels)
                .map(|frame| frame.iter().sum::<f32>() / frame.len() as f32)
                .collect()
        };

        tracing::debug!(
            sample_rate = spec.sample_rate,
            channels,
            samples = mono.len(),
            "decoded wav audio"
        );
        SampleBuffer::new(mono, spec.sample_rate)
    }
}

/// Decoding front end of the pause detector.
pub struct PauseAnalyzer {
    decoder: Option<Box<dyn AudioDecoder>>,
    detector: PauseDetector,
}

impl PauseAnalyzer {
    pub fn new(decoder: Option<Box<dyn AudioDecoder>>, detector: PauseDetector) -> Self {
        Self { decoder, detector }
    }

    /// Analyzer backed by [`WavDecoder`].
    pub fn wav(detector: PauseDetector) -> Self {
        Self::new(Some(Box::new(WavDecoder)), detector)
    }

    pub fn detector(&self) -> &PauseDetector {
        &self.detector
    }

    pub fn detector_mut(&mut self) -> &mut PauseDetector {
        &mut self.detector
    }

    pub fn set_decoder(&mut self, decoder: Option<Box<dyn AudioDecoder>>) {
        self.decoder = decoder;
    }

    /// Decodes `bytes` and detects pauses. Nothing is returned on failure.
    pub fn analyze_bytes(&self, bytes: &[u8]) -> Result<PauseTimeline> {
        let decoder = self
            .decoder
            .as_ref()
            .ok_or(SpeechSyncError::AnalysisUnavailable)?;
        let buffer = decoder.decode(bytes)?;
        Ok(self.detector.analyze(&buffer))
    }
}

impl fmt::Debug for PauseAnalyzer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PauseAnalyzer")
            .field("decoder", &self.decoder.is_some())
            .field("detector", &self.detector)
            .finish()
    }
}
