//! Silence-based pause detection over analysed audio.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::{Phoneme, PauseDetectorConfig, SampleBuffer, SignalWindower, WindowEnergy};

/// Duration class of a detected pause.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PauseClass {
    Short,
    Medium,
    Long,
}

impl PauseClass {
    /// Phoneme symbol carrying the same pause class.
    pub fn phoneme(self) -> Phoneme {
        match self {
            PauseClass::Short => Phoneme::PauseShort,
            PauseClass::Medium => Phoneme::PauseMed,
            PauseClass::Long => Phoneme::PauseLong,
        }
    }

    /// Resting jaw weight held while paused. Zero for every class.
    pub fn jaw_rest(self) -> f32 {
        match self {
            PauseClass::Short => 0.0,
            PauseClass::Medium => 0.0,
            PauseClass::Long => 0.0,
        }
    }
}

impl fmt::Display for PauseClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.phoneme().symbol())
    }
}

/// A span of audio classified as silent for long enough to count as a pause.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PauseInterval {
    pub start: f64,
    pub end: f64,
    pub duration_ms: f64,
    pub class: PauseClass,
}

impl PauseInterval {
    /// Stable identity of the interval, e.g. `1.230_PAUSE_MED`.
    pub fn id(&self) -> String {
        format!("{:.3}_{}", self.start, self.class)
    }

    pub fn contains(&self, seconds: f64) -> bool {
        self.start <= seconds && seconds <= self.end
    }
}

/// Ordered, non-overlapping pause intervals from one analysis pass.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PauseTimeline {
    intervals: Vec<PauseInterval>,
}

impl PauseTimeline {
    pub fn new(mut intervals: Vec<PauseInterval>) -> Self {
        intervals.sort_by(|a, b| a.start.total_cmp(&b.start));
        Self { intervals }
    }

    pub fn intervals(&self) -> &[PauseInterval] {
        &self.intervals
    }

    pub fn len(&self) -> usize {
        self.intervals.len()
    }

    pub fn is_empty(&self) -> bool {
        self.intervals.is_empty()
    }

    /// First interval with `start <= seconds <= end`.
    pub fn pause_at(&self, seconds: f64) -> Option<&PauseInterval> {
        let index = self
            .intervals
            .partition_point(|interval| interval.end < seconds);
        self.intervals
            .get(index)
            .filter(|interval| interval.contains(seconds))
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum DetectorState {
    Speaking,
    Silent { since: f64 },
}

/// Threshold state machine turning window energies into pause intervals.
#[derive(Debug, Clone)]
pub struct PauseDetector {
    config: PauseDetectorConfig,
}

impl PauseDetector {
    pub fn new(config: PauseDetectorConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &PauseDetectorConfig {
        &self.config
    }

    pub fn set_config(&mut self, config: PauseDetectorConfig) {
        self.config = config;
    }

    /// Runs the full analysis over a sample buffer.
    pub fn analyze(&self, buffer: &SampleBuffer) -> PauseTimeline {
        let windower = SignalWindower::new(buffer.sample_rate(), self.config.window_ms);
        let timeline = self.detect(windower.windows(buffer.samples()), buffer.duration_seconds());

        tracing::info!(
            pauses = timeline.len(),
            duration_seconds = buffer.duration_seconds(),
            "pause analysis finished"
        );
        timeline
    }

    /// Consumes an ordered stream of window energies. `end_of_stream` closes a
    /// trailing silence.
    pub fn detect<I>(&self, windows: I, end_of_stream: f64) -> PauseTimeline
    where
        I: IntoIterator<Item = WindowEnergy>,
    {
        let mut intervals = Vec::new();
        let mut state = DetectorState::Speaking;

        for window in windows {
            let silent = window.rms < self.config.silence_threshold;
            state = match (state, silent) {
                (DetectorState::Speaking, true) => DetectorState::Silent {
                    since: window.start,
                },
                (DetectorState::Silent { since }, false) => {
                    intervals.extend(self.close(since, window.start));
                    DetectorState::Speaking
                }
                (unchanged, _) => unchanged,
            };
        }

        if let DetectorState::Silent { since } = state {
            intervals.extend(self.close(since, end_of_stream));
        }

        PauseTimeline::new(intervals)
    }

    /// Maps a pause duration onto its class.
    pub fn classify(&self, duration_ms: f64) -> PauseClass {
        if duration_ms < self.config.short_pause_ms {
            PauseClass::Short
        } else if duration_ms < self.config.medium_pause_ms {
            PauseClass::Medium
        } else {
            PauseClass::Long
        }
    }

    fn close(&self, start: f64, end: f64) -> Option<PauseInterval> {
        let duration_ms = round_micros((end - start) * 1000.0);
        if duration_ms < self.config.min_pause_ms {
            tracing::trace!(start, duration_ms, "silence too short for a pause");
            return None;
        }

        let class = self.classify(duration_ms);
        tracing::debug!(start, end, duration_ms, %class, "pause detected");
        Some(PauseInterval {
            start,
            end,
            duration_ms,
            class,
        })
    }
}

impl Default for PauseDetector {
    fn default() -> Self {
        Self::new(PauseDetectorConfig::default())
    }
}

// Window boundaries come from sample indices, so sub-microsecond noise is
// float error rather than signal.
fn round_micros(ms: f64) -> f64 {
    (ms * 1000.0).round() / 1000.0
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    const LOUD: f32 = 0.3;
    const QUIET: f32 = 0.005;

    /// Energy stream of 1 ms windows: `lead` loud, `silence` quiet, `tail` loud.
    fn energies(lead: usize, silence: usize, tail: usize) -> (Vec<WindowEnergy>, f64) {
        let levels = std::iter::repeat(LOUD)
            .take(lead)
            .chain(std::iter::repeat(QUIET).take(silence))
            .chain(std::iter::repeat(LOUD).take(tail));
        let windows: Vec<_> = levels
            .enumerate()
            .map(|(i, rms)| WindowEnergy {
                start: i as f64 / 1000.0,
                end: (i + 1) as f64 / 1000.0,
                rms,
            })
            .collect();
        let end = windows.len() as f64 / 1000.0;
        (windows, end)
    }

    fn detect(silence_ms: usize) -> PauseTimeline {
        let (windows, end) = energies(100, silence_ms, 100);
        PauseDetector::default().detect(windows, end)
    }

    /// Buffer at `rate` Hz with `silence_ms` of near-silence inside loud audio.
    fn buffer_with_gap(rate: u32, lead_ms: usize, silence_ms: usize, tail_ms: usize) -> SampleBuffer {
        let per_ms = rate as usize / 1000;
        let mut samples = Vec::new();
        samples.extend(std::iter::repeat(LOUD).take(lead_ms * per_ms));
        samples.extend(std::iter::repeat(QUIET).take(silence_ms * per_ms));
        samples.extend(std::iter::repeat(LOUD).take(tail_ms * per_ms));
        SampleBuffer::new(samples, rate).unwrap()
    }

    #[test]
    fn classifies_at_threshold_boundaries() {
        let cases = [
            (150, PauseClass::Short),
            (250, PauseClass::Medium),
            (251, PauseClass::Medium),
            (500, PauseClass::Long),
            (501, PauseClass::Long),
        ];

        for (silence_ms, expected) in cases {
            let timeline = detect(silence_ms);
            assert_eq!(timeline.len(), 1, "{silence_ms} ms");
            let pause = &timeline.intervals()[0];
            assert_eq!(pause.class, expected, "{silence_ms} ms");
            assert_eq!(pause.duration_ms, silence_ms as f64);
            assert!((pause.start - 0.1).abs() < 1e-9);
        }
    }

    #[test]
    fn short_silences_are_not_pauses() {
        assert!(detect(100).is_empty());
        assert!(detect(149).is_empty());
    }

    #[test]
    fn trailing_silence_closes_at_buffer_end() {
        let (windows, end) = energies(50, 300, 0);
        let timeline = PauseDetector::default().detect(windows, end);
        assert_eq!(timeline.len(), 1);
        assert_eq!(timeline.intervals()[0].end, end);
        assert_eq!(timeline.intervals()[0].class, PauseClass::Medium);
    }

    #[test]
    fn analyzes_gap_inside_loud_buffer() {
        let buffer = buffer_with_gap(16_000, 200, 300, 200);
        let timeline = PauseDetector::default().analyze(&buffer);

        assert_eq!(timeline.len(), 1);
        let pause = &timeline.intervals()[0];
        assert_eq!(pause.class, PauseClass::Medium);
        assert_eq!(pause.duration_ms, 300.0);
        assert!((pause.start - 0.2).abs() < 1e-9);
        assert!((pause.end - 0.5).abs() < 1e-9);
    }

    #[test]
    fn analyzes_short_gap_as_nothing() {
        let buffer = buffer_with_gap(16_000, 200, 120, 200);
        assert!(PauseDetector::default().analyze(&buffer).is_empty());
    }

    #[test]
    fn configurable_threshold_changes_outcome() {
        let buffer = buffer_with_gap(8_000, 100, 200, 100);
        let mut config = PauseDetectorConfig::default();
        config.silence_threshold = 0.001;
        assert!(PauseDetector::new(config).analyze(&buffer).is_empty());
    }

    #[test]
    fn pause_lookup_is_inclusive_on_both_ends() {
        let detector = PauseDetector::default();
        let timeline = PauseTimeline::new(vec![
            PauseInterval {
                start: 1.0,
                end: 1.3,
                duration_ms: 300.0,
                class: detector.classify(300.0),
            },
            PauseInterval {
                start: 2.0,
                end: 2.6,
                duration_ms: 600.0,
                class: detector.classify(600.0),
            },
        ]);

        assert!(timeline.pause_at(0.5).is_none());
        assert_eq!(timeline.pause_at(1.0).unwrap().start, 1.0);
        assert_eq!(timeline.pause_at(1.3).unwrap().start, 1.0);
        assert!(timeline.pause_at(1.31).is_none());
        assert_eq!(timeline.pause_at(2.0).unwrap().class, PauseClass::Long);
        assert_eq!(timeline.pause_at(2.6).unwrap().start, 2.0);
        assert!(timeline.pause_at(3.0).is_none());
    }

    #[test]
    fn interval_ids_are_stable() {
        let interval = PauseInterval {
            start: 1.23456,
            end: 1.6,
            duration_ms: 365.44,
            class: PauseClass::Medium,
        };
        assert_eq!(interval.id(), "1.235_PAUSE_MED");
    }

    proptest! {
        #[test]
        fn any_long_enough_silence_yields_one_interval(
            lead in 1usize..200,
            silence in 150usize..900,
            tail in 1usize..200,
        ) {
            let (windows, end) = energies(lead, silence, tail);
            let timeline = PauseDetector::default().detect(windows, end);
            prop_assert_eq!(timeline.len(), 1);
            let pause = &timeline.intervals()[0];
            prop_assert_eq!(pause.duration_ms, silence as f64);
            prop_assert_eq!(pause.class, PauseDetector::default().classify(silence as f64));
        }

        #[test]
        fn shorter_silence_never_appears(
            lead in 1usize..200,
            silence in 0usize..150,
            tail in 1usize..200,
        ) {
            let (windows, end) = energies(lead, silence, tail);
            prop_assert!(PauseDetector::default().detect(windows, end).is_empty());
        }
    }
}
