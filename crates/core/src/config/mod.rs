use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::{Result, SpeechSyncError};

/// Top-level configuration structure for the engine.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    pub pause: PauseDetectorConfig,
    pub timeline: TimelineConfig,
    pub interpolation: InterpolationConfig,
    pub anticipation: AnticipationSettings,
    pub sync: SynchronizerConfig,
    pub phonetics: PhoneticConfig,
}

impl SyncConfig {
    /// Reads a JSON configuration file. Missing fields fall back to defaults.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let raw = std::fs::read_to_string(path.as_ref())?;
        let mut config: Self = serde_json::from_str(&raw)?;
        config.anticipation = config.anticipation.clamped();
        config.validate()?;
        Ok(config)
    }

    /// Rejects values that would make the analysis or the timeline meaningless.
    pub fn validate(&self) -> Result<()> {
        self.pause.validate()?;
        self.timeline.validate()?;
        require_positive("interpolation.transition_ms", self.interpolation.transition_ms)?;
        require_positive("sync.poll_interval_ms", self.sync.poll_interval_ms)?;
        if self.phonetics.cache_capacity == 0 {
            return Err(SpeechSyncError::invalid_config(
                "phonetics.cache_capacity must be at least 1",
            ));
        }
        Ok(())
    }
}

/// Thresholds used by the pause detector.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PauseDetectorConfig {
    pub window_ms: f64,
    /// RMS level below which a window counts as silent.
    pub silence_threshold: f32,
    pub min_pause_ms: f64,
    pub short_pause_ms: f64,
    pub medium_pause_ms: f64,
}

impl Default for PauseDetectorConfig {
    fn default() -> Self {
        Self {
            window_ms: 10.0,
            silence_threshold: 0.015,
            min_pause_ms: 150.0,
            short_pause_ms: 250.0,
            medium_pause_ms: 500.0,
        }
    }
}

impl PauseDetectorConfig {
    pub fn validate(&self) -> Result<()> {
        require_positive("pause.window_ms", self.window_ms)?;
        require_non_negative("pause.min_pause_ms", self.min_pause_ms)?;
        require_non_negative("pause.short_pause_ms", self.short_pause_ms)?;
        require_non_negative("pause.medium_pause_ms", self.medium_pause_ms)?;
        if !self.silence_threshold.is_finite() || self.silence_threshold < 0.0 {
            return Err(SpeechSyncError::invalid_config(
                "pause.silence_threshold must be a finite, non-negative level",
            ));
        }
        if self.short_pause_ms > self.medium_pause_ms {
            return Err(SpeechSyncError::invalid_config(
                "pause.short_pause_ms must not exceed pause.medium_pause_ms",
            ));
        }
        Ok(())
    }
}

/// Millisecond-per-phoneme presets selectable when speaking.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SpeedPresets {
    pub slow: f64,
    pub normal: f64,
    pub fast: f64,
}

impl Default for SpeedPresets {
    fn default() -> Self {
        Self {
            slow: 180.0,
            normal: 135.0,
            fast: 100.0,
        }
    }
}

/// Named speaking speed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SpeedProfile {
    Slow,
    #[default]
    Normal,
    Fast,
}

impl SpeedPresets {
    pub fn speed_ms(&self, profile: SpeedProfile) -> f64 {
        match profile {
            SpeedProfile::Slow => self.slow,
            SpeedProfile::Normal => self.normal,
            SpeedProfile::Fast => self.fast,
        }
    }
}

/// Timing constants of the phoneme timeline.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimelineConfig {
    /// Delay before the first mouth movement, modelling audio output latency.
    pub phoneme_offset_ms: f64,
    /// Tail appended after the last phoneme.
    pub end_delay_ms: f64,
    pub speeds: SpeedPresets,
}

impl Default for TimelineConfig {
    fn default() -> Self {
        Self {
            phoneme_offset_ms: 50.0,
            end_delay_ms: 550.0,
            speeds: SpeedPresets::default(),
        }
    }
}

impl TimelineConfig {
    pub fn validate(&self) -> Result<()> {
        require_non_negative("timeline.phoneme_offset_ms", self.phoneme_offset_ms)?;
        require_non_negative("timeline.end_delay_ms", self.end_delay_ms)?;
        require_positive("timeline.speeds.slow", self.speeds.slow)?;
        require_positive("timeline.speeds.normal", self.speeds.normal)?;
        require_positive("timeline.speeds.fast", self.speeds.fast)?;
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InterpolationConfig {
    pub transition_ms: f64,
}

impl Default for InterpolationConfig {
    fn default() -> Self {
        Self {
            transition_ms: 105.0,
        }
    }
}

/// Co-articulation settings. Out-of-range factors are clamped, never rejected.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnticipationSettings {
    pub enabled: bool,
    /// Share of the next phoneme blended into the current pose.
    pub factor: f32,
    /// Position of the anticipation event inside the current phoneme slot.
    pub offset_factor: f32,
}

impl Default for AnticipationSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            factor: 0.3,
            offset_factor: 0.7,
        }
    }
}

impl AnticipationSettings {
    pub fn new(enabled: bool, factor: f32, offset_factor: f32) -> Self {
        Self {
            enabled,
            factor,
            offset_factor,
        }
        .clamped()
    }

    pub fn disabled() -> Self {
        Self {
            enabled: false,
            ..Self::default()
        }
    }

    /// Returns a copy with both factors forced into `[0, 1]`. NaN becomes 0.
    pub fn clamped(self) -> Self {
        Self {
            enabled: self.enabled,
            factor: clamp_unit(self.factor),
            offset_factor: clamp_unit(self.offset_factor),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SynchronizerConfig {
    pub poll_interval_ms: f64,
}

impl Default for SynchronizerConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: 50.0,
        }
    }
}

/// Remote phonetic lookup settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PhoneticConfig {
    /// Endpoint of the phonetic-analysis service. `None` means the local
    /// character heuristic is always used.
    pub endpoint: Option<String>,
    pub timeout_ms: u64,
    pub cache_capacity: usize,
}

impl Default for PhoneticConfig {
    fn default() -> Self {
        Self {
            endpoint: None,
            timeout_ms: 2_000,
            cache_capacity: 256,
        }
    }
}

fn clamp_unit(value: f32) -> f32 {
    if value.is_nan() {
        0.0
    } else {
        value.clamp(0.0, 1.0)
    }
}

pub(crate) fn require_positive(name: &str, value: f64) -> Result<()> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(SpeechSyncError::invalid_config(format!(
            "{name} must be a positive number, got {value}"
        )))
    }
}

fn require_non_negative(name: &str, value: f64) -> Result<()> {
    if value.is_finite() && value >= 0.0 {
        Ok(())
    } else {
        Err(SpeechSyncError::invalid_config(format!(
            "{name} must be a non-negative number, got {value}"
        )))
    }
}
