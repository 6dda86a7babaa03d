//! Core library of the speech sync engine.
//!
//! The crate keeps a character's mouth in step with speech. A phoneme sequence
//! derived from text is turned into a timeline of pose events, silence gaps in
//! recorded audio are detected and classified, and a single animator drains
//! both against the audio clock while smoothing the resulting pose. Each module
//! owns one subsystem and the public types are re-exported here.

pub mod analysis;
pub mod animator;
pub mod audio;
pub mod config;
pub mod error;
pub mod mapping;
pub mod pause;
pub mod phoneme;
pub mod phonetics;
pub mod pose;
pub mod render;
pub mod sync;
pub mod timeline;

pub use analysis::{compute_rms, SampleBuffer, SignalWindower, WindowEnergy};
pub use animator::SpeechAnimator;
pub use audio::{AudioClock, AudioDecoder, PauseAnalyzer, PlaybackClock, WavDecoder};
pub use config::{
    AnticipationSettings, InterpolationConfig, PauseDetectorConfig, PhoneticConfig, SpeedPresets,
    SpeedProfile, SyncConfig, SynchronizerConfig, TimelineConfig,
};
pub use error::{Result, SpeechSyncError};
pub use mapping::{
    ChannelKey, ChannelLayout, ChannelResolver, ChannelWeight, EmotionChannels, ProtectedChannels,
    Region, VisemeResolver,
};
pub use pause::{PauseClass, PauseDetector, PauseInterval, PauseTimeline};
pub use phoneme::{fallback_phonemes, tokenize, Phoneme, TextToken};
pub use phonetics::{
    CharacterFallback, HttpPhonemeSource, PhonemeCache, PhonemeProvider, PhonemeSource,
};
pub use pose::{PoseBlender, PoseInterpolator, PoseState, VOWEL_JAW_WEIGHT};
pub use render::{ChannelSink, MemorySink};
pub use sync::{PauseTrackingState, PlaybackSynchronizer};
pub use timeline::{
    EventKind, EventQueue, QueuedAction, ScheduledEvent, Timeline, TimelineScheduler,
};
