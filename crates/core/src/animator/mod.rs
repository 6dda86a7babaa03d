//! The speaking controller: schedules utterances, drains them on one driving
//! clock, keeps detected pauses in step with the audio clock, and smooths the
//! pose into a channel sink.
//!
//! Everything runs on the caller's thread. The host calls [`SpeechAnimator::tick`]
//! once per rendered frame; timeline events and pause polls are both resolved
//! inside that call, so no locking is involved.

use crate::{
    config::require_positive, AnticipationSettings, AudioClock, AudioDecoder, ChannelLayout, ChannelResolver, ChannelSink,
    EventKind, EventQueue, PauseAnalyzer, PauseDetector, PauseTimeline, PauseTrackingState,
    Phoneme, PhonemeProvider, PlaybackSynchronizer, PoseBlender, PoseInterpolator, PoseState,
    QueuedAction, Result, ScheduledEvent, SpeedProfile, SyncConfig, Timeline, TimelineScheduler,
    WavDecoder,
};

/// Largest remaining weight error at which a finished utterance counts as
/// settled.
const SETTLE_EPSILON: f32 = 1e-3;

pub struct SpeechAnimator<S> {
    config: SyncConfig,
    provider: PhonemeProvider,
    scheduler: TimelineScheduler,
    blender: PoseBlender,
    interpolator: PoseInterpolator,
    pose: PoseState,
    queue: EventQueue,
    analyzer: PauseAnalyzer,
    synchronizer: PlaybackSynchronizer,
    clock: Option<Box<dyn AudioClock>>,
    sink: S,
    elapsed_ms: f64,
    animating: bool,
    finishing: bool,
}

impl<S: ChannelSink> SpeechAnimator<S> {
    /// Builds an animator over `layout`. Fails on an invalid configuration.
    pub fn new(
        mut config: SyncConfig,
        layout: ChannelLayout,
        resolver: Box<dyn ChannelResolver>,
        provider: PhonemeProvider,
        sink: S,
    ) -> Result<Self> {
        config.validate()?;
        config.anticipation = config.anticipation.clamped();

        let blender = PoseBlender::new(layout, resolver);
        let pose = blender.neutral_pose();

        Ok(Self {
            scheduler: TimelineScheduler::new(config.timeline),
            interpolator: PoseInterpolator::new(config.interpolation.transition_ms),
            analyzer: PauseAnalyzer::new(
                Some(Box::new(WavDecoder)),
                PauseDetector::new(config.pause),
            ),
            synchronizer: PlaybackSynchronizer::new(config.sync),
            queue: EventQueue::new(),
            clock: None,
            elapsed_ms: 0.0,
            animating: false,
            finishing: false,
            config,
            provider,
            blender,
            pose,
            sink,
        })
    }

    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    pub fn pose(&self) -> &PoseState {
        &self.pose
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    pub fn sink_mut(&mut self) -> &mut S {
        &mut self.sink
    }

    pub fn into_sink(self) -> S {
        self.sink
    }

    pub fn provider(&self) -> &PhonemeProvider {
        &self.provider
    }

    pub fn is_animating(&self) -> bool {
        self.animating
    }

    /// Milliseconds since the current utterance started.
    pub fn elapsed_ms(&self) -> f64 {
        self.elapsed_ms
    }

    pub fn pending_events(&self) -> usize {
        self.queue.len()
    }

    pub fn pause_timeline(&self) -> &PauseTimeline {
        self.synchronizer.timeline()
    }

    pub fn tracking_state(&self) -> &PauseTrackingState {
        self.synchronizer.state()
    }

    pub fn is_pause_sync_active(&self) -> bool {
        self.synchronizer.is_polling()
    }

    /// Replaces the audio decoder used by [`Self::set_audio_source`]. `None`
    /// makes pause analysis unavailable.
    pub fn set_decoder(&mut self, decoder: Option<Box<dyn AudioDecoder>>) {
        self.analyzer.set_decoder(decoder);
    }

    pub fn set_anticipation(&mut self, enabled: bool, factor: f32, offset_factor: f32) {
        self.config.anticipation = AnticipationSettings::new(enabled, factor, offset_factor);
    }

    /// Changes the smoothing duration mid-utterance. Non-positive or
    /// non-finite durations are rejected and leave the current one in place.
    pub fn set_transition_ms(&mut self, transition_ms: f64) -> Result<()> {
        require_positive("interpolation.transition_ms", transition_ms)?;
        self.config.interpolation.transition_ms = transition_ms;
        self.interpolator.set_transition_ms(transition_ms);
        Ok(())
    }

    /// Speaks `text`, returning the estimated animation length in milliseconds
    /// so audio playback can be started in step.
    pub fn speak(&mut self, text: &str, profile: SpeedProfile) -> f64 {
        let phonemes = self.provider.phonemes(text);
        let speed_ms = self.config.timeline.speeds.speed_ms(profile);
        self.speak_phonemes(&phonemes, speed_ms)
    }

    /// Schedules an explicit phoneme sequence, replacing any utterance in flight.
    pub fn speak_phonemes(&mut self, phonemes: &[Phoneme], speed_ms: f64) -> f64 {
        let timeline = self
            .scheduler
            .schedule(phonemes, speed_ms, self.config.anticipation);
        self.start_timeline(&timeline);

        tracing::info!(
            phonemes = phonemes.len(),
            events = timeline.events.len(),
            duration_ms = timeline.duration_ms,
            "utterance scheduled"
        );
        timeline.duration_ms
    }

    fn start_timeline(&mut self, timeline: &Timeline) {
        if self.animating {
            tracing::debug!(dropped = self.queue.len(), "preempting utterance in flight");
        }
        self.queue.clear();
        self.queue.load(timeline);
        self.elapsed_ms = 0.0;
        self.animating = true;
        self.finishing = false;
        self.synchronizer.start_polling();
    }

    /// Attaches the playback clock of a new audio source. When raw audio is
    /// given it is analysed for pauses; returns whether pause sync is active.
    ///
    /// Analysis failures only disable pause sync; the scheduled timeline keeps
    /// driving the mouth.
    pub fn set_audio_source(&mut self, clock: Box<dyn AudioClock>, raw_audio: Option<&[u8]>) -> bool {
        self.synchronizer.detach();
        self.clock = Some(clock);

        let Some(bytes) = raw_audio else {
            tracing::info!("audio source attached without pause analysis");
            return false;
        };

        match self.analyzer.analyze_bytes(bytes) {
            Ok(timeline) if timeline.is_empty() => {
                tracing::info!("no pauses detected, pause sync inactive");
                false
            }
            Ok(timeline) => {
                tracing::info!(pauses = timeline.len(), "pause sync enabled");
                self.synchronizer.attach(timeline);
                if self.animating && !self.finishing {
                    self.synchronizer.start_polling();
                }
                true
            }
            Err(err) => {
                tracing::warn!(error = %err, "pause analysis failed, continuing without pause sync");
                false
            }
        }
    }

    /// Cancels everything in flight and returns all writable channels to
    /// neutral. Safe to call repeatedly.
    pub fn stop_animation(&mut self) {
        self.queue.clear();
        self.synchronizer.stop_polling();
        self.pose.zero();
        self.interpolator.flush(&self.pose, &mut self.sink);
        if self.animating {
            tracing::debug!(elapsed_ms = self.elapsed_ms, "animation stopped");
        }
        self.animating = false;
        self.finishing = false;
    }

    /// Advances the animation by one frame of `elapsed_seconds`.
    pub fn tick(&mut self, elapsed_seconds: f64) {
        if !self.animating {
            return;
        }

        let elapsed_seconds = elapsed_seconds.max(0.0);
        self.elapsed_ms += elapsed_seconds * 1000.0;

        while let Some(action) = self.queue.pop_due(self.elapsed_ms) {
            match action {
                QueuedAction::Event(event) => self.fire(&event),
                QueuedAction::Finish => {
                    self.pose.reset_targets();
                    self.synchronizer.stop_polling();
                    self.finishing = true;
                }
            }
        }

        if let Some(clock) = &self.clock {
            let position = clock.position_seconds();
            if let Some(interval) =
                self.synchronizer
                    .maybe_poll(self.elapsed_ms, position, &self.blender, &mut self.pose)
            {
                tracing::debug!(pause = %interval.id(), position, "pause pose applied from audio");
            }
        }

        self.interpolator.step(&mut self.pose, elapsed_seconds);

        let settled = self.finishing && self.pose.max_error() < SETTLE_EPSILON;
        if settled {
            self.pose.zero();
        }
        self.interpolator.flush(&self.pose, &mut self.sink);

        if settled {
            tracing::debug!(elapsed_ms = self.elapsed_ms, "utterance finished");
            self.animating = false;
            self.finishing = false;
        }
    }

    fn fire(&mut self, event: &ScheduledEvent) {
        tracing::trace!(offset_ms = event.offset_ms, phoneme = %event.phoneme, kind = ?event.kind, "event");
        match (event.kind, event.next_phoneme, event.blend_factor) {
            (EventKind::Apply, _, _) => self.blender.apply(&mut self.pose, event.phoneme),
            (EventKind::Anticipate, Some(next), Some(factor)) => {
                self.blender
                    .anticipate(&mut self.pose, event.phoneme, next, factor)
            }
            (EventKind::Anticipate, _, _) => {}
        }
    }
}

impl<S> std::fmt::Debug for SpeechAnimator<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SpeechAnimator")
            .field("animating", &self.animating)
            .field("elapsed_ms", &self.elapsed_ms)
            .field("pending_events", &self.queue.len())
            .field("pause_sync", &self.synchronizer.is_polling())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        audio::tests::wav_with_gap, ChannelKey, MemorySink, Region, SpeechSyncError, VisemeResolver,
    };

    fn animator() -> SpeechAnimator<MemorySink> {
        SpeechAnimator::new(
            SyncConfig::default(),
            ChannelLayout::demo(),
            Box::new(VisemeResolver::new()),
            PhonemeProvider::offline(),
            MemorySink::new(),
        )
        .unwrap()
    }

    fn face(name: &str) -> ChannelKey {
        ChannelKey::new(Region::Face, name)
    }

    #[test]
    fn rejects_invalid_config() {
        let mut config = SyncConfig::default();
        config.interpolation.transition_ms = -1.0;
        let result = SpeechAnimator::new(
            config,
            ChannelLayout::demo(),
            Box::new(VisemeResolver::new()),
            PhonemeProvider::offline(),
            MemorySink::new(),
        );
        assert!(result.is_err());
    }

    #[test]
    fn tick_is_a_no_op_when_idle() {
        let mut animator = animator();
        animator.tick(0.016);
        assert_eq!(animator.sink().total_writes(), 0);
        assert_eq!(animator.elapsed_ms(), 0.0);
    }

    #[test]
    fn events_fire_when_their_offset_is_reached() {
        let mut animator = animator();
        animator.set_anticipation(false, 0.0, 0.0);
        animator.speak_phonemes(&[Phoneme::Aaa, Phoneme::Mbp], 100.0);

        animator.tick(0.040);
        assert_eq!(animator.pose().target(&face("viseme_aa")), Some(0.0));

        animator.tick(0.015);
        assert_eq!(animator.pose().target(&face("viseme_aa")), Some(1.0));
        assert_eq!(animator.pose().target(&face("jawOpen")), Some(0.5));
        assert!(animator.sink().weight(&face("viseme_aa")).unwrap() > 0.0);

        animator.tick(0.130);
        assert_eq!(animator.pose().target(&face("viseme_PP")), Some(1.0));
        assert_eq!(animator.pose().target(&face("viseme_aa")), Some(0.0));
    }

    #[test]
    fn new_utterance_cancels_the_previous_one() {
        let mut animator = animator();
        animator.speak_phonemes(&[Phoneme::Aaa, Phoneme::Ohh, Phoneme::Uuu], 100.0);
        animator.tick(0.060);
        let duration = animator.speak_phonemes(&[Phoneme::Mbp], 100.0);

        assert_eq!(animator.elapsed_ms(), 0.0);
        assert_eq!(animator.pending_events(), 2);
        assert!((duration - (50.0 + 80.0 + 550.0)).abs() < 1e-9);
    }

    #[test]
    fn utterance_ends_after_estimated_duration() {
        let mut animator = animator();
        let duration = animator.speak("ma.", SpeedProfile::Fast);

        let mut elapsed = 0.0;
        while animator.is_animating() && elapsed < duration + 2_000.0 {
            animator.tick(1.0 / 60.0);
            elapsed += 1000.0 / 60.0;
        }

        assert!(!animator.is_animating());
        assert!(elapsed >= duration);
        assert!(animator.sink().values().values().all(|weight| *weight == 0.0));
    }

    #[test]
    fn stop_is_idempotent() {
        let mut animator = animator();
        animator.speak("hello there", SpeedProfile::Normal);
        animator.tick(0.2);

        animator.stop_animation();
        let first = animator.pose().clone();
        animator.stop_animation();

        assert_eq!(animator.pose(), &first);
        assert!(!animator.is_animating());
        assert_eq!(animator.pending_events(), 0);
        assert!(animator.pose().currents().values().all(|w| *w == 0.0));
        assert!(animator.sink().values().values().all(|w| *w == 0.0));
    }

    #[test]
    fn audio_source_enables_pause_sync() {
        let mut animator = animator();
        let clock = crate::PlaybackClock::start();
        let bytes = wav_with_gap(16_000, 1, 300);

        assert!(animator.set_audio_source(Box::new(clock.clone()), Some(&bytes)));
        assert_eq!(animator.pause_timeline().len(), 1);
        assert!(!animator.is_pause_sync_active());

        animator.speak_phonemes(&[Phoneme::Aaa; 12], 135.0);
        assert!(animator.is_pause_sync_active());
    }

    #[test]
    fn unusable_audio_degrades_to_timeline_only() {
        let mut animator = animator();
        let clock = crate::PlaybackClock::start();
        assert!(!animator.set_audio_source(Box::new(clock.clone()), Some(b"nope")));
        assert!(!animator.set_audio_source(Box::new(clock.clone()), None));

        animator.set_decoder(None);
        let bytes = wav_with_gap(16_000, 1, 300);
        assert!(!animator.set_audio_source(Box::new(clock), Some(&bytes)));

        let duration = animator.speak("ah", SpeedProfile::Normal);
        assert!(duration > 550.0);
        assert!(animator.is_animating());
    }

    #[test]
    fn invalid_transition_is_rejected_and_weights_stay_finite() {
        let mut animator = animator();
        for bad in [f64::NAN, f64::INFINITY, 0.0, -5.0] {
            let err = animator.set_transition_ms(bad).unwrap_err();
            assert!(matches!(err, SpeechSyncError::InvalidConfig(_)), "{bad}");
        }
        assert_eq!(animator.config().interpolation.transition_ms, 105.0);

        animator.speak_phonemes(&[Phoneme::Aaa], 100.0);
        for _ in 0..10 {
            animator.tick(0.016);
        }
        assert!(animator.sink().total_writes() > 0);
        assert!(animator.sink().values().values().all(|w| w.is_finite()));
    }

    #[test]
    fn odd_audio_headers_degrade_to_timeline_only() {
        let mut animator = animator();
        let clock = crate::PlaybackClock::start();
        let bytes = crate::audio::tests::pcm_header(128, 64);
        assert!(!animator.set_audio_source(Box::new(clock), Some(&bytes)));

        animator.speak_phonemes(&[Phoneme::Aaa], 100.0);
        assert!(animator.is_animating());
        assert!(!animator.is_pause_sync_active());
    }

    #[test]
    fn live_transition_change_takes_effect() {
        let mut animator = animator();
        animator.set_anticipation(false, 0.0, 0.0);
        animator.set_transition_ms(1_000.0).unwrap();
        animator.speak_phonemes(&[Phoneme::Aaa], 100.0);
        animator.tick(0.060);
        let weight = animator.pose().current(&face("viseme_aa")).unwrap();
        assert!((weight - 0.06).abs() < 1e-4, "{weight}");

        animator.tick(0.100);
        let weight = animator.pose().current(&face("viseme_aa")).unwrap();
        assert!((weight - 0.154).abs() < 1e-4, "{weight}");
    }
}
