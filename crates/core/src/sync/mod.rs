//! Live reconciliation of the audio clock against detected pause intervals.

use serde::{Deserialize, Serialize};

use crate::{PauseInterval, PauseTimeline, PoseBlender, PoseState, SynchronizerConfig};

/// Pause bookkeeping that keeps the synchroniser from re-applying the same
/// pause while the clock sits in, or hovers at the edge of, one interval.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PauseTrackingState {
    /// Only replaced by the next pause application; kept when a pause ends.
    pub last_applied_pause_id: Option<String>,
    pub in_pause: bool,
    /// Pause poses applied since the timeline was attached.
    #[serde(default)]
    pub applications: u64,
}

/// Polls an audio position against a fixed pause timeline.
#[derive(Debug, Clone)]
pub struct PlaybackSynchronizer {
    timeline: PauseTimeline,
    state: PauseTrackingState,
    poll_interval_ms: f64,
    last_poll_ms: Option<f64>,
    polling: bool,
}

impl PlaybackSynchronizer {
    pub fn new(config: SynchronizerConfig) -> Self {
        Self {
            timeline: PauseTimeline::default(),
            state: PauseTrackingState::default(),
            poll_interval_ms: config.poll_interval_ms,
            last_poll_ms: None,
            polling: false,
        }
    }

    /// Replaces the pause timeline and resets all tracking state.
    pub fn attach(&mut self, timeline: PauseTimeline) {
        self.timeline = timeline;
        self.state = PauseTrackingState::default();
        self.last_poll_ms = None;
        self.polling = false;
    }

    /// Drops the timeline entirely.
    pub fn detach(&mut self) {
        self.attach(PauseTimeline::default());
    }

    pub fn has_timeline(&self) -> bool {
        !self.timeline.is_empty()
    }

    pub fn timeline(&self) -> &PauseTimeline {
        &self.timeline
    }

    pub fn state(&self) -> &PauseTrackingState {
        &self.state
    }

    pub fn is_polling(&self) -> bool {
        self.polling
    }

    /// Begins polling; the first poll happens on the next opportunity.
    pub fn start_polling(&mut self) {
        if self.has_timeline() {
            self.polling = true;
            self.last_poll_ms = None;
        }
    }

    pub fn stop_polling(&mut self) {
        self.polling = false;
        self.last_poll_ms = None;
    }

    /// Polls if active and at least one poll interval has passed since the
    /// previous poll on the driving clock.
    pub fn maybe_poll(
        &mut self,
        now_ms: f64,
        position_seconds: f64,
        blender: &PoseBlender,
        pose: &mut PoseState,
    ) -> Option<PauseInterval> {
        if !self.polling {
            return None;
        }
        if let Some(last) = self.last_poll_ms {
            if now_ms - last < self.poll_interval_ms {
                return None;
            }
        }

        self.last_poll_ms = Some(now_ms);
        self.poll(position_seconds, blender, pose)
    }

    /// One synchronisation step. Returns the interval whose pause pose was
    /// applied, if any.
    pub fn poll(
        &mut self,
        position_seconds: f64,
        blender: &PoseBlender,
        pose: &mut PoseState,
    ) -> Option<PauseInterval> {
        let Some(interval) = self.timeline.pause_at(position_seconds) else {
            if self.state.in_pause {
                tracing::debug!(position_seconds, "left pause interval");
                self.state.in_pause = false;
            }
            return None;
        };

        let id = interval.id();
        self.state.in_pause = true;
        if self.state.last_applied_pause_id.as_deref() == Some(id.as_str()) {
            return None;
        }

        tracing::debug!(position_seconds, pause = %id, "applying detected pause");
        blender.apply_pause(pose, interval.class);
        self.state.last_applied_pause_id = Some(id);
        self.state.applications += 1;
        Some(interval.clone())
    }
}

impl Default for PlaybackSynchronizer {
    fn default() -> Self {
        Self::new(SynchronizerConfig::default())
    }
}
