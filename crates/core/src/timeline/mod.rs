use std::{
    cmp::{Ordering, Reverse},
    collections::BinaryHeap,
};

use serde::{Deserialize, Serialize};

use crate::{AnticipationSettings, Phoneme, TimelineConfig};

/// What a scheduled event does to the pose.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventKind {
    Apply,
    Anticipate,
}

/// Pose change at a fixed offset from the start of an utterance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScheduledEvent {
    pub offset_ms: f64,
    pub kind: EventKind,
    pub phoneme: Phoneme,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_phoneme: Option<Phoneme>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub blend_factor: Option<f32>,
}

impl ScheduledEvent {
    pub fn apply(offset_ms: f64, phoneme: Phoneme) -> Self {
        Self {
            offset_ms,
            kind: EventKind::Apply,
            phoneme,
            next_phoneme: None,
            blend_factor: None,
        }
    }

    pub fn anticipate(offset_ms: f64, phoneme: Phoneme, next: Phoneme, factor: f32) -> Self {
        Self {
            offset_ms,
            kind: EventKind::Anticipate,
            phoneme,
            next_phoneme: Some(next),
            blend_factor: Some(factor),
        }
    }
}

/// Output of one scheduling pass.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Timeline {
    pub events: Vec<ScheduledEvent>,
    /// Estimated length of the whole animation, tail included.
    pub duration_ms: f64,
}

/// Converts phoneme sequences into timed pose events. Pure: no timers start.
#[derive(Debug, Clone, Default)]
pub struct TimelineScheduler {
    config: TimelineConfig,
}

impl TimelineScheduler {
    pub fn new(config: TimelineConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &TimelineConfig {
        &self.config
    }

    pub fn schedule(
        &self,
        phonemes: &[Phoneme],
        speed_ms: f64,
        anticipation: AnticipationSettings,
    ) -> Timeline {
        if phonemes.is_empty() {
            return Timeline {
                events: Vec::new(),
                duration_ms: self.config.end_delay_ms,
            };
        }

        let anticipation = anticipation.clamped();
        let mut events = Vec::with_capacity(phonemes.len() * 2);
        let mut offset = self.config.phoneme_offset_ms;

        for (index, phoneme) in phonemes.iter().copied().enumerate() {
            events.push(ScheduledEvent::apply(offset, phoneme));

            if let Some(next) = phonemes.get(index + 1).copied() {
                if anticipation.enabled {
                    events.push(ScheduledEvent::anticipate(
                        offset + speed_ms * f64::from(anticipation.offset_factor),
                        phoneme,
                        next,
                        anticipation.factor,
                    ));
                }
            }

            offset += speed_ms * phoneme.duration_multiplier();
        }

        Timeline {
            events,
            duration_ms: offset + self.config.end_delay_ms,
        }
    }
}

/// Entry of the playback queue.
#[derive(Debug, Clone, PartialEq)]
pub enum QueuedAction {
    Event(ScheduledEvent),
    /// End of the utterance: the pose returns to neutral.
    Finish,
}

#[derive(Debug)]
struct QueueEntry {
    at_ms: f64,
    seq: u64,
    action: QueuedAction,
}

impl PartialEq for QueueEntry {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for QueueEntry {}

impl PartialOrd for QueueEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for QueueEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        self.at_ms
            .total_cmp(&other.at_ms)
            .then(self.seq.cmp(&other.seq))
    }
}

/// Single ordered queue of pending actions, drained by one driving clock.
///
/// Ties on the offset keep insertion order.
#[derive(Debug, Default)]
pub struct EventQueue {
    heap: BinaryHeap<Reverse<QueueEntry>>,
    next_seq: u64,
}

impl EventQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, at_ms: f64, action: QueuedAction) {
        let seq = self.next_seq;
        self.next_seq += 1;
        self.heap.push(Reverse(QueueEntry { at_ms, seq, action }));
    }

    /// Queues every event of a timeline, followed by a finish marker at the
    /// estimated duration.
    pub fn load(&mut self, timeline: &Timeline) {
        for event in &timeline.events {
            self.push(event.offset_ms, QueuedAction::Event(event.clone()));
        }
        self.push(timeline.duration_ms, QueuedAction::Finish);
    }

    /// Removes and returns the earliest action due at or before `now_ms`.
    pub fn pop_due(&mut self, now_ms: f64) -> Option<QueuedAction> {
        if self.heap.peek()?.0.at_ms > now_ms {
            return None;
        }
        self.heap.pop().map(|Reverse(entry)| entry.action)
    }

    pub fn next_due_ms(&self) -> Option<f64> {
        self.heap.peek().map(|Reverse(entry)| entry.at_ms)
    }

    pub fn len(&self) -> usize {
        self.heap.len()
    }

    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }

    pub fn clear(&mut self) {
        self.heap.clear();
    }
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    fn scheduler() -> TimelineScheduler {
        TimelineScheduler::new(TimelineConfig::default())
    }

    #[test]
    fn schedules_reference_sequence() {
        let timeline = scheduler().schedule(
            &[Phoneme::Aaa, Phoneme::PauseMed, Phoneme::Sss],
            135.0,
            AnticipationSettings::disabled(),
        );

        let offsets: Vec<_> = timeline.events.iter().map(|e| e.offset_ms).collect();
        assert_eq!(offsets.len(), 3);
        assert!((offsets[0] - 50.0).abs() < 1e-9);
        assert!((offsets[1] - 225.5).abs() < 1e-9);
        assert!((offsets[2] - 630.5).abs() < 1e-9);
        assert!((timeline.duration_ms - 1302.0).abs() < 1e-9);
        assert!(timeline.events.iter().all(|e| e.kind == EventKind::Apply));
    }

    #[test]
    fn anticipation_events_sit_inside_the_slot() {
        let settings = AnticipationSettings::new(true, 0.3, 0.7);
        let timeline = scheduler().schedule(&[Phoneme::Aaa, Phoneme::Sss], 100.0, settings);

        assert_eq!(timeline.events.len(), 3);
        let anticipation = &timeline.events[1];
        assert_eq!(anticipation.kind, EventKind::Anticipate);
        assert_eq!(anticipation.phoneme, Phoneme::Aaa);
        assert_eq!(anticipation.next_phoneme, Some(Phoneme::Sss));
        assert_eq!(anticipation.blend_factor, Some(0.3));
        assert!((anticipation.offset_ms - (50.0 + 100.0 * f64::from(0.7_f32))).abs() < 1e-9);
        assert_eq!(timeline.events[2].kind, EventKind::Apply);
    }

    #[test]
    fn last_phoneme_gets_no_anticipation() {
        let timeline = scheduler().schedule(&[Phoneme::Ohh], 120.0, AnticipationSettings::default());
        assert_eq!(timeline.events.len(), 1);
    }

    #[test]
    fn empty_sequence_is_just_the_tail() {
        let timeline = scheduler().schedule(&[], 135.0, AnticipationSettings::default());
        assert!(timeline.events.is_empty());
        assert_eq!(timeline.duration_ms, 550.0);
    }

    #[test]
    fn queue_orders_by_offset_then_insertion() {
        let mut queue = EventQueue::new();
        queue.push(20.0, QueuedAction::Finish);
        queue.push(10.0, QueuedAction::Event(ScheduledEvent::apply(10.0, Phoneme::Aaa)));
        queue.push(10.0, QueuedAction::Event(ScheduledEvent::apply(10.0, Phoneme::Mbp)));

        assert!(queue.pop_due(5.0).is_none());
        assert_eq!(
            queue.pop_due(15.0),
            Some(QueuedAction::Event(ScheduledEvent::apply(10.0, Phoneme::Aaa)))
        );
        assert_eq!(
            queue.pop_due(15.0),
            Some(QueuedAction::Event(ScheduledEvent::apply(10.0, Phoneme::Mbp)))
        );
        assert!(queue.pop_due(15.0).is_none());
        assert_eq!(queue.next_due_ms(), Some(20.0));
        queue.clear();
        assert!(queue.is_empty());
    }

    #[test]
    fn load_appends_finish_marker() {
        let timeline = scheduler().schedule(&[Phoneme::Aaa], 100.0, AnticipationSettings::disabled());
        let mut queue = EventQueue::new();
        queue.load(&timeline);
        assert_eq!(queue.len(), 2);
        assert!(matches!(queue.pop_due(f64::MAX), Some(QueuedAction::Event(_))));
        assert_eq!(queue.pop_due(f64::MAX), Some(QueuedAction::Finish));
    }

    fn phoneme_strategy() -> impl Strategy<Value = Phoneme> {
        prop::sample::select(Phoneme::ALL.to_vec())
    }

    proptest! {
        #[test]
        fn scheduling_is_deterministic(
            phonemes in prop::collection::vec(phoneme_strategy(), 0..40),
            speed in 50.0f64..250.0,
            enabled in any::<bool>(),
            factor in 0.0f32..1.0,
            offset_factor in 0.0f32..1.0,
        ) {
            let settings = AnticipationSettings::new(enabled, factor, offset_factor);
            let first = scheduler().schedule(&phonemes, speed, settings);
            let second = scheduler().schedule(&phonemes, speed, settings);
            prop_assert_eq!(
                serde_json::to_string(&first).unwrap(),
                serde_json::to_string(&second).unwrap()
            );
        }

        #[test]
        fn apply_offsets_strictly_increase(
            phonemes in prop::collection::vec(phoneme_strategy(), 1..40),
            speed in 50.0f64..250.0,
        ) {
            let timeline = scheduler().schedule(&phonemes, speed, AnticipationSettings::default());
            let applies: Vec<f64> = timeline
                .events
                .iter()
                .filter(|e| e.kind == EventKind::Apply)
                .map(|e| e.offset_ms)
                .collect();
            prop_assert_eq!(applies.len(), phonemes.len());
            prop_assert!(applies.windows(2).all(|pair| pair[0] < pair[1]));

            let total: f64 = phonemes.iter().map(|p| speed * p.duration_multiplier()).sum();
            let expected = 50.0 + total + 550.0;
            prop_assert!((timeline.duration_ms - expected).abs() < 1e-6);
        }
    }
}
