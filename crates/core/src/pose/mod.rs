//! Pose weights, the blending rules that set targets, and the interpolator
//! that moves current weights toward them.

use std::collections::{BTreeMap, BTreeSet};

use crate::{
    ChannelKey, ChannelLayout, ChannelResolver, ChannelSink, PauseClass, Phoneme, Region,
};

/// Jaw weight forced while a vowel is held.
pub const VOWEL_JAW_WEIGHT: f32 = 0.5;

/// Current and target weight of every writable channel.
///
/// Both maps share one key set, built once from the layout with protected
/// channels left out, so a protected channel can never be written.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PoseState {
    current: BTreeMap<ChannelKey, f32>,
    target: BTreeMap<ChannelKey, f32>,
}

impl PoseState {
    pub fn new(layout: &ChannelLayout, resolver: &dyn ChannelResolver) -> Self {
        let keys: BTreeMap<ChannelKey, f32> = layout
            .regions()
            .flat_map(|(region, channels)| {
                channels
                    .iter()
                    .filter(|name| !resolver.is_protected(name))
                    .map(move |name| (ChannelKey::new(region, name.clone()), 0.0))
            })
            .collect();

        Self {
            current: keys.clone(),
            target: keys,
        }
    }

    pub fn len(&self) -> usize {
        self.target.len()
    }

    pub fn is_empty(&self) -> bool {
        self.target.is_empty()
    }

    pub fn contains(&self, key: &ChannelKey) -> bool {
        self.target.contains_key(key)
    }

    pub fn target(&self, key: &ChannelKey) -> Option<f32> {
        self.target.get(key).copied()
    }

    pub fn current(&self, key: &ChannelKey) -> Option<f32> {
        self.current.get(key).copied()
    }

    pub fn targets(&self) -> &BTreeMap<ChannelKey, f32> {
        &self.target
    }

    pub fn currents(&self) -> &BTreeMap<ChannelKey, f32> {
        &self.current
    }

    /// Sets a target weight. Returns `false` for channels outside the write set.
    pub fn set_target(&mut self, key: &ChannelKey, weight: f32) -> bool {
        match self.target.get_mut(key) {
            Some(slot) => {
                *slot = weight;
                true
            }
            None => false,
        }
    }

    /// Sets every target to neutral.
    pub fn reset_targets(&mut self) {
        self.target.values_mut().for_each(|weight| *weight = 0.0);
    }

    pub fn scale_targets(&mut self, factor: f32) {
        self.target.values_mut().for_each(|weight| *weight *= factor);
    }

    /// Sets both targets and current weights to neutral.
    pub fn zero(&mut self) {
        self.reset_targets();
        self.current.values_mut().for_each(|weight| *weight = 0.0);
    }

    /// Largest gap between a current weight and its target.
    pub fn max_error(&self) -> f32 {
        self.current
            .iter()
            .map(|(key, current)| (self.target.get(key).copied().unwrap_or(0.0) - current).abs())
            .fold(0.0, f32::max)
    }
}

/// Writes pose targets for phonemes and pauses.
pub struct PoseBlender {
    layout: ChannelLayout,
    resolver: Box<dyn ChannelResolver>,
}

impl PoseBlender {
    pub fn new(layout: ChannelLayout, resolver: Box<dyn ChannelResolver>) -> Self {
        Self { layout, resolver }
    }

    pub fn layout(&self) -> &ChannelLayout {
        &self.layout
    }

    pub fn resolver(&self) -> &dyn ChannelResolver {
        self.resolver.as_ref()
    }

    /// Fresh neutral pose covering this blender's layout.
    pub fn neutral_pose(&self) -> PoseState {
        PoseState::new(&self.layout, self.resolver.as_ref())
    }

    /// Makes `phoneme` the full target shape.
    pub fn apply(&self, pose: &mut PoseState, phoneme: Phoneme) {
        if let Some(class) = phoneme.pause_class() {
            self.apply_pause(pose, class);
            return;
        }

        let shape = self.shape(phoneme);
        pose.reset_targets();
        for (key, weight) in &shape {
            pose.set_target(key, *weight);
        }

        if phoneme.is_vowel() {
            self.set_jaw(pose, VOWEL_JAW_WEIGHT);
        }
    }

    /// Neutral targets with the jaw at the pause's resting value.
    pub fn apply_pause(&self, pose: &mut PoseState, class: PauseClass) {
        pose.reset_targets();
        self.set_jaw(pose, class.jaw_rest());
    }

    /// Pre-blends part of `next` into the pose ahead of its slot.
    ///
    /// Into a pause the pose fades by `factor`; out of a pause nothing happens.
    pub fn anticipate(&self, pose: &mut PoseState, current: Phoneme, next: Phoneme, factor: f32) {
        if next.is_pause() {
            pose.scale_targets(1.0 - factor);
            return;
        }
        if current.is_pause() {
            return;
        }

        let from = self.shape(current);
        let to = self.shape(next);
        let keys: BTreeSet<&ChannelKey> = from.keys().chain(to.keys()).collect();

        pose.reset_targets();
        for key in keys {
            let a = from.get(key).copied().unwrap_or(0.0);
            let b = to.get(key).copied().unwrap_or(0.0);
            pose.set_target(key, a * (1.0 - factor) + b * factor);
        }

        let jaw_from = if current.is_vowel() {
            VOWEL_JAW_WEIGHT * (1.0 - factor)
        } else {
            0.0
        };
        let jaw_to = if next.is_vowel() {
            VOWEL_JAW_WEIGHT * factor
        } else {
            0.0
        };
        self.set_jaw(pose, jaw_from + jaw_to);
    }

    /// Resolved weights of `phoneme` across every region.
    fn shape(&self, phoneme: Phoneme) -> BTreeMap<ChannelKey, f32> {
        let mut shape = BTreeMap::new();
        for (region, available) in self.layout.regions() {
            for resolved in self.resolver.resolve(available, phoneme, region) {
                if self.resolver.is_protected(&resolved.channel) {
                    continue;
                }
                shape.insert(ChannelKey::new(region, resolved.channel), resolved.weight);
            }
        }
        shape
    }

    fn set_jaw(&self, pose: &mut PoseState, weight: f32) {
        for (region, available) in self.layout.regions() {
            for name in self.resolver.jaw_channels(available, region) {
                pose.set_target(&ChannelKey::new(region, name), weight);
            }
        }
    }

    /// Jaw channel keys across all regions.
    pub fn jaw_keys(&self) -> Vec<ChannelKey> {
        self.layout
            .regions()
            .flat_map(|(region, available): (Region, &[String])| {
                self.resolver
                    .jaw_channels(available, region)
                    .into_iter()
                    .map(move |name| ChannelKey::new(region, name))
            })
            .collect()
    }
}

impl std::fmt::Debug for PoseBlender {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PoseBlender")
            .field("layout", &self.layout)
            .finish()
    }
}

/// Time-based linear smoothing of current weights toward their targets.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PoseInterpolator {
    transition_ms: f64,
}

impl PoseInterpolator {
    pub fn new(transition_ms: f64) -> Self {
        Self { transition_ms }
    }

    pub fn transition_ms(&self) -> f64 {
        self.transition_ms
    }

    pub fn set_transition_ms(&mut self, transition_ms: f64) {
        self.transition_ms = transition_ms;
    }

    /// Blend factor for a frame lasting `elapsed_seconds`.
    ///
    /// A non-finite or non-positive transition, or a NaN frame time, snaps
    /// straight to the target.
    pub fn blend_factor(&self, elapsed_seconds: f64) -> f32 {
        if !self.transition_ms.is_finite() || self.transition_ms <= 0.0 {
            return 1.0;
        }
        let t = elapsed_seconds / (self.transition_ms / 1000.0);
        if t.is_nan() {
            return 1.0;
        }
        t.clamp(0.0, 1.0) as f32
    }

    /// Moves every current weight toward its target.
    pub fn step(&self, pose: &mut PoseState, elapsed_seconds: f64) {
        let t = self.blend_factor(elapsed_seconds);
        for (key, current) in pose.current.iter_mut() {
            let target = pose.target.get(key).copied().unwrap_or(0.0);
            *current += (target - *current) * t;
        }
    }

    /// Pushes current weights to the sink.
    pub fn flush(&self, pose: &PoseState, sink: &mut dyn ChannelSink) {
        for (key, weight) in pose.currents() {
            sink.write(key, *weight);
        }
    }
}

impl Default for PoseInterpolator {
    fn default() -> Self {
        Self::new(105.0)
    }
}
