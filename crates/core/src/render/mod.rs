use std::collections::BTreeMap;

use crate::ChannelKey;

/// Receiver of smoothed channel weights. How a weight becomes visible motion
/// is up to the implementation.
pub trait ChannelSink {
    fn write(&mut self, channel: &ChannelKey, weight: f32);
}

impl<S: ChannelSink + ?Sized> ChannelSink for &mut S {
    fn write(&mut self, channel: &ChannelKey, weight: f32) {
        (**self).write(channel, weight);
    }
}

impl<S: ChannelSink + ?Sized> ChannelSink for Box<S> {
    fn write(&mut self, channel: &ChannelKey, weight: f32) {
        (**self).write(channel, weight);
    }
}

/// In-memory sink keeping the latest weight and a write count per channel.
#[derive(Debug, Default, Clone)]
pub struct MemorySink {
    values: BTreeMap<ChannelKey, f32>,
    writes: BTreeMap<ChannelKey, usize>,
    total_writes: usize,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn weight(&self, channel: &ChannelKey) -> Option<f32> {
        self.values.get(channel).copied()
    }

    pub fn values(&self) -> &BTreeMap<ChannelKey, f32> {
        &self.values
    }

    pub fn write_count(&self, channel: &ChannelKey) -> usize {
        self.writes.get(channel).copied().unwrap_or(0)
    }

    pub fn total_writes(&self) -> usize {
        self.total_writes
    }

    pub fn clear(&mut self) {
        self.values.clear();
        self.writes.clear();
        self.total_writes = 0;
    }
}

impl ChannelSink for MemorySink {
    fn write(&mut self, channel: &ChannelKey, weight: f32) {
        self.values.insert(channel.clone(), weight);
        *self.writes.entry(channel.clone()).or_default() += 1;
        self.total_writes += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Region;

    #[test]
    fn records_latest_weight_and_counts() {
        let key = ChannelKey::new(Region::Face, "viseme_aa");
        let mut sink = MemorySink::new();
        sink.write(&key, 0.2);
        sink.write(&key, 0.6);

        assert_eq!(sink.weight(&key), Some(0.6));
        assert_eq!(sink.write_count(&key), 2);
        assert_eq!(sink.total_writes(), 2);

        sink.clear();
        assert_eq!(sink.weight(&key), None);
        assert_eq!(sink.write_count(&key), 0);
    }

    #[test]
    fn forwards_through_boxed_sinks() {
        let key = ChannelKey::new(Region::Teeth, "jawOpen");
        let mut inner = MemorySink::new();
        {
            let mut boxed: Box<dyn ChannelSink + '_> = Box::new(&mut inner);
            boxed.write(&key, 0.5);
        }
        assert_eq!(inner.weight(&key), Some(0.5));
    }
}
