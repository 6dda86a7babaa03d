//! Channel naming: which animation channels a phoneme drives on each model
//! region, and which channels are off limits.

use std::{collections::HashMap, fmt};

use serde::{Deserialize, Serialize};

use crate::Phoneme;

/// Part of the character model that owns its own set of channels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Region {
    Face,
    Teeth,
    Tongue,
}

impl fmt::Display for Region {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Region::Face => "face",
            Region::Teeth => "teeth",
            Region::Tongue => "tongue",
        };
        f.write_str(name)
    }
}

/// Identity of a single channel across the whole model.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ChannelKey {
    pub region: Region,
    pub name: String,
}

impl ChannelKey {
    pub fn new(region: Region, name: impl Into<String>) -> Self {
        Self {
            region,
            name: name.into(),
        }
    }
}

impl fmt::Display for ChannelKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.region, self.name)
    }
}

/// Weight resolved for a named channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChannelWeight {
    pub channel: String,
    pub weight: f32,
}

impl ChannelWeight {
    pub fn new(channel: impl Into<String>, weight: f32) -> Self {
        Self {
            channel: channel.into(),
            weight,
        }
    }
}

/// Channels exposed by the rendering side, grouped by region.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChannelLayout {
    regions: Vec<(Region, Vec<String>)>,
}

impl ChannelLayout {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_region<I, S>(mut self, region: Region, channels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let channels = channels.into_iter().map(Into::into).collect();
        match self.regions.iter().position(|(existing, _)| *existing == region) {
            Some(index) => self.regions[index].1 = channels,
            None => self.regions.push((region, channels)),
        }
        self
    }

    pub fn regions(&self) -> impl Iterator<Item = (Region, &[String])> + '_ {
        self.regions
            .iter()
            .map(|(region, channels)| (*region, channels.as_slice()))
    }

    pub fn channels(&self, region: Region) -> &[String] {
        self.regions
            .iter()
            .find(|(existing, _)| *existing == region)
            .map(|(_, channels)| channels.as_slice())
            .unwrap_or(&[])
    }

    /// Typical face rig using `viseme_*` names, a jaw channel and a few
    /// expression channels.
    pub fn demo() -> Self {
        Self::new()
            .with_region(
                Region::Face,
                [
                    "viseme_aa", "viseme_E", "viseme_I", "viseme_O", "viseme_U", "viseme_PP",
                    "viseme_FF", "viseme_TH", "viseme_DD", "viseme_SS", "viseme_CH", "viseme_RR",
                    "jawOpen", "mouthSmile", "browInnerUp", "eyeBlinkLeft",
                ],
            )
            .with_region(Region::Teeth, ["viseme_aa", "viseme_O", "jawOpen"])
    }
}

/// Predicate marking expression channels that speech must never touch.
pub trait ProtectedChannels {
    fn is_protected(&self, channel: &str) -> bool;
}

impl<F> ProtectedChannels for F
where
    F: Fn(&str) -> bool,
{
    fn is_protected(&self, channel: &str) -> bool {
        self(channel)
    }
}

/// Keyword based emotion channel filter.
#[derive(Debug, Clone)]
pub struct EmotionChannels {
    keywords: Vec<String>,
}

impl EmotionChannels {
    pub const DEFAULT_KEYWORDS: [&'static str; 13] = [
        "smile", "frown", "brow", "eye", "blink", "cheek", "sneer", "squint", "happy", "sad",
        "angry", "surprised", "emotion",
    ];

    pub fn new<I, S>(keywords: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            keywords: keywords
                .into_iter()
                .map(|keyword| keyword.as_ref().to_ascii_lowercase())
                .collect(),
        }
    }
}

impl Default for EmotionChannels {
    fn default() -> Self {
        Self::new(Self::DEFAULT_KEYWORDS)
    }
}

impl ProtectedChannels for EmotionChannels {
    fn is_protected(&self, channel: &str) -> bool {
        let lower = channel.to_ascii_lowercase();
        self.keywords.iter().any(|keyword| lower.contains(keyword))
    }
}

/// Resolves phonemes to weighted channel sets for a single region.
///
/// Implementations must be stateless per call and must never return a
/// protected channel.
pub trait ChannelResolver {
    fn resolve(&self, available: &[String], phoneme: Phoneme, region: Region) -> Vec<ChannelWeight>;

    /// Channels that open the jaw or mouth in the given region.
    fn jaw_channels(&self, available: &[String], region: Region) -> Vec<String>;

    fn is_protected(&self, channel: &str) -> bool;
}

/// Viseme shape of each phoneme, as `(variant, weight)` pairs.
fn viseme_shape(phoneme: Phoneme) -> &'static [(&'static str, f32)] {
    match phoneme {
        Phoneme::Aaa => &[("aa", 1.0)],
        Phoneme::Ahh => &[("aa", 0.7), ("E", 0.2)],
        Phoneme::Ohh => &[("O", 1.0)],
        Phoneme::Eh => &[("E", 1.0)],
        Phoneme::Iee => &[("I", 1.0)],
        Phoneme::Uuu => &[("U", 1.0)],
        Phoneme::Schwa => &[("aa", 0.4), ("E", 0.3)],
        Phoneme::Mbp => &[("PP", 1.0)],
        Phoneme::Fff => &[("FF", 1.0)],
        Phoneme::Tth => &[("TH", 0.6), ("DD", 0.5)],
        Phoneme::Sss => &[("SS", 1.0), ("CH", 0.3)],
        Phoneme::Rrr => &[("RR", 1.0)],
        Phoneme::PauseShort | Phoneme::PauseMed | Phoneme::PauseLong | Phoneme::Unknown => &[],
    }
}

/// Default resolver matching `<prefix><variant>` channel names, ignoring case.
#[derive(Debug, Clone)]
pub struct VisemeResolver<P = EmotionChannels> {
    prefixes: HashMap<Region, Vec<String>>,
    default_prefixes: Vec<String>,
    protected: P,
}

impl VisemeResolver<EmotionChannels> {
    pub fn new() -> Self {
        Self::with_protection(EmotionChannels::default())
    }
}

impl Default for VisemeResolver<EmotionChannels> {
    fn default() -> Self {
        Self::new()
    }
}

impl<P: ProtectedChannels> VisemeResolver<P> {
    pub fn with_protection(protected: P) -> Self {
        Self {
            prefixes: HashMap::new(),
            default_prefixes: vec!["viseme_".to_string(), "v_".to_string()],
            protected,
        }
    }

    /// Overrides the name prefixes tried for one region, in priority order.
    pub fn with_prefixes<I, S>(mut self, region: Region, prefixes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.prefixes
            .insert(region, prefixes.into_iter().map(Into::into).collect());
        self
    }

    fn prefixes(&self, region: Region) -> &[String] {
        self.prefixes
            .get(&region)
            .map(Vec::as_slice)
            .unwrap_or(&self.default_prefixes)
    }

    fn find_channel<'a>(&self, available: &'a [String], region: Region, variant: &str) -> Option<&'a String> {
        self.prefixes(region).iter().find_map(|prefix| {
            available.iter().find(|name| {
                name.len() == prefix.len() + variant.len()
                    && name
                        .get(..prefix.len())
                        .is_some_and(|head| head.eq_ignore_ascii_case(prefix))
                    && name
                        .get(prefix.len()..)
                        .is_some_and(|tail| tail.eq_ignore_ascii_case(variant))
                    && !self.protected.is_protected(name)
            })
        })
    }
}

impl<P: ProtectedChannels> ChannelResolver for VisemeResolver<P> {
    fn resolve(&self, available: &[String], phoneme: Phoneme, region: Region) -> Vec<ChannelWeight> {
        viseme_shape(phoneme)
            .iter()
            .filter_map(|(variant, weight)| {
                self.find_channel(available, region, variant)
                    .map(|name| ChannelWeight::new(name.clone(), *weight))
            })
            .collect()
    }

    fn jaw_channels(&self, available: &[String], _region: Region) -> Vec<String> {
        available
            .iter()
            .filter(|name| {
                let lower = name.to_ascii_lowercase();
                (lower.contains("jaw") && lower.contains("open")) || lower.contains("mouthopen")
            })
            .filter(|name| !self.protected.is_protected(name))
            .cloned()
            .collect()
    }

    fn is_protected(&self, channel: &str) -> bool {
        self.protected.is_protected(channel)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn face() -> Vec<String> {
        ChannelLayout::demo().channels(Region::Face).to_vec()
    }

    #[test]
    fn resolves_vowel_to_viseme_channel() {
        let resolver = VisemeResolver::new();
        let weights = resolver.resolve(&face(), Phoneme::Aaa, Region::Face);
        assert_eq!(weights, vec![ChannelWeight::new("viseme_aa", 1.0)]);
    }

    #[test]
    fn matching_ignores_case_and_respects_prefix_order() {
        let available = vec!["V_SS".to_string(), "VISEME_ss".to_string()];
        let resolver = VisemeResolver::new();
        let weights = resolver.resolve(&available, Phoneme::Sss, Region::Face);
        assert_eq!(weights, vec![ChannelWeight::new("VISEME_ss", 1.0)]);

        let resolver = VisemeResolver::new().with_prefixes(Region::Face, ["v_"]);
        let weights = resolver.resolve(&available, Phoneme::Sss, Region::Face);
        assert_eq!(weights, vec![ChannelWeight::new("V_SS", 1.0)]);
    }

    #[test]
    fn pauses_have_no_shape() {
        let resolver = VisemeResolver::new();
        assert!(resolver.resolve(&face(), Phoneme::PauseLong, Region::Face).is_empty());
        assert!(resolver.resolve(&face(), Phoneme::Unknown, Region::Face).is_empty());
    }

    #[test]
    fn protected_channels_are_never_resolved() {
        let resolver = VisemeResolver::with_protection(|name: &str| name.ends_with("_aa"));
        assert!(resolver.resolve(&face(), Phoneme::Aaa, Region::Face).is_empty());
        assert!(resolver.is_protected("viseme_aa"));
    }

    #[test]
    fn jaw_channels_skip_protected_names() {
        let available = vec![
            "jawOpen".to_string(),
            "mouthOpen".to_string(),
            "jawForward".to_string(),
            "mouthOpenSmile".to_string(),
        ];
        let resolver = VisemeResolver::new();
        assert_eq!(
            resolver.jaw_channels(&available, Region::Face),
            vec!["jawOpen".to_string(), "mouthOpen".to_string()]
        );
    }

    #[test]
    fn emotion_filter_matches_keywords() {
        let filter = EmotionChannels::default();
        assert!(filter.is_protected("mouthSmileLeft"));
        assert!(filter.is_protected("browDownRight"));
        assert!(!filter.is_protected("viseme_O"));
        assert!(!filter.is_protected("jawOpen"));
    }

    #[test]
    fn layout_replaces_existing_region() {
        let layout = ChannelLayout::new()
            .with_region(Region::Teeth, ["a"])
            .with_region(Region::Teeth, ["b", "c"]);
        assert_eq!(layout.channels(Region::Teeth), ["b".to_string(), "c".to_string()]);
        assert!(layout.channels(Region::Tongue).is_empty());
    }
}
