use std::{fmt, num::NonZeroUsize, time::Duration};

use lru::LruCache;
use serde::{Deserialize, Serialize};

use crate::{fallback_phonemes, Phoneme, PhoneticConfig, Result, SpeechSyncError};

/// Anything able to turn text into a phoneme sequence.
pub trait PhonemeSource {
    fn phonemes(&self, text: &str) -> Result<Vec<Phoneme>>;
}

/// Local letter heuristic. Never fails.
#[derive(Debug, Default, Clone, Copy)]
pub struct CharacterFallback;

impl PhonemeSource for CharacterFallback {
    fn phonemes(&self, text: &str) -> Result<Vec<Phoneme>> {
        Ok(fallback_phonemes(text))
    }
}

#[derive(Debug, Serialize)]
struct AnalysisRequest<'a> {
    text: &'a str,
}

#[derive(Debug, Deserialize)]
struct AnalysisResponse {
    sequence: Vec<String>,
}

/// Client for a remote phonetic-analysis endpoint.
///
/// The service receives `{"text": ...}` and answers with a `sequence` array of
/// symbols, either vocabulary symbols or raw ARPAbet phones.
#[derive(Debug)]
pub struct HttpPhonemeSource {
    client: reqwest::blocking::Client,
    endpoint: String,
}

impl HttpPhonemeSource {
    pub fn new(endpoint: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .build()?;

        Ok(Self {
            client,
            endpoint: endpoint.into(),
        })
    }

    /// Builds a client from configuration, or `None` when no endpoint is set.
    pub fn from_config(config: &PhoneticConfig) -> Result<Option<Self>> {
        config
            .endpoint
            .as_deref()
            .map(|endpoint| Self::new(endpoint, Duration::from_millis(config.timeout_ms)))
            .transpose()
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

impl PhonemeSource for HttpPhonemeSource {
    fn phonemes(&self, text: &str) -> Result<Vec<Phoneme>> {
        tracing::debug!(endpoint = %self.endpoint, chars = text.len(), "requesting phonetic analysis");

        let response = self
            .client
            .post(&self.endpoint)
            .json(&AnalysisRequest { text })
            .send()?;

        let status = response.status();
        if !status.is_success() {
            return Err(SpeechSyncError::PhoneticService(format!(
                "phonetic service answered with status {status}"
            )));
        }

        let body: AnalysisResponse = response.json()?;
        Ok(body
            .sequence
            .iter()
            .map(|symbol| Phoneme::parse_lenient(symbol))
            .collect())
    }
}

/// Bounded least-recently-used cache of phoneme sequences keyed by exact text.
pub struct PhonemeCache {
    entries: LruCache<String, Vec<Phoneme>>,
}

impl PhonemeCache {
    pub fn new(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            entries: LruCache::new(capacity),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.entries.cap().get()
    }

    /// Returns a cached sequence and marks it as most recently used.
    pub fn get(&mut self, text: &str) -> Option<Vec<Phoneme>> {
        self.entries.get(text).cloned()
    }

    pub fn insert(&mut self, text: &str, phonemes: Vec<Phoneme>) {
        self.entries.put(text.to_string(), phonemes);
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

impl fmt::Debug for PhonemeCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PhonemeCache")
            .field("len", &self.len())
            .field("capacity", &self.capacity())
            .finish()
    }
}

/// Resolves text to phonemes: cache, then the remote source, then the local
/// fallback. Errors from the remote source are logged and swallowed.
pub struct PhonemeProvider {
    remote: Option<Box<dyn PhonemeSource>>,
    cache: PhonemeCache,
}

impl PhonemeProvider {
    pub fn new(remote: Option<Box<dyn PhonemeSource>>, cache_capacity: usize) -> Self {
        Self {
            remote,
            cache: PhonemeCache::new(cache_capacity),
        }
    }

    /// Provider that only ever uses the character heuristic.
    pub fn offline() -> Self {
        Self::new(None, PhoneticConfig::default().cache_capacity)
    }

    pub fn from_config(config: &PhoneticConfig) -> Result<Self> {
        let remote = HttpPhonemeSource::from_config(config)?
            .map(|source| Box::new(source) as Box<dyn PhonemeSource>);
        Ok(Self::new(remote, config.cache_capacity))
    }

    pub fn cache(&self) -> &PhonemeCache {
        &self.cache
    }

    pub fn phonemes(&mut self, text: &str) -> Vec<Phoneme> {
        if let Some(cached) = self.cache.get(text) {
            tracing::debug!(count = cached.len(), "phoneme cache hit");
            return cached;
        }

        if let Some(remote) = &self.remote {
            match remote.phonemes(text) {
                Ok(phonemes) => {
                    self.cache.insert(text, phonemes.clone());
                    return phonemes;
                }
                Err(err) => {
                    tracing::warn!(error = %err, "phonetic lookup failed, using character fallback");
                }
            }
        }

        // Fallback output is not cached.
        fallback_phonemes(text)
    }
}

impl fmt::Debug for PhonemeProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PhonemeProvider")
            .field("remote", &self.remote.is_some())
            .field("cache", &self.cache.len())
            .finish()
    }
}
