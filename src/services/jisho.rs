//! Dictionary gateway wrapping the external Jisho-style lookup service.
//!
//! The client owns its own throttle clock and response cache; callers share a
//! single instance through [`crate::state::AppState`]. External calls are
//! spaced by a minimum interval and retried with exponential backoff before an
//! upstream failure is surfaced.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::time::sleep;
use tracing::warn;

const DEFAULT_BASE_URL: &str = "https://jisho.org/api/v1";
const DEFAULT_MIN_REQUEST_INTERVAL_MS: u64 = 1_000;
const DEFAULT_CACHE_TTL_SECS: u64 = 3_600;
const DEFAULT_TIMEOUT_MS: u64 = 10_000;
const DEFAULT_MAX_ATTEMPTS: u32 = 3;
const DEFAULT_BACKOFF_BASE_MS: u64 = 1_000;
const SUGGESTION_LIMIT: usize = 3;

#[derive(Debug, Clone)]
pub struct JishoConfig {
    pub base_url: String,
    pub min_request_interval: Duration,
    pub cache_ttl: Duration,
    pub request_timeout: Duration,
    pub max_attempts: u32,
    pub backoff_base: Duration,
}

impl Default for JishoConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            min_request_interval: Duration::from_millis(DEFAULT_MIN_REQUEST_INTERVAL_MS),
            cache_ttl: Duration::from_secs(DEFAULT_CACHE_TTL_SECS),
            request_timeout: Duration::from_millis(DEFAULT_TIMEOUT_MS),
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            backoff_base: Duration::from_millis(DEFAULT_BACKOFF_BASE_MS),
        }
    }
}

impl JishoConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            base_url: env_string("JISHO_API_URL").unwrap_or(defaults.base_url),
            min_request_interval: env_u64("JISHO_MIN_INTERVAL_MS")
                .map(Duration::from_millis)
                .unwrap_or(defaults.min_request_interval),
            cache_ttl: env_u64("JISHO_CACHE_TTL_SECS")
                .map(Duration::from_secs)
                .unwrap_or(defaults.cache_ttl),
            request_timeout: env_u64("JISHO_TIMEOUT_MS")
                .map(Duration::from_millis)
                .unwrap_or(defaults.request_timeout),
            max_attempts: defaults.max_attempts,
            backoff_base: defaults.backoff_base,
        }
    }
}

#[derive(Debug, Error)]
pub enum JishoError {
    #[error("not found")]
    NotFound,
    #[error("upstream request failed: {0}")]
    Upstream(String),
}

/// Normalized kanji data, independent of the upstream response shape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KanjiData {
    pub character: String,
    pub onyomi: Vec<String>,
    pub kunyomi: Vec<String>,
    pub meanings: Vec<String>,
    pub stroke_count: i32,
    pub jlpt_level: String,
    pub grade: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WordSuggestion {
    pub word: Option<String>,
    pub reading: Option<String>,
    pub meanings: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WordValidation {
    pub is_valid: bool,
    pub suggestions: Vec<WordSuggestion>,
}

impl WordValidation {
    fn invalid() -> Self {
        Self {
            is_valid: false,
            suggestions: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PhraseResult {
    pub kanji: String,
    pub reading: String,
    pub meanings: Vec<String>,
    pub slug: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawKanjiResponse {
    #[serde(default)]
    found: bool,
    query: Option<String>,
    #[serde(default)]
    onyomi: Vec<String>,
    #[serde(default)]
    kunyomi: Vec<String>,
    meaning: Option<String>,
    stroke_count: Option<i32>,
    jlpt_level: Option<String>,
    grade: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawKanjiListResponse {
    #[serde(default)]
    data: Vec<RawKanjiResponse>,
}

#[derive(Debug, Deserialize)]
struct RawPhraseResponse {
    #[serde(default)]
    data: Vec<RawPhraseEntry>,
}

#[derive(Debug, Deserialize)]
struct RawPhraseEntry {
    #[serde(default)]
    japanese: Vec<RawJapanese>,
    #[serde(default)]
    senses: Vec<RawSense>,
}

#[derive(Debug, Deserialize)]
struct RawJapanese {
    word: Option<String>,
    reading: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawSense {
    #[serde(default)]
    english_definitions: Vec<String>,
}

#[derive(Clone)]
enum CachePayload {
    Kanji(KanjiData),
    Word(WordValidation),
    KanjiList(Vec<KanjiData>),
}

struct CacheEntry {
    payload: CachePayload,
    expires_at: Instant,
}

pub struct JishoClient {
    config: JishoConfig,
    client: reqwest::Client,
    cache: Mutex<HashMap<String, CacheEntry>>,
    last_request: tokio::sync::Mutex<Option<Instant>>,
}

impl JishoClient {
    pub fn new(config: JishoConfig) -> Self {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());

        Self {
            config,
            client,
            cache: Mutex::new(HashMap::new()),
            last_request: tokio::sync::Mutex::new(None),
        }
    }

    /// Looks up a single kanji. Serves unexpired cached data without touching
    /// the network; otherwise fetches, validates and normalizes the upstream
    /// response. Not-found results are never cached.
    pub async fn lookup_kanji(&self, character: &str) -> Result<KanjiData, JishoError> {
        let cache_key = format!("kanji:{character}");
        if let Some(CachePayload::Kanji(data)) = self.cache_get(&cache_key) {
            return Ok(data);
        }

        let url = format!(
            "{}/search/kanji?keyword={}",
            self.config.base_url,
            urlencoding::encode(character)
        );
        let raw: RawKanjiResponse = self.get_json(&url).await?;

        if !is_valid_kanji(&raw) {
            return Err(JishoError::NotFound);
        }
        let data = normalize_kanji(&raw).ok_or(JishoError::NotFound)?;

        self.cache_put(cache_key, CachePayload::Kanji(data.clone()));
        Ok(data)
    }

    /// Validates a word against the phrase search. Upstream failures degrade
    /// to an invalid result with no suggestions; validation is advisory and
    /// must not fail the caller's flow.
    pub async fn lookup_word(&self, word: &str, reading: Option<&str>) -> WordValidation {
        let cache_key = word_cache_key(word, reading);
        if let Some(CachePayload::Word(validation)) = self.cache_get(&cache_key) {
            return validation;
        }

        let url = format!(
            "{}/search/words?keyword={}",
            self.config.base_url,
            urlencoding::encode(word)
        );
        let raw: RawPhraseResponse = match self.get_json(&url).await {
            Ok(raw) => raw,
            Err(err) => {
                warn!(word, error = %err, "word validation degraded to invalid");
                return WordValidation::invalid();
            }
        };

        let validation = validate_word(&raw, word, reading);
        self.cache_put(cache_key, CachePayload::Word(validation.clone()));
        validation
    }

    /// Raw phrase search for the kanji browse page. Results are not cached;
    /// queries are free-form and rarely repeat.
    pub async fn search_phrase(&self, query: &str) -> Result<Vec<PhraseResult>, JishoError> {
        let url = format!(
            "{}/search/words?keyword={}",
            self.config.base_url,
            urlencoding::encode(query)
        );
        let raw: RawPhraseResponse = self.get_json(&url).await?;

        if raw.data.is_empty() {
            return Err(JishoError::NotFound);
        }

        Ok(raw
            .data
            .iter()
            .map(|entry| {
                let first = entry.japanese.first();
                let kanji = first
                    .and_then(|j| j.word.clone().or_else(|| j.reading.clone()))
                    .unwrap_or_default();
                PhraseResult {
                    reading: first.and_then(|j| j.reading.clone()).unwrap_or_default(),
                    meanings: entry
                        .senses
                        .first()
                        .map(|s| s.english_definitions.clone())
                        .unwrap_or_default(),
                    slug: kanji.clone(),
                    kanji,
                }
            })
            .collect())
    }

    /// Level-filtered kanji search, truncated to `limit`.
    pub async fn kanji_by_jlpt_level(
        &self,
        level: &str,
        limit: usize,
    ) -> Result<Vec<KanjiData>, JishoError> {
        let cache_key = format!("jlpt:{level}:{limit}");
        if let Some(CachePayload::KanjiList(list)) = self.cache_get(&cache_key) {
            return Ok(list);
        }

        let url = format!(
            "{}/search/kanji?jlpt={}",
            self.config.base_url,
            urlencoding::encode(level)
        );
        let raw: RawKanjiListResponse = self.get_json(&url).await?;

        let list: Vec<KanjiData> = raw
            .data
            .iter()
            .filter(|item| item.jlpt_level.as_deref() == Some(level))
            .filter_map(normalize_kanji)
            .take(limit)
            .collect();

        self.cache_put(cache_key, CachePayload::KanjiList(list.clone()));
        Ok(list)
    }

    fn cache_get(&self, key: &str) -> Option<CachePayload> {
        let mut cache = self.cache.lock();
        match cache.get(key) {
            Some(entry) if entry.expires_at > Instant::now() => Some(entry.payload.clone()),
            Some(_) => {
                // Expired entries are evicted lazily on access.
                cache.remove(key);
                None
            }
            None => None,
        }
    }

    fn cache_put(&self, key: String, payload: CachePayload) {
        let entry = CacheEntry {
            payload,
            expires_at: Instant::now() + self.config.cache_ttl,
        };
        self.cache.lock().insert(key, entry);
    }

    /// Waits out the shared minimum interval since the previous external call.
    /// All lookups go through this single clock, so concurrent callers
    /// serialize on it.
    async fn throttle(&self) {
        let mut last = self.last_request.lock().await;
        if let Some(prev) = *last {
            let elapsed = prev.elapsed();
            if elapsed < self.config.min_request_interval {
                sleep(self.config.min_request_interval - elapsed).await;
            }
        }
        *last = Some(Instant::now());
    }

    async fn get_json<T: DeserializeOwned>(&self, url: &str) -> Result<T, JishoError> {
        let mut last_error = String::new();

        for attempt in 1..=self.config.max_attempts {
            self.throttle().await;

            match self.client.get(url).send().await {
                Ok(resp) if resp.status().is_success() => {
                    return resp
                        .json::<T>()
                        .await
                        .map_err(|e| JishoError::Upstream(format!("decode failed: {e}")));
                }
                Ok(resp) => last_error = format!("HTTP {}", resp.status()),
                Err(err) => last_error = err.to_string(),
            }

            if attempt < self.config.max_attempts {
                let backoff = self.config.backoff_base * 2u32.pow(attempt);
                warn!(attempt, error = %last_error, "dictionary request failed, retrying");
                sleep(backoff).await;
            }
        }

        Err(JishoError::Upstream(last_error))
    }
}

// An absent reading must not share a key with an empty one.
fn word_cache_key(word: &str, reading: Option<&str>) -> String {
    format!("word:{word}:{}", reading.unwrap_or("null"))
}

fn is_valid_kanji(raw: &RawKanjiResponse) -> bool {
    raw.found && raw.query.is_some() && (!raw.onyomi.is_empty() || !raw.kunyomi.is_empty())
}

fn normalize_kanji(raw: &RawKanjiResponse) -> Option<KanjiData> {
    let character = raw.query.clone()?;
    let meanings = raw
        .meaning
        .as_deref()
        .map(|m| m.split(", ").map(str::to_string).collect())
        .unwrap_or_default();

    Some(KanjiData {
        character,
        onyomi: raw.onyomi.clone(),
        kunyomi: raw.kunyomi.clone(),
        meanings,
        stroke_count: raw.stroke_count.unwrap_or(0),
        jlpt_level: raw.jlpt_level.clone().unwrap_or_else(|| "Unknown".to_string()),
        grade: raw.grade.clone().unwrap_or_else(|| "Unknown".to_string()),
    })
}

fn validate_word(raw: &RawPhraseResponse, word: &str, reading: Option<&str>) -> WordValidation {
    if raw.data.is_empty() {
        return WordValidation::invalid();
    }

    let is_valid = match reading {
        None => raw
            .data
            .iter()
            .any(|entry| entry.japanese.iter().any(|j| j.word.as_deref() == Some(word))),
        Some(reading) => raw.data.iter().any(|entry| {
            entry
                .japanese
                .iter()
                .any(|j| j.word.as_deref() == Some(word) && j.reading.as_deref() == Some(reading))
        }),
    };

    // Top suggestions are returned regardless of validity so the caller can
    // show alternatives on rejection.
    let suggestions = raw
        .data
        .iter()
        .take(SUGGESTION_LIMIT)
        .map(|entry| WordSuggestion {
            word: entry.japanese.first().and_then(|j| j.word.clone()),
            reading: entry.japanese.first().and_then(|j| j.reading.clone()),
            meanings: entry
                .senses
                .first()
                .map(|s| s.english_definitions.clone())
                .unwrap_or_default(),
        })
        .collect();

    WordValidation { is_valid, suggestions }
}

fn env_string(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn env_u64(key: &str) -> Option<u64> {
    env_string(key)?.parse().ok()
}
