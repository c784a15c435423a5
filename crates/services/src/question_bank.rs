use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use url::Url;

use prep_core::model::Question;

use crate::app_services::{env_positive, env_url};
use crate::error::{ConfigError, QuestionBankError};

pub const API_URL_VAR: &str = "PREP_API_URL";
pub const API_TIMEOUT_VAR: &str = "PREP_API_TIMEOUT_SECS";
pub const DEFAULT_API_URL: &str = "http://localhost:8000/api";
pub const DEFAULT_TIMEOUT_SECS: u64 = 15;

//
// ─── QUERY / PAGE ─────────────────────────────────────────────────────────────
//

/// Filters accepted by the items endpoint. Unset fields are not sent.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ItemQuery {
    pub limit: Option<u32>,
    pub offset: Option<u32>,
    pub module: Option<String>,
    pub difficulty: Option<String>,
    pub assessment: Option<u64>,
    pub test: Option<u64>,
    pub domain: Option<u64>,
    pub skill: Option<u64>,
}

impl ItemQuery {
    #[must_use]
    pub fn with_limit(limit: u32) -> Self {
        Self {
            limit: Some(limit),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn query_pairs(&self) -> Vec<(&'static str, String)> {
        let mut pairs = Vec::new();
        let numbers = [
            ("assessment", self.assessment),
            ("test", self.test),
            ("domain", self.domain),
            ("skill", self.skill),
        ];
        for (key, value) in numbers {
            if let Some(value) = value {
                pairs.push((key, value.to_string()));
            }
        }
        if let Some(module) = &self.module {
            pairs.push(("module", module.clone()));
        }
        if let Some(difficulty) = &self.difficulty {
            pairs.push(("difficulty", difficulty.clone()));
        }
        if let Some(limit) = self.limit {
            pairs.push(("limit", limit.to_string()));
        }
        if let Some(offset) = self.offset {
            pairs.push(("offset", offset.to_string()));
        }
        pairs
    }
}

/// One page of items. Cursors are kept for callers that page; the engine ignores them.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct ItemPage {
    #[serde(default)]
    pub results: Vec<Question>,
    #[serde(default)]
    pub next: Option<String>,
    #[serde(default)]
    pub previous: Option<String>,
    #[serde(default)]
    pub count: u64,
}

/// Source of questions for default runs.
#[async_trait]
pub trait QuestionBank: Send + Sync {
    /// Fetch one page of items matching `query`.
    ///
    /// # Errors
    ///
    /// Returns `QuestionBankError` when the request fails or the body can't be decoded.
    async fn list_items(&self, query: &ItemQuery) -> Result<ItemPage, QuestionBankError>;
}

//
// ─── HTTP ─────────────────────────────────────────────────────────────────────
//

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct QuestionBankConfig {
    pub base_url: Url,
    pub timeout: Duration,
}

impl QuestionBankConfig {
    /// # Errors
    ///
    /// Returns `ConfigError` when a variable is set but malformed.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let base_url = env_url(&lookup, API_URL_VAR)?.map_or_else(default_base_url, Ok)?;
        let timeout = env_positive(&lookup, API_TIMEOUT_VAR)?.unwrap_or(DEFAULT_TIMEOUT_SECS);
        Ok(Self {
            base_url,
            timeout: Duration::from_secs(timeout),
        })
    }

    /// # Errors
    ///
    /// Returns `ConfigError::InvalidUrl` if `raw` doesn't parse.
    pub fn with_base_url(mut self, raw: &str) -> Result<Self, ConfigError> {
        self.base_url = Url::parse(raw).map_err(|_| ConfigError::InvalidUrl {
            var: API_URL_VAR,
            raw: raw.to_string(),
        })?;
        Ok(self)
    }
}

fn default_base_url() -> Result<Url, ConfigError> {
    Url::parse(DEFAULT_API_URL).map_err(|_| ConfigError::InvalidUrl {
        var: API_URL_VAR,
        raw: DEFAULT_API_URL.to_string(),
    })
}

/// Question bank backed by the REST items endpoint.
#[derive(Clone, Debug)]
pub struct HttpQuestionBank {
    client: Client,
    base_url: Url,
}

impl HttpQuestionBank {
    /// # Errors
    ///
    /// Returns `QuestionBankError::Http` if the HTTP client can't be built.
    pub fn new(config: &QuestionBankConfig) -> Result<Self, QuestionBankError> {
        let client = Client::builder().timeout(config.timeout).build()?;
        Ok(Self {
            client,
            base_url: config.base_url.clone(),
        })
    }

    /// `{base}/items/`, keeping any path prefix on the base url.
    ///
    /// # Errors
    ///
    /// Returns `QuestionBankError::InvalidBaseUrl` for urls that can't carry a path.
    pub fn items_url(&self) -> Result<Url, QuestionBankError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|()| QuestionBankError::InvalidBaseUrl(self.base_url.to_string()))?
            .pop_if_empty()
            .push("items")
            .push("");
        Ok(url)
    }
}

#[async_trait]
impl QuestionBank for HttpQuestionBank {
    async fn list_items(&self, query: &ItemQuery) -> Result<ItemPage, QuestionBankError> {
        let url = self.items_url()?;
        tracing::debug!(%url, ?query, "requesting question page");

        let response = self
            .client
            .get(url)
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .query(&query.query_pairs())
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(QuestionBankError::HttpStatus(response.status()));
        }

        let bytes = response.bytes().await?;
        Ok(serde_json::from_slice(&bytes)?)
    }
}

//
// ─── IN MEMORY ────────────────────────────────────────────────────────────────
//

/// In-memory question bank for tests and offline runs.
#[derive(Clone, Default)]
pub struct InMemoryQuestionBank {
    items: Arc<Mutex<Vec<Question>>>,
    failure: Arc<Mutex<Option<String>>>,
    requests: Arc<Mutex<Vec<ItemQuery>>>,
    latency: Option<Duration>,
}

impl InMemoryQuestionBank {
    #[must_use]
    pub fn new(items: Vec<Question>) -> Self {
        Self {
            items: Arc::new(Mutex::new(items)),
            ..Self::default()
        }
    }

    /// Delay every response, to exercise requests that are still in flight.
    #[must_use]
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    /// Make subsequent requests fail with `message`, or succeed again with `None`.
    pub fn set_failure(&self, message: Option<&str>) {
        if let Ok(mut failure) = self.failure.lock() {
            *failure = message.map(str::to_owned);
        }
    }

    pub fn replace_items(&self, items: Vec<Question>) {
        if let Ok(mut current) = self.items.lock() {
            *current = items;
        }
    }

    /// Queries received so far, oldest first.
    #[must_use]
    pub fn requests(&self) -> Vec<ItemQuery> {
        self.requests
            .lock()
            .map(|requests| requests.clone())
            .unwrap_or_default()
    }
}

fn poisoned<T>(_: T) -> QuestionBankError {
    QuestionBankError::Unavailable("lock poisoned".into())
}

#[async_trait]
impl QuestionBank for InMemoryQuestionBank {
    async fn list_items(&self, query: &ItemQuery) -> Result<ItemPage, QuestionBankError> {
        self.requests.lock().map_err(poisoned)?.push(query.clone());

        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }

        let failure = self.failure.lock().map_err(poisoned)?.clone();
        if let Some(message) = failure {
            return Err(QuestionBankError::Unavailable(message));
        }

        let items = self.items.lock().map_err(poisoned)?;
        let offset = query
            .offset
            .map_or(0, |o| usize::try_from(o).unwrap_or(usize::MAX));
        let limit = query
            .limit
            .map_or(usize::MAX, |l| usize::try_from(l).unwrap_or(usize::MAX));
        let results: Vec<_> = items.iter().skip(offset).take(limit).cloned().collect();

        Ok(ItemPage {
            results,
            next: None,
            previous: None,
            count: u64::try_from(items.len()).unwrap_or(u64::MAX),
        })
    }
}

//
// ─── FILES ────────────────────────────────────────────────────────────────────
//

#[derive(Deserialize)]
#[serde(untagged)]
enum ItemsFile {
    List(Vec<Question>),
    Page(ItemPage),
}

/// Read questions from a JSON file holding either a bare list or an items page.
///
/// # Errors
///
/// Returns `QuestionBankError::Io` or `QuestionBankError::Decode`.
pub fn load_items(path: impl AsRef<Path>) -> Result<Vec<Question>, QuestionBankError> {
    let raw = std::fs::read(path)?;
    let items = match serde_json::from_slice::<ItemsFile>(&raw)? {
        ItemsFile::List(items) => items,
        ItemsFile::Page(page) => page.results,
    };
    Ok(items)
}
