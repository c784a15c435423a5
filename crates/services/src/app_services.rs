use std::env;
use std::sync::Arc;

use url::Url;

use crate::Clock;
use crate::assessment::{AssessmentRunner, AssessmentService, DEFAULT_PAGE_SIZE};
use crate::error::{AppServicesError, ConfigError};
use crate::question_bank::{HttpQuestionBank, QuestionBank, QuestionBankConfig};
use crate::subscription::{SubscriptionClient, SubscriptionConfig};

pub const PAGE_SIZE_VAR: &str = "PREP_PAGE_SIZE";
pub const ACCESS_TOKEN_VAR: &str = "PREP_ACCESS_TOKEN";

/// Runtime configuration, read from the environment.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AppConfig {
    pub question_bank: QuestionBankConfig,
    pub page_size: u32,
    pub subscription: Option<SubscriptionConfig>,
    pub access_token: Option<String>,
}

impl AppConfig {
    /// # Errors
    ///
    /// Returns `ConfigError` when a variable is set but malformed.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build the config from an arbitrary key lookup.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` when a variable is set but malformed.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let page_size = env_positive(&lookup, PAGE_SIZE_VAR)?
            .map_or(Ok(DEFAULT_PAGE_SIZE), |n| {
                u32::try_from(n).map_err(|_| ConfigError::InvalidNumber {
                    var: PAGE_SIZE_VAR,
                    raw: n.to_string(),
                })
            })?;
        let access_token = lookup(ACCESS_TOKEN_VAR)
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty());

        Ok(Self {
            question_bank: QuestionBankConfig::from_lookup(&lookup)?,
            page_size,
            subscription: SubscriptionConfig::from_lookup(&lookup)?,
            access_token,
        })
    }
}

pub(crate) fn env_url(
    lookup: &impl Fn(&str) -> Option<String>,
    var: &'static str,
) -> Result<Option<Url>, ConfigError> {
    let Some(raw) = lookup(var).filter(|v| !v.trim().is_empty()) else {
        return Ok(None);
    };
    Url::parse(raw.trim())
        .map(Some)
        .map_err(|_| ConfigError::InvalidUrl { var, raw })
}

pub(crate) fn env_positive(
    lookup: &impl Fn(&str) -> Option<String>,
    var: &'static str,
) -> Result<Option<u64>, ConfigError> {
    let Some(raw) = lookup(var).filter(|v| !v.trim().is_empty()) else {
        return Ok(None);
    };
    match raw.trim().parse::<u64>() {
        Ok(n) if n > 0 => Ok(Some(n)),
        _ => Err(ConfigError::InvalidNumber { var, raw }),
    }
}

/// Explicit application context handed to the views that need it.
#[derive(Clone)]
pub struct AppServices {
    assessment: Arc<AssessmentService>,
    subscription: Option<Arc<SubscriptionClient>>,
    access_token: Option<String>,
}

impl AppServices {
    /// Build services talking to the configured HTTP backends.
    ///
    /// # Errors
    ///
    /// Returns `AppServicesError` if the HTTP question bank can't be set up.
    pub fn new(config: &AppConfig, clock: Clock) -> Result<Self, AppServicesError> {
        let bank = Arc::new(HttpQuestionBank::new(&config.question_bank)?);
        let mut services = Self::with_question_bank(clock, bank, config.page_size);
        services.subscription = config
            .subscription
            .clone()
            .map(|c| Arc::new(SubscriptionClient::new(c)));
        services.access_token.clone_from(&config.access_token);
        Ok(services)
    }

    /// Build services over any question bank, without subscription checks.
    #[must_use]
    pub fn with_question_bank(clock: Clock, bank: Arc<dyn QuestionBank>, page_size: u32) -> Self {
        Self {
            assessment: Arc::new(AssessmentService::new(clock, bank).with_page_size(page_size)),
            subscription: None,
            access_token: None,
        }
    }

    #[must_use]
    pub fn assessment(&self) -> Arc<AssessmentService> {
        Arc::clone(&self.assessment)
    }

    /// A fresh runner over this context's assessment service.
    #[must_use]
    pub fn assessment_runner(&self) -> AssessmentRunner {
        AssessmentRunner::new(self.assessment())
    }

    #[must_use]
    pub fn subscription(&self) -> Option<Arc<SubscriptionClient>> {
        self.subscription.as_ref().map(Arc::clone)
    }

    #[must_use]
    pub fn access_token(&self) -> Option<&str> {
        self.access_token.as_deref()
    }
}
