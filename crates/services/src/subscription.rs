//! Subscription status as reported by the hosted check-subscription function.
//!
//! Used by the application shell; the assessment engine never consults it.

use std::sync::Arc;
use std::time::Duration;

use reqwest::Client;
use serde::Deserialize;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use url::Url;

use crate::app_services::env_url;
use crate::error::{ConfigError, SubscriptionError};

pub const SUBSCRIPTION_URL_VAR: &str = "PREP_SUBSCRIPTION_URL";

/// How often the shell re-checks while a user is signed in.
pub const DEFAULT_POLL_PERIOD: Duration = Duration::from_secs(60);

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct SubscriptionStatus {
    #[serde(default)]
    pub subscribed: bool,
    #[serde(default)]
    pub product_id: Option<String>,
    #[serde(default)]
    pub subscription_end: Option<String>,
    #[serde(default)]
    pub trial_active: bool,
    #[serde(default)]
    pub trial_end_date: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SubscriptionConfig {
    pub endpoint: Url,
}

impl SubscriptionConfig {
    /// `None` when no endpoint is configured.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidUrl` for a malformed endpoint.
    pub fn from_lookup(
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Option<Self>, ConfigError> {
        Ok(env_url(&lookup, SUBSCRIPTION_URL_VAR)?.map(|endpoint| Self { endpoint }))
    }
}

#[derive(Clone, Debug)]
pub struct SubscriptionClient {
    client: Client,
    config: SubscriptionConfig,
}

impl SubscriptionClient {
    #[must_use]
    pub fn new(config: SubscriptionConfig) -> Self {
        Self {
            client: Client::new(),
            config,
        }
    }

    /// Ask the backend for the caller's subscription status.
    ///
    /// A missing or blank token means nobody is signed in: the unsubscribed
    /// default is returned without a request.
    ///
    /// # Errors
    ///
    /// Returns `SubscriptionError` when the request fails or is refused.
    pub async fn check(&self, token: Option<&str>) -> Result<SubscriptionStatus, SubscriptionError> {
        let Some(token) = token.map(str::trim).filter(|t| !t.is_empty()) else {
            return Ok(SubscriptionStatus::default());
        };

        let response = self
            .client
            .post(self.config.endpoint.clone())
            .bearer_auth(token)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(SubscriptionError::HttpStatus(response.status()));
        }

        Ok(response.json().await?)
    }

    /// Like [`check`](Self::check), but failures are logged and read as unsubscribed.
    pub async fn refresh(&self, token: Option<&str>) -> SubscriptionStatus {
        match self.check(token).await {
            Ok(status) => status,
            Err(err) => {
                tracing::warn!(error = %err, "error checking subscription");
                SubscriptionStatus::default()
            }
        }
    }
}

/// Background poller publishing the latest [`SubscriptionStatus`].
///
/// Polling stops when the watcher is dropped.
pub struct SubscriptionWatcher {
    status: watch::Receiver<SubscriptionStatus>,
    handle: JoinHandle<()>,
}

impl SubscriptionWatcher {
    /// Check immediately, then every `period`. Must be called from within a tokio runtime.
    #[must_use]
    pub fn spawn(client: Arc<SubscriptionClient>, token: Option<String>, period: Duration) -> Self {
        let (tx, status) = watch::channel(SubscriptionStatus::default());
        let period = period.max(Duration::from_millis(1));
        let handle = tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                interval.tick().await;
                let latest = client.refresh(token.as_deref()).await;
                tx.send_if_modified(|current| {
                    let changed = *current != latest;
                    *current = latest;
                    changed
                });
                if tx.is_closed() {
                    break;
                }
            }
        });
        Self { status, handle }
    }

    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<SubscriptionStatus> {
        self.status.clone()
    }

    #[must_use]
    pub fn current(&self) -> SubscriptionStatus {
        self.status.borrow().clone()
    }
}

impl Drop for SubscriptionWatcher {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client() -> SubscriptionClient {
        let config = SubscriptionConfig::from_lookup(|key| {
            (key == SUBSCRIPTION_URL_VAR)
                .then(|| "http://127.0.0.1:9/functions/v1/check-subscription".to_string())
        })
        .unwrap()
        .unwrap();
        SubscriptionClient::new(config)
    }

    #[test]
    fn status_decodes_function_payload() {
        let json = r#"{
            "subscribed": true,
            "product_id": "prod_123",
            "subscription_end": "2026-01-01T00:00:00.000Z",
            "trial_active": false,
            "trial_end_date": null
        }"#;
        let status: SubscriptionStatus = serde_json::from_str(json).unwrap();
        assert!(status.subscribed);
        assert_eq!(status.product_id.as_deref(), Some("prod_123"));

        let trial: SubscriptionStatus =
            serde_json::from_str(r#"{"subscribed":false,"trial_active":true}"#).unwrap();
        assert!(trial.trial_active);
        assert_eq!(trial.trial_end_date, None);
    }

    #[test]
    fn endpoint_is_optional() {
        assert_eq!(SubscriptionConfig::from_lookup(|_| None).unwrap(), None);
        assert!(
            SubscriptionConfig::from_lookup(|_| Some("not a url".into())).is_err()
        );
    }

    #[tokio::test]
    async fn signed_out_check_makes_no_request() {
        let client = client();
        assert_eq!(client.check(None).await.unwrap(), SubscriptionStatus::default());
        assert_eq!(
            client.check(Some("   ")).await.unwrap(),
            SubscriptionStatus::default()
        );
    }

    #[tokio::test(start_paused = true)]
    async fn watcher_publishes_and_stops_on_drop() {
        let watcher = SubscriptionWatcher::spawn(Arc::new(client()), None, DEFAULT_POLL_PERIOD);
        let rx = watcher.subscribe();
        tokio::time::sleep(DEFAULT_POLL_PERIOD * 2).await;
        assert_eq!(watcher.current(), SubscriptionStatus::default());

        drop(watcher);
        tokio::task::yield_now().await;
        assert!(!rx.has_changed().unwrap_or(false));
    }
}
