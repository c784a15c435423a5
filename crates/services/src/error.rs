//! Shared error types for the services crate.

use thiserror::Error;

use prep_core::SessionError;

/// Errors emitted by question bank adapters.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum QuestionBankError {
    #[error("invalid question bank url: {0}")]
    InvalidBaseUrl(String),
    #[error("question bank request failed with status {0}")]
    HttpStatus(reqwest::StatusCode),
    #[error(transparent)]
    Http(#[from] reqwest::Error),
    #[error("could not decode question data: {0}")]
    Decode(#[from] serde_json::Error),
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error("question bank unavailable: {0}")]
    Unavailable(String),
}

/// Errors emitted by `AssessmentService` and the session runner.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum AssessmentError {
    #[error(transparent)]
    Session(#[from] SessionError),
    #[error(transparent)]
    QuestionBank(#[from] QuestionBankError),
    #[error("assessment runner has stopped")]
    Closed,
}

/// Errors emitted by `SubscriptionClient`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum SubscriptionError {
    #[error("subscription check failed with status {0}")]
    HttpStatus(reqwest::StatusCode),
    #[error(transparent)]
    Http(#[from] reqwest::Error),
}

/// Errors raised while reading configuration.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum ConfigError {
    #[error("{var} is not a valid url: {raw}")]
    InvalidUrl { var: &'static str, raw: String },
    #[error("{var} is not a valid positive number: {raw}")]
    InvalidNumber { var: &'static str, raw: String },
}

/// Errors emitted while bootstrapping app services.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum AppServicesError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    QuestionBank(#[from] QuestionBankError),
    #[error(transparent)]
    Subscription(#[from] SubscriptionError),
}
