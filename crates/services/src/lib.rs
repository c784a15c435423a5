#![forbid(unsafe_code)]

pub mod app_services;
pub mod assessment;
pub mod countdown;
pub mod error;
pub mod question_bank;
pub mod subscription;

pub use prep_core::Clock;

pub use app_services::{AppConfig, AppServices};
pub use assessment::{
    AssessmentHandle, AssessmentRunner, AssessmentService, Command, Notice, QuestionView,
    SessionSnapshot,
};
pub use countdown::{Countdown, Tick};
pub use error::{
    AppServicesError, AssessmentError, ConfigError, QuestionBankError, SubscriptionError,
};
pub use question_bank::{
    HttpQuestionBank, InMemoryQuestionBank, ItemPage, ItemQuery, QuestionBank,
    QuestionBankConfig, load_items,
};
pub use subscription::{
    SubscriptionClient, SubscriptionConfig, SubscriptionStatus, SubscriptionWatcher,
};
