mod runner;
mod service;
mod snapshot;

// Public API of the assessment subsystem.
pub use crate::error::AssessmentError;
pub use runner::{AssessmentHandle, AssessmentRunner, Command};
pub use service::{AssessmentService, DEFAULT_PAGE_SIZE};
pub use snapshot::{Notice, QuestionView, SessionSnapshot};
