#![forbid(unsafe_code)]

pub mod error;
pub mod model;
pub mod session;
pub mod time;

pub use error::Error;
pub use session::{
    AnswerState, CommitOutcome, CompletionReason, FetchOutcome, FetchTicket, Phase, Session,
    SessionError, TickOutcome,
};
pub use time::Clock;
