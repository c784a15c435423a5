use chrono::{DateTime, Utc};
use serde::Serialize;

use prep_core::model::{QuestionUid, ResolvedOption, Score};
use prep_core::{AnswerState, CompletionReason, Phase, Session};

/// Something the view should tell the learner outside the question itself.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum Notice {
    /// A default question set is being fetched.
    Loading,
    /// The default question set came back empty.
    NoQuestions,
    /// The default question set could not be fetched.
    FetchFailed(String),
    /// A command was not allowed in the current state.
    Rejected(String),
}

/// Display-ready view of the current question.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QuestionView {
    pub uid: QuestionUid,
    pub header: String,
    pub reference: String,
    pub stem: String,
    pub options: Vec<ResolvedOption>,
    /// Present once the learner has picked or committed an answer.
    pub rationale: Option<String>,
}

/// Everything a view needs to render a session, captured at one instant.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionSnapshot {
    pub phase: Phase,
    pub generation: u64,
    /// 1-based position of the current question; 0 without questions.
    pub position: usize,
    pub total: usize,
    pub progress: f64,
    pub remaining_seconds: u32,
    pub remaining: String,
    pub question: Option<QuestionView>,
    pub answer: AnswerState,
    pub answered: usize,
    pub can_commit: bool,
    pub can_retreat: bool,
    pub commit_label: &'static str,
    pub score: Option<Score>,
    pub completion_reason: Option<CompletionReason>,
    pub elapsed_seconds: Option<i64>,
    pub notice: Option<Notice>,
    /// Commands the runner has handled so far; a repeated notice after a new
    /// command is a new notice.
    pub commands_handled: u64,
}

impl SessionSnapshot {
    #[must_use]
    pub fn capture(session: &Session, now: DateTime<Utc>, notice: Option<Notice>) -> Self {
        let question = session.current_question().map(|q| QuestionView {
            uid: q.uid.clone(),
            header: q.header_line(),
            reference: q.reference_line(),
            stem: q.stem.clone(),
            options: session.current_options(),
            rationale: session.show_rationale().then(|| q.rationale.clone()),
        });
        let complete = session.phase() == Phase::Complete;

        Self {
            phase: session.phase(),
            generation: session.generation(),
            position: if question.is_some() {
                session.current_index() + 1
            } else {
                0
            },
            total: session.total_questions(),
            progress: session.progress(),
            remaining_seconds: session.remaining_seconds(),
            remaining: session.formatted_remaining(),
            question,
            answer: session.answer_state(),
            answered: session.answered_count(),
            can_commit: session.can_commit(),
            can_retreat: session.can_retreat(),
            commit_label: session.commit_label(),
            score: complete.then(|| session.score()),
            completion_reason: session.completion_reason(),
            elapsed_seconds: session.elapsed(now).map(|d| d.num_seconds()),
            notice,
            commands_handled: 0,
        }
    }

    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.phase == Phase::Complete
    }
}
