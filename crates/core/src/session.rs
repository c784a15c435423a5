use std::collections::{HashMap, HashSet};
use std::fmt;

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use thiserror::Error;

use crate::model::{Question, QuestionUid, ResolvedOption, Score, resolve_options};
use crate::time::{SESSION_DURATION_SECS, format_countdown};

//
// ─── ERRORS ───────────────────────────────────────────────────────────────────
//

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum SessionError {
    #[error("no questions available for session")]
    Empty,

    #[error("session is not in progress")]
    NotInProgress,

    #[error("session already completed")]
    Completed,

    #[error("a run is already in progress")]
    RunActive,

    #[error("nothing selected or recorded for the current question")]
    NothingToCommit,

    #[error("option {0} is not available for the current question")]
    UnknownOption(char),

    #[error("already at the first question")]
    AtFirstQuestion,

    #[error("question {0} appears more than once in the set")]
    DuplicateUid(QuestionUid),
}

//
// ─── PHASES AND OUTCOMES ──────────────────────────────────────────────────────
//

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Phase {
    Intro,
    InProgress,
    Complete,
}

/// How a run reached `Complete`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum CompletionReason {
    /// The learner committed the last question.
    Finished,
    /// The countdown reached zero.
    TimeExpired,
}

/// Proof that a default-set fetch was requested at a given generation.
///
/// Results applied with an outdated ticket are discarded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FetchTicket {
    generation: u64,
}

impl FetchTicket {
    #[must_use]
    pub fn generation(&self) -> u64 {
        self.generation
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchOutcome {
    Started,
    Discarded,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommitOutcome {
    Advanced { index: usize },
    Finished,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// The session isn't running; nothing changed.
    Ignored,
    Ticked { remaining: u32 },
    /// The clock hit zero and the run was completed.
    Expired,
}

/// Answer state of the current question: pending selection vs. committed answer.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct AnswerState {
    pub selected: Option<char>,
    pub committed: Option<String>,
}

//
// ─── SESSION ──────────────────────────────────────────────────────────────────
//

/// One timed run through a fixed, ordered list of questions.
///
/// `Intro → InProgress → Complete`. The session holds no timer of its own: the
/// owner calls [`Session::tick`] once per second while the phase is `InProgress`.
/// Timestamps are passed in so callers control time.
pub struct Session {
    items: Vec<Question>,
    current_index: usize,
    answers: HashMap<QuestionUid, String>,
    selected: Option<char>,
    remaining_seconds: u32,
    phase: Phase,
    generation: u64,
    started_at: Option<DateTime<Utc>>,
    completed_at: Option<DateTime<Utc>>,
    completion_reason: Option<CompletionReason>,
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

impl Session {
    /// A fresh session waiting in `Intro`.
    #[must_use]
    pub fn new() -> Self {
        Self {
            items: Vec::new(),
            current_index: 0,
            answers: HashMap::new(),
            selected: None,
            remaining_seconds: SESSION_DURATION_SECS,
            phase: Phase::Intro,
            generation: 0,
            started_at: None,
            completed_at: None,
            completion_reason: None,
        }
    }

    /// Enters `InProgress` right away when `items` is a usable set, otherwise
    /// stays in `Intro`.
    #[must_use]
    pub fn with_preselected(items: Vec<Question>, now: DateTime<Utc>) -> Self {
        let mut session = Self::new();
        if check_items(&items).is_ok() {
            session.begin_run(items, now);
        }
        session
    }

    // ─── transitions ────────────────────────────────────────────────────────

    /// Request a default question set. A completed session goes back to `Intro`.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::RunActive` while a run is in progress.
    pub fn begin_default_fetch(&mut self) -> Result<FetchTicket, SessionError> {
        match self.phase {
            Phase::InProgress => return Err(SessionError::RunActive),
            Phase::Complete => self.reset(),
            Phase::Intro => {}
        }
        self.generation += 1;
        Ok(FetchTicket {
            generation: self.generation,
        })
    }

    /// Install the result of a default-set fetch.
    ///
    /// Results for an outdated ticket, or arriving after the session left `Intro`,
    /// are discarded without touching state.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::Empty` if the fetch produced no questions, or
    /// `SessionError::DuplicateUid` if two of them share a uid; the session
    /// stays in `Intro`.
    pub fn apply_fetched(
        &mut self,
        ticket: FetchTicket,
        items: Vec<Question>,
        now: DateTime<Utc>,
    ) -> Result<FetchOutcome, SessionError> {
        if !self.is_current(ticket) {
            return Ok(FetchOutcome::Discarded);
        }
        check_items(&items)?;
        self.begin_run(items, now);
        Ok(FetchOutcome::Started)
    }

    /// True while results for `ticket` would still be applied.
    #[must_use]
    pub fn is_current(&self, ticket: FetchTicket) -> bool {
        ticket.generation == self.generation && self.phase == Phase::Intro
    }

    /// Start a run over items chosen elsewhere. Replaces any current run.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::Empty` if `items` is empty, or
    /// `SessionError::DuplicateUid` if two items share a uid; state is left untouched.
    pub fn start_preselected(
        &mut self,
        items: Vec<Question>,
        now: DateTime<Utc>,
    ) -> Result<(), SessionError> {
        check_items(&items)?;
        self.begin_run(items, now);
        Ok(())
    }

    /// Drop the current run and return to `Intro`.
    pub fn reset(&mut self) {
        let generation = self.generation + 1;
        *self = Self::new();
        self.generation = generation;
    }

    /// Pick an option on the current question without committing it.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::UnknownOption` if the label isn't one of the
    /// current question's options, or a phase error outside `InProgress`.
    pub fn select(&mut self, label: char) -> Result<(), SessionError> {
        self.ensure_in_progress()?;
        let label = label.to_ascii_uppercase();
        let current = self.current_question().ok_or(SessionError::Empty)?;
        if !resolve_options(current).iter().any(|o| o.label == label) {
            return Err(SessionError::UnknownOption(label));
        }
        self.selected = Some(label);
        Ok(())
    }

    /// Commit the current question and move forward, finishing on the last one.
    ///
    /// A pending selection overwrites the recorded answer; without one the
    /// previously recorded answer is kept as is. A selection carried over from
    /// another question that this one has no option for is dropped.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::NothingToCommit` when there is neither a selection
    /// nor a recorded answer, or a phase error outside `InProgress`.
    pub fn commit(&mut self, now: DateTime<Utc>) -> Result<CommitOutcome, SessionError> {
        self.ensure_in_progress()?;
        if !self.can_commit() {
            return Err(SessionError::NothingToCommit);
        }
        let uid = self
            .current_question()
            .map(|q| q.uid.clone())
            .ok_or(SessionError::Empty)?;

        let pending = self.pending_selection();
        self.selected = None;
        if let Some(selected) = pending {
            self.answers.insert(uid, selected.to_string());
        }

        if self.current_index + 1 < self.items.len() {
            self.current_index += 1;
            Ok(CommitOutcome::Advanced {
                index: self.current_index,
            })
        } else {
            self.complete(CompletionReason::Finished, now);
            Ok(CommitOutcome::Finished)
        }
    }

    /// Step back one question. Answers and the pending selection are untouched.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::AtFirstQuestion` on the first question, or a phase
    /// error outside `InProgress`.
    pub fn retreat(&mut self) -> Result<usize, SessionError> {
        self.ensure_in_progress()?;
        if self.current_index == 0 {
            return Err(SessionError::AtFirstQuestion);
        }
        self.current_index -= 1;
        Ok(self.current_index)
    }

    /// Advance the countdown by one second.
    ///
    /// Reaching zero completes the run regardless of unanswered questions or a
    /// pending selection.
    pub fn tick(&mut self, now: DateTime<Utc>) -> TickOutcome {
        if self.phase != Phase::InProgress {
            return TickOutcome::Ignored;
        }
        self.remaining_seconds = self.remaining_seconds.saturating_sub(1);
        if self.remaining_seconds == 0 {
            self.complete(CompletionReason::TimeExpired, now);
            return TickOutcome::Expired;
        }
        TickOutcome::Ticked {
            remaining: self.remaining_seconds,
        }
    }

    fn begin_run(&mut self, items: Vec<Question>, now: DateTime<Utc>) {
        self.items = items;
        self.current_index = 0;
        self.answers.clear();
        self.selected = None;
        self.remaining_seconds = SESSION_DURATION_SECS;
        self.phase = Phase::InProgress;
        self.generation += 1;
        self.started_at = Some(now);
        self.completed_at = None;
        self.completion_reason = None;
    }

    fn complete(&mut self, reason: CompletionReason, now: DateTime<Utc>) {
        self.phase = Phase::Complete;
        self.selected = None;
        self.completed_at = Some(now);
        self.completion_reason = Some(reason);
    }

    // The selection only counts if the current question offers that label.
    fn pending_selection(&self) -> Option<char> {
        let selected = self.selected?;
        let current = self.current_question()?;
        resolve_options(current)
            .iter()
            .any(|o| o.label == selected)
            .then_some(selected)
    }

    fn ensure_in_progress(&self) -> Result<(), SessionError> {
        match self.phase {
            Phase::InProgress => Ok(()),
            Phase::Complete => Err(SessionError::Completed),
            Phase::Intro => Err(SessionError::NotInProgress),
        }
    }

    // ─── derived state ──────────────────────────────────────────────────────

    #[must_use]
    pub fn phase(&self) -> Phase {
        self.phase
    }

    #[must_use]
    pub fn generation(&self) -> u64 {
        self.generation
    }

    #[must_use]
    pub fn items(&self) -> &[Question] {
        &self.items
    }

    #[must_use]
    pub fn total_questions(&self) -> usize {
        self.items.len()
    }

    #[must_use]
    pub fn current_index(&self) -> usize {
        self.current_index
    }

    #[must_use]
    pub fn current_question(&self) -> Option<&Question> {
        self.items.get(self.current_index)
    }

    /// Resolved choices of the current question; empty when there is none.
    #[must_use]
    pub fn current_options(&self) -> Vec<ResolvedOption> {
        self.current_question()
            .map(resolve_options)
            .unwrap_or_default()
    }

    #[must_use]
    pub fn selected(&self) -> Option<char> {
        self.selected
    }

    #[must_use]
    pub fn answers(&self) -> &HashMap<QuestionUid, String> {
        &self.answers
    }

    #[must_use]
    pub fn answer_for(&self, uid: &QuestionUid) -> Option<&str> {
        self.answers.get(uid).map(String::as_str)
    }

    #[must_use]
    pub fn answered_count(&self) -> usize {
        self.answers.values().filter(|a| !a.is_empty()).count()
    }

    #[must_use]
    pub fn answer_state(&self) -> AnswerState {
        let committed = self
            .current_question()
            .and_then(|q| self.answer_for(&q.uid))
            .filter(|a| !a.is_empty())
            .map(str::to_owned);
        AnswerState {
            selected: self.pending_selection(),
            committed,
        }
    }

    #[must_use]
    pub fn can_commit(&self) -> bool {
        if self.phase != Phase::InProgress {
            return false;
        }
        let Some(current) = self.current_question() else {
            return false;
        };
        self.pending_selection().is_some()
            || self.answer_for(&current.uid).is_some_and(|a| !a.is_empty())
    }

    #[must_use]
    pub fn can_retreat(&self) -> bool {
        self.phase == Phase::InProgress && self.current_index > 0
    }

    #[must_use]
    pub fn is_last_question(&self) -> bool {
        !self.items.is_empty() && self.current_index + 1 == self.items.len()
    }

    /// Label for the commit action: `Finish` on the last question, `Next` otherwise.
    #[must_use]
    pub fn commit_label(&self) -> &'static str {
        if self.is_last_question() { "Finish" } else { "Next" }
    }

    /// The rationale is revealed once the learner has picked or committed an answer.
    #[must_use]
    pub fn show_rationale(&self) -> bool {
        let Some(current) = self.current_question() else {
            return false;
        };
        let state = self.answer_state();
        !current.rationale.is_empty() && (state.selected.is_some() || state.committed.is_some())
    }

    /// Position through the run as a percentage; `0.0` without items.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn progress(&self) -> f64 {
        if self.items.is_empty() {
            return 0.0;
        }
        (self.current_index + 1) as f64 / self.items.len() as f64 * 100.0
    }

    #[must_use]
    pub fn remaining_seconds(&self) -> u32 {
        self.remaining_seconds
    }

    #[must_use]
    pub fn formatted_remaining(&self) -> String {
        format_countdown(self.remaining_seconds)
    }

    #[must_use]
    pub fn score(&self) -> Score {
        Score::compute(&self.items, &self.answers)
    }

    #[must_use]
    pub fn started_at(&self) -> Option<DateTime<Utc>> {
        self.started_at
    }

    #[must_use]
    pub fn completed_at(&self) -> Option<DateTime<Utc>> {
        self.completed_at
    }

    #[must_use]
    pub fn completion_reason(&self) -> Option<CompletionReason> {
        self.completion_reason
    }

    /// Wall-clock time spent in the run, up to completion or `now`.
    #[must_use]
    pub fn elapsed(&self, now: DateTime<Utc>) -> Option<Duration> {
        self.started_at
            .map(|started| self.completed_at.unwrap_or(now) - started)
    }
}

/// A run needs at least one question, and answers are keyed by uid.
fn check_items(items: &[Question]) -> Result<(), SessionError> {
    if items.is_empty() {
        return Err(SessionError::Empty);
    }
    let mut seen = HashSet::with_capacity(items.len());
    for item in items {
        if !seen.insert(&item.uid) {
            return Err(SessionError::DuplicateUid(item.uid.clone()));
        }
    }
    Ok(())
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("phase", &self.phase)
            .field("items_len", &self.items.len())
            .field("current_index", &self.current_index)
            .field("answers_len", &self.answers.len())
            .field("selected", &self.selected)
            .field("remaining_seconds", &self.remaining_seconds)
            .field("generation", &self.generation)
            .finish_non_exhaustive()
    }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//

#[cfg(test)]
mod tests {
    use super::*;
    use crate::time::{fixed_clock, fixed_now};

    fn question(uid: &str, keys: &[&str]) -> Question {
        Question::new(QuestionUid::new(uid), format!("<p>{uid}</p>"))
            .with_flat_options(["a", "b", "c", "d"])
            .with_correct_answers(keys.iter().copied())
    }

    fn three_questions() -> Vec<Question> {
        vec![
            question("q1", &["B"]),
            question("q2", &["A", "C"]),
            question("q3", &["D"]),
        ]
    }

    #[test]
    fn new_session_waits_in_intro() {
        let session = Session::new();
        assert_eq!(session.phase(), Phase::Intro);
        assert!(session.current_question().is_none());
        assert!(session.current_options().is_empty());
        assert_eq!(session.progress(), 0.0);
        assert_eq!(session.score().total, 1);
        assert_eq!(session.score().percentage, 0);
    }

    #[test]
    fn preselected_items_start_immediately() {
        let session = Session::with_preselected(three_questions(), fixed_now());
        assert_eq!(session.phase(), Phase::InProgress);
        assert_eq!(session.current_index(), 0);
        assert_eq!(session.remaining_seconds(), SESSION_DURATION_SECS);
        assert_eq!(session.formatted_remaining(), "30:00");
        assert_eq!(session.started_at(), Some(fixed_now()));

        let empty = Session::with_preselected(Vec::new(), fixed_now());
        assert_eq!(empty.phase(), Phase::Intro);
    }

    #[test]
    fn default_fetch_installs_items() {
        let mut session = Session::new();
        let ticket = session.begin_default_fetch().unwrap();
        let outcome = session
            .apply_fetched(ticket, three_questions(), fixed_now())
            .unwrap();

        assert_eq!(outcome, FetchOutcome::Started);
        assert_eq!(session.phase(), Phase::InProgress);
        assert_eq!(session.total_questions(), 3);
    }

    #[test]
    fn empty_fetch_keeps_intro() {
        let mut session = Session::new();
        let ticket = session.begin_default_fetch().unwrap();
        let err = session
            .apply_fetched(ticket, Vec::new(), fixed_now())
            .unwrap_err();

        assert_eq!(err, SessionError::Empty);
        assert_eq!(session.phase(), Phase::Intro);
        assert!(session.current_question().is_none());
    }

    #[test]
    fn fetch_landing_after_preselected_start_is_discarded() {
        let mut session = Session::new();
        let ticket = session.begin_default_fetch().unwrap();
        session
            .start_preselected(vec![question("picked", &["A"])], fixed_now())
            .unwrap();

        let outcome = session
            .apply_fetched(ticket, three_questions(), fixed_now())
            .unwrap();
        assert_eq!(outcome, FetchOutcome::Discarded);
        assert_eq!(session.total_questions(), 1);
        assert_eq!(session.current_question().unwrap().uid.as_str(), "picked");
    }

    #[test]
    fn superseded_fetch_ticket_is_discarded() {
        let mut session = Session::new();
        let first = session.begin_default_fetch().unwrap();
        let second = session.begin_default_fetch().unwrap();

        let outcome = session
            .apply_fetched(first, three_questions(), fixed_now())
            .unwrap();
        assert_eq!(outcome, FetchOutcome::Discarded);
        assert_eq!(session.phase(), Phase::Intro);

        let outcome = session
            .apply_fetched(second, three_questions(), fixed_now())
            .unwrap();
        assert_eq!(outcome, FetchOutcome::Started);
    }

    #[test]
    fn default_fetch_rejected_while_running() {
        let mut session = Session::with_preselected(three_questions(), fixed_now());
        assert_eq!(
            session.begin_default_fetch().unwrap_err(),
            SessionError::RunActive
        );
    }

    #[test]
    fn commit_requires_selection_or_prior_answer() {
        let mut session = Session::with_preselected(three_questions(), fixed_now());
        assert!(!session.can_commit());
        assert_eq!(
            session.commit(fixed_now()).unwrap_err(),
            SessionError::NothingToCommit
        );

        session.select('b').unwrap();
        assert_eq!(session.selected(), Some('B'));
        assert!(session.can_commit());
        assert_eq!(
            session.commit(fixed_now()).unwrap(),
            CommitOutcome::Advanced { index: 1 }
        );
        assert_eq!(session.selected(), None);
        assert_eq!(session.answer_for(&QuestionUid::new("q1")), Some("B"));
    }

    #[test]
    fn select_rejects_labels_outside_options() {
        let mut session = Session::with_preselected(three_questions(), fixed_now());
        assert_eq!(
            session.select('E').unwrap_err(),
            SessionError::UnknownOption('E')
        );
        assert_eq!(session.selected(), None);
    }

    #[test]
    fn revisiting_without_reselecting_keeps_answer() {
        let mut session = Session::with_preselected(three_questions(), fixed_now());
        session.select('B').unwrap();
        session.commit(fixed_now()).unwrap();

        assert_eq!(session.retreat().unwrap(), 0);
        assert!(session.can_commit());
        assert_eq!(
            session.answer_state(),
            AnswerState {
                selected: None,
                committed: Some("B".into())
            }
        );

        session.commit(fixed_now()).unwrap();
        assert_eq!(session.answer_for(&QuestionUid::new("q1")), Some("B"));
        assert_eq!(session.answers().len(), 1);
    }

    #[test]
    fn reanswering_overwrites_instead_of_duplicating() {
        let mut session = Session::with_preselected(three_questions(), fixed_now());
        session.select('A').unwrap();
        session.commit(fixed_now()).unwrap();
        session.retreat().unwrap();
        session.select('B').unwrap();
        session.commit(fixed_now()).unwrap();

        assert_eq!(session.answers().len(), 1);
        assert_eq!(session.answer_for(&QuestionUid::new("q1")), Some("B"));
    }

    #[test]
    fn retreat_is_clamped_and_keeps_selection() {
        let mut session = Session::with_preselected(three_questions(), fixed_now());
        assert!(!session.can_retreat());
        assert_eq!(session.retreat().unwrap_err(), SessionError::AtFirstQuestion);

        session.select('A').unwrap();
        session.commit(fixed_now()).unwrap();
        session.select('C').unwrap();
        session.retreat().unwrap();

        assert_eq!(session.current_index(), 0);
        assert_eq!(session.selected(), Some('C'));
        assert_eq!(session.answers().len(), 1);
    }

    #[test]
    fn selection_carried_back_is_checked_against_earlier_options() {
        let two_choice = Question::new(QuestionUid::new("q1"), "<p>q1</p>")
            .with_flat_options(["yes", "no"])
            .with_correct_answers(["A"]);
        let five_choice = Question::new(QuestionUid::new("q2"), "<p>q2</p>")
            .with_flat_options(["a", "b", "c", "d", "e"])
            .with_correct_answers(["E"]);
        let mut session = Session::with_preselected(vec![two_choice, five_choice], fixed_now());

        session.select('A').unwrap();
        session.commit(fixed_now()).unwrap();
        session.select('E').unwrap();
        session.retreat().unwrap();

        assert_eq!(session.answer_state().selected, None);
        assert!(session.can_commit());
        session.commit(fixed_now()).unwrap();
        assert_eq!(session.answer_for(&QuestionUid::new("q1")), Some("A"));
        assert_eq!(session.selected(), None);
    }

    #[test]
    fn duplicate_uids_are_rejected() {
        let items = || vec![question("dup", &["A"]), question("dup", &["A"])];

        let mut session = Session::new();
        assert_eq!(
            session.start_preselected(items(), fixed_now()),
            Err(SessionError::DuplicateUid(QuestionUid::new("dup")))
        );
        assert_eq!(session.phase(), Phase::Intro);

        let ticket = session.begin_default_fetch().unwrap();
        assert_eq!(
            session.apply_fetched(ticket, items(), fixed_now()),
            Err(SessionError::DuplicateUid(QuestionUid::new("dup")))
        );
        assert_eq!(session.phase(), Phase::Intro);

        let preselected = Session::with_preselected(items(), fixed_now());
        assert_eq!(preselected.phase(), Phase::Intro);
        assert!(preselected.items().is_empty());
    }

    #[test]
    fn committing_last_question_finishes() {
        let mut session = Session::with_preselected(three_questions(), fixed_now());
        for (i, label) in ['B', 'D', 'D'].into_iter().enumerate() {
            assert_eq!(session.current_index(), i);
            session.select(label).unwrap();
            if i == 2 {
                assert!(session.is_last_question());
                assert_eq!(session.commit_label(), "Finish");
            } else {
                assert_eq!(session.commit_label(), "Next");
            }
            session.commit(fixed_now()).unwrap();
        }

        assert_eq!(session.phase(), Phase::Complete);
        assert_eq!(session.current_index(), 2);
        assert_eq!(
            session.completion_reason(),
            Some(CompletionReason::Finished)
        );
        let score = session.score();
        assert_eq!((score.correct, score.total, score.percentage), (2, 3, 67));
    }

    #[test]
    fn countdown_expiry_completes_the_run() {
        let mut session = Session::with_preselected(three_questions(), fixed_now());
        session.select('B').unwrap();

        let mut last = session.remaining_seconds();
        for _ in 0..SESSION_DURATION_SECS - 1 {
            let outcome = session.tick(fixed_now());
            assert!(matches!(outcome, TickOutcome::Ticked { .. }));
            assert!(session.remaining_seconds() < last);
            last = session.remaining_seconds();
        }
        assert_eq!(session.remaining_seconds(), 1);
        assert_eq!(session.phase(), Phase::InProgress);

        assert_eq!(session.tick(fixed_now()), TickOutcome::Expired);
        assert_eq!(session.remaining_seconds(), 0);
        assert_eq!(session.phase(), Phase::Complete);
        assert_eq!(
            session.completion_reason(),
            Some(CompletionReason::TimeExpired)
        );
        assert_eq!(session.selected(), None);
        assert!(session.answers().is_empty());

        assert_eq!(session.tick(fixed_now()), TickOutcome::Ignored);
        assert_eq!(session.remaining_seconds(), 0);
    }

    #[test]
    fn completed_session_rejects_further_answers() {
        let mut session = Session::with_preselected(vec![question("q1", &["A"])], fixed_now());
        session.select('A').unwrap();
        session.commit(fixed_now()).unwrap();

        assert_eq!(session.select('B').unwrap_err(), SessionError::Completed);
        assert_eq!(session.commit(fixed_now()).unwrap_err(), SessionError::Completed);
        assert_eq!(session.retreat().unwrap_err(), SessionError::Completed);
        assert!(!session.can_commit());
        assert_eq!(session.answer_for(&QuestionUid::new("q1")), Some("A"));
    }

    #[test]
    fn ticks_outside_progress_are_ignored() {
        let mut session = Session::new();
        assert_eq!(session.tick(fixed_now()), TickOutcome::Ignored);
        assert_eq!(session.remaining_seconds(), SESSION_DURATION_SECS);
    }

    #[test]
    fn progress_tracks_position() {
        let mut session = Session::with_preselected(
            vec![
                question("q1", &["A"]),
                question("q2", &["A"]),
                question("q3", &["A"]),
                question("q4", &["A"]),
            ],
            fixed_now(),
        );
        assert!((session.progress() - 25.0).abs() < f64::EPSILON);
        session.select('A').unwrap();
        session.commit(fixed_now()).unwrap();
        assert!((session.progress() - 50.0).abs() < f64::EPSILON);
    }

    #[test]
    fn rationale_shows_after_picking() {
        let mut session = Session::with_preselected(
            vec![question("q1", &["A"]).with_rationale("<p>because</p>"), question("q2", &["A"])],
            fixed_now(),
        );
        assert!(!session.show_rationale());
        session.select('A').unwrap();
        assert!(session.show_rationale());
        session.commit(fixed_now()).unwrap();
        assert!(!session.show_rationale());
        session.retreat().unwrap();
        assert!(session.show_rationale());
    }

    #[test]
    fn new_run_after_completion_resets_state() {
        let mut session = Session::with_preselected(vec![question("q1", &["A"])], fixed_now());
        session.select('A').unwrap();
        session.commit(fixed_now()).unwrap();
        let generation = session.generation();

        let ticket = session.begin_default_fetch().unwrap();
        assert_eq!(session.phase(), Phase::Intro);
        assert!(session.answers().is_empty());
        assert!(ticket.generation() > generation);

        session
            .apply_fetched(ticket, three_questions(), fixed_now())
            .unwrap();
        assert_eq!(session.remaining_seconds(), SESSION_DURATION_SECS);
        assert_eq!(session.current_index(), 0);
    }

    #[test]
    fn elapsed_stops_at_completion() {
        let mut clock = fixed_clock();
        let mut session = Session::with_preselected(vec![question("q1", &["A"])], clock.now());
        clock.advance(Duration::seconds(10));
        assert_eq!(session.elapsed(clock.now()), Some(Duration::seconds(10)));

        clock.advance(Duration::seconds(32));
        session.select('A').unwrap();
        session.commit(clock.now()).unwrap();
        clock.advance(Duration::seconds(458));
        assert_eq!(session.elapsed(clock.now()), Some(Duration::seconds(42)));
    }
}
