use std::sync::Arc;

use prep_core::model::Question;
use prep_core::{FetchOutcome, Session};

use crate::Clock;
use crate::error::AssessmentError;
use crate::question_bank::{ItemQuery, QuestionBank};

/// Number of questions requested for a default run.
pub const DEFAULT_PAGE_SIZE: u32 = 20;

/// Starts assessment runs against a question bank.
#[derive(Clone)]
pub struct AssessmentService {
    clock: Clock,
    bank: Arc<dyn QuestionBank>,
    page_size: u32,
}

impl AssessmentService {
    #[must_use]
    pub fn new(clock: Clock, bank: Arc<dyn QuestionBank>) -> Self {
        Self {
            clock,
            bank,
            page_size: DEFAULT_PAGE_SIZE,
        }
    }

    #[must_use]
    pub fn with_page_size(mut self, page_size: u32) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    #[must_use]
    pub fn clock(&self) -> Clock {
        self.clock
    }

    #[must_use]
    pub fn page_size(&self) -> u32 {
        self.page_size
    }

    /// Fetch the default question set: one page of `page_size` items.
    ///
    /// Pagination cursors are ignored.
    ///
    /// # Errors
    ///
    /// Returns `AssessmentError::QuestionBank` if the request fails.
    pub async fn fetch_default(&self) -> Result<Vec<Question>, AssessmentError> {
        let query = ItemQuery::with_limit(self.page_size);
        tracing::info!(limit = self.page_size, "fetching default question set");

        let page = self.bank.list_items(&query).await.map_err(|err| {
            tracing::warn!(error = %err, "default question set request failed");
            err
        })?;

        tracing::debug!(
            received = page.results.len(),
            available = page.count,
            "default question set received"
        );
        Ok(page.results)
    }

    /// Fetch a default set and start `session` on it, in one step.
    ///
    /// # Errors
    ///
    /// Returns `AssessmentError::QuestionBank` when the fetch fails and
    /// `SessionError::Empty` (wrapped) when it returns no items. The session
    /// stays in `Intro` in both cases.
    pub async fn start_default(&self, session: &mut Session) -> Result<FetchOutcome, AssessmentError> {
        let ticket = session.begin_default_fetch()?;
        let items = self.fetch_default().await?;
        let outcome = session.apply_fetched(ticket, items, self.clock.now())?;
        if outcome == FetchOutcome::Started {
            tracing::info!(questions = session.total_questions(), "assessment run started");
        }
        Ok(outcome)
    }

    /// Start `session` on items picked elsewhere.
    ///
    /// # Errors
    ///
    /// Returns the wrapped `SessionError` when `items` is empty or repeats a uid.
    pub fn start_preselected(
        &self,
        session: &mut Session,
        items: Vec<Question>,
    ) -> Result<(), AssessmentError> {
        session.start_preselected(items, self.clock.now())?;
        tracing::info!(
            questions = session.total_questions(),
            "assessment run started with selected items"
        );
        Ok(())
    }
}
