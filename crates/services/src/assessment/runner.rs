use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;

use prep_core::model::Question;
use prep_core::{FetchOutcome, FetchTicket, Phase, Session, SessionError, TickOutcome};

use super::service::AssessmentService;
use super::snapshot::{Notice, SessionSnapshot};
use crate::countdown::{Countdown, TICK_PERIOD, Tick};
use crate::error::AssessmentError;

const CHANNEL_CAPACITY: usize = 32;

/// Commands a view can issue against a running session.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    /// Fetch a default question set and start on it.
    StartDefault,
    /// Start on questions picked elsewhere.
    StartPreselected(Vec<Question>),
    Select(char),
    Commit,
    Retreat,
    /// Abandon the current run and go back to the intro.
    Reset,
}

struct Fetched {
    ticket: FetchTicket,
    result: Result<Vec<Question>, AssessmentError>,
}

/// Single owner of a [`Session`] and its countdown.
///
/// Commands, ticks and fetch results are handled one at a time on one task;
/// views observe the session through [`SessionSnapshot`]s.
pub struct AssessmentRunner {
    service: Arc<AssessmentService>,
    session: Session,
    countdown: Option<Countdown>,
    tick_period: Duration,
    ticks_tx: mpsc::Sender<Tick>,
    ticks_rx: mpsc::Receiver<Tick>,
    fetched_tx: mpsc::Sender<Fetched>,
    fetched_rx: mpsc::Receiver<Fetched>,
    snapshots: watch::Sender<SessionSnapshot>,
    notice: Option<Notice>,
    commands_handled: u64,
}

impl AssessmentRunner {
    #[must_use]
    pub fn new(service: Arc<AssessmentService>) -> Self {
        let (ticks_tx, ticks_rx) = mpsc::channel(CHANNEL_CAPACITY);
        let (fetched_tx, fetched_rx) = mpsc::channel(CHANNEL_CAPACITY);
        let session = Session::new();
        let initial = SessionSnapshot::capture(&session, service.clock().now(), None);
        let (snapshots, _) = watch::channel(initial);
        Self {
            service,
            session,
            countdown: None,
            tick_period: TICK_PERIOD,
            ticks_tx,
            ticks_rx,
            fetched_tx,
            fetched_rx,
            snapshots,
            notice: None,
            commands_handled: 0,
        }
    }

    /// Enter the run immediately with these items (when non-empty).
    ///
    /// An unusable set leaves the session in the intro with a notice.
    #[must_use]
    pub fn with_preselected(mut self, items: Vec<Question>) -> Self {
        if items.is_empty() {
            return self;
        }
        if let Err(err) = self.service.start_preselected(&mut self.session, items) {
            tracing::warn!(error = %err, "preselected questions rejected");
            self.notice = Some(Notice::Rejected(err.to_string()));
        }
        self
    }

    #[must_use]
    pub fn with_tick_period(mut self, period: Duration) -> Self {
        self.tick_period = period;
        self
    }

    /// Spawn the runner task. Must be called from within a tokio runtime.
    #[must_use]
    pub fn spawn(mut self) -> AssessmentHandle {
        let (commands_tx, commands_rx) = mpsc::channel(CHANNEL_CAPACITY);
        self.sync_countdown();
        self.publish();
        let snapshots = self.snapshots.subscribe();
        let task = tokio::spawn(self.run(commands_rx));
        AssessmentHandle {
            commands: commands_tx,
            snapshots,
            task,
        }
    }

    async fn run(mut self, mut commands: mpsc::Receiver<Command>) {
        loop {
            tokio::select! {
                command = commands.recv() => match command {
                    Some(command) => self.handle_command(command),
                    None => break,
                },
                Some(tick) = self.ticks_rx.recv() => self.handle_tick(tick),
                Some(fetched) = self.fetched_rx.recv() => self.handle_fetched(fetched),
            }
            self.sync_countdown();
            self.publish();
        }
        self.countdown = None;
        tracing::debug!("assessment runner stopped");
    }

    fn handle_command(&mut self, command: Command) {
        self.commands_handled += 1;
        let now = self.service.clock().now();
        let starting_default = matches!(command, Command::StartDefault);
        let result = match command {
            Command::StartDefault => self.start_default(),
            Command::StartPreselected(items) => {
                self.service.start_preselected(&mut self.session, items)
            }
            Command::Select(label) => self.session.select(label).map_err(Into::into),
            Command::Commit => self
                .session
                .commit(now)
                .map(|_| self.log_if_complete())
                .map_err(Into::into),
            Command::Retreat => self.session.retreat().map(|_| ()).map_err(Into::into),
            Command::Reset => {
                self.session.reset();
                Ok(())
            }
        };

        match result {
            Ok(()) if starting_default => self.notice = Some(Notice::Loading),
            Ok(()) => self.notice = None,
            Err(err) => {
                tracing::debug!(error = %err, "command rejected");
                self.notice = Some(Notice::Rejected(err.to_string()));
            }
        }
    }

    fn start_default(&mut self) -> Result<(), AssessmentError> {
        let ticket = self.session.begin_default_fetch()?;
        let service = Arc::clone(&self.service);
        let fetched = self.fetched_tx.clone();
        tokio::spawn(async move {
            let result = service.fetch_default().await;
            // The runner may be gone by now; nothing left to notify.
            let _ = fetched.send(Fetched { ticket, result }).await;
        });
        Ok(())
    }

    fn handle_fetched(&mut self, fetched: Fetched) {
        let Fetched { ticket, result } = fetched;
        if !self.session.is_current(ticket) {
            tracing::debug!(
                generation = ticket.generation(),
                "discarding question set for a superseded request"
            );
            return;
        }

        let now = self.service.clock().now();
        self.notice = match result {
            Ok(items) => match self.session.apply_fetched(ticket, items, now) {
                Ok(FetchOutcome::Started) => {
                    tracing::info!(
                        questions = self.session.total_questions(),
                        "assessment run started"
                    );
                    None
                }
                Ok(FetchOutcome::Discarded) => None,
                Err(SessionError::Empty) => {
                    tracing::warn!("default question set was empty");
                    Some(Notice::NoQuestions)
                }
                Err(err) => Some(Notice::Rejected(err.to_string())),
            },
            Err(err) => Some(Notice::FetchFailed(err.to_string())),
        };
    }

    fn handle_tick(&mut self, tick: Tick) {
        if tick.generation != self.session.generation() {
            return;
        }
        if self.session.tick(self.service.clock().now()) == TickOutcome::Expired {
            tracing::info!("time expired, assessment run complete");
            self.log_if_complete();
        }
    }

    fn log_if_complete(&self) {
        if self.session.phase() == Phase::Complete {
            let score = self.session.score();
            tracing::info!(
                correct = score.correct,
                total = score.total,
                percentage = score.percentage,
                reason = ?self.session.completion_reason(),
                "assessment run finished"
            );
        }
    }

    // Exactly one countdown lives while the session is in progress, tagged with
    // the current run's generation.
    fn sync_countdown(&mut self) {
        if self.session.phase() != Phase::InProgress {
            self.countdown = None;
            return;
        }
        let generation = self.session.generation();
        let current = self
            .countdown
            .as_ref()
            .is_some_and(|c| c.generation() == generation);
        if !current {
            self.countdown = Some(Countdown::start(
                self.tick_period,
                generation,
                self.ticks_tx.clone(),
            ));
        }
    }

    fn publish(&self) {
        let mut snapshot =
            SessionSnapshot::capture(&self.session, self.service.clock().now(), self.notice.clone());
        snapshot.commands_handled = self.commands_handled;
        self.snapshots.send_replace(snapshot);
    }
}

/// Caller's side of a spawned [`AssessmentRunner`].
pub struct AssessmentHandle {
    commands: mpsc::Sender<Command>,
    snapshots: watch::Receiver<SessionSnapshot>,
    task: JoinHandle<()>,
}

impl AssessmentHandle {
    /// Queue a command for the runner.
    ///
    /// # Errors
    ///
    /// Returns `AssessmentError::Closed` if the runner has stopped.
    pub async fn send(&self, command: Command) -> Result<(), AssessmentError> {
        self.commands
            .send(command)
            .await
            .map_err(|_| AssessmentError::Closed)
    }

    /// New receiver for snapshots; drop it to unsubscribe.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<SessionSnapshot> {
        self.snapshots.clone()
    }

    /// Latest published snapshot.
    #[must_use]
    pub fn snapshot(&self) -> SessionSnapshot {
        self.snapshots.borrow().clone()
    }

    /// Stop the runner and wait for it; its countdown is dropped with it.
    pub async fn shutdown(self) {
        drop(self.commands);
        if let Err(err) = self.task.await {
            tracing::warn!(error = %err, "assessment runner ended abnormally");
        }
    }
}
