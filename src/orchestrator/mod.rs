//! Drives a subject through the stage plan and waits for the score.
//!
//! [`Orchestrator`] owns no state of its own beyond a [`StageMachine`]: every
//! note goes straight to a [`SessionStore`] and every prompt goes through a
//! [`Presenter`]. Both are handed in at construction time, so the same loop
//! runs against the HTTP API ([`ApiClient`](crate::client::ApiClient)), the
//! database in-process ([`LocalStore`]) or test doubles.

mod local;
mod machine;

use std::io;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

use crate::client::ClientError;
use crate::config::Config;
use crate::models::{FinishStatus, ScoringStatus, Session, StageDefinition, Target};
use crate::scoring::PipelineError;

pub use local::LocalStore;
pub use machine::{
    Command, MachineError, OrchestratorState, PendingNote, StageMachine, Transition,
};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("session not found: {0}")]
    SessionNotFound(i64),

    #[error(transparent)]
    Client(#[from] ClientError),

    #[error(transparent)]
    Pipeline(#[from] PipelineError),

    #[error(transparent)]
    Backend(#[from] anyhow::Error),
}

#[derive(Debug, Error)]
pub enum OrchestratorError {
    #[error("session store failed: {0}")]
    Store(#[from] StoreError),

    #[error(transparent)]
    Machine(#[from] MachineError),

    #[error("presenter failed: {0}")]
    Presenter(#[from] io::Error),

    #[error("no score for session {session_id} after {waited:?}")]
    ScoreDeadline { session_id: i64, waited: Duration },

    #[error("scoring pass for session {session_id} failed; the session stays unfinished")]
    ScoringFailed { session_id: i64 },
}

/// Session persistence as the orchestrator sees it.
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// The most recently created unscored session, if any.
    async fn find_unfinished_session(&self) -> Result<Option<Session>, StoreError>;

    /// Acquire a fresh target. Never fails because of the image source; only
    /// because of the store itself.
    async fn new_target(&self) -> Result<Target, StoreError>;

    async fn create_session(&self, target_id: &str) -> Result<Session, StoreError>;

    async fn load_session(&self, id: i64) -> Result<Session, StoreError>;

    async fn append_note(&self, id: i64, stage: u8, text: &str) -> Result<(), StoreError>;

    /// Lock the notes and start the scoring pass.
    ///
    /// For a session already locked, report `AlreadyScoring` only while its
    /// pass is actually running; a claim left behind by a stopped pass is
    /// taken over and scored.
    async fn lock_and_score(&self, id: i64) -> Result<FinishStatus, StoreError>;

    /// Re-read a session while polling for its score.
    async fn get_session(&self, id: i64) -> Result<Session, StoreError> {
        self.load_session(id).await
    }
}

/// The presentation layer: a text console, a voice front end or a script.
#[async_trait]
pub trait Presenter: Send {
    async fn session_started(&mut self, session: &Session, resumed: bool) -> io::Result<()>;

    /// `position` is 1-based within `total` stage definitions.
    async fn show_stage(
        &mut self,
        stage: &StageDefinition,
        position: usize,
        total: usize,
    ) -> io::Result<()>;

    /// Next line of input. `None` means the input is closed, which the
    /// orchestrator treats as `cancel`.
    async fn read_entry(&mut self, stage: &StageDefinition) -> io::Result<Option<String>>;

    async fn show_help(&mut self, stage: &StageDefinition) -> io::Result<()>;

    async fn stage_recorded(
        &mut self,
        stage: &StageDefinition,
        note: &PendingNote,
        skipped: bool,
    ) -> io::Result<()>;

    async fn scoring_started(&mut self, session_id: i64, status: FinishStatus) -> io::Result<()>;

    async fn cancelled(&mut self, session: &Session) -> io::Result<()>;

    async fn show_result(&mut self, session: &Session) -> io::Result<()>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OrchestratorConfig {
    pub poll_interval: Duration,
    /// `None` polls until a score shows up.
    pub score_deadline: Option<Duration>,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(1),
            score_deadline: None,
        }
    }
}

impl OrchestratorConfig {
    pub fn from_config(config: &Config) -> Self {
        Self {
            poll_interval: config.poll_interval,
            score_deadline: config.score_deadline,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    Scored(Session),
    /// Notes recorded before the cancel are kept.
    Cancelled(Session),
}

pub struct Orchestrator<S, P> {
    store: S,
    presenter: P,
    config: OrchestratorConfig,
    stages: &'static [StageDefinition],
}

impl<S: SessionStore, P: Presenter> Orchestrator<S, P> {
    pub fn new(store: S, presenter: P, config: OrchestratorConfig) -> Self {
        Self {
            store,
            presenter,
            config,
            stages: crate::models::STAGES,
        }
    }

    pub fn with_stages(mut self, stages: &'static [StageDefinition]) -> Self {
        self.stages = stages;
        self
    }

    pub fn presenter(&self) -> &P {
        &self.presenter
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Run one session from start to a terminal state.
    pub async fn run(&mut self) -> Result<Outcome, OrchestratorError> {
        let (session, resumed) = self.open_session().await?;
        self.presenter.session_started(&session, resumed).await?;

        let mut machine = StageMachine::new(self.stages);
        if session.scoring_status == ScoringStatus::Scoring {
            tracing::info!(
                "Session {} is already locked for scoring, finishing it again",
                session.id
            );
            machine.resume_awaiting_score()?;
        } else {
            machine.start()?;
        }

        while let Some(stage) = machine.current_stage() {
            let OrchestratorState::Stage(index) = machine.state() else {
                break;
            };
            self.presenter
                .show_stage(stage, index + 1, self.stages.len())
                .await?;

            let input = self
                .presenter
                .read_entry(stage)
                .await?
                .unwrap_or_else(|| "cancel".to_string());

            match machine.submit(&input)? {
                Transition::HelpRequested => self.presenter.show_help(stage).await?,
                Transition::Advanced { note, skipped } => {
                    self.store
                        .append_note(session.id, note.stage, &note.text)
                        .await?;
                    self.presenter.stage_recorded(stage, &note, skipped).await?;
                }
                Transition::Cancelled => {
                    tracing::info!("Session {} cancelled by subject", session.id);
                    let session = self.store.get_session(session.id).await?;
                    self.presenter.cancelled(&session).await?;
                    return Ok(Outcome::Cancelled(session));
                }
            }
        }

        // a locked session from an earlier run may have lost its pass; the
        // store takes such a claim over instead of reporting it in progress
        let status = self.store.lock_and_score(session.id).await?;
        self.presenter.scoring_started(session.id, status).await?;

        let scored = self.wait_for_score(session.id).await?;
        machine.mark_scored()?;
        self.presenter.show_result(&scored).await?;
        Ok(Outcome::Scored(scored))
    }

    async fn open_session(&self) -> Result<(Session, bool), OrchestratorError> {
        if let Some(session) = self.store.find_unfinished_session().await? {
            tracing::info!(
                "Resuming session {} on target {}",
                session.id,
                session.target_id
            );
            return Ok((session, true));
        }

        let target = self.store.new_target().await?;
        let session = self.store.create_session(&target.id).await?;
        tracing::info!("Created session {} on target {}", session.id, target.id);
        Ok((session, false))
    }

    /// Poll the store until the session is scored.
    ///
    /// Stops early when the pass gave its claim back (status `open` again),
    /// since nothing will ever write a score for this request.
    pub async fn wait_for_score(&self, session_id: i64) -> Result<Session, OrchestratorError> {
        let started = tokio::time::Instant::now();
        loop {
            let session = self.store.get_session(session_id).await?;
            if session.is_scored() {
                return Ok(session);
            }
            if session.scoring_status == ScoringStatus::Open {
                return Err(OrchestratorError::ScoringFailed { session_id });
            }

            let waited = started.elapsed();
            if let Some(deadline) = self.config.score_deadline {
                if waited >= deadline {
                    return Err(OrchestratorError::ScoreDeadline { session_id, waited });
                }
            }

            tracing::debug!("Session {} not scored yet ({:?})", session_id, waited);
            tokio::time::sleep(self.config.poll_interval).await;
        }
    }
}
