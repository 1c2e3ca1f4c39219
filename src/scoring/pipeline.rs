use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use thiserror::Error;

use super::{ScoreReport, Scorer, ScoringError};
use crate::db::{Database, ScoringClaim};
use crate::models::{Description, FinishStatus};
use crate::providers::{DescriptionOutcome, ImageDescriber};

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("session not found: {0}")]
    SessionNotFound(i64),

    #[error("target not found: {0}")]
    TargetNotFound(String),

    #[error(transparent)]
    Scoring(#[from] ScoringError),

    #[error(transparent)]
    Database(#[from] anyhow::Error),
}

/// Locks a session, describes its target and writes the score back.
///
/// This is the only place a rubric or total is ever written. A pass runs at
/// most once per claim; a failed pass gives the claim back so the whole pass
/// can be retried later.
///
/// Clones share the set of passes running in this process. A session that is
/// `scoring` in the database but not in that set was claimed by a process
/// that went away, and the next finish request takes the claim over.
#[derive(Clone)]
pub struct ScoringPipeline {
    db: Database,
    describer: Arc<dyn ImageDescriber>,
    scorer: Scorer,
    running: Arc<Mutex<HashSet<i64>>>,
}

impl ScoringPipeline {
    pub fn new(db: Database, describer: Arc<dyn ImageDescriber>, scorer: Scorer) -> Self {
        Self {
            db,
            describer,
            scorer,
            running: Arc::new(Mutex::new(HashSet::new())),
        }
    }

    /// Whether a pass for this session is running in this process.
    pub fn is_running(&self, session_id: i64) -> bool {
        self.running
            .lock()
            .expect("scoring registry lock poisoned")
            .contains(&session_id)
    }

    /// Claim the session and run the pass on a background task.
    pub fn begin(&self, session_id: i64) -> Result<FinishStatus, PipelineError> {
        let status = self.claim(session_id)?;
        if status == FinishStatus::Scoring {
            let pipeline = self.clone();
            tokio::spawn(async move {
                // errors are logged and the claim released inside
                let _ = pipeline.run_claimed(session_id).await;
            });
        }
        Ok(status)
    }

    /// Claim the session and run the pass to completion before returning.
    pub async fn score_now(&self, session_id: i64) -> Result<FinishStatus, PipelineError> {
        let status = self.claim(session_id)?;
        if status == FinishStatus::Scoring {
            self.run_claimed(session_id).await?;
        }
        Ok(status)
    }

    /// Lock the session and register the pass. `Scoring` means the caller
    /// must run it.
    fn claim(&self, session_id: i64) -> Result<FinishStatus, PipelineError> {
        let mut running = self.running.lock().expect("scoring registry lock poisoned");
        if running.contains(&session_id) {
            tracing::info!("Ignoring finish for session {}: pass running", session_id);
            return Ok(FinishStatus::AlreadyScoring);
        }

        let claim = self
            .db
            .claim_scoring(session_id)?
            .ok_or(PipelineError::SessionNotFound(session_id))?;

        let status = match claim {
            ScoringClaim::Claimed => {
                tracing::info!("Session {} locked for scoring", session_id);
                FinishStatus::Scoring
            }
            ScoringClaim::InProgress if self.db.take_over_scoring(session_id)? => {
                tracing::warn!(
                    "Session {} was left locked by a pass that is no longer running, scoring it again",
                    session_id
                );
                FinishStatus::Scoring
            }
            // finished or released between the two statements above
            ScoringClaim::InProgress => return Ok(FinishStatus::AlreadyScoring),
            ScoringClaim::AlreadyScored => {
                tracing::info!("Ignoring finish for session {}: already scored", session_id);
                FinishStatus::AlreadyScored
            }
        };

        if status == FinishStatus::Scoring {
            running.insert(session_id);
        }
        Ok(status)
    }

    async fn run_claimed(&self, session_id: i64) -> Result<ScoreReport, PipelineError> {
        let result = self.run_and_release(session_id).await;
        self.running
            .lock()
            .expect("scoring registry lock poisoned")
            .remove(&session_id);
        result
    }

    async fn run_and_release(&self, session_id: i64) -> Result<ScoreReport, PipelineError> {
        match self.run(session_id).await {
            Ok(report) => Ok(report),
            Err(e) => {
                tracing::error!("Scoring pass for session {} failed: {}", session_id, e);
                if let Err(release) = self.db.release_scoring(session_id) {
                    tracing::error!(
                        "Could not release scoring claim on session {}: {}",
                        session_id,
                        release
                    );
                }
                Err(e)
            }
        }
    }

    async fn run(&self, session_id: i64) -> Result<ScoreReport, PipelineError> {
        let session = self
            .db
            .get_session(session_id)?
            .ok_or(PipelineError::SessionNotFound(session_id))?;
        let target = self
            .db
            .get_target(&session.target_id)?
            .ok_or_else(|| PipelineError::TargetNotFound(session.target_id.clone()))?;

        let description = match target.description {
            Some(description) => description,
            None => {
                let description = self.describe(&target.image_ref).await;
                self.db.set_target_description(&target.id, &description)?;
                description
            }
        };

        let report = self
            .scorer
            .score(&session.notes_text(), &description)
            .await?;
        self.db
            .record_score(session_id, &report.rubric, report.total)?;

        tracing::info!(
            "Session {} scored {:.3} (color {}, shape {}, concept {}, sensory {})",
            session_id,
            report.total,
            report.rubric.color,
            report.rubric.shape,
            report.rubric.concept,
            report.rubric.sensory
        );
        Ok(report)
    }

    async fn describe(&self, image_ref: &str) -> Description {
        let outcome = self.describer.describe(image_ref).await;
        if let DescriptionOutcome::Fallback { reason } = &outcome {
            tracing::warn!(
                "Vision description of {} failed, scoring against the placeholder: {}",
                image_ref,
                reason
            );
        }
        outcome.into_description()
    }
}
