use std::sync::Arc;

use async_trait::async_trait;

use super::{SessionStore, StoreError};
use crate::db::Database;
use crate::models::{FinishStatus, Session, Target};
use crate::providers::TargetSource;
use crate::scoring::ScoringPipeline;

/// In-process [`SessionStore`] over the database, for running without the
/// HTTP server.
#[derive(Clone)]
pub struct LocalStore {
    db: Database,
    targets: Arc<dyn TargetSource>,
    pipeline: ScoringPipeline,
}

impl LocalStore {
    pub fn new(db: Database, targets: Arc<dyn TargetSource>, pipeline: ScoringPipeline) -> Self {
        Self {
            db,
            targets,
            pipeline,
        }
    }
}

#[async_trait]
impl SessionStore for LocalStore {
    async fn find_unfinished_session(&self) -> Result<Option<Session>, StoreError> {
        Ok(self.db.find_unfinished_session()?)
    }

    async fn new_target(&self) -> Result<Target, StoreError> {
        let acquired = self.targets.acquire_target().await;
        Ok(self.db.create_target(&acquired)?)
    }

    async fn create_session(&self, target_id: &str) -> Result<Session, StoreError> {
        Ok(self.db.create_session(target_id)?)
    }

    async fn load_session(&self, id: i64) -> Result<Session, StoreError> {
        self.db
            .get_session(id)?
            .ok_or(StoreError::SessionNotFound(id))
    }

    async fn append_note(&self, id: i64, stage: u8, text: &str) -> Result<(), StoreError> {
        if self.db.append_note(id, stage, text)? {
            Ok(())
        } else {
            Err(StoreError::SessionNotFound(id))
        }
    }

    async fn lock_and_score(&self, id: i64) -> Result<FinishStatus, StoreError> {
        Ok(self.pipeline.begin(id)?)
    }
}
