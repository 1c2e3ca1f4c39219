mod common;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use common::*;
use remote_viewer::api::{create_router, AppState};
use remote_viewer::client::ApiClient;
use remote_viewer::db::{Database, ScoringClaim};
use remote_viewer::models::*;
use remote_viewer::orchestrator::{
    LocalStore, Orchestrator, OrchestratorConfig, OrchestratorError, Outcome, PendingNote,
    SessionStore, StoreError,
};
use remote_viewer::scoring::ScoringPipeline;

const FULL_RUN: &[&str] = &[
    "flowing",
    "help",
    "blue, green, cold",
    "triangular, tall",
    "serene outdoor",
    "n",
    "y",
    "y",
    "a mountain above a lake with rock and water",
];

fn fast_config() -> OrchestratorConfig {
    OrchestratorConfig {
        poll_interval: Duration::from_millis(10),
        score_deadline: Some(Duration::from_secs(5)),
    }
}

fn local_store(db: &Database, pipeline: ScoringPipeline) -> LocalStore {
    LocalStore::new(db.clone(), Arc::new(SequentialTargets::default()), pipeline)
}

fn orchestrator(
    db: &Database,
    lines: &[&str],
) -> (Orchestrator<LocalStore, ScriptedPresenter>, ScriptedPresenter) {
    let presenter = ScriptedPresenter::new(lines);
    let store = local_store(db, mountain_pipeline(db));
    (
        Orchestrator::new(store, presenter.clone(), fast_config()),
        presenter,
    )
}

fn recorded(shown: &[Shown]) -> Vec<PendingNote> {
    shown
        .iter()
        .filter_map(|s| match s {
            Shown::Recorded(note) => Some(note.clone()),
            _ => None,
        })
        .collect()
}

/// Locks sessions on finish but never scores them, as if every pass hung.
struct NeverScores {
    inner: LocalStore,
    db: Database,
}

#[async_trait]
impl SessionStore for NeverScores {
    async fn find_unfinished_session(&self) -> Result<Option<Session>, StoreError> {
        self.inner.find_unfinished_session().await
    }

    async fn new_target(&self) -> Result<Target, StoreError> {
        self.inner.new_target().await
    }

    async fn create_session(&self, target_id: &str) -> Result<Session, StoreError> {
        self.inner.create_session(target_id).await
    }

    async fn load_session(&self, id: i64) -> Result<Session, StoreError> {
        self.inner.load_session(id).await
    }

    async fn append_note(&self, id: i64, stage: u8, text: &str) -> Result<(), StoreError> {
        self.inner.append_note(id, stage, text).await
    }

    async fn lock_and_score(&self, id: i64) -> Result<FinishStatus, StoreError> {
        Ok(match self.db.claim_scoring(id)? {
            Some(ScoringClaim::Claimed) => FinishStatus::Scoring,
            Some(ScoringClaim::InProgress) => FinishStatus::AlreadyScoring,
            Some(ScoringClaim::AlreadyScored) => FinishStatus::AlreadyScored,
            None => return Err(StoreError::SessionNotFound(id)),
        })
    }
}

mod full_session {
    use super::*;

    #[tokio::test]
    async fn walks_every_stage_and_reports_the_score() {
        let db = memory_db();
        let (mut orchestrator, presenter) = orchestrator(&db, FULL_RUN);

        let outcome = orchestrator.run().await.expect("run failed");

        let Outcome::Scored(session) = outcome else {
            panic!("expected a scored session, got {:?}", outcome);
        };
        assert_eq!(session.notes.len(), 8);
        assert_eq!(
            session.rubric,
            Some(Rubric {
                color: 2,
                shape: 1,
                concept: 2,
                sensory: 2
            })
        );
        assert!((session.total_score - 2.303).abs() < 1e-3);

        let shown = presenter.shown();
        assert_eq!(
            shown.first(),
            Some(&Shown::Started {
                session_id: session.id,
                resumed: false
            })
        );
        assert!(shown.contains(&Shown::Scoring(FinishStatus::Scoring)));
        assert_eq!(shown.last(), Some(&Shown::Result(session.total_score)));
    }

    #[tokio::test]
    async fn stores_probe_answers_with_their_questions() {
        let db = memory_db();
        let (mut orchestrator, _) = orchestrator(&db, FULL_RUN);

        let Outcome::Scored(session) = orchestrator.run().await.unwrap() else {
            panic!("expected a scored session");
        };

        assert_eq!(
            session.stage_log()[&5],
            "Is the dominant environment INDOORS? → no\n\
             Is WATER a key element? → yes\n\
             Is primary movement VERTICAL? → yes"
        );
    }

    #[tokio::test]
    async fn help_never_writes_a_note() {
        let db = memory_db();
        let (mut orchestrator, presenter) =
            orchestrator(&db, &["help", "help", "help", "flowing", "cancel"]);

        orchestrator.run().await.unwrap();

        let shown = presenter.shown();
        assert_eq!(shown.iter().filter(|s| **s == Shown::Help(1)).count(), 3);
        assert_eq!(
            recorded(&shown),
            vec![PendingNote {
                stage: 1,
                text: "flowing".into()
            }]
        );
    }

    #[tokio::test]
    async fn skip_is_recorded_verbatim() {
        let db = memory_db();
        let (mut orchestrator, _) = orchestrator(&db, &["skip", "cancel"]);

        let Outcome::Cancelled(session) = orchestrator.run().await.unwrap() else {
            panic!("expected a cancelled session");
        };

        assert_eq!(session.notes.len(), 1);
        assert_eq!(session.notes[0].text, "skip");
        assert_eq!(session.notes[0].stage, 1);
    }
}

mod cancel_and_resume {
    use super::*;

    #[tokio::test]
    async fn cancel_keeps_partial_notes() {
        let db = memory_db();
        let (mut orchestrator, presenter) = orchestrator(&db, &["flowing", "cold", "CANCEL"]);

        let outcome = orchestrator.run().await.unwrap();

        let Outcome::Cancelled(session) = outcome else {
            panic!("expected a cancelled session");
        };
        assert_eq!(session.notes.len(), 2);
        assert!(session.is_unfinished());
        assert_eq!(presenter.shown().last(), Some(&Shown::Cancelled));
    }

    #[tokio::test]
    async fn closed_input_counts_as_cancel() {
        let db = memory_db();
        let (mut orchestrator, _) = orchestrator(&db, &["flowing"]);

        let outcome = orchestrator.run().await.unwrap();

        assert!(matches!(outcome, Outcome::Cancelled(s) if s.notes.len() == 1));
    }

    #[tokio::test]
    async fn resumes_the_cancelled_session() {
        let db = memory_db();
        let (mut first, _) = orchestrator(&db, &["flowing", "cancel"]);
        let Outcome::Cancelled(cancelled) = first.run().await.unwrap() else {
            panic!("expected a cancelled session");
        };

        let (mut second, presenter) = orchestrator(&db, FULL_RUN);
        let Outcome::Scored(scored) = second.run().await.unwrap() else {
            panic!("expected a scored session");
        };

        assert_eq!(scored.id, cancelled.id);
        assert_eq!(
            presenter.shown().first(),
            Some(&Shown::Started {
                session_id: cancelled.id,
                resumed: true
            })
        );
        // resumed sessions start over at stage 1; notes stay append-only
        assert_eq!(scored.notes.len(), 9);
    }

    #[tokio::test]
    async fn resume_skips_scored_sessions() {
        let db = memory_db();
        let unscored = seed_session(&db, "00000100");
        let scored = db.create_session("00000100").unwrap();
        db.append_note(scored.id, 6, "a mountain lake").unwrap();
        mountain_pipeline(&db).score_now(scored.id).await.unwrap();

        let (mut orchestrator, presenter) = orchestrator(&db, &["cancel"]);
        orchestrator.run().await.unwrap();

        assert_eq!(
            presenter.shown().first(),
            Some(&Shown::Started {
                session_id: unscored.id,
                resumed: true
            })
        );
    }
}

mod waiting_for_score {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn gives_up_at_the_deadline() {
        let db = memory_db();
        let store = NeverScores {
            inner: local_store(&db, mountain_pipeline(&db)),
            db: db.clone(),
        };
        let config = OrchestratorConfig {
            poll_interval: Duration::from_secs(1),
            score_deadline: Some(Duration::from_secs(3)),
        };
        let mut orchestrator = Orchestrator::new(store, ScriptedPresenter::new(FULL_RUN), config);

        let result = orchestrator.run().await;

        match result {
            Err(OrchestratorError::ScoreDeadline { waited, .. }) => {
                assert!(waited >= Duration::from_secs(3))
            }
            other => panic!("expected a deadline error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn stops_when_the_pass_fails() {
        let db = memory_db();
        let pipeline = pipeline_with(
            &db,
            Arc::new(StaticDescriber::describing(mountain_description())),
            Arc::new(FailingEmbedder),
        );
        let mut orchestrator = Orchestrator::new(
            local_store(&db, pipeline),
            ScriptedPresenter::new(FULL_RUN),
            fast_config(),
        );

        let result = orchestrator.run().await;

        assert!(matches!(
            result,
            Err(OrchestratorError::ScoringFailed { .. })
        ));
        let session = db.find_unfinished_session().unwrap().unwrap();
        assert_eq!(session.scoring_status, ScoringStatus::Open);
    }

    #[tokio::test(start_paused = true)]
    async fn scores_a_session_left_locked_by_an_earlier_run() {
        let db = memory_db();
        let session = seed_session(&db, "00000100");
        db.append_note(
            session.id,
            6,
            "I see blue and green colors, triangular mountains and a lake with rock and water",
        )
        .unwrap();
        // the earlier process exited while its pass was running
        db.claim_scoring(session.id).unwrap();

        let presenter = ScriptedPresenter::new(&[]);
        let mut orchestrator = Orchestrator::new(
            local_store(&db, mountain_pipeline(&db)),
            presenter.clone(),
            OrchestratorConfig::default(),
        );

        let outcome = tokio::time::timeout(Duration::from_secs(3600), orchestrator.run())
            .await
            .expect("run never finished")
            .expect("run failed");

        let Outcome::Scored(scored) = outcome else {
            panic!("expected a scored session, got {:?}", outcome);
        };
        assert_eq!(scored.id, session.id);
        assert_eq!(scored.scoring_status, ScoringStatus::Scored);
        assert!(scored.total_score > 0.0);
        assert_eq!(scored.notes.len(), 1);

        let shown = presenter.shown();
        assert_eq!(
            shown.first(),
            Some(&Shown::Started {
                session_id: session.id,
                resumed: true
            })
        );
        assert!(!shown.iter().any(|s| matches!(s, Shown::Stage(_))));
        assert!(shown.contains(&Shown::Scoring(FinishStatus::Scoring)));
        assert!(db.find_unfinished_session().unwrap().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn waits_on_a_locked_session_whose_pass_is_live() {
        let db = memory_db();
        let session = seed_session(&db, "00000100");
        db.claim_scoring(session.id).unwrap();

        let presenter = ScriptedPresenter::new(&[]);
        let store = NeverScores {
            inner: local_store(&db, mountain_pipeline(&db)),
            db: db.clone(),
        };
        let config = OrchestratorConfig {
            poll_interval: Duration::from_secs(1),
            score_deadline: Some(Duration::from_secs(2)),
        };
        let mut orchestrator = Orchestrator::new(store, presenter.clone(), config);

        let result = orchestrator.run().await;

        assert!(matches!(result, Err(OrchestratorError::ScoreDeadline { .. })));
        let shown = presenter.shown();
        assert!(!shown.iter().any(|s| matches!(s, Shown::Stage(_))));
        assert!(shown.contains(&Shown::Scoring(FinishStatus::AlreadyScoring)));
    }
}

mod over_http {
    use super::*;

    #[tokio::test]
    async fn runs_a_session_through_the_api() {
        let db = memory_db();
        let app = create_router(AppState {
            db: db.clone(),
            targets: Arc::new(SequentialTargets::default()),
            pipeline: mountain_pipeline(&db),
        });
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        let client = ApiClient::new(format!("http://{}/api/v1", addr));
        let mut orchestrator =
            Orchestrator::new(client, ScriptedPresenter::new(FULL_RUN), fast_config());

        let Outcome::Scored(session) = orchestrator.run().await.expect("run failed") else {
            panic!("expected a scored session");
        };

        assert_eq!(session.target_id, "00000001");
        assert!(session.total_score > 2.0);
        let stored = db.get_session(session.id).unwrap().unwrap();
        assert_eq!(stored.notes.len(), 8);
        assert!(stored.is_scored());
    }
}
