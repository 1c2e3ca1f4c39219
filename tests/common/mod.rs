//! Shared fixtures for the integration specs.
#![allow(dead_code)]

use std::collections::VecDeque;
use std::io;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use remote_viewer::db::Database;
use remote_viewer::models::*;
use remote_viewer::orchestrator::{PendingNote, Presenter};
use remote_viewer::providers::{
    DescriptionOutcome, EmbeddingError, EmbeddingProvider, ImageDescriber, TargetSource,
};
use remote_viewer::scoring::{Scorer, ScoringPipeline};

// ============================================================
// Embeddings
// ============================================================

const TOPICS: [&str; 6] = ["peak", "water", "nature", "warm", "urban", "indoor"];
const BIAS: f32 = 0.1;

/// Word → topic weights. Words not listed carry no signal.
const LEXICON: &[(&str, &[(&str, f32)])] = &[
    ("blue", &[("water", 2.0), ("peak", 1.0), ("urban", 1.0)]),
    ("green", &[("nature", 3.0), ("peak", 1.0)]),
    ("white", &[("peak", 1.0), ("indoor", 1.0), ("urban", 1.0)]),
    ("brown", &[("nature", 2.0), ("indoor", 1.0)]),
    ("gray", &[("urban", 2.0), ("peak", 1.0)]),
    ("turquoise", &[("water", 3.0)]),
    ("beige", &[("indoor", 3.0)]),
    ("orange", &[("warm", 3.0)]),
    ("red", &[("warm", 2.0), ("urban", 1.0)]),
    ("yellow", &[("warm", 2.0), ("urban", 1.0)]),
    ("tan", &[("warm", 2.0), ("indoor", 1.0)]),
    ("black", &[("urban", 2.0)]),
    ("triangular", &[("peak", 3.0)]),
    ("circular", &[("water", 1.0), ("warm", 1.0)]),
    ("organic", &[("nature", 2.0)]),
    ("wavy", &[("water", 2.0), ("warm", 1.0)]),
    ("flowing", &[("water", 2.0)]),
    ("rectangular", &[("urban", 2.0), ("indoor", 1.0)]),
    ("square", &[("urban", 1.0), ("indoor", 2.0)]),
    ("linear", &[("urban", 2.0)]),
    ("geometric", &[("urban", 2.0)]),
    ("tall", &[("peak", 2.0), ("urban", 1.0)]),
    ("mountain", &[("peak", 3.0), ("nature", 1.0)]),
    ("lake", &[("water", 3.0), ("nature", 1.0)]),
    ("tree", &[("nature", 3.0)]),
    ("sky", &[("peak", 1.0), ("warm", 1.0)]),
    ("cloud", &[("peak", 1.0), ("water", 1.0)]),
    ("ocean", &[("water", 3.0), ("warm", 1.0)]),
    ("sand", &[("warm", 3.0)]),
    ("palm", &[("warm", 3.0)]),
    ("sun", &[("warm", 3.0)]),
    ("building", &[("urban", 3.0), ("indoor", 1.0)]),
    ("skyscraper", &[("urban", 3.0)]),
    ("street", &[("urban", 3.0)]),
    ("car", &[("urban", 3.0)]),
    ("window", &[("indoor", 2.0), ("urban", 1.0)]),
    ("person", &[("indoor", 2.0)]),
    ("office", &[("indoor", 3.0)]),
    ("home", &[("indoor", 3.0)]),
    ("rock", &[("peak", 2.0), ("nature", 1.0)]),
    ("water", &[("water", 3.0)]),
    ("wood", &[("nature", 2.0), ("indoor", 1.0)]),
    ("ice", &[("peak", 1.0), ("water", 2.0)]),
    ("vapor", &[("water", 1.0), ("warm", 1.0)]),
    ("glass", &[("urban", 2.0), ("indoor", 1.0)]),
    ("steel", &[("urban", 3.0)]),
    ("concrete", &[("urban", 3.0)]),
    ("asphalt", &[("urban", 3.0)]),
    ("snow", &[("peak", 3.0)]),
    ("landscape", &[("nature", 2.0), ("peak", 1.0)]),
    ("beach", &[("warm", 3.0), ("water", 1.0)]),
    ("sunset", &[("warm", 3.0)]),
    ("urban", &[("urban", 3.0)]),
    ("cityscape", &[("urban", 3.0)]),
    ("serene", &[("nature", 2.0)]),
    ("tropical", &[("warm", 3.0)]),
    ("modern", &[("urban", 2.0), ("indoor", 1.0)]),
    ("outdoor", &[("nature", 2.0)]),
    ("natural", &[("nature", 3.0)]),
    ("wave", &[("water", 2.0), ("warm", 1.0)]),
    ("shore", &[("water", 1.0), ("warm", 2.0)]),
    ("pine", &[("nature", 2.0), ("peak", 1.0)]),
    ("crystal", &[("water", 1.0)]),
    ("clear", &[("water", 1.0)]),
    ("busy", &[("urban", 2.0)]),
];

/// Deterministic stand-in for a semantic embedding model.
///
/// Each known word pushes the vector towards a handful of scene topics, so
/// texts about the same kind of scene point the same way. A constant bias
/// component keeps every vector nonzero.
#[derive(Default)]
pub struct TopicEmbedder {
    calls: AtomicUsize,
}

impl TopicEmbedder {
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn vector(text: &str) -> Vec<f32> {
        let mut vector = vec![0.0; TOPICS.len() + 1];
        vector[TOPICS.len()] = BIAS;

        let lower = text.to_lowercase();
        for word in lower
            .split(|c: char| !c.is_ascii_lowercase())
            .filter(|w| !w.is_empty())
        {
            let word = stem(word);
            let Some((_, weights)) = LEXICON.iter().find(|(w, _)| *w == word) else {
                continue;
            };
            for (topic, weight) in weights.iter() {
                if let Some(i) = TOPICS.iter().position(|t| t == topic) {
                    vector[i] += weight;
                }
            }
        }
        vector
    }
}

fn stem(word: &str) -> &str {
    if word.len() > 3 && word.ends_with('s') && !word.ends_with("ss") {
        &word[..word.len() - 1]
    } else {
        word
    }
}

#[async_trait]
impl EmbeddingProvider for TopicEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(Self::vector(text))
    }
}

/// Always fails, like a provider without credentials.
pub struct FailingEmbedder;

#[async_trait]
impl EmbeddingProvider for FailingEmbedder {
    async fn embed(&self, _text: &str) -> Result<Vec<f32>, EmbeddingError> {
        Err(EmbeddingError::MissingApiKey)
    }
}

// ============================================================
// Vision and targets
// ============================================================

/// Describes every image the same way and counts calls.
pub struct StaticDescriber {
    outcome: DescriptionOutcome,
    calls: AtomicUsize,
}

impl StaticDescriber {
    pub fn describing(description: Description) -> Self {
        Self {
            outcome: DescriptionOutcome::Described(description),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn failing(reason: &str) -> Self {
        Self {
            outcome: DescriptionOutcome::fallback(reason),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ImageDescriber for StaticDescriber {
    async fn describe(&self, _image_ref: &str) -> DescriptionOutcome {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.outcome.clone()
    }
}

/// Hands out numbered targets: `00000001`, `00000002`, ...
#[derive(Default)]
pub struct SequentialTargets {
    next: AtomicUsize,
}

#[async_trait]
impl TargetSource for SequentialTargets {
    async fn acquire_target(&self) -> AcquiredTarget {
        let n = self.next.fetch_add(1, Ordering::SeqCst) + 1;
        AcquiredTarget {
            target_id: format!("{:08}", n),
            image_ref: format!("/tmp/targets/{:08}.jpg", n),
            fallback: false,
        }
    }
}

// ============================================================
// Presentation
// ============================================================

/// What a scripted presenter was asked to show, in order.
#[derive(Debug, Clone, PartialEq)]
pub enum Shown {
    Started { session_id: i64, resumed: bool },
    Stage(u8),
    Help(u8),
    Recorded(PendingNote),
    Scoring(FinishStatus),
    Cancelled,
    Result(f64),
}

/// Feeds canned input lines and records everything it is shown.
#[derive(Clone, Default)]
pub struct ScriptedPresenter {
    input: Arc<Mutex<VecDeque<String>>>,
    shown: Arc<Mutex<Vec<Shown>>>,
}

impl ScriptedPresenter {
    pub fn new(lines: &[&str]) -> Self {
        Self {
            input: Arc::new(Mutex::new(lines.iter().map(|l| l.to_string()).collect())),
            shown: Arc::default(),
        }
    }

    pub fn shown(&self) -> Vec<Shown> {
        self.shown.lock().unwrap().clone()
    }

    fn push(&self, event: Shown) {
        self.shown.lock().unwrap().push(event);
    }
}

#[async_trait]
impl Presenter for ScriptedPresenter {
    async fn session_started(&mut self, session: &Session, resumed: bool) -> io::Result<()> {
        self.push(Shown::Started {
            session_id: session.id,
            resumed,
        });
        Ok(())
    }

    async fn show_stage(
        &mut self,
        stage: &StageDefinition,
        _position: usize,
        _total: usize,
    ) -> io::Result<()> {
        self.push(Shown::Stage(stage.ordinal));
        Ok(())
    }

    async fn read_entry(&mut self, _stage: &StageDefinition) -> io::Result<Option<String>> {
        Ok(self.input.lock().unwrap().pop_front())
    }

    async fn show_help(&mut self, stage: &StageDefinition) -> io::Result<()> {
        self.push(Shown::Help(stage.ordinal));
        Ok(())
    }

    async fn stage_recorded(
        &mut self,
        _stage: &StageDefinition,
        note: &PendingNote,
        _skipped: bool,
    ) -> io::Result<()> {
        self.push(Shown::Recorded(note.clone()));
        Ok(())
    }

    async fn scoring_started(&mut self, _session_id: i64, status: FinishStatus) -> io::Result<()> {
        self.push(Shown::Scoring(status));
        Ok(())
    }

    async fn cancelled(&mut self, _session: &Session) -> io::Result<()> {
        self.push(Shown::Cancelled);
        Ok(())
    }

    async fn show_result(&mut self, session: &Session) -> io::Result<()> {
        self.push(Shown::Result(session.total_score));
        Ok(())
    }
}

// ============================================================
// Reference descriptions
// ============================================================

fn words(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

/// Small mountain scene used by the end-to-end checks.
pub fn mountain_description() -> Description {
    Description {
        objects: words(&["mountain", "lake"]),
        colors: words(&["blue", "green"]),
        shapes: words(&["triangular"]),
        materials: words(&["rock", "water"]),
        setting: "mountain landscape".to_string(),
    }
}

pub fn mountain_lake() -> Description {
    Description {
        objects: words(&["mountain", "lake", "trees", "sky", "clouds"]),
        colors: words(&["blue", "green", "white", "gray", "turquoise"]),
        shapes: words(&["triangular", "circular", "organic", "wavy"]),
        materials: words(&["rock", "water", "wood", "ice"]),
        setting: "serene mountain landscape with crystal clear lake surrounded by pine trees"
            .to_string(),
    }
}

pub fn beach_sunset() -> Description {
    Description {
        objects: words(&["ocean", "sand", "palm trees", "sun", "clouds"]),
        colors: words(&["orange", "red", "yellow", "blue", "tan"]),
        shapes: words(&["circular", "wavy", "flowing", "organic"]),
        materials: words(&["water", "sand", "wood", "vapor"]),
        setting: "tropical beach at sunset with waves lapping on shore and palm trees".to_string(),
    }
}

pub fn city_skyline() -> Description {
    Description {
        objects: words(&["buildings", "skyscrapers", "streets", "cars", "windows"]),
        colors: words(&["gray", "blue", "black", "white", "yellow"]),
        shapes: words(&["rectangular", "square", "linear", "geometric"]),
        materials: words(&["glass", "steel", "concrete", "asphalt"]),
        setting: "modern urban cityscape with tall skyscrapers and busy streets".to_string(),
    }
}

// ============================================================
// Wiring
// ============================================================

pub fn memory_db() -> Database {
    let db = Database::open_memory().unwrap();
    db.migrate().unwrap();
    db
}

pub fn pipeline_with(
    db: &Database,
    describer: Arc<dyn ImageDescriber>,
    embedder: Arc<dyn EmbeddingProvider>,
) -> ScoringPipeline {
    ScoringPipeline::new(db.clone(), describer, Scorer::new(embedder))
}

/// Pipeline that describes every target as the small mountain scene.
pub fn mountain_pipeline(db: &Database) -> ScoringPipeline {
    pipeline_with(
        db,
        Arc::new(StaticDescriber::describing(mountain_description())),
        Arc::new(TopicEmbedder::default()),
    )
}

/// Insert a target and an empty session on it.
pub fn seed_session(db: &Database, target_id: &str) -> Session {
    db.create_target(&AcquiredTarget {
        target_id: target_id.to_string(),
        image_ref: format!("/tmp/targets/{}.jpg", target_id),
        fallback: false,
    })
    .unwrap();
    db.create_session(target_id).unwrap()
}
