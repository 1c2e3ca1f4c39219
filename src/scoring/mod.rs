//! Embedding-based scoring of session notes against a target description.
//!
//! [`Scorer`] computes one overall similarity and four per-category
//! similarities; [`ScoringParams`] turns them into a [`Rubric`] and a total.
//! [`ScoringPipeline`] wraps both with persistence and the vision fallback.

mod aggregate;
mod pipeline;
mod similarity;

use std::io;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::ser::Formatter;
use thiserror::Error;

use crate::models::{Category, Description, Rubric};
use crate::providers::{EmbeddingError, EmbeddingProvider};

pub use aggregate::{CategorySimilarities, ScoringParams};
pub use pipeline::{PipelineError, ScoringPipeline};
pub use similarity::{cosine, SimilarityError};

#[derive(Debug, Error)]
pub enum ScoringError {
    #[error("embedding failed: {0}")]
    Embedding(#[from] EmbeddingError),

    #[error("similarity failed: {0}")]
    Similarity(#[from] SimilarityError),

    #[error("could not encode description: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Full result of one scoring pass.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ScoreReport {
    /// Similarity of the notes to the whole description.
    pub overall_similarity: f64,
    pub similarities: CategorySimilarities,
    pub rubric: Rubric,
    pub total: f64,
}

/// The synthetic text a category is compared against.
pub fn category_text(category: Category, description: &Description) -> String {
    match category {
        Category::Color => format!(
            "Colors present in the image: {}",
            description.colors.join(", ")
        ),
        Category::Shape => format!(
            "Shapes and forms in the image: {}",
            description.shapes.join(", ")
        ),
        Category::Concept => format!(
            "Objects and items in the image: {}",
            description.objects.join(", ")
        ),
        Category::Sensory => format!(
            "Setting and atmosphere of the image: {}. Materials present: {}",
            description.setting,
            description.materials.join(", ")
        ),
    }
}

/// The whole description as the overall comparison text.
///
/// Spaced the way Python's `json.dumps` writes it by default (`", "` between
/// items, `": "` after keys, non-ASCII as `\uXXXX`), in field order. Stored
/// embeddings were computed from exactly this text.
pub fn description_text(description: &Description) -> Result<String, serde_json::Error> {
    let mut out = Vec::new();
    let mut serializer = serde_json::Serializer::with_formatter(&mut out, SpacedFormatter);
    description.serialize(&mut serializer)?;
    // only ASCII is ever written
    Ok(String::from_utf8_lossy(&out).into_owned())
}

struct SpacedFormatter;

impl Formatter for SpacedFormatter {
    fn begin_array_value<W>(&mut self, writer: &mut W, first: bool) -> io::Result<()>
    where
        W: ?Sized + io::Write,
    {
        if first {
            Ok(())
        } else {
            writer.write_all(b", ")
        }
    }

    fn begin_object_key<W>(&mut self, writer: &mut W, first: bool) -> io::Result<()>
    where
        W: ?Sized + io::Write,
    {
        if first {
            Ok(())
        } else {
            writer.write_all(b", ")
        }
    }

    fn begin_object_value<W>(&mut self, writer: &mut W) -> io::Result<()>
    where
        W: ?Sized + io::Write,
    {
        writer.write_all(b": ")
    }

    fn write_string_fragment<W>(&mut self, writer: &mut W, fragment: &str) -> io::Result<()>
    where
        W: ?Sized + io::Write,
    {
        let mut start = 0;
        for (i, c) in fragment.char_indices() {
            if c.is_ascii() {
                continue;
            }
            writer.write_all(fragment[start..i].as_bytes())?;
            let mut units = [0u16; 2];
            for unit in c.encode_utf16(&mut units) {
                write!(writer, "\\u{:04x}", unit)?;
            }
            start = i + c.len_utf8();
        }
        writer.write_all(fragment[start..].as_bytes())
    }
}

/// Scores notes against a description using an injected embedding provider.
#[derive(Clone)]
pub struct Scorer {
    embedder: Arc<dyn EmbeddingProvider>,
    params: ScoringParams,
}

impl Scorer {
    pub fn new(embedder: Arc<dyn EmbeddingProvider>) -> Self {
        Self::with_params(embedder, ScoringParams::default())
    }

    pub fn with_params(embedder: Arc<dyn EmbeddingProvider>, params: ScoringParams) -> Self {
        Self { embedder, params }
    }

    pub fn params(&self) -> &ScoringParams {
        &self.params
    }

    /// Run one scoring pass.
    ///
    /// The notes are embedded once and reused for all five comparisons. Any
    /// embedding failure fails the whole pass; there is no partial rubric.
    pub async fn score(
        &self,
        notes: &str,
        description: &Description,
    ) -> Result<ScoreReport, ScoringError> {
        let notes_embedding = self.embedder.embed(notes).await?;

        let full_description = description_text(description)?;
        let description_embedding = self.embedder.embed(&full_description).await?;
        let overall_similarity = cosine(&notes_embedding, &description_embedding)?;

        let mut similarities = CategorySimilarities::default();
        for category in Category::ALL {
            let text = category_text(category, description);
            let embedding = self.embedder.embed(&text).await?;
            similarities.set(category, cosine(&notes_embedding, &embedding)?);
        }

        let rubric = self.params.rubric(&similarities);
        let total = self.params.total(overall_similarity, &rubric);

        tracing::debug!(
            overall = overall_similarity,
            ?similarities,
            total,
            "Scoring pass complete"
        );

        Ok(ScoreReport {
            overall_similarity,
            similarities,
            rubric,
            total,
        })
    }
}
