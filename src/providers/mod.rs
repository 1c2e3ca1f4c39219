//! External capabilities the core consumes.
//!
//! Each capability is a trait object handed in at construction time:
//! - [`EmbeddingProvider`]: text → fixed-length vector; failures propagate
//! - [`ImageDescriber`]: image → [`Description`]; never fails, falls back
//! - [`TargetSource`]: fresh target image; never fails, falls back
//!
//! [`OpenAiClient`] implements the first two over HTTP and
//! [`PicsumTargetSource`] implements the third.

mod openai;
mod picsum;

use async_trait::async_trait;
use thiserror::Error;

use crate::models::{AcquiredTarget, Description};

pub use openai::OpenAiClient;
pub use picsum::PicsumTargetSource;

#[derive(Debug, Error)]
pub enum EmbeddingError {
    #[error("no API key configured for the embedding provider")]
    MissingApiKey,

    #[error("embedding request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("embedding provider returned {status}: {body}")]
    Api { status: u16, body: String },

    #[error("embedding provider returned no vector")]
    EmptyResponse,
}

#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError>;
}

/// What an [`ImageDescriber`] produced.
///
/// The fallback case is an ordinary value, not an error: scoring continues
/// against [`Description::unknown`].
#[derive(Debug, Clone, PartialEq)]
pub enum DescriptionOutcome {
    Described(Description),
    Fallback { reason: String },
}

impl DescriptionOutcome {
    pub fn fallback(reason: impl Into<String>) -> Self {
        Self::Fallback {
            reason: reason.into(),
        }
    }

    pub fn is_fallback(&self) -> bool {
        matches!(self, Self::Fallback { .. })
    }

    pub fn into_description(self) -> Description {
        match self {
            Self::Described(description) => description,
            Self::Fallback { .. } => Description::unknown(),
        }
    }
}

#[async_trait]
pub trait ImageDescriber: Send + Sync {
    async fn describe(&self, image_ref: &str) -> DescriptionOutcome;
}

#[async_trait]
pub trait TargetSource: Send + Sync {
    /// Obtain a fresh target, retrying internally. Returns the sentinel
    /// target when every attempt fails.
    async fn acquire_target(&self) -> AcquiredTarget;
}
