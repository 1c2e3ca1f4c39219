use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Target id handed out when image acquisition keeps failing.
pub const SENTINEL_TARGET_ID: &str = "fallback";

/// Placeholder used for every field of the fallback description.
pub const UNKNOWN: &str = "unknown";

/// The hidden subject of a session.
///
/// The description starts out as a placeholder (`None`) and is filled in
/// exactly once, when the first session on this target is scored.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Target {
    pub id: String,
    /// Local path or URL of the target image.
    pub image_ref: String,
    pub description: Option<Description>,
    pub created_at: DateTime<Utc>,
}

/// Structured description of a target image.
///
/// Every field is required when parsing: a description with a missing key is
/// rejected at the boundary rather than patched up during scoring.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Description {
    pub objects: Vec<String>,
    pub colors: Vec<String>,
    pub shapes: Vec<String>,
    pub materials: Vec<String>,
    pub setting: String,
}

impl Description {
    /// The degraded description scored against when vision fails.
    pub fn unknown() -> Self {
        Self {
            objects: vec![UNKNOWN.to_string()],
            colors: vec![UNKNOWN.to_string()],
            shapes: vec![UNKNOWN.to_string()],
            materials: vec![UNKNOWN.to_string()],
            setting: UNKNOWN.to_string(),
        }
    }

    pub fn is_unknown(&self) -> bool {
        *self == Self::unknown()
    }

    /// Parse a vision model reply.
    ///
    /// Models like to wrap JSON in a markdown code fence, so a surrounding
    /// ```` ``` ```` / ```` ```json ```` fence is stripped first.
    pub fn from_json(raw: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(strip_code_fence(raw))
    }
}

fn strip_code_fence(raw: &str) -> &str {
    let trimmed = raw.trim();
    let Some(inner) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let inner = inner.strip_prefix("json").unwrap_or(inner);
    inner.strip_suffix("```").unwrap_or(inner).trim()
}

/// Result of asking a [`TargetSource`](crate::providers::TargetSource) for a
/// fresh target.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AcquiredTarget {
    pub target_id: String,
    pub image_ref: String,
    /// True when every attempt failed and the sentinel target was returned.
    #[serde(default)]
    pub fallback: bool,
}

impl AcquiredTarget {
    pub fn sentinel(image_ref: impl Into<String>) -> Self {
        Self {
            target_id: SENTINEL_TARGET_ID.to_string(),
            image_ref: image_ref.into(),
            fallback: true,
        }
    }
}
