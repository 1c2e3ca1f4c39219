use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::rubric::Rubric;

/// Total score of a session that has not been scored yet.
pub const UNSCORED: f64 = 0.0;

/// One subject's attempt at a target.
///
/// Notes are append-only. Scoring is a one-way transition: once a session is
/// `Scored` its rubric and total never change again.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Session {
    pub id: i64,
    pub target_id: String,
    /// Notes in the order they were recorded.
    pub notes: Vec<StageNote>,
    pub rubric: Option<Rubric>,
    /// `UNSCORED` until the scoring pass writes a result.
    pub total_score: f64,
    pub scoring_status: ScoringStatus,
    pub created_at: DateTime<Utc>,
    pub scored_at: Option<DateTime<Utc>>,
    /// When the current scoring claim was taken. Cleared on release.
    #[serde(default)]
    pub scoring_claimed_at: Option<DateTime<Utc>>,
}

impl Session {
    /// A session is unfinished while its total is still the unscored sentinel.
    ///
    /// A pass that legitimately scores 0 marks the session `Scored`, which
    /// also counts as finished so it is never resumed or polled forever.
    pub fn is_unfinished(&self) -> bool {
        self.total_score == UNSCORED && self.scoring_status != ScoringStatus::Scored
    }

    pub fn is_scored(&self) -> bool {
        !self.is_unfinished()
    }

    /// Accumulated text per stage ordinal, in stage order.
    pub fn stage_log(&self) -> BTreeMap<u8, String> {
        let mut log: BTreeMap<u8, String> = BTreeMap::new();
        for note in &self.notes {
            let entry = log.entry(note.stage).or_default();
            if !entry.is_empty() {
                entry.push('\n');
            }
            entry.push_str(&note.text);
        }
        log
    }

    /// The notes flattened into the single text the scorer embeds.
    pub fn notes_text(&self) -> String {
        self.notes
            .iter()
            .map(|n| format!("[Stage {}] {}", n.stage, n.text))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// Text recorded for one stage transition.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct StageNote {
    pub stage: u8,
    pub text: String,
    pub created_at: DateTime<Utc>,
}

/// Where a session is in its scoring lifecycle.
///
/// - `Open`: notes are still being collected
/// - `Scoring`: notes are locked and a scoring pass is running
/// - `Scored`: rubric and total have been written
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum ScoringStatus {
    #[default]
    Open,
    Scoring,
    Scored,
}

impl ScoringStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Open => "open",
            Self::Scoring => "scoring",
            Self::Scored => "scored",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "open" => Some(Self::Open),
            "scoring" => Some(Self::Scoring),
            "scored" => Some(Self::Scored),
            _ => None,
        }
    }
}

/// Input for creating a session on an existing target.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateSessionInput {
    #[serde(alias = "trn")]
    pub target_id: String,
}

/// Input for appending a note to a session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppendNoteInput {
    pub stage: u8,
    pub text: String,
}

/// Query for listing sessions.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ListSessionsQuery {
    /// `unfinished` restricts the listing to sessions that are not scored.
    pub status: Option<String>,
}

/// Outcome of asking for a session to be locked and scored.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum FinishStatus {
    /// A scoring pass was started by this request.
    Scoring,
    /// Another pass is already running; nothing was started.
    AlreadyScoring,
    /// The session was scored before; nothing was started.
    AlreadyScored,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FinishResponse {
    pub status: FinishStatus,
}
