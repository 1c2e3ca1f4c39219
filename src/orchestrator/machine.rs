//! The pure stage state machine. No I/O happens here; the orchestrator
//! applies each [`Transition`] to the store and the presenter.

use std::fmt;

use thiserror::Error;

use crate::models::{ProbeAnswer, StageDefinition, StageKind, STAGES};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrchestratorState {
    NotStarted,
    /// Index into the stage plan.
    Stage(usize),
    AwaitingScore,
    Scored,
    Cancelled,
}

impl fmt::Display for OrchestratorState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotStarted => write!(f, "not started"),
            Self::Stage(i) => write!(f, "stage #{}", i + 1),
            Self::AwaitingScore => write!(f, "awaiting score"),
            Self::Scored => write!(f, "scored"),
            Self::Cancelled => write!(f, "cancelled"),
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum MachineError {
    #[error("cannot {action} while {state}")]
    InvalidTransition {
        state: OrchestratorState,
        action: &'static str,
    },
}

/// What the subject typed, after command recognition.
///
/// Commands are matched on the trimmed, case-insensitive input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Cancel,
    Help,
    Skip,
    Entry(String),
}

impl Command {
    pub fn parse(input: &str) -> Self {
        match input.trim().to_lowercase().as_str() {
            "cancel" => Self::Cancel,
            "help" => Self::Help,
            "skip" => Self::Skip,
            _ => Self::Entry(input.to_string()),
        }
    }
}

/// A note the orchestrator must append before moving on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingNote {
    pub stage: u8,
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Transition {
    /// Self-loop: same stage, nothing to record.
    HelpRequested,
    Advanced { note: PendingNote, skipped: bool },
    Cancelled,
}

#[derive(Debug, Clone)]
pub struct StageMachine {
    stages: &'static [StageDefinition],
    state: OrchestratorState,
}

impl Default for StageMachine {
    fn default() -> Self {
        Self::new(STAGES)
    }
}

impl StageMachine {
    pub fn new(stages: &'static [StageDefinition]) -> Self {
        Self {
            stages,
            state: OrchestratorState::NotStarted,
        }
    }

    pub fn state(&self) -> OrchestratorState {
        self.state
    }

    pub fn stages(&self) -> &'static [StageDefinition] {
        self.stages
    }

    pub fn current_stage(&self) -> Option<&'static StageDefinition> {
        match self.state {
            OrchestratorState::Stage(i) => self.stages.get(i),
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self.state,
            OrchestratorState::Scored | OrchestratorState::Cancelled
        )
    }

    pub fn start(&mut self) -> Result<OrchestratorState, MachineError> {
        if self.state != OrchestratorState::NotStarted {
            return Err(self.invalid("start"));
        }
        self.state = self.stage_or_awaiting(0);
        Ok(self.state)
    }

    /// Jump straight to waiting for a score, for a resumed session whose
    /// notes are already locked.
    pub fn resume_awaiting_score(&mut self) -> Result<(), MachineError> {
        if self.state != OrchestratorState::NotStarted {
            return Err(self.invalid("resume scoring"));
        }
        self.state = OrchestratorState::AwaitingScore;
        Ok(())
    }

    /// Feed one line of input to the current stage.
    ///
    /// Skip and ordinary entries both advance and both record the raw text;
    /// a skipped stage stores the literal command. Probe stages store the
    /// question with the coerced answer.
    pub fn submit(&mut self, input: &str) -> Result<Transition, MachineError> {
        let OrchestratorState::Stage(index) = self.state else {
            return Err(self.invalid("submit an entry"));
        };
        let stage = &self.stages[index];

        let skipped = match Command::parse(input) {
            Command::Cancel => {
                self.state = OrchestratorState::Cancelled;
                return Ok(Transition::Cancelled);
            }
            Command::Help => return Ok(Transition::HelpRequested),
            Command::Skip => true,
            Command::Entry(_) => false,
        };

        let text = match stage.kind {
            StageKind::Probe { question } => {
                format!("{} → {}", question, ProbeAnswer::coerce(input).as_str())
            }
            StageKind::Impression | StageKind::Summary => input.to_string(),
        };

        self.state = self.stage_or_awaiting(index + 1);
        Ok(Transition::Advanced {
            note: PendingNote {
                stage: stage.ordinal,
                text,
            },
            skipped,
        })
    }

    pub fn mark_scored(&mut self) -> Result<(), MachineError> {
        if self.state != OrchestratorState::AwaitingScore {
            return Err(self.invalid("mark scored"));
        }
        self.state = OrchestratorState::Scored;
        Ok(())
    }

    fn stage_or_awaiting(&self, index: usize) -> OrchestratorState {
        if index < self.stages.len() {
            OrchestratorState::Stage(index)
        } else {
            OrchestratorState::AwaitingScore
        }
    }

    fn invalid(&self, action: &'static str) -> MachineError {
        MachineError::InvalidTransition {
            state: self.state,
            action,
        }
    }
}
