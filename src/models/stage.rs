use serde::{Deserialize, Serialize};

use super::rubric::Category;

/// Static description of one step in the elicitation sequence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StageDefinition {
    /// Stage number recorded with the note. Probe sub-stages share one ordinal.
    pub ordinal: u8,
    pub title: &'static str,
    /// The rubric axis this stage mostly feeds, if any.
    pub category: Option<Category>,
    pub kind: StageKind,
    pub prompt: &'static str,
    pub example: &'static str,
    pub help: &'static str,
    pub duration_secs: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StageKind {
    /// Free-text impressions.
    Impression,
    /// A yes / no / unsure question.
    Probe { question: &'static str },
    /// Closing one or two sentence synthesis.
    Summary,
}

impl StageDefinition {
    pub fn is_probe(&self) -> bool {
        matches!(self.kind, StageKind::Probe { .. })
    }
}

/// The fixed stage sequence every session walks through.
pub const STAGES: &[StageDefinition] = &[
    StageDefinition {
        ordinal: 1,
        title: "Stage 1 – Ideogram",
        category: None,
        kind: StageKind::Impression,
        prompt: "On paper draw a half-second spontaneous squiggle.\n\
                 Then type 1–3 feeling or motion words (no nouns).",
        example: "flowing   sharp",
        help: "Just make a quick mark and describe how it felt to make it: flowing, sharp, curved.",
        duration_secs: 15,
    },
    StageDefinition {
        ordinal: 2,
        title: "Stage 2 – Sensory",
        category: Some(Category::Sensory),
        kind: StageKind::Impression,
        prompt: "List raw sensory adjectives: texture, temperature, smell, sound, colour.\n\
                 Separate with commas, no sentences.",
        example: "gritty, cold, metallic, humming",
        help: "Focus on pure sensations like colours, textures, sounds, temperatures. Avoid naming things.",
        duration_secs: 60,
    },
    StageDefinition {
        ordinal: 3,
        title: "Stage 3 – Dimensional",
        category: Some(Category::Shape),
        kind: StageKind::Impression,
        prompt: "Describe major shapes and directions. Avoid object names.",
        example: "tall vertical plane, arch-shaped curve",
        help: "Describe shapes and their arrangement without naming what they are: vertical structures, horizontal planes.",
        duration_secs: 60,
    },
    StageDefinition {
        ordinal: 4,
        title: "Stage 4 – Functional / Ambience",
        category: Some(Category::Concept),
        kind: StageKind::Impression,
        prompt: "Note generic function or atmosphere (avoid guessing the site).",
        example: "gathering place, energy flow",
        help: "Focus on what happens here or how it feels: a place of movement, storage, connection.",
        duration_secs: 45,
    },
    StageDefinition {
        ordinal: 5,
        title: "Stage 5 – Targeted Probes",
        category: None,
        kind: StageKind::Probe {
            question: "Is the dominant environment INDOORS?",
        },
        prompt: "Answer quickly: y = yes   n = no   u = unsure",
        example: "y",
        help: "Trust your first intuitive answer: yes, no or unsure.",
        duration_secs: 8,
    },
    StageDefinition {
        ordinal: 5,
        title: "Stage 5 – Targeted Probes",
        category: None,
        kind: StageKind::Probe {
            question: "Is WATER a key element?",
        },
        prompt: "Answer quickly: y = yes   n = no   u = unsure",
        example: "n",
        help: "Trust your first intuitive answer: yes, no or unsure.",
        duration_secs: 8,
    },
    StageDefinition {
        ordinal: 5,
        title: "Stage 5 – Targeted Probes",
        category: None,
        kind: StageKind::Probe {
            question: "Is primary movement VERTICAL?",
        },
        prompt: "Answer quickly: y = yes   n = no   u = unsure",
        example: "u",
        help: "Trust your first intuitive answer: yes, no or unsure.",
        duration_secs: 8,
    },
    StageDefinition {
        ordinal: 6,
        title: "Stage 6 – Summary",
        category: None,
        kind: StageKind::Summary,
        prompt: "In one or two sentences, combine your strongest impressions.",
        example: "cold blue water below a tall jagged structure",
        help: "Synthesize the impressions that stood out most across all stages.",
        duration_secs: 90,
    },
];

/// Constrained answer to a probe question.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ProbeAnswer {
    Yes,
    No,
    Unsure,
}

impl ProbeAnswer {
    /// Coerce free text into a probe answer.
    ///
    /// The single-letter console shortcuts win first; after that an
    /// affirmative substring means yes and a negative substring means no.
    /// Containment is deliberately loose: "unknown" contains "no".
    pub fn coerce(input: &str) -> Self {
        let answer = input.trim().to_lowercase();
        match answer.as_str() {
            "y" => return Self::Yes,
            "n" => return Self::No,
            "u" => return Self::Unsure,
            _ => {}
        }

        if answer.contains("yes") || answer.contains("yeah") {
            Self::Yes
        } else if answer.contains("no") || answer.contains("nope") {
            Self::No
        } else {
            Self::Unsure
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Yes => "yes",
            Self::No => "no",
            Self::Unsure => "unsure",
        }
    }
}
