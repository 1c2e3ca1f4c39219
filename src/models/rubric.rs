use serde::{Deserialize, Serialize};

/// The four fixed rubric axes.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    Color,
    Shape,
    Concept,
    Sensory,
}

impl Category {
    pub const ALL: [Category; 4] = [
        Category::Color,
        Category::Shape,
        Category::Concept,
        Category::Sensory,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Color => "color",
            Self::Shape => "shape",
            Self::Concept => "concept",
            Self::Sensory => "sensory",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "color" => Some(Self::Color),
            "shape" => Some(Self::Shape),
            "concept" => Some(Self::Concept),
            "sensory" => Some(Self::Sensory),
            _ => None,
        }
    }
}

/// Per-category integer scores, each on the 0..=3 scale.
///
/// Serializes as a flat `{"color": n, "shape": n, ...}` map.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Rubric {
    pub color: u8,
    pub shape: u8,
    pub concept: u8,
    pub sensory: u8,
}

impl Rubric {
    pub fn get(&self, category: Category) -> u8 {
        match category {
            Category::Color => self.color,
            Category::Shape => self.shape,
            Category::Concept => self.concept,
            Category::Sensory => self.sensory,
        }
    }

    pub fn set(&mut self, category: Category, score: u8) {
        match category {
            Category::Color => self.color = score,
            Category::Shape => self.shape = score,
            Category::Concept => self.concept = score,
            Category::Sensory => self.sensory = score,
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (Category, u8)> + '_ {
        Category::ALL.into_iter().map(|c| (c, self.get(c)))
    }

    pub fn mean(&self) -> f64 {
        let sum: u32 = self.iter().map(|(_, s)| s as u32).sum();
        sum as f64 / Category::ALL.len() as f64
    }
}
