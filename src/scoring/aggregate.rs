//! Rubric aggregation: raw similarities in, bounded rubric and total out.
//!
//! The bias/gain constants are empirically tuned. Changing any of them
//! changes every stored score, so [`ScoringParams::default`] pins the
//! reference values and tests assert against them.

use crate::models::{Category, Rubric};

/// Constants of the floor-and-scale transforms and the final blend.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScoringParams {
    /// Similarity below this maps to 0 for a category.
    pub category_bias: f64,
    pub category_gain: f64,
    /// Upper clamp of a category score.
    pub category_max: u8,
    pub overall_bias: f64,
    pub overall_gain: f64,
    /// Weight of the overall-similarity component in the total.
    pub overall_weight: f64,
    /// Weight of the mean category score in the total.
    pub category_weight: f64,
    /// Decimal digits the total is rounded to.
    pub total_decimals: i32,
}

impl Default for ScoringParams {
    fn default() -> Self {
        Self {
            category_bias: 0.3,
            category_gain: 4.0,
            category_max: 3,
            overall_bias: 0.25,
            overall_gain: 4.0,
            overall_weight: 0.5,
            category_weight: 0.5,
            total_decimals: 3,
        }
    }
}

impl ScoringParams {
    /// Integer score for one category.
    ///
    /// Order matters for matching stored scores: subtract the bias, clamp at
    /// 0, multiply by the gain, truncate, then clamp at the maximum. A
    /// similarity of 1.0 therefore scores 2, not 3.
    pub fn category_score(&self, similarity: f64) -> u8 {
        let scaled = (similarity - self.category_bias).max(0.0) * self.category_gain;
        (scaled.trunc() as u64).min(self.category_max as u64) as u8
    }

    /// Overall-similarity component of the total. Not clamped from above.
    pub fn overall_component(&self, similarity: f64) -> f64 {
        (similarity - self.overall_bias).max(0.0) * self.overall_gain
    }

    /// Rubric from raw per-category similarities.
    pub fn rubric(&self, similarities: &CategorySimilarities) -> Rubric {
        let mut rubric = Rubric::default();
        for category in Category::ALL {
            rubric.set(category, self.category_score(similarities.get(category)));
        }
        rubric
    }

    /// Weighted blend of the overall component and the mean category score.
    pub fn total(&self, overall_similarity: f64, rubric: &Rubric) -> f64 {
        let blended = self.overall_weight * self.overall_component(overall_similarity)
            + self.category_weight * rubric.mean();
        round_to(blended, self.total_decimals)
    }
}

/// Raw cosine similarity of the notes against each category text.
#[derive(Debug, Clone, Copy, Default, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct CategorySimilarities {
    pub color: f64,
    pub shape: f64,
    pub concept: f64,
    pub sensory: f64,
}

impl CategorySimilarities {
    pub fn get(&self, category: Category) -> f64 {
        match category {
            Category::Color => self.color,
            Category::Shape => self.shape,
            Category::Concept => self.concept,
            Category::Sensory => self.sensory,
        }
    }

    pub fn set(&mut self, category: Category, similarity: f64) {
        match category {
            Category::Color => self.color = similarity,
            Category::Shape => self.shape = similarity,
            Category::Concept => self.concept = similarity,
            Category::Sensory => self.sensory = similarity,
        }
    }
}

/// Round the exact binary value, ties to even, the way Python's `round` does.
///
/// Scaling first (`(x * 1000).round() / 1000`) rounds the scaled product
/// instead, which moves values such as `1.2345` (stored just below the tie)
/// up to `1.235`.
fn round_to(value: f64, decimals: i32) -> f64 {
    if decimals < 0 || !value.is_finite() {
        let factor = 10f64.powi(decimals);
        return (value * factor).round() / factor;
    }
    format!("{:.*}", decimals as usize, value)
        .parse()
        .unwrap_or(value)
}
