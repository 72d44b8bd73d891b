//! Zero-shot classification collaborators.
//!
//! - `embedding`: local classifier scoring labels by embedding similarity
//! - `remote`: HTTP zero-shot endpoint (inference-API request/response shape)

mod embedding;
mod remote;

pub use embedding::EmbeddingClassifier;
pub use remote::RemoteClassifier;

use serde::{Deserialize, Serialize};

use crate::semantic::EmbeddingError;

/// Built-in label vocabulary, used until the user customizes it.
pub const DEFAULT_LABELS: [&str; 29] = [
    "AFFAIR",
    "AGRICULTURE",
    "ARTS_AND_CULTURE",
    "NEWS",
    "BUSINESS",
    "ECONOMY",
    "EDUCATION",
    "ELECTIONS",
    "ENTERTAINMENT",
    "ENVIRONMENT",
    "FOOD",
    "HEALTH",
    "INTERNATIONAL",
    "LAW_AND_ORDER",
    "MILITARY",
    "OPINION",
    "POLITICS",
    "REGIONAL",
    "RELIGION",
    "SCIENCE",
    "SOCIAL_MEDIA",
    "SOCIETY",
    "SPORTS",
    "TECH",
    "TOURISM",
    "TRANSPORT",
    "TRAVEL",
    "WEATHER",
    "CRIME",
];

pub fn default_labels() -> Vec<String> {
    DEFAULT_LABELS.iter().map(|l| l.to_string()).collect()
}

/// Ordered classifier output, best label first.
///
/// The order is whatever the classifier produced; consumers must not re-sort.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LabelScores {
    pub labels: Vec<String>,
    pub scores: Vec<f32>,
}

impl LabelScores {
    pub fn from_pairs<I, S>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (S, f32)>,
        S: Into<String>,
    {
        let (labels, scores) = pairs
            .into_iter()
            .map(|(label, score)| (label.into(), score))
            .unzip();
        Self { labels, scores }
    }

    /// Label/score pairs in classifier order. Unpaired trailing values are dropped.
    pub fn iter(&self) -> impl Iterator<Item = (&str, f32)> {
        self.labels
            .iter()
            .map(String::as_str)
            .zip(self.scores.iter().copied())
    }

    pub fn len(&self) -> usize {
        self.labels.len().min(self.scores.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Keep the first `n` pairs.
    pub fn truncate(mut self, n: usize) -> Self {
        self.labels.truncate(n);
        self.scores.truncate(n);
        self
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ClassifyError {
    #[error("no candidate labels to classify against")]
    NoLabels,

    #[error("classifier request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("classifier returned an invalid response: {0}")]
    InvalidResponse(String),

    #[error("classifier is not configured: {0}")]
    NotConfigured(String),

    #[error("embedding error: {0}")]
    Embedding(#[from] EmbeddingError),
}

pub trait Classifier: Send + Sync {
    fn classify(&self, text: &str, labels: &[String]) -> Result<LabelScores, ClassifyError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_pairs_keeps_order() {
        let scores = LabelScores::from_pairs([("TECH", 0.9), ("EDUCATION", 0.6)]);
        assert_eq!(scores.labels, vec!["TECH", "EDUCATION"]);
        assert_eq!(scores.scores, vec![0.9, 0.6]);
    }

    #[test]
    fn test_iter_drops_unpaired() {
        let scores = LabelScores {
            labels: vec!["A".into(), "B".into()],
            scores: vec![0.5],
        };
        assert_eq!(scores.len(), 1);
        assert_eq!(scores.iter().collect::<Vec<_>>(), vec![("A", 0.5)]);
    }

    #[test]
    fn test_truncate() {
        let scores = LabelScores::from_pairs([("A", 0.5), ("B", 0.3), ("C", 0.2)]).truncate(2);
        assert_eq!(scores.labels, vec!["A", "B"]);
    }

    #[test]
    fn test_default_labels() {
        let labels = default_labels();
        assert_eq!(labels.len(), 29);
        assert_eq!(labels.first().map(String::as_str), Some("AFFAIR"));
    }
}
