use serde::{Deserialize, Serialize};

use crate::{
    classify::LabelScores, history::HistoryEntry, query::SimilarityHit, stats::Stats,
    tags::TagCountMap,
};

use super::errors::AppError;

pub trait AppBackend: Send + Sync {
    /// Record a page visit: update the browsing pattern index, then classify,
    /// embed and store the page.
    fn visit(&self, visit: Visit) -> anyhow::Result<VisitOutcome, AppError>;

    /// Classify a page against the current label vocabulary without storing it.
    fn classify(&self, title: &str, url: &str) -> anyhow::Result<LabelScores, AppError>;

    fn simi_search(
        &self,
        query: &str,
        min_score: Option<f32>,
    ) -> anyhow::Result<Vec<SimilarityHit>, AppError>;

    fn recommend(
        &self,
        query: Option<String>,
        limit: Option<usize>,
    ) -> anyhow::Result<Vec<HistoryEntry>, AppError>;

    fn history(&self, query: HistoryQuery) -> anyhow::Result<Vec<HistoryEntry>, AppError>;
    fn entry(&self, id: u32) -> anyhow::Result<HistoryEntry, AppError>;
    fn tag_counts(&self) -> anyhow::Result<TagCountMap, AppError>;
    fn stats(&self) -> anyhow::Result<Stats, AppError>;
    fn labels(&self) -> anyhow::Result<Vec<String>, AppError>;
    fn set_labels(&self, labels: Vec<String>) -> anyhow::Result<Vec<String>, AppError>;
    fn import(&self, visits: Vec<Visit>) -> anyhow::Result<ImportSummary, AppError>;
}

/// A visited page as reported by the browser.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Visit {
    #[serde(default)]
    pub title: String,
    pub url: String,
    /// epoch milliseconds
    #[serde(rename = "lastVisitTime")]
    pub last_visit_time: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VisitOutcome {
    pub id: u32,
    /// The stored entry, `None` when classification failed.
    pub entry: Option<HistoryEntry>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HistoryQuery {
    /// Entries must carry all of these
    #[serde(default)]
    pub tags: Vec<String>,
    pub limit: Option<usize>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ImportSummary {
    /// Visits left after the time window and the result limit
    pub considered: usize,
    pub classified: usize,
    /// No title
    pub skipped: usize,
    /// Recorded, but classification was unavailable
    pub unclassified: usize,
}
