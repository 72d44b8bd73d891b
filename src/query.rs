//! Read-side queries over history entries and the browsing pattern index.
//!
//! Everything here is a pure function of its inputs; callers load the
//! entries and patterns from the stores first.

use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Datelike, TimeZone, Timelike};
use serde::{Deserialize, Serialize};

use crate::{
    history::HistoryEntry,
    patterns::{PatternIndex, DAYS, HOURS},
    semantic::cosine_similarity,
};

/// Similarity search keeps results scoring strictly above this by default.
pub const DEFAULT_MIN_SCORE: f32 = 0.2;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimilarityHit {
    pub id: u32,
    pub url: String,
    pub title: String,
    pub score: f32,
}

#[derive(Debug, Clone)]
pub struct RecommendOptions {
    /// Hours on each side of the current one included in the time window
    pub neighbor_hours: u8,
    /// Minimum visits within the window
    pub min_occurrences: usize,
    /// Similarity threshold for the context half of `combined_recommend`
    pub min_score: f32,
    pub limit: Option<usize>,
}

impl Default for RecommendOptions {
    fn default() -> Self {
        Self {
            neighbor_hours: 1,
            min_occurrences: 1,
            min_score: DEFAULT_MIN_SCORE,
            limit: None,
        }
    }
}

/// Entries carrying every tag in `required`, in input order.
pub fn filter_by_tags<'a, S: AsRef<str>>(
    entries: &'a [HistoryEntry],
    required: &[S],
) -> Vec<&'a HistoryEntry> {
    entries
        .iter()
        .filter(|entry| {
            required
                .iter()
                .all(|tag| entry.tags.iter().any(|t| t == tag.as_ref()))
        })
        .collect()
}

/// Rank entries by cosine similarity to `query`.
///
/// Entries without an embedding are skipped. Only scores strictly above
/// `min_score` are kept; equal scores keep their input order.
pub fn similarity_search(
    query: &[f32],
    entries: &[HistoryEntry],
    min_score: f32,
) -> Vec<SimilarityHit> {
    let mut hits = entries
        .iter()
        .filter_map(|entry| {
            let embedding = entry.embedding.as_ref()?;
            let score = cosine_similarity(query, embedding);
            (score > min_score).then(|| SimilarityHit {
                id: entry.id,
                url: entry.url.clone(),
                title: entry.title.clone(),
                score,
            })
        })
        .collect::<Vec<_>>();

    hits.sort_by(|a, b| b.score.total_cmp(&a.score));
    hits
}

/// Buckets around `(day, hour)`: the bucket itself, then neighbors by
/// increasing distance, earlier before later. Wraps across days and weeks.
fn window(day: u8, hour: u8, neighbor_hours: u8) -> Vec<(u8, u8)> {
    let week = DAYS as i32 * HOURS as i32;
    let center = day as i32 * HOURS as i32 + hour as i32;

    let mut offsets = vec![0];
    for distance in 1..=neighbor_hours as i32 {
        offsets.push(-distance);
        offsets.push(distance);
    }

    let mut seen = HashSet::new();
    offsets
        .into_iter()
        .map(|offset| (center + offset).rem_euclid(week))
        .filter(|slot| seen.insert(*slot))
        .map(|slot| ((slot / HOURS as i32) as u8, (slot % HOURS as i32) as u8))
        .collect()
}

/// Pages usually visited around this time of the week, most frequent first.
pub fn time_based_recommendations<Tz: TimeZone>(
    patterns: &PatternIndex,
    now: &DateTime<Tz>,
    opts: &RecommendOptions,
) -> Vec<u32> {
    let day = now.weekday().num_days_from_sunday() as u8;
    let hour = now.hour() as u8;

    // id -> (count, first position)
    let mut counts: HashMap<u32, (usize, usize)> = HashMap::new();
    let visits = window(day, hour, opts.neighbor_hours)
        .into_iter()
        .flat_map(|(day, hour)| patterns.bucket(day, hour).iter().copied());
    for (position, id) in visits.enumerate() {
        counts.entry(id).or_insert((0, position)).0 += 1;
    }

    let mut ranked = counts
        .into_iter()
        .filter(|(_, (count, _))| *count >= opts.min_occurrences)
        .collect::<Vec<_>>();
    ranked.sort_by(|a, b| b.1 .0.cmp(&a.1 .0).then(a.1 .1.cmp(&b.1 .1)));

    ranked.into_iter().map(|(id, _)| id).collect()
}

/// Similar pages first, then pages usual for this time, without duplicates.
///
/// With no `query` embedding only the time-based half contributes.
pub fn combined_recommend<Tz: TimeZone>(
    query: Option<&[f32]>,
    entries: &[HistoryEntry],
    patterns: &PatternIndex,
    now: &DateTime<Tz>,
    opts: &RecommendOptions,
) -> Vec<u32> {
    let similar = query
        .map(|query| similarity_search(query, entries, opts.min_score))
        .unwrap_or_default();

    let mut seen = HashSet::new();
    let ids = similar
        .into_iter()
        .map(|hit| hit.id)
        .chain(time_based_recommendations(patterns, now, opts))
        .filter(|id| seen.insert(*id));

    match opts.limit {
        Some(limit) => ids.take(limit).collect(),
        None => ids.collect(),
    }
}
