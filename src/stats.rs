//! Aggregates for the statistics views.

use std::collections::HashMap;

use chrono::{DateTime, Datelike, TimeZone, Timelike, Utc};
use serde::{Deserialize, Serialize};

use crate::{history::HistoryEntry, identity::domain_of, tags::TagCountMap};

const MONTHS: [&str; 12] = [
    "Jan", "Feb", "Mar", "Apr", "May", "Jun", "Jul", "Aug", "Sep", "Oct", "Nov", "Dec",
];

const WEEKDAYS: [&str; 7] = [
    "Sunday",
    "Monday",
    "Tuesday",
    "Wednesday",
    "Thursday",
    "Friday",
    "Saturday",
];

/// Number of tags in the bar chart
pub const TOP_TAGS: usize = 10;
/// Tags need strictly more occurrences than this to show up in the pie chart
pub const PIE_MIN_COUNT: u64 = 4;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Count {
    pub name: String,
    pub value: u64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Stats {
    pub total_entries: usize,
    /// Most frequent tags first
    pub top_tags: Vec<Count>,
    /// Tags above `PIE_MIN_COUNT`, least frequent first
    pub tag_share: Vec<Count>,
    /// Pages per host, most frequent first
    pub domains: Vec<Count>,
    pub by_month: Vec<Count>,
    pub by_weekday: Vec<Count>,
    /// 2-hour buckets starting at midnight
    pub by_time_of_day: Vec<Count>,
}

/// host -> number of entries on that host. Unparsable urls are not counted.
pub fn domain_counts(entries: &[HistoryEntry]) -> HashMap<String, u64> {
    let mut counts = HashMap::new();
    for entry in entries {
        if let Some(domain) = domain_of(&entry.url) {
            *counts.entry(domain).or_insert(0) += 1;
        }
    }
    counts
}

/// Descending by value, ties by name.
fn ranked<I: IntoIterator<Item = (String, u64)>>(counts: I) -> Vec<Count> {
    let mut ranked = counts
        .into_iter()
        .map(|(name, value)| Count { name, value })
        .collect::<Vec<_>>();
    ranked.sort_by(|a, b| b.value.cmp(&a.value).then_with(|| a.name.cmp(&b.name)));
    ranked
}

pub fn top_tags(counts: &TagCountMap, n: usize) -> Vec<Count> {
    let mut top = ranked(counts.iter().map(|(tag, count)| (tag.clone(), *count)));
    top.truncate(n);
    top
}

pub fn tag_share(counts: &TagCountMap) -> Vec<Count> {
    let mut share = ranked(
        counts
            .iter()
            .filter(|(_, count)| **count > PIE_MIN_COUNT)
            .map(|(tag, count)| (tag.clone(), *count)),
    );
    share.reverse();
    share
}

fn time_of_day_label(bucket: usize) -> String {
    let hour = bucket * 2;
    let suffix = if hour < 12 { "AM" } else { "PM" };
    let display = match hour % 12 {
        0 => 12,
        h => h,
    };
    format!("{display}{suffix}")
}

fn labelled(labels: impl Iterator<Item = String>, values: &[u64]) -> Vec<Count> {
    labels
        .zip(values)
        .map(|(name, value)| Count { name, value: *value })
        .collect()
}

/// Visit histograms by month, weekday and time of day in `tz`.
pub fn visit_histograms<Tz: TimeZone>(
    entries: &[HistoryEntry],
    tz: &Tz,
) -> (Vec<Count>, Vec<Count>, Vec<Count>) {
    let mut months = [0u64; 12];
    let mut weekdays = [0u64; 7];
    let mut times = [0u64; 12];

    for entry in entries {
        let Some(at) = DateTime::<Utc>::from_timestamp_millis(entry.last_visit_time as i64) else {
            log::debug!("entry {} has an invalid visit time", entry.id);
            continue;
        };
        let at = at.with_timezone(tz);

        months[at.month0() as usize] += 1;
        weekdays[at.weekday().num_days_from_sunday() as usize] += 1;
        times[at.hour() as usize / 2] += 1;
    }

    (
        labelled(MONTHS.iter().map(|m| m.to_string()), &months),
        labelled(WEEKDAYS.iter().map(|d| d.to_string()), &weekdays),
        labelled((0..12).map(time_of_day_label), &times),
    )
}

pub fn compute<Tz: TimeZone>(entries: &[HistoryEntry], tags: &TagCountMap, tz: &Tz) -> Stats {
    let (by_month, by_weekday, by_time_of_day) = visit_histograms(entries, tz);

    Stats {
        total_entries: entries.len(),
        top_tags: top_tags(tags, TOP_TAGS),
        tag_share: tag_share(tags),
        domains: ranked(domain_counts(entries)),
        by_month,
        by_weekday,
        by_time_of_day,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(id: u32, url: &str, last_visit_time: f64) -> HistoryEntry {
        HistoryEntry {
            id,
            title: format!("page {id}"),
            url: url.to_string(),
            tags: vec![],
            scores: vec![],
            last_visit_time,
            embedding: None,
        }
    }

    #[test]
    fn test_domain_counts() {
        let entries = vec![
            entry(1, "https://github.com/a", 0.0),
            entry(2, "https://github.com/b", 0.0),
            entry(3, "https://news.ycombinator.com/", 0.0),
            entry(4, "not a url", 0.0),
        ];

        let counts = domain_counts(&entries);
        assert_eq!(counts.len(), 2);
        assert_eq!(counts["github.com"], 2);
        assert_eq!(counts["news.ycombinator.com"], 1);
    }

    #[test]
    fn test_tag_views() {
        let tags = TagCountMap::from([
            ("NEWS".to_string(), 9),
            ("TECH".to_string(), 12),
            ("FOOD".to_string(), 5),
            ("SPORTS".to_string(), 4),
        ]);

        let top = top_tags(&tags, 2);
        assert_eq!(
            top,
            vec![
                Count { name: "TECH".into(), value: 12 },
                Count { name: "NEWS".into(), value: 9 },
            ]
        );

        let share = tag_share(&tags);
        assert_eq!(
            share.iter().map(|c| c.name.as_str()).collect::<Vec<_>>(),
            vec!["FOOD", "NEWS", "TECH"]
        );
    }

    #[test]
    fn test_time_of_day_labels() {
        let labels = (0..12).map(time_of_day_label).collect::<Vec<_>>();
        assert_eq!(labels[0], "12AM");
        assert_eq!(labels[1], "2AM");
        assert_eq!(labels[6], "12PM");
        assert_eq!(labels[11], "10PM");
    }

    #[test]
    fn test_visit_histograms() {
        // 2024-01-07 10:30 UTC (Sunday), 2024-03-13 23:10 UTC (Wednesday)
        let entries = vec![
            entry(1, "https://a.com", 1_704_623_400_000.0),
            entry(2, "https://b.com", 1_710_371_400_000.0),
        ];

        let (months, weekdays, times) = visit_histograms(&entries, &Utc);
        assert_eq!(months.len(), 12);
        assert_eq!(months[0].value, 1);
        assert_eq!(months[2].value, 1);
        assert_eq!(weekdays[0], Count { name: "Sunday".into(), value: 1 });
        assert_eq!(weekdays[3].value, 1);
        assert_eq!(times[5], Count { name: "10AM".into(), value: 1 });
        assert_eq!(times[11].value, 1);
    }

    #[test]
    fn test_compute() {
        let entries = vec![entry(1, "https://a.com/x", 1_704_623_400_000.0)];
        let tags = TagCountMap::from([("NEWS".to_string(), 1)]);

        let stats = compute(&entries, &tags, &Utc);
        assert_eq!(stats.total_entries, 1);
        assert_eq!(stats.domains, vec![Count { name: "a.com".into(), value: 1 }]);
        assert!(stats.tag_share.is_empty());
        assert_eq!(stats.top_tags.len(), 1);
    }
}
