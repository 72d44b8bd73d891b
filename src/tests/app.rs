use std::{
    collections::HashMap,
    sync::{Arc, RwLock},
};

use chrono::Local;
use serde_json::json;

use crate::app::{AppBackend, AppError, AppFactory, AppPaths, HistoryQuery, Visit};
use crate::classify::default_labels;
use crate::identity::stable_id;
use crate::patterns::{bucket_of, PatternStore};
use crate::records::{corrupt_key, KEY_BROWSING_PATTERNS, KEY_CUSTOM_LABELS, KEY_TAGS_COUNT_MAP};
use crate::semantic::ModelResources;
use crate::storage::BackendLocal;

use super::*;

const HOUR_MS: f64 = 60.0 * 60.0 * 1000.0;

fn visit(title: &str, url: &str, last_visit_time: f64) -> Visit {
    Visit {
        title: title.to_string(),
        url: url.to_string(),
        last_visit_time,
    }
}

#[test]
fn test_visit_creates_entry() {
    let (app, _) = create_app();
    let now = now_ms();

    let outcome = app
        .visit(visit("Rust Guide", "https://rust-lang.org/guide", now))
        .unwrap();

    assert_eq!(outcome.id, stable_id("Rust Guide"));
    let entry = outcome.entry.unwrap();
    assert_eq!(entry.tags, vec!["TECH", "NEWS"]);
    assert_eq!(entry.scores, vec![0.9, 0.1]);
    assert_eq!(entry.last_visit_time, now);
    assert!(entry.embedding.is_some());

    assert_eq!(app.entry(outcome.id).unwrap(), entry);
}

#[test]
fn test_revisit_replaces_entry_and_counts_new_tags_once() {
    let (app, _) = create_app();

    app.visit(visit("Rust Guide", "https://rust-lang.org/guide", 1000.0))
        .unwrap();
    let outcome = app
        .visit(visit("Rust Guide", "https://doc.rust-lang.org/book", 2000.0))
        .unwrap();

    let entry = outcome.entry.unwrap();
    assert_eq!(entry.url, "https://doc.rust-lang.org/book");
    assert_eq!(entry.last_visit_time, 2000.0);
    assert_eq!(app.history(HistoryQuery::default()).unwrap().len(), 1);

    let counts = app.tag_counts().unwrap();
    assert_eq!(counts["TECH"], 1);
    assert_eq!(counts["NEWS"], 1);
}

#[test]
fn test_visit_without_title_is_rejected() {
    let (app, kv) = create_app();

    let result = app.visit(visit("  ", "https://example.com", now_ms()));
    assert!(matches!(result, Err(AppError::MalformedInput(_))));
    assert!(PatternStore::new(kv).load().unwrap().is_empty());
}

#[test]
fn test_failed_classification_still_records_pattern() {
    let resources = Arc::new(ModelResources::with_collaborators(
        None,
        Arc::new(FailingClassifier),
    ));
    let (app, kv) = create_app_with(resources);
    let now = now_ms();

    let outcome = app
        .visit(visit("Rust Guide", "https://rust-lang.org/guide", now))
        .unwrap();
    assert!(outcome.entry.is_none());
    assert!(matches!(app.entry(outcome.id), Err(AppError::NotFound)));
    assert!(app.tag_counts().unwrap().is_empty());

    let (day, hour) = bucket_of(now, &Local).unwrap();
    let patterns = PatternStore::new(kv).load().unwrap();
    assert_eq!(patterns.bucket(day, hour), &[outcome.id]);

    assert!(app.classify("Rust Guide", "https://rust-lang.org").unwrap().is_empty());
}

#[test]
fn test_classify_does_not_store() {
    let (app, _) = create_app();

    let scores = app.classify("Daily news", "https://example.com").unwrap();
    assert_eq!(scores.labels, vec!["NEWS", "TECH"]);
    assert!(app.history(HistoryQuery::default()).unwrap().is_empty());
}

#[test]
fn test_simi_search() {
    let (app, _) = create_app();
    let now = now_ms();

    app.visit(visit("Rust Guide", "https://rust-lang.org/guide", now))
        .unwrap();
    app.visit(visit("World news", "https://example.com/world", now))
        .unwrap();

    let hits = app.simi_search("rust", None).unwrap();
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].title, "Rust Guide");
    assert!((hits[0].score - 1.0).abs() < 1e-6);

    // the news page scores 0.0, which passes a negative threshold
    let hits = app.simi_search("rust", Some(-0.5)).unwrap();
    assert_eq!(hits.len(), 2);
    assert_eq!(hits[0].title, "Rust Guide");

    assert!(matches!(
        app.simi_search("   ", None),
        Err(AppError::MalformedInput(_))
    ));
}

#[test]
fn test_simi_search_without_embeddings() {
    let resources = Arc::new(ModelResources::with_collaborators(
        None,
        Arc::new(KeywordClassifier),
    ));
    let (app, _) = create_app_with(resources);

    let outcome = app
        .visit(visit("Rust Guide", "https://rust-lang.org/guide", now_ms()))
        .unwrap();
    assert!(outcome.entry.unwrap().embedding.is_none());
    assert!(app.simi_search("rust", None).unwrap().is_empty());
}

#[test]
fn test_history_filters_by_tags_and_orders_by_recency() {
    let (app, _) = create_app();

    app.visit(visit("Rust Guide", "https://rust-lang.org", 1000.0))
        .unwrap();
    app.visit(visit("World news", "https://example.com/world", 3000.0))
        .unwrap();
    app.visit(visit("Pasta recipes", "https://example.com/food", 2000.0))
        .unwrap();

    let titles = |query: HistoryQuery| {
        app.history(query)
            .unwrap()
            .into_iter()
            .map(|entry| entry.title)
            .collect::<Vec<_>>()
    };

    assert_eq!(
        titles(HistoryQuery::default()),
        vec!["World news", "Pasta recipes", "Rust Guide"]
    );
    assert_eq!(
        titles(HistoryQuery {
            tags: vec!["NEWS".to_string()],
            limit: None,
        }),
        vec!["World news", "Pasta recipes", "Rust Guide"]
    );
    assert_eq!(
        titles(HistoryQuery {
            tags: vec!["NEWS".to_string(), "TECH".to_string()],
            limit: None,
        }),
        vec!["World news", "Rust Guide"]
    );
    assert_eq!(
        titles(HistoryQuery {
            tags: vec![],
            limit: Some(1),
        }),
        vec!["World news"]
    );
}

#[test]
fn test_recommend_for_current_hour() {
    let (app, _) = create_app();
    let now = now_ms();

    let rust = app
        .visit(visit("Rust Guide", "https://rust-lang.org", now))
        .unwrap();
    let news = app
        .visit(visit("World news", "https://example.com/world", now))
        .unwrap();

    let ids = app
        .recommend(None, None)
        .unwrap()
        .into_iter()
        .map(|entry| entry.id)
        .collect::<Vec<_>>();
    assert_eq!(ids, vec![rust.id, news.id]);

    let limited = app.recommend(None, Some(1)).unwrap();
    assert_eq!(limited.len(), 1);
}

#[test]
fn test_recommend_skips_unclassified_pages() {
    let resources = Arc::new(ModelResources::with_collaborators(
        None,
        Arc::new(FailingClassifier),
    ));
    let (app, _) = create_app_with(resources);

    app.visit(visit("Rust Guide", "https://rust-lang.org", now_ms()))
        .unwrap();
    assert!(app.recommend(None, None).unwrap().is_empty());
}

#[test]
fn test_labels() {
    let (app, _) = create_app();
    assert_eq!(app.labels().unwrap(), default_labels());

    let saved = app
        .set_labels(vec![
            " NEWS ".to_string(),
            "TECH".to_string(),
            "NEWS".to_string(),
            "".to_string(),
        ])
        .unwrap();
    assert_eq!(saved, vec!["NEWS", "TECH"]);
    assert_eq!(app.labels().unwrap(), saved);

    assert!(matches!(
        app.set_labels(vec![" ".to_string()]),
        Err(AppError::MalformedInput(_))
    ));
    assert_eq!(app.labels().unwrap(), saved);
}

#[test]
fn test_import_window_and_skips() {
    let (app, _) = create_app();
    let now = now_ms();

    let summary = app
        .import(vec![
            visit("Rust Guide", "https://rust-lang.org", now - HOUR_MS),
            visit("", "https://example.com/untitled", now - 2.0 * HOUR_MS),
            visit("World news", "https://example.com/world", now - 3.0 * HOUR_MS),
            visit("Old pasta", "https://example.com/old", now - 40.0 * 24.0 * HOUR_MS),
        ])
        .unwrap();

    assert_eq!(summary.considered, 3);
    assert_eq!(summary.classified, 2);
    assert_eq!(summary.skipped, 1);
    assert_eq!(summary.unclassified, 0);

    let titles = app
        .history(HistoryQuery::default())
        .unwrap()
        .into_iter()
        .map(|entry| entry.title)
        .collect::<Vec<_>>();
    assert_eq!(titles, vec!["Rust Guide", "World news"]);
}

#[test]
fn test_import_drops_future_and_unrepresentable_times() {
    let (app, _) = create_app();
    let now = now_ms();

    let summary = app
        .import(vec![
            visit("Rust Guide", "https://rust-lang.org", now - HOUR_MS),
            visit("Far future", "https://example.com/far", 1e20),
            visit("Tomorrow news", "https://example.com/tomorrow", now + 24.0 * HOUR_MS),
            visit("No time", "https://example.com/nan", f64::NAN),
            visit("World news", "https://example.com/world", now - 2.0 * HOUR_MS),
        ])
        .unwrap();

    assert_eq!(summary.considered, 2);
    assert_eq!(summary.classified, 2);
    assert_eq!(summary.skipped, 0);

    let titles = app
        .history(HistoryQuery::default())
        .unwrap()
        .into_iter()
        .map(|entry| entry.title)
        .collect::<Vec<_>>();
    assert_eq!(titles, vec!["Rust Guide", "World news"]);
}

#[test]
fn test_import_future_times_do_not_take_slots() {
    let (app, _) = create_app();
    let now = now_ms();

    let mut visits = (0..60)
        .map(|i| {
            visit(
                &format!("future {i}"),
                "https://example.com",
                now + (i + 1) as f64 * HOUR_MS,
            )
        })
        .collect::<Vec<_>>();
    visits.push(visit("Rust Guide", "https://rust-lang.org", now - HOUR_MS));

    let summary = app.import(visits).unwrap();
    assert_eq!(summary.considered, 1);
    assert_eq!(app.history(HistoryQuery::default()).unwrap()[0].title, "Rust Guide");
}

#[test]
fn test_import_keeps_most_recent() {
    let (app, _) = create_app();
    let now = now_ms();

    let visits = (0..60)
        .map(|i| {
            visit(
                &format!("page {i}"),
                "https://example.com",
                now - i as f64 * HOUR_MS,
            )
        })
        .collect::<Vec<_>>();

    let summary = app.import(visits).unwrap();
    assert_eq!(summary.considered, 50);

    let history = app.history(HistoryQuery::default()).unwrap();
    assert_eq!(history.len(), 50);
    assert_eq!(history[0].title, "page 0");
    assert_eq!(history[49].title, "page 49");
}

#[test]
fn test_visit_recovers_from_corrupted_indexes() {
    let (app, kv) = create_app();
    kv.set(HashMap::from([
        (KEY_BROWSING_PATTERNS.to_string(), json!([1, 2, 3])),
        (KEY_TAGS_COUNT_MAP.to_string(), json!({"version": 1, "value": "oops"})),
        (KEY_CUSTOM_LABELS.to_string(), json!({"version": 1, "value": 42})),
    ]))
    .unwrap();

    // reads degrade to empty values
    assert!(app.tag_counts().unwrap().is_empty());
    assert!(app.recommend(None, None).unwrap().is_empty());
    assert_eq!(app.labels().unwrap(), default_labels());

    let now = now_ms();
    let outcome = app
        .visit(visit("Rust Guide", "https://rust-lang.org/guide", now))
        .unwrap();
    assert_eq!(app.entry(outcome.id).unwrap().title, "Rust Guide");

    let (day, hour) = bucket_of(now, &Local).unwrap();
    let patterns = PatternStore::new(kv.clone()).load().unwrap();
    assert_eq!(patterns.bucket(day, hour), &[outcome.id]);
    assert_eq!(app.tag_counts().unwrap()["TECH"], 1);

    let patterns_aside = corrupt_key(KEY_BROWSING_PATTERNS);
    let tags_aside = corrupt_key(KEY_TAGS_COUNT_MAP);
    let kept = kv.get(&[patterns_aside.as_str(), tags_aside.as_str()]).unwrap();
    assert_eq!(kept[&patterns_aside], json!([1, 2, 3]));
    assert_eq!(kept[&tags_aside], json!({"version": 1, "value": "oops"}));

    // a second visit must not clobber the saved copy with the repaired value
    app.visit(visit("World news", "https://example.com/world", now))
        .unwrap();
    let kept = kv.get(&[patterns_aside.as_str()]).unwrap();
    assert_eq!(kept[&patterns_aside], json!([1, 2, 3]));
}

#[test]
fn test_stats() {
    let (app, _) = create_app();

    app.visit(visit("Rust Guide", "https://rust-lang.org/a", now_ms()))
        .unwrap();
    app.visit(visit("Rust book", "https://rust-lang.org/b", now_ms()))
        .unwrap();

    let stats = app.stats().unwrap();
    assert_eq!(stats.total_entries, 2);
    assert_eq!(stats.domains[0].name, "rust-lang.org");
    assert_eq!(stats.domains[0].value, 2);
    assert_eq!(stats.top_tags[0].name, "NEWS");
    assert_eq!(stats.top_tags[0].value, 2);
}

#[test]
fn test_data_survives_restart() {
    let tmp = tempfile::tempdir().unwrap();
    let paths = AppPaths::new(tmp.path().to_str().unwrap().to_string());
    let config = AppFactory::create_config(&paths.base_path).unwrap();

    let id = {
        let kv = Arc::new(BackendLocal::new(&paths.data_path).unwrap());
        let app = AppLocal::new(config.clone(), kv, stub_resources()).unwrap();
        let outcome = app
            .visit(visit("Rust Guide", "https://rust-lang.org", now_ms()))
            .unwrap();
        app.shutdown();
        outcome.id
    };

    let kv = Arc::new(BackendLocal::new(&paths.data_path).unwrap());
    assert!(kv.exists("data"));
    assert!(kv.exists("tagsCountMap"));
    assert!(kv.exists("browsingPatterns"));
    assert!(kv.exists("customLabels"));

    let app = AppLocal::new(Arc::new(RwLock::new(Config::default())), kv, stub_resources())
        .unwrap();
    assert_eq!(app.entry(id).unwrap().title, "Rust Guide");
    assert_eq!(app.tag_counts().unwrap()["TECH"], 1);
}
