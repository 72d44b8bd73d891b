use crate::{
    classify::{default_labels, LabelScores},
    config::Config,
    history::HistoryEntry,
    identity::{classify_input, stable_id},
    patterns::bucket_of,
    query::{self, RecommendOptions, SimilarityHit},
    records::{self, KEY_CUSTOM_LABELS},
    semantic::ModelResources,
    stats::{self, Stats},
    storage::KvStore,
    tags::TagCountMap,
};

use super::writer::{Stores, Task, Writer};
use chrono::Local;
use indicatif::{ProgressBar, ProgressStyle};
use std::{
    collections::HashSet,
    sync::{Arc, RwLock},
};

use super::{backend::*, errors::AppError};

const DAY_MS: f64 = 24.0 * 60.0 * 60.0 * 1000.0;

pub struct AppLocal {
    stores: Stores,
    resources: Arc<ModelResources>,
    config: Arc<RwLock<Config>>,
    writer: Writer,
}

impl AppLocal {
    pub fn new(
        config: Arc<RwLock<Config>>,
        kv: Arc<dyn KvStore>,
        resources: Arc<ModelResources>,
    ) -> anyhow::Result<Self, AppError> {
        let stores = Stores::new(kv);
        let writer = Writer::start(stores.clone());

        let app = Self {
            stores,
            resources,
            config,
            writer,
        };
        app.init_labels()?;

        Ok(app)
    }

    /// Seed the label vocabulary on a fresh data directory.
    fn init_labels(&self) -> anyhow::Result<(), AppError> {
        let existing = self.stores.kv.get(&[KEY_CUSTOM_LABELS])?;
        if existing.contains_key(KEY_CUSTOM_LABELS) {
            return Ok(());
        }

        log::info!("initializing default labels");
        let labels = default_labels();
        self.writer
            .submit(|reply| Task::SetLabels { labels, reply })
    }

    /// Stop the writer after the queued writes are applied.
    pub fn shutdown(&self) {
        self.writer.shutdown();
    }

    fn read_config<T>(&self, read: impl FnOnce(&Config) -> T) -> anyhow::Result<T, AppError> {
        let config = self
            .config
            .read()
            .map_err(|err| anyhow::anyhow!("config lock poisoned: {err}"))?;
        Ok(read(&config))
    }

    /// Classify `text`, logging and swallowing collaborator failures.
    fn try_classify(&self, text: &str) -> anyhow::Result<Option<LabelScores>, AppError> {
        let labels = self.labels()?;

        let classifier = match self.resources.classifier() {
            Ok(classifier) => classifier,
            Err(err) => {
                log::warn!("classifier unavailable: {err}");
                return Ok(None);
            }
        };

        match classifier.classify(text, &labels) {
            Ok(scores) => Ok(Some(scores)),
            Err(err) => {
                log::warn!("failed to classify {text:?}: {err}");
                Ok(None)
            }
        }
    }

    fn entries_by_id(&self, ids: &[u32]) -> anyhow::Result<Vec<HistoryEntry>, AppError> {
        let mut entries = self
            .stores
            .history
            .get_all()?
            .into_iter()
            .map(|entry| (entry.id, entry))
            .collect::<std::collections::HashMap<_, _>>();

        Ok(ids.iter().filter_map(|id| entries.remove(id)).collect())
    }
}

fn normalize_labels(labels: Vec<String>) -> Vec<String> {
    let mut seen = HashSet::new();
    labels
        .into_iter()
        .map(|label| label.trim().to_string())
        .filter(|label| !label.is_empty())
        .filter(|label| seen.insert(label.clone()))
        .collect()
}

impl AppBackend for AppLocal {
    fn visit(&self, visit: Visit) -> anyhow::Result<VisitOutcome, AppError> {
        if visit.title.trim().is_empty() {
            return Err(AppError::MalformedInput("visit has no title".to_string()));
        }

        let id = stable_id(&visit.title);
        let (day, hour) = bucket_of(visit.last_visit_time, &Local).ok_or_else(|| {
            AppError::MalformedInput(format!(
                "lastVisitTime {} is out of range",
                visit.last_visit_time
            ))
        })?;

        // the pattern index counts every visit, classified or not
        self.writer.submit(|reply| Task::RecordVisit {
            day,
            hour,
            entry_id: id,
            reply,
        })?;

        let text = classify_input(&visit.title, &visit.url);
        let Some(labels) = self.try_classify(&text)? else {
            return Ok(VisitOutcome { id, entry: None });
        };
        let embedding = self.resources.try_embed(&text);

        let outcome = self.writer.submit(|reply| Task::Upsert {
            visit,
            labels,
            embedding,
            reply,
        })?;

        Ok(VisitOutcome {
            id,
            entry: Some(outcome.entry),
        })
    }

    fn classify(&self, title: &str, url: &str) -> anyhow::Result<LabelScores, AppError> {
        let text = classify_input(title, url);
        Ok(self.try_classify(&text)?.unwrap_or_default())
    }

    fn simi_search(
        &self,
        query: &str,
        min_score: Option<f32>,
    ) -> anyhow::Result<Vec<SimilarityHit>, AppError> {
        if query.trim().is_empty() {
            return Err(AppError::MalformedInput("query is empty".to_string()));
        }

        let Some(query_embedding) = self.resources.try_embed(query) else {
            return Ok(vec![]);
        };

        let min_score = min_score.unwrap_or(self.resources.default_threshold());
        let entries = self.stores.history.get_recent()?;

        Ok(query::similarity_search(
            &query_embedding,
            &entries,
            min_score,
        ))
    }

    fn recommend(
        &self,
        query: Option<String>,
        limit: Option<usize>,
    ) -> anyhow::Result<Vec<HistoryEntry>, AppError> {
        let opts = self.read_config(|config| RecommendOptions {
            neighbor_hours: config.recommend.neighbor_hours,
            min_occurrences: config.recommend.min_occurrences,
            min_score: config.semantic_search.default_threshold,
            limit: Some(limit.unwrap_or(config.recommend.limit)),
        })?;

        let query_embedding = query
            .as_deref()
            .filter(|query| !query.trim().is_empty())
            .and_then(|query| self.resources.try_embed(query));

        let entries = self.stores.history.get_recent()?;
        let patterns = self.stores.patterns.load()?;

        // time-based ids may point at pages that were never classified
        let ids = query::combined_recommend(
            query_embedding.as_deref(),
            &entries,
            &patterns,
            &Local::now(),
            &RecommendOptions { limit: None, ..opts.clone() },
        );
        let mut recommended = self.entries_by_id(&ids)?;
        if let Some(limit) = opts.limit {
            recommended.truncate(limit);
        }

        Ok(recommended)
    }

    fn history(&self, query: HistoryQuery) -> anyhow::Result<Vec<HistoryEntry>, AppError> {
        let entries = self.stores.history.get_recent()?;

        let mut filtered = query::filter_by_tags(&entries, query.tags.as_slice())
            .into_iter()
            .cloned()
            .collect::<Vec<_>>();
        if let Some(limit) = query.limit {
            filtered.truncate(limit);
        }

        Ok(filtered)
    }

    fn entry(&self, id: u32) -> anyhow::Result<HistoryEntry, AppError> {
        self.stores
            .history
            .get_by_id(id)?
            .ok_or(AppError::NotFound)
    }

    fn tag_counts(&self) -> anyhow::Result<TagCountMap, AppError> {
        Ok(self.stores.tags.counts()?)
    }

    fn stats(&self) -> anyhow::Result<Stats, AppError> {
        let entries = self.stores.history.get_all()?;
        let tags = self.stores.tags.counts()?;

        Ok(stats::compute(&entries, &tags, &Local))
    }

    fn labels(&self) -> anyhow::Result<Vec<String>, AppError> {
        let labels: Vec<String> =
            records::load_or_default(self.stores.kv.as_ref(), KEY_CUSTOM_LABELS)?;
        if labels.is_empty() {
            return Ok(default_labels());
        }
        Ok(labels)
    }

    fn set_labels(&self, labels: Vec<String>) -> anyhow::Result<Vec<String>, AppError> {
        let labels = normalize_labels(labels);
        if labels.is_empty() {
            return Err(AppError::MalformedInput(
                "at least one label is required".to_string(),
            ));
        }

        let saved = labels.clone();
        self.writer
            .submit(|reply| Task::SetLabels { labels, reply })?;

        Ok(saved)
    }

    fn import(&self, visits: Vec<Visit>) -> anyhow::Result<ImportSummary, AppError> {
        let (window_days, max_results) = self.read_config(|config| {
            (config.import.window_days, config.import.max_results)
        })?;

        let now = chrono::Utc::now().timestamp_millis() as f64;
        let since = now - window_days as f64 * DAY_MS;

        // future timestamps would otherwise sort first and take max_results slots
        let mut visits = visits
            .into_iter()
            .filter(|visit| (since..=now).contains(&visit.last_visit_time))
            .collect::<Vec<_>>();
        visits.sort_by(|a, b| b.last_visit_time.total_cmp(&a.last_visit_time));
        visits.truncate(max_results);

        let mut summary = ImportSummary {
            considered: visits.len(),
            ..Default::default()
        };

        let progress = ProgressBar::new(visits.len() as u64);
        progress.set_style(
            ProgressStyle::with_template("{bar:40} {pos}/{len} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_bar()),
        );

        // one at a time; every visit is a read-modify-write of the whole map
        for visit in visits {
            progress.set_message(visit.title.clone());

            if visit.title.trim().is_empty() {
                log::debug!("skipping untitled visit to {}", visit.url);
                summary.skipped += 1;
                progress.inc(1);
                continue;
            }

            let url = visit.url.clone();
            match self.visit(visit) {
                Ok(VisitOutcome { entry: Some(_), .. }) => summary.classified += 1,
                Ok(VisitOutcome { entry: None, .. }) => summary.unclassified += 1,
                Err(AppError::MalformedInput(reason)) => {
                    log::warn!("skipping visit to {url}: {reason}");
                    summary.skipped += 1;
                }
                Err(err) => {
                    progress.abandon();
                    return Err(err);
                }
            }
            progress.inc(1);
        }

        progress.finish_and_clear();
        log::info!(
            "imported {} visits ({} classified, {} skipped)",
            summary.considered,
            summary.classified,
            summary.skipped
        );

        Ok(summary)
    }
}
