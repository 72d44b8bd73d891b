use std::{collections::BTreeMap, sync::Arc};

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{
    classify::LabelScores,
    identity::stable_id,
    records::{self, KEY_DATA},
    storage::{KvStore, StoreError},
};

/// One page, keyed by the stable id of its title.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub id: u32,
    pub title: String,
    pub url: String,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub scores: Vec<f32>,
    /// epoch milliseconds
    #[serde(rename = "lastVisitTime", default)]
    pub last_visit_time: f64,
    #[serde(default)]
    pub embedding: Option<Vec<f32>>,
}

#[derive(Debug, Clone)]
pub struct UpsertOutcome {
    pub entry: HistoryEntry,
    /// Tags of the entry this upsert replaced, if there was one.
    pub previous_tags: Option<Vec<String>>,
}

impl UpsertOutcome {
    /// Tags of the new entry that the replaced entry didn't have.
    pub fn new_tags(&self) -> Vec<String> {
        match &self.previous_tags {
            None => self.entry.tags.clone(),
            Some(previous) => self
                .entry
                .tags
                .iter()
                .filter(|tag| !previous.contains(tag))
                .cloned()
                .collect(),
        }
    }
}

fn round4(score: f32) -> f32 {
    (score * 10_000.0).round() / 10_000.0
}

/// History entries persisted under the `data` key.
///
/// Every mutation is a whole-map read-modify-write, so callers must
/// serialize writers (see `app::writer`).
#[derive(Clone)]
pub struct HistoryStore {
    store: Arc<dyn KvStore>,
}

impl HistoryStore {
    pub fn new(store: Arc<dyn KvStore>) -> Self {
        Self { store }
    }

    /// Decode the `data` map. Entries that fail to decode are logged and skipped.
    fn load(&self) -> Result<BTreeMap<u32, HistoryEntry>, StoreError> {
        let mut values = self.store.get(&[KEY_DATA])?;
        let raw = match values.remove(KEY_DATA) {
            None | Some(Value::Null) => return Ok(BTreeMap::new()),
            Some(raw) => raw,
        };

        let payload = match records::unwrap_payload(KEY_DATA, raw)? {
            Value::Object(map) => map,
            Value::Null => return Ok(BTreeMap::new()),
            other => {
                return Err(StoreError::Corrupted {
                    key: KEY_DATA.to_string(),
                    reason: format!("expected an object, got {}", kind_of(&other)),
                })
            }
        };

        let mut entries = BTreeMap::new();
        for (key, value) in payload {
            match serde_json::from_value::<HistoryEntry>(value) {
                Ok(entry) => {
                    entries.insert(entry.id, entry);
                }
                Err(err) => log::warn!("skipping corrupted history entry {key}: {err}"),
            }
        }

        Ok(entries)
    }

    fn save(&self, entries: &BTreeMap<u32, HistoryEntry>) -> Result<(), StoreError> {
        records::save(self.store.as_ref(), KEY_DATA, entries)
    }

    /// Insert or fully replace the entry for `title`.
    ///
    /// Tags and scores come from `labels` in classifier order, scores rounded
    /// to 4 decimals. A `None` embedding keeps the previously stored one.
    pub fn upsert(
        &self,
        title: &str,
        url: &str,
        last_visit_time: f64,
        labels: &LabelScores,
        embedding: Option<Vec<f32>>,
    ) -> Result<UpsertOutcome, StoreError> {
        let id = stable_id(title);
        let mut entries = self.load()?;
        let previous = entries.remove(&id);

        let (tags, scores): (Vec<String>, Vec<f32>) = labels
            .iter()
            .map(|(label, score)| (label.to_string(), round4(score)))
            .unzip();

        let embedding =
            embedding.or_else(|| previous.as_ref().and_then(|prev| prev.embedding.clone()));

        let entry = HistoryEntry {
            id,
            title: title.to_string(),
            url: url.to_string(),
            tags,
            scores,
            last_visit_time,
            embedding,
        };

        entries.insert(id, entry.clone());
        self.save(&entries)?;

        log::debug!("stored history entry {id} ({title:?})");

        Ok(UpsertOutcome {
            entry,
            previous_tags: previous.map(|prev| prev.tags),
        })
    }

    pub fn get_by_id(&self, id: u32) -> Result<Option<HistoryEntry>, StoreError> {
        Ok(self.load()?.remove(&id))
    }

    pub fn get_all(&self) -> Result<Vec<HistoryEntry>, StoreError> {
        Ok(self.load()?.into_values().collect())
    }

    /// All entries, most recently visited first.
    pub fn get_recent(&self) -> Result<Vec<HistoryEntry>, StoreError> {
        let mut entries = self.get_all()?;
        entries.sort_by(|a, b| b.last_visit_time.total_cmp(&a.last_visit_time));
        Ok(entries)
    }
}

fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
