use std::{collections::BTreeMap, sync::Arc};

use crate::{
    records::{self, KEY_TAGS_COUNT_MAP},
    storage::{KvStore, StoreError},
};

/// tag -> number of times it was newly observed on a page
pub type TagCountMap = BTreeMap<String, u64>;

/// Cumulative tag histogram under the `tagsCountMap` key. Counts only grow.
#[derive(Clone)]
pub struct TagIndex {
    store: Arc<dyn KvStore>,
}

impl TagIndex {
    pub fn new(store: Arc<dyn KvStore>) -> Self {
        Self { store }
    }

    /// First occurrence of a tag counts as 1, every later one adds 1.
    pub fn record_tags<S: AsRef<str>>(&self, labels: &[S]) -> Result<(), StoreError> {
        if labels.is_empty() {
            return Ok(());
        }

        let mut counts: TagCountMap =
            records::load_for_update(self.store.as_ref(), KEY_TAGS_COUNT_MAP)?;
        for label in labels {
            *counts.entry(label.as_ref().to_string()).or_insert(0) += 1;
        }

        records::save(self.store.as_ref(), KEY_TAGS_COUNT_MAP, &counts)
    }

    pub fn counts(&self) -> Result<TagCountMap, StoreError> {
        records::load_or_default(self.store.as_ref(), KEY_TAGS_COUNT_MAP)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::BackendMemory;
    use serde_json::json;
    use std::collections::HashMap;

    fn index() -> TagIndex {
        TagIndex::new(Arc::new(BackendMemory::new()))
    }

    #[test]
    fn test_record_tags_accumulates() {
        let tags = index();
        tags.record_tags(&["NEWS", "TECH"]).unwrap();
        tags.record_tags(&["NEWS", "TECH"]).unwrap();
        tags.record_tags(&["NEWS"]).unwrap();

        let counts = tags.counts().unwrap();
        assert_eq!(counts.len(), 2);
        assert_eq!(counts["NEWS"], 3);
        assert_eq!(counts["TECH"], 2);
    }

    #[test]
    fn test_corrupted_counts_start_over() {
        let store = Arc::new(BackendMemory::new());
        store
            .set(HashMap::from([(KEY_TAGS_COUNT_MAP.to_string(), json!("oops"))]))
            .unwrap();

        let tags = TagIndex::new(store.clone());
        assert!(tags.counts().unwrap().is_empty());

        tags.record_tags(&["NEWS"]).unwrap();
        assert_eq!(tags.counts().unwrap()["NEWS"], 1);

        let aside = records::corrupt_key(KEY_TAGS_COUNT_MAP);
        assert_eq!(store.get(&[aside.as_str()]).unwrap()[&aside], json!("oops"));
    }

    #[test]
    fn test_empty_store_has_no_counts() {
        assert!(index().counts().unwrap().is_empty());
    }
}
