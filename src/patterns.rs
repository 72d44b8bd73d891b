use std::{collections::BTreeMap, sync::Arc};

use chrono::{DateTime, Datelike, TimeZone, Timelike, Utc};
use serde::{Deserialize, Serialize};

use crate::{
    records::{self, KEY_BROWSING_PATTERNS},
    storage::{KvStore, StoreError},
};

pub const DAYS: u8 = 7;
pub const HOURS: u8 = 24;

#[derive(Debug, thiserror::Error)]
pub enum PatternError {
    #[error("day {0} is out of range 0..=6")]
    DayOutOfRange(u8),

    #[error("hour {0} is out of range 0..=23")]
    HourOutOfRange(u8),

    #[error("store error: {0}")]
    Store(#[from] StoreError),
}

/// day of week (0 = Sunday) -> hour of day -> visited entry ids, in visit order
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PatternIndex(BTreeMap<u8, BTreeMap<u8, Vec<u32>>>);

impl PatternIndex {
    pub fn bucket(&self, day: u8, hour: u8) -> &[u32] {
        self.0
            .get(&day)
            .and_then(|hours| hours.get(&hour))
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    pub fn push(&mut self, day: u8, hour: u8, entry_id: u32) -> Result<(), PatternError> {
        if day >= DAYS {
            return Err(PatternError::DayOutOfRange(day));
        }
        if hour >= HOURS {
            return Err(PatternError::HourOutOfRange(hour));
        }

        self.0
            .entry(day)
            .or_default()
            .entry(hour)
            .or_default()
            .push(entry_id);
        Ok(())
    }

    /// Total number of recorded visits.
    pub fn len(&self) -> usize {
        self.0.values().flat_map(|hours| hours.values()).map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// `(day, hour)` bucket of an epoch-milliseconds timestamp in `tz`.
pub fn bucket_of<Tz: TimeZone>(epoch_ms: f64, tz: &Tz) -> Option<(u8, u8)> {
    let at = DateTime::<Utc>::from_timestamp_millis(epoch_ms as i64)?.with_timezone(tz);
    Some((at.weekday().num_days_from_sunday() as u8, at.hour() as u8))
}

/// Browsing pattern index under the `browsingPatterns` key. Append-only.
#[derive(Clone)]
pub struct PatternStore {
    store: Arc<dyn KvStore>,
}

impl PatternStore {
    pub fn new(store: Arc<dyn KvStore>) -> Self {
        Self { store }
    }

    pub fn load(&self) -> Result<PatternIndex, StoreError> {
        records::load_or_default(self.store.as_ref(), KEY_BROWSING_PATTERNS)
    }

    pub fn record_visit(&self, day: u8, hour: u8, entry_id: u32) -> Result<(), PatternError> {
        let mut index: PatternIndex =
            records::load_for_update(self.store.as_ref(), KEY_BROWSING_PATTERNS)?;
        index.push(day, hour, entry_id)?;
        records::save(self.store.as_ref(), KEY_BROWSING_PATTERNS, &index)?;
        Ok(())
    }
}
