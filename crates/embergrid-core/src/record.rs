use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// One (date, count) pair from the activity feed.
///
/// Dates carry no time component and are bucketed in UTC. Several records
/// for the same date are tolerated; the grid builder applies last-write-wins
/// when it constructs its lookup, so the feed never has to be pre-deduped.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ActivityRecord {
    pub date: NaiveDate,

    pub count: u64,

    /// Which importer or aggregator produced the record. Informational.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,

    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

impl ActivityRecord {
    #[must_use]
    pub fn new(date: NaiveDate, count: u64) -> Self {
        Self {
            date,
            count,
            source: None,
            extra: BTreeMap::new(),
        }
    }
}
