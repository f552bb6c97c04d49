//! Time-bounded memo of narrative responses
//!
//! Owned by the caller and passed in explicitly. Entries expire after the TTL
//! and are dropped all at once on refresh.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

pub const DEFAULT_TTL_SECS: i64 = 3600;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InsightKind {
  Individual,
  Team,
  Comparison,
}

impl InsightKind {
  pub fn as_str(&self) -> &'static str {
    match self {
      InsightKind::Individual => "individual",
      InsightKind::Team => "team",
      InsightKind::Comparison => "comparison",
    }
  }
}

/// The summarizer's filter parameters
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct InsightKey {
  pub kind: InsightKind,
  pub athlete: Option<String>,
  pub other: Option<String>,
  pub period_days: i64,
}

impl InsightKey {
  pub fn individual(athlete: &str, period_days: i64) -> Self {
    Self {
      kind: InsightKind::Individual,
      athlete: Some(athlete.to_string()),
      other: None,
      period_days,
    }
  }

  pub fn team(period_days: i64) -> Self {
    Self {
      kind: InsightKind::Team,
      athlete: None,
      other: None,
      period_days,
    }
  }

  pub fn comparison(first: &str, second: &str, period_days: i64) -> Self {
    Self {
      kind: InsightKind::Comparison,
      athlete: Some(first.to_string()),
      other: Some(second.to_string()),
      period_days,
    }
  }
}

#[derive(Debug, Clone)]
struct CacheEntry {
  text: String,
  stored_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct InsightCache {
  ttl: Duration,
  entries: HashMap<InsightKey, CacheEntry>,
}

impl Default for InsightCache {
  fn default() -> Self {
    Self::new(Duration::seconds(DEFAULT_TTL_SECS))
  }
}

impl InsightCache {
  pub fn new(ttl: Duration) -> Self {
    Self {
      ttl,
      entries: HashMap::new(),
    }
  }

  /// Fresh entry for `key` at `now`, if any
  pub fn get(&self, key: &InsightKey, now: DateTime<Utc>) -> Option<&str> {
    let entry = self.entries.get(key)?;
    if now - entry.stored_at < self.ttl {
      Some(entry.text.as_str())
    } else {
      None
    }
  }

  pub fn put(&mut self, key: InsightKey, text: String, now: DateTime<Utc>) {
    self.entries.insert(key, CacheEntry { text, stored_at: now });
  }

  /// Remove entries that are past their TTL
  pub fn purge_expired(&mut self, now: DateTime<Utc>) {
    let ttl = self.ttl;
    self.entries.retain(|_, e| now - e.stored_at < ttl);
  }

  pub fn invalidate_all(&mut self) {
    if !self.entries.is_empty() {
      tracing::debug!(count = self.entries.len(), "invalidating insight cache");
    }
    self.entries.clear();
  }

  pub fn len(&self) -> usize {
    self.entries.len()
  }

  pub fn is_empty(&self) -> bool {
    self.entries.is_empty()
  }
}
