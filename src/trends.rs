//! Per-athlete trend detection
//!
//! Each observation is compared with the same athlete's immediately
//! preceding observation (by date). Row order outside an athlete's own
//! history does not matter.

use std::cmp::Ordering;
use std::collections::HashMap;

use crate::models::{Metric, Trend, WellnessRecord};

/// Classify `current` against `previous`; either side missing -> `None`
pub fn classify(previous: Option<f64>, current: Option<f64>) -> Option<Trend> {
  let (prev, curr) = (previous?, current?);
  match curr.partial_cmp(&prev)? {
    Ordering::Greater => Some(Trend::Up),
    Ordering::Less => Some(Trend::Down),
    Ordering::Equal => Some(Trend::Flat),
  }
}

/// Trend column for `metric`, parallel to `records`.
///
/// Rows without an athlete get `None`. Within an athlete, rows are ordered by
/// date (stable, undated rows last) and each is compared with its predecessor.
pub fn compute_trend(records: &[WellnessRecord], metric: Metric) -> Vec<Option<Trend>> {
  let mut out = vec![None; records.len()];

  let mut by_athlete: HashMap<&str, Vec<usize>> = HashMap::new();
  for (i, record) in records.iter().enumerate() {
    if let Some(athlete) = record.athlete.as_deref() {
      by_athlete.entry(athlete).or_default().push(i);
    }
  }

  for indices in by_athlete.values_mut() {
    indices.sort_by(|a, b| match (records[*a].date, records[*b].date) {
      (Some(x), Some(y)) => x.cmp(&y),
      (Some(_), None) => Ordering::Less,
      (None, Some(_)) => Ordering::Greater,
      (None, None) => Ordering::Equal,
    });

    for pair in indices.windows(2) {
      let (prev, curr) = (pair[0], pair[1]);
      out[curr] = classify(records[prev].metric(metric), records[curr].metric(metric));
    }
  }

  out
}
