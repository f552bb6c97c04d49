//! Cohort z-scores
//!
//! Answers "how does this athlete compare with the rest of the squad on the
//! same day", so the default cohort key is the calendar date, not the athlete.

use std::collections::HashMap;
use std::hash::Hash;

use crate::models::{Metric, WellnessRecord};
use crate::stats;

/// Z-score column for `metric`, grouped by an arbitrary cohort key.
///
/// Uses the population standard deviation. Rows with a missing key or value,
/// and every row of a zero-variance cohort, get `None`.
pub fn zscore_by<K, F>(records: &[WellnessRecord], metric: Metric, key: F) -> Vec<Option<f64>>
where
  K: Eq + Hash,
  F: Fn(&WellnessRecord) -> Option<K>,
{
  let mut cohorts: HashMap<K, Vec<f64>> = HashMap::new();
  for record in records {
    if let (Some(k), Some(v)) = (key(record), record.metric(metric)) {
      cohorts.entry(k).or_default().push(v);
    }
  }

  let moments: HashMap<K, (f64, f64)> = cohorts
    .into_iter()
    .filter_map(|(k, values)| {
      let mean = stats::mean(&values)?;
      let std = stats::population_std(&values)?;
      Some((k, (mean, std)))
    })
    .collect();

  records
    .iter()
    .map(|record| {
      let value = record.metric(metric)?;
      let (mean, std) = moments.get(&key(record)?)?;
      (*std > 0.0).then(|| (value - mean) / std)
    })
    .collect()
}

/// Z-score against the same-date cohort
pub fn zscore_by_date(records: &[WellnessRecord], metric: Metric) -> Vec<Option<f64>> {
  zscore_by(records, metric, |r| r.date)
}
