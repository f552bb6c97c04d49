//! Deterministic insight layer for wellness data
//!
//! Reduces the enriched table into compact digests. The narrative generator
//! only ever sees these digests; it interprets pre-computed numbers rather
//! than doing math itself.

use chrono::{Duration, NaiveDate};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::models::{EnrichedRecord, EnrichedTable, Metric, Trend};
use crate::stats::{self, round_to};

pub const DEFAULT_PERIOD_DAYS: i64 = 14;

/// Minimum |r| for a correlation to be reported
const CORRELATION_THRESHOLD: f64 = 0.3;

/// Correlations need strictly more complete rows than this
const MIN_CORRELATION_ROWS: usize = 3;

/// Metrics correlated against Readiness
const CORRELATED: [Metric; 4] = [Metric::Sleep, Metric::Mood, Metric::Energy, Metric::Stress];

/// Metrics averaged in the team digest
const TEAM_METRICS: [Metric; 5] = [
  Metric::Sleep,
  Metric::Mood,
  Metric::Energy,
  Metric::Stress,
  Metric::Readiness,
];

/// Athletes whose mean readiness sits further than this below the team mean
const OUTLIER_MARGIN: f64 = 1.5;

/// ---------------------------------------------------------------------------
/// Digest Types
/// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DateRange {
  pub start: NaiveDate,
  pub end: NaiveDate,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DigestContext {
  /// Athlete name, or "Team" when unfiltered
  pub athlete: String,
  pub period_days: i64,
  pub data_points: usize,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub date_range: Option<DateRange>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricStats {
  pub mean: f64,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub std: Option<f64>,
  pub min: f64,
  pub max: f64,
}

impl MetricStats {
  fn from_values(values: &[f64]) -> Option<Self> {
    Some(Self {
      mean: round_to(stats::mean(values)?, 2),
      std: stats::sample_std(values).map(|s| round_to(s, 2)),
      min: round_to(stats::min(values)?, 2),
      max: round_to(stats::max(values)?, 2),
    })
  }
}

/// Sleep duration statistics, in hours except for the spread
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SleepPattern {
  pub avg_duration_hours: f64,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub consistency_std_minutes: Option<f64>,
  pub shortest_hours: f64,
  pub longest_hours: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Patterns {
  #[serde(skip_serializing_if = "Option::is_none")]
  pub sleep: Option<SleepPattern>,

  /// Mean readiness keyed by weekday name
  #[serde(skip_serializing_if = "Option::is_none")]
  pub weekly_readiness: Option<BTreeMap<String, f64>>,
}

impl Patterns {
  pub fn is_empty(&self) -> bool {
    self.sleep.is_none() && self.weekly_readiness.is_none()
  }
}

/// Structured summary handed to the narrative generator.
/// Every nested key is omitted when its source data is missing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Digest {
  pub context: DigestContext,
  #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
  pub current_status: BTreeMap<Metric, f64>,
  #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
  pub trends: BTreeMap<Metric, Trend>,
  #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
  pub averages: BTreeMap<Metric, MetricStats>,
  #[serde(default, skip_serializing_if = "Patterns::is_empty")]
  pub patterns: Patterns,
  #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
  pub correlations: BTreeMap<String, f64>,
  #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
  pub z_scores: BTreeMap<Metric, f64>,
}

impl Digest {
  pub fn to_json(&self) -> String {
    serde_json::to_string_pretty(self).unwrap_or_default()
  }
}

/// ---------------------------------------------------------------------------
/// Individual Digest
/// ---------------------------------------------------------------------------

/// Rows inside the lookback window, optionally for one athlete.
///
/// The window ends at the latest date in the selection. Undated rows fall
/// outside any window; if nothing is dated the whole selection is kept.
fn window<'a>(table: &'a EnrichedTable, athlete: Option<&str>, days: i64) -> Vec<&'a EnrichedRecord> {
  let selected: Vec<&EnrichedRecord> = table
    .rows
    .iter()
    .filter(|r| athlete.map_or(true, |a| r.record.belongs_to(a)))
    .collect();

  let Some(end) = selected.iter().filter_map(|r| r.record.date).max() else {
    return selected;
  };
  let cutoff = end - Duration::days(days);

  selected
    .into_iter()
    .filter(|r| r.record.date.is_some_and(|d| d >= cutoff))
    .collect()
}

fn values(rows: &[&EnrichedRecord], metric: Metric) -> Vec<f64> {
  rows.iter().filter_map(|r| r.record.metric(metric)).collect()
}

/// Build the digest for one athlete (or the whole squad) over `days`
pub fn summarize(table: &EnrichedTable, athlete: Option<&str>, days: i64) -> Digest {
  let rows = window(table, athlete, days);

  let dates: Vec<NaiveDate> = rows.iter().filter_map(|r| r.record.date).collect();
  let date_range = match (dates.iter().min(), dates.iter().max()) {
    (Some(start), Some(end)) => Some(DateRange {
      start: *start,
      end: *end,
    }),
    _ => None,
  };

  let mut digest = Digest {
    context: DigestContext {
      athlete: athlete.unwrap_or("Team").to_string(),
      period_days: days,
      data_points: rows.len(),
      date_range,
    },
    current_status: BTreeMap::new(),
    trends: BTreeMap::new(),
    averages: BTreeMap::new(),
    patterns: Patterns::default(),
    correlations: BTreeMap::new(),
    z_scores: BTreeMap::new(),
  };

  if let Some(latest) = rows.last() {
    for metric in Metric::SUMMARY {
      if let Some(v) = latest.record.metric(metric) {
        digest.current_status.insert(metric, round_to(v, 2));
      }
      if let Some(t) = latest.trend(metric) {
        digest.trends.insert(metric, t);
      }
    }
    for metric in Metric::DERIVED {
      if let Some(z) = latest.zscore(metric) {
        digest.z_scores.insert(metric, round_to(z, 2));
      }
    }
  }

  for metric in Metric::SUMMARY {
    if let Some(s) = MetricStats::from_values(&values(&rows, metric)) {
      digest.averages.insert(metric, s);
    }
  }

  digest.patterns.sleep = sleep_pattern(&values(&rows, Metric::SleepMinutes));
  digest.patterns.weekly_readiness = weekly_readiness(&rows);

  if athlete.is_some() && rows.len() > MIN_CORRELATION_ROWS {
    digest.correlations = readiness_correlations(&rows);
  }

  digest
}

fn sleep_pattern(minutes: &[f64]) -> Option<SleepPattern> {
  Some(SleepPattern {
    avg_duration_hours: round_to(stats::mean(minutes)? / 60.0, 1),
    consistency_std_minutes: stats::sample_std(minutes).map(|s| round_to(s, 0)),
    shortest_hours: round_to(stats::min(minutes)? / 60.0, 1),
    longest_hours: round_to(stats::max(minutes)? / 60.0, 1),
  })
}

fn weekly_readiness(rows: &[&EnrichedRecord]) -> Option<BTreeMap<String, f64>> {
  let mut by_day: BTreeMap<String, Vec<f64>> = BTreeMap::new();
  for row in rows {
    if let (Some(date), Some(r)) = (row.record.date, row.record.readiness) {
      by_day.entry(date.format("%A").to_string()).or_default().push(r);
    }
  }

  let out: BTreeMap<String, f64> = by_day
    .into_iter()
    .filter_map(|(day, vals)| Some((day, round_to(stats::mean(&vals)?, 2))))
    .collect();

  (!out.is_empty()).then_some(out)
}

/// Pearson r of each correlated metric against Readiness, over rows where
/// every available metric is present. Only |r| > 0.3 is reported.
fn readiness_correlations(rows: &[&EnrichedRecord]) -> BTreeMap<String, f64> {
  let mut out = BTreeMap::new();

  // A metric with no values in the window is treated as an absent column
  let available: Vec<Metric> = CORRELATED
    .into_iter()
    .chain(std::iter::once(Metric::Readiness))
    .filter(|m| rows.iter().any(|r| r.record.metric(*m).is_some()))
    .collect();

  if !available.contains(&Metric::Readiness) || available.len() < 2 {
    return out;
  }

  let complete: Vec<&EnrichedRecord> = rows
    .iter()
    .copied()
    .filter(|r| available.iter().all(|m| r.record.metric(*m).is_some()))
    .collect();

  if complete.len() <= MIN_CORRELATION_ROWS {
    return out;
  }

  let readiness = values(&complete, Metric::Readiness);
  for metric in available.iter().filter(|m| **m != Metric::Readiness) {
    let xs = values(&complete, *metric);
    if let Some(r) = stats::pearson(&xs, &readiness) {
      if r.abs() > CORRELATION_THRESHOLD {
        out.insert(format!("{}_to_Readiness", metric.as_str()), round_to(r, 2));
      }
    }
  }

  out
}

/// ---------------------------------------------------------------------------
/// Team Digest
/// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AthleteStatus {
  pub name: String,
  pub readiness: Option<f64>,
  pub trend: Option<Trend>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TeamDigest {
  pub num_athletes: usize,
  pub athletes: Vec<AthleteStatus>,
  pub team_averages: BTreeMap<Metric, f64>,
  /// Athletes well below the team mean readiness, with their own mean
  pub outliers: BTreeMap<String, f64>,
}

impl TeamDigest {
  pub fn to_json(&self) -> String {
    serde_json::to_string_pretty(self).unwrap_or_default()
  }
}

pub fn summarize_team(table: &EnrichedTable, days: i64) -> TeamDigest {
  let names = table.athletes();
  let recent = window(table, None, days);

  let team_averages = TEAM_METRICS
    .into_iter()
    .filter_map(|m| Some((m, round_to(stats::mean(&values(&recent, m))?, 2))))
    .collect();

  let athletes = names
    .iter()
    .map(|name| {
      let digest = summarize(table, Some(name), days);
      AthleteStatus {
        name: name.clone(),
        readiness: digest.current_status.get(&Metric::Readiness).copied(),
        trend: digest.trends.get(&Metric::Readiness).copied(),
      }
    })
    .collect();

  let mut outliers = BTreeMap::new();
  if let Some(team_mean) = stats::mean(&values(&recent, Metric::Readiness)) {
    for name in &names {
      let own: Vec<f64> = recent
        .iter()
        .filter(|r| r.record.belongs_to(name))
        .filter_map(|r| r.record.readiness)
        .collect();
      if let Some(mean) = stats::mean(&own) {
        if mean < team_mean - OUTLIER_MARGIN {
          outliers.insert(name.clone(), round_to(mean, 2));
        }
      }
    }
  }

  TeamDigest {
    num_athletes: names.len(),
    athletes,
    team_averages,
    outliers,
  }
}

/// ---------------------------------------------------------------------------
/// Comparison Digest
/// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NamedDigest {
  pub name: String,
  pub data: Digest,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComparisonDigest {
  pub athlete1: NamedDigest,
  pub athlete2: NamedDigest,
}

impl ComparisonDigest {
  pub fn to_json(&self) -> String {
    serde_json::to_string_pretty(self).unwrap_or_default()
  }
}

pub fn compare(table: &EnrichedTable, first: &str, second: &str, days: i64) -> ComparisonDigest {
  ComparisonDigest {
    athlete1: NamedDigest {
      name: first.to_string(),
      data: summarize(table, Some(first), days),
    },
    athlete2: NamedDigest {
      name: second.to_string(),
      data: summarize(table, Some(second), days),
    },
  }
}

/// ---------------------------------------------------------------------------
/// Tests
/// ---------------------------------------------------------------------------
