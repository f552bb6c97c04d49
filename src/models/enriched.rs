use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::record::{Metric, WellnessRecord, WellnessTable};
use crate::{trends, zscores};

/// ---------------------------------------------------------------------------
/// Trend
/// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Trend {
  Up,
  Down,
  Flat,
}

impl Trend {
  pub fn as_str(&self) -> &'static str {
    match self {
      Trend::Up => "UP",
      Trend::Down => "DOWN",
      Trend::Flat => "FLAT",
    }
  }

  pub fn parse(s: &str) -> Option<Self> {
    match s.trim().to_uppercase().as_str() {
      "UP" => Some(Trend::Up),
      "DOWN" => Some(Trend::Down),
      "FLAT" => Some(Trend::Flat),
      _ => None,
    }
  }

  pub fn arrow(&self) -> &'static str {
    match self {
      Trend::Up => "▲",
      Trend::Down => "▼",
      Trend::Flat => "▬",
    }
  }
}

/// Render a value with its trend arrow, e.g. "7.5 ▲"
pub fn format_with_trend(value: Option<f64>, trend: Option<Trend>, decimals: usize) -> String {
  let value = match value {
    Some(v) if v.is_finite() => v,
    _ => return String::new(),
  };

  let value_str = format!("{:.*}", decimals, value);

  match trend {
    Some(t) => format!("{} {}", value_str, t.arrow()),
    None => value_str,
  }
}

/// ---------------------------------------------------------------------------
/// Enriched Table
/// ---------------------------------------------------------------------------

/// A record plus its derived trend and cohort z-score columns.
/// Absent map entries are nulls.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnrichedRecord {
  pub record: WellnessRecord,
  #[serde(default)]
  pub trends: BTreeMap<Metric, Trend>,
  #[serde(default)]
  pub zscores: BTreeMap<Metric, f64>,
}

impl EnrichedRecord {
  pub fn trend(&self, metric: Metric) -> Option<Trend> {
    self.trends.get(&metric).copied()
  }

  pub fn zscore(&self, metric: Metric) -> Option<f64> {
    self.zscores.get(&metric).copied()
  }
}

/// Fresh copy of a `WellnessTable` with derived columns appended.
/// Row order matches the source table.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EnrichedTable {
  pub rows: Vec<EnrichedRecord>,
  pub extra_columns: Vec<String>,
}

impl EnrichedTable {
  /// Derive trends and date-cohort z-scores for every derived metric
  pub fn build(table: &WellnessTable) -> Self {
    let records = &table.records;
    let mut rows: Vec<EnrichedRecord> = records
      .iter()
      .cloned()
      .map(|record| EnrichedRecord {
        record,
        trends: BTreeMap::new(),
        zscores: BTreeMap::new(),
      })
      .collect();

    for metric in Metric::DERIVED {
      let trend_col = trends::compute_trend(records, metric);
      let z_col = zscores::zscore_by_date(records, metric);

      for (row, (trend, z)) in rows.iter_mut().zip(trend_col.into_iter().zip(z_col)) {
        if let Some(t) = trend {
          row.trends.insert(metric, t);
        }
        if let Some(z) = z {
          row.zscores.insert(metric, z);
        }
      }
    }

    Self {
      rows,
      extra_columns: table.extra_columns.clone(),
    }
  }

  pub fn len(&self) -> usize {
    self.rows.len()
  }

  pub fn is_empty(&self) -> bool {
    self.rows.is_empty()
  }

  /// Rows for one athlete, in table order
  pub fn for_athlete<'a>(&'a self, athlete: &'a str) -> impl Iterator<Item = &'a EnrichedRecord> + 'a {
    self.rows.iter().filter(move |r| r.record.belongs_to(athlete))
  }

  /// Sorted distinct athlete names
  pub fn athletes(&self) -> Vec<String> {
    let mut names: Vec<String> = self
      .rows
      .iter()
      .filter_map(|r| r.record.athlete.clone())
      .collect();
    names.sort();
    names.dedup();
    names
  }

  pub fn latest_date(&self) -> Option<NaiveDate> {
    self.rows.iter().filter_map(|r| r.record.date).max()
  }

  /// Mean readiness across athletes for each date
  pub fn team_readiness_by_date(&self) -> BTreeMap<NaiveDate, f64> {
    let mut sums: BTreeMap<NaiveDate, (f64, usize)> = BTreeMap::new();
    for row in &self.rows {
      if let (Some(date), Some(r)) = (row.record.date, row.record.readiness) {
        let entry = sums.entry(date).or_insert((0.0, 0));
        entry.0 += r;
        entry.1 += 1;
      }
    }
    sums
      .into_iter()
      .map(|(date, (sum, n))| (date, sum / n as f64))
      .collect()
  }

  /// Mean of each summary metric over all rows, skipping nulls
  pub fn metric_averages(&self) -> BTreeMap<Metric, f64> {
    let mut out = BTreeMap::new();
    for metric in Metric::SUMMARY {
      let values: Vec<f64> = self.rows.iter().filter_map(|r| r.record.metric(metric)).collect();
      if let Some(mean) = crate::stats::mean(&values) {
        out.insert(metric, mean);
      }
    }
    out
  }

  /// Latest row (by date) for an athlete
  pub fn latest_for<'a>(&'a self, athlete: &'a str) -> Option<&'a EnrichedRecord> {
    let latest = self.for_athlete(athlete).filter_map(|r| r.record.date).max()?;
    self
      .for_athlete(athlete)
      .find(|r| r.record.date == Some(latest))
  }

  /// Trends on the athlete's latest date
  pub fn latest_trends(&self, athlete: &str) -> BTreeMap<Metric, Trend> {
    self
      .latest_for(athlete)
      .map(|r| r.trends.clone())
      .unwrap_or_default()
  }

  /// Cohort z-scores on the athlete's latest date
  pub fn latest_zscores(&self, athlete: &str) -> BTreeMap<Metric, f64> {
    self
      .latest_for(athlete)
      .map(|r| r.zscores.clone())
      .unwrap_or_default()
  }
}
