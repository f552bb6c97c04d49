//! Record assembly: raw blob -> canonical `WellnessTable`
//!
//! Runs column reconciliation, coerces every cell, derives SleepMinutes and
//! Readiness, drops blank rows and sorts by (date, athlete).

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::str::FromStr;

use crate::coerce::{coerce_rating, coerce_sleep_minutes, parse_timestamp};
use crate::columns::{reconcile, ColumnMapping};
use crate::models::{Field, Metric, RawTable, WellnessRecord, WellnessTable};
use crate::stats::round_to;

/// ---------------------------------------------------------------------------
/// Readiness
/// ---------------------------------------------------------------------------

/// Which composite readiness definition a load uses.
///
/// `Simple` is the canonical definition; `Weighted` is kept for squads whose
/// dashboards were built on the six-factor score. A single load never mixes them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReadinessFormula {
  #[default]
  Simple,
  Weighted,
}

impl FromStr for ReadinessFormula {
  type Err = String;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s.trim().to_lowercase().as_str() {
      "simple" | "average" | "4" => Ok(ReadinessFormula::Simple),
      "weighted" | "6" => Ok(ReadinessFormula::Weighted),
      other => Err(format!("Unknown readiness formula: {}", other)),
    }
  }
}

/// Six-factor weights; negative weights are applied to inverted ratings
const WEIGHTS: [(Metric, f64); 6] = [
  (Metric::Sleep, 0.25),
  (Metric::Mood, 0.15),
  (Metric::Energy, 0.20),
  (Metric::Stress, -0.15),
  (Metric::Soreness, -0.10),
  (Metric::Fatigue, -0.15),
];

impl ReadinessFormula {
  pub fn compute(&self, record: &WellnessRecord) -> Option<f64> {
    match self {
      ReadinessFormula::Simple => Some(simple_readiness(
        record.sleep?,
        record.mood?,
        record.energy?,
        record.stress?,
      )),
      ReadinessFormula::Weighted => weighted_readiness(record),
    }
  }

  /// Top of the score range: 10 for Simple, 100 for Weighted (`10 / sum(|w|)` with sum 1)
  pub fn max_score(&self) -> f64 {
    match self {
      ReadinessFormula::Simple => 10.0,
      ReadinessFormula::Weighted => 100.0,
    }
  }
}

/// `(Sleep + Mood + Energy + (10 - Stress)) / 4`
pub fn simple_readiness(sleep: f64, mood: f64, energy: f64, stress: f64) -> f64 {
  (sleep + mood + energy + (10.0 - stress)) / 4.0
}

/// Weighted six-factor score, rescaled by `10 / sum(|w|)` and rounded to two
/// decimals. Null unless all six ratings are present.
pub fn weighted_readiness(record: &WellnessRecord) -> Option<f64> {
  let mut total = 0.0;
  let mut weight_sum = 0.0;

  for (metric, weight) in WEIGHTS {
    let value = record.metric(metric)?;
    total += if weight < 0.0 {
      (10.0 - value) * weight.abs()
    } else {
      value * weight
    };
    weight_sum += weight.abs();
  }

  Some(round_to(total * 10.0 / weight_sum, 2))
}

/// ---------------------------------------------------------------------------
/// Assembly
/// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default)]
pub struct Assembler {
  pub mapping: ColumnMapping,
  pub formula: ReadinessFormula,
}

impl Assembler {
  pub fn new(formula: ReadinessFormula) -> Self {
    Self {
      mapping: ColumnMapping::default(),
      formula,
    }
  }

  pub fn with_mapping(mut self, mapping: ColumnMapping) -> Self {
    self.mapping = mapping;
    self
  }

  /// Build the canonical table for one load
  pub fn assemble(&self, raw: &RawTable) -> WellnessTable {
    let plan = reconcile(&raw.headers, &self.mapping);
    let passthrough: Vec<(usize, String)> = plan
      .passthrough()
      .map(|(i, label)| (i, label.to_string()))
      .collect();

    let mut records = Vec::with_capacity(raw.len());
    let mut dropped_blank = 0usize;

    for row in 0..raw.len() {
      let cell = |field: Field| raw.cell_opt(row, plan.source_of(field));

      let timestamp = parse_timestamp(cell(Field::Timestamp));
      let sleep_text = cell(Field::SleepText).to_text();

      let mut record = WellnessRecord {
        athlete: cell(Field::Athlete).to_text().map(|s| s.trim().to_string()),
        timestamp,
        date: timestamp.map(|t| t.date()),
        sleep_minutes: coerce_sleep_minutes(cell(Field::SleepText)),
        sleep_text,
        extra: BTreeMap::new(),
        ..Default::default()
      };

      for field in Field::ALL {
        if let Some(metric) = field.rating() {
          record.set_metric(metric, coerce_rating(cell(field)));
        }
      }

      for (i, label) in &passthrough {
        if let Some(text) = raw.cell(row, *i).to_text() {
          record.extra.insert(label.clone(), text);
        }
      }

      // A row whose only content is an unparseable timestamp still counts as content
      let has_raw_timestamp = !cell(Field::Timestamp).is_empty();
      if record.is_blank() && !has_raw_timestamp {
        dropped_blank += 1;
        continue;
      }

      record.readiness = self.formula.compute(&record);
      records.push(record);
    }

    sort_by_date_then_athlete(&mut records);

    let mut diagnostics = plan.diagnostics.clone();
    if dropped_blank > 0 {
      diagnostics.push(format!("Dropped {} empty rows", dropped_blank));
    }

    tracing::info!(
      rows = records.len(),
      dropped = dropped_blank,
      formula = ?self.formula,
      "assembled wellness table"
    );

    WellnessTable {
      records,
      fields: plan.fields(),
      extra_columns: passthrough.into_iter().map(|(_, label)| label).collect(),
      readiness_formula: self.formula,
      diagnostics,
    }
  }
}

/// Stable ascending sort on (date, athlete); missing keys sort last
pub fn sort_by_date_then_athlete(records: &mut [WellnessRecord]) {
  fn nulls_last<T: Ord>(a: &Option<T>, b: &Option<T>) -> Ordering {
    match (a, b) {
      (Some(a), Some(b)) => a.cmp(b),
      (Some(_), None) => Ordering::Less,
      (None, Some(_)) => Ordering::Greater,
      (None, None) => Ordering::Equal,
    }
  }

  records.sort_by(|a, b| nulls_last(&a.date, &b.date).then_with(|| nulls_last(&a.athlete, &b.athlete)));
}
