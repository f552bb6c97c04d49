use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// ---------------------------------------------------------------------------
/// Canonical Schema
/// ---------------------------------------------------------------------------

/// The fixed set of input columns every recognised form label maps onto
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Field {
  Timestamp,
  Athlete,
  SleepText,
  Sleep,
  Mood,
  Energy,
  Stress,
  Soreness,
  Fatigue,
}

impl Field {
  pub const ALL: [Field; 9] = [
    Field::Timestamp,
    Field::Athlete,
    Field::SleepText,
    Field::Sleep,
    Field::Mood,
    Field::Energy,
    Field::Stress,
    Field::Soreness,
    Field::Fatigue,
  ];

  pub fn as_str(&self) -> &'static str {
    match self {
      Field::Timestamp => "Timestamp",
      Field::Athlete => "Athlete",
      Field::SleepText => "SleepText",
      Field::Sleep => "Sleep",
      Field::Mood => "Mood",
      Field::Energy => "Energy",
      Field::Stress => "Stress",
      Field::Soreness => "Soreness",
      Field::Fatigue => "Fatigue",
    }
  }

  /// The rating metric carried by this column, if any
  pub fn rating(&self) -> Option<Metric> {
    match self {
      Field::Sleep => Some(Metric::Sleep),
      Field::Mood => Some(Metric::Mood),
      Field::Energy => Some(Metric::Energy),
      Field::Stress => Some(Metric::Stress),
      Field::Soreness => Some(Metric::Soreness),
      Field::Fatigue => Some(Metric::Fatigue),
      _ => None,
    }
  }
}

/// ---------------------------------------------------------------------------
/// Metrics
/// ---------------------------------------------------------------------------

/// Numeric columns that trends and z-scores are derived for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Metric {
  Sleep,
  Mood,
  Energy,
  Stress,
  Soreness,
  Fatigue,
  Readiness,
  SleepMinutes,
}

impl Metric {
  /// Self-reported 1-10 ratings
  pub const RATINGS: [Metric; 6] = [
    Metric::Sleep,
    Metric::Mood,
    Metric::Energy,
    Metric::Stress,
    Metric::Soreness,
    Metric::Fatigue,
  ];

  /// Every metric that gets a trend and a z-score column
  pub const DERIVED: [Metric; 8] = [
    Metric::Sleep,
    Metric::Mood,
    Metric::Energy,
    Metric::Stress,
    Metric::Soreness,
    Metric::Fatigue,
    Metric::Readiness,
    Metric::SleepMinutes,
  ];

  /// Metrics reported in digests (ratings plus readiness)
  pub const SUMMARY: [Metric; 7] = [
    Metric::Sleep,
    Metric::Mood,
    Metric::Energy,
    Metric::Stress,
    Metric::Soreness,
    Metric::Fatigue,
    Metric::Readiness,
  ];

  pub fn as_str(&self) -> &'static str {
    match self {
      Metric::Sleep => "Sleep",
      Metric::Mood => "Mood",
      Metric::Energy => "Energy",
      Metric::Stress => "Stress",
      Metric::Soreness => "Soreness",
      Metric::Fatigue => "Fatigue",
      Metric::Readiness => "Readiness",
      Metric::SleepMinutes => "SleepMinutes",
    }
  }

  pub fn trend_column(&self) -> String {
    format!("{}_Trend", self.as_str())
  }

  pub fn zscore_column(&self) -> String {
    format!("{}_ZScore", self.as_str())
  }
}

/// ---------------------------------------------------------------------------
/// Wellness Record
/// ---------------------------------------------------------------------------

/// One survey submission after normalization
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WellnessRecord {
  pub athlete: Option<String>,
  pub timestamp: Option<NaiveDateTime>,
  pub date: Option<NaiveDate>,
  pub sleep_text: Option<String>,
  pub sleep: Option<f64>,
  pub mood: Option<f64>,
  pub energy: Option<f64>,
  pub stress: Option<f64>,
  pub soreness: Option<f64>,
  pub fatigue: Option<f64>,
  pub sleep_minutes: Option<f64>,
  pub readiness: Option<f64>,

  /// Unrecognised input columns, keyed by their de-duplicated label
  #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
  pub extra: BTreeMap<String, String>,
}

impl WellnessRecord {
  pub fn metric(&self, metric: Metric) -> Option<f64> {
    match metric {
      Metric::Sleep => self.sleep,
      Metric::Mood => self.mood,
      Metric::Energy => self.energy,
      Metric::Stress => self.stress,
      Metric::Soreness => self.soreness,
      Metric::Fatigue => self.fatigue,
      Metric::Readiness => self.readiness,
      Metric::SleepMinutes => self.sleep_minutes,
    }
  }

  pub fn set_metric(&mut self, metric: Metric, value: Option<f64>) {
    match metric {
      Metric::Sleep => self.sleep = value,
      Metric::Mood => self.mood = value,
      Metric::Energy => self.energy = value,
      Metric::Stress => self.stress = value,
      Metric::Soreness => self.soreness = value,
      Metric::Fatigue => self.fatigue = value,
      Metric::Readiness => self.readiness = value,
      Metric::SleepMinutes => self.sleep_minutes = value,
    }
  }

  /// True when the row carries no value in any column
  pub fn is_blank(&self) -> bool {
    self.athlete.is_none()
      && self.timestamp.is_none()
      && self.sleep_text.is_none()
      && Metric::DERIVED.iter().all(|m| self.metric(*m).is_none())
      && self.extra.is_empty()
  }

  pub fn belongs_to(&self, athlete: &str) -> bool {
    self.athlete.as_deref() == Some(athlete)
  }
}

/// ---------------------------------------------------------------------------
/// Wellness Table
/// ---------------------------------------------------------------------------

/// Immutable result of one load: canonical records plus load metadata
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WellnessTable {
  pub records: Vec<WellnessRecord>,

  /// Canonical fields that were present in the source
  pub fields: Vec<Field>,

  /// Pass-through column labels, in source order
  pub extra_columns: Vec<String>,

  /// Readiness formula used for this load
  pub readiness_formula: crate::assembler::ReadinessFormula,

  /// Non-fatal notes produced during reconciliation and assembly
  pub diagnostics: Vec<String>,
}

impl WellnessTable {
  pub fn has_field(&self, field: Field) -> bool {
    self.fields.contains(&field)
  }

  pub fn len(&self) -> usize {
    self.records.len()
  }

  pub fn is_empty(&self) -> bool {
    self.records.is_empty()
  }
}
