//! Rule-based performance risk for one athlete's most recent week

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

use crate::assembler::ReadinessFormula;
use crate::models::{EnrichedTable, WellnessRecord};
use crate::stats;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskLevel {
  Minimal,
  Low,
  Moderate,
  High,
}

impl RiskLevel {
  pub fn from_score(score: u32) -> Self {
    match score {
      s if s >= 5 => RiskLevel::High,
      s if s >= 3 => RiskLevel::Moderate,
      s if s >= 1 => RiskLevel::Low,
      _ => RiskLevel::Minimal,
    }
  }

  pub fn as_str(&self) -> &'static str {
    match self {
      RiskLevel::Minimal => "minimal",
      RiskLevel::Low => "low",
      RiskLevel::Moderate => "moderate",
      RiskLevel::High => "high",
    }
  }

  pub fn recommendation(&self) -> &'static str {
    match self {
      RiskLevel::High => "Consider modified training or additional recovery day. Monitor closely.",
      RiskLevel::Moderate => "Adjust training intensity. Focus on recovery protocols.",
      RiskLevel::Low => "Monitor trends. Maintain current recovery practices.",
      RiskLevel::Minimal => "Athlete is in good condition for normal training.",
    }
  }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskAssessment {
  pub risk_level: RiskLevel,
  pub risk_score: u32,
  pub factors: Vec<String>,
  pub recommendation: String,
}

/// Rule thresholds for `assess_risk`
#[derive(Debug, Clone, PartialEq)]
pub struct RiskThresholds {
  /// Number of most recent rows considered
  pub window: usize,
  pub low_readiness: f64,
  pub readiness_decline: f64,
  pub high_stress: f64,
  pub sleep_std_minutes: f64,
  pub high_fatigue: f64,
}

impl Default for RiskThresholds {
  fn default() -> Self {
    Self {
      window: 7,
      low_readiness: 5.0,
      readiness_decline: 1.0,
      high_stress: 7.0,
      sleep_std_minutes: 90.0,
      high_fatigue: 7.0,
    }
  }
}

impl RiskThresholds {
  /// Defaults with the readiness rules scaled to the formula's range
  pub fn for_formula(formula: ReadinessFormula) -> Self {
    let defaults = Self::default();
    let scale = formula.max_score() / ReadinessFormula::Simple.max_score();
    Self {
      low_readiness: defaults.low_readiness * scale,
      readiness_decline: defaults.readiness_decline * scale,
      ..defaults
    }
  }
}

fn mean_of(rows: &[&WellnessRecord], f: impl Fn(&WellnessRecord) -> Option<f64>) -> Option<f64> {
  let values: Vec<f64> = rows.iter().filter_map(|r| f(*r)).collect();
  stats::mean(&values)
}

/// Assess one athlete. Returns `None` when the athlete has no rows.
pub fn assess_risk(
  table: &EnrichedTable,
  athlete: &str,
  thresholds: &RiskThresholds,
) -> Option<RiskAssessment> {
  let mut rows: Vec<&WellnessRecord> = table.for_athlete(athlete).map(|r| &r.record).collect();
  if rows.is_empty() {
    return None;
  }

  rows.sort_by(|a, b| match (a.date, b.date) {
    (Some(x), Some(y)) => x.cmp(&y),
    (Some(_), None) => Ordering::Less,
    (None, Some(_)) => Ordering::Greater,
    (None, None) => Ordering::Equal,
  });
  let recent = &rows[rows.len().saturating_sub(thresholds.window)..];

  let mut factors = Vec::new();
  let mut score = 0u32;

  if let Some(avg) = mean_of(recent, |r| r.readiness) {
    if avg < thresholds.low_readiness {
      factors.push(format!("Low average readiness ({:.1})", avg));
      score += 2;
    }
  }

  if recent.len() > 1 {
    let first = recent.first().and_then(|r| r.readiness);
    let last = recent.last().and_then(|r| r.readiness);
    if let (Some(first), Some(last)) = (first, last) {
      if last - first < -thresholds.readiness_decline {
        factors.push("Declining readiness trend".to_string());
        score += 1;
      }
    }
  }

  if let Some(avg) = mean_of(recent, |r| r.stress) {
    if avg > thresholds.high_stress {
      factors.push(format!("High stress levels ({:.1})", avg));
      score += 2;
    }
  }

  let sleep: Vec<f64> = recent.iter().filter_map(|r| r.sleep_minutes).collect();
  if let Some(std) = stats::sample_std(&sleep) {
    if std > thresholds.sleep_std_minutes {
      factors.push("Inconsistent sleep patterns".to_string());
      score += 1;
    }
  }

  if let Some(avg) = mean_of(recent, |r| r.fatigue) {
    if avg > thresholds.high_fatigue {
      factors.push(format!("High fatigue ({:.1})", avg));
      score += 2;
    }
  }

  let level = RiskLevel::from_score(score);
  tracing::debug!(athlete, score, level = level.as_str(), "assessed risk");

  Some(RiskAssessment {
    risk_level: level,
    risk_score: score,
    factors,
    recommendation: level.recommendation().to_string(),
  })
}
