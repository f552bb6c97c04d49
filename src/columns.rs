//! Column reconciliation
//!
//! Survey authors reword questions freely, so incoming headers are matched
//! against a table of known phrasings. The table is plain data
//! ([`ColumnMapping`]); extending it never touches [`reconcile`].

use serde::Serialize;
use std::collections::{HashMap, HashSet};

use crate::models::{Field, Metric};

/// ---------------------------------------------------------------------------
/// Mapping Table
/// ---------------------------------------------------------------------------

const DEFAULT_ALIASES: &[(&str, Field)] = &[
  // Timestamp
  ("Timestamp", Field::Timestamp),
  ("timestamp", Field::Timestamp),
  ("Date", Field::Timestamp),
  ("Submission Time", Field::Timestamp),
  // Athlete
  ("Athlete", Field::Athlete),
  ("Name", Field::Athlete),
  ("Athlete Name", Field::Athlete),
  ("Your Name", Field::Athlete),
  ("Player Name", Field::Athlete),
  // Sleep duration text
  ("SleepText", Field::SleepText),
  ("Sleep Text", Field::SleepText),
  ("Sleep Duration", Field::SleepText),
  ("Hours of Sleep", Field::SleepText),
  ("Sleep Hours", Field::SleepText),
  // Ratings
  ("How did you sleep?", Field::Sleep),
  ("Sleep Quality", Field::Sleep),
  ("Rate your sleep quality (1-10)", Field::Sleep),
  ("Sleep (1-10)", Field::Sleep),
  ("Sleep", Field::Sleep),
  ("How is your mood?", Field::Mood),
  ("Mood", Field::Mood),
  ("Rate your mood (1-10)", Field::Mood),
  ("Current Mood (1-10)", Field::Mood),
  ("What is your overall energy level?", Field::Energy),
  ("Energy Level", Field::Energy),
  ("Energy", Field::Energy),
  ("Rate your energy (1-10)", Field::Energy),
  ("Energy Level (1-10)", Field::Energy),
  ("What is your overall stress level?", Field::Stress),
  ("Stress Level", Field::Stress),
  ("Stress", Field::Stress),
  ("Rate your stress (1-10)", Field::Stress),
  ("Stress Level (1-10)", Field::Stress),
  ("What is your general soreness?", Field::Soreness),
  ("Soreness", Field::Soreness),
  ("Muscle Soreness", Field::Soreness),
  ("Rate your soreness (1-10)", Field::Soreness),
  ("Soreness Level (1-10)", Field::Soreness),
  ("What is your overall fatigue?", Field::Fatigue),
  ("Fatigue", Field::Fatigue),
  ("Fatigue Level", Field::Fatigue),
  ("Rate your fatigue (1-10)", Field::Fatigue),
  ("Fatigue Level (1-10)", Field::Fatigue),
];

/// Known header phrasings and the canonical field each one feeds
#[derive(Debug, Clone)]
pub struct ColumnMapping {
  exact: HashMap<String, Field>,
  folded: HashMap<String, Field>,
}

impl Default for ColumnMapping {
  fn default() -> Self {
    let mut mapping = Self::empty();
    for (label, field) in DEFAULT_ALIASES {
      mapping.add_alias(*label, *field);
    }
    mapping
  }
}

impl ColumnMapping {
  pub fn empty() -> Self {
    Self {
      exact: HashMap::new(),
      folded: HashMap::new(),
    }
  }

  /// Register another phrasing. The first registration of a folded label wins.
  pub fn add_alias(&mut self, label: impl Into<String>, field: Field) {
    let label = label.into();
    self.folded.entry(fold(&label)).or_insert(field);
    self.exact.insert(label, field);
  }

  pub fn with_alias(mut self, label: impl Into<String>, field: Field) -> Self {
    self.add_alias(label, field);
    self
  }

  /// Exact match first, then case-insensitive trimmed match
  pub fn lookup(&self, label: &str) -> Option<Field> {
    self
      .exact
      .get(label)
      .or_else(|| self.folded.get(&fold(label)))
      .copied()
  }
}

fn fold(label: &str) -> String {
  label.trim().to_lowercase()
}

/// ---------------------------------------------------------------------------
/// Reconciliation
/// ---------------------------------------------------------------------------

/// Where one source column ends up
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum ColumnTarget {
  Canonical(Field),
  Passthrough(String),
  Dropped,
}

/// Result of reconciling a header row. `targets` is parallel to the source headers.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ColumnPlan {
  pub targets: Vec<ColumnTarget>,
  pub diagnostics: Vec<String>,
}

fn output_label(target: &ColumnTarget) -> Option<String> {
  match target {
    ColumnTarget::Canonical(f) => Some(f.as_str().to_string()),
    ColumnTarget::Passthrough(label) => Some(label.clone()),
    ColumnTarget::Dropped => None,
  }
}

impl ColumnPlan {
  /// Output labels in source order (what a reconciled table's header row looks like)
  pub fn output_labels(&self) -> Vec<String> {
    self.targets.iter().filter_map(output_label).collect()
  }

  pub fn source_of(&self, field: Field) -> Option<usize> {
    self
      .targets
      .iter()
      .position(|t| *t == ColumnTarget::Canonical(field))
  }

  pub fn fields(&self) -> Vec<Field> {
    Field::ALL
      .into_iter()
      .filter(|f| self.source_of(*f).is_some())
      .collect()
  }

  pub fn passthrough(&self) -> impl Iterator<Item = (usize, &str)> {
    self.targets.iter().enumerate().filter_map(|(i, t)| match t {
      ColumnTarget::Passthrough(label) => Some((i, label.as_str())),
      _ => None,
    })
  }
}

/// Suffix repeated labels with `_1`, `_2`, ... so every source column is unique
pub fn dedupe_labels(headers: &[String]) -> Vec<String> {
  let mut seen: HashMap<&str, usize> = HashMap::new();
  headers
    .iter()
    .map(|label| {
      let count = seen.entry(label.as_str()).or_insert(0);
      let out = if *count == 0 {
        label.clone()
      } else {
        format!("{}_{}", label, count)
      };
      *count += 1;
      out
    })
    .collect()
}

/// Labels that name columns this pipeline derives itself
fn is_derived_label(label: &str) -> bool {
  let label = label.trim();
  Metric::DERIVED.iter().any(|m| {
    label.eq_ignore_ascii_case(&m.trend_column()) || label.eq_ignore_ascii_case(&m.zscore_column())
  }) || label.eq_ignore_ascii_case(Metric::Readiness.as_str())
    || label.eq_ignore_ascii_case(Metric::SleepMinutes.as_str())
}

/// Map source headers onto the canonical schema.
///
/// First mapping to a canonical field wins; later columns mapping to the
/// same field are dropped with a diagnostic. Never fails.
pub fn reconcile(headers: &[String], mapping: &ColumnMapping) -> ColumnPlan {
  let labels = dedupe_labels(headers);
  let mut plan = ColumnPlan::default();
  let mut used: HashSet<Field> = HashSet::new();
  let mut output: HashSet<String> = HashSet::new();

  for label in &labels {
    let target = match mapping.lookup(label) {
      Some(field) if used.contains(&field) => {
        plan.diagnostics.push(format!(
          "Skipping duplicate column mapping: {} -> {}",
          label,
          field.as_str()
        ));
        ColumnTarget::Dropped
      }
      Some(field) => {
        used.insert(field);
        ColumnTarget::Canonical(field)
      }
      None if is_derived_label(label) => {
        plan
          .diagnostics
          .push(format!("Ignoring derived column from source: {}", label));
        ColumnTarget::Dropped
      }
      None => ColumnTarget::Passthrough(label.clone()),
    };

    // Final uniqueness check across canonical and pass-through labels
    let target = match output_label(&target) {
      Some(out_label) if !output.insert(out_label.clone()) => {
        plan
          .diagnostics
          .push(format!("Duplicate output column removed: {}", out_label));
        ColumnTarget::Dropped
      }
      _ => target,
    };

    plan.targets.push(target);
  }

  for note in &plan.diagnostics {
    tracing::warn!("{}", note);
  }
  tracing::debug!(columns = ?plan.output_labels(), "reconciled columns");

  plan
}
