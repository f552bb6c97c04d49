//! Test utilities and helpers for unit testing
//!
//! This module provides common test infrastructure including:
//! - Database setup/teardown
//! - Raw table and record factories
//! - Temporary CSV sources
//! - Helper assertions

use chrono::NaiveDate;
use sqlx::SqlitePool;
use std::path::PathBuf;

use crate::assembler::simple_readiness;
use crate::models::{EnrichedTable, RawTable, RawValue, WellnessRecord, WellnessTable};

/// ---------------------------------------------------------------------------
/// Database Test Utilities
/// ---------------------------------------------------------------------------

/// Create an in-memory SQLite database for testing
/// Runs all migrations and returns a ready-to-use pool
///
/// Uses max_connections(1) so every query sees the same in-memory database
pub async fn setup_test_db() -> SqlitePool {
  let pool = sqlx::sqlite::SqlitePoolOptions::new()
    .max_connections(1)
    .connect("sqlite::memory:")
    .await
    .expect("Failed to create in-memory database");

  sqlx::migrate!("./migrations")
    .run(&pool)
    .await
    .expect("Failed to run migrations");

  pool
}

/// Close a test database pool
pub async fn teardown_test_db(pool: SqlitePool) {
  pool.close().await;
}

/// ---------------------------------------------------------------------------
/// Mock Data Factories
/// ---------------------------------------------------------------------------

/// A form export with two athletes over two mornings
pub const SAMPLE_CSV: &str = "\
Timestamp,Your Name,Sleep Quality,Mood,Energy,Stress,Hours of Sleep
2024-03-01 07:00:00,Ana,8/10,6,7,3,7h30
2024-03-01 07:10:00,Ben,6,5 out of 10,6,4,7
2024-03-02 07:02:00,Ana,7,6,6,4,8
2024-03-02 07:15:00,Ben,7,6,7,2,7:45
";

/// Build a raw table from string cells; empty strings become `RawValue::Empty`
pub fn raw_table(headers: &[&str], rows: &[&[&str]]) -> RawTable {
  let mut table = RawTable::new(headers.iter().map(|h| h.to_string()).collect());
  for row in rows {
    table.rows.push(row.iter().map(|cell| RawValue::text(*cell)).collect());
  }
  table
}

/// A normalized record for 2024-03-`day` with mood 6, energy 7 and stress 3.
/// Readiness uses the simple formula when `sleep` is present.
pub fn mock_record(athlete: &str, day: u32, sleep: Option<f64>) -> WellnessRecord {
  let date = NaiveDate::from_ymd_opt(2024, 3, day).expect("valid test date");

  WellnessRecord {
    athlete: Some(athlete.to_string()),
    timestamp: date.and_hms_opt(7, 0, 0),
    date: Some(date),
    sleep,
    mood: Some(6.0),
    energy: Some(7.0),
    stress: Some(3.0),
    readiness: sleep.map(|s| simple_readiness(s, 6.0, 7.0, 3.0)),
    ..WellnessRecord::default()
  }
}

/// Wrap records in a table without re-sorting them
pub fn mock_table(records: Vec<WellnessRecord>) -> WellnessTable {
  WellnessTable {
    records,
    fields: vec![
      crate::models::Field::Timestamp,
      crate::models::Field::Athlete,
      crate::models::Field::Sleep,
      crate::models::Field::Mood,
      crate::models::Field::Energy,
      crate::models::Field::Stress,
    ],
    ..WellnessTable::default()
  }
}

pub fn mock_enriched(records: Vec<WellnessRecord>) -> EnrichedTable {
  EnrichedTable::build(&mock_table(records))
}

/// Write `contents` to a per-process temp file and return its path
pub fn write_temp_csv(name: &str, contents: &str) -> PathBuf {
  let path = std::env::temp_dir().join(format!(
    "squad_wellness_{}_{}.csv",
    name,
    std::process::id()
  ));
  std::fs::write(&path, contents).expect("Failed to write temp csv");
  path
}

/// ---------------------------------------------------------------------------
/// Test Macros
/// ---------------------------------------------------------------------------

/// Assert two floats are approximately equal within a tolerance
#[macro_export]
macro_rules! assert_approx_eq {
  ($left:expr, $right:expr, $tolerance:expr) => {
    let diff = ($left - $right).abs();
    assert!(
      diff < $tolerance,
      "Values not approximately equal: {} vs {} (diff: {}, tolerance: {})",
      $left,
      $right,
      diff,
      $tolerance
    );
  };
}

/// ---------------------------------------------------------------------------
/// Tests for Test Utilities
/// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
  use super::*;

  #[tokio::test]
  async fn test_setup_db_creates_schema() {
    let pool = setup_test_db().await;

    let tables: Vec<(String,)> =
      sqlx::query_as("SELECT name FROM sqlite_master WHERE type='table' AND name = 'snapshots'")
        .fetch_all(&pool)
        .await
        .expect("Failed to query tables");

    assert_eq!(tables.len(), 1);

    teardown_test_db(pool).await;
  }

  #[test]
  fn test_mock_record_has_simple_readiness() {
    let record = mock_record("Ana", 3, Some(8.0));
    assert_approx_eq!(record.readiness.unwrap(), 7.0, 1e-9);
    assert_eq!(record.date, NaiveDate::from_ymd_opt(2024, 3, 3));

    assert!(mock_record("Ana", 3, None).readiness.is_none());
  }

  #[test]
  fn test_raw_table_maps_blank_cells_to_empty() {
    let table = raw_table(&["Athlete", "Sleep"], &[&["Ana", ""]]);
    assert_eq!(table.cell(0, 1), &RawValue::Empty);
  }
}
