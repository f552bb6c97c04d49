//! Local SQLite store for last-known-good source snapshots

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::sqlite::{SqlitePool, SqlitePoolOptions};
use std::fs;
use std::path::Path;

use crate::models::{RawTable, RawValue};

pub type DbPool = SqlitePool;

/// Snapshots kept per source after each save
const SNAPSHOTS_RETAINED: i64 = 5;

#[derive(Debug, thiserror::Error)]
pub enum SnapshotError {
  #[error("Database error: {0}")]
  Database(#[from] sqlx::Error),

  #[error("Migration failed: {0}")]
  Migration(#[from] sqlx::migrate::MigrateError),

  #[error("Failed to prepare database directory: {0}")]
  Io(#[from] std::io::Error),

  #[error("Corrupt snapshot payload: {0}")]
  Payload(#[from] serde_json::Error),
}

impl Serialize for SnapshotError {
  fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
  where
    S: serde::Serializer,
  {
    serializer.serialize_str(&self.to_string())
  }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Snapshot {
  pub id: i64,
  pub source: String,
  pub table: RawTable,
  pub captured_at: DateTime<Utc>,
}

/// Open (creating if needed) the database file and run migrations
pub async fn initialize_db(db_path: &Path) -> Result<DbPool, SnapshotError> {
  if let Some(parent) = db_path.parent().filter(|p| !p.as_os_str().is_empty()) {
    fs::create_dir_all(parent)?;
  }

  let db_url = format!("sqlite://{}?mode=rwc", db_path.display());
  tracing::info!(path = %db_path.display(), "initializing snapshot database");

  let pool = SqlitePoolOptions::new()
    .max_connections(5)
    .connect(&db_url)
    .await?;

  sqlx::migrate!("./migrations").run(&pool).await?;

  Ok(pool)
}

/// Store a freshly fetched blob and prune older snapshots of the same source
pub async fn save_snapshot(
  pool: &DbPool,
  source: &str,
  table: &RawTable,
  captured_at: DateTime<Utc>,
) -> Result<i64, SnapshotError> {
  let headers_json = serde_json::to_string(&table.headers)?;
  let rows_json = serde_json::to_string(&table.rows)?;

  let result = sqlx::query(
    r#"
    INSERT INTO snapshots (source, headers_json, rows_json, row_count, captured_at)
    VALUES (?1, ?2, ?3, ?4, ?5)
    "#,
  )
  .bind(source)
  .bind(headers_json)
  .bind(rows_json)
  .bind(table.len() as i64)
  .bind(captured_at)
  .execute(pool)
  .await?;

  sqlx::query(
    r#"
    DELETE FROM snapshots
    WHERE source = ?1 AND id NOT IN (
      SELECT id FROM snapshots WHERE source = ?1
      ORDER BY captured_at DESC, id DESC
      LIMIT ?2
    )
    "#,
  )
  .bind(source)
  .bind(SNAPSHOTS_RETAINED)
  .execute(pool)
  .await?;

  tracing::debug!(source, rows = table.len(), "saved snapshot");
  Ok(result.last_insert_rowid())
}

/// Most recent snapshot for `source`, if any
pub async fn latest_snapshot(pool: &DbPool, source: &str) -> Result<Option<Snapshot>, SnapshotError> {
  let row: Option<(i64, String, String, DateTime<Utc>)> = sqlx::query_as(
    r#"
    SELECT id, headers_json, rows_json, captured_at
    FROM snapshots
    WHERE source = ?1
    ORDER BY captured_at DESC, id DESC
    LIMIT 1
    "#,
  )
  .bind(source)
  .fetch_optional(pool)
  .await?;

  let Some((id, headers_json, rows_json, captured_at)) = row else {
    return Ok(None);
  };

  let headers: Vec<String> = serde_json::from_str(&headers_json)?;
  let rows: Vec<Vec<RawValue>> = serde_json::from_str(&rows_json)?;

  Ok(Some(Snapshot {
    id,
    source: source.to_string(),
    table: RawTable { headers, rows },
    captured_at,
  }))
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::test_utils::{raw_table, setup_test_db, teardown_test_db};
  use chrono::Duration;

  #[tokio::test]
  async fn test_save_and_load_latest_snapshot() {
    let pool = setup_test_db().await;
    let now = Utc::now();

    let older = raw_table(&["Athlete", "Sleep"], &[&["Ana", "7"]]);
    let newer = raw_table(&["Athlete", "Sleep"], &[&["Ana", "8/10"], &["Ben", ""]]);

    save_snapshot(&pool, "sheet:a", &older, now - Duration::hours(1)).await.unwrap();
    save_snapshot(&pool, "sheet:a", &newer, now).await.unwrap();

    let snap = latest_snapshot(&pool, "sheet:a").await.unwrap().unwrap();
    assert_eq!(snap.table, newer);
    assert_eq!(snap.table.cell(1, 1), &RawValue::Empty);

    teardown_test_db(pool).await;
  }

  #[tokio::test]
  async fn test_snapshots_are_scoped_by_source() {
    let pool = setup_test_db().await;
    let table = raw_table(&["Athlete"], &[&["Ana"]]);

    save_snapshot(&pool, "sheet:a", &table, Utc::now()).await.unwrap();

    assert!(latest_snapshot(&pool, "sheet:b").await.unwrap().is_none());
    teardown_test_db(pool).await;
  }

  #[tokio::test]
  async fn test_old_snapshots_are_pruned() {
    let pool = setup_test_db().await;
    let table = raw_table(&["Athlete"], &[&["Ana"]]);
    let start = Utc::now();

    for i in 0..8 {
      save_snapshot(&pool, "sheet:a", &table, start + Duration::minutes(i)).await.unwrap();
    }

    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM snapshots WHERE source = 'sheet:a'")
      .fetch_one(&pool)
      .await
      .unwrap();
    assert_eq!(count, SNAPSHOTS_RETAINED);

    teardown_test_db(pool).await;
  }

  #[tokio::test]
  async fn test_numeric_cells_survive_storage() {
    let pool = setup_test_db().await;
    let mut table = RawTable::new(vec!["Sleep".into()]);
    table.rows.push(vec![RawValue::Number(6.5)]);

    save_snapshot(&pool, "csv:x", &table, Utc::now()).await.unwrap();
    let snap = latest_snapshot(&pool, "csv:x").await.unwrap().unwrap();

    assert_eq!(snap.table.cell(0, 0), &RawValue::Number(6.5));
    teardown_test_db(pool).await;
  }
}
