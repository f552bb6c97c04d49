use chrono::{NaiveDate, Utc};
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::Path;

use super::{AppState, LoadedData};
use crate::assembler::{Assembler, ReadinessFormula};
use crate::db::{latest_snapshot, save_snapshot};
use crate::export::export_csv;
use crate::models::enriched::format_with_trend;
use crate::models::{EnrichedTable, Metric, RawTable};

/// ---------------------------------------------------------------------------
/// Load / Refresh
/// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize)]
pub struct LoadSummary {
  pub rows: usize,
  pub athletes: Vec<String>,
  pub latest_date: Option<NaiveDate>,
  pub readiness_formula: ReadinessFormula,
  pub from_snapshot: bool,
  pub diagnostics: Vec<String>,
}

/// Fetch the source, falling back once to the last snapshot when allowed
async fn fetch_raw(state: &AppState) -> Result<(RawTable, bool), String> {
  let key = state.source.key();

  match state.source.fetch().await {
    Ok(raw) => {
      if let Some(db) = &state.db {
        if let Err(e) = save_snapshot(db, &key, &raw, Utc::now()).await {
          tracing::warn!(error = %e, "failed to save snapshot");
        }
      }
      Ok((raw, false))
    }
    Err(fetch_err) => {
      let fallback = match (&state.db, state.config.use_fallback) {
        (Some(db), true) => latest_snapshot(db, &key)
          .await
          .map_err(|e| format!("Failed to load wellness data: {} (snapshot: {})", fetch_err, e))?,
        _ => None,
      };

      match fallback {
        Some(snapshot) => {
          tracing::warn!(
            error = %fetch_err,
            captured_at = %snapshot.captured_at,
            "source unavailable, using last snapshot"
          );
          Ok((snapshot.table, true))
        }
        None => Err(format!("Failed to load wellness data: {}", fetch_err)),
      }
    }
  }
}

/// Load the source into a fresh immutable table and replace the current one
pub async fn load_data(state: &mut AppState) -> Result<LoadSummary, String> {
  let (raw, from_snapshot) = fetch_raw(state).await?;

  let table = Assembler::new(state.config.readiness_formula).assemble(&raw);
  let enriched = EnrichedTable::build(&table);

  let summary = LoadSummary {
    rows: table.len(),
    athletes: enriched.athletes(),
    latest_date: enriched.latest_date(),
    readiness_formula: table.readiness_formula,
    from_snapshot,
    diagnostics: table.diagnostics.clone(),
  };

  state.data = Some(LoadedData {
    table,
    enriched,
    from_snapshot,
    loaded_at: Utc::now(),
  });

  Ok(summary)
}

/// Drop cached narratives and reload from the source
pub async fn refresh_data(state: &mut AppState) -> Result<LoadSummary, String> {
  state.cache.invalidate_all();
  load_data(state).await
}

/// ---------------------------------------------------------------------------
/// Queries / Export
/// ---------------------------------------------------------------------------

pub fn list_athletes(state: &AppState) -> Result<Vec<String>, String> {
  Ok(state.loaded()?.enriched.athletes())
}

/// An athlete's most recent row, values rendered with their trend arrows
#[derive(Debug, Clone, Serialize)]
pub struct AthleteStatusView {
  pub athlete: String,
  pub date: Option<NaiveDate>,
  pub metrics: BTreeMap<Metric, String>,
  pub z_scores: BTreeMap<Metric, f64>,
}

pub fn athlete_status(state: &AppState, athlete: &str) -> Result<Option<AthleteStatusView>, String> {
  let table = &state.loaded()?.enriched;
  let Some(latest) = table.latest_for(athlete) else {
    return Ok(None);
  };

  let trends = table.latest_trends(athlete);
  let metrics = Metric::SUMMARY
    .into_iter()
    .filter_map(|m| {
      let value = latest.record.metric(m)?;
      Some((m, format_with_trend(Some(value), trends.get(&m).copied(), 1)))
    })
    .collect();

  Ok(Some(AthleteStatusView {
    athlete: athlete.to_string(),
    date: latest.record.date,
    metrics,
    z_scores: table.latest_zscores(athlete),
  }))
}

#[derive(Debug, Clone, Serialize)]
pub struct TeamOverview {
  pub readiness_by_date: BTreeMap<NaiveDate, f64>,
  pub averages: BTreeMap<Metric, f64>,
}

pub fn team_overview(state: &AppState) -> Result<TeamOverview, String> {
  let table = &state.loaded()?.enriched;
  Ok(TeamOverview {
    readiness_by_date: table.team_readiness_by_date(),
    averages: table.metric_averages(),
  })
}

pub fn export_data(state: &AppState, path: &Path) -> Result<usize, String> {
  let data = state.loaded()?;
  export_csv(&data.enriched, path).map_err(|e| format!("Failed to export data: {}", e))?;
  Ok(data.enriched.len())
}
