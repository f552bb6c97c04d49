pub mod data;
pub mod insights;

use chrono::{DateTime, Utc};
use std::path::PathBuf;

use crate::cache::InsightCache;
use crate::chat::ChatLog;
use crate::config::AppConfig;
use crate::db::DbPool;
use crate::export::load_csv;
use crate::llm::ClaudeClient;
use crate::models::{EnrichedTable, RawTable, WellnessTable};
use crate::sheets::{fetch_sheet, SheetConfig};

/// ---------------------------------------------------------------------------
/// Data Source
/// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub enum DataSource {
  Sheet(SheetConfig),
  Csv(PathBuf),
}

impl DataSource {
  /// Key under which snapshots of this source are stored
  pub fn key(&self) -> String {
    match self {
      DataSource::Sheet(config) => config.source_key(),
      DataSource::Csv(path) => format!("csv:{}", path.display()),
    }
  }

  pub async fn fetch(&self) -> Result<RawTable, String> {
    match self {
      DataSource::Sheet(config) => fetch_sheet(config).await.map_err(|e| e.to_string()),
      DataSource::Csv(path) => load_csv(path).map_err(|e| e.to_string()),
    }
  }
}

/// ---------------------------------------------------------------------------
/// Application State
/// ---------------------------------------------------------------------------

/// One load's canonical table and its enriched copy
#[derive(Debug, Clone)]
pub struct LoadedData {
  pub table: WellnessTable,
  pub enriched: EnrichedTable,
  pub from_snapshot: bool,
  pub loaded_at: DateTime<Utc>,
}

pub struct AppState {
  pub config: AppConfig,
  pub source: DataSource,
  pub db: Option<DbPool>,
  pub llm: Option<ClaudeClient>,
  pub data: Option<LoadedData>,
  pub cache: InsightCache,
  pub chat: ChatLog,
}

impl AppState {
  pub fn new(config: AppConfig, source: DataSource, db: Option<DbPool>) -> Self {
    let llm = config.anthropic_api_key.clone().map(ClaudeClient::new);
    Self {
      cache: InsightCache::new(config.insight_ttl),
      chat: ChatLog::new(config.chat_history),
      config,
      source,
      db,
      llm,
      data: None,
    }
  }

  pub fn with_llm(mut self, client: ClaudeClient) -> Self {
    self.llm = Some(client);
    self
  }

  /// Loaded data, or an error telling the caller to load first
  pub fn loaded(&self) -> Result<&LoadedData, String> {
    self
      .data
      .as_ref()
      .ok_or_else(|| "No wellness data loaded".to_string())
  }
}
