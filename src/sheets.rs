//! Google Sheets source
//!
//! Fetches a worksheet through the Sheets v4 values API and hands it over as
//! an untrusted `RawTable`. Retries are left to the caller.

use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::env;
use url::Url;

use crate::models::{RawTable, RawValue};

/// ---------------------------------------------------------------------------
/// Configuration
/// ---------------------------------------------------------------------------

const SHEETS_API_BASE: &str = "https://sheets.googleapis.com";
pub const DEFAULT_WORKSHEET: &str = "Form Responses 1";

#[derive(Debug, Clone, PartialEq)]
pub enum SheetAuth {
  /// OAuth access token (private sheets)
  Bearer(String),
  /// API key (link-shared sheets)
  ApiKey(String),
}

#[derive(Debug, Clone)]
pub struct SheetConfig {
  pub sheet_id: String,
  pub worksheet: String,
  pub auth: SheetAuth,
  pub api_base: String,
}

impl SheetConfig {
  pub fn from_env() -> Result<Self, SheetError> {
    let sheet_id = env::var("WELLNESS_SHEET_ID")
      .map_err(|_| SheetError::MissingConfig("WELLNESS_SHEET_ID".into()))?;

    let auth = match (env::var("GOOGLE_SHEETS_TOKEN"), env::var("GOOGLE_SHEETS_API_KEY")) {
      (Ok(token), _) => SheetAuth::Bearer(token),
      (Err(_), Ok(key)) => SheetAuth::ApiKey(key),
      _ => {
        return Err(SheetError::MissingConfig(
          "GOOGLE_SHEETS_TOKEN or GOOGLE_SHEETS_API_KEY".into(),
        ))
      }
    };

    Ok(Self {
      sheet_id,
      worksheet: env::var("WELLNESS_WORKSHEET").unwrap_or_else(|_| DEFAULT_WORKSHEET.to_string()),
      auth,
      api_base: env::var("GOOGLE_SHEETS_API_BASE").unwrap_or_else(|_| SHEETS_API_BASE.to_string()),
    })
  }

  /// Identity used to key local snapshots
  pub fn source_key(&self) -> String {
    format!("sheet:{}/{}", self.sheet_id, self.worksheet)
  }
}

/// ---------------------------------------------------------------------------
/// Error Handling
/// ---------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum SheetError {
  #[error("Missing configuration: {0}")]
  MissingConfig(String),

  #[error("HTTP request failed: {0}")]
  Request(#[from] reqwest::Error),

  #[error("Invalid sheet URL: {0}")]
  Url(String),

  #[error("Not authorized to read the sheet")]
  Unauthorized,

  #[error("Sheet or worksheet not found: {0}")]
  NotFound(String),

  #[error("Sheets API error: {0}")]
  Api(String),

  #[error("Failed to parse sheet response: {0}")]
  Parse(String),

  #[error("Worksheet has no header row")]
  Empty,
}

impl Serialize for SheetError {
  fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
  where
    S: serde::Serializer,
  {
    serializer.serialize_str(&self.to_string())
  }
}

/// ---------------------------------------------------------------------------
/// Values API
/// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct ValueRange {
  #[serde(default)]
  values: Vec<Vec<serde_json::Value>>,
}

pub fn build_values_url(config: &SheetConfig) -> Result<Url, SheetError> {
  let mut url = Url::parse(&config.api_base).map_err(|e| SheetError::Url(e.to_string()))?;

  url
    .path_segments_mut()
    .map_err(|_| SheetError::Url(config.api_base.clone()))?
    .pop_if_empty()
    .extend(["v4", "spreadsheets", config.sheet_id.as_str(), "values", config.worksheet.as_str()]);

  {
    let mut query = url.query_pairs_mut();
    query
      .append_pair("valueRenderOption", "UNFORMATTED_VALUE")
      .append_pair("dateTimeRenderOption", "FORMATTED_STRING");
    if let SheetAuth::ApiKey(key) = &config.auth {
      query.append_pair("key", key);
    }
  }

  Ok(url)
}

/// First row becomes the headers; the rest are data rows (possibly ragged)
pub fn values_to_table(values: Vec<Vec<serde_json::Value>>) -> Result<RawTable, SheetError> {
  let mut rows = values.into_iter();
  let header_row = rows.next().ok_or(SheetError::Empty)?;

  let headers = header_row
    .into_iter()
    .map(|v| match v {
      serde_json::Value::String(s) => s,
      serde_json::Value::Null => String::new(),
      other => other.to_string(),
    })
    .collect();

  let mut table = RawTable::new(headers);
  table.rows = rows
    .map(|row| row.into_iter().map(RawValue::from).collect())
    .collect();
  Ok(table)
}

pub async fn fetch_sheet(config: &SheetConfig) -> Result<RawTable, SheetError> {
  let client = Client::new();
  let url = build_values_url(config)?;

  let mut request = client.get(url);
  if let SheetAuth::Bearer(token) = &config.auth {
    request = request.header("Authorization", format!("Bearer {}", token));
  }

  let response = request.send().await?;

  match response.status() {
    reqwest::StatusCode::UNAUTHORIZED | reqwest::StatusCode::FORBIDDEN => {
      return Err(SheetError::Unauthorized)
    }
    reqwest::StatusCode::NOT_FOUND => return Err(SheetError::NotFound(config.source_key())),
    status if !status.is_success() => {
      let error_text = response.text().await.unwrap_or_default();
      return Err(SheetError::Api(format!("HTTP {}: {}", status, error_text)));
    }
    _ => {}
  }

  let response_text = response.text().await?;
  let range: ValueRange = serde_json::from_str(&response_text).map_err(|e| {
    let preview: String = response_text.chars().take(500).collect();
    tracing::warn!(body = %preview, "unparseable sheets response");
    SheetError::Parse(e.to_string())
  })?;

  let table = values_to_table(range.values)?;
  tracing::info!(rows = table.len(), columns = table.headers.len(), "fetched worksheet");
  Ok(table)
}

/// ---------------------------------------------------------------------------
/// Tests
/// ---------------------------------------------------------------------------
