use serde::{Deserialize, Serialize};

/// A single untrusted cell as delivered by the data source
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RawValue {
  Number(f64),
  Text(String),
  Empty,
}

impl RawValue {
  /// Build a cell from text, treating blank strings as empty
  pub fn text(value: impl Into<String>) -> Self {
    let value = value.into();
    if value.trim().is_empty() {
      RawValue::Empty
    } else {
      RawValue::Text(value)
    }
  }

  pub fn is_empty(&self) -> bool {
    match self {
      RawValue::Empty => true,
      RawValue::Text(s) => s.trim().is_empty(),
      RawValue::Number(n) => n.is_nan(),
    }
  }

  /// Text form used for pass-through columns and exports
  pub fn to_text(&self) -> Option<String> {
    match self {
      RawValue::Empty => None,
      RawValue::Text(s) if s.trim().is_empty() => None,
      RawValue::Text(s) => Some(s.clone()),
      RawValue::Number(n) if n.is_nan() => None,
      RawValue::Number(n) => Some(n.to_string()),
    }
  }
}

impl From<serde_json::Value> for RawValue {
  fn from(value: serde_json::Value) -> Self {
    match value {
      serde_json::Value::Null => RawValue::Empty,
      serde_json::Value::Number(n) => n.as_f64().map(RawValue::Number).unwrap_or(RawValue::Empty),
      serde_json::Value::String(s) => RawValue::text(s),
      serde_json::Value::Bool(b) => RawValue::Text(b.to_string()),
      other => RawValue::Text(other.to_string()),
    }
  }
}

static EMPTY_CELL: RawValue = RawValue::Empty;

/// The opaque tabular blob handed over by a data source collaborator
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawTable {
  pub headers: Vec<String>,
  pub rows: Vec<Vec<RawValue>>,
}

impl RawTable {
  pub fn new(headers: Vec<String>) -> Self {
    Self {
      headers,
      rows: Vec::new(),
    }
  }

  /// Cell lookup that tolerates ragged rows (short rows read as empty)
  pub fn cell(&self, row: usize, column: usize) -> &RawValue {
    self
      .rows
      .get(row)
      .and_then(|r| r.get(column))
      .unwrap_or(&EMPTY_CELL)
  }

  /// Cell lookup for an optional column
  pub fn cell_opt(&self, row: usize, column: Option<usize>) -> &RawValue {
    match column {
      Some(c) => self.cell(row, c),
      None => &EMPTY_CELL,
    }
  }

  pub fn len(&self) -> usize {
    self.rows.len()
  }

  pub fn is_empty(&self) -> bool {
    self.rows.is_empty()
  }
}
