//! CSV source loading and enriched-table export

use std::fs::File;
use std::io::{Read, Write};
use std::path::Path;

use csv::{ReaderBuilder, WriterBuilder};
use serde::Serialize;
use thiserror::Error;

use crate::models::{EnrichedRecord, EnrichedTable, Field, Metric, RawTable, RawValue};

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";
const DATE_FORMAT: &str = "%Y-%m-%d";

#[derive(Debug, Error)]
pub enum ExportError {
  #[error("CSV error: {0}")]
  Csv(#[from] csv::Error),

  #[error("File error: {0}")]
  Io(#[from] std::io::Error),

  #[error("CSV has no header row")]
  MissingHeader,
}

impl Serialize for ExportError {
  fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
  where
    S: serde::Serializer,
  {
    serializer.serialize_str(&self.to_string())
  }
}

/// ---------------------------------------------------------------------------
/// Loading
/// ---------------------------------------------------------------------------

/// Read a CSV into an untrusted raw table. Rows may be ragged.
pub fn read_csv<R: Read>(reader: R) -> Result<RawTable, ExportError> {
  let mut rdr = ReaderBuilder::new()
    .has_headers(false)
    .flexible(true)
    .from_reader(reader);

  let mut records = rdr.records();
  let headers: Vec<String> = match records.next() {
    Some(record) => record?.iter().map(str::to_string).collect(),
    None => return Err(ExportError::MissingHeader),
  };

  let mut table = RawTable::new(headers);
  for record in records {
    let record = record?;
    table.rows.push(record.iter().map(RawValue::text).collect());
  }

  Ok(table)
}

pub fn load_csv(path: &Path) -> Result<RawTable, ExportError> {
  let table = read_csv(File::open(path)?)?;
  tracing::info!(path = %path.display(), rows = table.len(), "loaded csv source");
  Ok(table)
}

/// ---------------------------------------------------------------------------
/// Export
/// ---------------------------------------------------------------------------

fn number(value: Option<f64>) -> String {
  value.map(|v| v.to_string()).unwrap_or_default()
}

/// Column labels in export order
pub fn export_headers(table: &EnrichedTable) -> Vec<String> {
  let mut headers: Vec<String> = vec![
    Field::Timestamp.as_str().to_string(),
    "Date".to_string(),
    Field::Athlete.as_str().to_string(),
    Field::SleepText.as_str().to_string(),
  ];
  headers.extend(Metric::RATINGS.iter().map(|m| m.as_str().to_string()));
  headers.push(Metric::SleepMinutes.as_str().to_string());
  headers.push(Metric::Readiness.as_str().to_string());
  headers.extend(table.extra_columns.iter().cloned());
  headers.extend(Metric::DERIVED.iter().map(|m| m.trend_column()));
  headers.extend(Metric::DERIVED.iter().map(|m| m.zscore_column()));
  headers
}

fn export_row(row: &EnrichedRecord, extra_columns: &[String]) -> Vec<String> {
  let r = &row.record;
  let mut out = vec![
    r.timestamp
      .map(|t| t.format(TIMESTAMP_FORMAT).to_string())
      .unwrap_or_default(),
    r.date.map(|d| d.format(DATE_FORMAT).to_string()).unwrap_or_default(),
    r.athlete.clone().unwrap_or_default(),
    r.sleep_text.clone().unwrap_or_default(),
  ];
  out.extend(Metric::RATINGS.iter().map(|m| number(r.metric(*m))));
  out.push(number(r.sleep_minutes));
  out.push(number(r.readiness));
  out.extend(
    extra_columns
      .iter()
      .map(|c| r.extra.get(c).cloned().unwrap_or_default()),
  );
  out.extend(
    Metric::DERIVED
      .iter()
      .map(|m| row.trend(*m).map(|t| t.as_str().to_string()).unwrap_or_default()),
  );
  out.extend(Metric::DERIVED.iter().map(|m| number(row.zscore(*m))));
  out
}

/// Serialize the enriched table verbatim, one line per record
pub fn write_csv<W: Write>(table: &EnrichedTable, writer: W) -> Result<(), ExportError> {
  let mut wtr = WriterBuilder::new().from_writer(writer);

  wtr.write_record(export_headers(table))?;
  for row in &table.rows {
    wtr.write_record(export_row(row, &table.extra_columns))?;
  }
  wtr.flush()?;
  Ok(())
}

pub fn export_csv(table: &EnrichedTable, path: &Path) -> Result<(), ExportError> {
  write_csv(table, File::create(path)?)?;
  tracing::info!(path = %path.display(), rows = table.len(), "exported csv");
  Ok(())
}

pub fn to_csv_string(table: &EnrichedTable) -> Result<String, ExportError> {
  let mut buf = Vec::new();
  write_csv(table, &mut buf)?;
  Ok(String::from_utf8_lossy(&buf).into_owned())
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::assembler::Assembler;
  use crate::test_utils::raw_table;

  fn sample_raw() -> RawTable {
    raw_table(
      &["Timestamp", "Your Name", "Sleep Quality", "Mood", "Energy", "Stress", "Soreness", "Fatigue", "Hours of Sleep", "Notes"],
      &[
        &["2024-03-01 07:00:00", "Ana", "8/10", "6", "7", "3", "2", "4", "7h30", "tired legs, ok"],
        &["2024-03-02 07:05:00", "Ana", "7", "5 out of 10", "6.5", "4", "", "5", "8", ""],
        &["2024-03-01 08:00:00", "Ben", "6", "6", "6", "6", "6", "6", "", ""],
      ],
    )
  }

  #[test]
  fn test_read_csv_handles_quotes_and_ragged_rows() {
    let data = "Athlete,Sleep,Notes\nAna,7,\"late, noisy\"\nBen,6\n";
    let table = read_csv(data.as_bytes()).unwrap();

    assert_eq!(table.headers, vec!["Athlete", "Sleep", "Notes"]);
    assert_eq!(table.cell(0, 2), &RawValue::Text("late, noisy".into()));
    assert_eq!(table.cell(1, 2), &RawValue::Empty);
  }

  #[test]
  fn test_read_csv_without_header_fails() {
    assert!(matches!(read_csv("".as_bytes()), Err(ExportError::MissingHeader)));
  }

  #[test]
  fn test_export_includes_derived_columns() {
    let table = EnrichedTable::build(&Assembler::default().assemble(&sample_raw()));
    let csv = to_csv_string(&table).unwrap();
    let header = csv.lines().next().unwrap();

    assert!(header.starts_with("Timestamp,Date,Athlete,SleepText,Sleep,Mood"));
    assert!(header.contains("SleepMinutes,Readiness,Notes,Sleep_Trend"));
    assert!(header.ends_with("SleepMinutes_ZScore"));
    assert!(csv.contains("\"tired legs, ok\""));
    // Ana's second day: sleep 8 -> 7
    assert!(csv.contains("DOWN"));
  }

  #[test]
  fn test_export_then_reload_preserves_metrics() {
    let original = Assembler::default().assemble(&sample_raw());
    let enriched = EnrichedTable::build(&original);
    let csv = to_csv_string(&enriched).unwrap();

    let reloaded = Assembler::default().assemble(&read_csv(csv.as_bytes()).unwrap());

    assert_eq!(reloaded.len(), original.len());
    for (a, b) in original.records.iter().zip(&reloaded.records) {
      assert_eq!(a.athlete, b.athlete);
      assert_eq!(a.date, b.date);
      for metric in Metric::DERIVED {
        assert_eq!(a.metric(metric), b.metric(metric), "{:?}", metric);
      }
      assert_eq!(a.extra, b.extra);
    }
  }
}
