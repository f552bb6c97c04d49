//! Value coercion for untrusted survey cells
//!
//! Every function here is total: malformed input degrades to `None`
//! so a bad cell never costs us the row.

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use regex::Regex;
use std::sync::OnceLock;

use crate::models::RawValue;

/// ---------------------------------------------------------------------------
/// Ratings
/// ---------------------------------------------------------------------------

/// Coerce a rating cell ("7", "7/10", "7 out of 10", 7.0) to a number
pub fn coerce_rating(value: &RawValue) -> Option<f64> {
  match value {
    RawValue::Empty => None,
    RawValue::Number(n) => n.is_finite().then_some(*n),
    RawValue::Text(s) => coerce_rating_text(s),
  }
}

fn coerce_rating_text(text: &str) -> Option<f64> {
  let text = text.trim();
  if text.is_empty() {
    return None;
  }

  if let Some((numerator, _)) = text.split_once('/') {
    if let Some(n) = parse_finite(numerator) {
      return Some(n);
    }
  }

  let lower = text.to_lowercase();
  if let Some((numerator, _)) = lower.split_once("out of") {
    if let Some(n) = parse_finite(numerator) {
      return Some(n);
    }
  }

  parse_finite(text)
}

fn parse_finite(s: &str) -> Option<f64> {
  s.trim().parse::<f64>().ok().filter(|n| n.is_finite())
}

/// ---------------------------------------------------------------------------
/// Sleep Duration
/// ---------------------------------------------------------------------------

/// Bare numbers at or above this are already minutes
const BARE_MINUTES_THRESHOLD: f64 = 20.0;

fn hours_minutes_re() -> &'static Regex {
  static RE: OnceLock<Regex> = OnceLock::new();
  RE.get_or_init(|| {
    Regex::new(r"(\d+\.?\d*)\s*h(?:ours?|rs?)?\s*(?:(\d+)\s*(?:m(?:ins?|inutes?)?)?)?")
      .expect("valid hours/minutes pattern")
  })
}

fn clock_re() -> &'static Regex {
  static RE: OnceLock<Regex> = OnceLock::new();
  RE.get_or_init(|| Regex::new(r"(\d+):(\d+)").expect("valid clock pattern"))
}

fn bare_number_re() -> &'static Regex {
  static RE: OnceLock<Regex> = OnceLock::new();
  RE.get_or_init(|| Regex::new(r"(\d+\.?\d*)").expect("valid number pattern"))
}

/// Parse free-text sleep duration into minutes.
///
/// Accepts "7h", "7h30", "7 hours 30 minutes", "7:30", "7.5" (hours)
/// and "450" (minutes).
pub fn parse_sleep_minutes(text: &str) -> Option<f64> {
  let text = text.trim().to_lowercase();
  if text.is_empty() {
    return None;
  }

  if let Some(caps) = hours_minutes_re().captures(&text) {
    let hours: f64 = caps.get(1)?.as_str().parse().ok()?;
    let minutes: f64 = caps
      .get(2)
      .and_then(|m| m.as_str().parse().ok())
      .unwrap_or(0.0);
    return Some(hours * 60.0 + minutes);
  }

  if let Some(caps) = clock_re().captures(&text) {
    let hours: f64 = caps.get(1)?.as_str().parse().ok()?;
    let minutes: f64 = caps.get(2)?.as_str().parse().ok()?;
    return Some(hours * 60.0 + minutes);
  }

  if let Some(caps) = bare_number_re().captures(&text) {
    let n: f64 = caps.get(1)?.as_str().parse().ok()?;
    return Some(if n >= BARE_MINUTES_THRESHOLD { n } else { n * 60.0 });
  }

  None
}

/// Sleep cell variant of [`parse_sleep_minutes`]
pub fn coerce_sleep_minutes(value: &RawValue) -> Option<f64> {
  match value {
    RawValue::Empty => None,
    RawValue::Number(n) if !n.is_finite() => None,
    RawValue::Number(n) => Some(if *n >= BARE_MINUTES_THRESHOLD { *n } else { n * 60.0 }),
    RawValue::Text(s) => parse_sleep_minutes(s),
  }
}

/// ---------------------------------------------------------------------------
/// Timestamps
/// ---------------------------------------------------------------------------

const DATETIME_FORMATS: &[&str] = &[
  "%Y-%m-%d %H:%M:%S%.f",
  "%Y-%m-%d %H:%M:%S",
  "%Y-%m-%d %H:%M",
  "%Y-%m-%dT%H:%M:%S%.f",
  "%Y-%m-%dT%H:%M:%S",
  "%Y-%m-%dT%H:%M",
  // Google Forms exports
  "%m/%d/%Y %H:%M:%S",
  "%m/%d/%Y %H:%M",
  "%d.%m.%Y %H:%M:%S",
  "%Y/%m/%d %H:%M:%S",
];

const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%m/%d/%Y", "%d.%m.%Y", "%Y/%m/%d"];

/// Parse a submission timestamp; unknown formats yield `None`
pub fn parse_timestamp(value: &RawValue) -> Option<NaiveDateTime> {
  let text = match value {
    RawValue::Text(s) => s.trim(),
    _ => return None,
  };
  if text.is_empty() {
    return None;
  }

  if let Ok(dt) = DateTime::parse_from_rfc3339(text) {
    return Some(dt.naive_local());
  }

  for fmt in DATETIME_FORMATS {
    if let Ok(dt) = NaiveDateTime::parse_from_str(text, fmt) {
      return Some(dt);
    }
  }

  for fmt in DATE_FORMATS {
    if let Ok(d) = NaiveDate::parse_from_str(text, fmt) {
      return d.and_hms_opt(0, 0, 0);
    }
  }

  None
}

#[cfg(test)]
mod tests {
  use super::*;

  fn text(s: &str) -> RawValue {
    RawValue::Text(s.to_string())
  }

  #[test]
  fn test_rating_formats() {
    assert_eq!(coerce_rating(&text("7/10")), Some(7.0));
    assert_eq!(coerce_rating(&text("7 out of 10")), Some(7.0));
    assert_eq!(coerce_rating(&text("8 Out Of 10")), Some(8.0));
    assert_eq!(coerce_rating(&text(" 6.5 ")), Some(6.5));
    assert_eq!(coerce_rating(&RawValue::Number(4.0)), Some(4.0));
  }

  #[test]
  fn test_rating_does_not_clamp() {
    assert_eq!(coerce_rating(&text("12/10")), Some(12.0));
    assert_eq!(coerce_rating(&text("-3")), Some(-3.0));
  }

  #[test]
  fn test_rating_garbage_is_null() {
    assert_eq!(coerce_rating(&text("great")), None);
    assert_eq!(coerce_rating(&text("/10")), None);
    assert_eq!(coerce_rating(&text("")), None);
    assert_eq!(coerce_rating(&text("NaN")), None);
    assert_eq!(coerce_rating(&RawValue::Number(f64::NAN)), None);
    assert_eq!(coerce_rating(&RawValue::Empty), None);
  }

  #[test]
  fn test_sleep_text_formats_give_minutes() {
    assert_eq!(parse_sleep_minutes("7h30"), Some(450.0));
    assert_eq!(parse_sleep_minutes("7:30"), Some(450.0));
    assert_eq!(parse_sleep_minutes("7.5"), Some(450.0));
    assert_eq!(parse_sleep_minutes("450"), Some(450.0));
    assert_eq!(parse_sleep_minutes("7 hours 30 minutes"), Some(450.0));
    assert_eq!(parse_sleep_minutes("8h"), Some(480.0));
    assert_eq!(parse_sleep_minutes("6.5 Hours"), Some(390.0));
  }

  #[test]
  fn test_sleep_bare_number_boundary() {
    assert_eq!(parse_sleep_minutes("19"), Some(1140.0));
    assert_eq!(parse_sleep_minutes("20"), Some(20.0));
    assert_eq!(coerce_sleep_minutes(&RawValue::Number(8.0)), Some(480.0));
    assert_eq!(coerce_sleep_minutes(&RawValue::Number(420.0)), Some(420.0));
  }

  #[test]
  fn test_sleep_unparseable_is_null() {
    assert_eq!(parse_sleep_minutes(""), None);
    assert_eq!(parse_sleep_minutes("   "), None);
    assert_eq!(parse_sleep_minutes("not much"), None);
    assert_eq!(coerce_sleep_minutes(&RawValue::Empty), None);
  }

  #[test]
  fn test_timestamp_formats() {
    let expected = NaiveDate::from_ymd_opt(2024, 3, 5)
      .unwrap()
      .and_hms_opt(7, 15, 0)
      .unwrap();

    assert_eq!(parse_timestamp(&text("2024-03-05 07:15:00")), Some(expected));
    assert_eq!(parse_timestamp(&text("3/5/2024 7:15:00")), Some(expected));
    assert_eq!(parse_timestamp(&text("2024-03-05T07:15:00Z")), Some(expected));
    assert_eq!(
      parse_timestamp(&text("2024-03-05")),
      NaiveDate::from_ymd_opt(2024, 3, 5).unwrap().and_hms_opt(0, 0, 0)
    );
  }

  #[test]
  fn test_offset_timestamp_keeps_local_date() {
    let parsed = parse_timestamp(&text("2024-03-05T23:30:00-05:00")).unwrap();

    assert_eq!(parsed.date(), NaiveDate::from_ymd_opt(2024, 3, 5).unwrap());
    assert_eq!(parsed.time(), chrono::NaiveTime::from_hms_opt(23, 30, 0).unwrap());
  }

  #[test]
  fn test_timestamp_garbage_is_null() {
    assert_eq!(parse_timestamp(&text("yesterday")), None);
    assert_eq!(parse_timestamp(&text("")), None);
    assert_eq!(parse_timestamp(&RawValue::Number(45000.0)), None);
    assert_eq!(parse_timestamp(&RawValue::Empty), None);
  }
}
