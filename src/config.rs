//! Application settings read from the environment (`.env` is loaded by `run`)

use chrono::Duration;
use std::env;
use std::path::PathBuf;
use std::str::FromStr;

use crate::assembler::ReadinessFormula;
use crate::cache::DEFAULT_TTL_SECS;
use crate::chat::DEFAULT_RETAINED;

const DEFAULT_DB_PATH: &str = "wellness.db";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
  #[error("Invalid value for {var}: {value:?} ({reason})")]
  Invalid {
    var: &'static str,
    value: String,
    reason: String,
  },
}

#[derive(Debug, Clone)]
pub struct AppConfig {
  pub db_path: PathBuf,
  pub readiness_formula: ReadinessFormula,
  pub insight_ttl: Duration,
  pub chat_history: usize,
  /// Fall back to the last snapshot once when the source fails
  pub use_fallback: bool,
  pub anthropic_api_key: Option<String>,
}

impl Default for AppConfig {
  fn default() -> Self {
    Self {
      db_path: PathBuf::from(DEFAULT_DB_PATH),
      readiness_formula: ReadinessFormula::default(),
      insight_ttl: Duration::seconds(DEFAULT_TTL_SECS),
      chat_history: DEFAULT_RETAINED,
      use_fallback: true,
      anthropic_api_key: None,
    }
  }
}

fn parse_var<T>(var: &'static str, default: T) -> Result<T, ConfigError>
where
  T: FromStr,
  T::Err: std::fmt::Display,
{
  match env::var(var) {
    Ok(value) if !value.trim().is_empty() => value.trim().parse().map_err(|e: T::Err| ConfigError::Invalid {
      var,
      value,
      reason: e.to_string(),
    }),
    _ => Ok(default),
  }
}

fn parse_bool(var: &'static str, default: bool) -> Result<bool, ConfigError> {
  match env::var(var) {
    Ok(value) => match value.trim().to_lowercase().as_str() {
      "" => Ok(default),
      "1" | "true" | "yes" | "on" => Ok(true),
      "0" | "false" | "no" | "off" => Ok(false),
      _ => Err(ConfigError::Invalid {
        var,
        value,
        reason: "expected true or false".into(),
      }),
    },
    Err(_) => Ok(default),
  }
}

impl AppConfig {
  pub fn from_env() -> Result<Self, ConfigError> {
    let defaults = Self::default();

    let ttl_secs: i64 = parse_var("WELLNESS_INSIGHT_TTL_SECS", DEFAULT_TTL_SECS)?;
    if ttl_secs < 0 {
      return Err(ConfigError::Invalid {
        var: "WELLNESS_INSIGHT_TTL_SECS",
        value: ttl_secs.to_string(),
        reason: "must not be negative".into(),
      });
    }

    let insight_ttl = Duration::try_seconds(ttl_secs).ok_or_else(|| ConfigError::Invalid {
      var: "WELLNESS_INSIGHT_TTL_SECS",
      value: ttl_secs.to_string(),
      reason: "out of range".into(),
    })?;

    Ok(Self {
      db_path: env::var("WELLNESS_DB_PATH")
        .map(PathBuf::from)
        .unwrap_or(defaults.db_path),
      readiness_formula: parse_var("WELLNESS_READINESS_FORMULA", defaults.readiness_formula)?,
      insight_ttl,
      chat_history: parse_var("WELLNESS_CHAT_HISTORY", defaults.chat_history)?,
      use_fallback: parse_bool("WELLNESS_USE_FALLBACK", defaults.use_fallback)?,
      anthropic_api_key: env::var("ANTHROPIC_API_KEY").ok().filter(|k| !k.trim().is_empty()),
    })
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use serial_test::serial;

  const VARS: [&str; 6] = [
    "WELLNESS_DB_PATH",
    "WELLNESS_READINESS_FORMULA",
    "WELLNESS_INSIGHT_TTL_SECS",
    "WELLNESS_CHAT_HISTORY",
    "WELLNESS_USE_FALLBACK",
    "ANTHROPIC_API_KEY",
  ];

  #[test]
  #[serial]
  fn test_defaults_when_unset() {
    temp_env::with_vars_unset(VARS, || {
      let config = AppConfig::from_env().unwrap();
      assert_eq!(config.db_path, PathBuf::from("wellness.db"));
      assert_eq!(config.readiness_formula, ReadinessFormula::Simple);
      assert_eq!(config.insight_ttl, Duration::seconds(3600));
      assert_eq!(config.chat_history, 3);
      assert!(config.use_fallback);
      assert!(config.anthropic_api_key.is_none());
    });
  }

  #[test]
  #[serial]
  fn test_values_are_read() {
    temp_env::with_vars(
      [
        ("WELLNESS_DB_PATH", Some("/tmp/w.db")),
        ("WELLNESS_READINESS_FORMULA", Some("weighted")),
        ("WELLNESS_INSIGHT_TTL_SECS", Some("60")),
        ("WELLNESS_CHAT_HISTORY", Some("5")),
        ("WELLNESS_USE_FALLBACK", Some("false")),
        ("ANTHROPIC_API_KEY", Some("sk-test")),
      ],
      || {
        let config = AppConfig::from_env().unwrap();
        assert_eq!(config.db_path, PathBuf::from("/tmp/w.db"));
        assert_eq!(config.readiness_formula, ReadinessFormula::Weighted);
        assert_eq!(config.insight_ttl, Duration::seconds(60));
        assert_eq!(config.chat_history, 5);
        assert!(!config.use_fallback);
        assert_eq!(config.anthropic_api_key.as_deref(), Some("sk-test"));
      },
    );
  }

  #[test]
  #[serial]
  fn test_invalid_values_are_reported() {
    temp_env::with_var("WELLNESS_READINESS_FORMULA", Some("median"), || {
      let err = AppConfig::from_env().unwrap_err();
      assert!(err.to_string().contains("WELLNESS_READINESS_FORMULA"));
    });

    temp_env::with_var("WELLNESS_USE_FALLBACK", Some("maybe"), || {
      assert!(AppConfig::from_env().is_err());
    });

    temp_env::with_var("WELLNESS_INSIGHT_TTL_SECS", Some("-5"), || {
      assert!(AppConfig::from_env().is_err());
    });
  }

  #[test]
  #[serial]
  fn test_oversized_ttl_is_reported() {
    temp_env::with_var("WELLNESS_INSIGHT_TTL_SECS", Some("9223372036854775807"), || {
      let err = AppConfig::from_env().unwrap_err();
      assert!(err.to_string().contains("out of range"));
    });
  }
}
