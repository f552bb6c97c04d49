use chrono::Utc;
use serde::Deserialize;

use super::AppState;
use crate::analysis::{compare, summarize, summarize_team, DEFAULT_PERIOD_DAYS};
use crate::cache::{InsightKey, InsightKind};
use crate::chat::ChatExchange;
use crate::llm::{failure_text, LlmError};
use crate::risk::{assess_risk, RiskAssessment, RiskThresholds};

/// ---------------------------------------------------------------------------
/// Narrative Insights
/// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
pub struct InsightRequest {
  pub kind: InsightKind,
  pub athlete: Option<String>,
  pub other: Option<String>,
  #[serde(default = "default_period")]
  pub period_days: i64,
  #[serde(default)]
  pub focus: Vec<String>,
}

fn default_period() -> i64 {
  DEFAULT_PERIOD_DAYS
}

impl InsightRequest {
  pub fn individual(athlete: impl Into<String>, period_days: i64) -> Self {
    Self {
      kind: InsightKind::Individual,
      athlete: Some(athlete.into()),
      other: None,
      period_days,
      focus: Vec::new(),
    }
  }

  pub fn team(period_days: i64) -> Self {
    Self {
      kind: InsightKind::Team,
      athlete: None,
      other: None,
      period_days,
      focus: Vec::new(),
    }
  }

  pub fn comparison(first: impl Into<String>, second: impl Into<String>, period_days: i64) -> Self {
    Self {
      kind: InsightKind::Comparison,
      athlete: Some(first.into()),
      other: Some(second.into()),
      period_days,
      focus: Vec::new(),
    }
  }

  pub fn with_focus(mut self, focus: Vec<String>) -> Self {
    self.focus = focus;
    self
  }

  fn key(&self) -> Result<InsightKey, String> {
    match (self.kind, self.athlete.as_deref(), self.other.as_deref()) {
      (InsightKind::Individual, Some(athlete), _) => Ok(InsightKey::individual(athlete, self.period_days)),
      (InsightKind::Team, _, _) => Ok(InsightKey::team(self.period_days)),
      (InsightKind::Comparison, Some(first), Some(second)) => {
        Ok(InsightKey::comparison(first, second, self.period_days))
      }
      (kind, _, _) => Err(format!("Missing athlete for {} insights", kind.as_str())),
    }
  }
}

/// Narrative for the request, served from the cache while fresh.
/// Generation failures come back as the failure text and are not cached.
pub async fn get_insights(state: &mut AppState, request: &InsightRequest) -> Result<String, String> {
  let key = request.key()?;
  let now = Utc::now();
  state.cache.purge_expired(now);

  let data = state.loaded()?;

  if let Some(text) = state.cache.get(&key, now) {
    tracing::debug!(kind = key.kind.as_str(), "insight cache hit");
    return Ok(text.to_string());
  }

  let Some(client) = state.llm.as_ref() else {
    return Ok(failure_text(&LlmError::MissingApiKey));
  };

  let athlete = key.athlete.as_deref().unwrap_or_default();
  let result = match key.kind {
    InsightKind::Individual => {
      let digest = summarize(&data.enriched, Some(athlete), key.period_days);
      client.athlete_insights(&digest, &request.focus).await
    }
    InsightKind::Team => {
      let team = summarize_team(&data.enriched, key.period_days);
      client.team_insights(&team).await
    }
    InsightKind::Comparison => {
      let other = key.other.as_deref().unwrap_or_default();
      let comparison = compare(&data.enriched, athlete, other, key.period_days);
      client.comparison_insights(&comparison).await
    }
  };

  match result {
    Ok(text) => {
      state.cache.put(key, text.clone(), now);
      Ok(text)
    }
    Err(e) => {
      tracing::warn!(error = %e, kind = key.kind.as_str(), "insight generation failed");
      Ok(failure_text(&e))
    }
  }
}

/// ---------------------------------------------------------------------------
/// Risk / Chat
/// ---------------------------------------------------------------------------

pub fn get_risk(state: &AppState, athlete: &str) -> Result<Option<RiskAssessment>, String> {
  let data = state.loaded()?;
  let thresholds = RiskThresholds::for_formula(data.table.readiness_formula);
  Ok(assess_risk(&data.enriched, athlete, &thresholds))
}

/// Answer a free-form question about one athlete, or the team when `athlete` is None
pub async fn ask_question(
  state: &mut AppState,
  athlete: Option<&str>,
  question: &str,
) -> Result<String, String> {
  let data = state.loaded()?;

  let Some(client) = state.llm.as_ref() else {
    return Ok(failure_text(&LlmError::MissingApiKey));
  };

  let digest = summarize(&data.enriched, athlete, DEFAULT_PERIOD_DAYS);
  match client.answer_question(&digest, question).await {
    Ok(answer) => {
      state.chat.push(question, answer.clone());
      Ok(answer)
    }
    Err(e) => {
      tracing::warn!(error = %e, "question answering failed");
      Ok(failure_text(&e))
    }
  }
}

pub fn chat_history(state: &AppState) -> Vec<ChatExchange> {
  state.chat.exchanges().to_vec()
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::commands::data::refresh_data;
  use crate::commands::{DataSource, LoadedData};
  use crate::config::AppConfig;
  use crate::llm::ClaudeClient;
  use crate::models::{EnrichedTable, WellnessRecord};
  use crate::risk::RiskLevel;
  use crate::test_utils::{mock_record, mock_table, write_temp_csv, SAMPLE_CSV};

  fn reply(text: &str) -> String {
    serde_json::json!({
      "content": [{"type": "text", "text": text}],
      "usage": {"input_tokens": 10, "output_tokens": 5}
    })
    .to_string()
  }

  fn stressed(day: u32) -> WellnessRecord {
    let mut record = mock_record("Ben", day, Some(5.0));
    record.stress = Some(9.0);
    record
  }

  fn loaded_state() -> AppState {
    let table = mock_table(vec![
      mock_record("Ana", 1, Some(7.0)),
      mock_record("Ana", 2, Some(8.0)),
      stressed(1),
      stressed(2),
    ]);
    let enriched = EnrichedTable::build(&table);

    let mut state = AppState::new(AppConfig::default(), DataSource::Csv("unused.csv".into()), None);
    state.data = Some(LoadedData {
      table,
      enriched,
      from_snapshot: false,
      loaded_at: Utc::now(),
    });
    state
  }

  #[tokio::test]
  async fn test_insights_are_cached_per_request() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
      .mock("POST", "/v1/messages")
      .with_status(200)
      .with_body(reply("Ana is sleeping more."))
      .expect(1)
      .create_async()
      .await;

    let mut state = loaded_state().with_llm(ClaudeClient::new("k").with_base_url(server.url()));
    let request = InsightRequest::individual("Ana", 14);

    let first = get_insights(&mut state, &request).await.unwrap();
    let second = get_insights(&mut state, &request).await.unwrap();

    assert_eq!(first, "Ana is sleeping more.");
    assert_eq!(second, first);
    assert_eq!(state.cache.len(), 1);
    mock.assert_async().await;
  }

  #[tokio::test]
  async fn test_expired_entries_are_purged_on_lookup() {
    let mut state = loaded_state();
    state
      .cache
      .put(InsightKey::team(7), "old".into(), Utc::now() - chrono::Duration::hours(2));
    assert_eq!(state.cache.len(), 1);

    get_insights(&mut state, &InsightRequest::individual("Ana", 14)).await.unwrap();

    assert!(state.cache.is_empty());
  }

  #[tokio::test]
  async fn test_failures_are_not_cached() {
    let mut server = mockito::Server::new_async().await;
    server
      .mock("POST", "/v1/messages")
      .with_status(500)
      .with_body(r#"{"error":{"message":"overloaded"}}"#)
      .create_async()
      .await;

    let mut state = loaded_state().with_llm(ClaudeClient::new("k").with_base_url(server.url()));
    let text = get_insights(&mut state, &InsightRequest::team(14)).await.unwrap();

    assert!(text.starts_with("Error generating insights"));
    assert!(state.cache.is_empty());
  }

  #[tokio::test]
  async fn test_missing_key_degrades_to_message() {
    let mut state = loaded_state();

    let text = get_insights(&mut state, &InsightRequest::comparison("Ana", "Ben", 14))
      .await
      .unwrap();

    assert!(text.starts_with("API key not configured"));
    assert!(state.cache.is_empty());
  }

  #[tokio::test]
  async fn test_incomplete_request_is_rejected() {
    let mut state = loaded_state();
    let request = InsightRequest {
      other: None,
      ..InsightRequest::comparison("Ana", "Ben", 14)
    };

    let err = get_insights(&mut state, &request).await.unwrap_err();
    assert_eq!(err, "Missing athlete for comparison insights");
  }

  #[tokio::test]
  async fn test_refresh_clears_cached_insights() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
      .mock("POST", "/v1/messages")
      .with_status(200)
      .with_body(reply("Team is steady."))
      .expect(2)
      .create_async()
      .await;

    let path = write_temp_csv("insights_refresh", SAMPLE_CSV);
    let mut state = AppState::new(AppConfig::default(), DataSource::Csv(path.clone()), None)
      .with_llm(ClaudeClient::new("k").with_base_url(server.url()));
    refresh_data(&mut state).await.unwrap();

    let request = InsightRequest::team(14);
    get_insights(&mut state, &request).await.unwrap();
    refresh_data(&mut state).await.unwrap();
    assert!(state.cache.is_empty());
    get_insights(&mut state, &request).await.unwrap();

    mock.assert_async().await;
    std::fs::remove_file(path).ok();
  }

  #[test]
  fn test_risk_for_known_and_unknown_athletes() {
    let state = loaded_state();

    let ben = get_risk(&state, "Ben").unwrap().unwrap();
    assert_eq!(ben.risk_level, RiskLevel::Low);
    assert_eq!(ben.factors, vec!["High stress levels (9.0)"]);

    assert!(get_risk(&state, "Zed").unwrap().is_none());
  }

  #[tokio::test]
  async fn test_answers_are_kept_in_chat_history() {
    let mut server = mockito::Server::new_async().await;
    server
      .mock("POST", "/v1/messages")
      .with_status(200)
      .with_body(reply("Yes, Ana looks ready."))
      .create_async()
      .await;

    let mut state = loaded_state().with_llm(ClaudeClient::new("k").with_base_url(server.url()));
    let answer = ask_question(&mut state, Some("Ana"), "Is Ana ready?").await.unwrap();

    assert_eq!(answer, "Yes, Ana looks ready.");
    let history = chat_history(&state);
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].question, "Is Ana ready?");
  }
}
