//! LLM integration for wellness narratives
//!
//! This module handles communication with the Claude API. Requests carry a
//! digest from `analysis`; the reply is free text that is passed through
//! untouched.

use reqwest::Client;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::analysis::{ComparisonDigest, Digest, TeamDigest};

/// ---------------------------------------------------------------------------
/// Configuration
/// ---------------------------------------------------------------------------

const CLAUDE_API_BASE: &str = "https://api.anthropic.com";
const CLAUDE_MODEL: &str = "claude-sonnet-4-20250514";
const API_VERSION: &str = "2023-06-01";

const SYSTEM_PROMPT: &str = include_str!("prompts/analyst_system.txt");

/// ---------------------------------------------------------------------------
/// Error Types
/// ---------------------------------------------------------------------------

#[derive(Error, Debug, Serialize)]
pub enum LlmError {
  #[error("API key not configured. Add ANTHROPIC_API_KEY to your environment.")]
  MissingApiKey,

  #[error("Request failed: {0}")]
  Request(String),

  #[error("API error: {0}")]
  Api(String),

  #[error("Parse error: {0}")]
  Parse(String),
}

/// ---------------------------------------------------------------------------
/// Claude API Types
/// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
struct ClaudeRequest {
  model: String,
  max_tokens: u32,
  system: String,
  messages: Vec<ClaudeMessage>,
}

#[derive(Debug, Serialize)]
struct ClaudeMessage {
  role: String,
  content: String,
}

#[derive(Debug, Deserialize)]
struct ClaudeResponse {
  content: Vec<ContentBlock>,
  usage: Usage,
}

#[derive(Debug, Deserialize)]
struct ContentBlock {
  #[serde(rename = "type")]
  content_type: String,
  text: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct Usage {
  pub input_tokens: u32,
  pub output_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct ClaudeErrorResponse {
  error: ClaudeErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ClaudeErrorDetail {
  message: String,
}

/// ---------------------------------------------------------------------------
/// Claude Client
/// ---------------------------------------------------------------------------

pub struct ClaudeClient {
  client: Client,
  api_key: String,
  base_url: String,
}

impl ClaudeClient {
  pub fn new(api_key: impl Into<String>) -> Self {
    Self {
      client: Client::new(),
      api_key: api_key.into(),
      base_url: CLAUDE_API_BASE.to_string(),
    }
  }

  /// Point the client at another host (used by tests)
  pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
    self.base_url = base_url.into().trim_end_matches('/').to_string();
    self
  }

  /// Call Claude with a system prompt and user message
  pub async fn complete(
    &self,
    system_prompt: &str,
    user_message: &str,
    max_tokens: u32,
  ) -> Result<(String, Usage), LlmError> {
    let request = ClaudeRequest {
      model: CLAUDE_MODEL.to_string(),
      max_tokens,
      system: system_prompt.to_string(),
      messages: vec![ClaudeMessage {
        role: "user".to_string(),
        content: user_message.to_string(),
      }],
    };

    let response = self
      .client
      .post(format!("{}/v1/messages", self.base_url))
      .header("x-api-key", &self.api_key)
      .header("anthropic-version", API_VERSION)
      .header("content-type", "application/json")
      .json(&request)
      .send()
      .await
      .map_err(|e| LlmError::Request(e.to_string()))?;

    let status = response.status();
    let body = response
      .text()
      .await
      .map_err(|e| LlmError::Request(e.to_string()))?;

    if !status.is_success() {
      if let Ok(error_resp) = serde_json::from_str::<ClaudeErrorResponse>(&body) {
        return Err(LlmError::Api(error_resp.error.message));
      }
      return Err(LlmError::Api(format!("HTTP {}: {}", status, body)));
    }

    let claude_response: ClaudeResponse =
      serde_json::from_str(&body).map_err(|e| LlmError::Parse(e.to_string()))?;

    let text = claude_response
      .content
      .iter()
      .find(|c| c.content_type == "text")
      .and_then(|c| c.text.clone())
      .ok_or_else(|| LlmError::Parse("No text content in response".to_string()))?;

    tracing::debug!(
      input_tokens = claude_response.usage.input_tokens,
      output_tokens = claude_response.usage.output_tokens,
      "claude completion"
    );

    Ok((text, claude_response.usage))
  }

  async fn narrate(&self, user_message: String, max_tokens: u32) -> Result<String, LlmError> {
    let (text, _usage) = self.complete(SYSTEM_PROMPT, &user_message, max_tokens).await?;
    Ok(text)
  }

  /// Narrative for one athlete
  pub async fn athlete_insights(
    &self,
    digest: &Digest,
    focus_areas: &[String],
  ) -> Result<String, LlmError> {
    self.narrate(athlete_prompt(digest, focus_areas), 500).await
  }

  pub async fn team_insights(&self, team: &TeamDigest) -> Result<String, LlmError> {
    self.narrate(team_prompt(team), 500).await
  }

  pub async fn comparison_insights(&self, comparison: &ComparisonDigest) -> Result<String, LlmError> {
    self.narrate(comparison_prompt(comparison), 600).await
  }

  /// Free-form question answered against a digest
  pub async fn answer_question(&self, digest: &Digest, question: &str) -> Result<String, LlmError> {
    self.narrate(question_prompt(digest, question), 300).await
  }
}

/// Collapse a narrative failure into the text shown in place of the insight
pub fn failure_text(err: &LlmError) -> String {
  match err {
    LlmError::MissingApiKey => err.to_string(),
    other => format!("Error generating insights: {}", other),
  }
}

/// ---------------------------------------------------------------------------
/// Prompts
/// ---------------------------------------------------------------------------

fn athlete_prompt(digest: &Digest, focus_areas: &[String]) -> String {
  let focus = if focus_areas.is_empty() {
    "General wellness and performance".to_string()
  } else {
    focus_areas.join(", ")
  };

  format!(
    r#"Analyze this athlete's wellness data and provide insights.

DATA SUMMARY:
{}

FOCUS AREAS: {}

Provide:
1. Current Status Assessment (2-3 sentences on overall wellness state)
2. Key Observations (2-3 bullet points on notable patterns or concerns)
3. Actionable Recommendations (2-3 specific actions for performance and recovery)
4. Risk Factors (warning signs needing immediate attention)"#,
    digest.to_json(),
    focus
  )
}

fn team_prompt(team: &TeamDigest) -> String {
  format!(
    r#"Analyze this team's wellness data and provide insights.

TEAM SUMMARY:
{}

Provide:
1. Team Performance Overview (2-3 sentences)
2. Athletes Needing Support
3. Team Patterns (common trends or issues)
4. Team Recommendations (2-3 actions coaches can take immediately)"#,
    team.to_json()
  )
}

fn comparison_prompt(comparison: &ComparisonDigest) -> String {
  format!(
    r#"Compare these two athletes' wellness data.

{}

Provide:
1. Key Differences
2. Strengths (what each athlete is doing well)
3. Learning Opportunities (what each could learn from the other)
4. Personalized Recommendations

Keep it constructive and focused on improvement."#,
    comparison.to_json()
  )
}

fn question_prompt(digest: &Digest, question: &str) -> String {
  let scope = if digest.context.athlete == "Team" {
    "Analyzing team data".to_string()
  } else {
    format!("Analyzing data for {}", digest.context.athlete)
  };

  format!(
    r#"CONTEXT: {}
DATA:
{}

QUESTION: {}

Give a helpful, specific answer based on the data."#,
    scope,
    digest.to_json(),
    question
  )
}

/// ---------------------------------------------------------------------------
/// Tests
/// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
  use super::*;
  use crate::analysis::{summarize, summarize_team};
  use crate::test_utils::{mock_enriched, mock_record};

  fn success_body(text: &str) -> String {
    serde_json::json!({
      "id": "msg_1",
      "type": "message",
      "role": "assistant",
      "model": CLAUDE_MODEL,
      "content": [{"type": "text", "text": text}],
      "stop_reason": "end_turn",
      "usage": {"input_tokens": 120, "output_tokens": 40}
    })
    .to_string()
  }

  fn ana_digest() -> Digest {
    let table = mock_enriched(vec![mock_record("Ana", 1, Some(7.0)), mock_record("Ana", 2, Some(8.0))]);
    summarize(&table, Some("Ana"), 14)
  }

  #[tokio::test]
  async fn test_complete_returns_text_and_usage() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
      .mock("POST", "/v1/messages")
      .match_header("x-api-key", "test-key")
      .match_header("anthropic-version", API_VERSION)
      .with_status(200)
      .with_header("content-type", "application/json")
      .with_body(success_body("Ana is well rested."))
      .create_async()
      .await;

    let client = ClaudeClient::new("test-key").with_base_url(server.url());
    let (text, usage) = client.complete("system", "hello", 100).await.unwrap();

    assert_eq!(text, "Ana is well rested.");
    assert_eq!(usage.input_tokens, 120);
    mock.assert_async().await;
  }

  #[tokio::test]
  async fn test_athlete_insights_sends_digest() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
      .mock("POST", "/v1/messages")
      .match_body(mockito::Matcher::Regex("current_status".to_string()))
      .with_status(200)
      .with_body(success_body("Sleep is trending up."))
      .create_async()
      .await;

    let client = ClaudeClient::new("k").with_base_url(server.url());
    let text = client.athlete_insights(&ana_digest(), &[]).await.unwrap();

    assert_eq!(text, "Sleep is trending up.");
    mock.assert_async().await;
  }

  #[tokio::test]
  async fn test_api_error_message_is_surfaced() {
    let mut server = mockito::Server::new_async().await;
    server
      .mock("POST", "/v1/messages")
      .with_status(429)
      .with_body(r#"{"type":"error","error":{"type":"rate_limit_error","message":"Slow down"}}"#)
      .create_async()
      .await;

    let client = ClaudeClient::new("k").with_base_url(server.url());
    let table = mock_enriched(vec![mock_record("Ana", 1, Some(7.0))]);
    let err = client.team_insights(&summarize_team(&table, 14)).await.unwrap_err();

    assert!(matches!(err, LlmError::Api(ref m) if m == "Slow down"));
    assert_eq!(failure_text(&err), "Error generating insights: API error: Slow down");
  }

  #[tokio::test]
  async fn test_response_without_text_is_parse_error() {
    let mut server = mockito::Server::new_async().await;
    server
      .mock("POST", "/v1/messages")
      .with_status(200)
      .with_body(r#"{"content":[],"usage":{"input_tokens":1,"output_tokens":0}}"#)
      .create_async()
      .await;

    let client = ClaudeClient::new("k").with_base_url(server.url());
    let err = client.answer_question(&ana_digest(), "How is Ana?").await.unwrap_err();
    assert!(matches!(err, LlmError::Parse(_)));
  }

  #[test]
  fn test_question_prompt_names_scope() {
    let prompt = question_prompt(&ana_digest(), "Is Ana ready?");
    assert!(prompt.contains("Analyzing data for Ana"));
    assert!(prompt.contains("QUESTION: Is Ana ready?"));
  }

  #[test]
  fn test_athlete_prompt_defaults_focus() {
    let prompt = athlete_prompt(&ana_digest(), &[]);
    assert!(prompt.contains("FOCUS AREAS: General wellness and performance"));

    let focused = athlete_prompt(&ana_digest(), &["sleep".to_string(), "stress".to_string()]);
    assert!(focused.contains("FOCUS AREAS: sleep, stress"));
  }

  #[test]
  fn test_missing_key_text_is_unprefixed() {
    assert!(failure_text(&LlmError::MissingApiKey).starts_with("API key not configured"));
  }
}
