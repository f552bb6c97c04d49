//! Question/answer log for the chat feature

use serde::{Deserialize, Serialize};

pub const DEFAULT_RETAINED: usize = 3;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatExchange {
  pub question: String,
  pub answer: String,
}

/// Append-only log that keeps the last `capacity` exchanges
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatLog {
  capacity: usize,
  exchanges: Vec<ChatExchange>,
}

impl Default for ChatLog {
  fn default() -> Self {
    Self::new(DEFAULT_RETAINED)
  }
}

impl ChatLog {
  pub fn new(capacity: usize) -> Self {
    Self {
      capacity: capacity.max(1),
      exchanges: Vec::new(),
    }
  }

  pub fn push(&mut self, question: impl Into<String>, answer: impl Into<String>) {
    self.exchanges.push(ChatExchange {
      question: question.into(),
      answer: answer.into(),
    });
    if self.exchanges.len() > self.capacity {
      let excess = self.exchanges.len() - self.capacity;
      self.exchanges.drain(..excess);
    }
  }

  /// Oldest first
  pub fn exchanges(&self) -> &[ChatExchange] {
    &self.exchanges
  }

  pub fn clear(&mut self) {
    self.exchanges.clear();
  }

  pub fn len(&self) -> usize {
    self.exchanges.len()
  }

  pub fn is_empty(&self) -> bool {
    self.exchanges.is_empty()
  }

  /// Plain-text transcript, "You:" / "Coach:" lines
  pub fn transcript(&self) -> String {
    self
      .exchanges
      .iter()
      .map(|e| format!("You: {}\nCoach: {}", e.question, e.answer))
      .collect::<Vec<_>>()
      .join("\n\n")
  }
}
