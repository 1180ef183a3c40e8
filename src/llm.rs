//! Boundary to the locally hosted language model. The bot only ever needs
//! one operation: send an ordered list of role-tagged messages, get text
//! back. Errors are typed so call sites can log and fall back to a canned
//! reply.

use async_trait::async_trait;
use serde::Deserialize;
use serde::Serialize;
use thiserror::Error;

use crate::models::Role;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
  pub role: String,
  pub content: String,
}

impl ChatMessage {
  pub fn new(role: Role, content: impl Into<String>) -> Self {
    Self {
      role: role.as_str().to_string(),
      content: content.into(),
    }
  }
}

#[derive(Debug, Error)]
pub enum LlmError {
  #[error(transparent)]
  Http(#[from] reqwest::Error),
  #[error("model backend returned status {0}")]
  Status(reqwest::StatusCode),
  #[error("model response carried no content")]
  MissingContent,
}

#[async_trait]
pub trait LanguageModel: Send + Sync {
  async fn chat(&self, messages: &[ChatMessage]) -> Result<String, LlmError>;
}

#[derive(Serialize)]
struct OllamaChatRequest<'a> {
  model: &'a str,
  messages: &'a [ChatMessage],
  stream: bool,
}

#[derive(Deserialize)]
struct OllamaChatResponse {
  message: Option<OllamaMessage>,
}

#[derive(Deserialize)]
struct OllamaMessage {
  content: String,
}

/// Client for Ollama's `/api/chat` endpoint.
pub struct OllamaClient {
  http: reqwest::Client,
  base_url: String,
  model: String,
}

impl OllamaClient {
  pub fn new(base_url: impl Into<String>, model: impl Into<String>) -> Self {
    let base_url = base_url.into().trim_end_matches('/').to_string();
    Self {
      http: reqwest::Client::new(),
      base_url,
      model: model.into(),
    }
  }
}

#[async_trait]
impl LanguageModel for OllamaClient {
  async fn chat(&self, messages: &[ChatMessage]) -> Result<String, LlmError> {
    let request = OllamaChatRequest {
      model: &self.model,
      messages,
      stream: false,
    };
    let response = self
      .http
      .post(format!("{}/api/chat", self.base_url))
      .json(&request)
      .send()
      .await?;

    let status = response.status();
    if !status.is_success() {
      return Err(LlmError::Status(status));
    }

    let body: OllamaChatResponse = response.json().await?;
    let content = body
      .message
      .map(|message| message.content.trim().to_string())
      .filter(|content| !content.is_empty())
      .ok_or(LlmError::MissingContent)?;
    Ok(content)
  }
}

#[cfg(test)]
mod tests {
  use super::ChatMessage;
  use super::OllamaChatRequest;
  use crate::models::Role;

  #[test]
  fn serializes_chat_request_in_ollama_shape() {
    let messages = vec![
      ChatMessage::new(Role::System, "будь людиною"),
      ChatMessage::new(Role::User, "привіт"),
    ];
    let request = OllamaChatRequest {
      model: "gemma:7b",
      messages: &messages,
      stream: false,
    };
    let json = serde_json::to_value(&request).unwrap();
    assert_eq!(json["model"], "gemma:7b");
    assert_eq!(json["stream"], false);
    assert_eq!(json["messages"][0]["role"], "system");
    assert_eq!(json["messages"][1]["content"], "привіт");
  }
}
