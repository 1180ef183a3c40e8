use std::env;

use anyhow::Context;
use anyhow::Result;

const DEFAULT_OLLAMA_URL: &str = "http://localhost:11434";
const DEFAULT_MODEL: &str = "gemma:7b";
const DEFAULT_FOLLOW_UP_PROBABILITY: f64 = 0.5;

#[derive(Debug, Clone)]
pub struct Config {
  pub bot_token: String,
  pub database_url: String,
  pub ollama_url: String,
  pub model_name: String,
  pub follow_up_probability: f64,
}

impl Config {
  pub fn from_env() -> Result<Self> {
    let bot_token = env::var("BOT_TOKEN")
      .or_else(|_| env::var("TELOXIDE_TOKEN"))
      .context("BOT_TOKEN or TELOXIDE_TOKEN must be set")?;
    let database_url = env::var("DATABASE_URL").context("DATABASE_URL must be set")?;
    let ollama_url = env::var("OLLAMA_URL").unwrap_or_else(|_| DEFAULT_OLLAMA_URL.to_string());
    let model_name = env::var("OLLAMA_MODEL").unwrap_or_else(|_| DEFAULT_MODEL.to_string());
    let follow_up_probability = parse_probability(&env::var("FOLLOW_UP_PROBABILITY").unwrap_or_default());
    Ok(Self {
      bot_token,
      database_url,
      ollama_url,
      model_name,
      follow_up_probability,
    })
  }
}

fn parse_probability(raw: &str) -> f64 {
  let trimmed = raw.trim();
  if trimmed.is_empty() {
    return DEFAULT_FOLLOW_UP_PROBABILITY;
  }
  match trimmed.parse::<f64>() {
    Ok(value) if (0.0 ..= 1.0).contains(&value) => value,
    Ok(value) => {
      tracing::warn!(value, "FOLLOW_UP_PROBABILITY outside [0, 1], using default");
      DEFAULT_FOLLOW_UP_PROBABILITY
    },
    Err(err) => {
      tracing::warn!(value = trimmed, error = %err, "invalid FOLLOW_UP_PROBABILITY");
      DEFAULT_FOLLOW_UP_PROBABILITY
    },
  }
}

#[cfg(test)]
mod tests {
  use super::DEFAULT_FOLLOW_UP_PROBABILITY;
  use super::parse_probability;

  #[test]
  fn parses_valid_probability() {
    assert_eq!(parse_probability("0.6"), 0.6);
    assert_eq!(parse_probability(" 1 "), 1.0);
    assert_eq!(parse_probability("0"), 0.0);
  }

  #[test]
  fn falls_back_on_invalid_input() {
    assert_eq!(parse_probability("abc"), DEFAULT_FOLLOW_UP_PROBABILITY);
    assert_eq!(parse_probability("1.5"), DEFAULT_FOLLOW_UP_PROBABILITY);
    assert_eq!(parse_probability("-0.1"), DEFAULT_FOLLOW_UP_PROBABILITY);
  }

  #[test]
  fn empty_input_uses_default() {
    assert_eq!(parse_probability(""), DEFAULT_FOLLOW_UP_PROBABILITY);
  }
}
