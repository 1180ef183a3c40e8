use serde::Deserialize;
use serde::Serialize;

/// Languages the bot can reply in. Ukrainian is the default for every
/// user that has not picked one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
  #[default]
  Uk,
  En,
}

impl Language {
  pub fn code(self) -> &'static str {
    match self {
      Self::Uk => "uk",
      Self::En => "en",
    }
  }

  pub fn from_code(code: &str) -> Self {
    match code {
      "en" => Self::En,
      _ => Self::Uk,
    }
  }

  /// Parses one of the fixed keyboard labels. Anything outside the
  /// recognized set yields `None` and the caller re-prompts.
  pub fn from_label(label: &str) -> Option<Self> {
    match label.trim().to_lowercase().as_str() {
      "english" | "англійська" => Some(Self::En),
      "українська" | "ukrainian" => Some(Self::Uk),
      _ => None,
    }
  }
}

/// Gender template set used to pick canned follow-up questions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Gender {
  Female,
  Male,
}

impl Gender {
  pub fn code(self) -> &'static str {
    match self {
      Self::Female => "female",
      Self::Male => "male",
    }
  }

  pub fn from_code(code: &str) -> Option<Self> {
    match code {
      "female" => Some(Self::Female),
      "male" => Some(Self::Male),
      _ => None,
    }
  }

  pub fn from_label(label: &str) -> Option<Self> {
    match label.trim().to_lowercase().as_str() {
      "female" | "жіноча" | "дівчина" => Some(Self::Female),
      "male" | "чоловіча" | "хлопець" => Some(Self::Male),
      _ => None,
    }
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
  User,
  Assistant,
  System,
}

impl Role {
  pub fn as_str(self) -> &'static str {
    match self {
      Self::User => "user",
      Self::Assistant => "assistant",
      Self::System => "system",
    }
  }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserRow {
  pub user_id: i64, // tg chat id
  pub language: Language,
  pub age: Option<i64>,
  pub greeted: bool,
  pub gender: Option<Gender>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessageRow {
  pub user_id: i64,
  pub role: String,
  pub content: String,
}

#[cfg(test)]
mod tests {
  use super::Gender;
  use super::Language;

  #[test]
  fn recognizes_language_labels() {
    assert_eq!(Language::from_label("English"), Some(Language::En));
    assert_eq!(Language::from_label("  англійська "), Some(Language::En));
    assert_eq!(Language::from_label("Українська"), Some(Language::Uk));
    assert_eq!(Language::from_label("Ukrainian"), Some(Language::Uk));
  }

  #[test]
  fn rejects_unknown_language_labels() {
    assert_eq!(Language::from_label("Deutsch"), None);
    assert_eq!(Language::from_label(""), None);
  }

  #[test]
  fn unknown_codes_fall_back_to_ukrainian() {
    assert_eq!(Language::from_code("en"), Language::En);
    assert_eq!(Language::from_code("fr"), Language::Uk);
    assert_eq!(Language::from_code(""), Language::Uk);
  }

  #[test]
  fn recognizes_gender_labels() {
    assert_eq!(Gender::from_label("Male"), Some(Gender::Male));
    assert_eq!(Gender::from_label("жіноча"), Some(Gender::Female));
    assert_eq!(Gender::from_label("other"), None);
  }
}
