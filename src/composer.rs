//! Response composer: ordered rule matching first, model delegation last.
//!
//! The rule table is an explicit priority-ordered list so precedence is
//! visible and testable; the first matching predicate wins and the model
//! is only consulted when nothing matched. `compose` is infallible by
//! contract: every internal failure turns into a reply.

use std::sync::Arc;
use std::sync::Mutex as StdMutex;

use rand::Rng;
use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use tracing::info;
use tracing::warn;

use crate::llm::ChatMessage;
use crate::llm::LanguageModel;
use crate::models::Language;
use crate::models::Role;
use crate::session::Session;
use crate::session::SessionStore;
use crate::texts;

/// Telegram rejects longer messages anyway, so model output is trimmed
/// to this many characters.
pub const MAX_REPLY_CHARS: usize = 4000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RuleKind {
  Greeting,
  Identity,
  Age,
  Deflection,
}

struct Rule {
  matches: fn(&str) -> bool,
  kind: RuleKind,
}

fn is_greeting(input: &str) -> bool {
  matches!(input, "привіт" | "вітаю" | "hi" | "hello")
}

fn asks_name(input: &str) -> bool {
  ["як тебе звати", "what's your name", "your name"]
    .iter()
    .any(|needle| input.contains(needle))
}

fn asks_age(input: &str) -> bool {
  ["скільки тобі років", "твій вік", "how old are you", "your age"]
    .iter()
    .any(|needle| input.contains(needle))
}

fn doubts_humanity(input: &str) -> bool {
  ["ти бот", "ти робот", "ти справжн", "are you a bot", "are you real"]
    .iter()
    .any(|needle| input.contains(needle))
}

/// Priority order matters: the age question must win over model
/// delegation, and greetings are matched before anything fuzzier.
static RULES: &[Rule] = &[
  Rule {
    matches: is_greeting,
    kind: RuleKind::Greeting,
  },
  Rule {
    matches: asks_name,
    kind: RuleKind::Identity,
  },
  Rule {
    matches: asks_age,
    kind: RuleKind::Age,
  },
  Rule {
    matches: doubts_humanity,
    kind: RuleKind::Deflection,
  },
];

fn first_matching_rule(input: &str) -> Option<RuleKind> {
  RULES.iter().find(|rule| (rule.matches)(input)).map(|rule| rule.kind)
}

/// The follow-up coin flip, kept apart from the main reply path so its
/// probability and effect stay independently verifiable. Seedable for
/// deterministic tests.
pub struct FollowUpDecider {
  probability: f64,
  rng: StdMutex<StdRng>,
}

impl FollowUpDecider {
  pub fn new(probability: f64) -> Self {
    Self::with_rng(probability, StdRng::from_entropy())
  }

  pub fn with_seed(probability: f64, seed: u64) -> Self {
    Self::with_rng(probability, StdRng::seed_from_u64(seed))
  }

  fn with_rng(probability: f64, rng: StdRng) -> Self {
    Self {
      probability: probability.clamp(0.0, 1.0),
      rng: StdMutex::new(rng),
    }
  }

  pub fn decide(&self) -> bool {
    let mut rng = self.rng.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
    rng.gen_bool(self.probability)
  }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
  pub text: String,
  pub follow_up: Option<String>,
}

impl Reply {
  fn plain(text: impl Into<String>) -> Self {
    Self {
      text: text.into(),
      follow_up: None,
    }
  }
}

pub struct Composer {
  sessions: SessionStore,
  llm: Arc<dyn LanguageModel>,
  follow_up: FollowUpDecider,
}

impl Composer {
  pub fn new(sessions: SessionStore, llm: Arc<dyn LanguageModel>, follow_up: FollowUpDecider) -> Self {
    Self {
      sessions,
      llm,
      follow_up,
    }
  }

  pub fn sessions(&self) -> &SessionStore {
    &self.sessions
  }

  /// Composes the reply (and optional follow-up question) for one inbound
  /// message, appending both sides of the exchange to the chat log.
  pub async fn compose(&self, user_id: i64, text: &str) -> Reply {
    let _guard = self.sessions.lock(user_id).await;
    let session = self.sessions.get_or_init(user_id).await;
    let language = session.language;
    let trimmed = text.trim();
    let lowered = trimmed.to_lowercase();

    self.sessions.append(user_id, Role::User, trimmed).await;

    let rule = first_matching_rule(&lowered);
    info!(user_id, ?rule, "composing reply");

    let (reply_text, from_model) = match rule {
      Some(RuleKind::Greeting) => {
        let text = if session.greeted {
          texts::greeting(language).to_string()
        } else {
          self.sessions.mark_greeted(user_id).await;
          texts::intro(language).to_string()
        };
        (text, false)
      },
      Some(RuleKind::Identity) => (texts::name_reply(language).to_string(), false),
      Some(RuleKind::Age) => {
        let age = self.sessions.get_or_set_age(user_id).await;
        (render_age_reply(language, age), false)
      },
      Some(RuleKind::Deflection) => (pick_phrase(texts::bot_deflections(language)), false),
      None => match self.delegate(user_id, language, trimmed).await {
        Ok(text) => (trim_reply(&text, MAX_REPLY_CHARS), true),
        Err(err) => {
          warn!(user_id, error = %err, "language model call failed");
          (texts::apology(language).to_string(), false)
        },
      },
    };

    self.sessions.append(user_id, Role::Assistant, &reply_text).await;

    let follow_up = if from_model && self.follow_up.decide() {
      self.follow_up_question(user_id, &session, language, trimmed).await
    } else {
      None
    };
    if let Some(question) = &follow_up {
      self.sessions.append(user_id, Role::Assistant, question).await;
    }

    Reply {
      text: reply_text,
      follow_up,
    }
  }

  /// Handles a language selection, whether it came from the keyboard or
  /// from `/setlanguage`. Unrecognized input changes nothing and gets the
  /// retry prompt.
  pub async fn apply_language_choice(&self, user_id: i64, label: &str) -> Reply {
    let Some(language) = Language::from_label(label) else {
      return Reply::plain(texts::LANGUAGE_REPROMPT);
    };
    let _guard = self.sessions.lock(user_id).await;
    self.sessions.set_language(user_id, language).await;
    info!(user_id, language = language.code(), "language changed");
    Reply {
      text: texts::language_changed(language).to_string(),
      follow_up: Some(texts::intro(language).to_string()),
    }
  }

  async fn delegate(&self, user_id: i64, language: Language, text: &str) -> Result<String, crate::llm::LlmError> {
    let mut messages = vec![ChatMessage::new(Role::System, texts::system_prompt(language))];
    let history = self.sessions.history(user_id).await;
    if history.is_empty() {
      // Store may be degraded; the current message must still reach the
      // model.
      messages.push(ChatMessage::new(Role::User, text));
    } else {
      messages.extend(history.into_iter().map(|row| ChatMessage {
        role: row.role,
        content: row.content,
      }));
    }
    self.llm.chat(&messages).await
  }

  async fn follow_up_question(
    &self,
    user_id: i64,
    session: &Session,
    language: Language,
    text: &str,
  ) -> Option<String> {
    if let Some(gender) = session.gender {
      return self.sessions.next_question(user_id, gender, language).await;
    }
    let messages = [
      ChatMessage::new(Role::System, texts::follow_up_prompt(language)),
      ChatMessage::new(Role::User, text),
    ];
    match self.llm.chat(&messages).await {
      Ok(question) if !question.is_empty() => Some(trim_reply(&question, MAX_REPLY_CHARS)),
      Ok(_) => None,
      Err(err) => {
        warn!(user_id, error = %err, "follow-up generation failed");
        None
      },
    }
  }
}

fn render_age_reply(language: Language, age: i64) -> String {
  pick_phrase(texts::age_reply_variants(language)).replace("{age}", &age.to_string())
}

fn pick_phrase(variants: &[&str]) -> String {
  variants
    .choose(&mut rand::thread_rng())
    .copied()
    .unwrap_or_default()
    .to_string()
}

fn trim_reply(text: &str, max_chars: usize) -> String {
  if text.chars().count() <= max_chars {
    return text.to_string();
  }
  text.chars().take(max_chars).collect()
}
