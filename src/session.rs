//! Session state resolver: the small set of per-user fields that persist
//! across messages, with lazy initialization and per-user write locking.
//!
//! Every store failure here degrades to a default value or a no-op with a
//! warning. A broken database must never take a chat turn down with it;
//! the surrounding dispatch loop's only recovery is a full reconnect.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::Mutex as StdMutex;

use rand::Rng;
use rand::seq::SliceRandom;
use tokio::sync::Mutex;
use tokio::sync::OwnedMutexGuard;
use tracing::warn;

use crate::db::Db;
use crate::models::ChatMessageRow;
use crate::models::Gender;
use crate::models::Language;
use crate::models::Role;
use crate::texts;

pub const AGE_RANGE: std::ops::RangeInclusive<i64> = 18 ..= 25;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Session {
  pub language: Language,
  pub age: Option<i64>,
  pub greeted: bool,
  pub gender: Option<Gender>,
}

#[derive(Clone)]
pub struct SessionStore {
  db: Db,
  locks: Arc<StdMutex<HashMap<i64, Arc<Mutex<()>>>>>,
}

impl SessionStore {
  pub fn new(db: Db) -> Self {
    Self {
      db,
      locks: Arc::new(StdMutex::new(HashMap::new())),
    }
  }

  /// Serializes read-modify-write per user id. Distinct users proceed
  /// concurrently; a second message from the same user waits its turn.
  pub async fn lock(&self, user_id: i64) -> OwnedMutexGuard<()> {
    let user_lock = {
      let mut locks = self.locks.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
      locks.entry(user_id).or_insert_with(|| Arc::new(Mutex::new(()))).clone()
    };
    user_lock.lock_owned().await
  }

  pub async fn get_or_init(&self, user_id: i64) -> Session {
    if let Err(err) = self.db.ensure_user(user_id).await {
      warn!(user_id, error = %err, "failed to initialize user record");
      return Session::default();
    }
    match self.db.get_user(user_id).await {
      Ok(Some(row)) => Session {
        language: row.language,
        age: row.age,
        greeted: row.greeted,
        gender: row.gender,
      },
      Ok(None) => Session::default(),
      Err(err) => {
        warn!(user_id, error = %err, "failed to load user record");
        Session::default()
      },
    }
  }

  /// Returns the stored age, assigning a random one exactly once for a
  /// user that has none yet. The database guards the write-once rule, so
  /// concurrent callers all observe the same winning value.
  pub async fn get_or_set_age(&self, user_id: i64) -> i64 {
    let candidate = rand::thread_rng().gen_range(AGE_RANGE);
    match self.db.assign_age_if_unset(user_id, candidate).await {
      Ok(stored) => stored,
      Err(err) => {
        warn!(user_id, error = %err, "failed to persist age, using transient value");
        candidate
      },
    }
  }

  pub async fn set_language(&self, user_id: i64, language: Language) {
    if let Err(err) = self.db.set_language(user_id, language).await {
      warn!(user_id, language = language.code(), error = %err, "failed to store language");
    }
  }

  /// Stores the gender choice and refills the follow-up question pool
  /// with a shuffled copy of that gender's template set.
  pub async fn set_gender(&self, user_id: i64, gender: Gender, language: Language) {
    if let Err(err) = self.db.set_gender(user_id, gender).await {
      warn!(user_id, gender = gender.code(), error = %err, "failed to store gender");
      return;
    }
    self.refill_questions(user_id, gender, language).await;
  }

  pub async fn mark_greeted(&self, user_id: i64) {
    if let Err(err) = self.db.set_greeted(user_id).await {
      warn!(user_id, error = %err, "failed to store greeted flag");
    }
  }

  /// Deletes the chat log and question pool and resets age/greeted.
  /// Language is untouched.
  pub async fn clear(&self, user_id: i64) {
    if let Err(err) = self.db.clear_history(user_id).await {
      warn!(user_id, error = %err, "failed to clear chat history");
    }
    if let Err(err) = self.db.clear_questions(user_id).await {
      warn!(user_id, error = %err, "failed to clear question pool");
    }
    if let Err(err) = self.db.reset_session_fields(user_id).await {
      warn!(user_id, error = %err, "failed to reset session fields");
    }
  }

  pub async fn append(&self, user_id: i64, role: Role, content: &str) {
    if let Err(err) = self.db.append_message(user_id, role, content).await {
      warn!(user_id, role = role.as_str(), error = %err, "failed to append chat message");
    }
  }

  pub async fn history(&self, user_id: i64) -> Vec<ChatMessageRow> {
    match self.db.history(user_id).await {
      Ok(log) => log,
      Err(err) => {
        warn!(user_id, error = %err, "failed to load chat history");
        Vec::new()
      },
    }
  }

  /// Draws the next canned follow-up question, refilling the pool from
  /// the gender template set when it runs dry.
  pub async fn next_question(&self, user_id: i64, gender: Gender, language: Language) -> Option<String> {
    match self.db.pop_question(user_id).await {
      Ok(Some(question)) => return Some(question),
      Ok(None) => {},
      Err(err) => {
        warn!(user_id, error = %err, "failed to pop follow-up question");
        return None;
      },
    }
    self.refill_questions(user_id, gender, language).await;
    match self.db.pop_question(user_id).await {
      Ok(question) => question,
      Err(err) => {
        warn!(user_id, error = %err, "failed to pop refilled question");
        None
      },
    }
  }

  async fn refill_questions(&self, user_id: i64, gender: Gender, language: Language) {
    let mut batch: Vec<String> = texts::question_templates(gender, language)
      .iter()
      .map(|question| (*question).to_string())
      .collect();
    batch.shuffle(&mut rand::thread_rng());
    if let Err(err) = self.db.replace_questions(user_id, &batch).await {
      warn!(user_id, error = %err, "failed to refill question pool");
    }
  }
}

#[cfg(test)]
mod tests {
  use super::SessionStore;
  use crate::db::Db;
  use crate::models::Gender;
  use crate::models::Language;
  use crate::models::Role;
  use crate::texts;

  async fn store() -> SessionStore {
    let db = Db::connect("sqlite::memory:").await.expect("in-memory db");
    SessionStore::new(db)
  }

  #[tokio::test]
  async fn unseen_user_gets_defaults() {
    let store = store().await;
    let session = store.get_or_init(101).await;
    assert_eq!(session.language, Language::Uk);
    assert_eq!(session.age, None);
    assert!(!session.greeted);
    assert_eq!(session.gender, None);
  }

  #[tokio::test]
  async fn age_is_idempotent() {
    let store = store().await;
    let first = store.get_or_set_age(1).await;
    let second = store.get_or_set_age(1).await;
    assert!((18 ..= 25).contains(&first));
    assert_eq!(first, second);
  }

  #[tokio::test]
  async fn clear_resets_everything_but_language() {
    let store = store().await;
    store.set_language(2, Language::En).await;
    store.get_or_set_age(2).await;
    store.mark_greeted(2).await;
    store.append(2, Role::User, "hello").await;

    store.clear(2).await;

    let session = store.get_or_init(2).await;
    assert_eq!(session.language, Language::En);
    assert_eq!(session.age, None);
    assert!(!session.greeted);
    assert!(store.history(2).await.is_empty());
  }

  #[tokio::test]
  async fn question_pool_refills_when_exhausted() {
    let store = store().await;
    store.set_gender(3, Gender::Female, Language::En).await;

    let pool_size = texts::question_templates(Gender::Female, Language::En).len();
    let mut seen = Vec::new();
    for _ in 0 .. pool_size {
      seen.push(store.next_question(3, Gender::Female, Language::En).await.expect("pooled"));
    }
    // Pool is empty now; the next draw refills and still yields one.
    let refilled = store.next_question(3, Gender::Female, Language::En).await;
    assert!(refilled.is_some());
    assert_eq!(seen.len(), pool_size);
  }

  #[tokio::test]
  async fn store_failure_degrades_to_defaults() {
    let db = Db::connect("sqlite::memory:").await.expect("in-memory db");
    let store = SessionStore::new(db.clone());
    db.pool().close().await;

    let session = store.get_or_init(9).await;
    assert_eq!(session.language, Language::Uk);
    assert!((18 ..= 25).contains(&store.get_or_set_age(9).await));
    store.append(9, Role::User, "lost").await;
    assert!(store.history(9).await.is_empty());
  }
}
