use std::str::FromStr;

use anyhow::Result;
use sqlx::Pool;
use sqlx::Row;
use sqlx::Sqlite;
use sqlx::migrate::Migrator;
use sqlx::sqlite::SqliteConnectOptions;
use sqlx::sqlite::SqlitePoolOptions;
use tracing::instrument;

use crate::models::ChatMessageRow;
use crate::models::Gender;
use crate::models::Language;
use crate::models::Role;
use crate::models::UserRow;

pub static MIGRATOR: Migrator = sqlx::migrate!("./migrations");

#[derive(Clone)]
pub struct Db {
  pool: Pool<Sqlite>,
}

impl Db {
  /// Opens (and creates if missing) the database file and runs migrations.
  /// A single pooled connection: SQLite allows one writer at a time, and a
  /// shared connection also keeps `sqlite::memory:` databases alive across
  /// queries.
  pub async fn connect(database_url: &str) -> Result<Self> {
    let options = SqliteConnectOptions::from_str(database_url)?.create_if_missing(true);
    let pool = SqlitePoolOptions::new().max_connections(1).connect_with(options).await?;
    MIGRATOR.run(&pool).await?;
    Ok(Self { pool })
  }

  #[allow(dead_code)]
  pub fn pool(&self) -> &Pool<Sqlite> {
    &self.pool
  }

  #[instrument(skip(self))]
  pub async fn get_user(&self, user_id: i64) -> Result<Option<UserRow>> {
    let row = sqlx::query("SELECT user_id, language, age, greeted, gender FROM users WHERE user_id = ?")
      .bind(user_id)
      .fetch_optional(&self.pool)
      .await?;
    Ok(row.map(|row| UserRow {
      user_id: row.get("user_id"),
      language: Language::from_code(row.get::<String, _>("language").as_str()),
      age: row.get("age"),
      greeted: row.get("greeted"),
      gender: row.get::<Option<String>, _>("gender").as_deref().and_then(Gender::from_code),
    }))
  }

  #[instrument(skip(self))]
  pub async fn ensure_user(&self, user_id: i64) -> Result<()> {
    sqlx::query("INSERT OR IGNORE INTO users (user_id) VALUES (?)")
      .bind(user_id)
      .execute(&self.pool)
      .await?;
    Ok(())
  }

  #[instrument(skip(self))]
  pub async fn set_language(&self, user_id: i64, language: Language) -> Result<()> {
    sqlx::query(
      r#"
      INSERT INTO users (user_id, language)
      VALUES (?, ?)
      ON CONFLICT (user_id) DO UPDATE SET language = excluded.language
      "#,
    )
    .bind(user_id)
    .bind(language.code())
    .execute(&self.pool)
    .await?;
    Ok(())
  }

  /// Writes the age only when none is stored yet, then returns whatever
  /// value won. Age is write-once by contract.
  #[instrument(skip(self))]
  pub async fn assign_age_if_unset(&self, user_id: i64, age: i64) -> Result<i64> {
    self.ensure_user(user_id).await?;
    sqlx::query("UPDATE users SET age = ? WHERE user_id = ? AND age IS NULL")
      .bind(age)
      .bind(user_id)
      .execute(&self.pool)
      .await?;
    let stored = sqlx::query_scalar::<_, i64>("SELECT age FROM users WHERE user_id = ?")
      .bind(user_id)
      .fetch_one(&self.pool)
      .await?;
    Ok(stored)
  }

  #[instrument(skip(self))]
  pub async fn set_greeted(&self, user_id: i64) -> Result<()> {
    self.ensure_user(user_id).await?;
    sqlx::query("UPDATE users SET greeted = 1 WHERE user_id = ?")
      .bind(user_id)
      .execute(&self.pool)
      .await?;
    Ok(())
  }

  #[instrument(skip(self))]
  pub async fn set_gender(&self, user_id: i64, gender: Gender) -> Result<()> {
    self.ensure_user(user_id).await?;
    sqlx::query("UPDATE users SET gender = ? WHERE user_id = ?")
      .bind(gender.code())
      .bind(user_id)
      .execute(&self.pool)
      .await?;
    Ok(())
  }

  /// Resets age and the greeted flag; the language choice survives.
  #[instrument(skip(self))]
  pub async fn reset_session_fields(&self, user_id: i64) -> Result<()> {
    sqlx::query("UPDATE users SET age = NULL, greeted = 0 WHERE user_id = ?")
      .bind(user_id)
      .execute(&self.pool)
      .await?;
    Ok(())
  }

  #[instrument(skip(self, content))]
  pub async fn append_message(&self, user_id: i64, role: Role, content: &str) -> Result<()> {
    sqlx::query("INSERT INTO chat_history (user_id, role, content) VALUES (?, ?, ?)")
      .bind(user_id)
      .bind(role.as_str())
      .bind(content)
      .execute(&self.pool)
      .await?;
    Ok(())
  }

  #[instrument(skip(self))]
  pub async fn history(&self, user_id: i64) -> Result<Vec<ChatMessageRow>> {
    let rows = sqlx::query("SELECT user_id, role, content FROM chat_history WHERE user_id = ? ORDER BY id ASC")
      .bind(user_id)
      .fetch_all(&self.pool)
      .await?;
    Ok(
      rows
        .into_iter()
        .map(|row| ChatMessageRow {
          user_id: row.get("user_id"),
          role: row.get("role"),
          content: row.get("content"),
        })
        .collect(),
    )
  }

  #[instrument(skip(self))]
  pub async fn clear_history(&self, user_id: i64) -> Result<()> {
    sqlx::query("DELETE FROM chat_history WHERE user_id = ?")
      .bind(user_id)
      .execute(&self.pool)
      .await?;
    Ok(())
  }

  /// Replaces the user's follow-up question pool with a fresh batch.
  #[instrument(skip(self, questions))]
  pub async fn replace_questions(&self, user_id: i64, questions: &[String]) -> Result<()> {
    sqlx::query("DELETE FROM question_pool WHERE user_id = ?")
      .bind(user_id)
      .execute(&self.pool)
      .await?;
    for question in questions {
      sqlx::query("INSERT INTO question_pool (user_id, question) VALUES (?, ?)")
        .bind(user_id)
        .bind(question)
        .execute(&self.pool)
        .await?;
    }
    Ok(())
  }

  /// Takes the next unused question out of the pool, if any is left.
  #[instrument(skip(self))]
  pub async fn pop_question(&self, user_id: i64) -> Result<Option<String>> {
    let row = sqlx::query("SELECT id, question FROM question_pool WHERE user_id = ? ORDER BY id ASC LIMIT 1")
      .bind(user_id)
      .fetch_optional(&self.pool)
      .await?;
    let Some(row) = row else {
      return Ok(None);
    };
    let id: i64 = row.get("id");
    let question: String = row.get("question");
    sqlx::query("DELETE FROM question_pool WHERE id = ?")
      .bind(id)
      .execute(&self.pool)
      .await?;
    Ok(Some(question))
  }

  #[instrument(skip(self))]
  pub async fn clear_questions(&self, user_id: i64) -> Result<()> {
    sqlx::query("DELETE FROM question_pool WHERE user_id = ?")
      .bind(user_id)
      .execute(&self.pool)
      .await?;
    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use super::Db;
  use crate::models::Gender;
  use crate::models::Language;
  use crate::models::Role;

  async fn test_db() -> Db {
    Db::connect("sqlite::memory:").await.expect("in-memory db")
  }

  #[tokio::test]
  async fn unseen_user_is_absent_until_ensured() {
    let db = test_db().await;
    assert!(db.get_user(7).await.unwrap().is_none());

    db.ensure_user(7).await.unwrap();
    let user = db.get_user(7).await.unwrap().unwrap();
    assert_eq!(user.language, Language::Uk);
    assert_eq!(user.age, None);
    assert!(!user.greeted);
    assert_eq!(user.gender, None);
  }

  #[tokio::test]
  async fn age_is_write_once() {
    let db = test_db().await;
    let first = db.assign_age_if_unset(1, 21).await.unwrap();
    let second = db.assign_age_if_unset(1, 24).await.unwrap();
    assert_eq!(first, 21);
    assert_eq!(second, 21);
  }

  #[tokio::test]
  async fn reset_keeps_language_and_gender() {
    let db = test_db().await;
    db.set_language(5, Language::En).await.unwrap();
    db.set_gender(5, Gender::Female).await.unwrap();
    db.assign_age_if_unset(5, 20).await.unwrap();
    db.set_greeted(5).await.unwrap();

    db.reset_session_fields(5).await.unwrap();

    let user = db.get_user(5).await.unwrap().unwrap();
    assert_eq!(user.language, Language::En);
    assert_eq!(user.gender, Some(Gender::Female));
    assert_eq!(user.age, None);
    assert!(!user.greeted);
  }

  #[tokio::test]
  async fn history_is_ordered_and_clearable() {
    let db = test_db().await;
    db.append_message(3, Role::User, "перше").await.unwrap();
    db.append_message(3, Role::Assistant, "друге").await.unwrap();
    db.append_message(4, Role::User, "чуже").await.unwrap();

    let log = db.history(3).await.unwrap();
    assert_eq!(log.len(), 2);
    assert_eq!(log[0].role, "user");
    assert_eq!(log[0].content, "перше");
    assert_eq!(log[1].role, "assistant");

    db.clear_history(3).await.unwrap();
    assert!(db.history(3).await.unwrap().is_empty());
    assert_eq!(db.history(4).await.unwrap().len(), 1);
  }

  #[tokio::test]
  async fn question_pool_drains_one_at_a_time() {
    let db = test_db().await;
    let batch = vec!["a?".to_string(), "b?".to_string()];
    db.replace_questions(9, &batch).await.unwrap();

    assert_eq!(db.pop_question(9).await.unwrap().as_deref(), Some("a?"));
    assert_eq!(db.pop_question(9).await.unwrap().as_deref(), Some("b?"));
    assert_eq!(db.pop_question(9).await.unwrap(), None);
  }
}
