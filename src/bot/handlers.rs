use std::sync::Arc;

use once_cell::sync::Lazy;
use regex::Regex;
use teloxide::dispatching::UpdateHandler;
use teloxide::dptree;
use teloxide::prelude::*;
use teloxide::types::ChatId;
use teloxide::types::KeyboardButton;
use teloxide::types::KeyboardMarkup;
use teloxide::types::Message;
use teloxide::utils::command::BotCommands;
use tracing::info;
use tracing::instrument;

use crate::bot::Command;
use crate::bot::HandlerResult;
use crate::bot::context::AppContext;
use crate::composer::Reply;
use crate::models::Gender;
use crate::models::Language;
use crate::texts;

type SharedContext = Arc<AppContext>;

/// The keyboard labels the original bot filters on; matching text is
/// treated as a language selection rather than chat input.
static LANGUAGE_LABEL: Lazy<Regex> =
  Lazy::new(|| Regex::new(r"(?i)^(Українська|Ukrainian|English|Англійська)$").expect("valid regex"));

pub fn build_schema() -> UpdateHandler<anyhow::Error> {
  let message_handler = Update::filter_message()
    .branch(command_branch())
    .branch(
      dptree::filter(|msg: Message| {
        msg
          .text()
          .is_some_and(|text| LANGUAGE_LABEL.is_match(text.trim()))
      })
      .endpoint(handle_language_label),
    )
    .branch(dptree::endpoint(handle_text));

  dptree::entry().branch(message_handler)
}

fn command_branch() -> UpdateHandler<anyhow::Error> {
  dptree::entry()
    .filter_command::<Command>()
    .branch(dptree::case![Command::Start].endpoint(handle_start))
    .branch(dptree::case![Command::Help].endpoint(handle_help))
    .branch(dptree::case![Command::SetLanguage(label)].endpoint(handle_set_language))
    .branch(dptree::case![Command::SetGender(label)].endpoint(handle_set_gender))
    .branch(dptree::case![Command::Clear].endpoint(handle_clear))
    .branch(dptree::case![Command::Restart].endpoint(handle_clear))
}

fn language_keyboard() -> KeyboardMarkup {
  KeyboardMarkup::new(vec![
    vec![KeyboardButton::new(texts::LABEL_UKRAINIAN)],
    vec![KeyboardButton::new(texts::LABEL_ENGLISH)],
  ])
  .resize_keyboard()
  .one_time_keyboard()
}

#[instrument(skip(bot, ctx, msg))]
async fn handle_start(bot: Bot, ctx: SharedContext, msg: Message) -> HandlerResult {
  let user_id = msg.chat.id.0;
  ctx.sessions().get_or_init(user_id).await;
  info!(user_id, "received /start command");
  bot
    .send_message(msg.chat.id, texts::LANGUAGE_PROMPT)
    .reply_markup(language_keyboard())
    .await?;
  Ok(())
}

#[instrument(skip(bot, msg))]
async fn handle_help(bot: Bot, msg: Message) -> HandlerResult {
  info!(chat_id = %msg.chat.id, "received /help command");
  bot.send_message(msg.chat.id, Command::descriptions().to_string()).await?;
  Ok(())
}

#[instrument(skip(bot, ctx, msg))]
async fn handle_set_language(bot: Bot, ctx: SharedContext, msg: Message, label: String) -> HandlerResult {
  apply_language_selection(&bot, &ctx, msg.chat.id, &label).await
}

#[instrument(skip(bot, ctx, msg))]
async fn handle_language_label(bot: Bot, ctx: SharedContext, msg: Message) -> HandlerResult {
  let label = msg.text().unwrap_or_default().to_string();
  apply_language_selection(&bot, &ctx, msg.chat.id, &label).await
}

async fn apply_language_selection(bot: &Bot, ctx: &SharedContext, chat: ChatId, label: &str) -> HandlerResult {
  // Empty argument (bare /setlanguage) or an unknown label both get the
  // keyboard back so the user can try again.
  if Language::from_label(label).is_none() {
    let prompt = if label.trim().is_empty() {
      texts::LANGUAGE_PROMPT
    } else {
      texts::LANGUAGE_REPROMPT
    };
    bot
      .send_message(chat, prompt)
      .reply_markup(language_keyboard())
      .await?;
    return Ok(());
  }
  let reply = ctx.composer().apply_language_choice(chat.0, label).await;
  send_reply(bot, chat, reply).await
}

#[instrument(skip(bot, ctx, msg))]
async fn handle_set_gender(bot: Bot, ctx: SharedContext, msg: Message, label: String) -> HandlerResult {
  let user_id = msg.chat.id.0;
  let (language, recognized) = {
    let _guard = ctx.sessions().lock(user_id).await;
    let session = ctx.sessions().get_or_init(user_id).await;
    match Gender::from_label(&label) {
      Some(gender) => {
        ctx.sessions().set_gender(user_id, gender, session.language).await;
        info!(user_id, gender = gender.code(), "gender template selected");
        (session.language, true)
      },
      None => (session.language, false),
    }
  };
  let text = if recognized {
    texts::gender_changed(language)
  } else {
    texts::gender_reprompt(language)
  };
  bot.send_message(msg.chat.id, text).await?;
  Ok(())
}

#[instrument(skip(bot, ctx, msg))]
async fn handle_clear(bot: Bot, ctx: SharedContext, msg: Message) -> HandlerResult {
  let user_id = msg.chat.id.0;
  let language = {
    let _guard = ctx.sessions().lock(user_id).await;
    let session = ctx.sessions().get_or_init(user_id).await;
    ctx.sessions().clear(user_id).await;
    session.language
  };
  info!(user_id, "conversation cleared");
  bot.send_message(msg.chat.id, texts::restarted(language)).await?;
  Ok(())
}

#[instrument(skip(bot, ctx, msg))]
async fn handle_text(bot: Bot, ctx: SharedContext, msg: Message) -> HandlerResult {
  let Some(text) = msg.text() else {
    return Ok(());
  };
  let user_id = msg.chat.id.0;
  info!(user_id, chars = text.chars().count(), "received message");
  let reply = ctx.composer().compose(user_id, text).await;
  send_reply(&bot, msg.chat.id, reply).await
}

async fn send_reply(bot: &Bot, chat: ChatId, reply: Reply) -> HandlerResult {
  bot.send_message(chat, reply.text).await?;
  if let Some(follow_up) = reply.follow_up {
    bot.send_message(chat, follow_up).await?;
  }
  Ok(())
}

#[cfg(test)]
mod tests {
  use super::LANGUAGE_LABEL;

  #[test]
  fn matches_keyboard_labels_case_insensitively() {
    assert!(LANGUAGE_LABEL.is_match("Українська"));
    assert!(LANGUAGE_LABEL.is_match("english"));
    assert!(LANGUAGE_LABEL.is_match("UKRAINIAN"));
  }

  #[test]
  fn does_not_match_chat_text() {
    assert!(!LANGUAGE_LABEL.is_match("I speak english"));
    assert!(!LANGUAGE_LABEL.is_match("привіт"));
    assert!(!LANGUAGE_LABEL.is_match(""));
  }
}
