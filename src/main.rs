mod app;
mod bot;
mod composer;
mod config;
mod db;
mod llm;
mod models;
mod session;
mod telemetry;
mod texts;

use std::sync::Arc;

use anyhow::Result;
use teloxide::prelude::Bot;
use tracing::info;

#[tokio::main]
async fn main() -> Result<()> {
  telemetry::init()?;
  let config = config::Config::from_env()?;
  info!(model = %config.model_name, ollama_url = %config.ollama_url, "starting bot");

  let bot = Bot::new(config.bot_token.clone());
  let db = db::Db::connect(&config.database_url).await?;
  let sessions = session::SessionStore::new(db);
  let llm: Arc<dyn llm::LanguageModel> = Arc::new(llm::OllamaClient::new(
    config.ollama_url.clone(),
    config.model_name.clone(),
  ));
  let follow_up = composer::FollowUpDecider::new(config.follow_up_probability);
  let composer = composer::Composer::new(sessions, llm, follow_up);
  let app = app::App::new(bot, bot::AppContext::new(composer));
  app.run().await
}
