use teloxide::utils::command::BotCommands;

#[derive(BotCommands, Clone, Debug)]
#[command(rename_rule = "lowercase", description = "Available commands:")]
pub enum Command {
  /// Start the chat and pick a language
  Start,
  /// Show the help text
  Help,
  /// Change the chat language
  SetLanguage(String),
  /// Pick the follow-up question style
  SetGender(String),
  /// Forget the conversation so far
  Clear,
  /// Same as /clear
  Restart,
}
