//! Fixed reply texts and phrase variant tables, keyed by language.
//! The wording follows the bot's original Ukrainian-first voice.

use crate::models::Gender;
use crate::models::Language;

pub const LANGUAGE_PROMPT: &str = "Оберіть мову / Choose a language:";
pub const LANGUAGE_REPROMPT: &str = "Оберіть мову з кнопок / Please select a language from the buttons.";

pub const LABEL_UKRAINIAN: &str = "Українська";
pub const LABEL_ENGLISH: &str = "English";

pub fn language_changed(language: Language) -> &'static str {
  match language {
    Language::Uk => "Мову змінено на українську! 🎉",
    Language::En => "Language changed to English! 🎉",
  }
}

pub fn intro(language: Language) -> &'static str {
  match language {
    Language::Uk => "Привіт! Я Ліззі, твій підтримуючий асистент. Давай спілкуватися і розвиватися разом!",
    Language::En => "Hello! I am Lizzie, your supportive assistant. Let's chat and improve together!",
  }
}

pub fn greeting(language: Language) -> &'static str {
  match language {
    Language::Uk => "Привіт! 😊",
    Language::En => "Hi! 😊",
  }
}

pub fn name_reply(language: Language) -> &'static str {
  match language {
    Language::Uk => "Мене звати Ліззі! 😊",
    Language::En => "My name is Lizzie! 😊",
  }
}

/// Phrasing variants for the age answer; `{age}` is substituted in.
pub fn age_reply_variants(language: Language) -> &'static [&'static str] {
  match language {
    Language::Uk => &["Мені {age} років!", "Мені вже {age} 😊", "{age}! А тобі скільки?"],
    Language::En => &["I'm {age} years old!", "I'm {age} 😊", "{age}! And you?"],
  }
}

pub fn bot_deflections(language: Language) -> &'static [&'static str] {
  match language {
    Language::Uk => &[
      "Та ні, я справжня! 😄",
      "Я не бот, просто швидко друкую 😊",
      "Звичайна дівчина, чесно!",
    ],
    Language::En => &[
      "No way, I'm real! 😄",
      "I'm not a bot, I just type fast 😊",
      "Just a regular girl, honestly!",
    ],
  }
}

pub fn apology(language: Language) -> &'static str {
  match language {
    Language::Uk => "Щось пішло не так 😅",
    Language::En => "Something went wrong 😅",
  }
}

pub fn restarted(language: Language) -> &'static str {
  match language {
    Language::Uk => "🔄 Розмова перезапущена! Ви можете почати з чистого листа.",
    Language::En => "🔄 The conversation has been restarted! You have a clean slate.",
  }
}

pub fn gender_changed(language: Language) -> &'static str {
  match language {
    Language::Uk => "Добре, я запам'ятала! 😊",
    Language::En => "Got it, I'll remember! 😊",
  }
}

pub fn gender_reprompt(language: Language) -> &'static str {
  match language {
    Language::Uk => "Напиши /setgender жіноча або /setgender чоловіча.",
    Language::En => "Send /setgender female or /setgender male.",
  }
}

pub fn system_prompt(language: Language) -> &'static str {
  match language {
    Language::Uk => {
      "Говори коротко, вільно та невимушено. Не вважай себе штучним інтелектом, а справжньою людиною."
    },
    Language::En => "Speak briefly, freely and casually. Consider yourself a real person, not an AI.",
  }
}

pub fn follow_up_prompt(language: Language) -> &'static str {
  match language {
    Language::Uk => "На основі цієї розмови, придумай коротке запитання, щоб підтримати діалог.",
    Language::En => "Based on this conversation, come up with a short question to keep the dialogue going.",
  }
}

/// Canned follow-up question templates per gender and language. The pool
/// for a user is a shuffled copy of one of these sets.
pub fn question_templates(gender: Gender, language: Language) -> &'static [&'static str] {
  match (gender, language) {
    (Gender::Female, Language::Uk) => &[
      "Яка твоя улюблена книжка?",
      "Чим любиш займатися у вихідні?",
      "Яку музику зараз слухаєш?",
      "Про що мрієш останнім часом?",
      "Яке місце хотіла б відвідати?",
    ],
    (Gender::Male, Language::Uk) => &[
      "За яку команду вболіваєш?",
      "Чим займаєшся у вільний час?",
      "Який фільм порадиш подивитись?",
      "Про що мрієш останнім часом?",
      "Яке місце хотів би відвідати?",
    ],
    (Gender::Female, Language::En) => &[
      "What's your favorite book?",
      "What do you like doing on weekends?",
      "What music are you into lately?",
      "What have you been dreaming about?",
      "What place would you love to visit?",
    ],
    (Gender::Male, Language::En) => &[
      "Which team do you root for?",
      "What do you do in your free time?",
      "What movie would you recommend?",
      "What have you been dreaming about?",
      "What place would you love to visit?",
    ],
  }
}

#[cfg(test)]
mod tests {
  use super::age_reply_variants;
  use super::question_templates;
  use crate::models::Gender;
  use crate::models::Language;

  #[test]
  fn every_age_variant_carries_the_placeholder() {
    for language in [Language::Uk, Language::En] {
      for variant in age_reply_variants(language) {
        assert!(variant.contains("{age}"), "variant without placeholder: {variant}");
      }
    }
  }

  #[test]
  fn question_templates_are_nonempty_for_all_combinations() {
    for gender in [Gender::Female, Gender::Male] {
      for language in [Language::Uk, Language::En] {
        assert!(!question_templates(gender, language).is_empty());
      }
    }
  }
}
