//! Demo content loaded when `seed_demo = true`.

use crate::domain::Language;
use crate::state::QuestionFields;

/// A demo question with its tag slugs and (text, is_correct) choices.
pub struct SeedQuestion {
  pub fields: QuestionFields,
  pub tag_slugs: Vec<&'static str>,
  pub choices: Vec<(&'static str, bool)>,
}

/// Tag labels for a fresh install.
pub fn seed_tag_labels() -> Vec<&'static str> {
  vec![
    "Python", "Django", "Rust", "REST", "API", "JavaScript", "Node.js", "Vue.js",
    "SQL", "PostgreSQL", "Docker", "Kubernetes", "CI/CD", "Git", "CSS",
    "Web Development", "Базы данных",
  ]
}

pub fn seed_questions() -> Vec<SeedQuestion> {
  vec![
    SeedQuestion {
      fields: QuestionFields {
        title: "Which HTTP method is idempotent?".into(),
        text: "Pick every method that is idempotent by definition.".into(),
        explanation: "PUT and DELETE may be repeated without changing the result beyond the first call.".into(),
        language: Language::En,
      },
      tag_slugs: vec!["rest", "api"],
      choices: vec![("POST", false), ("PUT", true), ("DELETE", true), ("PATCH", false)],
    },
    SeedQuestion {
      fields: QuestionFields {
        title: "What does `git rebase` do?".into(),
        text: String::new(),
        explanation: "Rebase replays commits on top of another base.".into(),
        language: Language::En,
      },
      tag_slugs: vec!["git"],
      choices: vec![
        ("Replays commits on top of another base", true),
        ("Deletes the remote branch", false),
        ("Creates a merge commit", false),
      ],
    },
    SeedQuestion {
      fields: QuestionFields {
        title: "Какой оператор объединяет строки двух запросов?".into(),
        text: String::new(),
        explanation: "UNION объединяет результаты и убирает дубликаты.".into(),
        language: Language::Ru,
      },
      tag_slugs: vec!["sql", "bazy-dannykh"],
      choices: vec![("UNION", true), ("JOIN", false), ("GROUP BY", false)],
    },
  ]
}
