//! Domain models: users, tags, questions, choices and answers.
//!
//! Records are stored by numeric id in the in-memory tables; the public API
//! addresses tags by slug and everything else by uuid.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub type UserId = Uuid;

/// Maximum length of a tag label.
pub const LABEL_MAX_LEN: usize = 100;
/// Maximum length of a question title.
pub const TITLE_MAX_LEN: usize = 100;

/// Question language.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "UPPERCASE")]
pub enum Language {
  #[default]
  En,
  Ru,
}

impl std::fmt::Display for Language {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    match self {
      Language::En => f.write_str("EN"),
      Language::Ru => f.write_str("RU"),
    }
  }
}

/// A provisioned identity. Staff may mutate anything.
#[derive(Clone, Debug)]
pub struct User {
  pub id: UserId,
  pub username: String,
  pub is_staff: bool,
  pub token: String,
}

#[derive(Clone, Debug)]
pub struct Tag {
  pub id: u64,
  pub label: String,
  pub slug: String,
}

#[derive(Clone, Debug)]
pub struct Question {
  pub id: u64,
  pub uuid: Uuid,
  pub owner: UserId,
  pub title: String,
  pub text: String,
  pub explanation: String,
  pub language: Language,
  pub published: bool,
  pub tags: BTreeSet<u64>,
  pub created_at: DateTime<Utc>,
  pub updated_at: DateTime<Utc>,
}

/// Choice belongs to exactly one question; its owner is the question's owner.
#[derive(Clone, Debug)]
pub struct Choice {
  pub id: u64,
  pub uuid: Uuid,
  pub question: u64,
  pub text: String,
  pub is_correct: bool,
}

#[derive(Clone, Debug)]
pub struct Answer {
  pub id: u64,
  pub uuid: Uuid,
  pub owner: UserId,
  pub question: u64,
  pub choices: BTreeSet<u64>,
  pub is_correct: bool,
  pub created_at: DateTime<Utc>,
}
