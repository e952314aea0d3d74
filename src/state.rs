//! Application state: in-memory tables, the response cache and server settings.
//!
//! This module owns:
//!   - the tables (users, tags, questions, choices, answers) behind one lock
//!   - the unique slug index, final arbiter of tag slug uniqueness
//!   - user provisioning from config and optional demo seeding
//!
//! Table methods are synchronous and expect the caller to hold the lock, so
//! one request's writes land together.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::cache::ResponseCache;
use crate::config::{load_from_env, AppConfig, ServerCfg};
use crate::domain::{Answer, Choice, Language, Question, Tag, User, UserId, LABEL_MAX_LEN};
use crate::error::ApiError;
use crate::seeds::{seed_questions, seed_tag_labels};
use crate::slug::unique_slug;
use crate::util::{generate_token, trunc_for_log};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum StoreError {
    #[error("slug '{0}' is already in use")]
    SlugTaken(String),
    #[error("username '{0}' is already in use")]
    UsernameTaken(String),
}

impl From<StoreError> for ApiError {
    fn from(e: StoreError) -> Self {
        ApiError::Conflict(e.to_string())
    }
}

/// Fields of a question as accepted from a payload.
#[derive(Clone, Debug)]
pub struct QuestionFields {
    pub title: String,
    pub text: String,
    pub explanation: String,
    pub language: Language,
}

#[derive(Default)]
pub struct Tables {
    next_id: u64,
    users: HashMap<UserId, User>,
    tokens: HashMap<String, UserId>,
    pub tags: BTreeMap<u64, Tag>,
    tag_slugs: HashMap<String, u64>,
    pub questions: BTreeMap<u64, Question>,
    pub choices: BTreeMap<u64, Choice>,
    pub answers: BTreeMap<u64, Answer>,
}

impl Tables {
    fn next_id(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }

    // ---------- Users ----------

    pub fn insert_user(&mut self, username: &str, token: &str, is_staff: bool) -> Result<User, StoreError> {
        if self.users.values().any(|u| u.username == username) {
            return Err(StoreError::UsernameTaken(username.to_string()));
        }
        let user = User {
            id: Uuid::new_v4(),
            username: username.to_string(),
            is_staff,
            token: token.to_string(),
        };
        self.tokens.insert(user.token.clone(), user.id);
        self.users.insert(user.id, user.clone());
        Ok(user)
    }

    pub fn user_by_token(&self, token: &str) -> Option<&User> {
        self.tokens.get(token).and_then(|id| self.users.get(id))
    }

    pub fn user_by_username(&self, username: &str) -> Option<&User> {
        self.users.values().find(|u| u.username == username)
    }

    // ---------- Tags ----------

    pub fn tag_by_slug(&self, slug: &str) -> Option<&Tag> {
        self.tag_slugs.get(slug).and_then(|id| self.tags.get(id))
    }

    /// Save a tag. New tags and tags whose label differs from the stored one
    /// get a freshly allocated slug; saving an unchanged label is a no-op.
    #[instrument(level = "debug", skip(self, label), fields(label = %trunc_for_log(label, 40)))]
    pub fn save_tag(&mut self, id: Option<u64>, label: &str) -> Result<Tag, ApiError> {
        let label = validate_label(label)?;

        if let Some(id) = id {
            let previous = self.tags.get(&id).ok_or(ApiError::NotFound("Tag"))?;
            if previous.label == label && !previous.slug.is_empty() {
                return Ok(previous.clone());
            }
        }

        // The tag's own current slug counts as taken, so a relabel always moves.
        let slug = unique_slug(&label, |s| self.tag_slugs.contains_key(s))?;
        let tag = Tag { id: id.unwrap_or_else(|| self.next_id()), label, slug };
        self.put_tag(tag)
    }

    /// Write a tag row, enforcing the unique slug index.
    fn put_tag(&mut self, tag: Tag) -> Result<Tag, ApiError> {
        if let Some(owner) = self.tag_slugs.get(&tag.slug) {
            if *owner != tag.id {
                return Err(StoreError::SlugTaken(tag.slug).into());
            }
        }
        if let Some(old) = self.tags.get(&tag.id) {
            self.tag_slugs.remove(&old.slug);
        }
        self.tag_slugs.insert(tag.slug.clone(), tag.id);
        self.tags.insert(tag.id, tag.clone());
        Ok(tag)
    }

    /// Delete a tag and unlink it from every question. Returns the uuids of
    /// the questions that carried it.
    pub fn delete_tag(&mut self, id: u64) -> Option<(Tag, Vec<Uuid>)> {
        let tag = self.tags.remove(&id)?;
        self.tag_slugs.remove(&tag.slug);
        let mut touched = Vec::new();
        for q in self.questions.values_mut() {
            if q.tags.remove(&id) {
                touched.push(q.uuid);
            }
        }
        Some((tag, touched))
    }

    pub fn question_count(&self, tag_id: u64) -> usize {
        self.questions.values().filter(|q| q.tags.contains(&tag_id)).count()
    }

    pub fn questions_tagged(&self, tag_id: u64) -> Vec<Uuid> {
        self.questions.values().filter(|q| q.tags.contains(&tag_id)).map(|q| q.uuid).collect()
    }

    /// Ids of existing tags among `slugs`; unknown slugs are ignored.
    pub fn tag_ids_for_slugs<S: AsRef<str>>(&self, slugs: &[S]) -> BTreeSet<u64> {
        slugs.iter().filter_map(|s| self.tag_slugs.get(s.as_ref()).copied()).collect()
    }

    // ---------- Questions ----------

    pub fn insert_question(&mut self, owner: UserId, fields: QuestionFields, tags: BTreeSet<u64>) -> Question {
        let now = Utc::now();
        let q = Question {
            id: self.next_id(),
            uuid: Uuid::new_v4(),
            owner,
            title: fields.title,
            text: fields.text,
            explanation: fields.explanation,
            language: fields.language,
            published: false,
            tags,
            created_at: now,
            updated_at: now,
        };
        self.questions.insert(q.id, q.clone());
        q
    }

    pub fn question_by_uuid(&self, uuid: &Uuid) -> Option<&Question> {
        self.questions.values().find(|q| &q.uuid == uuid)
    }

    pub fn question_mut(&mut self, id: u64) -> Option<&mut Question> {
        self.questions.get_mut(&id)
    }

    /// Delete a question together with its choices and answers.
    pub fn delete_question(&mut self, id: u64) -> Option<Question> {
        let q = self.questions.remove(&id)?;
        self.choices.retain(|_, c| c.question != id);
        self.answers.retain(|_, a| a.question != id);
        Some(q)
    }

    /// More than one correct choice.
    pub fn is_multichoice(&self, question_id: u64) -> bool {
        self.choices_of(question_id).iter().filter(|c| c.is_correct).count() > 1
    }

    // ---------- Choices ----------

    pub fn choices_of(&self, question_id: u64) -> Vec<&Choice> {
        self.choices.values().filter(|c| c.question == question_id).collect()
    }

    pub fn choice_by_uuid(&self, uuid: &Uuid) -> Option<&Choice> {
        self.choices.values().find(|c| &c.uuid == uuid)
    }

    /// Adding a choice can change the correct set, so answers are regraded.
    pub fn insert_choice(&mut self, question: u64, text: String, is_correct: bool) -> Choice {
        let c = Choice { id: self.next_id(), uuid: Uuid::new_v4(), question, text, is_correct };
        self.choices.insert(c.id, c.clone());
        self.regrade(question);
        c
    }

    /// Replace a choice's fields. Moving it to another question drops it from
    /// answers given to the old one. Answers of both questions are regraded.
    pub fn update_choice(&mut self, id: u64, question: u64, text: String, is_correct: bool) -> Option<Choice> {
        let c = self.choices.get_mut(&id)?;
        let previous = c.question;
        c.question = question;
        c.text = text;
        c.is_correct = is_correct;
        let updated = c.clone();
        if previous != question {
            for a in self.answers.values_mut().filter(|a| a.question != question) {
                a.choices.remove(&id);
            }
            self.regrade(previous);
        }
        self.regrade(question);
        Some(updated)
    }

    pub fn delete_choice(&mut self, id: u64) -> Option<Choice> {
        let c = self.choices.remove(&id)?;
        for a in self.answers.values_mut() {
            a.choices.remove(&id);
        }
        self.regrade(c.question);
        Some(c)
    }

    // ---------- Answers ----------

    pub fn answer_by_uuid(&self, uuid: &Uuid) -> Option<&Answer> {
        self.answers.values().find(|a| &a.uuid == uuid)
    }

    /// Correct when the chosen set equals the question's non-empty correct set.
    pub fn grade(&self, question_id: u64, chosen: &BTreeSet<u64>) -> bool {
        let correct: BTreeSet<u64> = self
            .choices_of(question_id)
            .into_iter()
            .filter(|c| c.is_correct)
            .map(|c| c.id)
            .collect();
        !correct.is_empty() && &correct == chosen
    }

    /// Recompute `is_correct` of every answer to `question_id`.
    fn regrade(&mut self, question_id: u64) {
        let grades: Vec<(u64, bool)> = self
            .answers
            .values()
            .filter(|a| a.question == question_id)
            .map(|a| (a.id, self.grade(question_id, &a.choices)))
            .collect();
        for (id, is_correct) in grades {
            if let Some(a) = self.answers.get_mut(&id) {
                a.is_correct = is_correct;
            }
        }
    }

    pub fn insert_answer(&mut self, owner: UserId, question: u64, choices: BTreeSet<u64>) -> Answer {
        let is_correct = self.grade(question, &choices);
        let a = Answer {
            id: self.next_id(),
            uuid: Uuid::new_v4(),
            owner,
            question,
            choices,
            is_correct,
            created_at: Utc::now(),
        };
        self.answers.insert(a.id, a.clone());
        a
    }

    pub fn update_answer(&mut self, id: u64, choices: BTreeSet<u64>) -> Option<Answer> {
        let question = self.answers.get(&id)?.question;
        let is_correct = self.grade(question, &choices);
        let a = self.answers.get_mut(&id)?;
        a.choices = choices;
        a.is_correct = is_correct;
        Some(a.clone())
    }

    pub fn delete_answer(&mut self, id: u64) -> Option<Answer> {
        self.answers.remove(&id)
    }
}

fn validate_label(label: &str) -> Result<String, ApiError> {
    let label = label.trim();
    if label.is_empty() {
        return Err(ApiError::Validation("label: this field may not be blank.".into()));
    }
    if label.chars().count() > LABEL_MAX_LEN {
        return Err(ApiError::Validation(format!(
            "label: ensure this field has no more than {LABEL_MAX_LEN} characters."
        )));
    }
    Ok(label.to_string())
}

#[derive(Clone)]
pub struct AppState {
    pub db: Arc<RwLock<Tables>>,
    pub cache: Arc<ResponseCache>,
    pub server: ServerCfg,
}

impl AppState {
    /// Build state from env: load config, provision users, seed demo data.
    #[instrument(level = "info", skip_all)]
    pub fn new() -> Self {
        Self::from_config(load_from_env())
    }

    pub fn from_config(cfg: AppConfig) -> Self {
        let mut tables = Tables::default();

        for u in &cfg.users {
            let token = match &u.token {
                Some(t) if !t.is_empty() => t.clone(),
                _ => {
                    let t = generate_token();
                    warn!(target: "quizbank", username = %u.username, token = %t, "No token configured; generated one");
                    t
                }
            };
            match tables.insert_user(&u.username, &token, u.is_staff) {
                Ok(user) => info!(target: "quizbank", username = %user.username, is_staff = user.is_staff, "User provisioned"),
                Err(e) => warn!(target: "quizbank", error = %e, "Skipping user entry"),
            }
        }

        if cfg.seed_demo {
            seed_demo(&mut tables);
        }

        info!(
            target: "quizbank",
            tags = tables.tags.len(),
            questions = tables.questions.len(),
            choices = tables.choices.len(),
            "Startup inventory"
        );

        Self {
            db: Arc::new(RwLock::new(tables)),
            cache: Arc::new(ResponseCache::new(
                Duration::from_secs(cfg.server.cache_ttl_secs),
                cfg.server.cache_max_entries,
            )),
            server: cfg.server,
        }
    }

    /// Resolve a bearer token to its user.
    #[instrument(level = "debug", skip_all)]
    pub async fn user_by_token(&self, token: &str) -> Option<User> {
        self.db.read().await.user_by_token(token).cloned()
    }
}

/// Demo content is owned by the first staff user, or by a generated one.
fn seed_demo(tables: &mut Tables) {
    let staff = tables.users.values().find(|u| u.is_staff).map(|u| u.id);
    let owner = match staff {
        Some(id) => id,
        None => {
            let token = generate_token();
            match tables.insert_user("demo", &token, true) {
                Ok(u) => {
                    warn!(target: "quizbank", username = "demo", %token, "Created demo staff user");
                    u.id
                }
                Err(e) => {
                    warn!(target: "quizbank", error = %e, "Demo seeding skipped");
                    return;
                }
            }
        }
    };

    for label in seed_tag_labels() {
        if let Err(e) = tables.save_tag(None, label) {
            warn!(target: "tags", %label, error = %e, "Seed tag skipped");
        }
    }

    for sq in seed_questions() {
        let tags = tables.tag_ids_for_slugs(&sq.tag_slugs);
        let q = tables.insert_question(owner, sq.fields, tags);
        for (text, is_correct) in sq.choices {
            tables.insert_choice(q.id, text.to_string(), is_correct);
        }
        if let Some(q) = tables.question_mut(q.id) {
            q.published = true;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fields(title: &str) -> QuestionFields {
        QuestionFields {
            title: title.into(),
            text: String::new(),
            explanation: String::new(),
            language: Language::En,
        }
    }

    #[test]
    fn tag_slug_is_unique_per_label() {
        let mut t = Tables::default();
        let a = t.save_tag(None, "some @ long giberish-dsfgsdfg!").unwrap();
        let b = t.save_tag(None, "some @ long giberish-dsfgsdfg!").unwrap();
        assert_eq!(a.slug, "some-long-giberish-dsfgsdfg");
        assert_eq!(b.slug, "some-long-giberish-dsfgsdfg-1");
    }

    #[test]
    fn resaving_without_label_change_keeps_slug() {
        let mut t = Tables::default();
        let tag = t.save_tag(None, "test tag").unwrap();
        let again = t.save_tag(Some(tag.id), "test tag").unwrap();
        let third = t.save_tag(Some(tag.id), "test tag").unwrap();
        assert_eq!(tag.slug, "test-tag");
        assert_eq!(again.slug, tag.slug);
        assert_eq!(third.slug, tag.slug);
    }

    #[test]
    fn label_change_moves_slug_and_frees_the_old_one() {
        let mut t = Tables::default();
        let tag = t.save_tag(None, "test tag").unwrap();
        let updated = t.save_tag(Some(tag.id), "updated label").unwrap();
        assert_eq!(updated.slug, "updated-label");
        assert!(t.tag_by_slug("test-tag").is_none());
        assert_eq!(t.tag_by_slug("updated-label").map(|x| x.id), Some(tag.id));

        let stable = t.save_tag(Some(tag.id), "updated label").unwrap();
        assert_eq!(stable.slug, "updated-label");
    }

    #[test]
    fn relabel_to_same_base_still_changes_slug() {
        let mut t = Tables::default();
        let tag = t.save_tag(None, "Test Tag").unwrap();
        let updated = t.save_tag(Some(tag.id), "test tag").unwrap();
        assert_ne!(updated.slug, tag.slug);
        assert_eq!(updated.slug, "test-tag-1");
    }

    #[test]
    fn unique_index_rejects_foreign_slug() {
        let mut t = Tables::default();
        let a = t.save_tag(None, "alpha").unwrap();
        let clash = Tag { id: 999, label: "x".into(), slug: a.slug.clone() };
        assert!(matches!(t.put_tag(clash), Err(ApiError::Conflict(_))));
    }

    #[test]
    fn blank_and_symbol_labels_are_rejected() {
        let mut t = Tables::default();
        assert!(matches!(t.save_tag(None, "   "), Err(ApiError::Validation(_))));
        assert!(matches!(t.save_tag(None, "@@@"), Err(ApiError::Validation(_))));
        assert!(t.tags.is_empty());
    }

    #[test]
    fn multichoice_needs_two_correct_choices() {
        let mut t = Tables::default();
        let owner = Uuid::new_v4();
        let q = t.insert_question(owner, fields("q"), BTreeSet::new());
        t.insert_choice(q.id, "a".into(), false);
        t.insert_choice(q.id, "b".into(), false);
        t.insert_choice(q.id, "c".into(), true);
        assert!(!t.is_multichoice(q.id));
        t.insert_choice(q.id, "d".into(), true);
        assert!(t.is_multichoice(q.id));
    }

    #[test]
    fn deleting_question_cascades() {
        let mut t = Tables::default();
        let owner = Uuid::new_v4();
        let q = t.insert_question(owner, fields("q"), BTreeSet::new());
        let c = t.insert_choice(q.id, "a".into(), true);
        t.insert_answer(owner, q.id, [c.id].into_iter().collect());
        t.delete_question(q.id);
        assert!(t.choices.is_empty());
        assert!(t.answers.is_empty());
    }

    #[test]
    fn grading_compares_full_correct_set() {
        let mut t = Tables::default();
        let owner = Uuid::new_v4();
        let q = t.insert_question(owner, fields("q"), BTreeSet::new());
        let a = t.insert_choice(q.id, "a".into(), true);
        let b = t.insert_choice(q.id, "b".into(), true);
        let c = t.insert_choice(q.id, "c".into(), false);
        assert!(t.grade(q.id, &[a.id, b.id].into_iter().collect()));
        assert!(!t.grade(q.id, &[a.id].into_iter().collect()));
        assert!(!t.grade(q.id, &[a.id, b.id, c.id].into_iter().collect()));
    }

    #[test]
    fn choice_changes_regrade_existing_answers() {
        let mut t = Tables::default();
        let owner = Uuid::new_v4();
        let q = t.insert_question(owner, fields("q"), BTreeSet::new());
        let a = t.insert_choice(q.id, "a".into(), true);
        let b = t.insert_choice(q.id, "b".into(), false);
        let answer = t.insert_answer(owner, q.id, [a.id].into_iter().collect());
        assert!(answer.is_correct);

        // A second correct choice makes the old answer incomplete.
        t.update_choice(b.id, q.id, "b".into(), true);
        assert!(!t.answers[&answer.id].is_correct);
        t.update_choice(b.id, q.id, "b".into(), false);
        assert!(t.answers[&answer.id].is_correct);

        t.insert_choice(q.id, "c".into(), true);
        assert!(!t.answers[&answer.id].is_correct);
    }

    #[test]
    fn deleting_chosen_choice_marks_answer_wrong() {
        let mut t = Tables::default();
        let owner = Uuid::new_v4();
        let q = t.insert_question(owner, fields("q"), BTreeSet::new());
        let a = t.insert_choice(q.id, "a".into(), true);
        let answer = t.insert_answer(owner, q.id, [a.id].into_iter().collect());

        t.delete_choice(a.id);
        let stored = &t.answers[&answer.id];
        assert!(stored.choices.is_empty());
        assert!(!stored.is_correct);
    }

    #[test]
    fn moving_choice_regrades_both_questions() {
        let mut t = Tables::default();
        let owner = Uuid::new_v4();
        let q1 = t.insert_question(owner, fields("q1"), BTreeSet::new());
        let q2 = t.insert_question(owner, fields("q2"), BTreeSet::new());
        let a = t.insert_choice(q1.id, "a".into(), true);
        let b = t.insert_choice(q2.id, "b".into(), true);
        let first = t.insert_answer(owner, q1.id, [a.id].into_iter().collect());
        let second = t.insert_answer(owner, q2.id, [b.id].into_iter().collect());

        t.update_choice(a.id, q2.id, "a".into(), true);
        assert!(!t.answers[&first.id].is_correct);
        assert!(t.answers[&first.id].choices.is_empty());
        assert!(!t.answers[&second.id].is_correct);
    }

    #[test]
    fn deleting_tag_unlinks_questions() {
        let mut t = Tables::default();
        let tag = t.save_tag(None, "rust").unwrap();
        let q = t.insert_question(Uuid::new_v4(), fields("q"), [tag.id].into_iter().collect());
        assert_eq!(t.question_count(tag.id), 1);
        let (_, touched) = t.delete_tag(tag.id).unwrap();
        assert_eq!(touched, vec![q.uuid]);
        assert!(t.questions[&q.id].tags.is_empty());
    }

    #[test]
    fn demo_seed_creates_owner_and_content() {
        let state = AppState::from_config(AppConfig { seed_demo: true, ..AppConfig::default() });
        let db = state.db.try_read().unwrap();
        assert!(db.user_by_username("demo").map(|u| u.is_staff).unwrap_or(false));
        assert!(!db.tags.is_empty());
        assert!(db.questions.values().all(|q| q.published));
    }
}
