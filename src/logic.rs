//! Core behaviors behind the HTTP handlers.
//!
//! This includes:
//!   - tag management (staff) with slug allocation
//!   - question CRUD with nested tag wiring, publishing, filtering
//!   - choice CRUD guarded by the question owner
//!   - answer submission and grading
//!   - scoped cache invalidation after every write
//!
//! Each operation takes the store lock once, so its writes are atomic.

use std::collections::BTreeSet;

use chrono::Utc;
use tracing::{info, instrument};
use uuid::Uuid;

use crate::access::{ensure_owner, may_mutate, CallSite};
use crate::cache::{question_scope, tag_scope, QUESTIONS, TAGS};
use crate::domain::{Question, User, TITLE_MAX_LEN};
use crate::error::ApiError;
use crate::protocol::*;
use crate::slug::capitalize_slug;
use crate::state::{AppState, QuestionFields, Tables};

/// Path ids that are not uuids are reported as missing.
pub fn parse_uuid(raw: &str, what: &'static str) -> Result<Uuid, ApiError> {
  Uuid::parse_str(raw).map_err(|_| ApiError::NotFound(what))
}

fn require_staff(actor: &User) -> Result<(), ApiError> {
  if actor.is_staff { Ok(()) } else { Err(ApiError::staff_only()) }
}

fn validate_title(title: &str) -> Result<String, ApiError> {
  let t = title.trim();
  if t.is_empty() {
    return Err(ApiError::Validation("title: this field may not be blank.".into()));
  }
  if t.chars().count() > TITLE_MAX_LEN {
    return Err(ApiError::Validation(format!("title: ensure this field has no more than {TITLE_MAX_LEN} characters.")));
  }
  Ok(t.to_string())
}

fn validate_choice_text(text: &str) -> Result<String, ApiError> {
  if text.trim().is_empty() {
    return Err(ApiError::Validation("text: this field may not be blank.".into()));
  }
  Ok(text.to_string())
}

/// Published questions are public; drafts are visible to owner and staff.
fn visible_question<'a>(db: &'a Tables, actor: Option<&User>, uuid: &Uuid) -> Result<&'a Question, ApiError> {
  let q = db.question_by_uuid(uuid).ok_or(ApiError::NotFound("Question"))?;
  let allowed = q.published || actor.map(|a| may_mutate(a, q)).unwrap_or(false);
  if allowed { Ok(q) } else { Err(ApiError::NotFound("Question")) }
}

fn slugs_of(tags: &[TagRefIn]) -> Vec<&str> {
  tags.iter().map(|t| t.slug.as_str()).collect()
}

async fn invalidate(state: &AppState, scopes: Vec<String>) {
  state.cache.invalidate(&scopes).await;
}

// ---------- Tags ----------

#[instrument(level = "info", skip(state))]
pub async fn list_tags(state: &AppState) -> Vec<TagOut> {
  let db = state.db.read().await;
  let mut tags: Vec<TagOut> = db.tags.values().map(|t| tag_out(&db, t, &state.server.base_url)).collect();
  tags.sort_by(|a, b| a.label.to_lowercase().cmp(&b.label.to_lowercase()).then_with(|| a.slug.cmp(&b.slug)));
  tags
}

#[instrument(level = "info", skip(state), fields(%slug))]
pub async fn get_tag(state: &AppState, slug: &str) -> Result<TagOut, ApiError> {
  let db = state.db.read().await;
  let t = db.tag_by_slug(slug).ok_or(ApiError::NotFound("Tag"))?;
  Ok(tag_out(&db, t, &state.server.base_url))
}

#[instrument(level = "info", skip(state, actor, body), fields(actor = %actor.username))]
pub async fn create_tag(state: &AppState, actor: &User, body: TagIn) -> Result<TagOut, ApiError> {
  require_staff(actor)?;
  let label = match (body.label, body.slug) {
    (Some(l), _) if !l.trim().is_empty() => l,
    (_, Some(s)) if !s.trim().is_empty() => capitalize_slug(s.trim()),
    _ => return Err(ApiError::Validation("label: this field is required.".into())),
  };

  let out = {
    let mut db = state.db.write().await;
    let tag = db.save_tag(None, &label)?;
    tag_out(&db, &tag, &state.server.base_url)
  };
  invalidate(state, vec![TAGS.into()]).await;
  info!(target: "tags", slug = %out.slug, "Tag created");
  Ok(out)
}

#[instrument(level = "info", skip(state, actor, body), fields(actor = %actor.username, %slug))]
pub async fn update_tag(state: &AppState, actor: &User, slug: &str, body: TagUpdateIn) -> Result<TagOut, ApiError> {
  require_staff(actor)?;
  let (out, mut scopes) = {
    let mut db = state.db.write().await;
    let id = db.tag_by_slug(slug).ok_or(ApiError::NotFound("Tag"))?.id;
    let tag = db.save_tag(Some(id), &body.label)?;
    let scopes: Vec<String> = db.questions_tagged(id).iter().map(question_scope).collect();
    (tag_out(&db, &tag, &state.server.base_url), scopes)
  };
  if out.slug != slug {
    info!(target: "tags", from = %slug, to = %out.slug, "Tag relabelled; slug moved");
  }
  scopes.extend([TAGS.into(), QUESTIONS.into(), tag_scope(slug), tag_scope(&out.slug)]);
  invalidate(state, scopes).await;
  Ok(out)
}

#[instrument(level = "info", skip(state, actor), fields(actor = %actor.username, %slug))]
pub async fn delete_tag(state: &AppState, actor: &User, slug: &str) -> Result<(), ApiError> {
  require_staff(actor)?;
  let touched = {
    let mut db = state.db.write().await;
    let id = db.tag_by_slug(slug).ok_or(ApiError::NotFound("Tag"))?.id;
    db.delete_tag(id).map(|(_, touched)| touched).unwrap_or_default()
  };
  let mut scopes: Vec<String> = touched.iter().map(question_scope).collect();
  scopes.extend([TAGS.into(), QUESTIONS.into(), tag_scope(slug)]);
  invalidate(state, scopes).await;
  info!(target: "tags", %slug, "Tag deleted");
  Ok(())
}

// ---------- Questions ----------

#[instrument(level = "info", skip(state))]
pub async fn list_questions(state: &AppState, q: QuestionListQuery) -> Page<QuestionListOut> {
  let db = state.db.read().await;
  let tag_id = q.tag.as_deref().map(|s| db.tag_by_slug(s).map(|t| t.id));
  let owner = q.user.as_deref().map(|u| db.user_by_username(u).map(|u| u.id));

  let rows: Vec<QuestionListOut> = db
    .questions
    .values()
    .filter(|x| x.published)
    .filter(|x| match tag_id {
      None => true,
      Some(id) => id.map(|id| x.tags.contains(&id)).unwrap_or(false),
    })
    .filter(|x| q.language.map(|l| x.language == l).unwrap_or(true))
    .filter(|x| match owner {
      None => true,
      Some(id) => id == Some(x.owner),
    })
    .map(|x| question_list_out(&db, x, &state.server.base_url))
    .collect();

  let mut filters = Vec::new();
  if let Some(t) = &q.tag { filters.push(("tag", t.clone())); }
  if let Some(l) = q.language { filters.push(("language", l.to_string())); }
  if let Some(u) = &q.user { filters.push(("user", u.clone())); }

  let req = PageRequest::resolve(q.limit, q.offset, &state.server);
  paginate(rows, req, &state.server.base_url, "/api/questions", &filters)
}

#[instrument(level = "info", skip(state, actor), fields(%uuid))]
pub async fn get_question(state: &AppState, actor: Option<&User>, uuid: &Uuid) -> Result<QuestionDetailOut, ApiError> {
  let db = state.db.read().await;
  let q = visible_question(&db, actor, uuid)?;
  Ok(question_detail_out(&db, q, &state.server.base_url))
}

#[instrument(level = "info", skip(state, actor, body), fields(actor = %actor.username))]
pub async fn create_question(state: &AppState, actor: &User, body: QuestionIn) -> Result<QuestionDetailOut, ApiError> {
  let fields = QuestionFields {
    title: validate_title(&body.title)?,
    text: body.text.unwrap_or_default(),
    explanation: body.explanation.unwrap_or_default(),
    language: body.language.unwrap_or_default(),
  };

  let out = {
    let mut db = state.db.write().await;
    let tags = body.tags.as_deref().map(|t| db.tag_ids_for_slugs(&slugs_of(t))).unwrap_or_default();
    let q = db.insert_question(actor.id, fields, tags);
    question_detail_out(&db, &q, &state.server.base_url)
  };
  invalidate(state, vec![QUESTIONS.into(), TAGS.into()]).await;
  info!(target: "questions", uuid = %out.uuid, tags = out.tags.len(), "Question created");
  Ok(out)
}

/// Full replacement of the question fields. Omitted text/explanation/language
/// keep their value; `tags` replaces the tag set when present.
#[instrument(level = "info", skip(state, actor, body), fields(actor = %actor.username, %uuid))]
pub async fn update_question(state: &AppState, actor: &User, uuid: &Uuid, body: QuestionIn) -> Result<QuestionDetailOut, ApiError> {
  let title = validate_title(&body.title)?;
  let out = {
    let mut db = state.db.write().await;
    let q = visible_question(&db, Some(actor), uuid)?;
    ensure_owner(actor, q, CallSite::Payload)?;
    let id = q.id;
    let tags = body.tags.as_deref().map(|t| db.tag_ids_for_slugs(&slugs_of(t)));

    let q = db.question_mut(id).ok_or(ApiError::NotFound("Question"))?;
    q.title = title;
    if let Some(text) = body.text { q.text = text; }
    if let Some(explanation) = body.explanation { q.explanation = explanation; }
    if let Some(language) = body.language { q.language = language; }
    if let Some(tags) = tags { q.tags = tags; }
    q.updated_at = Utc::now();
    let q = q.clone();
    question_detail_out(&db, &q, &state.server.base_url)
  };
  invalidate(state, vec![QUESTIONS.into(), TAGS.into(), question_scope(uuid)]).await;
  info!(target: "questions", %uuid, "Question updated");
  Ok(out)
}

#[instrument(level = "info", skip(state, actor), fields(actor = %actor.username, %uuid))]
pub async fn delete_question(state: &AppState, actor: &User, uuid: &Uuid) -> Result<(), ApiError> {
  {
    let mut db = state.db.write().await;
    let q = visible_question(&db, Some(actor), uuid)?;
    ensure_owner(actor, q, CallSite::Action)?;
    let id = q.id;
    db.delete_question(id);
  }
  invalidate(state, vec![QUESTIONS.into(), TAGS.into(), question_scope(uuid)]).await;
  info!(target: "questions", %uuid, "Question deleted");
  Ok(())
}

#[instrument(level = "info", skip(state, actor), fields(actor = %actor.username, %uuid))]
pub async fn set_published(state: &AppState, actor: &User, uuid: &Uuid, published: bool) -> Result<QuestionDetailOut, ApiError> {
  require_staff(actor)?;
  let out = {
    let mut db = state.db.write().await;
    let id = db.question_by_uuid(uuid).ok_or(ApiError::NotFound("Question"))?.id;
    let q = db.question_mut(id).ok_or(ApiError::NotFound("Question"))?;
    q.published = published;
    q.updated_at = Utc::now();
    let q = q.clone();
    question_detail_out(&db, &q, &state.server.base_url)
  };
  invalidate(state, vec![QUESTIONS.into(), TAGS.into(), question_scope(uuid)]).await;
  info!(target: "questions", %uuid, %published, "Publication changed");
  Ok(out)
}

// ---------- Choices ----------

#[instrument(level = "info", skip(state, actor), fields(actor = %actor.username))]
pub async fn list_choices(state: &AppState, actor: &User, q: ChoiceListQuery) -> Result<Page<ChoiceOut>, ApiError> {
  require_staff(actor)?;
  let db = state.db.read().await;
  let question_id = match &q.question {
    Some(uuid) => Some(db.question_by_uuid(uuid).ok_or(ApiError::NotFound("Question"))?.id),
    None => None,
  };
  let rows: Vec<ChoiceOut> = db
    .choices
    .values()
    .filter(|c| question_id.map(|id| c.question == id).unwrap_or(true))
    .filter_map(|c| choice_out(&db, c, &state.server.base_url))
    .collect();

  let filters: Vec<(&str, String)> = q.question.iter().map(|u| ("question", u.to_string())).collect();
  let req = PageRequest::resolve(q.limit, q.offset, &state.server);
  Ok(paginate(rows, req, &state.server.base_url, "/api/choices", &filters))
}

#[instrument(level = "info", skip(state), fields(%uuid))]
pub async fn get_choice(state: &AppState, uuid: &Uuid) -> Result<ChoiceOut, ApiError> {
  let db = state.db.read().await;
  let c = db.choice_by_uuid(uuid).ok_or(ApiError::NotFound("Choice"))?;
  choice_out(&db, c, &state.server.base_url).ok_or(ApiError::NotFound("Choice"))
}

#[instrument(level = "info", skip(state, actor, body), fields(actor = %actor.username, question = %body.question))]
pub async fn create_choice(state: &AppState, actor: &User, body: ChoiceIn) -> Result<ChoiceOut, ApiError> {
  let text = validate_choice_text(&body.text)?;
  let out = {
    let mut db = state.db.write().await;
    let q = db
      .question_by_uuid(&body.question)
      .ok_or_else(|| ApiError::Validation(format!("question: object with uuid={} does not exist.", body.question)))?;
    ensure_owner(actor, q, CallSite::Payload)?;
    let qid = q.id;
    let c = db.insert_choice(qid, text, body.is_correct);
    choice_out(&db, &c, &state.server.base_url).ok_or(ApiError::NotFound("Question"))?
  };
  invalidate(state, vec![question_scope(&body.question)]).await;
  info!(target: "questions", choice = %out.uuid, question = %out.question, "Choice created");
  Ok(out)
}

/// Both the current and the target question must belong to the actor.
#[instrument(level = "info", skip(state, actor, body), fields(actor = %actor.username, %uuid))]
pub async fn update_choice(state: &AppState, actor: &User, uuid: &Uuid, body: ChoiceIn) -> Result<ChoiceOut, ApiError> {
  let text = validate_choice_text(&body.text)?;
  let (out, old_question) = {
    let mut db = state.db.write().await;
    let c = db.choice_by_uuid(uuid).ok_or(ApiError::NotFound("Choice"))?;
    let cid = c.id;
    let current = db.questions.get(&c.question).ok_or(ApiError::NotFound("Question"))?;
    ensure_owner(actor, current, CallSite::Payload)?;
    let old_question = current.uuid;

    let target = db
      .question_by_uuid(&body.question)
      .ok_or_else(|| ApiError::Validation(format!("question: object with uuid={} does not exist.", body.question)))?;
    ensure_owner(actor, target, CallSite::Payload)?;
    let tid = target.id;

    let c = db.update_choice(cid, tid, text, body.is_correct).ok_or(ApiError::NotFound("Choice"))?;
    (choice_out(&db, &c, &state.server.base_url).ok_or(ApiError::NotFound("Question"))?, old_question)
  };
  invalidate(state, vec![question_scope(&old_question), question_scope(&body.question)]).await;
  info!(target: "questions", choice = %uuid, "Choice updated");
  Ok(out)
}

#[instrument(level = "info", skip(state, actor), fields(actor = %actor.username, %uuid))]
pub async fn delete_choice(state: &AppState, actor: &User, uuid: &Uuid) -> Result<(), ApiError> {
  let question = {
    let mut db = state.db.write().await;
    let c = db.choice_by_uuid(uuid).ok_or(ApiError::NotFound("Choice"))?;
    let cid = c.id;
    let q = db.questions.get(&c.question).ok_or(ApiError::NotFound("Question"))?;
    ensure_owner(actor, q, CallSite::Action)?;
    let quuid = q.uuid;
    db.delete_choice(cid);
    quuid
  };
  invalidate(state, vec![question_scope(&question)]).await;
  info!(target: "questions", choice = %uuid, "Choice deleted");
  Ok(())
}

// ---------- Answers ----------

/// Resolve choice refs against `question_id`. Duplicates collapse.
fn resolve_choices(db: &Tables, question_id: u64, refs: &[ChoiceRefIn]) -> Result<BTreeSet<u64>, ApiError> {
  if refs.is_empty() {
    return Err(ApiError::Validation("choices: at least one choice is required.".into()));
  }
  let mut ids = BTreeSet::new();
  for r in refs {
    let c = db.choice_by_uuid(&r.uuid).ok_or(ApiError::NotFound("Choice"))?;
    if c.question != question_id {
      return Err(ApiError::Validation(format!("choices: {} does not belong to the answered question.", r.uuid)));
    }
    ids.insert(c.id);
  }
  Ok(ids)
}

#[instrument(level = "info", skip(state, actor), fields(actor = %actor.username))]
pub async fn list_answers(state: &AppState, actor: &User, q: AnswerListQuery) -> Page<AnswerOut> {
  let db = state.db.read().await;
  let rows: Vec<AnswerOut> = db
    .answers
    .values()
    .filter(|a| a.owner == actor.id)
    .filter_map(|a| answer_out(&db, a, &state.server.base_url))
    .collect();
  let req = PageRequest::resolve(q.limit, q.offset, &state.server);
  paginate(rows, req, &state.server.base_url, "/api/answers", &[])
}

/// Someone else's answer is reported as missing, even to a guess of its uuid.
fn own_answer_id(db: &Tables, actor: &User, uuid: &Uuid) -> Result<u64, ApiError> {
  match db.answer_by_uuid(uuid) {
    Some(a) if may_mutate(actor, a) => Ok(a.id),
    _ => Err(ApiError::NotFound("Answer")),
  }
}

#[instrument(level = "info", skip(state, actor), fields(actor = %actor.username, %uuid))]
pub async fn get_answer(state: &AppState, actor: &User, uuid: &Uuid) -> Result<AnswerOut, ApiError> {
  let db = state.db.read().await;
  let id = own_answer_id(&db, actor, uuid)?;
  let a = db.answers.get(&id).ok_or(ApiError::NotFound("Answer"))?;
  answer_out(&db, a, &state.server.base_url).ok_or(ApiError::NotFound("Answer"))
}

#[instrument(level = "info", skip(state, actor, body), fields(actor = %actor.username, question = %body.question))]
pub async fn create_answer(state: &AppState, actor: &User, body: AnswerIn) -> Result<AnswerOut, ApiError> {
  let mut db = state.db.write().await;
  let qid = visible_question(&db, Some(actor), &body.question)?.id;
  let choices = resolve_choices(&db, qid, &body.choices)?;
  let a = db.insert_answer(actor.id, qid, choices);
  info!(target: "answers", uuid = %a.uuid, question = %body.question, correct = a.is_correct, "Answer submitted");
  answer_out(&db, &a, &state.server.base_url).ok_or(ApiError::NotFound("Question"))
}

#[instrument(level = "info", skip(state, actor, body), fields(actor = %actor.username, %uuid))]
pub async fn update_answer(state: &AppState, actor: &User, uuid: &Uuid, body: AnswerUpdateIn) -> Result<AnswerOut, ApiError> {
  let mut db = state.db.write().await;
  let id = own_answer_id(&db, actor, uuid)?;
  let qid = db.answers.get(&id).map(|a| a.question).ok_or(ApiError::NotFound("Answer"))?;
  let choices = resolve_choices(&db, qid, &body.choices)?;
  let a = db.update_answer(id, choices).ok_or(ApiError::NotFound("Answer"))?;
  info!(target: "answers", %uuid, correct = a.is_correct, "Answer regraded");
  answer_out(&db, &a, &state.server.base_url).ok_or(ApiError::NotFound("Question"))
}

#[instrument(level = "info", skip(state, actor), fields(actor = %actor.username, %uuid))]
pub async fn delete_answer(state: &AppState, actor: &User, uuid: &Uuid) -> Result<(), ApiError> {
  let mut db = state.db.write().await;
  let id = own_answer_id(&db, actor, uuid)?;
  db.delete_answer(id);
  info!(target: "answers", %uuid, "Answer deleted");
  Ok(())
}
