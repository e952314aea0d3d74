//! Public protocol structs for the HTTP endpoints (serde ready), plus the
//! renderers turning table rows into them.
//! Keep this small and stable to evolve backend and frontend independently.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::config::ServerCfg;
use crate::domain::{Answer, Choice, Language, Question, Tag};
use crate::state::Tables;

//
// Requests
//

#[derive(Debug, Deserialize)]
pub struct TagIn {
    #[serde(default)]
    pub label: Option<String>,
    /// Only used to derive a label when none is given.
    #[serde(default)]
    pub slug: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct TagUpdateIn {
    pub label: String,
}

/// Tag reference inside a question payload. Other keys such as `label` are
/// accepted and ignored.
#[derive(Debug, Deserialize)]
pub struct TagRefIn {
    pub slug: String,
}

#[derive(Debug, Deserialize)]
pub struct QuestionIn {
    pub title: String,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub explanation: Option<String>,
    #[serde(default)]
    pub language: Option<Language>,
    #[serde(default)]
    pub tags: Option<Vec<TagRefIn>>,
}

#[derive(Debug, Deserialize)]
pub struct ChoiceIn {
    pub question: Uuid,
    pub text: String,
    #[serde(default)]
    pub is_correct: bool,
}

#[derive(Debug, Deserialize)]
pub struct ChoiceRefIn {
    pub uuid: Uuid,
}

#[derive(Debug, Deserialize)]
pub struct AnswerIn {
    pub question: Uuid,
    pub choices: Vec<ChoiceRefIn>,
}

#[derive(Debug, Deserialize)]
pub struct AnswerUpdateIn {
    pub choices: Vec<ChoiceRefIn>,
}

#[derive(Debug, Default, Deserialize)]
pub struct QuestionListQuery {
    pub limit: Option<usize>,
    pub offset: Option<usize>,
    pub tag: Option<String>,
    pub language: Option<Language>,
    pub user: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ChoiceListQuery {
    pub limit: Option<usize>,
    pub offset: Option<usize>,
    pub question: Option<Uuid>,
}

#[derive(Debug, Default, Deserialize)]
pub struct AnswerListQuery {
    pub limit: Option<usize>,
    pub offset: Option<usize>,
}

//
// Responses
//

#[derive(Serialize)]
pub struct HealthOut {
    pub ok: bool,
}

#[derive(Debug, Serialize)]
pub struct TagOut {
    pub url: String,
    pub label: String,
    pub slug: String,
    pub question_count: usize,
}

#[derive(Debug, Serialize)]
pub struct QuestionTagOut {
    pub url: String,
    pub label: String,
    pub slug: String,
}

#[derive(Debug, Serialize)]
pub struct QuestionListOut {
    pub url: String,
    pub uuid: Uuid,
    pub title: String,
    pub language: Language,
    pub updated_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub tags: Vec<QuestionTagOut>,
}

/// Choices nested in a question; correctness stays hidden here.
#[derive(Debug, Serialize)]
pub struct QuestionChoiceOut {
    pub url: String,
    pub uuid: Uuid,
    pub text: String,
}

#[derive(Debug, Serialize)]
pub struct QuestionDetailOut {
    pub url: String,
    pub uuid: Uuid,
    pub title: String,
    pub text: String,
    pub explanation: String,
    pub language: Language,
    pub published: bool,
    pub is_multichoice: bool,
    pub updated_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub tags: Vec<QuestionTagOut>,
    pub choices: Vec<QuestionChoiceOut>,
}

#[derive(Debug, Serialize)]
pub struct ChoiceOut {
    pub url: String,
    pub uuid: Uuid,
    pub question: Uuid,
    pub question_url: String,
    pub text: String,
    pub is_correct: bool,
}

#[derive(Debug, Serialize)]
pub struct AnswerChoiceOut {
    pub uuid: Uuid,
    pub question: Uuid,
    pub text: String,
    pub is_correct: bool,
}

#[derive(Debug, Serialize)]
pub struct AnswerOut {
    pub url: String,
    pub uuid: Uuid,
    pub question: Uuid,
    pub choices: Vec<AnswerChoiceOut>,
    pub is_correct: bool,
    pub created_at: DateTime<Utc>,
}

/// Limit/offset page envelope.
#[derive(Debug, Serialize)]
pub struct Page<T> {
    pub limit: usize,
    pub offset: usize,
    pub count: usize,
    pub next: Option<String>,
    pub previous: Option<String>,
    pub results: Vec<T>,
}

//
// Renderers
//

fn url(base: &str, path: &str) -> String {
    format!("{}{}", base.trim_end_matches('/'), path)
}

pub fn tag_path(slug: &str) -> String {
    format!("/api/tags/{slug}")
}

pub fn question_path(uuid: &Uuid) -> String {
    format!("/api/questions/{uuid}")
}

pub fn choice_path(uuid: &Uuid) -> String {
    format!("/api/choices/{uuid}")
}

pub fn answer_path(uuid: &Uuid) -> String {
    format!("/api/answers/{uuid}")
}

pub fn tag_out(db: &Tables, t: &Tag, base: &str) -> TagOut {
    TagOut {
        url: url(base, &tag_path(&t.slug)),
        label: t.label.clone(),
        slug: t.slug.clone(),
        question_count: db.question_count(t.id),
    }
}

fn question_tags(db: &Tables, q: &Question, base: &str) -> Vec<QuestionTagOut> {
    q.tags
        .iter()
        .filter_map(|id| db.tags.get(id))
        .map(|t| QuestionTagOut {
            url: url(base, &tag_path(&t.slug)),
            label: t.label.clone(),
            slug: t.slug.clone(),
        })
        .collect()
}

pub fn question_list_out(db: &Tables, q: &Question, base: &str) -> QuestionListOut {
    QuestionListOut {
        url: url(base, &question_path(&q.uuid)),
        uuid: q.uuid,
        title: q.title.clone(),
        language: q.language,
        updated_at: q.updated_at,
        created_at: q.created_at,
        tags: question_tags(db, q, base),
    }
}

pub fn question_detail_out(db: &Tables, q: &Question, base: &str) -> QuestionDetailOut {
    QuestionDetailOut {
        url: url(base, &question_path(&q.uuid)),
        uuid: q.uuid,
        title: q.title.clone(),
        text: q.text.clone(),
        explanation: q.explanation.clone(),
        language: q.language,
        published: q.published,
        is_multichoice: db.is_multichoice(q.id),
        updated_at: q.updated_at,
        created_at: q.created_at,
        tags: question_tags(db, q, base),
        choices: db
            .choices_of(q.id)
            .into_iter()
            .map(|c| QuestionChoiceOut {
                url: url(base, &choice_path(&c.uuid)),
                uuid: c.uuid,
                text: c.text.clone(),
            })
            .collect(),
    }
}

/// `None` when the choice's question is gone, which the cascade prevents.
pub fn choice_out(db: &Tables, c: &Choice, base: &str) -> Option<ChoiceOut> {
    let q = db.questions.get(&c.question)?;
    Some(ChoiceOut {
        url: url(base, &choice_path(&c.uuid)),
        uuid: c.uuid,
        question: q.uuid,
        question_url: url(base, &question_path(&q.uuid)),
        text: c.text.clone(),
        is_correct: c.is_correct,
    })
}

pub fn answer_out(db: &Tables, a: &Answer, base: &str) -> Option<AnswerOut> {
    let q = db.questions.get(&a.question)?;
    Some(AnswerOut {
        url: url(base, &answer_path(&a.uuid)),
        uuid: a.uuid,
        question: q.uuid,
        choices: a
            .choices
            .iter()
            .filter_map(|id| db.choices.get(id))
            .map(|c| AnswerChoiceOut {
                uuid: c.uuid,
                question: q.uuid,
                text: c.text.clone(),
                is_correct: c.is_correct,
            })
            .collect(),
        is_correct: a.is_correct,
        created_at: a.created_at,
    })
}

//
// Pagination
//

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PageRequest {
    pub limit: usize,
    pub offset: usize,
}

impl PageRequest {
    /// Missing or zero limit falls back to the page size; capped at the max.
    pub fn resolve(limit: Option<usize>, offset: Option<usize>, cfg: &ServerCfg) -> Self {
        let limit = match limit {
            Some(l) if l > 0 => l.min(cfg.max_page_size.max(1)),
            _ => cfg.page_size.max(1),
        };
        Self { limit, offset: offset.unwrap_or(0) }
    }
}

/// Slice `all` into one page. `filters` are echoed into next/previous links.
pub fn paginate<T>(all: Vec<T>, req: PageRequest, base: &str, path: &str, filters: &[(&str, String)]) -> Page<T> {
    let count = all.len();
    let link = |offset: usize| {
        let mut qs = format!("limit={}&offset={}", req.limit, offset);
        for (k, v) in filters {
            qs.push_str(&format!("&{}={}", k, urlencoding::encode(v)));
        }
        format!("{}?{}", url(base, path), qs)
    };

    let after = req.offset.saturating_add(req.limit);
    let next = (after < count).then(|| link(after));
    let previous = (req.offset > 0).then(|| link(req.offset.saturating_sub(req.limit)));
    let results = all.into_iter().skip(req.offset).take(req.limit).collect();

    Page { limit: req.limit, offset: req.offset, count, next, previous, results }
}
