//! HTTP endpoint handlers. These are thin wrappers that forward to core logic.
//! Tag and question reads go through the response cache.

use std::future::Future;
use std::sync::Arc;

use axum::{
  extract::{Path, Query, State},
  http::{
    header::{CACHE_CONTROL, VARY},
    HeaderValue, StatusCode, Uri,
  },
  response::{IntoResponse, Response},
  Json,
};
use serde::Serialize;
use tracing::{debug, instrument};

use crate::cache::{self, question_scope, tag_scope, QUESTIONS, TAGS};
use crate::domain::User;
use crate::error::ApiError;
use crate::logic;
use crate::protocol::*;
use crate::routes::auth::{CurrentUser, MaybeUser};
use crate::state::AppState;

/// Serve `build` from the cache when possible, storing it under `scopes`.
async fn cached<T, F>(state: &AppState, uri: &Uri, actor: Option<&User>, scopes: Vec<String>, build: F) -> Result<Response, ApiError>
where
  T: Serialize,
  F: Future<Output = Result<T, ApiError>>,
{
  let key = cache::key(uri.path(), uri.query(), actor.map(|u| &u.id));
  let body = match state.cache.get(&key).await {
    Some(hit) => {
      debug!(target: "quizbank", %key, "Cache hit");
      hit
    }
    None => {
      // Taken before reading, so a write landing mid-build voids the fill.
      let ticket = state.cache.ticket(&scopes).await;
      let fresh = serde_json::to_value(build.await?).map_err(|e| ApiError::Internal(e.to_string()))?;
      state.cache.put(key, scopes, ticket, fresh.clone()).await;
      fresh
    }
  };

  let mut resp = Json(body).into_response();
  if state.cache.enabled() {
    let max_age = HeaderValue::from_str(&format!("max-age={}", state.cache.ttl().as_secs()))
      .map_err(|e| ApiError::Internal(e.to_string()))?;
    resp.headers_mut().insert(CACHE_CONTROL, max_age);
    resp.headers_mut().insert(VARY, HeaderValue::from_static("Authorization"));
  }
  Ok(resp)
}

#[instrument(level = "info")]
pub async fn health() -> impl IntoResponse { Json(HealthOut { ok: true }) }

// ---------- Tags ----------

#[instrument(level = "info", skip_all)]
pub async fn list_tags(
  State(state): State<Arc<AppState>>,
  MaybeUser(actor): MaybeUser,
  uri: Uri,
) -> Result<Response, ApiError> {
  cached(&state, &uri, actor.as_ref(), vec![TAGS.into()], async { Ok::<_, ApiError>(logic::list_tags(&state).await) }).await
}

#[instrument(level = "info", skip(state, actor, uri))]
pub async fn get_tag(
  State(state): State<Arc<AppState>>,
  MaybeUser(actor): MaybeUser,
  Path(slug): Path<String>,
  uri: Uri,
) -> Result<Response, ApiError> {
  let scopes = vec![TAGS.into(), tag_scope(&slug)];
  cached(&state, &uri, actor.as_ref(), scopes, logic::get_tag(&state, &slug)).await
}

#[instrument(level = "info", skip_all)]
pub async fn create_tag(
  State(state): State<Arc<AppState>>,
  CurrentUser(actor): CurrentUser,
  Json(body): Json<TagIn>,
) -> Result<(StatusCode, Json<TagOut>), ApiError> {
  let out = logic::create_tag(&state, &actor, body).await?;
  Ok((StatusCode::CREATED, Json(out)))
}

#[instrument(level = "info", skip(state, actor, body))]
pub async fn update_tag(
  State(state): State<Arc<AppState>>,
  CurrentUser(actor): CurrentUser,
  Path(slug): Path<String>,
  Json(body): Json<TagUpdateIn>,
) -> Result<Json<TagOut>, ApiError> {
  Ok(Json(logic::update_tag(&state, &actor, &slug, body).await?))
}

#[instrument(level = "info", skip(state, actor))]
pub async fn delete_tag(
  State(state): State<Arc<AppState>>,
  CurrentUser(actor): CurrentUser,
  Path(slug): Path<String>,
) -> Result<StatusCode, ApiError> {
  logic::delete_tag(&state, &actor, &slug).await?;
  Ok(StatusCode::NO_CONTENT)
}

// ---------- Questions ----------

#[instrument(level = "info", skip(state, actor, uri))]
pub async fn list_questions(
  State(state): State<Arc<AppState>>,
  MaybeUser(actor): MaybeUser,
  Query(q): Query<QuestionListQuery>,
  uri: Uri,
) -> Result<Response, ApiError> {
  cached(&state, &uri, actor.as_ref(), vec![QUESTIONS.into()], async { Ok::<_, ApiError>(logic::list_questions(&state, q).await) }).await
}

#[instrument(level = "info", skip(state, actor, uri))]
pub async fn get_question(
  State(state): State<Arc<AppState>>,
  MaybeUser(actor): MaybeUser,
  Path(uuid): Path<String>,
  uri: Uri,
) -> Result<Response, ApiError> {
  let uuid = logic::parse_uuid(&uuid, "Question")?;
  let scopes = vec![question_scope(&uuid)];
  cached(&state, &uri, actor.as_ref(), scopes, logic::get_question(&state, actor.as_ref(), &uuid)).await
}

#[instrument(level = "info", skip_all)]
pub async fn create_question(
  State(state): State<Arc<AppState>>,
  CurrentUser(actor): CurrentUser,
  Json(body): Json<QuestionIn>,
) -> Result<(StatusCode, Json<QuestionDetailOut>), ApiError> {
  let out = logic::create_question(&state, &actor, body).await?;
  Ok((StatusCode::CREATED, Json(out)))
}

#[instrument(level = "info", skip(state, actor, body))]
pub async fn update_question(
  State(state): State<Arc<AppState>>,
  CurrentUser(actor): CurrentUser,
  Path(uuid): Path<String>,
  Json(body): Json<QuestionIn>,
) -> Result<Json<QuestionDetailOut>, ApiError> {
  let uuid = logic::parse_uuid(&uuid, "Question")?;
  Ok(Json(logic::update_question(&state, &actor, &uuid, body).await?))
}

#[instrument(level = "info", skip(state, actor))]
pub async fn delete_question(
  State(state): State<Arc<AppState>>,
  CurrentUser(actor): CurrentUser,
  Path(uuid): Path<String>,
) -> Result<StatusCode, ApiError> {
  let uuid = logic::parse_uuid(&uuid, "Question")?;
  logic::delete_question(&state, &actor, &uuid).await?;
  Ok(StatusCode::NO_CONTENT)
}

#[instrument(level = "info", skip(state, actor))]
pub async fn publish_question(
  State(state): State<Arc<AppState>>,
  CurrentUser(actor): CurrentUser,
  Path(uuid): Path<String>,
) -> Result<Json<QuestionDetailOut>, ApiError> {
  let uuid = logic::parse_uuid(&uuid, "Question")?;
  Ok(Json(logic::set_published(&state, &actor, &uuid, true).await?))
}

#[instrument(level = "info", skip(state, actor))]
pub async fn unpublish_question(
  State(state): State<Arc<AppState>>,
  CurrentUser(actor): CurrentUser,
  Path(uuid): Path<String>,
) -> Result<Json<QuestionDetailOut>, ApiError> {
  let uuid = logic::parse_uuid(&uuid, "Question")?;
  Ok(Json(logic::set_published(&state, &actor, &uuid, false).await?))
}

// ---------- Choices ----------

#[instrument(level = "info", skip(state, actor))]
pub async fn list_choices(
  State(state): State<Arc<AppState>>,
  CurrentUser(actor): CurrentUser,
  Query(q): Query<ChoiceListQuery>,
) -> Result<Json<Page<ChoiceOut>>, ApiError> {
  Ok(Json(logic::list_choices(&state, &actor, q).await?))
}

#[instrument(level = "info", skip(state))]
pub async fn get_choice(
  State(state): State<Arc<AppState>>,
  Path(uuid): Path<String>,
) -> Result<Json<ChoiceOut>, ApiError> {
  let uuid = logic::parse_uuid(&uuid, "Choice")?;
  Ok(Json(logic::get_choice(&state, &uuid).await?))
}

#[instrument(level = "info", skip_all)]
pub async fn create_choice(
  State(state): State<Arc<AppState>>,
  CurrentUser(actor): CurrentUser,
  Json(body): Json<ChoiceIn>,
) -> Result<(StatusCode, Json<ChoiceOut>), ApiError> {
  let out = logic::create_choice(&state, &actor, body).await?;
  Ok((StatusCode::CREATED, Json(out)))
}

#[instrument(level = "info", skip(state, actor, body))]
pub async fn update_choice(
  State(state): State<Arc<AppState>>,
  CurrentUser(actor): CurrentUser,
  Path(uuid): Path<String>,
  Json(body): Json<ChoiceIn>,
) -> Result<Json<ChoiceOut>, ApiError> {
  let uuid = logic::parse_uuid(&uuid, "Choice")?;
  Ok(Json(logic::update_choice(&state, &actor, &uuid, body).await?))
}

#[instrument(level = "info", skip(state, actor))]
pub async fn delete_choice(
  State(state): State<Arc<AppState>>,
  CurrentUser(actor): CurrentUser,
  Path(uuid): Path<String>,
) -> Result<StatusCode, ApiError> {
  let uuid = logic::parse_uuid(&uuid, "Choice")?;
  logic::delete_choice(&state, &actor, &uuid).await?;
  Ok(StatusCode::NO_CONTENT)
}

// ---------- Answers ----------

#[instrument(level = "info", skip(state, actor))]
pub async fn list_answers(
  State(state): State<Arc<AppState>>,
  CurrentUser(actor): CurrentUser,
  Query(q): Query<AnswerListQuery>,
) -> Json<Page<AnswerOut>> {
  Json(logic::list_answers(&state, &actor, q).await)
}

#[instrument(level = "info", skip(state, actor))]
pub async fn get_answer(
  State(state): State<Arc<AppState>>,
  CurrentUser(actor): CurrentUser,
  Path(uuid): Path<String>,
) -> Result<Json<AnswerOut>, ApiError> {
  let uuid = logic::parse_uuid(&uuid, "Answer")?;
  Ok(Json(logic::get_answer(&state, &actor, &uuid).await?))
}

#[instrument(level = "info", skip_all)]
pub async fn create_answer(
  State(state): State<Arc<AppState>>,
  CurrentUser(actor): CurrentUser,
  Json(body): Json<AnswerIn>,
) -> Result<(StatusCode, Json<AnswerOut>), ApiError> {
  let out = logic::create_answer(&state, &actor, body).await?;
  Ok((StatusCode::CREATED, Json(out)))
}

#[instrument(level = "info", skip(state, actor, body))]
pub async fn update_answer(
  State(state): State<Arc<AppState>>,
  CurrentUser(actor): CurrentUser,
  Path(uuid): Path<String>,
  Json(body): Json<AnswerUpdateIn>,
) -> Result<Json<AnswerOut>, ApiError> {
  let uuid = logic::parse_uuid(&uuid, "Answer")?;
  Ok(Json(logic::update_answer(&state, &actor, &uuid, body).await?))
}

#[instrument(level = "info", skip(state, actor))]
pub async fn delete_answer(
  State(state): State<Arc<AppState>>,
  CurrentUser(actor): CurrentUser,
  Path(uuid): Path<String>,
) -> Result<StatusCode, ApiError> {
  let uuid = logic::parse_uuid(&uuid, "Answer")?;
  logic::delete_answer(&state, &actor, &uuid).await?;
  Ok(StatusCode::NO_CONTENT)
}
