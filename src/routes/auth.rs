//! Bearer identity extractors.
//!
//! - Reads `Authorization: Bearer <token>` (plain string parsing).
//! - Resolves the token against the user table.
//! - `CurrentUser` requires an identity; `MaybeUser` allows anonymous
//!   requests but still rejects a token that does not resolve.

use std::sync::Arc;

use axum::{
  async_trait,
  extract::FromRequestParts,
  http::{header::AUTHORIZATION, request::Parts},
};
use tracing::debug;

use crate::domain::User;
use crate::error::ApiError;
use crate::state::AppState;

pub struct CurrentUser(pub User);

pub struct MaybeUser(pub Option<User>);

fn bearer(parts: &Parts) -> Result<Option<&str>, ApiError> {
  let Some(value) = parts.headers.get(AUTHORIZATION) else {
    return Ok(None);
  };
  let raw = value.to_str().map_err(|_| ApiError::NotAuthenticated)?;
  raw.strip_prefix("Bearer ").map(|t| Some(t.trim())).ok_or(ApiError::NotAuthenticated)
}

async fn resolve(parts: &Parts, state: &AppState) -> Result<Option<User>, ApiError> {
  let Some(token) = bearer(parts)? else {
    return Ok(None);
  };
  match state.user_by_token(token).await {
    Some(user) => Ok(Some(user)),
    None => {
      debug!(target: "quizbank", "Unknown bearer token");
      Err(ApiError::NotAuthenticated)
    }
  }
}

#[async_trait]
impl FromRequestParts<Arc<AppState>> for CurrentUser {
  type Rejection = ApiError;

  async fn from_request_parts(parts: &mut Parts, state: &Arc<AppState>) -> Result<Self, Self::Rejection> {
    resolve(parts, state).await?.map(CurrentUser).ok_or(ApiError::NotAuthenticated)
  }
}

#[async_trait]
impl FromRequestParts<Arc<AppState>> for MaybeUser {
  type Rejection = ApiError;

  async fn from_request_parts(parts: &mut Parts, state: &Arc<AppState>) -> Result<Self, Self::Rejection> {
    Ok(MaybeUser(resolve(parts, state).await?))
  }
}
