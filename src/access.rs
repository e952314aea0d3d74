//! Ownership guard shared by every mutating operation.
//!
//! A resource may be changed by its owner or by staff. Who called the check
//! decides how a refusal is reported: while validating a payload it is a
//! validation error (400), on a direct action it is a permission error (403).

use crate::domain::{Answer, Question, User, UserId};
use crate::error::ApiError;

const NOT_YOURS: &str = "You can only change your own data.";

/// Where the guard is invoked from.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CallSite {
  Payload,
  Action,
}

/// Anything with an owning user. Choices are owned through their question.
pub trait Owned {
  fn owner(&self) -> UserId;
}

impl Owned for Question {
  fn owner(&self) -> UserId { self.owner }
}

impl Owned for Answer {
  fn owner(&self) -> UserId { self.owner }
}

impl Owned for UserId {
  fn owner(&self) -> UserId { *self }
}

pub fn may_mutate<R: Owned + ?Sized>(actor: &User, resource: &R) -> bool {
  actor.is_staff || actor.id == resource.owner()
}

pub fn ensure_owner<R: Owned + ?Sized>(actor: &User, resource: &R, site: CallSite) -> Result<(), ApiError> {
  if may_mutate(actor, resource) {
    return Ok(());
  }
  Err(match site {
    CallSite::Payload => ApiError::Validation(NOT_YOURS.into()),
    CallSite::Action => ApiError::PermissionDenied(NOT_YOURS.into()),
  })
}
