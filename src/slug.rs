//! Tag slug allocation.
//!
//! A slug is derived from a label in three steps:
//!   1. romanise Han characters (`translit::to_latin`)
//!   2. `slug::slugify`: deunicode transliteration, lowercase, every run of
//!      non-alphanumerics collapsed into one hyphen; then truncate to
//!      `SLUG_MAX_LEN`
//!   3. if the base is taken, append the lowest free `-N` suffix (N >= 1)
//!
//! The existence check is a pre-check only: the tag table's unique index
//! decides in the end (see `state::Tables::save_tag`).

use thiserror::Error;

use crate::translit::to_latin;

/// Maximum slug length, suffix included.
pub const SLUG_MAX_LEN: usize = 110;

/// Upper bound on suffixes tried before giving up.
pub const MAX_SUFFIX_ATTEMPTS: u32 = 10_000;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SlugError {
  #[error("label produces an empty slug")]
  Empty,
  #[error("no free slug for '{base}' after {attempts} attempts")]
  Exhausted { base: String, attempts: u32 },
}

/// Base slug for `label`, without uniqueness resolution. May be empty.
pub fn slugify(label: &str) -> String {
  truncate(&::slug::slugify(to_latin(label)), SLUG_MAX_LEN)
}

/// Allocate a slug for `label` that `is_taken` reports as free.
///
/// The unsuffixed base goes to the first occurrence; later ones get `-1`,
/// `-2`, ... whichever is the lowest free number.
pub fn unique_slug<F>(label: &str, is_taken: F) -> Result<String, SlugError>
where
  F: Fn(&str) -> bool,
{
  let base = slugify(label);
  if base.is_empty() {
    return Err(SlugError::Empty);
  }
  if !is_taken(&base) {
    return Ok(base);
  }

  for n in 1..=MAX_SUFFIX_ATTEMPTS {
    let candidate = with_suffix(&base, n);
    if !is_taken(&candidate) {
      return Ok(candidate);
    }
  }

  Err(SlugError::Exhausted { base, attempts: MAX_SUFFIX_ATTEMPTS })
}

fn with_suffix(base: &str, n: u32) -> String {
  let suffix = format!("-{n}");
  let head = truncate(base, SLUG_MAX_LEN.saturating_sub(suffix.len()));
  format!("{head}{suffix}")
}

// Slugs are pure ASCII at this point, so byte slicing is safe.
fn truncate(slug: &str, max: usize) -> String {
  let cut = if slug.len() > max { &slug[..max] } else { slug };
  cut.trim_matches('-').to_string()
}

/// Capitalise every space-separated word: first letter upper, rest lower.
pub fn capitalize_str(s: &str) -> String {
  s.split(' ')
    .map(|word| {
      let mut chars = word.chars();
      match chars.next() {
        Some(first) => first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect(),
        None => String::new(),
      }
    })
    .collect::<Vec<String>>()
    .join(" ")
}

/// Human label from a slug: drops a numeric suffix, hyphens become spaces.
pub fn capitalize_slug(slug: &str) -> String {
  let stem = match slug.rsplit_once('-') {
    Some((head, tail)) if !head.is_empty() && !tail.is_empty() && tail.bytes().all(|b| b.is_ascii_digit()) => head,
    _ => slug,
  };
  capitalize_str(&stem.replace('-', " "))
}
