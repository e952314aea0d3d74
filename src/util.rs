//! Small utility helpers used across modules.

use rand::{distributions::Alphanumeric, Rng};

/// Random bearer token for users configured without one.
pub fn generate_token() -> String {
  rand::thread_rng().sample_iter(&Alphanumeric).take(40).map(char::from).collect()
}

/// Log-safe truncation for user-supplied strings.
/// Cuts on a char boundary so multi-byte labels never panic.
pub fn trunc_for_log(s: &str, max: usize) -> String {
  match s.char_indices().nth(max) {
    None => s.to_string(),
    Some((cut, _)) => format!("{}… ({} bytes total)", &s[..cut], s.len()),
  }
}
