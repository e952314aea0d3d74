//! Read-through cache for tag and question GET responses.
//!
//! Entries are keyed by path + query + acting user and registered under one
//! or more scopes. Writes invalidate only the scopes they touch:
//!   - `tags`             every tag view
//!   - `tag:<slug>`       one tag detail
//!   - `questions`        question lists
//!   - `question:<uuid>`  one question detail

use std::collections::HashMap;
use std::time::{Duration, Instant};

use serde_json::Value;
use tokio::sync::RwLock;
use tracing::{debug, instrument};
use uuid::Uuid;

pub const TAGS: &str = "tags";
pub const QUESTIONS: &str = "questions";

pub fn tag_scope(slug: &str) -> String {
    format!("tag:{slug}")
}

pub fn question_scope(uuid: &Uuid) -> String {
    format!("question:{uuid}")
}

/// Cache key for a GET request. Anonymous requests share one entry.
pub fn key(path: &str, query: Option<&str>, actor: Option<&Uuid>) -> String {
    let who = actor.map(|id| id.to_string()).unwrap_or_else(|| "anon".into());
    match query {
        Some(q) if !q.is_empty() => format!("{who} {path}?{q}"),
        _ => format!("{who} {path}"),
    }
}

/// Entries kept before the oldest third is culled.
pub const DEFAULT_MAX_ENTRIES: usize = 300;

struct Entry {
    stored_at: Instant,
    scopes: Vec<String>,
    body: Value,
}

/// Scope generations observed before a response body was built. A `put`
/// holding an outdated ticket is dropped.
pub struct Ticket(Vec<u64>);

#[derive(Default)]
struct Inner {
    entries: HashMap<String, Entry>,
    generations: HashMap<String, u64>,
}

impl Inner {
    fn generation(&self, scope: &str) -> u64 {
        self.generations.get(scope).copied().unwrap_or(0)
    }

    /// Drop expired entries; if still full, drop the oldest third.
    fn make_room(&mut self, ttl: Duration, max_entries: usize) {
        self.entries.retain(|_, e| e.stored_at.elapsed() < ttl);
        if self.entries.len() < max_entries {
            return;
        }
        let mut by_age: Vec<(Instant, String)> = self.entries.iter().map(|(k, e)| (e.stored_at, k.clone())).collect();
        by_age.sort();
        let cull = (self.entries.len() / 3).max(1);
        for (_, key) in by_age.into_iter().take(cull) {
            self.entries.remove(&key);
        }
    }
}

pub struct ResponseCache {
    ttl: Duration,
    max_entries: usize,
    inner: RwLock<Inner>,
}

impl ResponseCache {
    /// A zero TTL disables caching.
    pub fn new(ttl: Duration, max_entries: usize) -> Self {
        Self { ttl, max_entries: max_entries.max(1), inner: RwLock::new(Inner::default()) }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub fn enabled(&self) -> bool {
        !self.ttl.is_zero()
    }

    pub async fn get(&self, key: &str) -> Option<Value> {
        if !self.enabled() {
            return None;
        }
        {
            let inner = self.inner.read().await;
            match inner.entries.get(key) {
                Some(e) if e.stored_at.elapsed() < self.ttl => return Some(e.body.clone()),
                Some(_) => {}
                None => return None,
            }
        }
        // stale
        self.inner.write().await.entries.remove(key);
        None
    }

    /// Take before reading the data a body is built from.
    pub async fn ticket(&self, scopes: &[String]) -> Ticket {
        let inner = self.inner.read().await;
        Ticket(scopes.iter().map(|s| inner.generation(s)).collect())
    }

    /// Store `body` unless one of `scopes` was invalidated since `ticket`.
    /// Returns whether the entry was kept.
    pub async fn put(&self, key: String, scopes: Vec<String>, ticket: Ticket, body: Value) -> bool {
        if !self.enabled() {
            return false;
        }
        let mut inner = self.inner.write().await;
        let fresh = ticket.0.len() == scopes.len()
            && scopes.iter().zip(&ticket.0).all(|(s, seen)| inner.generation(s) == *seen);
        if !fresh {
            debug!(target: "quizbank", %key, "Cache fill skipped; scope changed while building");
            return false;
        }
        if !inner.entries.contains_key(&key) && inner.entries.len() >= self.max_entries {
            inner.make_room(self.ttl, self.max_entries);
        }
        inner.entries.insert(key, Entry { stored_at: Instant::now(), scopes, body });
        true
    }

    /// Drop every entry registered under any of `scopes` and bump their
    /// generations. Returns how many entries went.
    #[instrument(level = "debug", skip(self))]
    pub async fn invalidate(&self, scopes: &[String]) -> usize {
        let mut inner = self.inner.write().await;
        for s in scopes {
            *inner.generations.entry(s.clone()).or_insert(0) += 1;
        }
        let before = inner.entries.len();
        inner.entries.retain(|_, e| !e.scopes.iter().any(|s| scopes.contains(s)));
        let dropped = before - inner.entries.len();
        debug!(target: "quizbank", dropped, "Cache entries invalidated");
        dropped
    }

    #[cfg(test)]
    pub async fn len(&self) -> usize {
        self.inner.read().await.entries.len()
    }
}
