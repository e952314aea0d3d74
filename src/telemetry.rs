//! Telemetry initialization (tracing/tracing-subscriber).
//!
//! Behavior:
//! - LOG_LEVEL controls the filter (e.g. "debug" or detailed directives).
//!   Without it `DEFAULT_FILTER` applies: info overall, debug for the
//!   quizbank, tags, questions and answers targets.
//! - LOG_FORMAT selects "pretty" (default) or "json" structured logs.
//!
//! Business events log under the `tags`, `questions` and `answers` targets;
//! startup, auth and cache events under `quizbank`.

use tracing_subscriber::EnvFilter;

const DEFAULT_FILTER: &str = "info,quizbank=debug,tags=debug,questions=debug,answers=debug,tower_http=info,axum=info";

pub fn init_tracing() {
    let filter = EnvFilter::try_from_env("LOG_LEVEL").unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_file(true)
        .with_line_number(true);

    match std::env::var("LOG_FORMAT").as_deref() {
        Ok("json") => {
            builder.json().init();
        }
        _ => {
            builder.init();
        }
    }
}
