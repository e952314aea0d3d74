//! Router assembly: REST endpoints under `/api`, CORS, and HTTP tracing.

use std::sync::Arc;

use axum::{
    routing::{get, post},
    Router,
};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::{DefaultMakeSpan, DefaultOnRequest, DefaultOnResponse, TraceLayer},
};
use tracing::Level;

use crate::state::AppState;

pub mod auth;
pub mod http;

/// Build the application router with:
/// - tag, question, choice and answer collections under `/api/...`
/// - CORS (allow any origin/method/headers), adjust for production if needed
/// - HTTP trace layer (per-request spans w/ method, path, status, latency)
pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/api/health", get(http::health))
        // Tags
        .route("/api/tags", get(http::list_tags).post(http::create_tag))
        .route(
            "/api/tags/:slug",
            get(http::get_tag).put(http::update_tag).delete(http::delete_tag),
        )
        // Questions
        .route(
            "/api/questions",
            get(http::list_questions).post(http::create_question),
        )
        .route(
            "/api/questions/:uuid",
            get(http::get_question)
                .put(http::update_question)
                .delete(http::delete_question),
        )
        .route("/api/questions/:uuid/publish", post(http::publish_question))
        .route("/api/questions/:uuid/unpublish", post(http::unpublish_question))
        // Choices
        .route("/api/choices", get(http::list_choices).post(http::create_choice))
        .route(
            "/api/choices/:uuid",
            get(http::get_choice).put(http::update_choice).delete(http::delete_choice),
        )
        // Answers
        .route("/api/answers", get(http::list_answers).post(http::create_answer))
        .route(
            "/api/answers/:uuid",
            get(http::get_answer).put(http::update_answer).delete(http::delete_answer),
        )
        // State + CORS + HTTP tracing
        .with_state(state)
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_request(DefaultOnRequest::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
}
