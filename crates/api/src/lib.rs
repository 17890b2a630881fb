//! Emporium REST API.
//!
//! An axum service exposing products, a server-side cart, orders, payment
//! intents and user profiles. Storage is pluggable through
//! [`backend::DataBackend`] (in-memory mock, Supabase Postgres or Firestore);
//! bearer tokens are verified through [`auth::Authenticator`].
//!
//! The binary in `main.rs` loads [`config::ApiConfig`], builds an
//! [`state::AppState`] and serves [`app`]. Tests build the same router with
//! hand-assembled state.

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod auth;
pub mod backend;
pub mod config;
pub mod db;
pub mod error;
pub mod middleware;
pub mod payments;
pub mod routes;
pub mod state;

use axum::Router;
use tower_http::trace::{DefaultOnResponse, OnResponse, TraceLayer};
use tracing::Span;

use crate::state::AppState;

/// The complete HTTP application with its middleware stack.
pub fn app(state: AppState) -> Router {
    let cors = middleware::cors_layer(state.config());

    Router::new()
        .merge(routes::api_routes())
        .layer(axum::middleware::from_fn(middleware::request_id_middleware))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(|request: &axum::http::Request<_>| {
                    tracing::info_span!(
                        "http_request",
                        method = %request.method(),
                        uri = %request.uri(),
                        request_id = tracing::field::Empty,
                        status = tracing::field::Empty,
                        latency_ms = tracing::field::Empty,
                    )
                })
                .on_response(
                    |response: &axum::http::Response<_>,
                     latency: std::time::Duration,
                     span: &Span| {
                        span.record("status", response.status().as_u16());
                        span.record(
                            "latency_ms",
                            u64::try_from(latency.as_millis()).unwrap_or(u64::MAX),
                        );
                        DefaultOnResponse::default().on_response(response, latency, span);
                    },
                ),
        )
        .layer(cors)
        .with_state(state)
        // Sentry layers (outermost for full request coverage)
        .layer(sentry_tower::NewSentryLayer::new_from_top())
        .layer(sentry_tower::SentryHttpLayer::new().enable_transaction())
}
