//! HTTP request dispatcher.
//!
//! Routing is stateless and decided by method and path alone. Cross-cutting
//! behavior is layered around the routes, outermost first:
//!
//! 1. CORS: every `OPTIONS` request is answered here with 200, an empty body
//!    and the allow-origin/methods/headers declarations. Other responses get
//!    `Access-Control-Allow-Origin: *`.
//! 2. Request tracing spans.
//! 3. Panic capture: a panicking handler yields a JSON 500 and the server
//!    keeps running.
//!
//! ## Structure
//!
//! - [`handler`] - Route handlers.
//! - [`state`] - [`AppState`], built once at startup.
//! - [`client_addr`] - Caller address extraction.
//! - [`error`] - JSON error responses.

pub mod client_addr;
pub mod error;
pub mod handler;
pub mod state;


use crate::server::store::LogStore;
use axum::{
    Router,
    http::{Method, header::CONTENT_TYPE},
    routing::get,
};
use core::time::Duration;
use handler::{health, not_found, record_request};
pub use state::AppState;
use tower_http::{
    catch_panic::CatchPanicLayer,
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

/// Route table without middleware.
pub fn routes<S>(state: AppState<S>) -> Router
where
    S: LogStore,
{
    Router::new()
        .route("/health", get(health::<S>))
        .route("/", get(record_request::<S>).post(record_request::<S>))
        .route(
            "/api/request",
            get(record_request::<S>).post(record_request::<S>),
        )
        .fallback(not_found)
        .method_not_allowed_fallback(not_found)
        .with_state(state)
}

/// Wraps `router` in the CORS, tracing and panic-capture layers.
pub fn with_middleware(router: Router) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([CONTENT_TYPE])
        .max_age(Duration::from_secs(60 * 60));

    router
        .layer(CatchPanicLayer::custom(error::handle_panic))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
}

pub fn router<S>(state: AppState<S>) -> Router
where
    S: LogStore,
{
    with_middleware(routes(state))
}
