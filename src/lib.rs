// Library exports for Peptidex
// This allows integration tests and the binary to share one router

pub mod audit;
pub mod auth;
pub mod config;
pub mod content;
pub mod db;
pub mod error;
pub mod extractors;
pub mod routes;
pub mod state;
pub mod ugc;

use axum::routing::get;
use axum::Router;
use tower_http::trace::TraceLayer;

use crate::state::AppState;

/// Every page and API route, with request tracing.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(routes::home::index))
        .merge(routes::assets::router())
        .merge(routes::peptides::router())
        .merge(routes::public::router())
        .merge(routes::auth::router())
        .merge(routes::admin::router())
        .merge(routes::billing::router())
        .merge(routes::ugc::router())
        .merge(routes::stacks::router())
        .merge(routes::favorites::router())
        .merge(routes::comments::router())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
