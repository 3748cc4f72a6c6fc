use axum::{Router, routing::get};
use tower_http::cors::CorsLayer;

use crate::handler::{AppState, welcome};

pub mod bookmarks;
pub mod config;
pub mod db;
pub mod error;
pub mod handler;
pub mod model;

/// Builds the full router. CORS is wide open: any origin, method and header,
/// with credentials allowed.
pub fn app(state: AppState) -> Router {
    Router::new()
        .route("/", get(welcome))
        .merge(bookmarks::routes())
        .layer(CorsLayer::very_permissive())
        .with_state(state)
}
