use std::sync::Arc;

use axum::{
    Json,
    async_trait,
    extract::FromRequestParts,
    http::request::Parts,
    response::IntoResponse,
};
use serde::Serialize;

use tracing::info;

pub use crate::db::Session;

use crate::db::Database;
use crate::error::ApiError;

#[derive(Clone)]
pub struct AppState {
    pub db: Arc<Database>,
}

/// Opens a storage session for the current request. It is released when the
/// handler returns, whether it succeeded or not.
#[async_trait]
impl FromRequestParts<AppState> for Session {
    type Rejection = ApiError;

    async fn from_request_parts(_parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        Ok(state.db.session()?)
    }
}

#[derive(Debug, Serialize)]
pub struct Message {
    pub message: &'static str,
}

pub async fn welcome() -> impl IntoResponse {
    info!("got welcome request");
    Json(Message {
        message: "Welcome to BookmarkHub API",
    })
}
