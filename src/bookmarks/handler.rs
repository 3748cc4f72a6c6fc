//! HTTP handlers for bookmarks and tags

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::Value;

use super::Bookmarks;
use crate::error::{ApiError, JsonBody, PathId, QueryParams};
use crate::handler::{Message, Session};
use crate::model::{CreateBookmark, ListParams, UpdateBookmark};

const NOT_FOUND: &str = "Bookmark not found";

pub async fn list_bookmarks(
    QueryParams(params): QueryParams<ListParams>,
    session: Session,
) -> Result<Response, ApiError> {
    let store = Bookmarks::new(&session);

    // `?tag=` with nothing after it lists everything
    let bookmarks = match params.tag.as_deref().filter(|t| !t.is_empty()) {
        Some(tag) => store.list_by_tag(tag, params.skip, params.limit).await?,
        None => store.list(params.skip, params.limit).await?,
    };

    tracing::info!(count = bookmarks.len(), tag = ?params.tag, "listed bookmarks");
    Ok(Json(bookmarks).into_response())
}

pub async fn get_bookmark(PathId(id): PathId<i64>, session: Session) -> Result<Response, ApiError> {
    match Bookmarks::new(&session).get(id).await? {
        Some(bookmark) => Ok(Json(bookmark).into_response()),
        None => Err(ApiError::NotFound(NOT_FOUND)),
    }
}

pub async fn create_bookmark(session: Session, JsonBody(body): JsonBody<Value>) -> Result<Response, ApiError> {
    let input = CreateBookmark::try_from(body)?;
    let bookmark = Bookmarks::new(&session).create(input).await?;

    tracing::info!(id = bookmark.id, "created bookmark");
    Ok((StatusCode::CREATED, Json(bookmark)).into_response())
}

pub async fn update_bookmark(
    PathId(id): PathId<i64>,
    session: Session,
    JsonBody(body): JsonBody<Value>,
) -> Result<Response, ApiError> {
    let input = UpdateBookmark::try_from(body)?;

    match Bookmarks::new(&session).update(id, input).await? {
        Some(bookmark) => {
            tracing::info!(id, "updated bookmark");
            Ok(Json(bookmark).into_response())
        }
        None => Err(ApiError::NotFound(NOT_FOUND)),
    }
}

pub async fn delete_bookmark(PathId(id): PathId<i64>, session: Session) -> Result<Response, ApiError> {
    if !Bookmarks::new(&session).delete(id).await? {
        return Err(ApiError::NotFound(NOT_FOUND));
    }

    tracing::info!(id, "deleted bookmark");
    Ok(Json(Message {
        message: "Bookmark deleted successfully",
    })
    .into_response())
}

pub async fn list_tags(session: Session) -> Result<Response, ApiError> {
    let tags = Bookmarks::new(&session).list_all_tags().await?;
    Ok(Json(tags).into_response())
}
