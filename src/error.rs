use axum::{
    Json,
    extract::{
        FromRequest, FromRequestParts,
        rejection::{JsonRejection, PathRejection, QueryRejection},
    },
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;

/// One failing input field, reported back under `detail`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FieldError {
    pub loc: Vec<String>,
    pub msg: String,
    #[serde(rename = "type")]
    pub kind: &'static str,
}

impl FieldError {
    pub fn new(source: &str, path: &[&str], msg: &str, kind: &'static str) -> Self {
        let mut loc = vec![source.to_string()];
        loc.extend(path.iter().map(|p| p.to_string()));
        FieldError {
            loc,
            msg: msg.to_string(),
            kind,
        }
    }

    pub fn body(path: &[&str], msg: &str, kind: &'static str) -> Self {
        Self::new("body", path, msg, kind)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("{0}")]
    NotFound(&'static str),
    #[error("request validation failed")]
    Validation(Vec<FieldError>),
    #[error(transparent)]
    Storage(#[from] anyhow::Error),
}

#[derive(Serialize)]
struct ErrorBody<T: Serialize> {
    detail: T,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, Json(ErrorBody { detail: msg })).into_response(),
            ApiError::Validation(errors) => {
                tracing::debug!(?errors, "rejected request");
                (StatusCode::UNPROCESSABLE_ENTITY, Json(ErrorBody { detail: errors })).into_response()
            }
            ApiError::Storage(e) => {
                tracing::error!(error = %format!("{e:#}"), "storage failure");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(ErrorBody {
                        detail: "Internal Server Error",
                    }),
                )
                    .into_response()
            }
        }
    }
}

impl From<Vec<FieldError>> for ApiError {
    fn from(errors: Vec<FieldError>) -> Self {
        ApiError::Validation(errors)
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        let kind = match rejection {
            JsonRejection::JsonSyntaxError(_) => "json_invalid",
            JsonRejection::MissingJsonContentType(_) => "content_type",
            _ => "value_error",
        };
        ApiError::Validation(vec![FieldError::body(&[], &rejection.body_text(), kind)])
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        ApiError::Validation(vec![FieldError::new("query", &[], &rejection.body_text(), "type_error")])
    }
}

impl From<PathRejection> for ApiError {
    fn from(rejection: PathRejection) -> Self {
        ApiError::Validation(vec![FieldError::new(
            "path",
            &["bookmark_id"],
            &rejection.body_text(),
            "type_error",
        )])
    }
}

/// `axum::Json` whose rejection is a 422 in the service's error shape.
#[derive(FromRequest)]
#[from_request(via(axum::Json), rejection(ApiError))]
pub struct JsonBody<T>(pub T);

#[derive(FromRequestParts)]
#[from_request(via(axum::extract::Query), rejection(ApiError))]
pub struct QueryParams<T>(pub T);

#[derive(FromRequestParts)]
#[from_request(via(axum::extract::Path), rejection(ApiError))]
pub struct PathId<T>(pub T);

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;
    use serde_json::{Value, json};

    async fn render(err: ApiError) -> (StatusCode, Value) {
        let response = err.into_response();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn test_not_found_body() {
        let (status, body) = render(ApiError::NotFound("Bookmark not found")).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body, json!({ "detail": "Bookmark not found" }));
    }

    #[tokio::test]
    async fn test_validation_body_lists_fields() {
        let err = ApiError::from(vec![FieldError::body(&["url"], "bad", "url_parsing")]);
        let (status, body) = render(err).await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(
            body,
            json!({ "detail": [{ "loc": ["body", "url"], "msg": "bad", "type": "url_parsing" }] })
        );
    }

    #[tokio::test]
    async fn test_storage_error_hides_internals() {
        let (status, body) = render(ApiError::from(anyhow::anyhow!("disk I/O error at /var/lib/db"))).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body, json!({ "detail": "Internal Server Error" }));
    }
}
