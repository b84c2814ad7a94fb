/// Request extractors with JSON error bodies
///
/// Drop-in replacements for axum's `Json`, `Path` and `Query`. axum's own
/// rejections are plain text (and 422 for a body that parses but has the
/// wrong shape); these route every rejection through [`ApiError`] so clients
/// always get `{ "error", "message" }` and a 400.

use crate::error::ApiError;
use axum::extract::{
    rejection::{JsonRejection, PathRejection, QueryRejection},
    FromRequest, FromRequestParts,
};
use serde::de::DeserializeOwned;

/// JSON request body
#[derive(Debug, FromRequest)]
#[from_request(via(axum::Json), rejection(ApiError))]
pub struct ApiJson<T>(pub T);

#[derive(Debug, FromRequestParts)]
#[from_request(via(axum::extract::Path), rejection(ApiError))]
pub struct ApiPath<T>(pub T);

#[derive(Debug, FromRequestParts)]
#[from_request(via(axum::extract::Query), rejection(ApiError))]
pub struct ApiQuery<T>(pub T);

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

impl From<PathRejection> for ApiError {
    fn from(rejection: PathRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

/// Parses an optional JSON body
///
/// An empty body yields `T::default()`. Anything else must parse.
pub fn optional_json<T>(body: &[u8]) -> Result<T, ApiError>
where
    T: DeserializeOwned + Default,
{
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(T::default());
    }
    serde_json::from_slice(body)
        .map_err(|e| ApiError::BadRequest(format!("Invalid JSON body: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{
        body::Body,
        http::{header, Request, StatusCode},
        response::IntoResponse,
    };
    use serde::Deserialize;

    #[derive(Debug, Default, Deserialize, PartialEq)]
    struct Cancel {
        reason: Option<String>,
        #[serde(default)]
        early_cancel: bool,
    }

    async fn body_json(err: ApiError) -> (StatusCode, serde_json::Value) {
        let response = err.into_response();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn test_missing_field_is_json_bad_request() {
        let request = Request::builder()
            .method("POST")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from("{}"))
            .unwrap();

        #[derive(Debug, Deserialize)]
        #[allow(dead_code)]
        struct Needs {
            email: String,
        }

        let err = ApiJson::<Needs>::from_request(request, &()).await.unwrap_err();
        let (status, body) = body_json(err).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "bad_request");
        assert!(body["message"].as_str().unwrap().contains("email"));
    }

    #[tokio::test]
    async fn test_malformed_json_is_json_bad_request() {
        let request = Request::builder()
            .method("POST")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from("{not json"))
            .unwrap();

        let err = ApiJson::<Cancel>::from_request(request, &()).await.unwrap_err();
        let (status, body) = body_json(err).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "bad_request");
    }

    #[test]
    fn test_optional_json() {
        assert_eq!(optional_json::<Cancel>(b"").unwrap(), Cancel::default());
        assert_eq!(optional_json::<Cancel>(b"  \n").unwrap(), Cancel::default());
        assert_eq!(
            optional_json::<Cancel>(br#"{"early_cancel":true}"#).unwrap(),
            Cancel {
                reason: None,
                early_cancel: true
            }
        );
        assert!(optional_json::<Cancel>(br#"{"early_cancel":"yes"}"#).is_err());
        assert!(optional_json::<Cancel>(br#"{"reason":5}"#).is_err());
    }
}
