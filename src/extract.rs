//! Drop-in replacements for axum's `Json`, `Query`, `Path` and `Multipart`
//! whose rejections go through [`ApiError`], so a malformed request gets the
//! same `{ "message": ... }` body and 400 status as any other validation error.

use axum::{
    async_trait,
    extract::{
        multipart::MultipartRejection,
        rejection::{JsonRejection, PathRejection, QueryRejection},
        FromRequest, FromRequestParts, Request,
    },
    http::request::Parts,
    response::{IntoResponse, Response},
};
use serde::{de::DeserializeOwned, Serialize};
use tracing::debug;

use crate::error::ApiError;

impl From<JsonRejection> for ApiError {
    fn from(r: JsonRejection) -> Self {
        debug!(rejection = %r.body_text(), "json body rejected");
        let msg = match r {
            JsonRejection::MissingJsonContentType(_) => "Expected a JSON request body".to_string(),
            JsonRejection::JsonSyntaxError(_) => "Request body is not valid JSON".to_string(),
            other => other.body_text(),
        };
        ApiError::Validation(msg)
    }
}

impl From<QueryRejection> for ApiError {
    fn from(r: QueryRejection) -> Self {
        ApiError::Validation(r.body_text())
    }
}

impl From<PathRejection> for ApiError {
    fn from(r: PathRejection) -> Self {
        ApiError::Validation(r.body_text())
    }
}

impl From<MultipartRejection> for ApiError {
    fn from(r: MultipartRejection) -> Self {
        debug!(rejection = %r.body_text(), "multipart body rejected");
        ApiError::validation("Expected a multipart/form-data request body")
    }
}

pub struct Json<T>(pub T);

#[async_trait]
impl<T, S> FromRequest<S> for Json<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let axum::Json(value) = axum::Json::<T>::from_request(req, state).await?;
        Ok(Self(value))
    }
}

impl<T: Serialize> IntoResponse for Json<T> {
    fn into_response(self) -> Response {
        axum::Json(self.0).into_response()
    }
}

pub struct Query<T>(pub T);

#[async_trait]
impl<T, S> FromRequestParts<S> for Query<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let axum::extract::Query(value) =
            axum::extract::Query::<T>::from_request_parts(parts, state).await?;
        Ok(Self(value))
    }
}

pub struct Path<T>(pub T);

#[async_trait]
impl<T, S> FromRequestParts<S> for Path<T>
where
    T: DeserializeOwned + Send,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let axum::extract::Path(value) =
            axum::extract::Path::<T>::from_request_parts(parts, state).await?;
        Ok(Self(value))
    }
}

/// Fields are still streamed lazily; only the content type is checked here.
pub struct Multipart(pub axum::extract::Multipart);

#[async_trait]
impl<S> FromRequest<S> for Multipart
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        Ok(Self(axum::extract::Multipart::from_request(req, state).await?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{
        body::{to_bytes, Body},
        http::{header, Method, StatusCode},
        routing::{get, post},
        Router,
    };
    use serde::Deserialize;
    use tower::ServiceExt;

    #[derive(Deserialize, Serialize)]
    struct Portion {
        grams: u32,
    }

    fn app() -> Router {
        Router::new()
            .route(
                "/portion",
                post(|Json(p): Json<Portion>| async move { Json(p) })
                    .get(|Query(p): Query<Portion>| async move { Json(p) }),
            )
            .route("/portion/:id", get(|Path(id): Path<i64>| async move { id.to_string() }))
            .route("/upload", post(|_mp: Multipart| async { "ok" }))
    }

    async fn send(req: axum::http::Request<Body>) -> (StatusCode, serde_json::Value) {
        let resp = app().oneshot(req).await.unwrap();
        let status = resp.status();
        let bytes = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    fn post_json(body: &str, content_type: Option<&str>) -> axum::http::Request<Body> {
        let mut req = axum::http::Request::builder().method(Method::POST).uri("/portion");
        if let Some(ct) = content_type {
            req = req.header(header::CONTENT_TYPE, ct);
        }
        req.body(Body::from(body.to_string())).unwrap()
    }

    #[tokio::test]
    async fn valid_json_round_trips() {
        let (status, body) = send(post_json(r#"{"grams":120}"#, Some("application/json"))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["grams"], 120);
    }

    #[tokio::test]
    async fn broken_json_bodies_answer_with_a_message() {
        let cases = [
            post_json(r#"{"grams":"lots"}"#, Some("application/json")),
            post_json("{not json", Some("application/json")),
            post_json(r#"{"grams":120}"#, None),
        ];
        for req in cases {
            let (status, body) = send(req).await;
            assert_eq!(status, StatusCode::BAD_REQUEST);
            assert!(body["message"].as_str().is_some_and(|m| !m.is_empty()));
        }
    }

    #[tokio::test]
    async fn bad_query_and_path_answer_with_a_message() {
        for uri in ["/portion?grams=1&grams=2", "/portion?grams=-4", "/portion/abc"] {
            let req = axum::http::Request::builder().uri(uri).body(Body::empty()).unwrap();
            let (status, body) = send(req).await;
            assert_eq!(status, StatusCode::BAD_REQUEST, "{uri}");
            assert!(body["message"].is_string(), "{uri}");
        }
    }

    #[tokio::test]
    async fn non_multipart_upload_is_a_bad_request() {
        let req = axum::http::Request::builder()
            .method(Method::POST)
            .uri("/upload")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from("{}"))
            .unwrap();
        let (status, body) = send(req).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["message"], "Expected a multipart/form-data request body");
    }
}
