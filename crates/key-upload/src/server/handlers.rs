//! Axum request handlers for all service endpoints.

use axum::{
    extract::State,
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use bytes::Bytes;
use common::protocol::{ErrorResponse, EventRequest, HealthResponse, PROTOBUF_CONTENT_TYPE};
use prost::Message;
use tracing::{debug, error};

use super::state::AppState;

/// `POST /upload`: decrypt, validate and store a sealed diagnosis key batch.
///
/// The body is an encoded `EncryptedUploadRequest`; the reply is always an
/// encoded `EncryptedUploadResponse` whose error code matches the status.
pub async fn upload(State(state): State<AppState>, body: Bytes) -> Response {
    let reply = state.pipeline.handle(&body).await;
    let status = StatusCode::from_u16(reply.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    (
        status,
        [(header::CONTENT_TYPE, PROTOBUF_CONTENT_TYPE)],
        reply.response.encode_to_vec(),
    )
        .into_response()
}

/// `POST /events`: count a one-time-key lifecycle event.
///
/// Requires `Authorization: Bearer <token>`; the token attributes the event to
/// a region. The token is checked before the body is parsed.
pub async fn events(State(state): State<AppState>, headers: HeaderMap, body: Bytes) -> Response {
    let Some(token) = bearer_token(&headers) else {
        let err = ErrorResponse::new("unauthorized", "missing bearer token");
        return (StatusCode::UNAUTHORIZED, Json(err)).into_response();
    };

    let req: EventRequest = match serde_json::from_slice(&body) {
        Ok(req) => req,
        Err(e) => {
            debug!(error = %e, "malformed event body");
            let err = ErrorResponse::new("bad_request", "malformed event body");
            return (StatusCode::BAD_REQUEST, Json(err)).into_response();
        }
    };

    match state.events.record(&req, token).await {
        Ok(_) => StatusCode::OK.into_response(),
        Err(e) if e.is_invalid_event() => {
            let err = ErrorResponse::new("bad_request", e.to_string());
            (StatusCode::BAD_REQUEST, Json(err)).into_response()
        }
        Err(e) => {
            error!(error = %e, "event store failure");
            let err = ErrorResponse::new("internal_error", "unable to record event");
            (StatusCode::INTERNAL_SERVER_ERROR, Json(err)).into_response()
        }
    }
}

/// `GET /health`: liveness check.
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".into(),
    })
}

/// Catch-all 404 handler.
pub async fn not_found() -> impl IntoResponse {
    let err = ErrorResponse::new("not_found", "the requested resource does not exist");
    (StatusCode::NOT_FOUND, Json(err))
}

fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|t| !t.is_empty())
}
