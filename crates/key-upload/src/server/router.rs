//! Axum router construction.

use std::time::Duration;

use axum::{
    routing::{get, post},
    Router,
};
use tower_http::{
    compression::CompressionLayer,
    timeout::TimeoutLayer,
    trace::{DefaultOnFailure, TraceLayer},
};
use tracing::Level;

use super::{handlers, state::AppState};

/// Build the application [`Router`] with all routes and middleware attached.
pub fn build(state: AppState, request_timeout: Duration) -> Router {
    Router::new()
        .route("/upload", post(handlers::upload))
        .route("/events", post(handlers::events))
        .route("/health", get(handlers::health))
        .fallback(handlers::not_found)
        // handlers log their own failures
        .layer(TraceLayer::new_for_http().on_failure(DefaultOnFailure::new().level(Level::DEBUG)))
        .layer(TimeoutLayer::new(request_timeout))
        .layer(CompressionLayer::new())
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use axum::{body::Body, http::Request, response::Response};
    use chrono::Utc;
    use common::protocol::{
        EncryptedUploadRequest, EncryptedUploadResponse, ErrorCode, TemporaryExposureKey, Upload,
        PROTOBUF_CONTENT_TYPE,
    };
    use prost::Message;
    use tower::ServiceExt;

    use crate::crypto::sealed_box::{generate_keypair, random_nonce, seal};
    use crate::events::{EventLogger, MemoryEventStore, TokenTable};
    use crate::server::middleware::REQUEST_TIMEOUT;
    use crate::store::memory::{MemoryKeyStore, QuotaPolicy};
    use crate::store::MockKeyStore;
    use crate::testing::capture_logs;
    use crate::upload::UploadPipeline;

    struct Harness {
        app: Router,
        keys: MemoryKeyStore,
        server_public_key: [u8; 32],
    }

    async fn harness() -> Harness {
        let keys = MemoryKeyStore::new(QuotaPolicy {
            max_keys: 28,
            window: Duration::from_secs(15 * 24 * 3600),
        });
        let server_public_key = keys.generate_server_keypair().await;
        let tokens = TokenTable::parse("thisisatoken=ON").unwrap();
        let state = AppState::new(
            UploadPipeline::new(Arc::new(keys.clone()), Duration::from_secs(3600)),
            EventLogger::new(Arc::new(tokens), Arc::new(MemoryEventStore::new())),
        );
        Harness {
            app: build(state, REQUEST_TIMEOUT),
            keys,
            server_public_key,
        }
    }

    fn keys(count: usize) -> Vec<TemporaryExposureKey> {
        (0..count)
            .map(|i| TemporaryExposureKey {
                key_data: Some(vec![i as u8; 16]),
                transmission_risk_level: Some(3),
                rolling_start_interval_number: Some(2651450 - i as i32 * 144),
                rolling_period: Some(144),
            })
            .collect()
    }

    fn sealed_upload(server_public_key: &[u8], upload: &Upload) -> Vec<u8> {
        let app = generate_keypair();
        let nonce = random_nonce();
        let payload = seal(&upload.encode_to_vec(), &nonce, server_public_key, &app.secret).unwrap();
        EncryptedUploadRequest {
            server_public_key: server_public_key.to_vec(),
            app_public_key: app.public.to_vec(),
            nonce: nonce.to_vec(),
            payload,
        }
        .encode_to_vec()
    }

    fn upload_now(count: usize) -> Upload {
        Upload {
            timestamp: Some(prost_types::Timestamp {
                seconds: Utc::now().timestamp(),
                nanos: 0,
            }),
            keys: keys(count),
        }
    }

    async fn post_upload(app: Router, body: Vec<u8>) -> (u16, ErrorCode) {
        let req = Request::builder()
            .method("POST")
            .uri("/upload")
            .header("content-type", PROTOBUF_CONTENT_TYPE)
            .body(Body::from(body))
            .unwrap();
        let resp = app.oneshot(req).await.unwrap();
        let status = resp.status().as_u16();
        assert_eq!(
            resp.headers().get("content-type").unwrap(),
            PROTOBUF_CONTENT_TYPE
        );
        let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        let decoded = EncryptedUploadResponse::decode(bytes).unwrap();
        (status, decoded.error())
    }

    async fn post_event(app: Router, auth: Option<&str>, body: &str) -> Response {
        let mut req = Request::builder()
            .method("POST")
            .uri("/events")
            .header("content-type", "application/json");
        if let Some(auth) = auth {
            req = req.header("authorization", auth);
        }
        app.oneshot(req.body(Body::from(body.to_owned())).unwrap())
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn unknown_route_returns_404() {
        let app = build(AppState::default(), REQUEST_TIMEOUT);
        let req = Request::builder()
            .uri("/unknown")
            .body(Body::empty())
            .unwrap();
        let resp = app.oneshot(req).await.unwrap();
        assert_eq!(resp.status(), 404);
    }

    #[tokio::test]
    async fn health_route_exists() {
        let app = build(AppState::default(), REQUEST_TIMEOUT);
        let req = Request::builder()
            .uri("/health")
            .body(Body::empty())
            .unwrap();
        let resp = app.oneshot(req).await.unwrap();
        assert_eq!(resp.status(), 200);
    }

    #[tokio::test]
    async fn valid_upload_is_stored() {
        let h = harness().await;
        let body = sealed_upload(&h.server_public_key, &upload_now(14));

        assert_eq!(post_upload(h.app, body).await, (200, ErrorCode::None));
        assert_eq!(h.keys.diagnosis_keys().await.len(), 14);
    }

    #[tokio::test]
    async fn garbage_body_is_unknown() {
        let h = harness().await;
        assert_eq!(
            post_upload(h.app, b"sd".to_vec()).await,
            (400, ErrorCode::Unknown)
        );
    }

    #[tokio::test]
    async fn unknown_server_key_is_unauthorized() {
        let h = harness().await;
        let body = sealed_upload(&generate_keypair().public, &upload_now(1));
        assert_eq!(
            post_upload(h.app, body).await,
            (401, ErrorCode::InvalidKeypair)
        );
    }

    #[tokio::test]
    async fn empty_upload_has_no_keys() {
        let h = harness().await;
        let body = sealed_upload(&h.server_public_key, &upload_now(0));
        assert_eq!(
            post_upload(h.app, body).await,
            (400, ErrorCode::NoKeysInPayload)
        );
    }

    #[tokio::test]
    async fn oversized_upload_is_rejected_unstored() {
        let h = harness().await;
        let mut upload = upload_now(29);
        upload
            .keys
            .iter_mut()
            .for_each(|k| k.rolling_start_interval_number = Some(2651450));
        let body = sealed_upload(&h.server_public_key, &upload);

        assert_eq!(
            post_upload(h.app, body).await,
            (400, ErrorCode::TooManyKeys)
        );
        assert!(h.keys.diagnosis_keys().await.is_empty());
    }

    #[tokio::test]
    async fn stale_timestamp_is_rejected() {
        let h = harness().await;
        let mut upload = upload_now(1);
        upload.timestamp = Some(prost_types::Timestamp {
            seconds: Utc::now().timestamp() - 7200,
            nanos: 0,
        });
        let body = sealed_upload(&h.server_public_key, &upload);
        assert_eq!(
            post_upload(h.app, body).await,
            (400, ErrorCode::InvalidTimestamp)
        );
    }

    #[tokio::test]
    async fn event_requires_bearer_token() {
        let h = harness().await;
        let body = r#"{"identifier":"OTKClaimed","device_type":"iOS","date":"2020-09-01","count":1}"#;
        let resp = post_event(h.app, None, body).await;
        assert_eq!(resp.status(), 401);
    }

    #[tokio::test]
    async fn valid_event_is_accepted() {
        let h = harness().await;
        let body = r#"{"identifier":"OTKClaimed","device_type":"iOS","date":"2020-09-01","count":1}"#;
        let resp = post_event(h.app, Some("Bearer thisisatoken"), body).await;
        assert_eq!(resp.status(), 200);
    }

    #[tokio::test]
    async fn invalid_event_is_bad_request() {
        let h = harness().await;
        let body = r#"{"identifier":"OTKClaimed","device_type":"Nokia","date":"2020-09-01","count":1}"#;
        let resp = post_event(h.app, Some("Bearer thisisatoken"), body).await;
        assert_eq!(resp.status(), 400);

        let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        let err: common::protocol::ErrorResponse = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(err.message, "invalid Device Type: (Nokia)");
    }

    #[tokio::test]
    async fn server_error_upload_logs_one_error_line() {
        let (logs, _guard) = capture_logs();
        let mut store = MockKeyStore::new();
        store
            .expect_private_key_for()
            .times(1)
            .returning(|_| Ok(vec![0u8; 16]));
        let state = AppState::new(
            UploadPipeline::new(Arc::new(store), Duration::from_secs(3600)),
            EventLogger::new(Arc::new(TokenTable::new()), Arc::new(MemoryEventStore::new())),
        );
        let body = EncryptedUploadRequest {
            server_public_key: vec![1u8; 32],
            app_public_key: vec![2u8; 32],
            nonce: vec![3u8; 24],
            payload: vec![4u8; 48],
        }
        .encode_to_vec();

        assert_eq!(
            post_upload(build(state, REQUEST_TIMEOUT), body).await,
            (500, ErrorCode::ServerError)
        );
        assert_eq!(logs.count("ERROR", ""), 1);
        assert_eq!(logs.count("ERROR", "server private key was not expected length"), 1);
    }

    #[tokio::test]
    async fn event_token_checked_before_body() {
        let h = harness().await;
        let resp = post_event(h.app, None, "{}").await;
        assert_eq!(resp.status(), 401);
    }

    #[tokio::test]
    async fn malformed_event_body_is_bad_request() {
        let h = harness().await;
        let resp = post_event(h.app, Some("Bearer thisisatoken"), "{}").await;
        assert_eq!(resp.status(), 400);

        let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        let err: common::protocol::ErrorResponse = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(err.code, "bad_request");
    }
}
