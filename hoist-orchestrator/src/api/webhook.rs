//! Webhook API Handler
//!
//! Receives GitHub push notifications. Only `push` events for the tracked
//! branch start a run; everything else is acknowledged and ignored.

use axum::{
    Json,
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode},
};
use hoist_core::dto::webhook::{PushEvent, WebhookAck};
use std::sync::Arc;

use crate::api::error::{ApiError, ApiResult};
use crate::service::run::RunService;

const EVENT_HEADER: &str = "x-github-event";

/// POST /github-webhook/
pub async fn github_webhook(
    State(service): State<Arc<RunService>>,
    headers: HeaderMap,
    body: Bytes,
) -> ApiResult<(StatusCode, Json<WebhookAck>)> {
    let event = headers
        .get(EVENT_HEADER)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("push");

    if event != "push" {
        tracing::debug!("Ignoring {} event", event);
        return Ok((
            StatusCode::ACCEPTED,
            Json(WebhookAck {
                run_id: None,
                ignored: true,
                reason: Some(format!("{event} events do not trigger deploys")),
            }),
        ));
    }

    let push: PushEvent = serde_json::from_slice(&body)
        .map_err(|e| ApiError::BadRequest(format!("invalid push payload: {e}")))?;

    tracing::info!("Push received for {}", push.git_ref);

    let ack = service.handle_push(&push).await?;
    Ok((StatusCode::ACCEPTED, Json(ack)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::test_service;
    use axum::http::HeaderValue;

    fn push_headers() -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(EVENT_HEADER, HeaderValue::from_static("push"));
        headers
    }

    #[tokio::test]
    async fn test_push_to_tracked_branch_queues_run() {
        let (service, mut rx) = test_service();
        let body = Bytes::from_static(br#"{"ref":"refs/heads/main","after":"abc123","repository":{}}"#);

        let (status, Json(ack)) = github_webhook(State(service), push_headers(), body)
            .await
            .unwrap();

        assert_eq!(status, StatusCode::ACCEPTED);
        assert!(!ack.ignored);
        assert_eq!(rx.recv().await, ack.run_id);
    }

    #[tokio::test]
    async fn test_branch_mismatch_is_ignored() {
        let (service, _rx) = test_service();
        let body = Bytes::from_static(br#"{"ref":"refs/heads/dev"}"#);

        let (status, Json(ack)) = github_webhook(State(service.clone()), push_headers(), body)
            .await
            .unwrap();

        assert_eq!(status, StatusCode::ACCEPTED);
        assert!(ack.ignored);
        assert!(service.list_runs().await.is_empty());
    }

    #[tokio::test]
    async fn test_ping_is_ignored() {
        let (service, _rx) = test_service();
        let mut headers = HeaderMap::new();
        headers.insert(EVENT_HEADER, HeaderValue::from_static("ping"));

        let (_, Json(ack)) = github_webhook(State(service), headers, Bytes::from_static(b"{}"))
            .await
            .unwrap();
        assert!(ack.ignored);
    }

    #[tokio::test]
    async fn test_malformed_payload() {
        let (service, _rx) = test_service();
        let result = github_webhook(State(service), push_headers(), Bytes::from_static(b"not json")).await;
        assert!(matches!(result, Err(ApiError::BadRequest(_))));
    }
}
