//! Control plane trigger endpoints
//!
//! `POST /api/trigger/{kind}` with `{"roomId": "...", "payload": {...}}`.
//! Responses are always `{"success": bool, "error"?: string}`.

use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::{HeaderMap, StatusCode},
    Json,
};
use roomcast_shared::RoomId;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use subtle::ConstantTimeEq;

use crate::bridge::TriggerKind;
use crate::error::{ApiError, ApiResult};
use crate::state::AppState;
use crate::websocket::FanOutReport;

/// Header carrying the control plane shared secret
pub const API_KEY_HEADER: &str = "x-api-key";

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TriggerRequest {
    pub room_id: String,
    #[serde(default)]
    pub payload: Value,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct TriggerResponse {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recipients: Option<usize>,
}

/// Trigger a room broadcast of the given event kind
pub async fn trigger(
    State(state): State<AppState>,
    Path(kind): Path<String>,
    headers: HeaderMap,
    request: Result<Json<TriggerRequest>, JsonRejection>,
) -> (StatusCode, Json<TriggerResponse>) {
    match run_trigger(&state, &kind, &headers, request).await {
        Ok(report) => (
            StatusCode::OK,
            Json(TriggerResponse {
                success: true,
                error: None,
                recipients: Some(report.delivered),
            }),
        ),
        Err(e) => {
            tracing::warn!(event = %kind, error = %e, "Control trigger rejected");
            (
                e.status(),
                Json(TriggerResponse {
                    success: false,
                    error: Some(e.to_string()),
                    recipients: None,
                }),
            )
        }
    }
}

async fn run_trigger(
    state: &AppState,
    kind: &str,
    headers: &HeaderMap,
    request: Result<Json<TriggerRequest>, JsonRejection>,
) -> ApiResult<FanOutReport> {
    authorize(state.config.control_api_key.as_deref(), headers)?;
    let kind: TriggerKind = kind.parse()?;
    let Json(request) = request.map_err(|rejection| ApiError::BadRequest(rejection.body_text()))?;

    let report = state
        .bridge
        .trigger(kind, RoomId::new(request.room_id), request.payload)
        .await?;
    Ok(report)
}

/// Check the shared secret when one is configured
fn authorize(expected: Option<&str>, headers: &HeaderMap) -> ApiResult<()> {
    let Some(expected) = expected else {
        return Ok(());
    };
    let provided = headers
        .get(API_KEY_HEADER)
        .and_then(|h| h.to_str().ok())
        .unwrap_or_default();

    // Constant-time comparison
    if bool::from(provided.as_bytes().ct_eq(expected.as_bytes())) {
        Ok(())
    } else {
        Err(ApiError::InvalidApiKey)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::routes::create_router;
    use axum::{body::Body, http::Request};
    use roomcast_shared::UserId;
    use serde_json::json;
    use tokio::sync::mpsc;
    use tower::ServiceExt;

    fn test_config(control_api_key: Option<&str>) -> Config {
        Config {
            bind_address: "127.0.0.1:0".to_string(),
            cors_allowed_origins: Vec::new(),
            jwt_secret: "test-jwt-secret-must-be-at-least-32-characters-long".to_string(),
            jwt_audience: None,
            jwt_leeway_seconds: 60,
            control_api_key: control_api_key.map(str::to_string),
            close_superseded_connections: false,
        }
    }

    fn trigger_request(kind: &str, body: Value, api_key: Option<&str>) -> Request<Body> {
        let mut builder = Request::builder()
            .method("POST")
            .uri(format!("/api/trigger/{kind}"))
            .header("content-type", "application/json");
        if let Some(key) = api_key {
            builder = builder.header(API_KEY_HEADER, key);
        }
        builder.body(Body::from(body.to_string())).unwrap()
    }

    fn raw_trigger_request(kind: &str, body: &'static str) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(format!("/api/trigger/{kind}"))
            .header("content-type", "application/json")
            .body(Body::from(body))
            .unwrap()
    }

    async fn read_body(response: axum::response::Response) -> TriggerResponse {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_trigger_before_router_attached() {
        let state = AppState::new(test_config(None));
        let app = create_router(state);

        let response = app
            .oneshot(trigger_request(
                "game-update",
                json!({ "roomId": "table-7", "payload": {} }),
                None,
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
        let body = read_body(response).await;
        assert!(!body.success);
        assert_eq!(body.error.as_deref(), Some("Broadcast router not initialized"));
    }

    #[tokio::test]
    async fn test_trigger_delivers_to_room() {
        let state = AppState::new(test_config(None));
        state.attach_bridge();

        let (tx, mut rx) = mpsc::unbounded_channel();
        let conn = state
            .relay
            .sessions()
            .connect(UserId::from("alice"), tx)
            .await;
        state
            .relay
            .sessions()
            .join(conn.id, RoomId::from("table-7"))
            .await;
        let _ = rx.try_recv();

        let response = create_router(state)
            .oneshot(trigger_request(
                "player-action",
                json!({ "roomId": "table-7", "payload": { "action": "fold" } }),
                None,
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = read_body(response).await;
        assert!(body.success);
        assert_eq!(body.recipients, Some(1));
        assert!(rx.try_recv().is_ok());
    }

    #[tokio::test]
    async fn test_unknown_kind_and_missing_room() {
        let state = AppState::new(test_config(None));
        state.attach_bridge();
        let app = create_router(state);

        let response = app
            .clone()
            .oneshot(trigger_request("teleport", json!({ "roomId": "x" }), None))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert!(!read_body(response).await.success);

        let response = app
            .oneshot(trigger_request("chat-message", json!({ "roomId": "" }), None))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_api_key_required_when_configured() {
        let state = AppState::new(test_config(Some("bridge-secret")));
        state.attach_bridge();
        let app = create_router(state);
        let body = json!({ "roomId": "table-7", "payload": {} });

        let response = app
            .clone()
            .oneshot(trigger_request("room-notice", body.clone(), None))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

        let response = app
            .clone()
            .oneshot(trigger_request("room-notice", body.clone(), Some("wrong")))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

        let response = app
            .oneshot(trigger_request("room-notice", body, Some("bridge-secret")))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_malformed_body_gets_json_failure() {
        let state = AppState::new(test_config(None));
        state.attach_bridge();
        let app = create_router(state);

        let response = app
            .clone()
            .oneshot(trigger_request("game-update", json!({ "payload": {} }), None))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = read_body(response).await;
        assert!(!body.success);
        assert!(body.error.unwrap().contains("roomId"));

        let response = app
            .oneshot(raw_trigger_request("game-update", "not json"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = read_body(response).await;
        assert!(!body.success);
        assert!(body.error.is_some());
    }

    #[tokio::test]
    async fn test_api_key_checked_before_body() {
        let state = AppState::new(test_config(Some("bridge-secret")));
        state.attach_bridge();

        let response = create_router(state)
            .oneshot(raw_trigger_request("game-update", "not json"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert!(!read_body(response).await.success);
    }
}
