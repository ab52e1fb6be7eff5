//! Channel connector transport.
//!
//! Connectors post raw platform events here. The handler runs dedupe and
//! (for Slack) request-signature verification, then hands the event to the
//! channel boundary for normalization and to the turn loop for execution.

use std::sync::Arc;

use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Json, Response};
use chrono::Utc;

use ar_channels::boundary::ChannelBoundary;
use ar_channels::slack::verify_slack_signature;
use ar_domain::envelope::InboundEnvelope;
use ar_domain::error::{ChannelErrorCode, Error, RouteErrorCode};

use crate::runtime::turn::handle_envelope;
use crate::state::AppState;

pub async fn telegram(
    State(state): State<AppState>,
    Json(raw): Json<serde_json::Value>,
) -> Response {
    if let Some(message_id) = id_like(raw.get("message_id")) {
        if state
            .dedupe
            .check_and_insert(&format!("telegram:{message_id}"))
        {
            return deduped_response();
        }
    }

    let envelope = match state.telegram.normalize_inbound(&raw) {
        Ok(envelope) => envelope,
        Err(e) => return error_response(e),
    };
    let boundary: Arc<dyn ChannelBoundary> = state.telegram.clone();
    run_turn(state, boundary, envelope).await
}

pub async fn slack(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: String,
) -> Response {
    // Verify the request signature when a signing secret is configured.
    if let Ok(secret) = std::env::var(&state.config.channels.slack.signing_secret_env) {
        let timestamp = header_str(&headers, "x-slack-request-timestamp");
        let signature = header_str(&headers, "x-slack-signature");
        if let Err(e) = verify_slack_signature(
            &secret,
            timestamp,
            &body,
            signature,
            Utc::now().timestamp(),
        ) {
            return error_response(e);
        }
    }

    let raw: serde_json::Value = match serde_json::from_str(&body) {
        Ok(raw) => raw,
        Err(_) => {
            return error_response(Error::channel(
                ChannelErrorCode::InvalidPayload,
                "request body is not JSON",
            ));
        }
    };

    if let Some(event_id) = raw.get("event_id").and_then(|v| v.as_str()) {
        if state.dedupe.check_and_insert(&format!("slack:{event_id}")) {
            return deduped_response();
        }
    }

    let envelope = match state.slack.normalize_inbound(&raw) {
        Ok(envelope) => envelope,
        Err(e) => return error_response(e),
    };
    let boundary: Arc<dyn ChannelBoundary> = state.slack.clone();
    run_turn(state, boundary, envelope).await
}

async fn run_turn(
    state: AppState,
    boundary: Arc<dyn ChannelBoundary>,
    envelope: InboundEnvelope,
) -> Response {
    match handle_envelope(&state, boundary, envelope).await {
        Ok(outcome) => Json(serde_json::json!({
            "accepted": true,
            "session_key": outcome.session_key,
            "steered": outcome.steered,
            "provider_id": outcome.provider_id,
            "reply": outcome.reply,
            "message_id": outcome.delivered_message_id,
        }))
        .into_response(),
        Err(e) => error_response(e),
    }
}

fn deduped_response() -> Response {
    Json(serde_json::json!({"accepted": true, "deduped": true})).into_response()
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> &'a str {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("")
}

fn id_like(value: Option<&serde_json::Value>) -> Option<String> {
    match value? {
        serde_json::Value::String(s) if !s.is_empty() => Some(s.clone()),
        serde_json::Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Map a boundary error to an HTTP response.
fn error_response(e: Error) -> Response {
    let status = match &e {
        Error::Channel { code, .. } => match code {
            ChannelErrorCode::InvalidPayload => StatusCode::BAD_REQUEST,
            ChannelErrorCode::Unauthorized => StatusCode::UNAUTHORIZED,
            ChannelErrorCode::RateLimited => StatusCode::TOO_MANY_REQUESTS,
            ChannelErrorCode::Unavailable => StatusCode::SERVICE_UNAVAILABLE,
        },
        Error::Identity { .. } => StatusCode::BAD_REQUEST,
        Error::Routing { code, .. } => match code {
            RouteErrorCode::InvalidInput => StatusCode::BAD_REQUEST,
            RouteErrorCode::Forbidden => StatusCode::FORBIDDEN,
            RouteErrorCode::NotFound => StatusCode::NOT_FOUND,
        },
        Error::Provider { .. } => StatusCode::BAD_GATEWAY,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };

    let mut body = serde_json::json!({"error": e.to_string()});
    if let Error::Channel {
        retry_after_seconds: Some(secs),
        ..
    } = &e
    {
        body["retry_after_seconds"] = (*secs).into();
    }

    (status, Json(body)).into_response()
}
