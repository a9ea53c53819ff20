//! Provider-facing endpoints: call turns, status callbacks, audio.

use axum::Form;
use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode, header};
use axum::response::{IntoResponse, Response};
use serde::Deserialize;
use tracing::{error, info, warn};

use super::ApiState;
use crate::error::MediaError;
use crate::voice::twiml::{self, VoiceResponse};
use crate::voice::CallTurn;

fn twiml_response(response: VoiceResponse) -> Response {
    ([(header::CONTENT_TYPE, twiml::CONTENT_TYPE)], response.to_xml()).into_response()
}

/// POST /voice/{secret}?service=..&attempt=..
pub async fn voice(
    State(state): State<ApiState>,
    Path(secret): Path<String>,
    Query(turn): Query<CallTurn>,
) -> Response {
    if let Err(e) = state.authorize(Some(secret.as_str())) {
        return e.into_response();
    }
    twiml_response(state.flow.respond(&turn).await)
}

/// Form fields posted by the provider to the status callback.
#[derive(Debug, Default, Deserialize)]
pub struct StatusCallback {
    #[serde(rename = "CallSid", default)]
    pub call_sid: Option<String>,
    #[serde(rename = "Digits", default)]
    pub digits: Option<String>,
    #[serde(rename = "CallStatus", default)]
    pub call_status: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct StatusQuery {
    #[serde(default)]
    pub service: Option<String>,
}

/// POST /status/{secret}?service=..
///
/// Records captured digits and call status. Captured digits end the call
/// with the closing prompt.
pub async fn status(
    State(state): State<ApiState>,
    Path(secret): Path<String>,
    Query(query): Query<StatusQuery>,
    Form(callback): Form<StatusCallback>,
) -> Response {
    if let Err(e) = state.authorize(Some(secret.as_str())) {
        return e.into_response();
    }

    let digits = callback.digits.as_deref().map(str::trim).filter(|d| !d.is_empty());
    let call_status = callback.call_status.as_deref().filter(|s| !s.is_empty());

    if let Some(sid) = callback.call_sid.as_deref() {
        match state.db.update_call(sid, call_status, digits).await {
            Ok(true) => info!(
                call_sid = %sid,
                service = ?query.service,
                status = ?call_status,
                captured = digits.is_some(),
                "Call updated"
            ),
            Ok(false) => warn!(call_sid = %sid, "Status callback for unknown call"),
            Err(e) => error!(call_sid = %sid, error = %e, "Failed to record call status"),
        }
    }

    let response = if digits.is_some() {
        state.flow.closing()
    } else {
        VoiceResponse::new()
    };
    twiml_response(response)
}

/// GET /stream/{key}
pub async fn stream(
    State(state): State<ApiState>,
    Path(key): Path<String>,
    headers: HeaderMap,
) -> Response {
    let range = headers
        .get(header::RANGE)
        .and_then(|v| v.to_str().ok());

    match state.streamer.stream(&key, range).await {
        Ok(media) => media.into_response(),
        Err(MediaError::NotFound(_)) => StatusCode::NOT_FOUND.into_response(),
        Err(e) => {
            error!(key = %key, error = %e, "Failed to stream audio");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}
