//! Dispatch endpoints: place a call, send an SMS, look up a call.

use axum::Json;
use axum::extract::State;
use axum::extract::rejection::JsonRejection;
use chrono::Utc;
use serde::Deserialize;
use tracing::{error, info};

use super::{ApiError, ApiState};
use crate::assets::BuiltinService;
use crate::dispatch::normalize_phone;
use crate::scripts::model::{CallRecord, ScriptKind, SmsRecord};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CallRequest {
    #[serde(default)]
    pub to: Option<String>,
    #[serde(default)]
    pub service: Option<String>,
    #[serde(default)]
    pub script_name: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SmsRequest {
    #[serde(default)]
    pub to: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub script_name: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct GetCallRequest {
    #[serde(default)]
    pub sid: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

fn destination(to: Option<&str>) -> Result<String, ApiError> {
    let to = non_empty(to).ok_or_else(|| ApiError::Validation("Missing \"to\"".into()))?;
    normalize_phone(to).ok_or_else(|| ApiError::Validation(format!("Invalid phone number: {to}")))
}

/// POST /call
pub async fn place_call(
    State(state): State<ApiState>,
    body: Result<Json<CallRequest>, JsonRejection>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let Json(req) = body?;
    state.authorize(req.password.as_deref())?;

    let missing = || {
        ApiError::Validation(
            "Missing required parameters. Need \"to\" and either \"service\" or \"scriptName\"."
                .into(),
        )
    };
    non_empty(req.to.as_deref()).ok_or_else(missing)?;
    let to = destination(req.to.as_deref())?;

    let key = if let Some(name) = non_empty(req.script_name.as_deref()) {
        match state.db.get_script(name).await? {
            Some(script) if script.kind == ScriptKind::Call => script.name,
            _ => {
                return Err(ApiError::NotFound(
                    "Script not found or not a call script".into(),
                ));
            }
        }
    } else {
        let service = non_empty(req.service.as_deref()).ok_or_else(missing)?;
        BuiltinService::from_key(service)
            .map(|s| s.key().to_string())
            .ok_or_else(|| ApiError::Validation(format!("Unknown service: {service}")))?
    };

    let placement = state.dispatcher()?.place_call(&to, &key).await?;

    let record = CallRecord::new(&placement.sid, &to, &key, &placement.status);
    if let Err(e) = state.db.insert_call(&record).await {
        error!(call_sid = %placement.sid, error = %e, "Failed to save call");
    }
    info!(call_sid = %placement.sid, key = %key, "Call initiated");

    Ok(Json(serde_json::json!({
        "success": true,
        "sid": placement.sid,
        "to": placement.to,
        "from": placement.from,
        "status": placement.status,
    })))
}

/// POST /sms
pub async fn send_sms(
    State(state): State<ApiState>,
    body: Result<Json<SmsRequest>, JsonRejection>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let Json(req) = body?;
    state.authorize(req.password.as_deref())?;
    let to = destination(req.to.as_deref())?;

    let (message, script) = match non_empty(req.script_name.as_deref()) {
        Some(name) => match state.db.get_script(name).await? {
            Some(script) if script.kind == ScriptKind::Sms => (script.message, Some(script.name)),
            _ => {
                return Err(ApiError::NotFound(
                    "Script not found or not an SMS script".into(),
                ));
            }
        },
        None => {
            let message = non_empty(req.message.as_deref()).ok_or_else(|| {
                ApiError::Validation(
                    "Missing required parameters. Need \"to\" and either \"message\" or \"scriptName\"."
                        .into(),
                )
            })?;
            (message.to_string(), None)
        }
    };

    let placement = state.dispatcher()?.send_sms(&to, &message).await?;

    let record = SmsRecord {
        sid: placement.sid.clone(),
        destination: to,
        service: script,
        status: placement.status.clone(),
        message,
        created_at: Utc::now(),
    };
    if let Err(e) = state.db.insert_sms(&record).await {
        error!(sms_sid = %placement.sid, error = %e, "Failed to save SMS");
    }

    Ok(Json(serde_json::json!({
        "success": true,
        "sid": placement.sid,
        "to": placement.to,
        "from": placement.from,
        "status": placement.status,
    })))
}

/// POST /get
pub async fn get_call(
    State(state): State<ApiState>,
    body: Result<Json<GetCallRequest>, JsonRejection>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let Json(req) = body?;
    state.authorize(req.password.as_deref())?;
    let sid = non_empty(req.sid.as_deref())
        .ok_or_else(|| ApiError::Validation("Missing \"sid\"".into()))?;

    let call = state
        .db
        .get_call(sid)
        .await?
        .ok_or_else(|| ApiError::NotFound("Call not found".into()))?;

    Ok(Json(serde_json::json!({
        "success": true,
        "call": call,
    })))
}
