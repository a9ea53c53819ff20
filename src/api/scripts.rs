//! Script management endpoints.

use axum::Json;
use axum::extract::State;
use axum::extract::rejection::JsonRejection;
use serde::Deserialize;

use super::{ApiError, ApiState};
use crate::scripts::ScriptKind;

#[derive(Debug, Deserialize)]
pub struct CreateScriptRequest {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default, rename = "type")]
    pub kind: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct NamedScriptRequest {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct AuthOnly {
    #[serde(default)]
    pub password: Option<String>,
}

fn required<'a>(value: &'a Option<String>, what: &str) -> Result<&'a str, ApiError> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .ok_or_else(|| ApiError::Validation(format!("{what} is required")))
}

/// POST /script
pub async fn create(
    State(state): State<ApiState>,
    body: Result<Json<CreateScriptRequest>, JsonRejection>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let Json(req) = body?;
    state.authorize(req.password.as_deref())?;

    let name = required(&req.name, "Script name")?;
    let kind: ScriptKind = required(&req.kind, "Script type")?
        .parse()
        .map_err(ApiError::Validation)?;
    let message = required(&req.message, "Script message")?;

    let script = state.scripts.create(name, kind, message).await?;
    Ok(Json(serde_json::json!({
        "success": true,
        "script": script,
    })))
}

/// POST /scripts
pub async fn list(
    State(state): State<ApiState>,
    body: Result<Json<AuthOnly>, JsonRejection>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let Json(req) = body?;
    state.authorize(req.password.as_deref())?;

    let scripts = state.scripts.list().await?;
    Ok(Json(serde_json::json!({
        "success": true,
        "scripts": scripts,
    })))
}

/// POST /script/get
pub async fn get(
    State(state): State<ApiState>,
    body: Result<Json<NamedScriptRequest>, JsonRejection>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let Json(req) = body?;
    state.authorize(req.password.as_deref())?;
    let name = required(&req.name, "Script name")?;

    let script = state.scripts.get(name).await?;
    Ok(Json(serde_json::json!({
        "success": true,
        "script": script,
    })))
}

/// POST /script/delete
pub async fn delete(
    State(state): State<ApiState>,
    body: Result<Json<NamedScriptRequest>, JsonRejection>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let Json(req) = body?;
    state.authorize(req.password.as_deref())?;
    let name = required(&req.name, "Script name")?;

    let script = state.scripts.delete(name).await?;
    Ok(Json(serde_json::json!({
        "success": true,
        "message": format!("Script '{}' deleted", script.name),
        "script": script,
    })))
}
