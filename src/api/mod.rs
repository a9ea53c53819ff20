//! HTTP surface — provider webhooks, audio streaming, dispatch and script
//! management.

pub mod calls;
pub mod error;
pub mod scripts;
pub mod voice;

use std::sync::Arc;

use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use secrecy::{ExposeSecret, SecretString};
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::assets::AssetResolver;
use crate::config::ServerConfig;
use crate::dispatch::CallDispatcher;
use crate::media::MediaStreamer;
use crate::scripts::{ScriptService, SpeechSynthesizer};
use crate::store::Database;
use crate::voice::CallFlowEngine;

pub use error::ApiError;

/// Application state shared across handlers.
#[derive(Clone)]
pub struct ApiState {
    pub password: SecretString,
    pub db: Arc<dyn Database>,
    pub flow: Arc<CallFlowEngine>,
    pub streamer: Arc<MediaStreamer>,
    pub scripts: Arc<ScriptService>,
    /// None when no telephony provider is configured.
    pub dispatcher: Option<Arc<dyn CallDispatcher>>,
}

impl ApiState {
    /// Wire the engines around shared storage and assets.
    pub fn new(
        config: &ServerConfig,
        db: Arc<dyn Database>,
        assets: Arc<AssetResolver>,
        synthesizer: Option<Arc<dyn SpeechSynthesizer>>,
        dispatcher: Option<Arc<dyn CallDispatcher>>,
    ) -> Self {
        Self {
            password: config.api_password.clone(),
            flow: Arc::new(CallFlowEngine::new(config, assets.clone(), db.clone())),
            streamer: Arc::new(MediaStreamer::new(assets.clone(), db.clone())),
            scripts: Arc::new(ScriptService::new(db.clone(), assets, synthesizer)),
            db,
            dispatcher,
        }
    }

    /// Check a presented password or path secret.
    pub fn authorize(&self, presented: Option<&str>) -> Result<(), ApiError> {
        match presented {
            Some(p) if p == self.password.expose_secret() => Ok(()),
            _ => Err(ApiError::Unauthorized),
        }
    }

    pub fn dispatcher(&self) -> Result<&Arc<dyn CallDispatcher>, ApiError> {
        self.dispatcher
            .as_ref()
            .ok_or_else(|| crate::error::DispatchError::NotConfigured.into())
    }
}

/// Build the router with every route and the tracing/CORS layers.
pub fn router(state: ApiState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/voice/{secret}", post(voice::voice))
        .route("/status/{secret}", post(voice::status))
        .route("/stream/{key}", get(voice::stream))
        .route("/call", post(calls::place_call))
        .route("/sms", post(calls::send_sms))
        .route("/get", post(calls::get_call))
        .route("/script", post(scripts::create))
        .route("/scripts", post(scripts::list))
        .route("/script/get", post(scripts::get))
        .route("/script/delete", post(scripts::delete))
        .fallback(not_found)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CorsLayer::permissive()),
        )
        .with_state(state)
}

async fn health() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "service": "callflow"
    }))
}

async fn not_found() -> impl IntoResponse {
    (
        StatusCode::NOT_FOUND,
        Json(serde_json::json!({
            "error": "Not found, or bad request method."
        })),
    )
}
