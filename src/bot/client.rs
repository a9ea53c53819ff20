//! HTTP client the bot uses to drive the control API.

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;

use crate::assets::BuiltinService;
use crate::config::BotConfig;
use crate::error::ControlApiError;
use crate::scripts::{ScriptDescriptor, ScriptKind};

/// What an outbound call plays: a built-in service or a custom script.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallTarget {
    Service(BuiltinService),
    Script(String),
}

impl std::fmt::Display for CallTarget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Service(service) => write!(f, "Service: {}", service.key()),
            Self::Script(name) => write!(f, "Script: {name}"),
        }
    }
}

/// A call accepted by the API.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct PlacedCall {
    pub sid: String,
    #[serde(default)]
    pub status: Option<String>,
}

/// Operations the bot performs against the control API.
#[async_trait]
pub trait ControlApi: Send + Sync {
    async fn place_call(
        &self,
        to: &str,
        target: &CallTarget,
    ) -> Result<PlacedCall, ControlApiError>;

    async fn create_script(
        &self,
        name: &str,
        kind: ScriptKind,
        message: &str,
    ) -> Result<ScriptDescriptor, ControlApiError>;

    async fn list_scripts(&self) -> Result<Vec<ScriptDescriptor>, ControlApiError>;

    async fn delete_script(&self, name: &str) -> Result<(), ControlApiError>;
}

#[derive(Debug, Deserialize)]
struct Envelope {
    #[serde(default)]
    success: bool,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ScriptEnvelope {
    script: ScriptDescriptor,
}

#[derive(Debug, Deserialize)]
struct ScriptsEnvelope {
    #[serde(default)]
    scripts: Vec<ScriptDescriptor>,
}

/// [`ControlApi`] over HTTP, authenticating with the shared password.
pub struct HttpControlApi {
    base_url: String,
    password: SecretString,
    client: reqwest::Client,
}

impl HttpControlApi {
    pub fn new(config: &BotConfig) -> Self {
        Self {
            base_url: config.api_url.trim_end_matches('/').to_string(),
            password: config.api_password.clone(),
            client: reqwest::Client::new(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    /// POST a JSON body with the password added; returns the success body.
    async fn post(
        &self,
        path: &str,
        mut body: serde_json::Value,
    ) -> Result<serde_json::Value, ControlApiError> {
        body["password"] = serde_json::Value::String(self.password.expose_secret().to_string());

        let resp = self
            .client
            .post(self.url(path))
            .json(&body)
            .send()
            .await
            .map_err(|e| ControlApiError::Transport(e.to_string()))?;

        let status = resp.status();
        let value: serde_json::Value = resp
            .json()
            .await
            .map_err(|e| ControlApiError::InvalidResponse(format!("{path}: {e}")))?;

        let envelope: Envelope = serde_json::from_value(value.clone())
            .map_err(|e| ControlApiError::InvalidResponse(format!("{path}: {e}")))?;
        if !status.is_success() || !envelope.success {
            return Err(ControlApiError::Rejected(
                envelope
                    .error
                    .unwrap_or_else(|| format!("request failed with status {status}")),
            ));
        }
        Ok(value)
    }
}

fn decode<T: serde::de::DeserializeOwned>(
    path: &str,
    value: serde_json::Value,
) -> Result<T, ControlApiError> {
    serde_json::from_value(value).map_err(|e| ControlApiError::InvalidResponse(format!("{path}: {e}")))
}

#[async_trait]
impl ControlApi for HttpControlApi {
    async fn place_call(
        &self,
        to: &str,
        target: &CallTarget,
    ) -> Result<PlacedCall, ControlApiError> {
        let body = match target {
            CallTarget::Service(service) => serde_json::json!({
                "to": to,
                "service": service.key(),
            }),
            CallTarget::Script(name) => serde_json::json!({
                "to": to,
                "scriptName": name,
            }),
        };
        let value = self.post("/call", body).await?;
        decode("/call", value)
    }

    async fn create_script(
        &self,
        name: &str,
        kind: ScriptKind,
        message: &str,
    ) -> Result<ScriptDescriptor, ControlApiError> {
        let body = serde_json::json!({
            "name": name,
            "type": kind.as_str(),
            "message": message,
        });
        let value = self.post("/script", body).await?;
        decode::<ScriptEnvelope>("/script", value).map(|e| e.script)
    }

    async fn list_scripts(&self) -> Result<Vec<ScriptDescriptor>, ControlApiError> {
        let value = self.post("/scripts", serde_json::json!({})).await?;
        decode::<ScriptsEnvelope>("/scripts", value).map(|e| e.scripts)
    }

    async fn delete_script(&self, name: &str) -> Result<(), ControlApiError> {
        self.post("/script/delete", serde_json::json!({ "name": name }))
            .await
            .map(|_| ())
    }
}
