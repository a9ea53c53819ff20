//! Call-flow engine — turns an inbound call webhook into the next
//! call-control response.
//!
//! Nothing is held between turns. The service key and attempt counter ride
//! on the callback URLs, so any instance can answer any turn of any call.

use std::sync::Arc;

use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use tracing::{debug, error, info};

use super::twiml::{Gather, VoiceResponse};
use crate::assets::{AssetRef, AssetResolver, BuiltinService};
use crate::config::ServerConfig;
use crate::error::DatabaseError;
use crate::scripts::model::ScriptKind;
use crate::store::Database;

/// Spoken when a turn cannot be planned.
pub const APOLOGY: &str = "An error occurred. Please try again later.";

/// State of one call turn, reconstructed from the callback query string.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct CallTurn {
    #[serde(default)]
    pub service: Option<String>,
    /// Number of prompts already played without input. Unparseable values
    /// count as zero.
    #[serde(default, deserialize_with = "lenient_u32")]
    pub attempt: u32,
}

impl CallTurn {
    pub fn new(service: Option<&str>, attempt: u32) -> Self {
        Self {
            service: service.map(str::to_string),
            attempt,
        }
    }
}

fn lenient_u32<'de, D>(deserializer: D) -> Result<u32, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let raw: Option<String> = Option::deserialize(deserializer)?;
    Ok(raw.and_then(|s| s.trim().parse().ok()).unwrap_or(0))
}

/// Outcome of key resolution for a turn.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedTurn {
    /// Key echoed back on the status and redirect URLs.
    pub key: String,
    /// Prompt to play.
    pub asset: AssetRef,
}

pub struct CallFlowEngine {
    public_url: String,
    secret: SecretString,
    assets: Arc<AssetResolver>,
    db: Arc<dyn Database>,
    max_attempts: u32,
}

impl CallFlowEngine {
    pub fn new(config: &ServerConfig, assets: Arc<AssetResolver>, db: Arc<dyn Database>) -> Self {
        Self {
            public_url: config.public_url.clone(),
            secret: config.api_password.clone(),
            assets,
            db,
            max_attempts: config.max_prompt_attempts,
        }
    }

    /// Answer one call turn. Never fails: internal errors produce a spoken
    /// apology with no further gather or redirect.
    pub async fn respond(&self, turn: &CallTurn) -> VoiceResponse {
        match self.plan(turn).await {
            Ok(response) => response,
            Err(e) => {
                error!(service = ?turn.service, error = %e, "Failed to plan call turn");
                VoiceResponse::new().say(APOLOGY)
            }
        }
    }

    /// Resolve a turn's key. Absent and unknown keys both land on the
    /// default prompt.
    pub async fn resolve(&self, key: Option<&str>) -> Result<ResolvedTurn, DatabaseError> {
        let Some(key) = key.map(str::trim).filter(|k| !k.is_empty()) else {
            return Ok(self.default_turn());
        };

        if let Some(service) = BuiltinService::from_key(key) {
            return Ok(ResolvedTurn {
                key: service.key().to_string(),
                asset: self.assets.builtin(service),
            });
        }

        if self.assets.has_script(key) {
            let asset = self.assets.resolve(key);
            return Ok(ResolvedTurn {
                key: asset.key.clone(),
                asset,
            });
        }

        match self.db.get_script(key).await? {
            Some(script) if script.kind == ScriptKind::Call => {
                debug!(script = %script.name, "Call script has no registered asset");
                Ok(ResolvedTurn {
                    key: script.name,
                    asset: self.assets.default_asset(),
                })
            }
            _ => {
                debug!(key = %key, "Unknown service key, using default prompt");
                Ok(self.default_turn())
            }
        }
    }

    /// Closing response: play the `end` prompt, then hang up.
    pub fn closing(&self) -> VoiceResponse {
        VoiceResponse::new()
            .play(self.stream_url(BuiltinService::End.key()))
            .hangup()
    }

    async fn plan(&self, turn: &CallTurn) -> Result<VoiceResponse, DatabaseError> {
        if self.max_attempts > 0 && turn.attempt >= self.max_attempts {
            info!(
                service = ?turn.service,
                attempts = turn.attempt,
                "Prompt attempts exhausted, ending call"
            );
            return Ok(self.closing());
        }

        let resolved = self.resolve(turn.service.as_deref()).await?;
        let secret = self.secret.expose_secret();
        let base = &self.public_url;
        let key = &resolved.key;

        let action = format!("{base}/status/{secret}?service={key}");
        let redirect = if self.max_attempts > 0 {
            format!(
                "{base}/voice/{secret}?service={key}&attempt={}",
                turn.attempt + 1
            )
        } else {
            format!("{base}/voice/{secret}?service={key}")
        };

        Ok(VoiceResponse::new()
            .gather(Gather::dtmf(action).play(self.stream_url(&resolved.asset.key)))
            .redirect(redirect))
    }

    fn stream_url(&self, key: &str) -> String {
        format!("{}/stream/{key}", self.public_url)
    }

    fn default_turn(&self) -> ResolvedTurn {
        ResolvedTurn {
            key: BuiltinService::Default.key().to_string(),
            asset: self.assets.default_asset(),
        }
    }
}
