//! Twilio REST dispatcher.

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;

use super::{CallDispatcher, CallPlacement, SmsPlacement};
use crate::config::{ServerConfig, TwilioConfig};
use crate::error::DispatchError;

const TWILIO_API_BASE: &str = "https://api.twilio.com";

/// Resource returned by the Calls and Messages endpoints.
#[derive(Debug, Deserialize)]
struct TwilioResource {
    sid: String,
    #[serde(default)]
    to: Option<String>,
    #[serde(default)]
    from: Option<String>,
    #[serde(default)]
    status: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TwilioErrorBody {
    #[serde(default)]
    message: Option<String>,
}

pub struct TwilioDispatcher {
    config: TwilioConfig,
    public_url: String,
    secret: SecretString,
    base_url: String,
    client: reqwest::Client,
}

impl TwilioDispatcher {
    pub fn new(config: TwilioConfig, server: &ServerConfig) -> Self {
        Self::with_base_url(config, server, TWILIO_API_BASE)
    }

    /// Point the dispatcher at another API host.
    pub fn with_base_url(
        config: TwilioConfig,
        server: &ServerConfig,
        base_url: impl Into<String>,
    ) -> Self {
        Self {
            config,
            public_url: server.public_url.clone(),
            secret: server.api_password.clone(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client: reqwest::Client::new(),
        }
    }

    fn api_url(&self, resource: &str) -> String {
        format!(
            "{}/2010-04-01/Accounts/{}/{resource}.json",
            self.base_url, self.config.account_sid
        )
    }

    fn voice_url(&self, key: &str) -> String {
        format!(
            "{}/voice/{}?service={key}",
            self.public_url,
            self.secret.expose_secret()
        )
    }

    fn status_url(&self, key: &str) -> String {
        format!(
            "{}/status/{}?service={key}",
            self.public_url,
            self.secret.expose_secret()
        )
    }

    async fn post_form(
        &self,
        resource: &str,
        form: &[(&str, String)],
    ) -> Result<TwilioResource, DispatchError> {
        let resp = self
            .client
            .post(self.api_url(resource))
            .basic_auth(
                &self.config.account_sid,
                Some(self.config.auth_token.expose_secret()),
            )
            .form(form)
            .send()
            .await
            .map_err(|e| DispatchError::RequestFailed {
                provider: self.name().into(),
                reason: e.to_string(),
            })?;

        let status = resp.status();
        let text = resp.text().await.unwrap_or_default();
        if !status.is_success() {
            let message = serde_json::from_str::<TwilioErrorBody>(&text)
                .ok()
                .and_then(|b| b.message)
                .unwrap_or(text);
            return Err(DispatchError::Rejected {
                provider: self.name().into(),
                status: status.as_u16(),
                message,
            });
        }

        serde_json::from_str(&text).map_err(|e| DispatchError::InvalidResponse {
            provider: self.name().into(),
            reason: e.to_string(),
        })
    }
}

#[async_trait]
impl CallDispatcher for TwilioDispatcher {
    fn name(&self) -> &str {
        "twilio"
    }

    async fn place_call(
        &self,
        destination: &str,
        callback_key: &str,
    ) -> Result<CallPlacement, DispatchError> {
        let form = [
            ("Url", self.voice_url(callback_key)),
            ("To", destination.to_string()),
            ("From", self.config.caller_id.clone()),
            ("StatusCallback", self.status_url(callback_key)),
        ];
        let call = self.post_form("Calls", &form).await?;
        tracing::info!(call_sid = %call.sid, to = %destination, key = %callback_key, "Call placed");

        Ok(CallPlacement {
            to: call.to.unwrap_or_else(|| destination.to_string()),
            from: call.from.unwrap_or_else(|| self.config.caller_id.clone()),
            status: call.status.unwrap_or_else(|| "queued".to_string()),
            sid: call.sid,
        })
    }

    async fn send_sms(&self, destination: &str, body: &str) -> Result<SmsPlacement, DispatchError> {
        let form = [
            ("To", destination.to_string()),
            ("From", self.config.caller_id.clone()),
            ("Body", body.to_string()),
        ];
        let message = self.post_form("Messages", &form).await?;
        tracing::info!(sms_sid = %message.sid, to = %destination, "SMS sent");

        Ok(SmsPlacement {
            to: message.to.unwrap_or_else(|| destination.to_string()),
            from: message.from.unwrap_or_else(|| self.config.caller_id.clone()),
            status: message.status.unwrap_or_else(|| "queued".to_string()),
            sid: message.sid,
        })
    }
}
