//! Telegram transport — long-polls the Bot API for messages and button
//! presses, and sends replies with their keyboards.

use std::pin::Pin;
use std::time::Duration;

use futures::Stream;
use secrecy::{ExposeSecret, SecretString};
use serde_json::Value;

use super::wizard::{Reply, ReplyMarkup};
use crate::error::ChannelError;

/// Maximum message length for Telegram's sendMessage API.
const TELEGRAM_MAX_MESSAGE_LENGTH: usize = 4096;
const TELEGRAM_API_BASE: &str = "https://api.telegram.org";
const POLL_TIMEOUT_SECS: u64 = 30;
const RETRY_DELAY: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpdateKind {
    Message(String),
    /// Inline-button press; `id` must be acknowledged.
    Callback { id: String, data: String },
}

/// An operator update, reduced to what the bot acts on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Update {
    /// Telegram user ID of the sender.
    pub operator: String,
    pub chat_id: String,
    pub kind: UpdateKind,
}

pub type UpdateStream = Pin<Box<dyn Stream<Item = Update> + Send>>;

pub struct TelegramTransport {
    bot_token: SecretString,
    base_url: String,
    client: reqwest::Client,
}

impl TelegramTransport {
    pub fn new(bot_token: SecretString) -> Self {
        Self::with_base_url(bot_token, TELEGRAM_API_BASE)
    }

    pub fn with_base_url(bot_token: SecretString, base_url: impl Into<String>) -> Self {
        Self {
            bot_token,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client: reqwest::Client::new(),
        }
    }

    fn api_url(&self, method: &str) -> String {
        format!(
            "{}/bot{}/{method}",
            self.base_url,
            self.bot_token.expose_secret()
        )
    }

    fn send_failed(reason: impl Into<String>) -> ChannelError {
        ChannelError::SendFailed {
            name: "telegram".into(),
            reason: reason.into(),
        }
    }

    /// Verify the token with `getMe`.
    pub async fn health_check(&self) -> Result<(), ChannelError> {
        let startup_failed = |reason: String| ChannelError::StartupFailed {
            name: "telegram".into(),
            reason,
        };
        let resp = self
            .client
            .get(self.api_url("getMe"))
            .send()
            .await
            .map_err(|e| startup_failed(e.to_string()))?;

        if resp.status().is_success() {
            Ok(())
        } else {
            Err(startup_failed(format!("getMe returned {}", resp.status())))
        }
    }

    /// Spawn the long-poll loop and return the stream of updates.
    pub fn start(&self) -> UpdateStream {
        let (tx, rx) = tokio::sync::mpsc::unbounded_channel();
        let url = self.api_url("getUpdates");
        let client = self.client.clone();

        tokio::spawn(async move {
            let mut offset: i64 = 0;
            tracing::info!("Telegram transport listening for updates...");

            loop {
                let body = serde_json::json!({
                    "offset": offset,
                    "timeout": POLL_TIMEOUT_SECS,
                    "allowed_updates": ["message", "callback_query"]
                });

                let resp = match client
                    .post(&url)
                    .timeout(Duration::from_secs(POLL_TIMEOUT_SECS + 10))
                    .json(&body)
                    .send()
                    .await
                {
                    Ok(r) => r,
                    Err(e) => {
                        tracing::warn!(error = %e, "Telegram poll error");
                        tokio::time::sleep(RETRY_DELAY).await;
                        continue;
                    }
                };

                let data: Value = match resp.json().await {
                    Ok(d) => d,
                    Err(e) => {
                        tracing::warn!(error = %e, "Telegram parse error");
                        tokio::time::sleep(RETRY_DELAY).await;
                        continue;
                    }
                };

                let Some(results) = data.get("result").and_then(Value::as_array) else {
                    tracing::warn!(response = %data, "Telegram getUpdates returned no result");
                    tokio::time::sleep(RETRY_DELAY).await;
                    continue;
                };

                for raw in results {
                    if let Some(uid) = raw.get("update_id").and_then(Value::as_i64) {
                        offset = uid + 1;
                    }
                    let Some(update) = parse_update(raw) else {
                        continue;
                    };
                    if tx.send(update).is_err() {
                        tracing::info!("Telegram listener channel closed");
                        return;
                    }
                }
            }
        });

        let stream = futures::stream::unfold(rx, |mut rx| async move {
            rx.recv().await.map(|update| (update, rx))
        });
        Box::pin(stream)
    }

    /// Send a reply, splitting long text. The keyboard rides on the last chunk.
    pub async fn send(&self, chat_id: &str, reply: &Reply) -> Result<(), ChannelError> {
        let chunks = split_message(&reply.text, TELEGRAM_MAX_MESSAGE_LENGTH);
        let markup = markup_json(&reply.markup);
        let last = chunks.len().saturating_sub(1);

        for (i, chunk) in chunks.iter().enumerate() {
            let mut body = serde_json::json!({
                "chat_id": chat_id,
                "text": chunk,
            });
            if i == last {
                if let Some(markup) = &markup {
                    body["reply_markup"] = markup.clone();
                }
            }
            self.post("sendMessage", &body).await?;
        }
        Ok(())
    }

    /// Acknowledge an inline-button press so the client stops its spinner.
    pub async fn answer_callback(&self, callback_id: &str) -> Result<(), ChannelError> {
        self.post(
            "answerCallbackQuery",
            &serde_json::json!({ "callback_query_id": callback_id }),
        )
        .await
    }

    async fn post(&self, method: &str, body: &Value) -> Result<(), ChannelError> {
        let resp = self
            .client
            .post(self.api_url(method))
            .json(body)
            .send()
            .await
            .map_err(|e| Self::send_failed(e.to_string()))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let err = resp.text().await.unwrap_or_default();
            return Err(Self::send_failed(format!("{method} failed ({status}): {err}")));
        }
        Ok(())
    }
}

// ── Helpers ─────────────────────────────────────────────────────────

fn markup_json(markup: &ReplyMarkup) -> Option<Value> {
    match markup {
        ReplyMarkup::None => None,
        ReplyMarkup::Keyboard(rows) => {
            let keyboard: Vec<Vec<Value>> = rows
                .iter()
                .map(|row| {
                    row.iter()
                        .map(|label| serde_json::json!({ "text": label }))
                        .collect()
                })
                .collect();
            Some(serde_json::json!({
                "keyboard": keyboard,
                "resize_keyboard": true,
                "one_time_keyboard": true,
            }))
        }
        ReplyMarkup::Inline(rows) => {
            let inline: Vec<Vec<Value>> = rows
                .iter()
                .map(|row| {
                    row.iter()
                        .map(|b| serde_json::json!({ "text": b.label, "callback_data": b.data }))
                        .collect()
                })
                .collect();
            Some(serde_json::json!({ "inline_keyboard": inline }))
        }
        ReplyMarkup::RemoveKeyboard => Some(serde_json::json!({ "remove_keyboard": true })),
    }
}

fn id_string(value: Option<&Value>) -> Option<String> {
    value.and_then(Value::as_i64).map(|id| id.to_string())
}

/// Reduce a raw Bot API update to an [`Update`]. Non-text messages and
/// other update types yield `None`.
fn parse_update(raw: &Value) -> Option<Update> {
    if let Some(message) = raw.get("message") {
        let text = message.get("text").and_then(Value::as_str)?;
        return Some(Update {
            operator: id_string(message.get("from").and_then(|f| f.get("id")))?,
            chat_id: id_string(message.get("chat").and_then(|c| c.get("id")))?,
            kind: UpdateKind::Message(text.to_string()),
        });
    }

    let query = raw.get("callback_query")?;
    let operator = id_string(query.get("from").and_then(|f| f.get("id")))?;
    let chat_id = id_string(
        query
            .get("message")
            .and_then(|m| m.get("chat"))
            .and_then(|c| c.get("id")),
    )
    .unwrap_or_else(|| operator.clone());

    Some(Update {
        operator,
        chat_id,
        kind: UpdateKind::Callback {
            id: query.get("id").and_then(Value::as_str)?.to_string(),
            data: query
                .get("data")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string(),
        },
    })
}

/// Split a message into chunks that fit Telegram's length limit.
/// Tries to split on newlines, then spaces, then hard-cuts on a char boundary.
fn split_message(text: &str, max_len: usize) -> Vec<String> {
    if text.len() <= max_len {
        return vec![text.to_string()];
    }

    let mut chunks = Vec::new();
    let mut remaining = text;

    while !remaining.is_empty() {
        if remaining.len() <= max_len {
            chunks.push(remaining.to_string());
            break;
        }

        let mut cut = max_len;
        while !remaining.is_char_boundary(cut) {
            cut -= 1;
        }
        let chunk = &remaining[..cut];
        let split_at = chunk.rfind('\n').or_else(|| chunk.rfind(' ')).unwrap_or(cut);
        let split_at = if split_at == 0 { cut } else { split_at };

        chunks.push(remaining[..split_at].to_string());
        remaining = remaining[split_at..].trim_start();
    }

    chunks
}
