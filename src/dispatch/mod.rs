//! Outbound dispatch — placing calls and sending SMS through a provider.

pub mod twilio;

use std::sync::LazyLock;

use async_trait::async_trait;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::DispatchError;

pub use twilio::TwilioDispatcher;

static PHONE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\+?[0-9]{10,15}$").expect("valid phone pattern"));

/// Normalize a destination number: whitespace is dropped, then an optional
/// leading `+` and 10 to 15 digits must remain.
pub fn normalize_phone(input: &str) -> Option<String> {
    let compact: String = input.chars().filter(|c| !c.is_whitespace()).collect();
    PHONE_RE.is_match(&compact).then_some(compact)
}

/// A call accepted by the provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallPlacement {
    /// Provider-assigned call ID.
    pub sid: String,
    pub to: String,
    pub from: String,
    pub status: String,
}

/// An SMS accepted by the provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SmsPlacement {
    pub sid: String,
    pub to: String,
    pub from: String,
    pub status: String,
}

/// Places calls and sends SMS. Implementations never retry.
#[async_trait]
pub trait CallDispatcher: Send + Sync {
    /// Provider name for logs and errors.
    fn name(&self) -> &str;

    /// Place a call whose turns will be driven by `callback_key`.
    async fn place_call(
        &self,
        destination: &str,
        callback_key: &str,
    ) -> Result<CallPlacement, DispatchError>;

    async fn send_sms(&self, destination: &str, body: &str) -> Result<SmsPlacement, DispatchError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn phone_shapes() {
        assert_eq!(
            normalize_phone("+33 6 12 34 56 78").as_deref(),
            Some("+33612345678")
        );
        assert_eq!(normalize_phone("0612345678").as_deref(), Some("0612345678"));
        assert!(normalize_phone("+12345").is_none());
        assert!(normalize_phone("+1234567890123456").is_none());
        assert!(normalize_phone("06-12-34-56-78").is_none());
        assert!(normalize_phone("").is_none());
    }
}
