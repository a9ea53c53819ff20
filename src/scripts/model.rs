//! Script and dispatch record models.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// What a script is used for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScriptKind {
    Call,
    Sms,
}

impl ScriptKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Call => "call",
            Self::Sms => "sms",
        }
    }
}

impl std::fmt::Display for ScriptKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ScriptKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "call" => Ok(Self::Call),
            "sms" => Ok(Self::Sms),
            other => Err(format!("Invalid script type: {other}")),
        }
    }
}

/// A persisted script.
///
/// `asset_path` is relative to the voice directory and is only ever set on
/// Call scripts whose audio was synthesized.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScriptDescriptor {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: ScriptKind,
    pub message: String,
    #[serde(rename = "audio_path")]
    pub asset_path: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// A script about to be inserted.
#[derive(Debug, Clone)]
pub struct NewScript {
    pub name: String,
    pub kind: ScriptKind,
    pub message: String,
    pub asset_path: Option<String>,
}

impl NewScript {
    /// Relative asset location for a Call script named `name`.
    pub fn asset_path_for(name: &str) -> String {
        format!("en/{name}/ask-{name}.mp3")
    }
}

/// A placed outbound call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallRecord {
    /// Provider-assigned call ID.
    pub sid: String,
    #[serde(rename = "to")]
    pub destination: String,
    /// Service or script key the call plays.
    pub service: String,
    pub status: String,
    /// Digits captured from the recipient, once available.
    pub code: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl CallRecord {
    pub fn new(sid: &str, destination: &str, service: &str, status: &str) -> Self {
        let now = Utc::now();
        Self {
            sid: sid.to_string(),
            destination: destination.to_string(),
            service: service.to_string(),
            status: status.to_string(),
            code: None,
            created_at: now,
            updated_at: now,
        }
    }
}

/// A sent SMS.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SmsRecord {
    pub sid: String,
    #[serde(rename = "to")]
    pub destination: String,
    /// Script name the body came from, if any.
    pub service: Option<String>,
    pub status: String,
    pub message: String,
    pub created_at: DateTime<Utc>,
}
