//! Configuration types, built from environment variables.
//!
//! Every config has a `from_env()` constructor and a `from_lookup()` twin that
//! takes the variable source as a closure, so tests never touch the process
//! environment.

use std::path::PathBuf;

use secrecy::SecretString;

use crate::error::ConfigError;

/// Default HTTP port.
pub const DEFAULT_PORT: u16 = 8080;

/// Default number of unanswered prompts before a call is closed.
pub const DEFAULT_MAX_PROMPT_ATTEMPTS: u32 = 5;

/// HTTP server and call-flow configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Public base URL the telephony provider calls back to (no trailing slash).
    pub public_url: String,
    /// Shared secret used in webhook paths and JSON `password` fields.
    pub api_password: SecretString,
    pub port: u16,
    pub db_path: PathBuf,
    /// Root directory holding all audio assets.
    pub voice_dir: PathBuf,
    /// Prompt repetitions before the call is closed. `0` means unbounded.
    pub max_prompt_attempts: u32,
    /// When set, logs are also written to a daily-rolling file here.
    pub log_dir: Option<PathBuf>,
}

impl ServerConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let public_url = required(&lookup, "CALLFLOW_PUBLIC_URL")?
            .trim_end_matches('/')
            .to_string();
        let api_password = SecretString::from(required(&lookup, "CALLFLOW_API_PASSWORD")?);

        let port = parse_or(&lookup, "CALLFLOW_PORT", DEFAULT_PORT)?;
        let max_prompt_attempts = parse_or(
            &lookup,
            "CALLFLOW_MAX_PROMPT_ATTEMPTS",
            DEFAULT_MAX_PROMPT_ATTEMPTS,
        )?;

        let db_path = lookup("CALLFLOW_DB_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("./data/callflow.db"));
        let voice_dir = lookup("CALLFLOW_VOICE_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("./voice"));
        let log_dir = lookup("CALLFLOW_LOG_DIR")
            .filter(|s| !s.trim().is_empty())
            .map(PathBuf::from);

        Ok(Self {
            public_url,
            api_password,
            port,
            db_path,
            voice_dir,
            max_prompt_attempts,
            log_dir,
        })
    }
}

/// Twilio credentials. Absent when any of the three variables is unset.
#[derive(Debug, Clone)]
pub struct TwilioConfig {
    pub account_sid: String,
    pub auth_token: SecretString,
    /// Caller ID presented on outbound calls and SMS.
    pub caller_id: String,
}

impl TwilioConfig {
    pub fn from_env() -> Option<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Option<Self> {
        Some(Self {
            account_sid: non_empty(&lookup, "TWILIO_ACCOUNT_SID")?,
            auth_token: SecretString::from(non_empty(&lookup, "TWILIO_AUTH_TOKEN")?),
            caller_id: non_empty(&lookup, "TWILIO_CALLER_ID")?,
        })
    }
}

/// ElevenLabs text-to-speech settings. Absent when no API key is set.
#[derive(Debug, Clone)]
pub struct SynthesisConfig {
    pub api_key: SecretString,
    pub voice_id: String,
    pub model_id: String,
}

impl SynthesisConfig {
    pub fn from_env() -> Option<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Option<Self> {
        let api_key = SecretString::from(non_empty(&lookup, "ELEVENLABS_API_KEY")?);
        let voice_id = non_empty(&lookup, "ELEVENLABS_VOICE_ID")
            .unwrap_or_else(|| "21m00Tcm4TlvDq8ikWAM".to_string());
        Some(Self {
            api_key,
            voice_id,
            model_id: "eleven_monolingual_v1".to_string(),
        })
    }
}

/// Control-bot settings. Absent when no bot token is set.
#[derive(Debug, Clone)]
pub struct BotConfig {
    pub bot_token: SecretString,
    /// Base URL of the control API the bot drives.
    pub api_url: String,
    pub api_password: SecretString,
    /// Telegram user IDs granted the admin role at startup.
    pub admin_ids: Vec<String>,
}

impl BotConfig {
    pub fn from_env(server: &ServerConfig) -> Option<Self> {
        Self::from_lookup(server, |key| std::env::var(key).ok())
    }

    pub fn from_lookup(
        server: &ServerConfig,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Option<Self> {
        let bot_token = SecretString::from(non_empty(&lookup, "TELEGRAM_BOT_TOKEN")?);
        let api_url = non_empty(&lookup, "CALLFLOW_API_URL")
            .map(|u| u.trim_end_matches('/').to_string())
            .unwrap_or_else(|| format!("http://127.0.0.1:{}", server.port));
        let admin_ids = split_list(&lookup("TELEGRAM_ADMIN_IDS").unwrap_or_default());

        Some(Self {
            bot_token,
            api_url,
            api_password: server.api_password.clone(),
            admin_ids,
        })
    }
}

fn required(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
) -> Result<String, ConfigError> {
    non_empty(lookup, key).ok_or_else(|| ConfigError::MissingEnvVar(key.to_string()))
}

fn non_empty(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Option<String> {
    lookup(key)
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn parse_or<T>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
    default: T,
) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match non_empty(lookup, key) {
        Some(raw) => raw.parse().map_err(|e: T::Err| ConfigError::InvalidValue {
            key: key.to_string(),
            message: e.to_string(),
        }),
        None => Ok(default),
    }
}

fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use secrecy::ExposeSecret;

    use super::*;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn server_config_requires_url_and_password() {
        let err = ServerConfig::from_lookup(lookup_from(&[])).unwrap_err();
        assert!(matches!(err, ConfigError::MissingEnvVar(ref k) if k == "CALLFLOW_PUBLIC_URL"));

        let err = ServerConfig::from_lookup(lookup_from(&[(
            "CALLFLOW_PUBLIC_URL",
            "https://calls.example.com",
        )]))
        .unwrap_err();
        assert!(matches!(err, ConfigError::MissingEnvVar(ref k) if k == "CALLFLOW_API_PASSWORD"));
    }

    #[test]
    fn server_config_defaults() {
        let cfg = ServerConfig::from_lookup(lookup_from(&[
            ("CALLFLOW_PUBLIC_URL", "https://calls.example.com/"),
            ("CALLFLOW_API_PASSWORD", "s3cret"),
        ]))
        .unwrap();

        assert_eq!(cfg.public_url, "https://calls.example.com");
        assert_eq!(cfg.api_password.expose_secret(), "s3cret");
        assert_eq!(cfg.port, DEFAULT_PORT);
        assert_eq!(cfg.max_prompt_attempts, DEFAULT_MAX_PROMPT_ATTEMPTS);
        assert_eq!(cfg.voice_dir, PathBuf::from("./voice"));
        assert!(cfg.log_dir.is_none());
    }

    #[test]
    fn server_config_rejects_bad_port() {
        let err = ServerConfig::from_lookup(lookup_from(&[
            ("CALLFLOW_PUBLIC_URL", "https://calls.example.com"),
            ("CALLFLOW_API_PASSWORD", "s3cret"),
            ("CALLFLOW_PORT", "not-a-port"),
        ]))
        .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { ref key, .. } if key == "CALLFLOW_PORT"));
    }

    #[test]
    fn twilio_config_needs_all_three() {
        assert!(TwilioConfig::from_lookup(lookup_from(&[
            ("TWILIO_ACCOUNT_SID", "AC123"),
            ("TWILIO_AUTH_TOKEN", "tok"),
        ]))
        .is_none());

        let cfg = TwilioConfig::from_lookup(lookup_from(&[
            ("TWILIO_ACCOUNT_SID", "AC123"),
            ("TWILIO_AUTH_TOKEN", "tok"),
            ("TWILIO_CALLER_ID", "+15550001111"),
        ]))
        .unwrap();
        assert_eq!(cfg.caller_id, "+15550001111");
    }

    #[test]
    fn synthesis_disabled_without_key() {
        assert!(SynthesisConfig::from_lookup(lookup_from(&[("ELEVENLABS_API_KEY", "  ")])).is_none());
        let cfg = SynthesisConfig::from_lookup(lookup_from(&[("ELEVENLABS_API_KEY", "xi")])).unwrap();
        assert_eq!(cfg.model_id, "eleven_monolingual_v1");
    }

    #[test]
    fn bot_config_defaults_api_url_to_local_port() {
        let server = ServerConfig::from_lookup(lookup_from(&[
            ("CALLFLOW_PUBLIC_URL", "https://calls.example.com"),
            ("CALLFLOW_API_PASSWORD", "s3cret"),
            ("CALLFLOW_PORT", "9000"),
        ]))
        .unwrap();
        let bot = BotConfig::from_lookup(
            &server,
            lookup_from(&[
                ("TELEGRAM_BOT_TOKEN", "123:ABC"),
                ("TELEGRAM_ADMIN_IDS", " 42, ,1001 "),
            ]),
        )
        .unwrap();

        assert_eq!(bot.api_url, "http://127.0.0.1:9000");
        assert_eq!(bot.admin_ids, vec!["42".to_string(), "1001".to_string()]);
    }
}
