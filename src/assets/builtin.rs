//! Built-in service catalogue — the closed set of brands with stock prompts.

use serde::{Deserialize, Serialize};

/// A built-in service with a pre-recorded prompt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BuiltinService {
    Amazon,
    Cdiscount,
    Twitter,
    Whatsapp,
    Paypal,
    Google,
    Snapchat,
    Instagram,
    Facebook,
    Banque,
    /// Closing prompt played once a code is captured or the call gives up.
    End,
    /// Generic prompt used whenever nothing more specific resolves.
    Default,
}

impl BuiltinService {
    pub const ALL: [BuiltinService; 12] = [
        Self::Amazon,
        Self::Cdiscount,
        Self::Twitter,
        Self::Whatsapp,
        Self::Paypal,
        Self::Google,
        Self::Snapchat,
        Self::Instagram,
        Self::Facebook,
        Self::Banque,
        Self::End,
        Self::Default,
    ];

    /// Services offered in the operator's call menu, in display order.
    pub const MENU: [BuiltinService; 10] = [
        Self::Amazon,
        Self::Paypal,
        Self::Google,
        Self::Facebook,
        Self::Instagram,
        Self::Twitter,
        Self::Snapchat,
        Self::Whatsapp,
        Self::Banque,
        Self::Default,
    ];

    /// Lowercase key used in URLs and the database.
    pub fn key(&self) -> &'static str {
        match self {
            Self::Amazon => "amazon",
            Self::Cdiscount => "cdiscount",
            Self::Twitter => "twitter",
            Self::Whatsapp => "whatsapp",
            Self::Paypal => "paypal",
            Self::Google => "google",
            Self::Snapchat => "snapchat",
            Self::Instagram => "instagram",
            Self::Facebook => "facebook",
            Self::Banque => "banque",
            Self::End => "end",
            Self::Default => "default",
        }
    }

    /// Label shown on the operator's keyboard.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Amazon => "Amazon",
            Self::Cdiscount => "Cdiscount",
            Self::Twitter => "Twitter",
            Self::Whatsapp => "WhatsApp",
            Self::Paypal => "PayPal",
            Self::Google => "Google",
            Self::Snapchat => "Snapchat",
            Self::Instagram => "Instagram",
            Self::Facebook => "Facebook",
            Self::Banque => "Bank",
            Self::End => "End",
            Self::Default => "Default",
        }
    }

    /// Look up a service by key, case-insensitively.
    pub fn from_key(key: &str) -> Option<Self> {
        let key = key.trim();
        Self::ALL
            .into_iter()
            .find(|s| s.key().eq_ignore_ascii_case(key))
    }

    /// Look up a menu entry by its keyboard label, case-insensitively.
    pub fn from_label(label: &str) -> Option<Self> {
        let label = label.trim();
        Self::MENU
            .into_iter()
            .find(|s| s.label().eq_ignore_ascii_case(label))
    }

    /// Path of the stock prompt, relative to the voice directory.
    pub fn default_asset_path(&self) -> String {
        let key = self.key();
        format!("en/{key}/ask-{key}.mp3")
    }

    /// Environment variable that can override the stock prompt location.
    pub fn override_var(&self) -> String {
        format!("{}_FILE_PATH", self.key().to_uppercase())
    }
}

impl std::fmt::Display for BuiltinService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.key())
    }
}
