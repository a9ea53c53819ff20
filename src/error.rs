//! Error types for callflow.

/// Top-level error type.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),

    #[error("Dispatch error: {0}")]
    Dispatch(#[from] DispatchError),

    #[error("Synthesis error: {0}")]
    Synthesis(#[from] SynthesisError),

    #[error("Script error: {0}")]
    Script(#[from] ScriptError),

    #[error("Asset error: {0}")]
    Asset(#[from] AssetError),

    #[error("Media error: {0}")]
    Media(#[from] MediaError),

    #[error("Channel error: {0}")]
    Channel(#[from] ChannelError),

    #[error("Wizard error: {0}")]
    Wizard(#[from] WizardError),
}

/// Configuration-related errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue { key: String, message: String },
}

/// Database-related errors.
#[derive(Debug, thiserror::Error)]
pub enum DatabaseError {
    #[error("Connection error: {0}")]
    Pool(String),

    #[error("Query failed: {0}")]
    Query(String),

    #[error("Constraint violation: {0}")]
    Constraint(String),

    #[error("Migration failed: {0}")]
    Migration(String),
}

/// Telephony provider errors.
#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    #[error("Provider {provider} request failed: {reason}")]
    RequestFailed { provider: String, reason: String },

    #[error("Provider {provider} rejected the request ({status}): {message}")]
    Rejected {
        provider: String,
        status: u16,
        message: String,
    },

    #[error("Invalid response from {provider}: {reason}")]
    InvalidResponse { provider: String, reason: String },

    #[error("No telephony provider configured")]
    NotConfigured,
}

/// Speech-synthesis provider errors.
#[derive(Debug, thiserror::Error)]
pub enum SynthesisError {
    #[error("Provider {provider} request failed: {reason}")]
    RequestFailed { provider: String, reason: String },

    #[error("Provider {provider} returned {status}: {message}")]
    Rejected {
        provider: String,
        status: u16,
        message: String,
    },

    #[error("Provider {provider} returned empty audio")]
    EmptyAudio { provider: String },
}

/// Script management errors.
#[derive(Debug, thiserror::Error)]
pub enum ScriptError {
    #[error("{0}")]
    Validation(String),

    #[error("Script name already exists: {name}")]
    Conflict { name: String },

    #[error("Script not found: {name}")]
    NotFound { name: String },

    #[error("Failed to generate audio: {0}")]
    Synthesis(#[from] SynthesisError),

    #[error("Persistence failed: {0}")]
    Persistence(#[from] DatabaseError),

    #[error("Asset IO failed for {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

/// Asset registry errors.
#[derive(Debug, thiserror::Error)]
pub enum AssetError {
    #[error("Asset key already registered: {key}")]
    Conflict { key: String },

    #[error("Asset key is reserved by a built-in service: {key}")]
    Reserved { key: String },
}

/// Media streaming errors.
#[derive(Debug, thiserror::Error)]
pub enum MediaError {
    #[error("Audio file not found: {0}")]
    NotFound(String),

    #[error("Script lookup failed: {0}")]
    Lookup(#[from] DatabaseError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors from the bot's HTTP client to the control API.
#[derive(Debug, thiserror::Error)]
pub enum ControlApiError {
    #[error("Control API request failed: {0}")]
    Transport(String),

    #[error("{0}")]
    Rejected(String),

    #[error("Invalid control API response: {0}")]
    InvalidResponse(String),
}

/// Chat transport errors.
#[derive(Debug, thiserror::Error)]
pub enum ChannelError {
    #[error("Channel {name} failed to start: {reason}")]
    StartupFailed { name: String, reason: String },

    #[error("Failed to send response on channel {name}: {reason}")]
    SendFailed { name: String, reason: String },
}

/// Failures inside a wizard transition or its final dispatch.
#[derive(Debug, thiserror::Error)]
pub enum WizardError {
    #[error("Control API error: {0}")]
    Api(#[from] ControlApiError),

    #[error("Wizard {wizard} reached an invalid state: {reason}")]
    InvalidState { wizard: String, reason: String },
}

/// Result type alias.
pub type Result<T> = std::result::Result<T, Error>;
