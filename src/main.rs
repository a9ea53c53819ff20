use std::path::Path;
use std::sync::Arc;

use callflow::api::{self, ApiState};
use callflow::assets::AssetResolver;
use callflow::bot::{ControlBot, HttpControlApi, StoreAuthorizer, TelegramTransport};
use callflow::config::{BotConfig, ServerConfig, SynthesisConfig, TwilioConfig};
use callflow::dispatch::CallDispatcher;
use callflow::dispatch::twilio::TwilioDispatcher;
use callflow::scripts::{ElevenLabsSynthesizer, SpeechSynthesizer};
use callflow::store::{Database, LibSqlBackend};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::prelude::*;

/// Console logging, plus a daily-rolling file when a log directory is set.
fn init_tracing(log_dir: Option<&Path>) -> Option<WorkerGuard> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let console = tracing_subscriber::fmt::layer().with_target(false);

    match log_dir {
        Some(dir) => {
            let appender = tracing_appender::rolling::daily(dir, "callflow.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            tracing_subscriber::registry()
                .with(filter)
                .with(console)
                .with(
                    tracing_subscriber::fmt::layer()
                        .with_target(false)
                        .with_ansi(false)
                        .with_writer(writer),
                )
                .init();
            Some(guard)
        }
        None => {
            tracing_subscriber::registry()
                .with(filter)
                .with(console)
                .init();
            None
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = ServerConfig::from_env().unwrap_or_else(|e| {
        eprintln!("Error: {e}");
        eprintln!("  export CALLFLOW_PUBLIC_URL=https://calls.example.com");
        eprintln!("  export CALLFLOW_API_PASSWORD=...");
        std::process::exit(1);
    });

    let _log_guard = init_tracing(config.log_dir.as_deref());

    eprintln!("📞 Callflow v{}", env!("CARGO_PKG_VERSION"));
    eprintln!("   Public URL: {}", config.public_url);
    eprintln!("   Listening: http://0.0.0.0:{}", config.port);

    // ── Database ─────────────────────────────────────────────────────────
    let db: Arc<dyn Database> = Arc::new(
        LibSqlBackend::new_local(&config.db_path)
            .await
            .unwrap_or_else(|e| {
                eprintln!(
                    "Error: Failed to open database at {}: {}",
                    config.db_path.display(),
                    e
                );
                std::process::exit(1);
            }),
    );
    eprintln!("   Database: {}", config.db_path.display());

    // ── Assets ───────────────────────────────────────────────────────────
    let assets = Arc::new(AssetResolver::with_overrides(&config.voice_dir, |key| {
        std::env::var(key).ok()
    }));
    eprintln!("   Voice dir: {}", config.voice_dir.display());

    // ── Providers ────────────────────────────────────────────────────────
    let dispatcher: Option<Arc<dyn CallDispatcher>> = match TwilioConfig::from_env() {
        Some(twilio) => {
            eprintln!("   Telephony: twilio (caller ID {})", twilio.caller_id);
            Some(Arc::new(TwilioDispatcher::new(twilio, &config)))
        }
        None => {
            eprintln!("   Telephony: disabled (TWILIO_* not set)");
            None
        }
    };

    let synthesizer: Option<Arc<dyn SpeechSynthesizer>> = match SynthesisConfig::from_env() {
        Some(synthesis) => {
            eprintln!("   Synthesis: elevenlabs (voice {})", synthesis.voice_id);
            Some(Arc::new(ElevenLabsSynthesizer::new(synthesis)))
        }
        None => {
            eprintln!("   Synthesis: disabled (ELEVENLABS_API_KEY not set)");
            None
        }
    };

    let state = ApiState::new(
        &config,
        Arc::clone(&db),
        Arc::clone(&assets),
        synthesizer,
        dispatcher,
    );

    let loaded = state.scripts.load_registry().await?;
    eprintln!("   Scripts: {loaded} call prompts registered");

    // ── Control bot ──────────────────────────────────────────────────────
    if let Some(bot_config) = BotConfig::from_env(&config) {
        let auth = Arc::new(StoreAuthorizer::new(Arc::clone(&db)));
        auth.seed_admins(&bot_config.admin_ids).await?;

        let transport = Arc::new(TelegramTransport::new(bot_config.bot_token.clone()));
        if let Err(e) = transport.health_check().await {
            tracing::warn!(error = %e, "Telegram health check failed");
        }

        let bot = Arc::new(ControlBot::new(
            Arc::new(HttpControlApi::new(&bot_config)),
            auth,
        ));
        tokio::spawn(bot.run(transport));
        eprintln!(
            "   Telegram: enabled ({} admins, API {})",
            bot_config.admin_ids.len(),
            bot_config.api_url
        );
    } else {
        eprintln!("   Telegram: disabled (TELEGRAM_BOT_TOKEN not set)");
    }
    eprintln!();

    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{}", config.port)).await?;
    tracing::info!(port = config.port, "HTTP server started");
    axum::serve(listener, api::router(state)).await?;

    Ok(())
}
