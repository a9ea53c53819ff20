//! Control-plane chat bot: operators place calls and manage scripts through
//! guided wizards.

pub mod auth;
pub mod call_wizard;
pub mod client;
pub mod commands;
pub mod help;
pub mod script_wizard;
pub mod telegram;
pub mod wizard;

use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::{FutureExt, StreamExt};
use tracing::{error, info, warn};

pub use auth::{Authorizer, StoreAuthorizer};
pub use call_wizard::{CallStep, CallWizard};
pub use client::{CallTarget, ControlApi, HttpControlApi, PlacedCall};
pub use commands::{BotCommand, BotInput, CommandParser, UserCommand};
pub use script_wizard::{ScriptStep, ScriptWizard};
pub use telegram::{TelegramTransport, Update, UpdateKind};
pub use wizard::{Reply, ReplyMarkup, WizardEngine, WizardInput};

use crate::scripts::ScriptKind;
use crate::store::OperatorRole;
use wizard::{FAILURE, UNAUTHORIZED};

/// Routes operator updates to commands and wizards.
pub struct ControlBot {
    api: Arc<dyn ControlApi>,
    auth: Arc<dyn Authorizer>,
    calls: WizardEngine<CallWizard>,
    scripts: WizardEngine<ScriptWizard>,
}

impl ControlBot {
    pub fn new(api: Arc<dyn ControlApi>, auth: Arc<dyn Authorizer>) -> Self {
        Self {
            calls: WizardEngine::new(CallWizard::new(api.clone()), auth.clone()),
            scripts: WizardEngine::new(ScriptWizard::new(api.clone()), auth.clone()),
            api,
            auth,
        }
    }

    pub fn calls(&self) -> &WizardEngine<CallWizard> {
        &self.calls
    }

    pub fn scripts(&self) -> &WizardEngine<ScriptWizard> {
        &self.scripts
    }

    /// Handle one update and return the replies to send.
    pub async fn handle(&self, update: &Update) -> Vec<Reply> {
        let operator = update.operator.as_str();
        let reply = match &update.kind {
            UpdateKind::Message(text) => match CommandParser::parse(text) {
                BotInput::Command(command) => Some(self.command(operator, command).await),
                BotInput::Text(text) => self.route(operator, WizardInput::Text(text)).await,
            },
            UpdateKind::Callback { data, .. } => {
                self.route(operator, WizardInput::Choice(data.clone())).await
            }
        };
        reply.into_iter().collect()
    }

    /// Feed input to whichever wizard the operator has open.
    async fn route(&self, operator: &str, input: WizardInput) -> Option<Reply> {
        if let Some(reply) = self.calls.handle(operator, input.clone()).await {
            return Some(reply);
        }
        self.scripts.handle(operator, input).await
    }

    /// Drop every session the operator has open.
    pub async fn reset(&self, operator: &str) {
        self.calls.cancel(operator).await;
        self.scripts.cancel(operator).await;
    }

    async fn command(&self, operator: &str, command: BotCommand) -> Reply {
        match command {
            BotCommand::Start => Reply::text(help::welcome_text(&self.call_script_names().await)),
            BotCommand::Help => Reply::text(help::help_text(&self.call_script_names().await)),
            BotCommand::Call => {
                self.scripts.cancel(operator).await;
                self.calls.start(operator).await
            }
            BotCommand::Script => {
                self.calls.cancel(operator).await;
                self.scripts.start(operator).await
            }
            BotCommand::Cancel => {
                if self.calls.cancel(operator).await {
                    Reply::text("❌ Call process cancelled.").remove_keyboard()
                } else if self.scripts.cancel(operator).await {
                    Reply::text("❌ Script creation cancelled.")
                } else {
                    Reply::text("No active process to cancel.")
                }
            }
            BotCommand::Scripts => {
                if !self.is_admin(operator).await {
                    return Reply::text(UNAUTHORIZED);
                }
                self.list_scripts().await
            }
            BotCommand::DeleteScript { name } => {
                if !self.is_admin(operator).await {
                    return Reply::text(UNAUTHORIZED);
                }
                let Some(name) = name else {
                    return Reply::text(
                        "❌ Please provide a script name to delete. Usage: /deletescript <name>",
                    );
                };
                match self.api.delete_script(&name).await {
                    Ok(()) => Reply::text(format!("✅ Script \"{name}\" deleted successfully!")),
                    Err(e) => Reply::text(format!("❌ API Error: {e}")),
                }
            }
            BotCommand::User(user) => self.user_command(operator, user).await,
            BotCommand::Unknown(command) => {
                Reply::text(format!("Unknown command {command}. Send /help for the list."))
            }
        }
    }

    async fn user_command(&self, operator: &str, command: UserCommand) -> Reply {
        if command == UserCommand::Me {
            let role = match self.auth.role(operator).await {
                Ok(Some(role)) => role.to_string(),
                Ok(None) => "not registered".to_string(),
                Err(e) => {
                    error!(operator = %operator, error = %e, "Operator lookup failed");
                    return Reply::text(FAILURE);
                }
            };
            return Reply::text(format!("👤 Your ID: {operator}\nRole: {role}"));
        }

        if !self.is_admin(operator).await {
            return Reply::text(UNAUTHORIZED);
        }

        let result = match &command {
            UserCommand::Add(id) => self
                .auth
                .grant(id, OperatorRole::User)
                .await
                .map(|()| format!("✅ User {id} added.")),
            UserCommand::SetAdmin(id) => self
                .auth
                .grant(id, OperatorRole::Admin)
                .await
                .map(|()| format!("✅ User {id} is now an admin.")),
            UserCommand::Delete(id) => self.auth.revoke(id).await.map(|removed| {
                if removed {
                    format!("✅ User {id} removed.")
                } else {
                    format!("User {id} was not registered.")
                }
            }),
            UserCommand::Me | UserCommand::Usage => {
                Ok("Usage: /user add|delete|setadmin <telegram id>, or /user me".to_string())
            }
        };

        match result {
            Ok(text) => {
                info!(operator = %operator, command = ?command, "User command applied");
                Reply::text(text)
            }
            Err(e) => {
                error!(operator = %operator, error = %e, "User command failed");
                Reply::text(FAILURE)
            }
        }
    }

    async fn is_admin(&self, operator: &str) -> bool {
        match self.auth.role(operator).await {
            Ok(role) => role == Some(OperatorRole::Admin),
            Err(e) => {
                error!(operator = %operator, error = %e, "Operator lookup failed");
                false
            }
        }
    }

    async fn call_script_names(&self) -> Vec<String> {
        match self.api.list_scripts().await {
            Ok(scripts) => scripts
                .into_iter()
                .filter(|s| s.kind == ScriptKind::Call)
                .map(|s| s.name)
                .collect(),
            Err(e) => {
                warn!(error = %e, "Failed to fetch scripts for help");
                Vec::new()
            }
        }
    }

    async fn list_scripts(&self) -> Reply {
        match self.api.list_scripts().await {
            Ok(scripts) if scripts.is_empty() => Reply::text("No scripts found."),
            Ok(scripts) => {
                let list: Vec<String> = scripts
                    .iter()
                    .map(|s| format!("- {} ({})", s.name, s.kind))
                    .collect();
                Reply::text(format!("📜 Available Scripts:\n\n{}", list.join("\n")))
            }
            Err(e) => Reply::text(format!("❌ API Error: {e}")),
        }
    }

    /// Serve updates from the transport until its stream ends.
    ///
    /// A panic while handling one update is logged and drops that
    /// operator's sessions; the loop keeps serving everyone else.
    pub async fn run(self: Arc<Self>, transport: Arc<TelegramTransport>) {
        let mut updates = transport.start();
        info!("Control bot started");

        while let Some(update) = updates.next().await {
            if let UpdateKind::Callback { id, .. } = &update.kind {
                if let Err(e) = transport.answer_callback(id).await {
                    warn!(error = %e, "Failed to answer callback query");
                }
            }

            let replies = match AssertUnwindSafe(self.handle(&update)).catch_unwind().await {
                Ok(replies) => replies,
                Err(_) => {
                    error!(operator = %update.operator, "Update handler panicked");
                    self.reset(&update.operator).await;
                    vec![Reply::text(FAILURE)]
                }
            };

            for reply in &replies {
                if let Err(e) = transport.send(&update.chat_id, reply).await {
                    error!(chat_id = %update.chat_id, error = %e, "Failed to send reply");
                }
            }
        }

        info!("Control bot stopped");
    }
}
