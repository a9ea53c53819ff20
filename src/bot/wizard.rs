//! Generic multi-step wizard engine.
//!
//! A [`Wizard`] declares its steps as a typed enum and a transition function.
//! [`WizardEngine`] owns the per-operator sessions, gates entry on the
//! operator's role and drives the confirm/cancel terminal step.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

use super::auth::Authorizer;
use crate::error::WizardError;
use crate::store::OperatorRole;

pub const UNAUTHORIZED: &str = "⛔ You are not authorized to use this command.";
pub const FAILURE: &str = "❌ An error occurred while processing your request.";
const CONFIRM_REMINDER: &str = "Please confirm or cancel using the buttons above.";

/// A button on an inline keyboard.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InlineButton {
    pub label: String,
    pub data: String,
}

impl InlineButton {
    pub fn new(label: impl Into<String>, data: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            data: data.into(),
        }
    }
}

/// Keyboard attached to an outgoing message.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum ReplyMarkup {
    #[default]
    None,
    /// One-time reply keyboard; pressing a button sends its label as text.
    Keyboard(Vec<Vec<String>>),
    /// Buttons that answer with callback data.
    Inline(Vec<Vec<InlineButton>>),
    RemoveKeyboard,
}

/// A message for the operator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    pub text: String,
    pub markup: ReplyMarkup,
}

impl Reply {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            markup: ReplyMarkup::None,
        }
    }

    pub fn with_keyboard(mut self, rows: Vec<Vec<String>>) -> Self {
        self.markup = ReplyMarkup::Keyboard(rows);
        self
    }

    pub fn with_inline(mut self, rows: Vec<Vec<InlineButton>>) -> Self {
        self.markup = ReplyMarkup::Inline(rows);
        self
    }

    pub fn remove_keyboard(mut self) -> Self {
        self.markup = ReplyMarkup::RemoveKeyboard;
        self
    }
}

/// Operator input routed to an active wizard.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WizardInput {
    /// A typed message, or a reply-keyboard press.
    Text(String),
    /// Callback data from an inline button.
    Choice(String),
}

/// Outcome of feeding input to a step.
#[derive(Debug, Clone, PartialEq)]
pub enum Transition<S> {
    /// Input accepted; move to the next step and show its prompt.
    Advance(S, Reply),
    /// Input rejected; stay on the current step and re-prompt.
    Reject(Reply),
}

/// A step-driven conversation.
#[async_trait]
pub trait Wizard: Send + Sync {
    type Step: Clone + std::fmt::Debug + Send + Sync;

    /// Prefix of the confirm/cancel callback data (`{name}_confirm`).
    fn name(&self) -> &'static str;

    fn required_role(&self) -> OperatorRole;

    /// First step and its prompt.
    async fn begin(&self) -> Result<(Self::Step, Reply), WizardError>;

    /// Feed input to a non-terminal step.
    async fn transition(
        &self,
        step: &Self::Step,
        input: WizardInput,
    ) -> Result<Transition<Self::Step>, WizardError>;

    /// Whether the step is the confirmation terminal.
    fn is_confirm(&self, step: &Self::Step) -> bool;

    /// Perform the wizard's single dispatch with the accumulated data.
    async fn confirm(&self, step: Self::Step) -> Result<Reply, WizardError>;

    fn cancelled(&self) -> Reply;
}

/// Drives one wizard for every operator.
pub struct WizardEngine<W: Wizard> {
    wizard: W,
    authorizer: Arc<dyn Authorizer>,
    sessions: Mutex<HashMap<String, W::Step>>,
}

impl<W: Wizard> WizardEngine<W> {
    pub fn new(wizard: W, authorizer: Arc<dyn Authorizer>) -> Self {
        Self {
            wizard,
            authorizer,
            sessions: Mutex::new(HashMap::new()),
        }
    }

    pub fn name(&self) -> &'static str {
        self.wizard.name()
    }

    fn confirm_data(&self) -> String {
        format!("{}_confirm", self.wizard.name())
    }

    fn cancel_data(&self) -> String {
        format!("{}_cancel", self.wizard.name())
    }

    fn confirm_buttons(&self) -> Vec<Vec<InlineButton>> {
        vec![
            vec![InlineButton::new("✅ Confirm", self.confirm_data())],
            vec![InlineButton::new("❌ Cancel", self.cancel_data())],
        ]
    }

    async fn authorized(&self, operator: &str) -> bool {
        match self.authorizer.role(operator).await {
            Ok(Some(role)) => role >= self.wizard.required_role(),
            Ok(None) => false,
            Err(e) => {
                error!(operator = %operator, error = %e, "Operator lookup failed");
                false
            }
        }
    }

    /// Enter the wizard, replacing any session the operator already had.
    pub async fn start(&self, operator: &str) -> Reply {
        if !self.authorized(operator).await {
            warn!(operator = %operator, wizard = self.name(), "Unauthorized wizard entry");
            return Reply::text(UNAUTHORIZED);
        }

        match self.wizard.begin().await {
            Ok((step, reply)) => {
                let replaced = self
                    .sessions
                    .lock()
                    .await
                    .insert(operator.to_string(), step)
                    .is_some();
                debug!(operator = %operator, wizard = self.name(), replaced, "Wizard started");
                reply
            }
            Err(e) => {
                error!(operator = %operator, wizard = self.name(), error = %e, "Wizard failed to start");
                self.sessions.lock().await.remove(operator);
                Reply::text(FAILURE)
            }
        }
    }

    /// Route input to the operator's session. `None` when no session is open.
    pub async fn handle(&self, operator: &str, input: WizardInput) -> Option<Reply> {
        let step = self.sessions.lock().await.get(operator).cloned()?;

        if self.wizard.is_confirm(&step) {
            return Some(self.finish(operator, step, input).await);
        }

        let reply = match self.wizard.transition(&step, input).await {
            Ok(Transition::Advance(next, reply)) => {
                let reply = if self.wizard.is_confirm(&next) {
                    reply.with_inline(self.confirm_buttons())
                } else {
                    reply
                };
                debug!(operator = %operator, wizard = self.name(), step = ?next, "Wizard advanced");
                self.sessions
                    .lock()
                    .await
                    .insert(operator.to_string(), next);
                reply
            }
            Ok(Transition::Reject(reply)) => reply,
            Err(e) => {
                error!(operator = %operator, wizard = self.name(), error = %e, "Wizard step failed");
                self.sessions.lock().await.remove(operator);
                Reply::text(FAILURE)
            }
        };
        Some(reply)
    }

    async fn finish(&self, operator: &str, step: W::Step, input: WizardInput) -> Reply {
        let choice = match input {
            WizardInput::Choice(data) => data,
            WizardInput::Text(_) => {
                return Reply::text(CONFIRM_REMINDER).with_inline(self.confirm_buttons());
            }
        };

        if choice == self.cancel_data() {
            self.sessions.lock().await.remove(operator);
            info!(operator = %operator, wizard = self.name(), "Wizard cancelled");
            return self.wizard.cancelled();
        }
        if choice != self.confirm_data() {
            return Reply::text(CONFIRM_REMINDER).with_inline(self.confirm_buttons());
        }

        // A repeated confirm press finds no session.
        self.sessions.lock().await.remove(operator);
        match self.wizard.confirm(step).await {
            Ok(reply) => {
                info!(operator = %operator, wizard = self.name(), "Wizard completed");
                reply
            }
            Err(e) => {
                error!(operator = %operator, wizard = self.name(), error = %e, "Wizard dispatch failed");
                Reply::text(FAILURE)
            }
        }
    }

    /// Drop the operator's session. Returns whether one was open.
    pub async fn cancel(&self, operator: &str) -> bool {
        self.sessions.lock().await.remove(operator).is_some()
    }

    pub async fn is_active(&self, operator: &str) -> bool {
        self.sessions.lock().await.contains_key(operator)
    }

    /// Current step of the operator's session.
    pub async fn step(&self, operator: &str) -> Option<W::Step> {
        self.sessions.lock().await.get(operator).cloned()
    }
}
