//! Script-authoring wizard: name → type → message → confirm.

use std::sync::Arc;

use async_trait::async_trait;

use super::client::ControlApi;
use super::wizard::{InlineButton, Reply, Transition, Wizard, WizardInput};
use crate::error::{ControlApiError, ScriptError, WizardError};
use crate::scripts::{ScriptKind, ScriptService};
use crate::store::OperatorRole;

const NAME_PROMPT: &str = "📝 Let's create a new script. First, send me the script name:";
const TYPE_CALL: &str = "script_type_call";
const TYPE_SMS: &str = "script_type_sms";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScriptStep {
    Name,
    Kind {
        name: String,
    },
    Message {
        name: String,
        kind: ScriptKind,
    },
    Confirm {
        name: String,
        kind: ScriptKind,
        message: String,
    },
}

pub struct ScriptWizard {
    api: Arc<dyn ControlApi>,
}

impl ScriptWizard {
    pub fn new(api: Arc<dyn ControlApi>) -> Self {
        Self { api }
    }

    fn kind_prompt() -> Reply {
        Reply::text("Select script type:").with_inline(vec![
            vec![InlineButton::new("Call Script", TYPE_CALL)],
            vec![InlineButton::new("SMS Script", TYPE_SMS)],
        ])
    }

    fn parse_kind(input: &WizardInput) -> Option<ScriptKind> {
        match input {
            WizardInput::Choice(data) => match data.as_str() {
                TYPE_CALL => Some(ScriptKind::Call),
                TYPE_SMS => Some(ScriptKind::Sms),
                _ => None,
            },
            WizardInput::Text(text) => text.parse().ok(),
        }
    }
}

#[async_trait]
impl Wizard for ScriptWizard {
    type Step = ScriptStep;

    fn name(&self) -> &'static str {
        "script"
    }

    fn required_role(&self) -> OperatorRole {
        OperatorRole::Admin
    }

    async fn begin(&self) -> Result<(ScriptStep, Reply), WizardError> {
        Ok((ScriptStep::Name, Reply::text(NAME_PROMPT)))
    }

    async fn transition(
        &self,
        step: &ScriptStep,
        input: WizardInput,
    ) -> Result<Transition<ScriptStep>, WizardError> {
        match step {
            ScriptStep::Name => {
                let WizardInput::Text(text) = input else {
                    return Ok(Transition::Reject(Reply::text(NAME_PROMPT)));
                };
                let name = text.trim().to_string();
                if let Err(ScriptError::Validation(reason)) = ScriptService::validate_name(&name) {
                    return Ok(Transition::Reject(Reply::text(format!(
                        "❌ {reason}. Please send another name:"
                    ))));
                }
                Ok(Transition::Advance(ScriptStep::Kind { name }, Self::kind_prompt()))
            }
            ScriptStep::Kind { name } => {
                let Some(kind) = Self::parse_kind(&input) else {
                    return Ok(Transition::Reject(Self::kind_prompt()));
                };
                let prompt = match kind {
                    ScriptKind::Call => "📝 Now send me the script message for the call:",
                    ScriptKind::Sms => "📝 Now send me the script message for the SMS:",
                };
                Ok(Transition::Advance(
                    ScriptStep::Message {
                        name: name.clone(),
                        kind,
                    },
                    Reply::text(prompt),
                ))
            }
            ScriptStep::Message { name, kind } => {
                let message = match input {
                    WizardInput::Text(text) if !text.trim().is_empty() => text,
                    _ => {
                        return Ok(Transition::Reject(Reply::text(
                            "❌ The message cannot be empty. Please send the script message:",
                        )));
                    }
                };
                let summary = Reply::text(format!(
                    "📋 Script Summary:\n\nName: {name}\nType: {kind}\nMessage:\n{message}"
                ));
                Ok(Transition::Advance(
                    ScriptStep::Confirm {
                        name: name.clone(),
                        kind: *kind,
                        message,
                    },
                    summary,
                ))
            }
            ScriptStep::Confirm { .. } => Err(WizardError::InvalidState {
                wizard: "script".into(),
                reason: "confirm step takes no input".into(),
            }),
        }
    }

    fn is_confirm(&self, step: &ScriptStep) -> bool {
        matches!(step, ScriptStep::Confirm { .. })
    }

    async fn confirm(&self, step: ScriptStep) -> Result<Reply, WizardError> {
        let ScriptStep::Confirm {
            name,
            kind,
            message,
        } = step
        else {
            return Err(WizardError::InvalidState {
                wizard: "script".into(),
                reason: format!("cannot dispatch from {step:?}"),
            });
        };

        match self.api.create_script(&name, kind, &message).await {
            Ok(script) => Ok(Reply::text(format!(
                "✅ Script \"{}\" created successfully!",
                script.name
            ))),
            Err(ControlApiError::Rejected(reason)) => {
                Ok(Reply::text(format!("❌ Failed to create script: {reason}")))
            }
            Err(e) => Err(e.into()),
        }
    }

    fn cancelled(&self) -> Reply {
        Reply::text("❌ Script creation cancelled.")
    }
}
