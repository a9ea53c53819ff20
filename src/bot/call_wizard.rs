//! Call-initiation wizard: phone → service or script → confirm.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::warn;

use super::client::{CallTarget, ControlApi};
use super::wizard::{Reply, Transition, Wizard, WizardInput};
use crate::assets::BuiltinService;
use crate::dispatch::normalize_phone;
use crate::error::{ControlApiError, WizardError};
use crate::scripts::ScriptKind;
use crate::store::OperatorRole;

const PHONE_PROMPT: &str = "📱 Please enter the phone number to call (with country code):";
const INVALID_PHONE: &str =
    "❌ Invalid phone number. Please enter a valid phone number with country code:";
const SCRIPT_LABEL_PREFIX: &str = "script: ";

/// Steps of the call wizard; each carries what has been collected so far.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallStep {
    Phone,
    /// Call-script names offered in the menu when the step was entered.
    Service { phone: String, scripts: Vec<String> },
    Confirm { phone: String, target: CallTarget },
}

pub struct CallWizard {
    api: Arc<dyn ControlApi>,
}

impl CallWizard {
    pub fn new(api: Arc<dyn ControlApi>) -> Self {
        Self { api }
    }

    /// Names of the Call scripts currently available. A lookup failure
    /// leaves only the built-in services on the menu.
    async fn call_scripts(&self) -> Vec<String> {
        match self.api.list_scripts().await {
            Ok(scripts) => scripts
                .into_iter()
                .filter(|s| s.kind == ScriptKind::Call)
                .map(|s| s.name)
                .collect(),
            Err(e) => {
                warn!(error = %e, "Failed to fetch scripts for the call menu");
                Vec::new()
            }
        }
    }

    fn menu(scripts: &[String]) -> Reply {
        let labels: Vec<String> = BuiltinService::MENU
            .iter()
            .map(|s| s.label().to_string())
            .collect();
        let scripts: Vec<String> = scripts.iter().map(|n| format!("Script: {n}")).collect();

        let mut rows = rows_of_three(labels);
        rows.extend(rows_of_three(scripts));
        Reply::text("Select a service or custom script:").with_keyboard(rows)
    }

    fn select(choice: &str, scripts: &[String]) -> Option<CallTarget> {
        let choice = choice.trim();
        let lowered = choice.to_ascii_lowercase();
        if let Some(name) = lowered.strip_prefix(SCRIPT_LABEL_PREFIX) {
            return scripts
                .iter()
                .find(|s| s.eq_ignore_ascii_case(name.trim()))
                .map(|s| CallTarget::Script(s.clone()));
        }
        BuiltinService::from_label(choice)
            .or_else(|| BuiltinService::from_key(choice).filter(|s| BuiltinService::MENU.contains(s)))
            .map(CallTarget::Service)
    }
}

fn rows_of_three(items: Vec<String>) -> Vec<Vec<String>> {
    items.chunks(3).map(<[String]>::to_vec).collect()
}

#[async_trait]
impl Wizard for CallWizard {
    type Step = CallStep;

    fn name(&self) -> &'static str {
        "call"
    }

    fn required_role(&self) -> OperatorRole {
        OperatorRole::User
    }

    async fn begin(&self) -> Result<(CallStep, Reply), WizardError> {
        Ok((CallStep::Phone, Reply::text(PHONE_PROMPT)))
    }

    async fn transition(
        &self,
        step: &CallStep,
        input: WizardInput,
    ) -> Result<Transition<CallStep>, WizardError> {
        let WizardInput::Text(text) = input else {
            return Ok(Transition::Reject(match step {
                CallStep::Service { scripts, .. } => Self::menu(scripts),
                _ => Reply::text(PHONE_PROMPT),
            }));
        };

        match step {
            CallStep::Phone => {
                let Some(phone) = normalize_phone(&text) else {
                    return Ok(Transition::Reject(Reply::text(INVALID_PHONE)));
                };
                let scripts = self.call_scripts().await;
                let menu = Self::menu(&scripts);
                Ok(Transition::Advance(CallStep::Service { phone, scripts }, menu))
            }
            CallStep::Service { phone, scripts } => {
                let Some(target) = Self::select(&text, scripts) else {
                    let mut menu = Self::menu(scripts);
                    menu.text = format!("❌ Unknown choice. {}", menu.text);
                    return Ok(Transition::Reject(menu));
                };
                let summary = Reply::text(format!("📞 Call Summary:\n\nPhone: {phone}\n{target}"));
                Ok(Transition::Advance(
                    CallStep::Confirm {
                        phone: phone.clone(),
                        target,
                    },
                    summary,
                ))
            }
            CallStep::Confirm { .. } => Err(WizardError::InvalidState {
                wizard: "call".into(),
                reason: "confirm step takes no input".into(),
            }),
        }
    }

    fn is_confirm(&self, step: &CallStep) -> bool {
        matches!(step, CallStep::Confirm { .. })
    }

    async fn confirm(&self, step: CallStep) -> Result<Reply, WizardError> {
        let CallStep::Confirm { phone, target } = step else {
            return Err(WizardError::InvalidState {
                wizard: "call".into(),
                reason: format!("cannot dispatch from {step:?}"),
            });
        };

        match self.api.place_call(&phone, &target).await {
            Ok(call) => Ok(Reply::text(format!(
                "✅ Call initiated successfully!\nSID: {}\nStatus: {}",
                call.sid,
                call.status.as_deref().unwrap_or("unknown")
            ))),
            Err(ControlApiError::Rejected(reason)) => {
                Ok(Reply::text(format!("❌ Failed to initiate call: {reason}")))
            }
            Err(e) => Err(e.into()),
        }
    }

    fn cancelled(&self) -> Reply {
        Reply::text("❌ Call cancelled.")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bot::wizard::ReplyMarkup;

    #[test]
    fn menu_lists_services_then_scripts_in_rows_of_three() {
        let reply = CallWizard::menu(&["promo".into(), "vip".into()]);
        let ReplyMarkup::Keyboard(rows) = reply.markup else {
            panic!("expected reply keyboard");
        };
        assert_eq!(rows[0], vec!["Amazon", "PayPal", "Google"]);
        assert_eq!(rows[2], vec!["Snapchat", "WhatsApp", "Bank"]);
        assert_eq!(rows[3], vec!["Default"]);
        assert_eq!(rows[4], vec!["Script: promo", "Script: vip"]);
    }

    #[test]
    fn select_maps_labels_and_scripts() {
        let scripts = vec!["Promo".to_string()];
        assert_eq!(
            CallWizard::select("Bank", &scripts),
            Some(CallTarget::Service(BuiltinService::Banque))
        );
        assert_eq!(
            CallWizard::select("paypal", &scripts),
            Some(CallTarget::Service(BuiltinService::Paypal))
        );
        assert_eq!(
            CallWizard::select("Script: promo", &scripts),
            Some(CallTarget::Script("Promo".into()))
        );
        assert_eq!(CallWizard::select("Script: other", &scripts), None);
        assert_eq!(CallWizard::select("end", &scripts), None);
        assert_eq!(CallWizard::select("myspace", &scripts), None);
    }
}
