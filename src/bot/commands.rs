//! Operator message parsing.

/// Parses operator messages into bot input.
pub struct CommandParser;

impl CommandParser {
    /// Parse message text. Anything that is not a slash command is `Text`.
    pub fn parse(content: &str) -> BotInput {
        let trimmed = content.trim();
        if !trimmed.starts_with('/') {
            return BotInput::Text(content.to_string());
        }

        let (head, rest) = trimmed
            .split_once(char::is_whitespace)
            .unwrap_or((trimmed, ""));
        // Group chats address commands as `/call@botname`.
        let command = head
            .split_once('@')
            .map_or(head, |(c, _)| c)
            .to_lowercase();
        let rest = rest.trim();

        let parsed = match command.as_str() {
            "/start" => BotCommand::Start,
            "/help" | "/?" => BotCommand::Help,
            "/call" => BotCommand::Call,
            "/script" => BotCommand::Script,
            "/cancel" | "/cancelcall" => BotCommand::Cancel,
            "/scripts" => BotCommand::Scripts,
            "/deletescript" => BotCommand::DeleteScript {
                name: non_empty(rest),
            },
            "/user" => parse_user(rest),
            _ => BotCommand::Unknown(command),
        };
        BotInput::Command(parsed)
    }
}

fn non_empty(s: &str) -> Option<String> {
    let s = s.trim();
    (!s.is_empty()).then(|| s.to_string())
}

/// `/user add|delete|setadmin <id>` and `/user me`.
fn parse_user(rest: &str) -> BotCommand {
    let mut parts = rest.split_whitespace();
    let action = parts.next().map(str::to_lowercase);
    let target = parts.next().map(|id| id.trim_start_matches('@').to_string());

    let command = match (action.as_deref(), target) {
        (Some("me"), _) => UserCommand::Me,
        (Some("add"), Some(id)) => UserCommand::Add(id),
        (Some("delete") | Some("remove"), Some(id)) => UserCommand::Delete(id),
        (Some("setadmin"), Some(id)) => UserCommand::SetAdmin(id),
        _ => UserCommand::Usage,
    };
    BotCommand::User(command)
}

/// A parsed operator message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BotInput {
    Command(BotCommand),
    /// Free text, routed to the operator's active wizard if any.
    Text(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BotCommand {
    Start,
    Help,
    Call,
    Script,
    Cancel,
    Scripts,
    DeleteScript { name: Option<String> },
    User(UserCommand),
    Unknown(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UserCommand {
    Add(String),
    Delete(String),
    SetAdmin(String),
    Me,
    /// Missing or unrecognised arguments.
    Usage,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn command(text: &str) -> BotCommand {
        match CommandParser::parse(text) {
            BotInput::Command(c) => c,
            BotInput::Text(t) => panic!("expected command, got text {t:?}"),
        }
    }

    #[test]
    fn simple_commands() {
        assert_eq!(command("/start"), BotCommand::Start);
        assert_eq!(command("/HELP"), BotCommand::Help);
        assert_eq!(command(" /call "), BotCommand::Call);
        assert_eq!(command("/call@CallflowBot"), BotCommand::Call);
        assert_eq!(command("/script"), BotCommand::Script);
        assert_eq!(command("/scripts"), BotCommand::Scripts);
        assert_eq!(command("/cancel"), BotCommand::Cancel);
    }

    #[test]
    fn deletescript_keeps_name_case() {
        assert_eq!(
            command("/deletescript  Promo-1 "),
            BotCommand::DeleteScript {
                name: Some("Promo-1".into())
            }
        );
        assert_eq!(command("/deletescript"), BotCommand::DeleteScript { name: None });
    }

    #[test]
    fn user_subcommands() {
        assert_eq!(command("/user add 42"), BotCommand::User(UserCommand::Add("42".into())));
        assert_eq!(
            command("/user delete @42"),
            BotCommand::User(UserCommand::Delete("42".into()))
        );
        assert_eq!(
            command("/user setadmin 42"),
            BotCommand::User(UserCommand::SetAdmin("42".into()))
        );
        assert_eq!(command("/user me"), BotCommand::User(UserCommand::Me));
        assert_eq!(command("/user add"), BotCommand::User(UserCommand::Usage));
        assert_eq!(command("/user"), BotCommand::User(UserCommand::Usage));
    }

    #[test]
    fn unknown_and_text() {
        assert_eq!(command("/dance"), BotCommand::Unknown("/dance".into()));
        assert_eq!(
            CommandParser::parse("+33612345678"),
            BotInput::Text("+33612345678".into())
        );
    }
}
