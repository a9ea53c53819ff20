//! Help and welcome text.

use crate::assets::BuiltinService;

const COMMANDS: &str = "\
Admin commands:
/user add <id> - Allow someone to use the bot
/user delete <id> - Remove a user or an admin
/user setadmin <id> - Make a user an admin
/script - Create a new custom script
/scripts - List all scripts
/deletescript <name> - Delete a script

Commands for everyone:
/call - Place a call and capture the code
/cancel - Cancel the current call or script setup
/user me - Show your ID and role
/help - Show this message";

/// Help message listing commands, built-in services and Call scripts.
pub fn help_text(call_scripts: &[String]) -> String {
    let mut text = format!("ℹ️ Help & Commands\n\n{COMMANDS}\n\nCall services:\n");
    for (i, service) in BuiltinService::MENU.iter().enumerate() {
        text.push_str(&format!("{}. {}\n", i + 1, service.label()));
    }

    if !call_scripts.is_empty() {
        text.push_str("\nCustom scripts:\n");
        for (i, name) in call_scripts.iter().enumerate() {
            text.push_str(&format!("{}. {name}\n", i + 1));
        }
    }
    text.trim_end().to_string()
}

pub fn welcome_text(call_scripts: &[String]) -> String {
    format!("👋 Welcome!\n\n{}", help_text(call_scripts))
}
