//! Callflow — outbound call campaigns with touch-tone code capture, SMS
//! dispatch and a chat-bot control plane.

pub mod api;
pub mod assets;
pub mod bot;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod media;
pub mod scripts;
pub mod store;
pub mod voice;
