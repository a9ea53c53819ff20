//! Interactive call flow — webhook turns in, call-control documents out.

pub mod flow;
pub mod twiml;

pub use flow::{CallFlowEngine, CallTurn, ResolvedTurn};
pub use twiml::VoiceResponse;
