//! Scripts — operator-authored prompts and messages.

pub mod model;
pub mod service;
pub mod synth;

pub use model::{CallRecord, NewScript, ScriptDescriptor, ScriptKind, SmsRecord};
pub use service::ScriptService;
pub use synth::{ElevenLabsSynthesizer, SpeechSynthesizer};
