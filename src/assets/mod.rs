//! Audio assets — built-in prompts and per-script recordings.

pub mod builtin;
pub mod registry;

pub use builtin::BuiltinService;
pub use registry::{AssetRef, AssetResolver, AssetSource};
