//! Asset resolver — maps a service or script key to the prompt to play.
//!
//! Resolution order: built-in service, then registered script, then the
//! default prompt. Resolution never fails.
//!
//! Script entries live in a copy-on-write snapshot. Writers hold the write
//! lock for the whole clone-modify-swap, so registrations are serialized and
//! a reader only ever sees a complete map. Readers clone the `Arc` and drop
//! the lock before doing any work.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};

use tracing::{debug, info};

use super::builtin::BuiltinService;
use crate::error::AssetError;

/// Where a resolved asset came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AssetSource {
    Builtin(BuiltinService),
    Script,
}

/// A resolved prompt: the key it is served under and the file backing it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssetRef {
    /// Canonical (lowercase) key.
    pub key: String,
    pub path: PathBuf,
    pub source: AssetSource,
}

impl AssetRef {
    /// Whether this is the designated fallback prompt.
    pub fn is_default(&self) -> bool {
        self.source == AssetSource::Builtin(BuiltinService::Default)
    }
}

type ScriptMap = HashMap<String, PathBuf>;

/// Resolves keys to audio assets.
pub struct AssetResolver {
    voice_dir: PathBuf,
    builtins: HashMap<BuiltinService, PathBuf>,
    scripts: RwLock<Arc<ScriptMap>>,
}

impl AssetResolver {
    /// Create a resolver with every built-in at its stock location.
    pub fn new(voice_dir: impl Into<PathBuf>) -> Self {
        Self::with_overrides(voice_dir, |_| None)
    }

    /// Create a resolver, letting `<SERVICE>_FILE_PATH` lookups relocate
    /// individual built-in prompts. Override paths are used as given.
    pub fn with_overrides(
        voice_dir: impl Into<PathBuf>,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Self {
        let voice_dir = voice_dir.into();
        let builtins = BuiltinService::ALL
            .into_iter()
            .map(|service| {
                let path = lookup(&service.override_var())
                    .filter(|p| !p.trim().is_empty())
                    .map(PathBuf::from)
                    .unwrap_or_else(|| voice_dir.join(service.default_asset_path()));
                (service, path)
            })
            .collect();

        Self {
            voice_dir,
            builtins,
            scripts: RwLock::new(Arc::new(HashMap::new())),
        }
    }

    /// Root directory for assets.
    pub fn voice_dir(&self) -> &Path {
        &self.voice_dir
    }

    /// Absolute path for an asset stored relative to the voice directory.
    pub fn asset_path(&self, relative: &str) -> PathBuf {
        self.voice_dir.join(relative)
    }

    /// Resolve a key (case-insensitive) to an asset. Unknown keys resolve to
    /// the default prompt.
    pub fn resolve(&self, key: &str) -> AssetRef {
        let key = normalize_key(key);

        if let Some(service) = BuiltinService::from_key(&key) {
            return self.builtin(service);
        }

        if let Some(path) = self.snapshot().get(&key) {
            return AssetRef {
                key,
                path: path.clone(),
                source: AssetSource::Script,
            };
        }

        debug!(key = %key, "No asset registered, using default prompt");
        self.default_asset()
    }

    /// The asset for a built-in service.
    pub fn builtin(&self, service: BuiltinService) -> AssetRef {
        let path = self
            .builtins
            .get(&service)
            .cloned()
            .unwrap_or_else(|| self.voice_dir.join(service.default_asset_path()));
        AssetRef {
            key: service.key().to_string(),
            path,
            source: AssetSource::Builtin(service),
        }
    }

    /// The designated fallback asset.
    pub fn default_asset(&self) -> AssetRef {
        self.builtin(BuiltinService::Default)
    }

    /// Whether a script asset is registered under `key`.
    pub fn has_script(&self, key: &str) -> bool {
        self.snapshot().contains_key(&normalize_key(key))
    }

    /// Sorted keys of all registered script assets.
    pub fn script_keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.snapshot().keys().cloned().collect();
        keys.sort();
        keys
    }

    /// Register a script asset. Rejects built-in keys and existing entries;
    /// an entry is never silently overwritten.
    pub fn register(&self, name: &str, path: PathBuf) -> Result<AssetRef, AssetError> {
        let key = normalize_key(name);
        if BuiltinService::from_key(&key).is_some() {
            return Err(AssetError::Reserved { key });
        }

        let mut guard = self
            .scripts
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        if guard.contains_key(&key) {
            return Err(AssetError::Conflict { key });
        }
        let mut next = ScriptMap::clone(&guard);
        next.insert(key.clone(), path.clone());
        *guard = Arc::new(next);
        drop(guard);

        info!(key = %key, path = %path.display(), "Script asset registered");
        Ok(AssetRef {
            key,
            path,
            source: AssetSource::Script,
        })
    }

    /// Remove a script asset. Returns whether an entry was removed.
    pub fn unregister(&self, name: &str) -> bool {
        let key = normalize_key(name);
        let mut guard = self
            .scripts
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        if !guard.contains_key(&key) {
            return false;
        }
        let mut next = ScriptMap::clone(&guard);
        next.remove(&key);
        *guard = Arc::new(next);
        drop(guard);

        info!(key = %key, "Script asset unregistered");
        true
    }

    fn snapshot(&self) -> Arc<ScriptMap> {
        let guard = self
            .scripts
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        Arc::clone(&guard)
    }
}

fn normalize_key(key: &str) -> String {
    key.trim().to_lowercase()
}
