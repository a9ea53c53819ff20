//! Script lifecycle — create, list, look up, delete.
//!
//! Creation is all-or-nothing: synthesis, the row, the asset file and the
//! registry entry either all land or every step already taken is undone.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{info, warn};
use uuid::Uuid;

use super::model::{NewScript, ScriptDescriptor, ScriptKind};
use super::synth::SpeechSynthesizer;
use crate::assets::{AssetResolver, BuiltinService};
use crate::error::{DatabaseError, ScriptError};
use crate::media::SCRIPT_PREFIX;
use crate::store::Database;

/// Longest accepted script name.
pub const MAX_NAME_LEN: usize = 64;

pub struct ScriptService {
    db: Arc<dyn Database>,
    assets: Arc<AssetResolver>,
    synthesizer: Option<Arc<dyn SpeechSynthesizer>>,
}

impl ScriptService {
    pub fn new(
        db: Arc<dyn Database>,
        assets: Arc<AssetResolver>,
        synthesizer: Option<Arc<dyn SpeechSynthesizer>>,
    ) -> Self {
        Self {
            db,
            assets,
            synthesizer,
        }
    }

    /// Check a proposed script name.
    pub fn validate_name(name: &str) -> Result<(), ScriptError> {
        if name.is_empty() || name.len() > MAX_NAME_LEN {
            return Err(ScriptError::Validation(format!(
                "Script name must be 1-{MAX_NAME_LEN} characters"
            )));
        }
        if !name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
        {
            return Err(ScriptError::Validation(
                "Script name may only contain letters, digits, '_' and '-'".into(),
            ));
        }
        if BuiltinService::from_key(name).is_some() {
            return Err(ScriptError::Validation(format!(
                "'{name}' is a built-in service name"
            )));
        }
        if name.to_ascii_lowercase().starts_with(SCRIPT_PREFIX) {
            return Err(ScriptError::Validation(format!(
                "Script names may not start with '{SCRIPT_PREFIX}'"
            )));
        }
        Ok(())
    }

    /// Create a script. Call scripts get synthesized audio when a
    /// synthesizer is configured.
    pub async fn create(
        &self,
        name: &str,
        kind: ScriptKind,
        message: &str,
    ) -> Result<ScriptDescriptor, ScriptError> {
        let name = name.trim();
        Self::validate_name(name)?;
        let message = message.trim();
        if message.is_empty() {
            return Err(ScriptError::Validation("Script message is required".into()));
        }

        let audio = match (&self.synthesizer, kind) {
            (Some(synth), ScriptKind::Call) => Some(synth.synthesize(message).await?),
            _ => None,
        };

        let new_script = NewScript {
            name: name.to_string(),
            kind,
            message: message.to_string(),
            asset_path: audio.as_ref().map(|_| NewScript::asset_path_for(name)),
        };
        let script = self.db.insert_script(&new_script).await.map_err(|e| match e {
            DatabaseError::Constraint(_) => ScriptError::Conflict {
                name: name.to_string(),
            },
            other => ScriptError::Persistence(other),
        })?;

        if let (Some(audio), Some(relative)) = (audio, script.asset_path.as_deref()) {
            let path = self.assets.asset_path(relative);
            if let Err(e) = write_atomically(&path, &audio).await {
                self.discard_row(name).await;
                return Err(e);
            }
            if let Err(e) = self.assets.register(name, path.clone()) {
                warn!(script = %name, error = %e, "Asset registration failed, rolling back");
                remove_asset(&path).await;
                self.discard_row(name).await;
                return Err(ScriptError::Conflict {
                    name: name.to_string(),
                });
            }
        }

        info!(script = %script.name, kind = %script.kind, has_asset = script.asset_path.is_some(), "Script created");
        Ok(script)
    }

    pub async fn list(&self) -> Result<Vec<ScriptDescriptor>, ScriptError> {
        Ok(self.db.list_scripts().await?)
    }

    pub async fn get(&self, name: &str) -> Result<ScriptDescriptor, ScriptError> {
        self.db
            .get_script(name.trim())
            .await?
            .ok_or_else(|| ScriptError::NotFound {
                name: name.trim().to_string(),
            })
    }

    /// Delete a script, its registry entry and its asset file.
    pub async fn delete(&self, name: &str) -> Result<ScriptDescriptor, ScriptError> {
        let script = self.get(name).await?;
        if !self.db.delete_script(&script.name).await? {
            return Err(ScriptError::NotFound {
                name: script.name.clone(),
            });
        }

        self.assets.unregister(&script.name);
        if let Some(relative) = script.asset_path.as_deref() {
            remove_asset(&self.assets.asset_path(relative)).await;
        }

        info!(script = %script.name, "Script deleted");
        Ok(script)
    }

    /// Register every persisted Call script whose asset is on disk. Returns
    /// the number registered.
    pub async fn load_registry(&self) -> Result<usize, ScriptError> {
        let mut loaded = 0;
        for script in self.db.list_scripts().await? {
            let Some(relative) = script.asset_path.as_deref() else {
                continue;
            };
            if script.kind != ScriptKind::Call {
                continue;
            }
            let path = self.assets.asset_path(relative);
            if !tokio::fs::try_exists(&path).await.unwrap_or(false) {
                warn!(script = %script.name, path = %path.display(), "Script asset missing on disk");
                continue;
            }
            match self.assets.register(&script.name, path) {
                Ok(_) => loaded += 1,
                Err(e) => warn!(script = %script.name, error = %e, "Skipping script asset"),
            }
        }
        info!(count = loaded, "Script assets loaded");
        Ok(loaded)
    }

    async fn discard_row(&self, name: &str) {
        if let Err(e) = self.db.delete_script(name).await {
            warn!(script = %name, error = %e, "Failed to roll back script row");
        }
    }
}

/// Write via a uniquely named temp file in the target directory, then
/// rename into place.
async fn write_atomically(path: &Path, bytes: &[u8]) -> Result<(), ScriptError> {
    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    tokio::fs::create_dir_all(dir).await.map_err(|e| io_error(dir, e))?;

    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "asset".to_string());
    let tmp: PathBuf = dir.join(format!("{file_name}.{}.tmp", Uuid::new_v4()));

    tokio::fs::write(&tmp, bytes).await.map_err(|e| io_error(&tmp, e))?;
    if let Err(e) = tokio::fs::rename(&tmp, path).await {
        let _ = tokio::fs::remove_file(&tmp).await;
        return Err(io_error(path, e));
    }
    Ok(())
}

fn io_error(path: &Path, source: std::io::Error) -> ScriptError {
    ScriptError::Io {
        path: path.display().to_string(),
        source,
    }
}

/// Remove an asset file and its directory when that leaves it empty.
async fn remove_asset(path: &Path) {
    match tokio::fs::remove_file(path).await {
        Ok(()) => {}
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => warn!(path = %path.display(), error = %e, "Failed to remove asset file"),
    }
    if let Some(dir) = path.parent() {
        // Fails harmlessly when other files remain.
        let _ = tokio::fs::remove_dir(dir).await;
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;

    use super::*;
    use crate::error::SynthesisError;
    use crate::store::LibSqlBackend;

    struct FakeSynth {
        calls: AtomicUsize,
        fail: bool,
    }

    impl FakeSynth {
        fn ok() -> Arc<Self> {
            Arc::new(Self {
                calls: AtomicUsize::new(0),
                fail: false,
            })
        }
    }

    #[async_trait]
    impl SpeechSynthesizer for FakeSynth {
        fn name(&self) -> &str {
            "fake"
        }

        async fn synthesize(&self, text: &str) -> Result<Vec<u8>, SynthesisError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(SynthesisError::Rejected {
                    provider: "fake".into(),
                    status: 401,
                    message: "bad key".into(),
                });
            }
            Ok(format!("mp3:{text}").into_bytes())
        }
    }

    async fn service(
        dir: &tempfile::TempDir,
        synth: Option<Arc<dyn SpeechSynthesizer>>,
    ) -> (ScriptService, Arc<AssetResolver>) {
        let db = Arc::new(LibSqlBackend::new_memory().await.unwrap());
        let assets = Arc::new(AssetResolver::new(dir.path()));
        (ScriptService::new(db, assets.clone(), synth), assets)
    }

    #[test]
    fn name_validation() {
        assert!(ScriptService::validate_name("promo-2_b").is_ok());
        assert!(ScriptService::validate_name("").is_err());
        assert!(ScriptService::validate_name("has space").is_err());
        assert!(ScriptService::validate_name("../etc").is_err());
        assert!(ScriptService::validate_name("PayPal").is_err());
        assert!(ScriptService::validate_name("script_x").is_err());
        assert!(ScriptService::validate_name(&"a".repeat(65)).is_err());
    }

    #[tokio::test]
    async fn call_script_gets_asset_and_registration() {
        let dir = tempfile::tempdir().unwrap();
        let synth = FakeSynth::ok();
        let (svc, assets) = service(&dir, Some(synth.clone())).await;

        let script = svc.create("promo", ScriptKind::Call, "Enter your code").await.unwrap();
        assert_eq!(script.asset_path.as_deref(), Some("en/promo/ask-promo.mp3"));

        let on_disk = std::fs::read(dir.path().join("en/promo/ask-promo.mp3")).unwrap();
        assert_eq!(on_disk, b"mp3:Enter your code");
        assert!(assets.has_script("promo"));
        assert_eq!(synth.calls.load(Ordering::SeqCst), 1);

        let leftovers: Vec<_> = std::fs::read_dir(dir.path().join("en/promo"))
            .unwrap()
            .collect();
        assert_eq!(leftovers.len(), 1);
    }

    #[tokio::test]
    async fn sms_script_has_no_asset() {
        let dir = tempfile::tempdir().unwrap();
        let synth = FakeSynth::ok();
        let (svc, assets) = service(&dir, Some(synth.clone())).await;

        let script = svc.create("notice", ScriptKind::Sms, "Hello").await.unwrap();
        assert!(script.asset_path.is_none());
        assert!(!assets.has_script("notice"));
        assert_eq!(synth.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn call_script_without_synthesizer_is_stored_bare() {
        let dir = tempfile::tempdir().unwrap();
        let (svc, assets) = service(&dir, None).await;

        let script = svc.create("promo", ScriptKind::Call, "Hi").await.unwrap();
        assert!(script.asset_path.is_none());
        assert!(!assets.has_script("promo"));
    }

    #[tokio::test]
    async fn duplicate_name_conflicts_and_keeps_original() {
        let dir = tempfile::tempdir().unwrap();
        let (svc, _assets) = service(&dir, Some(FakeSynth::ok())).await;

        svc.create("promo", ScriptKind::Call, "first").await.unwrap();
        let err = svc
            .create("PROMO", ScriptKind::Sms, "second")
            .await
            .unwrap_err();
        assert!(matches!(err, ScriptError::Conflict { .. }));

        let kept = svc.get("promo").await.unwrap();
        assert_eq!(kept.message, "first");
        assert_eq!(kept.kind, ScriptKind::Call);
        let on_disk = std::fs::read(dir.path().join("en/promo/ask-promo.mp3")).unwrap();
        assert_eq!(on_disk, b"mp3:first");
    }

    #[tokio::test]
    async fn synthesis_failure_leaves_nothing_behind() {
        let dir = tempfile::tempdir().unwrap();
        let synth = Arc::new(FakeSynth {
            calls: AtomicUsize::new(0),
            fail: true,
        });
        let (svc, assets) = service(&dir, Some(synth)).await;

        let err = svc.create("promo", ScriptKind::Call, "Hi").await.unwrap_err();
        assert!(matches!(err, ScriptError::Synthesis(_)));
        assert!(matches!(
            svc.get("promo").await.unwrap_err(),
            ScriptError::NotFound { .. }
        ));
        assert!(!assets.has_script("promo"));
        assert!(!dir.path().join("en/promo").exists());
    }

    #[tokio::test]
    async fn registry_conflict_rolls_back_row_and_file() {
        let dir = tempfile::tempdir().unwrap();
        let (svc, assets) = service(&dir, Some(FakeSynth::ok())).await;
        assets
            .register("promo", PathBuf::from("/elsewhere/promo.mp3"))
            .unwrap();

        let err = svc.create("promo", ScriptKind::Call, "Hi").await.unwrap_err();
        assert!(matches!(err, ScriptError::Conflict { .. }));
        assert!(svc.list().await.unwrap().is_empty());
        assert!(!dir.path().join("en/promo/ask-promo.mp3").exists());
        assert_eq!(
            assets.resolve("promo").path,
            PathBuf::from("/elsewhere/promo.mp3")
        );
    }

    #[tokio::test]
    async fn delete_removes_row_registration_and_file() {
        let dir = tempfile::tempdir().unwrap();
        let (svc, assets) = service(&dir, Some(FakeSynth::ok())).await;
        svc.create("promo", ScriptKind::Call, "Hi").await.unwrap();

        let deleted = svc.delete("Promo").await.unwrap();
        assert_eq!(deleted.name, "promo");
        assert!(!assets.has_script("promo"));
        assert!(!dir.path().join("en/promo").exists());
        assert!(matches!(
            svc.delete("promo").await.unwrap_err(),
            ScriptError::NotFound { .. }
        ));
    }

    #[tokio::test]
    async fn load_registry_restores_call_scripts() {
        let dir = tempfile::tempdir().unwrap();
        let db: Arc<dyn Database> = Arc::new(LibSqlBackend::new_memory().await.unwrap());

        let first = ScriptService::new(
            db.clone(),
            Arc::new(AssetResolver::new(dir.path())),
            Some(FakeSynth::ok()),
        );
        first.create("promo", ScriptKind::Call, "Hi").await.unwrap();
        first.create("notice", ScriptKind::Sms, "Hi").await.unwrap();

        let assets = Arc::new(AssetResolver::new(dir.path()));
        let restarted = ScriptService::new(db, assets.clone(), None);
        assert_eq!(restarted.load_registry().await.unwrap(), 1);
        assert_eq!(assets.script_keys(), vec!["promo".to_string()]);
    }
}
