use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex as StdMutex};

use async_trait::async_trait;
use tokio::sync::Mutex;
use tracing::{info, warn};
use uuid::Uuid;

use crate::tool::loader::MANIFEST_EXTENSION;
use crate::tool::{ToolError, ToolManifest, is_valid_tool_name};

/// Produces a tool for a name the registry does not know.
///
/// Implementations persist the tool so that the next load discovers it.
#[async_trait]
pub trait ToolSynthesizer: Send + Sync {
    /// Creates and persists a tool named `name`.
    async fn synthesize(&self, name: &str) -> Result<PathBuf, ToolError>;
}

/// Writes placeholder manifests that echo their `input` argument.
///
/// The stubs never perform the computation the model intended; they only make
/// the name callable.
#[derive(Debug, Clone)]
pub struct StubSynthesizer {
    dir: PathBuf,
    locks: Arc<StdMutex<HashMap<String, Arc<Mutex<()>>>>>,
}

impl StubSynthesizer {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            locks: Arc::default(),
        }
    }

    /// The file a tool named `name` is written to.
    pub fn manifest_path(&self, name: &str) -> PathBuf {
        self.dir.join(format!("{}.{}", name, MANIFEST_EXTENSION))
    }

    fn lock_for(&self, name: &str) -> Arc<Mutex<()>> {
        let mut locks = self.locks.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        Arc::clone(locks.entry(name.to_string()).or_default())
    }

    /// Drops the entry for `name` once no other writer holds or waits on it.
    fn release(&self, name: &str, lock: Arc<Mutex<()>>) {
        let mut locks = self.locks.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        drop(lock);
        if locks.get(name).is_some_and(|l| Arc::strong_count(l) == 1) {
            locks.remove(name);
        }
    }

    async fn write_stub(&self, name: &str, target: &Path, body: &[u8]) -> std::io::Result<()> {
        tokio::fs::create_dir_all(&self.dir).await?;
        if tokio::fs::try_exists(target).await.unwrap_or(false) {
            warn!(tool = %name, path = %target.display(), "Overwriting existing tool module");
        }
        write_atomic(&self.dir, target, body).await
    }
}

#[async_trait]
impl ToolSynthesizer for StubSynthesizer {
    async fn synthesize(&self, name: &str) -> Result<PathBuf, ToolError> {
        let failed = |reason: String| ToolError::SynthesisFailed {
            tool: name.to_string(),
            reason,
        };

        if !is_valid_tool_name(name) {
            return Err(failed(format!("'{}' is not a valid tool name", name)));
        }

        let body = serde_json::to_string_pretty(&ToolManifest::stub(name))
            .map_err(|e| failed(e.to_string()))?;
        let target = self.manifest_path(name);

        let lock = self.lock_for(name);
        let written = {
            let _guard = lock.lock().await;
            self.write_stub(name, &target, body.as_bytes()).await
        };
        self.release(name, lock);
        written.map_err(|e| failed(e.to_string()))?;

        info!(tool = %name, path = %target.display(), "Synthesized stub tool");
        Ok(target)
    }
}

/// Writes `bytes` to a temporary sibling of `target` and renames it into place.
async fn write_atomic(dir: &Path, target: &Path, bytes: &[u8]) -> std::io::Result<()> {
    let tmp = dir.join(format!(".{}.tmp", Uuid::new_v4()));
    if let Err(e) = tokio::fs::write(&tmp, bytes).await {
        let _ = tokio::fs::remove_file(&tmp).await;
        return Err(e);
    }
    if let Err(e) = tokio::fs::rename(&tmp, target).await {
        let _ = tokio::fs::remove_file(&tmp).await;
        return Err(e);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tool::ToolLoader;
    use serde_json::json;
    use tempfile::tempdir;

    #[tokio::test]
    async fn synthesized_tool_is_loadable() {
        let dir = tempdir().unwrap();
        let synthesizer = StubSynthesizer::new(dir.path());
        let loader = ToolLoader::new(dir.path());

        assert!(loader.load().await.lookup("addNumbers").is_none());
        synthesizer.synthesize("addNumbers").await.unwrap();

        let registry = loader.load().await;
        assert!(registry.lookup("addNumbers").is_some());
        let result = registry
            .execute("addNumbers", json!({ "input": "hello" }))
            .await
            .unwrap();
        assert!(result.to_string().contains("hello"));
    }

    #[tokio::test]
    async fn resynthesis_is_idempotent() {
        let dir = tempdir().unwrap();
        let synthesizer = StubSynthesizer::new(dir.path());

        let path = synthesizer.synthesize("lookupWeather").await.unwrap();
        let first = std::fs::read_to_string(&path).unwrap();
        synthesizer.synthesize("lookupWeather").await.unwrap();
        let second = std::fs::read_to_string(&path).unwrap();

        assert_eq!(first, second);
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 1);
    }

    #[tokio::test]
    async fn lock_entries_are_dropped_after_writing() {
        let dir = tempdir().unwrap();
        let synthesizer = StubSynthesizer::new(dir.path());

        for name in ["first", "second", "third"] {
            synthesizer.synthesize(name).await.unwrap();
        }
        assert!(synthesizer.locks.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn broken_module_is_replaced_by_the_stub() {
        let dir = tempdir().unwrap();
        let synthesizer = StubSynthesizer::new(dir.path());
        std::fs::write(synthesizer.manifest_path("lookupWeather"), "{ not json").unwrap();

        let loader = ToolLoader::new(dir.path());
        assert!(!loader.load().await.contains("lookupWeather"));

        synthesizer.synthesize("lookupWeather").await.unwrap();
        assert!(loader.load().await.contains("lookupWeather"));
    }

    #[tokio::test]
    async fn refuses_names_outside_the_identifier_rule() {
        let dir = tempdir().unwrap();
        let synthesizer = StubSynthesizer::new(dir.path());

        let err = synthesizer.synthesize("../../etc/passwd").await.unwrap_err();
        assert!(matches!(err, ToolError::SynthesisFailed { .. }));
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_synthesis_leaves_one_complete_manifest() {
        let dir = tempdir().unwrap();
        let a = StubSynthesizer::new(dir.path());
        let b = a.clone();
        let a_locks = Arc::clone(&a.locks);
        // A separate instance shares no lock with the others; the rename keeps it safe.
        let c = StubSynthesizer::new(dir.path());

        let (ra, rb, rc) = tokio::join!(
            tokio::spawn(async move { a.synthesize("sharedName").await }),
            tokio::spawn(async move { b.synthesize("sharedName").await }),
            tokio::spawn(async move { c.synthesize("sharedName").await }),
        );
        for result in [ra, rb, rc] {
            result.unwrap().unwrap();
        }

        let files: Vec<_> = std::fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name())
            .collect();
        assert_eq!(files, ["sharedName.json"]);

        assert!(a_locks.lock().unwrap().is_empty());

        let report = ToolLoader::new(dir.path()).load_with_report().await;
        assert!(report.skipped.is_empty());
        assert_eq!(report.registry.names(), ["sharedName"]);
    }
}
