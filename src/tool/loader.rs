use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::tool::{DynTool, ToolError, ToolManifest, ToolRegistry};

/// Extension of tool manifest files.
pub const MANIFEST_EXTENSION: &str = "json";

/// Outcome of one load pass: the registry plus every module that was skipped.
#[derive(Debug, Default)]
pub struct LoadReport {
    pub registry: ToolRegistry,
    pub skipped: Vec<ToolError>,
}

/// Builds a [`ToolRegistry`] from built-in tools and a directory of manifests.
#[derive(Clone)]
pub struct ToolLoader {
    dir: PathBuf,
    builtins: Vec<DynTool>,
}

impl ToolLoader {
    /// Creates a loader for the given tool directory.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            builtins: Vec::new(),
        }
    }

    /// Registers a native tool that every load starts from.
    pub fn with_builtin(mut self, tool: DynTool) -> Self {
        self.builtins.push(tool);
        self
    }

    /// Loads the current tool set. Never fails; bad modules are skipped.
    pub async fn load(&self) -> ToolRegistry {
        self.load_with_report().await.registry
    }

    /// Loads the current tool set and reports the modules that were skipped.
    pub async fn load_with_report(&self) -> LoadReport {
        let mut report = LoadReport::default();
        for tool in &self.builtins {
            report.registry.register(Arc::clone(tool));
        }

        let files = match self.manifest_files().await {
            Ok(files) => files,
            Err(e) => {
                warn!(dir = %self.dir.display(), error = %e, "Cannot read tool directory");
                return report;
            }
        };
        debug!(count = files.len(), dir = %self.dir.display(), "Tool files found");

        for path in files {
            match self.load_file(&path).await {
                Ok(tool) => {
                    info!(tool = %tool.name(), file = %path.display(), "Loaded tool");
                    report.registry.register(tool);
                }
                Err(e) => {
                    warn!(file = %path.display(), error = %e, "Skipping tool module");
                    report.skipped.push(e);
                }
            }
        }

        report
    }

    async fn load_file(&self, path: &Path) -> Result<DynTool, ToolError> {
        let text = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| ToolError::ModuleLoad {
                path: path.to_path_buf(),
                reason: e.to_string(),
            })?;
        let tool = ToolManifest::parse(path, &text)?.into_tool(path, &self.dir)?;
        Ok(Arc::new(tool))
    }

    /// Lists manifest files in lexical order, creating the directory if needed.
    ///
    /// Symlinks are followed. An entry that cannot be inspected is skipped.
    async fn manifest_files(&self) -> std::io::Result<Vec<PathBuf>> {
        tokio::fs::create_dir_all(&self.dir).await?;

        let mut entries = tokio::fs::read_dir(&self.dir).await?;
        let mut files = Vec::new();
        loop {
            let entry = match entries.next_entry().await {
                Ok(Some(entry)) => entry,
                Ok(None) => break,
                Err(e) => {
                    warn!(dir = %self.dir.display(), error = %e, "Directory scan stopped early");
                    break;
                }
            };
            let path = entry.path();
            let is_manifest = path
                .extension()
                .is_some_and(|ext| ext == MANIFEST_EXTENSION);
            if !is_manifest {
                continue;
            }
            match tokio::fs::metadata(&path).await {
                Ok(meta) if meta.is_file() => files.push(path),
                Ok(_) => debug!(file = %path.display(), "Not a regular file"),
                Err(e) => warn!(file = %path.display(), error = %e, "Cannot inspect tool file"),
            }
        }
        files.sort();
        Ok(files)
    }
}

impl std::fmt::Debug for ToolLoader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolLoader")
            .field("dir", &self.dir)
            .field("builtins", &self.builtins.len())
            .finish()
    }
}
