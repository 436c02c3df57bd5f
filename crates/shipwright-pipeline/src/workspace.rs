//! Request-private scratch directories and bundle materialization.

use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use shipwright_types::{FileBundle, ShipwrightError};

/// Acquires and releases the scratch directory a run materializes into.
#[async_trait]
pub trait ScratchSpace: Send + Sync {
    async fn create(&self) -> shipwright_types::Result<PathBuf>;
    async fn remove(&self, path: &Path) -> shipwright_types::Result<()>;

    /// Synchronous best-effort removal, used when a run is dropped before it
    /// could release its workspace. Must not block for long or panic.
    fn discard(&self, path: &Path);
}

/// Creates `shipwright-<uuid>` directories under a base directory.
#[derive(Debug, Clone)]
pub struct TempScratch {
    base: PathBuf,
}

impl TempScratch {
    pub fn new(base: impl Into<PathBuf>) -> Self {
        Self { base: base.into() }
    }

    /// Scratch directories under the system temp directory.
    pub fn system() -> Self {
        Self::new(std::env::temp_dir())
    }

    pub fn base(&self) -> &Path {
        &self.base
    }
}

#[async_trait]
impl ScratchSpace for TempScratch {
    async fn create(&self) -> shipwright_types::Result<PathBuf> {
        let path = self
            .base
            .join(format!("shipwright-{}", uuid::Uuid::new_v4().simple()));
        tokio::fs::create_dir_all(&path).await?;
        tracing::debug!(path = %path.display(), "Created scratch workspace");
        Ok(path)
    }

    async fn remove(&self, path: &Path) -> shipwright_types::Result<()> {
        tokio::fs::remove_dir_all(path).await?;
        tracing::debug!(path = %path.display(), "Removed scratch workspace");
        Ok(())
    }

    fn discard(&self, path: &Path) {
        match std::fs::remove_dir_all(path) {
            Ok(()) => tracing::debug!(path = %path.display(), "Discarded scratch workspace"),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => tracing::warn!(
                path = %path.display(),
                error = %e,
                "Failed to discard scratch workspace"
            ),
        }
    }
}

/// A scratch directory owned by one run.
///
/// [`Workspace::release`] removes it through [`ScratchSpace::remove`] and
/// reports the outcome. If the workspace is dropped unreleased (the run's
/// future was cancelled or timed out) it is discarded synchronously instead,
/// so a pushed `.git/config` never outlives the run.
pub struct Workspace {
    scratch: Arc<dyn ScratchSpace>,
    path: PathBuf,
    released: bool,
}

impl Workspace {
    pub async fn acquire(scratch: Arc<dyn ScratchSpace>) -> shipwright_types::Result<Self> {
        let path = scratch.create().await?;
        Ok(Self {
            scratch,
            path,
            released: false,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub async fn release(mut self) -> shipwright_types::Result<()> {
        let result = self.scratch.remove(&self.path).await;
        self.released = true;
        result
    }
}

impl Drop for Workspace {
    fn drop(&mut self) {
        if !self.released {
            self.scratch.discard(&self.path);
        }
    }
}

/// Resolve a bundle path under `root`, refusing anything that could escape it.
///
/// Only plain relative components are accepted (`.` is ignored). Absolute
/// paths, `..`, and drive or UNC prefixes are rejected.
pub fn contained_path(root: &Path, entry: &str) -> shipwright_types::Result<PathBuf> {
    let refuse = |reason: &str| ShipwrightError::Materialize {
        path: entry.to_string(),
        reason: reason.to_string(),
    };

    if entry.contains('\0') {
        return Err(refuse("contains a NUL byte"));
    }

    let mut resolved = root.to_path_buf();
    let mut depth = 0usize;
    for component in Path::new(entry).components() {
        match component {
            Component::Normal(part) => {
                resolved.push(part);
                depth += 1;
            }
            Component::CurDir => {}
            Component::ParentDir => return Err(refuse("parent directory components are not allowed")),
            Component::RootDir | Component::Prefix(_) => {
                return Err(refuse("absolute paths are not allowed"))
            }
        }
    }

    if depth == 0 {
        return Err(refuse("path names no file"));
    }
    Ok(resolved)
}

/// Write every bundle entry under `root`, creating parent directories.
///
/// All paths are checked before anything is written, so a rejected bundle
/// leaves the workspace untouched. Returns the number of files written.
pub async fn materialize(root: &Path, bundle: &FileBundle) -> shipwright_types::Result<usize> {
    let targets = bundle
        .iter()
        .map(|(path, content)| Ok((path, contained_path(root, path)?, content)))
        .collect::<shipwright_types::Result<Vec<_>>>()?;

    for (entry, target, content) in &targets {
        let io_failure = |e: std::io::Error| ShipwrightError::Materialize {
            path: entry.to_string(),
            reason: e.to_string(),
        };
        if let Some(parent) = target.parent() {
            tokio::fs::create_dir_all(parent).await.map_err(io_failure)?;
        }
        tokio::fs::write(target, content).await.map_err(io_failure)?;
    }

    tracing::debug!(root = %root.display(), files = targets.len(), "Materialized bundle");
    Ok(targets.len())
}
