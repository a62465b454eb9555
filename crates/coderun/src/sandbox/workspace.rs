//! Per-run workspace directories

use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};

use tracing::{debug, instrument, warn};
use uuid::Uuid;

use crate::sandbox::SandboxError;

/// Prefix of every workspace directory name
pub const WORKSPACE_PREFIX: &str = "coderun-";

/// A uniquely named directory owned by exactly one run
///
/// # Cleanup
///
/// Call [`cleanup()`](Self::cleanup) when the run is over. If the workspace
/// is dropped without it (a panic, or the run's future being cancelled) the
/// directory is removed synchronously in `Drop`.
#[derive(Debug)]
pub struct Workspace {
    path: PathBuf,

    /// Cleared once the directory has been removed
    live: bool,
}

impl Workspace {
    /// Create `<root>/coderun-<uuid>` with mode 0700
    #[instrument]
    pub async fn create(root: &Path) -> Result<Self, SandboxError> {
        let path = root.join(format!("{WORKSPACE_PREFIX}{}", Uuid::new_v4()));

        let mut builder = tokio::fs::DirBuilder::new();
        builder.mode(0o700);
        builder.create(&path).await?;

        debug!(path = %path.display(), "workspace created");
        Ok(Self { path, live: true })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Host path of a file inside the workspace
    ///
    /// Rejects absolute paths and any `..` component.
    pub fn file_path(&self, name: &str) -> Result<PathBuf, SandboxError> {
        if name.is_empty() || name.contains("..") || name.starts_with('/') {
            return Err(SandboxError::InvalidPath(name.to_string()));
        }
        Ok(self.path.join(name))
    }

    /// Write a file into the workspace, creating parent directories
    #[instrument(skip(self, content), fields(len = content.len()))]
    pub async fn write_file(&self, name: &str, content: &[u8]) -> Result<PathBuf, SandboxError> {
        let path = self.file_path(name)?;
        if let Some(parent) = path.parent()
            && parent != self.path
        {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&path, content).await?;
        debug!(path = %path.display(), "wrote file");
        Ok(path)
    }

    pub async fn read_file(&self, name: &str) -> Result<Vec<u8>, SandboxError> {
        let path = self.file_path(name)?;
        Ok(tokio::fs::read(&path).await?)
    }

    /// Mark a workspace file executable (0755)
    pub async fn set_executable(&self, name: &str) -> Result<(), SandboxError> {
        let path = self.file_path(name)?;
        tokio::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).await?;
        Ok(())
    }

    /// Remove the directory and everything in it
    #[must_use = "cleanup errors should be handled"]
    #[instrument(skip(self), fields(path = %self.path.display()))]
    pub async fn cleanup(mut self) -> Result<(), SandboxError> {
        let path = self.path.clone();
        let result = tokio::task::spawn_blocking(move || remove_tree(&path))
            .await
            .map_err(|e| SandboxError::Io(std::io::Error::other(e)))?;
        // Drop must not try again, whatever the outcome
        self.live = false;
        result?;
        debug!("workspace removed");
        Ok(())
    }
}

impl Drop for Workspace {
    fn drop(&mut self) {
        if !self.live {
            return;
        }
        warn!(
            path = %self.path.display(),
            "workspace dropped without explicit cleanup, removing it now"
        );
        if let Err(e) = remove_tree(&self.path) {
            warn!(path = %self.path.display(), error = %e, "failed to remove workspace");
        }
    }
}

/// Remove a directory tree, restoring owner permissions if the program
/// under test made parts of it unwritable
fn remove_tree(path: &Path) -> std::io::Result<()> {
    match std::fs::remove_dir_all(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(_) => {
            restore_permissions(path);
            match std::fs::remove_dir_all(path) {
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
                other => other,
            }
        }
    }
}

fn restore_permissions(dir: &Path) {
    let _ = std::fs::set_permissions(dir, std::fs::Permissions::from_mode(0o700));
    let Ok(entries) = std::fs::read_dir(dir) else {
        return;
    };
    for entry in entries.flatten() {
        if entry.file_type().is_ok_and(|t| t.is_dir()) {
            restore_permissions(&entry.path());
        }
    }
}
