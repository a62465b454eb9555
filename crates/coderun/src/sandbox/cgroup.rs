//! cgroup v2 memory and pids isolation

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use tracing::{debug, instrument, warn};
use uuid::Uuid;

use crate::sandbox::SandboxError;
use crate::types::ResourceLimits;

const CGROUP_BASE: &str = "/sys/fs/cgroup";

/// Prepare a delegated cgroup v2 directory for per-process children.
///
/// Without a cgroup manager (containers, CI) nobody has enabled the memory
/// and pids controllers for us. This creates `cg_root` and enables both
/// controllers on the path down to it.
///
/// Returns `Ok(true)` if per-process cgroups can be created under
/// `cg_root`, `Ok(false)` if cgroup v2 or its memory controller is missing
/// and the caller should fall back to rlimits.
#[instrument]
pub fn prepare_cgroup(cg_root: &Path) -> Result<bool, SandboxError> {
    let cg_base = Path::new(CGROUP_BASE);

    let controllers_path = cg_base.join("cgroup.controllers");
    if !controllers_path.exists() {
        return Ok(false);
    }

    let controllers = fs::read_to_string(&controllers_path)?;
    if !controllers.split_whitespace().any(|c| c == "memory") {
        return Ok(false);
    }

    if subtree_has_memory(cg_root) {
        return Ok(true);
    }

    // The "no internal process" rule forbids enabling controllers on a
    // cgroup that has member processes, so move ourselves into a leaf first.
    let init_cg = cg_base.join("init");
    if !init_cg.exists() {
        fs::create_dir(&init_cg)?;
    }
    fs::write(init_cg.join("cgroup.procs"), std::process::id().to_string())?;

    fs::write(cg_base.join("cgroup.subtree_control"), "+memory +pids")?;

    if !cg_root.exists() {
        fs::create_dir(cg_root)?;
    }
    fs::write(cg_root.join("cgroup.subtree_control"), "+memory +pids")?;

    debug!(cg_root = %cg_root.display(), "cgroup hierarchy prepared");
    Ok(subtree_has_memory(cg_root))
}

fn subtree_has_memory(cg: &Path) -> bool {
    fs::read_to_string(cg.join("cgroup.subtree_control"))
        .is_ok_and(|content| content.split_whitespace().any(|c| c == "memory"))
}

/// A cgroup created for a single process tree
///
/// Removed by [`remove()`](Self::remove); `Drop` makes a last attempt.
#[derive(Debug)]
pub(crate) struct ProcessCgroup {
    path: PathBuf,
    removed: bool,
}

impl ProcessCgroup {
    /// Create `<root>/run-<uuid>` with memory, swap and pids limits
    pub fn create(root: &Path, limits: &ResourceLimits) -> Result<Self, SandboxError> {
        let path = root.join(format!("run-{}", Uuid::new_v4()));
        fs::create_dir(&path)
            .map_err(|e| SandboxError::Cgroup(format!("create {}: {e}", path.display())))?;
        let cgroup = Self {
            path,
            removed: false,
        };

        if let Some(kb) = limits.memory_limit {
            cgroup.write("memory.max", &kb.saturating_mul(1024).to_string())?;
            // Not every kernel has swap accounting
            if let Err(e) = cgroup.write("memory.swap.max", "0") {
                debug!(error = %e, "memory.swap.max not set");
            }
        }
        if let Some(count) = limits.max_processes {
            cgroup.write("pids.max", &count.to_string())?;
        }

        debug!(path = %cgroup.path.display(), "process cgroup created");
        Ok(cgroup)
    }

    fn write(&self, file: &str, value: &str) -> Result<(), SandboxError> {
        fs::write(self.path.join(file), value)
            .map_err(|e| SandboxError::Cgroup(format!("write {file}: {e}")))
    }

    /// Open `cgroup.procs` for the child to write itself into before exec
    pub fn procs_file(&self) -> Result<fs::File, SandboxError> {
        fs::OpenOptions::new()
            .write(true)
            .open(self.path.join("cgroup.procs"))
            .map_err(|e| SandboxError::Cgroup(format!("open cgroup.procs: {e}")))
    }

    /// Kill every process in the cgroup
    pub fn kill(&self) {
        if let Err(e) = fs::write(self.path.join("cgroup.kill"), "1") {
            debug!(error = %e, "cgroup.kill failed");
        }
    }

    /// Peak memory usage of the cgroup in kilobytes
    pub fn peak_kb(&self) -> u64 {
        fs::read_to_string(self.path.join("memory.peak"))
            .ok()
            .and_then(|s| s.trim().parse::<u64>().ok())
            .map_or(0, |bytes| bytes / 1024)
    }

    /// Whether the kernel OOM killer fired inside the cgroup
    pub fn oom_killed(&self) -> bool {
        fs::read_to_string(self.path.join("memory.events"))
            .map(|events| oom_kill_count(&events) > 0)
            .unwrap_or(false)
    }

    /// Remove the cgroup once its processes are gone
    pub async fn remove(mut self) {
        // The kernel releases a killed cgroup asynchronously
        for _ in 0..50 {
            match fs::remove_dir(&self.path) {
                Ok(()) => {
                    self.removed = true;
                    return;
                }
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                    self.removed = true;
                    return;
                }
                Err(_) => {
                    self.kill();
                    tokio::time::sleep(Duration::from_millis(10)).await;
                }
            }
        }
        warn!(path = %self.path.display(), "process cgroup still busy, leaving it behind");
        self.removed = true;
    }
}

impl Drop for ProcessCgroup {
    fn drop(&mut self) {
        if !self.removed {
            self.kill();
            let _ = fs::remove_dir(&self.path);
        }
    }
}

fn oom_kill_count(events: &str) -> u64 {
    events
        .lines()
        .filter_map(|line| line.split_once(' '))
        .find(|(key, _)| *key == "oom_kill")
        .and_then(|(_, value)| value.trim().parse().ok())
        .unwrap_or(0)
}
