//! Spawning one sandboxed process and collecting its outcome

use std::io::Write as _;
use std::os::unix::process::ExitStatusExt;
use std::process::Stdio;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

use nix::sys::signal::{Signal, killpg};
use nix::unistd::Pid;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt};
use tokio::process::Command;
use tokio::task::JoinHandle;
use tracing::{debug, instrument, warn};

use crate::language::ProcessSpec;
use crate::sandbox::SandboxError;
use crate::sandbox::cgroup::ProcessCgroup;
use crate::sandbox::limits::RlimitPlan;
use crate::sandbox::memory::{GroupUsage, UsageSampler};
use crate::types::{ExecutionOutcome, ResourceLimits};

/// How long output readers may keep draining after the process exits
const READER_GRACE: Duration = Duration::from_millis(500);

const READ_CHUNK: usize = 8192;

/// Kills the process group (and cgroup) when dropped
///
/// Covers every way out of [`run_process`], including its future being
/// dropped while the child is still running.
struct GroupKiller<'a> {
    pgid: Pid,
    cgroup: Option<&'a ProcessCgroup>,
}

impl GroupKiller<'_> {
    fn kill(&self) {
        // ESRCH once every member has exited
        let _ = killpg(self.pgid, Signal::SIGKILL);
        if let Some(cgroup) = self.cgroup {
            cgroup.kill();
        }
    }
}

impl Drop for GroupKiller<'_> {
    fn drop(&mut self) {
        self.kill();
    }
}

/// Captured bytes of one output stream
#[derive(Debug, Default)]
struct Capture {
    bytes: Vec<u8>,
    truncated: bool,
}

type SharedCapture = Arc<Mutex<Capture>>;

/// Read a stream to EOF, keeping at most `cap` bytes
///
/// Bytes past the cap are drained and discarded so the writer never blocks
/// on a full pipe.
fn spawn_reader<R>(mut reader: R, cap: usize) -> (SharedCapture, JoinHandle<()>)
where
    R: AsyncRead + Unpin + Send + 'static,
{
    let capture = SharedCapture::default();
    let sink = Arc::clone(&capture);
    let handle = tokio::spawn(async move {
        let mut chunk = vec![0u8; READ_CHUNK];
        loop {
            let n = match reader.read(&mut chunk).await {
                Ok(0) | Err(_) => break,
                Ok(n) => n,
            };
            let mut capture = sink.lock().unwrap_or_else(PoisonError::into_inner);
            let room = cap.saturating_sub(capture.bytes.len());
            if n > room {
                capture.truncated = true;
            }
            capture.bytes.extend_from_slice(&chunk[..n.min(room)]);
        }
    });
    (capture, handle)
}

/// Wait briefly for a reader to reach EOF, then take what it captured
async fn collect(capture: SharedCapture, handle: JoinHandle<()>) -> Capture {
    let abort = handle.abort_handle();
    if tokio::time::timeout(READER_GRACE, handle).await.is_err() {
        // A process outside the group still holds the pipe open
        debug!("output reader did not reach EOF, abandoning it");
        abort.abort();
    }
    let mut capture = capture.lock().unwrap_or_else(PoisonError::into_inner);
    std::mem::take(&mut *capture)
}

/// Run one process to completion or to its wall clock deadline
///
/// The child gets its own process group, a cleared environment, the rlimits
/// derived from `limits` and, when given, membership of `cgroup` before it
/// execs. Whatever happens, the whole group is killed before this returns.
#[instrument(skip_all, fields(program = %spec.program))]
pub(crate) async fn run_process(
    spec: &ProcessSpec,
    stdin: Option<&[u8]>,
    limits: &ResourceLimits,
    cgroup: Option<&ProcessCgroup>,
) -> Result<ExecutionOutcome, SandboxError> {
    let plan = RlimitPlan::new(limits, cgroup.is_none());
    let procs = cgroup.map(ProcessCgroup::procs_file).transpose()?;

    let mut command = Command::new(&spec.program);
    command
        .args(&spec.args)
        .current_dir(&spec.working_dir)
        .env_clear()
        .envs(&spec.env)
        .stdin(if stdin.is_some() {
            Stdio::piped()
        } else {
            Stdio::null()
        })
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .process_group(0)
        .kill_on_drop(true);

    // SAFETY: the hook only makes raw syscalls (prctl, write, setrlimit) on
    // data prepared before the fork.
    unsafe {
        command.pre_exec(move || {
            #[cfg(target_os = "linux")]
            nix::sys::prctl::set_pdeathsig(Signal::SIGKILL).map_err(std::io::Error::from)?;
            if let Some(procs) = &procs {
                // "0" moves the writing process into the cgroup
                let mut procs = procs;
                procs.write_all(b"0")?;
            }
            plan.apply()
        });
    }

    debug!(command = %spec.command_line(), "spawning process");
    let mut child = command.spawn().map_err(|source| SandboxError::Spawn {
        program: spec.program.clone(),
        source,
    })?;
    let start = Instant::now();

    let pid = child
        .id()
        .and_then(|id| i32::try_from(id).ok())
        .ok_or_else(|| SandboxError::Io(std::io::Error::other("spawned process has no pid")))?;
    let killer = GroupKiller {
        pgid: Pid::from_raw(pid),
        cgroup,
    };
    let sampler = UsageSampler::start(pid);

    let writer = match (child.stdin.take(), stdin) {
        (Some(mut pipe), Some(data)) => {
            let data = data.to_vec();
            Some(tokio::spawn(async move {
                // The program may exit without reading its input
                let _ = pipe.write_all(&data).await;
                let _ = pipe.shutdown().await;
            }))
        }
        _ => None,
    };

    let cap = limits.output_cap_bytes();
    let stdout = child.stdout.take().map(|pipe| spawn_reader(pipe, cap));
    let stderr = child.stderr.take().map(|pipe| spawn_reader(pipe, cap));

    let waited = match limits.wall_time() {
        Some(deadline) => tokio::time::timeout(deadline, child.wait()).await.ok(),
        None => Some(child.wait().await),
    };
    let wall_time_ms = start.elapsed().as_secs_f64() * 1000.0;

    // Descendants must not outlive the run, whether or not it timed out
    killer.kill();
    let (status, timed_out) = match waited {
        Some(status) => (status?, false),
        None => {
            debug!(wall_time_ms, "deadline reached, process group killed");
            (child.wait().await?, true)
        }
    };

    let usage = sampler.finish().await;
    let mut peak_memory_kb = usage.peak_memory_kb;
    if let Some(writer) = writer {
        writer.abort();
    }
    let stdout = match stdout {
        Some((capture, handle)) => collect(capture, handle).await,
        None => Capture::default(),
    };
    let stderr = match stderr {
        Some((capture, handle)) => collect(capture, handle).await,
        None => Capture::default(),
    };

    let mut memory_exceeded = false;
    if let Some(cgroup) = cgroup {
        peak_memory_kb = peak_memory_kb.max(cgroup.peak_kb());
        memory_exceeded = !timed_out && cgroup.oom_killed();
    }

    let cpu_time_exceeded =
        !timed_out && !memory_exceeded && cpu_limit_hit(status.signal(), &usage, limits);
    let mut outcome = ExecutionOutcome {
        exit_code: status.code(),
        signal: status.signal(),
        stdout: stdout.bytes,
        stderr: stderr.bytes,
        wall_time_ms,
        timed_out,
        cpu_time_exceeded,
        memory_exceeded,
        peak_memory_kb,
        stdout_truncated: stdout.truncated,
        stderr_truncated: stderr.truncated,
    };
    if let Some(limit) = limits.memory_limit {
        outcome.detect_memory_limit(limit);
    }
    if outcome.stdout_truncated || outcome.stderr_truncated {
        warn!(cap, "process output truncated");
    }

    debug!(
        exit_code = ?outcome.exit_code,
        signal = ?outcome.signal,
        wall_time_ms = outcome.wall_time_ms,
        peak_memory_kb = outcome.peak_memory_kb,
        timed_out = outcome.timed_out,
        cpu_time_exceeded = outcome.cpu_time_exceeded,
        memory_exceeded = outcome.memory_exceeded,
        "process finished"
    );
    Ok(outcome)
}

/// Whether a signal death came from `RLIMIT_CPU`
///
/// The kernel sends SIGXCPU at the soft limit and SIGKILL at the hard one.
/// A SIGKILL counts only when the group had used at least the soft limit.
fn cpu_limit_hit(signal: Option<i32>, usage: &GroupUsage, limits: &ResourceLimits) -> bool {
    let Some(soft_ms) = limits.cpu_time_ms() else {
        return false;
    };
    match signal {
        Some(signal) if signal == Signal::SIGXCPU as i32 => true,
        Some(signal) if signal == Signal::SIGKILL as i32 => usage.cpu_time_ms >= soft_ms,
        _ => false,
    }
}
