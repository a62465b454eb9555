//! Memory and CPU sampling for a process group
//!
//! Every 10 ms the sampler sums the resident set of every process whose
//! process group is the run's, and keeps the largest sum seen. Each
//! process's own high-water mark (`VmHWM`) is folded in as well, so short
//! spikes between samples are not lost entirely. The same pass sums the
//! CPU time of the group's live processes.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use tokio::task::JoinHandle;

const SAMPLE_INTERVAL: Duration = Duration::from_millis(10);

/// Largest values seen over the life of a process group
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub(crate) struct GroupUsage {
    /// Peak resident memory in kilobytes
    pub peak_memory_kb: u64,

    /// CPU time (user + system) of the group's live processes, in milliseconds
    pub cpu_time_ms: f64,
}

impl GroupUsage {
    fn merge(&mut self, sample: GroupUsage) {
        self.peak_memory_kb = self.peak_memory_kb.max(sample.peak_memory_kb);
        self.cpu_time_ms = self.cpu_time_ms.max(sample.cpu_time_ms);
    }
}

/// A running sampler; [`finish()`](Self::finish) stops it and returns the peaks
#[derive(Debug)]
pub(crate) struct UsageSampler {
    stop: StopFlag,
    handle: JoinHandle<GroupUsage>,
}

/// Raises the shared stop flag when dropped
#[derive(Debug)]
struct StopFlag(Arc<AtomicBool>);

impl StopFlag {
    fn raise(&self) {
        self.0.store(true, Ordering::Relaxed);
    }
}

impl Drop for StopFlag {
    fn drop(&mut self) {
        self.raise();
    }
}

impl UsageSampler {
    pub fn start(pgid: i32) -> Self {
        let stop = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&stop);
        let ticks_per_sec = clock_ticks_per_sec();
        let handle = tokio::task::spawn_blocking(move || {
            let mut peak = GroupUsage::default();
            loop {
                peak.merge(sample_group(pgid, ticks_per_sec));
                if flag.load(Ordering::Relaxed) {
                    return peak;
                }
                std::thread::sleep(SAMPLE_INTERVAL);
            }
        });
        Self {
            stop: StopFlag(stop),
            handle,
        }
    }

    pub async fn finish(self) -> GroupUsage {
        self.stop.raise();
        self.handle.await.unwrap_or_default()
    }
}

/// Kernel clock ticks per second, the unit of CPU times in `/proc/<pid>/stat`
fn clock_ticks_per_sec() -> f64 {
    use nix::unistd::{SysconfVar, sysconf};

    match sysconf(SysconfVar::CLK_TCK) {
        Ok(Some(ticks)) if ticks > 0 => ticks as f64,
        _ => 100.0,
    }
}

/// Resident memory and CPU time of one process group
#[cfg(target_os = "linux")]
fn sample_group(pgid: i32, ticks_per_sec: f64) -> GroupUsage {
    let Ok(entries) = std::fs::read_dir("/proc") else {
        return GroupUsage::default();
    };
    let mut rss_total = 0;
    let mut hwm_max = 0;
    let mut cpu_ticks = 0;
    for entry in entries.flatten() {
        let name = entry.file_name();
        let Some(pid) = name.to_str().filter(|s| s.bytes().all(|b| b.is_ascii_digit())) else {
            continue;
        };
        let Ok(stat) = std::fs::read_to_string(format!("/proc/{pid}/stat")) else {
            continue;
        };
        if process_group(&stat) != Some(pgid) {
            continue;
        }
        cpu_ticks += cpu_ticks_of(&stat).unwrap_or(0);
        let Ok(status) = std::fs::read_to_string(format!("/proc/{pid}/status")) else {
            continue;
        };
        rss_total += status_kb(&status, "VmRSS:");
        hwm_max = hwm_max.max(status_kb(&status, "VmHWM:"));
    }
    GroupUsage {
        peak_memory_kb: rss_total.max(hwm_max),
        cpu_time_ms: cpu_ticks as f64 * 1000.0 / ticks_per_sec,
    }
}

#[cfg(not(target_os = "linux"))]
fn sample_group(_pgid: i32, _ticks_per_sec: f64) -> GroupUsage {
    GroupUsage::default()
}

/// Process group id from the contents of `/proc/<pid>/stat`
///
/// The command name is parenthesized and may itself contain spaces and
/// parentheses, so fields are counted from the last `)`.
fn process_group(stat: &str) -> Option<i32> {
    let rest = &stat[stat.rfind(')')? + 1..];
    // state, ppid, pgrp
    rest.split_whitespace().nth(2)?.parse().ok()
}

/// `utime + stime` from the contents of `/proc/<pid>/stat`, in clock ticks
fn cpu_ticks_of(stat: &str) -> Option<u64> {
    let rest = &stat[stat.rfind(')')? + 1..];
    let mut fields = rest.split_whitespace().skip(11);
    let utime: u64 = fields.next()?.parse().ok()?;
    let stime: u64 = fields.next()?.parse().ok()?;
    Some(utime + stime)
}

/// A `kB` field from the contents of `/proc/<pid>/status`
fn status_kb(status: &str, key: &str) -> u64 {
    status
        .lines()
        .find_map(|line| line.strip_prefix(key))
        .and_then(|value| value.split_whitespace().next())
        .and_then(|kb| kb.parse().ok())
        .unwrap_or(0)
}
