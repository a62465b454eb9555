//! Per-process rlimits
//!
//! The plan is computed in the parent so that applying it in the forked
//! child only issues `setrlimit` calls and allocates nothing.

use nix::sys::resource::{Resource, setrlimit};

use crate::types::ResourceLimits;

/// Hard ceiling on the file descriptors of any sandboxed process
const MAX_OPEN_FILES: u64 = 4096;

/// Largest share of the address space one stack may claim
///
/// glibc reserves `RLIMIT_STACK` bytes for every new thread.
const STACK_SHARE_OF_ADDRESS_SPACE: u64 = 8;

/// One `setrlimit` call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Rlimit {
    pub resource: Resource,
    pub soft: u64,
    pub hard: u64,
}

impl Rlimit {
    fn both(resource: Resource, value: u64) -> Self {
        Self {
            resource,
            soft: value,
            hard: value,
        }
    }
}

/// The rlimits for one process, in the order they are applied
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub(crate) struct RlimitPlan {
    limits: Vec<Rlimit>,
}

impl RlimitPlan {
    /// Translate resource limits into rlimits
    ///
    /// The address-space limit is left out when a cgroup enforces memory.
    pub fn new(limits: &ResourceLimits, address_space: bool) -> Self {
        let mut plan = Vec::with_capacity(5);

        let address_space_kb = limits.memory_limit.filter(|_| address_space);
        if let Some(kb) = address_space_kb {
            plan.push(Rlimit::both(Resource::RLIMIT_AS, kb.saturating_mul(1024)));
        }

        // SIGXCPU at the soft limit, SIGKILL one second later
        if let Some(secs) = limits.time_limit.filter(|s| s.is_finite() && *s > 0.0) {
            let soft = secs.ceil() as u64;
            plan.push(Rlimit {
                resource: Resource::RLIMIT_CPU,
                soft,
                hard: soft + 1,
            });
        }

        if let Some(mut kb) = limits.stack_limit {
            if let Some(space_kb) = address_space_kb {
                kb = kb.min(space_kb / STACK_SHARE_OF_ADDRESS_SPACE);
            }
            plan.push(Rlimit::both(Resource::RLIMIT_STACK, kb.saturating_mul(1024)));
        }

        if let Some(files) = limits.max_open_files {
            let files = u64::from(files).min(MAX_OPEN_FILES);
            plan.push(Rlimit::both(Resource::RLIMIT_NOFILE, files));
        }

        plan.push(Rlimit::both(Resource::RLIMIT_CORE, 0));

        Self { limits: plan }
    }

    pub fn limits(&self) -> &[Rlimit] {
        &self.limits
    }

    /// Apply every limit to the calling process
    ///
    /// Runs between fork and exec.
    pub fn apply(&self) -> std::io::Result<()> {
        for limit in &self.limits {
            setrlimit(limit.resource, limit.soft, limit.hard).map_err(std::io::Error::from)?;
        }
        Ok(())
    }
}
