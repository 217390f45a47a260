/*!
 * User-Mode Entry
 * The single seam standing in for the architecture-specific jump into
 * user code
 */

use ahash::RandomState;
use dashmap::DashMap;

use crate::core::types::{ExitStatus, Pid, EXIT_FAILURE_STATUS};
use crate::loader::UserFrame;

use super::manager::ProcessManager;

/// Transfer of control into user code.
///
/// On real hardware this is a one-way jump implemented once per target
/// architecture; the context never returns to the caller. The hosted
/// rendition runs the user program to completion instead: `enter` is
/// called at most once per execution context, after a successful load,
/// and yields the status the program exited with. The kernel thread
/// performs the actual exit with that status.
pub trait UserMode: Send + Sync {
    fn enter(&self, kernel: &ProcessManager, pid: Pid, frame: UserFrame) -> ExitStatus;
}

/// Body of one simulated user program. Receives the kernel's syscall
/// surface, its own pid, and the initial register state; returns the
/// exit status as if returning from `main`.
pub type ProgramBody = Box<dyn Fn(&ProcessManager, Pid, UserFrame) -> ExitStatus + Send + Sync>;

/// Dispatches entered processes to program bodies by executable name.
///
/// A process whose name has no registered body exits with the failure
/// status, the same way a broken binary would.
pub struct ProgramRegistry {
    programs: DashMap<String, ProgramBody, RandomState>,
}

impl ProgramRegistry {
    pub fn new() -> Self {
        Self {
            programs: DashMap::with_hasher(RandomState::new()),
        }
    }

    /// Register the body run for executables named `name`
    pub fn insert<F>(&self, name: &str, body: F)
    where
        F: Fn(&ProcessManager, Pid, UserFrame) -> ExitStatus + Send + Sync + 'static,
    {
        self.programs.insert(name.to_string(), Box::new(body));
    }
}

impl Default for ProgramRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl UserMode for ProgramRegistry {
    fn enter(&self, kernel: &ProcessManager, pid: Pid, frame: UserFrame) -> ExitStatus {
        let name = match kernel.process(pid) {
            Some(p) => p.name().to_string(),
            None => return EXIT_FAILURE_STATUS,
        };
        match self.programs.get(&name) {
            Some(body) => body(kernel, pid, frame),
            None => EXIT_FAILURE_STATUS,
        }
    }
}

/// Default user mode: the program "runs" and immediately exits cleanly
pub struct HaltUserMode;

impl UserMode for HaltUserMode {
    fn enter(&self, _kernel: &ProcessManager, _pid: Pid, _frame: UserFrame) -> ExitStatus {
        0
    }
}
