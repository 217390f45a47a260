/*!
 * Exit Rendezvous
 * The status record shared between exactly one parent and one child
 */

use std::sync::{Arc, Weak};

use parking_lot::{Condvar, Mutex};

use crate::core::types::{ExitStatus, Pid};

use super::process::Process;

/// Rendezvous record for one parent/child pair.
///
/// Created alongside the child and registered with the parent. The
/// record is reaped exactly once: either by a successful `wait`, or by
/// the parent's own exit disowning a still-running child. A child whose
/// back-slot was cleared by disowning finds no record at exit and skips
/// signaling.
pub struct ChildStatus {
    pid: Pid,
    inner: Mutex<StatusInner>,
    exited: Condvar,
}

struct StatusInner {
    /// Live link to the child; cleared when the child exits or is
    /// disowned
    child: Option<Weak<Process>>,
    /// Defined once `child` is cleared by the child's exit
    code: ExitStatus,
}

impl ChildStatus {
    pub(crate) fn new(child: &Arc<Process>) -> Arc<Self> {
        Arc::new(Self {
            pid: child.pid(),
            inner: Mutex::new(StatusInner {
                child: Some(Arc::downgrade(child)),
                code: 0,
            }),
            exited: Condvar::new(),
        })
    }

    pub fn pid(&self) -> Pid {
        self.pid
    }

    /// Child side: record the exit status, sever the live link, and wake
    /// the parent. One lock acquisition end to end, so no parent can
    /// observe a half-updated record.
    pub(crate) fn record_exit(&self, code: ExitStatus) {
        let mut inner = self.inner.lock();
        inner.code = code;
        inner.child = None;
        self.exited.notify_one();
    }

    /// Parent side: block until the child has recorded its exit, then
    /// read the status
    pub(crate) fn await_exit(&self) -> ExitStatus {
        let mut inner = self.inner.lock();
        while inner.child.is_some() {
            self.exited.wait(&mut inner);
        }
        inner.code
    }

    /// Parent side, at its own exit: sever a still-running child's
    /// back-slot so the child's later exit finds no record to signal
    pub(crate) fn disown(&self) {
        let child = self.inner.lock().child.take();
        if let Some(child) = child.and_then(|weak| weak.upgrade()) {
            child.clear_status();
        }
    }
}
