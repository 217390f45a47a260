/*!
 * Process Control Block
 * Kernel-side state owned by one execution context
 */

use std::sync::atomic::{AtomicBool, AtomicI32, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::core::types::{ExitStatus, Pid, Priority};
use crate::mmap::MappingRegistry;
use crate::vfs::FileHandle;
use crate::vm::AddressSpace;

use super::fd::DescriptorTable;
use super::status::ChildStatus;
use super::types::ProcessInfo;

/// One process's kernel bookkeeping: identity, descriptor table, file
/// mappings, exit rendezvous links, the held executable, and the address
/// space once loading created it.
pub struct Process {
    pid: Pid,
    name: String,
    priority: Priority,
    user: AtomicBool,
    exit_code: AtomicI32,
    fds: DescriptorTable,
    mappings: MappingRegistry,
    /// Status records of children not yet reaped; owned by this process
    /// as the parent
    children: Mutex<Vec<Arc<ChildStatus>>>,
    /// Back-slot to our own status record, shared with the parent;
    /// absent for the root context and after disowning
    status: Mutex<Option<Arc<ChildStatus>>>,
    /// The executable, kept open and write-denied for our lifetime
    exec_file: Mutex<Option<FileHandle>>,
    space: Mutex<Option<Arc<AddressSpace>>>,
}

impl Process {
    pub(crate) fn new(pid: Pid, name: String, priority: Priority) -> Arc<Self> {
        Arc::new(Self {
            pid,
            name,
            priority,
            user: AtomicBool::new(false),
            exit_code: AtomicI32::new(0),
            fds: DescriptorTable::new(),
            mappings: MappingRegistry::new(),
            children: Mutex::new(Vec::new()),
            status: Mutex::new(None),
            exec_file: Mutex::new(None),
            space: Mutex::new(None),
        })
    }

    pub fn pid(&self) -> Pid {
        self.pid
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Mark this context as running a user program
    pub(crate) fn mark_user(&self) {
        self.user.store(true, Ordering::SeqCst);
    }

    pub fn is_user(&self) -> bool {
        self.user.load(Ordering::SeqCst)
    }

    pub(crate) fn set_exit_code(&self, code: ExitStatus) {
        self.exit_code.store(code, Ordering::SeqCst);
    }

    pub fn exit_code(&self) -> ExitStatus {
        self.exit_code.load(Ordering::SeqCst)
    }

    pub fn fds(&self) -> &DescriptorTable {
        &self.fds
    }

    pub fn mappings(&self) -> &MappingRegistry {
        &self.mappings
    }

    pub fn address_space(&self) -> Option<Arc<AddressSpace>> {
        self.space.lock().clone()
    }

    pub(crate) fn set_address_space(&self, space: Arc<AddressSpace>) {
        *self.space.lock() = Some(space);
    }

    pub(crate) fn take_address_space(&self) -> Option<Arc<AddressSpace>> {
        self.space.lock().take()
    }

    pub(crate) fn set_exec_file(&self, file: FileHandle) {
        *self.exec_file.lock() = Some(file);
    }

    pub(crate) fn take_exec_file(&self) -> Option<FileHandle> {
        self.exec_file.lock().take()
    }

    pub(crate) fn adopt_status(&self, record: Arc<ChildStatus>) {
        *self.status.lock() = Some(record);
    }

    pub(crate) fn take_status(&self) -> Option<Arc<ChildStatus>> {
        self.status.lock().take()
    }

    /// Drop the back-slot without touching the record; the disowning
    /// parent already owns the teardown
    pub(crate) fn clear_status(&self) {
        self.status.lock().take();
    }

    pub(crate) fn register_child(&self, record: Arc<ChildStatus>) {
        self.children.lock().push(record);
    }

    pub(crate) fn find_child(&self, pid: Pid) -> Option<Arc<ChildStatus>> {
        self.children
            .lock()
            .iter()
            .find(|r| r.pid() == pid)
            .cloned()
    }

    pub(crate) fn remove_child(&self, pid: Pid) -> Option<Arc<ChildStatus>> {
        let mut children = self.children.lock();
        let at = children.iter().position(|r| r.pid() == pid)?;
        Some(children.remove(at))
    }

    pub(crate) fn drain_children(&self) -> Vec<Arc<ChildStatus>> {
        std::mem::take(&mut *self.children.lock())
    }

    pub fn info(&self) -> ProcessInfo {
        ProcessInfo {
            pid: self.pid,
            name: self.name.clone(),
            priority: self.priority,
            user: self.is_user(),
            open_files: self.fds.len(),
            mappings: self.mappings.len(),
        }
    }
}
