/*!
 * Process Management
 * Process creation, parent/child exit rendezvous, and teardown
 */

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::thread;

use ahash::RandomState;
use dashmap::DashMap;
use log::{debug, info, warn};

use crate::core::types::{
    ExitStatus, Fd, MmapId, Pid, Vaddr, EXIT_FAILURE_STATUS, PAGE_SIZE, PRIORITY_DEFAULT,
};
use crate::loader::{self, LoadError, UserFrame};
use crate::mmap::{Mapping, MappingInfo};
use crate::vfs::{FileSystem, MemFs};

use super::process::Process;
use super::status::ChildStatus;
use super::types::{ProcessError, ProcessInfo, ProcessResult};
use super::user::{HaltUserMode, UserMode};

pub struct ProcessManager {
    processes: Arc<DashMap<Pid, Arc<Process>, RandomState>>,
    next_pid: Arc<AtomicU32>,
    fs: Arc<dyn FileSystem>,
    user_mode: Arc<dyn UserMode>,
}

/// Builder for ProcessManager
pub struct ProcessManagerBuilder {
    fs: Option<Arc<dyn FileSystem>>,
    user_mode: Option<Arc<dyn UserMode>>,
}

impl ProcessManagerBuilder {
    pub fn new() -> Self {
        Self {
            fs: None,
            user_mode: None,
        }
    }

    /// Filesystem executables and mapped files are opened from
    pub fn with_filesystem(mut self, fs: Arc<dyn FileSystem>) -> Self {
        self.fs = Some(fs);
        self
    }

    /// User-mode entry implementation
    pub fn with_user_mode(mut self, user_mode: Arc<dyn UserMode>) -> Self {
        self.user_mode = Some(user_mode);
        self
    }

    pub fn build(self) -> ProcessManager {
        let fs = self.fs.unwrap_or_else(|| Arc::new(MemFs::new()));
        let user_mode = self.user_mode.unwrap_or_else(|| Arc::new(HaltUserMode));
        info!("process manager initialized (fs: {})", fs.name());
        ProcessManager {
            processes: Arc::new(DashMap::with_hasher(RandomState::new())),
            next_pid: Arc::new(AtomicU32::new(1)),
            fs,
            user_mode,
        }
    }
}

impl Default for ProcessManagerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl ProcessManager {
    pub fn new() -> Self {
        ProcessManagerBuilder::new().build()
    }

    pub fn builder() -> ProcessManagerBuilder {
        ProcessManagerBuilder::new()
    }

    /// Create a kernel context with no executable behind it; the initial
    /// caller of `spawn`/`wait` needs a process of its own to parent the
    /// children it creates
    pub fn bootstrap(&self, name: &str) -> Pid {
        let pid = self.next_pid.fetch_add(1, Ordering::SeqCst);
        let proc = Process::new(pid, name.to_string(), PRIORITY_DEFAULT);
        self.processes.insert(pid, proc);
        debug!("bootstrapped kernel context '{}' as pid {}", name, pid);
        pid
    }

    pub fn process(&self, pid: Pid) -> Option<Arc<Process>> {
        self.processes.get(&pid).map(|r| Arc::clone(r.value()))
    }

    pub fn list(&self) -> Vec<ProcessInfo> {
        self.processes.iter().map(|r| r.value().info()).collect()
    }

    /// Start a new process running the executable named by `cmdline`
    /// (program name runs up to the first space).
    ///
    /// Blocks until the new context has finished loading. Returns the
    /// child pid on success; if the executable cannot be loaded, no
    /// process remains and an error is returned.
    pub fn spawn(&self, parent: Pid, cmdline: &str) -> ProcessResult<Pid> {
        let parent_proc = self
            .process(parent)
            .ok_or(ProcessError::NotFound(parent))?;
        let prog_name = cmdline.split(' ').next().unwrap_or("");

        let pid = self.next_pid.fetch_add(1, Ordering::SeqCst);
        let child = Process::new(pid, prog_name.to_string(), PRIORITY_DEFAULT);

        // The rendezvous record exists before the child runs, so the
        // parent can wait on it no matter how the interleaving goes.
        let record = ChildStatus::new(&child);
        child.adopt_status(Arc::clone(&record));
        parent_proc.register_child(record);
        self.processes.insert(pid, Arc::clone(&child));

        let (loaded_tx, loaded_rx) = flume::bounded::<bool>(1);
        let kernel = self.clone();
        let cmdline = cmdline.to_string();
        let spawned = thread::Builder::new()
            .name(prog_name.to_string())
            .spawn(move || kernel.start_process(pid, &cmdline, loaded_tx));

        if let Err(e) = spawned {
            // The context never existed; unwind the registration.
            parent_proc.remove_child(pid);
            self.processes.remove(&pid);
            return Err(ProcessError::SpawnFailed(e.to_string()));
        }

        // One-shot completion signal: the only suspension point in
        // process creation.
        match loaded_rx.recv() {
            Ok(true) => {
                info!("spawned '{}' as pid {}", child.name(), pid);
                Ok(pid)
            }
            _ => Err(ProcessError::LoadFailed(child.name().to_string())),
        }
    }

    /// Entry function of a freshly spawned context: load the executable
    /// and either hand control to user code or die with the failure
    /// status
    fn start_process(&self, pid: Pid, cmdline: &str, loaded_tx: flume::Sender<bool>) {
        let proc = match self.process(pid) {
            Some(p) => p,
            None => {
                let _ = loaded_tx.send(false);
                return;
            }
        };
        proc.mark_user();

        match self.load_executable(&proc, cmdline) {
            Ok(frame) => {
                let _ = loaded_tx.send(true);
                drop(loaded_tx);
                // A user program that faults is killed by the kernel and
                // reports the failure status to its parent.
                let entered = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
                    self.user_mode.enter(self, pid, frame)
                }));
                let status = entered.unwrap_or_else(|_| {
                    warn!("pid {} ('{}') faulted; killing it", pid, proc.name());
                    EXIT_FAILURE_STATUS
                });
                self.exit(pid, status);
            }
            Err(err) => {
                debug!("load of '{}' failed: {}", proc.name(), err);
                let _ = loaded_tx.send(false);
                self.exit(pid, EXIT_FAILURE_STATUS);
            }
        }
    }

    /// Open the executable, deny writes to it for as long as this
    /// process holds it, and load it into a fresh address space
    fn load_executable(&self, proc: &Arc<Process>, cmdline: &str) -> Result<UserFrame, LoadError> {
        let name = proc.name();
        let file = match self.fs.open(name) {
            Ok(f) => f,
            Err(e) => {
                println!("load: {}: open failed", name);
                return Err(LoadError::Io(e));
            }
        };
        file.deny_write();

        match loader::load(&file, cmdline) {
            Ok((space, frame)) => {
                proc.set_exec_file(file);
                proc.set_address_space(space);
                Ok(frame)
            }
            Err(err) => {
                println!("load: {}: error loading executable", name);
                file.allow_write();
                Err(err)
            }
        }
    }

    /// Wait for child `child` of `parent` to exit and reap its status.
    ///
    /// Fails immediately, without blocking, if `child` is not a
    /// currently registered child — including the case where it was
    /// already reaped by an earlier wait.
    pub fn wait(&self, parent: Pid, child: Pid) -> ProcessResult<ExitStatus> {
        let parent_proc = self
            .process(parent)
            .ok_or(ProcessError::NotFound(parent))?;
        let record = parent_proc
            .find_child(child)
            .ok_or(ProcessError::NotChild(child))?;

        let status = record.await_exit();
        parent_proc.remove_child(child);
        debug!("pid {} reaped child {} (status {})", parent, child, status);
        Ok(status)
    }

    /// Terminate the process, releasing everything it owns.
    ///
    /// Descriptors close first (taking down any mapping of each file),
    /// then the parent is signaled, remaining children are disowned, the
    /// executable is released, and the address space is torn down. A
    /// second exit for the same pid is a no-op.
    pub fn exit(&self, pid: Pid, status: ExitStatus) {
        let proc = match self.processes.remove(&pid) {
            Some((_, p)) => p,
            None => {
                warn!("exit for unknown pid {}", pid);
                return;
            }
        };
        proc.set_exit_code(status);

        if proc.is_user() {
            println!("{}: exit({})", proc.name(), proc.exit_code());
        }

        // Close every descriptor in insertion order; mappings backed by
        // a file must go before its handle does.
        let space = proc.take_address_space();
        while let Some((fd, entry)) = proc.fds().pop_first() {
            if let Some(ref space) = space {
                proc.mappings().close_by_file(&entry.file, space);
            }
            debug!("pid {}: closed fd {} ('{}')", pid, fd, entry.path);
        }

        // Tell a waiting parent, if one still holds our record.
        if let Some(record) = proc.take_status() {
            record.record_exit(status);
        }

        // Disown everything we never reaped; a running child's later
        // exit must find no record to signal.
        for record in proc.drain_children() {
            record.disown();
        }

        // Release the executable: writes allowed again, then closed.
        if let Some(exec) = proc.take_exec_file() {
            exec.allow_write();
        }

        if let Some(space) = space {
            space.destroy();
        }

        info!("pid {} ('{}') exited with status {}", pid, proc.name(), status);
    }

    /// Open `path` into the process's descriptor table
    pub fn open(&self, pid: Pid, path: &str) -> ProcessResult<Fd> {
        let proc = self.process(pid).ok_or(ProcessError::NotFound(pid))?;
        let file = self.fs.open(path)?;
        Ok(proc.fds().add(file, path))
    }

    /// Close a descriptor, destroying any mapping still backed by its
    /// file
    pub fn close(&self, pid: Pid, fd: Fd) -> ProcessResult<()> {
        let proc = self.process(pid).ok_or(ProcessError::NotFound(pid))?;
        let entry = proc
            .fds()
            .get(fd)
            .ok_or(ProcessError::BadDescriptor(fd))?;
        if let Some(space) = proc.address_space() {
            proc.mappings().close_by_file(&entry.file, &space);
        }
        proc.fds().remove(fd);
        Ok(())
    }

    /// Create an unregistered mapping of `path`, opened through the
    /// descriptor table
    pub fn mmap_create(&self, pid: Pid, path: &str) -> ProcessResult<Mapping> {
        let proc = self.process(pid).ok_or(ProcessError::NotFound(pid))?;
        let file = self.fs.open(path)?;
        proc.fds().add(file.clone(), path);
        Ok(Mapping::create(file)?)
    }

    /// Map one page of `mapping` at `vaddr`
    pub fn mmap_add_region(
        &self,
        pid: Pid,
        mapping: &mut Mapping,
        vaddr: Vaddr,
        offset: u64,
    ) -> ProcessResult<()> {
        let proc = self.process(pid).ok_or(ProcessError::NotFound(pid))?;
        let space = proc.address_space().ok_or(ProcessError::NoAddressSpace)?;
        mapping.add_region(&space, vaddr, offset)?;
        Ok(())
    }

    /// Register a fully built mapping, assigning its id
    pub fn mmap_register(&self, pid: Pid, mapping: Mapping) -> ProcessResult<MmapId> {
        let proc = self.process(pid).ok_or(ProcessError::NotFound(pid))?;
        Ok(proc.mappings().register(mapping))
    }

    /// Destroy the mapping registered under `id`
    pub fn mmap_remove(&self, pid: Pid, id: MmapId) -> ProcessResult<()> {
        let proc = self.process(pid).ok_or(ProcessError::NotFound(pid))?;
        let space = proc.address_space().ok_or(ProcessError::NoAddressSpace)?;
        proc.mappings().remove(id, &space)?;
        Ok(())
    }

    pub fn mmap_info(&self, pid: Pid, id: MmapId) -> Option<MappingInfo> {
        self.process(pid).and_then(|p| p.mappings().info(id))
    }

    /// Map the file behind descriptor `fd` at `base`, page by page: the
    /// composed mmap system call.
    ///
    /// The mapping gets its own handle, re-derived from the descriptor's
    /// recorded path, so it survives the original descriptor and dies
    /// with its own. A failed page tears the partial mapping back down.
    pub fn mmap_fd(&self, pid: Pid, fd: Fd, base: Vaddr) -> ProcessResult<MmapId> {
        let proc = self.process(pid).ok_or(ProcessError::NotFound(pid))?;
        let space = proc.address_space().ok_or(ProcessError::NoAddressSpace)?;
        let entry = proc
            .fds()
            .get(fd)
            .ok_or(ProcessError::BadDescriptor(fd))?;

        let mut mapping = self.mmap_create(pid, &entry.path)?;
        let len = mapping.len();
        let mut offset = 0u64;
        while offset < len {
            if let Err(e) = mapping.add_region(&space, base + offset as Vaddr, offset) {
                mapping.destroy(&space);
                return Err(e.into());
            }
            offset += PAGE_SIZE as u64;
        }
        Ok(proc.mappings().register(mapping))
    }

    /// Open `path` and map it wholly at `base`
    pub fn mmap_file(&self, pid: Pid, path: &str, base: Vaddr) -> ProcessResult<MmapId> {
        let fd = self.open(pid, path)?;
        self.mmap_fd(pid, fd, base)
    }
}

impl Clone for ProcessManager {
    fn clone(&self) -> Self {
        Self {
            processes: Arc::clone(&self.processes),
            next_pid: Arc::clone(&self.next_pid),
            fs: Arc::clone(&self.fs),
            user_mode: Arc::clone(&self.user_mode),
        }
    }
}

impl Default for ProcessManager {
    fn default() -> Self {
        Self::new()
    }
}
