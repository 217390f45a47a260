/*!
 * TeachOS Kernel Library
 * Process lifecycle, executable loading, and per-process resources for
 * a hosted teaching kernel
 */

pub mod core;
pub mod loader;
pub mod mmap;
pub mod process;
pub mod vfs;
pub mod vm;

// Re-exports
pub use crate::core::errors::{LoadError, MmapError, ProcessError, VfsError, VmError};
pub use crate::core::types::{
    ExitStatus, Fd, MmapId, Pid, Priority, Vaddr, EXIT_FAILURE_STATUS, FD_START, MMAP_ID_START,
    PAGE_SIZE, USER_LIMIT, WORD_SIZE,
};
pub use loader::{LoadResult, UserFrame};
pub use mmap::{Mapping, MappingInfo, MappingRegistry, MmapResult};
pub use process::{
    DescriptorEntry, DescriptorTable, HaltUserMode, Process, ProcessInfo, ProcessManager,
    ProcessResult, ProgramRegistry, UserMode,
};
pub use vfs::{FileHandle, FileSystem, MemFs, VfsResult};
pub use vm::{AddressSpace, PageInfo, PageKind, VmResult};
