/*!
 * VM Types
 * Errors and page taxonomy for the simulated paging subsystem
 */

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::core::types::Vaddr;
use crate::vfs::VfsError;

/// VM operation result
pub type VmResult<T> = Result<T, VmError>;

/// VM errors
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum VmError {
    #[error("address {0:#x} is not page aligned")]
    Misaligned(Vaddr),

    #[error("address {0:#x} is outside the user range")]
    OutOfRange(Vaddr),

    #[error("a page is already installed at {0:#x}")]
    AlreadyMapped(Vaddr),

    #[error("no page is installed at {0:#x}")]
    NotMapped(Vaddr),

    #[error("write to read-only page at {0:#x}")]
    ReadOnly(Vaddr),

    #[error("page I/O failed: {0}")]
    Io(#[from] VfsError),
}

/// What backs a page once it faults in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PageKind {
    /// Zero-filled anonymous page, resident from the moment it is installed
    Zero,
    /// Lazily-loaded shared file page; dirty writable pages flush back to
    /// the file when released
    File,
    /// Lazily-loaded file page that goes private on first load
    /// (copy-on-first-write); never flushed back
    FileInit,
}

/// Snapshot of one installed page, for callers consulting the
/// supplemental table
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageInfo {
    pub kind: PageKind,
    pub writable: bool,
    pub resident: bool,
}
