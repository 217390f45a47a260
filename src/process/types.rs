/*!
 * Process Types
 * Common types for process management
 */

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::core::types::{Fd, Pid, Priority};
use crate::mmap::MmapError;
use crate::vfs::VfsError;

/// Process operation result
pub type ProcessResult<T> = Result<T, ProcessError>;

/// Process errors
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProcessError {
    #[error("process {0} not found")]
    NotFound(Pid),

    #[error("{0} is not a waitable child")]
    NotChild(Pid),

    #[error("failed to create execution context: {0}")]
    SpawnFailed(String),

    #[error("load failed for '{0}'")]
    LoadFailed(String),

    #[error("bad descriptor {0}")]
    BadDescriptor(Fd),

    #[error("process has no address space")]
    NoAddressSpace,

    #[error("filesystem error: {0}")]
    Vfs(#[from] VfsError),

    #[error(transparent)]
    Mmap(#[from] MmapError),
}

/// Process metadata snapshot
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct ProcessInfo {
    pub pid: Pid,
    pub name: String,
    pub priority: Priority,
    pub user: bool,
    pub open_files: usize,
    pub mappings: usize,
}
