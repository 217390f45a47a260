/*!
 * Mmap Types
 * Errors and introspection types for memory-mapped files
 */

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::core::types::{MmapId, Vaddr};
use crate::vfs::VfsError;
use crate::vm::VmError;

/// Mmap operation result
pub type MmapResult<T> = Result<T, MmapError>;

/// Mmap errors
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum MmapError {
    #[error("cannot map an empty file")]
    EmptyFile,

    #[error("mapping {0} not found")]
    NotFound(MmapId),

    #[error("address {0:#x} is already mapped")]
    RegionOccupied(Vaddr),

    #[error("offset {offset} is beyond the end of the {len}-byte file")]
    OffsetBeyondEnd { offset: u64, len: u64 },

    #[error("page install failed: {0}")]
    Install(#[from] VmError),

    #[error("filesystem error: {0}")]
    Vfs(#[from] VfsError),
}

/// Snapshot of one registered mapping
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct MappingInfo {
    pub id: MmapId,
    pub length: u64,
    pub pages: usize,
}
