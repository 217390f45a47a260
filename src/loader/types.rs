/*!
 * Loader Types
 * Load errors and the register state handed to a new user context
 */

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::core::types::Vaddr;
use crate::vfs::VfsError;
use crate::vm::VmError;

/// Load operation result
pub type LoadResult<T> = Result<T, LoadError>;

/// Why an executable image was rejected
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum LoadError {
    #[error("executable header truncated")]
    TruncatedHeader,

    #[error("not an ELF32 executable")]
    BadMagic,

    #[error("unsupported object type {0}")]
    UnsupportedType(u16),

    #[error("unsupported target machine {0}")]
    UnsupportedMachine(u16),

    #[error("unsupported format version {0}")]
    UnsupportedVersion(u32),

    #[error("unexpected program header size {0}")]
    BadHeaderSize(u16),

    #[error("too many program headers ({0})")]
    TooManyHeaders(u16),

    #[error("program header table lies outside the file")]
    HeaderOutOfBounds,

    #[error("program header truncated")]
    TruncatedProgramHeader,

    #[error("dynamic linking is not supported")]
    DynamicNotSupported,

    #[error("invalid loadable segment at {0:#x}")]
    InvalidSegment(Vaddr),

    #[error("page install failed: {0}")]
    Install(#[from] VmError),

    #[error("executable read failed: {0}")]
    Io(#[from] VfsError),
}

/// Initial register state of a loaded program: the header's entry point
/// and the prepared stack pointer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserFrame {
    pub entry: Vaddr,
    pub stack_ptr: Vaddr,
}
