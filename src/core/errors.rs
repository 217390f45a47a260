/*!
 * Error Types
 * Centralized re-exports of the per-subsystem error enums
 */

pub use crate::loader::LoadError;
pub use crate::mmap::MmapError;
pub use crate::process::ProcessError;
pub use crate::vfs::VfsError;
pub use crate::vm::VmError;
