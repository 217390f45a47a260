/*!
 * Process Management
 * Lifecycle control, exit rendezvous, descriptors, and the user-mode
 * seam
 */

pub mod fd;
pub mod manager;
pub mod process;
pub mod status;
pub mod types;
pub mod user;

pub use fd::{DescriptorEntry, DescriptorTable};
pub use manager::{ProcessManager, ProcessManagerBuilder};
pub use process::Process;
pub use status::ChildStatus;
pub use types::{ProcessError, ProcessInfo, ProcessResult};
pub use user::{HaltUserMode, ProgramBody, ProgramRegistry, UserMode};
