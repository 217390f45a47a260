/*!
 * Core Types
 * Common types and constants used across the kernel
 */

/// Process ID type
pub type Pid = u32;

/// File descriptor type
pub type Fd = u32;

/// Memory mapping identifier
pub type MmapId = u32;

/// User virtual address
pub type Vaddr = usize;

/// Priority level (0-63, higher is more important)
pub type Priority = u8;

/// Exit status of a terminated process
pub type ExitStatus = i32;

/// Size of a virtual page in bytes
pub const PAGE_SIZE: usize = 4096;

/// Mask selecting the offset within a page
pub const PAGE_MASK: usize = PAGE_SIZE - 1;

/// First address above the user-accessible range
pub const USER_LIMIT: Vaddr = 0xC000_0000;

/// Native word size of the target user runtime (ELF32)
pub const WORD_SIZE: usize = 4;

/// First allocatable descriptor; 0-2 are reserved for the console
pub const FD_START: Fd = 3;

/// First memory mapping id handed out per process
pub const MMAP_ID_START: MmapId = 1;

/// Priority assigned to freshly spawned processes
pub const PRIORITY_DEFAULT: Priority = 31;

/// Exit status recorded for processes whose load failed or that were
/// terminated by the kernel
pub const EXIT_FAILURE_STATUS: ExitStatus = -1;

/// Round an address down to its page boundary
#[inline]
pub const fn page_round_down(addr: Vaddr) -> Vaddr {
    addr & !PAGE_MASK
}

/// Round a size up to the next page boundary
#[inline]
pub const fn page_round_up(size: usize) -> usize {
    (size + PAGE_MASK) & !PAGE_MASK
}

/// Offset of an address within its page
#[inline]
pub const fn page_offset(addr: Vaddr) -> usize {
    addr & PAGE_MASK
}

/// Whether an address lies in the user-accessible range
#[inline]
pub const fn is_user_vaddr(addr: Vaddr) -> bool {
    addr < USER_LIMIT
}
