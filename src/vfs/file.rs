/*!
 * Open Files
 * Shared open-file handles with position, length, and write denial
 */

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

use super::traits::Inode;
use super::types::VfsResult;

struct OpenFile {
    inode: Arc<dyn Inode>,
    pos: Mutex<u64>,
    denied: AtomicBool,
}

impl Drop for OpenFile {
    fn drop(&mut self) {
        // A handle dropped while still denying writes must release its
        // denial, or the inode would stay read-only forever.
        if self.denied.load(Ordering::SeqCst) {
            self.inode.allow_write();
        }
    }
}

/// Handle to one open file.
///
/// Clones share the same open-file object (position and write-denial
/// state included); two separate `open` calls on the same path produce
/// distinct handles over the same inode. The file is closed when the
/// last clone is dropped.
#[derive(Clone)]
pub struct FileHandle {
    of: Arc<OpenFile>,
}

impl FileHandle {
    pub fn new(inode: Arc<dyn Inode>) -> Self {
        Self {
            of: Arc::new(OpenFile {
                inode,
                pos: Mutex::new(0),
                denied: AtomicBool::new(false),
            }),
        }
    }

    /// Current file length in bytes
    pub fn len(&self) -> u64 {
        self.of.inode.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Read at the current position, advancing it by the bytes read
    pub fn read(&self, buf: &mut [u8]) -> VfsResult<usize> {
        let mut pos = self.of.pos.lock();
        let n = self.of.inode.read_at(*pos, buf)?;
        *pos += n as u64;
        Ok(n)
    }

    /// Read at an explicit offset without touching the position
    pub fn read_at(&self, offset: u64, buf: &mut [u8]) -> VfsResult<usize> {
        self.of.inode.read_at(offset, buf)
    }

    /// Write at an explicit offset without touching the position
    pub fn write_at(&self, offset: u64, data: &[u8]) -> VfsResult<usize> {
        self.of.inode.write_at(offset, data)
    }

    /// Move the position for subsequent `read` calls
    pub fn seek(&self, pos: u64) {
        *self.of.pos.lock() = pos;
    }

    /// Current position
    pub fn tell(&self) -> u64 {
        *self.of.pos.lock()
    }

    /// Deny writes to the underlying inode for as long as this handle
    /// holds the denial (idempotent per handle)
    pub fn deny_write(&self) {
        if !self.of.denied.swap(true, Ordering::SeqCst) {
            self.of.inode.deny_write();
        }
    }

    /// Re-allow writes previously denied through this handle
    pub fn allow_write(&self) {
        if self.of.denied.swap(false, Ordering::SeqCst) {
            self.of.inode.allow_write();
        }
    }

    /// Whether two handles refer to the same open file
    pub fn same_file(&self, other: &FileHandle) -> bool {
        Arc::ptr_eq(&self.of, &other.of)
    }
}

impl std::fmt::Debug for FileHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileHandle")
            .field("len", &self.len())
            .field("pos", &self.tell())
            .finish()
    }
}
