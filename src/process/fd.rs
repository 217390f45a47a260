/*!
 * Descriptor Table
 * Per-process mapping from integer handles to open files
 */

use std::collections::BTreeMap;

use parking_lot::Mutex;

use crate::core::types::{Fd, FD_START};
use crate::vfs::FileHandle;

/// One open descriptor: the file plus the path it was opened by.
///
/// The path is kept because mapping creation re-derives a file handle by
/// name.
#[derive(Clone)]
pub struct DescriptorEntry {
    pub file: FileHandle,
    pub path: String,
}

/// Per-process descriptor table.
///
/// Handles are allocated from `FD_START` upward and never reused within
/// the process's lifetime, even after removal. Iteration order at exit
/// is insertion order, which the monotonic keys give for free.
pub struct DescriptorTable {
    inner: Mutex<TableInner>,
}

struct TableInner {
    next_fd: Fd,
    entries: BTreeMap<Fd, DescriptorEntry>,
}

impl DescriptorTable {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(TableInner {
                next_fd: FD_START,
                entries: BTreeMap::new(),
            }),
        }
    }

    /// Register an open file, returning its new descriptor
    pub fn add(&self, file: FileHandle, path: &str) -> Fd {
        let mut inner = self.inner.lock();
        let fd = inner.next_fd;
        inner.next_fd += 1;
        inner.entries.insert(
            fd,
            DescriptorEntry {
                file,
                path: path.to_string(),
            },
        );
        fd
    }

    pub fn get(&self, fd: Fd) -> Option<DescriptorEntry> {
        self.inner.lock().entries.get(&fd).cloned()
    }

    pub fn remove(&self, fd: Fd) -> Option<DescriptorEntry> {
        self.inner.lock().entries.remove(&fd)
    }

    /// Take the oldest remaining descriptor; exit drains the table with
    /// this
    pub fn pop_first(&self) -> Option<(Fd, DescriptorEntry)> {
        self.inner.lock().entries.pop_first()
    }

    pub fn len(&self) -> usize {
        self.inner.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().entries.is_empty()
    }
}

impl Default for DescriptorTable {
    fn default() -> Self {
        Self::new()
    }
}
