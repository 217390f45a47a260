/*!
 * VFS Traits
 * Core filesystem abstraction traits
 */

use super::file::FileHandle;
use super::types::VfsResult;

/// Filesystem interface consumed by the process core.
///
/// Deliberately narrow: the kernel opens executables and mapped files by
/// path; everything else it does through the returned handle.
pub trait FileSystem: Send + Sync {
    /// Open an existing file, producing a fresh open-file handle
    fn open(&self, path: &str) -> VfsResult<FileHandle>;

    /// Create a file with the given contents, overwriting any previous one
    fn write(&self, path: &str, data: &[u8]) -> VfsResult<()>;

    /// Check whether a file exists
    fn exists(&self, path: &str) -> bool;

    /// Delete a file
    fn remove(&self, path: &str) -> VfsResult<()>;

    /// Filesystem name/type
    fn name(&self) -> &str;

    /// Read entire file contents
    fn read(&self, path: &str) -> VfsResult<Vec<u8>> {
        let file = self.open(path)?;
        let mut buf = vec![0u8; file.len() as usize];
        file.read_at(0, &mut buf)?;
        Ok(buf)
    }
}

/// Backing inode interface for open-file handles.
///
/// Write denial lives at this level so that it covers every open handle
/// of the same file, not just the one that requested it.
pub trait Inode: Send + Sync {
    /// Current file length in bytes
    fn len(&self) -> u64;

    /// Read into `buf` starting at `offset`; returns bytes read
    fn read_at(&self, offset: u64, buf: &mut [u8]) -> VfsResult<usize>;

    /// Write `data` starting at `offset`, extending the file if needed;
    /// fails while writes are denied
    fn write_at(&self, offset: u64, data: &[u8]) -> VfsResult<usize>;

    /// Increment the write-denial count
    fn deny_write(&self);

    /// Decrement the write-denial count
    fn allow_write(&self);
}
