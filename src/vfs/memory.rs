/*!
 * In-Memory Filesystem
 * Flat path-to-node store backing the simulated kernel
 */

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use ahash::RandomState;
use dashmap::DashMap;
use log::debug;
use parking_lot::RwLock;

use super::file::FileHandle;
use super::traits::{FileSystem, Inode};
use super::types::{VfsError, VfsResult};

struct MemNode {
    data: RwLock<Vec<u8>>,
    deny_count: AtomicU32,
}

impl MemNode {
    fn new(data: Vec<u8>) -> Self {
        Self {
            data: RwLock::new(data),
            deny_count: AtomicU32::new(0),
        }
    }
}

impl Inode for MemNode {
    fn len(&self) -> u64 {
        self.data.read().len() as u64
    }

    fn read_at(&self, offset: u64, buf: &mut [u8]) -> VfsResult<usize> {
        let data = self.data.read();
        let offset = offset as usize;
        if offset >= data.len() {
            return Ok(0);
        }
        let n = buf.len().min(data.len() - offset);
        buf[..n].copy_from_slice(&data[offset..offset + n]);
        Ok(n)
    }

    fn write_at(&self, offset: u64, data: &[u8]) -> VfsResult<usize> {
        if self.deny_count.load(Ordering::SeqCst) > 0 {
            return Err(VfsError::PermissionDenied(
                "writes to this file are denied".to_string(),
            ));
        }
        let mut contents = self.data.write();
        let offset = offset as usize;
        let end = offset + data.len();
        if end > contents.len() {
            contents.resize(end, 0);
        }
        contents[offset..end].copy_from_slice(data);
        Ok(data.len())
    }

    fn deny_write(&self) {
        self.deny_count.fetch_add(1, Ordering::SeqCst);
    }

    fn allow_write(&self) {
        self.deny_count.fetch_sub(1, Ordering::SeqCst);
    }
}

/// In-memory filesystem
pub struct MemFs {
    nodes: DashMap<String, Arc<MemNode>, RandomState>,
}

impl MemFs {
    pub fn new() -> Self {
        Self {
            nodes: DashMap::with_hasher(RandomState::new()),
        }
    }
}

impl Default for MemFs {
    fn default() -> Self {
        Self::new()
    }
}

impl FileSystem for MemFs {
    fn open(&self, path: &str) -> VfsResult<FileHandle> {
        let node = self
            .nodes
            .get(path)
            .ok_or_else(|| VfsError::NotFound(path.to_string()))?;
        Ok(FileHandle::new(Arc::clone(node.value()) as Arc<dyn Inode>))
    }

    fn write(&self, path: &str, data: &[u8]) -> VfsResult<()> {
        if path.is_empty() {
            return Err(VfsError::InvalidPath(path.to_string()));
        }
        match self.nodes.get(path) {
            // Writing through the store honors write denial like any
            // other writer would.
            Some(node) => {
                let n = node.write_at(0, data)?;
                debug_assert_eq!(n, data.len());
                let mut contents = node.data.write();
                contents.truncate(data.len());
            }
            None => {
                self.nodes
                    .insert(path.to_string(), Arc::new(MemNode::new(data.to_vec())));
            }
        }
        debug!("memfs: wrote {} bytes to '{}'", data.len(), path);
        Ok(())
    }

    fn exists(&self, path: &str) -> bool {
        self.nodes.contains_key(path)
    }

    fn remove(&self, path: &str) -> VfsResult<()> {
        self.nodes
            .remove(path)
            .map(|_| ())
            .ok_or_else(|| VfsError::NotFound(path.to_string()))
    }

    fn name(&self) -> &str {
        "memfs"
    }
}
