/*!
 * Memory-Mapped Files
 * Page-granular file mappings layered on the lazy paging subsystem
 */

use std::collections::BTreeMap;

use log::{debug, info};
use parking_lot::Mutex;

use crate::core::types::{MmapId, Vaddr, MMAP_ID_START, PAGE_SIZE};
use crate::vfs::FileHandle;
use crate::vm::AddressSpace;

use super::types::{MappingInfo, MmapError, MmapResult};

/// One memory-mapped file region: the backing open file, its length at
/// mapping time, and every page currently installed for it.
///
/// A mapping starts unregistered (no id); `MappingRegistry::register`
/// assigns the id once all regions are in place.
pub struct Mapping {
    id: Option<MmapId>,
    file: FileHandle,
    len: u64,
    pages: Vec<Vaddr>,
}

impl Mapping {
    /// Build a mapping over an already-open file; empty files cannot be
    /// mapped
    pub fn create(file: FileHandle) -> MmapResult<Self> {
        let len = file.len();
        if len == 0 {
            return Err(MmapError::EmptyFile);
        }
        Ok(Self {
            id: None,
            file,
            len,
            pages: Vec::new(),
        })
    }

    pub fn id(&self) -> Option<MmapId> {
        self.id
    }

    pub fn len(&self) -> u64 {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn page_count(&self) -> usize {
        self.pages.len()
    }

    /// Map one page of the file at `vaddr`, backed by the bytes at
    /// `offset`.
    ///
    /// Fails without recording anything if the address already holds an
    /// installed page or a pending supplemental entry; no mapping may
    /// alias another mapping or an existing allocation. The space's own
    /// lock decides the race against a concurrent fault handler.
    pub fn add_region(
        &mut self,
        space: &AddressSpace,
        vaddr: Vaddr,
        offset: u64,
    ) -> MmapResult<()> {
        if space.is_resident(vaddr) || space.lookup(vaddr).is_some() {
            return Err(MmapError::RegionOccupied(vaddr));
        }
        if offset >= self.len {
            return Err(MmapError::OffsetBeyondEnd {
                offset,
                len: self.len,
            });
        }

        // The last partial page of the file is topped up with zeros.
        let file_remain = self.len - offset;
        let zero_bytes = if file_remain < PAGE_SIZE as u64 {
            PAGE_SIZE - file_remain as usize
        } else {
            0
        };

        space.add_file_page(vaddr, self.file.clone(), offset, zero_bytes, true)?;
        self.pages.push(vaddr);
        Ok(())
    }

    /// Tear down every page of this mapping, then discard it.
    ///
    /// Dirty pages flush back to the backing file as part of the page
    /// release. A recorded page with no supplemental entry means the
    /// bookkeeping here and in the paging subsystem have diverged; that
    /// is a bug, not a runtime fault, so it halts rather than continuing
    /// with corrupt state.
    pub fn destroy(mut self, space: &AddressSpace) {
        for vaddr in self.pages.drain(..) {
            if space.lookup(vaddr).is_none() {
                panic!(
                    "mapping {:?} records page {:#x} with no supplemental entry",
                    self.id, vaddr
                );
            }
            space
                .release(vaddr)
                .expect("page released out from under its mapping");
        }
        debug!("mapping {:?} destroyed", self.id);
    }
}

/// Per-process registry of active mappings, keyed by their monotonically
/// increasing ids
pub struct MappingRegistry {
    inner: Mutex<RegistryInner>,
}

struct RegistryInner {
    next_id: MmapId,
    maps: BTreeMap<MmapId, Mapping>,
}

impl MappingRegistry {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(RegistryInner {
                next_id: MMAP_ID_START,
                maps: BTreeMap::new(),
            }),
        }
    }

    /// Assign the next mapping id and register the mapping under it
    pub fn register(&self, mut mapping: Mapping) -> MmapId {
        let mut inner = self.inner.lock();
        let id = inner.next_id;
        inner.next_id += 1;
        mapping.id = Some(id);
        info!("registered mapping {} ({} pages)", id, mapping.page_count());
        inner.maps.insert(id, mapping);
        id
    }

    /// Destroy the mapping registered under `id`
    pub fn remove(&self, id: MmapId, space: &AddressSpace) -> MmapResult<()> {
        let mapping = self
            .inner
            .lock()
            .maps
            .remove(&id)
            .ok_or(MmapError::NotFound(id))?;
        mapping.destroy(space);
        Ok(())
    }

    /// Destroy every mapping backed by the given open file; called when
    /// a descriptor over that file is closed, including at process exit
    pub fn close_by_file(&self, file: &FileHandle, space: &AddressSpace) {
        let victims: Vec<Mapping> = {
            let mut inner = self.inner.lock();
            let ids: Vec<MmapId> = inner
                .maps
                .iter()
                .filter(|(_, m)| m.file.same_file(file))
                .map(|(id, _)| *id)
                .collect();
            ids.into_iter()
                .filter_map(|id| inner.maps.remove(&id))
                .collect()
        };
        for mapping in victims {
            mapping.destroy(space);
        }
    }

    pub fn info(&self, id: MmapId) -> Option<MappingInfo> {
        self.inner.lock().maps.get(&id).map(|m| MappingInfo {
            id,
            length: m.len,
            pages: m.pages.len(),
        })
    }

    pub fn len(&self) -> usize {
        self.inner.lock().maps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().maps.is_empty()
    }
}

impl Default for MappingRegistry {
    fn default() -> Self {
        Self::new()
    }
}
