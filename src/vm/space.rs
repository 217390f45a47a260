/*!
 * Address Spaces
 * Simulated per-process paging: installs are bookkeeping entries in a
 * supplemental table, faulted in on first access through the space
 */

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};

use ahash::RandomState;
use log::{debug, warn};
use parking_lot::Mutex;

use crate::core::types::{is_user_vaddr, page_offset, page_round_down, Vaddr, PAGE_SIZE};
use crate::vfs::FileHandle;

use super::types::{PageInfo, PageKind, VmError, VmResult};

enum Backing {
    Zero,
    File {
        file: FileHandle,
        offset: u64,
        zero_bytes: usize,
    },
    FileInit {
        file: FileHandle,
        offset: u64,
        zero_bytes: usize,
    },
}

struct PageEntry {
    backing: Backing,
    writable: bool,
    frame: Option<Box<[u8]>>,
    dirty: bool,
}

impl PageEntry {
    fn kind(&self) -> PageKind {
        match self.backing {
            Backing::Zero => PageKind::Zero,
            Backing::File { .. } => PageKind::File,
            Backing::FileInit { .. } => PageKind::FileInit,
        }
    }

    /// Materialize the frame, reading file-backed contents on first touch
    fn fault_in(&mut self) -> VmResult<&mut [u8]> {
        if self.frame.is_none() {
            let mut frame = vec![0u8; PAGE_SIZE].into_boxed_slice();
            match &self.backing {
                Backing::Zero => {}
                Backing::File {
                    file,
                    offset,
                    zero_bytes,
                }
                | Backing::FileInit {
                    file,
                    offset,
                    zero_bytes,
                } => {
                    let read_len = PAGE_SIZE - zero_bytes;
                    file.read_at(*offset, &mut frame[..read_len])?;
                }
            }
            self.frame = Some(frame);
        }
        Ok(self.frame.as_mut().unwrap())
    }
}

/// One process's simulated address space.
///
/// The entry table stands in for both the hardware page table (resident
/// entries) and the supplemental page table (pending entries); all
/// queries and mutations go through its lock, which is the lock the
/// mapping overlap guard relies on.
pub struct AddressSpace {
    pages: Mutex<HashMap<Vaddr, PageEntry, RandomState>>,
    active: AtomicBool,
}

impl std::fmt::Debug for AddressSpace {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AddressSpace")
            .field("pages", &self.pages.lock().len())
            .field("active", &self.active.load(Ordering::SeqCst))
            .finish()
    }
}

impl AddressSpace {
    pub fn new() -> Self {
        Self {
            pages: Mutex::new(HashMap::with_hasher(RandomState::new())),
            active: AtomicBool::new(false),
        }
    }

    /// Make this the active space for the current context
    pub fn activate(&self) {
        self.active.store(true, Ordering::SeqCst);
    }

    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }

    fn check_install(&self, vaddr: Vaddr) -> VmResult<()> {
        if page_offset(vaddr) != 0 {
            return Err(VmError::Misaligned(vaddr));
        }
        if !is_user_vaddr(vaddr) {
            return Err(VmError::OutOfRange(vaddr));
        }
        Ok(())
    }

    fn install(&self, vaddr: Vaddr, entry: PageEntry) -> VmResult<()> {
        self.check_install(vaddr)?;
        let mut pages = self.pages.lock();
        if pages.contains_key(&vaddr) {
            return Err(VmError::AlreadyMapped(vaddr));
        }
        pages.insert(vaddr, entry);
        Ok(())
    }

    /// Install an anonymous zero-filled page, available immediately
    pub fn add_zero_page(&self, vaddr: Vaddr, writable: bool) -> VmResult<()> {
        self.install(
            vaddr,
            PageEntry {
                backing: Backing::Zero,
                writable,
                frame: Some(vec![0u8; PAGE_SIZE].into_boxed_slice()),
                dirty: false,
            },
        )
    }

    /// Install a lazily-loaded shared file page.
    ///
    /// `zero_bytes` trailing bytes of the page are zero-filled instead of
    /// read from the file. Writable pages flush back to the file when
    /// released if they were dirtied.
    pub fn add_file_page(
        &self,
        vaddr: Vaddr,
        file: FileHandle,
        offset: u64,
        zero_bytes: usize,
        writable: bool,
    ) -> VmResult<()> {
        self.install(
            vaddr,
            PageEntry {
                backing: Backing::File {
                    file,
                    offset,
                    zero_bytes,
                },
                writable,
                frame: None,
                dirty: false,
            },
        )
    }

    /// Install a lazily-loaded file page that goes private on first load
    /// (copy-on-first-write); always writable, never flushed back
    pub fn add_file_init_page(
        &self,
        vaddr: Vaddr,
        file: FileHandle,
        offset: u64,
        zero_bytes: usize,
    ) -> VmResult<()> {
        self.install(
            vaddr,
            PageEntry {
                backing: Backing::FileInit {
                    file,
                    offset,
                    zero_bytes,
                },
                writable: true,
                frame: None,
                dirty: false,
            },
        )
    }

    /// Supplemental-table lookup: any installed page, resident or pending
    pub fn lookup(&self, vaddr: Vaddr) -> Option<PageInfo> {
        let pages = self.pages.lock();
        pages.get(&vaddr).map(|e| PageInfo {
            kind: e.kind(),
            writable: e.writable,
            resident: e.frame.is_some(),
        })
    }

    /// Active-table lookup: only pages that have faulted in
    pub fn is_resident(&self, vaddr: Vaddr) -> bool {
        let pages = self.pages.lock();
        pages.get(&vaddr).map(|e| e.frame.is_some()).unwrap_or(false)
    }

    /// Number of installed pages
    pub fn page_count(&self) -> usize {
        self.pages.lock().len()
    }

    /// Release one installed page, flushing a dirty writable shared file
    /// page back to its backing file first
    pub fn release(&self, vaddr: Vaddr) -> VmResult<()> {
        let entry = self
            .pages
            .lock()
            .remove(&vaddr)
            .ok_or(VmError::NotMapped(vaddr))?;
        if let Backing::File {
            ref file,
            offset,
            zero_bytes,
        } = entry.backing
        {
            if entry.writable && entry.dirty {
                if let Some(ref frame) = entry.frame {
                    let flush_len = PAGE_SIZE - zero_bytes;
                    if let Err(e) = file.write_at(offset, &frame[..flush_len]) {
                        warn!("flush of page {:#x} failed: {}", vaddr, e);
                    }
                }
            }
        }
        Ok(())
    }

    /// Tear down the whole space; remaining frames are discarded without
    /// flushing (file mappings are expected to be gone already)
    pub fn destroy(&self) {
        let mut pages = self.pages.lock();
        let count = pages.len();
        pages.clear();
        self.active.store(false, Ordering::SeqCst);
        debug!("address space destroyed ({} pages discarded)", count);
    }

    /// Simulated user read; faults pages in as a real access would
    pub fn read(&self, vaddr: Vaddr, buf: &mut [u8]) -> VmResult<()> {
        self.access(vaddr, buf.len(), false, |frame, at, chunk| {
            buf[chunk.clone()].copy_from_slice(&frame[at..at + chunk.len()]);
        })
    }

    /// Simulated user write; faults pages in and marks them dirty
    pub fn write(&self, vaddr: Vaddr, data: &[u8]) -> VmResult<()> {
        self.access(vaddr, data.len(), true, |frame, at, chunk| {
            frame[at..at + chunk.len()].copy_from_slice(&data[chunk.clone()]);
        })
    }

    /// Walk the touched pages of [vaddr, vaddr + len), faulting each in
    /// and handing the in-page slice to `copy`
    fn access<F>(&self, vaddr: Vaddr, len: usize, write: bool, mut copy: F) -> VmResult<()>
    where
        F: FnMut(&mut [u8], usize, std::ops::Range<usize>),
    {
        let mut pages = self.pages.lock();
        let mut done = 0usize;
        while done < len {
            let addr = vaddr + done;
            let page = page_round_down(addr);
            let at = page_offset(addr);
            let n = (PAGE_SIZE - at).min(len - done);
            let entry = pages.get_mut(&page).ok_or(VmError::NotMapped(page))?;
            if write && !entry.writable {
                return Err(VmError::ReadOnly(page));
            }
            let frame = entry.fault_in()?;
            copy(frame, at, done..done + n);
            if write {
                entry.dirty = true;
            }
            done += n;
        }
        Ok(())
    }
}

impl Default for AddressSpace {
    fn default() -> Self {
        Self::new()
    }
}
