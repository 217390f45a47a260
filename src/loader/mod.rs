/*!
 * Executable Loader
 * Parses and validates ELF32 executables and installs their segments
 * into a fresh address space as lazily-loaded pages
 */

pub mod elf;
pub mod stack;
pub mod types;

use std::sync::Arc;

use log::debug;

use crate::core::types::{
    is_user_vaddr, page_offset, page_round_down, page_round_up, Vaddr, PAGE_SIZE, USER_LIMIT,
};
use crate::vfs::FileHandle;
use crate::vm::AddressSpace;

use elf::{FileHeader, ProgramHeader};
pub use types::{LoadError, LoadResult, UserFrame};

/// Load an executable image into a fresh, activated address space.
///
/// On success returns the space together with the initial register
/// state: the header's declared entry point and a stack pointer with the
/// command-line arguments laid out. On failure the partially built space
/// is simply dropped; nothing outside it was touched.
pub fn load(file: &FileHandle, cmdline: &str) -> LoadResult<(Arc<AddressSpace>, UserFrame)> {
    let space = Arc::new(AddressSpace::new());
    space.activate();

    let mut hdr_buf = [0u8; elf::EHDR_SIZE];
    file.seek(0);
    if file.read(&mut hdr_buf)? != elf::EHDR_SIZE {
        return Err(LoadError::TruncatedHeader);
    }
    let ehdr = FileHeader::parse(&hdr_buf)?;
    ehdr.check()?;

    let file_len = file.len();
    let mut file_ofs = ehdr.phoff as u64;
    for _ in 0..ehdr.phnum {
        if file_ofs > file_len {
            return Err(LoadError::HeaderOutOfBounds);
        }
        file.seek(file_ofs);
        let mut phdr_buf = [0u8; elf::PHDR_SIZE];
        if file.read(&mut phdr_buf)? != elf::PHDR_SIZE {
            return Err(LoadError::TruncatedProgramHeader);
        }
        file_ofs += elf::PHDR_SIZE as u64;

        let phdr = ProgramHeader::parse(&phdr_buf)?;
        match phdr.ptype {
            elf::PT_DYNAMIC | elf::PT_INTERP | elf::PT_SHLIB => {
                return Err(LoadError::DynamicNotSupported);
            }
            elf::PT_LOAD => {
                validate_segment(&phdr, file_len)?;
                install_segment(&space, file, &phdr)?;
            }
            // NULL, NOTE, PHDR, STACK, and unknown types carry nothing
            // to load.
            _ => {}
        }
    }

    let stack_top = setup_stack(&space)?;
    let stack_ptr = stack::build(&space, cmdline, stack_top)?;

    debug!(
        "loaded image: entry {:#x}, {} pages installed",
        ehdr.entry,
        space.page_count()
    );

    Ok((
        space,
        UserFrame {
            entry: ehdr.entry as Vaddr,
            stack_ptr,
        },
    ))
}

/// Reject a loadable segment that could corrupt the kernel or another
/// page of this process no matter what the file contains
fn validate_segment(phdr: &ProgramHeader, file_len: u64) -> LoadResult<()> {
    let vaddr = phdr.vaddr as Vaddr;

    // File offset and virtual address must agree on their page-internal
    // offset, or the page chunks cannot line up.
    if page_offset(phdr.offset as usize) != page_offset(vaddr) {
        return Err(LoadError::InvalidSegment(vaddr));
    }
    if phdr.offset as u64 > file_len {
        return Err(LoadError::InvalidSegment(vaddr));
    }
    if phdr.memsz < phdr.filesz {
        return Err(LoadError::InvalidSegment(vaddr));
    }
    if phdr.memsz == 0 {
        return Err(LoadError::InvalidSegment(vaddr));
    }

    // The region must start and end inside the user range, without
    // wrapping around the top of the address space.
    let end = match phdr.vaddr.checked_add(phdr.memsz) {
        Some(end) => end,
        None => return Err(LoadError::InvalidSegment(vaddr)),
    };
    if !is_user_vaddr(vaddr) || !is_user_vaddr(end as Vaddr) {
        return Err(LoadError::InvalidSegment(vaddr));
    }

    // Page zero stays unmapped so stray null pointers keep faulting.
    if vaddr < PAGE_SIZE {
        return Err(LoadError::InvalidSegment(vaddr));
    }

    Ok(())
}

/// Install one validated segment as page-granular chunks.
///
/// Chunks holding file bytes become lazily-loaded file pages: private
/// copy-on-first-write pages for writable segments (execution must never
/// dirty the on-disk image), shared pages for read-only ones. Chunks
/// past the file bytes become immediately available zero pages.
fn install_segment(
    space: &AddressSpace,
    file: &FileHandle,
    phdr: &ProgramHeader,
) -> LoadResult<()> {
    let writable = phdr.is_writable();
    let seg_offset = page_offset(phdr.vaddr as Vaddr);
    let mut file_page = page_round_down(phdr.offset as usize) as u64;
    let mut vaddr = page_round_down(phdr.vaddr as Vaddr);

    let (mut read_bytes, mut zero_bytes) = if phdr.filesz > 0 {
        let read = seg_offset + phdr.filesz as usize;
        (read, page_round_up(seg_offset + phdr.memsz as usize) - read)
    } else {
        (0, page_round_up(seg_offset + phdr.memsz as usize))
    };

    while read_bytes > 0 || zero_bytes > 0 {
        let page_read = read_bytes.min(PAGE_SIZE);
        let page_zero = PAGE_SIZE - page_read;

        if page_read > 0 {
            if writable {
                space.add_file_init_page(vaddr, file.clone(), file_page, page_zero)?;
            } else {
                space.add_file_page(vaddr, file.clone(), file_page, page_zero, false)?;
            }
        } else {
            space.add_zero_page(vaddr, writable)?;
        }

        read_bytes -= page_read;
        zero_bytes -= page_zero;
        vaddr += PAGE_SIZE;
        file_page += page_read as u64;
    }

    Ok(())
}

/// Map a single zeroed page at the top of user memory as the initial
/// stack; the stack pointer starts at the very top
fn setup_stack(space: &AddressSpace) -> LoadResult<Vaddr> {
    space.add_zero_page(USER_LIMIT - PAGE_SIZE, true)?;
    Ok(USER_LIMIT)
}
