/*!
 * Loader Tests
 * Header acceptance, segment validation, and page-install taxonomy
 */

use std::sync::Arc;

use pretty_assertions::assert_eq;
use teachos_kernel::loader::{self, LoadError};
use teachos_kernel::{FileHandle, FileSystem, MemFs, PageKind, Vaddr, PAGE_SIZE, USER_LIMIT};

use crate::common::{ElfBuilder, Segment, BASE_VADDR};

fn open_image(image: &[u8]) -> (Arc<MemFs>, FileHandle) {
    let fs = Arc::new(MemFs::new());
    fs.write("exe", image).unwrap();
    let file = fs.open("exe").unwrap();
    (fs, file)
}

fn load_image(image: &[u8]) -> Result<(Arc<teachos_kernel::AddressSpace>, loader::UserFrame), LoadError> {
    let (_fs, file) = open_image(image);
    loader::load(&file, "exe")
}

#[test]
fn test_entry_point_comes_from_header() {
    let image = ElfBuilder::new().entry(BASE_VADDR + 0x123).build();
    let (_space, frame) = load_image(&image).unwrap();
    assert_eq!(frame.entry, (BASE_VADDR + 0x123) as Vaddr);
}

#[test]
fn test_segment_page_taxonomy() {
    // Read-only code at the file start, writable data with bss above it.
    let image = ElfBuilder::new()
        .segment(Segment::load(BASE_VADDR, 0, 0x200, 0x200))
        .segment(Segment::load(BASE_VADDR + 0x1000, 0x1000, 100, 0x2000).writable())
        .build();
    let (space, _frame) = load_image(&image).unwrap();

    // Shared read-only file page for the code chunk.
    let code = space.lookup(BASE_VADDR as Vaddr).unwrap();
    assert_eq!(code.kind, PageKind::File);
    assert!(!code.writable);
    assert!(!code.resident);

    // Copy-on-first-write page for the file-backed writable chunk.
    let data = space.lookup((BASE_VADDR + 0x1000) as Vaddr).unwrap();
    assert_eq!(data.kind, PageKind::FileInit);
    assert!(data.writable);

    // Pure bss chunk becomes an immediately available zero page.
    let bss = space.lookup((BASE_VADDR + 0x2000) as Vaddr).unwrap();
    assert_eq!(bss.kind, PageKind::Zero);
    assert!(bss.writable);
    assert!(bss.resident);

    // Stack page at the top of user memory, resident from the start.
    assert!(space.is_resident(USER_LIMIT - PAGE_SIZE));

    // code + data + bss + stack, in the activated fresh space
    assert!(space.is_active());
    assert_eq!(space.page_count(), 4);
}

#[test]
fn test_truncated_file_rejected() {
    assert_eq!(load_image(&[0u8; 10]).unwrap_err(), LoadError::TruncatedHeader);
}

#[test]
fn test_bad_magic_rejected() {
    let mut image = ElfBuilder::new().build();
    image[0] = 0x7E;
    assert_eq!(load_image(&image).unwrap_err(), LoadError::BadMagic);
}

#[test]
fn test_wrong_class_rejected() {
    let mut image = ElfBuilder::new().build();
    image[4] = 2; // ELFCLASS64
    assert_eq!(load_image(&image).unwrap_err(), LoadError::BadMagic);
}

#[test]
fn test_relocatable_object_rejected() {
    let image = ElfBuilder::new().etype(1).build();
    assert_eq!(load_image(&image).unwrap_err(), LoadError::UnsupportedType(1));
}

#[test]
fn test_foreign_machine_rejected() {
    let image = ElfBuilder::new().machine(62).build();
    assert_eq!(
        load_image(&image).unwrap_err(),
        LoadError::UnsupportedMachine(62)
    );
}

#[test]
fn test_future_version_rejected() {
    let image = ElfBuilder::new().version(2).build();
    assert_eq!(
        load_image(&image).unwrap_err(),
        LoadError::UnsupportedVersion(2)
    );
}

#[test]
fn test_odd_phentsize_rejected() {
    let image = ElfBuilder::new().phentsize(40).build();
    assert_eq!(load_image(&image).unwrap_err(), LoadError::BadHeaderSize(40));
}

#[test]
fn test_header_count_cap() {
    let image = ElfBuilder::new().phnum(1025).build();
    assert_eq!(
        load_image(&image).unwrap_err(),
        LoadError::TooManyHeaders(1025)
    );
}

#[test]
fn test_phoff_past_end_rejected() {
    let image = ElfBuilder::new().phoff(0x10000).build();
    assert_eq!(load_image(&image).unwrap_err(), LoadError::HeaderOutOfBounds);
}

#[test]
fn test_phdr_table_truncated() {
    // Claims one more header than the file holds.
    let image = ElfBuilder::new().phnum(2).build();
    assert_eq!(
        load_image(&image).unwrap_err(),
        LoadError::TruncatedProgramHeader
    );
}

#[test]
fn test_dynamic_linking_rejected() {
    for ptype in [2u32, 3, 5] {
        // PT_DYNAMIC, PT_INTERP, PT_SHLIB
        let image = ElfBuilder::new()
            .segment(Segment::load(BASE_VADDR, 0, 0x100, 0x100).with_type(ptype))
            .build();
        assert_eq!(
            load_image(&image).unwrap_err(),
            LoadError::DynamicNotSupported
        );
    }
}

#[test]
fn test_ignored_header_types_skipped() {
    // NOTE and stack-marker headers carry nothing to load; even garbage
    // sizes in them must not matter.
    let image = ElfBuilder::new()
        .segment(Segment::load(BASE_VADDR, 0, 0x100, 0x100))
        .segment(Segment::load(0, 0, 0, 0).with_type(4)) // PT_NOTE
        .segment(Segment::load(0, 0, 0, 0).with_type(0x6474_e551)) // stack marker
        .segment(Segment::load(0, 0, 0, 0).with_type(0x7fff_ffff)) // unknown
        .build();
    let (space, _frame) = load_image(&image).unwrap();
    // One code page plus the stack page.
    assert_eq!(space.page_count(), 2);
}

#[test]
fn test_mismatched_page_offsets_rejected() {
    let image = ElfBuilder::new()
        .segment(Segment::load(BASE_VADDR + 4, 0, 0x100, 0x100))
        .build();
    assert!(matches!(
        load_image(&image).unwrap_err(),
        LoadError::InvalidSegment(_)
    ));
}

#[test]
fn test_offset_past_file_end_rejected() {
    let image = ElfBuilder::new()
        .segment(Segment::load(BASE_VADDR, 0x3000, 0, 0x100))
        .file_len(0x200)
        .build();
    assert!(matches!(
        load_image(&image).unwrap_err(),
        LoadError::InvalidSegment(_)
    ));
}

#[test]
fn test_memsz_smaller_than_filesz_rejected() {
    let image = ElfBuilder::new()
        .segment(Segment::load(BASE_VADDR, 0, 0x100, 0x50))
        .build();
    assert!(matches!(
        load_image(&image).unwrap_err(),
        LoadError::InvalidSegment(_)
    ));
}

#[test]
fn test_empty_segment_rejected() {
    let image = ElfBuilder::new()
        .segment(Segment::load(BASE_VADDR, 0, 0, 0))
        .build();
    assert!(matches!(
        load_image(&image).unwrap_err(),
        LoadError::InvalidSegment(_)
    ));
}

#[test]
fn test_segment_above_user_range_rejected() {
    let image = ElfBuilder::new()
        .segment(Segment::load(0xC000_0000, 0, 0x100, 0x100))
        .file_len(0x200)
        .build();
    assert!(matches!(
        load_image(&image).unwrap_err(),
        LoadError::InvalidSegment(_)
    ));
}

#[test]
fn test_segment_end_outside_user_range_rejected() {
    let image = ElfBuilder::new()
        .segment(Segment::load(0xBFFF_F000, 0, 0x100, 0x2000))
        .file_len(0x200)
        .build();
    assert!(matches!(
        load_image(&image).unwrap_err(),
        LoadError::InvalidSegment(_)
    ));
}

#[test]
fn test_wrapping_segment_rejected() {
    let image = ElfBuilder::new()
        .segment(Segment::load(0xFFFF_F000, 0, 0x100, 0x2000))
        .file_len(0x200)
        .build();
    assert!(matches!(
        load_image(&image).unwrap_err(),
        LoadError::InvalidSegment(_)
    ));
}

#[test]
fn test_page_zero_segment_rejected() {
    let image = ElfBuilder::new()
        .segment(Segment::load(0x800, 0x800, 0x10, 0x10))
        .file_len(0x1000)
        .build();
    assert!(matches!(
        load_image(&image).unwrap_err(),
        LoadError::InvalidSegment(_)
    ));
}

#[test]
fn test_overlapping_segments_abort() {
    let image = ElfBuilder::new()
        .segment(Segment::load(BASE_VADDR, 0, 0x100, 0x100))
        .segment(Segment::load(BASE_VADDR, 0, 0x100, 0x100))
        .build();
    assert!(matches!(
        load_image(&image).unwrap_err(),
        LoadError::Install(_)
    ));
}

#[test]
fn test_segment_contents_readable_through_space() {
    // The image's own header bytes are what the code page maps.
    let image = ElfBuilder::new().build();
    let (space, _frame) = load_image(&image).unwrap();

    let mut buf = [0u8; 4];
    space.read(BASE_VADDR as Vaddr, &mut buf).unwrap();
    assert_eq!(&buf, &[0x7F, b'E', b'L', b'F']);
}
