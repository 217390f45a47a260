/*!
 * ELF32 Format
 * Fixed-width header decoding for the executable format the loader
 * accepts: 32-bit little-endian executables for one target machine
 */

use bytes::Buf;

use super::types::{LoadError, LoadResult};

/// Size of the ELF32 file header in bytes
pub const EHDR_SIZE: usize = 52;

/// Size of one ELF32 program header in bytes
pub const PHDR_SIZE: usize = 32;

/// Upper bound on program-header count; caps parse cost on hostile files
pub const PHNUM_MAX: u16 = 1024;

/// Identification bytes an accepted image must start with:
/// magic, 32-bit class, little-endian data, ident version 1
pub const IDENT_PREFIX: [u8; 7] = [0x7F, b'E', b'L', b'F', 1, 1, 1];

/// Executable file
pub const ET_EXEC: u16 = 2;
/// Intel 80386
pub const EM_386: u16 = 3;
/// Current format version
pub const EV_CURRENT: u32 = 1;

/// Ignore
pub const PT_NULL: u32 = 0;
/// Loadable segment
pub const PT_LOAD: u32 = 1;
/// Dynamic linking info
pub const PT_DYNAMIC: u32 = 2;
/// Name of dynamic loader
pub const PT_INTERP: u32 = 3;
/// Auxiliary info
pub const PT_NOTE: u32 = 4;
/// Reserved
pub const PT_SHLIB: u32 = 5;
/// Program header table
pub const PT_PHDR: u32 = 6;
/// Stack segment
pub const PT_STACK: u32 = 0x6474_e551;

/// Executable flag
pub const PF_X: u32 = 1;
/// Writable flag
pub const PF_W: u32 = 2;
/// Readable flag
pub const PF_R: u32 = 4;

/// ELF32 file header
#[derive(Debug, Clone)]
pub struct FileHeader {
    pub ident: [u8; 16],
    pub etype: u16,
    pub machine: u16,
    pub version: u32,
    pub entry: u32,
    pub phoff: u32,
    pub shoff: u32,
    pub flags: u32,
    pub ehsize: u16,
    pub phentsize: u16,
    pub phnum: u16,
    pub shentsize: u16,
    pub shnum: u16,
    pub shstrndx: u16,
}

impl FileHeader {
    /// Decode a file header from the start of `buf`
    pub fn parse(buf: &[u8]) -> LoadResult<Self> {
        if buf.len() < EHDR_SIZE {
            return Err(LoadError::TruncatedHeader);
        }
        let mut b = buf;
        let mut ident = [0u8; 16];
        b.copy_to_slice(&mut ident);
        Ok(Self {
            ident,
            etype: b.get_u16_le(),
            machine: b.get_u16_le(),
            version: b.get_u32_le(),
            entry: b.get_u32_le(),
            phoff: b.get_u32_le(),
            shoff: b.get_u32_le(),
            flags: b.get_u32_le(),
            ehsize: b.get_u16_le(),
            phentsize: b.get_u16_le(),
            phnum: b.get_u16_le(),
            shentsize: b.get_u16_le(),
            shnum: b.get_u16_le(),
            shstrndx: b.get_u16_le(),
        })
    }

    /// Reject anything but a version-1 ELF32 executable for the target
    /// machine with the expected program-header layout
    pub fn check(&self) -> LoadResult<()> {
        if self.ident[..IDENT_PREFIX.len()] != IDENT_PREFIX {
            return Err(LoadError::BadMagic);
        }
        if self.etype != ET_EXEC {
            return Err(LoadError::UnsupportedType(self.etype));
        }
        if self.machine != EM_386 {
            return Err(LoadError::UnsupportedMachine(self.machine));
        }
        if self.version != EV_CURRENT {
            return Err(LoadError::UnsupportedVersion(self.version));
        }
        if self.phentsize as usize != PHDR_SIZE {
            return Err(LoadError::BadHeaderSize(self.phentsize));
        }
        if self.phnum > PHNUM_MAX {
            return Err(LoadError::TooManyHeaders(self.phnum));
        }
        Ok(())
    }
}

/// ELF32 program header
#[derive(Debug, Clone)]
pub struct ProgramHeader {
    pub ptype: u32,
    pub offset: u32,
    pub vaddr: u32,
    pub paddr: u32,
    pub filesz: u32,
    pub memsz: u32,
    pub flags: u32,
    pub align: u32,
}

impl ProgramHeader {
    /// Decode one program header from the start of `buf`
    pub fn parse(buf: &[u8]) -> LoadResult<Self> {
        if buf.len() < PHDR_SIZE {
            return Err(LoadError::TruncatedProgramHeader);
        }
        let mut b = buf;
        Ok(Self {
            ptype: b.get_u32_le(),
            offset: b.get_u32_le(),
            vaddr: b.get_u32_le(),
            paddr: b.get_u32_le(),
            filesz: b.get_u32_le(),
            memsz: b.get_u32_le(),
            flags: b.get_u32_le(),
            align: b.get_u32_le(),
        })
    }

    pub fn is_writable(&self) -> bool {
        self.flags & PF_W != 0
    }
}
