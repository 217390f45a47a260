/*!
 * Shared test fixtures: executable image builder and kernel bootstrap
 */
#![allow(dead_code)]

use std::sync::Arc;

use teachos_kernel::{FileSystem, MemFs, Pid, ProcessManager, ProgramRegistry, UserMode};

/// Base virtual address test executables link at
pub const BASE_VADDR: u32 = 0x0804_8000;

pub const ET_EXEC: u16 = 2;
pub const EM_386: u16 = 3;
pub const PT_LOAD: u32 = 1;
pub const PT_NOTE: u32 = 4;
pub const PT_DYNAMIC: u32 = 2;
pub const PF_R: u32 = 4;
pub const PF_W: u32 = 2;
pub const PF_X: u32 = 1;

const EHDR_SIZE: u32 = 52;
const PHDR_SIZE: u32 = 32;

/// One program header in a built image
#[derive(Clone)]
pub struct Segment {
    pub ptype: u32,
    pub offset: u32,
    pub vaddr: u32,
    pub filesz: u32,
    pub memsz: u32,
    pub flags: u32,
}

impl Segment {
    pub fn load(vaddr: u32, offset: u32, filesz: u32, memsz: u32) -> Self {
        Self {
            ptype: PT_LOAD,
            offset,
            vaddr,
            filesz,
            memsz,
            flags: PF_R | PF_X,
        }
    }

    pub fn writable(mut self) -> Self {
        self.flags |= PF_W;
        self
    }

    pub fn with_type(mut self, ptype: u32) -> Self {
        self.ptype = ptype;
        self
    }
}

/// Builds ELF32 images byte by byte; defaults produce a well-formed
/// executable with one read-only segment covering the whole file.
pub struct ElfBuilder {
    entry: Option<u32>,
    etype: u16,
    machine: u16,
    version: u32,
    phentsize: u16,
    phoff: Option<u32>,
    phnum: Option<u16>,
    segments: Vec<Segment>,
    file_len: Option<u32>,
}

impl ElfBuilder {
    pub fn new() -> Self {
        Self {
            entry: None,
            etype: ET_EXEC,
            machine: EM_386,
            version: 1,
            phentsize: PHDR_SIZE as u16,
            phoff: None,
            phnum: None,
            segments: Vec::new(),
            file_len: None,
        }
    }

    pub fn entry(mut self, entry: u32) -> Self {
        self.entry = Some(entry);
        self
    }

    pub fn etype(mut self, etype: u16) -> Self {
        self.etype = etype;
        self
    }

    pub fn machine(mut self, machine: u16) -> Self {
        self.machine = machine;
        self
    }

    pub fn version(mut self, version: u32) -> Self {
        self.version = version;
        self
    }

    pub fn phentsize(mut self, phentsize: u16) -> Self {
        self.phentsize = phentsize;
        self
    }

    pub fn phoff(mut self, phoff: u32) -> Self {
        self.phoff = Some(phoff);
        self
    }

    pub fn phnum(mut self, phnum: u16) -> Self {
        self.phnum = Some(phnum);
        self
    }

    pub fn segment(mut self, segment: Segment) -> Self {
        self.segments.push(segment);
        self
    }

    /// Pad the built file out to `len` bytes of 0xCC
    pub fn file_len(mut self, len: u32) -> Self {
        self.file_len = Some(len);
        self
    }

    pub fn build(self) -> Vec<u8> {
        let headers_len = EHDR_SIZE + PHDR_SIZE * self.segments.len() as u32;
        let segments = if self.segments.is_empty() {
            // Default image: one read-only segment covering the file.
            vec![Segment::load(BASE_VADDR, 0, headers_len + PHDR_SIZE, headers_len + PHDR_SIZE)]
        } else {
            self.segments
        };
        let headers_len = EHDR_SIZE + PHDR_SIZE * segments.len() as u32;

        let mut img = Vec::new();
        img.extend_from_slice(&[0x7F, b'E', b'L', b'F', 1, 1, 1]);
        img.resize(16, 0);
        p16(&mut img, self.etype);
        p16(&mut img, self.machine);
        p32(&mut img, self.version);
        p32(&mut img, self.entry.unwrap_or(BASE_VADDR + headers_len));
        p32(&mut img, self.phoff.unwrap_or(EHDR_SIZE));
        p32(&mut img, 0); // shoff
        p32(&mut img, 0); // flags
        p16(&mut img, EHDR_SIZE as u16);
        p16(&mut img, self.phentsize);
        p16(&mut img, self.phnum.unwrap_or(segments.len() as u16));
        p16(&mut img, 0);
        p16(&mut img, 0);
        p16(&mut img, 0);

        for seg in &segments {
            p32(&mut img, seg.ptype);
            p32(&mut img, seg.offset);
            p32(&mut img, seg.vaddr);
            p32(&mut img, seg.vaddr); // paddr
            p32(&mut img, seg.filesz);
            p32(&mut img, seg.memsz);
            p32(&mut img, seg.flags);
            p32(&mut img, 4096);
        }

        let want = self
            .file_len
            .unwrap_or_else(|| {
                segments
                    .iter()
                    .filter(|s| s.ptype == PT_LOAD)
                    .map(|s| s.offset.saturating_add(s.filesz))
                    .max()
                    .unwrap_or(0)
                    .max(img.len() as u32)
            });
        if want as usize > img.len() {
            img.resize(want as usize, 0xCC);
        }
        img
    }
}

impl Default for ElfBuilder {
    fn default() -> Self {
        Self::new()
    }
}

fn p16(img: &mut Vec<u8>, v: u16) {
    img.extend_from_slice(&v.to_le_bytes());
}

fn p32(img: &mut Vec<u8>, v: u32) {
    img.extend_from_slice(&v.to_le_bytes());
}

/// A minimal well-formed executable image
pub fn simple_exe() -> Vec<u8> {
    ElfBuilder::new().build()
}

/// A booted kernel over an in-memory filesystem with a program registry
pub struct Fixture {
    pub fs: Arc<MemFs>,
    pub programs: Arc<ProgramRegistry>,
    pub kernel: ProcessManager,
    pub root: Pid,
}

pub fn boot() -> Fixture {
    let fs = Arc::new(MemFs::new());
    let programs = Arc::new(ProgramRegistry::new());
    let kernel = ProcessManager::builder()
        .with_filesystem(Arc::clone(&fs) as Arc<dyn FileSystem>)
        .with_user_mode(Arc::clone(&programs) as Arc<dyn UserMode>)
        .build();
    let root = kernel.bootstrap("init");
    Fixture {
        fs,
        programs,
        kernel,
        root,
    }
}

impl Fixture {
    /// Write an executable image into the filesystem
    pub fn install(&self, name: &str, image: &[u8]) {
        self.fs.write(name, image).unwrap();
    }
}
