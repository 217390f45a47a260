/*!
 * TeachOS Kernel - Demo Entry Point
 *
 * Boots the simulated kernel: mounts an in-memory filesystem, writes a
 * demo executable into it, spawns it with arguments and waits for it,
 * then dumps the process table.
 */

use std::error::Error;
use std::sync::Arc;

use log::info;

use teachos_kernel::{
    FileSystem, MemFs, ProcessManager, ProgramRegistry, Vaddr, WORD_SIZE,
};

fn main() -> Result<(), Box<dyn Error>> {
    env_logger::init();

    info!("TeachOS kernel starting...");

    info!("Mounting in-memory filesystem...");
    let fs = Arc::new(MemFs::new());
    fs.write("echo", &demo_image())?;

    info!("Registering user programs...");
    let programs = Arc::new(ProgramRegistry::new());
    programs.insert("echo", |kernel, pid, frame| {
        let space = match kernel.process(pid).and_then(|p| p.address_space()) {
            Some(s) => s,
            None => return -1,
        };
        let read_word = |addr: Vaddr| -> u32 {
            let mut buf = [0u8; WORD_SIZE];
            space.read(addr, &mut buf).map(|_| u32::from_le_bytes(buf)).unwrap_or(0)
        };

        let argc = read_word(frame.stack_ptr + WORD_SIZE) as usize;
        let argv = read_word(frame.stack_ptr + 2 * WORD_SIZE) as Vaddr;
        let mut words = Vec::with_capacity(argc.saturating_sub(1));
        for i in 1..argc {
            let mut addr = read_word(argv + i * WORD_SIZE) as Vaddr;
            let mut arg = Vec::new();
            loop {
                let mut b = [0u8; 1];
                if space.read(addr, &mut b).is_err() || b[0] == 0 {
                    break;
                }
                arg.push(b[0]);
                addr += 1;
            }
            words.push(String::from_utf8_lossy(&arg).into_owned());
        }
        println!("{}", words.join(" "));
        0
    });

    let kernel = ProcessManager::builder()
        .with_filesystem(Arc::clone(&fs) as Arc<dyn FileSystem>)
        .with_user_mode(programs)
        .build();

    let root = kernel.bootstrap("init");

    let cmdline =
        std::env::var("KERNEL_CMDLINE").unwrap_or_else(|_| "echo hello world".to_string());
    info!("Spawning '{}'...", cmdline);

    let pid = kernel.spawn(root, &cmdline)?;
    let status = kernel.wait(root, pid)?;
    info!("Child pid {} exited with status {}", pid, status);

    println!("{}", serde_json::to_string_pretty(&kernel.list())?);
    Ok(())
}

/// A minimal well-formed executable: one read-only LOAD segment covering
/// the whole image, entry just past the headers
fn demo_image() -> Vec<u8> {
    const BASE: u32 = 0x0804_8000;
    const HDR_LEN: u32 = 52 + 32;
    let code = b"demo payload; never interpreted";
    let total = HDR_LEN + code.len() as u32;

    fn p16(img: &mut Vec<u8>, v: u16) {
        img.extend_from_slice(&v.to_le_bytes());
    }
    fn p32(img: &mut Vec<u8>, v: u32) {
        img.extend_from_slice(&v.to_le_bytes());
    }

    let mut img = Vec::with_capacity(total as usize);

    // e_ident: magic, ELF32, little-endian, version 1
    img.extend_from_slice(&[0x7F, b'E', b'L', b'F', 1, 1, 1]);
    img.resize(16, 0);
    p16(&mut img, 2); // e_type: ET_EXEC
    p16(&mut img, 3); // e_machine: EM_386
    p32(&mut img, 1); // e_version
    p32(&mut img, BASE + HDR_LEN); // e_entry
    p32(&mut img, 52); // e_phoff
    p32(&mut img, 0); // e_shoff
    p32(&mut img, 0); // e_flags
    p16(&mut img, 52); // e_ehsize
    p16(&mut img, 32); // e_phentsize
    p16(&mut img, 1); // e_phnum
    p16(&mut img, 0); // e_shentsize
    p16(&mut img, 0); // e_shnum
    p16(&mut img, 0); // e_shstrndx

    // One PT_LOAD covering the image, read+execute
    p32(&mut img, 1); // p_type: PT_LOAD
    p32(&mut img, 0); // p_offset
    p32(&mut img, BASE); // p_vaddr
    p32(&mut img, BASE); // p_paddr
    p32(&mut img, total); // p_filesz
    p32(&mut img, total); // p_memsz
    p32(&mut img, 5); // p_flags: R | X
    p32(&mut img, 4096); // p_align

    img.extend_from_slice(code);
    img
}
