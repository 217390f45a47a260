/*!
 * Argument Stack
 * Lays out argument strings, the argument vector, argc, and the fake
 * return address on a fresh user stack
 */

use crate::core::types::{Vaddr, WORD_SIZE};
use crate::vm::{AddressSpace, VmResult};

/// Split a command line into its arguments.
///
/// The delimiter is a single literal space; runs of spaces collapse.
/// This is the command-line convention user programs are built against,
/// so tabs and other whitespace are not treated as separators.
pub fn tokenize(cmdline: &str) -> Vec<&str> {
    cmdline.split(' ').filter(|t| !t.is_empty()).collect()
}

/// Push the argument layout onto a prepared stack whose top is `top`,
/// returning the final stack pointer.
///
/// Layout from low to high address once finished:
/// [ret placeholder][argc][argv][argv[0]..argv[n-1]][NULL][pad][strings]
pub fn build(space: &AddressSpace, cmdline: &str, top: Vaddr) -> VmResult<Vaddr> {
    let args = tokenize(cmdline);
    let mut sp = top;

    // Argument strings, program name first; the stack grows downward so
    // later pushes land at lower addresses.
    let mut arg_addrs = Vec::with_capacity(args.len());
    for arg in &args {
        sp -= arg.len() + 1;
        let mut bytes = arg.as_bytes().to_vec();
        bytes.push(0);
        space.write(sp, &bytes)?;
        arg_addrs.push(sp);
    }

    // Word-align with zero padding (the fresh stack page is already
    // zeroed, so only the pointer moves).
    sp -= sp % WORD_SIZE;

    // argv[argc] sentinel, then the argument pointers in reverse push
    // order so argv[0] ends up at the lowest address.
    sp = push_word(space, sp, 0)?;
    for &addr in arg_addrs.iter().rev() {
        sp = push_word(space, sp, addr as u32)?;
    }
    let argv = sp;

    sp = push_word(space, sp, argv as u32)?;
    sp = push_word(space, sp, args.len() as u32)?;
    // Fake return address; entry conventions expect one above argc.
    sp = push_word(space, sp, 0)?;

    Ok(sp)
}

fn push_word(space: &AddressSpace, sp: Vaddr, word: u32) -> VmResult<Vaddr> {
    let sp = sp - WORD_SIZE;
    space.write(sp, &word.to_le_bytes())?;
    Ok(sp)
}
