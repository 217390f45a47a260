/*!
 * Argument Stack Tests
 * End-to-end layout checks through the spawn path
 */

use std::sync::Arc;

use parking_lot::Mutex;
use pretty_assertions::assert_eq;
use teachos_kernel::{Vaddr, WORD_SIZE};

use crate::common::{boot, simple_exe};

#[derive(Debug, Clone, Default)]
struct StackSnapshot {
    ret: u32,
    argc: u32,
    args: Vec<String>,
    sentinel: u32,
    sp: Vaddr,
}

#[test]
fn test_spawned_process_sees_its_arguments() {
    let fx = boot();
    fx.install("echo", &simple_exe());

    let seen: Arc<Mutex<Option<StackSnapshot>>> = Arc::new(Mutex::new(None));
    let sink = Arc::clone(&seen);
    fx.programs.insert("echo", move |kernel, pid, frame| {
        let space = kernel.process(pid).unwrap().address_space().unwrap();
        let word = |addr: Vaddr| -> u32 {
            let mut buf = [0u8; WORD_SIZE];
            space.read(addr, &mut buf).unwrap();
            u32::from_le_bytes(buf)
        };
        let cstr = |mut addr: Vaddr| -> String {
            let mut out = Vec::new();
            loop {
                let mut b = [0u8; 1];
                space.read(addr, &mut b).unwrap();
                if b[0] == 0 {
                    break;
                }
                out.push(b[0]);
                addr += 1;
            }
            String::from_utf8(out).unwrap()
        };

        let argc = word(frame.stack_ptr + WORD_SIZE);
        let argv = word(frame.stack_ptr + 2 * WORD_SIZE) as Vaddr;
        let snapshot = StackSnapshot {
            ret: word(frame.stack_ptr),
            argc,
            args: (0..argc as usize)
                .map(|i| cstr(word(argv + i * WORD_SIZE) as Vaddr))
                .collect(),
            sentinel: word(argv + argc as usize * WORD_SIZE),
            sp: frame.stack_ptr,
        };
        *sink.lock() = Some(snapshot);
        0
    });

    let pid = fx.kernel.spawn(fx.root, "echo hello world").unwrap();
    assert_eq!(fx.kernel.wait(fx.root, pid).unwrap(), 0);

    let snapshot = seen.lock().clone().expect("program ran");
    // Top of stack, lowest address first: return placeholder, argc, argv.
    assert_eq!(snapshot.ret, 0);
    assert_eq!(snapshot.argc, 3);
    assert_eq!(snapshot.args, vec!["echo", "hello", "world"]);
    assert_eq!(snapshot.sentinel, 0);
    assert_eq!(snapshot.sp % WORD_SIZE, 0);
}

#[test]
fn test_delimiter_runs_collapse() {
    let fx = boot();
    fx.install("echo", &simple_exe());

    let seen: Arc<Mutex<Option<u32>>> = Arc::new(Mutex::new(None));
    let sink = Arc::clone(&seen);
    fx.programs.insert("echo", move |kernel, pid, frame| {
        let space = kernel.process(pid).unwrap().address_space().unwrap();
        let mut buf = [0u8; WORD_SIZE];
        space.read(frame.stack_ptr + WORD_SIZE, &mut buf).unwrap();
        *sink.lock() = Some(u32::from_le_bytes(buf));
        0
    });

    let pid = fx.kernel.spawn(fx.root, "echo   a  b").unwrap();
    fx.kernel.wait(fx.root, pid).unwrap();
    assert_eq!(seen.lock().unwrap(), 3);
}
