/*!
 * Descriptor Tests
 * Handle allocation and close semantics through the syscall surface
 */

use pretty_assertions::assert_eq;
use teachos_kernel::{FileSystem, ProcessError, FD_START};

use crate::common::boot;

#[test]
fn test_descriptors_allocate_monotonically() {
    let fx = boot();
    fx.fs.write("/a", b"a").unwrap();
    fx.fs.write("/b", b"b").unwrap();

    let a = fx.kernel.open(fx.root, "/a").unwrap();
    let b = fx.kernel.open(fx.root, "/b").unwrap();
    assert_eq!(a, FD_START);
    assert_eq!(b, FD_START + 1);

    fx.kernel.close(fx.root, a).unwrap();
    let c = fx.kernel.open(fx.root, "/a").unwrap();
    assert_eq!(c, FD_START + 2, "closed handles are never reused");
}

#[test]
fn test_open_missing_file() {
    let fx = boot();
    assert!(matches!(
        fx.kernel.open(fx.root, "/absent"),
        Err(ProcessError::Vfs(_))
    ));
}

#[test]
fn test_close_unknown_descriptor() {
    let fx = boot();
    assert_eq!(
        fx.kernel.close(fx.root, 77).unwrap_err(),
        ProcessError::BadDescriptor(77)
    );
}

#[test]
fn test_double_close_fails() {
    let fx = boot();
    fx.fs.write("/a", b"a").unwrap();

    let fd = fx.kernel.open(fx.root, "/a").unwrap();
    fx.kernel.close(fx.root, fd).unwrap();
    assert_eq!(
        fx.kernel.close(fx.root, fd).unwrap_err(),
        ProcessError::BadDescriptor(fd)
    );
}

#[test]
fn test_descriptor_counts_in_info() {
    let fx = boot();
    fx.fs.write("/a", b"a").unwrap();

    fx.kernel.open(fx.root, "/a").unwrap();
    fx.kernel.open(fx.root, "/a").unwrap();
    let info = fx
        .kernel
        .process(fx.root)
        .map(|p| p.info())
        .expect("root process");
    assert_eq!(info.open_files, 2);
}
