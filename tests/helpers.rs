//! Shared test utilities for treebuilder tests.

#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

use treebuilder::template::CommandLine;

/// Test environment with an install tree and an output tree.
pub struct TestEnv {
    /// Temporary directory (kept alive for lifetime of TestEnv)
    pub _temp_dir: TempDir,
    /// Mock install tree (inroot)
    pub inroot: PathBuf,
    /// Output tree (outroot)
    pub outroot: PathBuf,
    /// Scratch space for templates and payloads
    pub base_dir: PathBuf,
}

impl TestEnv {
    /// Create a new test environment with temporary directories.
    pub fn new() -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let base = temp_dir.path();

        let inroot = base.join("installtree");
        let outroot = base.join("outtree");
        let base_dir = base.to_path_buf();

        fs::create_dir_all(&inroot).expect("Failed to create inroot dir");
        fs::create_dir_all(&outroot).expect("Failed to create outroot dir");

        Self {
            _temp_dir: temp_dir,
            inroot,
            outroot,
            base_dir,
        }
    }
}

/// Write `content` to `root/rel`, creating parents.
pub fn write_file(root: &Path, rel: &str, content: &str) {
    let path = root.join(rel);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).expect("Failed to create parent dir");
    }
    fs::write(&path, content).expect("Failed to write file");
}

/// Create a minimal install tree with one kernel and its initramfs.
pub fn create_mock_installtree(inroot: &Path, version: &str) {
    write_file(inroot, &format!("boot/vmlinuz-{}", version), "kernel image");
    write_file(inroot, &format!("boot/initramfs-{}.img", version), "ramdisk");
    write_file(inroot, "usr/share/syslinux/isolinux.bin", "isolinux");
    write_file(
        inroot,
        "usr/share/anaconda/boot/isolinux.cfg",
        "label linux\n  menu label ^Install @PRODUCT@\n",
    );
}

/// Build a template line from tokens.
pub fn line(tokens: &[&str]) -> CommandLine {
    tokens.iter().map(|s| s.to_string()).collect()
}

/// Assert that a file contains expected content.
pub fn assert_file_contains(path: &Path, expected: &str) {
    let content = fs::read_to_string(path)
        .unwrap_or_else(|e| panic!("Failed to read file {}: {}", path.display(), e));
    assert!(
        content.contains(expected),
        "File {} does not contain expected content.\nExpected to find: {}\nActual content: {}",
        path.display(),
        expected,
        content
    );
}

/// Assert that a file exists.
pub fn assert_file_exists(path: &Path) {
    assert!(path.exists(), "Expected file to exist: {}", path.display());
}

/// Assert that a directory exists.
pub fn assert_dir_exists(path: &Path) {
    assert!(path.is_dir(), "Expected directory to exist: {}", path.display());
}
