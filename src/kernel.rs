//! Kernel and initrd discovery.
//!
//! Kernels are found purely by file name: `vmlinuz-<version>` where the
//! version ends in `.<arch>` and optionally `.<flavor>`. The matching ramdisk
//! is found by substituting `vmlinuz` with `initrd` or `initramfs` and adding
//! `.img`.

use anyhow::{Context, Result};
use regex::Regex;
use serde::Serialize;
use std::fs;
use std::path::Path;
use std::sync::OnceLock;

use crate::common::join_root;

/// Kernel flavors, as named by `BuildKernel` in kernel.spec.
pub const FLAVORS: &[&str] = &["debug", "PAE", "PAEdebug", "smp", "xen"];

/// Ramdisk name prefixes, checked in this order.
///
/// A later hit replaces an earlier one, so with both present the initramfs
/// image is recorded and the initrd one is ignored.
const INITRD_NAMES: &[&str] = &["initrd", "initramfs"];

/// Companion ramdisk of a kernel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Initrd {
    /// Path relative to the scanned root.
    pub path: String,
}

/// A kernel image found under the boot directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct KernelRecord {
    /// Path relative to the scanned root, e.g. `boot/vmlinuz-5.10.0.x86_64`.
    pub path: String,
    /// Everything after `vmlinuz-`, including arch and flavor.
    pub version: String,
    pub arch: String,
    pub flavor: Option<String>,
    pub initrd: Option<Initrd>,
}

fn kernel_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        let pattern = format!(
            r"^vmlinuz-(?P<version>.+?\.(?P<arch>[a-z0-9_]+)(\.(?P<flavor>{}))?)$",
            FLAVORS.join("|")
        );
        Regex::new(&pattern).expect("kernel name pattern is valid")
    })
}

/// Parse a kernel file name into a record rooted at `kdir`.
///
/// Returns `None` for names that don't follow the kernel naming scheme.
pub fn parse_kernel_name(kdir: &str, name: &str) -> Option<KernelRecord> {
    let caps = kernel_regex().captures(name)?;
    Some(KernelRecord {
        path: format!("{}/{}", kdir.trim_end_matches('/'), name),
        version: caps["version"].to_string(),
        arch: caps["arch"].to_string(),
        flavor: caps.name("flavor").map(|m| m.as_str().to_string()),
        initrd: None,
    })
}

/// Find kernels in `root/kdir` and their ramdisks.
///
/// Order follows the directory listing.
pub fn find_kernels(root: &Path, kdir: &str) -> Result<Vec<KernelRecord>> {
    let boot = join_root(root, kdir);
    let mut kernels = Vec::new();

    for entry in
        fs::read_dir(&boot).with_context(|| format!("Failed to list {}", boot.display()))?
    {
        let entry = entry?;
        let name = entry.file_name();
        if let Some(kernel) = parse_kernel_name(kdir, &name.to_string_lossy()) {
            kernels.push(kernel);
        }
    }

    for kernel in &mut kernels {
        for imgname in INITRD_NAMES {
            let candidate = format!("{}.img", kernel.path.replacen("vmlinuz", imgname, 1));
            if join_root(root, &candidate).exists() {
                kernel.initrd = Some(Initrd { path: candidate });
            }
        }
    }

    tracing::debug!(count = kernels.len(), dir = %boot.display(), "found kernels");
    Ok(kernels)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn touch(root: &Path, rel: &str) {
        let path = root.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, b"").unwrap();
    }

    #[test]
    fn test_parse_plain_kernel() {
        let k = parse_kernel_name("boot", "vmlinuz-5.10.0-300.fc35.x86_64").unwrap();
        assert_eq!(k.path, "boot/vmlinuz-5.10.0-300.fc35.x86_64");
        assert_eq!(k.version, "5.10.0-300.fc35.x86_64");
        assert_eq!(k.arch, "x86_64");
        assert_eq!(k.flavor, None);
        assert_eq!(k.initrd, None);
    }

    #[test]
    fn test_parse_flavored_kernel() {
        let k = parse_kernel_name("boot", "vmlinuz-5.10.0.x86_64.debug").unwrap();
        assert_eq!(k.version, "5.10.0.x86_64.debug");
        assert_eq!(k.arch, "x86_64");
        assert_eq!(k.flavor.as_deref(), Some("debug"));

        let k = parse_kernel_name("boot", "vmlinuz-2.6.32-71.el6.i686.PAE").unwrap();
        assert_eq!(k.arch, "i686");
        assert_eq!(k.flavor.as_deref(), Some("PAE"));
    }

    #[test]
    fn test_parse_rejects_other_names() {
        assert!(parse_kernel_name("boot", "vmlinuz").is_none());
        assert!(parse_kernel_name("boot", "vmlinuz-5").is_none());
        assert!(parse_kernel_name("boot", "initramfs-5.10.0.x86_64.img").is_none());
        assert!(parse_kernel_name("boot", "config-5.10.0.x86_64").is_none());
    }

    #[test]
    fn test_find_kernels_with_initrd() {
        let temp = TempDir::new().unwrap();
        touch(temp.path(), "boot/vmlinuz-5.10.0.x86_64");
        touch(temp.path(), "boot/initrd-5.10.0.x86_64.img");
        touch(temp.path(), "boot/System.map-5.10.0.x86_64");

        let kernels = find_kernels(temp.path(), "boot").unwrap();
        assert_eq!(kernels.len(), 1);
        assert_eq!(
            kernels[0].initrd.as_ref().map(|i| i.path.as_str()),
            Some("boot/initrd-5.10.0.x86_64.img")
        );
    }

    #[test]
    fn test_initramfs_wins_over_initrd() {
        let temp = TempDir::new().unwrap();
        touch(temp.path(), "boot/vmlinuz-5.10.0.x86_64");
        touch(temp.path(), "boot/initrd-5.10.0.x86_64.img");
        touch(temp.path(), "boot/initramfs-5.10.0.x86_64.img");

        let kernels = find_kernels(temp.path(), "boot").unwrap();
        assert_eq!(
            kernels[0].initrd.as_ref().unwrap().path,
            "boot/initramfs-5.10.0.x86_64.img"
        );
    }

    #[test]
    fn test_kernel_without_ramdisk() {
        let temp = TempDir::new().unwrap();
        touch(temp.path(), "boot/vmlinuz-6.1.0.aarch64");

        let kernels = find_kernels(temp.path(), "boot").unwrap();
        assert_eq!(kernels.len(), 1);
        assert!(kernels[0].initrd.is_none());
    }

    #[test]
    fn test_missing_boot_dir_is_error() {
        let temp = TempDir::new().unwrap();
        assert!(find_kernels(temp.path(), "boot").is_err());
    }
}
