//! Arch-specific boot tree builder.
//!
//! `inroot` should be the install tree root (the freshly built runtime).
//! Everything here runs once, in order, and any failure ends the build.

use anyhow::{bail, Context, Result};
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use super::BaseBuilder;
use crate::artifact::{build_cpio, implant_isomd5};
use crate::common::join_root;
use crate::kernel::{find_kernels, KernelRecord};
use crate::process::Cmd;
use crate::template::{TreeInfo, Value, Variables};

/// Base architecture → template file. One template serves a whole family.
pub const TEMPLATE_MAP: &[(&str, &str)] = &[
    ("i386", "x86.tmpl"),
    ("x86_64", "x86.tmpl"),
    ("ppc", "ppc.tmpl"),
    ("ppc64", "ppc.tmpl"),
    ("sparc", "sparc.tmpl"),
    ("sparc64", "sparc.tmpl"),
    ("s390", "s390.tmpl"),
    ("s390x", "s390.tmpl"),
];

/// Directory under the install tree that holds kernels.
const KERNEL_DIR: &str = "boot";

const DRACUT: &[&str] = &["/sbin/dracut", "--nomdadmconf", "--nolvmconf"];

/// Template file for a base architecture.
pub fn template_for(basearch: &str) -> Result<&'static str> {
    TEMPLATE_MAP
        .iter()
        .find(|(arch, _)| *arch == basearch)
        .map(|(_, template)| *template)
        .with_context(|| format!("No template for base architecture {}", basearch))
}

/// `chroot <inroot> /sbin/dracut ... [--force] <initrd> <version>`.
///
/// `--force` is only passed when there is no backup, since otherwise the
/// old initrd has already been moved aside.
fn dracut_command(
    inroot: &Path,
    kernel: &KernelRecord,
    initrd: &str,
    add_args: &[String],
    backup: &str,
) -> Cmd {
    let mut cmd = Cmd::new("chroot").arg_path(inroot).args(DRACUT).args(add_args);
    if backup.is_empty() {
        cmd = cmd.arg("--force");
    }
    cmd.arg(format!("/{}", initrd))
        .arg(&kernel.version)
        .error_msg(format!("dracut failed for {}", kernel.version))
}

/// Builds the arch-specific boot images.
pub struct TreeBuilder {
    base: BaseBuilder,
    template_dir: PathBuf,
}

impl TreeBuilder {
    pub fn new(base: BaseBuilder, template_dir: &Path) -> Self {
        Self {
            base,
            template_dir: template_dir.to_path_buf(),
        }
    }

    pub fn base(&self) -> &BaseBuilder {
        &self.base
    }

    /// Kernels currently in the install tree.
    ///
    /// Re-scanned on every call so a rebuild sees the files as they are now.
    pub fn kernels(&self) -> Result<Vec<KernelRecord>> {
        find_kernels(&self.base.inroot, KERNEL_DIR)
    }

    /// Run the arch template, then implant ISO checksums.
    pub fn build(&mut self) -> Result<()> {
        self.build_with(Variables::new())
    }

    /// [`build`](Self::build) with extra template variables bound.
    ///
    /// `kernels` is always the freshly discovered kernel list.
    pub fn build_with(&mut self, mut variables: Variables) -> Result<()> {
        let span = tracing::info_span!("build", arch = %self.base.arch);
        let _enter = span.enter();

        let template = self
            .template_dir
            .join(template_for(&self.base.arch.basearch)?);

        variables.insert("kernels".into(), Value::Kernels(self.kernels()?));

        self.base.run_template(&template, variables)?;
        self.implant_isomd5()
    }

    /// Metadata from the template run.
    pub fn treeinfo_data(&self) -> Option<&TreeInfo> {
        self.base.treeinfo_data()
    }

    /// Implant checksums into every `boot.iso` recorded in the tree metadata.
    pub fn implant_isomd5(&self) -> Result<()> {
        let Some(treeinfo) = self.treeinfo_data() else {
            return Ok(());
        };
        for data in treeinfo.values() {
            if let Some(iso) = data.get("boot.iso") {
                implant_isomd5(&join_root(&self.base.outroot, iso))?;
            }
        }
        Ok(())
    }

    /// Rebuild every initrd in the install tree with dracut, inside a chroot.
    ///
    /// With a non-empty `backup` suffix each initrd is renamed first;
    /// otherwise dracut overwrites it (`--force`).
    pub fn rebuild_initrds(&self, add_args: &[String], backup: &str) -> Result<()> {
        let span = tracing::info_span!("rebuild_initrds");
        let _enter = span.enter();

        for kernel in self.kernels()? {
            let Some(initrd) = &kernel.initrd else {
                tracing::warn!("{} has no initrd, skipping", kernel.path);
                continue;
            };
            tracing::info!("rebuilding {}", initrd.path);

            if !backup.is_empty() {
                let path = join_root(&self.base.inroot, &initrd.path);
                let renamed = PathBuf::from(format!("{}{}", path.display(), backup));
                fs::rename(&path, &renamed).with_context(|| {
                    format!("Failed to back up {} to {}", path.display(), renamed.display())
                })?;
            }

            dracut_command(&self.base.inroot, &kernel, &initrd.path, add_args, backup)
                .run_interactive()?;
        }
        Ok(())
    }

    /// Put the files under `rootdir` into a cpio archive and append it to
    /// every initrd.
    pub fn initrd_append(&self, rootdir: &Path) -> Result<()> {
        let span = tracing::info_span!("initrd_append", dir = %rootdir.display());
        let _enter = span.enter();

        if !rootdir.is_dir() {
            bail!("{} is not a directory", rootdir.display());
        }

        // Removed on drop, whichever way this function exits.
        let cpio = tempfile::Builder::new()
            .prefix("treebuilder.")
            .tempfile()
            .context("Failed to create temporary archive")?;
        build_cpio(rootdir, cpio.path())?;
        let archive = fs::read(cpio.path())?;

        for kernel in self.kernels()? {
            let Some(initrd) = &kernel.initrd else {
                tracing::warn!("{} has no initrd, skipping", kernel.path);
                continue;
            };
            let path = join_root(&self.base.inroot, &initrd.path);
            let mut file = OpenOptions::new()
                .append(true)
                .open(&path)
                .with_context(|| format!("Failed to open {}", path.display()))?;
            tracing::info!(
                "{} size before appending: {}",
                initrd.path,
                file.metadata()?.len()
            );
            file.write_all(&archive)
                .with_context(|| format!("Failed to append to {}", path.display()))?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::arch::ArchData;

    #[test]
    fn test_template_map_families() {
        assert_eq!(template_for("i386").unwrap(), "x86.tmpl");
        assert_eq!(template_for("x86_64").unwrap(), "x86.tmpl");
        assert_eq!(template_for("ppc64").unwrap(), "ppc.tmpl");
        assert_eq!(template_for("s390x").unwrap(), "s390.tmpl");
        assert!(template_for("aarch64").is_err());
    }

    fn kernel() -> KernelRecord {
        KernelRecord {
            path: "boot/vmlinuz-6.1.0.x86_64".to_string(),
            version: "6.1.0.x86_64".to_string(),
            arch: "x86_64".to_string(),
            flavor: None,
            initrd: None,
        }
    }

    #[test]
    fn test_dracut_command_forces_without_backup() {
        let cmd = dracut_command(
            Path::new("/install"),
            &kernel(),
            "boot/initramfs-6.1.0.x86_64.img",
            &["--xz".to_string()],
            "",
        );
        assert_eq!(
            cmd.argv(),
            vec![
                "chroot",
                "/install",
                "/sbin/dracut",
                "--nomdadmconf",
                "--nolvmconf",
                "--xz",
                "--force",
                "/boot/initramfs-6.1.0.x86_64.img",
                "6.1.0.x86_64",
            ]
        );
    }

    #[test]
    fn test_dracut_command_with_backup_does_not_force() {
        let cmd = dracut_command(
            Path::new("/install"),
            &kernel(),
            "boot/initramfs-6.1.0.x86_64.img",
            &[],
            ".old",
        );
        let argv = cmd.argv();
        assert!(!argv.contains(&"--force"));
        assert_eq!(
            &argv[argv.len() - 2..],
            &["/boot/initramfs-6.1.0.x86_64.img", "6.1.0.x86_64"]
        );
    }

    #[test]
    fn test_implant_without_run_is_noop() {
        let base = BaseBuilder::new(
            "x",
            ArchData::new("x86_64"),
            Path::new("/nonexistent"),
            Path::new("/nonexistent"),
        );
        let builder = TreeBuilder::new(base, Path::new("/nonexistent"));
        builder.implant_isomd5().unwrap();
    }

    #[test]
    fn test_unknown_arch_fails_build() {
        let base = BaseBuilder::new(
            "x",
            ArchData::new("aarch64"),
            Path::new("/nonexistent"),
            Path::new("/nonexistent"),
        );
        let mut builder = TreeBuilder::new(base, Path::new("/nonexistent"));
        let err = builder.build().unwrap_err();
        assert!(err.to_string().contains("aarch64"));
    }
}
