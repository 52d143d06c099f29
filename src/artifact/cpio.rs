//! CPIO archive creation.
//!
//! The archive is left uncompressed: the kernel accepts concatenated cpio
//! segments in an initramfs, so the bytes can be appended to an existing
//! (compressed) initrd without rebuilding it.

use anyhow::{Context, Result};
use std::path::Path;

use crate::process::shell_in;

/// Build an uncompressed newc cpio archive of everything under `root`.
///
/// # Example
///
/// ```rust,ignore
/// build_cpio(Path::new("/tmp/updates"), Path::new("/tmp/updates.cpio"))?;
/// ```
pub fn build_cpio(root: &Path, output: &Path) -> Result<()> {
    let output_str = output.to_string_lossy();
    let quoted = shlex::try_quote(&output_str)
        .with_context(|| format!("Cannot quote archive path {}", output.display()))?;

    // find -print0 | cpio --null handles any file name; newc is the format
    // the kernel unpacks.
    let cpio_cmd = format!(
        "find . -print0 | cpio --null --quiet -o -H newc > {}",
        quoted
    );

    shell_in(&cpio_cmd, root)
        .with_context(|| format!("Failed to archive {}", root.display()))?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_build_cpio_uncompressed() {
        let temp = TempDir::new().unwrap();
        let root = temp.path().join("updates");
        let output = temp.path().join("out dir/updates.cpio");

        fs::create_dir_all(root.join("etc")).unwrap();
        fs::create_dir_all(output.parent().unwrap()).unwrap();
        fs::write(root.join("etc/updates.conf"), "x=1\n").unwrap();

        build_cpio(&root, &output).unwrap();

        let bytes = fs::read(&output).unwrap();
        // newc magic, no gzip header
        assert!(bytes.starts_with(b"070701"));
        assert!(bytes.windows(17).any(|w| w == b"etc/updates.conf\0"));
    }
}
