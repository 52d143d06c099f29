//! Kernels command - lists kernels found in a tree.

use anyhow::Result;
use std::path::Path;

use treebuilder::kernel::find_kernels;

/// Execute the kernels command.
pub fn cmd_kernels(root: &Path, boot_dir: &str, json: bool) -> Result<()> {
    let kernels = find_kernels(root, boot_dir)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&kernels)?);
        return Ok(());
    }

    if kernels.is_empty() {
        println!("No kernels found in {}", root.join(boot_dir).display());
        return Ok(());
    }

    for kernel in &kernels {
        println!("{}", kernel.path);
        println!("  version: {}", kernel.version);
        println!("  arch:    {}", kernel.arch);
        if let Some(flavor) = &kernel.flavor {
            println!("  flavor:  {}", flavor);
        }
        match &kernel.initrd {
            Some(initrd) => println!("  initrd:  {}", initrd.path),
            None => println!("  initrd:  (none)"),
        }
    }
    Ok(())
}
