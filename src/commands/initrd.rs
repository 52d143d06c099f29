//! Initrd commands - rebuild with dracut, or append extra files.

use anyhow::{bail, Result};
use std::path::Path;

use treebuilder::config::Config;
use treebuilder::timing::Timer;

use super::install_tree_builder;

/// Execute the rebuild-initrds command.
pub fn cmd_rebuild_initrds(
    config: &Config,
    inroot: &Path,
    arch: &str,
    backup: Option<&str>,
    dracut_args: &[String],
) -> Result<()> {
    let builder = install_tree_builder(config, inroot, arch);

    let timer = Timer::start("rebuild initrds");
    builder.rebuild_initrds(dracut_args, backup.unwrap_or(""))?;
    timer.finish();
    Ok(())
}

/// Execute the initrd-append command.
pub fn cmd_initrd_append(config: &Config, inroot: &Path, arch: &str, dir: &Path) -> Result<()> {
    if !dir.exists() {
        bail!("{} not found", dir.display());
    }
    let builder = install_tree_builder(config, inroot, arch);
    builder.initrd_append(dir)
}
