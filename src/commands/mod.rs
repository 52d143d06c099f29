//! CLI command handlers.
//!
//! Each submodule handles a specific CLI command:
//! - `build` - Run the arch template and finalize boot images
//! - `kernels` - List kernels found in a tree
//! - `initrd` - Rebuild initrds or append files to them
//! - `preflight` - Run preflight checks
//! - `show` - Display information

pub mod build;
pub mod initrd;
pub mod kernels;
mod preflight;
pub mod show;

pub use build::cmd_build;
pub use initrd::{cmd_initrd_append, cmd_rebuild_initrds};
pub use kernels::cmd_kernels;
pub use preflight::cmd_preflight;
pub use show::cmd_show;

use std::path::Path;

use treebuilder::arch::ArchData;
use treebuilder::builder::{BaseBuilder, TreeBuilder};
use treebuilder::config::Config;

/// Tree builder for commands that only operate on the install tree.
pub(crate) fn install_tree_builder(config: &Config, inroot: &Path, arch: &str) -> TreeBuilder {
    let base = BaseBuilder::new(&config.product, ArchData::new(arch), inroot, inroot);
    TreeBuilder::new(base, &config.template_dir)
}
