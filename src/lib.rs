//! Treebuilder - builds the arch-specific boot image tree of an
//! installation medium.
//!
//! ```text
//! TreeBuilder::build
//!   ├── find_kernels(inroot, "boot")        kernel
//!   ├── BaseBuilder::run_template           builder
//!   │     ├── default_variables + extras
//!   │     ├── TemplateParser::parse         template::parser
//!   │     └── TemplateRunner::run           template::runner
//!   └── implant_isomd5 for boot.iso entries artifact::iso
//! ```
//!
//! `rebuild_initrds` and `initrd_append` work on the install tree directly,
//! outside the template runner.

pub mod arch;
pub mod artifact;
pub mod builder;
pub mod common;
pub mod config;
pub mod kernel;
pub mod preflight;
pub mod process;
pub mod template;
pub mod timing;

pub use builder::{BaseBuilder, TreeBuilder};
pub use kernel::{find_kernels, KernelRecord};
pub use template::{Command, TemplateError, TemplateRunner};
