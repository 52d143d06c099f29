//! Shared utilities across treebuilder modules.

pub mod files;

pub use files::{append_line, copy_path, join_root, remove_path, replace_in_file};
