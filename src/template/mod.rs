//! Template language: commands, variables and the interpreter.
//!
//! A template is parsed (see [`parser`]) into an ordered list of
//! [`CommandLine`]s, which [`runner::TemplateRunner`] executes once, in order,
//! against two roots:
//!
//! ```text
//! inroot  (install tree, read-only) ──install/exists──┐
//!                                                     ▼
//! outroot (boot tree being built)  ◄── every other command
//! ```
//!
//! The command set is closed. A name outside [`Command`] is rejected before
//! anything runs for that line.

pub mod error;
pub mod parser;
pub mod runner;

pub use error::TemplateError;
pub use parser::{LineTemplate, ParseError, TemplateParser};
pub use runner::{TemplateRunner, TreeInfo};

use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use crate::arch::ArchData;
use crate::common::join_root;
use crate::kernel::KernelRecord;

/// One parsed template line: command name followed by its arguments.
pub type CommandLine = Vec<String>;

/// Variables bound into a template, ordered by name.
pub type Variables = BTreeMap<String, Value>;

/// Commands understood by the interpreter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Command {
    Install,
    Mkdir,
    Replace,
    Append,
    Treeinfo,
    InstallKernel,
    InstallInitrd,
    Hardlink,
    Symlink,
    Copy,
    CopyIf,
    Move,
    MoveIf,
    Remove,
    Chmod,
    Runcmd,
    Log,
}

impl Command {
    /// Every command, in the order they are documented.
    pub const ALL: [Command; 17] = [
        Command::Install,
        Command::Mkdir,
        Command::Replace,
        Command::Append,
        Command::Treeinfo,
        Command::InstallKernel,
        Command::InstallInitrd,
        Command::Hardlink,
        Command::Symlink,
        Command::Copy,
        Command::CopyIf,
        Command::Move,
        Command::MoveIf,
        Command::Remove,
        Command::Chmod,
        Command::Runcmd,
        Command::Log,
    ];

    /// Name as written in templates.
    pub fn as_str(self) -> &'static str {
        match self {
            Command::Install => "install",
            Command::Mkdir => "mkdir",
            Command::Replace => "replace",
            Command::Append => "append",
            Command::Treeinfo => "treeinfo",
            Command::InstallKernel => "installkernel",
            Command::InstallInitrd => "installinitrd",
            Command::Hardlink => "hardlink",
            Command::Symlink => "symlink",
            Command::Copy => "copy",
            Command::CopyIf => "copyif",
            Command::Move => "move",
            Command::MoveIf => "moveif",
            Command::Remove => "remove",
            Command::Chmod => "chmod",
            Command::Runcmd => "runcmd",
            Command::Log => "log",
        }
    }
}

impl FromStr for Command {
    type Err = TemplateError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Command::ALL
            .into_iter()
            .find(|cmd| cmd.as_str() == s)
            .ok_or_else(|| TemplateError::UnknownCommand(s.to_string()))
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Glob-aware existence check rooted at the install tree.
///
/// Relative patterns are resolved under the root; absolute ones are used
/// as given.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExistsCheck {
    root: PathBuf,
}

impl ExistsCheck {
    pub fn new(root: &Path) -> Self {
        Self {
            root: root.to_path_buf(),
        }
    }

    /// True if at least one path matches `pattern`.
    pub fn check(&self, pattern: &str) -> bool {
        let full = if pattern.starts_with('/') {
            pattern.to_string()
        } else {
            rooted_pattern(&self.root, pattern)
        };
        match glob_paths(&full) {
            Ok(paths) => !paths.is_empty(),
            Err(e) => {
                tracing::debug!(pattern = %full, error = %e, "invalid glob pattern");
                false
            }
        }
    }
}

/// Expand a glob. Wildcards don't match a leading `.`; unreadable entries
/// are skipped.
pub(crate) fn glob_paths(pattern: &str) -> Result<Vec<PathBuf>, glob::PatternError> {
    let options = glob::MatchOptions {
        require_literal_leading_dot: true,
        ..Default::default()
    };
    Ok(glob::glob_with(pattern, options)?
        .filter_map(|entry| entry.ok())
        .collect())
}

/// Build a glob pattern for `pattern` under `root`, escaping the root so
/// only the template-supplied part is treated as a pattern.
pub(crate) fn rooted_pattern(root: &Path, pattern: &str) -> String {
    let escaped = glob::Pattern::escape(&root.to_string_lossy());
    join_root(Path::new(&escaped), pattern)
        .to_string_lossy()
        .into_owned()
}

/// A template variable.
#[derive(Debug, Clone)]
pub enum Value {
    Text(String),
    Path(PathBuf),
    Arch(ArchData),
    Kernels(Vec<KernelRecord>),
    Exists(ExistsCheck),
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Text(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Text(s)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Text(s) => f.write_str(s),
            Value::Path(p) => write!(f, "{}", p.display()),
            Value::Arch(arch) => write!(f, "{}", arch),
            Value::Kernels(kernels) => {
                let versions: Vec<_> = kernels.iter().map(|k| k.version.as_str()).collect();
                write!(f, "[{}]", versions.join(", "))
            }
            Value::Exists(check) => write!(f, "<exists under {}>", check.root.display()),
        }
    }
}
