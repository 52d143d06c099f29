//! Architecture naming.
//!
//! Templates are selected by *base* architecture (one template serves a whole
//! family, e.g. i686 and x86_64 share `x86.tmpl`), and library paths differ
//! between 32- and 64-bit arches.

use serde::Serialize;
use std::fmt;

/// Arches whose libraries live in `lib64`.
const LIB64_ARCHES: &[&str] = &[
    "x86_64", "ppc64", "ppc64le", "s390x", "sparc64", "aarch64",
];

/// Architecture information bound into every template.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ArchData {
    /// Machine architecture as given (e.g. "i686").
    pub arch: String,
    /// Base architecture family (e.g. "i386").
    pub basearch: String,
    /// Library directory name ("lib" or "lib64").
    pub libdir: String,
}

impl ArchData {
    pub fn new(arch: &str) -> Self {
        let basearch = match arch {
            "i386" | "i486" | "i586" | "i686" => "i386",
            "ppc64" | "ppc64le" => "ppc64",
            "sparc" | "sparcv9" => "sparc",
            other => other,
        };
        let libdir = if LIB64_ARCHES.contains(&arch) {
            "lib64"
        } else {
            "lib"
        };

        Self {
            arch: arch.to_string(),
            basearch: basearch.to_string(),
            libdir: libdir.to_string(),
        }
    }
}

impl fmt::Display for ArchData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.arch)
    }
}
