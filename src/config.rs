//! Configuration management for treebuilder.
//!
//! Reads configuration from .env file and environment variables.
//! Environment variables take precedence over .env file; command-line flags
//! take precedence over both.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// Default product name bound into templates.
pub const DEFAULT_PRODUCT: &str = "Linux";

/// Default log filter when `TREEBUILDER_LOG` is unset.
pub const DEFAULT_LOG_FILTER: &str = "info";

/// Treebuilder configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Directory holding the per-arch templates (default: templates)
    pub template_dir: PathBuf,
    /// Product name (e.g., "Fedora")
    pub product: String,
    /// Abort a template run at the first failing line
    pub fatal_errors: bool,
    /// tracing-subscriber filter directive
    pub log_filter: String,
}

impl Config {
    /// Load configuration from `base_dir/.env` and the process environment.
    pub fn load(base_dir: &Path) -> Self {
        let mut env_vars = read_env_file(&base_dir.join(".env"));

        // Environment variables override .env file
        env_vars.extend(std::env::vars());

        Self::from_vars(base_dir, &env_vars)
    }

    fn from_vars(base_dir: &Path, env_vars: &HashMap<String, String>) -> Self {
        let template_dir = env_vars
            .get("TREEBUILDER_TEMPLATE_DIR")
            .map(|s| {
                let path = PathBuf::from(s);
                if path.is_absolute() {
                    path
                } else {
                    base_dir.join(path)
                }
            })
            .unwrap_or_else(|| base_dir.join("templates"));

        let product = env_vars
            .get("TREEBUILDER_PRODUCT")
            .cloned()
            .unwrap_or_else(|| DEFAULT_PRODUCT.to_string());

        let fatal_errors = env_vars
            .get("TREEBUILDER_FATAL_ERRORS")
            .map(|v| matches!(v.to_ascii_lowercase().as_str(), "1" | "true" | "yes"))
            .unwrap_or(false);

        let log_filter = env_vars
            .get("TREEBUILDER_LOG")
            .cloned()
            .unwrap_or_else(|| DEFAULT_LOG_FILTER.to_string());

        Self {
            template_dir,
            product,
            fatal_errors,
            log_filter,
        }
    }

    /// Print configuration for debugging.
    pub fn print(&self) {
        println!("Configuration:");
        println!("  TREEBUILDER_TEMPLATE_DIR: {}", self.template_dir.display());
        println!("  TREEBUILDER_PRODUCT: {}", self.product);
        println!("  TREEBUILDER_FATAL_ERRORS: {}", self.fatal_errors);
        println!("  TREEBUILDER_LOG: {}", self.log_filter);
        if self.template_dir.is_dir() {
            println!("  Templates: FOUND");
        } else {
            println!("  Templates: NOT FOUND");
        }
    }
}

/// Read `path` as a dotenv file. A missing file yields no entries; lines
/// that don't parse are skipped with a warning.
fn read_env_file(path: &Path) -> HashMap<String, String> {
    let Ok(entries) = dotenvy::from_path_iter(path) else {
        return HashMap::new();
    };
    entries
        .filter_map(|entry| match entry {
            Ok(pair) => Some(pair),
            Err(e) => {
                tracing::warn!("{}: {}", path.display(), e);
                None
            }
        })
        .collect()
}
