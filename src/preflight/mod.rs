//! Preflight checks for tree builds.
//!
//! Validates the host tools a build shells out to before starting.
//! Run with `treebuilder preflight` to check everything is ready.

mod host_tools;
mod types;

use anyhow::{bail, Result};

pub use host_tools::check_tool_exists;
pub use types::{CheckResult, CheckStatus, PreflightReport};

/// Run all preflight checks.
pub fn run_preflight() -> PreflightReport {
    tracing::info!("checking host tools");
    PreflightReport {
        checks: host_tools::check_host_tools(),
    }
}

/// Run preflight and bail if any checks fail.
pub fn run_preflight_or_fail() -> Result<()> {
    let report = run_preflight();
    report.print();

    if !report.all_passed() {
        bail!(
            "Preflight failed: {} check(s) failed. Fix the issues above before building.",
            report.fail_count()
        );
    }

    println!("All preflight checks passed!\n");
    Ok(())
}
