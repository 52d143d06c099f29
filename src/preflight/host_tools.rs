//! Host tool availability checks.

use super::types::CheckResult;

/// (tool, package, purpose)
const REQUIRED_TOOLS: &[(&str, &str, &str)] = &[
    ("find", "findutils", "Required to list files for initrd archives"),
    ("cpio", "cpio", "Required to build initrd archives"),
    ("implantisomd5", "isomd5sum", "Required to checksum boot.iso"),
];

const OPTIONAL_TOOLS: &[(&str, &str, &str)] = &[(
    "chroot",
    "coreutils",
    "Required for `treebuilder rebuild-initrds`",
)];

/// Check host tools are installed.
pub fn check_host_tools() -> Vec<CheckResult> {
    let required = REQUIRED_TOOLS
        .iter()
        .map(|&(tool, package, purpose)| check_tool_exists(tool, package, purpose, true));
    let optional = OPTIONAL_TOOLS
        .iter()
        .map(|&(tool, package, purpose)| check_tool_exists(tool, package, purpose, false));
    required.chain(optional).collect()
}

/// Check if a tool exists in PATH.
pub fn check_tool_exists(tool: &str, package: &str, purpose: &str, required: bool) -> CheckResult {
    match which::which(tool) {
        Ok(path) => CheckResult::pass_with(tool, &path.display().to_string()),
        Err(_) => {
            let msg = format!("Not found. Install '{}' package. {}", package, purpose);
            if required {
                CheckResult::fail(tool, &msg)
            } else {
                CheckResult::warn(tool, &msg)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::preflight::types::CheckStatus;

    #[test]
    fn test_present_tool_passes() {
        let result = check_tool_exists("sh", "bash", "", true);
        assert_eq!(result.status, CheckStatus::Pass);
    }

    #[test]
    fn test_missing_tool_severity() {
        let required = check_tool_exists("nonexistent_program_12345", "pkg", "", true);
        assert_eq!(required.status, CheckStatus::Fail);
        let optional = check_tool_exists("nonexistent_program_12345", "pkg", "", false);
        assert_eq!(optional.status, CheckStatus::Warn);
        assert!(optional.details.unwrap().contains("'pkg'"));
    }
}
