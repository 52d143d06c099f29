//! Show command - displays information.

use anyhow::Result;

use treebuilder::builder::TEMPLATE_MAP;
use treebuilder::config::Config;

/// Show target for the show command.
pub enum ShowTarget {
    /// Show configuration
    Config,
    /// Show which template each base architecture uses
    Templates,
}

/// Execute the show command.
pub fn cmd_show(target: ShowTarget, config: &Config) -> Result<()> {
    match target {
        ShowTarget::Config => config.print(),
        ShowTarget::Templates => {
            for (basearch, template) in TEMPLATE_MAP {
                let path = config.template_dir.join(template);
                let status = if path.exists() { "" } else { " (missing)" };
                println!("  {:<8} {}{}", basearch, path.display(), status);
            }
        }
    }
    Ok(())
}
