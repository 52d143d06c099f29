//! Build command - runs the arch template and finalizes the tree.

use anyhow::{bail, Context, Result};
use std::fs;
use std::path::PathBuf;

use treebuilder::arch::ArchData;
use treebuilder::builder::{BaseBuilder, TreeBuilder};
use treebuilder::config::Config;
use treebuilder::template::{Value, Variables};
use treebuilder::timing::Timer;

/// Options for the build command.
pub struct BuildOptions {
    pub inroot: PathBuf,
    pub outroot: PathBuf,
    pub arch: String,
    pub product: Option<String>,
    pub templates: Option<PathBuf>,
    pub strict: bool,
    pub treeinfo_json: Option<PathBuf>,
    /// Extra `KEY=VALUE` template variables.
    pub vars: Vec<String>,
}

/// Execute the build command.
pub fn cmd_build(opts: BuildOptions, config: &Config) -> Result<()> {
    if !opts.inroot.is_dir() {
        bail!("Install tree not found at {}", opts.inroot.display());
    }
    fs::create_dir_all(&opts.outroot)
        .with_context(|| format!("Failed to create {}", opts.outroot.display()))?;

    let product = opts.product.as_deref().unwrap_or(&config.product);
    let template_dir = opts.templates.as_ref().unwrap_or(&config.template_dir);
    let extra = parse_vars(&opts.vars)?;

    let base = BaseBuilder::new(product, ArchData::new(&opts.arch), &opts.inroot, &opts.outroot)
        .with_fatal_errors(opts.strict || config.fatal_errors);
    let mut builder = TreeBuilder::new(base, template_dir);

    let timer = Timer::start("boot tree");
    builder.build_with(extra)?;
    timer.finish();

    if let Some(path) = &opts.treeinfo_json {
        let data = builder.treeinfo_data().cloned().unwrap_or_default();
        let json = serde_json::to_string_pretty(&data)?;
        fs::write(path, json + "\n")
            .with_context(|| format!("Failed to write {}", path.display()))?;
        tracing::info!("wrote tree metadata to {}", path.display());
    }

    Ok(())
}

fn parse_vars(vars: &[String]) -> Result<Variables> {
    let mut out = Variables::new();
    for var in vars {
        let Some((key, value)) = var.split_once('=') else {
            bail!("Invalid --var {:?}: expected KEY=VALUE", var);
        };
        out.insert(key.to_string(), Value::Text(value.to_string()));
    }
    Ok(out)
}
