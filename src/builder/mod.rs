//! Template-driven tree building.
//!
//! [`BaseBuilder`] binds the default variables and runs one template;
//! [`TreeBuilder`] adds the boot-tree specifics (template selection, initrd
//! rebuild/append, ISO checksum implant).

pub mod tree;

pub use tree::{template_for, TreeBuilder, TEMPLATE_MAP};

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

use crate::arch::ArchData;
use crate::template::{
    ExistsCheck, LineTemplate, TemplateParser, TemplateRunner, TreeInfo, Value, Variables,
};

/// Binds build variables and runs templates against an install tree.
pub struct BaseBuilder {
    pub product: String,
    pub arch: ArchData,
    /// Install tree (read-only source).
    pub inroot: PathBuf,
    /// Tree being built.
    pub outroot: PathBuf,
    fatal_errors: bool,
    parser: Box<dyn TemplateParser>,
    runner: Option<TemplateRunner>,
}

impl BaseBuilder {
    pub fn new(product: &str, arch: ArchData, inroot: &Path, outroot: &Path) -> Self {
        Self {
            product: product.to_string(),
            arch,
            inroot: inroot.to_path_buf(),
            outroot: outroot.to_path_buf(),
            fatal_errors: false,
            parser: Box::new(LineTemplate),
            runner: None,
        }
    }

    /// Stop at the first failing template line.
    pub fn with_fatal_errors(mut self, fatal: bool) -> Self {
        self.fatal_errors = fatal;
        self
    }

    /// Use a different template parser.
    pub fn with_parser(mut self, parser: impl TemplateParser + 'static) -> Self {
        self.parser = Box::new(parser);
        self
    }

    /// Variables every template gets.
    pub fn default_variables(&self) -> Variables {
        let mut vars = Variables::new();
        vars.insert("arch".into(), Value::Arch(self.arch.clone()));
        vars.insert("basearch".into(), self.arch.basearch.clone().into());
        vars.insert("libdir".into(), self.arch.libdir.clone().into());
        vars.insert("product".into(), self.product.clone().into());
        vars.insert("inroot".into(), Value::Path(self.inroot.clone()));
        vars.insert("outroot".into(), Value::Path(self.outroot.clone()));
        vars.insert("exists".into(), Value::Exists(ExistsCheck::new(&self.inroot)));
        vars
    }

    /// Parse `template` with `variables` (plus defaults for anything unset)
    /// and run it.
    ///
    /// The runner is kept so its tree metadata can be read afterwards.
    pub fn run_template(&mut self, template: &Path, mut variables: Variables) -> Result<()> {
        for (key, value) in self.default_variables() {
            variables.entry(key).or_insert(value);
        }

        tracing::info!(
            "parsing {} with the following variables",
            template.display()
        );
        for (key, value) in &variables {
            tracing::info!("  {}: {}", key, value);
        }

        let lines = self.parser.parse(template, &variables)?;

        let mut runner =
            TemplateRunner::new(&self.inroot, &self.outroot).with_fatal_errors(self.fatal_errors);
        tracing::info!("running template commands");
        let result = runner
            .run(&lines)
            .with_context(|| format!("template {} failed", template.display()));
        self.runner = Some(runner);
        result
    }

    /// Metadata from the last template run, if any.
    pub fn treeinfo_data(&self) -> Option<&TreeInfo> {
        self.runner.as_ref().map(TemplateRunner::treeinfo_data)
    }
}
