//! Template parsing.
//!
//! [`TemplateParser`] turns a template file plus bound variables into the
//! flat command list the runner executes. All control flow (loops over
//! kernels, existence conditionals) is resolved here; the runner never
//! branches.
//!
//! [`LineTemplate`] syntax:
//!
//! ```text
//! # comment
//! mkdir images/pxeboot
//! %for kernel in kernels
//! installkernel images-${basearch} ${kernel.path} images/pxeboot/vmlinuz
//! %endfor
//! %if exists usr/share/anaconda/boot/*.png
//! install usr/share/anaconda/boot/*.png isolinux
//! %endif
//! ```

use anyhow::{Context, Result};
use regex::{Captures, Regex};
use std::fs;
use std::path::Path;
use std::sync::OnceLock;

use super::{CommandLine, Value, Variables};
use crate::kernel::KernelRecord;

/// Produces the command sequence for a template file.
pub trait TemplateParser {
    fn parse(&self, path: &Path, variables: &Variables) -> Result<Vec<CommandLine>>;
}

/// A parse failure, located in the template source.
#[derive(Debug, thiserror::Error)]
#[error("{file}:{line}: {message}")]
pub struct ParseError {
    pub file: String,
    pub line: usize,
    pub message: String,
}

/// Line-oriented templates with `${var}` substitution and `%for`/`%if` blocks.
#[derive(Debug, Default, Clone, Copy)]
pub struct LineTemplate;

impl TemplateParser for LineTemplate {
    fn parse(&self, path: &Path, variables: &Variables) -> Result<Vec<CommandLine>> {
        let source = fs::read_to_string(path)
            .with_context(|| format!("Failed to read template {}", path.display()))?;
        Ok(parse_str(&path.display().to_string(), &source, variables)?)
    }
}

/// Parse template `source`; `file` is only used in error messages.
pub fn parse_str(
    file: &str,
    source: &str,
    variables: &Variables,
) -> Result<Vec<CommandLine>, ParseError> {
    let lines: Vec<(usize, &str)> = source
        .lines()
        .enumerate()
        .map(|(i, l)| (i + 1, l.trim()))
        .filter(|(_, l)| !l.is_empty() && !l.starts_with('#'))
        .collect();

    let ctx = Ctx { file, variables };
    let mut pos = 0;
    let nodes = ctx.block(&lines, &mut pos, None)?;

    let mut out = Vec::new();
    ctx.expand(&nodes, &mut Vec::new(), &mut out)?;
    Ok(out)
}

enum Node<'s> {
    Line {
        num: usize,
        text: &'s str,
    },
    For {
        num: usize,
        var: &'s str,
        list: &'s str,
        body: Vec<Node<'s>>,
    },
    If {
        num: usize,
        negate: bool,
        pattern: &'s str,
        body: Vec<Node<'s>>,
    },
}

struct Ctx<'a> {
    file: &'a str,
    variables: &'a Variables,
}

impl<'a> Ctx<'a> {
    fn error(&self, line: usize, message: impl Into<String>) -> ParseError {
        ParseError {
            file: self.file.to_string(),
            line,
            message: message.into(),
        }
    }

    /// Collect nodes until `end` (or end of input when `end` is None).
    fn block<'s>(
        &self,
        lines: &[(usize, &'s str)],
        pos: &mut usize,
        end: Option<(&str, usize)>,
    ) -> Result<Vec<Node<'s>>, ParseError> {
        let mut nodes = Vec::new();

        while let Some(&(num, text)) = lines.get(*pos) {
            *pos += 1;

            let Some(directive) = text.strip_prefix('%') else {
                nodes.push(Node::Line { num, text });
                continue;
            };

            let words: Vec<&str> = directive.split_whitespace().collect();
            match words.as_slice() {
                ["endfor"] | ["endif"] => {
                    return match end {
                        Some((expected, _)) if expected == words[0] => Ok(nodes),
                        _ => Err(self.error(num, format!("unexpected %{}", words[0]))),
                    };
                }
                ["for", var, "in", list] => {
                    let body = self.block(lines, pos, Some(("endfor", num)))?;
                    nodes.push(Node::For {
                        num,
                        var: *var,
                        list: *list,
                        body,
                    });
                }
                ["if", test, pattern] if *test == "exists" || *test == "!exists" => {
                    let body = self.block(lines, pos, Some(("endif", num)))?;
                    nodes.push(Node::If {
                        num,
                        negate: test.starts_with('!'),
                        pattern: *pattern,
                        body,
                    });
                }
                _ => return Err(self.error(num, format!("unknown directive %{}", directive))),
            }
        }

        match end {
            Some((expected, opened)) => {
                Err(self.error(opened, format!("block is missing %{}", expected)))
            }
            None => Ok(nodes),
        }
    }

    fn expand<'s>(
        &self,
        nodes: &[Node<'s>],
        scope: &mut Vec<(&'s str, KernelRecord)>,
        out: &mut Vec<CommandLine>,
    ) -> Result<(), ParseError> {
        for node in nodes {
            match node {
                Node::Line { num, text } => {
                    // Split first so a substituted value is always one token.
                    let tokens = shlex::split(text)
                        .ok_or_else(|| self.error(*num, "unbalanced quotes"))?
                        .iter()
                        .map(|token| self.substitute(*num, token, scope))
                        .collect::<Result<CommandLine, _>>()?;
                    if !tokens.is_empty() {
                        out.push(tokens);
                    }
                }
                Node::For {
                    num,
                    var,
                    list,
                    body,
                } => {
                    let kernels = match self.variables.get(*list) {
                        Some(Value::Kernels(kernels)) => kernels,
                        Some(_) => {
                            return Err(self.error(*num, format!("{} is not a kernel list", list)))
                        }
                        None => return Err(self.error(*num, format!("undefined variable {}", list))),
                    };
                    for kernel in kernels {
                        scope.push((*var, kernel.clone()));
                        let result = self.expand(body, scope, out);
                        scope.pop();
                        result?;
                    }
                }
                Node::If {
                    num,
                    negate,
                    pattern,
                    body,
                } => {
                    let exists = match self.variables.get("exists") {
                        Some(Value::Exists(check)) => check,
                        _ => return Err(self.error(*num, "no exists check bound")),
                    };
                    let pattern = self.substitute(*num, pattern, scope)?;
                    if exists.check(&pattern) != *negate {
                        self.expand(body, scope, out)?;
                    }
                }
            }
        }
        Ok(())
    }

    fn substitute(
        &self,
        num: usize,
        text: &str,
        scope: &[(&str, KernelRecord)],
    ) -> Result<String, ParseError> {
        let mut failure = None;
        let rendered = var_regex().replace_all(text, |caps: &Captures| {
            let name = &caps[1];
            let field = caps.get(2).map(|m| m.as_str());
            match self.lookup(name, field, scope) {
                Ok(value) => value,
                Err(message) => {
                    failure.get_or_insert(message);
                    String::new()
                }
            }
        });
        match failure {
            Some(message) => Err(self.error(num, message)),
            None => Ok(rendered.into_owned()),
        }
    }

    fn lookup(
        &self,
        name: &str,
        field: Option<&str>,
        scope: &[(&str, KernelRecord)],
    ) -> Result<String, String> {
        if let Some((_, kernel)) = scope.iter().rev().find(|(var, _)| *var == name) {
            return kernel_field(kernel, field.unwrap_or("path"))
                .ok_or_else(|| format!("kernel has no field {}", field.unwrap_or_default()));
        }

        match (self.variables.get(name), field) {
            (None, _) => Err(format!("undefined variable {}", name)),
            (Some(Value::Text(s)), None) => Ok(s.clone()),
            (Some(Value::Path(p)), None) => Ok(p.display().to_string()),
            (Some(Value::Arch(arch)), None) => Ok(arch.arch.clone()),
            (Some(Value::Arch(arch)), Some("arch")) => Ok(arch.arch.clone()),
            (Some(Value::Arch(arch)), Some("basearch")) => Ok(arch.basearch.clone()),
            (Some(Value::Arch(arch)), Some("libdir")) => Ok(arch.libdir.clone()),
            (Some(_), Some(field)) => Err(format!("{} has no field {}", name, field)),
            (Some(_), None) => Err(format!("{} cannot be substituted as text", name)),
        }
    }
}

fn kernel_field(kernel: &KernelRecord, field: &str) -> Option<String> {
    match field {
        "path" => Some(kernel.path.clone()),
        "version" => Some(kernel.version.clone()),
        "arch" => Some(kernel.arch.clone()),
        "flavor" => Some(kernel.flavor.clone().unwrap_or_default()),
        "initrd" => Some(
            kernel
                .initrd
                .as_ref()
                .map(|i| i.path.clone())
                .unwrap_or_default(),
        ),
        _ => None,
    }
}

fn var_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"\$\{([A-Za-z_][A-Za-z0-9_]*)(?:\.([A-Za-z_]+))?\}").unwrap()
    })
}
