//! Template interpreter.
//!
//! Executes parsed [`CommandLine`]s in order. Each line either succeeds or
//! fails on its own: a failure is logged and the next line runs, unless the
//! runner is in strict mode (`fatal_errors`), in which case the first failure
//! ends the run and is returned.
//!
//! Path convention, fixed per command:
//! - `install` (and the installkernel/installinitrd variants) read sources
//!   from `inroot`
//! - `copyif`/`moveif` test their source with the `inroot` existence check
//! - everything else reads and writes under `outroot`

use std::collections::BTreeMap;
use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};

use regex::bytes::Regex;

use super::{glob_paths, rooted_pattern, Command, CommandLine, ExistsCheck, TemplateError};
use crate::common::{append_line, copy_path, join_root, remove_path, replace_in_file};
use crate::process::Cmd;

type Result<T, E = TemplateError> = std::result::Result<T, E>;

/// Tree metadata: section → key → value.
pub type TreeInfo = BTreeMap<String, BTreeMap<String, String>>;

/// Runs template commands against an install tree and an output tree.
#[derive(Debug)]
pub struct TemplateRunner {
    inroot: PathBuf,
    outroot: PathBuf,
    fatal_errors: bool,
    treeinfo_data: TreeInfo,
    exists: ExistsCheck,
}

impl TemplateRunner {
    pub fn new(inroot: &Path, outroot: &Path) -> Self {
        Self {
            inroot: inroot.to_path_buf(),
            outroot: outroot.to_path_buf(),
            fatal_errors: false,
            treeinfo_data: TreeInfo::new(),
            exists: ExistsCheck::new(inroot),
        }
    }

    /// Abort on the first failing line instead of logging and continuing.
    pub fn with_fatal_errors(mut self, fatal: bool) -> Self {
        self.fatal_errors = fatal;
        self
    }

    /// Metadata accumulated by `treeinfo`, `installkernel` and `installinitrd`.
    pub fn treeinfo_data(&self) -> &TreeInfo {
        &self.treeinfo_data
    }

    pub fn exists(&self, pattern: &str) -> bool {
        self.exists.check(pattern)
    }

    fn out(&self, path: &str) -> PathBuf {
        join_root(&self.outroot, path)
    }

    /// Execute every line, in order.
    pub fn run(&mut self, template: &[CommandLine]) -> Result<()> {
        let span = tracing::info_span!(
            "template",
            inroot = %self.inroot.display(),
            outroot = %self.outroot.display()
        );
        let _enter = span.enter();

        for (num, line) in template.iter().enumerate() {
            let num = num + 1;
            tracing::debug!("template line {}: {:?}", num, line);

            if let Err(e) = self.run_line(line) {
                tracing::error!("template command error: {:?}", line);
                if self.fatal_errors {
                    return Err(e);
                }
                tracing::error!("{}", e);
            }
        }
        Ok(())
    }

    fn run_line(&mut self, line: &[String]) -> Result<()> {
        let (name, args) = line.split_first().ok_or(TemplateError::EmptyLine)?;
        let command: Command = name.parse()?;
        self.dispatch(command, args)
    }

    fn dispatch(&mut self, command: Command, args: &[String]) -> Result<()> {
        match command {
            Command::Install => {
                let [src, dest] = exact(command, args)?;
                self.install(src, dest)
            }
            Command::Mkdir => self.mkdir(at_least(command, args, 1)?),
            Command::Replace => {
                let args = at_least(command, args, 3)?;
                self.replace(&args[0], &args[1], &args[2..])
            }
            Command::Append => {
                let [filename, text] = exact(command, args)?;
                self.append(filename, text)
            }
            Command::Treeinfo => {
                let args = at_least(command, args, 3)?;
                self.treeinfo(&args[0], &args[1], &args[2..]);
                Ok(())
            }
            Command::InstallKernel => {
                let [section, src, dest] = exact(command, args)?;
                self.installkernel(section, src, dest)
            }
            Command::InstallInitrd => {
                let [section, src, dest] = exact(command, args)?;
                self.installinitrd(section, src, dest)
            }
            Command::Hardlink => {
                let [src, dest] = exact(command, args)?;
                self.hardlink(src, dest)
            }
            Command::Symlink => {
                let [target, dest] = exact(command, args)?;
                self.symlink(target, dest)
            }
            Command::Copy => {
                let [src, dest] = exact(command, args)?;
                self.copy(src, dest)
            }
            Command::CopyIf => {
                let [src, dest] = exact(command, args)?;
                self.copyif(src, dest).map(|_| ())
            }
            Command::Move => {
                let [src, dest] = exact(command, args)?;
                self.move_(src, dest)
            }
            Command::MoveIf => {
                let [src, dest] = exact(command, args)?;
                self.moveif(src, dest).map(|_| ())
            }
            Command::Remove => self.remove(at_least(command, args, 1)?),
            Command::Chmod => {
                let [target, mode] = exact(command, args)?;
                self.chmod(target, mode)
            }
            Command::Runcmd => self.runcmd(at_least(command, args, 1)?),
            Command::Log => {
                let [msg] = exact(command, args)?;
                self.log(msg);
                Ok(())
            }
        }
    }

    /// Copy every match of `srcglob` (under inroot) to `dest` (under outroot).
    pub fn install(&mut self, srcglob: &str, dest: &str) -> Result<()> {
        let pattern = rooted_pattern(&self.inroot, srcglob);
        let sources = glob_paths(&pattern).map_err(|source| TemplateError::Pattern {
            pattern: srcglob.to_string(),
            source,
        })?;

        if sources.is_empty() {
            return Err(TemplateError::Lookup(srcglob.to_string()));
        }

        let dest = self.out(dest);
        for src in sources {
            copy_path(&src, &dest).map_err(TemplateError::io(&src))?;
        }
        Ok(())
    }

    pub fn mkdir(&mut self, dirs: &[String]) -> Result<()> {
        for dir in dirs {
            let dir = self.out(dir);
            if !dir.is_dir() {
                fs::create_dir_all(&dir).map_err(TemplateError::io(&dir))?;
            }
        }
        Ok(())
    }

    /// Regex substitution in each file. `replacement` takes `\1` and
    /// `\g<name>` backreferences; `$` is literal.
    pub fn replace(&mut self, pattern: &str, replacement: &str, files: &[String]) -> Result<()> {
        let re = Regex::new(pattern).map_err(|source| TemplateError::Regex {
            pattern: pattern.to_string(),
            source,
        })?;
        let replacement = expand_replacement(replacement);
        for file in files {
            let path = self.out(file);
            replace_in_file(&re, &replacement, &path).map_err(TemplateError::io(&path))?;
        }
        Ok(())
    }

    pub fn append(&mut self, filename: &str, text: &str) -> Result<()> {
        let path = self.out(filename);
        append_line(&path, text).map_err(TemplateError::io(&path))
    }

    /// Record `treeinfo_data[section][key]`; later writes to the same key win.
    pub fn treeinfo(&mut self, section: &str, key: &str, values: &[String]) {
        self.treeinfo_data
            .entry(section.to_string())
            .or_default()
            .insert(key.to_string(), values.join(" "));
    }

    pub fn installkernel(&mut self, section: &str, src: &str, dest: &str) -> Result<()> {
        self.install(src, dest)?;
        self.treeinfo(section, "kernel", &[dest.to_string()]);
        Ok(())
    }

    pub fn installinitrd(&mut self, section: &str, src: &str, dest: &str) -> Result<()> {
        self.install(src, dest)?;
        self.treeinfo(section, "initrd", &[dest.to_string()]);
        Ok(())
    }

    pub fn hardlink(&mut self, src: &str, dest: &str) -> Result<()> {
        let dest = self.out(dest);
        fs::hard_link(self.out(src), &dest).map_err(TemplateError::io(&dest))
    }

    /// Create `dest` (under outroot) pointing at `target`, stored verbatim.
    pub fn symlink(&mut self, target: &str, dest: &str) -> Result<()> {
        let dest = self.out(dest);
        std::os::unix::fs::symlink(target, &dest).map_err(TemplateError::io(&dest))
    }

    pub fn copy(&mut self, src: &str, dest: &str) -> Result<()> {
        let src = self.out(src);
        copy_path(&src, &self.out(dest)).map_err(TemplateError::io(&src))
    }

    /// Copy only if `src` passes the inroot existence check.
    ///
    /// Returns whether anything was copied.
    pub fn copyif(&mut self, src: &str, dest: &str) -> Result<bool> {
        if !self.exists(src) {
            return Ok(false);
        }
        self.copy(src, dest)?;
        Ok(true)
    }

    /// `move` in templates.
    pub fn move_(&mut self, src: &str, dest: &str) -> Result<()> {
        self.copy(src, dest)?;
        self.remove(&[src.to_string()])
    }

    /// Returns whether anything was moved.
    pub fn moveif(&mut self, src: &str, dest: &str) -> Result<bool> {
        if !self.copyif(src, dest)? {
            return Ok(false);
        }
        self.remove(&[src.to_string()])?;
        Ok(true)
    }

    pub fn remove(&mut self, targets: &[String]) -> Result<()> {
        for target in targets {
            let path = self.out(target);
            remove_path(&path).map_err(TemplateError::io(&path))?;
        }
        Ok(())
    }

    pub fn chmod(&mut self, target: &str, mode: &str) -> Result<()> {
        let bits = u32::from_str_radix(mode, 8)
            .map_err(|_| TemplateError::InvalidMode(mode.to_string()))?;
        let path = self.out(target);
        fs::set_permissions(&path, fs::Permissions::from_mode(bits))
            .map_err(TemplateError::io(&path))
    }

    /// Run an external command. Programs should be given by full path.
    ///
    /// A leading `chdir=DIR` token sets the working directory for this
    /// command only.
    pub fn runcmd(&mut self, cmdlist: &[String]) -> Result<()> {
        let (chdir, argv) = match cmdlist.split_first() {
            Some((first, rest)) if first.starts_with("chdir=") => {
                (first.split_once('=').map(|(_, dir)| PathBuf::from(dir)), rest)
            }
            _ => (None, cmdlist),
        };

        let (program, args) = argv.split_first().ok_or(TemplateError::Arity {
            command: Command::Runcmd,
            expected: "at least 1 (after chdir=)",
            got: 0,
        })?;

        tracing::info!("runcmd: {:?}", argv);
        let mut cmd = Cmd::new(program).args(args);
        if let Some(dir) = chdir {
            cmd = cmd.dir(&dir);
        }
        cmd.run_interactive()
            .map_err(|e| TemplateError::ExternalTool {
                command: argv.join(" "),
                message: format!("{:#}", e),
            })
    }

    pub fn log(&mut self, msg: &str) {
        tracing::info!("{}", msg);
    }
}

fn exact<'a, const N: usize>(command: Command, args: &'a [String]) -> Result<[&'a str; N]> {
    if args.len() != N {
        return Err(TemplateError::Arity {
            command,
            expected: arity_label(N),
            got: args.len(),
        });
    }
    Ok(std::array::from_fn(|i| args[i].as_str()))
}

fn at_least(command: Command, args: &[String], min: usize) -> Result<&[String]> {
    if args.len() < min {
        return Err(TemplateError::Arity {
            command,
            expected: match min {
                1 => "at least 1",
                _ => "at least 3",
            },
            got: args.len(),
        });
    }
    Ok(args)
}

/// Rewrite a `\N` / `\g<name>` style replacement into regex crate syntax.
fn expand_replacement(repl: &str) -> String {
    let mut out = String::with_capacity(repl.len());
    let mut chars = repl.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '$' => out.push_str("$$"),
            '\\' => match chars.next() {
                Some(d) if d.is_ascii_digit() => {
                    let mut group = d.to_string();
                    if let Some(e) = chars.next_if(char::is_ascii_digit) {
                        group.push(e);
                    }
                    out.push_str(&format!("${{{}}}", group));
                }
                Some('g') if chars.peek() == Some(&'<') => {
                    chars.next();
                    let name: String = chars.by_ref().take_while(|&c| c != '>').collect();
                    out.push_str(&format!("${{{}}}", name));
                }
                Some('n') => out.push('\n'),
                Some('t') => out.push('\t'),
                Some('\\') => out.push('\\'),
                Some(other) => {
                    out.push('\\');
                    out.push(other);
                }
                None => out.push('\\'),
            },
            _ => out.push(c),
        }
    }
    out
}

fn arity_label(n: usize) -> &'static str {
    match n {
        1 => "1",
        2 => "2",
        _ => "3",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn line(tokens: &[&str]) -> CommandLine {
        tokens.iter().map(|s| s.to_string()).collect()
    }

    struct Roots {
        _temp: TempDir,
        inroot: PathBuf,
        outroot: PathBuf,
    }

    fn roots() -> Roots {
        let temp = TempDir::new().unwrap();
        let inroot = temp.path().join("installtree");
        let outroot = temp.path().join("outtree");
        fs::create_dir_all(&inroot).unwrap();
        fs::create_dir_all(&outroot).unwrap();
        Roots {
            _temp: temp,
            inroot,
            outroot,
        }
    }

    #[test]
    fn test_arity_errors() {
        let r = roots();
        let mut runner = TemplateRunner::new(&r.inroot, &r.outroot).with_fatal_errors(true);

        let err = runner.run(&[line(&["copy", "only-one"])]).unwrap_err();
        assert!(matches!(
            err,
            TemplateError::Arity {
                command: Command::Copy,
                got: 1,
                ..
            }
        ));

        let err = runner.run(&[line(&["treeinfo", "general", "arch"])]).unwrap_err();
        assert!(matches!(err, TemplateError::Arity { got: 2, .. }));
    }

    #[test]
    fn test_empty_line_is_error() {
        let r = roots();
        let mut runner = TemplateRunner::new(&r.inroot, &r.outroot).with_fatal_errors(true);
        assert!(matches!(
            runner.run(&[Vec::new()]),
            Err(TemplateError::EmptyLine)
        ));
    }

    #[test]
    fn test_install_absolute_source_is_rooted() {
        let r = roots();
        fs::create_dir_all(r.inroot.join("boot")).unwrap();
        fs::write(r.inroot.join("boot/memtest86+"), "memtest").unwrap();

        let mut runner = TemplateRunner::new(&r.inroot, &r.outroot);
        runner.install("/boot/memtest86+", "isolinux/memtest").unwrap();
        assert_eq!(
            fs::read_to_string(r.outroot.join("isolinux/memtest")).unwrap(),
            "memtest"
        );
    }

    #[test]
    fn test_hardlink_and_symlink() {
        let r = roots();
        fs::write(r.outroot.join("vmlinuz"), "k").unwrap();
        let mut runner = TemplateRunner::new(&r.inroot, &r.outroot);

        runner.hardlink("vmlinuz", "vmlinuz-hard").unwrap();
        assert_eq!(fs::read_to_string(r.outroot.join("vmlinuz-hard")).unwrap(), "k");

        runner.symlink("../vmlinuz", "vmlinuz-link").unwrap();
        assert_eq!(
            fs::read_link(r.outroot.join("vmlinuz-link")).unwrap(),
            PathBuf::from("../vmlinuz")
        );

        // dest already exists
        assert!(matches!(
            runner.symlink("x", "vmlinuz-link"),
            Err(TemplateError::Io { .. })
        ));
        assert!(runner.hardlink("vmlinuz", "vmlinuz-hard").is_err());
    }

    #[test]
    fn test_replace_missing_file_fails() {
        let r = roots();
        let mut runner = TemplateRunner::new(&r.inroot, &r.outroot);
        assert!(matches!(
            runner.replace("a", "b", &["missing.cfg".to_string()]),
            Err(TemplateError::Io { .. })
        ));
        assert!(matches!(
            runner.replace("(", "b", &["missing.cfg".to_string()]),
            Err(TemplateError::Regex { .. })
        ));
    }

    #[test]
    fn test_expand_replacement() {
        assert_eq!(expand_replacement("$root"), "$$root");
        assert_eq!(expand_replacement(r"\1-x"), "${1}-x");
        assert_eq!(expand_replacement(r"\12"), "${12}");
        assert_eq!(expand_replacement(r"\g<ver>.img"), "${ver}.img");
        assert_eq!(expand_replacement(r"a\\b\n"), "a\\b\n");
        assert_eq!(expand_replacement(r"\d"), r"\d");
    }

    #[test]
    fn test_replace_dollar_is_literal_and_backrefs_expand() {
        let r = roots();
        fs::write(r.outroot.join("grub.cfg"), "set root=@ROOT@\nlinux @K@\n").unwrap();
        let mut runner = TemplateRunner::new(&r.inroot, &r.outroot);
        let files = ["grub.cfg".to_string()];

        runner.replace("@ROOT@", "$root", &files).unwrap();
        runner.replace("@(K)@", r"\1-x", &files).unwrap();
        assert_eq!(
            fs::read_to_string(r.outroot.join("grub.cfg")).unwrap(),
            "set root=$root\nlinux K-x\n"
        );
    }

    #[test]
    fn test_wildcards_skip_dotfiles() {
        let r = roots();
        fs::write(r.inroot.join(".hidden"), "").unwrap();
        let mut runner = TemplateRunner::new(&r.inroot, &r.outroot);

        assert!(matches!(
            runner.install("*", "dest"),
            Err(TemplateError::Lookup(_))
        ));
        assert!(!r.outroot.join("dest").exists());
        assert!(!runner.exists("*"));
        assert!(runner.exists(".hidden"));
        assert!(runner.exists(".*"));
    }

    #[test]
    fn test_chmod_rejects_non_octal() {
        let r = roots();
        fs::write(r.outroot.join("f"), "").unwrap();
        let mut runner = TemplateRunner::new(&r.inroot, &r.outroot);
        assert!(matches!(
            runner.chmod("f", "rwx"),
            Err(TemplateError::InvalidMode(_))
        ));
        assert!(matches!(
            runner.chmod("f", "789"),
            Err(TemplateError::InvalidMode(_))
        ));
    }

    #[test]
    fn test_runcmd_chdir_and_exit_status() {
        let r = roots();
        let mut runner = TemplateRunner::new(&r.inroot, &r.outroot);
        let chdir = format!("chdir={}", r.outroot.display());

        runner
            .runcmd(&line(&[&chdir, "/bin/sh", "-c", "echo done > marker"]))
            .unwrap();
        assert!(r.outroot.join("marker").exists());

        assert!(matches!(
            runner.runcmd(&line(&["/bin/sh", "-c", "exit 3"])),
            Err(TemplateError::ExternalTool { .. })
        ));
        assert!(matches!(
            runner.runcmd(&line(&[&chdir])),
            Err(TemplateError::Arity { .. })
        ));
    }

    #[test]
    fn test_remove_tolerates_missing_targets() {
        let r = roots();
        fs::create_dir_all(r.outroot.join("usr/share/doc")).unwrap();
        let mut runner = TemplateRunner::new(&r.inroot, &r.outroot);
        runner
            .remove(&line(&["usr/share/doc", "not-there"]))
            .unwrap();
        assert!(!r.outroot.join("usr/share/doc").exists());
    }
}
