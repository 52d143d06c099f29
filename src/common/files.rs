//! File primitives used by template commands.
//!
//! These return plain `io::Result` so callers can attach the path that
//! failed to whatever error type they use.

use regex::bytes::Regex;
use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Join `path` under `root`, treating an absolute `path` as root-relative.
///
/// `join_root("/tree", "/boot")` is `/tree/boot`, not `/boot`.
pub fn join_root(root: &Path, path: &str) -> PathBuf {
    root.join(path.trim_start_matches('/'))
}

/// Copy a file or directory tree.
///
/// If `dest` is an existing directory, `src` is copied into it under its own
/// name. Missing parent directories of the destination are created.
pub fn copy_path(src: &Path, dest: &Path) -> io::Result<()> {
    let target = match (dest.is_dir(), src.file_name()) {
        (true, Some(name)) => dest.join(name),
        _ => dest.to_path_buf(),
    };

    let meta = fs::symlink_metadata(src)?;
    if meta.is_dir() {
        return copy_tree(src, &target);
    }

    if let Some(parent) = target.parent() {
        fs::create_dir_all(parent)?;
    }
    if meta.file_type().is_symlink() {
        copy_symlink(src, &target)
    } else {
        fs::copy(src, &target).map(|_| ())
    }
}

fn copy_tree(src: &Path, dest: &Path) -> io::Result<()> {
    for entry in WalkDir::new(src) {
        let entry = entry?;
        let rel = entry
            .path()
            .strip_prefix(src)
            .map_err(|e| io::Error::new(io::ErrorKind::Other, e))?;
        let out = dest.join(rel);
        let file_type = entry.file_type();

        if file_type.is_dir() {
            fs::create_dir_all(&out)?;
        } else if file_type.is_symlink() {
            copy_symlink(entry.path(), &out)?;
        } else {
            fs::copy(entry.path(), &out)?;
        }
    }
    Ok(())
}

fn copy_symlink(src: &Path, dest: &Path) -> io::Result<()> {
    let target = fs::read_link(src)?;
    if dest.is_symlink() || dest.exists() {
        fs::remove_file(dest)?;
    }
    std::os::unix::fs::symlink(target, dest)
}

/// Apply a regex substitution to every line of `path`, in place.
///
/// `replacement` uses the regex crate's `$name` syntax. The file is treated
/// as bytes, so configs that aren't valid UTF-8 are edited as-is.
pub fn replace_in_file(pattern: &Regex, replacement: &str, path: &Path) -> io::Result<()> {
    let content = fs::read(path)?;
    let mut replaced = Vec::with_capacity(content.len());
    for line in content.split_inclusive(|&b| b == b'\n') {
        replaced.extend_from_slice(&pattern.replace_all(line, replacement.as_bytes()));
    }
    fs::write(path, replaced)
}

/// Append `text` and a newline to `path`, creating it if needed.
pub fn append_line(path: &Path, text: &str) -> io::Result<()> {
    let mut file = OpenOptions::new().create(true).append(true).open(path)?;
    writeln!(file, "{}", text)
}

/// Remove a file, symlink or directory tree. A missing path is not an error.
pub fn remove_path(path: &Path) -> io::Result<()> {
    let meta = match fs::symlink_metadata(path) {
        Ok(meta) => meta,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(()),
        Err(e) => return Err(e),
    };
    if meta.is_dir() {
        fs::remove_dir_all(path)
    } else {
        fs::remove_file(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_join_root_strips_leading_slash() {
        let root = Path::new("/tree");
        assert_eq!(join_root(root, "/boot/x"), PathBuf::from("/tree/boot/x"));
        assert_eq!(join_root(root, "boot/x"), PathBuf::from("/tree/boot/x"));
    }

    #[test]
    fn test_copy_into_existing_dir() {
        let temp = TempDir::new().unwrap();
        let src = temp.path().join("a.cfg");
        let dest = temp.path().join("isolinux");
        fs::write(&src, "timeout 600\n").unwrap();
        fs::create_dir(&dest).unwrap();

        copy_path(&src, &dest).unwrap();
        assert_eq!(
            fs::read_to_string(dest.join("a.cfg")).unwrap(),
            "timeout 600\n"
        );
    }

    #[test]
    fn test_copy_creates_parents() {
        let temp = TempDir::new().unwrap();
        let src = temp.path().join("vmlinuz");
        fs::write(&src, "kernel").unwrap();

        let dest = temp.path().join("images/pxeboot/vmlinuz");
        copy_path(&src, &dest).unwrap();
        assert_eq!(fs::read_to_string(dest).unwrap(), "kernel");
    }

    #[test]
    fn test_copy_tree_with_symlink() {
        let temp = TempDir::new().unwrap();
        let src = temp.path().join("src");
        fs::create_dir_all(src.join("sub")).unwrap();
        fs::write(src.join("sub/file"), "x").unwrap();
        std::os::unix::fs::symlink("sub/file", src.join("link")).unwrap();

        let dest = temp.path().join("dest");
        copy_path(&src, &dest).unwrap();
        assert_eq!(fs::read_to_string(dest.join("sub/file")).unwrap(), "x");
        assert_eq!(
            fs::read_link(dest.join("link")).unwrap(),
            PathBuf::from("sub/file")
        );
    }

    #[test]
    fn test_copy_missing_source_fails() {
        let temp = TempDir::new().unwrap();
        let err = copy_path(&temp.path().join("nope"), &temp.path().join("x")).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::NotFound);
    }

    #[test]
    fn test_replace_in_file() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("isolinux.cfg");
        fs::write(&path, "label @PRODUCT@\nmenu @PRODUCT@ @VERSION@\n").unwrap();

        let re = Regex::new("@PRODUCT@").unwrap();
        replace_in_file(&re, "Fedora", &path).unwrap();
        assert_eq!(
            fs::read_to_string(&path).unwrap(),
            "label Fedora\nmenu Fedora @VERSION@\n"
        );
    }

    #[test]
    fn test_replace_in_non_utf8_file() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("splash.cfg");
        fs::write(&path, b"title \xff@PRODUCT@\n").unwrap();

        let re = Regex::new("@PRODUCT@").unwrap();
        replace_in_file(&re, "Fedora", &path).unwrap();
        assert_eq!(fs::read(&path).unwrap(), b"title \xffFedora\n");
    }

    #[test]
    fn test_append_line_creates_file() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join(".discinfo");
        append_line(&path, "first").unwrap();
        append_line(&path, "second").unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "first\nsecond\n");
    }

    #[test]
    fn test_remove_path_tolerates_missing() {
        let temp = TempDir::new().unwrap();
        remove_path(&temp.path().join("missing")).unwrap();

        let dir = temp.path().join("dir");
        fs::create_dir_all(dir.join("nested")).unwrap();
        fs::write(dir.join("nested/f"), "").unwrap();
        remove_path(&dir).unwrap();
        assert!(!dir.exists());
    }
}
