use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use camino::{Utf8Path, Utf8PathBuf};

use crate::error::DeliveryError;

/// Expands `pattern` below `dir`, with `dir` itself matched literally.
/// Unreadable entries are skipped; results come back in lexical order.
pub fn glob_in(dir: &Utf8Path, pattern: &str) -> Result<Vec<Utf8PathBuf>, DeliveryError> {
    let full = format!("{}/{}", glob::Pattern::escape(dir.as_str()), pattern);
    let paths = glob::glob(&full).map_err(|err| DeliveryError::Filesystem(err.to_string()))?;
    let mut matches = paths
        .filter_map(Result::ok)
        .map(utf8_path)
        .collect::<Result<Vec<_>, _>>()?;
    matches.sort();
    Ok(matches)
}

pub fn utf8_path(path: PathBuf) -> Result<Utf8PathBuf, DeliveryError> {
    Utf8PathBuf::from_path_buf(path)
        .map_err(|path| DeliveryError::NonUtf8Path(path.display().to_string()))
}

/// True for anything at `path`, including dangling symlinks.
pub fn path_exists(path: &Utf8Path) -> bool {
    fs::symlink_metadata(path.as_std_path()).is_ok()
}

pub fn copy_file(source: &Utf8Path, dest: &Utf8Path) -> Result<(), DeliveryError> {
    ensure_parent(dest)?;
    fs::copy(source.as_std_path(), dest.as_std_path())
        .map_err(|err| io_error("copy", source, err))?;
    Ok(())
}

pub fn copy_tree(source: &Utf8Path, dest: &Utf8Path) -> Result<(), DeliveryError> {
    fs::create_dir_all(dest.as_std_path()).map_err(|err| io_error("create", dest, err))?;
    for entry in walk_dir(source.as_std_path())? {
        let relative = entry
            .strip_prefix(source.as_std_path())
            .map_err(|err| DeliveryError::Filesystem(err.to_string()))?;
        let target = dest.as_std_path().join(relative);
        if entry.is_dir() {
            fs::create_dir_all(&target).map_err(|err| DeliveryError::Filesystem(err.to_string()))?;
        } else {
            if let Some(parent) = target.parent() {
                fs::create_dir_all(parent)
                    .map_err(|err| DeliveryError::Filesystem(err.to_string()))?;
            }
            fs::copy(&entry, &target).map_err(|err| DeliveryError::Filesystem(err.to_string()))?;
        }
    }
    Ok(())
}

/// Renames `source` onto `dest`, copying and removing the source when the
/// two live on different filesystems.
pub fn move_path(source: &Utf8Path, dest: &Utf8Path) -> Result<(), DeliveryError> {
    ensure_parent(dest)?;
    match fs::rename(source.as_std_path(), dest.as_std_path()) {
        Ok(()) => Ok(()),
        Err(err) if err.kind() == io::ErrorKind::CrossesDevices => {
            if source.is_dir() {
                copy_tree(source, dest)?;
                fs::remove_dir_all(source.as_std_path())
                    .map_err(|err| io_error("remove", source, err))
            } else {
                copy_file(source, dest)?;
                fs::remove_file(source.as_std_path()).map_err(|err| io_error("remove", source, err))
            }
        }
        Err(err) => Err(io_error("move", source, err)),
    }
}

#[cfg(unix)]
pub fn symlink(original: &Utf8Path, link: &Utf8Path) -> Result<(), DeliveryError> {
    std::os::unix::fs::symlink(original.as_std_path(), link.as_std_path())
        .map_err(|err| io_error("link", link, err))
}

#[cfg(not(unix))]
pub fn symlink(_original: &Utf8Path, link: &Utf8Path) -> Result<(), DeliveryError> {
    Err(DeliveryError::Filesystem(format!(
        "symlinks are not supported on this platform: {link}"
    )))
}

pub fn create_dir(path: &Utf8Path) -> Result<(), DeliveryError> {
    fs::create_dir_all(path.as_std_path()).map_err(|err| io_error("create", path, err))
}

fn ensure_parent(path: &Utf8Path) -> Result<(), DeliveryError> {
    if let Some(parent) = path.parent() {
        if !parent.as_str().is_empty() {
            create_dir(parent)?;
        }
    }
    Ok(())
}

fn io_error(action: &str, path: &Utf8Path, err: io::Error) -> DeliveryError {
    DeliveryError::Filesystem(format!("{action} {path}: {err}"))
}

fn walk_dir(root: &Path) -> Result<Vec<PathBuf>, DeliveryError> {
    let mut items = Vec::new();
    let mut stack = vec![root.to_path_buf()];
    while let Some(path) = stack.pop() {
        let entries = fs::read_dir(&path).map_err(|err| DeliveryError::Filesystem(err.to_string()))?;
        for entry in entries {
            let entry = entry.map_err(|err| DeliveryError::Filesystem(err.to_string()))?;
            let path = entry.path();
            if path.is_dir() {
                stack.push(path.clone());
            }
            items.push(path);
        }
    }
    Ok(items)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_root() -> (tempfile::TempDir, Utf8PathBuf) {
        let temp = tempfile::tempdir().unwrap();
        let root = Utf8PathBuf::from_path_buf(temp.path().to_path_buf()).unwrap();
        (temp, root)
    }

    #[test]
    fn glob_in_escapes_directory() {
        let (_temp, root) = temp_root();
        let dir = root.join("run[1]");
        fs::create_dir_all(dir.join("b")).unwrap();
        fs::create_dir_all(dir.join("a")).unwrap();
        let found = glob_in(&dir, "*").unwrap();
        assert_eq!(found, vec![dir.join("a"), dir.join("b")]);
    }

    #[test]
    fn copy_tree_nested() {
        let (_temp, root) = temp_root();
        let source = root.join("src");
        fs::create_dir_all(source.join("inner")).unwrap();
        fs::write(source.join("inner/report.html"), b"qc").unwrap();
        let dest = root.join("out/fastqc/src");
        copy_tree(&source, &dest).unwrap();
        assert_eq!(fs::read(dest.join("inner/report.html")).unwrap(), b"qc");
    }

    #[cfg(unix)]
    #[test]
    fn path_exists_sees_dangling_link() {
        let (_temp, root) = temp_root();
        let link = root.join("alias");
        symlink(&root.join("missing"), &link).unwrap();
        assert!(!link.exists());
        assert!(path_exists(&link));
    }
}
