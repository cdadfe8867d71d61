//! Gatekeeper for every directory a caller hands us.
//!
//! A path is accepted only when it is non-empty, exists, is a directory, and
//! neither its lexical form nor its symlink-resolved form is the filesystem
//! root or lives under one of the system prefixes below.

use crate::error::{Result, SaveError};
use std::path::{Component, Path, PathBuf};

const DENIED_PREFIXES: &[&str] = &[
    "/etc", "/bin", "/sbin", "/usr/bin", "/usr/sbin", "/boot", "/dev", "/sys", "/proc",
];

#[must_use]
pub fn validate(path: &str) -> bool {
    check(path).is_ok()
}

/// Returns the canonical absolute form of `path` if it is safe to operate on.
pub fn check(path: &str) -> Result<PathBuf> {
    if path.trim().is_empty() {
        return Err(SaveError::InvalidPath("path is empty".to_string()));
    }

    let absolute = absolutize(Path::new(path))?;
    reject_denied(&absolute, path)?;

    let metadata = std::fs::metadata(&absolute)
        .map_err(|e| SaveError::InvalidPath(format!("{path}: {e}")))?;
    if !metadata.is_dir() {
        return Err(SaveError::InvalidPath(format!("{path}: not a directory")));
    }

    // Symlinks must not lead into a denied location either.
    let resolved = std::fs::canonicalize(&absolute)
        .map_err(|e| SaveError::InvalidPath(format!("{path}: {e}")))?;
    reject_denied(&resolved, path)?;

    Ok(absolute)
}

/// Makes `path` absolute against the working directory and folds `.`/`..`
/// without touching the filesystem.
pub fn absolutize(path: &Path) -> Result<PathBuf> {
    let joined = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()
            .map_err(|e| SaveError::io("resolve working directory", e))?
            .join(path)
    };
    Ok(normalize_lexically(&joined))
}

#[must_use]
pub fn normalize_lexically(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::Prefix(p) => out.push(p.as_os_str()),
            Component::RootDir => out.push(Component::RootDir.as_os_str()),
            Component::CurDir => {}
            Component::ParentDir => match out.components().next_back() {
                Some(Component::Normal(_)) => {
                    out.pop();
                }
                // `..` at the root stays at the root.
                Some(Component::RootDir | Component::Prefix(_)) => {}
                _ => out.push(".."),
            },
            Component::Normal(part) => out.push(part),
        }
    }
    out
}

fn reject_denied(candidate: &Path, original: &str) -> Result<()> {
    if candidate.parent().is_none() {
        return Err(SaveError::InvalidPath(format!(
            "{original}: filesystem root is not allowed"
        )));
    }
    if let Some(prefix) = DENIED_PREFIXES
        .iter()
        .find(|prefix| candidate.starts_with(prefix))
    {
        return Err(SaveError::InvalidPath(format!(
            "{original}: system location {prefix} is not allowed"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_rejects_empty_and_root() {
        assert!(!validate(""));
        assert!(!validate("   "));
        assert!(!validate("/"));
        assert!(!validate("/.."));
    }

    #[test]
    fn test_rejects_system_prefixes() {
        assert!(!validate("/etc"));
        assert!(!validate("/proc/self"));
        assert!(!validate("/usr/bin"));
        assert!(matches!(check("/etc"), Err(SaveError::InvalidPath(_))));
    }

    #[test]
    fn test_rejects_traversal_into_denied_prefix() {
        let dir = tempfile::tempdir().unwrap();
        let sneaky = format!("{}/../../../../../../../etc", dir.path().display());
        assert!(!validate(&sneaky));
        assert!(!validate("/usr/bin/../../etc"));
    }

    #[test]
    fn test_accepts_ordinary_directory() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().to_string_lossy().to_string();
        assert!(validate(&path));

        let with_dots = format!("{}/./sub/..", path);
        fs::create_dir(dir.path().join("sub")).unwrap();
        assert_eq!(check(&with_dots).unwrap(), dir.path());
    }

    #[test]
    fn test_rejects_missing_path_and_plain_file() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nope");
        assert!(!validate(&missing.to_string_lossy()));

        let file = dir.path().join("file.txt");
        fs::write(&file, "x").unwrap();
        assert!(!validate(&file.to_string_lossy()));
    }

    #[cfg(unix)]
    #[test]
    fn test_rejects_symlink_into_denied_location() {
        let dir = tempfile::tempdir().unwrap();
        let link = dir.path().join("cfg");
        std::os::unix::fs::symlink("/etc", &link).unwrap();
        assert!(!validate(&link.to_string_lossy()));
    }

    #[test]
    fn test_normalize_lexically() {
        assert_eq!(
            normalize_lexically(Path::new("/a/./b/../c")),
            PathBuf::from("/a/c")
        );
        assert_eq!(normalize_lexically(Path::new("/../..")), PathBuf::from("/"));
        assert_eq!(
            normalize_lexically(Path::new("./../saves")),
            PathBuf::from("../saves")
        );
    }
}
