use std::path::{MAIN_SEPARATOR, Path};

/// Public handle for a save folder: its path relative to the root with the
/// separators flattened to underscores. Callers treat it as opaque.
#[must_use]
pub fn assign_id(root: &Path, save_path: &Path) -> String {
    let relative = save_path.strip_prefix(root).unwrap_or(save_path);
    relative
        .to_string_lossy()
        .trim_start_matches(MAIN_SEPARATOR)
        .replace(MAIN_SEPARATOR, "_")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_direct_child_keeps_folder_name() {
        let id = assign_id(Path::new("/saves"), Path::new("/saves/Sunny_351920664"));
        assert_eq!(id, "Sunny_351920664");
    }

    #[test]
    fn test_nested_path_flattens_separators() {
        let id = assign_id(Path::new("/saves"), Path::new("/saves/group/Farm"));
        assert_eq!(id, "group_Farm");
    }

    #[test]
    fn test_same_layout_same_id() {
        let a = assign_id(Path::new("/a/root"), Path::new("/a/root/Farm"));
        let b = assign_id(Path::new("/a/root"), Path::new("/a/root/Farm"));
        assert_eq!(a, b);
    }

    #[test]
    fn test_path_outside_root_is_still_flattened() {
        let id = assign_id(Path::new("/saves"), Path::new("/other/Farm"));
        assert_eq!(id, "other_Farm");
    }
}
