use std::path::{Component, Path, PathBuf};

/// Express `path` relative to `base`, inserting `..` components where the
/// two diverge. Both paths should be absolute; when they are not comparable
/// (e.g. different Windows prefixes), `path` is returned as-is, which is
/// still a valid — just less portable — config entry.
pub(crate) fn relative_from(path: &Path, base: &Path) -> PathBuf {
    let path_components: Vec<Component> = path.components().collect();
    let base_components: Vec<Component> = base.components().collect();

    if let (Some(Component::Prefix(path_prefix)), Some(Component::Prefix(base_prefix))) =
        (path_components.first(), base_components.first())
    {
        if path_prefix != base_prefix {
            return path.to_owned();
        }
    }

    let mut shared = 0;
    while shared < path_components.len()
        && shared < base_components.len()
        && path_components[shared] == base_components[shared]
    {
        shared += 1;
    }

    let mut relative = PathBuf::new();
    for _ in shared..base_components.len() {
        relative.push("..");
    }
    for component in &path_components[shared..] {
        relative.push(component);
    }

    if relative.as_os_str().is_empty() {
        relative.push(".");
    }
    relative
}

/// tsconfig paths use forward slashes on every platform.
pub(crate) fn to_config_string(path: &Path) -> String {
    let text = path.to_string_lossy();
    if std::path::MAIN_SEPARATOR == '/' {
        text.into_owned()
    } else {
        text.replace(std::path::MAIN_SEPARATOR, "/")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sibling_paths_walk_up_and_down() {
        let relative = relative_from(Path::new("/repo/src/x.ts"), Path::new("/repo/cache"));
        assert_eq!(relative, PathBuf::from("../src/x.ts"));
    }

    #[test]
    fn nested_path_descends_only() {
        let relative = relative_from(Path::new("/repo/src/x.ts"), Path::new("/repo"));
        assert_eq!(relative, PathBuf::from("src/x.ts"));
    }

    #[test]
    fn identical_paths_become_dot() {
        let relative = relative_from(Path::new("/repo"), Path::new("/repo"));
        assert_eq!(relative, PathBuf::from("."));
    }

    #[test]
    fn config_strings_use_forward_slashes() {
        let relative = relative_from(Path::new("/repo/src/x.ts"), Path::new("/repo/cache"));
        assert_eq!(to_config_string(&relative), "../src/x.ts");
    }
}
