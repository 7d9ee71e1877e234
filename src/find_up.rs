use std::path::{Path, PathBuf};

/// Walk upward from `starting_from` toward the filesystem root, returning the
/// first directory containing a file named `target_filename`.
pub(crate) fn find_file(starting_from: &Path, target_filename: &str) -> Option<PathBuf> {
    let starting_directory = if starting_from.is_dir() {
        starting_from
    } else {
        starting_from.parent().unwrap_or_else(|| Path::new("."))
    };

    let mut path: PathBuf = starting_directory.to_owned();

    loop {
        path.push(target_filename);
        let found_target = path.is_file();

        if found_target {
            // Pop the filename because we want to return the directory
            path.pop();
            break Some(path);
        }

        if !(path.pop() && path.pop()) {
            // remove file && remove parent
            break None;
        }
    }
}

/// Like [`find_file`], but for a directory entry (e.g. `node_modules`).
/// Returns the matching directory itself, not its parent.
pub(crate) fn find_directory(starting_from: &Path, target_dirname: &str) -> Option<PathBuf> {
    let starting_directory = if starting_from.is_dir() {
        starting_from
    } else {
        starting_from.parent().unwrap_or_else(|| Path::new("."))
    };

    let mut path: PathBuf = starting_directory.to_owned();

    loop {
        path.push(target_dirname);
        if path.is_dir() {
            break Some(path);
        }

        if !(path.pop() && path.pop()) {
            break None;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn finds_file_in_ancestor_directory() {
        let temp = tempfile::tempdir().unwrap();
        let nested = temp.path().join("a/b/c");
        std::fs::create_dir_all(&nested).unwrap();
        std::fs::write(temp.path().join("a/marker.json"), "{}").unwrap();

        let found = find_file(&nested, "marker.json").unwrap();
        assert_eq!(found, temp.path().join("a"));
    }

    #[test]
    fn missing_file_yields_none() {
        let temp = tempfile::tempdir().unwrap();
        assert_eq!(find_file(temp.path(), "no-such-file.json"), None);
    }

    #[test]
    fn finds_directory_in_ancestor() {
        let temp = tempfile::tempdir().unwrap();
        let nested = temp.path().join("pkg/src");
        std::fs::create_dir_all(&nested).unwrap();
        std::fs::create_dir_all(temp.path().join("node_modules")).unwrap();

        let found = find_directory(&nested, "node_modules").unwrap();
        assert_eq!(found, temp.path().join("node_modules"));
    }
}
