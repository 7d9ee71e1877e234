//! Partition requested files by their nearest project configuration.
//!
//! Files sharing one origin config form one [`FileGroup`]; a monorepo input
//! set spanning several sub-projects therefore yields several groups, each
//! checked against its own configuration. Nearest-config-wins: a file in a
//! nested sub-project with its own tsconfig never joins the parent's group.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use log::debug;

use crate::config::{canonicalize_or_owned, ConfigResolver, EffectiveConfig};
use crate::error::Error;

/// A set of input files sharing one [`EffectiveConfig`], plus the dependency
/// set discovery later populates.
#[derive(Debug)]
pub struct FileGroup {
    config: Arc<EffectiveConfig>,
    inputs: Vec<PathBuf>,
    expanded: Vec<PathBuf>,
}

impl FileGroup {
    pub(crate) fn new(config: Arc<EffectiveConfig>) -> Self {
        Self {
            config,
            inputs: Vec::new(),
            expanded: Vec::new(),
        }
    }

    pub fn config(&self) -> &Arc<EffectiveConfig> {
        &self.config
    }

    /// Input files in first-seen order.
    pub fn inputs(&self) -> &[PathBuf] {
        &self.inputs
    }

    /// Inputs plus discovered dependencies. Empty until discovery runs.
    pub fn expanded(&self) -> &[PathBuf] {
        &self.expanded
    }

    pub(crate) fn push_input(&mut self, file: PathBuf) {
        if !self.inputs.contains(&file) {
            self.inputs.push(file);
        }
    }

    pub(crate) fn set_expanded(&mut self, expanded: Vec<PathBuf>) {
        self.expanded = expanded;
    }

    /// The file list a compiler invocation should rely on: the expanded set
    /// when discovery ran, otherwise the raw inputs.
    pub fn check_files(&self) -> &[PathBuf] {
        if self.expanded.is_empty() {
            &self.inputs
        } else {
            &self.expanded
        }
    }
}

/// Partition `files` into groups keyed by origin-config path.
///
/// Groups appear in order of first occurrence and preserve input order
/// within each group. A locator failure for any file propagates; silently
/// dropping inputs would produce a check that lies by omission.
pub fn group_files(
    resolver: &ConfigResolver,
    files: &[PathBuf],
) -> Result<Vec<FileGroup>, Error> {
    let mut groups: Vec<FileGroup> = Vec::new();
    let mut index_by_origin: HashMap<PathBuf, usize> = HashMap::new();

    for file in files {
        let file = canonicalize_or_owned(file);
        let config = resolver.resolve(&file)?;
        let origin = config.path().to_owned();

        let index = *index_by_origin.entry(origin).or_insert_with(|| {
            groups.push(FileGroup::new(Arc::clone(&config)));
            groups.len() - 1
        });
        groups[index].push_input(file);
    }

    debug!(
        "partitioned {} file(s) into {} group(s)",
        files.len(),
        groups.len()
    );
    Ok(groups)
}

/// Group every file under one explicitly-chosen origin config, bypassing
/// the nearest-config walk.
pub fn group_files_with_project(
    resolver: &ConfigResolver,
    files: &[PathBuf],
    project: &Path,
) -> Result<Vec<FileGroup>, Error> {
    let config = resolver.resolve_origin(project)?;
    let mut group = FileGroup::new(config);
    for file in files {
        group.push_input(canonicalize_or_owned(file));
    }
    Ok(vec![group])
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_file(dir: &Path, name: &str, contents: &str) -> PathBuf {
        let path = dir.join(name);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).expect("failed to create test directory");
        }
        std::fs::write(&path, contents).expect("failed to write test file");
        path
    }

    #[test]
    fn files_in_one_project_form_one_group() {
        let temp = tempfile::tempdir().unwrap();
        write_file(temp.path(), "tsconfig.json", "{}");
        let x = write_file(temp.path(), "src/x.ts", "export const x = 1;\n");
        let y = write_file(temp.path(), "src/y.ts", "export const y = 2;\n");

        let resolver = ConfigResolver::new();
        let groups = group_files(&resolver, &[x, y]).unwrap();
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].inputs().len(), 2);
    }

    #[test]
    fn nested_project_files_group_separately() {
        let temp = tempfile::tempdir().unwrap();
        write_file(temp.path(), "tsconfig.json", "{}");
        write_file(temp.path(), "packages/b/tsconfig.json", "{}");
        let a = write_file(temp.path(), "src/a.ts", "export {};\n");
        let b = write_file(temp.path(), "packages/b/src/b.ts", "export {};\n");

        let resolver = ConfigResolver::new();
        let groups = group_files(&resolver, &[a.clone(), b.clone()]).unwrap();
        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].inputs(), &[canonicalize_or_owned(&a)][..]);
        assert_eq!(groups[1].inputs(), &[canonicalize_or_owned(&b)][..]);
    }

    #[test]
    fn unresolvable_file_propagates_the_locator_error() {
        let temp = tempfile::tempdir().unwrap();
        let orphan = write_file(temp.path(), "orphan.ts", "export {};\n");

        let resolver = ConfigResolver::new();
        match group_files(&resolver, &[orphan]) {
            Err(Error::ConfigNotFound { .. }) => {}
            other => panic!("expected ConfigNotFound, got {:?}", other),
        }
    }

    #[test]
    fn duplicate_inputs_collapse_within_a_group() {
        let temp = tempfile::tempdir().unwrap();
        write_file(temp.path(), "tsconfig.json", "{}");
        let x = write_file(temp.path(), "src/x.ts", "export {};\n");

        let resolver = ConfigResolver::new();
        let groups = group_files(&resolver, &[x.clone(), x]).unwrap();
        assert_eq!(groups[0].inputs().len(), 1);
    }
}
