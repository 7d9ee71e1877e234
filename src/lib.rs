//! Type-check an arbitrary subset of files in a TypeScript project without
//! losing the project's own compiler semantics. The return value is one
//! synthesized `tsconfig.json` per detected sub-project, ready to hand to
//! `tsc --project`, plus the exact file list each check covers.
//!
//! The hard problem here is not invoking the compiler — it is
//! reconstructing, for an arbitrary file subset spanning possibly several
//! sub-projects, a configuration the compiler will treat identically to
//! checking those files as part of the whole project. That breaks down into
//! three steps:
//!
//! 1. **Locate**: find each file's nearest `tsconfig.json` and flatten its
//!    `extends` chain ([`config`]), partitioning the input files into one
//!    group per origin config ([`group`]).
//! 2. **Expand**: follow each group's import graph and ambient-declaration
//!    conventions, bounded by depth and file-count limits ([`discover`]).
//!    This is a best-effort static approximation of the compiler's module
//!    resolution. From the [tsconfig exclude] documentation:
//!
//!    > Important: `exclude` *only* changes which files are included as a
//!    > result of the `include` setting. A file specified by exclude can
//!    > still become part of your codebase due to an import statement in
//!    > your code, a types inclusion, a `/// <reference` directive, or
//!    > being specified in the `files` list.
//!
//!    which is why a scoped check must chase imports rather than merely
//!    intersect the input set with include globs. The TypeScript compiler
//!    is a project where the implementation is the spec; anything this scan
//!    misses or over-includes is caught by the compiler itself, which
//!    remains the source of truth for resolution.
//! 3. **Synthesize**: write a derived config that `extends` the origin,
//!    pins `files` to the expanded set, and forces check-only semantics
//!    ([`synthesize`]), optionally cached by content fingerprint for
//!    repeated invocations such as git hooks ([`cache`]).
//!
//! Groups are independent by construction, so they are expanded and
//! synthesized on parallel workers.
//!
//! [tsconfig exclude]: https://www.typescriptlang.org/tsconfig#exclude

#![forbid(unsafe_code)]
#![deny(missing_debug_implementations)]

pub mod cache;
pub mod config;
pub mod discover;
pub mod error;
pub mod find_up;
pub mod group;
pub mod io;
pub mod path;
pub mod scan;
pub mod synthesize;

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use log::debug;
use rayon::prelude::*;

pub use crate::cache::clear_cache;
pub use crate::config::{ConfigResolver, EffectiveConfig};
pub use crate::discover::LimitNotice;
pub use crate::error::Error;
pub use crate::group::FileGroup;
pub use crate::synthesize::SynthesizedConfig;

/// Cooperative cancellation flag, checked between discovery frontier visits
/// and before artifact writes. Clones share one flag.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.flag.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::Relaxed)
    }
}

/// Option bundle consumed from the invoking layer.
#[derive(Debug, Clone)]
pub struct ScopeOptions {
    /// Explicit origin config, bypassing the nearest-config walk.
    pub project: Option<PathBuf>,
    /// Import hops traversed beyond the input files.
    pub max_depth: usize,
    /// Soft cap on the expanded file set, inputs included.
    pub max_files: usize,
    /// Follow the import graph at all. Ambient declaration collection runs
    /// either way.
    pub recursive: bool,
    /// Retain synthesized artifacts keyed by content fingerprint.
    pub cache: bool,
    /// Force `skipLibCheck` in the synthesized config.
    pub skip_lib_check: bool,
    /// Extra include patterns for the synthesized config, already split by
    /// the invoking layer.
    pub extra_includes: Vec<String>,
    /// Override the artifact directory. Mainly for tests; defaults to
    /// `<node_modules>/.cache/tsconfig-scope/`.
    pub cache_dir: Option<PathBuf>,
    pub cancel: CancelToken,
}

impl Default for ScopeOptions {
    fn default() -> Self {
        Self {
            project: None,
            max_depth: 20,
            max_files: 100,
            recursive: true,
            cache: false,
            skip_lib_check: false,
            extra_includes: Vec::new(),
            cache_dir: None,
            cancel: CancelToken::new(),
        }
    }
}

/// One sub-project's scoped check: the synthesized config to pass as
/// `--project` and the files that check covers.
#[derive(Debug)]
pub struct ScopedProject {
    group: FileGroup,
    synthesized: SynthesizedConfig,
    notice: Option<LimitNotice>,
}

impl ScopedProject {
    /// Path for the compiler-execution collaborator's `--project` argument.
    pub fn config_path(&self) -> &std::path::Path {
        self.synthesized.path()
    }

    /// Absolute path of the origin config this check derives from.
    pub fn origin_path(&self) -> &std::path::Path {
        self.group.config().path()
    }

    /// The exact files the compiler run will rely on.
    pub fn files(&self) -> &[PathBuf] {
        self.group.check_files()
    }

    pub fn synthesized(&self) -> &SynthesizedConfig {
        &self.synthesized
    }

    /// Present when a discovery cap cut the expansion short.
    pub fn limit_notice(&self) -> Option<&LimitNotice> {
        self.notice.as_ref()
    }
}

/// Resolve, group, expand and synthesize: the whole pipeline.
///
/// `files` should already be concrete paths (glob resolution is the
/// invoking layer's job). Returns one [`ScopedProject`] per origin config,
/// in order of first appearance in `files`.
pub fn scoped_projects(
    files: &[PathBuf],
    options: &ScopeOptions,
) -> Result<Vec<ScopedProject>, Error> {
    let resolver = ConfigResolver::new();
    let groups = match &options.project {
        Some(project) => group::group_files_with_project(&resolver, files, project)?,
        None => group::group_files(&resolver, files)?,
    };
    debug!("checking {} group(s)", groups.len());

    // Groups share no mutable state; expand and synthesize them on
    // independent workers
    groups
        .into_par_iter()
        .map(|mut group| {
            let notice = discover::expand(&mut group, options)?;
            let synthesized = synthesize::synthesize(&group, options)?;
            Ok(ScopedProject {
                group,
                synthesized,
                notice,
            })
        })
        .collect()
}
