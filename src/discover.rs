//! Bounded discovery of the files a type-check of a group actually needs.
//!
//! Starting from a group's input files, a breadth-first traversal follows
//! statically-scanned import specifiers (see [`crate::scan`]) and resolves
//! them with the conventions the compiler itself uses: extension probing,
//! index-file fallback, declaration-file and generated-type-file companions,
//! and `compilerOptions.paths` mappings. A second, reachability-independent
//! pass collects ambient declaration and generated-type files matching the
//! effective `include` globs, because those shape type-checking globally
//! without being imported.
//!
//! LIMITATION: this approximates the compiler's resolver with a textual
//! scan. Unresolved specifiers (external packages, computed imports,
//! `exports`-map indirection) are skipped silently; the compiler remains the
//! source of truth for real resolution errors. The traversal is purely
//! additive and deterministic for a given filesystem state.

use std::collections::{HashSet, VecDeque};
use std::fmt::Display;
use std::path::{Path, PathBuf};

use globwalk::{FileType, GlobWalkerBuilder};
use log::{debug, trace};

use crate::config::{canonicalize_or_owned, EffectiveConfig};
use crate::error::Error;
use crate::group::FileGroup;
use crate::scan::scan_specifiers;
use crate::ScopeOptions;

/// Extensions probed for an extensionless specifier, in resolution order.
const TS_EXTENSIONS: &[&str] = &[".ts", ".tsx", ".d.ts"];
const JS_EXTENSIONS: &[&str] = &[".js", ".jsx"];
const DECLARATION_EXTENSIONS: &[&str] = &[".d.ts", ".d.mts", ".d.cts"];
const GENERATED_EXTENSION: &str = ".gen.ts";

/// Extensions whose files are worth scanning for further specifiers.
const SCANNABLE_EXTENSIONS: &[&str] = &[
    ".ts", ".tsx", ".mts", ".cts", ".d.ts", ".d.mts", ".d.cts", ".js", ".jsx", ".mjs", ".cjs",
];

/// Informational record that a discovery cap halted traversal early.
/// Deliberately not an error: the partial set is still a valid scope, the
/// caller just deserves to know the limit was the reason it stopped.
#[derive(Debug, Clone)]
pub struct LimitNotice {
    pub files_discovered: usize,
    pub max_files: usize,
    pub depth_reached: usize,
}

impl Display for LimitNotice {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "dependency discovery halted at {} file(s) (maxFiles {}, depth {} reached); \
             raise the limit to widen the scope",
            self.files_discovered, self.max_files, self.depth_reached
        )
    }
}

/// Transient traversal state for one group.
#[derive(Debug)]
struct DiscoveryState {
    frontier: VecDeque<(PathBuf, usize)>,
    visited: HashSet<PathBuf>,
    expanded: Vec<PathBuf>,
    depth_reached: usize,
    halted: bool,
}

impl DiscoveryState {
    fn seed(inputs: &[PathBuf]) -> Self {
        let mut state = Self {
            frontier: VecDeque::new(),
            visited: HashSet::new(),
            expanded: Vec::new(),
            depth_reached: 0,
            halted: false,
        };
        for input in inputs {
            let input = canonicalize_or_owned(input);
            if state.visited.insert(input.clone()) {
                state.expanded.push(input.clone());
                state.frontier.push_back((input, 0));
            }
        }
        state
    }

    /// Record a newly resolved file, enqueueing it for traversal unless the
    /// depth cap says otherwise. Returns false when the file cap is reached,
    /// which halts the whole traversal (soft cap, not an error).
    fn admit(&mut self, path: PathBuf, depth: usize, enqueue: bool, max_files: usize) -> bool {
        if self.visited.contains(&path) {
            return true;
        }
        if self.expanded.len() >= max_files {
            self.halted = true;
            return false;
        }
        self.visited.insert(path.clone());
        self.expanded.push(path.clone());
        self.depth_reached = self.depth_reached.max(depth);
        if enqueue {
            self.frontier.push_back((path, depth));
        }
        true
    }
}

/// Expand `group`'s file set in place. Returns a [`LimitNotice`] when the
/// `max_files` cap cut traversal short.
pub fn expand(group: &mut FileGroup, options: &ScopeOptions) -> Result<Option<LimitNotice>, Error> {
    let config = group.config().clone();
    let mut state = DiscoveryState::seed(group.inputs());

    if options.recursive {
        traverse(&mut state, &config, options)?;
    }
    if !state.halted {
        ambient_scan(&mut state, &config, options)?;
    }

    debug!(
        "discovery for {:?}: {} input(s) expanded to {} file(s), depth {}",
        config.path(),
        group.inputs().len(),
        state.expanded.len(),
        state.depth_reached,
    );

    let notice = state.halted.then(|| LimitNotice {
        files_discovered: state.expanded.len(),
        max_files: options.max_files,
        depth_reached: state.depth_reached,
    });
    group.set_expanded(state.expanded);
    Ok(notice)
}

fn traverse(
    state: &mut DiscoveryState,
    config: &EffectiveConfig,
    options: &ScopeOptions,
) -> Result<(), Error> {
    'frontier: while let Some((file, depth)) = state.frontier.pop_front() {
        if options.cancel.is_cancelled() {
            return Err(Error::Cancelled);
        }
        if !is_scannable(&file) {
            continue;
        }

        let source = match std::fs::read_to_string(&file) {
            Ok(source) => source,
            // A vanished or unreadable-as-text frontier file is the
            // compiler's problem to report, not ours
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => continue,
            Err(err) if err.kind() == std::io::ErrorKind::InvalidData => continue,
            Err(source) => {
                return Err(Error::DiscoveryRead { source, path: file });
            }
        };

        let containing_dir = file.parent().unwrap_or_else(|| Path::new("."));
        // Past the depth cap a child is still resolved and included, just
        // never traversed further
        let enqueue_children = depth + 1 <= options.max_depth;
        for specifier in scan_specifiers(&source) {
            trace!("specifier {:?} in {:?}", specifier, file);
            for resolved in resolve_specifier(&specifier, containing_dir, config) {
                let resolved = canonicalize_or_owned(&resolved);
                if !state.admit(resolved, depth + 1, enqueue_children, options.max_files) {
                    break 'frontier;
                }
            }
        }
    }
    Ok(())
}

/// Resolve one specifier to on-disk candidate files: the primary resolution
/// plus any declaration/generated companions sitting next to it.
fn resolve_specifier(
    specifier: &str,
    containing_dir: &Path,
    config: &EffectiveConfig,
) -> Vec<PathBuf> {
    let is_relative = specifier.starts_with("./") || specifier.starts_with("../");

    let primary = if is_relative {
        try_file_or_directory(&containing_dir.join(specifier), config)
    } else if Path::new(specifier).is_absolute() {
        try_file_or_directory(Path::new(specifier), config)
    } else {
        resolve_path_mapped(specifier, config)
    };

    let Some(primary) = primary else {
        // External package or unresolvable specifier: skip silently
        return Vec::new();
    };

    let mut resolved = vec![primary.clone()];
    for companion in companions(&primary) {
        if companion.is_file() {
            resolved.push(companion);
        }
    }
    resolved
}

/// Bare specifiers route through `compilerOptions.paths`, most-specific
/// mapping first; targets are relative to `baseUrl` (or the config's own
/// directory when `baseUrl` is absent, matching tsc 4.1+).
fn resolve_path_mapped(specifier: &str, config: &EffectiveConfig) -> Option<PathBuf> {
    let base = config
        .base_url()
        .unwrap_or_else(|| config.directory().to_owned());

    for mapping in config.path_mappings() {
        let Some(star) = mapping.match_specifier(specifier) else {
            continue;
        };
        for target in mapping.targets() {
            let substituted = target.replace('*', &star);
            if let Some(resolved) = try_file_or_directory(&base.join(substituted), config) {
                return Some(resolved);
            }
        }
    }
    None
}

/// Extension probing with index-file fallback, mirroring the compiler's
/// relative-import resolution order.
fn try_file_or_directory(candidate: &Path, config: &EffectiveConfig) -> Option<PathBuf> {
    if let Some(resolved) = try_file(candidate, config) {
        return Some(resolved);
    }
    if candidate.is_dir() {
        return try_file(&candidate.join("index"), config);
    }
    None
}

fn try_file(candidate: &Path, config: &EffectiveConfig) -> Option<PathBuf> {
    // Specifier with an explicit, resolvable extension
    if candidate.is_file() && has_known_extension(candidate, config) {
        return Some(candidate.to_owned());
    }

    // TypeScript convention: `./x.js` in source resolves to `./x.ts`
    if let Some(stem) = candidate
        .to_str()
        .and_then(|s| s.strip_suffix(".js").or_else(|| s.strip_suffix(".jsx")))
    {
        for extension in TS_EXTENSIONS {
            let probed = PathBuf::from(format!("{}{}", stem, extension));
            if probed.is_file() {
                return Some(probed);
            }
        }
    }

    let candidate_str = candidate.to_str()?;
    for extension in TS_EXTENSIONS {
        let probed = PathBuf::from(format!("{}{}", candidate_str, extension));
        if probed.is_file() {
            return Some(probed);
        }
    }
    if config.allow_js() {
        for extension in JS_EXTENSIONS {
            let probed = PathBuf::from(format!("{}{}", candidate_str, extension));
            if probed.is_file() {
                return Some(probed);
            }
        }
    }
    {
        let probed = PathBuf::from(format!("{}{}", candidate_str, GENERATED_EXTENSION));
        if probed.is_file() {
            return Some(probed);
        }
    }
    None
}

fn has_known_extension(candidate: &Path, config: &EffectiveConfig) -> bool {
    let Some(name) = candidate.to_str() else {
        return false;
    };
    if SCANNABLE_EXTENSIONS
        .iter()
        .any(|extension| name.ends_with(extension))
    {
        return true;
    }
    name.ends_with(".json") && config.resolve_json_module()
}

/// Declaration and generated-type siblings of a resolved file. Importing
/// `./x` that lands on `x.js` still needs `x.d.ts` in scope; generated
/// files pair the same way.
fn companions(resolved: &Path) -> Vec<PathBuf> {
    let Some(name) = resolved.to_str() else {
        return Vec::new();
    };
    if DECLARATION_EXTENSIONS
        .iter()
        .any(|extension| name.ends_with(extension))
        || name.ends_with(GENERATED_EXTENSION)
    {
        return Vec::new();
    }

    let Some(stem) = SCANNABLE_EXTENSIONS
        .iter()
        .find_map(|extension| name.strip_suffix(extension))
    else {
        return Vec::new();
    };

    vec![
        PathBuf::from(format!("{}.d.ts", stem)),
        PathBuf::from(format!("{}.gen.ts", stem)),
    ]
}

fn is_scannable(file: &Path) -> bool {
    file.to_str()
        .map(|name| {
            SCANNABLE_EXTENSIONS
                .iter()
                .any(|extension| name.ends_with(extension))
        })
        .unwrap_or(false)
}

/// Collect ambient declaration files and generated-type files matched by the
/// effective `include` globs, irrespective of import reachability. These
/// affect type-checking globally, so a scoped check that omits them can
/// reach different conclusions than the full project would.
fn ambient_scan(
    state: &mut DiscoveryState,
    config: &EffectiveConfig,
    options: &ScopeOptions,
) -> Result<(), Error> {
    let include = match (config.include(), config.files()) {
        (Some(include), _) => include.to_vec(),
        // With neither `include` nor `files`, tsc defaults to everything
        (None, None) => vec!["**/*".to_owned()],
        // An explicit `files` list with no `include` means no glob scan
        (None, Some(_)) => return Ok(()),
    };

    let mut patterns = include;
    for exclude in effective_excludes(config) {
        patterns.push(format!("!{}", exclude));
        patterns.push(format!("!{}/**", exclude));
    }

    let walker = GlobWalkerBuilder::from_patterns(config.directory(), &patterns)
        .file_type(FileType::FILE)
        .min_depth(0)
        .build()
        .map_err(|source| Error::IncludePattern {
            source,
            filename: config.path().to_owned(),
        })?;

    let mut ambient: Vec<PathBuf> = Vec::new();
    for entry in walker {
        let entry = entry.map_err(|source| Error::DirectoryWalk {
            source,
            directory: config.directory().to_owned(),
        })?;
        let path = entry.path();
        if is_ambient_file(path) {
            ambient.push(canonicalize_or_owned(path));
        }
    }
    // Directory iteration order is filesystem-dependent; sort so the
    // expanded set is deterministic
    ambient.sort_unstable();

    for path in ambient {
        if !state.admit(path, 0, false, options.max_files) {
            break;
        }
    }
    Ok(())
}

fn effective_excludes(config: &EffectiveConfig) -> Vec<String> {
    match config.exclude() {
        Some(exclude) => exclude.to_vec(),
        None => vec![
            "node_modules".to_owned(),
            "bower_components".to_owned(),
            "jspm_packages".to_owned(),
        ],
    }
}

fn is_ambient_file(path: &Path) -> bool {
    path.to_str()
        .map(|name| {
            DECLARATION_EXTENSIONS
                .iter()
                .any(|extension| name.ends_with(extension))
                || name.ends_with(GENERATED_EXTENSION)
        })
        .unwrap_or(false)
}
