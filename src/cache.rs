//! Persistence of synthesized configs across invocations.
//!
//! Artifacts are keyed by a content fingerprint: SHA-256 over the origin
//! config's current text, the sorted expanded file list with each member's
//! current bytes, and the override flags that shape the artifact. Reusing an
//! artifact therefore requires the inputs to be byte-identical today, never
//! merely same-named or same-timestamped — a stale artifact can never
//! satisfy a fresh fingerprint.
//!
//! The cache lives under `<node_modules>/.cache/tsconfig-scope/` next to the
//! project being checked (falling back to the system temp directory when no
//! `node_modules` exists above the origin config). The fingerprint *is* the
//! cache entry: `tsconfig.<fingerprint>.json` present on disk means hit.
//! Writes land under a random temp name first and are renamed into place, so
//! concurrently-running groups never observe a partial artifact and need no
//! lock.

use std::path::{Path, PathBuf};

use log::debug;
use sha2::{Digest, Sha256};

use crate::config::EffectiveConfig;
use crate::error::Error;
use crate::find_up;
use crate::ScopeOptions;

const TOOL_CACHE_DIRECTORY: &str = "tsconfig-scope";

/// Directory that holds cached artifacts for `config`'s project.
pub(crate) fn directory_for(config: &EffectiveConfig, options: &ScopeOptions) -> PathBuf {
    if let Some(cache_dir) = &options.cache_dir {
        return cache_dir.clone();
    }
    match find_up::find_directory(config.directory(), "node_modules") {
        Some(node_modules) => node_modules.join(".cache").join(TOOL_CACHE_DIRECTORY),
        None => std::env::temp_dir().join(TOOL_CACHE_DIRECTORY),
    }
}

/// Content fingerprint for one group's synthesized artifact: origin config
/// text, the sorted expanded file list *and each file's current bytes*, and
/// the override flags. Hashing file bytes means editing any in-scope file —
/// not just renaming or re-listing one — invalidates reuse, and reverting
/// the edit restores the original fingerprint.
///
/// Hashed parts are length-delimited so adjacent inputs cannot alias each
/// other (e.g. file list `["ab"]` vs `["a", "b"]`).
pub(crate) fn fingerprint(
    origin_path: &Path,
    origin_content: &str,
    files: &[PathBuf],
    options: &ScopeOptions,
) -> String {
    let mut hasher = Sha256::new();
    let mut update = |part: &[u8]| {
        hasher.update((part.len() as u64).to_le_bytes());
        hasher.update(part);
    };

    update(origin_path.to_string_lossy().as_bytes());
    update(origin_content.as_bytes());

    let mut sorted: Vec<&PathBuf> = files.iter().collect();
    sorted.sort_unstable();
    for file in sorted {
        update(file.to_string_lossy().as_bytes());
        // A file that cannot be read right now hashes like an empty one;
        // the compiler will report it if it matters
        let contents = std::fs::read(file).unwrap_or_default();
        update(&contents);
    }

    update(&[u8::from(options.skip_lib_check)]);
    for include in &options.extra_includes {
        update(include.as_bytes());
    }

    format!("{:x}", hasher.finalize())
}

pub(crate) fn artifact_path(cache_dir: &Path, fingerprint: &str) -> PathBuf {
    cache_dir.join(format!("tsconfig.{}.json", fingerprint))
}

pub(crate) fn build_info_path(cache_dir: &Path, fingerprint: &str) -> PathBuf {
    cache_dir.join(format!("{}.tsbuildinfo", fingerprint))
}

/// Look up a previously synthesized artifact by fingerprint.
pub(crate) fn lookup(cache_dir: &Path, fingerprint: &str) -> Option<PathBuf> {
    let path = artifact_path(cache_dir, fingerprint);
    if path.is_file() {
        debug!("cache hit for fingerprint {}", fingerprint);
        Some(path)
    } else {
        None
    }
}

/// Write `contents` under the fingerprint's name: temp file in the same
/// directory, then an atomic rename into place.
pub(crate) fn store(
    cache_dir: &Path,
    fingerprint: &str,
    contents: &str,
) -> Result<PathBuf, Error> {
    let path = artifact_path(cache_dir, fingerprint);
    let cache_write = |source: std::io::Error| Error::CacheWrite {
        source,
        path: path.clone(),
    };

    std::fs::create_dir_all(cache_dir).map_err(cache_write)?;
    let temp = tempfile::NamedTempFile::new_in(cache_dir).map_err(cache_write)?;
    std::fs::write(temp.path(), contents).map_err(cache_write)?;
    temp.persist(&path)
        .map_err(|persist_error| cache_write(persist_error.error))?;

    debug!("stored artifact {:?}", path);
    Ok(path)
}

/// Remove the tool's cache directory for the project containing `start`.
/// Safe at any time: the next invocation regenerates on demand.
pub fn clear_cache(start: &Path) -> std::io::Result<()> {
    let Some(node_modules) = find_up::find_directory(start, "node_modules") else {
        return Ok(());
    };
    let cache_dir = node_modules.join(".cache").join(TOOL_CACHE_DIRECTORY);
    match std::fs::remove_dir_all(&cache_dir) {
        Ok(()) => Ok(()),
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(err) => Err(err),
    }
}
