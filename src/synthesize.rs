//! Build the derived configuration artifact a compiler invocation consumes.
//!
//! The artifact `extends` the group's origin config so every compiler option
//! the project set still applies, then narrows the compilation to exactly
//! the group's expanded file set. `include` is always overridden (an empty
//! array when the caller supplied no extra includes) — without that, include
//! globs inherited from the origin would silently widen the check back to
//! the whole project.

use std::path::{Path, PathBuf};

use log::debug;
use serde_json::{json, Map, Value};

use crate::cache;
use crate::error::Error;
use crate::group::FileGroup;
use crate::io::read_file_to_string;
use crate::path::{relative_from, to_config_string};
use crate::ScopeOptions;

/// An on-disk configuration artifact scoping one compiler run.
///
/// Temporary (uncached) artifacts are removed when this value drops —
/// success and failure paths alike — so repeated git-hook invocations never
/// accumulate leaked files. Cached artifacts are retained for reuse.
#[derive(Debug)]
pub struct SynthesizedConfig {
    path: PathBuf,
    fingerprint: String,
    temp: Option<tempfile::TempPath>,
}

impl SynthesizedConfig {
    /// Path to hand to the compiler as `--project`.
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn fingerprint(&self) -> &str {
        &self.fingerprint
    }

    /// Whether the artifact is retained in the cache after this value drops.
    pub fn is_cached(&self) -> bool {
        self.temp.is_none()
    }
}

/// Synthesize (or retrieve from cache) the derived config for `group`.
pub fn synthesize(group: &FileGroup, options: &ScopeOptions) -> Result<SynthesizedConfig, Error> {
    let config = group.config();
    let origin = config.path();

    let origin_content = read_file_to_string(origin).map_err(|source| Error::ConfigRead {
        source,
        filename: origin.to_owned(),
    })?;
    let files = group.check_files();
    let fingerprint = cache::fingerprint(origin, &origin_content, files, options);
    let cache_dir = cache::directory_for(config, options);

    if options.cache {
        if let Some(existing) = cache::lookup(&cache_dir, &fingerprint) {
            return Ok(SynthesizedConfig {
                path: existing,
                fingerprint,
                temp: None,
            });
        }
    }

    if options.cancel.is_cancelled() {
        return Err(Error::Cancelled);
    }

    let contents = render(group, options, &cache_dir, &fingerprint);

    if options.cache {
        let path = cache::store(&cache_dir, &fingerprint, &contents)?;
        return Ok(SynthesizedConfig {
            path,
            fingerprint,
            temp: None,
        });
    }

    // Uncached: random artifact name, removed on drop
    let cache_write = |source: std::io::Error| Error::CacheWrite {
        source,
        path: cache_dir.clone(),
    };
    std::fs::create_dir_all(&cache_dir).map_err(cache_write)?;
    let temp = tempfile::Builder::new()
        .prefix("tsconfig.")
        .suffix(".json")
        .tempfile_in(&cache_dir)
        .map_err(cache_write)?;
    std::fs::write(temp.path(), &contents).map_err(cache_write)?;

    let temp = temp.into_temp_path();
    let path = temp.to_path_buf();
    debug!("synthesized ephemeral config {:?}", path);
    Ok(SynthesizedConfig {
        path,
        fingerprint,
        temp: Some(temp),
    })
}

/// Render the artifact JSON. File entries are relative to the artifact's
/// own directory so a cached artifact stays valid wherever the project
/// tree is mounted.
fn render(
    group: &FileGroup,
    options: &ScopeOptions,
    artifact_dir: &Path,
    fingerprint: &str,
) -> String {
    let config = group.config();

    let files: Vec<String> = group
        .check_files()
        .iter()
        .map(|file| to_config_string(&relative_from(file, artifact_dir)))
        .collect();

    let include: Vec<String> = options.extra_includes.clone();

    let mut compiler_options = Map::new();
    compiler_options.insert("noEmit".to_owned(), Value::Bool(true));
    if options.skip_lib_check {
        compiler_options.insert("skipLibCheck".to_owned(), Value::Bool(true));
    }
    // Composite and incremental projects write build metadata; redirect it
    // into the cache unless the project already chose a location
    if (config.composite() || config.incremental()) && config.ts_build_info_file().is_none() {
        let build_info = cache::build_info_path(artifact_dir, fingerprint);
        compiler_options.insert(
            "tsBuildInfoFile".to_owned(),
            Value::String(to_config_string(&build_info)),
        );
    }

    let artifact = json!({
        "extends": to_config_string(config.path()),
        "files": files,
        "include": include,
        "compilerOptions": compiler_options,
    });

    let mut rendered =
        serde_json::to_string_pretty(&artifact).expect("artifact JSON is always serializable");
    rendered.push('\n');
    rendered
}
