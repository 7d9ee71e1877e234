//! Locate and flatten TypeScript project configurations.
//!
//! The locator walks upward from a starting directory until it finds the
//! nearest `tsconfig.json` (the *origin* config), then resolves the origin's
//! `extends` chain into one flattened [`EffectiveConfig`]. Results are
//! memoized per directory and per origin file, owned by the
//! [`ConfigResolver`] instance rather than hidden in process-wide state, so
//! isolated resolvers can be constructed per test case.

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use log::{debug, trace};
use serde::Deserialize;
use serde_json::{Map, Value};

use crate::error::Error;
use crate::find_up;
use crate::io::read_jsonc_from_file;

pub const CONFIG_FILENAME: &str = "tsconfig.json";

/// Raw shape of a single tsconfig.json file, before inheritance resolution.
///
/// `compiler_options` is kept as a raw JSON map so options this tool has no
/// opinion about survive flattening untouched.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawConfig {
    #[serde(default)]
    extends: Option<Extends>,
    #[serde(default)]
    compiler_options: Option<Map<String, Value>>,
    #[serde(default)]
    include: Option<Vec<String>>,
    #[serde(default)]
    exclude: Option<Vec<String>>,
    #[serde(default)]
    files: Option<Vec<String>>,
}

/// `extends` accepts a single specifier or, since TypeScript 5.0, an array.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
enum Extends {
    One(String),
    Many(Vec<String>),
}

impl Extends {
    fn references(&self) -> Vec<String> {
        match self {
            Extends::One(reference) => vec![reference.clone()],
            Extends::Many(references) => references.clone(),
        }
    }
}

/// The flattened result of resolving a configuration file's `extends` chain.
///
/// Immutable once resolved. Later (closer-to-leaf) chain members override
/// earlier ones key-by-key; the array-valued `types` option concatenates
/// base-first instead (see `merge_compiler_options`).
#[derive(Debug)]
pub struct EffectiveConfig {
    path: PathBuf,
    compiler_options: Map<String, Value>,
    include: Option<Vec<String>>,
    exclude: Option<Vec<String>>,
    files: Option<Vec<String>>,
    path_mappings: Vec<PathMapping>,
}

impl EffectiveConfig {
    /// Absolute path of the origin configuration file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Directory containing the origin configuration file.
    pub fn directory(&self) -> &Path {
        self.path
            .parent()
            .expect("origin config path always names a file inside a directory")
    }

    pub fn compiler_options(&self) -> &Map<String, Value> {
        &self.compiler_options
    }

    pub fn include(&self) -> Option<&[String]> {
        self.include.as_deref()
    }

    pub fn exclude(&self) -> Option<&[String]> {
        self.exclude.as_deref()
    }

    pub fn files(&self) -> Option<&[String]> {
        self.files.as_deref()
    }

    fn bool_option(&self, key: &str) -> bool {
        matches!(self.compiler_options.get(key), Some(Value::Bool(true)))
    }

    pub fn composite(&self) -> bool {
        self.bool_option("composite")
    }

    pub fn incremental(&self) -> bool {
        self.bool_option("incremental")
    }

    pub fn allow_js(&self) -> bool {
        self.bool_option("allowJs")
    }

    pub fn resolve_json_module(&self) -> bool {
        self.bool_option("resolveJsonModule")
    }

    pub fn ts_build_info_file(&self) -> Option<&str> {
        self.compiler_options
            .get("tsBuildInfoFile")
            .and_then(Value::as_str)
    }

    /// `baseUrl`, absolutized against the directory of the config file that
    /// declared it (see `absolutize_base_url`).
    pub fn base_url(&self) -> Option<PathBuf> {
        self.compiler_options
            .get("baseUrl")
            .and_then(Value::as_str)
            .map(PathBuf::from)
    }

    /// Path-mapping table from `compilerOptions.paths`, most-specific first.
    pub fn path_mappings(&self) -> &[PathMapping] {
        &self.path_mappings
    }
}

/// One `compilerOptions.paths` entry, pre-split around its `*` wildcard.
#[derive(Debug, Clone)]
pub struct PathMapping {
    pattern: String,
    prefix: String,
    suffix: String,
    targets: Vec<String>,
}

impl PathMapping {
    /// Match `specifier` against this mapping's pattern, returning the text
    /// captured by `*` (empty for exact patterns) on success.
    pub(crate) fn match_specifier(&self, specifier: &str) -> Option<String> {
        if !self.pattern.contains('*') {
            return if self.pattern == specifier {
                Some(String::new())
            } else {
                None
            };
        }

        if !specifier.starts_with(&self.prefix) || !specifier.ends_with(&self.suffix) {
            return None;
        }

        let start = self.prefix.len();
        let end = specifier.len().saturating_sub(self.suffix.len());
        if end < start {
            return None;
        }

        Some(specifier[start..end].to_string())
    }

    pub(crate) fn targets(&self) -> &[String] {
        &self.targets
    }

    fn specificity(&self) -> usize {
        self.prefix.len() + self.suffix.len()
    }
}

/// Locates origin configs and resolves their inheritance chains.
///
/// Both caches live on the instance: `by_directory` short-circuits repeated
/// upward walks, `by_origin` shares one flattened config between every
/// directory that resolves to the same origin file.
#[derive(Debug, Default)]
pub struct ConfigResolver {
    by_directory: Mutex<HashMap<PathBuf, Arc<EffectiveConfig>>>,
    by_origin: Mutex<HashMap<PathBuf, Arc<EffectiveConfig>>>,
}

impl ConfigResolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Find the nearest `tsconfig.json` at or above `start` and flatten its
    /// `extends` chain. `start` may be a file or a directory.
    pub fn resolve(&self, start: &Path) -> Result<Arc<EffectiveConfig>, Error> {
        let start_dir = if start.is_dir() {
            start.to_owned()
        } else {
            start
                .parent()
                .map(Path::to_owned)
                .unwrap_or_else(|| PathBuf::from("."))
        };
        let start_dir = canonicalize_or_owned(&start_dir);

        if let Some(config) = self
            .by_directory
            .lock()
            .expect("config resolver lock poisoned")
            .get(&start_dir)
        {
            return Ok(Arc::clone(config));
        }

        let origin_directory =
            find_up::find_file(&start_dir, CONFIG_FILENAME).ok_or(Error::ConfigNotFound {
                start_path: start.to_owned(),
            })?;
        let origin = canonicalize_or_owned(&origin_directory.join(CONFIG_FILENAME));
        trace!("origin config for {:?} is {:?}", start_dir, origin);

        let config = self.resolve_origin(&origin)?;
        self.by_directory
            .lock()
            .expect("config resolver lock poisoned")
            .insert(start_dir, Arc::clone(&config));
        Ok(config)
    }

    /// Flatten a known origin config file, bypassing the upward walk. Used
    /// for explicit project overrides.
    pub fn resolve_origin(&self, origin: &Path) -> Result<Arc<EffectiveConfig>, Error> {
        let origin = canonicalize_or_owned(origin);

        if let Some(config) = self
            .by_origin
            .lock()
            .expect("config resolver lock poisoned")
            .get(&origin)
        {
            return Ok(Arc::clone(config));
        }

        let mut visited = HashSet::new();
        let flattened = load_flattened(&origin, &mut visited)?;
        debug!(
            "flattened {:?}: {} compiler options",
            origin,
            flattened
                .compiler_options
                .as_ref()
                .map(Map::len)
                .unwrap_or(0)
        );

        let compiler_options = flattened.compiler_options.unwrap_or_default();
        let path_mappings = build_path_mappings(&compiler_options);
        let config = Arc::new(EffectiveConfig {
            path: origin.clone(),
            compiler_options,
            include: flattened.include,
            exclude: flattened.exclude,
            files: flattened.files,
            path_mappings,
        });

        self.by_origin
            .lock()
            .expect("config resolver lock poisoned")
            .insert(origin, Arc::clone(&config));
        Ok(config)
    }
}

/// Load `path` and recursively fold its `extends` chain into one RawConfig,
/// most-base first. The visited set rejects cyclic chains.
fn load_flattened(path: &Path, visited: &mut HashSet<PathBuf>) -> Result<RawConfig, Error> {
    let canonical = canonicalize_or_owned(path);
    if !visited.insert(canonical.clone()) {
        return Err(Error::ExtendsCycle {
            filename: canonical,
        });
    }

    let mut raw: RawConfig = read_jsonc_from_file(path).map_err(|source| {
        if source.is_parse_error() {
            Error::ConfigParse {
                source,
                filename: path.to_owned(),
            }
        } else {
            Error::ConfigRead {
                source,
                filename: path.to_owned(),
            }
        }
    })?;
    absolutize_base_url(&mut raw, path);

    let mut merged = RawConfig::default();
    if let Some(extends) = raw.extends.take() {
        for reference in extends.references() {
            let base_path = resolve_extends_reference(path, &reference)?;
            let base = load_flattened(&base_path, visited)?;
            merged = merge_raw(merged, base);
        }
    }
    merged = merge_raw(merged, raw);

    visited.remove(&canonical);
    Ok(merged)
}

/// `baseUrl` is relative to the config file that declares it. Flattening
/// loses that provenance, so rewrite it to an absolute path at load time.
fn absolutize_base_url(raw: &mut RawConfig, config_path: &Path) {
    let Some(options) = raw.compiler_options.as_mut() else {
        return;
    };
    let Some(base_url) = options.get("baseUrl").and_then(Value::as_str) else {
        return;
    };

    let declared_in = config_path.parent().unwrap_or_else(|| Path::new("."));
    let absolute = canonicalize_or_owned(&declared_in.join(base_url));
    options.insert(
        "baseUrl".to_owned(),
        Value::String(absolute.to_string_lossy().into_owned()),
    );
}

/// Resolve an `extends` reference from `current`'s directory.
///
/// Relative and absolute references name a file directly (`.json` appended
/// when the reference has no extension, matching tsc). Anything else is a
/// package-style reference resolved with a require-like walk up through
/// `node_modules` directories.
fn resolve_extends_reference(current: &Path, reference: &str) -> Result<PathBuf, Error> {
    let base_dir = current.parent().unwrap_or_else(|| Path::new("."));

    let is_relative = reference.starts_with("./") || reference.starts_with("../");
    if is_relative || Path::new(reference).is_absolute() {
        let mut candidate = PathBuf::from(reference);
        if candidate.extension().is_none() {
            candidate.set_extension("json");
        }
        let resolved = if candidate.is_absolute() {
            candidate
        } else {
            base_dir.join(candidate)
        };
        return if resolved.is_file() {
            Ok(resolved)
        } else {
            Err(Error::ExtendsNotFound {
                filename: current.to_owned(),
                reference: reference.to_owned(),
            })
        };
    }

    let mut search_dir = Some(base_dir.to_owned());
    while let Some(dir) = search_dir {
        let Some(node_modules) = find_up::find_directory(&dir, "node_modules") else {
            break;
        };

        let base = node_modules.join(reference);
        if base.is_file() {
            return Ok(base);
        }
        let with_json = {
            let mut candidate = base.clone();
            if candidate.extension().is_none() {
                candidate.set_extension("json");
            }
            candidate
        };
        if with_json.is_file() {
            return Ok(with_json);
        }
        let package_config = base.join(CONFIG_FILENAME);
        if package_config.is_file() {
            return Ok(package_config);
        }

        // Continue the walk above this node_modules directory
        search_dir = node_modules.parent().and_then(Path::parent).map(Path::to_owned);
    }

    Err(Error::ExtendsNotFound {
        filename: current.to_owned(),
        reference: reference.to_owned(),
    })
}

/// Fold `child` over `base`. Scalar top-level lists (`include`, `exclude`,
/// `files`) override wholesale, matching tsc.
fn merge_raw(base: RawConfig, child: RawConfig) -> RawConfig {
    let compiler_options = match (base.compiler_options, child.compiler_options) {
        (Some(base_options), Some(child_options)) => {
            Some(merge_compiler_options(base_options, child_options))
        }
        (base_options, child_options) => child_options.or(base_options),
    };

    RawConfig {
        extends: None,
        compiler_options,
        include: child.include.or(base.include),
        exclude: child.exclude.or(base.exclude),
        files: child.files.or(base.files),
    }
}

/// Key-by-key override, most-derived wins, with one exception: the
/// array-valued `types` option concatenates base-first with duplicates
/// removed. Other array options (`lib`, `typeRoots`) override wholesale,
/// matching tsc.
fn merge_compiler_options(
    mut base: Map<String, Value>,
    child: Map<String, Value>,
) -> Map<String, Value> {
    for (key, child_value) in child {
        if key == "types" {
            if let (Some(Value::Array(base_types)), Value::Array(child_types)) =
                (base.get(&key), &child_value)
            {
                let mut combined = base_types.clone();
                for entry in child_types {
                    if !combined.contains(entry) {
                        combined.push(entry.clone());
                    }
                }
                base.insert(key, Value::Array(combined));
                continue;
            }
        }
        base.insert(key, child_value);
    }
    base
}

fn build_path_mappings(compiler_options: &Map<String, Value>) -> Vec<PathMapping> {
    let Some(Value::Object(paths)) = compiler_options.get("paths") else {
        return Vec::new();
    };

    let mut mappings = Vec::new();
    for (pattern, targets) in paths {
        let Value::Array(targets) = targets else {
            continue;
        };
        let targets: Vec<String> = targets
            .iter()
            .filter_map(Value::as_str)
            .map(|target| normalize_path_pattern(target))
            .collect();
        if targets.is_empty() {
            continue;
        }
        let pattern = normalize_path_pattern(pattern);
        let (prefix, suffix) = split_path_pattern(&pattern);
        mappings.push(PathMapping {
            pattern,
            prefix,
            suffix,
            targets,
        });
    }
    mappings.sort_by(|left, right| {
        right
            .specificity()
            .cmp(&left.specificity())
            .then_with(|| right.pattern.len().cmp(&left.pattern.len()))
            .then_with(|| left.pattern.cmp(&right.pattern))
    });
    mappings
}

fn normalize_path_pattern(value: &str) -> String {
    value.trim().replace('\\', "/")
}

fn split_path_pattern(pattern: &str) -> (String, String) {
    match pattern.find('*') {
        Some(star_idx) => {
            let (prefix, rest) = pattern.split_at(star_idx);
            (prefix.to_string(), rest[1..].to_string())
        }
        None => (pattern.to_string(), String::new()),
    }
}

pub(crate) fn canonicalize_or_owned(path: &Path) -> PathBuf {
    std::fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf())
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
    fn resolves_nearest_config_walking_upward() {
        let temp = tempfile::tempdir().unwrap();
        write_file(temp.path(), "tsconfig.json", r#"{"include": ["src"]}"#);
        let nested = temp.path().join("src/deep");
        std::fs::create_dir_all(&nested).unwrap();

        let resolver = ConfigResolver::new();
        let config = resolver.resolve(&nested).unwrap();
        assert_eq!(
            config.path(),
            canonicalize_or_owned(&temp.path().join("tsconfig.json"))
        );
        assert_eq!(config.include(), Some(&["src".to_owned()][..]));
    }

    #[test]
    fn missing_config_is_a_config_not_found_error() {
        let temp = tempfile::tempdir().unwrap();
        let resolver = ConfigResolver::new();
        match resolver.resolve(temp.path()) {
            Err(Error::ConfigNotFound { .. }) => {}
            other => panic!("expected ConfigNotFound, got {:?}", other),
        }
    }

    #[test]
    fn malformed_config_is_a_parse_error() {
        let temp = tempfile::tempdir().unwrap();
        write_file(temp.path(), "tsconfig.json", "{ not json");

        let resolver = ConfigResolver::new();
        match resolver.resolve(temp.path()) {
            Err(Error::ConfigParse { filename, .. }) => {
                assert!(filename.ends_with("tsconfig.json"));
            }
            other => panic!("expected ConfigParse, got {:?}", other),
        }
    }

    #[test]
    fn extends_chain_merges_most_derived_last() {
        let temp = tempfile::tempdir().unwrap();
        write_file(
            temp.path(),
            "tsconfig.base.json",
            r#"{
              "compilerOptions": {"target": "es2015", "strict": true},
              "include": ["lib"]
            }"#,
        );
        write_file(
            temp.path(),
            "tsconfig.json",
            r#"{
              "extends": "./tsconfig.base.json",
              "compilerOptions": {"strict": false, "module": "commonjs"},
              "include": ["src"]
            }"#,
        );

        let resolver = ConfigResolver::new();
        let config = resolver.resolve(temp.path()).unwrap();
        let options = config.compiler_options();
        assert_eq!(options.get("target"), Some(&Value::from("es2015")));
        assert_eq!(options.get("strict"), Some(&Value::from(false)));
        assert_eq!(options.get("module"), Some(&Value::from("commonjs")));
        // include overrides wholesale
        assert_eq!(config.include(), Some(&["src".to_owned()][..]));
    }

    #[test]
    fn types_concatenate_across_extends() {
        let temp = tempfile::tempdir().unwrap();
        write_file(
            temp.path(),
            "tsconfig.base.json",
            r#"{"compilerOptions": {"types": ["node", "jest"]}}"#,
        );
        write_file(
            temp.path(),
            "tsconfig.json",
            r#"{
              "extends": "./tsconfig.base.json",
              "compilerOptions": {"types": ["jest", "mocha"]}
            }"#,
        );

        let resolver = ConfigResolver::new();
        let config = resolver.resolve(temp.path()).unwrap();
        assert_eq!(
            config.compiler_options().get("types"),
            Some(&serde_json::json!(["node", "jest", "mocha"]))
        );
    }

    #[test]
    fn extends_array_applies_left_to_right() {
        let temp = tempfile::tempdir().unwrap();
        write_file(
            temp.path(),
            "a.json",
            r#"{"compilerOptions": {"target": "es5", "strict": true}}"#,
        );
        write_file(
            temp.path(),
            "b.json",
            r#"{"compilerOptions": {"target": "es2020"}}"#,
        );
        write_file(
            temp.path(),
            "tsconfig.json",
            r#"{"extends": ["./a.json", "./b.json"]}"#,
        );

        let resolver = ConfigResolver::new();
        let config = resolver.resolve(temp.path()).unwrap();
        let options = config.compiler_options();
        assert_eq!(options.get("target"), Some(&Value::from("es2020")));
        assert_eq!(options.get("strict"), Some(&Value::from(true)));
    }

    #[test]
    fn extends_cycle_is_rejected() {
        let temp = tempfile::tempdir().unwrap();
        write_file(
            temp.path(),
            "a.json",
            r#"{"extends": "./b.json"}"#,
        );
        write_file(
            temp.path(),
            "b.json",
            r#"{"extends": "./a.json"}"#,
        );
        write_file(
            temp.path(),
            "tsconfig.json",
            r#"{"extends": "./a.json"}"#,
        );

        let resolver = ConfigResolver::new();
        match resolver.resolve(temp.path()) {
            Err(Error::ExtendsCycle { .. }) => {}
            other => panic!("expected ExtendsCycle, got {:?}", other),
        }
    }

    #[test]
    fn package_style_extends_resolves_through_node_modules() {
        let temp = tempfile::tempdir().unwrap();
        write_file(
            temp.path(),
            "node_modules/@tsconfig/node18/tsconfig.json",
            r#"{"compilerOptions": {"target": "es2022"}}"#,
        );
        write_file(
            temp.path(),
            "packages/app/tsconfig.json",
            r#"{"extends": "@tsconfig/node18/tsconfig.json"}"#,
        );

        let resolver = ConfigResolver::new();
        let config = resolver.resolve(&temp.path().join("packages/app")).unwrap();
        assert_eq!(
            config.compiler_options().get("target"),
            Some(&Value::from("es2022"))
        );
    }

    #[test]
    fn resolutions_are_memoized_per_origin() {
        let temp = tempfile::tempdir().unwrap();
        write_file(temp.path(), "tsconfig.json", "{}");
        let a = temp.path().join("a");
        let b = temp.path().join("b");
        std::fs::create_dir_all(&a).unwrap();
        std::fs::create_dir_all(&b).unwrap();

        let resolver = ConfigResolver::new();
        let first = resolver.resolve(&a).unwrap();
        let second = resolver.resolve(&b).unwrap();
        assert!(Arc::ptr_eq(&first, &second));
    }

    #[test]
    fn base_url_is_absolutized_against_declaring_config() {
        let temp = tempfile::tempdir().unwrap();
        write_file(
            temp.path(),
            "tsconfig.base.json",
            r#"{"compilerOptions": {"baseUrl": ".", "paths": {"@app/*": ["packages/app/src/*"]}}}"#,
        );
        write_file(
            temp.path(),
            "packages/app/tsconfig.json",
            r#"{"extends": "../../tsconfig.base.json"}"#,
        );

        let resolver = ConfigResolver::new();
        let config = resolver.resolve(&temp.path().join("packages/app")).unwrap();
        assert_eq!(
            config.base_url(),
            Some(canonicalize_or_owned(temp.path()))
        );
        assert_eq!(config.path_mappings().len(), 1);
    }

    #[test]
    fn path_mapping_matches_wildcard_specifiers() {
        let mapping = PathMapping {
            pattern: "@app/*".to_owned(),
            prefix: "@app/".to_owned(),
            suffix: String::new(),
            targets: vec!["src/*".to_owned()],
        };
        assert_eq!(mapping.match_specifier("@app/util"), Some("util".to_owned()));
        assert_eq!(mapping.match_specifier("@other/util"), None);

        let exact = PathMapping {
            pattern: "config".to_owned(),
            prefix: "config".to_owned(),
            suffix: String::new(),
            targets: vec!["src/config.ts".to_owned()],
        };
        assert_eq!(exact.match_specifier("config"), Some(String::new()));
        assert_eq!(exact.match_specifier("config/extra"), None);
    }
}
