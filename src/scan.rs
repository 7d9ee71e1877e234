//! Best-effort static extraction of module specifiers from source text.
//!
//! This is deliberately not a parser. The scan matches the textual forms a
//! TypeScript program uses to pull another file into the compilation:
//! `import ... from`, `export ... from`, side-effect imports, `require()`,
//! dynamic `import()`, and `/// <reference path>` directives. Specifiers in
//! comments or strings can slip through; discovery is purely additive, and
//! the compiler performs the authoritative resolution, so a stray extra
//! candidate costs nothing beyond a probe.

use once_cell::sync::Lazy;
use regex::Regex;

// Note: the Rust regex crate has no backreferences, so the closing quote
// matches either quote character rather than the opening one.
static FROM_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?:import|export)\s[^'";]*?from\s*['"]([^'"]+)['"]"#)
        .expect("from-clause regex is valid")
});

static SIDE_EFFECT_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"import\s*['"]([^'"]+)['"]"#).expect("side-effect import regex is valid")
});

static REQUIRE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"require\s*\(\s*['"]([^'"]+)['"]\s*\)"#).expect("require regex is valid")
});

static DYNAMIC_IMPORT_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"import\s*\(\s*['"]([^'"]+)['"]\s*\)"#).expect("dynamic import regex is valid")
});

static REFERENCE_PATH_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"///\s*<reference\s+path\s*=\s*['"]([^'"]+)['"]"#)
        .expect("reference directive regex is valid")
});

/// Extract every module specifier mentioned by `source`, in order of first
/// appearance, deduplicated.
pub(crate) fn scan_specifiers(source: &str) -> Vec<String> {
    let mut specifiers = Vec::new();
    let mut push = |specifier: &str| {
        if !specifiers.iter().any(|seen| seen == specifier) {
            specifiers.push(specifier.to_owned());
        }
    };

    for capture in FROM_RE.captures_iter(source) {
        push(&capture[1]);
    }
    for capture in SIDE_EFFECT_RE.captures_iter(source) {
        push(&capture[1]);
    }
    for capture in REQUIRE_RE.captures_iter(source) {
        push(&capture[1]);
    }
    for capture in DYNAMIC_IMPORT_RE.captures_iter(source) {
        push(&capture[1]);
    }
    for capture in REFERENCE_PATH_RE.captures_iter(source) {
        push(&capture[1]);
    }

    specifiers
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn finds_static_import_forms() {
        let source = r#"
            import { a } from './a';
            import b from "./b";
            import * as c from './c';
            export { d } from './d';
            export * from './e';
        "#;
        let specifiers = scan_specifiers(source);
        assert_eq!(specifiers, vec!["./a", "./b", "./c", "./d", "./e"]);
    }

    #[test]
    fn finds_multiline_named_imports() {
        let source = "import {\n  one,\n  two,\n} from './util';\n";
        assert_eq!(scan_specifiers(source), vec!["./util"]);
    }

    #[test]
    fn finds_side_effect_require_and_dynamic_forms() {
        let source = r#"
            import './polyfill';
            const legacy = require('./legacy');
            const lazy = await import("./lazy");
        "#;
        let specifiers = scan_specifiers(source);
        assert!(specifiers.contains(&"./polyfill".to_owned()));
        assert!(specifiers.contains(&"./legacy".to_owned()));
        assert!(specifiers.contains(&"./lazy".to_owned()));
    }

    #[test]
    fn finds_reference_path_directives() {
        let source = "/// <reference path=\"./ambient.d.ts\" />\nexport {};\n";
        assert_eq!(scan_specifiers(source), vec!["./ambient.d.ts"]);
    }

    #[test]
    fn deduplicates_repeated_specifiers() {
        let source = "import { a } from './a';\nimport { b } from './a';\n";
        assert_eq!(scan_specifiers(source), vec!["./a"]);
    }

    #[test]
    fn bare_specifiers_are_reported_verbatim() {
        let source = "import React from 'react';\nimport { x } from '@scope/pkg/sub';\n";
        assert_eq!(scan_specifiers(source), vec!["react", "@scope/pkg/sub"]);
    }
}
