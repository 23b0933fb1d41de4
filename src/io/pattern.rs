//! Path specifications: literal paths and `*`/`?` wildcard patterns.
//!
//! A specification is parsed once into a [`PathSpec`], which carries everything the
//! tree walk needs: the traversal root and the predicate a file path must satisfy.
//!
//! # Pattern Syntax
//!
//! - `*` matches any sequence of characters, including `/`
//! - `?` matches exactly one character
//!
//! Matching runs over the full path, not the basename, so `/data/*/x.log` also
//! accepts `/data/a/b/x.log`. Every other character matches itself.
//!
//! # Examples
//!
//! ```
//! use ironferry::io::pattern::PathSpec;
//!
//! let spec = PathSpec::parse("/data/logs/*.log");
//! assert!(spec.is_wildcard());
//! assert_eq!(spec.static_prefix(), "/data/logs/");
//! assert!(spec.matches("/data/logs/x.log"));
//! assert!(!spec.matches("/data/logs/readme.md"));
//! ```

use regex::Regex;
use std::fmt;

const WILDCARDS: [char; 2] = ['*', '?'];

/// A parsed path specification.
#[derive(Clone)]
pub enum PathSpec {
    /// No wildcard: only this exact path is accepted, or, when it names a
    /// directory, every file beneath it.
    Literal { path: String },
    /// Contains a wildcard; files under `static_prefix` are tested against `matcher`.
    Wildcard {
        pattern: String,
        static_prefix: String,
        matcher: Regex,
    },
}

impl PathSpec {
    /// Parse a specification. Parsing never fails: wildcard syntax always
    /// compiles because everything but `*` and `?` is escaped.
    pub fn parse(spec: &str) -> Self {
        let spec = spec.trim();
        match spec.find(WILDCARDS) {
            None => PathSpec::Literal {
                path: spec.to_string(),
            },
            Some(first) => PathSpec::Wildcard {
                pattern: spec.to_string(),
                static_prefix: static_prefix_of(spec, first).to_string(),
                matcher: compile(spec),
            },
        }
    }

    #[must_use]
    pub fn is_wildcard(&self) -> bool {
        matches!(self, PathSpec::Wildcard { .. })
    }

    /// The specification as written.
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            PathSpec::Literal { path } => path,
            PathSpec::Wildcard { pattern, .. } => pattern,
        }
    }

    /// Root of the tree walk. For a literal this is the path itself; for a
    /// wildcard it is the deepest literal ancestor directory, with its trailing
    /// separator, or the empty string when no separator precedes the wildcard.
    #[must_use]
    pub fn static_prefix(&self) -> &str {
        match self {
            PathSpec::Literal { path } => path,
            PathSpec::Wildcard { static_prefix, .. } => static_prefix,
        }
    }

    /// Whether `path` is selected by this specification.
    #[must_use]
    pub fn matches(&self, path: &str) -> bool {
        match self {
            PathSpec::Literal { path: literal } => {
                literal == path || is_descendant(literal, path)
            }
            PathSpec::Wildcard { matcher, .. } => matcher.is_match(path),
        }
    }
}

impl fmt::Debug for PathSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PathSpec::Literal { path } => f.debug_tuple("Literal").field(path).finish(),
            PathSpec::Wildcard {
                pattern,
                static_prefix,
                ..
            } => f
                .debug_struct("Wildcard")
                .field("pattern", pattern)
                .field("static_prefix", static_prefix)
                .finish(),
        }
    }
}

fn is_descendant(dir: &str, path: &str) -> bool {
    match path.strip_prefix(dir) {
        Some(rest) => dir.ends_with('/') || rest.starts_with('/'),
        None => false,
    }
}

fn static_prefix_of(spec: &str, first_wildcard: usize) -> &str {
    match spec[..first_wildcard].rfind('/') {
        Some(sep) => &spec[..=sep],
        None => "",
    }
}

fn compile(spec: &str) -> Regex {
    let mut expr = String::with_capacity(spec.len() * 2 + 2);
    expr.push('^');
    let mut literal = String::new();
    for ch in spec.chars() {
        match ch {
            '*' | '?' => {
                expr.push_str(&regex::escape(&literal));
                literal.clear();
                expr.push_str(if ch == '*' { ".*" } else { "." });
            }
            _ => literal.push(ch),
        }
    }
    expr.push_str(&regex::escape(&literal));
    expr.push('$');
    // (?s) lets wildcards span newlines in odd file names
    Regex::new(&format!("(?s){expr}")).expect("escaped wildcard pattern is always valid")
}
