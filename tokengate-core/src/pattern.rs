//! Page patterns deciding which resources carry CSRF protection.

use crate::error::Result;
use regex::Regex;

/// A single protected/unprotected page pattern.
///
/// - `^...$` a regular expression over the path
/// - `/admin/*` the path itself and everything below it
/// - `*.do`   any path with the extension
/// - anything else: exact path match
#[derive(Debug, Clone)]
pub enum PagePattern {
    Exact(String),
    Prefix(String),
    Extension(String),
    Regex(Regex),
}

impl PagePattern {
    pub fn parse(pattern: &str) -> Result<Self> {
        let pattern = pattern.trim();

        if pattern.starts_with('^') && pattern.ends_with('$') {
            return Ok(Self::Regex(Regex::new(pattern)?));
        }

        if let Some(base) = pattern.strip_suffix("/*") {
            return Ok(Self::Prefix(base.to_string()));
        }

        if let Some(extension) = pattern.strip_prefix("*.") {
            return Ok(Self::Extension(format!(".{}", extension)));
        }

        Ok(Self::Exact(pattern.to_string()))
    }

    pub fn matches(&self, path: &str) -> bool {
        match self {
            Self::Exact(exact) => path == exact,
            Self::Prefix(base) => {
                base.is_empty()
                    || path == base
                    || path
                        .strip_prefix(base.as_str())
                        .is_some_and(|rest| rest.starts_with('/'))
            }
            Self::Extension(extension) => path.ends_with(extension.as_str()),
            Self::Regex(regex) => regex.is_match(path),
        }
    }
}

/// Protected and unprotected page sets.
#[derive(Debug, Clone, Default)]
pub struct PathMatcher {
    protected: Vec<PagePattern>,
    unprotected: Vec<PagePattern>,
}

impl PathMatcher {
    pub fn new(protected: &[String], unprotected: &[String]) -> Result<Self> {
        Ok(Self {
            protected: protected
                .iter()
                .map(|p| PagePattern::parse(p))
                .collect::<Result<_>>()?,
            unprotected: unprotected
                .iter()
                .map(|p| PagePattern::parse(p))
                .collect::<Result<_>>()?,
        })
    }

    /// A path is protected when it matches a protected pattern (or no protected
    /// patterns are configured) and matches no unprotected pattern.
    pub fn is_protected(&self, path: &str) -> bool {
        if self.unprotected.iter().any(|p| p.matches(path)) {
            return false;
        }

        self.protected.is_empty() || self.protected.iter().any(|p| p.matches(path))
    }
}
