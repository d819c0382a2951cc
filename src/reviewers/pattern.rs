//! Branch patterns.

use globset::{GlobBuilder, GlobMatcher};
use std::cmp::Ordering;
use std::fmt;

use crate::error::{OrgError, Result};

const GLOB_META: &[char] = &['*', '?', '[', '{'];

/// How precisely a pattern names a branch.
///
/// Literal patterns outrank every wildcard; wildcards rank by the length of
/// the literal text before their first metacharacter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Specificity {
    Wildcard { prefix_len: usize },
    Literal,
}

impl Ord for Specificity {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (Specificity::Literal, Specificity::Literal) => Ordering::Equal,
            (Specificity::Literal, _) => Ordering::Greater,
            (_, Specificity::Literal) => Ordering::Less,
            (
                Specificity::Wildcard { prefix_len: a },
                Specificity::Wildcard { prefix_len: b },
            ) => a.cmp(b),
        }
    }
}

impl PartialOrd for Specificity {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

#[derive(Debug, Clone)]
enum Kind {
    Literal,
    Wildcard { prefix: String, matcher: GlobMatcher },
}

/// A literal branch name or a glob such as `release/*`.
///
/// `*` matches any run of characters, `/` included, so `release/*` also
/// covers `release/hotfix/1`.
#[derive(Debug, Clone)]
pub struct BranchPattern {
    raw: String,
    kind: Kind,
}

impl BranchPattern {
    /// Parse a pattern from configuration.
    pub fn parse(raw: impl Into<String>) -> Result<Self> {
        let raw = raw.into();
        if raw.trim().is_empty() {
            return Err(OrgError::InvalidConfig(
                "branch pattern must not be empty".into(),
            ));
        }

        let kind = match raw.find(GLOB_META) {
            None => Kind::Literal,
            Some(idx) => {
                let matcher = GlobBuilder::new(&raw)
                    .literal_separator(false)
                    .build()?
                    .compile_matcher();
                Kind::Wildcard {
                    prefix: raw[..idx].to_string(),
                    matcher,
                }
            }
        };

        Ok(Self { raw, kind })
    }

    /// The pattern as written.
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// Whether this pattern contains wildcards.
    pub fn is_wildcard(&self) -> bool {
        matches!(self.kind, Kind::Wildcard { .. })
    }

    /// Whether the branch is named by this pattern.
    pub fn matches(&self, branch: &str) -> bool {
        match &self.kind {
            Kind::Literal => self.raw == branch,
            Kind::Wildcard { prefix, matcher } => {
                branch.starts_with(prefix.as_str()) && matcher.is_match(branch)
            }
        }
    }

    /// Ranking used when several patterns name the same branch.
    pub fn specificity(&self) -> Specificity {
        match &self.kind {
            Kind::Literal => Specificity::Literal,
            Kind::Wildcard { prefix, .. } => Specificity::Wildcard {
                prefix_len: prefix.chars().count(),
            },
        }
    }
}

impl PartialEq for BranchPattern {
    fn eq(&self, other: &Self) -> bool {
        self.raw == other.raw
    }
}

impl Eq for BranchPattern {}

impl fmt::Display for BranchPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}
