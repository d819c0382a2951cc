//! `REVIEWERS.yml` loading and branch rule resolution.

use serde::Deserialize;
use std::path::Path;
use tracing::debug;

use super::pattern::BranchPattern;
use super::template::{TeamContext, TeamTemplate, resolve_all};
use crate::error::{OrgError, Result};

/// Reviewer and approval requirements for branches matching a pattern.
#[derive(Debug, Clone, PartialEq)]
pub struct BranchRule {
    pub pattern: BranchPattern,
    pub review_teams: Vec<TeamTemplate>,
    pub assignees: Vec<TeamTemplate>,
    pub required_approvals: u32,
    pub required_teams: Vec<TeamTemplate>,
    /// Literal branch names exempted from this rule.
    pub exclude: Vec<String>,
}

impl BranchRule {
    /// Whether the branch is explicitly exempted.
    pub fn excludes(&self, branch: &str) -> bool {
        self.exclude.iter().any(|b| b == branch)
    }

    /// Substitute the team prefix into every team name of the rule.
    pub fn resolve(&self, ctx: &TeamContext) -> Result<ResolvedRule> {
        Ok(ResolvedRule {
            pattern: self.pattern.as_str().to_string(),
            review_teams: resolve_all(&self.review_teams, ctx)?,
            assignee_teams: resolve_all(&self.assignees, ctx)?,
            required_approvals: self.required_approvals,
            required_teams: resolve_all(&self.required_teams, ctx)?,
        })
    }
}

/// A branch rule with concrete team slugs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedRule {
    pub pattern: String,
    pub review_teams: Vec<String>,
    pub assignee_teams: Vec<String>,
    pub required_approvals: u32,
    pub required_teams: Vec<String>,
}

/// All branch rules of a repository, in declaration order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReviewPolicy {
    rules: Vec<BranchRule>,
}

#[derive(Deserialize)]
struct RawFile {
    pull_requests: RawPullRequests,
}

#[derive(Deserialize)]
struct RawPullRequests {
    #[serde(default)]
    branches: serde_yaml::Mapping,
}

#[derive(Deserialize, Default)]
struct RawRule {
    #[serde(default)]
    review_teams: Vec<TeamTemplate>,
    #[serde(default)]
    assignees: Vec<TeamTemplate>,
    #[serde(default)]
    required_approvals: u32,
    #[serde(default)]
    required_teams: Vec<TeamTemplate>,
    #[serde(default)]
    exclude: Vec<String>,
}

impl ReviewPolicy {
    /// Build a policy from already-parsed rules.
    pub fn new(rules: Vec<BranchRule>) -> Self {
        Self { rules }
    }

    /// Load a policy from a YAML file.
    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            OrgError::Io(std::io::Error::new(
                e.kind(),
                format!("Failed to read {}: {}", path.display(), e),
            ))
        })?;
        Self::from_yaml_str(&content, path)
    }

    /// Parse a policy; `origin` is only used in error messages.
    pub fn from_yaml_str(content: &str, origin: &Path) -> Result<Self> {
        let yaml_error = |source| OrgError::Yaml {
            path: origin.to_path_buf(),
            source,
        };
        let raw: RawFile = serde_yaml::from_str(content).map_err(yaml_error)?;

        let mut rules = Vec::with_capacity(raw.pull_requests.branches.len());
        for (key, value) in raw.pull_requests.branches {
            let pattern = key.as_str().ok_or_else(|| {
                OrgError::InvalidConfig(format!(
                    "{}: branch keys must be strings, got {:?}",
                    origin.display(),
                    key
                ))
            })?;
            let pattern = BranchPattern::parse(pattern)?;
            let rule: RawRule = if value.is_null() {
                RawRule::default()
            } else {
                serde_yaml::from_value(value).map_err(yaml_error)?
            };

            rules.push(BranchRule {
                pattern,
                review_teams: rule.review_teams,
                assignees: rule.assignees,
                required_approvals: rule.required_approvals,
                required_teams: rule.required_teams,
                exclude: rule.exclude,
            });
        }

        Ok(Self { rules })
    }

    /// Rules in declaration order.
    pub fn rules(&self) -> &[BranchRule] {
        &self.rules
    }

    /// Whether the policy declares no rules.
    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// The single rule that governs `branch`, if any.
    ///
    /// Rules whose pattern matches and that do not exclude the branch are
    /// candidates; the most specific wins and ties go to the earliest
    /// declaration. An exclusion only removes its own rule, so the branch
    /// falls through to the next-best candidate.
    pub fn resolve(&self, branch: &str) -> Option<&BranchRule> {
        let mut best: Option<&BranchRule> = None;
        for rule in &self.rules {
            if !rule.pattern.matches(branch) {
                continue;
            }
            if rule.excludes(branch) {
                debug!(branch, pattern = %rule.pattern, "branch excluded from rule");
                continue;
            }
            let better = match best {
                None => true,
                Some(current) => rule.pattern.specificity() > current.pattern.specificity(),
            };
            if better {
                best = Some(rule);
            }
        }

        match best {
            Some(rule) => debug!(branch, pattern = %rule.pattern, "resolved branch rule"),
            None => debug!(branch, "no branch rule applies"),
        }
        best
    }
}
