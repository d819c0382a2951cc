//! Diffing desired repository state against the platform.

use serde_json::Value;
use std::fmt;

use super::ruleset::json_subset;
use super::spec::{RepositorySpec, Visibility};
use crate::github::{GitHubRepo, NewRepository, RepoSettingsPatch, RulesetSummary};

/// A ruleset as it exists on the platform.
#[derive(Debug, Clone, PartialEq)]
pub struct CurrentRuleset {
    pub summary: RulesetSummary,
    pub body: Value,
}

/// Live state of a repository, as far as the spec manages it.
///
/// Security flags are `None` when they were not fetched.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CurrentState {
    pub repo: GitHubRepo,
    pub vulnerability_alerts: Option<bool>,
    pub automated_security_fixes: Option<bool>,
    pub rulesets: Vec<CurrentRuleset>,
}

/// One write needed to converge a repository.
#[derive(Debug, Clone, PartialEq)]
pub enum RepositoryChange {
    CreateRepository {
        repo: NewRepository,
        template: Option<String>,
    },
    UpdateSettings(RepoSettingsPatch),
    ReplaceTopics(Vec<String>),
    SetVulnerabilityAlerts(bool),
    SetAutomatedSecurityFixes(bool),
    CreateRuleset {
        name: String,
        body: Value,
    },
    UpdateRuleset {
        id: u64,
        name: String,
        body: Value,
    },
}

impl fmt::Display for RepositoryChange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fn toggle(enabled: bool) -> &'static str {
            if enabled { "enable" } else { "disable" }
        }

        match self {
            RepositoryChange::CreateRepository { repo, template } => {
                write!(f, "create repository {}", repo.name)?;
                if let Some(template) = template {
                    write!(f, " from template {}", template)?;
                }
                Ok(())
            }
            RepositoryChange::UpdateSettings(patch) => {
                write!(f, "update settings: {}", patch.field_names().join(", "))
            }
            RepositoryChange::ReplaceTopics(topics) => {
                write!(f, "set topics: {}", topics.join(", "))
            }
            RepositoryChange::SetVulnerabilityAlerts(enabled) => {
                write!(f, "{} vulnerability alerts", toggle(*enabled))
            }
            RepositoryChange::SetAutomatedSecurityFixes(enabled) => {
                write!(f, "{} automated security fixes", toggle(*enabled))
            }
            RepositoryChange::CreateRuleset { name, .. } => write!(f, "create ruleset '{}'", name),
            RepositoryChange::UpdateRuleset { id, name, .. } => {
                write!(f, "update ruleset '{}' (id {})", name, id)
            }
        }
    }
}

/// The creation request for a repository that does not exist yet.
pub fn new_repository(spec: &RepositorySpec) -> NewRepository {
    NewRepository {
        name: spec.name.clone(),
        description: spec.description.clone(),
        visibility: spec.visibility.map(|v| v.as_str().to_string()),
        private: spec.visibility != Some(Visibility::Public),
        auto_init: true,
    }
}

/// Compute the writes that converge `current` to `desired`.
///
/// With no current state the repository is created first and every declared
/// setting is applied on top.
pub fn plan_repository(
    desired: &RepositorySpec,
    current: Option<&CurrentState>,
) -> serde_json::Result<Vec<RepositoryChange>> {
    let mut changes = Vec::new();
    let created = current.is_none();

    let empty = CurrentState::default();
    let current = match current {
        Some(current) => current,
        None => {
            changes.push(RepositoryChange::CreateRepository {
                repo: new_repository(desired),
                template: desired.template.clone(),
            });
            &empty
        }
    };

    let patch = settings_patch(desired, &current.repo, created);
    if !patch.is_empty() {
        changes.push(RepositoryChange::UpdateSettings(patch));
    }

    if !desired.topics.is_empty() && !same_topics(&desired.topics, &current.repo.topics) {
        changes.push(RepositoryChange::ReplaceTopics(desired.topics.clone()));
    }

    if let Some(security) = &desired.security {
        if let Some(want) = security.vulnerability_alerts {
            if current.vulnerability_alerts != Some(want) {
                changes.push(RepositoryChange::SetVulnerabilityAlerts(want));
            }
        }
        if let Some(want) = security.automated_security_fixes {
            if current.automated_security_fixes != Some(want) {
                changes.push(RepositoryChange::SetAutomatedSecurityFixes(want));
            }
        }
    }

    for ruleset in &desired.rulesets {
        let body = ruleset.to_body()?;
        match current
            .rulesets
            .iter()
            .find(|r| r.summary.name == ruleset.name)
        {
            None => changes.push(RepositoryChange::CreateRuleset {
                name: ruleset.name.clone(),
                body,
            }),
            Some(existing) if !json_subset(&body, &existing.body) => {
                changes.push(RepositoryChange::UpdateRuleset {
                    id: existing.summary.id,
                    name: ruleset.name.clone(),
                    body,
                })
            }
            Some(_) => {}
        }
    }

    Ok(changes)
}

fn settings_patch(desired: &RepositorySpec, repo: &GitHubRepo, created: bool) -> RepoSettingsPatch {
    fn differs<T: PartialEq + Clone>(want: &Option<T>, have: &Option<T>) -> Option<T> {
        match want {
            Some(w) if have.as_ref() != Some(w) => Some(w.clone()),
            _ => None,
        }
    }

    let mut patch = RepoSettingsPatch {
        has_issues: differs(&desired.has_issues, &repo.has_issues),
        has_projects: differs(&desired.has_projects, &repo.has_projects),
        has_wiki: differs(&desired.has_wiki, &repo.has_wiki),
        allow_squash_merge: differs(&desired.allow_squash_merge, &repo.allow_squash_merge),
        allow_merge_commit: differs(&desired.allow_merge_commit, &repo.allow_merge_commit),
        allow_rebase_merge: differs(&desired.allow_rebase_merge, &repo.allow_rebase_merge),
        allow_auto_merge: differs(&desired.allow_auto_merge, &repo.allow_auto_merge),
        delete_branch_on_merge: differs(
            &desired.delete_branch_on_merge,
            &repo.delete_branch_on_merge,
        ),
        allow_update_branch: differs(&desired.allow_update_branch, &repo.allow_update_branch),
        ..Default::default()
    };

    // Creation already sets these.
    if created {
        return patch;
    }

    if let Some(description) = &desired.description {
        if repo.description.as_deref().unwrap_or_default() != description {
            patch.description = Some(description.clone());
        }
    }
    if let Some(visibility) = desired.visibility {
        if repo.effective_visibility() != visibility.as_str() {
            patch.visibility = Some(visibility.as_str().to_string());
        }
    }
    if let Some(branch) = &desired.default_branch {
        if &repo.default_branch != branch {
            patch.default_branch = Some(branch.clone());
        }
    }
    patch
}

fn same_topics(desired: &[String], current: &[String]) -> bool {
    let normalise = |topics: &[String]| {
        let mut t: Vec<String> = topics.iter().map(|t| t.trim().to_lowercase()).collect();
        t.sort();
        t.dedup();
        t
    };
    normalise(desired) == normalise(current)
}
