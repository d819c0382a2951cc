//! Applying repository plans against the platform.

use std::collections::HashSet;
use std::path::PathBuf;
use tracing::{error, info};

use super::plan::{CurrentRuleset, CurrentState, RepositoryChange, plan_repository};
use super::spec::{RepositorySpec, load_from_path, write_repository_file};
use crate::error::{OrgError, Result};
use crate::github::{RepoOps, RulesetOps, split_full_name};
use crate::reconcile::{FileResult, ReconcileReport};
use crate::workspace::Workspace;

/// Report of one repository reconciliation.
pub type RepositoryReport = ReconcileReport<RepositoryChange>;

/// Fetch everything the spec manages, or `None` if the repository is missing.
///
/// Security flags and rulesets are only fetched when the spec declares them.
pub fn fetch_current_state<C: RepoOps + RulesetOps>(
    client: &C,
    owner: &str,
    spec: &RepositorySpec,
) -> Result<Option<CurrentState>> {
    let Some(repo) = client.get_repo(owner, &spec.name)? else {
        return Ok(None);
    };

    let security = spec.security.clone().unwrap_or_default();
    let vulnerability_alerts = match security.vulnerability_alerts {
        Some(_) => Some(client.vulnerability_alerts_enabled(owner, &spec.name)?),
        None => None,
    };
    let automated_security_fixes = match security.automated_security_fixes {
        Some(_) => Some(client.automated_security_fixes_enabled(owner, &spec.name)?),
        None => None,
    };

    let mut rulesets = Vec::new();
    if !spec.rulesets.is_empty() {
        let declared: HashSet<&str> = spec.rulesets.iter().map(|r| r.name.as_str()).collect();
        for summary in client.list_rulesets(owner, &spec.name)? {
            if declared.contains(summary.name.as_str()) {
                let body = client.get_ruleset(owner, &spec.name, summary.id)?;
                rulesets.push(CurrentRuleset { summary, body });
            }
        }
    }

    Ok(Some(CurrentState {
        repo,
        vulnerability_alerts,
        automated_security_fixes,
        rulesets,
    }))
}

/// Converge one repository to its spec, creating it if absent.
pub fn reconcile_repository<C: RepoOps + RulesetOps>(
    client: &C,
    owner: &str,
    spec: &RepositorySpec,
    dry_run: bool,
) -> Result<RepositoryReport> {
    let current = fetch_current_state(client, owner, spec)?;
    let changes = plan_repository(spec, current.as_ref())?;

    let mut report = ReconcileReport::new(&spec.name, dry_run);
    if dry_run {
        report.record_planned(changes);
    } else {
        report.apply_each(changes, |change| apply_change(client, owner, &spec.name, change));
    }
    Ok(report)
}

fn apply_change<C: RepoOps + RulesetOps>(
    client: &C,
    owner: &str,
    name: &str,
    change: &RepositoryChange,
) -> Result<()> {
    match change {
        RepositoryChange::CreateRepository { repo, template } => {
            match template {
                Some(template) => {
                    let (template_owner, template_name) = split_full_name(template)?;
                    client.create_from_template(template_owner, template_name, owner, repo)?;
                }
                None => {
                    client.create_org_repo(owner, repo)?;
                }
            }
            Ok(())
        }
        RepositoryChange::UpdateSettings(patch) => {
            client.update_repo(owner, name, patch).map(|_| ())
        }
        RepositoryChange::ReplaceTopics(topics) => client.replace_topics(owner, name, topics),
        RepositoryChange::SetVulnerabilityAlerts(enabled) => {
            client.set_vulnerability_alerts(owner, name, *enabled)
        }
        RepositoryChange::SetAutomatedSecurityFixes(enabled) => {
            client.set_automated_security_fixes(owner, name, *enabled)
        }
        RepositoryChange::CreateRuleset { body, .. } => {
            client.create_ruleset(owner, name, body).map(|_| ())
        }
        RepositoryChange::UpdateRuleset { id, body, .. } => {
            client.update_ruleset(owner, name, *id, body)
        }
    }
}

/// Create a new repository and record its configuration in the workspace.
///
/// Refuses to touch a repository that already exists. The configuration file
/// is written once every change succeeded.
pub fn create_repository<C: RepoOps + RulesetOps>(
    client: &C,
    workspace: &Workspace,
    owner: &str,
    spec: &RepositorySpec,
    dry_run: bool,
) -> Result<(RepositoryReport, Option<PathBuf>)> {
    if client.get_repo(owner, &spec.name)?.is_some() {
        return Err(OrgError::InvalidConfig(format!(
            "repository {}/{} already exists",
            owner, spec.name
        )));
    }

    let report = reconcile_repository(client, owner, spec, dry_run)?;
    if dry_run || !report.is_success() {
        return Ok((report, None));
    }

    let path = write_repository_file(workspace, spec)?;
    info!(path = %path.display(), "wrote repository configuration");
    Ok((report, Some(path)))
}

/// Reconcile each changed repository configuration file.
///
/// A file that fails to load or reconcile does not stop the others.
pub fn update_repositories<C: RepoOps + RulesetOps>(
    client: &C,
    workspace: &Workspace,
    owner: &str,
    files: &[PathBuf],
    dry_run: bool,
) -> Vec<FileResult<RepositoryChange>> {
    files
        .iter()
        .map(|path| {
            let result = load_from_path(workspace, path)
                .and_then(|spec| reconcile_repository(client, owner, &spec, dry_run));
            if let Err(e) = &result {
                error!(path = %path.display(), error = %e, "repository update failed");
            }
            FileResult {
                path: path.clone(),
                result,
            }
        })
        .collect()
}
