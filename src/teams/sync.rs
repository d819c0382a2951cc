//! Applying team plans against the platform.

use std::collections::{BTreeMap, BTreeSet};
use std::path::PathBuf;
use tracing::{error, info, warn};

use super::plan::{CurrentHierarchy, CurrentTeam, PlanScope, TeamChange, plan_team_hierarchy};
use super::spec::{TeamSpec, load_teams_file};
use crate::error::{OrgError, Result};
use crate::github::{NewTeam, RepoOps, TeamOps, TeamPatch};
use crate::reconcile::{FileResult, ReconcileReport};
use crate::workspace::Workspace;

/// Report of one team hierarchy reconciliation.
pub type TeamReport = ReconcileReport<TeamChange>;

fn fetch_team<C: TeamOps>(client: &C, org: &str, slug: &str) -> Result<Option<CurrentTeam>> {
    let Some(team) = client.get_team(org, slug)? else {
        return Ok(None);
    };
    let members = client.list_team_members(org, slug)?;
    let mut inherited = BTreeSet::new();
    for child in client.list_child_teams(org, slug)? {
        for login in client.list_team_members(org, &child.slug)? {
            inherited.insert(login.to_lowercase());
        }
    }
    let repos = client.list_team_repos(org, slug)?;
    Ok(Some(CurrentTeam {
        team,
        members,
        inherited,
        repos,
    }))
}

/// Fetch the parent team, every declared sub-team and the parent's children.
pub fn fetch_hierarchy<C: TeamOps>(client: &C, org: &str, spec: &TeamSpec) -> Result<CurrentHierarchy> {
    let parent_slug = spec.slug();
    let parent = fetch_team(client, org, &parent_slug)?;
    let children = match parent {
        Some(_) => client.list_child_teams(org, &parent_slug)?,
        None => Vec::new(),
    };

    let mut sub_teams = BTreeMap::new();
    for sub in &spec.default_sub_teams {
        let slug = sub.slug();
        let current = fetch_team(client, org, &slug)?;
        sub_teams.insert(slug, current);
    }

    Ok(CurrentHierarchy {
        parent,
        sub_teams,
        children,
    })
}

/// Converge a team hierarchy to its declaration.
pub fn reconcile_team<C: TeamOps>(
    client: &C,
    org: &str,
    spec: &TeamSpec,
    scope: PlanScope,
    dry_run: bool,
) -> Result<TeamReport> {
    let current = fetch_hierarchy(client, org, spec)?;
    let changes = plan_team_hierarchy(spec, &current, scope);

    let mut report = ReconcileReport::new(&spec.team_name, dry_run);
    if dry_run {
        report.record_planned(changes);
    } else {
        report.apply_each(changes, |change| apply_change(client, org, change));
    }
    Ok(report)
}

fn team_id<C: TeamOps>(client: &C, org: &str, slug: &str) -> Result<u64> {
    client
        .get_team(org, slug)?
        .map(|t| t.id)
        .ok_or_else(|| OrgError::github(404, format!("team {} not found", slug)))
}

fn apply_change<C: TeamOps>(client: &C, org: &str, change: &TeamChange) -> Result<()> {
    match change {
        TeamChange::CreateTeam {
            name,
            description,
            privacy,
            parent,
        } => {
            let parent_team_id = parent
                .as_deref()
                .map(|slug| team_id(client, org, slug))
                .transpose()?;
            client.create_team(
                org,
                &NewTeam {
                    name: name.clone(),
                    description: description.clone(),
                    privacy: privacy.clone(),
                    parent_team_id,
                },
            )?;
            Ok(())
        }
        TeamChange::UpdateTeam {
            slug,
            description,
            privacy,
            parent,
        } => {
            let parent_team_id = parent
                .as_deref()
                .map(|slug| team_id(client, org, slug))
                .transpose()?;
            let patch = TeamPatch {
                description: description.clone(),
                privacy: privacy.clone(),
                parent_team_id,
            };
            client.update_team(org, slug, &patch)?;
            Ok(())
        }
        TeamChange::DeleteTeam { slug } => client.delete_team(org, slug),
        TeamChange::AddMember { team, login } => client.add_team_member(org, team, login),
        TeamChange::RemoveMember { team, login } => client.remove_team_member(org, team, login),
        TeamChange::SetRepoPermission {
            team,
            repo,
            permission,
        } => client.set_team_repo_permission(org, team, repo, permission),
        TeamChange::RemoveRepo { team, repo } => {
            match client.remove_team_repo(org, team, repo) {
                Err(e) if e.is_not_found() => {
                    warn!(team = %team, repository = %repo, "team already had no access");
                    Ok(())
                }
                other => other,
            }
        }
    }
}

/// Reconcile each team file; one failing file does not stop the others.
pub fn sync_team_files<C: TeamOps>(
    client: &C,
    org: &str,
    files: &[PathBuf],
    dry_run: bool,
) -> Vec<FileResult<TeamChange>> {
    files
        .iter()
        .map(|path| {
            info!(path = %path.display(), "processing team file");
            let result = load_teams_file(path)
                .and_then(|file| reconcile_team(client, org, &file.teams, PlanScope::Full, dry_run));
            if let Err(e) = &result {
                error!(path = %path.display(), error = %e, "team sync failed");
            }
            FileResult {
                path: path.clone(),
                result,
            }
        })
        .collect()
}

/// Team files touched between two commits of the administration repository.
///
/// Falls back to every team file when the comparison cannot be fetched.
pub fn changed_team_files<C: RepoOps>(
    client: &C,
    workspace: &Workspace,
    owner: &str,
    repo: &str,
    base: &str,
    head: &str,
) -> Result<Vec<PathBuf>> {
    match client.compare_files(owner, repo, base, head) {
        Ok(changed) => Ok(workspace.changed_team_files(&changed)),
        Err(e) => {
            warn!(error = %e, base, head, "could not compare commits; processing all team files");
            workspace.team_files()
        }
    }
}
