//! Bootstrapping team files and teams from the root `teams.yml`.
//!
//! ```yaml
//! default_sub_teams:
//!   - name: "[team_name]-developers"
//!     description: "Developers for [project]"
//!     repository_permissions: write
//! teams:
//!   - team_name: payments
//!     description: Payments team
//!     project: PAY
//!     repository_permissions: read
//!     members: ["@alice"]
//!     default_repositories: [payments-api]
//! ```

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use super::plan::PlanScope;
use super::spec::{
    DEFAULT_PRIVACY, SubTeamSpec, TeamSpec, TeamsFile, default_permission, null_as_empty,
    usernames, write_teams_file,
};
use super::sync::{TeamReport, reconcile_team};
use crate::error::{OrgError, Result};
use crate::git::{CommitOps, GitOps};
use crate::github::{RepoPermission, TeamOps};
use crate::issues::form_field;
use crate::workspace::Workspace;

/// Commit message for generated team files.
pub const SETUP_COMMIT_MESSAGE: &str = "Setup and update team configurations";

const TEAM_NAME_PLACEHOLDER: &str = "[team_name]";
const PROJECT_PLACEHOLDER: &str = "[project]";

/// The root `teams.yml`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TeamSetupConfig {
    #[serde(default, deserialize_with = "null_as_empty")]
    pub default_sub_teams: Vec<SubTeamTemplate>,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub teams: Vec<TeamSetupEntry>,
}

/// A sub-team every team receives.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubTeamTemplate {
    /// May contain `[team_name]`.
    pub name: String,
    /// May contain `[project]`.
    #[serde(default)]
    pub description: String,
    #[serde(default = "default_permission", alias = "repository_permission")]
    pub repository_permissions: RepoPermission,
}

/// One team to bootstrap.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TeamSetupEntry {
    pub team_name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub project: String,
    #[serde(default = "default_permission", alias = "repository_permission")]
    pub repository_permissions: RepoPermission,
    #[serde(default, deserialize_with = "usernames")]
    pub members: Vec<String>,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub default_repositories: Vec<String>,
}

/// Load the root `teams.yml`.
pub fn load_setup_config(path: &Path) -> Result<TeamSetupConfig> {
    let content = fs::read_to_string(path)?;
    serde_yaml::from_str(&content).map_err(|source| OrgError::Yaml {
        path: path.to_path_buf(),
        source,
    })
}

/// Expand a setup entry into its team file, instantiating default sub-teams.
pub fn expand_team(entry: &TeamSetupEntry, defaults: &[SubTeamTemplate]) -> TeamsFile {
    let default_sub_teams = defaults
        .iter()
        .map(|template| SubTeamSpec {
            name: template.name.replace(TEAM_NAME_PLACEHOLDER, &entry.team_name),
            description: Some(template.description.replace(PROJECT_PLACEHOLDER, &entry.project)),
            members: Vec::new(),
            repositories: entry.default_repositories.clone(),
            repository_permissions: template.repository_permissions.clone(),
        })
        .collect();

    TeamsFile {
        teams: TeamSpec {
            team_name: entry.team_name.clone(),
            description: Some(entry.description.clone()),
            project: Some(entry.project.clone()),
            privacy: DEFAULT_PRIVACY.to_string(),
            repository_permissions: entry.repository_permissions.clone(),
            members: entry.members.clone(),
            repositories: entry.default_repositories.clone(),
            default_sub_teams,
        },
    }
}

/// What happened to one team during setup.
#[derive(Debug)]
pub struct TeamSetupOutcome {
    pub team: String,
    /// The team file, when this run generated it.
    pub written: Option<PathBuf>,
    pub result: Result<TeamReport>,
}

impl TeamSetupOutcome {
    /// Whether the team and its sub-teams were created or updated.
    pub fn is_success(&self) -> bool {
        matches!(&self.result, Ok(report) if report.is_success())
    }
}

/// Generate missing team files and ensure every team and sub-team exists.
///
/// Existing team files are never overwritten. Members and repository access
/// are left to `teams sync`.
pub fn setup_teams<C: TeamOps>(
    client: &C,
    workspace: &Workspace,
    org: &str,
    config: &TeamSetupConfig,
    dry_run: bool,
) -> Result<Vec<TeamSetupOutcome>> {
    let mut outcomes = Vec::with_capacity(config.teams.len());

    for entry in &config.teams {
        if entry.team_name.trim().is_empty() {
            return Err(OrgError::InvalidConfig(
                "teams.yml: every team needs a team_name".into(),
            ));
        }

        let file = expand_team(entry, &config.default_sub_teams);
        let path = workspace.team_file(&entry.team_name);
        let written = if path.exists() {
            info!(team = %entry.team_name, "team file already exists, leaving it untouched");
            None
        } else if dry_run {
            info!(team = %entry.team_name, path = %path.display(), "would write team file");
            None
        } else {
            write_teams_file(&path, &file)?;
            info!(team = %entry.team_name, path = %path.display(), "wrote team file");
            Some(path)
        };

        let result = reconcile_team(client, org, &file.teams, PlanScope::Structure, dry_run);
        if let Err(e) = &result {
            warn!(team = %entry.team_name, error = %e, "team setup failed");
        }
        outcomes.push(TeamSetupOutcome {
            team: entry.team_name.clone(),
            written,
            result,
        });
    }

    Ok(outcomes)
}

/// Commit generated files to the repository containing the workspace.
///
/// Returns `None` when there was nothing to commit.
pub fn commit_generated(workspace: &Workspace, files: &[PathBuf]) -> Result<Option<git2::Oid>> {
    if files.is_empty() {
        return Ok(None);
    }
    let git = GitOps::discover(workspace.root())?;
    let paths: Vec<&Path> = files.iter().map(PathBuf::as_path).collect();
    git.stage_files(&paths)?;
    if !git.has_staged_changes()? {
        return Ok(None);
    }
    let oid = git.commit(SETUP_COMMIT_MESSAGE)?;
    info!(commit = %oid, files = files.len(), "committed team files");
    Ok(Some(oid))
}

/// Parse a team request from an issue body.
///
/// Accepts `Key: value` lines as well as the `### Key` sections of the team
/// creation form; see [`form_field`].
pub fn parse_team_request(body: &str) -> Result<TeamSetupEntry> {
    let field = |name: &str| form_field(body, name);

    let team_name = field("Team Name")?
        .ok_or_else(|| OrgError::InvalidConfig("team request has no Team Name".into()))?;
    let list = |value: Option<String>| -> Vec<String> {
        value
            .map(|v| {
                v.split([',', ' '])
                    .map(|s| s.trim().trim_start_matches('@').to_string())
                    .filter(|s| !s.is_empty())
                    .collect()
            })
            .unwrap_or_default()
    };

    Ok(TeamSetupEntry {
        team_name,
        description: field("Description")?.unwrap_or_default(),
        project: field("Project")?.unwrap_or_default(),
        repository_permissions: field("Repository Permissions")?
            .map(|p| RepoPermission::parse(&p))
            .unwrap_or(RepoPermission::Pull),
        members: list(field("Members")?),
        default_repositories: list(field("Repositories")?),
    })
}

/// Append a team to the root `teams.yml` unless it is already declared.
///
/// Returns whether the file changed.
pub fn register_team(path: &Path, entry: &TeamSetupEntry) -> Result<bool> {
    let mut config = if path.exists() {
        load_setup_config(path)?
    } else {
        TeamSetupConfig::default()
    };

    if config
        .teams
        .iter()
        .any(|t| t.team_name.eq_ignore_ascii_case(&entry.team_name))
    {
        info!(team = %entry.team_name, "team already declared; setup requests cannot update it");
        return Ok(false);
    }

    config.teams.push(entry.clone());
    let content = serde_yaml::to_string(&config).map_err(|source| OrgError::Yaml {
        path: path.to_path_buf(),
        source,
    })?;
    fs::write(path, content)?;
    info!(team = %entry.team_name, "registered team");
    Ok(true)
}
