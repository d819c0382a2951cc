//! `teams/<team>/teams.yml` configuration.

use serde::{Deserialize, Deserializer, Serialize};
use std::fs;
use std::path::Path;

use crate::error::{OrgError, Result};
use crate::github::RepoPermission;
use crate::reviewers::slugify;

/// Privacy of teams created by the reconciler.
pub const DEFAULT_PRIVACY: &str = "closed";

/// Top level of a team file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TeamsFile {
    pub teams: TeamSpec,
}

/// A parent team and its declared sub-teams.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TeamSpec {
    pub team_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project: Option<String>,
    #[serde(default = "default_privacy")]
    pub privacy: String,
    #[serde(
        default = "default_permission",
        alias = "repository_permission"
    )]
    pub repository_permissions: RepoPermission,
    #[serde(default, deserialize_with = "usernames")]
    pub members: Vec<String>,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub repositories: Vec<String>,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub default_sub_teams: Vec<SubTeamSpec>,
}

/// A sub-team nested under the parent team.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubTeamSpec {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, deserialize_with = "usernames")]
    pub members: Vec<String>,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub repositories: Vec<String>,
    #[serde(
        default = "default_permission",
        alias = "repository_permission"
    )]
    pub repository_permissions: RepoPermission,
}

fn default_privacy() -> String {
    DEFAULT_PRIVACY.to_string()
}

pub(super) fn default_permission() -> RepoPermission {
    RepoPermission::Pull
}

pub(super) fn null_as_empty<'de, D, T>(deserializer: D) -> std::result::Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Ok(Option::<Vec<T>>::deserialize(deserializer)?.unwrap_or_default())
}

pub(super) fn usernames<'de, D>(deserializer: D) -> std::result::Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Vec<Option<String>> = null_as_empty(deserializer)?;
    Ok(raw
        .iter()
        .flatten()
        .map(|name| normalize_username(name))
        .filter(|name| !name.is_empty())
        .collect())
}

/// Strip a leading `@`, surrounding quotes and whitespace from a login.
pub fn normalize_username(name: &str) -> String {
    name.trim()
        .trim_start_matches('@')
        .trim_matches(|c| c == '\'' || c == '"')
        .trim()
        .to_string()
}

impl TeamSpec {
    /// Slug of the parent team.
    pub fn slug(&self) -> String {
        slugify(&self.team_name)
    }
}

impl SubTeamSpec {
    /// Slug of this sub-team.
    pub fn slug(&self) -> String {
        slugify(&self.name)
    }
}

/// Load and validate a team file.
pub fn load_teams_file(path: &Path) -> Result<TeamsFile> {
    let content = fs::read_to_string(path)?;
    let file: TeamsFile = serde_yaml::from_str(&content).map_err(|source| OrgError::Yaml {
        path: path.to_path_buf(),
        source,
    })?;

    if file.teams.team_name.trim().is_empty() {
        return Err(OrgError::InvalidConfig(format!(
            "{}: teams.team_name must not be empty",
            path.display()
        )));
    }
    if file
        .teams
        .default_sub_teams
        .iter()
        .any(|s| s.name.trim().is_empty())
    {
        return Err(OrgError::InvalidConfig(format!(
            "{}: a sub-team of {} has no name",
            path.display(),
            file.teams.team_name
        )));
    }
    Ok(file)
}

/// Write a team file, creating its directory.
pub fn write_teams_file(path: &Path, file: &TeamsFile) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let content = serde_yaml::to_string(file).map_err(|source| OrgError::Yaml {
        path: path.to_path_buf(),
        source,
    })?;
    fs::write(path, content)?;
    Ok(())
}
