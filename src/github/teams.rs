//! Organization team operations.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::Result;
use crate::github::GitHubClient;

/// A team in an organization.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Team {
    pub id: u64,
    pub name: String,
    pub slug: String,
    pub description: Option<String>,
    pub privacy: Option<String>,
    pub parent: Option<TeamParent>,
}

/// Parent reference embedded in a team.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TeamParent {
    pub id: u64,
    pub slug: String,
}

/// Body for creating a team.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NewTeam {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub privacy: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent_team_id: Option<u64>,
}

/// Partial team update.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TeamPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub privacy: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent_team_id: Option<u64>,
}

impl TeamPatch {
    /// True when no field would be sent.
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

/// A team's access level on a repository, in API vocabulary.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum RepoPermission {
    Pull,
    Triage,
    Push,
    Maintain,
    Admin,
    /// An organization-defined custom repository role.
    Custom(String),
}

impl RepoPermission {
    /// Parse either configuration vocabulary (`read`, `write`) or API vocabulary.
    pub fn parse(value: &str) -> Self {
        match value.trim().to_lowercase().as_str() {
            "read" | "pull" => RepoPermission::Pull,
            "write" | "push" => RepoPermission::Push,
            "triage" => RepoPermission::Triage,
            "maintain" => RepoPermission::Maintain,
            "admin" => RepoPermission::Admin,
            other => RepoPermission::Custom(other.to_string()),
        }
    }

    /// The value the API expects.
    pub fn as_api_str(&self) -> &str {
        match self {
            RepoPermission::Pull => "pull",
            RepoPermission::Triage => "triage",
            RepoPermission::Push => "push",
            RepoPermission::Maintain => "maintain",
            RepoPermission::Admin => "admin",
            RepoPermission::Custom(name) => name,
        }
    }
}

impl From<String> for RepoPermission {
    fn from(value: String) -> Self {
        RepoPermission::parse(&value)
    }
}

impl From<RepoPermission> for String {
    fn from(value: RepoPermission) -> Self {
        value.as_api_str().to_string()
    }
}

impl fmt::Display for RepoPermission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_api_str())
    }
}

/// A repository a team has access to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TeamRepoAccess {
    pub name: String,
    pub permission: RepoPermission,
}

#[derive(Deserialize)]
struct TeamRepoResponse {
    name: String,
    role_name: Option<String>,
    #[serde(default)]
    permissions: Option<PermissionFlags>,
}

#[derive(Deserialize, Default)]
struct PermissionFlags {
    #[serde(default)]
    admin: bool,
    #[serde(default)]
    maintain: bool,
    #[serde(default)]
    push: bool,
    #[serde(default)]
    triage: bool,
}

impl TeamRepoResponse {
    fn into_access(self) -> TeamRepoAccess {
        let permission = match (self.role_name, self.permissions) {
            (Some(role), _) => RepoPermission::parse(&role),
            (None, Some(p)) if p.admin => RepoPermission::Admin,
            (None, Some(p)) if p.maintain => RepoPermission::Maintain,
            (None, Some(p)) if p.push => RepoPermission::Push,
            (None, Some(p)) if p.triage => RepoPermission::Triage,
            _ => RepoPermission::Pull,
        };
        TeamRepoAccess {
            name: self.name,
            permission,
        }
    }
}

/// Team CRUD, membership and repository access operations.
pub trait TeamOps {
    /// Get a team by slug, or `None` if it does not exist.
    fn get_team(&self, org: &str, slug: &str) -> Result<Option<Team>>;

    /// Create a team.
    fn create_team(&self, org: &str, team: &NewTeam) -> Result<Team>;

    /// Update a team.
    fn update_team(&self, org: &str, slug: &str, patch: &TeamPatch) -> Result<Team>;

    /// Delete a team.
    fn delete_team(&self, org: &str, slug: &str) -> Result<()>;

    /// Direct child teams of a team.
    fn list_child_teams(&self, org: &str, slug: &str) -> Result<Vec<Team>>;

    /// Logins of a team's members, including members of its child teams.
    fn list_team_members(&self, org: &str, slug: &str) -> Result<Vec<String>>;

    /// Add a user to a team as a regular member.
    fn add_team_member(&self, org: &str, slug: &str, login: &str) -> Result<()>;

    /// Remove a user from a team.
    fn remove_team_member(&self, org: &str, slug: &str, login: &str) -> Result<()>;

    /// Repositories the team has access to.
    fn list_team_repos(&self, org: &str, slug: &str) -> Result<Vec<TeamRepoAccess>>;

    /// Grant or change a team's permission on a repository owned by `org`.
    fn set_team_repo_permission(
        &self,
        org: &str,
        slug: &str,
        repo: &str,
        permission: &RepoPermission,
    ) -> Result<()>;

    /// Revoke a team's access to a repository owned by `org`.
    fn remove_team_repo(&self, org: &str, slug: &str, repo: &str) -> Result<()>;
}

impl TeamOps for GitHubClient {
    fn get_team(&self, org: &str, slug: &str) -> Result<Option<Team>> {
        self.get_optional(&format!("/orgs/{}/teams/{}", org, slug))
    }

    fn create_team(&self, org: &str, team: &NewTeam) -> Result<Team> {
        self.post(&format!("/orgs/{}/teams", org), team)
    }

    fn update_team(&self, org: &str, slug: &str, patch: &TeamPatch) -> Result<Team> {
        self.patch(&format!("/orgs/{}/teams/{}", org, slug), patch)
    }

    fn delete_team(&self, org: &str, slug: &str) -> Result<()> {
        self.delete(&format!("/orgs/{}/teams/{}", org, slug))
    }

    fn list_child_teams(&self, org: &str, slug: &str) -> Result<Vec<Team>> {
        self.get_paginated(&format!("/orgs/{}/teams/{}/teams", org, slug))
    }

    fn list_team_members(&self, org: &str, slug: &str) -> Result<Vec<String>> {
        #[derive(Deserialize)]
        struct Member {
            login: String,
        }
        let members: Vec<Member> =
            self.get_paginated(&format!("/orgs/{}/teams/{}/members", org, slug))?;
        Ok(members.into_iter().map(|m| m.login).collect())
    }

    fn add_team_member(&self, org: &str, slug: &str, login: &str) -> Result<()> {
        self.put_unit(
            &format!("/orgs/{}/teams/{}/memberships/{}", org, slug, login),
            &serde_json::json!({ "role": "member" }),
        )
    }

    fn remove_team_member(&self, org: &str, slug: &str, login: &str) -> Result<()> {
        self.delete(&format!("/orgs/{}/teams/{}/memberships/{}", org, slug, login))
    }

    fn list_team_repos(&self, org: &str, slug: &str) -> Result<Vec<TeamRepoAccess>> {
        let repos: Vec<TeamRepoResponse> =
            self.get_paginated(&format!("/orgs/{}/teams/{}/repos", org, slug))?;
        Ok(repos.into_iter().map(TeamRepoResponse::into_access).collect())
    }

    fn set_team_repo_permission(
        &self,
        org: &str,
        slug: &str,
        repo: &str,
        permission: &RepoPermission,
    ) -> Result<()> {
        self.put_unit(
            &format!("/orgs/{}/teams/{}/repos/{}/{}", org, slug, org, repo),
            &serde_json::json!({ "permission": permission.as_api_str() }),
        )
    }

    fn remove_team_repo(&self, org: &str, slug: &str, repo: &str) -> Result<()> {
        self.delete(&format!("/orgs/{}/teams/{}/repos/{}/{}", org, slug, org, repo))
    }
}
