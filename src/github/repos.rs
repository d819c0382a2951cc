//! GitHub repository operations.

use crate::error::Result;
use crate::github::GitHubClient;
use serde::{Deserialize, Serialize};

/// Repository information from GitHub API.
///
/// Settings that GitHub only reports to administrators are optional.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GitHubRepo {
    pub id: u64,
    pub name: String,
    pub full_name: String,
    #[serde(default)]
    pub default_branch: String,
    #[serde(default)]
    pub archived: bool,
    #[serde(default)]
    pub fork: bool,
    #[serde(default)]
    pub topics: Vec<String>,
    pub description: Option<String>,
    #[serde(rename = "private", default)]
    pub is_private: bool,
    pub visibility: Option<String>,
    pub has_issues: Option<bool>,
    pub has_projects: Option<bool>,
    pub has_wiki: Option<bool>,
    pub allow_squash_merge: Option<bool>,
    pub allow_merge_commit: Option<bool>,
    pub allow_rebase_merge: Option<bool>,
    pub allow_auto_merge: Option<bool>,
    pub delete_branch_on_merge: Option<bool>,
    pub allow_update_branch: Option<bool>,
}

impl GitHubRepo {
    /// Effective visibility, falling back to the `private` flag on older servers.
    pub fn effective_visibility(&self) -> &str {
        match self.visibility.as_deref() {
            Some(v) => v,
            None if self.is_private => "private",
            None => "public",
        }
    }
}

/// Body for creating a repository.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NewRepository {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub visibility: Option<String>,
    pub private: bool,
    pub auto_init: bool,
}

/// Partial update of repository settings; unset fields are left untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RepoSettingsPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub visibility: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default_branch: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub has_issues: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub has_projects: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub has_wiki: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub allow_squash_merge: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub allow_merge_commit: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub allow_rebase_merge: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub allow_auto_merge: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub delete_branch_on_merge: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub allow_update_branch: Option<bool>,
}

impl RepoSettingsPatch {
    /// True when no field would be sent.
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Names of the fields this patch sets.
    pub fn field_names(&self) -> Vec<&'static str> {
        let mut names = Vec::new();
        macro_rules! field {
            ($($f:ident),*) => {
                $(if self.$f.is_some() { names.push(stringify!($f)); })*
            };
        }
        field!(
            description,
            visibility,
            default_branch,
            has_issues,
            has_projects,
            has_wiki,
            allow_squash_merge,
            allow_merge_commit,
            allow_rebase_merge,
            allow_auto_merge,
            delete_branch_on_merge,
            allow_update_branch
        );
        names
    }
}

/// Repository lookup and settings operations.
pub trait RepoOps {
    /// List all repositories in an organization.
    fn list_org_repos(&self, org: &str) -> Result<Vec<GitHubRepo>>;

    /// Get a specific repository, or `None` if it does not exist.
    fn get_repo(&self, owner: &str, name: &str) -> Result<Option<GitHubRepo>>;

    /// Create a repository in an organization.
    fn create_org_repo(&self, org: &str, repo: &NewRepository) -> Result<GitHubRepo>;

    /// Create a repository in `owner` from a template repository.
    fn create_from_template(
        &self,
        template_owner: &str,
        template_name: &str,
        owner: &str,
        repo: &NewRepository,
    ) -> Result<GitHubRepo>;

    /// Apply a partial settings update.
    fn update_repo(&self, owner: &str, name: &str, patch: &RepoSettingsPatch) -> Result<GitHubRepo>;

    /// Replace all topics of a repository.
    fn replace_topics(&self, owner: &str, name: &str, topics: &[String]) -> Result<()>;

    /// Whether Dependabot vulnerability alerts are enabled.
    fn vulnerability_alerts_enabled(&self, owner: &str, name: &str) -> Result<bool>;

    /// Enable or disable Dependabot vulnerability alerts.
    fn set_vulnerability_alerts(&self, owner: &str, name: &str, enabled: bool) -> Result<()>;

    /// Whether automated security fixes are enabled.
    fn automated_security_fixes_enabled(&self, owner: &str, name: &str) -> Result<bool>;

    /// Enable or disable automated security fixes.
    fn set_automated_security_fixes(&self, owner: &str, name: &str, enabled: bool)
    -> Result<()>;

    /// Read a file at a git reference, or `None` if it does not exist there.
    fn get_file_contents(
        &self,
        owner: &str,
        name: &str,
        path: &str,
        reference: &str,
    ) -> Result<Option<String>>;

    /// Paths of files changed between two commits.
    fn compare_files(&self, owner: &str, name: &str, base: &str, head: &str)
    -> Result<Vec<String>>;
}

impl RepoOps for GitHubClient {
    fn list_org_repos(&self, org: &str) -> Result<Vec<GitHubRepo>> {
        self.get_paginated(&format!("/orgs/{}/repos?type=all", org))
    }

    fn get_repo(&self, owner: &str, name: &str) -> Result<Option<GitHubRepo>> {
        self.get_optional(&format!("/repos/{}/{}", owner, name))
    }

    fn create_org_repo(&self, org: &str, repo: &NewRepository) -> Result<GitHubRepo> {
        self.post(&format!("/orgs/{}/repos", org), repo)
    }

    fn create_from_template(
        &self,
        template_owner: &str,
        template_name: &str,
        owner: &str,
        repo: &NewRepository,
    ) -> Result<GitHubRepo> {
        #[derive(Serialize)]
        struct Generate<'a> {
            owner: &'a str,
            name: &'a str,
            #[serde(skip_serializing_if = "Option::is_none")]
            description: Option<&'a str>,
            private: bool,
        }

        let body = Generate {
            owner,
            name: &repo.name,
            description: repo.description.as_deref(),
            private: repo.private,
        };
        self.post(
            &format!("/repos/{}/{}/generate", template_owner, template_name),
            &body,
        )
    }

    fn update_repo(&self, owner: &str, name: &str, patch: &RepoSettingsPatch) -> Result<GitHubRepo> {
        self.patch(&format!("/repos/{}/{}", owner, name), patch)
    }

    fn replace_topics(&self, owner: &str, name: &str, topics: &[String]) -> Result<()> {
        #[derive(Serialize)]
        struct Topics<'a> {
            names: &'a [String],
        }
        self.put_unit(
            &format!("/repos/{}/{}/topics", owner, name),
            &Topics { names: topics },
        )
    }

    fn vulnerability_alerts_enabled(&self, owner: &str, name: &str) -> Result<bool> {
        self.status_ok(&format!("/repos/{}/{}/vulnerability-alerts", owner, name))
    }

    fn set_vulnerability_alerts(&self, owner: &str, name: &str, enabled: bool) -> Result<()> {
        let endpoint = format!("/repos/{}/{}/vulnerability-alerts", owner, name);
        if enabled {
            self.put_unit(&endpoint, &serde_json::json!({}))
        } else {
            self.delete(&endpoint)
        }
    }

    fn automated_security_fixes_enabled(&self, owner: &str, name: &str) -> Result<bool> {
        #[derive(Deserialize)]
        struct Status {
            enabled: bool,
        }
        let status: Option<Status> =
            self.get_optional(&format!("/repos/{}/{}/automated-security-fixes", owner, name))?;
        Ok(status.is_some_and(|s| s.enabled))
    }

    fn set_automated_security_fixes(
        &self,
        owner: &str,
        name: &str,
        enabled: bool,
    ) -> Result<()> {
        let endpoint = format!("/repos/{}/{}/automated-security-fixes", owner, name);
        if enabled {
            self.put_unit(&endpoint, &serde_json::json!({}))
        } else {
            self.delete(&endpoint)
        }
    }

    fn get_file_contents(
        &self,
        owner: &str,
        name: &str,
        path: &str,
        reference: &str,
    ) -> Result<Option<String>> {
        match self.get_raw(&contents_endpoint(owner, name, path, reference)) {
            Ok(content) => Ok(Some(content)),
            Err(e) if e.is_not_found() => Ok(None),
            Err(e) => Err(e),
        }
    }

    fn compare_files(
        &self,
        owner: &str,
        name: &str,
        base: &str,
        head: &str,
    ) -> Result<Vec<String>> {
        #[derive(Deserialize)]
        struct Comparison {
            #[serde(default)]
            files: Vec<ChangedFile>,
        }
        #[derive(Deserialize)]
        struct ChangedFile {
            filename: String,
        }

        let comparison: Comparison = self.get(&compare_endpoint(owner, name, base, head))?;
        Ok(comparison.files.into_iter().map(|f| f.filename).collect())
    }
}

/// Percent-encode each `/`-separated segment, keeping the separators.
fn encode_segments(value: &str) -> String {
    value
        .split('/')
        .map(|segment| urlencoding::encode(segment).into_owned())
        .collect::<Vec<_>>()
        .join("/")
}

fn contents_endpoint(owner: &str, name: &str, path: &str, reference: &str) -> String {
    format!(
        "/repos/{}/{}/contents/{}?ref={}",
        owner,
        name,
        encode_segments(path.trim_start_matches('/')),
        urlencoding::encode(reference)
    )
}

fn compare_endpoint(owner: &str, name: &str, base: &str, head: &str) -> String {
    format!(
        "/repos/{}/{}/compare/{}...{}",
        owner,
        name,
        encode_segments(base),
        encode_segments(head)
    )
}

/// Extension methods for filtering repository lists.
pub trait RepoFilterExt {
    /// Filter to non-archived repositories.
    fn active(self) -> Self;
}

impl RepoFilterExt for Vec<GitHubRepo> {
    fn active(self) -> Self {
        self.into_iter().filter(|r| !r.archived).collect()
    }
}
