//! In-memory GitHub used by the integration tests.
//!
//! Every successful write is appended to a log so tests can assert that a
//! second reconciliation issues nothing.

#![allow(dead_code)]

use orgops::error::{OrgError, Result};
use orgops::github::{
    CommitStatus, GitHubRepo, Issue, IssueOps, IssueUpdate, Label, NewRepository, NewTeam,
    PullRequest, PullRequestOps, PullRequestRef, RepoOps, RepoPermission, RepoSettingsPatch,
    Review, RulesetOps, RulesetSummary, Team, TeamOps, TeamParent, TeamPatch, TeamRepoAccess,
    UserRef,
};
use orgops::reviewers::slugify;
use serde_json::{Value, json};
use std::cell::RefCell;
use std::collections::{BTreeMap, HashMap};

#[derive(Debug, Default)]
pub struct State {
    pub repos: BTreeMap<String, GitHubRepo>,
    pub vulnerability_alerts: HashMap<String, bool>,
    pub security_fixes: HashMap<String, bool>,
    pub rulesets: BTreeMap<String, Vec<(u64, Value)>>,
    pub teams: BTreeMap<String, Team>,
    pub members: BTreeMap<String, Vec<String>>,
    pub team_repos: BTreeMap<String, Vec<TeamRepoAccess>>,
    pub pulls: HashMap<u64, PullRequest>,
    pub reviews: HashMap<u64, Vec<Review>>,
    pub requested: Vec<String>,
    pub assignees: Vec<String>,
    pub statuses: Vec<(String, CommitStatus)>,
    pub dismiss_stale: bool,
    /// (reference, path) to file content.
    pub files: HashMap<(String, String), String>,
    /// `None` makes the compare API fail.
    pub compare: Option<Vec<String>>,
    pub issues: HashMap<u64, Issue>,
    pub comments: Vec<(u64, String)>,
    next_id: u64,
}

impl State {
    fn id(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }
}

/// A GitHub organisation held in memory.
#[derive(Default)]
pub struct FakeGitHub {
    pub state: RefCell<State>,
    writes: RefCell<Vec<String>>,
    failing: RefCell<Vec<String>>,
}

impl FakeGitHub {
    pub fn new() -> Self {
        Self::default()
    }

    /// Writes whose log line starts with `prefix` fail with a 422.
    pub fn fail_writes(&self, prefix: &str) {
        self.failing.borrow_mut().push(prefix.to_string());
    }

    pub fn writes(&self) -> Vec<String> {
        self.writes.borrow().clone()
    }

    pub fn clear_writes(&self) {
        self.writes.borrow_mut().clear();
    }

    fn write(&self, line: String) -> Result<()> {
        if self.failing.borrow().iter().any(|p| line.starts_with(p)) {
            return Err(OrgError::github(422, format!("rejected: {}", line)));
        }
        self.writes.borrow_mut().push(line);
        Ok(())
    }

    pub fn add_repo(&self, name: &str) -> GitHubRepo {
        let mut state = self.state.borrow_mut();
        let id = state.id();
        let repo = GitHubRepo {
            id,
            name: name.to_string(),
            full_name: format!("acme/{}", name),
            default_branch: "main".into(),
            visibility: Some("private".into()),
            is_private: true,
            has_issues: Some(true),
            has_projects: Some(true),
            has_wiki: Some(true),
            allow_squash_merge: Some(true),
            allow_merge_commit: Some(true),
            allow_rebase_merge: Some(true),
            allow_auto_merge: Some(false),
            delete_branch_on_merge: Some(false),
            allow_update_branch: Some(false),
            ..Default::default()
        };
        state.repos.insert(name.to_string(), repo.clone());
        repo
    }

    pub fn add_team(&self, name: &str, parent: Option<&str>, members: &[&str]) -> Team {
        let mut state = self.state.borrow_mut();
        let id = state.id();
        let slug = slugify(name);
        let parent = parent.and_then(|p| state.teams.get(p)).map(|p| TeamParent {
            id: p.id,
            slug: p.slug.clone(),
        });
        let team = Team {
            id,
            name: name.to_string(),
            slug: slug.clone(),
            description: None,
            privacy: Some("closed".into()),
            parent,
        };
        state.teams.insert(slug.clone(), team.clone());
        state
            .members
            .insert(slug, members.iter().map(|m| m.to_string()).collect());
        team
    }

    pub fn add_pull(&self, number: u64, author: &str, base: &str, head_sha: &str) {
        self.state.borrow_mut().pulls.insert(
            number,
            PullRequest {
                number,
                title: format!("PR {}", number),
                user: UserRef {
                    login: author.to_string(),
                },
                head: PullRequestRef {
                    ref_name: "topic".into(),
                    sha: head_sha.to_string(),
                },
                base: PullRequestRef {
                    ref_name: base.to_string(),
                    sha: "base-sha".into(),
                },
                draft: false,
            },
        );
    }

    pub fn add_issue(&self, number: u64, title: &str, body: &str, labels: &[&str]) {
        self.state.borrow_mut().issues.insert(
            number,
            Issue {
                number,
                title: title.to_string(),
                body: Some(body.to_string()),
                labels: labels
                    .iter()
                    .map(|l| Label {
                        name: l.to_string(),
                    })
                    .collect(),
            },
        );
    }

    fn not_found(what: impl std::fmt::Display) -> OrgError {
        OrgError::github(404, format!("{} not found", what))
    }
}

impl RepoOps for FakeGitHub {
    fn list_org_repos(&self, _org: &str) -> Result<Vec<GitHubRepo>> {
        Ok(self.state.borrow().repos.values().cloned().collect())
    }

    fn get_repo(&self, _owner: &str, name: &str) -> Result<Option<GitHubRepo>> {
        Ok(self.state.borrow().repos.get(name).cloned())
    }

    fn create_org_repo(&self, org: &str, repo: &NewRepository) -> Result<GitHubRepo> {
        self.write(format!("create_repo {}", repo.name))?;
        self.add_repo(&repo.name);
        let mut state = self.state.borrow_mut();
        let stored = state
            .repos
            .get_mut(&repo.name)
            .ok_or_else(|| Self::not_found(&repo.name))?;
        stored.full_name = format!("{}/{}", org, repo.name);
        stored.description = repo.description.clone();
        stored.is_private = repo.private;
        stored.visibility = repo
            .visibility
            .clone()
            .or_else(|| Some(if repo.private { "private" } else { "public" }.into()));
        Ok(stored.clone())
    }

    fn create_from_template(
        &self,
        template_owner: &str,
        template_name: &str,
        owner: &str,
        repo: &NewRepository,
    ) -> Result<GitHubRepo> {
        if !self.state.borrow().repos.contains_key(template_name) {
            return Err(Self::not_found(format!("{}/{}", template_owner, template_name)));
        }
        self.write(format!(
            "generate_repo {} from {}/{}",
            repo.name, template_owner, template_name
        ))?;
        self.add_repo(&repo.name);
        let mut state = self.state.borrow_mut();
        let stored = state
            .repos
            .get_mut(&repo.name)
            .ok_or_else(|| Self::not_found(&repo.name))?;
        stored.full_name = format!("{}/{}", owner, repo.name);
        stored.description = repo.description.clone();
        stored.is_private = repo.private;
        stored.visibility = Some(if repo.private { "private" } else { "public" }.into());
        Ok(stored.clone())
    }

    fn update_repo(&self, _owner: &str, name: &str, patch: &RepoSettingsPatch) -> Result<GitHubRepo> {
        self.write(format!("update_repo {} {}", name, patch.field_names().join(",")))?;
        let mut state = self.state.borrow_mut();
        let repo = state.repos.get_mut(name).ok_or_else(|| Self::not_found(name))?;

        if let Some(v) = &patch.description {
            repo.description = Some(v.clone());
        }
        if let Some(v) = &patch.visibility {
            repo.visibility = Some(v.clone());
            repo.is_private = v != "public";
        }
        if let Some(v) = &patch.default_branch {
            repo.default_branch = v.clone();
        }
        macro_rules! flags {
            ($($f:ident),*) => { $(if patch.$f.is_some() { repo.$f = patch.$f; })* };
        }
        flags!(
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
        Ok(repo.clone())
    }

    fn replace_topics(&self, _owner: &str, name: &str, topics: &[String]) -> Result<()> {
        self.write(format!("replace_topics {} {}", name, topics.join(",")))?;
        let mut state = self.state.borrow_mut();
        let repo = state.repos.get_mut(name).ok_or_else(|| Self::not_found(name))?;
        // The platform lower-cases topics.
        repo.topics = topics.iter().map(|t| t.to_lowercase()).collect();
        Ok(())
    }

    fn vulnerability_alerts_enabled(&self, _owner: &str, name: &str) -> Result<bool> {
        Ok(self
            .state
            .borrow()
            .vulnerability_alerts
            .get(name)
            .copied()
            .unwrap_or(false))
    }

    fn set_vulnerability_alerts(&self, _owner: &str, name: &str, enabled: bool) -> Result<()> {
        self.write(format!("vulnerability_alerts {} {}", name, enabled))?;
        self.state
            .borrow_mut()
            .vulnerability_alerts
            .insert(name.to_string(), enabled);
        Ok(())
    }

    fn automated_security_fixes_enabled(&self, _owner: &str, name: &str) -> Result<bool> {
        Ok(self
            .state
            .borrow()
            .security_fixes
            .get(name)
            .copied()
            .unwrap_or(false))
    }

    fn set_automated_security_fixes(&self, _owner: &str, name: &str, enabled: bool) -> Result<()> {
        self.write(format!("security_fixes {} {}", name, enabled))?;
        self.state
            .borrow_mut()
            .security_fixes
            .insert(name.to_string(), enabled);
        Ok(())
    }

    fn get_file_contents(
        &self,
        _owner: &str,
        _name: &str,
        path: &str,
        reference: &str,
    ) -> Result<Option<String>> {
        Ok(self
            .state
            .borrow()
            .files
            .get(&(reference.to_string(), path.to_string()))
            .cloned())
    }

    fn compare_files(&self, _owner: &str, _name: &str, base: &str, head: &str) -> Result<Vec<String>> {
        self.state
            .borrow()
            .compare
            .clone()
            .ok_or_else(|| Self::not_found(format!("{}...{}", base, head)))
    }
}

impl RulesetOps for FakeGitHub {
    fn list_rulesets(&self, _owner: &str, repo: &str) -> Result<Vec<RulesetSummary>> {
        let state = self.state.borrow();
        Ok(state
            .rulesets
            .get(repo)
            .into_iter()
            .flatten()
            .map(|(id, body)| RulesetSummary {
                id: *id,
                name: body["name"].as_str().unwrap_or_default().to_string(),
                target: body["target"].as_str().map(str::to_string),
                enforcement: body["enforcement"].as_str().map(str::to_string),
            })
            .collect())
    }

    fn get_ruleset(&self, owner: &str, repo: &str, id: u64) -> Result<Value> {
        let state = self.state.borrow();
        let (_, body) = state
            .rulesets
            .get(repo)
            .and_then(|sets| sets.iter().find(|(i, _)| *i == id))
            .ok_or_else(|| Self::not_found(format!("ruleset {}", id)))?;

        // The platform echoes the definition with bookkeeping fields added.
        let mut full = body.clone();
        if let Value::Object(map) = &mut full {
            map.insert("id".into(), json!(id));
            map.insert("source_type".into(), json!("Repository"));
            map.insert("source".into(), json!(format!("{}/{}", owner, repo)));
            map.insert("node_id".into(), json!(format!("RRS_{}", id)));
        }
        Ok(full)
    }

    fn create_ruleset(&self, _owner: &str, repo: &str, body: &Value) -> Result<u64> {
        self.write(format!(
            "create_ruleset {} {}",
            repo,
            body["name"].as_str().unwrap_or_default()
        ))?;
        let mut state = self.state.borrow_mut();
        let id = state.id();
        state
            .rulesets
            .entry(repo.to_string())
            .or_default()
            .push((id, body.clone()));
        Ok(id)
    }

    fn update_ruleset(&self, _owner: &str, repo: &str, id: u64, body: &Value) -> Result<()> {
        self.write(format!("update_ruleset {} {}", repo, id))?;
        let mut state = self.state.borrow_mut();
        let entry = state
            .rulesets
            .get_mut(repo)
            .and_then(|sets| sets.iter_mut().find(|(i, _)| *i == id))
            .ok_or_else(|| Self::not_found(format!("ruleset {}", id)))?;
        entry.1 = body.clone();
        Ok(())
    }
}

impl TeamOps for FakeGitHub {
    fn get_team(&self, _org: &str, slug: &str) -> Result<Option<Team>> {
        Ok(self.state.borrow().teams.get(slug).cloned())
    }

    fn create_team(&self, _org: &str, team: &NewTeam) -> Result<Team> {
        let slug = slugify(&team.name);
        self.write(format!("create_team {}", slug))?;
        let mut state = self.state.borrow_mut();
        if state.teams.contains_key(&slug) {
            return Err(OrgError::github(422, format!("team {} already exists", slug)));
        }
        let parent = match team.parent_team_id {
            Some(id) => Some(
                state
                    .teams
                    .values()
                    .find(|t| t.id == id)
                    .map(|t| TeamParent {
                        id: t.id,
                        slug: t.slug.clone(),
                    })
                    .ok_or_else(|| Self::not_found(format!("team id {}", id)))?,
            ),
            None => None,
        };
        let id = state.id();
        let created = Team {
            id,
            name: team.name.clone(),
            slug: slug.clone(),
            description: team.description.clone(),
            privacy: Some(team.privacy.clone()),
            parent,
        };
        state.teams.insert(slug.clone(), created.clone());
        state.members.insert(slug, Vec::new());
        Ok(created)
    }

    fn update_team(&self, _org: &str, slug: &str, patch: &TeamPatch) -> Result<Team> {
        self.write(format!("update_team {}", slug))?;
        let mut state = self.state.borrow_mut();
        let parent = match patch.parent_team_id {
            Some(id) => state
                .teams
                .values()
                .find(|t| t.id == id)
                .map(|t| TeamParent {
                    id: t.id,
                    slug: t.slug.clone(),
                }),
            None => None,
        };
        let team = state.teams.get_mut(slug).ok_or_else(|| Self::not_found(slug))?;
        if let Some(description) = &patch.description {
            team.description = Some(description.clone());
        }
        if let Some(privacy) = &patch.privacy {
            team.privacy = Some(privacy.clone());
        }
        if parent.is_some() {
            team.parent = parent;
        }
        Ok(team.clone())
    }

    fn delete_team(&self, _org: &str, slug: &str) -> Result<()> {
        self.write(format!("delete_team {}", slug))?;
        let mut state = self.state.borrow_mut();
        state.teams.remove(slug).ok_or_else(|| Self::not_found(slug))?;
        state.members.remove(slug);
        state.team_repos.remove(slug);
        Ok(())
    }

    fn list_child_teams(&self, _org: &str, slug: &str) -> Result<Vec<Team>> {
        Ok(self
            .state
            .borrow()
            .teams
            .values()
            .filter(|t| t.parent.as_ref().is_some_and(|p| p.slug == slug))
            .cloned()
            .collect())
    }

    fn list_team_members(&self, _org: &str, slug: &str) -> Result<Vec<String>> {
        let state = self.state.borrow();
        if !state.teams.contains_key(slug) {
            return Err(Self::not_found(slug));
        }
        // Like the platform, members of nested teams are listed too.
        let mut members = Vec::new();
        let mut pending = vec![slug.to_string()];
        while let Some(current) = pending.pop() {
            for login in state.members.get(&current).into_iter().flatten() {
                if !members.iter().any(|m: &String| m.eq_ignore_ascii_case(login)) {
                    members.push(login.clone());
                }
            }
            pending.extend(
                state
                    .teams
                    .values()
                    .filter(|t| t.parent.as_ref().is_some_and(|p| p.slug == current))
                    .map(|t| t.slug.clone()),
            );
        }
        Ok(members)
    }

    fn add_team_member(&self, _org: &str, slug: &str, login: &str) -> Result<()> {
        self.write(format!("add_member {} {}", slug, login))?;
        let mut state = self.state.borrow_mut();
        let members = state.members.entry(slug.to_string()).or_default();
        if !members.iter().any(|m| m.eq_ignore_ascii_case(login)) {
            members.push(login.to_string());
        }
        Ok(())
    }

    fn remove_team_member(&self, _org: &str, slug: &str, login: &str) -> Result<()> {
        self.write(format!("remove_member {} {}", slug, login))?;
        let mut state = self.state.borrow_mut();
        if let Some(members) = state.members.get_mut(slug) {
            members.retain(|m| !m.eq_ignore_ascii_case(login));
        }
        Ok(())
    }

    fn list_team_repos(&self, _org: &str, slug: &str) -> Result<Vec<TeamRepoAccess>> {
        Ok(self
            .state
            .borrow()
            .team_repos
            .get(slug)
            .cloned()
            .unwrap_or_default())
    }

    fn set_team_repo_permission(
        &self,
        _org: &str,
        slug: &str,
        repo: &str,
        permission: &RepoPermission,
    ) -> Result<()> {
        self.write(format!("set_repo {} {} {}", slug, repo, permission))?;
        let mut state = self.state.borrow_mut();
        let repos = state.team_repos.entry(slug.to_string()).or_default();
        repos.retain(|r| r.name != repo);
        repos.push(TeamRepoAccess {
            name: repo.to_string(),
            permission: permission.clone(),
        });
        Ok(())
    }

    fn remove_team_repo(&self, _org: &str, slug: &str, repo: &str) -> Result<()> {
        let granted = self
            .state
            .borrow()
            .team_repos
            .get(slug)
            .is_some_and(|repos| repos.iter().any(|r| r.name == repo));
        if !granted {
            return Err(Self::not_found(repo));
        }
        self.write(format!("remove_repo {} {}", slug, repo))?;
        let mut state = self.state.borrow_mut();
        if let Some(repos) = state.team_repos.get_mut(slug) {
            repos.retain(|r| r.name != repo);
        }
        Ok(())
    }
}

impl PullRequestOps for FakeGitHub {
    fn get_pull_request(&self, _owner: &str, _repo: &str, number: u64) -> Result<PullRequest> {
        self.state
            .borrow()
            .pulls
            .get(&number)
            .cloned()
            .ok_or_else(|| Self::not_found(format!("pull request {}", number)))
    }

    fn list_reviews(&self, _owner: &str, _repo: &str, number: u64) -> Result<Vec<Review>> {
        Ok(self
            .state
            .borrow()
            .reviews
            .get(&number)
            .cloned()
            .unwrap_or_default())
    }

    fn request_reviewers(
        &self,
        _owner: &str,
        _repo: &str,
        number: u64,
        reviewers: &[String],
        team_reviewers: &[String],
    ) -> Result<()> {
        self.write(format!(
            "request_reviewers {} {}{}",
            number,
            reviewers.join(","),
            team_reviewers.join(",")
        ))?;
        self.state
            .borrow_mut()
            .requested
            .extend(reviewers.iter().cloned());
        Ok(())
    }

    fn add_assignees(&self, _owner: &str, _repo: &str, number: u64, assignees: &[String]) -> Result<()> {
        self.write(format!("add_assignees {} {}", number, assignees.join(",")))?;
        self.state
            .borrow_mut()
            .assignees
            .extend(assignees.iter().cloned());
        Ok(())
    }

    fn create_commit_status(
        &self,
        _owner: &str,
        _repo: &str,
        sha: &str,
        status: &CommitStatus,
    ) -> Result<()> {
        self.write(format!("commit_status {} {}", sha, status.context))?;
        self.state
            .borrow_mut()
            .statuses
            .push((sha.to_string(), status.clone()));
        Ok(())
    }

    fn dismisses_stale_reviews(&self, _owner: &str, _repo: &str, _branch: &str) -> Result<bool> {
        Ok(self.state.borrow().dismiss_stale)
    }
}

impl IssueOps for FakeGitHub {
    fn get_issue(&self, _owner: &str, _repo: &str, number: u64) -> Result<Issue> {
        self.state
            .borrow()
            .issues
            .get(&number)
            .cloned()
            .ok_or_else(|| Self::not_found(format!("issue {}", number)))
    }

    fn create_comment(&self, _owner: &str, _repo: &str, number: u64, body: &str) -> Result<()> {
        self.write(format!("comment {}", number))?;
        self.state
            .borrow_mut()
            .comments
            .push((number, body.to_string()));
        Ok(())
    }

    fn update_issue(&self, _owner: &str, _repo: &str, number: u64, update: &IssueUpdate) -> Result<()> {
        self.write(format!("update_issue {}", number))?;
        let mut state = self.state.borrow_mut();
        let issue = state
            .issues
            .get_mut(&number)
            .ok_or_else(|| Self::not_found(format!("issue {}", number)))?;
        if let Some(title) = &update.title {
            issue.title = title.clone();
        }
        if let Some(body) = &update.body {
            issue.body = Some(body.clone());
        }
        if let Some(labels) = &update.labels {
            issue.labels = labels
                .iter()
                .map(|name| Label { name: name.clone() })
                .collect();
        }
        Ok(())
    }
}
