//! Reviewer and assignee resolution.
//!
//! Review and assignee teams are expanded into member logins, the pull
//! request author is removed, and each remaining login is added with its own
//! API call. Additions are best-effort: a failure is recorded and logged and
//! the remaining logins are still processed.

use std::collections::{HashMap, HashSet};
use tracing::{info, warn};

use super::policy::ResolvedRule;
use crate::error::Result;
use crate::github::{PullRequestOps, TeamOps};

/// Cached lookup of team members within one organization.
pub struct TeamDirectory<'a, C> {
    client: &'a C,
    org: &'a str,
    cache: HashMap<String, Vec<String>>,
}

impl<'a, C: TeamOps> TeamDirectory<'a, C> {
    /// Create a directory over `org`.
    pub fn new(client: &'a C, org: &'a str) -> Self {
        Self {
            client,
            org,
            cache: HashMap::new(),
        }
    }

    /// Members of a team; a team that cannot be read counts as empty.
    pub fn members_lenient(&mut self, slug: &str) -> Vec<String> {
        match self.members(slug) {
            Ok(members) => members,
            Err(e) => {
                warn!(team = slug, error = %e, "could not fetch team members");
                Vec::new()
            }
        }
    }

    /// Members of a team; a missing team counts as empty, other errors propagate.
    pub fn members(&mut self, slug: &str) -> Result<Vec<String>> {
        if let Some(members) = self.cache.get(slug) {
            return Ok(members.clone());
        }

        let members = match self.client.list_team_members(self.org, slug) {
            Ok(members) => members,
            Err(e) if e.is_not_found() => {
                warn!(team = slug, "team not found");
                Vec::new()
            }
            Err(e) => return Err(e),
        };
        if members.is_empty() {
            warn!(team = slug, "team has no members");
        }
        self.cache.insert(slug.to_string(), members.clone());
        Ok(members)
    }
}

/// Concrete logins computed for a pull request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AssignmentPlan {
    pub reviewers: Vec<String>,
    pub assignees: Vec<String>,
}

/// Flatten logins, drop the author and duplicates, keep first-seen order.
///
/// Logins compare case-insensitively, as they do on GitHub.
pub fn without_author<I, S>(logins: I, author: &str) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let author = author.to_lowercase();
    let mut seen = HashSet::new();
    let mut result = Vec::new();
    for login in logins {
        let login = login.as_ref().trim();
        if login.is_empty() {
            continue;
        }
        let key = login.to_lowercase();
        if key == author || !seen.insert(key) {
            continue;
        }
        result.push(login.to_string());
    }
    result
}

/// Expand a rule's teams into the logins to request and assign.
pub fn plan_assignments<C: TeamOps>(
    directory: &mut TeamDirectory<'_, C>,
    rule: &ResolvedRule,
    author: &str,
) -> AssignmentPlan {
    let reviewers: Vec<String> = rule
        .review_teams
        .iter()
        .flat_map(|team| directory.members_lenient(team))
        .collect();
    let assignees: Vec<String> = rule
        .assignee_teams
        .iter()
        .flat_map(|team| directory.members_lenient(team))
        .collect();

    AssignmentPlan {
        reviewers: without_author(reviewers, author),
        assignees: without_author(assignees, author),
    }
}

/// What an addition was for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssignmentKind {
    Reviewer,
    Assignee,
}

/// Result of adding one login.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssignmentOutcome {
    pub login: String,
    pub kind: AssignmentKind,
    /// The platform error message when the addition failed.
    pub error: Option<String>,
}

impl AssignmentOutcome {
    /// Whether the addition succeeded.
    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }
}

/// Per-login results of applying an [`AssignmentPlan`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AssignmentReport {
    pub outcomes: Vec<AssignmentOutcome>,
    /// Review requests were not issued because the PR already has reviews
    /// and stale reviews are not dismissed on push.
    pub reviewers_skipped: bool,
}

impl AssignmentReport {
    /// Outcomes that failed.
    pub fn failures(&self) -> impl Iterator<Item = &AssignmentOutcome> {
        self.outcomes.iter().filter(|o| !o.is_success())
    }

    /// Logins that were added successfully as the given kind.
    pub fn added(&self, kind: AssignmentKind) -> Vec<&str> {
        self.outcomes
            .iter()
            .filter(|o| o.kind == kind && o.is_success())
            .map(|o| o.login.as_str())
            .collect()
    }
}

/// Issue one call per login, recording every result.
///
/// Review teams are requested as their expanded members rather than as
/// `team_reviewers`, so the author is left out and each login succeeds or
/// fails on its own.
pub fn apply_assignments<C: PullRequestOps>(
    client: &C,
    owner: &str,
    repo: &str,
    number: u64,
    plan: &AssignmentPlan,
    request_reviews: bool,
) -> AssignmentReport {
    let mut report = AssignmentReport {
        reviewers_skipped: !request_reviews && !plan.reviewers.is_empty(),
        ..Default::default()
    };

    if request_reviews {
        for login in &plan.reviewers {
            let result =
                client.request_reviewers(owner, repo, number, std::slice::from_ref(login), &[]);
            report.outcomes.push(record(login, AssignmentKind::Reviewer, result));
        }
    }

    for login in &plan.assignees {
        let result = client.add_assignees(owner, repo, number, std::slice::from_ref(login));
        report.outcomes.push(record(login, AssignmentKind::Assignee, result));
    }

    report
}

fn record(login: &str, kind: AssignmentKind, result: Result<()>) -> AssignmentOutcome {
    match result {
        Ok(()) => {
            info!(login, ?kind, "added to pull request");
            AssignmentOutcome {
                login: login.to_string(),
                kind,
                error: None,
            }
        }
        Err(e) => {
            warn!(login, ?kind, error = %e, "could not add to pull request");
            AssignmentOutcome {
                login: login.to_string(),
                kind,
                error: Some(e.to_string()),
            }
        }
    }
}
