//! Pull request event handling: reviewer assignment and the approval gate.

use std::collections::HashMap;
use std::path::Path;
use tracing::{info, warn};

use super::assign::{AssignmentReport, TeamDirectory, apply_assignments, plan_assignments};
use super::gate::{GateDecision, GateRequirements, current_approvers, evaluate};
use super::policy::ReviewPolicy;
use super::template::TeamContext;
use crate::error::{OrgError, Result};
use crate::github::{PullRequest, PullRequestOps, RepoOps, TeamOps};

/// Which branch of the pull request is matched against the policy.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum BranchSide {
    /// The branch the pull request merges into.
    #[default]
    Target,
    /// The branch the pull request comes from.
    Source,
}

impl BranchSide {
    /// The selected branch name.
    pub fn branch<'a>(&self, pr: &'a PullRequest) -> &'a str {
        match self {
            BranchSide::Target => &pr.base.ref_name,
            BranchSide::Source => &pr.head.ref_name,
        }
    }
}

/// A pull request in a repository.
#[derive(Debug, Clone, Copy)]
pub struct PullTarget<'a> {
    pub owner: &'a str,
    pub repo: &'a str,
    pub number: u64,
}

/// Read the policy file from the PR's head branch, falling back to its base.
pub fn load_policy_from_pr<C: RepoOps>(
    client: &C,
    target: PullTarget<'_>,
    pr: &PullRequest,
    path: &str,
) -> Result<ReviewPolicy> {
    for reference in [&pr.head.ref_name, &pr.base.ref_name] {
        if let Some(content) = client.get_file_contents(target.owner, target.repo, path, reference)?
        {
            info!(path, reference = %reference, "loaded review policy");
            if content.trim().is_empty() {
                return Err(OrgError::InvalidConfig(format!("{} is empty", path)));
            }
            return ReviewPolicy::from_yaml_str(&content, Path::new(path));
        }
    }
    Err(OrgError::InvalidConfig(format!(
        "{} not found on '{}' or '{}'",
        path, pr.head.ref_name, pr.base.ref_name
    )))
}

/// Request reviewers and add assignees for a pull request.
///
/// Returns `None` when no rule governs the branch.
pub fn assign_reviewers<C: PullRequestOps + TeamOps>(
    client: &C,
    target: PullTarget<'_>,
    pr: &PullRequest,
    policy: &ReviewPolicy,
    ctx: &TeamContext,
    side: BranchSide,
) -> Result<Option<AssignmentReport>> {
    let branch = side.branch(pr);
    let Some(rule) = policy.resolve(branch) else {
        info!(branch, "no reviewer configuration for branch");
        return Ok(None);
    };
    let rule = rule.resolve(ctx)?;

    let existing = client.list_reviews(target.owner, target.repo, target.number)?;
    let request_reviews = existing.is_empty() || {
        match client.dismisses_stale_reviews(target.owner, target.repo, &pr.base.ref_name) {
            Ok(dismisses) => dismisses,
            Err(e) => {
                warn!(error = %e, "could not read branch protection settings");
                false
            }
        }
    };

    let mut directory = TeamDirectory::new(client, target.owner);
    let plan = plan_assignments(&mut directory, &rule, pr.author());
    info!(
        pattern = %rule.pattern,
        reviewers = plan.reviewers.len(),
        assignees = plan.assignees.len(),
        request_reviews,
        "assigning pull request"
    );

    Ok(Some(apply_assignments(
        client,
        target.owner,
        target.repo,
        target.number,
        &plan,
        request_reviews,
    )))
}

/// Evaluate the approval gate and optionally publish it as a commit status.
pub fn check_approvals<C: PullRequestOps + TeamOps>(
    client: &C,
    target: PullTarget<'_>,
    pr: &PullRequest,
    policy: &ReviewPolicy,
    ctx: &TeamContext,
    side: BranchSide,
    publish: bool,
) -> Result<GateDecision> {
    let branch = side.branch(pr);
    let decision = match policy.resolve(branch) {
        None => {
            info!(branch, "no review requirements for branch");
            GateDecision::pass_through()
        }
        Some(rule) => {
            let rule = rule.resolve(ctx)?;
            let requirements = GateRequirements {
                required_approvals: rule.required_approvals,
                required_teams: rule.required_teams,
            };
            if requirements.is_empty() {
                GateDecision::pass_through()
            } else {
                let reviews = client.list_reviews(target.owner, target.repo, target.number)?;
                let approvers = current_approvers(&reviews, &pr.head.sha);

                let mut directory = TeamDirectory::new(client, target.owner);
                let mut members = HashMap::new();
                for team in &requirements.required_teams {
                    members.insert(team.clone(), directory.members(team)?);
                }
                evaluate(&requirements, &approvers, &members)
            }
        }
    };

    info!(
        passed = decision.passed,
        approvals = decision.approvals,
        "{}",
        decision.description()
    );

    if publish {
        client.create_commit_status(
            target.owner,
            target.repo,
            &pr.head.sha,
            &decision.to_status(),
        )?;
    }

    Ok(decision)
}
