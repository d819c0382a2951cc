//! Pull request, review and commit status operations.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::github::GitHubClient;

/// A GitHub user reference.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserRef {
    pub login: String,
}

/// A pull request on GitHub.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PullRequest {
    pub number: u64,
    #[serde(default)]
    pub title: String,
    pub user: UserRef,
    pub head: PullRequestRef,
    pub base: PullRequestRef,
    #[serde(default)]
    pub draft: bool,
}

impl PullRequest {
    /// Login of the pull request author.
    pub fn author(&self) -> &str {
        &self.user.login
    }
}

/// A reference (branch) in a pull request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PullRequestRef {
    #[serde(rename = "ref")]
    pub ref_name: String,
    pub sha: String,
}

/// State of a submitted review as reported by GitHub.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReviewState {
    Approved,
    ChangesRequested,
    Commented,
    Dismissed,
    Pending,
    #[serde(other)]
    Unknown,
}

/// A review submitted on a pull request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Review {
    pub id: u64,
    /// `None` for reviews by deleted accounts.
    pub user: Option<UserRef>,
    pub state: ReviewState,
    pub submitted_at: Option<DateTime<Utc>>,
    /// Head commit the review was submitted against.
    pub commit_id: Option<String>,
}

/// State of a commit status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StatusState {
    Pending,
    Success,
    Failure,
    Error,
}

/// A commit status to publish.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CommitStatus {
    pub state: StatusState,
    pub context: String,
    pub description: String,
}

/// Pull request operations.
pub trait PullRequestOps {
    /// Get a specific pull request.
    fn get_pull_request(&self, owner: &str, repo: &str, number: u64) -> Result<PullRequest>;

    /// List every review submitted on a pull request.
    fn list_reviews(&self, owner: &str, repo: &str, number: u64) -> Result<Vec<Review>>;

    /// Request reviews from users and/or teams.
    fn request_reviewers(
        &self,
        owner: &str,
        repo: &str,
        number: u64,
        reviewers: &[String],
        team_reviewers: &[String],
    ) -> Result<()>;

    /// Add assignees to a pull request.
    fn add_assignees(&self, owner: &str, repo: &str, number: u64, assignees: &[String])
    -> Result<()>;

    /// Publish a commit status.
    fn create_commit_status(
        &self,
        owner: &str,
        repo: &str,
        sha: &str,
        status: &CommitStatus,
    ) -> Result<()>;

    /// Whether branch protection on `branch` dismisses stale reviews on push.
    fn dismisses_stale_reviews(&self, owner: &str, repo: &str, branch: &str) -> Result<bool>;
}

impl PullRequestOps for GitHubClient {
    fn get_pull_request(&self, owner: &str, repo: &str, number: u64) -> Result<PullRequest> {
        self.get(&format!("/repos/{}/{}/pulls/{}", owner, repo, number))
    }

    fn list_reviews(&self, owner: &str, repo: &str, number: u64) -> Result<Vec<Review>> {
        self.get_paginated(&format!("/repos/{}/{}/pulls/{}/reviews", owner, repo, number))
    }

    fn request_reviewers(
        &self,
        owner: &str,
        repo: &str,
        number: u64,
        reviewers: &[String],
        team_reviewers: &[String],
    ) -> Result<()> {
        #[derive(Serialize)]
        struct Request<'a> {
            reviewers: &'a [String],
            team_reviewers: &'a [String],
        }
        self.post_unit(
            &format!("/repos/{}/{}/pulls/{}/requested_reviewers", owner, repo, number),
            &Request {
                reviewers,
                team_reviewers,
            },
        )
    }

    fn add_assignees(
        &self,
        owner: &str,
        repo: &str,
        number: u64,
        assignees: &[String],
    ) -> Result<()> {
        #[derive(Serialize)]
        struct Assignees<'a> {
            assignees: &'a [String],
        }
        self.post_unit(
            &format!("/repos/{}/{}/issues/{}/assignees", owner, repo, number),
            &Assignees { assignees },
        )
    }

    fn create_commit_status(
        &self,
        owner: &str,
        repo: &str,
        sha: &str,
        status: &CommitStatus,
    ) -> Result<()> {
        self.post_unit(&format!("/repos/{}/{}/statuses/{}", owner, repo, sha), status)
    }

    fn dismisses_stale_reviews(&self, owner: &str, repo: &str, branch: &str) -> Result<bool> {
        #[derive(Deserialize)]
        struct ReviewProtection {
            #[serde(default)]
            dismiss_stale_reviews: bool,
        }
        let protection: Option<ReviewProtection> = self.get_optional(&format!(
            "/repos/{}/{}/branches/{}/protection/required_pull_request_reviews",
            owner,
            repo,
            urlencoding::encode(branch)
        ))?;
        Ok(protection.is_some_and(|p| p.dismiss_stale_reviews))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_review_state_parsing() {
        let review: Review = serde_json::from_value(serde_json::json!({
            "id": 7,
            "user": { "login": "alice" },
            "state": "CHANGES_REQUESTED",
            "submitted_at": "2024-03-01T10:00:00Z",
            "commit_id": "abc"
        }))
        .unwrap();
        assert_eq!(review.state, ReviewState::ChangesRequested);
        assert_eq!(review.user.unwrap().login, "alice");

        let odd: ReviewState = serde_json::from_str("\"SOMETHING_NEW\"").unwrap();
        assert_eq!(odd, ReviewState::Unknown);
    }

    #[test]
    fn test_pull_request_ref_field() {
        let pr: PullRequest = serde_json::from_value(serde_json::json!({
            "number": 3,
            "user": { "login": "bob" },
            "head": { "ref": "feature/x", "sha": "h1" },
            "base": { "ref": "main", "sha": "b1" }
        }))
        .unwrap();
        assert_eq!(pr.head.ref_name, "feature/x");
        assert_eq!(pr.author(), "bob");
    }

    #[test]
    fn test_status_serialization() {
        let status = CommitStatus {
            state: StatusState::Failure,
            context: "pr-review-requirements".into(),
            description: "x".into(),
        };
        let json = serde_json::to_value(&status).unwrap();
        assert_eq!(json["state"], "failure");
    }
}
