//! GitHub API integration.
//!
//! [`GitHubClient`] talks to the REST API over a blocking HTTP client. Each
//! capability the automation needs is a trait implemented by the client, so
//! the reconcilers and reviewer logic can run against any implementation.
//!
//! # Example
//!
//! ```rust,no_run
//! use orgops::github::{GitHubClient, RepoOps};
//!
//! let client = GitHubClient::new("ghp_your_token_here");
//!
//! for repo in client.list_org_repos("my-org")? {
//!     println!("{} ({})", repo.name, repo.effective_visibility());
//! }
//! # Ok::<(), orgops::error::OrgError>(())
//! ```

mod client;
mod issues;
mod pr;
mod repos;
mod rulesets;
mod teams;

pub use client::{GitHubClient, split_full_name};
pub use issues::{Issue, IssueOps, IssueUpdate, Label};
pub use pr::{
    CommitStatus, PullRequest, PullRequestOps, PullRequestRef, Review, ReviewState, StatusState,
    UserRef,
};
pub use repos::{GitHubRepo, NewRepository, RepoFilterExt, RepoOps, RepoSettingsPatch};
pub use rulesets::{RulesetOps, RulesetSummary};
pub use teams::{NewTeam, RepoPermission, Team, TeamOps, TeamParent, TeamPatch, TeamRepoAccess};
