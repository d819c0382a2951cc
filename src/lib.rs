//! # orgops
//!
//! Declarative administration of a GitHub organisation.
//!
//! This crate provides:
//! - Branch-pattern reviewer rules with reviewer assignment and an approval gate
//! - Repository settings, topics, security flags and rulesets from YAML
//! - Team hierarchies, memberships and repository access from YAML
//! - Team bootstrap from a root `teams.yml`, committed with git
//! - Organisation health checks and issue command handling
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use orgops::prelude::*;
//!
//! // Plan the repository changes without applying them
//! let client = GitHubClient::from_env()?;
//! let workspace = Workspace::new(".");
//! let spec = load_effective(&workspace, "payments-api")?;
//! let report = reconcile_repository(&client, "my-org", &spec, true)?;
//!
//! println!("{}", report);
//! # Ok::<(), orgops::error::OrgError>(())
//! ```
//!
//! ## Reviewer Rules
//!
//! ```rust,no_run
//! use orgops::prelude::*;
//!
//! let policy = ReviewPolicy::from_yaml_file("REVIEWERS.yml")?;
//! if let Some(rule) = policy.resolve("release/2.0") {
//!     let rule = rule.resolve(&TeamContext::with_prefix("payments"))?;
//!     println!("{} approvals required", rule.required_approvals);
//! }
//! # Ok::<(), orgops::error::OrgError>(())
//! ```
//!
//! ## Teams
//!
//! ```rust,no_run
//! use orgops::prelude::*;
//!
//! let client = GitHubClient::from_env()?;
//! let file = load_teams_file("teams/payments/teams.yml".as_ref())?;
//! let report = reconcile_team(&client, "my-org", &file.teams, PlanScope::Full, false)?;
//!
//! if !report.is_success() {
//!     eprintln!("{}", report);
//! }
//! # Ok::<(), orgops::error::OrgError>(())
//! ```

pub mod context;
pub mod error;
pub mod git;
pub mod github;
pub mod health;
pub mod issues;
pub mod reconcile;
pub mod repository;
pub mod reviewers;
pub mod teams;
pub mod workspace;

/// Prelude for convenient imports.
pub mod prelude {
    pub use crate::context::{WorkflowContext, repository_from_env_value};
    pub use crate::error::{OrgError, Result};
    pub use crate::git::{CommitOps, GitOps};
    pub use crate::github::{
        GitHubClient, GitHubRepo, IssueOps, PullRequestOps, RepoOps, RulesetOps, TeamOps,
    };
    pub use crate::health::{HealthReport, check_organization};
    pub use crate::issues::{IssueCommand, handle_issue, parse_command};
    pub use crate::reconcile::{ChangeOutcome, FileResult, ReconcileReport};
    pub use crate::repository::{
        RepositoryChange, RepositorySpec, create_repository, load_effective, plan_repository,
        reconcile_repository, update_repositories,
    };
    pub use crate::reviewers::{
        BranchPattern, BranchSide, GateDecision, PullTarget, ReviewPolicy, TeamContext,
        TeamTemplate, assign_reviewers, check_approvals,
    };
    pub use crate::teams::{
        PlanScope, TeamChange, TeamSpec, TeamsFile, load_teams_file, reconcile_team,
        sync_team_files,
    };
    pub use crate::workspace::Workspace;
}

pub use prelude::*;
