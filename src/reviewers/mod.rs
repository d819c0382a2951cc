//! Branch-pattern reviewer rules and the approval gate.
//!
//! A [`ReviewPolicy`] is loaded from `REVIEWERS.yml` on every invocation:
//!
//! ```yaml
//! pull_requests:
//!   branches:
//!     main:
//!       review_teams: ["{{ team_name }}-reviewers"]
//!       assignees: ["{{ team_name }}-leads"]
//!       required_approvals: 2
//!       required_teams: ["{{ team_name }}-reviewers", "release-managers"]
//!     "feature/*":
//!       review_teams: ["{{ team_name }}-developers"]
//!       exclude: ["feature/do-not-assign"]
//! ```
//!
//! # Example
//!
//! ```rust
//! use orgops::reviewers::{ReviewPolicy, TeamContext};
//! use std::path::Path;
//!
//! let yaml = "pull_requests:\n  branches:\n    \"release/*\":\n      required_approvals: 2\n";
//! let policy = ReviewPolicy::from_yaml_str(yaml, Path::new("REVIEWERS.yml"))?;
//! let rule = policy.resolve("release/1.2").expect("rule");
//! assert_eq!(rule.resolve(&TeamContext::default())?.required_approvals, 2);
//! # Ok::<(), orgops::error::OrgError>(())
//! ```

mod assign;
mod gate;
mod pattern;
mod policy;
mod template;
mod workflow;

pub use assign::{
    AssignmentKind, AssignmentOutcome, AssignmentPlan, AssignmentReport, TeamDirectory,
    apply_assignments, plan_assignments, without_author,
};
pub use gate::{
    GateDecision, GateRequirements, STATUS_CONTEXT, current_approvers, evaluate,
};
pub use pattern::{BranchPattern, Specificity};
pub use policy::{BranchRule, ResolvedRule, ReviewPolicy};
pub use template::{TeamContext, TeamTemplate, slugify};
pub use workflow::{BranchSide, PullTarget, assign_reviewers, check_approvals, load_policy_from_pr};
