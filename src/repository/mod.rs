//! Declarative repository configuration.
//!
//! `default_repository.yml` holds settings shared by every repository and
//! `repositories/<name>/repository.yml` holds per-repository overrides:
//!
//! ```yaml
//! repository:
//!   name: payments-api
//!   visibility: private
//!   has_wiki: false
//!   topics: [payments, rust]
//!   security:
//!     enableVulnerabilityAlerts: true
//!   rulesets:
//!     - name: protect-main
//!       conditions:
//!         ref_name:
//!           include: ["~DEFAULT_BRANCH"]
//!       rules:
//!         - type: pull_request
//!           parameters:
//!             required_approving_review_count: 2
//! ```
//!
//! [`plan_repository`] diffs the effective spec against the live repository
//! and [`reconcile_repository`] applies the resulting changes one call at a
//! time.

mod plan;
mod ruleset;
mod spec;
mod sync;

pub use plan::{CurrentRuleset, CurrentState, RepositoryChange, new_repository, plan_repository};
pub use ruleset::{RefNameCondition, RuleSpec, RulesetConditions, RulesetSpec, json_subset};
pub use spec::{
    NewRepositoryRequest, RepositorySpec, SecuritySpec, Visibility, deep_merge, effective_spec,
    load_effective, load_from_path, parse_repository_request, read_repository_section,
    spec_for_new, validate_branch_name, validate_repository_name, write_repository_file,
};
pub use sync::{
    RepositoryReport, create_repository, fetch_current_state, reconcile_repository,
    update_repositories,
};
