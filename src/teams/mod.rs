//! Team hierarchy, membership and repository access.
//!
//! Each `teams/<team>/teams.yml` declares a parent team and its sub-teams:
//!
//! ```yaml
//! teams:
//!   team_name: payments
//!   description: Payments team
//!   project: PAY
//!   repository_permissions: write
//!   members: ["@alice", "bob"]
//!   repositories: [payments-api]
//!   default_sub_teams:
//!     - name: payments-developers
//!       description: Developers for PAY
//!       members: [carol]
//!       repositories: [payments-api]
//!       repository_permissions: read
//! ```
//!
//! Sub-teams nested under the parent that are not declared are deleted, and
//! members and repository grants not listed are removed.

mod plan;
pub mod setup;
mod spec;
mod sync;

pub use plan::{CurrentHierarchy, CurrentTeam, PlanScope, TeamChange, plan_team_hierarchy};
pub use spec::{
    DEFAULT_PRIVACY, SubTeamSpec, TeamSpec, TeamsFile, load_teams_file, normalize_username,
    write_teams_file,
};
pub use sync::{
    TeamReport, changed_team_files, fetch_hierarchy, reconcile_team, sync_team_files,
};
