//! Organisation health check.
//!
//! Plans every active repository against its effective spec without applying
//! anything, and reports what would change.

use std::collections::BTreeSet;
use std::fmt::Write as _;
use tracing::{info, warn};

use crate::error::Result;
use crate::github::{IssueOps, RepoFilterExt, RepoOps, RulesetOps};
use crate::repository::{RepositoryChange, fetch_current_state, load_effective, plan_repository};
use crate::workspace::{Workspace, owning_directory_name};

/// Drift found across an organisation.
#[derive(Debug, Default)]
pub struct HealthReport {
    pub organization: String,
    /// Number of repositories inspected.
    pub checked: usize,
    /// Repositories whose live state differs from their spec.
    pub drifted: Vec<(String, Vec<RepositoryChange>)>,
    /// Repositories without a `repositories/<name>/repository.yml`.
    pub unmanaged: Vec<String>,
    /// Declared repositories that do not exist.
    pub missing: Vec<String>,
    /// Repositories that could not be checked.
    pub errors: Vec<(String, String)>,
}

impl HealthReport {
    pub fn has_drift(&self) -> bool {
        !self.drifted.is_empty() || !self.missing.is_empty()
    }

    pub fn is_healthy(&self) -> bool {
        !self.has_drift() && self.errors.is_empty()
    }

    /// Render the report as a Markdown document.
    pub fn to_markdown(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "## Repository health: {}", self.organization);
        let _ = writeln!(out);
        let _ = writeln!(
            out,
            "Checked {} repositories: {} drifted, {} missing, {} unmanaged, {} errors.",
            self.checked,
            self.drifted.len(),
            self.missing.len(),
            self.unmanaged.len(),
            self.errors.len()
        );

        if !self.drifted.is_empty() {
            let _ = writeln!(out, "\n### Drifted");
            for (name, changes) in &self.drifted {
                let _ = writeln!(out, "\n**{}**", name);
                for change in changes {
                    let _ = writeln!(out, "- {}", change);
                }
            }
        }
        if !self.missing.is_empty() {
            let _ = writeln!(out, "\n### Declared but missing");
            for name in &self.missing {
                let _ = writeln!(out, "- {}", name);
            }
        }
        if !self.unmanaged.is_empty() {
            let _ = writeln!(out, "\n### Unmanaged (defaults only)");
            for name in &self.unmanaged {
                let _ = writeln!(out, "- {}", name);
            }
        }
        if !self.errors.is_empty() {
            let _ = writeln!(out, "\n### Errors");
            for (name, message) in &self.errors {
                let _ = writeln!(out, "- {}: {}", name, message);
            }
        }
        out
    }
}

/// Plan every active repository of `org` without applying anything.
///
/// Only the repository listing is fatal; per-repository failures are
/// collected in [`HealthReport::errors`].
pub fn check_organization<C: RepoOps + RulesetOps>(
    client: &C,
    workspace: &Workspace,
    org: &str,
) -> Result<HealthReport> {
    let all = client.list_org_repos(org)?;
    let repos = all.clone().active();
    let declared: BTreeSet<String> = workspace
        .repository_files()?
        .iter()
        .filter_map(|path| owning_directory_name(path))
        .collect();

    let mut report = HealthReport {
        organization: org.to_string(),
        checked: repos.len(),
        ..Default::default()
    };

    for repo in &repos {
        if !declared.contains(&repo.name) {
            report.unmanaged.push(repo.name.clone());
        }
        match check_repository(client, workspace, org, &repo.name) {
            Ok(changes) if changes.is_empty() => {}
            Ok(changes) => {
                info!(repo = %repo.name, changes = changes.len(), "drift detected");
                report.drifted.push((repo.name.clone(), changes));
            }
            Err(e) => {
                warn!(repo = %repo.name, error = %e, "health check failed");
                report.errors.push((repo.name.clone(), e.to_string()));
            }
        }
    }

    let present: BTreeSet<&str> = all.iter().map(|r| r.name.as_str()).collect();
    report.missing = declared
        .iter()
        .filter(|name| !present.contains(name.as_str()))
        .cloned()
        .collect();

    Ok(report)
}

fn check_repository<C: RepoOps + RulesetOps>(
    client: &C,
    workspace: &Workspace,
    org: &str,
    name: &str,
) -> Result<Vec<RepositoryChange>> {
    let spec = load_effective(workspace, name)?;
    let current = fetch_current_state(client, org, &spec)?;
    Ok(plan_repository(&spec, current.as_ref())?)
}

/// Post the report as a comment on an issue.
pub fn post_report<C: IssueOps>(
    client: &C,
    owner: &str,
    repo: &str,
    issue: u64,
    report: &HealthReport,
) -> Result<()> {
    client.create_comment(owner, repo, issue, &report.to_markdown())?;
    info!(issue, "posted health report");
    Ok(())
}
