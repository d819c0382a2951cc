//! Slash commands in issues of the administration repository.
//!
//! An issue whose body contains `/create_team`, `/update_team`,
//! `/create_repo`, `/update_repo` or `/help` is turned into the matching
//! request form or answered with instructions.

use regex::Regex;
use std::fmt;
use std::fs;
use std::path::PathBuf;
use tracing::{info, warn};

use crate::error::{OrgError, Result};
use crate::github::{Issue, IssueOps, IssueUpdate, RepoOps, RulesetOps};
use crate::repository::{RepositoryReport, create_repository, parse_repository_request, spec_for_new};
use crate::workspace::Workspace;

/// Label of team creation requests.
pub const TEAM_SETUP_LABEL: &str = "team_setup";
/// Label of team update requests.
pub const TEAM_UPDATE_LABEL: &str = "team_update";
/// Label of repository creation requests.
pub const REPO_SETUP_LABEL: &str = "repo_setup";
/// Label of repository update requests.
pub const REPO_UPDATE_LABEL: &str = "repo_update";

/// A recognised slash command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IssueCommand {
    Help,
    CreateTeam,
    UpdateTeam,
    CreateRepo,
    UpdateRepo,
}

impl IssueCommand {
    fn from_name(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "help" => Some(IssueCommand::Help),
            "create_team" => Some(IssueCommand::CreateTeam),
            "update_team" => Some(IssueCommand::UpdateTeam),
            "create_repo" => Some(IssueCommand::CreateRepo),
            "update_repo" => Some(IssueCommand::UpdateRepo),
            _ => None,
        }
    }

    /// The command as typed.
    pub fn as_str(&self) -> &'static str {
        match self {
            IssueCommand::Help => "/help",
            IssueCommand::CreateTeam => "/create_team",
            IssueCommand::UpdateTeam => "/update_team",
            IssueCommand::CreateRepo => "/create_repo",
            IssueCommand::UpdateRepo => "/update_repo",
        }
    }
}

impl fmt::Display for IssueCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Find the first command in an issue body.
pub fn parse_command(body: &str) -> Result<Option<IssueCommand>> {
    let re = Regex::new(r"(?i)(?:^|\s)/(help|create_team|update_team|create_repo|update_repo)\b")?;
    Ok(re
        .captures(body)
        .and_then(|caps| IssueCommand::from_name(&caps[1])))
}

/// The command menu posted for `/help` and unrecognised requests.
pub fn help_menu() -> String {
    [
        "## Available Commands",
        "",
        "- `/create_team` - Start team creation workflow",
        "- `/update_team` - Start team update workflow",
        "- `/create_repo` - Start repository creation workflow",
        "- `/update_repo` - Start repository update workflow",
        "- `/help` - Show this help menu",
        "",
        "To use a command, create a new issue with the command as the first line.",
    ]
    .join("\n")
}

fn team_form() -> String {
    [
        "### Team Name",
        "Enter team name:",
        "",
        "### Project",
        "Enter project name:",
        "",
        "### Description",
        "Enter team description:",
        "",
        "### Members",
        "List team members (comma-separated):",
        "",
        "### Repositories",
        "List repositories the team works on (comma-separated):",
        "",
        "### Repository Permissions",
        "Select permission level:",
        "- [ ] read",
        "- [ ] write",
        "- [ ] admin",
    ]
    .join("\n")
}

fn repository_form() -> String {
    [
        "### Repository Name",
        "Enter repository name:",
        "",
        "### Description",
        "Enter repository description:",
        "",
        "### Visibility",
        "Select visibility:",
        "- [ ] private",
        "- [ ] internal",
        "",
        "### Template",
        "Template repository (owner/name), if any:",
        "",
        "### Configuration",
        "```yaml",
        "repository:",
        "  has_issues: true",
        "  has_projects: true",
        "  has_wiki: true",
        "```",
        "",
        "Team access is granted in `teams/<team>/teams.yml`.",
    ]
    .join("\n")
}

fn team_update_instructions() -> String {
    [
        "### Updating a team",
        "",
        "Edit `teams/<team>/teams.yml` in a pull request. You can change:",
        "",
        "- members of the team and its sub-teams",
        "- repositories and their permission level",
        "- descriptions and the list of sub-teams",
        "",
        "Changes are applied once the pull request is merged.",
    ]
    .join("\n")
}

fn repository_update_instructions() -> String {
    [
        "### Updating a repository",
        "",
        "Edit `repositories/<name>/repository.yml` in a pull request. Settings not",
        "listed there fall back to `default_repository.yml`.",
        "",
        "Changes are applied once the pull request is merged.",
    ]
    .join("\n")
}

fn is_fence(line: &str) -> bool {
    line.trim_start().starts_with("```")
}

fn is_heading(line: &str, name: &str) -> bool {
    line.trim()
        .trim_start_matches('#')
        .trim()
        .eq_ignore_ascii_case(name)
}

/// Lines after the `### <name>` heading, or `None` without one.
fn section_lines<'a>(body: &'a str, name: &str) -> Option<Vec<&'a str>> {
    let lines: Vec<&str> = body.lines().collect();
    let start = lines.iter().position(|line| is_heading(line, name))?;
    Some(lines[start + 1..].to_vec())
}

fn without_code_blocks(body: &str) -> String {
    let mut in_block = false;
    let mut kept = Vec::new();
    for line in body.lines() {
        if is_fence(line) {
            in_block = !in_block;
        } else if !in_block {
            kept.push(line);
        }
    }
    kept.join("\n")
}

/// A field of a request issue.
///
/// Accepts a `Key: value` line, or a `### Key` form section whose value is
/// the first line that is not a prompt. For checkbox sections the ticked
/// choice is the value. Code blocks are never read as values.
pub fn form_field(body: &str, name: &str) -> Result<Option<String>> {
    let prose = without_code_blocks(body);
    let inline = Regex::new(&format!(r"(?mi)^\s*{}:[ \t]*(\S.*)$", regex::escape(name)))?;
    if let Some(caps) = inline.captures(&prose) {
        return Ok(Some(caps[1].trim().to_string()));
    }
    Ok(form_section(&prose, name))
}

fn form_section(body: &str, name: &str) -> Option<String> {
    let mut checked = None;
    for line in section_lines(body, name)? {
        let line = line.trim();
        if line.starts_with('#') {
            break;
        }
        if let Some(choice) = line
            .strip_prefix("- [x]")
            .or_else(|| line.strip_prefix("- [X]"))
        {
            checked.get_or_insert_with(|| choice.trim().to_string());
            continue;
        }
        if line.is_empty() || line.starts_with("- [ ]") || line.ends_with(':') {
            continue;
        }
        if checked.is_none() {
            return Some(line.to_string());
        }
    }
    checked
}

/// The contents of the first code block in a `### <name>` form section.
pub fn form_code_block(body: &str, name: &str) -> Option<String> {
    let mut lines = section_lines(body, name)?.into_iter();
    loop {
        let line = lines.next()?;
        if is_fence(line) {
            break;
        }
        if line.trim_start().starts_with('#') {
            return None;
        }
    }
    let block: Vec<&str> = lines.take_while(|line| !is_fence(line)).collect();
    Some(block.join("\n"))
}

/// A write performed on the issue.
#[derive(Debug, Clone, PartialEq)]
pub enum IssueAction {
    Comment(String),
    Update(IssueUpdate),
}

fn prefixed(prefix: &str, title: &str) -> String {
    if title.starts_with(prefix) {
        title.to_string()
    } else {
        format!("{}{}", prefix, title)
    }
}

fn with_label(issue: &Issue, label: &str) -> Vec<String> {
    let mut labels: Vec<String> = issue.labels.iter().map(|l| l.name.clone()).collect();
    if !labels.iter().any(|l| l == label) {
        labels.push(label.to_string());
    }
    labels
}

/// The writes answering a command.
pub fn plan_issue_actions(issue: &Issue, command: Option<IssueCommand>) -> Vec<IssueAction> {
    match command {
        None | Some(IssueCommand::Help) => vec![IssueAction::Comment(help_menu())],
        Some(IssueCommand::CreateTeam) => vec![IssueAction::Update(IssueUpdate {
            title: Some(prefixed("Team Creation: ", &issue.title)),
            body: Some(team_form()),
            labels: Some(vec![TEAM_SETUP_LABEL.to_string()]),
        })],
        Some(IssueCommand::CreateRepo) => vec![IssueAction::Update(IssueUpdate {
            title: Some(prefixed("Repository Creation: ", &issue.title)),
            body: Some(repository_form()),
            labels: Some(vec![REPO_SETUP_LABEL.to_string()]),
        })],
        Some(IssueCommand::UpdateTeam) => vec![
            IssueAction::Update(IssueUpdate {
                labels: Some(with_label(issue, TEAM_UPDATE_LABEL)),
                ..Default::default()
            }),
            IssueAction::Comment(team_update_instructions()),
        ],
        Some(IssueCommand::UpdateRepo) => vec![
            IssueAction::Update(IssueUpdate {
                labels: Some(with_label(issue, REPO_UPDATE_LABEL)),
                ..Default::default()
            }),
            IssueAction::Comment(repository_update_instructions()),
        ],
    }
}

/// Answer the command in an issue.
pub fn handle_issue<C: IssueOps>(
    client: &C,
    owner: &str,
    repo: &str,
    number: u64,
    dry_run: bool,
) -> Result<(Option<IssueCommand>, Vec<IssueAction>)> {
    let issue = client.get_issue(owner, repo, number)?;
    let command = parse_command(issue.body.as_deref().unwrap_or_default())?;
    info!(issue = number, command = ?command, "handling issue");

    let actions = plan_issue_actions(&issue, command);
    if !dry_run {
        for action in &actions {
            match action {
                IssueAction::Comment(body) => client.create_comment(owner, repo, number, body)?,
                IssueAction::Update(update) => client.update_issue(owner, repo, number, update)?,
            }
        }
    }
    Ok((command, actions))
}

/// The comment posted once team setup has completed.
pub fn completion_comment(teams_config: &str) -> String {
    format!(
        "### ✅ Team Setup Complete\n\n\
         The default team configuration has been created and committed to the repository.\n\n\
         #### Current Configuration\n\n\
         ```yaml\n{}\n```\n\n\
         #### Next Steps\n\n\
         - Open an issue with `/update_team` to request changes, or\n\
         - edit the team's `teams.yml` in a pull request.\n\n\
         Changes are synced automatically once approved.",
        teams_config.trim_end()
    )
}

/// Post the setup completion comment quoting the root `teams.yml`.
pub fn post_setup_status<C: IssueOps>(
    client: &C,
    workspace: &Workspace,
    owner: &str,
    repo: &str,
    number: u64,
) -> Result<()> {
    let path = workspace.root_teams_file();
    let config = fs::read_to_string(&path).map_err(|e| {
        OrgError::InvalidConfig(format!("cannot read {}: {}", path.display(), e))
    })?;
    client.create_comment(owner, repo, number, &completion_comment(&config))?;
    info!(issue = number, "posted team setup status");
    Ok(())
}

fn repository_outcome_comment(
    org: &str,
    outcome: &Result<(RepositoryReport, Option<PathBuf>)>,
) -> String {
    match outcome {
        Ok((report, _)) if report.is_success() => format!(
            "### ✅ Repository Created\n\n\
             `{org}/{name}` has been created and its configuration written to \
             `repositories/{name}/repository.yml`.\n\n\
             Commit the file so later changes can be made in a pull request.",
            org = org,
            name = report.target
        ),
        Ok((report, _)) => {
            let mut body = format!(
                "### ⚠️ Repository Setup Incomplete\n\n\
                 Some changes for `{}/{}` failed:\n",
                org, report.target
            );
            for failure in report.failures() {
                body.push_str(&format!(
                    "\n- {}: {}",
                    failure.change,
                    failure.error.as_deref().unwrap_or_default()
                ));
            }
            body
        }
        Err(e) => format!("### ❌ Repository Creation Failed\n\n{}", e),
    }
}

/// Create the repository requested by a `/create_repo` issue form and
/// comment the outcome on the issue.
///
/// A dry run neither creates nor comments. The outcome is returned whether or
/// not the comment could be posted.
pub fn create_repository_from_issue<C: RepoOps + RulesetOps + IssueOps>(
    client: &C,
    workspace: &Workspace,
    org: &str,
    owner: &str,
    repo: &str,
    number: u64,
    dry_run: bool,
) -> Result<(RepositoryReport, Option<PathBuf>)> {
    let issue = client.get_issue(owner, repo, number)?;
    let outcome = parse_repository_request(issue.body.as_deref().unwrap_or_default())
        .and_then(|request| spec_for_new(workspace, &request))
        .and_then(|spec| create_repository(client, workspace, org, &spec, dry_run));
    if dry_run {
        return outcome;
    }

    let comment = repository_outcome_comment(org, &outcome);
    if let Err(e) = client.create_comment(owner, repo, number, &comment) {
        warn!(issue = number, error = %e, "could not comment repository outcome");
    }
    let success = outcome.as_ref().is_ok_and(|(report, _)| report.is_success());
    info!(issue = number, success, "handled repository request");
    outcome
}
