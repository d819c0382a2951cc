//! CLI for the orgops organisation automation.

use anyhow::{Context, Result, bail};
use clap::{Args, Parser, Subcommand};
use orgops::github::GitHubClient;
use orgops::issues::{create_repository_from_issue, handle_issue, post_setup_status};
use orgops::prelude::*;
use orgops::reconcile::FileResult;
use orgops::repository::{NewRepositoryRequest, Visibility, spec_for_new};
use orgops::reviewers::AssignmentKind;
use orgops::teams::changed_team_files;
use orgops::teams::setup::{
    commit_generated, load_setup_config, parse_team_request, register_team, setup_teams,
};
use std::fmt::Display;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

const ZERO_SHA: &str = "0000000000000000000000000000000000000000";

#[derive(Parser)]
#[command(name = "orgops")]
#[command(author, version, about = "Declarative GitHub organisation administration", long_about = None)]
struct Cli {
    /// Verbosity level (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// GitHub API token
    #[arg(long, env = "GITHUB_TOKEN", hide_env_values = true, global = true)]
    token: Option<String>,

    /// GitHub API base URL
    #[arg(
        long,
        env = "GITHUB_API_URL",
        default_value = "https://api.github.com",
        global = true
    )]
    api_url: String,

    /// Checkout of the administration repository
    #[arg(long, env = "GITHUB_WORKSPACE", default_value = ".", global = true)]
    workspace: PathBuf,

    /// Payload of the triggering event
    #[arg(long, env = "GITHUB_EVENT_PATH", global = true)]
    event_path: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Pull request reviewer rules
    Reviewers {
        #[command(subcommand)]
        command: ReviewersCommand,
    },

    /// Declarative repository settings
    Repo {
        #[command(subcommand)]
        command: RepoCommand,
    },

    /// Declarative team hierarchies
    Teams {
        #[command(subcommand)]
        command: TeamsCommand,
    },

    /// Report drift across every active repository
    Health {
        #[command(flatten)]
        org: OrgArgs,

        /// Exit non-zero when drift is found
        #[arg(long)]
        fail_on_drift: bool,

        /// Issue in GITHUB_REPOSITORY to post the report on
        #[arg(long)]
        issue: Option<u64>,

        /// Repository holding the issue (owner/name)
        #[arg(long, env = "GITHUB_REPOSITORY")]
        repository: Option<String>,
    },

    /// Issue command handling
    Issue {
        #[command(subcommand)]
        command: IssueCommandArgs,
    },
}

#[derive(Subcommand)]
enum ReviewersCommand {
    /// Request reviewers and add assignees according to the rules
    Assign(PullRequestArgs),

    /// Evaluate the approval gate and publish it as a commit status
    Check {
        #[command(flatten)]
        pr: PullRequestArgs,

        /// Do not publish the commit status
        #[arg(long)]
        no_status: bool,
    },
}

#[derive(Subcommand)]
enum RepoCommand {
    /// Create a repository and write its configuration file
    Create {
        /// Repository name
        name: String,

        #[command(flatten)]
        org: OrgArgs,

        /// Repository description
        #[arg(short, long)]
        description: Option<String>,

        /// public, private or internal
        #[arg(long)]
        visibility: Option<String>,

        /// Template repository (owner/name)
        #[arg(long)]
        template: Option<String>,

        /// Preview changes without applying
        #[arg(long)]
        dry_run: bool,
    },

    /// Create the repository requested in a `/create_repo` issue
    Register {
        #[command(flatten)]
        issue: IssueArgs,

        #[command(flatten)]
        org: OrgArgs,

        /// Preview changes without applying
        #[arg(long)]
        dry_run: bool,
    },

    /// Apply changed repository configuration files
    Update {
        #[command(flatten)]
        org: OrgArgs,

        #[command(flatten)]
        files: FileSelection,

        /// Preview changes without applying
        #[arg(long)]
        dry_run: bool,
    },
}

#[derive(Subcommand)]
enum TeamsCommand {
    /// Generate team files from the root teams.yml and create the teams
    Setup {
        #[command(flatten)]
        org: OrgArgs,

        /// Root team configuration, relative to the workspace
        #[arg(long, default_value = "teams.yml")]
        config: PathBuf,

        /// Leave generated files uncommitted
        #[arg(long)]
        no_commit: bool,

        /// Preview changes without applying
        #[arg(long)]
        dry_run: bool,
    },

    /// Apply changed team files
    Sync {
        #[command(flatten)]
        org: OrgArgs,

        #[command(flatten)]
        files: FileSelection,

        /// Administration repository (owner/name), used to compare commits
        #[arg(long, env = "GITHUB_REPOSITORY")]
        repository: Option<String>,

        /// Commit before the push
        #[arg(long, env = "GITHUB_EVENT_BEFORE")]
        before: Option<String>,

        /// Commit after the push
        #[arg(long, env = "GITHUB_SHA")]
        sha: Option<String>,

        /// Preview changes without applying
        #[arg(long)]
        dry_run: bool,
    },

    /// Add the team requested in an issue to the root teams.yml
    Register {
        #[command(flatten)]
        issue: IssueArgs,

        /// Root team configuration, relative to the workspace
        #[arg(long, default_value = "teams.yml")]
        config: PathBuf,

        /// Preview changes without applying
        #[arg(long)]
        dry_run: bool,
    },
}

#[derive(Subcommand)]
enum IssueCommandArgs {
    /// Answer the slash command in an issue
    Handle {
        #[command(flatten)]
        issue: IssueArgs,

        /// Preview changes without applying
        #[arg(long)]
        dry_run: bool,
    },

    /// Post the team setup completion comment
    Status {
        #[command(flatten)]
        issue: IssueArgs,
    },
}

#[derive(Args)]
struct OrgArgs {
    /// Organisation to administer
    #[arg(long, env = "GITHUB_ORGANIZATION")]
    org: String,
}

#[derive(Args)]
struct PullRequestArgs {
    /// Repository of the pull request (owner/name)
    #[arg(long, env = "GITHUB_REPOSITORY")]
    repository: String,

    /// Pull request number, read from the event payload when absent
    #[arg(long, env = "PR_NUMBER")]
    pr: Option<u64>,

    /// Reviewer rules file
    #[arg(long, env = "REVIEWERS_CONFIG_PATH", default_value = "REVIEWERS.yml")]
    config: String,

    /// Read the rules from the workspace instead of the pull request
    #[arg(long)]
    local_config: bool,

    /// Value of {{ team_name }} in team templates
    #[arg(long, env = "TEAM_NAME")]
    team_name: Option<String>,

    /// Match the source branch instead of the target branch
    #[arg(long)]
    source_branch: bool,
}

#[derive(Args)]
struct IssueArgs {
    /// Repository of the issue (owner/name)
    #[arg(long, env = "GITHUB_REPOSITORY")]
    repository: String,

    /// Issue number, read from the event payload when absent
    #[arg(long)]
    issue: Option<u64>,
}

#[derive(Args)]
struct FileSelection {
    /// Process every configuration file
    #[arg(long, conflicts_with = "paths")]
    all: bool,

    /// Newline separated changed paths, relative to the workspace
    #[arg(long, env = "CHANGED_FILES")]
    changed_files: Option<String>,

    /// Configuration files to process
    paths: Vec<PathBuf>,
}

/// Runtime values shared by every command.
struct Env {
    token: Option<String>,
    api_url: String,
    workspace: Workspace,
    context: WorkflowContext,
}

impl Env {
    fn client(&self) -> Result<GitHubClient> {
        let Some(token) = self.token.as_deref().filter(|t| !t.is_empty()) else {
            bail!("GITHUB_TOKEN is not set");
        };
        Ok(GitHubClient::with_enterprise(token, &self.api_url))
    }

    fn workspace_path(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.workspace.root().join(path)
        }
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    setup_logging(cli.verbose);

    match run(cli) {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

fn setup_logging(verbosity: u8) {
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

    let level = match verbosity {
        0 => tracing::Level::INFO,
        1 => tracing::Level::DEBUG,
        _ => tracing::Level::TRACE,
    };

    let filter = tracing_subscriber::EnvFilter::from_default_env()
        .add_directive(tracing::Level::WARN.into())
        .add_directive(format!("orgops={}", level).parse().unwrap_or(level.into()));

    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_thread_names(false)
        .with_line_number(false);

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt_layer)
        .init();
}

/// Returns whether the run succeeded.
fn run(cli: Cli) -> Result<bool> {
    let env = Env {
        token: cli.token,
        api_url: cli.api_url,
        workspace: Workspace::new(cli.workspace),
        context: WorkflowContext::load(cli.event_path.as_deref())
            .context("Failed to load event payload")?,
    };

    match cli.command {
        Commands::Reviewers { command } => match command {
            ReviewersCommand::Assign(pr) => cmd_reviewers_assign(&env, pr),
            ReviewersCommand::Check { pr, no_status } => cmd_reviewers_check(&env, pr, !no_status),
        },
        Commands::Repo { command } => match command {
            RepoCommand::Create {
                name,
                org,
                description,
                visibility,
                template,
                dry_run,
            } => cmd_repo_create(&env, &org.org, name, description, visibility, template, dry_run),
            RepoCommand::Register {
                issue,
                org,
                dry_run,
            } => cmd_repo_register(&env, issue, &org.org, dry_run),
            RepoCommand::Update {
                org,
                files,
                dry_run,
            } => cmd_repo_update(&env, &org.org, files, dry_run),
        },
        Commands::Teams { command } => match command {
            TeamsCommand::Setup {
                org,
                config,
                no_commit,
                dry_run,
            } => cmd_teams_setup(&env, &org.org, &config, !no_commit, dry_run),
            TeamsCommand::Sync {
                org,
                files,
                repository,
                before,
                sha,
                dry_run,
            } => cmd_teams_sync(
                &env,
                &org.org,
                files,
                repository.as_deref(),
                before.as_deref(),
                sha.as_deref(),
                dry_run,
            ),
            TeamsCommand::Register {
                issue,
                config,
                dry_run,
            } => cmd_teams_register(&env, issue, &config, dry_run),
        },
        Commands::Health {
            org,
            fail_on_drift,
            issue,
            repository,
        } => cmd_health(&env, &org.org, fail_on_drift, issue, repository.as_deref()),
        Commands::Issue { command } => match command {
            IssueCommandArgs::Handle { issue, dry_run } => cmd_issue_handle(&env, issue, dry_run),
            IssueCommandArgs::Status { issue } => cmd_issue_status(&env, issue),
        },
    }
}

fn load_rules(
    env: &Env,
    client: &GitHubClient,
    args: &PullRequestArgs,
    target: PullTarget<'_>,
    pr: &orgops::github::PullRequest,
) -> Result<ReviewPolicy> {
    let policy = if args.local_config {
        ReviewPolicy::from_yaml_file(env.workspace_path(Path::new(&args.config)))?
    } else {
        orgops::reviewers::load_policy_from_pr(client, target, pr, &args.config)?
    };
    Ok(policy)
}

fn team_context(args: &PullRequestArgs) -> TeamContext {
    match args.team_name.as_deref().filter(|t| !t.trim().is_empty()) {
        Some(prefix) => TeamContext::with_prefix(prefix),
        None => TeamContext::default(),
    }
}

fn branch_side(args: &PullRequestArgs) -> BranchSide {
    if args.source_branch {
        BranchSide::Source
    } else {
        BranchSide::Target
    }
}

fn cmd_reviewers_assign(env: &Env, args: PullRequestArgs) -> Result<bool> {
    let client = env.client()?;
    let (owner, repo) = repository_from_env_value(&args.repository)?;
    let number = env.context.pr_number(args.pr)?;
    let target = PullTarget {
        owner: &owner,
        repo: &repo,
        number,
    };

    let pr = client
        .get_pull_request(&owner, &repo, number)
        .with_context(|| format!("Failed to fetch pull request #{}", number))?;
    let policy = load_rules(env, &client, &args, target, &pr)?;

    let Some(report) = assign_reviewers(
        &client,
        target,
        &pr,
        &policy,
        &team_context(&args),
        branch_side(&args),
    )?
    else {
        println!("No reviewer rule applies to this pull request");
        return Ok(true);
    };

    if report.reviewers_skipped {
        println!("Reviewers not requested: the pull request already has reviews");
    }
    for outcome in &report.outcomes {
        let kind = match outcome.kind {
            AssignmentKind::Reviewer => "reviewer",
            AssignmentKind::Assignee => "assignee",
        };
        match &outcome.error {
            None => println!("  + {} {}", kind, outcome.login),
            Some(error) => println!("  ! {} {} ({})", kind, outcome.login, error),
        }
    }
    Ok(report.failures().next().is_none())
}

fn cmd_reviewers_check(env: &Env, args: PullRequestArgs, publish: bool) -> Result<bool> {
    let client = env.client()?;
    let (owner, repo) = repository_from_env_value(&args.repository)?;
    let number = env.context.pr_number(args.pr)?;
    let target = PullTarget {
        owner: &owner,
        repo: &repo,
        number,
    };

    let pr = client
        .get_pull_request(&owner, &repo, number)
        .with_context(|| format!("Failed to fetch pull request #{}", number))?;
    let policy = load_rules(env, &client, &args, target, &pr)?;

    let decision = check_approvals(
        &client,
        target,
        &pr,
        &policy,
        &team_context(&args),
        branch_side(&args),
        publish,
    )?;

    println!("{}", decision.description());
    Ok(decision.passed)
}

fn cmd_repo_create(
    env: &Env,
    org: &str,
    name: String,
    description: Option<String>,
    visibility: Option<String>,
    template: Option<String>,
    dry_run: bool,
) -> Result<bool> {
    let client = env.client()?;
    let visibility = visibility
        .as_deref()
        .map(str::parse::<Visibility>)
        .transpose()?;
    let request = NewRepositoryRequest {
        name,
        description,
        visibility,
        template,
        ..Default::default()
    };

    let spec = spec_for_new(&env.workspace, &request)?;
    let (report, written) = create_repository(&client, &env.workspace, org, &spec, dry_run)?;
    println!("{}", report);
    if let Some(path) = written {
        println!("Wrote {}", path.display());
    }
    Ok(report.is_success())
}

fn cmd_repo_register(env: &Env, args: IssueArgs, org: &str, dry_run: bool) -> Result<bool> {
    let client = env.client()?;
    let (owner, repo) = repository_from_env_value(&args.repository)?;
    let number = env.context.issue_number(args.issue)?;

    let (report, written) = create_repository_from_issue(
        &client,
        &env.workspace,
        org,
        &owner,
        &repo,
        number,
        dry_run,
    )
    .with_context(|| format!("Issue #{} could not be turned into a repository", number))?;
    println!("{}", report);
    if let Some(path) = written {
        println!("Wrote {}", path.display());
    }
    Ok(report.is_success())
}

fn select_files(
    env: &Env,
    selection: &FileSelection,
    all: impl FnOnce() -> orgops::Result<Vec<PathBuf>>,
    changed: impl FnOnce(&[String]) -> Vec<PathBuf>,
) -> Result<Vec<PathBuf>> {
    if !selection.paths.is_empty() {
        return Ok(selection
            .paths
            .iter()
            .map(|p| env.workspace_path(p))
            .collect());
    }
    if selection.all {
        return Ok(all()?);
    }
    let paths = env.context.changed_files(selection.changed_files.as_deref());
    Ok(changed(&paths))
}

fn print_file_results<T: Display>(results: &[FileResult<T>]) -> bool {
    if results.is_empty() {
        println!("No configuration files to process");
    }
    for file in results {
        match &file.result {
            Ok(report) => println!("{}", report),
            Err(e) => println!("{}: failed: {}", file.path.display(), e),
        }
    }
    results.iter().all(FileResult::is_success)
}

fn cmd_repo_update(env: &Env, org: &str, selection: FileSelection, dry_run: bool) -> Result<bool> {
    let client = env.client()?;
    let files = select_files(
        env,
        &selection,
        || env.workspace.repository_files(),
        |changed| env.workspace.changed_repository_files(changed),
    )?;

    let results = update_repositories(&client, &env.workspace, org, &files, dry_run);
    Ok(print_file_results(&results))
}

fn cmd_teams_setup(
    env: &Env,
    org: &str,
    config: &Path,
    commit: bool,
    dry_run: bool,
) -> Result<bool> {
    let client = env.client()?;
    let config_path = env.workspace_path(config);
    let config = load_setup_config(&config_path)
        .with_context(|| format!("Failed to load {}", config_path.display()))?;

    let outcomes = setup_teams(&client, &env.workspace, org, &config, dry_run)?;
    let mut written = Vec::new();
    for outcome in &outcomes {
        if let Some(path) = &outcome.written {
            println!("Wrote {}", path.display());
            written.push(path.clone());
        }
        match &outcome.result {
            Ok(report) => println!("{}", report),
            Err(e) => println!("{}: failed: {}", outcome.team, e),
        }
    }

    if commit && !dry_run {
        match commit_generated(&env.workspace, &written)? {
            Some(oid) => println!("Committed {} file(s) as {}", written.len(), oid),
            None => println!("No new team files to commit"),
        }
    }
    Ok(outcomes.iter().all(|o| o.is_success()))
}

fn cmd_teams_sync(
    env: &Env,
    org: &str,
    selection: FileSelection,
    repository: Option<&str>,
    before: Option<&str>,
    sha: Option<&str>,
    dry_run: bool,
) -> Result<bool> {
    let client = env.client()?;

    let push_range = match (repository, before, sha) {
        (Some(repository), Some(before), Some(sha)) if before != ZERO_SHA && !before.is_empty() => {
            Some((repository, before, sha))
        }
        _ => None,
    };

    let files = if selection.paths.is_empty() && !selection.all && selection.changed_files.is_none() {
        match push_range {
            Some((repository, before, sha)) => {
                let (owner, repo) = repository_from_env_value(repository)?;
                changed_team_files(&client, &env.workspace, &owner, &repo, before, sha)?
            }
            None => env.workspace.team_files()?,
        }
    } else {
        select_files(
            env,
            &selection,
            || env.workspace.team_files(),
            |changed| env.workspace.changed_team_files(changed),
        )?
    };

    let results = sync_team_files(&client, org, &files, dry_run);
    Ok(print_file_results(&results))
}

fn cmd_teams_register(env: &Env, args: IssueArgs, config: &Path, dry_run: bool) -> Result<bool> {
    let client = env.client()?;
    let (owner, repo) = repository_from_env_value(&args.repository)?;
    let number = env.context.issue_number(args.issue)?;

    let issue = client.get_issue(&owner, &repo, number)?;
    let entry = parse_team_request(issue.body.as_deref().unwrap_or_default())
        .with_context(|| format!("Issue #{} is not a valid team request", number))?;

    if dry_run {
        println!("Would register team {}", entry.team_name);
        return Ok(true);
    }

    let path = env.workspace_path(config);
    if register_team(&path, &entry)? {
        println!("Registered team {} in {}", entry.team_name, path.display());
    } else {
        println!("Team {} is already registered", entry.team_name);
    }
    Ok(true)
}

fn cmd_health(
    env: &Env,
    org: &str,
    fail_on_drift: bool,
    issue: Option<u64>,
    repository: Option<&str>,
) -> Result<bool> {
    let client = env.client()?;
    let report = check_organization(&client, &env.workspace, org)?;
    println!("{}", report.to_markdown());

    if let Some(number) = issue {
        let Some(repository) = repository else {
            bail!("--issue needs GITHUB_REPOSITORY or --repository");
        };
        let (owner, repo) = repository_from_env_value(repository)?;
        orgops::health::post_report(&client, &owner, &repo, number, &report)?;
    }

    Ok(report.errors.is_empty() && !(fail_on_drift && report.has_drift()))
}

fn cmd_issue_handle(env: &Env, args: IssueArgs, dry_run: bool) -> Result<bool> {
    let client = env.client()?;
    let (owner, repo) = repository_from_env_value(&args.repository)?;
    let number = env.context.issue_number(args.issue)?;

    let (command, actions) = handle_issue(&client, &owner, &repo, number, dry_run)?;
    match command {
        Some(command) => println!("Issue #{}: {}", number, command),
        None => println!("Issue #{}: no command, posting help", number),
    }
    if dry_run {
        println!("Would perform {} action(s)", actions.len());
    }
    Ok(true)
}

fn cmd_issue_status(env: &Env, args: IssueArgs) -> Result<bool> {
    let client = env.client()?;
    let (owner, repo) = repository_from_env_value(&args.repository)?;
    let number = env.context.issue_number(args.issue)?;

    post_setup_status(&client, &env.workspace, &owner, &repo, number)?;
    println!("Posted setup status on issue #{}", number);
    Ok(true)
}
