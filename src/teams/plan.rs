//! Diffing a declared team hierarchy against the platform.

use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::fmt;
use tracing::warn;

use super::spec::TeamSpec;
use crate::github::{RepoPermission, Team, TeamRepoAccess};

/// A team with its members and repository access.
#[derive(Debug, Clone, PartialEq)]
pub struct CurrentTeam {
    pub team: Team,
    /// Members as the platform lists them, which includes child-team members.
    pub members: Vec<String>,
    /// Lower-cased logins that belong to a child team.
    pub inherited: BTreeSet<String>,
    pub repos: Vec<TeamRepoAccess>,
}

/// Live state of a parent team, its declared sub-teams and its children.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CurrentHierarchy {
    pub parent: Option<CurrentTeam>,
    /// Declared sub-teams by slug; `None` when the team does not exist.
    pub sub_teams: BTreeMap<String, Option<CurrentTeam>>,
    /// Teams currently nested under the parent.
    pub children: Vec<Team>,
}

/// One write needed to converge a team hierarchy.
#[derive(Debug, Clone, PartialEq)]
pub enum TeamChange {
    CreateTeam {
        name: String,
        description: Option<String>,
        privacy: String,
        parent: Option<String>,
    },
    UpdateTeam {
        slug: String,
        description: Option<String>,
        privacy: Option<String>,
        parent: Option<String>,
    },
    DeleteTeam {
        slug: String,
    },
    AddMember {
        team: String,
        login: String,
    },
    RemoveMember {
        team: String,
        login: String,
    },
    SetRepoPermission {
        team: String,
        repo: String,
        permission: RepoPermission,
    },
    RemoveRepo {
        team: String,
        repo: String,
    },
}

impl fmt::Display for TeamChange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TeamChange::CreateTeam { name, parent, .. } => {
                write!(f, "create team {}", name)?;
                if let Some(parent) = parent {
                    write!(f, " under {}", parent)?;
                }
                Ok(())
            }
            TeamChange::UpdateTeam {
                slug,
                description,
                privacy,
                parent,
            } => {
                let mut fields = Vec::new();
                if description.is_some() {
                    fields.push("description".to_string());
                }
                if let Some(privacy) = privacy {
                    fields.push(format!("privacy={}", privacy));
                }
                if let Some(parent) = parent {
                    fields.push(format!("parent={}", parent));
                }
                write!(f, "update team {}: {}", slug, fields.join(", "))
            }
            TeamChange::DeleteTeam { slug } => write!(f, "delete team {}", slug),
            TeamChange::AddMember { team, login } => write!(f, "add {} to {}", login, team),
            TeamChange::RemoveMember { team, login } => {
                write!(f, "remove {} from {}", login, team)
            }
            TeamChange::SetRepoPermission {
                team,
                repo,
                permission,
            } => write!(f, "grant {} {} on {}", team, permission, repo),
            TeamChange::RemoveRepo { team, repo } => write!(f, "revoke {} access to {}", team, repo),
        }
    }
}

/// Whether team members and repository access are planned, or only the
/// teams themselves.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlanScope {
    /// Teams, members, repository access and pruning of undeclared children.
    Full,
    /// Create or update declared teams only.
    Structure,
}

/// Compute the writes that converge `current` to the declared hierarchy.
pub fn plan_team_hierarchy(
    desired: &TeamSpec,
    current: &CurrentHierarchy,
    scope: PlanScope,
) -> Vec<TeamChange> {
    let mut changes = Vec::new();
    let parent_slug = desired.slug();

    plan_team(
        &mut changes,
        TeamTarget {
            name: &desired.team_name,
            slug: &parent_slug,
            description: desired.description.as_deref(),
            privacy: &desired.privacy,
            parent: None,
        },
        current.parent.as_ref(),
    );

    for sub in &desired.default_sub_teams {
        let slug = sub.slug();
        plan_team(
            &mut changes,
            TeamTarget {
                name: &sub.name,
                slug: &slug,
                description: sub.description.as_deref(),
                privacy: &desired.privacy,
                parent: Some(&parent_slug),
            },
            current.sub_teams.get(&slug).and_then(Option::as_ref),
        );
    }

    if scope == PlanScope::Structure {
        return changes;
    }

    let declared: HashSet<String> = desired.default_sub_teams.iter().map(|s| s.slug()).collect();
    for child in &current.children {
        if !declared.contains(&child.slug) {
            changes.push(TeamChange::DeleteTeam {
                slug: child.slug.clone(),
            });
        }
    }

    plan_members(
        &mut changes,
        &parent_slug,
        &desired.members,
        current.parent.as_ref(),
    );
    plan_repos(
        &mut changes,
        &parent_slug,
        &desired.repositories,
        &desired.repository_permissions,
        current.parent.as_ref(),
        None,
    );

    for sub in &desired.default_sub_teams {
        let slug = sub.slug();
        let existing = current.sub_teams.get(&slug).and_then(Option::as_ref);
        plan_members(&mut changes, &slug, &sub.members, existing);
        plan_repos(
            &mut changes,
            &slug,
            &sub.repositories,
            &sub.repository_permissions,
            existing,
            Some(&desired.repositories),
        );
    }

    changes
}

struct TeamTarget<'a> {
    name: &'a str,
    slug: &'a str,
    description: Option<&'a str>,
    privacy: &'a str,
    parent: Option<&'a str>,
}

fn plan_team(changes: &mut Vec<TeamChange>, target: TeamTarget<'_>, current: Option<&CurrentTeam>) {
    let Some(current) = current else {
        changes.push(TeamChange::CreateTeam {
            name: target.name.to_string(),
            description: target.description.map(str::to_string),
            privacy: target.privacy.to_string(),
            parent: target.parent.map(str::to_string),
        });
        return;
    };

    let team = &current.team;
    let description = target
        .description
        .filter(|d| team.description.as_deref().unwrap_or_default() != *d)
        .map(str::to_string);
    let privacy = Some(target.privacy)
        .filter(|p| team.privacy.as_deref().is_some_and(|have| have != *p))
        .map(str::to_string);
    let parent = target
        .parent
        .filter(|p| team.parent.as_ref().map(|tp| tp.slug.as_str()) != Some(*p))
        .map(str::to_string);

    if description.is_some() || privacy.is_some() || parent.is_some() {
        changes.push(TeamChange::UpdateTeam {
            slug: target.slug.to_string(),
            description,
            privacy,
            parent,
        });
    }
}

fn plan_members(
    changes: &mut Vec<TeamChange>,
    team: &str,
    desired: &[String],
    current: Option<&CurrentTeam>,
) {
    let have: Vec<&String> = current.map(|c| c.members.iter().collect()).unwrap_or_default();
    let have_lower: HashSet<String> = have.iter().map(|m| m.to_lowercase()).collect();
    let want_lower: HashSet<String> = desired.iter().map(|m| m.to_lowercase()).collect();

    let mut seen = HashSet::new();
    for login in desired {
        let key = login.to_lowercase();
        if !have_lower.contains(&key) && seen.insert(key) {
            changes.push(TeamChange::AddMember {
                team: team.to_string(),
                login: login.clone(),
            });
        }
    }
    let inherited = current.map(|c| &c.inherited);
    for login in have {
        let key = login.to_lowercase();
        // Child-team members are listed on the parent but cannot be removed there.
        if inherited.is_some_and(|i| i.contains(&key)) {
            continue;
        }
        if !want_lower.contains(&key) {
            changes.push(TeamChange::RemoveMember {
                team: team.to_string(),
                login: login.clone(),
            });
        }
    }
}

fn plan_repos(
    changes: &mut Vec<TeamChange>,
    team: &str,
    desired: &[String],
    permission: &RepoPermission,
    current: Option<&CurrentTeam>,
    parent_repos: Option<&[String]>,
) {
    let have: &[TeamRepoAccess] = current.map(|c| c.repos.as_slice()).unwrap_or_default();

    let mut seen = HashSet::new();
    for repo in desired {
        if !seen.insert(repo.to_lowercase()) {
            continue;
        }
        let existing = have.iter().find(|a| a.name.eq_ignore_ascii_case(repo));
        if existing.is_none_or(|a| &a.permission != permission) {
            changes.push(TeamChange::SetRepoPermission {
                team: team.to_string(),
                repo: repo.clone(),
                permission: permission.clone(),
            });
        }
    }

    for access in have {
        if desired.iter().any(|r| r.eq_ignore_ascii_case(&access.name)) {
            continue;
        }
        if parent_repos.is_some_and(|repos| repos.iter().any(|r| r.eq_ignore_ascii_case(&access.name)))
        {
            warn!(
                team,
                repository = %access.name,
                "repository removed from sub-team is still granted to the parent team; access is inherited"
            );
        }
        changes.push(TeamChange::RemoveRepo {
            team: team.to_string(),
            repo: access.name.clone(),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::github::TeamParent;
    use crate::teams::TeamsFile;

    fn spec() -> TeamSpec {
        let yaml = r#"
teams:
  team_name: payments
  description: Payments team
  repository_permissions: write
  members: [alice, bob]
  repositories: [payments-api]
  default_sub_teams:
    - name: payments-developers
      description: Developers for PAY
      members: [carol]
      repositories: [payments-api]
      repository_permissions: read
"#;
        serde_yaml::from_str::<TeamsFile>(yaml).unwrap().teams
    }

    fn team(id: u64, slug: &str, description: &str, parent: Option<(u64, &str)>) -> Team {
        Team {
            id,
            name: slug.to_string(),
            slug: slug.to_string(),
            description: Some(description.to_string()),
            privacy: Some("closed".into()),
            parent: parent.map(|(id, slug)| TeamParent {
                id,
                slug: slug.to_string(),
            }),
        }
    }

    fn converged() -> CurrentHierarchy {
        let parent = CurrentTeam {
            team: team(1, "payments", "Payments team", None),
            members: vec!["Alice".into(), "bob".into(), "carol".into()],
            inherited: BTreeSet::from(["carol".to_string()]),
            repos: vec![TeamRepoAccess {
                name: "payments-api".into(),
                permission: RepoPermission::Push,
            }],
        };
        let dev = team(2, "payments-developers", "Developers for PAY", Some((1, "payments")));
        let sub = CurrentTeam {
            team: dev.clone(),
            members: vec!["carol".into()],
            inherited: BTreeSet::new(),
            repos: vec![TeamRepoAccess {
                name: "payments-api".into(),
                permission: RepoPermission::Pull,
            }],
        };
        CurrentHierarchy {
            parent: Some(parent),
            sub_teams: BTreeMap::from([("payments-developers".to_string(), Some(sub))]),
            children: vec![dev],
        }
    }

    #[test]
    fn test_converged_hierarchy_plans_nothing() {
        let plan = plan_team_hierarchy(&spec(), &converged(), PlanScope::Full);
        assert!(plan.is_empty(), "unexpected plan: {plan:?}");
    }

    #[test]
    fn test_missing_hierarchy_is_created() {
        let current = CurrentHierarchy {
            sub_teams: BTreeMap::from([("payments-developers".to_string(), None)]),
            ..Default::default()
        };
        let plan = plan_team_hierarchy(&spec(), &current, PlanScope::Full);
        assert!(matches!(&plan[0], TeamChange::CreateTeam { parent: None, .. }));
        assert!(matches!(
            &plan[1],
            TeamChange::CreateTeam { parent: Some(p), .. } if p == "payments"
        ));
        assert_eq!(
            plan.iter()
                .filter(|c| matches!(c, TeamChange::AddMember { .. }))
                .count(),
            3
        );
    }

    #[test]
    fn test_structure_scope_ignores_members_and_children() {
        let mut current = converged();
        current.children.push(team(9, "legacy", "old", Some((1, "payments"))));
        current.parent.as_mut().unwrap().members.clear();
        let plan = plan_team_hierarchy(&spec(), &current, PlanScope::Structure);
        assert!(plan.is_empty());
    }

    #[test]
    fn test_undeclared_children_are_pruned() {
        let mut current = converged();
        current.children.push(team(9, "legacy", "old", Some((1, "payments"))));
        let plan = plan_team_hierarchy(&spec(), &current, PlanScope::Full);
        assert_eq!(
            plan,
            vec![TeamChange::DeleteTeam {
                slug: "legacy".into()
            }]
        );
    }

    #[test]
    fn test_empty_member_list_removes_everyone() {
        let mut desired = spec();
        desired.members.clear();
        let plan = plan_team_hierarchy(&desired, &converged(), PlanScope::Full);
        assert_eq!(
            plan,
            vec![
                TeamChange::RemoveMember {
                    team: "payments".into(),
                    login: "Alice".into()
                },
                TeamChange::RemoveMember {
                    team: "payments".into(),
                    login: "bob".into()
                },
            ]
        );
    }

    #[test]
    fn test_child_team_members_stay_on_parent() {
        let mut current = converged();
        let parent = current.parent.as_mut().unwrap();
        parent.members.push("dave".into());
        parent.inherited.insert("dave".into());
        let plan = plan_team_hierarchy(&spec(), &current, PlanScope::Full);
        assert!(plan.is_empty(), "unexpected plan: {plan:?}");
    }

    #[test]
    fn test_repo_permission_changes() {
        let mut desired = spec();
        desired.default_sub_teams[0].repository_permissions = RepoPermission::Maintain;
        desired.default_sub_teams[0].repositories = vec!["payments-web".into()];
        let plan = plan_team_hierarchy(&desired, &converged(), PlanScope::Full);
        assert_eq!(
            plan,
            vec![
                TeamChange::SetRepoPermission {
                    team: "payments-developers".into(),
                    repo: "payments-web".into(),
                    permission: RepoPermission::Maintain,
                },
                TeamChange::RemoveRepo {
                    team: "payments-developers".into(),
                    repo: "payments-api".into(),
                },
            ]
        );
    }

    #[test]
    fn test_reparent_and_description_update() {
        let mut current = converged();
        let sub = current
            .sub_teams
            .get_mut("payments-developers")
            .unwrap()
            .as_mut()
            .unwrap();
        sub.team.parent = None;
        sub.team.description = Some("stale".into());
        let plan = plan_team_hierarchy(&spec(), &current, PlanScope::Structure);
        assert_eq!(
            plan,
            vec![TeamChange::UpdateTeam {
                slug: "payments-developers".into(),
                description: Some("Developers for PAY".into()),
                privacy: None,
                parent: Some("payments".into()),
            }]
        );
    }
}
