//! Approval gate evaluation.
//!
//! The gate passes when the number of distinct current approvers reaches the
//! required count and every required team has at least one approver among
//! its members.

use std::collections::{BTreeSet, HashMap, HashSet};

use crate::github::{CommitStatus, Review, ReviewState, StatusState};

/// Commit status context the gate publishes under.
pub const STATUS_CONTEXT: &str = "pr-review-requirements";

/// Merge requirements taken from a resolved branch rule.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GateRequirements {
    pub required_approvals: u32,
    pub required_teams: Vec<String>,
}

impl GateRequirements {
    /// Whether the requirements are vacuous.
    pub fn is_empty(&self) -> bool {
        self.required_approvals == 0 && self.required_teams.is_empty()
    }
}

/// Logins (lower-cased) whose standing review approves the head commit.
///
/// Each reviewer's standing review is their latest approving, change
/// requesting or dismissed review. Comments never change it. An approval of
/// an earlier commit is stale and does not count.
pub fn current_approvers(reviews: &[Review], head_sha: &str) -> BTreeSet<String> {
    let mut latest: HashMap<String, &Review> = HashMap::new();

    for review in reviews {
        if !matches!(
            review.state,
            ReviewState::Approved | ReviewState::ChangesRequested | ReviewState::Dismissed
        ) {
            continue;
        }
        let Some(user) = &review.user else {
            continue;
        };
        let key = user.login.to_lowercase();
        let newer = match latest.get(&key) {
            None => true,
            Some(existing) => {
                (review.submitted_at, review.id) > (existing.submitted_at, existing.id)
            }
        };
        if newer {
            latest.insert(key, review);
        }
    }

    latest
        .into_iter()
        .filter(|(_, review)| {
            review.state == ReviewState::Approved && review.commit_id.as_deref() == Some(head_sha)
        })
        .map(|(login, _)| login)
        .collect()
}

/// Outcome of evaluating the gate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GateDecision {
    pub passed: bool,
    pub approvals: usize,
    pub required_approvals: u32,
    pub satisfied_teams: Vec<String>,
    pub missing_teams: Vec<String>,
}

impl GateDecision {
    /// Decision for a branch without requirements.
    pub fn pass_through() -> Self {
        Self {
            passed: true,
            approvals: 0,
            required_approvals: 0,
            satisfied_teams: Vec::new(),
            missing_teams: Vec::new(),
        }
    }

    /// One-line summary suitable for a status description.
    pub fn description(&self) -> String {
        if self.passed {
            return if self.required_approvals == 0 && self.satisfied_teams.is_empty() {
                "No review requirements for this branch".to_string()
            } else {
                "All review requirements met".to_string()
            };
        }

        let mut parts = Vec::new();
        if (self.approvals as u64) < u64::from(self.required_approvals) {
            parts.push(format!(
                "{}/{} approvals",
                self.approvals, self.required_approvals
            ));
        }
        if !self.missing_teams.is_empty() {
            parts.push(format!(
                "missing approval from {}",
                self.missing_teams.join(", ")
            ));
        }
        format!("Required reviews not yet met: {}", parts.join("; "))
    }

    /// The commit status that surfaces this decision.
    pub fn to_status(&self) -> CommitStatus {
        let mut description = self.description();
        // Status descriptions are capped at 140 characters.
        if description.chars().count() > 140 {
            description = description.chars().take(137).collect::<String>() + "...";
        }
        CommitStatus {
            state: if self.passed {
                StatusState::Success
            } else {
                StatusState::Failure
            },
            context: STATUS_CONTEXT.to_string(),
            description,
        }
    }
}

/// Evaluate the gate.
///
/// `team_members` maps each required team slug to its members; a team
/// missing from the map has no members.
pub fn evaluate(
    requirements: &GateRequirements,
    approvers: &BTreeSet<String>,
    team_members: &HashMap<String, Vec<String>>,
) -> GateDecision {
    let mut satisfied_teams = Vec::new();
    let mut missing_teams = Vec::new();

    for team in &requirements.required_teams {
        let members: HashSet<String> = team_members
            .get(team)
            .map(|m| m.iter().map(|l| l.to_lowercase()).collect())
            .unwrap_or_default();
        if approvers.iter().any(|a| members.contains(a)) {
            satisfied_teams.push(team.clone());
        } else {
            missing_teams.push(team.clone());
        }
    }

    let approvals = approvers.len();
    let enough = approvals as u64 >= u64::from(requirements.required_approvals);

    GateDecision {
        passed: enough && missing_teams.is_empty(),
        approvals,
        required_approvals: requirements.required_approvals,
        satisfied_teams,
        missing_teams,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::github::UserRef;
    use chrono::{TimeZone, Utc};

    const HEAD: &str = "head-sha";

    fn review(id: u64, login: &str, state: ReviewState, minute: u32, commit: &str) -> Review {
        Review {
            id,
            user: Some(UserRef {
                login: login.to_string(),
            }),
            state,
            submitted_at: Some(Utc.with_ymd_and_hms(2024, 5, 1, 12, minute, 0).unwrap()),
            commit_id: Some(commit.to_string()),
        }
    }

    fn members(entries: &[(&str, &[&str])]) -> HashMap<String, Vec<String>> {
        entries
            .iter()
            .map(|(team, logins)| {
                (
                    team.to_string(),
                    logins.iter().map(|l| l.to_string()).collect(),
                )
            })
            .collect()
    }

    fn approvers(logins: &[&str]) -> BTreeSet<String> {
        logins.iter().map(|l| l.to_string()).collect()
    }

    #[test]
    fn test_team_coverage_required_even_when_count_met() {
        let requirements = GateRequirements {
            required_approvals: 2,
            required_teams: vec!["a".into(), "b".into()],
        };
        let teams = members(&[("a", &["alice"]), ("b", &["bob"]), ("c", &["carol"])]);

        let decision = evaluate(&requirements, &approvers(&["alice", "carol"]), &teams);
        assert!(!decision.passed);
        assert_eq!(decision.missing_teams, vec!["b"]);

        let decision = evaluate(&requirements, &approvers(&["alice", "bob"]), &teams);
        assert!(decision.passed);
    }

    #[test]
    fn test_release_managers_only_fails_reviewers_requirement() {
        let requirements = GateRequirements {
            required_approvals: 2,
            required_teams: vec!["reviewers".into(), "release-managers".into()],
        };
        let teams = members(&[
            ("reviewers", &["rita"]),
            ("release-managers", &["mike", "mona"]),
        ]);
        let decision = evaluate(&requirements, &approvers(&["mike", "mona"]), &teams);
        assert!(!decision.passed);
        assert_eq!(decision.approvals, 2);
        assert_eq!(decision.missing_teams, vec!["reviewers"]);
        assert_eq!(decision.to_status().state, StatusState::Failure);
    }

    #[test]
    fn test_count_shortfall() {
        let requirements = GateRequirements {
            required_approvals: 2,
            required_teams: vec![],
        };
        let decision = evaluate(&requirements, &approvers(&["alice"]), &HashMap::new());
        assert!(!decision.passed);
        assert!(decision.description().contains("1/2 approvals"));
    }

    #[test]
    fn test_empty_requirements_pass() {
        let decision = evaluate(&GateRequirements::default(), &BTreeSet::new(), &HashMap::new());
        assert!(decision.passed);
        assert_eq!(decision.to_status().state, StatusState::Success);
    }

    #[test]
    fn test_unknown_team_never_satisfied() {
        let requirements = GateRequirements {
            required_approvals: 0,
            required_teams: vec!["ghost".into()],
        };
        let decision = evaluate(&requirements, &approvers(&["alice"]), &HashMap::new());
        assert!(!decision.passed);
    }

    #[test]
    fn test_membership_is_case_insensitive() {
        let requirements = GateRequirements {
            required_approvals: 1,
            required_teams: vec!["a".into()],
        };
        let teams = members(&[("a", &["Alice"])]);
        let decision = evaluate(&requirements, &approvers(&["alice"]), &teams);
        assert!(decision.passed);
    }

    #[test]
    fn test_stale_approval_ignored() {
        let reviews = vec![review(1, "alice", ReviewState::Approved, 0, "old-sha")];
        assert!(current_approvers(&reviews, HEAD).is_empty());
    }

    #[test]
    fn test_dismissed_approval_ignored() {
        let reviews = vec![
            review(1, "alice", ReviewState::Approved, 0, HEAD),
            review(2, "alice", ReviewState::Dismissed, 5, HEAD),
        ];
        assert!(current_approvers(&reviews, HEAD).is_empty());
    }

    #[test]
    fn test_comment_does_not_withdraw_approval() {
        let reviews = vec![
            review(1, "alice", ReviewState::Approved, 0, HEAD),
            review(2, "alice", ReviewState::Commented, 5, HEAD),
        ];
        assert_eq!(current_approvers(&reviews, HEAD), approvers(&["alice"]));
    }

    #[test]
    fn test_latest_review_wins() {
        let reviews = vec![
            review(3, "bob", ReviewState::Approved, 9, HEAD),
            review(1, "bob", ReviewState::ChangesRequested, 1, HEAD),
            review(2, "Carol", ReviewState::Approved, 2, HEAD),
            review(4, "carol", ReviewState::ChangesRequested, 8, HEAD),
        ];
        assert_eq!(current_approvers(&reviews, HEAD), approvers(&["bob"]));
    }

    #[test]
    fn test_repeat_approvals_count_once() {
        let reviews = vec![
            review(1, "alice", ReviewState::Approved, 0, HEAD),
            review(2, "alice", ReviewState::Approved, 3, HEAD),
        ];
        assert_eq!(current_approvers(&reviews, HEAD).len(), 1);
    }
}
