//! Workflow invocation context: which pull request, issue or files a run is about.
//!
//! Values come from explicit inputs first (CLI flags or their environment
//! fallbacks) and otherwise from the triggering event payload.

use serde_json::Value;
use std::fs;
use std::path::Path;
use tracing::debug;

use crate::error::{OrgError, Result};
use crate::github::split_full_name;

/// The triggering event, if the run has one.
#[derive(Debug, Clone, Default)]
pub struct WorkflowContext {
    event: Option<Value>,
}

impl WorkflowContext {
    /// Read the event payload at `event_path`, if given.
    pub fn load(event_path: Option<&Path>) -> Result<Self> {
        let Some(path) = event_path else {
            return Ok(Self::default());
        };
        let content = fs::read_to_string(path).map_err(|e| {
            OrgError::Context(format!("cannot read event payload {}: {}", path.display(), e))
        })?;
        let event = serde_json::from_str(&content)?;
        debug!(path = %path.display(), "loaded event payload");
        Ok(Self { event: Some(event) })
    }

    /// Wrap an already parsed payload.
    pub fn from_event(event: Value) -> Self {
        Self { event: Some(event) }
    }

    /// The raw payload.
    pub fn event(&self) -> Option<&Value> {
        self.event.as_ref()
    }

    /// Pull request number: explicit input, then `pull_request.number`, then `number`.
    pub fn pr_number(&self, explicit: Option<u64>) -> Result<u64> {
        explicit
            .or_else(|| self.number_at(&["pull_request", "number"]))
            .or_else(|| self.number_at(&["number"]))
            .ok_or_else(|| {
                OrgError::Context(
                    "no pull request number: set PR_NUMBER or run from a pull_request event"
                        .into(),
                )
            })
    }

    /// Issue number: explicit input, then `issue.number`, then `number`.
    pub fn issue_number(&self, explicit: Option<u64>) -> Result<u64> {
        explicit
            .or_else(|| self.number_at(&["issue", "number"]))
            .or_else(|| self.number_at(&["number"]))
            .ok_or_else(|| {
                OrgError::Context("no issue number: pass --issue or run from an issue event".into())
            })
    }

    /// Changed paths: the newline separated explicit list, or the files
    /// added and modified by the commits of a push event.
    pub fn changed_files(&self, explicit: Option<&str>) -> Vec<String> {
        let mut files: Vec<String> = match explicit.filter(|s| !s.trim().is_empty()) {
            Some(list) => list
                .lines()
                .map(str::trim)
                .filter(|l| !l.is_empty())
                .map(str::to_string)
                .collect(),
            None => self.commit_files(),
        };
        files.sort();
        files.dedup();
        files
    }

    fn commit_files(&self) -> Vec<String> {
        let Some(commits) = self
            .event
            .as_ref()
            .and_then(|e| e.get("commits"))
            .and_then(Value::as_array)
        else {
            return Vec::new();
        };

        commits
            .iter()
            .flat_map(|commit| {
                ["added", "modified"].into_iter().flat_map(move |key| {
                    commit
                        .get(key)
                        .and_then(Value::as_array)
                        .into_iter()
                        .flatten()
                        .filter_map(Value::as_str)
                        .map(str::to_string)
                })
            })
            .collect()
    }

    fn number_at(&self, path: &[&str]) -> Option<u64> {
        let mut value = self.event.as_ref()?;
        for key in path {
            value = value.get(key)?;
        }
        value.as_u64()
    }
}

/// Split `GITHUB_REPOSITORY` into owned owner and name.
pub fn repository_from_env_value(full_name: &str) -> Result<(String, String)> {
    let (owner, name) = split_full_name(full_name)
        .map_err(|_| OrgError::Context(format!("'{}' is not an owner/name pair", full_name)))?;
    Ok((owner.to_string(), name.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    #[test]
    fn test_pr_number_precedence() {
        let ctx = WorkflowContext::from_event(json!({
            "number": 3,
            "pull_request": { "number": 7 }
        }));
        assert_eq!(ctx.pr_number(Some(42)).unwrap(), 42);
        assert_eq!(ctx.pr_number(None).unwrap(), 7);

        let ctx = WorkflowContext::from_event(json!({ "number": 3 }));
        assert_eq!(ctx.pr_number(None).unwrap(), 3);
    }

    #[test]
    fn test_missing_pr_number_is_context_error() {
        let ctx = WorkflowContext::default();
        assert!(matches!(ctx.pr_number(None), Err(OrgError::Context(_))));
    }

    #[test]
    fn test_changed_files_from_explicit_list() {
        let ctx = WorkflowContext::default();
        let files = ctx.changed_files(Some("repositories/b/repository.yml\n\n repositories/a/repository.yml \n"));
        assert_eq!(
            files,
            vec!["repositories/a/repository.yml", "repositories/b/repository.yml"]
        );
    }

    #[test]
    fn test_changed_files_from_push_event() {
        let ctx = WorkflowContext::from_event(json!({
            "commits": [
                { "added": ["repositories/new/repository.yml"], "modified": [], "removed": ["x"] },
                { "added": [], "modified": ["repositories/new/repository.yml", "README.md"] }
            ]
        }));
        assert_eq!(
            ctx.changed_files(Some("  ")),
            vec!["README.md", "repositories/new/repository.yml"]
        );
    }

    #[test]
    fn test_load_event_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("event.json");
        fs::write(&path, r#"{"issue": {"number": 12}}"#).unwrap();
        let ctx = WorkflowContext::load(Some(&path)).unwrap();
        assert_eq!(ctx.issue_number(None).unwrap(), 12);

        assert!(WorkflowContext::load(Some(&dir.path().join("missing.json"))).is_err());
    }

    #[test]
    fn test_repository_from_env_value() {
        let (owner, name) = repository_from_env_value("acme/admin").unwrap();
        assert_eq!((owner.as_str(), name.as_str()), ("acme", "admin"));
        assert!(repository_from_env_value("acme").is_err());
    }
}
