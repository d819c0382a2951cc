//! Repository ruleset operations.
//!
//! Ruleset bodies are passed as JSON values: the rule catalogue is open-ended
//! and the reconciler only ever compares the keys it declares.

use crate::error::Result;
use crate::github::GitHubClient;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A ruleset as listed by `GET /repos/{owner}/{repo}/rulesets`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RulesetSummary {
    pub id: u64,
    pub name: String,
    #[serde(default)]
    pub target: Option<String>,
    #[serde(default)]
    pub enforcement: Option<String>,
}

/// Ruleset CRUD operations.
pub trait RulesetOps {
    /// List the rulesets defined directly on a repository.
    fn list_rulesets(&self, owner: &str, repo: &str) -> Result<Vec<RulesetSummary>>;

    /// Fetch the full definition of one ruleset.
    fn get_ruleset(&self, owner: &str, repo: &str, id: u64) -> Result<Value>;

    /// Create a ruleset, returning its id.
    fn create_ruleset(&self, owner: &str, repo: &str, body: &Value) -> Result<u64>;

    /// Replace an existing ruleset.
    fn update_ruleset(&self, owner: &str, repo: &str, id: u64, body: &Value) -> Result<()>;
}

#[derive(Deserialize)]
struct Created {
    id: u64,
}

impl RulesetOps for GitHubClient {
    fn list_rulesets(&self, owner: &str, repo: &str) -> Result<Vec<RulesetSummary>> {
        self.get_paginated(&format!(
            "/repos/{}/{}/rulesets?includes_parents=false",
            owner, repo
        ))
    }

    fn get_ruleset(&self, owner: &str, repo: &str, id: u64) -> Result<Value> {
        self.get(&format!("/repos/{}/{}/rulesets/{}", owner, repo, id))
    }

    fn create_ruleset(&self, owner: &str, repo: &str, body: &Value) -> Result<u64> {
        let created: Created = self.post(&format!("/repos/{}/{}/rulesets", owner, repo), body)?;
        Ok(created.id)
    }

    fn update_ruleset(&self, owner: &str, repo: &str, id: u64, body: &Value) -> Result<()> {
        self.put_unit(&format!("/repos/{}/{}/rulesets/{}", owner, repo, id), body)
    }
}
