//! Issue and comment operations.

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::github::GitHubClient;

/// An issue label.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Label {
    pub name: String,
}

/// An issue on GitHub.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Issue {
    pub number: u64,
    pub title: String,
    pub body: Option<String>,
    #[serde(default)]
    pub labels: Vec<Label>,
}

/// Partial issue update.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct IssueUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub body: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub labels: Option<Vec<String>>,
}

/// Issue operations.
pub trait IssueOps {
    /// Get an issue.
    fn get_issue(&self, owner: &str, repo: &str, number: u64) -> Result<Issue>;

    /// Comment on an issue or pull request.
    fn create_comment(&self, owner: &str, repo: &str, number: u64, body: &str) -> Result<()>;

    /// Edit an issue.
    fn update_issue(&self, owner: &str, repo: &str, number: u64, update: &IssueUpdate)
    -> Result<()>;
}

impl IssueOps for GitHubClient {
    fn get_issue(&self, owner: &str, repo: &str, number: u64) -> Result<Issue> {
        self.get(&format!("/repos/{}/{}/issues/{}", owner, repo, number))
    }

    fn create_comment(&self, owner: &str, repo: &str, number: u64, body: &str) -> Result<()> {
        self.post_unit(
            &format!("/repos/{}/{}/issues/{}/comments", owner, repo, number),
            &serde_json::json!({ "body": body }),
        )
    }

    fn update_issue(
        &self,
        owner: &str,
        repo: &str,
        number: u64,
        update: &IssueUpdate,
    ) -> Result<()> {
        let _: Issue = self.patch(
            &format!("/repos/{}/{}/issues/{}", owner, repo, number),
            update,
        )?;
        Ok(())
    }
}
