//! Error types for organization automation.

use std::path::PathBuf;
use thiserror::Error;

/// The main error type for orgops operations.
#[derive(Error, Debug)]
pub enum OrgError {
    #[error("Git error: {0}")]
    Git(#[from] git2::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Regex error: {0}")]
    Regex(#[from] regex::Error),

    #[error("Invalid branch pattern: {0}")]
    Pattern(#[from] globset::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Failed to parse YAML in {path}: {source}")]
    Yaml {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Invalid team template '{0}'")]
    InvalidTemplate(String),

    #[error("GitHub API error: {message}")]
    GitHub {
        status: Option<u16>,
        message: String,
    },

    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Workflow context error: {0}")]
    Context(String),
}

impl OrgError {
    /// Build a GitHub API error with an HTTP status.
    pub fn github(status: u16, message: impl Into<String>) -> Self {
        OrgError::GitHub {
            status: Some(status),
            message: message.into(),
        }
    }

    /// HTTP status of a GitHub API error, if any.
    pub fn status(&self) -> Option<u16> {
        match self {
            OrgError::GitHub { status, .. } => *status,
            OrgError::Http(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }

    /// Whether the platform reported the resource as missing.
    pub fn is_not_found(&self) -> bool {
        self.status() == Some(404)
    }
}

/// A specialized Result type for orgops operations.
pub type Result<T> = std::result::Result<T, OrgError>;
