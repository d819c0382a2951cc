//! Local git operations on the administration repository.
//!
//! Generated configuration files are committed locally; publishing them is
//! left to the surrounding workflow.

mod commit;

pub use commit::CommitOps;

use crate::error::Result;
use git2::Repository;
use std::path::Path;

/// Git operations wrapper.
///
/// # Example
///
/// ```rust,no_run
/// use orgops::git::{CommitOps, GitOps};
/// use std::path::Path;
///
/// let git = GitOps::discover(".")?;
/// git.stage_files(&[Path::new("teams/payments/teams.yml")])?;
/// git.commit("Setup and update team configurations")?;
/// # Ok::<(), orgops::error::OrgError>(())
/// ```
pub struct GitOps {
    repo: Repository,
}

impl GitOps {
    /// Open an existing repository.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let repo = Repository::open(path.as_ref())?;
        Ok(Self { repo })
    }

    /// Discover and open a repository from a path within it.
    pub fn discover(path: impl AsRef<Path>) -> Result<Self> {
        let repo = Repository::discover(path.as_ref())?;
        Ok(Self { repo })
    }

    /// Get a reference to the underlying git2::Repository.
    pub fn repo(&self) -> &Repository {
        &self.repo
    }

    /// Get the repository's working directory path.
    pub fn workdir(&self) -> Option<&Path> {
        self.repo.workdir()
    }
}
