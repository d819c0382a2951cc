//! Git commit operations.

use crate::error::{OrgError, Result};
use crate::git::GitOps;
use git2::{ErrorCode, Oid, Signature, Tree};
use std::path::Path;

/// Commit operations for GitOps.
pub trait CommitOps {
    /// Stage specific files; paths may be absolute or relative to the workdir.
    fn stage_files(&self, paths: &[&Path]) -> Result<()>;

    /// Create a commit with the staged changes.
    fn commit(&self, message: &str) -> Result<Oid>;

    /// Check if there are staged changes.
    fn has_staged_changes(&self) -> Result<bool>;
}

impl CommitOps for GitOps {
    fn stage_files(&self, paths: &[&Path]) -> Result<()> {
        let workdir = self.repo.workdir().ok_or_else(|| {
            OrgError::Git(git2::Error::from_str("Repository has no working directory"))
        })?;
        let mut index = self.repo.index()?;

        for path in paths {
            let absolute = if path.is_absolute() {
                path.to_path_buf()
            } else {
                workdir.join(path)
            };
            let rel_path = absolute.strip_prefix(workdir).map_err(|_| {
                OrgError::Git(git2::Error::from_str(&format!(
                    "{} is outside the repository",
                    path.display()
                )))
            })?;

            if absolute.exists() {
                index.add_path(rel_path)?;
            } else {
                index.remove_path(rel_path)?;
            }
        }

        index.write()?;
        Ok(())
    }

    fn commit(&self, message: &str) -> Result<Oid> {
        let signature = self.get_signature()?;
        let mut index = self.repo.index()?;
        let tree_id = index.write_tree()?;
        let tree = self.repo.find_tree(tree_id)?;

        let parent = self.head_commit()?;
        let parents: Vec<&git2::Commit<'_>> = parent.iter().collect();

        let oid = self
            .repo
            .commit(Some("HEAD"), &signature, &signature, message, &tree, &parents)?;
        Ok(oid)
    }

    fn has_staged_changes(&self) -> Result<bool> {
        let head_tree = self.head_tree()?;
        let diff = self
            .repo
            .diff_tree_to_index(head_tree.as_ref(), None, None)?;
        Ok(diff.deltas().count() > 0)
    }
}

impl GitOps {
    fn get_signature(&self) -> Result<Signature<'_>> {
        self.repo.signature().or_else(|_| {
            // Fallback signature for automation
            Signature::now("orgops", "orgops@users.noreply.github.com").map_err(|e| e.into())
        })
    }

    fn head_commit(&self) -> Result<Option<git2::Commit<'_>>> {
        match self.repo.head() {
            Ok(head) => Ok(Some(head.peel_to_commit()?)),
            Err(e) if e.code() == ErrorCode::UnbornBranch || e.code() == ErrorCode::NotFound => {
                Ok(None)
            }
            Err(e) => Err(e.into()),
        }
    }

    fn head_tree(&self) -> Result<Option<Tree<'_>>> {
        Ok(match self.head_commit()? {
            Some(commit) => Some(commit.tree()?),
            None => None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use git2::Repository;
    use std::fs;
    use tempfile::TempDir;

    fn init_repo() -> (TempDir, GitOps) {
        let dir = TempDir::new().unwrap();
        let repo = Repository::init(dir.path()).unwrap();
        let mut config = repo.config().unwrap();
        config.set_str("user.name", "Test User").unwrap();
        config.set_str("user.email", "test@example.com").unwrap();
        let git = GitOps::open(dir.path()).unwrap();
        (dir, git)
    }

    #[test]
    fn test_first_commit_on_unborn_branch() {
        let (dir, git) = init_repo();
        let file = dir.path().join("teams/payments/teams.yml");
        fs::create_dir_all(file.parent().unwrap()).unwrap();
        fs::write(&file, "teams:\n  team_name: payments\n").unwrap();

        assert!(!git.has_staged_changes().unwrap());
        git.stage_files(&[file.as_path()]).unwrap();
        assert!(git.has_staged_changes().unwrap());

        let oid = git.commit("Setup and update team configurations").unwrap();
        let commit = git.repo().find_commit(oid).unwrap();
        assert_eq!(commit.message(), Some("Setup and update team configurations"));
        assert_eq!(commit.parent_count(), 0);
        assert!(!git.has_staged_changes().unwrap());
    }

    #[test]
    fn test_relative_paths_and_second_commit() {
        let (dir, git) = init_repo();
        fs::write(dir.path().join("a.yml"), "a: 1\n").unwrap();
        git.stage_files(&[Path::new("a.yml")]).unwrap();
        let first = git.commit("first").unwrap();

        fs::write(dir.path().join("a.yml"), "a: 2\n").unwrap();
        git.stage_files(&[Path::new("a.yml")]).unwrap();
        let second = git.commit("second").unwrap();

        let commit = git.repo().find_commit(second).unwrap();
        assert_eq!(commit.parent_id(0).unwrap(), first);
    }

    #[test]
    fn test_path_outside_repository_is_rejected() {
        let (_dir, git) = init_repo();
        let other = TempDir::new().unwrap();
        let outside = other.path().join("x.yml");
        fs::write(&outside, "x: 1\n").unwrap();
        assert!(git.stage_files(&[outside.as_path()]).is_err());
    }
}
