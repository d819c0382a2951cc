//! Layout of the administration repository's configuration files.

use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use crate::error::Result;

/// Defaults applied to every managed repository.
pub const DEFAULT_REPOSITORY_FILE: &str = "default_repository.yml";
/// Directory holding `<name>/repository.yml` per repository.
pub const REPOSITORIES_DIR: &str = "repositories";
/// File name of a per-repository configuration.
pub const REPOSITORY_FILE: &str = "repository.yml";
/// Directory holding `<team>/teams.yml` per team.
pub const TEAMS_DIR: &str = "teams";
/// File name of both the root bootstrap file and per-team files.
pub const TEAMS_FILE: &str = "teams.yml";

/// A checked-out administration repository.
#[derive(Debug, Clone)]
pub struct Workspace {
    root: PathBuf,
}

impl Workspace {
    /// Use `root` as the workspace root.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// The workspace root.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Path of `default_repository.yml`.
    pub fn default_repository_file(&self) -> PathBuf {
        self.root.join(DEFAULT_REPOSITORY_FILE)
    }

    /// Path of `repositories/<name>/repository.yml`.
    pub fn repository_file(&self, name: &str) -> PathBuf {
        self.root.join(REPOSITORIES_DIR).join(name).join(REPOSITORY_FILE)
    }

    /// Path of the root `teams.yml`.
    pub fn root_teams_file(&self) -> PathBuf {
        self.root.join(TEAMS_FILE)
    }

    /// Path of `teams/<team>/teams.yml`.
    pub fn team_file(&self, team: &str) -> PathBuf {
        self.root.join(TEAMS_DIR).join(team).join(TEAMS_FILE)
    }

    /// Every `repositories/*/repository.yml`, sorted.
    pub fn repository_files(&self) -> Result<Vec<PathBuf>> {
        self.second_level_files(REPOSITORIES_DIR, REPOSITORY_FILE)
    }

    /// Every `teams/*/teams.yml`, sorted.
    pub fn team_files(&self) -> Result<Vec<PathBuf>> {
        self.second_level_files(TEAMS_DIR, TEAMS_FILE)
    }

    fn second_level_files(&self, dir: &str, file_name: &str) -> Result<Vec<PathBuf>> {
        let base = self.root.join(dir);
        if !base.is_dir() {
            return Ok(Vec::new());
        }

        let mut files = Vec::new();
        for entry in WalkDir::new(&base).min_depth(2).max_depth(2) {
            let entry = entry.map_err(|e| {
                std::io::Error::other(format!("Failed to walk {}: {}", base.display(), e))
            })?;
            if entry.file_type().is_file() && entry.file_name() == file_name {
                files.push(entry.into_path());
            }
        }
        files.sort();
        Ok(files)
    }

    /// Filter workspace-relative changed paths down to repository configs.
    pub fn changed_repository_files(&self, changed: &[String]) -> Vec<PathBuf> {
        self.changed_matching(changed, REPOSITORIES_DIR, REPOSITORY_FILE)
    }

    /// Filter workspace-relative changed paths down to team files.
    pub fn changed_team_files(&self, changed: &[String]) -> Vec<PathBuf> {
        self.changed_matching(changed, TEAMS_DIR, TEAMS_FILE)
    }

    fn changed_matching(&self, changed: &[String], dir: &str, file_name: &str) -> Vec<PathBuf> {
        let mut files: Vec<PathBuf> = changed
            .iter()
            .filter(|path| {
                let parts: Vec<&str> = path.split('/').collect();
                parts.len() == 3 && parts[0] == dir && parts[2] == file_name
            })
            .map(|path| self.root.join(path))
            .filter(|path| path.is_file())
            .collect();
        files.sort();
        files.dedup();
        files
    }
}

/// Name of the directory containing a config file, e.g. the repository name
/// for `repositories/<name>/repository.yml`.
pub fn owning_directory_name(path: &Path) -> Option<String> {
    path.parent()
        .and_then(|p| p.file_name())
        .and_then(|n| n.to_str())
        .map(str::to_string)
}
