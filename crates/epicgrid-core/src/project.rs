//! Project-level records: the project itself, members, statuses and trackers.
//!
//! A project directory on disk holds:
//!
//! ```text
//! <dir>/project.json   project, versions, users, statuses, trackers, members
//! <dir>/issues.jsonl   one issue per line
//! ```

use crate::issue::{Issue, UserId};
use crate::jsonl::{JsonlError, read_issues_from_path, write_issues_to_path};
use crate::store::{IssueStore, StoreError};
use crate::version::Version;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

pub const PROJECT_FILE: &str = "project.json";
pub const ISSUES_FILE: &str = "issues.jsonl";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Project {
    pub id: u64,
    pub name: String,
    pub identifier: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub login: String,
    #[serde(default)]
    pub firstname: String,
    #[serde(default)]
    pub lastname: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub mail: String,
    #[serde(default)]
    pub admin: bool,
}

impl User {
    /// `"First Last"`, falling back to the login when both names are empty.
    pub fn display_name(&self) -> String {
        let full = format!("{} {}", self.firstname, self.lastname);
        let full = full.trim();
        if full.is_empty() {
            self.login.clone()
        } else {
            full.to_string()
        }
    }
}

/// Project membership with the permissions granted through its roles.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Member {
    pub user_id: UserId,
    #[serde(default)]
    pub permissions: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusDef {
    pub id: u64,
    pub name: String,
    #[serde(default)]
    pub is_closed: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackerDef {
    pub id: u64,
    pub name: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,
}

/// Contents of `project.json`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectFile {
    pub project: Project,
    #[serde(default)]
    pub versions: Vec<Version>,
    #[serde(default)]
    pub users: Vec<User>,
    #[serde(default)]
    pub statuses: Vec<StatusDef>,
    #[serde(default)]
    pub trackers: Vec<TrackerDef>,
    #[serde(default)]
    pub members: Vec<Member>,
}

/// A fully loaded project: metadata plus the hierarchical issue store.
#[derive(Debug, Clone)]
pub struct ProjectData {
    pub project: Project,
    pub versions: Vec<Version>,
    pub users: Vec<User>,
    pub statuses: Vec<StatusDef>,
    pub trackers: Vec<TrackerDef>,
    pub members: Vec<Member>,
    pub issues: IssueStore,
}

/// Errors raised while loading a project directory.
#[derive(Debug, thiserror::Error)]
pub enum ProjectError {
    #[error("{0}: I/O error: {1}")]
    Io(PathBuf, String),

    #[error("{0}: parse error: {1}")]
    Parse(PathBuf, String),

    #[error(transparent)]
    Jsonl(#[from] JsonlError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl ProjectData {
    pub fn new(file: ProjectFile, issues: Vec<Issue>) -> Result<Self, ProjectError> {
        let store = IssueStore::from_issues(issues)?;
        let mut versions = file.versions;
        versions.sort_by_key(|version| version.id);
        Ok(Self {
            project: file.project,
            versions,
            users: file.users,
            statuses: file.statuses,
            trackers: file.trackers,
            members: file.members,
            issues: store,
        })
    }

    /// Load `project.json` and `issues.jsonl` from a project directory.
    pub fn load_dir(dir: impl AsRef<Path>) -> Result<Self, ProjectError> {
        let dir = dir.as_ref();
        let file = read_project_file(dir.join(PROJECT_FILE))?;
        let issues_path = dir.join(ISSUES_FILE);
        let issues = if issues_path.exists() {
            read_issues_from_path(&issues_path)?
        } else {
            Vec::new()
        };
        tracing::debug!(
            dir = %dir.display(),
            issues = issues.len(),
            versions = file.versions.len(),
            "loaded project directory"
        );
        Self::new(file, issues)
    }

    /// Write the project back to a directory in the same layout.
    pub fn save_dir(&self, dir: impl AsRef<Path>) -> Result<(), ProjectError> {
        let dir = dir.as_ref();
        let file = ProjectFile {
            project: self.project.clone(),
            versions: self.versions.clone(),
            users: self.users.clone(),
            statuses: self.statuses.clone(),
            trackers: self.trackers.clone(),
            members: self.members.clone(),
        };
        let path = dir.join(PROJECT_FILE);
        fs::create_dir_all(dir).map_err(|e| ProjectError::Io(dir.to_path_buf(), e.to_string()))?;
        let body = serde_json::to_string_pretty(&file)
            .map_err(|e| ProjectError::Parse(path.clone(), e.to_string()))?;
        fs::write(&path, body + "\n").map_err(|e| ProjectError::Io(path.clone(), e.to_string()))?;
        let issues: Vec<Issue> = self.issues.issues().cloned().collect();
        write_issues_to_path(dir.join(ISSUES_FILE), &issues)?;
        Ok(())
    }

    pub fn version(&self, id: u64) -> Option<&Version> {
        self.versions.iter().find(|version| version.id == id)
    }

    pub fn user(&self, id: UserId) -> Option<&User> {
        self.users.iter().find(|user| user.id == id)
    }

    pub fn member(&self, user_id: UserId) -> Option<&Member> {
        self.members.iter().find(|member| member.user_id == user_id)
    }

    /// Users holding a membership in this project, in id order.
    pub fn member_users(&self) -> Vec<&User> {
        let mut users: Vec<&User> = self
            .users
            .iter()
            .filter(|user| self.member(user.id).is_some())
            .collect();
        users.sort_by_key(|user| user.id);
        users
    }

    pub fn tracker_id(&self, name: &str) -> Option<u64> {
        self.trackers
            .iter()
            .find(|tracker| tracker.name == name)
            .map(|tracker| tracker.id)
    }
}

fn read_project_file(path: PathBuf) -> Result<ProjectFile, ProjectError> {
    let body = fs::read_to_string(&path).map_err(|e| ProjectError::Io(path.clone(), e.to_string()))?;
    serde_json::from_str(&body).map_err(|e| ProjectError::Parse(path, e.to_string()))
}
