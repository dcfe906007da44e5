//! Grid service layer.
//!
//! The service loads a project from a [`ProjectSource`], asks a
//! [`PermissionOracle`] whether the caller may view issues, and then builds
//! grid or statistics responses. The HTTP adapter in [`http`] only parses
//! requests and maps [`ServiceError`] to status codes.

pub mod http;

use epicgrid_core::{
    EpicgridConfig, FilterParseError, FilterSet, IssueId, ProjectData, ProjectError,
    SortOptions, SortParseError, UserId, VersionId, filter_param_key,
};
use epicgrid_index::{GridPayload, GridRequest, ResponseStamp, Statistics, present_grid};
use serde_json::Value;
use std::path::PathBuf;
use thiserror::Error;

pub const VIEW_ISSUES: &str = "view_issues";

/// Where a request's project snapshot comes from.
pub trait ProjectSource {
    fn load(&self) -> Result<ProjectData, ProjectError>;
}

/// Reads `project.json` + `issues.jsonl` fresh on every request.
#[derive(Debug, Clone)]
pub struct FileProjectSource {
    dir: PathBuf,
}

impl FileProjectSource {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }
}

impl ProjectSource for FileProjectSource {
    fn load(&self) -> Result<ProjectData, ProjectError> {
        ProjectData::load_dir(&self.dir)
    }
}

impl ProjectSource for ProjectData {
    fn load(&self) -> Result<ProjectData, ProjectError> {
        Ok(self.clone())
    }
}

/// Capability check consulted before any grid operation.
pub trait PermissionOracle {
    fn allowed(&self, user: Option<UserId>, permission: &str, project: &ProjectData) -> bool;
}

/// Admins may do anything; members hold the permissions listed on their
/// membership; anonymous callers hold none.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProjectMembership;

impl PermissionOracle for ProjectMembership {
    fn allowed(&self, user: Option<UserId>, permission: &str, project: &ProjectData) -> bool {
        let Some(user_id) = user else {
            return false;
        };
        if project.user(user_id).is_some_and(|user| user.admin) {
            return true;
        }
        project
            .member(user_id)
            .is_some_and(|member| member.permissions.iter().any(|p| p == permission))
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum GridQueryError {
    #[error(transparent)]
    Filter(#[from] FilterParseError),
    #[error(transparent)]
    Sort(#[from] SortParseError),
    #[error("invalid value for `{param}`: `{value}`")]
    InvalidParam { param: String, value: String },
    #[error("missing parameter `{0}`")]
    MissingParam(&'static str),
}

/// Decoded `/grid` parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GridQuery {
    pub filters: FilterSet,
    pub include_closed: bool,
    pub exclude_closed_versions: bool,
    pub sort: SortOptions,
}

impl GridQuery {
    /// Query with every setting taken from configuration.
    pub fn from_config(config: &EpicgridConfig) -> Self {
        Self {
            filters: FilterSet::new(),
            include_closed: config.grid.include_closed,
            exclude_closed_versions: config.grid.exclude_closed_versions,
            sort: config.grid.sort,
        }
    }

    /// Parse decoded query parameters over configured defaults.
    ///
    /// Recognized names: `filters[<key>][]`, `filters[<key>]`,
    /// `include_closed`, `exclude_closed_versions` and
    /// `sort_options[epic|version][sort_by|sort_direction]`. A boolean switch
    /// is off only for the literal `false`. Other names are ignored.
    pub fn from_params(
        params: &[(String, String)],
        config: &EpicgridConfig,
    ) -> Result<Self, GridQueryError> {
        let mut query = Self::from_config(config);
        let mut filter_pairs = Vec::new();

        for (name, value) in params {
            if let Some(key) = filter_param_key(name) {
                filter_pairs.push((key, value.as_str()));
                continue;
            }
            match name.as_str() {
                "include_closed" => query.include_closed = value != "false",
                "exclude_closed_versions" => query.exclude_closed_versions = value != "false",
                "sort_options[epic][sort_by]" => query.sort.epic.sort_by = value.parse()?,
                "sort_options[epic][sort_direction]" => {
                    query.sort.epic.sort_direction = value.parse()?
                }
                "sort_options[version][sort_by]" => query.sort.version.sort_by = value.parse()?,
                "sort_options[version][sort_direction]" => {
                    query.sort.version.sort_direction = value.parse()?
                }
                _ => {}
            }
        }

        query.filters = FilterSet::from_pairs(filter_pairs)?;
        Ok(query)
    }

    /// Index-builder inputs for this query under `config`'s tracker names.
    pub fn request(&self, config: &EpicgridConfig) -> GridRequest {
        GridRequest {
            trackers: config.trackers.clone(),
            exclude_closed_versions: self.exclude_closed_versions,
            filters: self.filters.clone(),
            sort: self.sort,
        }
    }
}

/// Which statistics report to produce.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatisticsTarget {
    Project,
    Epic(IssueId),
    Feature(IssueId),
    UserStory(IssueId),
    Version(VersionId),
}

impl StatisticsTarget {
    pub fn label(self) -> &'static str {
        match self {
            StatisticsTarget::Project => "project",
            StatisticsTarget::Epic(_) => "epic",
            StatisticsTarget::Feature(_) => "feature",
            StatisticsTarget::UserStory(_) => "user_story",
            StatisticsTarget::Version(_) => "version",
        }
    }
}

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("failed to load project: {0}")]
    Load(#[from] ProjectError),
    #[error("{} may not view issues in this project", caller_label(.user))]
    Forbidden { user: Option<UserId> },
    #[error("{kind} {id} not found")]
    NotFound { kind: &'static str, id: u64 },
    #[error("serialization error: {0}")]
    Serialization(String),
}

#[derive(Debug, Clone)]
pub struct GridService<S, P> {
    source: S,
    oracle: P,
    config: EpicgridConfig,
}

impl<S: ProjectSource, P: PermissionOracle> GridService<S, P> {
    pub fn new(source: S, oracle: P, config: EpicgridConfig) -> Self {
        Self {
            source,
            oracle,
            config,
        }
    }

    pub fn config(&self) -> &EpicgridConfig {
        &self.config
    }

    fn authorized_project(&self, user: Option<UserId>) -> Result<ProjectData, ServiceError> {
        let project = self.source.load()?;
        if !self.oracle.allowed(user, VIEW_ISSUES, &project) {
            tracing::warn!(?user, "permission denied");
            return Err(ServiceError::Forbidden { user });
        }
        Ok(project)
    }

    pub fn grid(
        &self,
        user: Option<UserId>,
        query: &GridQuery,
        stamp: &ResponseStamp,
    ) -> Result<GridPayload, ServiceError> {
        let project = self.authorized_project(user)?;
        let request = query.request(&self.config);
        Ok(present_grid(
            &project,
            &request,
            query.include_closed,
            stamp,
        ))
    }

    pub fn statistics(
        &self,
        user: Option<UserId>,
        target: StatisticsTarget,
        stamp: &ResponseStamp,
    ) -> Result<Value, ServiceError> {
        let project = self.authorized_project(user)?;
        let stats = Statistics::new(&project, &self.config.trackers, stamp.today());
        let not_found = |id: u64| ServiceError::NotFound {
            kind: target.label(),
            id,
        };
        let body = match target {
            StatisticsTarget::Project => to_value(&stats.project()),
            StatisticsTarget::Epic(id) => to_value(&stats.epic(id).ok_or_else(|| not_found(id))?),
            StatisticsTarget::Feature(id) => {
                to_value(&stats.feature(id).ok_or_else(|| not_found(id))?)
            }
            StatisticsTarget::UserStory(id) => {
                to_value(&stats.user_story(id).ok_or_else(|| not_found(id))?)
            }
            StatisticsTarget::Version(id) => {
                to_value(&stats.version(id).ok_or_else(|| not_found(id))?)
            }
        }?;
        Ok(serde_json::json!({
            "statistics": body,
            "request_id": stamp.request_id,
        }))
    }
}

fn caller_label(user: &Option<UserId>) -> String {
    match user {
        Some(id) => format!("user {id}"),
        None => "anonymous caller".to_string(),
    }
}

fn to_value(value: &impl serde::Serialize) -> Result<Value, ServiceError> {
    serde_json::to_value(value).map_err(|e| ServiceError::Serialization(e.to_string()))
}

#[cfg(test)]
pub(crate) mod fixture {
    use chrono::{TimeZone, Utc};
    use epicgrid_core::{
        Issue, IssueId, Member, Project, ProjectData, ProjectFile, TrackerDef, User, Version,
    };

    fn issue(id: IssueId, tracker: &str, parent: Option<IssueId>) -> Issue {
        let created = Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap();
        let mut issue = Issue::new(id, tracker, format!("{tracker} {id}"), created);
        issue.parent_id = parent;
        issue
    }

    fn user(id: u64, login: &str, admin: bool) -> User {
        User {
            id,
            login: login.to_string(),
            firstname: String::new(),
            lastname: String::new(),
            mail: String::new(),
            admin,
        }
    }

    /// Users: 1 admin, 2 member with view_issues, 3 member without, 4 outsider.
    pub fn project() -> ProjectData {
        let file = ProjectFile {
            project: Project {
                id: 1,
                name: "Service".to_string(),
                identifier: "service".to_string(),
                description: String::new(),
            },
            versions: vec![Version::new(10, "V1")],
            users: vec![
                user(1, "root", true),
                user(2, "dev", false),
                user(3, "guest", false),
                user(4, "outsider", false),
            ],
            statuses: Vec::new(),
            trackers: vec![TrackerDef {
                id: 1,
                name: "Epic".to_string(),
                description: String::new(),
            }],
            members: vec![
                Member {
                    user_id: 2,
                    permissions: vec!["view_issues".to_string()],
                },
                Member {
                    user_id: 3,
                    permissions: vec!["add_issues".to_string()],
                },
            ],
        };
        ProjectData::new(
            file,
            vec![
                issue(1, "Epic", None),
                issue(2, "Feature", Some(1)),
                issue(3, "UserStory", Some(2)).with_version(10),
            ],
        )
        .expect("fixture project should build")
    }
}
