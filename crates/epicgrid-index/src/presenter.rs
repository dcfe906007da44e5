//! Wire payload: normalized entity maps, the grid index and request metadata.

use crate::builder::{GridIndex, GridRequest, build_index};
use crate::statistics::{
    EpicSummary, FeatureSummary, Statistics, UserStorySummary, VersionSummary,
};
use chrono::{DateTime, NaiveDate, Utc};
use epicgrid_core::{
    AssigneeMatch, Issue, IssueId, IssueQuery, ProjectData, StatusDef, TrackerDef, TrackerRole,
    UserId, Version, VersionScope, VersionStatus,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

pub const API_VERSION: &str = "v2";

/// Fields shared by every issue entity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IssueFields {
    pub id: String,
    pub subject: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,
    pub tracker_id: Option<u64>,
    pub status: String,
    pub status_id: u64,
    pub is_closed: bool,
    pub fixed_version_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assigned_to_id: Option<UserId>,
    pub done_ratio: u8,
    pub start_date: Option<NaiveDate>,
    pub due_date: Option<NaiveDate>,
    pub created_on: DateTime<Utc>,
    pub updated_on: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EpicEntity {
    #[serde(flatten)]
    pub fields: IssueFields,
    pub feature_ids: Vec<String>,
    pub statistics: EpicSummary,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureEntity {
    #[serde(flatten)]
    pub fields: IssueFields,
    pub parent_epic_id: Option<String>,
    pub user_story_ids: Vec<String>,
    pub statistics: FeatureSummary,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserStoryEntity {
    #[serde(flatten)]
    pub fields: IssueFields,
    pub parent_feature_id: Option<String>,
    pub task_ids: Vec<String>,
    pub test_ids: Vec<String>,
    pub bug_ids: Vec<String>,
    pub statistics: UserStorySummary,
}

/// Task, Test and Bug share one shape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LeafEntity {
    #[serde(flatten)]
    pub fields: IssueFields,
    pub parent_user_story_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VersionEntity {
    pub id: String,
    pub name: String,
    pub description: String,
    pub status: VersionStatus,
    pub effective_date: Option<NaiveDate>,
    pub created_on: DateTime<Utc>,
    pub updated_on: DateTime<Utc>,
    pub issue_count: usize,
    pub statistics: VersionSummary,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserEntity {
    pub id: UserId,
    pub login: String,
    pub firstname: String,
    pub lastname: String,
    pub mail: String,
    pub admin: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Entities {
    pub epics: BTreeMap<String, EpicEntity>,
    pub features: BTreeMap<String, FeatureEntity>,
    pub user_stories: BTreeMap<String, UserStoryEntity>,
    pub tasks: BTreeMap<String, LeafEntity>,
    pub tests: BTreeMap<String, LeafEntity>,
    pub bugs: BTreeMap<String, LeafEntity>,
    pub versions: BTreeMap<String, VersionEntity>,
    pub users: BTreeMap<String, UserEntity>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectMeta {
    pub id: u64,
    pub name: String,
    pub identifier: String,
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Metadata {
    pub project: ProjectMeta,
    pub available_statuses: Vec<StatusDef>,
    pub available_trackers: Vec<TrackerDef>,
    pub api_version: String,
    pub timestamp: DateTime<Utc>,
    pub request_id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GridPayload {
    pub entities: Entities,
    pub grid: GridIndex,
    pub metadata: Metadata,
}

/// Timestamp and correlation id stamped onto one response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResponseStamp {
    pub timestamp: DateTime<Utc>,
    pub request_id: String,
}

impl ResponseStamp {
    pub fn now() -> Self {
        Self {
            timestamp: Utc::now(),
            request_id: new_request_id(),
        }
    }

    pub fn today(&self) -> NaiveDate {
        self.timestamp.date_naive()
    }
}

/// `req_` followed by 16 lowercase hex characters.
pub fn new_request_id() -> String {
    let hex = uuid::Uuid::new_v4().simple().to_string();
    format!("req_{}", &hex[..16])
}

fn id_string(id: IssueId) -> String {
    id.to_string()
}

fn issue_fields(project: &ProjectData, issue: &Issue) -> IssueFields {
    IssueFields {
        id: id_string(issue.id),
        subject: issue.subject.clone(),
        description: issue.description.clone(),
        tracker_id: project.tracker_id(&issue.tracker),
        status: issue.status.clone(),
        status_id: issue.status_id,
        is_closed: issue.is_closed,
        fixed_version_id: issue.fixed_version_id.map(|id| id.to_string()),
        assigned_to_id: issue.assigned_to_id,
        done_ratio: issue.done_ratio,
        start_date: issue.start_date,
        due_date: issue.due_date,
        created_on: issue.created_on,
        updated_on: issue.updated_on,
    }
}

/// Build the entity maps.
///
/// Entity membership follows the filters; the child id lists inside each
/// entity are the unfiltered children so the client can tell what is hidden.
pub fn build_entities(
    project: &ProjectData,
    request: &GridRequest,
    include_closed: bool,
    stats: &Statistics<'_>,
) -> Entities {
    let names = &request.trackers;
    let query = IssueQuery::new(
        project,
        &request.filters,
        include_closed,
        request.exclude_closed_versions,
    );
    let child_ids = |parent: IssueId, role: TrackerRole| -> Vec<String> {
        project
            .issues
            .child_issues(parent)
            .filter(|child| names.role_of(&child.tracker) == Some(role))
            .map(|child| id_string(child.id))
            .collect()
    };
    let parent_id = |issue: &Issue| issue.parent_id.map(id_string);
    let select = |role: TrackerRole, scope: VersionScope, assignee: AssigneeMatch| {
        query.tracker_issues(names.name(role), scope, assignee)
    };

    let mut entities = Entities::default();

    for epic in select(TrackerRole::Epic, VersionScope::Unrestricted, AssigneeMatch::Hierarchical) {
        entities.epics.insert(
            id_string(epic.id),
            EpicEntity {
                fields: issue_fields(project, epic),
                feature_ids: child_ids(epic.id, TrackerRole::Feature),
                statistics: stats.epic_summary(epic),
            },
        );
    }

    for feature in select(TrackerRole::Feature, VersionScope::Unrestricted, AssigneeMatch::Hierarchical) {
        entities.features.insert(
            id_string(feature.id),
            FeatureEntity {
                fields: issue_fields(project, feature),
                parent_epic_id: parent_id(feature),
                user_story_ids: child_ids(feature.id, TrackerRole::UserStory),
                statistics: stats.feature_summary(feature),
            },
        );
    }

    for story in select(TrackerRole::UserStory, VersionScope::Windowed, AssigneeMatch::Hierarchical) {
        entities.user_stories.insert(
            id_string(story.id),
            UserStoryEntity {
                fields: issue_fields(project, story),
                parent_feature_id: parent_id(story),
                task_ids: child_ids(story.id, TrackerRole::Task),
                test_ids: child_ids(story.id, TrackerRole::Test),
                bug_ids: child_ids(story.id, TrackerRole::Bug),
                statistics: stats.user_story_summary(story),
            },
        );
    }

    for (role, target) in [
        (TrackerRole::Task, &mut entities.tasks),
        (TrackerRole::Test, &mut entities.tests),
        (TrackerRole::Bug, &mut entities.bugs),
    ] {
        for leaf in select(role, VersionScope::Windowed, AssigneeMatch::Direct) {
            target.insert(
                id_string(leaf.id),
                LeafEntity {
                    fields: issue_fields(project, leaf),
                    parent_user_story_id: parent_id(leaf),
                },
            );
        }
    }

    for version in query.versions() {
        entities
            .versions
            .insert(version.id.to_string(), version_entity(version, stats));
    }

    for user in project.member_users() {
        entities.users.insert(
            user.id.to_string(),
            UserEntity {
                id: user.id,
                login: user.login.clone(),
                firstname: user.firstname.clone(),
                lastname: user.lastname.clone(),
                mail: user.mail.clone(),
                admin: user.admin,
            },
        );
    }

    entities
}

fn version_entity(version: &Version, stats: &Statistics<'_>) -> VersionEntity {
    let summary = stats.version_summary(version.id);
    VersionEntity {
        id: version.id.to_string(),
        name: version.name.clone(),
        description: version.description.clone(),
        status: version.status,
        effective_date: version.effective_date,
        created_on: version.created_on,
        updated_on: version.updated_on,
        issue_count: summary.total_issues,
        statistics: summary,
    }
}

pub fn build_metadata(project: &ProjectData, stamp: &ResponseStamp) -> Metadata {
    let mut trackers = project.trackers.clone();
    trackers.sort_by_key(|tracker| tracker.id);
    Metadata {
        project: ProjectMeta {
            id: project.project.id,
            name: project.project.name.clone(),
            identifier: project.project.identifier.clone(),
            description: project.project.description.clone(),
        },
        available_statuses: project.statuses.clone(),
        available_trackers: trackers,
        api_version: API_VERSION.to_string(),
        timestamp: stamp.timestamp,
        request_id: stamp.request_id.clone(),
    }
}

/// Assemble the full grid response for one request.
pub fn present_grid(
    project: &ProjectData,
    request: &GridRequest,
    include_closed: bool,
    stamp: &ResponseStamp,
) -> GridPayload {
    let stats = Statistics::new(project, &request.trackers, stamp.today());
    let entities = build_entities(project, request, include_closed, &stats);
    let grid = build_index(project, request);
    tracing::info!(
        request_id = %stamp.request_id,
        epics = entities.epics.len(),
        features = entities.features.len(),
        user_stories = entities.user_stories.len(),
        "grid payload assembled"
    );
    GridPayload {
        entities,
        grid,
        metadata: build_metadata(project, stamp),
    }
}
