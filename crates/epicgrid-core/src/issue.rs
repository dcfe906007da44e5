//! Issue record: one row of the tracker's issue table.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

pub type IssueId = u64;
pub type VersionId = u64;
pub type UserId = u64;

/// A tracked work item as stored in `issues.jsonl`.
///
/// The tree position (`lft`/`rgt`/`root_id`) is not stored; the issue store
/// derives it from `parent_id` on load.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Issue {
    pub id: IssueId,
    pub subject: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,

    /// Tracker display name (`Epic`, `Feature`, ...).
    pub tracker: String,
    #[serde(default)]
    pub status_id: u64,
    #[serde(default = "default_status")]
    pub status: String,
    #[serde(default)]
    pub is_closed: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assigned_to_id: Option<UserId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<IssueId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fixed_version_id: Option<VersionId>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_date: Option<NaiveDate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub due_date: Option<NaiveDate>,
    #[serde(default)]
    pub done_ratio: u8,

    pub created_on: DateTime<Utc>,
    #[serde(default = "default_timestamp")]
    pub updated_on: DateTime<Utc>,
}

fn default_status() -> String {
    "New".to_string()
}

fn default_timestamp() -> DateTime<Utc> {
    DateTime::<Utc>::UNIX_EPOCH
}

impl Issue {
    pub fn new(
        id: IssueId,
        tracker: impl Into<String>,
        subject: impl Into<String>,
        created_on: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            subject: subject.into(),
            description: String::new(),
            tracker: tracker.into(),
            status_id: 1,
            status: default_status(),
            is_closed: false,
            assigned_to_id: None,
            parent_id: None,
            fixed_version_id: None,
            start_date: None,
            due_date: None,
            done_ratio: 0,
            created_on,
            updated_on: created_on,
        }
    }

    pub fn with_parent(mut self, parent_id: IssueId) -> Self {
        self.parent_id = Some(parent_id);
        self
    }

    pub fn with_version(mut self, version_id: VersionId) -> Self {
        self.fixed_version_id = Some(version_id);
        self
    }

    pub fn with_assignee(mut self, user_id: UserId) -> Self {
        self.assigned_to_id = Some(user_id);
        self
    }

    /// Set the status name, closing the issue when `closed` is true.
    pub fn with_status(mut self, status_id: u64, status: impl Into<String>, closed: bool) -> Self {
        self.status_id = status_id;
        self.status = status.into();
        self.is_closed = closed;
        self
    }

    pub fn close(self) -> Self {
        self.with_status(5, "Closed", true)
    }
}
