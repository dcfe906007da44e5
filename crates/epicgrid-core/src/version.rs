//! Project versions (Redmine "target versions").

use crate::issue::VersionId;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// Cell-key component used for issues without a fixed version.
pub const NO_VERSION: &str = "none";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VersionStatus {
    Open,
    Locked,
    Closed,
}

impl VersionStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            VersionStatus::Open => "open",
            VersionStatus::Locked => "locked",
            VersionStatus::Closed => "closed",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Version {
    pub id: VersionId,
    pub name: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,
    #[serde(default = "default_status")]
    pub status: VersionStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub effective_date: Option<NaiveDate>,
    #[serde(default = "default_timestamp")]
    pub created_on: DateTime<Utc>,
    #[serde(default = "default_timestamp")]
    pub updated_on: DateTime<Utc>,
}

fn default_status() -> VersionStatus {
    VersionStatus::Open
}

fn default_timestamp() -> DateTime<Utc> {
    DateTime::<Utc>::UNIX_EPOCH
}

impl Version {
    pub fn new(id: VersionId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            description: String::new(),
            status: VersionStatus::Open,
            effective_date: None,
            created_on: default_timestamp(),
            updated_on: default_timestamp(),
        }
    }

    pub fn with_effective_date(mut self, date: NaiveDate) -> Self {
        self.effective_date = Some(date);
        self
    }

    pub fn closed(mut self) -> Self {
        self.status = VersionStatus::Closed;
        self
    }

    pub fn is_closed(&self) -> bool {
        self.status == VersionStatus::Closed
    }
}
