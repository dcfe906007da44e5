//! Tracker roles and the fixed Epic → Feature → UserStory → Task/Test/Bug adjacency.

use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};

/// Position of a tracker in the grid hierarchy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrackerRole {
    Epic,
    Feature,
    UserStory,
    Task,
    Test,
    Bug,
}

impl TrackerRole {
    pub const ALL: [TrackerRole; 6] = [
        TrackerRole::Epic,
        TrackerRole::Feature,
        TrackerRole::UserStory,
        TrackerRole::Task,
        TrackerRole::Test,
        TrackerRole::Bug,
    ];

    /// Hierarchy depth: Epic 0, Feature 1, UserStory 2, Task/Test/Bug 3.
    pub fn level(self) -> u8 {
        match self {
            TrackerRole::Epic => 0,
            TrackerRole::Feature => 1,
            TrackerRole::UserStory => 2,
            TrackerRole::Task | TrackerRole::Test | TrackerRole::Bug => 3,
        }
    }

    /// Roles allowed directly beneath this one.
    pub fn allowed_children(self) -> &'static [TrackerRole] {
        match self {
            TrackerRole::Epic => &[TrackerRole::Feature],
            TrackerRole::Feature => &[TrackerRole::UserStory, TrackerRole::Bug],
            TrackerRole::UserStory => &[TrackerRole::Task, TrackerRole::Test, TrackerRole::Bug],
            TrackerRole::Task | TrackerRole::Test | TrackerRole::Bug => &[],
        }
    }

    /// Roles allowed as the direct parent of this one.
    pub fn allowed_parents(self) -> &'static [TrackerRole] {
        match self {
            TrackerRole::Epic => &[],
            TrackerRole::Feature => &[TrackerRole::Epic],
            TrackerRole::UserStory => &[TrackerRole::Feature],
            TrackerRole::Task | TrackerRole::Test => &[TrackerRole::UserStory],
            TrackerRole::Bug => &[TrackerRole::UserStory, TrackerRole::Feature],
        }
    }

    pub fn valid_parent(self, parent: TrackerRole) -> bool {
        self.allowed_parents().contains(&parent)
    }

    /// Leaf kinds that hang off a UserStory.
    pub fn is_leaf(self) -> bool {
        self.level() == 3
    }

    pub fn as_str(self) -> &'static str {
        match self {
            TrackerRole::Epic => "epic",
            TrackerRole::Feature => "feature",
            TrackerRole::UserStory => "user_story",
            TrackerRole::Task => "task",
            TrackerRole::Test => "test",
            TrackerRole::Bug => "bug",
        }
    }
}

impl Display for TrackerRole {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Tracker names configured for each role.
///
/// Redmine identifies trackers by display name, and installations rename
/// them freely, so the mapping is configuration rather than code.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackerNames {
    pub epic: String,
    pub feature: String,
    pub user_story: String,
    pub task: String,
    pub test: String,
    pub bug: String,
}

impl Default for TrackerNames {
    fn default() -> Self {
        Self {
            epic: "Epic".to_string(),
            feature: "Feature".to_string(),
            user_story: "UserStory".to_string(),
            task: "Task".to_string(),
            test: "Test".to_string(),
            bug: "Bug".to_string(),
        }
    }
}

impl TrackerNames {
    pub fn name(&self, role: TrackerRole) -> &str {
        match role {
            TrackerRole::Epic => &self.epic,
            TrackerRole::Feature => &self.feature,
            TrackerRole::UserStory => &self.user_story,
            TrackerRole::Task => &self.task,
            TrackerRole::Test => &self.test,
            TrackerRole::Bug => &self.bug,
        }
    }

    /// Resolve a tracker name to its role. Trackers outside the grid map to `None`.
    pub fn role_of(&self, tracker_name: &str) -> Option<TrackerRole> {
        TrackerRole::ALL
            .into_iter()
            .find(|role| self.name(*role) == tracker_name)
    }
}
