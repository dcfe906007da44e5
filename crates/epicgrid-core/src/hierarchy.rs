//! Tracker-hierarchy checks over a whole issue store.

use crate::issue::{Issue, IssueId};
use crate::store::IssueStore;
use crate::tracker::{TrackerNames, TrackerRole};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

pub const HIERARCHY_CHECK_KIND: &str = "epicgrid.hierarchy.check.v1";

pub const FAILURE_CLASS_INVALID_PARENT: &str = "hierarchy.parent.invalid";
pub const FAILURE_CLASS_ORPHAN: &str = "hierarchy.parent.missing";
pub const WARNING_CLASS_FEATURE_WITHOUT_STORIES: &str = "hierarchy.feature.no_user_stories";
pub const WARNING_CLASS_STORY_WITHOUT_TASKS: &str = "hierarchy.user_story.no_tasks";
pub const WARNING_CLASS_STORY_WITHOUT_TESTS: &str = "hierarchy.user_story.no_tests";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct HierarchyFinding {
    pub issue_id: IssueId,
    pub class: String,
    pub message: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct HierarchySummary {
    pub issue_count: usize,
    pub grid_issue_count: usize,
    pub error_count: usize,
    pub warning_count: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct HierarchyCheckReport {
    pub check_kind: String,
    pub result: String,
    pub failure_classes: Vec<String>,
    pub warning_classes: Vec<String>,
    pub errors: Vec<HierarchyFinding>,
    pub warnings: Vec<HierarchyFinding>,
    pub summary: HierarchySummary,
}

impl HierarchyCheckReport {
    pub fn accepted(&self) -> bool {
        self.result == "accepted"
    }
}

fn finding(issue: &Issue, class: &str, message: String) -> HierarchyFinding {
    HierarchyFinding {
        issue_id: issue.id,
        class: class.to_string(),
        message,
    }
}

fn classes(findings: &[HierarchyFinding]) -> Vec<String> {
    findings
        .iter()
        .map(|f| f.class.clone())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

/// Validate parent/child tracker pairs and flag incomplete branches.
///
/// Issues whose tracker is outside the configured grid trackers are ignored.
pub fn check_hierarchy(store: &IssueStore, names: &TrackerNames) -> HierarchyCheckReport {
    let mut errors = Vec::new();
    let mut warnings = Vec::new();
    let mut grid_issue_count = 0;

    for issue in store.issues() {
        let Some(role) = names.role_of(&issue.tracker) else {
            continue;
        };
        grid_issue_count += 1;

        match issue.parent_id.and_then(|id| store.issue(id)) {
            None if role != TrackerRole::Epic => errors.push(finding(
                issue,
                FAILURE_CLASS_ORPHAN,
                format!("{} has no parent", issue.tracker),
            )),
            Some(parent) => {
                let parent_role = names.role_of(&parent.tracker);
                if !parent_role.is_some_and(|p| role.valid_parent(p)) {
                    errors.push(finding(
                        issue,
                        FAILURE_CLASS_INVALID_PARENT,
                        format!(
                            "{} cannot be a child of {} #{}",
                            issue.tracker, parent.tracker, parent.id
                        ),
                    ));
                }
            }
            None => {}
        }

        let child_roles: BTreeSet<TrackerRole> = store
            .child_issues(issue.id)
            .filter_map(|child| names.role_of(&child.tracker))
            .collect();
        match role {
            TrackerRole::Feature if !child_roles.contains(&TrackerRole::UserStory) => {
                warnings.push(finding(
                    issue,
                    WARNING_CLASS_FEATURE_WITHOUT_STORIES,
                    "feature has no user stories".to_string(),
                ));
            }
            TrackerRole::UserStory => {
                if !child_roles.contains(&TrackerRole::Task) {
                    warnings.push(finding(
                        issue,
                        WARNING_CLASS_STORY_WITHOUT_TASKS,
                        "user story has no tasks".to_string(),
                    ));
                }
                if !child_roles.contains(&TrackerRole::Test) {
                    warnings.push(finding(
                        issue,
                        WARNING_CLASS_STORY_WITHOUT_TESTS,
                        "user story has no tests".to_string(),
                    ));
                }
            }
            _ => {}
        }
    }

    let result = if errors.is_empty() { "accepted" } else { "rejected" };
    let summary = HierarchySummary {
        issue_count: store.len(),
        grid_issue_count,
        error_count: errors.len(),
        warning_count: warnings.len(),
    };
    HierarchyCheckReport {
        check_kind: HIERARCHY_CHECK_KIND.to_string(),
        result: result.to_string(),
        failure_classes: classes(&errors),
        warning_classes: classes(&warnings),
        errors,
        warnings,
        summary,
    }
}
