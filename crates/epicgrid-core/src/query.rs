//! Scoped issue queries over a loaded project.
//!
//! Two base scopes exist. Epics and features are listed without the version
//! window so the grid always shows their full structure; user stories and
//! their children are further restricted to issues whose fixed version
//! survives the window.

use crate::filter::{FilterPlan, FilterSet};
use crate::issue::{Issue, IssueId, VersionId};
use crate::project::ProjectData;
use crate::sort::{SortOption, sort_versions};
use crate::version::Version;
use std::collections::BTreeSet;

/// Which base scope a tracker-level query starts from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VersionScope {
    Unrestricted,
    Windowed,
}

/// How the assignee filter applies at a tracker level.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssigneeMatch {
    /// Own assignee or any descendant's assignee.
    Hierarchical,
    /// Own assignee only.
    Direct,
}

#[derive(Debug, Clone)]
pub struct IssueQuery<'a> {
    project: &'a ProjectData,
    plan: FilterPlan,
    include_closed: bool,
    exclude_closed_versions: bool,
    windowed_versions: Option<BTreeSet<VersionId>>,
}

impl<'a> IssueQuery<'a> {
    pub fn new(
        project: &'a ProjectData,
        filters: &FilterSet,
        include_closed: bool,
        exclude_closed_versions: bool,
    ) -> Self {
        let plan = filters.plan();
        let windowed_versions = if plan.version_window.is_empty() {
            None
        } else {
            let ids: BTreeSet<VersionId> = project
                .versions
                .iter()
                .filter(|v| !(exclude_closed_versions && v.is_closed()))
                .filter(|v| plan.version_window.admits(v))
                .map(|v| v.id)
                .collect();
            tracing::debug!(versions = ids.len(), "version window resolved");
            Some(ids)
        };
        Self {
            project,
            plan,
            include_closed,
            exclude_closed_versions,
            windowed_versions,
        }
    }

    pub fn project(&self) -> &'a ProjectData {
        self.project
    }

    pub fn plan(&self) -> &FilterPlan {
        &self.plan
    }

    /// Whether `issue` passes the status gate, field predicates and parent expansion.
    fn in_base_scope(&self, issue: &Issue) -> bool {
        if !self.include_closed && issue.is_closed {
            return false;
        }
        let tracker_id = |name: &str| self.project.tracker_id(name);
        if !self
            .plan
            .predicates
            .iter()
            .all(|filter| filter.matches(issue, tracker_id))
        {
            return false;
        }
        self.plan.parent_ids.is_empty() || self.in_parent_family(issue.id)
    }

    /// The listed ids, everything under them, and everything above them.
    fn in_parent_family(&self, id: IssueId) -> bool {
        let store = &self.project.issues;
        self.plan.parent_ids.iter().any(|&anchor| {
            id == anchor || store.is_descendant_of(id, anchor) || store.is_ancestor_of(id, anchor)
        })
    }

    fn in_version_window(&self, issue: &Issue) -> bool {
        match &self.windowed_versions {
            None => true,
            Some(ids) => issue.fixed_version_id.is_some_and(|id| ids.contains(&id)),
        }
    }

    fn assignee_matches(&self, issue: &Issue, mode: AssigneeMatch) -> bool {
        let wanted = &self.plan.assignee_ids;
        if wanted.is_empty() {
            return true;
        }
        let own = |i: &Issue| i.assigned_to_id.is_some_and(|id| wanted.contains(&id));
        match mode {
            AssigneeMatch::Direct => own(issue),
            AssigneeMatch::Hierarchical => {
                own(issue) || self.project.issues.descendants(issue.id).any(own)
            }
        }
    }

    fn scoped(&self, issue: &Issue, scope: VersionScope) -> bool {
        self.in_base_scope(issue)
            && (scope == VersionScope::Unrestricted || self.in_version_window(issue))
    }

    /// Issues of one tracker, in id order.
    pub fn tracker_issues(
        &self,
        tracker_name: &str,
        scope: VersionScope,
        assignee: AssigneeMatch,
    ) -> Vec<&'a Issue> {
        self.project
            .issues
            .issues()
            .filter(|issue| issue.tracker == tracker_name)
            .filter(|issue| self.scoped(issue, scope))
            .filter(|issue| self.assignee_matches(issue, assignee))
            .collect()
    }

    /// Versions surviving the closed-version switch and the date window, unsorted.
    pub fn versions(&self) -> Vec<&'a Version> {
        let window = self.plan.version_window;
        self.project
            .versions
            .iter()
            .filter(|v| !(self.exclude_closed_versions && v.is_closed()))
            .filter(|v| window.admits(v))
            .collect()
    }

    pub fn sorted_versions(&self, option: SortOption) -> Vec<&'a Version> {
        sort_versions(self.versions(), option)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::IssueFilter;
    use crate::project::{Project, ProjectFile, TrackerDef};
    use crate::version::Version;
    use chrono::{NaiveDate, TimeZone, Utc};

    fn issue(id: IssueId, tracker: &str, parent: Option<IssueId>) -> Issue {
        let created = Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap() + chrono::Duration::minutes(id as i64);
        let mut issue = Issue::new(id, tracker, format!("{tracker} {id}"), created);
        issue.parent_id = parent;
        issue
    }

    fn project(issues: Vec<Issue>, versions: Vec<Version>) -> ProjectData {
        let file = ProjectFile {
            project: Project {
                id: 1,
                name: "Demo".to_string(),
                identifier: "demo".to_string(),
                description: String::new(),
            },
            versions,
            users: Vec::new(),
            statuses: Vec::new(),
            trackers: vec![
                TrackerDef { id: 1, name: "Epic".to_string(), description: String::new() },
                TrackerDef { id: 2, name: "Feature".to_string(), description: String::new() },
                TrackerDef { id: 3, name: "UserStory".to_string(), description: String::new() },
                TrackerDef { id: 4, name: "Task".to_string(), description: String::new() },
            ],
            members: Vec::new(),
        };
        ProjectData::new(file, issues).expect("project should build")
    }

    // Epic 1 ── Feature 2 ── Story 3 (user 7) ── Task 4
    // Epic 10 ── Feature 11 ── Story 12
    fn sample() -> ProjectData {
        project(
            vec![
                issue(1, "Epic", None),
                issue(2, "Feature", Some(1)),
                issue(3, "UserStory", Some(2)).with_assignee(7).with_version(100),
                issue(4, "Task", Some(3)),
                issue(10, "Epic", None),
                issue(11, "Feature", Some(10)),
                issue(12, "UserStory", Some(11)),
            ],
            vec![
                Version::new(100, "Sprint 1").with_effective_date(NaiveDate::from_ymd_opt(2025, 2, 1).unwrap()),
                Version::new(101, "Sprint 2"),
            ],
        )
    }

    fn ids(issues: &[&Issue]) -> Vec<IssueId> {
        issues.iter().map(|i| i.id).collect()
    }

    #[test]
    fn assignee_on_buried_story_surfaces_its_epic() {
        let data = sample();
        let filters = FilterSet::new().with(IssueFilter::AssignedToIdIn(vec![7]));
        let query = IssueQuery::new(&data, &filters, true, true);

        let epics = query.tracker_issues("Epic", VersionScope::Unrestricted, AssigneeMatch::Hierarchical);
        assert_eq!(ids(&epics), vec![1]);
        let tasks = query.tracker_issues("Task", VersionScope::Windowed, AssigneeMatch::Direct);
        assert!(tasks.is_empty());
    }

    #[test]
    fn parent_expansion_covers_ancestors_self_and_descendants() {
        let data = sample();
        let filters = FilterSet::new().with(IssueFilter::ParentIdIn(vec![2]));
        let query = IssueQuery::new(&data, &filters, true, true);

        let mut all = Vec::new();
        for tracker in ["Epic", "Feature", "UserStory", "Task"] {
            all.extend(ids(&query.tracker_issues(tracker, VersionScope::Unrestricted, AssigneeMatch::Direct)));
        }
        all.sort();
        assert_eq!(all, vec![1, 2, 3, 4]);
    }

    #[test]
    fn version_window_restricts_stories_but_not_features() {
        let data = sample();
        let filters = FilterSet::new().with(IssueFilter::VersionEffectiveDateGteq(
            NaiveDate::from_ymd_opt(2025, 1, 1).unwrap(),
        ));
        let query = IssueQuery::new(&data, &filters, true, true);

        let features = query.tracker_issues("Feature", VersionScope::Unrestricted, AssigneeMatch::Hierarchical);
        assert_eq!(ids(&features), vec![2, 11]);
        let stories = query.tracker_issues("UserStory", VersionScope::Windowed, AssigneeMatch::Hierarchical);
        assert_eq!(ids(&stories), vec![3]);
        let versions: Vec<VersionId> = query.versions().iter().map(|v| v.id).collect();
        assert_eq!(versions, vec![100]);
    }

    #[test]
    fn closed_issues_and_versions_follow_switches() {
        let mut issues = vec![issue(1, "Epic", None), issue(2, "Epic", None).close()];
        issues.push(issue(3, "Feature", Some(1)));
        let data = project(issues, vec![Version::new(1, "old").closed(), Version::new(2, "new")]);

        let open_only = IssueQuery::new(&data, &FilterSet::new(), false, true);
        let epics = open_only.tracker_issues("Epic", VersionScope::Unrestricted, AssigneeMatch::Hierarchical);
        assert_eq!(ids(&epics), vec![1]);
        assert_eq!(open_only.versions().len(), 1);

        let everything = IssueQuery::new(&data, &FilterSet::new(), true, false);
        let epics = everything.tracker_issues("Epic", VersionScope::Unrestricted, AssigneeMatch::Hierarchical);
        assert_eq!(ids(&epics), vec![1, 2]);
        assert_eq!(everything.versions().len(), 2);
    }

    #[test]
    fn tracker_id_filter_uses_project_trackers() {
        let data = sample();
        let filters = FilterSet::new().with(IssueFilter::TrackerIdIn(vec![2]));
        let query = IssueQuery::new(&data, &filters, true, true);
        assert!(query.tracker_issues("Epic", VersionScope::Unrestricted, AssigneeMatch::Direct).is_empty());
        assert_eq!(
            ids(&query.tracker_issues("Feature", VersionScope::Unrestricted, AssigneeMatch::Direct)),
            vec![2, 11]
        );
    }
}
