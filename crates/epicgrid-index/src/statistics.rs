//! Progress, health and risk figures for projects, epics, features,
//! user stories and versions.
//!
//! Percentages are rounded to two decimals. "Today" is always passed in so
//! the figures are reproducible.

use chrono::{Days, NaiveDate};
use epicgrid_core::{Issue, IssueId, ProjectData, TrackerNames, TrackerRole, VersionId};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

const PASSED_TEST_STATUSES: [&str; 2] = ["Resolved", "Closed"];
const FAILED_TEST_STATUSES: [&str; 2] = ["Failed", "Rejected"];
const UNASSIGNED: &str = "unassigned";

fn round_to(value: f64, places: i32) -> f64 {
    let scale = 10f64.powi(places);
    (value * scale).round() / scale
}

fn percent(part: usize, whole: usize) -> f64 {
    if whole == 0 {
        return 0.0;
    }
    round_to(part as f64 / whole as f64 * 100.0, 2)
}

fn closed_count(issues: &[&Issue]) -> usize {
    issues.iter().filter(|issue| issue.is_closed).count()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Low,
    Medium,
    High,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskFlag {
    #[serde(rename = "type")]
    pub kind: String,
    pub severity: Severity,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BlockingIssue {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub severity: Option<Severity>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub count: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rate: Option<f64>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub issue_ids: Vec<IssueId>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChildCounts {
    pub tasks: usize,
    pub tests: usize,
    pub bugs: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectStatistics {
    pub total_issues: usize,
    pub by_tracker: BTreeMap<String, usize>,
    pub by_status: BTreeMap<String, usize>,
    pub by_assignee: BTreeMap<String, usize>,
}

/// Figures embedded in each epic entity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EpicSummary {
    pub total_features: usize,
    pub completed_features: usize,
    pub total_user_stories: usize,
    pub total_child_items: usize,
    pub completion_percentage: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EpicStatistics {
    pub epic_id: IssueId,
    #[serde(flatten)]
    pub summary: EpicSummary,
    pub completed_user_stories: usize,
    pub completed_child_items: usize,
    pub version_consistency: bool,
    pub expected_completion_percentage: f64,
    pub health_score: f64,
    pub risk_assessment: Vec<RiskFlag>,
    pub estimated_completion_date: Option<NaiveDate>,
}

/// Figures embedded in each feature entity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureSummary {
    pub total_user_stories: usize,
    pub completed_user_stories: usize,
    pub total_child_items: usize,
    pub child_items_by_type: ChildCounts,
    pub completion_percentage: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureStatistics {
    pub feature_id: IssueId,
    #[serde(flatten)]
    pub summary: FeatureSummary,
    pub version_consistency: bool,
    pub task_completion_rate: f64,
    pub test_pass_rate: f64,
    pub bug_fix_rate: f64,
    pub quality_score: f64,
    pub development_efficiency: f64,
    pub blocking_issues: Vec<BlockingIssue>,
}

/// Figures embedded in each user story entity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserStorySummary {
    pub total_tasks: usize,
    pub completed_tasks: usize,
    pub total_tests: usize,
    pub passed_tests: usize,
    pub total_bugs: usize,
    pub resolved_bugs: usize,
    pub completion_percentage: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserStoryStatistics {
    pub user_story_id: IssueId,
    #[serde(flatten)]
    pub summary: UserStorySummary,
    pub total_child_items: usize,
    pub completed_child_items: usize,
    pub version_consistency: bool,
    pub blocking_issues: Vec<BlockingIssue>,
}

/// Figures embedded in each version entity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VersionSummary {
    pub total_issues: usize,
    pub completed_issues: usize,
    pub completion_rate: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ScheduleVariance {
    OnTime {
        days_remaining: i64,
        completion_needed_per_day: f64,
    },
    Overdue {
        days_overdue: i64,
        remaining_completion: f64,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VersionStatistics {
    pub version_id: VersionId,
    pub total_epics: usize,
    pub total_features: usize,
    #[serde(flatten)]
    pub summary: VersionSummary,
    pub issues_by_tracker: BTreeMap<String, usize>,
    pub issues_by_status: BTreeMap<String, usize>,
    pub schedule_variance: Option<ScheduleVariance>,
    pub release_readiness: f64,
}

/// Statistics over one loaded project.
#[derive(Debug, Clone, Copy)]
pub struct Statistics<'a> {
    project: &'a ProjectData,
    names: &'a TrackerNames,
    today: NaiveDate,
}

impl<'a> Statistics<'a> {
    pub fn new(project: &'a ProjectData, names: &'a TrackerNames, today: NaiveDate) -> Self {
        Self {
            project,
            names,
            today,
        }
    }

    fn role(&self, issue: &Issue) -> Option<TrackerRole> {
        self.names.role_of(&issue.tracker)
    }

    fn issue_as(&self, id: IssueId, role: TrackerRole) -> Option<&'a Issue> {
        self.project
            .issues
            .issue(id)
            .filter(|issue| self.role(issue) == Some(role))
    }

    fn children_with(&self, id: IssueId, roles: &[TrackerRole]) -> Vec<&'a Issue> {
        self.project
            .issues
            .child_issues(id)
            .filter(|child| self.role(child).is_some_and(|r| roles.contains(&r)))
            .collect()
    }

    fn children_of_all(&self, parents: &[&Issue], roles: &[TrackerRole]) -> Vec<&'a Issue> {
        parents
            .iter()
            .flat_map(|parent| self.children_with(parent.id, roles))
            .collect()
    }

    fn days_since_created(&self, issue: &Issue) -> i64 {
        (self.today - issue.created_on.date_naive()).num_days()
    }

    pub fn project(&self) -> ProjectStatistics {
        let mut by_tracker = BTreeMap::new();
        let mut by_status = BTreeMap::new();
        let mut by_assignee = BTreeMap::new();
        for issue in self.project.issues.issues() {
            *by_tracker.entry(issue.tracker.clone()).or_insert(0) += 1;
            *by_status.entry(issue.status.clone()).or_insert(0) += 1;
            let assignee = match issue.assigned_to_id {
                None => UNASSIGNED.to_string(),
                Some(id) => self
                    .project
                    .user(id)
                    .map(|user| user.display_name())
                    .unwrap_or_else(|| format!("user #{id}")),
            };
            *by_assignee.entry(assignee).or_insert(0) += 1;
        }
        ProjectStatistics {
            total_issues: self.project.issues.len(),
            by_tracker,
            by_status,
            by_assignee,
        }
    }

    pub fn epic_summary(&self, epic: &Issue) -> EpicSummary {
        let features = self.children_with(epic.id, &[TrackerRole::Feature]);
        let stories = self.children_of_all(&features, &[TrackerRole::UserStory]);
        let items = self.children_of_all(&stories, &LEAF_ROLES);
        EpicSummary {
            total_features: features.len(),
            completed_features: closed_count(&features),
            total_user_stories: stories.len(),
            total_child_items: items.len(),
            completion_percentage: percent(closed_count(&features), features.len()),
        }
    }

    pub fn epic(&self, id: IssueId) -> Option<EpicStatistics> {
        let epic = self.issue_as(id, TrackerRole::Epic)?;
        let summary = self.epic_summary(epic);
        let features = self.children_with(epic.id, &[TrackerRole::Feature]);
        let stories = self.children_of_all(&features, &[TrackerRole::UserStory]);
        let items = self.children_of_all(&stories, &LEAF_ROLES);

        let version_consistency = features
            .iter()
            .all(|feature| feature.fixed_version_id == epic.fixed_version_id);
        let expected = self.expected_completion(epic);
        let completion = summary.completion_percentage;

        let mut risks = Vec::new();
        if completion < expected {
            risks.push(RiskFlag {
                kind: "progress_delay".to_string(),
                severity: Severity::Medium,
                message: "progress is behind schedule".to_string(),
            });
        }
        if !version_consistency {
            risks.push(RiskFlag {
                kind: "version_inconsistency".to_string(),
                severity: Severity::High,
                message: "features target a different version than the epic".to_string(),
            });
        }
        if summary.total_features > 0
            && (summary.total_user_stories as f64 / summary.total_features as f64) < 2.0
        {
            risks.push(RiskFlag {
                kind: "insufficient_user_stories".to_string(),
                severity: Severity::Low,
                message: "fewer than two user stories per feature".to_string(),
            });
        }

        let mut score = 100.0;
        if completion < expected {
            score -= (expected - completion) * 0.5;
        }
        if !version_consistency {
            score -= 20.0;
        }
        if summary.total_features > 0 && summary.total_user_stories == 0 {
            score -= 30.0;
        }
        let health_score = round_to(f64::max(score, 0.0), 1);

        Some(EpicStatistics {
            epic_id: epic.id,
            completed_user_stories: closed_count(&stories),
            completed_child_items: closed_count(&items),
            version_consistency,
            expected_completion_percentage: expected,
            health_score,
            risk_assessment: risks,
            estimated_completion_date: self.estimate_completion(epic, completion),
            summary,
        })
    }

    /// Share of the created→due window that has elapsed; 0 without a due date.
    fn expected_completion(&self, issue: &Issue) -> f64 {
        let Some(due) = issue.due_date else {
            return 0.0;
        };
        let created = issue.created_on.date_naive();
        let total_days = (due - created).num_days();
        let elapsed_days = (self.today - created).num_days();
        if elapsed_days >= total_days {
            return 100.0;
        }
        round_to(elapsed_days as f64 / total_days as f64 * 100.0, 2)
    }

    /// Linear extrapolation of the progress made since creation.
    fn estimate_completion(&self, issue: &Issue, completion: f64) -> Option<NaiveDate> {
        if completion >= 100.0 || completion == 0.0 {
            return None;
        }
        let elapsed = self.days_since_created(issue);
        if elapsed <= 0 {
            return None;
        }
        let per_day = completion / elapsed as f64;
        let remaining = ((100.0 - completion) / per_day).ceil() as u64;
        self.today.checked_add_days(Days::new(remaining))
    }

    pub fn feature_summary(&self, feature: &Issue) -> FeatureSummary {
        let stories = self.children_with(feature.id, &[TrackerRole::UserStory]);
        let items = self.children_of_all(&stories, &LEAF_ROLES);
        FeatureSummary {
            total_user_stories: stories.len(),
            completed_user_stories: closed_count(&stories),
            total_child_items: items.len(),
            child_items_by_type: self.count_by_kind(&items),
            completion_percentage: percent(closed_count(&stories), stories.len()),
        }
    }

    fn count_by_kind(&self, items: &[&Issue]) -> ChildCounts {
        let mut counts = ChildCounts::default();
        for item in items {
            match self.role(item) {
                Some(TrackerRole::Task) => counts.tasks += 1,
                Some(TrackerRole::Test) => counts.tests += 1,
                Some(TrackerRole::Bug) => counts.bugs += 1,
                _ => {}
            }
        }
        counts
    }

    fn of_role<'i>(&self, items: &[&'i Issue], role: TrackerRole) -> Vec<&'i Issue> {
        items
            .iter()
            .copied()
            .filter(|item| self.role(item) == Some(role))
            .collect()
    }

    pub fn feature(&self, id: IssueId) -> Option<FeatureStatistics> {
        let feature = self.issue_as(id, TrackerRole::Feature)?;
        let summary = self.feature_summary(feature);
        let stories = self.children_with(feature.id, &[TrackerRole::UserStory]);
        let items = self.children_of_all(&stories, &LEAF_ROLES);

        let tasks = self.of_role(&items, TrackerRole::Task);
        let tests = self.of_role(&items, TrackerRole::Test);
        let bugs = self.of_role(&items, TrackerRole::Bug);
        let task_completion_rate = percent(closed_count(&tasks), tasks.len());
        let test_pass_rate = percent(passed_count(&tests), tests.len());
        let bug_fix_rate = percent(closed_count(&bugs), bugs.len());

        let quality_score = if items.is_empty() {
            100.0
        } else {
            let weighted = [
                (tasks.len(), task_completion_rate, 0.4),
                (tests.len(), test_pass_rate, 0.4),
                (bugs.len(), bug_fix_rate, 0.2),
            ];
            let (score, weight) = weighted
                .iter()
                .filter(|(count, _, _)| *count > 0)
                .fold((0.0, 0.0), |(s, w), (_, rate, weight)| (s + rate * weight, w + weight));
            if weight == 0.0 { 100.0 } else { round_to(score / weight, 2) }
        };

        let elapsed = self.days_since_created(feature);
        let development_efficiency = if stories.is_empty() || elapsed <= 0 {
            0.0
        } else {
            round_to(stories.len() as f64 / elapsed as f64, 3)
        };

        let mut blocking = Vec::new();
        let open_stories = stories.len() - closed_count(&stories);
        if open_stories as f64 > stories.len() as f64 * 0.7 {
            blocking.push(BlockingIssue {
                kind: "many_incomplete_user_stories".to_string(),
                severity: Some(Severity::High),
                count: Some(open_stories),
                rate: None,
                issue_ids: Vec::new(),
            });
        }
        if !tests.is_empty() && test_pass_rate < 70.0 {
            blocking.push(BlockingIssue {
                kind: "low_test_pass_rate".to_string(),
                severity: Some(Severity::Medium),
                count: None,
                rate: Some(test_pass_rate),
                issue_ids: Vec::new(),
            });
        }
        if !bugs.is_empty() && bug_fix_rate < 80.0 {
            blocking.push(BlockingIssue {
                kind: "many_unfixed_bugs".to_string(),
                severity: Some(Severity::High),
                count: None,
                rate: Some(bug_fix_rate),
                issue_ids: Vec::new(),
            });
        }

        Some(FeatureStatistics {
            feature_id: feature.id,
            version_consistency: stories
                .iter()
                .all(|story| story.fixed_version_id == feature.fixed_version_id),
            summary,
            task_completion_rate,
            test_pass_rate,
            bug_fix_rate,
            quality_score,
            development_efficiency,
            blocking_issues: blocking,
        })
    }

    pub fn user_story_summary(&self, story: &Issue) -> UserStorySummary {
        let items = self.children_with(story.id, &LEAF_ROLES);
        let tasks = self.of_role(&items, TrackerRole::Task);
        let tests = self.of_role(&items, TrackerRole::Test);
        let bugs = self.of_role(&items, TrackerRole::Bug);
        UserStorySummary {
            total_tasks: tasks.len(),
            completed_tasks: closed_count(&tasks),
            total_tests: tests.len(),
            passed_tests: passed_count(&tests),
            total_bugs: bugs.len(),
            resolved_bugs: closed_count(&bugs),
            completion_percentage: percent(closed_count(&items), items.len()),
        }
    }

    pub fn user_story(&self, id: IssueId) -> Option<UserStoryStatistics> {
        let story = self.issue_as(id, TrackerRole::UserStory)?;
        let items = self.children_with(story.id, &LEAF_ROLES);
        let tasks = self.of_role(&items, TrackerRole::Task);
        let tests = self.of_role(&items, TrackerRole::Test);

        let mut blocking = Vec::new();
        let open_tasks: Vec<IssueId> = tasks.iter().filter(|t| !t.is_closed).map(|t| t.id).collect();
        if !open_tasks.is_empty() {
            blocking.push(BlockingIssue {
                kind: "incomplete_tasks".to_string(),
                severity: None,
                count: Some(open_tasks.len()),
                rate: None,
                issue_ids: open_tasks,
            });
        }
        let failed: Vec<IssueId> = tests
            .iter()
            .filter(|t| FAILED_TEST_STATUSES.contains(&t.status.as_str()))
            .map(|t| t.id)
            .collect();
        if !failed.is_empty() {
            blocking.push(BlockingIssue {
                kind: "failed_tests".to_string(),
                severity: None,
                count: Some(failed.len()),
                rate: None,
                issue_ids: failed,
            });
        }

        Some(UserStoryStatistics {
            user_story_id: story.id,
            summary: self.user_story_summary(story),
            total_child_items: items.len(),
            completed_child_items: closed_count(&items),
            version_consistency: items
                .iter()
                .all(|item| item.fixed_version_id == story.fixed_version_id),
            blocking_issues: blocking,
        })
    }

    fn version_issues(&self, id: VersionId) -> Vec<&'a Issue> {
        self.project
            .issues
            .issues()
            .filter(|issue| issue.fixed_version_id == Some(id))
            .collect()
    }

    pub fn version_summary(&self, id: VersionId) -> VersionSummary {
        let issues = self.version_issues(id);
        VersionSummary {
            total_issues: issues.len(),
            completed_issues: closed_count(&issues),
            completion_rate: percent(closed_count(&issues), issues.len()),
        }
    }

    pub fn version(&self, id: VersionId) -> Option<VersionStatistics> {
        let version = self.project.version(id)?;
        let issues = self.version_issues(id);
        let summary = self.version_summary(id);

        let mut issues_by_tracker = BTreeMap::new();
        let mut issues_by_status = BTreeMap::new();
        for issue in &issues {
            *issues_by_tracker.entry(issue.tracker.clone()).or_insert(0) += 1;
            *issues_by_status.entry(issue.status.clone()).or_insert(0) += 1;
        }

        let epics = self.of_role(&issues, TrackerRole::Epic);
        let features = self.of_role(&issues, TrackerRole::Feature);
        let tests = self.of_role(&issues, TrackerRole::Test);

        let schedule_variance = version.effective_date.map(|due| {
            if self.today <= due {
                let days_remaining = (due - self.today).num_days();
                let needed = if days_remaining > 0 {
                    round_to((100.0 - summary.completion_rate) / days_remaining as f64, 2)
                } else {
                    0.0
                };
                ScheduleVariance::OnTime {
                    days_remaining,
                    completion_needed_per_day: needed,
                }
            } else {
                ScheduleVariance::Overdue {
                    days_overdue: (self.today - due).num_days(),
                    remaining_completion: round_to(100.0 - summary.completion_rate, 2),
                }
            }
        });

        let release_readiness = if issues.is_empty() {
            0.0
        } else {
            let share = |done: usize, total: usize| {
                if total == 0 { 0.0 } else { done as f64 / total as f64 }
            };
            let score = share(closed_count(&epics), epics.len()) * 40.0
                + share(closed_count(&features), features.len()) * 30.0
                + share(passed_count(&tests), tests.len()) * 30.0;
            round_to(score, 2)
        };

        Some(VersionStatistics {
            version_id: version.id,
            total_epics: epics.len(),
            total_features: features.len(),
            summary,
            issues_by_tracker,
            issues_by_status,
            schedule_variance,
            release_readiness,
        })
    }
}

const LEAF_ROLES: [TrackerRole; 3] = [TrackerRole::Task, TrackerRole::Test, TrackerRole::Bug];

fn passed_count(tests: &[&Issue]) -> usize {
    tests
        .iter()
        .filter(|test| PASSED_TEST_STATUSES.contains(&test.status.as_str()))
        .count()
}
