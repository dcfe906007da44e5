//! Typed issue filters parsed from Ransack-style keys.
//!
//! HTTP and CLI callers send `status_id_in`, `fixed_version_effective_date_gteq`
//! and friends as strings. Each known key maps to one [`IssueFilter`] variant;
//! anything else is rejected at parse time.

use crate::issue::{Issue, IssueId, UserId, VersionId};
use crate::version::Version;
use chrono::NaiveDate;
use regex::Regex;
use std::collections::BTreeSet;
use std::sync::OnceLock;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IssueFilter {
    StatusIdIn(Vec<u64>),
    StatusIdEq(u64),
    TrackerIdIn(Vec<u64>),
    TrackerIdEq(u64),
    FixedVersionIdIn(Vec<VersionId>),
    FixedVersionIdEq(VersionId),
    FixedVersionIdNull(bool),
    SubjectCont(String),
    DescriptionCont(String),
    /// Hierarchical for Epic/Feature/UserStory, direct below.
    AssignedToIdIn(Vec<UserId>),
    /// The listed issues plus their ancestors and descendants.
    ParentIdIn(Vec<IssueId>),
    VersionEffectiveDateGteq(NaiveDate),
    VersionEffectiveDateLteq(NaiveDate),
    StartDateGteq(NaiveDate),
    StartDateLteq(NaiveDate),
    DueDateGteq(NaiveDate),
    DueDateLteq(NaiveDate),
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum FilterParseError {
    #[error("unknown filter key `{0}`")]
    UnknownKey(String),

    #[error("filter `{key}`: invalid value `{value}` ({expected})")]
    InvalidValue {
        key: String,
        value: String,
        expected: &'static str,
    },
}

/// Accepted filter keys.
pub const FILTER_KEYS: [&str; 17] = [
    "status_id_in",
    "status_id_eq",
    "tracker_id_in",
    "tracker_id_eq",
    "fixed_version_id_in",
    "fixed_version_id_eq",
    "fixed_version_id_null",
    "subject_cont",
    "description_cont",
    "assigned_to_id_in",
    "parent_id_in",
    "fixed_version_effective_date_gteq",
    "fixed_version_effective_date_lteq",
    "start_date_gteq",
    "start_date_lteq",
    "due_date_gteq",
    "due_date_lteq",
];

impl IssueFilter {
    /// Parse one `key=value` pair. List keys yield a one-element list.
    pub fn parse(key: &str, value: &str) -> Result<Self, FilterParseError> {
        let value = value.trim();
        let filter = match key {
            "status_id_in" => IssueFilter::StatusIdIn(vec![parse_id(key, value)?]),
            "status_id_eq" => IssueFilter::StatusIdEq(parse_id(key, value)?),
            "tracker_id_in" => IssueFilter::TrackerIdIn(vec![parse_id(key, value)?]),
            "tracker_id_eq" => IssueFilter::TrackerIdEq(parse_id(key, value)?),
            "fixed_version_id_in" => IssueFilter::FixedVersionIdIn(vec![parse_id(key, value)?]),
            "fixed_version_id_eq" => IssueFilter::FixedVersionIdEq(parse_id(key, value)?),
            "fixed_version_id_null" => IssueFilter::FixedVersionIdNull(parse_bool(key, value)?),
            "subject_cont" => IssueFilter::SubjectCont(value.to_string()),
            "description_cont" => IssueFilter::DescriptionCont(value.to_string()),
            "assigned_to_id_in" => IssueFilter::AssignedToIdIn(vec![parse_id(key, value)?]),
            "parent_id_in" => IssueFilter::ParentIdIn(vec![parse_id(key, value)?]),
            "fixed_version_effective_date_gteq" => {
                IssueFilter::VersionEffectiveDateGteq(parse_date(key, value)?)
            }
            "fixed_version_effective_date_lteq" => {
                IssueFilter::VersionEffectiveDateLteq(parse_date(key, value)?)
            }
            "start_date_gteq" => IssueFilter::StartDateGteq(parse_date(key, value)?),
            "start_date_lteq" => IssueFilter::StartDateLteq(parse_date(key, value)?),
            "due_date_gteq" => IssueFilter::DueDateGteq(parse_date(key, value)?),
            "due_date_lteq" => IssueFilter::DueDateLteq(parse_date(key, value)?),
            other => return Err(FilterParseError::UnknownKey(other.to_string())),
        };
        Ok(filter)
    }

    pub fn key(&self) -> &'static str {
        match self {
            IssueFilter::StatusIdIn(_) => "status_id_in",
            IssueFilter::StatusIdEq(_) => "status_id_eq",
            IssueFilter::TrackerIdIn(_) => "tracker_id_in",
            IssueFilter::TrackerIdEq(_) => "tracker_id_eq",
            IssueFilter::FixedVersionIdIn(_) => "fixed_version_id_in",
            IssueFilter::FixedVersionIdEq(_) => "fixed_version_id_eq",
            IssueFilter::FixedVersionIdNull(_) => "fixed_version_id_null",
            IssueFilter::SubjectCont(_) => "subject_cont",
            IssueFilter::DescriptionCont(_) => "description_cont",
            IssueFilter::AssignedToIdIn(_) => "assigned_to_id_in",
            IssueFilter::ParentIdIn(_) => "parent_id_in",
            IssueFilter::VersionEffectiveDateGteq(_) => "fixed_version_effective_date_gteq",
            IssueFilter::VersionEffectiveDateLteq(_) => "fixed_version_effective_date_lteq",
            IssueFilter::StartDateGteq(_) => "start_date_gteq",
            IssueFilter::StartDateLteq(_) => "start_date_lteq",
            IssueFilter::DueDateGteq(_) => "due_date_gteq",
            IssueFilter::DueDateLteq(_) => "due_date_lteq",
        }
    }

    /// Row-level predicate for the plain field filters.
    ///
    /// `tracker_id` resolves an issue's tracker name to its id. The
    /// hierarchical and version-window variants are evaluated by the query
    /// plan and always pass here.
    pub fn matches(&self, issue: &Issue, tracker_id: impl Fn(&str) -> Option<u64>) -> bool {
        match self {
            IssueFilter::StatusIdIn(ids) => ids.contains(&issue.status_id),
            IssueFilter::StatusIdEq(id) => issue.status_id == *id,
            IssueFilter::TrackerIdIn(ids) => {
                tracker_id(&issue.tracker).is_some_and(|id| ids.contains(&id))
            }
            IssueFilter::TrackerIdEq(want) => tracker_id(&issue.tracker) == Some(*want),
            IssueFilter::FixedVersionIdIn(ids) => {
                issue.fixed_version_id.is_some_and(|id| ids.contains(&id))
            }
            IssueFilter::FixedVersionIdEq(id) => issue.fixed_version_id == Some(*id),
            IssueFilter::FixedVersionIdNull(null) => issue.fixed_version_id.is_none() == *null,
            IssueFilter::SubjectCont(needle) => contains_ignore_case(&issue.subject, needle),
            IssueFilter::DescriptionCont(needle) => {
                contains_ignore_case(&issue.description, needle)
            }
            IssueFilter::StartDateGteq(date) => issue.start_date.is_some_and(|d| d >= *date),
            IssueFilter::StartDateLteq(date) => issue.start_date.is_some_and(|d| d <= *date),
            IssueFilter::DueDateGteq(date) => issue.due_date.is_some_and(|d| d >= *date),
            IssueFilter::DueDateLteq(date) => issue.due_date.is_some_and(|d| d <= *date),
            IssueFilter::AssignedToIdIn(_)
            | IssueFilter::ParentIdIn(_)
            | IssueFilter::VersionEffectiveDateGteq(_)
            | IssueFilter::VersionEffectiveDateLteq(_) => true,
        }
    }

    /// Merge a repeated key: list filters accumulate, scalar filters are replaced.
    fn absorb(&mut self, next: IssueFilter) {
        match (self, next) {
            (IssueFilter::StatusIdIn(a), IssueFilter::StatusIdIn(b))
            | (IssueFilter::TrackerIdIn(a), IssueFilter::TrackerIdIn(b))
            | (IssueFilter::FixedVersionIdIn(a), IssueFilter::FixedVersionIdIn(b))
            | (IssueFilter::AssignedToIdIn(a), IssueFilter::AssignedToIdIn(b))
            | (IssueFilter::ParentIdIn(a), IssueFilter::ParentIdIn(b)) => {
                for id in b {
                    if !a.contains(&id) {
                        a.push(id);
                    }
                }
            }
            (slot, next) => *slot = next,
        }
    }
}

fn contains_ignore_case(haystack: &str, needle: &str) -> bool {
    haystack.to_lowercase().contains(&needle.to_lowercase())
}

fn parse_id(key: &str, value: &str) -> Result<u64, FilterParseError> {
    value.parse().map_err(|_| invalid(key, value, "expected a numeric id"))
}

fn parse_date(key: &str, value: &str) -> Result<NaiveDate, FilterParseError> {
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .map_err(|_| invalid(key, value, "expected YYYY-MM-DD"))
}

fn parse_bool(key: &str, value: &str) -> Result<bool, FilterParseError> {
    match value {
        "true" | "1" | "t" => Ok(true),
        "false" | "0" | "f" => Ok(false),
        _ => Err(invalid(key, value, "expected true or false")),
    }
}

fn invalid(key: &str, value: &str, expected: &'static str) -> FilterParseError {
    FilterParseError::InvalidValue {
        key: key.to_string(),
        value: value.to_string(),
        expected,
    }
}

fn param_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^filters\[([a-z_]+)\](?:\[\])?$").expect("filter param regex must compile")
    })
}

/// Extract the filter key from a query parameter name such as
/// `filters[status_id_in][]`.
pub fn filter_param_key(name: &str) -> Option<&str> {
    param_re()
        .captures(name)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str())
}

/// Effective-date window applied to versions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct VersionWindow {
    pub gteq: Option<NaiveDate>,
    pub lteq: Option<NaiveDate>,
}

impl VersionWindow {
    pub fn is_empty(&self) -> bool {
        self.gteq.is_none() && self.lteq.is_none()
    }

    /// Undated versions never fall inside a non-empty window.
    pub fn admits(&self, version: &Version) -> bool {
        if self.is_empty() {
            return true;
        }
        let Some(date) = version.effective_date else {
            return false;
        };
        self.gteq.is_none_or(|from| date >= from) && self.lteq.is_none_or(|to| date <= to)
    }
}

/// Ordered, de-duplicated set of filters.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct FilterSet {
    filters: Vec<IssueFilter>,
}

impl FilterSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse `key=value` pairs. Blank values are ignored.
    pub fn from_pairs<K, V>(pairs: impl IntoIterator<Item = (K, V)>) -> Result<Self, FilterParseError>
    where
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let mut set = Self::new();
        for (key, value) in pairs {
            let key = key.as_ref();
            if !FILTER_KEYS.contains(&key) {
                return Err(FilterParseError::UnknownKey(key.to_string()));
            }
            if value.as_ref().trim().is_empty() {
                continue;
            }
            set.push(IssueFilter::parse(key, value.as_ref())?);
        }
        Ok(set)
    }

    pub fn push(&mut self, filter: IssueFilter) {
        match self.filters.iter_mut().find(|f| f.key() == filter.key()) {
            Some(existing) => existing.absorb(filter),
            None => self.filters.push(filter),
        }
    }

    pub fn with(mut self, filter: IssueFilter) -> Self {
        self.push(filter);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.filters.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &IssueFilter> {
        self.filters.iter()
    }

    /// Separate the special-cased keys from the plain field predicates.
    pub fn plan(&self) -> FilterPlan {
        let mut plan = FilterPlan::default();
        for filter in &self.filters {
            match filter {
                IssueFilter::AssignedToIdIn(ids) => plan.assignee_ids = ids.iter().copied().collect(),
                IssueFilter::ParentIdIn(ids) => plan.parent_ids = ids.iter().copied().collect(),
                IssueFilter::VersionEffectiveDateGteq(date) => plan.version_window.gteq = Some(*date),
                IssueFilter::VersionEffectiveDateLteq(date) => plan.version_window.lteq = Some(*date),
                other => plan.predicates.push(other.clone()),
            }
        }
        plan
    }
}

/// A filter set split the way the grid queries consume it.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct FilterPlan {
    pub predicates: Vec<IssueFilter>,
    pub parent_ids: BTreeSet<IssueId>,
    pub assignee_ids: BTreeSet<UserId>,
    pub version_window: VersionWindow,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(s: &str) -> NaiveDate {
        s.parse().expect("fixture date")
    }

    #[test]
    fn list_keys_accumulate_and_scalars_replace() {
        let set = FilterSet::from_pairs([
            ("status_id_in", "1"),
            ("status_id_in", "2"),
            ("status_id_in", "1"),
            ("subject_cont", "old"),
            ("subject_cont", "new"),
        ])
        .expect("filters should parse");
        let filters: Vec<&IssueFilter> = set.iter().collect();
        assert_eq!(
            filters,
            vec![
                &IssueFilter::StatusIdIn(vec![1, 2]),
                &IssueFilter::SubjectCont("new".to_string())
            ]
        );
    }

    #[test]
    fn unknown_key_and_bad_value_are_rejected() {
        assert_eq!(
            FilterSet::from_pairs([("author_id_in", "1")]),
            Err(FilterParseError::UnknownKey("author_id_in".to_string()))
        );
        let err = FilterSet::from_pairs([("due_date_gteq", "next week")]).expect_err("bad date");
        assert!(matches!(err, FilterParseError::InvalidValue { ref key, .. } if key == "due_date_gteq"));
    }

    #[test]
    fn blank_values_are_skipped() {
        let set = FilterSet::from_pairs([("assigned_to_id_in", ""), ("parent_id_in", " ")])
            .expect("blank values parse");
        assert!(set.is_empty());
    }

    #[test]
    fn plan_splits_special_keys() {
        let set = FilterSet::new()
            .with(IssueFilter::AssignedToIdIn(vec![4]))
            .with(IssueFilter::ParentIdIn(vec![9]))
            .with(IssueFilter::VersionEffectiveDateGteq(date("2025-01-01")))
            .with(IssueFilter::StatusIdEq(2));
        let plan = set.plan();
        assert_eq!(plan.assignee_ids, BTreeSet::from([4]));
        assert_eq!(plan.parent_ids, BTreeSet::from([9]));
        assert_eq!(plan.version_window.gteq, Some(date("2025-01-01")));
        assert_eq!(plan.predicates, vec![IssueFilter::StatusIdEq(2)]);
    }

    #[test]
    fn version_window_excludes_undated_versions() {
        let window = VersionWindow {
            gteq: Some(date("2025-01-01")),
            lteq: Some(date("2025-03-31")),
        };
        assert!(window.admits(&Version::new(1, "in").with_effective_date(date("2025-02-01"))));
        assert!(!window.admits(&Version::new(2, "late").with_effective_date(date("2025-04-01"))));
        assert!(!window.admits(&Version::new(3, "undated")));
        assert!(VersionWindow::default().admits(&Version::new(3, "undated")));
    }

    #[test]
    fn query_param_names() {
        assert_eq!(filter_param_key("filters[status_id_in][]"), Some("status_id_in"));
        assert_eq!(filter_param_key("filters[subject_cont]"), Some("subject_cont"));
        assert_eq!(filter_param_key("include_closed"), None);
    }
}
