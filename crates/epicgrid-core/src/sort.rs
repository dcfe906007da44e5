//! Natural and field ordering for issues and versions.
//!
//! Every mode sorts ascending with a stable sort over id-ordered input and
//! then reverses the whole list for `desc`. Ties therefore come out in
//! reverse id order when descending, and records without a date lead the
//! ascending order and trail the descending one.

use crate::issue::Issue;
use crate::version::Version;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt::{Display, Formatter};
use std::str::FromStr;
use std::sync::OnceLock;

fn run_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"[0-9]+|[^0-9]+").expect("natural-sort run regex must compile"))
}

/// One run of a natural-sort key.
///
/// Digit runs order before text runs at the same position.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Run {
    /// Digits with leading zeros stripped, so "007" and "7" compare equal.
    Number(String),
    Text(String),
}

impl Ord for Run {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (Run::Number(a), Run::Number(b)) => a.len().cmp(&b.len()).then_with(|| a.cmp(b)),
            (Run::Text(a), Run::Text(b)) => a.cmp(b),
            (Run::Number(_), Run::Text(_)) => Ordering::Less,
            (Run::Text(_), Run::Number(_)) => Ordering::Greater,
        }
    }
}

impl PartialOrd for Run {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Numeric-aware sort key: `"Feature 10"` orders after `"Feature 2"`.
///
/// Digit runs compare by value without parsing, so arbitrarily long numbers
/// cannot overflow.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct NaturalKey(Vec<Run>);

impl NaturalKey {
    pub fn new(text: &str) -> Self {
        let runs = run_re()
            .find_iter(text)
            .map(|m| {
                let run = m.as_str();
                if run.starts_with(|c: char| c.is_ascii_digit()) {
                    let trimmed = run.trim_start_matches('0');
                    Run::Number(trimmed.to_string())
                } else {
                    Run::Text(run.to_string())
                }
            })
            .collect();
        Self(runs)
    }
}

/// Natural-sort a list of strings ascending.
pub fn natural_sort<S: AsRef<str>>(mut items: Vec<S>) -> Vec<S> {
    items.sort_by_cached_key(|item| NaturalKey::new(item.as_ref()));
    items
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortBy {
    #[default]
    Subject,
    Id,
    Date,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    #[default]
    Asc,
    Desc,
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum SortParseError {
    #[error("unknown sort field `{0}` (expected subject, id or date)")]
    Field(String),
    #[error("unknown sort direction `{0}` (expected asc or desc)")]
    Direction(String),
}

impl FromStr for SortBy {
    type Err = SortParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "subject" | "name" => Ok(SortBy::Subject),
            "id" => Ok(SortBy::Id),
            "date" => Ok(SortBy::Date),
            other => Err(SortParseError::Field(other.to_string())),
        }
    }
}

impl FromStr for SortDirection {
    type Err = SortParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "asc" => Ok(SortDirection::Asc),
            "desc" => Ok(SortDirection::Desc),
            other => Err(SortParseError::Direction(other.to_string())),
        }
    }
}

impl Display for SortBy {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            SortBy::Subject => "subject",
            SortBy::Id => "id",
            SortBy::Date => "date",
        })
    }
}

impl Display for SortDirection {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            SortDirection::Asc => "asc",
            SortDirection::Desc => "desc",
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SortOption {
    pub sort_by: SortBy,
    pub sort_direction: SortDirection,
}

impl SortOption {
    pub fn new(sort_by: SortBy, sort_direction: SortDirection) -> Self {
        Self {
            sort_by,
            sort_direction,
        }
    }
}

/// Ordering for epics (and the features under them) and for versions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SortOptions {
    pub epic: SortOption,
    pub version: SortOption,
}

impl Default for SortOptions {
    fn default() -> Self {
        Self {
            epic: SortOption::new(SortBy::Subject, SortDirection::Asc),
            version: SortOption::new(SortBy::Date, SortDirection::Asc),
        }
    }
}

fn ordered<T, K: Ord>(
    mut items: Vec<T>,
    id: impl Fn(&T) -> u64,
    key: impl Fn(&T) -> K,
    direction: SortDirection,
) -> Vec<T> {
    items.sort_by_key(|item| id(item));
    items.sort_by_cached_key(|item| key(item));
    if direction == SortDirection::Desc {
        items.reverse();
    }
    items
}

/// Order issues. `date` uses `start_date`.
pub fn sort_issues<'a>(issues: Vec<&'a Issue>, option: SortOption) -> Vec<&'a Issue> {
    let id = |issue: &&Issue| issue.id;
    let direction = option.sort_direction;
    match option.sort_by {
        SortBy::Subject => ordered(issues, id, |i| NaturalKey::new(&i.subject), direction),
        SortBy::Id => ordered(issues, id, |i| i.id, direction),
        SortBy::Date => ordered(issues, id, |i| i.start_date, direction),
    }
}

/// Order versions. `date` uses `effective_date`, `subject` the version name.
pub fn sort_versions<'a>(versions: Vec<&'a Version>, option: SortOption) -> Vec<&'a Version> {
    let id = |version: &&Version| version.id;
    let direction = option.sort_direction;
    match option.sort_by {
        SortBy::Subject => ordered(versions, id, |v| NaturalKey::new(&v.name), direction),
        SortBy::Id => ordered(versions, id, |v| v.id, direction),
        SortBy::Date => ordered(versions, id, |v| v.effective_date, direction),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, TimeZone, Utc};

    fn issue(id: u64, subject: &str, start: Option<&str>) -> Issue {
        let created = Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap();
        let mut issue = Issue::new(id, "Epic", subject, created);
        issue.start_date = start.map(|d| d.parse::<NaiveDate>().unwrap());
        issue
    }

    fn ids(issues: &[&Issue]) -> Vec<u64> {
        issues.iter().map(|i| i.id).collect()
    }

    #[test]
    fn digit_runs_compare_as_numbers() {
        let sorted = natural_sort(vec!["Feature 10", "Feature 2", "Feature 100"]);
        assert_eq!(sorted, vec!["Feature 2", "Feature 10", "Feature 100"]);
        assert_eq!(
            natural_sort(vec!["100_x", "10_x", "2_x"]),
            vec!["2_x", "10_x", "100_x"]
        );
    }

    #[test]
    fn digit_run_precedes_text_run() {
        assert!(NaturalKey::new("1abc") < NaturalKey::new("abc"));
        assert!(NaturalKey::new("x9") < NaturalKey::new("xa"));
        assert!(NaturalKey::new("") < NaturalKey::new("a"));
        assert!(NaturalKey::new("a") < NaturalKey::new("a1"));
    }

    #[test]
    fn leading_zeros_and_huge_numbers() {
        assert_eq!(NaturalKey::new("v007"), NaturalKey::new("v7"));
        let big = "release 99999999999999999999999999999";
        assert!(NaturalKey::new("release 2") < NaturalKey::new(big));
    }

    #[test]
    fn comparator_is_transitive_on_mixed_inputs() {
        let inputs = ["a2", "a10", "a", "2a", "10", "b", "a2b", "a2a", ""];
        let keys: Vec<NaturalKey> = inputs.iter().map(|s| NaturalKey::new(s)).collect();
        for a in &keys {
            for b in &keys {
                assert_eq!(a.cmp(b), b.cmp(a).reverse());
                for c in &keys {
                    if a <= b && b <= c {
                        assert!(a <= c);
                    }
                }
            }
        }
    }

    #[test]
    fn null_dates_lead_ascending_and_trail_descending() {
        let records = [
            issue(1, "a", None),
            issue(2, "b", Some("2025-01-01")),
            issue(3, "c", None),
            issue(4, "d", Some("2024-06-01")),
        ];
        let refs: Vec<&Issue> = records.iter().collect();

        let asc = sort_issues(refs.clone(), SortOption::new(SortBy::Date, SortDirection::Asc));
        assert_eq!(ids(&asc), vec![1, 3, 4, 2]);

        let desc = sort_issues(refs, SortOption::new(SortBy::Date, SortDirection::Desc));
        assert_eq!(ids(&desc), vec![2, 4, 3, 1]);
    }

    #[test]
    fn descending_subject_reverses_ties() {
        let records = [issue(5, "Same", None), issue(3, "Same", None), issue(9, "Alpha", None)];
        let refs: Vec<&Issue> = records.iter().collect();
        let desc = sort_issues(refs, SortOption::new(SortBy::Subject, SortDirection::Desc));
        assert_eq!(ids(&desc), vec![5, 3, 9]);
    }

    #[test]
    fn versions_sort_by_effective_date_then_id() {
        let v1 = Version::new(1, "Sprint 10").with_effective_date(NaiveDate::from_ymd_opt(2025, 5, 1).unwrap());
        let v2 = Version::new(2, "Sprint 2");
        let v3 = Version::new(3, "Sprint 3").with_effective_date(NaiveDate::from_ymd_opt(2025, 2, 1).unwrap());
        let by_date = sort_versions(vec![&v1, &v2, &v3], SortOptions::default().version);
        let names: Vec<&str> = by_date.iter().map(|v| v.name.as_str()).collect();
        assert_eq!(names, vec!["Sprint 2", "Sprint 3", "Sprint 10"]);

        let by_name = sort_versions(vec![&v1, &v2, &v3], SortOption::new(SortBy::Subject, SortDirection::Asc));
        let ids: Vec<u64> = by_name.iter().map(|v| v.id).collect();
        assert_eq!(ids, vec![2, 3, 1]);
    }

    #[test]
    fn parses_sort_flags() {
        assert_eq!("date".parse::<SortBy>(), Ok(SortBy::Date));
        assert_eq!("desc".parse::<SortDirection>(), Ok(SortDirection::Desc));
        assert_eq!(
            "size".parse::<SortBy>(),
            Err(SortParseError::Field("size".to_string()))
        );
    }
}
