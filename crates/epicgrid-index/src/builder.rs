//! Grid index construction: Epic × Feature × Version → user story ids.

use epicgrid_core::{
    AssigneeMatch, FilterSet, Issue, IssueId, IssueQuery, NO_VERSION, ProjectData, SortOptions,
    TrackerNames, VersionId, VersionScope, sort_issues,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt::{Display, Formatter};
use std::str::FromStr;

/// Version component of a cell key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum VersionSlot {
    Assigned(VersionId),
    Unassigned,
}

impl From<Option<VersionId>> for VersionSlot {
    fn from(value: Option<VersionId>) -> Self {
        value.map_or(VersionSlot::Unassigned, VersionSlot::Assigned)
    }
}

impl Display for VersionSlot {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            VersionSlot::Assigned(id) => write!(f, "{id}"),
            VersionSlot::Unassigned => f.write_str(NO_VERSION),
        }
    }
}

/// `"{epic}:{feature}:{version}"`, with `none` for unassigned stories.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct CellKey {
    pub epic_id: IssueId,
    pub feature_id: IssueId,
    pub version: VersionSlot,
}

impl CellKey {
    pub fn new(epic_id: IssueId, feature_id: IssueId, version: impl Into<VersionSlot>) -> Self {
        Self {
            epic_id,
            feature_id,
            version: version.into(),
        }
    }
}

impl Display for CellKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}:{}", self.epic_id, self.feature_id, self.version)
    }
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum CellKeyError {
    #[error("cell key `{0}` must have exactly 3 `:`-separated parts")]
    Arity(String),

    #[error("cell key `{key}`: `{part}` is not a numeric id")]
    Id { key: String, part: String },
}

impl FromStr for CellKey {
    type Err = CellKeyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = s.split(':').collect();
        let [epic, feature, version] = parts.as_slice() else {
            return Err(CellKeyError::Arity(s.to_string()));
        };
        let id = |part: &str| {
            part.parse::<u64>().map_err(|_| CellKeyError::Id {
                key: s.to_string(),
                part: part.to_string(),
            })
        };
        let version = if *version == NO_VERSION {
            VersionSlot::Unassigned
        } else {
            VersionSlot::Assigned(id(*version)?)
        };
        Ok(CellKey {
            epic_id: id(*epic)?,
            feature_id: id(*feature)?,
            version,
        })
    }
}

/// Ordering arrays plus the sparse cell map, all ids stringified.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GridIndex {
    pub index: BTreeMap<String, Vec<String>>,
    pub epic_order: Vec<String>,
    pub feature_order_by_epic: BTreeMap<String, Vec<String>>,
    pub version_order: Vec<String>,
}

impl GridIndex {
    /// User story ids in one cell; empty when the cell is absent.
    pub fn cell(&self, key: &CellKey) -> &[String] {
        self.index
            .get(&key.to_string())
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }
}

/// Inputs to one index build.
#[derive(Debug, Clone)]
pub struct GridRequest {
    pub trackers: TrackerNames,
    pub exclude_closed_versions: bool,
    pub filters: FilterSet,
    pub sort: SortOptions,
}

impl Default for GridRequest {
    fn default() -> Self {
        Self {
            trackers: TrackerNames::default(),
            exclude_closed_versions: true,
            filters: FilterSet::default(),
            sort: SortOptions::default(),
        }
    }
}

/// Project the filtered hierarchy into a grid index.
///
/// Epics and features ignore the version window; user stories honour it.
/// Stories are keyed by their own fixed version and listed by creation time.
pub fn build_index(project: &ProjectData, request: &GridRequest) -> GridIndex {
    let names = &request.trackers;
    let query = IssueQuery::new(
        project,
        &request.filters,
        true,
        request.exclude_closed_versions,
    );

    let epics = query.tracker_issues(
        &names.epic,
        VersionScope::Unrestricted,
        AssigneeMatch::Hierarchical,
    );
    let features = group_by_parent(query.tracker_issues(
        &names.feature,
        VersionScope::Unrestricted,
        AssigneeMatch::Hierarchical,
    ));
    let stories = group_by_parent(query.tracker_issues(
        &names.user_story,
        VersionScope::Windowed,
        AssigneeMatch::Hierarchical,
    ));

    let mut version_order: Vec<String> = query
        .sorted_versions(request.sort.version)
        .into_iter()
        .map(|version| version.id.to_string())
        .collect();
    version_order.push(NO_VERSION.to_string());

    let mut grid = GridIndex {
        version_order,
        ..GridIndex::default()
    };

    for epic in sort_issues(epics, request.sort.epic) {
        grid.epic_order.push(epic.id.to_string());
        let epic_features = sort_issues(
            features.get(&epic.id).cloned().unwrap_or_default(),
            request.sort.epic,
        );
        grid.feature_order_by_epic.insert(
            epic.id.to_string(),
            epic_features.iter().map(|f| f.id.to_string()).collect(),
        );

        for feature in epic_features {
            let Some(feature_stories) = stories.get(&feature.id) else {
                continue;
            };
            let mut cells: BTreeMap<VersionSlot, Vec<&Issue>> = BTreeMap::new();
            for &story in feature_stories {
                cells
                    .entry(story.fixed_version_id.into())
                    .or_default()
                    .push(story);
            }
            for (slot, mut members) in cells {
                members.sort_by_key(|story| story.created_on);
                let key = CellKey::new(epic.id, feature.id, slot);
                grid.index.insert(
                    key.to_string(),
                    members.iter().map(|s| s.id.to_string()).collect(),
                );
            }
        }
    }

    tracing::debug!(
        epics = grid.epic_order.len(),
        cells = grid.index.len(),
        versions = grid.version_order.len(),
        "grid index built"
    );
    grid
}

fn group_by_parent(issues: Vec<&Issue>) -> BTreeMap<IssueId, Vec<&Issue>> {
    let mut grouped: BTreeMap<IssueId, Vec<&Issue>> = BTreeMap::new();
    for issue in issues {
        if let Some(parent_id) = issue.parent_id {
            grouped.entry(parent_id).or_default().push(issue);
        }
    }
    grouped
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cell_key_round_trips_through_text() {
        let key = CellKey::new(1, 2, VersionSlot::Assigned(30));
        assert_eq!(key.to_string(), "1:2:30");
        assert_eq!("1:2:30".parse::<CellKey>(), Ok(key));
        assert_eq!(
            "4:5:none".parse::<CellKey>(),
            Ok(CellKey::new(4, 5, VersionSlot::Unassigned))
        );
    }

    #[test]
    fn cell_key_requires_three_numeric_parts() {
        assert_eq!(
            "1:2".parse::<CellKey>(),
            Err(CellKeyError::Arity("1:2".to_string()))
        );
        assert!(matches!("1:2:3:4".parse::<CellKey>(), Err(CellKeyError::Arity(_))));
        assert!(matches!("x:2:none".parse::<CellKey>(), Err(CellKeyError::Id { .. })));
    }
}
