//! Grid projection over a loaded project.
//!
//! `build_index` turns the filtered Epic → Feature → UserStory hierarchy into
//! cell buckets keyed `"<epic>:<feature>:<version>"`; `present_grid` wraps the
//! index with normalized entity maps and request metadata for the wire.
//! `Statistics` computes the per-entity summaries and the detailed reports.

mod builder;
mod presenter;
mod statistics;

pub use epicgrid_core::NO_VERSION;

pub use builder::{CellKey, CellKeyError, GridIndex, GridRequest, VersionSlot, build_index};
pub use presenter::{
    API_VERSION, Entities, EpicEntity, FeatureEntity, GridPayload, IssueFields, LeafEntity,
    Metadata, ProjectMeta, ResponseStamp, UserEntity, UserStoryEntity, VersionEntity,
    build_entities, build_metadata, new_request_id, present_grid,
};
pub use statistics::{
    BlockingIssue, ChildCounts, EpicStatistics, EpicSummary, FeatureStatistics, FeatureSummary,
    ProjectStatistics, RiskFlag, ScheduleVariance, Severity, Statistics, UserStoryStatistics,
    UserStorySummary, VersionStatistics, VersionSummary,
};
