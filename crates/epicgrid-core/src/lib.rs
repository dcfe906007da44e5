//! # epicgrid-core
//!
//! Issue-store layer for the Epic/Feature/UserStory grid.
//!
//! This crate provides:
//! - `Issue`, `Version` and project records, loaded from a project directory
//! - `IssueStore`: the issue table with nested-set (`lft`/`rgt`/`root_id`) spans
//! - tracker roles, the fixed hierarchy adjacency and a hierarchy check
//! - typed filters (`IssueFilter`, `FilterSet`) and scoped queries (`IssueQuery`)
//! - natural and field ordering (`NaturalKey`, `SortOptions`)
//! - `epicgrid.toml` configuration
//!
//! ## Data model
//!
//! ```text
//! project.json + issues.jsonl (on disk)
//!     ↓  load, number trees
//! ProjectData { IssueStore, versions, users, ... }
//!     ↓  FilterSet → IssueQuery
//! tracker-level issue lists for the grid builder
//! ```

pub mod config;
pub mod filter;
pub mod hierarchy;
pub mod issue;
pub mod jsonl;
pub mod project;
pub mod query;
pub mod sort;
pub mod store;
pub mod tracker;
pub mod version;

pub use config::{
    ConfigError, DEFAULT_BIND, DEFAULT_CONFIG_FILE, EpicgridConfig, GridSettings, ServerSettings,
};
pub use filter::{
    FILTER_KEYS, FilterParseError, FilterPlan, FilterSet, IssueFilter, VersionWindow,
    filter_param_key,
};
pub use hierarchy::{
    FAILURE_CLASS_INVALID_PARENT, FAILURE_CLASS_ORPHAN, HIERARCHY_CHECK_KIND, HierarchyCheckReport,
    HierarchyFinding, HierarchySummary, WARNING_CLASS_FEATURE_WITHOUT_STORIES,
    WARNING_CLASS_STORY_WITHOUT_TASKS, WARNING_CLASS_STORY_WITHOUT_TESTS, check_hierarchy,
};
pub use issue::{Issue, IssueId, UserId, VersionId};
pub use jsonl::{JsonlError, read_issues, read_issues_from_path, write_issues, write_issues_to_path};
pub use project::{
    ISSUES_FILE, Member, PROJECT_FILE, Project, ProjectData, ProjectError, ProjectFile, StatusDef,
    TrackerDef, User,
};
pub use query::{AssigneeMatch, IssueQuery, VersionScope};
pub use sort::{
    NaturalKey, SortBy, SortDirection, SortOption, SortOptions, SortParseError, natural_sort,
    sort_issues, sort_versions,
};
pub use store::{IssueStore, StoreError, TreeSpan};
pub use tracker::{TrackerNames, TrackerRole};
pub use version::{NO_VERSION, Version, VersionStatus};
