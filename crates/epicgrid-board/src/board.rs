//! Board forest: cells of feature cards, each holding story cards with their
//! task, test and bug lists.

use epicgrid_index::{GridPayload, NO_VERSION, UserStoryEntity};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Anything that sits in a board container.
pub trait BoardItem {
    fn item_id(&self) -> &str;
}

impl BoardItem for String {
    fn item_id(&self) -> &str {
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoryCard {
    pub id: String,
    /// Version column the story is drawn in; `"none"` when unassigned.
    pub version_id: String,
    #[serde(default)]
    pub tasks: Vec<String>,
    #[serde(default)]
    pub tests: Vec<String>,
    #[serde(default)]
    pub bugs: Vec<String>,
}

impl StoryCard {
    pub fn new(id: impl Into<String>, version_id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            version_id: version_id.into(),
            tasks: Vec::new(),
            tests: Vec::new(),
            bugs: Vec::new(),
        }
    }
}

impl BoardItem for StoryCard {
    fn item_id(&self) -> &str {
        &self.id
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeatureCard {
    pub id: String,
    #[serde(default)]
    pub stories: Vec<StoryCard>,
}

impl FeatureCard {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            stories: Vec::new(),
        }
    }
}

impl BoardItem for FeatureCard {
    fn item_id(&self) -> &str {
        &self.id
    }
}

/// One Epic × Version intersection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeatureCell {
    pub epic_id: String,
    pub version_id: String,
    #[serde(default)]
    pub features: Vec<FeatureCard>,
}

impl FeatureCell {
    pub fn new(epic_id: impl Into<String>, version_id: impl Into<String>) -> Self {
        Self {
            epic_id: epic_id.into(),
            version_id: version_id.into(),
            features: Vec::new(),
        }
    }

    pub fn is_at(&self, epic_id: &str, version_id: &str) -> bool {
        self.epic_id == epic_id && self.version_id == version_id
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Board {
    pub epic_order: Vec<String>,
    pub version_order: Vec<String>,
    pub cells: Vec<FeatureCell>,
}

impl Board {
    /// Lay out the forest from a grid payload.
    ///
    /// Every epic × `version_order` cell exists, empty or not. A feature sits in
    /// the cell of its own fixed version; versions outside `version_order` get
    /// an extra cell at the end. Stories follow grid cell order, and child
    /// lists keep only entities present in the payload.
    pub fn from_payload(payload: &GridPayload) -> Self {
        let grid = &payload.grid;
        let entities = &payload.entities;

        let mut board = Board {
            epic_order: grid.epic_order.clone(),
            version_order: grid.version_order.clone(),
            cells: Vec::new(),
        };
        for epic_id in &grid.epic_order {
            for version_id in &grid.version_order {
                board.cells.push(FeatureCell::new(epic_id.clone(), version_id.clone()));
            }
        }

        for epic_id in &grid.epic_order {
            let Some(feature_ids) = grid.feature_order_by_epic.get(epic_id) else {
                continue;
            };
            for feature_id in feature_ids {
                let Some(feature) = entities.features.get(feature_id) else {
                    continue;
                };
                let version_id = feature
                    .fields
                    .fixed_version_id
                    .clone()
                    .unwrap_or_else(|| NO_VERSION.to_string());

                let mut card = FeatureCard::new(feature_id.clone());
                for (story_id, story_version) in story_slots(payload, epic_id, feature_id) {
                    let mut story = StoryCard::new(story_id.clone(), story_version);
                    if let Some(entity) = entities.user_stories.get(&story_id) {
                        fill_children(&mut story, entity, payload);
                    }
                    card.stories.push(story);
                }

                board.cell_or_insert(epic_id, &version_id).features.push(card);
            }
        }

        tracing::debug!(
            epics = board.epic_order.len(),
            cells = board.cells.len(),
            "board laid out from grid payload"
        );
        board
    }

    pub fn cell(&self, epic_id: &str, version_id: &str) -> Option<&FeatureCell> {
        self.cells.iter().find(|cell| cell.is_at(epic_id, version_id))
    }

    fn cell_or_insert(&mut self, epic_id: &str, version_id: &str) -> &mut FeatureCell {
        let position = match self.cells.iter().position(|cell| cell.is_at(epic_id, version_id)) {
            Some(position) => position,
            None => {
                self.cells.push(FeatureCell::new(epic_id, version_id));
                self.cells.len() - 1
            }
        };
        &mut self.cells[position]
    }

    pub fn features(&self) -> impl Iterator<Item = &FeatureCard> {
        self.cells.iter().flat_map(|cell| cell.features.iter())
    }

    pub fn feature(&self, feature_id: &str) -> Option<&FeatureCard> {
        self.features().find(|feature| feature.id == feature_id)
    }

    pub fn stories(&self) -> impl Iterator<Item = &StoryCard> {
        self.features().flat_map(|feature| feature.stories.iter())
    }

    pub fn story(&self, story_id: &str) -> Option<&StoryCard> {
        self.stories().find(|story| story.id == story_id)
    }

    /// Feature ids per cell, keyed `"<epic>:<version>"`.
    pub fn feature_cells(&self) -> BTreeMap<String, Vec<String>> {
        self.cells
            .iter()
            .map(|cell| {
                (
                    format!("{}:{}", cell.epic_id, cell.version_id),
                    cell.features.iter().map(|f| f.id.clone()).collect(),
                )
            })
            .collect()
    }

    /// Story ids per grid cell, keyed `"<epic>:<feature>:<version>"` as in the
    /// wire index. Cells without stories are omitted.
    pub fn grid_index(&self) -> BTreeMap<String, Vec<String>> {
        let mut index: BTreeMap<String, Vec<String>> = BTreeMap::new();
        for cell in &self.cells {
            for feature in &cell.features {
                for story in &feature.stories {
                    index
                        .entry(format!("{}:{}:{}", cell.epic_id, feature.id, story.version_id))
                        .or_default()
                        .push(story.id.clone());
                }
            }
        }
        index
    }
}

/// Stories of one feature with their version column: `version_order` cells
/// first, then any other indexed versions in key order.
fn story_slots(payload: &GridPayload, epic_id: &str, feature_id: &str) -> Vec<(String, String)> {
    let index = &payload.grid.index;
    let prefix = format!("{epic_id}:{feature_id}:");
    let mut seen_versions = BTreeSet::new();
    let mut slots = Vec::new();

    let ordered = payload.grid.version_order.iter().map(String::as_str);
    let extra = index
        .keys()
        .filter_map(|key| key.strip_prefix(prefix.as_str()));
    for version_id in ordered.chain(extra) {
        if !seen_versions.insert(version_id.to_string()) {
            continue;
        }
        if let Some(story_ids) = index.get(&format!("{prefix}{version_id}")) {
            slots.extend(
                story_ids
                    .iter()
                    .map(|story_id| (story_id.clone(), version_id.to_string())),
            );
        }
    }
    slots
}

fn fill_children(story: &mut StoryCard, entity: &UserStoryEntity, payload: &GridPayload) {
    let entities = &payload.entities;
    story.tasks = visible(&entity.task_ids, |id| entities.tasks.contains_key(id));
    story.tests = visible(&entity.test_ids, |id| entities.tests.contains_key(id));
    story.bugs = visible(&entity.bug_ids, |id| entities.bugs.contains_key(id));
}

fn visible(ids: &[String], present: impl Fn(&String) -> bool) -> Vec<String> {
    ids.iter().filter(|id| present(id)).cloned().collect()
}
