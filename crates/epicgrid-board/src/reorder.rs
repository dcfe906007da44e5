//! Reorder and move reducer.
//!
//! Every action is total: a missing source, target or container leaves the
//! board untouched and is reported as [`MoveOutcome::Ignored`]. Nothing is
//! removed until the destination has been resolved.

use crate::board::{Board, BoardItem};
use epicgrid_index::NO_VERSION;
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};

/// Which family of cards an action moves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemKind {
    Epic,
    Version,
    Feature,
    UserStory,
    Task,
    Test,
    Bug,
}

impl ItemKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ItemKind::Epic => "epic",
            ItemKind::Version => "version",
            ItemKind::Feature => "feature",
            ItemKind::UserStory => "user_story",
            ItemKind::Task => "task",
            ItemKind::Test => "test",
            ItemKind::Bug => "bug",
        }
    }
}

impl Display for ItemKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Explicit addressing carried by an add-button drop.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TargetData {
    #[serde(default)]
    pub is_add_button: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub epic_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub feature_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_story_id: Option<String>,
}

/// Arguments of one `reorder*` call.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReorderArgs {
    pub source_id: String,
    #[serde(default)]
    pub target_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_data: Option<TargetData>,
}

impl ReorderArgs {
    pub fn onto(source_id: impl Into<String>, target_id: impl Into<String>) -> Self {
        Self {
            source_id: source_id.into(),
            target_id: target_id.into(),
            target_data: None,
        }
    }

    pub fn add_button(source_id: impl Into<String>, target_data: TargetData) -> Self {
        Self {
            source_id: source_id.into(),
            target_id: String::new(),
            target_data: Some(TargetData {
                is_add_button: true,
                ..target_data
            }),
        }
    }

    /// Resolve where the source should land for a card of `kind`.
    ///
    /// `None` when an add-button drop lacks the address its kind needs.
    pub fn drop_target(&self, kind: ItemKind) -> Option<DropTarget> {
        match &self.target_data {
            Some(data) if data.is_add_button => {
                ContainerRef::for_kind(kind, data).map(DropTarget::AddButton)
            }
            _ => Some(DropTarget::Item(self.target_id.clone())),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CellMove {
    pub story_id: String,
    pub epic_id: String,
    pub feature_id: String,
    pub version_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "camelCase")]
pub enum BoardAction {
    ReorderEpics(ReorderArgs),
    ReorderVersions(ReorderArgs),
    ReorderFeatures(ReorderArgs),
    ReorderUserStories(ReorderArgs),
    ReorderTasks(ReorderArgs),
    ReorderTests(ReorderArgs),
    ReorderBugs(ReorderArgs),
    MoveUserStoryToCell(CellMove),
}

impl BoardAction {
    pub fn name(&self) -> &'static str {
        match self {
            BoardAction::ReorderEpics(_) => "reorderEpics",
            BoardAction::ReorderVersions(_) => "reorderVersions",
            BoardAction::ReorderFeatures(_) => "reorderFeatures",
            BoardAction::ReorderUserStories(_) => "reorderUserStories",
            BoardAction::ReorderTasks(_) => "reorderTasks",
            BoardAction::ReorderTests(_) => "reorderTests",
            BoardAction::ReorderBugs(_) => "reorderBugs",
            BoardAction::MoveUserStoryToCell(_) => "moveUserStoryToCell",
        }
    }

    fn reorder(&self) -> Option<(ItemKind, &ReorderArgs)> {
        let pair = match self {
            BoardAction::ReorderEpics(args) => (ItemKind::Epic, args),
            BoardAction::ReorderVersions(args) => (ItemKind::Version, args),
            BoardAction::ReorderFeatures(args) => (ItemKind::Feature, args),
            BoardAction::ReorderUserStories(args) => (ItemKind::UserStory, args),
            BoardAction::ReorderTasks(args) => (ItemKind::Task, args),
            BoardAction::ReorderTests(args) => (ItemKind::Test, args),
            BoardAction::ReorderBugs(args) => (ItemKind::Bug, args),
            BoardAction::MoveUserStoryToCell(_) => return None,
        };
        Some(pair)
    }
}

/// A container addressed directly rather than through one of its items.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContainerRef {
    Cell { epic_id: String, version_id: String },
    Feature(String),
    UserStory(String),
}

impl ContainerRef {
    fn for_kind(kind: ItemKind, data: &TargetData) -> Option<Self> {
        match kind {
            ItemKind::Feature => Some(ContainerRef::Cell {
                epic_id: data.epic_id.clone()?,
                version_id: data
                    .version_id
                    .clone()
                    .filter(|version| !version.is_empty())
                    .unwrap_or_else(|| NO_VERSION.to_string()),
            }),
            ItemKind::UserStory => data.feature_id.clone().map(ContainerRef::Feature),
            ItemKind::Task | ItemKind::Test | ItemKind::Bug => {
                data.user_story_id.clone().map(ContainerRef::UserStory)
            }
            ItemKind::Epic | ItemKind::Version => None,
        }
    }

    fn owner_key(&self) -> String {
        match self {
            ContainerRef::Cell {
                epic_id,
                version_id,
            } => format!("{epic_id}:{version_id}"),
            ContainerRef::Feature(id) | ContainerRef::UserStory(id) => id.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DropTarget {
    /// Dropped onto another card of the same kind.
    Item(String),
    /// Dropped onto a container's add affordance.
    AddButton(ContainerRef),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IgnoreReason {
    SourceMissing,
    TargetMissing,
    ContainerMissing,
    SameItem,
}

/// What an action did. Informational only; every action succeeds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MoveOutcome {
    /// Moved within one container, before the target.
    Reordered,
    /// Moved into another container, after the target.
    Moved,
    /// Pushed to the end of an explicit container.
    Appended,
    Ignored(IgnoreReason),
}

impl MoveOutcome {
    pub fn changed(self) -> bool {
        !matches!(self, MoveOutcome::Ignored(_))
    }
}

impl Display for IgnoreReason {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            IgnoreReason::SourceMissing => "source_missing",
            IgnoreReason::TargetMissing => "target_missing",
            IgnoreReason::ContainerMissing => "container_missing",
            IgnoreReason::SameItem => "same_item",
        })
    }
}

impl Display for MoveOutcome {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            MoveOutcome::Reordered => f.write_str("reordered"),
            MoveOutcome::Moved => f.write_str("moved"),
            MoveOutcome::Appended => f.write_str("appended"),
            MoveOutcome::Ignored(reason) => write!(f, "ignored:{reason}"),
        }
    }
}

/// One container of a given kind, tagged with the key an add-button drop uses.
struct Slot<'a, T> {
    owner: String,
    items: &'a mut Vec<T>,
}

fn find<T: BoardItem>(slots: &[Slot<'_, T>], id: &str) -> Option<(usize, usize)> {
    slots.iter().enumerate().find_map(|(slot, container)| {
        container
            .items
            .iter()
            .position(|item| item.item_id() == id)
            .map(|index| (slot, index))
    })
}

fn relocate<T: BoardItem>(
    mut slots: Vec<Slot<'_, T>>,
    source_id: &str,
    target: &DropTarget,
) -> MoveOutcome {
    let Some((from_slot, from_index)) = find(&slots, source_id) else {
        return MoveOutcome::Ignored(IgnoreReason::SourceMissing);
    };

    match target {
        DropTarget::AddButton(container) => {
            let owner = container.owner_key();
            let Some(to_slot) = slots.iter().position(|slot| slot.owner == owner) else {
                return MoveOutcome::Ignored(IgnoreReason::ContainerMissing);
            };
            let item = slots[from_slot].items.remove(from_index);
            slots[to_slot].items.push(item);
            MoveOutcome::Appended
        }
        DropTarget::Item(target_id) => {
            if target_id == source_id {
                return MoveOutcome::Ignored(IgnoreReason::SameItem);
            }
            let Some((to_slot, _)) = find(&slots, target_id) else {
                return MoveOutcome::Ignored(IgnoreReason::TargetMissing);
            };
            let item = slots[from_slot].items.remove(from_index);
            let destination = &mut slots[to_slot].items;
            // Look the target up again: the removal may have shifted it.
            let target_index = destination
                .iter()
                .position(|candidate| candidate.item_id() == target_id)
                .unwrap_or(destination.len());
            if from_slot == to_slot {
                destination.insert(target_index, item);
                MoveOutcome::Reordered
            } else {
                destination.insert(target_index + 1, item);
                MoveOutcome::Moved
            }
        }
    }
}

impl Board {
    fn order_slot(&mut self, kind: ItemKind) -> Vec<Slot<'_, String>> {
        let items = match kind {
            ItemKind::Version => &mut self.version_order,
            _ => &mut self.epic_order,
        };
        vec![Slot {
            owner: kind.as_str().to_string(),
            items,
        }]
    }

    fn feature_slots(&mut self) -> Vec<Slot<'_, crate::board::FeatureCard>> {
        self.cells
            .iter_mut()
            .map(|cell| Slot {
                owner: format!("{}:{}", cell.epic_id, cell.version_id),
                items: &mut cell.features,
            })
            .collect()
    }

    fn story_slots(&mut self) -> Vec<Slot<'_, crate::board::StoryCard>> {
        self.cells
            .iter_mut()
            .flat_map(|cell| cell.features.iter_mut())
            .map(|feature| Slot {
                owner: feature.id.clone(),
                items: &mut feature.stories,
            })
            .collect()
    }

    fn leaf_slots(&mut self, kind: ItemKind) -> Vec<Slot<'_, String>> {
        self.cells
            .iter_mut()
            .flat_map(|cell| cell.features.iter_mut())
            .flat_map(|feature| feature.stories.iter_mut())
            .map(|story| Slot {
                owner: story.id.clone(),
                items: match kind {
                    ItemKind::Test => &mut story.tests,
                    ItemKind::Bug => &mut story.bugs,
                    _ => &mut story.tasks,
                },
            })
            .collect()
    }

    fn reorder(&mut self, kind: ItemKind, args: &ReorderArgs) -> MoveOutcome {
        let Some(target) = args.drop_target(kind) else {
            return MoveOutcome::Ignored(IgnoreReason::ContainerMissing);
        };
        let source = args.source_id.as_str();
        match kind {
            ItemKind::Epic | ItemKind::Version => {
                relocate(self.order_slot(kind), source, &target)
            }
            ItemKind::Feature => relocate(self.feature_slots(), source, &target),
            ItemKind::UserStory => relocate(self.story_slots(), source, &target),
            ItemKind::Task | ItemKind::Test | ItemKind::Bug => {
                relocate(self.leaf_slots(kind), source, &target)
            }
        }
    }

    /// Take a story out of its feature and append it to the end of the
    /// `(epic, feature, version)` cell.
    fn move_story_to_cell(&mut self, request: &CellMove) -> MoveOutcome {
        let feature_in_epic = self.cells.iter().any(|cell| {
            cell.epic_id == request.epic_id
                && cell.features.iter().any(|f| f.id == request.feature_id)
        });
        if !feature_in_epic {
            return MoveOutcome::Ignored(IgnoreReason::ContainerMissing);
        }

        let mut slots = self.story_slots();
        let Some((from_slot, from_index)) = find(&slots, &request.story_id) else {
            return MoveOutcome::Ignored(IgnoreReason::SourceMissing);
        };
        let Some(to_slot) = slots.iter().position(|slot| slot.owner == request.feature_id) else {
            return MoveOutcome::Ignored(IgnoreReason::ContainerMissing);
        };
        let mut story = slots[from_slot].items.remove(from_index);
        story.version_id = request.version_id.clone();
        slots[to_slot].items.push(story);
        MoveOutcome::Appended
    }

    /// Apply one action in place.
    pub fn apply(&mut self, action: &BoardAction) -> MoveOutcome {
        let outcome = match action {
            BoardAction::MoveUserStoryToCell(request) => self.move_story_to_cell(request),
            other => match other.reorder() {
                Some((kind, args)) => self.reorder(kind, args),
                None => MoveOutcome::Ignored(IgnoreReason::SourceMissing),
            },
        };
        match outcome {
            MoveOutcome::Ignored(reason) => {
                tracing::debug!(action = action.name(), ?reason, "board action ignored")
            }
            _ => tracing::trace!(action = action.name(), ?outcome, "board action applied"),
        }
        outcome
    }
}

/// Pure transition: the board after `action`, leaving `board` untouched.
pub fn reduce(board: &Board, action: &BoardAction) -> Board {
    let mut next = board.clone();
    next.apply(action);
    next
}

/// Fold a sequence of actions in order.
pub fn reduce_all<'a>(board: &Board, actions: impl IntoIterator<Item = &'a BoardAction>) -> Board {
    actions
        .into_iter()
        .fold(board.clone(), |next, action| reduce(&next, action))
}
