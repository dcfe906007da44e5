//! Client-side board state for the grid.
//!
//! A [`Board`] is the forest the UI drags cards around in: Epic × Version
//! cells hold feature cards, features hold user stories, stories hold task,
//! test and bug ids. [`reduce`] is the pure `(Board, BoardAction) -> Board`
//! transition; [`Board::apply`] is the in-place form used by long-lived state.

mod board;
mod reorder;

pub use board::{Board, BoardItem, FeatureCard, FeatureCell, StoryCard};
pub use reorder::{
    BoardAction, CellMove, ContainerRef, DropTarget, IgnoreReason, ItemKind, MoveOutcome,
    ReorderArgs, TargetData, reduce, reduce_all,
};
