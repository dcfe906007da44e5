//! Canonical in-memory issue table with nested-set tree positions.
//!
//! Issues arrive with parent pointers only. On load every tree is numbered
//! by a depth-first walk (roots and siblings in id order), giving each node a
//! `(lft, rgt, root_id)` span. Ancestor/descendant checks are then range
//! comparisons inside one root partition, and a subtree is one contiguous
//! range of the `(root_id, lft)` position index.

use crate::issue::{Issue, IssueId};
use std::collections::BTreeMap;

/// Nested-set position of one issue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TreeSpan {
    pub lft: u32,
    pub rgt: u32,
    pub root_id: IssueId,
}

impl TreeSpan {
    /// Strict containment: `self` lies inside `outer`'s range.
    pub fn is_within(&self, outer: &TreeSpan) -> bool {
        self.root_id == outer.root_id && outer.lft < self.lft && self.rgt < outer.rgt
    }
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum StoreError {
    #[error("issue {issue_id}: parent {parent_id} not found")]
    ParentNotFound { issue_id: IssueId, parent_id: IssueId },

    #[error("issue {0}: parent chain forms a cycle")]
    Cycle(IssueId),
}

#[derive(Debug, Clone, Default)]
pub struct IssueStore {
    issues: BTreeMap<IssueId, Issue>,
    spans: BTreeMap<IssueId, TreeSpan>,
    children: BTreeMap<IssueId, Vec<IssueId>>,
    by_position: BTreeMap<(IssueId, u32), IssueId>,
}

impl IssueStore {
    /// Build a store and number its trees.
    ///
    /// Duplicate ids keep the last record seen.
    pub fn from_issues(issues: Vec<Issue>) -> Result<Self, StoreError> {
        let mut table = BTreeMap::new();
        for issue in issues {
            table.insert(issue.id, issue);
        }

        let mut children: BTreeMap<IssueId, Vec<IssueId>> = BTreeMap::new();
        for issue in table.values() {
            if let Some(parent_id) = issue.parent_id {
                if !table.contains_key(&parent_id) {
                    return Err(StoreError::ParentNotFound {
                        issue_id: issue.id,
                        parent_id,
                    });
                }
                children.entry(parent_id).or_default().push(issue.id);
            }
        }

        let roots: Vec<IssueId> = table
            .values()
            .filter(|issue| issue.parent_id.is_none())
            .map(|issue| issue.id)
            .collect();
        let spans = number_trees(&roots, &children);

        if let Some(stray) = table.keys().find(|id| !spans.contains_key(id)) {
            return Err(StoreError::Cycle(*stray));
        }

        let by_position = spans
            .iter()
            .map(|(id, span)| ((span.root_id, span.lft), *id))
            .collect();

        Ok(Self {
            issues: table,
            spans,
            children,
            by_position,
        })
    }

    pub fn len(&self) -> usize {
        self.issues.len()
    }

    pub fn is_empty(&self) -> bool {
        self.issues.is_empty()
    }

    pub fn issue(&self, id: IssueId) -> Option<&Issue> {
        self.issues.get(&id)
    }

    /// All issues in id order.
    pub fn issues(&self) -> impl Iterator<Item = &Issue> {
        self.issues.values()
    }

    pub fn span(&self, id: IssueId) -> Option<TreeSpan> {
        self.spans.get(&id).copied()
    }

    /// Direct children in id order.
    pub fn children(&self, id: IssueId) -> &[IssueId] {
        self.children.get(&id).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn child_issues(&self, id: IssueId) -> impl Iterator<Item = &Issue> {
        self.children(id).iter().filter_map(|child| self.issue(*child))
    }

    /// Whether `id` lies strictly inside `ancestor`'s subtree.
    pub fn is_descendant_of(&self, id: IssueId, ancestor: IssueId) -> bool {
        match (self.span(id), self.span(ancestor)) {
            (Some(inner), Some(outer)) => inner.is_within(&outer),
            _ => false,
        }
    }

    pub fn is_ancestor_of(&self, id: IssueId, descendant: IssueId) -> bool {
        self.is_descendant_of(descendant, id)
    }

    /// Every issue strictly below `id`, in depth-first order.
    pub fn descendants(&self, id: IssueId) -> impl Iterator<Item = &Issue> {
        let range = self
            .span(id)
            .map(|outer| (outer.root_id, outer.lft + 1)..(outer.root_id, outer.rgt));
        range
            .into_iter()
            .flat_map(|range| self.by_position.range(range))
            .filter_map(|(_, id)| self.issue(*id))
    }
}

fn number_trees(
    roots: &[IssueId],
    children: &BTreeMap<IssueId, Vec<IssueId>>,
) -> BTreeMap<IssueId, TreeSpan> {
    let mut lfts: BTreeMap<IssueId, u32> = BTreeMap::new();
    let mut spans = BTreeMap::new();

    for &root_id in roots {
        let mut counter: u32 = 1;
        lfts.insert(root_id, counter);
        let mut stack: Vec<(IssueId, usize)> = vec![(root_id, 0)];

        while let Some(&(node, next)) = stack.last() {
            let child = children.get(&node).and_then(|kids| kids.get(next)).copied();
            match child {
                Some(child) => {
                    if let Some(top) = stack.last_mut() {
                        top.1 += 1;
                    }
                    counter += 1;
                    lfts.insert(child, counter);
                    stack.push((child, 0));
                }
                None => {
                    counter += 1;
                    let lft = lfts.get(&node).copied().unwrap_or_default();
                    spans.insert(
                        node,
                        TreeSpan {
                            lft,
                            rgt: counter,
                            root_id,
                        },
                    );
                    stack.pop();
                }
            }
        }
    }
    spans
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn issue(id: IssueId, parent: Option<IssueId>) -> Issue {
        let created = Utc.with_ymd_and_hms(2025, 3, 1, 9, 0, 0).unwrap();
        let mut issue = Issue::new(id, "Task", format!("Issue {id}"), created);
        issue.parent_id = parent;
        issue
    }

    fn sample() -> IssueStore {
        // 1 ── 2 ── 4
        //  └── 3
        // 10 ── 11
        IssueStore::from_issues(vec![
            issue(4, Some(2)),
            issue(1, None),
            issue(2, Some(1)),
            issue(3, Some(1)),
            issue(10, None),
            issue(11, Some(10)),
        ])
        .expect("store should build")
    }

    #[test]
    fn numbers_trees_depth_first_in_id_order() {
        let store = sample();
        let span = |id| store.span(id).expect("span");
        assert_eq!((span(1).lft, span(1).rgt), (1, 8));
        assert_eq!((span(2).lft, span(2).rgt), (2, 5));
        assert_eq!((span(4).lft, span(4).rgt), (3, 4));
        assert_eq!((span(3).lft, span(3).rgt), (6, 7));
        assert_eq!((span(10).lft, span(10).rgt), (1, 4));
        assert_eq!(span(11).root_id, 10);
    }

    #[test]
    fn containment_is_strict_and_per_root() {
        let store = sample();
        assert!(store.is_descendant_of(4, 1));
        assert!(store.is_ancestor_of(2, 4));
        assert!(!store.is_descendant_of(1, 1));
        assert!(!store.is_descendant_of(3, 2));
        // 11 has lft 2 which falls inside root 1's numeric range.
        assert!(!store.is_descendant_of(11, 1));
    }

    #[test]
    fn descendants_walk_the_subtree_in_tree_order() {
        let store = sample();
        let ids: Vec<IssueId> = store.descendants(1).map(|i| i.id).collect();
        assert_eq!(ids, vec![2, 4, 3]);
        let ids: Vec<IssueId> = store.descendants(2).map(|i| i.id).collect();
        assert_eq!(ids, vec![4]);
        assert_eq!(store.descendants(4).count(), 0);
        assert_eq!(store.descendants(99).count(), 0);
        assert_eq!(store.children(1), &[2, 3]);
        assert!(store.children(4).is_empty());
    }

    #[test]
    fn descendants_stay_inside_their_own_subtree_in_a_large_forest() {
        // 40 roots, each with 5 children of 4 leaves.
        let mut issues = Vec::new();
        let mut next: IssueId = 1;
        let mut roots = Vec::new();
        for _ in 0..40 {
            let root = next;
            next += 1;
            roots.push(root);
            issues.push(issue(root, None));
            for _ in 0..5 {
                let mid = next;
                next += 1;
                issues.push(issue(mid, Some(root)));
                for _ in 0..4 {
                    issues.push(issue(next, Some(mid)));
                    next += 1;
                }
            }
        }
        let store = IssueStore::from_issues(issues).expect("store");
        assert_eq!(store.len(), 40 * 26);

        for &root in &roots {
            let ids: Vec<IssueId> = store.descendants(root).map(|i| i.id).collect();
            assert_eq!(ids.len(), 25);
            assert!(ids.iter().all(|id| store.is_descendant_of(*id, root)));
        }
        let mid = roots[7] + 1;
        let ids: Vec<IssueId> = store.descendants(mid).map(|i| i.id).collect();
        assert_eq!(ids, vec![mid + 1, mid + 2, mid + 3, mid + 4]);
    }

    #[test]
    fn missing_parent_is_rejected() {
        let err = IssueStore::from_issues(vec![issue(1, Some(99))]).expect_err("should fail");
        assert_eq!(
            err,
            StoreError::ParentNotFound {
                issue_id: 1,
                parent_id: 99
            }
        );
    }

    #[test]
    fn parent_cycle_is_rejected() {
        let err = IssueStore::from_issues(vec![issue(1, None), issue(2, Some(3)), issue(3, Some(2))])
            .expect_err("should fail");
        assert_eq!(err, StoreError::Cycle(2));
    }

    #[test]
    fn duplicate_ids_keep_last_record() {
        let mut later = issue(1, None);
        later.subject = "renamed".to_string();
        let store = IssueStore::from_issues(vec![issue(1, None), later]).expect("store");
        assert_eq!(store.len(), 1);
        assert_eq!(store.issue(1).map(|i| i.subject.as_str()), Some("renamed"));
    }
}
