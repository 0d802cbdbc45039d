//! Hierarchical grouping.
//!
//! Grouping partitions the filtered, sorted items into a tree. Each
//! [`GroupDescription`] contributes one level: it maps an item to a
//! [`GroupKey`], and items sharing a key at every level end up in the same
//! bottom-level group.
//!
//! ```text
//! root (item_count = 4)
//! ├── odd  (2): 1, 3
//! └── even (2): 2, 4
//! ```
//!
//! Groups appear in the order their first item appears in the sorted list,
//! except that explicitly declared groups always come first and survive
//! becoming empty.
//!
//! The engine keeps up to two trees. The display tree is what the view
//! exposes. When paging is active a second, shadow tree groups the whole
//! filtered list and only serves to locate leaves by global position; the
//! display tree then holds only the current page.

use std::fmt;
use std::sync::Arc;

use super::pipeline::ItemKey;

/// The key of a group.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub enum GroupKey {
    /// Items without a key.
    #[default]
    None,
    /// A boolean key.
    Bool(bool),
    /// A signed integer key.
    Int(i64),
    /// An unsigned integer key.
    UInt(u64),
    /// A string key.
    Str(String),
}

impl fmt::Display for GroupKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::None => write!(f, "(none)"),
            Self::Bool(b) => write!(f, "{b}"),
            Self::Int(n) => write!(f, "{n}"),
            Self::UInt(n) => write!(f, "{n}"),
            Self::Str(s) => write!(f, "{s}"),
        }
    }
}

impl From<bool> for GroupKey {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<i32> for GroupKey {
    fn from(value: i32) -> Self {
        Self::Int(value.into())
    }
}

impl From<i64> for GroupKey {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<u32> for GroupKey {
    fn from(value: u32) -> Self {
        Self::UInt(value.into())
    }
}

impl From<u64> for GroupKey {
    fn from(value: u64) -> Self {
        Self::UInt(value)
    }
}

impl From<usize> for GroupKey {
    fn from(value: usize) -> Self {
        Self::UInt(value as u64)
    }
}

impl From<&str> for GroupKey {
    fn from(value: &str) -> Self {
        Self::Str(value.to_owned())
    }
}

impl From<String> for GroupKey {
    fn from(value: String) -> Self {
        Self::Str(value)
    }
}

impl<K: Into<GroupKey>> From<Option<K>> for GroupKey {
    fn from(value: Option<K>) -> Self {
        value.map_or(Self::None, Into::into)
    }
}

/// Type alias for a group key extractor.
pub type GroupKeyFn<T> = Arc<dyn Fn(&T) -> GroupKey + Send + Sync>;

/// One level of grouping.
///
/// # Example
///
/// ```
/// use horizon_collections::view::{GroupDescription, GroupKey};
///
/// let parity = GroupDescription::new("parity", |n: &i32| if n % 2 == 0 { "even" } else { "odd" })
///     .with_explicit_keys(["even", "odd"]);
/// assert_eq!(parity.key_of(&3), GroupKey::from("odd"));
/// ```
#[derive(Clone)]
pub struct GroupDescription<T> {
    name: String,
    key: GroupKeyFn<T>,
    explicit_keys: Vec<GroupKey>,
}

impl<T: 'static> GroupDescription<T> {
    /// Creates a level named `name` grouping by the key `key` extracts.
    pub fn new<K, F>(name: impl Into<String>, key: F) -> Self
    where
        K: Into<GroupKey>,
        F: Fn(&T) -> K + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            key: Arc::new(move |item| key(item).into()),
            explicit_keys: Vec::new(),
        }
    }
}

impl<T> GroupDescription<T> {
    /// Declares groups that exist even when empty, in the given order.
    pub fn with_explicit_keys<K: Into<GroupKey>>(mut self, keys: impl IntoIterator<Item = K>) -> Self {
        self.explicit_keys = keys.into_iter().map(Into::into).collect();
        self
    }

    /// The level name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The explicitly declared group keys.
    pub fn explicit_keys(&self) -> &[GroupKey] {
        &self.explicit_keys
    }

    /// The group key of `item` at this level.
    pub fn key_of(&self, item: &T) -> GroupKey {
        (self.key)(item)
    }
}

impl<T> fmt::Debug for GroupDescription<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GroupDescription")
            .field("name", &self.name)
            .field("explicit_keys", &self.explicit_keys)
            .finish_non_exhaustive()
    }
}

/// The key path of `item` through every level.
pub(crate) fn key_path<T>(levels: &[GroupDescription<T>], item: &T) -> Vec<GroupKey> {
    levels.iter().map(|level| level.key_of(item)).collect()
}

#[derive(Debug, Clone)]
enum GroupChild {
    Leaf(ItemKey),
    Group(GroupNode),
}

#[derive(Debug, Clone)]
struct GroupNode {
    key: GroupKey,
    item_count: usize,
    children: Vec<GroupChild>,
    is_explicit: bool,
    is_bottom_level: bool,
    /// Index of the subgroup used by the previous in-order insertion.
    last_index: usize,
}

impl GroupNode {
    fn new(key: GroupKey, level: usize, explicit: &[Vec<GroupKey>], is_explicit: bool) -> Self {
        let is_bottom_level = level >= explicit.len();
        let children = if is_bottom_level {
            Vec::new()
        } else {
            explicit[level]
                .iter()
                .map(|k| GroupChild::Group(GroupNode::new(k.clone(), level + 1, explicit, true)))
                .collect()
        };
        Self {
            key,
            item_count: 0,
            children,
            is_explicit,
            is_bottom_level,
            last_index: 0,
        }
    }

    fn subgroup_index(&self, key: &GroupKey, resume: bool) -> Option<usize> {
        if resume {
            if let Some(GroupChild::Group(g)) = self.children.get(self.last_index) {
                if &g.key == key {
                    return Some(self.last_index);
                }
            }
        }
        self.children
            .iter()
            .position(|c| matches!(c, GroupChild::Group(g) if &g.key == key))
    }

    fn first_leaf(&self) -> Option<ItemKey> {
        self.children.iter().find_map(|child| match child {
            GroupChild::Leaf(leaf) => Some(*leaf),
            GroupChild::Group(g) => g.first_leaf(),
        })
    }

    /// Where a new dynamic subgroup whose first item has `rank` belongs.
    fn new_subgroup_position(&self, rank: usize, rank_of: &dyn Fn(ItemKey) -> usize) -> usize {
        let explicit_end = self
            .children
            .iter()
            .take_while(|c| matches!(c, GroupChild::Group(g) if g.is_explicit))
            .count();
        // Loose leaves (the provisional item) stay behind every subgroup.
        let end = self
            .children
            .iter()
            .position(|c| matches!(c, GroupChild::Leaf(_)))
            .unwrap_or(self.children.len())
            .max(explicit_end);
        explicit_end
            + self.children[explicit_end..end].partition_point(|child| match child {
                GroupChild::Group(g) => g.first_leaf().is_none_or(|leaf| rank_of(leaf) < rank),
                GroupChild::Leaf(_) => false,
            })
    }

    /// Moves the dynamic subgroup at `index` to where its first leaf ranks
    /// among its siblings.
    fn reposition(&mut self, index: usize, rank_of: &dyn Fn(ItemKey) -> usize) {
        let first = match self.children.get(index) {
            Some(GroupChild::Group(g)) if !g.is_explicit => g.first_leaf(),
            _ => None,
        };
        let Some(first) = first else {
            return;
        };
        let child = self.children.remove(index);
        let position = self.new_subgroup_position(rank_of(first), rank_of);
        self.children.insert(position, child);
        if position != index {
            tracing::trace!(target: horizon_collections_core::logging::targets::GROUP, from = index, to = position, "moving group");
            self.last_index = position;
        }
    }

    fn insert(
        &mut self,
        level: usize,
        path: &[GroupKey],
        leaf: ItemKey,
        rank: usize,
        ctx: &InsertContext<'_>,
    ) {
        self.item_count += 1;

        if self.is_bottom_level {
            let position = self.children.partition_point(|child| match child {
                GroupChild::Leaf(existing) => (ctx.rank_of)(*existing) < rank,
                GroupChild::Group(_) => true,
            });
            self.children.insert(position, GroupChild::Leaf(leaf));
            return;
        }

        let key = &path[level];
        let (index, created) = match self.subgroup_index(key, ctx.resume) {
            Some(index) => (index, false),
            None => {
                let index = self.new_subgroup_position(rank, ctx.rank_of);
                tracing::trace!(target: horizon_collections_core::logging::targets::GROUP, %key, level, "creating group");
                self.children.insert(
                    index,
                    GroupChild::Group(GroupNode::new(key.clone(), level + 1, ctx.explicit, false)),
                );
                (index, true)
            }
        };
        self.last_index = index;

        let became_first = match &mut self.children[index] {
            GroupChild::Group(group) => {
                group.insert(level + 1, path, leaf, rank, ctx);
                group.first_leaf() == Some(leaf)
            }
            GroupChild::Leaf(_) => false,
        };
        if became_first && !created {
            self.reposition(index, ctx.rank_of);
        }
    }

    fn remove_along(
        &mut self,
        level: usize,
        path: &[GroupKey],
        leaf: ItemKey,
        rank_of: &dyn Fn(ItemKey) -> usize,
    ) -> bool {
        if self.is_bottom_level {
            let Some(index) = self
                .children
                .iter()
                .position(|c| matches!(c, GroupChild::Leaf(l) if *l == leaf))
            else {
                return false;
            };
            self.children.remove(index);
            self.item_count -= 1;
            return true;
        }

        let Some(key) = path.get(level) else {
            return false;
        };
        let Some(index) = self.subgroup_index(key, false) else {
            return false;
        };
        let (removed, was_first) = match &mut self.children[index] {
            GroupChild::Group(group) => {
                let was_first = group.first_leaf() == Some(leaf);
                (group.remove_along(level + 1, path, leaf, rank_of), was_first)
            }
            GroupChild::Leaf(_) => (false, false),
        };
        if removed {
            self.item_count -= 1;
            self.settle_child(index, was_first, rank_of);
        }
        removed
    }

    fn remove_anywhere(&mut self, leaf: ItemKey, rank_of: &dyn Fn(ItemKey) -> usize) -> bool {
        for index in 0..self.children.len() {
            let (found, was_first) = match &mut self.children[index] {
                GroupChild::Leaf(l) => (*l == leaf, false),
                GroupChild::Group(group) => {
                    let was_first = group.first_leaf() == Some(leaf);
                    (group.remove_anywhere(leaf, rank_of), was_first)
                }
            };
            if !found {
                continue;
            }
            if matches!(self.children[index], GroupChild::Leaf(_)) {
                self.children.remove(index);
            }
            self.item_count -= 1;
            self.settle_child(index, was_first, rank_of);
            return true;
        }
        false
    }

    /// Prunes the subgroup at `index` after a removal, or moves it back into
    /// rank order if it lost its first leaf.
    fn settle_child(&mut self, index: usize, lost_first: bool, rank_of: &dyn Fn(ItemKey) -> usize) {
        if !self.prune(index) && lost_first {
            self.reposition(index, rank_of);
        }
    }

    /// Drops the subgroup at `index` if it became empty and was not declared.
    fn prune(&mut self, index: usize) -> bool {
        if let Some(GroupChild::Group(g)) = self.children.get(index) {
            if g.item_count == 0 && !g.is_explicit {
                tracing::trace!(target: horizon_collections_core::logging::targets::GROUP, key = %g.key, "removing empty group");
                self.children.remove(index);
                self.last_index = 0;
                return true;
            }
        }
        false
    }

    fn collect_leaves(&self, out: &mut Vec<ItemKey>) {
        for child in &self.children {
            match child {
                GroupChild::Leaf(leaf) => out.push(*leaf),
                GroupChild::Group(g) => g.collect_leaves(out),
            }
        }
    }

    fn leaf_at(&self, mut index: usize) -> Option<ItemKey> {
        for child in &self.children {
            match child {
                GroupChild::Leaf(leaf) if index == 0 => return Some(*leaf),
                GroupChild::Leaf(_) => index -= 1,
                GroupChild::Group(g) if index < g.item_count => return g.leaf_at(index),
                GroupChild::Group(g) => index -= g.item_count,
            }
        }
        None
    }

    fn counts_consistent(&self) -> bool {
        let mut total = 0;
        for child in &self.children {
            match child {
                GroupChild::Leaf(_) => total += 1,
                GroupChild::Group(g) => {
                    if !g.counts_consistent() {
                        return false;
                    }
                    total += g.item_count;
                }
            }
        }
        total == self.item_count
    }

    fn snapshot<T>(&self, item_of: &dyn Fn(ItemKey) -> Option<T>) -> ViewGroup<T> {
        ViewGroup {
            key: self.key.clone(),
            item_count: self.item_count,
            is_bottom_level: self.is_bottom_level,
            children: self
                .children
                .iter()
                .filter_map(|child| match child {
                    GroupChild::Leaf(leaf) => item_of(*leaf).map(ViewGroupChild::Item),
                    GroupChild::Group(g) => Some(ViewGroupChild::Group(g.snapshot(item_of))),
                })
                .collect(),
        }
    }
}

struct InsertContext<'a> {
    explicit: &'a [Vec<GroupKey>],
    rank_of: &'a dyn Fn(ItemKey) -> usize,
    resume: bool,
}

/// A group tree over item keys.
///
/// The tree only knows key paths and ranks. Callers compute paths with
/// [`key_path`] and supply a rank function reporting each leaf's position in
/// the ordering the tree mirrors.
#[derive(Debug, Clone)]
pub(crate) struct GroupTree {
    root: GroupNode,
    explicit: Vec<Vec<GroupKey>>,
}

impl GroupTree {
    /// Creates an empty tree for the given levels.
    pub(crate) fn new<T>(levels: &[GroupDescription<T>]) -> Self {
        let explicit: Vec<Vec<GroupKey>> = levels.iter().map(|l| l.explicit_keys.clone()).collect();
        Self {
            root: GroupNode::new(GroupKey::None, 0, &explicit, false),
            explicit,
        }
    }

    /// Builds a tree over `ordered`, whose order defines the ranks.
    pub(crate) fn build<T>(
        levels: &[GroupDescription<T>],
        ordered: &[ItemKey],
        item_of: impl Fn(ItemKey) -> Option<T>,
        in_group_order: bool,
    ) -> Self {
        let mut tree = Self::new(levels);
        let ranks: slotmap::SecondaryMap<ItemKey, usize> =
            ordered.iter().enumerate().map(|(rank, key)| (*key, rank)).collect();
        let rank_of = |key: ItemKey| ranks.get(key).copied().unwrap_or(usize::MAX);
        let ctx = InsertContext {
            explicit: &tree.explicit,
            rank_of: &rank_of,
            resume: in_group_order,
        };
        for (rank, key) in ordered.iter().enumerate() {
            if let Some(item) = item_of(*key) {
                tree.root.insert(0, &key_path(levels, &item), *key, rank, &ctx);
            }
        }
        tree
    }

    /// Number of leaves in the tree.
    pub(crate) fn item_count(&self) -> usize {
        self.root.item_count
    }

    /// Routes `leaf` along `path`, placing it by `rank`.
    pub(crate) fn insert(
        &mut self,
        path: &[GroupKey],
        leaf: ItemKey,
        rank: usize,
        rank_of: &dyn Fn(ItemKey) -> usize,
    ) {
        let ctx = InsertContext {
            explicit: &self.explicit,
            rank_of,
            resume: false,
        };
        self.root.insert(0, path, leaf, rank, &ctx);
    }

    /// Appends a leaf that belongs to no group at the end of the root.
    pub(crate) fn insert_special(&mut self, leaf: ItemKey) {
        self.root.children.push(GroupChild::Leaf(leaf));
        self.root.item_count += 1;
    }

    /// Removes `leaf`, looking along `path` first and searching the whole
    /// tree if it is not there. `rank_of` reports the ranks of the leaves
    /// that remain.
    pub(crate) fn remove(&mut self, path: &[GroupKey], leaf: ItemKey, rank_of: &dyn Fn(ItemKey) -> usize) -> bool {
        if self.root.remove_along(0, path, leaf, rank_of) {
            return true;
        }
        let found = self.root.remove_anywhere(leaf, rank_of);
        if found {
            tracing::trace!(target: horizon_collections_core::logging::targets::GROUP, "leaf found by exhaustive search");
        }
        found
    }

    /// All leaves in display order.
    pub(crate) fn leaves(&self) -> Vec<ItemKey> {
        let mut out = Vec::with_capacity(self.root.item_count);
        self.root.collect_leaves(&mut out);
        out
    }

    /// The leaf at global position `index`.
    pub(crate) fn leaf_at(&self, index: usize) -> Option<ItemKey> {
        self.root.leaf_at(index)
    }

    /// The leaves at global positions `start..start + len`, clamped.
    pub(crate) fn leaf_range(&self, start: usize, len: usize) -> Vec<ItemKey> {
        let end = start.saturating_add(len).min(self.root.item_count);
        (start..end).filter_map(|index| self.leaf_at(index)).collect()
    }

    /// Returns `true` if every node's count equals the sum of its children.
    pub(crate) fn counts_consistent(&self) -> bool {
        self.root.counts_consistent()
    }

    pub(crate) fn snapshot<T>(&self, item_of: &dyn Fn(ItemKey) -> Option<T>) -> ViewGroup<T> {
        self.root.snapshot(item_of)
    }
}

/// A child of a [`ViewGroup`].
#[derive(Debug, Clone, PartialEq)]
pub enum ViewGroupChild<T> {
    /// A concrete item.
    Item(T),
    /// A nested group.
    Group(ViewGroup<T>),
}

/// A snapshot of one node of a view's group tree.
#[derive(Debug, Clone, PartialEq)]
pub struct ViewGroup<T> {
    /// The group key. The root carries [`GroupKey::None`].
    pub key: GroupKey,
    /// Number of items in this group, transitively.
    pub item_count: usize,
    /// Whether this group holds items rather than subgroups.
    pub is_bottom_level: bool,
    /// Subgroups or items, in display order.
    pub children: Vec<ViewGroupChild<T>>,
}

impl<T> ViewGroup<T> {
    /// The direct subgroups.
    pub fn subgroups(&self) -> impl Iterator<Item = &ViewGroup<T>> {
        self.children.iter().filter_map(|child| match child {
            ViewGroupChild::Group(g) => Some(g),
            ViewGroupChild::Item(_) => None,
        })
    }

    /// Finds the direct subgroup keyed `key`.
    pub fn subgroup(&self, key: &GroupKey) -> Option<&ViewGroup<T>> {
        self.subgroups().find(|g| &g.key == key)
    }

    /// All items below this group, in display order.
    pub fn items(&self) -> Vec<&T> {
        let mut out = Vec::new();
        self.collect_items(&mut out);
        out
    }

    fn collect_items<'a>(&'a self, out: &mut Vec<&'a T>) {
        for child in &self.children {
            match child {
                ViewGroupChild::Item(item) => out.push(item),
                ViewGroupChild::Group(g) => g.collect_items(out),
            }
        }
    }

    /// Counts items by walking the tree instead of trusting `item_count`.
    pub fn leaf_count(&self) -> usize {
        self.children
            .iter()
            .map(|child| match child {
                ViewGroupChild::Item(_) => 1,
                ViewGroupChild::Group(g) => g.leaf_count(),
            })
            .sum()
    }
}

impl<T: fmt::Debug> fmt::Display for ViewGroup<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fn write_node<T: fmt::Debug>(
            f: &mut fmt::Formatter<'_>,
            group: &ViewGroup<T>,
            depth: usize,
        ) -> fmt::Result {
            for child in &group.children {
                match child {
                    ViewGroupChild::Item(item) => writeln!(f, "{:indent$}{item:?}", "", indent = depth * 2)?,
                    ViewGroupChild::Group(g) => {
                        writeln!(f, "{:indent$}{} ({})", "", g.key, g.item_count, indent = depth * 2)?;
                        write_node(f, g, depth + 1)?;
                    }
                }
            }
            Ok(())
        }
        writeln!(f, "root ({})", self.item_count)?;
        write_node(f, self, 1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use slotmap::SlotMap;

    fn parity() -> GroupDescription<i32> {
        GroupDescription::new("parity", |n: &i32| if n % 2 == 0 { "even" } else { "odd" })
    }

    fn store(items: &[i32]) -> (SlotMap<ItemKey, i32>, Vec<ItemKey>) {
        let mut map = SlotMap::with_key();
        let keys = items.iter().map(|n| map.insert(*n)).collect();
        (map, keys)
    }

    fn values(map: &SlotMap<ItemKey, i32>, keys: &[ItemKey]) -> Vec<i32> {
        keys.iter().map(|k| map[*k]).collect()
    }

    fn rank_in(order: &[ItemKey]) -> impl Fn(ItemKey) -> usize + '_ {
        |k| order.iter().position(|o| *o == k).unwrap_or(usize::MAX)
    }

    #[test]
    fn test_groups_in_first_seen_order() {
        let (map, keys) = store(&[1, 2, 3, 4]);
        let levels = [parity()];
        let tree = GroupTree::build(&levels, &keys, |k| map.get(k).copied(), false);

        let snapshot = tree.snapshot(&|k| map.get(k).copied());
        let keys: Vec<_> = snapshot.subgroups().map(|g| g.key.clone()).collect();
        assert_eq!(keys, vec![GroupKey::from("odd"), GroupKey::from("even")]);
        assert_eq!(snapshot.item_count, 4);
        assert_eq!(values(&map, &tree.leaves()), vec![1, 3, 2, 4]);
        assert!(tree.counts_consistent());
    }

    #[test]
    fn test_explicit_groups_first_and_kept_when_empty() {
        let (map, keys) = store(&[1, 3]);
        let levels = [parity().with_explicit_keys(["even"])];
        let tree = GroupTree::build(&levels, &keys, |k| map.get(k).copied(), false);

        let snapshot = tree.snapshot(&|k| map.get(k).copied());
        let even = snapshot.subgroup(&"even".into()).unwrap();
        assert_eq!(even.item_count, 0);
        assert_eq!(snapshot.subgroups().next().unwrap().key, GroupKey::from("even"));
        assert_eq!(snapshot.item_count, 2);
    }

    #[test]
    fn test_remove_prunes_dynamic_groups() {
        let (map, keys) = store(&[1, 2]);
        let levels = [parity()];
        let mut tree = GroupTree::build(&levels, &keys, |k| map.get(k).copied(), false);

        assert!(tree.remove(&key_path(&levels, &2), keys[1], &rank_in(&keys[..1])));
        let snapshot = tree.snapshot(&|k| map.get(k).copied());
        assert_eq!(snapshot.subgroups().count(), 1);
        assert_eq!(tree.item_count(), 1);
    }

    #[test]
    fn test_remove_with_changed_key_searches_everywhere() {
        let (map, keys) = store(&[1, 2]);
        let levels = [parity()];
        let mut tree = GroupTree::build(&levels, &keys, |k| map.get(k).copied(), false);

        // Wrong path: the leaf is still found.
        assert!(tree.remove(&[GroupKey::from("even")], keys[0], &rank_in(&keys[1..])));
        assert_eq!(values(&map, &tree.leaves()), vec![2]);
        assert!(tree.counts_consistent());
    }

    #[test]
    fn test_incremental_insert_by_rank() {
        let (mut map, mut order) = store(&[1, 2, 5]);
        let levels = [parity()];
        let mut tree = GroupTree::build(&levels, &order, |k| map.get(k).copied(), false);

        let three = map.insert(3);
        order.insert(2, three);
        let rank_of = |k: ItemKey| order.iter().position(|o| *o == k).unwrap_or(usize::MAX);
        tree.insert(&key_path(&levels, &3), three, 2, &rank_of);

        assert_eq!(values(&map, &tree.leaves()), vec![1, 3, 5, 2]);
    }

    #[test]
    fn test_insert_before_first_leaf_moves_group() {
        let (mut map, mut order) = store(&[2, 5]);
        let levels = [parity()];
        let mut tree = GroupTree::build(&levels, &order, |k| map.get(k).copied(), false);
        assert_eq!(values(&map, &tree.leaves()), vec![2, 5]);

        let one = map.insert(1);
        order.insert(0, one);
        tree.insert(&key_path(&levels, &1), one, 0, &rank_in(&order));

        let rebuilt = GroupTree::build(&levels, &order, |k| map.get(k).copied(), false);
        assert_eq!(values(&map, &tree.leaves()), vec![1, 5, 2]);
        assert_eq!(tree.leaves(), rebuilt.leaves());
    }

    #[test]
    fn test_removing_first_leaf_moves_group() {
        let (map, mut order) = store(&[1, 2, 3]);
        let levels = [parity()];
        let mut tree = GroupTree::build(&levels, &order, |k| map.get(k).copied(), false);
        assert_eq!(values(&map, &tree.leaves()), vec![1, 3, 2]);

        let one = order.remove(0);
        assert!(tree.remove(&key_path(&levels, &1), one, &rank_in(&order)));

        let rebuilt = GroupTree::build(&levels, &order, |k| map.get(k).copied(), false);
        assert_eq!(values(&map, &tree.leaves()), vec![2, 3]);
        assert_eq!(tree.leaves(), rebuilt.leaves());
        assert!(tree.counts_consistent());
    }

    #[test]
    fn test_nested_groups_follow_first_leaf() {
        let (mut map, mut order) = store(&[3, 12, 14]);
        let levels = [
            parity(),
            GroupDescription::new("size", |n: &i32| *n >= 10),
        ];
        let mut tree = GroupTree::build(&levels, &order, |k| map.get(k).copied(), false);
        assert_eq!(values(&map, &tree.leaves()), vec![3, 12, 14]);

        // 2 is even and small: its subgroup and the even group both move up.
        let two = map.insert(2);
        order.insert(0, two);
        tree.insert(&key_path(&levels, &2), two, 0, &rank_in(&order));

        let rebuilt = GroupTree::build(&levels, &order, |k| map.get(k).copied(), false);
        assert_eq!(values(&map, &tree.leaves()), vec![2, 12, 14, 3]);
        assert_eq!(tree.leaves(), rebuilt.leaves());
        assert!(tree.counts_consistent());
    }

    #[test]
    fn test_explicit_groups_do_not_move() {
        let (mut map, mut order) = store(&[1]);
        let levels = [parity().with_explicit_keys(["odd", "even"])];
        let mut tree = GroupTree::build(&levels, &order, |k| map.get(k).copied(), false);

        let two = map.insert(2);
        order.insert(0, two);
        tree.insert(&key_path(&levels, &2), two, 0, &rank_in(&order));

        assert_eq!(values(&map, &tree.leaves()), vec![1, 2]);
    }

    #[test]
    fn test_special_leaf_stays_last() {
        let (mut map, order) = store(&[2]);
        let levels = [parity()];
        let mut tree = GroupTree::build(&levels, &order, |k| map.get(k).copied(), false);

        let special = map.insert(7);
        tree.insert_special(special);

        let one = map.insert(1);
        let all = [order[0], one];
        let rank_of = |k: ItemKey| all.iter().position(|o| *o == k).unwrap_or(usize::MAX);
        tree.insert(&key_path(&levels, &1), one, 1, &rank_of);

        assert_eq!(values(&map, &tree.leaves()), vec![2, 1, 7]);
        assert_eq!(tree.item_count(), 3);
        assert!(tree.remove(&[], special, &rank_in(&all)));
        assert!(tree.counts_consistent());
    }

    #[test]
    fn test_two_levels_and_leaf_lookup() {
        let (map, keys) = store(&[1, 12, 3, 14, 22]);
        let levels = [
            parity(),
            GroupDescription::new("size", |n: &i32| *n >= 10),
        ];
        let tree = GroupTree::build(&levels, &keys, |k| map.get(k).copied(), true);

        assert_eq!(values(&map, &tree.leaves()), vec![1, 3, 12, 14, 22]);
        assert_eq!(tree.leaf_at(2).map(|k| map[k]), Some(12));
        assert_eq!(values(&map, &tree.leaf_range(3, 10)), vec![14, 22]);
        assert!(tree.leaf_at(5).is_none());
        assert!(tree.counts_consistent());
    }

    #[test]
    fn test_display_tree() {
        let (map, keys) = store(&[1, 2]);
        let levels = [parity()];
        let tree = GroupTree::build(&levels, &keys, |k| map.get(k).copied(), false);
        let text = tree.snapshot(&|k| map.get(k).copied()).to_string();
        assert_eq!(text, "root (2)\n  odd (1)\n    1\n  even (1)\n    2\n");
    }
}
