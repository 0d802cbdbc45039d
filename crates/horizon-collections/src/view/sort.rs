//! Multi-key ordering.
//!
//! Each [`SortDescription`] names a key (its "path") and compares two items
//! by that key in one [`SortDirection`]. A [`MergedComparator`] evaluates a
//! list of descriptions left to right and stops at the first inequality.

use std::cmp::Ordering;
use std::fmt;
use std::sync::Arc;

/// Type alias for an item comparator.
pub type CompareFn<T> = Arc<dyn Fn(&T, &T) -> Ordering + Send + Sync>;

/// Sort direction of one sort level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum SortDirection {
    /// Smallest key first.
    #[default]
    Ascending,
    /// Largest key first.
    Descending,
}

impl SortDirection {
    /// The opposite direction.
    pub fn reversed(self) -> Self {
        match self {
            Self::Ascending => Self::Descending,
            Self::Descending => Self::Ascending,
        }
    }

    fn apply(self, ordering: Ordering) -> Ordering {
        match self {
            Self::Ascending => ordering,
            Self::Descending => ordering.reverse(),
        }
    }
}

/// One level of a sort.
///
/// # Example
///
/// ```
/// use horizon_collections::view::{SortDescription, SortDirection};
///
/// struct Person { name: String, age: u32 }
///
/// let by_age = SortDescription::by_key("age", |p: &Person| p.age, SortDirection::Descending);
/// assert_eq!(by_age.path(), "age");
/// assert_eq!(by_age.switch_direction().direction(), SortDirection::Ascending);
/// ```
#[derive(Clone)]
pub struct SortDescription<T> {
    path: String,
    compare: CompareFn<T>,
    direction: SortDirection,
}

impl<T: 'static> SortDescription<T> {
    /// Sorts by an `Ord` key extracted from each item.
    pub fn by_key<K, F>(path: impl Into<String>, key: F, direction: SortDirection) -> Self
    where
        K: Ord,
        F: Fn(&T) -> K + Send + Sync + 'static,
    {
        Self {
            path: path.into(),
            compare: Arc::new(move |a, b| key(a).cmp(&key(b))),
            direction,
        }
    }

    /// Sorts with a custom ascending comparator.
    pub fn by_comparer<F>(path: impl Into<String>, compare: F, direction: SortDirection) -> Self
    where
        F: Fn(&T, &T) -> Ordering + Send + Sync + 'static,
    {
        Self {
            path: path.into(),
            compare: Arc::new(compare),
            direction,
        }
    }
}

impl<T> SortDescription<T> {
    /// The key name this description sorts by.
    pub fn path(&self) -> &str {
        &self.path
    }

    /// The direction of this level.
    pub fn direction(&self) -> SortDirection {
        self.direction
    }

    /// A copy of this description with the opposite direction.
    pub fn switch_direction(&self) -> Self {
        Self {
            path: self.path.clone(),
            compare: Arc::clone(&self.compare),
            direction: self.direction.reversed(),
        }
    }

    /// Compares two items at this level, honoring the direction.
    pub fn compare(&self, a: &T, b: &T) -> Ordering {
        self.direction.apply((self.compare)(a, b))
    }
}

impl<T> fmt::Debug for SortDescription<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SortDescription")
            .field("path", &self.path)
            .field("direction", &self.direction)
            .finish()
    }
}

/// The ordered sort levels applied by a view.
#[derive(Clone)]
pub(crate) struct MergedComparator<T> {
    levels: Vec<SortDescription<T>>,
}

impl<T> Default for MergedComparator<T> {
    fn default() -> Self {
        Self { levels: Vec::new() }
    }
}

impl<T> MergedComparator<T> {
    pub(crate) fn new(levels: Vec<SortDescription<T>>) -> Self {
        Self { levels }
    }

    pub(crate) fn is_active(&self) -> bool {
        !self.levels.is_empty()
    }

    pub(crate) fn levels(&self) -> &[SortDescription<T>] {
        &self.levels
    }

    /// Compares by every level in turn, short-circuiting on the first
    /// inequality.
    pub(crate) fn compare(&self, a: &T, b: &T) -> Ordering {
        self.levels
            .iter()
            .map(|level| level.compare(a, b))
            .find(|ordering| ordering.is_ne())
            .unwrap_or(Ordering::Equal)
    }

    /// Compares two items, falling back to their source positions on ties.
    ///
    /// This is a strict total order as long as source positions are unique,
    /// which makes incremental insertion reproduce a stable bulk sort.
    pub(crate) fn compare_ranked(&self, a: (&T, usize), b: (&T, usize)) -> Ordering {
        self.compare(a.0, b.0).then(a.1.cmp(&b.1))
    }
}

impl<T> fmt::Debug for MergedComparator<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(&self.levels).finish()
    }
}

/// Finds where an element belongs in a slice ordered by `cmp`.
///
/// `cmp(element)` reports how an existing element orders relative to the
/// one being inserted. The result is the first index whose element orders
/// after it.
pub(crate) fn insertion_point<E>(sorted: &[E], mut cmp: impl FnMut(&E) -> Ordering) -> usize {
    sorted.partition_point(|existing| cmp(existing) != Ordering::Greater)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, PartialEq)]
    struct Row {
        name: &'static str,
        age: u32,
    }

    fn rows() -> Vec<Row> {
        vec![
            Row { name: "cy", age: 30 },
            Row { name: "al", age: 25 },
            Row { name: "bo", age: 30 },
        ]
    }

    #[test]
    fn test_levels_short_circuit() {
        let cmp = MergedComparator::new(vec![
            SortDescription::by_key("age", |r: &Row| r.age, SortDirection::Descending),
            SortDescription::by_key("name", |r: &Row| r.name, SortDirection::Ascending),
        ]);

        let mut sorted = rows();
        sorted.sort_by(|a, b| cmp.compare(a, b));
        let names: Vec<_> = sorted.iter().map(|r| r.name).collect();
        assert_eq!(names, vec!["bo", "cy", "al"]);
    }

    #[test]
    fn test_switch_direction() {
        let asc = SortDescription::by_key("age", |r: &Row| r.age, SortDirection::Ascending);
        let desc = asc.switch_direction();
        let rows = rows();

        assert_eq!(asc.compare(&rows[1], &rows[0]), Ordering::Less);
        assert_eq!(desc.compare(&rows[1], &rows[0]), Ordering::Greater);
        assert_eq!(desc.path(), "age");
    }

    #[test]
    fn test_ranked_ties_follow_source_order() {
        let cmp = MergedComparator::new(vec![SortDescription::by_key(
            "age",
            |r: &Row| r.age,
            SortDirection::Ascending,
        )]);
        let rows = rows();

        assert_eq!(cmp.compare(&rows[0], &rows[2]), Ordering::Equal);
        assert_eq!(cmp.compare_ranked((&rows[0], 0), (&rows[2], 2)), Ordering::Less);
    }

    #[test]
    fn test_insertion_point_after_equal_elements() {
        let sorted = [1, 2, 2, 4];
        assert_eq!(insertion_point(&sorted, |e| e.cmp(&2)), 3);
        assert_eq!(insertion_point(&sorted, |e| e.cmp(&0)), 0);
        assert_eq!(insertion_point(&sorted, |e| e.cmp(&9)), 4);
    }

    #[test]
    fn test_by_comparer() {
        let len = SortDescription::by_comparer(
            "len",
            |a: &String, b: &String| a.len().cmp(&b.len()),
            SortDirection::Ascending,
        );
        assert_eq!(len.compare(&"aa".into(), &"b".into()), Ordering::Greater);
    }
}
