//! Membership filtering.
//!
//! A [`FilterSpec`] decides which source items appear in a view. It combines
//! an optional primary predicate with any number of named clauses; an item
//! passes when every installed predicate accepts it.

use std::fmt;
use std::sync::Arc;

/// Type alias for a filter predicate.
///
/// Returns `true` if the item should be included, `false` to filter it out.
pub type FilterFn<T> = Arc<dyn Fn(&T) -> bool + Send + Sync>;

/// A named predicate that participates in a [`FilterSpec`].
#[derive(Clone)]
pub struct FilterClause<T> {
    name: String,
    predicate: FilterFn<T>,
}

impl<T> FilterClause<T> {
    /// Creates a clause named `name`.
    pub fn new<F>(name: impl Into<String>, predicate: F) -> Self
    where
        F: Fn(&T) -> bool + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            predicate: Arc::new(predicate),
        }
    }

    /// The clause name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Evaluates the clause against `item`.
    pub fn accepts(&self, item: &T) -> bool {
        (self.predicate)(item)
    }
}

impl<T> fmt::Debug for FilterClause<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FilterClause")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

/// The conjunction of a primary predicate and named clauses.
#[derive(Clone)]
pub struct FilterSpec<T> {
    primary: Option<FilterFn<T>>,
    clauses: Vec<FilterClause<T>>,
}

impl<T> Default for FilterSpec<T> {
    fn default() -> Self {
        Self {
            primary: None,
            clauses: Vec::new(),
        }
    }
}

impl<T> FilterSpec<T> {
    /// Creates a spec that accepts every item.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a spec with a primary predicate.
    pub fn with_predicate<F>(predicate: F) -> Self
    where
        F: Fn(&T) -> bool + Send + Sync + 'static,
    {
        Self {
            primary: Some(Arc::new(predicate)),
            clauses: Vec::new(),
        }
    }

    /// Returns `true` if no predicate is installed.
    pub fn is_empty(&self) -> bool {
        self.primary.is_none() && self.clauses.is_empty()
    }

    /// Returns `true` if a primary predicate is installed.
    pub fn has_primary(&self) -> bool {
        self.primary.is_some()
    }

    pub(crate) fn set_primary(&mut self, predicate: Option<FilterFn<T>>) {
        self.primary = predicate;
    }

    /// Installs or replaces the clause named `clause.name()`.
    ///
    /// A replaced clause keeps its position among the other clauses.
    pub fn add_clause(&mut self, clause: FilterClause<T>) {
        match self.clauses.iter_mut().find(|c| c.name == clause.name) {
            Some(existing) => *existing = clause,
            None => self.clauses.push(clause),
        }
    }

    /// Removes the clause named `name`. Returns `false` if there was none.
    pub fn remove_clause(&mut self, name: &str) -> bool {
        let before = self.clauses.len();
        self.clauses.retain(|c| c.name != name);
        self.clauses.len() != before
    }

    /// Names of the installed clauses, in evaluation order.
    pub fn clause_names(&self) -> Vec<String> {
        self.clauses.iter().map(|c| c.name.clone()).collect()
    }

    /// Removes the primary predicate and every clause.
    pub fn clear(&mut self) {
        self.primary = None;
        self.clauses.clear();
    }

    /// Returns `true` if `item` passes the primary predicate and all clauses.
    pub fn passes(&self, item: &T) -> bool {
        self.primary.as_ref().is_none_or(|p| p(item)) && self.clauses.iter().all(|c| c.accepts(item))
    }
}

impl<T> fmt::Debug for FilterSpec<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FilterSpec")
            .field("primary", &self.primary.is_some())
            .field("clauses", &self.clauses)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_spec_accepts_everything() {
        let spec = FilterSpec::<i32>::new();
        assert!(spec.is_empty());
        assert!(spec.passes(&-7));
    }

    #[test]
    fn test_clauses_are_anded() {
        let mut spec = FilterSpec::with_predicate(|n: &i32| *n > 0);
        spec.add_clause(FilterClause::new("even", |n: &i32| n % 2 == 0));

        assert!(spec.passes(&4));
        assert!(!spec.passes(&3));
        assert!(!spec.passes(&-2));
    }

    #[test]
    fn test_clause_replaced_in_place() {
        let mut spec = FilterSpec::<i32>::new();
        spec.add_clause(FilterClause::new("a", |_| true));
        spec.add_clause(FilterClause::new("b", |_| true));
        spec.add_clause(FilterClause::new("a", |n: &i32| *n < 10));

        assert_eq!(spec.clause_names(), vec!["a", "b"]);
        assert!(!spec.passes(&11));
    }

    #[test]
    fn test_remove_clause() {
        let mut spec = FilterSpec::<i32>::new();
        spec.add_clause(FilterClause::new("small", |n: &i32| *n < 10));

        assert!(spec.remove_clause("small"));
        assert!(!spec.remove_clause("small"));
        assert!(spec.passes(&100));
    }
}
