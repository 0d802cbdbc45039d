//! Deferred refresh scopes.

use super::collection_view::CollectionView;

/// Refresh bookkeeping while one or more [`DeferGuard`]s are alive.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub(crate) struct DeferState {
    depth: usize,
    needs_refresh: bool,
    cached_page_size: Option<usize>,
    cached_page_move: Option<isize>,
}

/// Requests cached during deferral, applied when the last guard drops.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub(crate) struct CachedRequests {
    pub(crate) page_size: Option<usize>,
    pub(crate) page_move: Option<isize>,
}

impl DeferState {
    pub(crate) fn is_deferred(&self) -> bool {
        self.depth > 0
    }

    pub(crate) fn needs_refresh(&self) -> bool {
        self.needs_refresh
    }

    pub(crate) fn mark_needs_refresh(&mut self) {
        self.needs_refresh = true;
    }

    pub(crate) fn clear_needs_refresh(&mut self) {
        self.needs_refresh = false;
    }

    pub(crate) fn enter(&mut self) {
        self.depth += 1;
    }

    /// Leaves one scope. Returns the cached requests once the outermost
    /// scope is left.
    pub(crate) fn leave(&mut self) -> Option<CachedRequests> {
        self.depth = self.depth.saturating_sub(1);
        if self.depth > 0 {
            return None;
        }
        Some(CachedRequests {
            page_size: self.cached_page_size.take(),
            page_move: self.cached_page_move.take(),
        })
    }

    pub(crate) fn cache_page_size(&mut self, page_size: usize) {
        self.cached_page_size = Some(page_size);
    }

    pub(crate) fn cache_page_move(&mut self, page_index: isize) {
        self.cached_page_move = Some(page_index);
    }
}

/// Keeps a view's refresh deferred until dropped.
///
/// Created by [`CollectionView::defer_refresh`]. Guards nest; the view
/// applies the cached changes and refreshes at most once when the outermost
/// guard is dropped.
#[must_use = "the refresh is released as soon as the guard is dropped"]
pub struct DeferGuard<T: Clone + PartialEq + Send + Sync + 'static> {
    view: CollectionView<T>,
}

impl<T: Clone + PartialEq + Send + Sync + 'static> DeferGuard<T> {
    pub(crate) fn new(view: CollectionView<T>) -> Self {
        Self { view }
    }
}

impl<T: Clone + PartialEq + Send + Sync + 'static> std::fmt::Debug for DeferGuard<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeferGuard").finish_non_exhaustive()
    }
}

impl<T: Clone + PartialEq + Send + Sync + 'static> Drop for DeferGuard<T> {
    fn drop(&mut self) {
        self.view.end_defer();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_nested_scopes_release_once() {
        let mut state = DeferState::default();
        state.enter();
        state.enter();
        state.cache_page_size(5);
        state.cache_page_move(2);

        assert!(state.leave().is_none());
        assert!(state.is_deferred());

        let cached = state.leave().unwrap();
        assert_eq!(cached.page_size, Some(5));
        assert_eq!(cached.page_move, Some(2));
        assert!(!state.is_deferred());
    }

    #[test]
    fn test_later_requests_win() {
        let mut state = DeferState::default();
        state.enter();
        state.cache_page_move(1);
        state.cache_page_move(3);
        assert_eq!(state.leave().unwrap().page_move, Some(3));
    }
}
