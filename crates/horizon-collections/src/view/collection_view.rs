//! The collection view engine.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

use horizon_collections_core::logging::{span_names, targets};
use horizon_collections_core::{PerfSpan, Result, ViewError};
use parking_lot::Mutex;
use slotmap::SecondaryMap;

use super::config::ViewConfig;
use super::currency::Currency;
use super::defer::{DeferGuard, DeferState};
use super::filter::{FilterClause, FilterSpec};
use super::group::{key_path, GroupDescription, GroupTree, ViewGroup};
use super::notify::{diff_windows, ChangeNotifier, CurrentChanging, Notice, PageChanging, ViewChange, ViewSignals};
use super::pager::Pager;
use super::pipeline::{ItemKey, Pipeline};
use super::sort::{MergedComparator, SortDescription};
use super::source::{ItemSource, ReentrancyMonitor, SourceAdapter, SourceChange};
use super::transaction::{EditHook, EditSession, FinishedSession, ItemFactory, SessionOutcome, Transaction};

/// Everything a view knows, guarded by one lock.
struct ViewState<T: 'static> {
    adapter: SourceAdapter<T>,
    config: ViewConfig,
    filter: FilterSpec<T>,
    sort: MergedComparator<T>,
    groups: Vec<GroupDescription<T>>,
    pipeline: Pipeline<T>,
    /// The grouping the view exposes: the whole list when unpaged, the
    /// current page when paged.
    display: Option<GroupTree>,
    /// Grouping of the whole list, kept only while paged.
    shadow: Option<GroupTree>,
    pager: Pager,
    visible: Vec<ItemKey>,
    transaction: Transaction,
    defer: DeferState,
    notifier: ChangeNotifier,
    currency: Currency,
    generation: u64,
    /// Items removed by the operation in progress, for their notifications.
    departed: Vec<(ItemKey, T)>,
    /// Edit sessions to close once the lock is released.
    finished: Vec<FinishedSession>,
    factory: Option<ItemFactory<T>>,
    edit_hook: Option<EditHook<T>>,
}

impl<T: Clone + PartialEq + Send + Sync + 'static> ViewState<T> {
    fn source(&self) -> &dyn ItemSource<T> {
        self.adapter.source()
    }

    fn item_of(&self, key: ItemKey) -> Option<T> {
        self.pipeline.item(key).cloned().or_else(|| {
            self.departed
                .iter()
                .find(|(k, _)| *k == key)
                .map(|(_, item)| item.clone())
        })
    }

    fn total(&self) -> usize {
        self.pipeline.internal_len() + usize::from(self.transaction.is_adding())
    }

    fn page_count(&self) -> usize {
        self.pager.page_count(self.total())
    }

    fn is_growable(&self) -> bool {
        let source = self.source();
        !source.is_read_only() && !source.is_fixed_size()
    }

    fn ensure_not_deferred(&self, operation: &'static str) -> Result<()> {
        if self.defer.is_deferred() {
            Err(ViewError::InvalidWhileDeferred(operation))
        } else {
            Ok(())
        }
    }

    fn ensure_idle(&self, operation: &'static str) -> Result<()> {
        if self.transaction.is_adding() {
            Err(ViewError::InvalidDuringTransaction(operation))
        } else {
            Ok(())
        }
    }

    /// Rebuilds after unannounced source changes.
    fn sync(&mut self, out: &mut Vec<Notice<T>>) {
        if self.adapter.poll_stale() {
            self.on_source_reset(out);
        }
    }

    // -------------------------------------------------------------------------
    // Windowing
    // -------------------------------------------------------------------------

    /// The visible keys, excluding the provisional item.
    fn base_window(&self) -> Vec<ItemKey> {
        let provisional = self.transaction.key();
        let range = self
            .pager
            .window(self.pipeline.internal_len(), provisional.is_some());
        match (&self.shadow, &self.display) {
            (Some(shadow), _) => shadow.leaf_range(range.start, range.len()),
            (None, Some(display)) => display
                .leaves()
                .into_iter()
                .filter(|key| Some(*key) != provisional)
                .skip(range.start)
                .take(range.len())
                .collect(),
            (None, None) => self.pipeline.internal()[range].to_vec(),
        }
    }

    /// The visible keys. The provisional item is always the last one.
    fn compute_visible(&self) -> Vec<ItemKey> {
        let mut visible = self.base_window();
        visible.extend(self.transaction.key());
        visible
    }

    fn settle(&mut self, out: &mut Vec<Notice<T>>) {
        let page_count = self.page_count();
        self.notifier.settle(self.visible.len(), page_count, out);
    }

    // -------------------------------------------------------------------------
    // Grouping
    // -------------------------------------------------------------------------

    /// Rebuilds the display tree, and the shadow tree when `with_shadow` is
    /// set or none exists yet.
    fn regroup(&mut self, with_shadow: bool) {
        if self.groups.is_empty() {
            self.display = None;
            self.shadow = None;
            return;
        }
        let _span = PerfSpan::new(span_names::REGROUP);
        let in_group_order = self.config.is_data_in_group_order;

        if self.pager.is_paged() {
            if with_shadow || self.shadow.is_none() {
                let pipeline = &self.pipeline;
                self.shadow = Some(GroupTree::build(
                    &self.groups,
                    pipeline.internal(),
                    |key| pipeline.item(key).cloned(),
                    in_group_order,
                ));
            }
            let window = self.base_window();
            let pipeline = &self.pipeline;
            self.display = Some(GroupTree::build(
                &self.groups,
                &window,
                |key| pipeline.item(key).cloned(),
                false,
            ));
        } else {
            self.shadow = None;
            let pipeline = &self.pipeline;
            self.display = Some(GroupTree::build(
                &self.groups,
                pipeline.internal(),
                |key| pipeline.item(key).cloned(),
                in_group_order,
            ));
        }

        if let (Some(display), Some(key)) = (&mut self.display, self.transaction.key()) {
            display.insert_special(key);
        }
        tracing::debug!(
            target: targets::GROUP,
            depth = self.groups.len(),
            paged = self.pager.is_paged(),
            "group trees rebuilt"
        );
    }

    /// The tree that mirrors the internal list: the shadow tree when paged,
    /// the display tree otherwise.
    fn full_tree(&mut self) -> Option<&mut GroupTree> {
        if self.pager.is_paged() {
            self.shadow.as_mut()
        } else {
            self.display.as_mut()
        }
    }

    fn tree_insert(&mut self, key: ItemKey) {
        if self.groups.is_empty() {
            return;
        }
        let Some(path) = self.pipeline.item(key).map(|item| key_path(&self.groups, item)) else {
            return;
        };
        let ranks = self.pipeline.ranks();
        let Some(rank) = ranks.get(key).copied() else {
            return;
        };
        let rank_of = |k: ItemKey| ranks.get(k).copied().unwrap_or(usize::MAX);
        if let Some(tree) = self.full_tree() {
            tree.insert(&path, key, rank, &rank_of);
        }
    }

    fn tree_remove(&mut self, key: ItemKey, item: &T) {
        if self.groups.is_empty() {
            return;
        }
        let path = key_path(&self.groups, item);
        let ranks = self.pipeline.ranks();
        let rank_of = |k: ItemKey| ranks.get(k).copied().unwrap_or(usize::MAX);
        if let Some(tree) = self.full_tree() {
            tree.remove(&path, key, &rank_of);
        }
    }

    /// Moves the provisional leaf in or out of the unpaged display tree.
    /// Paged display trees follow the visible window instead.
    fn set_special_leaf(&mut self, key: ItemKey, present: bool) {
        if self.pager.is_paged() {
            return;
        }
        if let Some(display) = &mut self.display {
            if present {
                display.insert_special(key);
            } else {
                let ranks = self.pipeline.ranks();
                let rank_of = |k: ItemKey| ranks.get(k).copied().unwrap_or(usize::MAX);
                display.remove(&[], key, &rank_of);
            }
        }
    }

    // -------------------------------------------------------------------------
    // Publishing changes
    // -------------------------------------------------------------------------

    /// Replaces the visible items wholesale and announces a reset.
    fn reset_view(&mut self, with_shadow: bool, out: &mut Vec<Notice<T>>) {
        let current = self.currency.key().and_then(|key| self.item_of(key));
        let page_moved = self.pager.clamp(self.total());

        self.regroup(with_shadow);
        self.visible = self.compute_visible();
        self.generation += 1;
        self.departed.clear();

        out.push(Notice::Change(ViewChange::Reset));
        if page_moved {
            out.push(Notice::PageChanged(self.pager.page_index()));
        }
        let survivor = current.and_then(|item| {
            self.visible
                .iter()
                .position(|key| self.pipeline.item(*key) == Some(&item))
        });
        self.currency.reset(&self.visible, survivor, out);
        self.settle(out);
    }

    /// Announces the difference between the old and the new visible items.
    fn publish(&mut self, out: &mut Vec<Notice<T>>) {
        let visible = self.compute_visible();

        if visible.is_empty() && self.pager.is_paged() && self.pager.page_index() > 0 {
            tracing::debug!(
                target: targets::PAGER,
                page = self.pager.page_index(),
                "current page emptied, moving back"
            );
            let before = self.pager.page_index();
            if !self.pager.clamp(self.total()) {
                self.pager.set_index(before - 1);
            }
            self.reset_view(false, out);
            out.push(Notice::PageChanged(self.pager.page_index()));
            return;
        }

        let diff = diff_windows(&self.visible, &visible);

        if self.pager.is_paged() && !diff.is_empty() {
            if let Some(mut display) = self.display.take() {
                let ranks: SecondaryMap<ItemKey, usize> =
                    visible.iter().enumerate().map(|(rank, key)| (*key, rank)).collect();
                let rank_of = |k: ItemKey| ranks.get(k).copied().unwrap_or(usize::MAX);
                for (_, key) in &diff.removed {
                    let path = self
                        .item_of(*key)
                        .map(|item| key_path(&self.groups, &item))
                        .unwrap_or_default();
                    display.remove(&path, *key, &rank_of);
                }
                for (index, key) in &diff.added {
                    if Some(*key) == self.transaction.key() {
                        display.insert_special(*key);
                    } else if let Some(item) = self.pipeline.item(*key) {
                        display.insert(&key_path(&self.groups, item), *key, *index, &rank_of);
                    }
                }
                self.display = Some(display);
            }
        }

        for (index, key) in &diff.removed {
            if let Some(item) = self.item_of(*key) {
                out.push(Notice::Change(ViewChange::Removed { item, index: *index }));
            }
        }
        for (index, key) in &diff.added {
            if let Some(item) = self.item_of(*key) {
                out.push(Notice::Change(ViewChange::Added { item, index: *index }));
            }
        }

        self.currency.follow(&visible, &diff, out);
        if !diff.is_empty() {
            self.generation += 1;
        }
        self.visible = visible;
        self.departed.clear();
        debug_assert!(self.trees_consistent());
        self.settle(out);
    }

    fn trees_consistent(&self) -> bool {
        let shadow_ok = self
            .shadow
            .as_ref()
            .is_none_or(|tree| tree.counts_consistent() && tree.item_count() == self.pipeline.internal_len());
        let display_ok = self.display.as_ref().is_none_or(GroupTree::counts_consistent);
        shadow_ok && display_ok
    }

    // -------------------------------------------------------------------------
    // Refresh
    // -------------------------------------------------------------------------

    /// Rebuilds everything from the source.
    fn refresh(&mut self, out: &mut Vec<Notice<T>>) {
        let _span = PerfSpan::new(span_names::REFRESH);
        if let Some(pending) = self.transaction.take() {
            tracing::debug!(target: targets::TRANSACTION, "refresh closes the add-new transaction");
            self.finished.extend(pending.finish(SessionOutcome::Ended));
        }

        let items = self.source().to_vec();
        self.pipeline
            .rebuild(items, &self.filter, &self.sort, self.config.is_data_sorted);
        self.defer.clear_needs_refresh();
        self.adapter.mark_synced();
        self.reset_view(true, out);

        tracing::debug!(
            target: targets::VIEW,
            source = self.pipeline.source_len(),
            filtered = self.pipeline.internal_len(),
            visible = self.visible.len(),
            "view refreshed"
        );
    }

    fn refresh_or_defer(&mut self, out: &mut Vec<Notice<T>>) {
        if self.defer.is_deferred() {
            self.defer.mark_needs_refresh();
        } else {
            self.refresh(out);
        }
    }

    /// Shows page `page_index`. Refused while adding, and left to the pending
    /// refresh when one is due.
    fn apply_page_move(&mut self, page_index: isize, out: &mut Vec<Notice<T>>) -> bool {
        if self.transaction.is_adding() {
            tracing::debug!(target: targets::PAGER, "page move refused while adding");
            out.push(Notice::PageChanged(self.pager.page_index()));
            return false;
        }
        let total = self.total();
        if !self.pager.accepts(page_index, total) {
            return false;
        }

        let _span = PerfSpan::new(span_names::PAGE_MOVE);
        let from = self.pager.page_index();
        self.pager.set_index(page_index);
        tracing::debug!(target: targets::PAGER, from, to = page_index, "moved to page");
        if !self.defer.needs_refresh() {
            self.reset_view(false, out);
        }
        out.push(Notice::PageChanged(page_index));
        true
    }

    fn apply_page_size(&mut self, page_size: usize, immediate: bool, out: &mut Vec<Notice<T>>) {
        if page_size == self.pager.page_size() {
            return;
        }
        let total = self.total();
        let index_changed = self.pager.resize(page_size, total);
        tracing::debug!(target: targets::PAGER, page_size, page = self.pager.page_index(), "page size changed");

        if immediate {
            self.reset_view(true, out);
        } else {
            self.defer.mark_needs_refresh();
        }
        if index_changed {
            out.push(Notice::PageChanged(self.pager.page_index()));
        }
    }

    // -------------------------------------------------------------------------
    // Source changes
    // -------------------------------------------------------------------------

    fn apply_source_change(&mut self, change: &SourceChange<T>, out: &mut Vec<Notice<T>>) {
        if self.defer.is_deferred() {
            self.defer.mark_needs_refresh();
            return;
        }
        if self.defer.needs_refresh() {
            self.refresh(out);
            return;
        }

        match change {
            SourceChange::Added { item, index } => {
                if *index > self.pipeline.source_len() {
                    self.refresh(out);
                    return;
                }
                self.insert_entry(*index, item.clone());
                self.publish(out);
            }
            SourceChange::Removed { index, .. } => {
                if self.remove_entry(*index) {
                    self.publish(out);
                } else {
                    self.refresh(out);
                }
            }
            SourceChange::Replaced { new, index, .. } => {
                let provisional = self.transaction.key();
                match self.pipeline.key_at_source(*index) {
                    Some(key) if Some(key) == provisional => {
                        self.replace_provisional(key, new.clone());
                        self.publish(out);
                    }
                    Some(_) => {
                        self.remove_entry(*index);
                        self.insert_entry(*index, new.clone());
                        self.publish(out);
                    }
                    None => self.refresh(out),
                }
            }
            SourceChange::Reset => self.on_source_reset(out),
        }
    }

    fn on_source_reset(&mut self, out: &mut Vec<Notice<T>>) {
        tracing::debug!(target: targets::SOURCE, "source reset");
        self.refresh_or_defer(out);
    }

    /// Swaps in a new value for the provisional item under a fresh key, so
    /// the window diff announces the old value leaving and the new one
    /// arriving at the same position.
    fn replace_provisional(&mut self, key: ItemKey, item: T) {
        let Some(old) = self.pipeline.item_mut(key).map(|slot| std::mem::replace(slot, item)) else {
            return;
        };
        self.set_special_leaf(key, false);
        let Some(fresh) = self.pipeline.rekey(key) else {
            return;
        };
        self.departed.push((key, old));
        self.transaction.rekey(fresh);
        self.currency.rekey(key, fresh);
        self.set_special_leaf(fresh, true);
    }

    /// Records a source insertion and places the item if it passes the
    /// filter.
    fn insert_entry(&mut self, index: usize, item: T) {
        let key = self.pipeline.insert_source(index, item);
        if self.pipeline.admit(key, &self.filter, &self.sort).is_some() {
            self.tree_insert(key);
        }
    }

    /// Forgets the item at source position `index`. Returns `false` if the
    /// view did not know that position.
    fn remove_entry(&mut self, index: usize) -> bool {
        let Some((key, item)) = self.pipeline.remove_source(index) else {
            return false;
        };
        if self.transaction.key() == Some(key) {
            tracing::debug!(target: targets::TRANSACTION, "provisional item left the source");
            if let Some(pending) = self.transaction.take() {
                self.finished.extend(pending.finish(SessionOutcome::Canceled));
            }
            self.set_special_leaf(key, false);
        } else {
            self.tree_remove(key, &item);
        }
        self.departed.push((key, item));
        true
    }

    // -------------------------------------------------------------------------
    // Removal
    // -------------------------------------------------------------------------

    fn removal_target(&self, key: ItemKey) -> Result<Removal<T>> {
        let item = self
            .pipeline
            .item(key)
            .cloned()
            .ok_or(ViewError::UnsupportedOperation("remove an item the view does not hold"))?;
        if self.transaction.key() == Some(key) {
            return Ok(Removal::Provisional(item));
        }
        self.ensure_idle("remove")?;
        if !self.is_growable() {
            return Err(ViewError::UnsupportedOperation("remove from a read-only or fixed-size source"));
        }
        let index = self
            .pipeline
            .source_index(key)
            .ok_or(ViewError::UnsupportedOperation("remove an item the view does not hold"))?;
        Ok(Removal::Source { index, item })
    }
}

enum Removal<T> {
    Provisional(T),
    Source { index: usize, item: T },
}

struct ViewInner<T: 'static> {
    state: Mutex<ViewState<T>>,
    signals: ViewSignals<T>,
    monitor: ReentrancyMonitor,
    source: Arc<dyn ItemSource<T>>,
    page_changing: AtomicBool,
}

/// A filtered, sorted, grouped and paged projection of an [`ItemSource`].
///
/// `CollectionView` is a cheap handle; clones share the same view. All
/// operations run synchronously on the calling thread. Signals are emitted
/// after the view's internal lock is released, so slots may call back into
/// the view.
///
/// # Example
///
/// ```
/// use std::sync::Arc;
/// use horizon_collections::view::{CollectionView, ObservableList, SortDescription, SortDirection};
///
/// let source = Arc::new(ObservableList::new(vec![3, 1, 2]));
/// let view = CollectionView::new(source.clone());
/// assert_eq!(view.item_at(0).unwrap(), 3);
///
/// view.set_sort_descriptions(vec![SortDescription::by_key("value", |n: &i32| *n, SortDirection::Ascending)])
///     .unwrap();
/// assert_eq!(view.snapshot().unwrap(), vec![1, 2, 3]);
///
/// view.set_page_size(2).unwrap();
/// view.move_to_next_page().unwrap();
/// assert_eq!(view.snapshot().unwrap(), vec![3]);
/// ```
pub struct CollectionView<T: 'static> {
    inner: Arc<ViewInner<T>>,
}

impl<T: 'static> Clone for CollectionView<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T: Clone + PartialEq + Send + Sync + 'static> std::fmt::Debug for CollectionView<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.inner.state.lock();
        f.debug_struct("CollectionView")
            .field("visible", &state.visible.len())
            .field("notifying_source", &state.adapter.is_notifying())
            .field("page_size", &state.pager.page_size())
            .field("page_index", &state.pager.page_index())
            .field("transaction", &state.transaction)
            .finish_non_exhaustive()
    }
}

impl<T: Clone + PartialEq + Send + Sync + 'static> CollectionView<T> {
    /// Creates an unfiltered, unsorted, ungrouped, unpaged view of `source`.
    pub fn new<S: ItemSource<T> + 'static>(source: Arc<S>) -> Self {
        CollectionViewBuilder::new(source).build()
    }

    /// Starts building a view of `source`.
    pub fn builder<S: ItemSource<T> + 'static>(source: Arc<S>) -> CollectionViewBuilder<T> {
        CollectionViewBuilder::new(source)
    }

    fn from_builder(builder: CollectionViewBuilder<T>) -> Self {
        let CollectionViewBuilder {
            source,
            config,
            filter,
            sort,
            groups,
            factory,
            edit_hook,
        } = builder;

        let inner = Arc::new_cyclic(|weak: &Weak<ViewInner<T>>| {
            let weak = weak.clone();
            let adapter = SourceAdapter::connect(Arc::clone(&source), move |change| {
                let Some(inner) = weak.upgrade() else {
                    return;
                };
                if inner.monitor.is_busy() {
                    return;
                }
                CollectionView { inner }.on_source_change(change);
            });

            let mut state = ViewState {
                adapter,
                pager: Pager::new(config.page_size),
                config,
                filter,
                sort: MergedComparator::new(sort),
                groups,
                pipeline: Pipeline::default(),
                display: None,
                shadow: None,
                visible: Vec::new(),
                transaction: Transaction::Idle,
                defer: DeferState::default(),
                notifier: ChangeNotifier::new(0, 0),
                currency: Currency::default(),
                generation: 0,
                departed: Vec::new(),
                finished: Vec::new(),
                factory,
                edit_hook,
            };
            // Nobody is connected yet; the initial notices go nowhere.
            state.refresh(&mut Vec::new());

            ViewInner {
                state: Mutex::new(state),
                signals: ViewSignals::new(),
                monitor: ReentrancyMonitor::default(),
                source,
                page_changing: AtomicBool::new(false),
            }
        });

        Self { inner }
    }

    /// Runs `f` under the state lock after picking up unannounced source
    /// changes, then dispatches the queued notices.
    fn with_state<R>(&self, f: impl FnOnce(&mut ViewState<T>, &mut Vec<Notice<T>>) -> R) -> R {
        self.run(true, f)
    }

    /// Like [`with_state`](Self::with_state), after the view itself wrote
    /// to the source: the source's current version is accepted as seen.
    fn after_write<R>(&self, f: impl FnOnce(&mut ViewState<T>, &mut Vec<Notice<T>>) -> R) -> R {
        self.run(false, f)
    }

    fn run<R>(&self, poll: bool, f: impl FnOnce(&mut ViewState<T>, &mut Vec<Notice<T>>) -> R) -> R {
        let mut out = Vec::new();
        let (result, finished) = {
            let mut state = self.inner.state.lock();
            if poll {
                state.sync(&mut out);
            } else {
                state.adapter.mark_synced();
            }
            let result = f(&mut state, &mut out);
            (result, std::mem::take(&mut state.finished))
        };
        for session in finished {
            session.close();
        }
        self.inner.signals.dispatch(out);
        result
    }

    /// Writes to the source without translating its notifications back.
    fn write_source<R>(&self, write: impl FnOnce(&dyn ItemSource<T>) -> Result<R>) -> Result<R> {
        let _busy = self.inner.monitor.enter();
        write(self.inner.source.as_ref())
    }

    fn on_source_change(&self, change: &SourceChange<T>) {
        self.with_state(|state, out| state.apply_source_change(change, out));
    }

    // -------------------------------------------------------------------------
    // Access
    // -------------------------------------------------------------------------

    /// The view's signals.
    pub fn signals(&self) -> &ViewSignals<T> {
        &self.inner.signals
    }

    /// The source this view projects.
    pub fn source(&self) -> Arc<dyn ItemSource<T>> {
        Arc::clone(&self.inner.source)
    }

    /// The view's configuration.
    pub fn config(&self) -> ViewConfig {
        self.with_state(|state, _| state.config.clone())
    }

    /// Number of visible items.
    pub fn count(&self) -> Result<usize> {
        self.with_state(|state, _| -> Result<usize> {
            state.ensure_not_deferred("count")?;
            Ok(state.visible.len())
        })
    }

    /// Returns `true` if no item is visible.
    pub fn is_empty(&self) -> bool {
        self.with_state(|state, _| state.visible.is_empty())
    }

    /// The visible item at `index`.
    pub fn item_at(&self, index: usize) -> Result<T> {
        self.with_state(|state, _| -> Result<T> {
            state.ensure_not_deferred("item_at")?;
            state
                .visible
                .get(index)
                .and_then(|key| state.pipeline.item(*key).cloned())
                .ok_or(ViewError::out_of_range(index, state.visible.len()))
        })
    }

    /// Visible position of `item`, or `None` if it is not visible.
    pub fn index_of(&self, item: &T) -> Result<Option<usize>> {
        self.with_state(|state, _| -> Result<Option<usize>> {
            state.ensure_not_deferred("index_of")?;
            Ok(state
                .visible
                .iter()
                .position(|key| state.pipeline.item(*key) == Some(item)))
        })
    }

    /// Returns `true` if `item` is visible.
    pub fn contains(&self, item: &T) -> bool {
        self.with_state(|state, _| {
            state
                .visible
                .iter()
                .any(|key| state.pipeline.item(*key) == Some(item))
        })
    }

    /// Copies the visible items.
    pub fn snapshot(&self) -> Result<Vec<T>> {
        self.with_state(|state, _| -> Result<Vec<T>> {
            state.ensure_not_deferred("snapshot")?;
            Ok(state
                .visible
                .iter()
                .filter_map(|key| state.pipeline.item(*key).cloned())
                .collect())
        })
    }

    /// Enumerates the visible items.
    ///
    /// The enumerator reads the view lazily. Once the visible items change,
    /// its next step yields [`ViewError::StaleEnumerator`] and it ends.
    pub fn iter(&self) -> Result<ViewIter<T>> {
        let generation = self.with_state(|state, _| -> Result<u64> {
            state.ensure_not_deferred("iter")?;
            Ok(state.generation)
        })?;
        Ok(ViewIter {
            view: self.clone(),
            generation,
            index: 0,
            finished: false,
        })
    }

    /// Number of items passing the filter on all pages, including a
    /// provisional item.
    pub fn total_item_count(&self) -> usize {
        self.with_state(|state, _| state.total())
    }

    // -------------------------------------------------------------------------
    // Filtering, sorting, grouping
    // -------------------------------------------------------------------------

    /// Applies a change to the filter, sort or group specs and refreshes.
    fn change_spec<R>(
        &self,
        operation: &'static str,
        allowed: fn(&ViewConfig) -> bool,
        change: impl FnOnce(&mut ViewState<T>) -> (R, bool),
    ) -> Result<R> {
        self.with_state(|state, out| -> Result<R> {
            state.ensure_idle(operation)?;
            if !allowed(&state.config) {
                return Err(ViewError::UnsupportedOperation(operation));
            }
            let (result, changed) = change(state);
            if changed {
                state.refresh_or_defer(out);
            }
            Ok(result)
        })
    }

    /// Installs the primary filter predicate.
    pub fn set_filter<F>(&self, predicate: F) -> Result<()>
    where
        F: Fn(&T) -> bool + Send + Sync + 'static,
    {
        self.change_spec("set_filter", |c| c.can_filter, |state| {
            state.filter.set_primary(Some(Arc::new(predicate)));
            ((), true)
        })
    }

    /// Removes the primary predicate and every filter clause.
    pub fn clear_filter(&self) -> Result<()> {
        self.change_spec("clear_filter", |c| c.can_filter, |state| {
            let changed = !state.filter.is_empty();
            state.filter.clear();
            ((), changed)
        })
    }

    /// Installs a named filter clause, replacing one with the same name.
    pub fn add_filter_clause<F>(&self, name: impl Into<String>, predicate: F) -> Result<()>
    where
        F: Fn(&T) -> bool + Send + Sync + 'static,
    {
        self.change_spec("add_filter_clause", |c| c.can_filter, |state| {
            state.filter.add_clause(FilterClause::new(name, predicate));
            ((), true)
        })
    }

    /// Removes the filter clause named `name`.
    pub fn remove_filter_clause(&self, name: &str) -> Result<bool> {
        self.change_spec("remove_filter_clause", |c| c.can_filter, |state| {
            let removed = state.filter.remove_clause(name);
            (removed, removed)
        })
    }

    /// Names of the installed filter clauses.
    pub fn filter_clause_names(&self) -> Vec<String> {
        self.with_state(|state, _| state.filter.clause_names())
    }

    /// Returns `true` if any filter predicate is installed.
    pub fn has_filter(&self) -> bool {
        self.with_state(|state, _| !state.filter.is_empty())
    }

    /// Replaces the sort levels.
    pub fn set_sort_descriptions(&self, levels: Vec<SortDescription<T>>) -> Result<()> {
        self.change_spec("set_sort_descriptions", |c| c.can_sort, |state| {
            state.sort = MergedComparator::new(levels);
            ((), true)
        })
    }

    /// Appends a sort level.
    pub fn add_sort_description(&self, level: SortDescription<T>) -> Result<()> {
        self.change_spec("add_sort_description", |c| c.can_sort, |state| {
            let mut levels = state.sort.levels().to_vec();
            levels.push(level);
            state.sort = MergedComparator::new(levels);
            ((), true)
        })
    }

    /// Removes every sort level.
    pub fn clear_sort(&self) -> Result<()> {
        self.change_spec("clear_sort", |c| c.can_sort, |state| {
            let changed = state.sort.is_active();
            state.sort = MergedComparator::default();
            ((), changed)
        })
    }

    /// The active sort levels.
    pub fn sort_descriptions(&self) -> Vec<SortDescription<T>> {
        self.with_state(|state, _| state.sort.levels().to_vec())
    }

    /// Replaces the group levels.
    pub fn set_group_descriptions(&self, levels: Vec<GroupDescription<T>>) -> Result<()> {
        self.change_spec("set_group_descriptions", |c| c.can_group, |state| {
            state.groups = levels;
            ((), true)
        })
    }

    /// Appends a group level.
    pub fn add_group_description(&self, level: GroupDescription<T>) -> Result<()> {
        self.change_spec("add_group_description", |c| c.can_group, |state| {
            state.groups.push(level);
            ((), true)
        })
    }

    /// Removes every group level.
    pub fn clear_group_descriptions(&self) -> Result<()> {
        self.change_spec("clear_group_descriptions", |c| c.can_group, |state| {
            let changed = !state.groups.is_empty();
            state.groups.clear();
            ((), changed)
        })
    }

    /// The active group levels.
    pub fn group_descriptions(&self) -> Vec<GroupDescription<T>> {
        self.with_state(|state, _| state.groups.clone())
    }

    /// Returns `true` if at least one group level is active.
    pub fn is_grouping(&self) -> bool {
        self.with_state(|state, _| !state.groups.is_empty())
    }

    /// Number of group levels.
    pub fn grouping_depth(&self) -> usize {
        self.with_state(|state, _| state.groups.len())
    }

    /// A snapshot of the visible group tree, or `None` when not grouping.
    pub fn groups(&self) -> Option<ViewGroup<T>> {
        self.with_state(|state, _| {
            let display = state.display.as_ref()?;
            Some(display.snapshot(&|key| state.pipeline.item(key).cloned()))
        })
    }

    // -------------------------------------------------------------------------
    // Refresh
    // -------------------------------------------------------------------------

    /// Rebuilds the view from its source. While deferred, the rebuild waits
    /// for the last [`DeferGuard`].
    pub fn refresh(&self) -> Result<()> {
        self.with_state(|state, out| -> Result<()> {
            state.ensure_idle("refresh")?;
            state.refresh_or_defer(out);
            Ok(())
        })
    }

    /// Returns `true` if a refresh is pending.
    pub fn needs_refresh(&self) -> bool {
        self.with_state(|state, _| state.defer.needs_refresh())
    }

    /// Returns `true` while a [`DeferGuard`] is alive.
    pub fn is_refresh_deferred(&self) -> bool {
        self.with_state(|state, _| state.defer.is_deferred())
    }

    /// Defers refreshes until the returned guard, and every guard nested in
    /// it, is dropped.
    ///
    /// # Example
    ///
    /// ```
    /// use std::sync::Arc;
    /// use horizon_collections::view::{CollectionView, FixedList};
    ///
    /// let view = CollectionView::new(Arc::new(FixedList::new(vec![1, 2, 3, 4])));
    /// {
    ///     let _defer = view.defer_refresh().unwrap();
    ///     view.set_filter(|n: &i32| n % 2 == 0).unwrap();
    ///     view.add_filter_clause("big", |n: &i32| *n > 2).unwrap();
    ///     assert!(view.count().is_err());
    /// }
    /// assert_eq!(view.snapshot().unwrap(), vec![4]);
    /// ```
    pub fn defer_refresh(&self) -> Result<DeferGuard<T>> {
        self.with_state(|state, _| -> Result<()> {
            state.ensure_idle("defer_refresh")?;
            state.defer.enter();
            Ok(())
        })?;
        Ok(DeferGuard::new(self.clone()))
    }

    pub(crate) fn end_defer(&self) {
        let Some(cached) = self.with_state(|state, _| state.defer.leave()) else {
            return;
        };
        tracing::debug!(
            target: targets::VIEW,
            page_size = ?cached.page_size,
            page_move = ?cached.page_move,
            "releasing deferred refresh"
        );

        let mut page_notices = self.with_state(|state, _| {
            let mut notices = Vec::new();
            if let Some(page_size) = cached.page_size {
                state.apply_page_size(page_size, false, &mut notices);
            }
            notices
        });
        // A cached target was validated against -1 when it was requested.
        let page_move = cached
            .page_move
            .filter(|page_index| self.confirm_page_move(*page_index));
        self.with_state(|state, out| {
            if let Some(page_index) = page_move {
                state.apply_page_move(page_index, &mut page_notices);
            }
            if state.defer.needs_refresh() {
                state.refresh(out);
            }
            // page_changed listeners must see the refreshed page.
            out.append(&mut page_notices);
        });
    }

    // -------------------------------------------------------------------------
    // Paging
    // -------------------------------------------------------------------------

    /// Items per page; zero when unpaged.
    pub fn page_size(&self) -> usize {
        self.with_state(|state, _| state.pager.page_size())
    }

    /// Changes the page size. Zero disables paging.
    pub fn set_page_size(&self, page_size: usize) -> Result<()> {
        self.with_state(|state, out| -> Result<()> {
            state.ensure_idle("set_page_size")?;
            if state.defer.is_deferred() {
                state.defer.cache_page_size(page_size);
                return Ok(());
            }
            state.apply_page_size(page_size, true, out);
            Ok(())
        })
    }

    /// The current page, or `-1` when unpaged.
    pub fn page_index(&self) -> isize {
        self.with_state(|state, _| state.pager.page_index())
    }

    /// Number of pages; zero when unpaged.
    pub fn page_count(&self) -> usize {
        self.with_state(|state, _| state.page_count())
    }

    /// Returns `true` if the view is paged and no transaction blocks moves.
    pub fn can_change_page(&self) -> bool {
        self.with_state(|state, _| state.pager.is_paged() && !state.transaction.is_adding())
    }

    /// Returns `true` while `page_changing` slots run.
    pub fn is_page_changing(&self) -> bool {
        self.inner.page_changing.load(Ordering::SeqCst)
    }

    /// Moves to page `page_index`.
    ///
    /// Returns `Ok(false)` if the page does not exist, is already current,
    /// the move was vetoed, an add-new transaction is open, or a refresh is
    /// deferred (the move is then applied when the deferral ends).
    pub fn move_to_page(&self, page_index: isize) -> Result<bool> {
        if page_index < -1 {
            return Err(ViewError::invalid_selection(format!(
                "page index {page_index} is below -1"
            )));
        }
        let deferred = self.with_state(|state, _| {
            let deferred = state.defer.is_deferred();
            if deferred {
                state.defer.cache_page_move(page_index);
            }
            deferred
        });
        if deferred || !self.confirm_page_move(page_index) {
            return Ok(false);
        }
        Ok(self.with_state(|state, out| state.apply_page_move(page_index, out)))
    }

    /// Checks that `page_index` exists and gives `page_changing` slots the
    /// chance to veto the move.
    fn confirm_page_move(&self, page_index: isize) -> bool {
        let from = self.with_state(|state, _| {
            let total = state.total();
            state
                .pager
                .accepts(page_index, total)
                .then(|| state.pager.page_index())
        });
        let Some(from) = from else {
            return false;
        };

        let args = PageChanging::new(from, page_index);
        self.inner.page_changing.store(true, Ordering::SeqCst);
        self.inner.signals.page_changing.emit(args.clone());
        self.inner.page_changing.store(false, Ordering::SeqCst);
        if args.is_canceled() {
            tracing::debug!(target: targets::PAGER, from, to = page_index, "page move vetoed");
            return false;
        }
        true
    }

    /// Moves to the first page.
    pub fn move_to_first_page(&self) -> Result<bool> {
        self.move_to_page(0)
    }

    /// Moves to the last page.
    pub fn move_to_last_page(&self) -> Result<bool> {
        let last = self.page_count() as isize - 1;
        self.move_to_page(last.max(0))
    }

    /// Moves to the following page.
    pub fn move_to_next_page(&self) -> Result<bool> {
        self.move_to_page(self.page_index() + 1)
    }

    /// Moves to the preceding page.
    pub fn move_to_previous_page(&self) -> Result<bool> {
        let previous = self.page_index() - 1;
        if previous < 0 {
            return Ok(false);
        }
        self.move_to_page(previous)
    }

    // -------------------------------------------------------------------------
    // Add-new transaction
    // -------------------------------------------------------------------------

    /// Returns `true` if [`add_new`](Self::add_new) can succeed: the source
    /// can grow and an item factory is installed.
    pub fn can_add_new(&self) -> bool {
        self.with_state(|state, _| state.factory.is_some() && state.is_growable())
    }

    /// Returns `true` while a provisional item is pending.
    pub fn is_adding_new(&self) -> bool {
        self.with_state(|state, _| state.transaction.is_adding())
    }

    /// The provisional item, if any.
    pub fn new_item(&self) -> Option<T> {
        self.with_state(|state, _| {
            state
                .transaction
                .key()
                .and_then(|key| state.pipeline.item(key).cloned())
        })
    }

    /// Creates a provisional item, appends it to the source and shows it as
    /// the last visible item. A pending provisional item is committed first.
    pub fn add_new(&self) -> Result<T> {
        if self.is_adding_new() {
            self.commit_new()?;
        }

        let (factory, edit_hook, index) = self.with_state(|state, _| -> Result<(ItemFactory<T>, Option<EditHook<T>>, usize)> {
            state.ensure_not_deferred("add_new")?;
            let factory = state
                .factory
                .clone()
                .filter(|_| state.is_growable())
                .ok_or(ViewError::UnsupportedOperation(
                    "add new items without a growable source and an item factory",
                ))?;
            Ok((factory, state.edit_hook.clone(), state.source().len()))
        })?;

        let item = factory();
        self.write_source(|source| source.insert(index, item.clone()))?;
        let session = edit_hook.and_then(|hook| hook(&item));

        self.after_write(|state, out| {
            let key = state.pipeline.insert_source(index, item.clone());
            state.transaction = Transaction::begin(key, session);
            state.set_special_leaf(key, true);
            tracing::debug!(target: targets::TRANSACTION, index, "add-new transaction started");

            state.publish(out);
            let position = state.visible.iter().position(|k| *k == key);
            state.currency.set(&state.visible, position, out);
        });
        Ok(item)
    }

    /// Mutates the provisional item, writing it back to the source when the
    /// source accepts replacements.
    pub fn edit_new_item<F>(&self, edit: F) -> Result<()>
    where
        F: FnOnce(&mut T),
    {
        let (index, value, writable) = self.with_state(|state, _| -> Result<(usize, T, bool)> {
            let key = state
                .transaction
                .key()
                .ok_or_else(|| ViewError::invalid_selection("no new item is pending"))?;
            let index = state
                .pipeline
                .source_index(key)
                .ok_or_else(|| ViewError::invalid_selection("the new item left the source"))?;
            let writable = !state.source().is_read_only();
            let item = state
                .pipeline
                .item_mut(key)
                .ok_or_else(|| ViewError::invalid_selection("the new item left the source"))?;
            edit(item);
            Ok((index, item.clone(), writable))
        })?;

        if writable {
            self.write_source(|source| source.set(index, value).map(|_| ()))?;
            self.after_write(|_, _| ());
        }
        Ok(())
    }

    /// Accepts the provisional item and moves it to where the filter, sort
    /// and grouping place it.
    ///
    /// The edit session ends first. An item failing the filter leaves the
    /// view but stays in the source. Otherwise it is placed in sort order,
    /// routed into its group and shown if its position falls on the current
    /// page. Does nothing when no item is pending.
    pub fn commit_new(&self) -> Result<()> {
        let adding = self.with_state(|state, _| -> Result<bool> {
            if !state.transaction.is_adding() {
                return Ok(false);
            }
            state.ensure_not_deferred("commit_new")?;
            let session = state.transaction.take_session(SessionOutcome::Ended);
            state.finished.extend(session);
            Ok(true)
        })?;
        if !adding {
            return Ok(());
        }

        self.with_state(|state, out| {
            let Some(pending) = state.transaction.take() else {
                return;
            };
            let key = pending.key;
            state.set_special_leaf(key, false);

            let Some(item) = state.pipeline.item(key).cloned() else {
                state.publish(out);
                return;
            };
            let Some(fresh) = state.pipeline.rekey(key) else {
                state.publish(out);
                return;
            };
            state.departed.push((key, item));
            state.currency.rekey(key, fresh);

            match state.pipeline.admit(fresh, &state.filter, &state.sort) {
                Some(position) => {
                    tracing::debug!(target: targets::TRANSACTION, position, "new item committed");
                    state.tree_insert(fresh);
                }
                None => {
                    tracing::debug!(target: targets::TRANSACTION, "committed item does not pass the filter");
                }
            }
            state.publish(out);
        });
        Ok(())
    }

    /// Discards the provisional item and removes it from the source.
    /// Does nothing when no item is pending.
    pub fn cancel_new(&self) -> Result<()> {
        let index = self.with_state(|state, _| -> Result<Option<usize>> {
            let Some(key) = state.transaction.key() else {
                return Ok(None);
            };
            state.ensure_not_deferred("cancel_new")?;
            let session = state.transaction.take_session(SessionOutcome::Canceled);
            state.finished.extend(session);
            Ok(state.pipeline.source_index(key))
        })?;
        let Some(index) = index else {
            return Ok(());
        };

        self.write_source(|source| source.remove_at(index))?;
        self.after_write(|state, out| {
            state.remove_entry(index);
            tracing::debug!(target: targets::TRANSACTION, "new item canceled");
            state.publish(out);
        });
        Ok(())
    }

    // -------------------------------------------------------------------------
    // Removal
    // -------------------------------------------------------------------------

    /// Returns `true` if items can be removed through the view.
    pub fn can_remove(&self) -> bool {
        self.with_state(|state, _| state.is_growable() && !state.transaction.is_adding())
    }

    /// Removes the visible item at `index` from the source.
    ///
    /// Removing the provisional item cancels the transaction.
    pub fn remove_at(&self, index: usize) -> Result<T> {
        let target = self.with_state(|state, _| -> Result<Removal<T>> {
            state.ensure_not_deferred("remove_at")?;
            let key = *state
                .visible
                .get(index)
                .ok_or(ViewError::out_of_range(index, state.visible.len()))?;
            state.removal_target(key)
        })?;
        self.remove_target(target)
    }

    /// Removes `item` from the source. Returns `false` if the view does not
    /// hold it on any page.
    pub fn remove(&self, item: &T) -> Result<bool> {
        let target = self.with_state(|state, _| -> Result<Option<Removal<T>>> {
            state.ensure_not_deferred("remove")?;
            let key = state
                .visible
                .iter()
                .chain(state.pipeline.internal())
                .copied()
                .find(|key| state.pipeline.item(*key) == Some(item));
            key.map(|key| state.removal_target(key)).transpose()
        })?;
        match target {
            Some(target) => self.remove_target(target).map(|_| true),
            None => Ok(false),
        }
    }

    fn remove_target(&self, target: Removal<T>) -> Result<T> {
        match target {
            Removal::Provisional(item) => {
                self.cancel_new()?;
                Ok(item)
            }
            Removal::Source { index, item } => {
                self.write_source(|source| source.remove_at(index))?;
                self.after_write(|state, out| {
                    state.remove_entry(index);
                    state.publish(out);
                });
                Ok(item)
            }
        }
    }

    // -------------------------------------------------------------------------
    // Currency
    // -------------------------------------------------------------------------

    /// The current item.
    pub fn current_item(&self) -> Option<T> {
        self.with_state(|state, _| state.currency.key().and_then(|key| state.item_of(key)))
    }

    /// Visible position of the current item; `None` before the first item.
    pub fn current_position(&self) -> Option<usize> {
        self.with_state(|state, _| state.currency.position())
    }

    /// Moves currency to the position `target` picks. `target` returns
    /// `None` when no move is possible.
    fn move_current(
        &self,
        target: impl FnOnce(&ViewState<T>) -> Result<Option<Option<usize>>>,
    ) -> Result<bool> {
        let step = self.with_state(|state, _| -> Result<Option<(Option<usize>, Option<usize>)>> {
            state.ensure_not_deferred("move_current")?;
            Ok(target(&*state)?.map(|to| (state.currency.position(), to)))
        })?;
        let Some((from, to)) = step else {
            return Ok(false);
        };
        if from == to {
            return Ok(to.is_some());
        }

        let args = CurrentChanging::new(from, to);
        self.inner.signals.current_changing.emit(args.clone());
        if args.is_canceled() {
            return Ok(false);
        }
        Ok(self.with_state(|state, out| {
            let to = to.filter(|position| *position < state.visible.len());
            state.currency.set(&state.visible, to, out);
            to.is_some()
        }))
    }

    /// Makes the first visible item current.
    pub fn move_current_to_first(&self) -> Result<bool> {
        self.move_current(|state| Ok((!state.visible.is_empty()).then_some(Some(0))))
    }

    /// Makes the last visible item current.
    pub fn move_current_to_last(&self) -> Result<bool> {
        self.move_current(|state| Ok(state.visible.len().checked_sub(1).map(Some)))
    }

    /// Makes the following item current. Returns `false` at the end.
    pub fn move_current_to_next(&self) -> Result<bool> {
        self.move_current(|state| {
            let len = state.visible.len();
            Ok(match state.currency.position() {
                None if len > 0 => Some(Some(0)),
                Some(position) if position + 1 < len => Some(Some(position + 1)),
                _ => None,
            })
        })
    }

    /// Makes the preceding item current. Returns `false` at the start.
    pub fn move_current_to_previous(&self) -> Result<bool> {
        self.move_current(|state| {
            Ok(match state.currency.position() {
                Some(position) if position > 0 => Some(Some(position - 1)),
                _ => None,
            })
        })
    }

    /// Makes the item at `position` current.
    pub fn move_current_to_position(&self, position: usize) -> Result<bool> {
        self.move_current(|state| {
            if position >= state.visible.len() {
                return Err(ViewError::invalid_selection(format!(
                    "position {position} is outside the view (count {})",
                    state.visible.len()
                )));
            }
            Ok(Some(Some(position)))
        })
    }

    /// Makes `item` current. If it is not visible, currency moves before the
    /// first item and `false` is returned.
    pub fn move_current_to(&self, item: &T) -> Result<bool> {
        self.move_current(|state| {
            Ok(Some(
                state
                    .visible
                    .iter()
                    .position(|key| state.pipeline.item(*key) == Some(item)),
            ))
        })
    }
}

/// A lazy enumerator over a view's visible items.
///
/// Created by [`CollectionView::iter`].
pub struct ViewIter<T: 'static> {
    view: CollectionView<T>,
    generation: u64,
    index: usize,
    finished: bool,
}

impl<T: Clone + PartialEq + Send + Sync + 'static> Iterator for ViewIter<T> {
    type Item = Result<T>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }
        let (generation, index) = (self.generation, self.index);
        let step = self.view.with_state(|state, _| {
            if state.generation != generation {
                return Err(ViewError::StaleEnumerator);
            }
            Ok(state
                .visible
                .get(index)
                .and_then(|key| state.pipeline.item(*key).cloned()))
        });
        match step {
            Ok(Some(item)) => {
                self.index += 1;
                Some(Ok(item))
            }
            Ok(None) => {
                self.finished = true;
                None
            }
            Err(err) => {
                self.finished = true;
                Some(Err(err))
            }
        }
    }
}

impl<T: 'static> std::fmt::Debug for ViewIter<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ViewIter")
            .field("generation", &self.generation)
            .field("index", &self.index)
            .finish_non_exhaustive()
    }
}

/// Builder for [`CollectionView`].
///
/// # Example
///
/// ```
/// use std::sync::Arc;
/// use horizon_collections::view::{
///     CollectionViewBuilder, GroupDescription, ObservableList, SortDescription, SortDirection,
/// };
///
/// let source = Arc::new(ObservableList::new(vec![5, 2, 8, 1]));
/// let view = CollectionViewBuilder::new(source)
///     .filter(|n: &i32| *n > 1)
///     .sort(SortDescription::by_key("value", |n: &i32| *n, SortDirection::Descending))
///     .group(GroupDescription::new("parity", |n: &i32| n % 2 == 0))
///     .factory(|| 0)
///     .build();
///
/// assert_eq!(view.snapshot().unwrap(), vec![8, 2, 5]);
/// assert!(view.can_add_new());
/// ```
pub struct CollectionViewBuilder<T: 'static> {
    source: Arc<dyn ItemSource<T>>,
    config: ViewConfig,
    filter: FilterSpec<T>,
    sort: Vec<SortDescription<T>>,
    groups: Vec<GroupDescription<T>>,
    factory: Option<ItemFactory<T>>,
    edit_hook: Option<EditHook<T>>,
}

impl<T: Clone + PartialEq + Send + Sync + 'static> CollectionViewBuilder<T> {
    /// Creates a builder for a view of `source`.
    pub fn new<S: ItemSource<T> + 'static>(source: Arc<S>) -> Self {
        Self {
            source,
            config: ViewConfig::default(),
            filter: FilterSpec::new(),
            sort: Vec::new(),
            groups: Vec::new(),
            factory: None,
            edit_hook: None,
        }
    }

    /// Uses `config` for capabilities and initial paging.
    pub fn config(mut self, config: ViewConfig) -> Self {
        self.config = config;
        self
    }

    /// Sets the initial page size.
    pub fn page_size(mut self, page_size: usize) -> Self {
        self.config.page_size = page_size;
        self
    }

    /// Sets the primary filter predicate.
    pub fn filter<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&T) -> bool + Send + Sync + 'static,
    {
        self.filter.set_primary(Some(Arc::new(predicate)));
        self
    }

    /// Adds a named filter clause.
    pub fn filter_clause<F>(mut self, name: impl Into<String>, predicate: F) -> Self
    where
        F: Fn(&T) -> bool + Send + Sync + 'static,
    {
        self.filter.add_clause(FilterClause::new(name, predicate));
        self
    }

    /// Appends a sort level.
    pub fn sort(mut self, level: SortDescription<T>) -> Self {
        self.sort.push(level);
        self
    }

    /// Appends a group level.
    pub fn group(mut self, level: GroupDescription<T>) -> Self {
        self.groups.push(level);
        self
    }

    /// Installs the factory [`CollectionView::add_new`] creates items with.
    pub fn factory<F>(mut self, factory: F) -> Self
    where
        F: Fn() -> T + Send + Sync + 'static,
    {
        self.factory = Some(Arc::new(factory));
        self
    }

    /// Installs a hook opening an edit session on every new item.
    pub fn edit_session<F>(mut self, hook: F) -> Self
    where
        F: Fn(&T) -> Option<Box<dyn EditSession>> + Send + Sync + 'static,
    {
        self.edit_hook = Some(Arc::new(hook));
        self
    }

    /// Builds the view.
    pub fn build(self) -> CollectionView<T> {
        CollectionView::from_builder(self)
    }
}

static_assertions::assert_impl_all!(CollectionView<i32>: Send, Sync, Clone);
