//! Change notification.
//!
//! Every observable change of a view goes out through [`ViewSignals`].
//! The engine never emits while holding its state lock: it collects
//! [`Notice`]s while it mutates and dispatches them once the lock is
//! released, so slots may query the view or call back into it.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use horizon_collections_core::Signal;

use super::pipeline::ItemKey;

/// A change of a view's visible items.
///
/// Indices are visible positions. A batch of removals is reported from the
/// highest index down and a batch of additions from the lowest index up, so
/// each notification can be applied to a mirror list as it arrives.
#[derive(Debug, Clone, PartialEq)]
pub enum ViewChange<T> {
    /// `item` became visible at `index`.
    Added {
        /// The added item.
        item: T,
        /// Visible position of the added item.
        index: usize,
    },
    /// `item` stopped being visible at `index`.
    Removed {
        /// The removed item.
        item: T,
        /// Visible position the item had.
        index: usize,
    },
    /// The visible items changed wholesale.
    Reset,
}

/// A cancelable veto flag shared between the emitter and its slots.
#[derive(Debug, Clone, Default)]
struct Veto(Arc<AtomicBool>);

impl Veto {
    fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    fn is_canceled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Arguments of [`ViewSignals::page_changing`].
///
/// Any slot may call [`cancel`](Self::cancel) to keep the view on its
/// current page.
#[derive(Debug, Clone)]
pub struct PageChanging {
    /// The page being left.
    pub from: isize,
    /// The requested page.
    pub to: isize,
    veto: Veto,
}

impl PageChanging {
    pub(crate) fn new(from: isize, to: isize) -> Self {
        Self {
            from,
            to,
            veto: Veto::default(),
        }
    }

    /// Vetoes the page change.
    pub fn cancel(&self) {
        self.veto.cancel();
    }

    /// Returns `true` if a slot vetoed the change.
    pub fn is_canceled(&self) -> bool {
        self.veto.is_canceled()
    }
}

/// Arguments of [`ViewSignals::current_changing`].
#[derive(Debug, Clone)]
pub struct CurrentChanging {
    /// The current position before the move.
    pub from: Option<usize>,
    /// The requested position.
    pub to: Option<usize>,
    veto: Veto,
}

impl CurrentChanging {
    pub(crate) fn new(from: Option<usize>, to: Option<usize>) -> Self {
        Self {
            from,
            to,
            veto: Veto::default(),
        }
    }

    /// Vetoes the move.
    pub fn cancel(&self) {
        self.veto.cancel();
    }

    /// Returns `true` if a slot vetoed the move.
    pub fn is_canceled(&self) -> bool {
        self.veto.is_canceled()
    }
}

/// Collection of signals emitted by a collection view.
pub struct ViewSignals<T: 'static> {
    // -------------------------------------------------------------------------
    // Content signals
    // -------------------------------------------------------------------------
    /// Emitted for every added or removed visible item, or a reset.
    pub collection_changed: Signal<ViewChange<T>>,

    /// Emitted after a batch of changes altered the visible item count.
    /// Args: new count
    pub count_changed: Signal<usize>,

    /// Emitted when the view becomes empty or stops being empty.
    pub is_empty_changed: Signal<bool>,

    // -------------------------------------------------------------------------
    // Paging signals
    // -------------------------------------------------------------------------
    /// Emitted before a page move. Cancelable.
    pub page_changing: Signal<PageChanging>,

    /// Emitted after a page move, or after a refused move while adding.
    /// Args: page index
    pub page_changed: Signal<isize>,

    /// Emitted when the number of pages changes.
    pub page_count_changed: Signal<usize>,

    // -------------------------------------------------------------------------
    // Currency signals
    // -------------------------------------------------------------------------
    /// Emitted before an explicit current-item move. Cancelable.
    pub current_changing: Signal<CurrentChanging>,

    /// Emitted after the current position changed.
    /// Args: new current position
    pub current_changed: Signal<Option<usize>>,
}

impl<T: 'static> Default for ViewSignals<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: 'static> ViewSignals<T> {
    /// Creates a new set of view signals.
    pub fn new() -> Self {
        Self {
            collection_changed: Signal::new(),
            count_changed: Signal::new(),
            is_empty_changed: Signal::new(),
            page_changing: Signal::new(),
            page_changed: Signal::new(),
            page_count_changed: Signal::new(),
            current_changing: Signal::new(),
            current_changed: Signal::new(),
        }
    }

    pub(crate) fn dispatch(&self, notices: Vec<Notice<T>>) {
        for notice in notices {
            match notice {
                Notice::Change(change) => self.collection_changed.emit(change),
                Notice::Count(count) => self.count_changed.emit(count),
                Notice::IsEmpty(empty) => self.is_empty_changed.emit(empty),
                Notice::PageChanged(page) => self.page_changed.emit(page),
                Notice::PageCount(pages) => self.page_count_changed.emit(pages),
                Notice::CurrentChanged(position) => self.current_changed.emit(position),
            }
        }
    }
}

impl<T: 'static> std::fmt::Debug for ViewSignals<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ViewSignals")
            .field("collection_changed", &self.collection_changed)
            .field("count_changed", &self.count_changed)
            .finish_non_exhaustive()
    }
}

/// A notification queued while the view state is locked.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Notice<T> {
    Change(ViewChange<T>),
    Count(usize),
    IsEmpty(bool),
    PageChanged(isize),
    PageCount(usize),
    CurrentChanged(Option<usize>),
}

/// Remembers what listeners were last told about the aggregate state.
#[derive(Debug, Clone, Copy)]
pub(crate) struct ChangeNotifier {
    count: usize,
    is_empty: bool,
    page_count: usize,
}

impl ChangeNotifier {
    pub(crate) fn new(count: usize, page_count: usize) -> Self {
        Self {
            count,
            is_empty: count == 0,
            page_count,
        }
    }

    /// Queues count, is-empty and page-count notices for whatever changed.
    pub(crate) fn settle<T>(&mut self, count: usize, page_count: usize, out: &mut Vec<Notice<T>>) {
        if count != self.count {
            self.count = count;
            out.push(Notice::Count(count));
        }
        let is_empty = count == 0;
        if is_empty != self.is_empty {
            self.is_empty = is_empty;
            out.push(Notice::IsEmpty(is_empty));
        }
        if page_count != self.page_count {
            self.page_count = page_count;
            out.push(Notice::PageCount(page_count));
        }
    }
}

/// The minimal edit turning one visible window into another.
#[derive(Debug, Default, PartialEq)]
pub(crate) struct WindowDiff {
    /// Removed keys with their old positions, highest position first.
    pub(crate) removed: Vec<(usize, ItemKey)>,
    /// Added keys with their new positions, lowest position first.
    pub(crate) added: Vec<(usize, ItemKey)>,
}

impl WindowDiff {
    pub(crate) fn is_empty(&self) -> bool {
        self.removed.is_empty() && self.added.is_empty()
    }
}

/// Diffs two windows.
///
/// Keys present in both windows stay put as long as they keep their
/// relative order. A key that moved, such as a leaf whose group moved
/// ahead of another group, is reported as removed and added again.
pub(crate) fn diff_windows(old: &[ItemKey], new: &[ItemKey]) -> WindowDiff {
    let kept = ordered_common_keys(old, new);

    let removed = old
        .iter()
        .enumerate()
        .rev()
        .filter(|(_, key)| !kept.contains(*key))
        .map(|(index, key)| (index, *key))
        .collect();
    let added = new
        .iter()
        .enumerate()
        .filter(|(_, key)| !kept.contains(*key))
        .map(|(index, key)| (index, *key))
        .collect();

    WindowDiff { removed, added }
}

/// The largest set of keys common to both windows whose relative order is
/// the same in each: a longest increasing run of old positions, taken in
/// new order.
fn ordered_common_keys(old: &[ItemKey], new: &[ItemKey]) -> HashSet<ItemKey> {
    let old_positions: HashMap<ItemKey, usize> =
        old.iter().enumerate().map(|(index, key)| (*key, index)).collect();
    let common: Vec<(ItemKey, usize)> = new
        .iter()
        .filter_map(|key| old_positions.get(key).map(|position| (*key, *position)))
        .collect();

    // tails[n] is the entry ending the best increasing run of length n + 1.
    let mut tails: Vec<usize> = Vec::new();
    let mut previous: Vec<Option<usize>> = vec![None; common.len()];
    for (entry, (_, position)) in common.iter().enumerate() {
        let length = tails.partition_point(|tail| common[*tail].1 < *position);
        if length > 0 {
            previous[entry] = Some(tails[length - 1]);
        }
        if length == tails.len() {
            tails.push(entry);
        } else {
            tails[length] = entry;
        }
    }

    let mut kept = HashSet::with_capacity(tails.len());
    let mut cursor = tails.last().copied();
    while let Some(entry) = cursor {
        kept.insert(common[entry].0);
        cursor = previous[entry];
    }
    kept
}
