//! Source collections and change tracking.
//!
//! A collection view never owns its items. It reads them from an
//! [`ItemSource`], an ordered, index-addressable collection that may or may
//! not announce its own structural changes:
//!
//! - [`ObservableList`] emits a [`SourceChange`] for every mutation. The view
//!   subscribes once and patches itself incrementally.
//! - [`PlainList`] only bumps a version counter. The view tracks that
//!   counter and rebuilds itself on its next access after a change.
//! - [`FixedList`] is read-only and never changes.
//!
//! Custom sources implement [`ItemSource`] directly.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use horizon_collections_core::logging::targets;
use horizon_collections_core::{ConnectionId, Result, Signal, ViewError};
use parking_lot::RwLock;

/// A structural change reported by a notifying source.
#[derive(Debug, Clone, PartialEq)]
pub enum SourceChange<T> {
    /// `item` was inserted at `index`.
    Added {
        /// The inserted item.
        item: T,
        /// Source position of the inserted item.
        index: usize,
    },
    /// `item` was removed from `index`.
    Removed {
        /// The removed item.
        item: T,
        /// Source position the item was removed from.
        index: usize,
    },
    /// The item at `index` was replaced.
    Replaced {
        /// The previous item.
        old: T,
        /// The new item.
        new: T,
        /// Source position of the replacement.
        index: usize,
    },
    /// The source changed too much to describe incrementally.
    Reset,
}

/// An ordered, index-addressable collection a view can project.
///
/// Only `len`, `get` and `version` are required. Sources that can append
/// and remove items override the capability queries and mutators; the
/// defaults describe a read-only, fixed-size source.
pub trait ItemSource<T>: Send + Sync {
    /// Number of items in the source.
    fn len(&self) -> usize;

    /// Returns `true` if the source has no items.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns a copy of the item at `index`.
    fn get(&self, index: usize) -> Option<T>;

    /// Copies all items, in source order.
    fn to_vec(&self) -> Vec<T> {
        (0..self.len()).filter_map(|index| self.get(index)).collect()
    }

    /// A counter that changes whenever the source changes structurally.
    fn version(&self) -> u64;

    /// The change notifications of this source, if it emits any.
    fn changes(&self) -> Option<&Signal<SourceChange<T>>> {
        None
    }

    /// Returns `true` if the source rejects all mutation.
    fn is_read_only(&self) -> bool {
        true
    }

    /// Returns `true` if the source can not grow or shrink.
    fn is_fixed_size(&self) -> bool {
        true
    }

    /// Inserts `item` at `index`.
    fn insert(&self, _index: usize, _item: T) -> Result<()> {
        Err(ViewError::UnsupportedOperation("insert into a fixed-size source"))
    }

    /// Removes and returns the item at `index`.
    fn remove_at(&self, _index: usize) -> Result<T> {
        Err(ViewError::UnsupportedOperation("remove from a fixed-size source"))
    }

    /// Replaces the item at `index`, returning the previous one.
    fn set(&self, _index: usize, _item: T) -> Result<T> {
        Err(ViewError::UnsupportedOperation("replace in a read-only source"))
    }
}

/// Shared storage for the growable list sources.
#[derive(Debug)]
struct ListStorage<T> {
    items: RwLock<Vec<T>>,
    version: AtomicU64,
}

impl<T: Clone> ListStorage<T> {
    fn new(items: Vec<T>) -> Self {
        Self {
            items: RwLock::new(items),
            version: AtomicU64::new(0),
        }
    }

    fn bump(&self) {
        self.version.fetch_add(1, Ordering::SeqCst);
    }

    fn len(&self) -> usize {
        self.items.read().len()
    }

    fn get(&self, index: usize) -> Option<T> {
        self.items.read().get(index).cloned()
    }

    fn to_vec(&self) -> Vec<T> {
        self.items.read().clone()
    }

    fn version(&self) -> u64 {
        self.version.load(Ordering::SeqCst)
    }

    fn insert(&self, index: usize, item: T) -> Result<()> {
        {
            let mut items = self.items.write();
            if index > items.len() {
                return Err(ViewError::out_of_range(index, items.len()));
            }
            items.insert(index, item);
        }
        self.bump();
        Ok(())
    }

    fn remove_at(&self, index: usize) -> Result<T> {
        let removed = {
            let mut items = self.items.write();
            if index >= items.len() {
                return Err(ViewError::out_of_range(index, items.len()));
            }
            items.remove(index)
        };
        self.bump();
        Ok(removed)
    }

    fn set(&self, index: usize, item: T) -> Result<T> {
        let old = {
            let mut items = self.items.write();
            let len = items.len();
            let slot = items
                .get_mut(index)
                .ok_or(ViewError::out_of_range(index, len))?;
            std::mem::replace(slot, item)
        };
        self.bump();
        Ok(old)
    }

    fn replace_all(&self, items: Vec<T>) {
        *self.items.write() = items;
        self.bump();
    }
}

/// A growable list that announces every structural change.
///
/// # Example
///
/// ```
/// use horizon_collections::view::{ItemSource, ObservableList};
///
/// let list = ObservableList::new(vec![1, 2]);
/// list.push(3);
/// assert_eq!(list.len(), 3);
/// ```
#[derive(Debug)]
pub struct ObservableList<T: 'static> {
    storage: ListStorage<T>,
    changes: Signal<SourceChange<T>>,
}

impl<T: Clone + Send + Sync + 'static> ObservableList<T> {
    /// Creates a list holding `items`.
    pub fn new(items: Vec<T>) -> Self {
        Self {
            storage: ListStorage::new(items),
            changes: Signal::new(),
        }
    }

    /// Appends an item to the end of the list.
    pub fn push(&self, item: T) {
        let index = self.storage.len();
        // Appending at len() can not fail.
        let _ = ItemSource::insert(self, index, item);
    }

    /// Removes the first item equal to `item`, returning its former index.
    pub fn remove_item(&self, item: &T) -> Option<usize>
    where
        T: PartialEq,
    {
        let index = self.storage.items.read().iter().position(|i| i == item)?;
        ItemSource::remove_at(self, index).ok().map(|_| index)
    }

    /// Mutates the item at `index` in place and announces it as a replacement.
    pub fn modify<F, R>(&self, index: usize, f: F) -> Option<R>
    where
        F: FnOnce(&mut T) -> R,
    {
        let (old, new, result) = {
            let mut items = self.storage.items.write();
            let item = items.get_mut(index)?;
            let old = item.clone();
            let result = f(item);
            (old, item.clone(), result)
        };
        self.storage.bump();
        self.changes.emit(SourceChange::Replaced { old, new, index });
        Some(result)
    }

    /// Replaces all items and announces a reset.
    pub fn set_items(&self, items: Vec<T>) {
        self.storage.replace_all(items);
        self.changes.emit(SourceChange::Reset);
    }

    /// Removes all items and announces a reset.
    pub fn clear(&self) {
        self.set_items(Vec::new());
    }
}

impl<T: Clone + Send + Sync + 'static> ItemSource<T> for ObservableList<T> {
    fn len(&self) -> usize {
        self.storage.len()
    }

    fn get(&self, index: usize) -> Option<T> {
        self.storage.get(index)
    }

    fn to_vec(&self) -> Vec<T> {
        self.storage.to_vec()
    }

    fn version(&self) -> u64 {
        self.storage.version()
    }

    fn changes(&self) -> Option<&Signal<SourceChange<T>>> {
        Some(&self.changes)
    }

    fn is_read_only(&self) -> bool {
        false
    }

    fn is_fixed_size(&self) -> bool {
        false
    }

    fn insert(&self, index: usize, item: T) -> Result<()> {
        self.storage.insert(index, item.clone())?;
        self.changes.emit(SourceChange::Added { item, index });
        Ok(())
    }

    fn remove_at(&self, index: usize) -> Result<T> {
        let item = self.storage.remove_at(index)?;
        self.changes.emit(SourceChange::Removed {
            item: item.clone(),
            index,
        });
        Ok(item)
    }

    fn set(&self, index: usize, item: T) -> Result<T> {
        let old = self.storage.set(index, item.clone())?;
        self.changes.emit(SourceChange::Replaced {
            old: old.clone(),
            new: item,
            index,
        });
        Ok(old)
    }
}

/// A growable list that does not announce its changes.
///
/// Views over a `PlainList` notice mutations through its version counter and
/// rebuild themselves on their next access.
#[derive(Debug)]
pub struct PlainList<T> {
    storage: ListStorage<T>,
}

impl<T: Clone + Send + Sync + 'static> PlainList<T> {
    /// Creates a list holding `items`.
    pub fn new(items: Vec<T>) -> Self {
        Self {
            storage: ListStorage::new(items),
        }
    }

    /// Appends an item to the end of the list.
    pub fn push(&self, item: T) {
        let index = self.storage.len();
        let _ = self.storage.insert(index, item);
    }

    /// Removes all items.
    pub fn clear(&self) {
        self.storage.replace_all(Vec::new());
    }
}

impl<T: Clone + Send + Sync + 'static> ItemSource<T> for PlainList<T> {
    fn len(&self) -> usize {
        self.storage.len()
    }

    fn get(&self, index: usize) -> Option<T> {
        self.storage.get(index)
    }

    fn to_vec(&self) -> Vec<T> {
        self.storage.to_vec()
    }

    fn version(&self) -> u64 {
        self.storage.version()
    }

    fn is_read_only(&self) -> bool {
        false
    }

    fn is_fixed_size(&self) -> bool {
        false
    }

    fn insert(&self, index: usize, item: T) -> Result<()> {
        self.storage.insert(index, item)
    }

    fn remove_at(&self, index: usize) -> Result<T> {
        self.storage.remove_at(index)
    }

    fn set(&self, index: usize, item: T) -> Result<T> {
        self.storage.set(index, item)
    }
}

/// A read-only, fixed-size source.
#[derive(Debug, Clone)]
pub struct FixedList<T> {
    items: Vec<T>,
}

impl<T> FixedList<T> {
    /// Creates a list holding `items`.
    pub fn new(items: Vec<T>) -> Self {
        Self { items }
    }
}

impl<T: Clone + Send + Sync> ItemSource<T> for FixedList<T> {
    fn len(&self) -> usize {
        self.items.len()
    }

    fn get(&self, index: usize) -> Option<T> {
        self.items.get(index).cloned()
    }

    fn to_vec(&self) -> Vec<T> {
        self.items.clone()
    }

    fn version(&self) -> u64 {
        0
    }
}

/// Remembers the source version seen by the last sync.
///
/// Checking a tracker after the source changed fails with
/// [`ViewError::StaleEnumerator`], the same error a stale view enumerator
/// reports.
#[derive(Debug, Clone, Copy)]
pub(crate) struct SourceTracker {
    version: u64,
}

impl SourceTracker {
    pub(crate) fn new<T>(source: &dyn ItemSource<T>) -> Self {
        Self {
            version: source.version(),
        }
    }

    pub(crate) fn check<T>(&self, source: &dyn ItemSource<T>) -> Result<()> {
        if source.version() == self.version {
            Ok(())
        } else {
            Err(ViewError::StaleEnumerator)
        }
    }

    pub(crate) fn resync<T>(&mut self, source: &dyn ItemSource<T>) {
        self.version = source.version();
    }
}

/// How a view learns about source mutations.
#[derive(Debug)]
pub(crate) enum ChangeTracking {
    /// Subscribed to the source's change signal.
    Notifying(ConnectionId),
    /// Compares version counters on every access.
    Polling(SourceTracker),
}

/// Prevents the view from translating notifications caused by its own
/// writes to the source.
#[derive(Debug, Default)]
pub(crate) struct ReentrancyMonitor {
    busy: AtomicBool,
}

impl ReentrancyMonitor {
    pub(crate) fn is_busy(&self) -> bool {
        self.busy.load(Ordering::SeqCst)
    }

    /// Marks the monitor busy until the returned guard is dropped.
    pub(crate) fn enter(&self) -> MonitorGuard<'_> {
        let was_busy = self.busy.swap(true, Ordering::SeqCst);
        MonitorGuard {
            monitor: self,
            was_busy,
        }
    }
}

pub(crate) struct MonitorGuard<'a> {
    monitor: &'a ReentrancyMonitor,
    was_busy: bool,
}

impl Drop for MonitorGuard<'_> {
    fn drop(&mut self) {
        self.monitor.busy.store(self.was_busy, Ordering::SeqCst);
    }
}

/// The engine's link to its source.
pub(crate) struct SourceAdapter<T: 'static> {
    source: Arc<dyn ItemSource<T>>,
    tracking: ChangeTracking,
}

impl<T: Clone + Send + Sync + 'static> SourceAdapter<T> {
    /// Connects to `source`, subscribing through `on_change` if the source
    /// emits notifications and falling back to version polling otherwise.
    pub(crate) fn connect<F>(source: Arc<dyn ItemSource<T>>, on_change: F) -> Self
    where
        F: Fn(&SourceChange<T>) + Send + Sync + 'static,
    {
        let tracking = match source.changes() {
            Some(changes) => {
                tracing::debug!(target: targets::SOURCE, "subscribing to source notifications");
                ChangeTracking::Notifying(changes.connect(on_change))
            }
            None => {
                tracing::debug!(target: targets::SOURCE, "source does not notify, polling its version");
                ChangeTracking::Polling(SourceTracker::new(source.as_ref()))
            }
        };
        Self { source, tracking }
    }

    pub(crate) fn source(&self) -> &dyn ItemSource<T> {
        self.source.as_ref()
    }

    pub(crate) fn is_notifying(&self) -> bool {
        matches!(self.tracking, ChangeTracking::Notifying(_))
    }

    /// Detects unannounced changes of a polled source.
    ///
    /// Returns `true` if the source changed since the last sync; the caller
    /// is expected to rebuild. Notifying sources never report staleness here.
    pub(crate) fn poll_stale(&mut self) -> bool {
        let ChangeTracking::Polling(tracker) = &mut self.tracking else {
            return false;
        };
        match tracker.check(self.source.as_ref()) {
            Ok(()) => false,
            Err(err) => {
                tracing::debug!(target: targets::SOURCE, %err, "source changed without notification, scheduling refresh");
                tracker.resync(self.source.as_ref());
                true
            }
        }
    }

    /// Accepts the current source version as seen, after the engine wrote
    /// to the source itself or rebuilt from it.
    pub(crate) fn mark_synced(&mut self) {
        if let ChangeTracking::Polling(tracker) = &mut self.tracking {
            tracker.resync(self.source.as_ref());
        }
    }
}

impl<T: 'static> Drop for SourceAdapter<T> {
    fn drop(&mut self) {
        if let ChangeTracking::Notifying(id) = self.tracking {
            if let Some(changes) = self.source.changes() {
                changes.disconnect(id);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;

    #[test]
    fn test_observable_list_notifies() {
        let list = ObservableList::new(vec![1, 2]);
        let received = Arc::new(Mutex::new(Vec::new()));

        let recv = received.clone();
        list.changes().unwrap().connect(move |change| {
            recv.lock().push(change.clone());
        });

        list.push(3);
        ItemSource::remove_at(&list, 0).unwrap();
        list.modify(0, |item| *item = 20);
        list.clear();

        let events = received.lock();
        assert_eq!(
            *events,
            vec![
                SourceChange::Added { item: 3, index: 2 },
                SourceChange::Removed { item: 1, index: 0 },
                SourceChange::Replaced {
                    old: 2,
                    new: 20,
                    index: 0
                },
                SourceChange::Reset,
            ]
        );
    }

    #[test]
    fn test_observable_list_debug() {
        let list = ObservableList::new(vec!["a"]);
        let text = format!("{list:?}");
        assert!(text.starts_with("ObservableList"));
        assert!(text.contains("changes"));
    }

    #[test]
    fn test_insert_out_of_range() {
        let list = PlainList::new(vec![1]);
        assert_eq!(
            ItemSource::insert(&list, 5, 2),
            Err(ViewError::out_of_range(5, 1))
        );
    }

    #[test]
    fn test_fixed_list_rejects_mutation() {
        let list = FixedList::new(vec!["a"]);
        assert!(list.is_read_only());
        assert!(list.is_fixed_size());
        assert!(matches!(
            list.insert(0, "b"),
            Err(ViewError::UnsupportedOperation(_))
        ));
    }

    #[test]
    fn test_tracker_detects_changes() {
        let list = PlainList::new(vec![1, 2, 3]);
        let mut tracker = SourceTracker::new(&list as &dyn ItemSource<i32>);
        assert!(tracker.check(&list as &dyn ItemSource<i32>).is_ok());

        list.push(4);
        assert_eq!(
            tracker.check(&list as &dyn ItemSource<i32>),
            Err(ViewError::StaleEnumerator)
        );

        tracker.resync(&list as &dyn ItemSource<i32>);
        assert!(tracker.check(&list as &dyn ItemSource<i32>).is_ok());
    }

    #[test]
    fn test_adapter_polls_plain_list() {
        let list: Arc<PlainList<i32>> = Arc::new(PlainList::new(vec![1]));
        let mut adapter = SourceAdapter::connect(list.clone(), |_| {});
        assert!(!adapter.is_notifying());
        assert!(!adapter.poll_stale());

        list.push(2);
        assert!(adapter.poll_stale());
        // The staleness is consumed once reported.
        assert!(!adapter.poll_stale());
    }

    #[test]
    fn test_adapter_disconnects_on_drop() {
        let list: Arc<ObservableList<i32>> = Arc::new(ObservableList::new(vec![]));
        let adapter = SourceAdapter::connect(list.clone(), |_| {});
        assert!(adapter.is_notifying());
        assert_eq!(list.changes().unwrap().connection_count(), 1);

        drop(adapter);
        assert_eq!(list.changes().unwrap().connection_count(), 0);
    }

    #[test]
    fn test_monitor_nesting() {
        let monitor = ReentrancyMonitor::default();
        assert!(!monitor.is_busy());
        {
            let _outer = monitor.enter();
            {
                let _inner = monitor.enter();
                assert!(monitor.is_busy());
            }
            assert!(monitor.is_busy());
        }
        assert!(!monitor.is_busy());
    }
}
