//! The filtered, sorted materialization of a source.
//!
//! Every source item gets an entry keyed by an [`ItemKey`], whether or not
//! it passes the filter. The internal list holds the keys of the items that
//! pass, ordered by the active comparator with source position as the final
//! tie breaker.

use slotmap::{new_key_type, SecondaryMap, SlotMap};

use super::filter::FilterSpec;
use super::sort::{insertion_point, MergedComparator};

new_key_type! {
    /// Identity of one item while it lives in a view.
    pub(crate) struct ItemKey;
}

#[derive(Debug, Clone)]
pub(crate) struct Entry<T> {
    pub(crate) item: T,
    pub(crate) source_index: usize,
}

#[derive(Debug)]
pub(crate) struct Pipeline<T> {
    entries: SlotMap<ItemKey, Entry<T>>,
    /// Keys in source order.
    by_source: Vec<ItemKey>,
    /// Keys of the items passing the filter, in sorted order.
    internal: Vec<ItemKey>,
}

impl<T> Default for Pipeline<T> {
    fn default() -> Self {
        Self {
            entries: SlotMap::with_key(),
            by_source: Vec::new(),
            internal: Vec::new(),
        }
    }
}

impl<T> Pipeline<T> {
    /// Replaces all entries with `items` and rebuilds the internal list.
    pub(crate) fn rebuild(
        &mut self,
        items: Vec<T>,
        filter: &FilterSpec<T>,
        comparator: &MergedComparator<T>,
        is_data_sorted: bool,
    ) {
        self.entries.clear();
        self.by_source = items
            .into_iter()
            .enumerate()
            .map(|(source_index, item)| self.entries.insert(Entry { item, source_index }))
            .collect();
        self.internal = self
            .by_source
            .iter()
            .copied()
            .filter(|key| filter.passes(&self.entries[*key].item))
            .collect();

        if comparator.is_active() && !is_data_sorted {
            let entries = &self.entries;
            // `sort_by` is stable, so source order survives ties.
            self.internal
                .sort_by(|a, b| comparator.compare(&entries[*a].item, &entries[*b].item));
        }
    }

    pub(crate) fn internal(&self) -> &[ItemKey] {
        &self.internal
    }

    pub(crate) fn internal_len(&self) -> usize {
        self.internal.len()
    }

    pub(crate) fn item(&self, key: ItemKey) -> Option<&T> {
        self.entries.get(key).map(|entry| &entry.item)
    }

    pub(crate) fn item_mut(&mut self, key: ItemKey) -> Option<&mut T> {
        self.entries.get_mut(key).map(|entry| &mut entry.item)
    }

    pub(crate) fn source_index(&self, key: ItemKey) -> Option<usize> {
        self.entries.get(key).map(|entry| entry.source_index)
    }

    pub(crate) fn key_at_source(&self, index: usize) -> Option<ItemKey> {
        self.by_source.get(index).copied()
    }

    pub(crate) fn source_len(&self) -> usize {
        self.by_source.len()
    }

    /// Position of `key` in the internal list.
    pub(crate) fn position(&self, key: ItemKey) -> Option<usize> {
        self.internal.iter().position(|k| *k == key)
    }

    /// Internal positions of every key, for rank lookups.
    pub(crate) fn ranks(&self) -> SecondaryMap<ItemKey, usize> {
        self.internal
            .iter()
            .enumerate()
            .map(|(rank, key)| (*key, rank))
            .collect()
    }

    /// Records an item inserted into the source at `index` without admitting
    /// it to the internal list.
    pub(crate) fn insert_source(&mut self, index: usize, item: T) -> ItemKey {
        let index = index.min(self.by_source.len());
        for key in &self.by_source[index..] {
            self.entries[*key].source_index += 1;
        }
        let key = self.entries.insert(Entry {
            item,
            source_index: index,
        });
        self.by_source.insert(index, key);
        key
    }

    /// Forgets the item at source position `index`.
    pub(crate) fn remove_source(&mut self, index: usize) -> Option<(ItemKey, T)> {
        if index >= self.by_source.len() {
            return None;
        }
        let key = self.by_source.remove(index);
        for later in &self.by_source[index..] {
            self.entries[*later].source_index -= 1;
        }
        self.internal.retain(|k| *k != key);
        let entry = self.entries.remove(key)?;
        Some((key, entry.item))
    }

    /// Inserts `key` into the internal list if it passes `filter`, returning
    /// its position.
    pub(crate) fn admit(
        &mut self,
        key: ItemKey,
        filter: &FilterSpec<T>,
        comparator: &MergedComparator<T>,
    ) -> Option<usize> {
        let entry = self.entries.get(key)?;
        if !filter.passes(&entry.item) {
            return None;
        }
        let entries = &self.entries;
        let position = if comparator.is_active() {
            insertion_point(&self.internal, |existing| {
                let other = &entries[*existing];
                comparator.compare_ranked((&other.item, other.source_index), (&entry.item, entry.source_index))
            })
        } else {
            insertion_point(&self.internal, |existing| {
                entries[*existing].source_index.cmp(&entry.source_index)
            })
        };
        self.internal.insert(position, key);
        Some(position)
    }

    /// Takes `key` out of the internal list, keeping its entry.
    pub(crate) fn withdraw(&mut self, key: ItemKey) -> Option<usize> {
        let position = self.position(key)?;
        self.internal.remove(position);
        Some(position)
    }

    /// Gives the item behind `key` a fresh identity.
    pub(crate) fn rekey(&mut self, key: ItemKey) -> Option<ItemKey> {
        let was_internal = self.withdraw(key);
        let entry = self.entries.remove(key)?;
        let source_index = entry.source_index;
        let fresh = self.entries.insert(entry);
        if let Some(slot) = self.by_source.get_mut(source_index) {
            *slot = fresh;
        }
        if let Some(position) = was_internal {
            self.internal.insert(position, fresh);
        }
        Some(fresh)
    }
}
