//! Current-item tracking.
//!
//! The current item follows visible changes: additions and removals before
//! it shift its position, removing it moves currency to the item that took
//! its place, and a reset keeps it if it is still visible.

use super::notify::{Notice, WindowDiff};
use super::pipeline::ItemKey;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(crate) struct Currency {
    key: Option<ItemKey>,
    position: Option<usize>,
}

impl Currency {
    /// Currency on the first of `visible`, if any.
    pub(crate) fn first(visible: &[ItemKey]) -> Self {
        Self {
            key: visible.first().copied(),
            position: visible.first().map(|_| 0),
        }
    }

    pub(crate) fn key(&self) -> Option<ItemKey> {
        self.key
    }

    pub(crate) fn position(&self) -> Option<usize> {
        self.position
    }

    /// Moves to `position` in `visible`.
    pub(crate) fn set<T>(&mut self, visible: &[ItemKey], position: Option<usize>, out: &mut Vec<Notice<T>>) {
        let next = Self {
            key: position.and_then(|p| visible.get(p).copied()),
            position: position.filter(|p| *p < visible.len()),
        };
        self.replace(next, out);
    }

    /// Follows an item that received a new identity.
    pub(crate) fn rekey(&mut self, old: ItemKey, fresh: ItemKey) {
        if self.key == Some(old) {
            self.key = Some(fresh);
        }
    }

    /// Adjusts after an incremental change from `old` to `new`.
    pub(crate) fn follow<T>(&mut self, new: &[ItemKey], diff: &WindowDiff, out: &mut Vec<Notice<T>>) {
        let Some(key) = self.key else {
            return;
        };
        let next = match new.iter().position(|k| *k == key) {
            Some(position) => Self {
                key: Some(key),
                position: Some(position),
            },
            None if new.is_empty() => Self::default(),
            None => {
                // The current item left; the item now at its old place takes over.
                let removed_at = diff
                    .removed
                    .iter()
                    .find(|(_, k)| *k == key)
                    .map(|(index, _)| *index)
                    .or(self.position)
                    .unwrap_or(0);
                let position = removed_at.min(new.len() - 1);
                Self {
                    key: Some(new[position]),
                    position: Some(position),
                }
            }
        };
        self.replace(next, out);
    }

    /// Adjusts after a reset. `still_visible` is the new position of the
    /// previous current item, if it survived.
    pub(crate) fn reset<T>(&mut self, visible: &[ItemKey], still_visible: Option<usize>, out: &mut Vec<Notice<T>>) {
        let next = match still_visible {
            Some(position) => Self {
                key: visible.get(position).copied(),
                position: Some(position),
            },
            None => Self::first(visible),
        };
        self.replace(next, out);
    }

    fn replace<T>(&mut self, next: Self, out: &mut Vec<Notice<T>>) {
        let changed = next != *self;
        *self = next;
        if changed {
            out.push(Notice::CurrentChanged(self.position));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::view::notify::diff_windows;
    use slotmap::SlotMap;

    fn keys(n: usize) -> Vec<ItemKey> {
        let mut map: SlotMap<ItemKey, ()> = SlotMap::with_key();
        (0..n).map(|_| map.insert(())).collect()
    }

    #[test]
    fn test_shifts_with_insert_before() {
        let k = keys(4);
        let old = vec![k[0], k[1]];
        let new = vec![k[3], k[0], k[1]];
        let mut currency = Currency::default();
        let mut out: Vec<Notice<()>> = Vec::new();
        currency.set(&old, Some(1), &mut out);
        out.clear();

        currency.follow(&new, &diff_windows(&old, &new), &mut out);
        assert_eq!(currency.position(), Some(2));
        assert_eq!(currency.key(), Some(k[1]));
        assert_eq!(out, vec![Notice::CurrentChanged(Some(2))]);
    }

    #[test]
    fn test_removed_current_moves_to_successor() {
        let k = keys(3);
        let old = vec![k[0], k[1], k[2]];
        let new = vec![k[0], k[2]];
        let mut currency = Currency::first(&old);
        let mut out: Vec<Notice<()>> = Vec::new();
        currency.set(&old, Some(1), &mut out);

        currency.follow(&new, &diff_windows(&old, &new), &mut out);
        assert_eq!(currency.key(), Some(k[2]));
        assert_eq!(currency.position(), Some(1));
    }

    #[test]
    fn test_removing_last_item_clamps() {
        let k = keys(2);
        let old = vec![k[0], k[1]];
        let new = vec![k[0]];
        let mut currency = Currency::default();
        let mut out: Vec<Notice<()>> = Vec::new();
        currency.set(&old, Some(1), &mut out);

        currency.follow(&new, &diff_windows(&old, &new), &mut out);
        assert_eq!(currency.position(), Some(0));

        currency.follow(&[], &diff_windows(&new, &[]), &mut out);
        assert_eq!(currency.position(), None);
        assert_eq!(currency.key(), None);
    }

    #[test]
    fn test_reset_prefers_survivor() {
        let k = keys(3);
        let mut currency = Currency::first(&k);
        let mut out: Vec<Notice<()>> = Vec::new();

        currency.reset(&k, Some(2), &mut out);
        assert_eq!(currency.key(), Some(k[2]));

        currency.reset(&k, None, &mut out);
        assert_eq!(currency.position(), Some(0));
        assert_eq!(out.len(), 2);
    }
}
