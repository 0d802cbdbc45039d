//! Page windowing.

use std::ops::Range;

/// Page size and position of a view.
///
/// A page size of zero means the view is unpaged; its page index is then
/// `-1`. A paged view always sits on a page `>= 0`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Pager {
    page_size: usize,
    page_index: isize,
}

impl Pager {
    pub(crate) fn new(page_size: usize) -> Self {
        Self {
            page_size,
            page_index: if page_size > 0 { 0 } else { -1 },
        }
    }

    pub(crate) fn is_paged(&self) -> bool {
        self.page_size > 0
    }

    pub(crate) fn page_size(&self) -> usize {
        self.page_size
    }

    pub(crate) fn page_index(&self) -> isize {
        self.page_index
    }

    /// Number of pages needed for `total` items. Zero when unpaged; at
    /// least one when paged, even for an empty view.
    pub(crate) fn page_count(&self, total: usize) -> usize {
        if self.is_paged() {
            total.div_ceil(self.page_size).max(1)
        } else {
            0
        }
    }

    /// Changes the page size, keeping the page index inside the new page
    /// count. Returns `true` if the page index changed.
    pub(crate) fn resize(&mut self, page_size: usize, total: usize) -> bool {
        let before = self.page_index;
        self.page_size = page_size;
        self.page_index = if page_size == 0 {
            -1
        } else {
            self.page_index.max(0)
        };
        self.clamp(total);
        self.page_index != before
    }

    /// Pulls the page index back onto the last page if `total` shrank.
    /// Returns `true` if the page index changed.
    pub(crate) fn clamp(&mut self, total: usize) -> bool {
        if !self.is_paged() {
            return false;
        }
        let last = self.page_count(total) as isize - 1;
        if self.page_index > last {
            self.page_index = last;
            true
        } else {
            false
        }
    }

    /// Whether `target` is a page this view can move to for `total` items.
    pub(crate) fn accepts(&self, target: isize, total: usize) -> bool {
        if target == self.page_index {
            return false;
        }
        if target == -1 {
            return !self.is_paged();
        }
        target >= 0 && (target as usize) < self.page_count(total)
    }

    pub(crate) fn set_index(&mut self, page_index: isize) {
        self.page_index = page_index;
    }

    fn page_start(&self) -> usize {
        self.page_index.max(0) as usize * self.page_size
    }

    /// The range of base positions visible on the current page.
    ///
    /// With `reserve_slot` the last slot of a full page is left free for the
    /// provisional item.
    pub(crate) fn window(&self, base_len: usize, reserve_slot: bool) -> Range<usize> {
        if !self.is_paged() {
            return 0..base_len;
        }
        let start = self.page_start().min(base_len);
        let mut end = (start + self.page_size).min(base_len);
        if reserve_slot && end - start == self.page_size {
            end -= 1;
        }
        start..end
    }
}
