//! The add-new transaction.
//!
//! A view holds at most one provisional item. [`AddNew`] appends it to the
//! source and shows it as the last visible item; committing places it by
//! the filter, sort and grouping, canceling removes it again.
//!
//! [`AddNew`]: super::CollectionView::add_new

use std::sync::Arc;

use super::pipeline::ItemKey;

/// Type alias for the function producing new items.
pub type ItemFactory<T> = Arc<dyn Fn() -> T + Send + Sync>;

/// Type alias for the hook that opens an edit session on a new item.
///
/// Returning `None` means the item is not editable.
pub type EditHook<T> = Arc<dyn Fn(&T) -> Option<Box<dyn EditSession>> + Send + Sync>;

/// An open edit on a provisional item.
pub trait EditSession: Send {
    /// Accepts the edit. Called when the item is committed.
    fn end_edit(&mut self);

    /// Discards the edit. Called when the item is canceled.
    fn cancel_edit(&mut self);
}

/// How an edit session ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum SessionOutcome {
    Ended,
    Canceled,
}

/// An edit session waiting to be closed once the view state is unlocked.
pub(crate) struct FinishedSession {
    session: Box<dyn EditSession>,
    outcome: SessionOutcome,
}

impl FinishedSession {
    pub(crate) fn close(mut self) {
        match self.outcome {
            SessionOutcome::Ended => self.session.end_edit(),
            SessionOutcome::Canceled => self.session.cancel_edit(),
        }
    }
}

pub(crate) struct Pending {
    pub(crate) key: ItemKey,
    session: Option<Box<dyn EditSession>>,
}

impl Pending {
    pub(crate) fn finish(self, outcome: SessionOutcome) -> Option<FinishedSession> {
        self.session.map(|session| FinishedSession { session, outcome })
    }
}

/// `Idle -> Adding -> Idle`.
#[derive(Default)]
pub(crate) enum Transaction {
    #[default]
    Idle,
    Adding(Pending),
}

impl Transaction {
    pub(crate) fn begin(key: ItemKey, session: Option<Box<dyn EditSession>>) -> Self {
        Self::Adding(Pending { key, session })
    }

    pub(crate) fn is_adding(&self) -> bool {
        matches!(self, Self::Adding(_))
    }

    /// Key of the provisional item.
    pub(crate) fn key(&self) -> Option<ItemKey> {
        match self {
            Self::Idle => None,
            Self::Adding(pending) => Some(pending.key),
        }
    }

    /// Detaches the edit session of the provisional item so it can be closed
    /// while the transaction stays open.
    pub(crate) fn take_session(&mut self, outcome: SessionOutcome) -> Option<FinishedSession> {
        match self {
            Self::Idle => None,
            Self::Adding(pending) => pending
                .session
                .take()
                .map(|session| FinishedSession { session, outcome }),
        }
    }

    /// Points the transaction at a new key for the same provisional item.
    pub(crate) fn rekey(&mut self, fresh: ItemKey) {
        if let Self::Adding(pending) = self {
            pending.key = fresh;
        }
    }

    /// Ends the transaction, returning what was pending.
    pub(crate) fn take(&mut self) -> Option<Pending> {
        match std::mem::take(self) {
            Self::Idle => None,
            Self::Adding(pending) => Some(pending),
        }
    }
}

impl std::fmt::Debug for Transaction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Idle => f.write_str("Idle"),
            Self::Adding(pending) => f
                .debug_struct("Adding")
                .field("key", &pending.key)
                .field("editing", &pending.session.is_some())
                .finish(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use slotmap::SlotMap;

    struct Recorder(Arc<Mutex<Vec<&'static str>>>);

    impl EditSession for Recorder {
        fn end_edit(&mut self) {
            self.0.lock().push("end");
        }

        fn cancel_edit(&mut self) {
            self.0.lock().push("cancel");
        }
    }

    #[test]
    fn test_take_returns_to_idle() {
        let mut keys: SlotMap<ItemKey, ()> = SlotMap::with_key();
        let key = keys.insert(());
        let mut tx = Transaction::begin(key, None);
        assert!(tx.is_adding());
        assert_eq!(tx.key(), Some(key));

        let fresh = keys.insert(());
        tx.rekey(fresh);
        assert_eq!(tx.key(), Some(fresh));

        let pending = tx.take().unwrap();
        assert_eq!(pending.key, fresh);
        assert!(!tx.is_adding());
        assert!(tx.take().is_none());
    }

    #[test]
    fn test_sessions_close_with_outcome() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut keys: SlotMap<ItemKey, ()> = SlotMap::with_key();

        for outcome in [SessionOutcome::Ended, SessionOutcome::Canceled] {
            let mut tx = Transaction::begin(keys.insert(()), Some(Box::new(Recorder(log.clone()))));
            tx.take().unwrap().finish(outcome).unwrap().close();
        }
        assert_eq!(*log.lock(), vec!["end", "cancel"]);
    }
}
