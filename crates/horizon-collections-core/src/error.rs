//! Error types for Horizon Collections.

/// The error type for collection view operations.
///
/// Every variant is raised synchronously to the caller of the failing
/// operation. None of them is retried internally, with one exception:
/// [`ViewError::StaleEnumerator`] raised by the polling source tracker is
/// converted into a scheduled refresh instead of being surfaced.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ViewError {
    /// The operation is not supported by this view or its source
    /// (filtering disabled, read-only or fixed-size source, no item factory).
    #[error("Operation not supported: {0}")]
    UnsupportedOperation(&'static str),

    /// The operation is not allowed while an add-new transaction is open.
    #[error("'{0}' is not allowed while an add-new transaction is open")]
    InvalidDuringTransaction(&'static str),

    /// The operation is not allowed while a refresh is deferred.
    #[error("'{0}' is not allowed while a refresh is deferred")]
    InvalidWhileDeferred(&'static str),

    /// An index was outside of the visible range.
    #[error("Index {index} is out of range (count {count})")]
    IndexOutOfRange {
        /// The requested index.
        index: usize,
        /// The number of items visible at the time of the request.
        count: usize,
    },

    /// The collection changed while it was being enumerated.
    #[error("The collection was modified; enumeration can not continue")]
    StaleEnumerator,

    /// A value left the view in an invalid selection state.
    #[error("Invalid selection state: {0}")]
    InvalidSelectionState(String),

    /// A view configuration could not be parsed.
    #[error("Invalid view configuration: {0}")]
    Config(String),
}

impl ViewError {
    /// Create an index error.
    pub fn out_of_range(index: usize, count: usize) -> Self {
        Self::IndexOutOfRange { index, count }
    }

    /// Create a selection state error.
    pub fn invalid_selection(message: impl Into<String>) -> Self {
        Self::InvalidSelectionState(message.into())
    }

    /// Returns `true` if this error means the view must be refreshed
    /// before it can be read again.
    pub fn is_stale(&self) -> bool {
        matches!(self, Self::StaleEnumerator)
    }
}

/// A specialized Result type for collection view operations.
pub type Result<T> = std::result::Result<T, ViewError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let err = ViewError::out_of_range(5, 3);
        assert_eq!(err.to_string(), "Index 5 is out of range (count 3)");

        let err = ViewError::InvalidDuringTransaction("set_filter");
        assert!(err.to_string().contains("set_filter"));
    }

    #[test]
    fn test_is_stale() {
        assert!(ViewError::StaleEnumerator.is_stale());
        assert!(!ViewError::invalid_selection("negative").is_stale());
    }
}
