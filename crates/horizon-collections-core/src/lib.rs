//! Core systems for Horizon Collections.
//!
//! This crate provides the foundational pieces shared by the collection view
//! engine and its consumers:
//!
//! - **Signal/Slot System**: Type-safe, synchronous change notification
//! - **Errors**: The [`ViewError`] type returned by every fallible operation
//! - **Logging**: `tracing` targets and span helpers
//!
//! # Signal/Slot Example
//!
//! ```
//! use horizon_collections_core::Signal;
//!
//! let item_added = Signal::<(String, usize)>::new();
//!
//! let conn_id = item_added.connect(|(item, index)| {
//!     println!("{} added at {}", item, index);
//! });
//!
//! item_added.emit(("apple".to_string(), 0));
//! item_added.disconnect(conn_id);
//! ```

mod error;
pub mod logging;
pub mod signal;

pub use error::{Result, ViewError};
pub use logging::PerfSpan;
pub use signal::{ConnectionGuard, ConnectionId, Signal};
