//! Horizon Collections - live views over observable collections.
//!
//! This is the main crate. It re-exports the core signal, error and logging
//! types and provides the collection view engine in [`view`].
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use horizon_collections::view::{CollectionView, ObservableList};
//!
//! let source = Arc::new(ObservableList::new(vec!["pear", "apple", "fig"]));
//! let view = CollectionView::new(source.clone());
//!
//! view.signals().count_changed.connect(|count| {
//!     println!("{count} items visible");
//! });
//!
//! view.set_filter(|name: &&str| name.len() > 3).unwrap();
//! assert_eq!(view.snapshot().unwrap(), vec!["pear", "apple"]);
//!
//! source.push("banana");
//! assert_eq!(view.count().unwrap(), 3);
//! ```

pub use horizon_collections_core::*;

pub mod view;
