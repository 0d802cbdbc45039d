//! Collection views.
//!
//! A [`CollectionView`] presents an [`ItemSource`] filtered, sorted,
//! grouped and paged, without copying the source's ownership of its items.
//! It keeps itself current as the source changes and reports every visible
//! change through [`ViewSignals`].
//!
//! # Core Types
//!
//! - `CollectionView`: The view engine and its handle
//! - `CollectionViewBuilder`: Configures a view before it first loads
//! - `ItemSource`: The trait sources implement
//! - `ObservableList`, `PlainList`, `FixedList`: Ready-made sources
//! - `FilterSpec`, `SortDescription`, `GroupDescription`: What the view shows
//! - `ViewGroup`: A snapshot of the group tree
//! - `DeferGuard`: Batches several changes into one refresh
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use horizon_collections::view::{
//!     CollectionView, GroupDescription, ObservableList, SortDescription, SortDirection, ViewChange,
//! };
//!
//! let source = Arc::new(ObservableList::new(vec![4, 1, 3, 2]));
//! let view = CollectionView::new(source.clone());
//!
//! view.signals().collection_changed.connect(|change| match change {
//!     ViewChange::Added { item, index } => println!("{item} added at {index}"),
//!     ViewChange::Removed { item, index } => println!("{item} removed from {index}"),
//!     ViewChange::Reset => println!("reset"),
//! });
//!
//! {
//!     let _defer = view.defer_refresh().unwrap();
//!     view.set_sort_descriptions(vec![SortDescription::by_key("n", |n: &i32| *n, SortDirection::Ascending)])
//!         .unwrap();
//!     view.add_group_description(GroupDescription::new("parity", |n: &i32| n % 2 == 0)).unwrap();
//! }
//!
//! assert_eq!(view.snapshot().unwrap(), vec![1, 3, 2, 4]);
//! let root = view.groups().unwrap();
//! assert_eq!(root.item_count, 4);
//! ```
//!
//! # Architecture Overview
//!
//! ```text
//! ┌──────────────┐  SourceChange  ┌──────────────┐
//! │  ItemSource  │───────────────>│ SourceAdapter│
//! │              │  (or version)  └──────┬───────┘
//! └──────────────┘                       │
//!        ▲                               ▼
//!        │ insert/remove          ┌──────────────┐   filter + sort
//!        │                        │   Pipeline   │  (internal list)
//! ┌──────┴───────┐                └──────┬───────┘
//! │ Transaction  │                       ▼
//! │  (add-new)   │                ┌──────────────┐   group trees
//! └──────────────┘                │  GroupTree   │
//!                                 └──────┬───────┘
//!                                        ▼
//!                                 ┌──────────────┐   page window
//!                                 │    Pager     │
//!                                 └──────┬───────┘
//!                                        ▼
//!                                 ┌──────────────┐
//!                                 │ ViewSignals  │──> slots
//!                                 └──────────────┘
//! ```
//!
//! Every operation runs under one state lock. Notifications, edit-session
//! callbacks and writes to the source happen after the lock is released.

mod collection_view;
mod config;
mod currency;
mod defer;
mod filter;
mod group;
mod notify;
mod pager;
mod pipeline;
mod sort;
mod source;
mod transaction;

pub use collection_view::{CollectionView, CollectionViewBuilder, ViewIter};
pub use config::ViewConfig;
pub use defer::DeferGuard;
pub use filter::{FilterClause, FilterFn, FilterSpec};
pub use group::{GroupDescription, GroupKey, GroupKeyFn, ViewGroup, ViewGroupChild};
pub use notify::{CurrentChanging, PageChanging, ViewChange, ViewSignals};
pub use sort::{CompareFn, SortDescription, SortDirection};
pub use source::{FixedList, ItemSource, ObservableList, PlainList, SourceChange};
pub use transaction::{EditHook, EditSession, ItemFactory};
