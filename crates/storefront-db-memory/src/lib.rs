//! In-memory durable store backend for storefront.
//!
//! This crate provides an in-memory implementation of the
//! [`StorefrontStorage`] trait from `storefront-storage`. Transactions are
//! serialized and work on a private copy of the tables, so a rollback (or a
//! dropped transaction) leaves no trace.
//!
//! # Example
//!
//! ```ignore
//! use storefront_db_memory::InMemoryStorage;
//! use storefront_storage::StorefrontStorage;
//!
//! let storage = InMemoryStorage::new();
//! storage.insert_shop(shop).await;
//! let found = storage.get_shop(1).await?;
//! ```

pub mod storage;

pub use storage::{InMemoryStorage, InMemoryTransaction};
pub use storefront_storage::{StorageError, StorefrontStorage};

/// Creates a new shareable in-memory store.
pub fn create_storage() -> storefront_storage::DynStorage {
    std::sync::Arc::new(InMemoryStorage::new())
}
