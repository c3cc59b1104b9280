//! # storefront-storage
//!
//! Durable store abstraction for the storefront services.
//!
//! This crate defines the contract the cache loaders and the order worker
//! use. Implementations live in `storefront-db-memory` and
//! `storefront-db-postgres`.
//!
//! ## Example
//!
//! ```ignore
//! use storefront_storage::{StorageError, StorageResult, StorefrontStorage};
//!
//! async fn stock_left(storage: &dyn StorefrontStorage, id: i64) -> StorageResult<i32> {
//!     let voucher = storage
//!         .get_voucher(id)
//!         .await?
//!         .ok_or_else(|| StorageError::not_found("voucher", id))?;
//!     Ok(voucher.stock)
//! }
//! ```

mod error;
mod traits;

pub use error::{ErrorCategory, StorageError};
pub use traits::{OrderTransaction, StorefrontStorage};

/// Type alias for a storage result.
pub type StorageResult<T> = Result<T, StorageError>;

/// Type alias for a shareable storage trait object.
pub type DynStorage = std::sync::Arc<dyn StorefrontStorage>;

/// Prelude module for convenient imports.
pub mod prelude {
    pub use crate::{
        DynStorage, ErrorCategory, OrderTransaction, StorageError, StorageResult,
        StorefrontStorage,
    };
}
