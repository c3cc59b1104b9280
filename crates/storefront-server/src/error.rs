//! Errors of the shop and voucher services.

use storefront_kv::KvError;
use storefront_storage::StorageError;
use thiserror::Error;

use crate::cache::CacheError;

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error(transparent)]
    Cache(#[from] CacheError),

    #[error(transparent)]
    Kv(#[from] KvError),
}

impl ServiceError {
    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::InvalidInput(message.into())
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::Storage(e) if e.is_not_found())
    }
}

pub type ServiceResult<T> = Result<T, ServiceError>;
