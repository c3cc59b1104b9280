use storefront_kv::KvError;
use thiserror::Error;

use crate::lock::LockError;

/// Boxed error returned by a source loader.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("Cache store error: {0}")]
    Kv(#[from] KvError),

    #[error("Cache payload serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The loader for a cache miss failed.
    #[error("Source lookup failed: {0}")]
    Source(#[source] BoxError),

    /// Another caller held the rebuild lock for every retry.
    #[error("Rebuild of {key} still contended after {attempts} attempts")]
    RebuildContended { key: String, attempts: u32 },
}

impl CacheError {
    pub fn source_error(err: impl Into<BoxError>) -> Self {
        Self::Source(err.into())
    }
}

impl From<LockError> for CacheError {
    fn from(err: LockError) -> Self {
        match err {
            LockError::Kv(e) => Self::Kv(e),
        }
    }
}

pub type CacheResult<T> = Result<T, CacheError>;
