use storefront_kv::KvError;
use storefront_storage::StorageError;
use thiserror::Error;

use crate::cache::CacheError;
use crate::id_worker::IdError;
use crate::lock::LockError;

/// Why a purchase attempt was turned away. These are answers, not faults.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rejection {
    /// No such voucher.
    NotFound,
    NotStarted,
    Ended,
    SoldOut,
    /// The user already holds an admission for this voucher.
    DuplicatePurchase,
}

impl Rejection {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NotFound => "not_found",
            Self::NotStarted => "not_started",
            Self::Ended => "ended",
            Self::SoldOut => "sold_out",
            Self::DuplicatePurchase => "duplicate",
        }
    }
}

impl std::fmt::Display for Rejection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of [`crate::seckill::AdmissionController::admit`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    /// Stock is reserved; the order row is written later by the worker.
    Accepted { order_id: i64 },
    Rejected(Rejection),
}

impl Admission {
    pub fn order_id(&self) -> Option<i64> {
        match self {
            Self::Accepted { order_id } => Some(*order_id),
            Self::Rejected(_) => None,
        }
    }
}

#[derive(Debug, Error)]
pub enum SeckillError {
    #[error("KV store error: {0}")]
    Kv(#[from] KvError),

    #[error("Durable store error: {0}")]
    Storage(#[from] StorageError),

    #[error("Voucher lookup failed: {0}")]
    Cache(#[from] CacheError),

    #[error("Order id generation failed: {0}")]
    Id(#[from] IdError),

    #[error("Order queue is closed")]
    QueueClosed,

    #[error("Malformed order intent in entry {entry_id}: {reason}")]
    MalformedIntent { entry_id: String, reason: String },
}

impl SeckillError {
    /// Coarse failure class, used as the `category` label on failed orders.
    pub fn category(&self) -> &'static str {
        match self {
            Self::Kv(_) => "kv",
            Self::Storage(e) => e.category().as_str(),
            Self::Cache(_) => "cache",
            Self::Id(_) => "id",
            Self::QueueClosed => "queue_closed",
            Self::MalformedIntent { .. } => "malformed",
        }
    }

    pub fn malformed(entry_id: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::MalformedIntent {
            entry_id: entry_id.into(),
            reason: reason.into(),
        }
    }
}

impl From<LockError> for SeckillError {
    fn from(err: LockError) -> Self {
        match err {
            LockError::Kv(e) => Self::Kv(e),
        }
    }
}

pub type SeckillResult<T> = Result<T, SeckillError>;
