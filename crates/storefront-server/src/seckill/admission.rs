//! Flash-sale admission.
//!
//! Eligibility and stock reservation run as one [`KvScript::Admit`] call, so
//! concurrent admissions for a voucher are totally ordered by the KV store.
//! An accepted purchase is reported as soon as stock is reserved; the order
//! row is written later by the [`super::OrderWorker`] and there is no path
//! back to the caller if that write fails.

use storefront_core::{OrderIntent, WindowStatus, now_utc};
use storefront_kv::{AdmitStatus, DynKvStore, KvError, KvScript};

use super::error::{Admission, Rejection, SeckillError, SeckillResult};
use super::intent;
use super::transport::IntentSink;
use crate::id_worker::IdWorker;
use crate::keys::{ORDER_ID_PREFIX, admitted_key, stock_key};
use crate::metrics;
use crate::voucher::VoucherService;

#[derive(Clone)]
pub struct AdmissionController {
    kv: DynKvStore,
    vouchers: VoucherService,
    ids: IdWorker,
    sink: IntentSink,
}

impl AdmissionController {
    pub fn new(kv: DynKvStore, vouchers: VoucherService, ids: IdWorker, sink: IntentSink) -> Self {
        Self {
            kv,
            vouchers,
            ids,
            sink,
        }
    }

    /// Tries to reserve one unit of `voucher_id` for `user_id`.
    ///
    /// Rejections are `Ok`; `Err` is reserved for infrastructure faults.
    pub async fn admit(&self, voucher_id: i64, user_id: i64) -> SeckillResult<Admission> {
        let admission = self.try_admit(voucher_id, user_id).await?;
        match admission {
            Admission::Accepted { order_id } => {
                metrics::record_admission("accepted");
                tracing::info!(order_id, user_id, voucher_id, "Purchase admitted");
            }
            Admission::Rejected(reason) => {
                metrics::record_admission(reason.as_str());
                tracing::debug!(user_id, voucher_id, reason = %reason, "Purchase rejected");
            }
        }
        Ok(admission)
    }

    async fn try_admit(&self, voucher_id: i64, user_id: i64) -> SeckillResult<Admission> {
        let Some(voucher) = self.vouchers.find(voucher_id).await? else {
            return Ok(Admission::Rejected(Rejection::NotFound));
        };

        let now = now_utc();
        match voucher.window().status_at(now) {
            WindowStatus::NotStarted => return Ok(Admission::Rejected(Rejection::NotStarted)),
            WindowStatus::Ended => return Ok(Admission::Rejected(Rejection::Ended)),
            WindowStatus::Open => {}
        }

        // Reserving stock nobody will turn into an order would leak it
        if self.sink.is_closed() {
            return Err(SeckillError::QueueClosed);
        }

        let order_id = self.ids.next_id(ORDER_ID_PREFIX).await?;
        let intent = OrderIntent {
            order_id,
            user_id,
            voucher_id,
            created_at: now,
        };

        let mut keys = vec![stock_key(voucher_id), admitted_key(voucher_id)];
        let mut args = vec![user_id.to_string()];
        if let Some(stream_key) = self.sink.stream_key() {
            keys.push(stream_key.to_string());
            args.extend(
                intent::to_fields(&intent)?
                    .into_iter()
                    .flat_map(|(field, value)| [field, value]),
            );
        }

        let code = self.kv.eval(KvScript::Admit, &keys, &args).await?;
        let status = AdmitStatus::from_code(code).ok_or_else(|| {
            KvError::unexpected_reply("EVAL admit", format!("unknown status code {code}"))
        })?;

        match status {
            AdmitStatus::Reserved => {
                if let Err(e) = self.sink.publish(intent).await {
                    self.cancel_reservation(&keys[..2], user_id, voucher_id).await;
                    return Err(e);
                }
                Ok(Admission::Accepted { order_id })
            }
            AdmitStatus::SoldOut => Ok(Admission::Rejected(Rejection::SoldOut)),
            AdmitStatus::Duplicate => Ok(Admission::Rejected(Rejection::DuplicatePurchase)),
        }
    }

    /// Returns a reserved unit to stock and forgets the user's admission.
    async fn cancel_reservation(&self, keys: &[String], user_id: i64, voucher_id: i64) {
        let args = [user_id.to_string()];
        match self.kv.eval(KvScript::CancelAdmit, keys, &args).await {
            Ok(_) => {
                metrics::record_admission("cancelled");
                tracing::warn!(user_id, voucher_id, "Order queue closed, reservation cancelled");
            }
            Err(e) => {
                tracing::error!(user_id, voucher_id, error = %e, "Failed to cancel reservation");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;

    use storefront_core::SeckillVoucher;
    use storefront_db_memory::InMemoryStorage;
    use storefront_kv::{KvStore, MemoryKvStore};

    use crate::cache::{CacheClient, RebuildPool};
    use crate::config::{CacheConfig, IntentTransport, SeckillConfig};
    use crate::lock::LockClient;
    use crate::seckill::transport::{IntentFeed, intent_channel};

    async fn setup(capacity: usize) -> (AdmissionController, IntentFeed, Arc<MemoryKvStore>) {
        let kv = Arc::new(MemoryKvStore::new());
        let storage = Arc::new(InMemoryStorage::new());
        let cache = CacheClient::new(
            kv.clone(),
            LockClient::new(kv.clone()),
            Arc::new(RebuildPool::new(1)),
            CacheConfig::default(),
        );
        let vouchers = VoucherService::new(
            storage,
            kv.clone(),
            cache,
            Duration::from_secs(60),
        );
        let now = now_utc();
        vouchers
            .add_seckill_voucher(&SeckillVoucher {
                voucher_id: 1,
                stock: 5,
                begin_time: now - Duration::from_secs(60),
                end_time: now + Duration::from_secs(3600),
            })
            .await
            .unwrap();

        let (sink, feed) = intent_channel(&SeckillConfig {
            transport: IntentTransport::Queue,
            queue_capacity: capacity,
            ..Default::default()
        });
        let admission =
            AdmissionController::new(kv.clone(), vouchers, IdWorker::new(kv.clone()), sink);
        (admission, feed, kv)
    }

    #[tokio::test]
    async fn test_closed_queue_reserves_nothing() {
        let (admission, feed, kv) = setup(4).await;
        drop(feed);

        let first = admission.admit(1, 7).await;
        assert!(matches!(first, Err(SeckillError::QueueClosed)));
        assert_eq!(kv.get(&stock_key(1)).await.unwrap().as_deref(), Some("5"));

        // Not remembered as a purchase
        let retry = admission.admit(1, 7).await;
        assert!(matches!(retry, Err(SeckillError::QueueClosed)));
        assert_eq!(kv.get(&stock_key(1)).await.unwrap().as_deref(), Some("5"));
    }

    #[tokio::test]
    async fn test_reservation_cancelled_when_queue_closes_during_send() {
        let (admission, feed, kv) = setup(1).await;

        let first = admission.admit(1, 7).await.unwrap();
        assert!(matches!(first, Admission::Accepted { .. }));

        // The queue is full, so this admission reserves and then waits in send
        let blocked = tokio::spawn({
            let admission = admission.clone();
            async move { admission.admit(1, 8).await }
        });
        for _ in 0..200 {
            if kv.get(&stock_key(1)).await.unwrap().as_deref() == Some("3") {
                break;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        assert_eq!(kv.get(&stock_key(1)).await.unwrap().as_deref(), Some("3"));

        drop(feed);
        let second = blocked.await.unwrap();
        assert!(matches!(second, Err(SeckillError::QueueClosed)));

        // User 8 got the unit back; user 7's accepted purchase still stands
        assert_eq!(kv.get(&stock_key(1)).await.unwrap().as_deref(), Some("4"));
        let keys = [stock_key(1), admitted_key(1)];
        let already_cancelled = kv
            .eval(KvScript::CancelAdmit, &keys, &["8".to_string()])
            .await
            .unwrap();
        assert_eq!(already_cancelled, 0);
        let still_admitted = kv
            .eval(KvScript::CancelAdmit, &keys, &["7".to_string()])
            .await
            .unwrap();
        assert_eq!(still_admitted, 1);
    }
}
