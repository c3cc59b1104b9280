//! The hand-off between admission and the order worker.
//!
//! With the stream transport the admission script appends the intent itself,
//! so reservation and hand-off are one atomic step and survive restarts. The
//! queue transport sends after the script returns; anything still queued is
//! lost if the process dies. A reservation whose send fails is cancelled.

use std::time::Duration;

use storefront_core::OrderIntent;
use tokio::sync::mpsc;

use super::error::{SeckillError, SeckillResult};
use crate::config::{IntentTransport, SeckillConfig};

/// Producer side, held by the admission controller.
#[derive(Debug, Clone)]
pub enum IntentSink {
    Stream { stream_key: String },
    Queue(mpsc::Sender<OrderIntent>),
}

/// Consumer side, owned by the order worker.
#[derive(Debug)]
pub enum IntentFeed {
    Stream(StreamFeed),
    Queue(mpsc::Receiver<OrderIntent>),
}

/// Consumer-group coordinates of the order stream.
#[derive(Debug, Clone)]
pub struct StreamFeed {
    pub stream_key: String,
    pub group: String,
    pub consumer: String,
    pub block: Duration,
}

pub fn intent_channel(config: &SeckillConfig) -> (IntentSink, IntentFeed) {
    match config.transport {
        IntentTransport::Stream => (
            IntentSink::Stream {
                stream_key: config.stream_key.clone(),
            },
            IntentFeed::Stream(StreamFeed {
                stream_key: config.stream_key.clone(),
                group: config.group.clone(),
                consumer: config.consumer.clone(),
                block: config.block(),
            }),
        ),
        IntentTransport::Queue => {
            let (tx, rx) = mpsc::channel(config.queue_capacity);
            (IntentSink::Queue(tx), IntentFeed::Queue(rx))
        }
    }
}

impl IntentSink {
    /// Stream key the admission script should append to, if any.
    pub fn stream_key(&self) -> Option<&str> {
        match self {
            Self::Stream { stream_key } => Some(stream_key),
            Self::Queue(_) => None,
        }
    }

    /// Whether the worker side is gone and no intent can be handed off.
    pub fn is_closed(&self) -> bool {
        match self {
            Self::Stream { .. } => false,
            Self::Queue(tx) => tx.is_closed(),
        }
    }

    /// Hands an admitted intent to the queue. A no-op for the stream
    /// transport, where the script already appended it.
    ///
    /// Waits for capacity when the queue is full.
    pub async fn publish(&self, intent: OrderIntent) -> SeckillResult<()> {
        match self {
            Self::Stream { .. } => Ok(()),
            Self::Queue(tx) => tx.send(intent).await.map_err(|_| SeckillError::QueueClosed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use storefront_core::now_utc;

    #[tokio::test]
    async fn test_queue_transport_delivers() {
        let config = SeckillConfig {
            transport: IntentTransport::Queue,
            queue_capacity: 4,
            ..Default::default()
        };
        let (sink, feed) = intent_channel(&config);
        assert_eq!(sink.stream_key(), None);

        let intent = OrderIntent {
            order_id: 1,
            user_id: 2,
            voucher_id: 3,
            created_at: now_utc(),
        };
        sink.publish(intent.clone()).await.unwrap();

        let IntentFeed::Queue(mut rx) = feed else {
            panic!("expected queue feed");
        };
        assert_eq!(rx.recv().await, Some(intent.clone()));

        assert!(!sink.is_closed());
        drop(rx);
        assert!(sink.is_closed());
        assert!(matches!(sink.publish(intent).await, Err(SeckillError::QueueClosed)));
    }

    #[test]
    fn test_stream_transport_uses_configured_names() {
        let (sink, feed) = intent_channel(&SeckillConfig::default());
        assert_eq!(sink.stream_key(), Some("stream.orders"));
        assert!(!sink.is_closed());
        let IntentFeed::Stream(feed) = feed else {
            panic!("expected stream feed");
        };
        assert_eq!(feed.group, "g1");
        assert_eq!(feed.consumer, "c1");
    }
}
