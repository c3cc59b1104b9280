//! Flash-sale purchase pipeline: admission in the KV store, then eventual
//! persistence by a single background worker.

pub mod admission;
pub mod error;
pub mod intent;
pub mod persistence;
pub mod transport;
pub mod worker;

pub use admission::AdmissionController;
pub use error::{Admission, Rejection, SeckillError, SeckillResult};
pub use persistence::{OrderPersister, PersistOutcome};
pub use transport::{IntentFeed, IntentSink, StreamFeed, intent_channel};
pub use worker::OrderWorker;
