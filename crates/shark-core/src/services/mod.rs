//! Core services - entity persistence on top of the store port.
//!
//! Services here are pure orchestrators: they turn entities into records,
//! run hooks and publish events, and leave SQL to the adapter behind
//! [`RecordStore`](crate::ports::RecordStore).

mod orm;
mod transaction;

pub use orm::Orm;
pub use transaction::Transaction;
