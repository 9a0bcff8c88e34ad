//! Port definitions (trait abstractions) for storage backends.
//!
//! # Design Rules
//!
//! - No `sqlx` types in any signature
//! - Rows cross the boundary as `Record`, queries as `QuerySpec`
//! - Writes only happen inside a `StoreTransaction`

pub mod record_store;

pub use record_store::{RecordStore, StoreTransaction};
