//! Blob store backends.
//!
//! The blob store holds the actual photo, thumbnail and brand asset bytes.
//! Durability and replication are the provider's problem; the gateway only
//! proxies get/put/delete/list.

pub mod backend;
pub mod gcs;
pub mod memory;
