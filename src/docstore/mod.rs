//! Document store backends.
//!
//! The document database owns every authoritative resource record; the
//! gateway only reads them (and writes share grants).

pub mod firestore;
pub mod memory;
pub mod store;
