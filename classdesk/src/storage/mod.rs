//! Storage module
//!
//! Persistent key-value storage for single-device data: the user profile,
//! app settings, notes and lesson plans. Each logical record lives under a
//! fixed key as one JSON document that is rewritten in full on every save.

pub mod backend;
pub mod local_store;

pub use backend::{FileBackend, KeyValueBackend, MemoryBackend};
pub use local_store::LocalStore;
