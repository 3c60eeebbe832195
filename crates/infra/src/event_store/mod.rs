//! Append-only event store boundary.
//!
//! Infrastructure-facing abstraction for storing and loading aggregate event
//! streams without making any storage assumptions.

pub mod in_memory;
pub mod r#trait;

pub use in_memory::InMemoryEventStore;
pub use r#trait::{EventStore, EventStoreError, StoredEvent, UncommittedEvent};
