//! Partitioned read model storage abstractions.

pub mod partitioned_store;

pub use partitioned_store::{InMemoryPartitionedStore, PartitionedStore};
