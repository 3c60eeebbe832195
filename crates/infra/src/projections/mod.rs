//! Projection implementations (read model builders).
//!
//! Projections consume group events and build query-optimized read models.
//! All projections are:
//! - **Rebuildable**: can be reconstructed from the event streams
//! - **Partitioned**: rows are keyed by the member that queries them
//! - **Idempotent**: re-delivered events are ignored via per-stream cursors

pub mod group_directory;

pub use group_directory::{GroupDirectoryError, GroupDirectoryProjection, GroupSummary};
