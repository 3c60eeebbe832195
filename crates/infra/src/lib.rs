//! Infrastructure layer: event storage, write serialization, repositories,
//! read models, configuration and the `GroupLedger` service.

pub mod command_dispatcher;
pub mod config;
pub mod directory;
pub mod event_store;
pub mod group_ledger;
pub mod projections;
pub mod read_model;
pub mod repository;
pub mod stream_locks;

pub use config::LedgerConfig;
pub use directory::{DirectoryError, InMemoryMemberDirectory, MemberDirectory};
pub use group_ledger::{
    GroupLedger, InMemoryGroupLedger, LedgerError, LedgerResult, MemberSummary, NewExpense,
};
pub use projections::GroupSummary;
pub use repository::{EventSourcedGroupRepository, GroupRepository};
