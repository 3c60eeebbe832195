//! Event-sourcing mechanics shared by the ledger domain and infrastructure.
//!
//! Nothing in here knows about groups or money: it defines what an event is,
//! how it travels (`EventEnvelope`), and how read models are rebuilt from a
//! stream (`Projection`, `ProjectionRunner`).

pub mod command;
pub mod envelope;
pub mod event;
pub mod handler;
pub mod projection;
pub mod runner;

pub use command::Command;
pub use envelope::EventEnvelope;
pub use event::Event;
pub use handler::execute;
pub use projection::Projection;
pub use runner::{ProjectionCursor, ProjectionError, ProjectionRunner};
