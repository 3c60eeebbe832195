//! Command execution pipeline (application-level orchestration).
//!
//! ```text
//! Command
//!   ↓
//! 0. Acquire the write lock for the command's target stream
//!   ↓
//! 1. Load + rehydrate the aggregate through its repository
//!   ↓
//! 2. Handle command (pure decision logic, produces events)
//!   ↓
//! 3. Save events (append-only, optimistic concurrency check)
//!   ↓
//! 4. Notify commit observers (read models), still under the lock
//!   ↓
//! 5. Apply the committed events to the in-memory aggregate and return it
//! ```
//!
//! The lock serializes writers per stream; the optimistic check in the store
//! still rejects any writer that bypassed it. This module contains no IO
//! itself; it composes the repository and observer traits.

use std::sync::Arc;

use serde::de::DeserializeOwned;

use splitledger_core::{Aggregate, AggregateId, DomainError, ExpectedVersion};
use splitledger_events::{Command, ProjectionError};

use crate::event_store::{EventStoreError, StoredEvent};
use crate::stream_locks::StreamLocks;

#[derive(Debug)]
pub enum DispatchError {
    /// Optimistic concurrency failure or a stale/duplicate command.
    Concurrency(String),
    /// Domain validation failure (deterministic).
    Validation(String),
    InvalidPayer(String),
    InvalidSplit(String),
    InvalidAmount(String),
    MemberNotFound(String),
    SettlementNotFound(String),
    /// Domain invariant failure (deterministic).
    InvariantViolation(String),
    /// Domain-level not found.
    NotFound,
    /// Failed to deserialize historical event payloads into the aggregate event type.
    Deserialize(String),
    /// Replaying the stream through a projection failed.
    Replay(ProjectionError),
    /// Loading from or persisting to the event store failed.
    Store(EventStoreError),
}

impl From<EventStoreError> for DispatchError {
    fn from(value: EventStoreError) -> Self {
        match &value {
            EventStoreError::Concurrency(msg) => DispatchError::Concurrency(msg.clone()),
            _ => DispatchError::Store(value),
        }
    }
}

impl From<DomainError> for DispatchError {
    fn from(value: DomainError) -> Self {
        match value {
            DomainError::Validation(msg) => DispatchError::Validation(msg),
            DomainError::InvalidPayer(msg) => DispatchError::InvalidPayer(msg),
            DomainError::InvalidSplit(msg) => DispatchError::InvalidSplit(msg),
            DomainError::InvalidAmount(msg) => DispatchError::InvalidAmount(msg),
            DomainError::MemberNotFound(msg) => DispatchError::MemberNotFound(msg),
            DomainError::SettlementNotFound(msg) => DispatchError::SettlementNotFound(msg),
            DomainError::InvariantViolation(msg) => DispatchError::InvariantViolation(msg),
            DomainError::Conflict(msg) => DispatchError::Concurrency(msg),
            DomainError::NotFound => DispatchError::NotFound,
            DomainError::InvalidId(msg) => DispatchError::Validation(msg),
        }
    }
}

impl From<ProjectionError> for DispatchError {
    fn from(value: ProjectionError) -> Self {
        DispatchError::Replay(value)
    }
}

/// Storage collaborator for an event-sourced aggregate.
///
/// `load` rehydrates current state (`None` when the stream does not exist yet);
/// `save` appends newly decided events against an expected stream version.
pub trait AggregateRepository<A: Aggregate>: Send + Sync {
    fn load(&self, aggregate_id: AggregateId) -> Result<Option<A>, DispatchError>;

    fn save(
        &self,
        aggregate_id: AggregateId,
        expected_version: ExpectedVersion,
        events: &[A::Event],
    ) -> Result<Vec<StoredEvent>, DispatchError>;
}

/// Receives committed events of a stream in sequence order.
///
/// Called while the stream's write lock is held, after the append succeeded.
/// Observers own their failure handling: the events are already durable.
pub trait CommitObserver: Send + Sync {
    fn committed(&self, events: &[StoredEvent]);
}

/// Result of a successful dispatch.
#[derive(Debug)]
pub struct Dispatched<A: Aggregate> {
    /// State after the new events were applied.
    pub aggregate: A,
    /// Events decided by the aggregate (empty for an idempotent no-op).
    pub events: Vec<A::Event>,
    /// The same events as persisted, with sequence numbers.
    pub committed: Vec<StoredEvent>,
}

/// Reusable command execution engine for event-sourced aggregates.
///
/// - **Atomicity**: a command either appends all of its events or none.
/// - **Isolation**: each command operates on a single aggregate stream, under
///   that stream's write lock.
/// - **Determinism**: aggregates are rehydrated from history and decide
///   without IO.
pub struct CommandDispatcher<R> {
    repository: R,
    locks: StreamLocks,
    observers: Vec<Arc<dyn CommitObserver>>,
}

impl<R> CommandDispatcher<R> {
    pub fn new(repository: R) -> Self {
        Self {
            repository,
            locks: StreamLocks::new(),
            observers: Vec::new(),
        }
    }

    /// Register an observer notified after every successful append.
    pub fn with_observer(mut self, observer: Arc<dyn CommitObserver>) -> Self {
        self.observers.push(observer);
        self
    }

    pub fn repository(&self) -> &R {
        &self.repository
    }

    /// Dispatch a command through the full pipeline.
    ///
    /// `make_aggregate` builds the empty instance used when the target stream
    /// does not exist yet (creation commands).
    #[tracing::instrument(
        skip_all,
        fields(aggregate_id = %command.target_aggregate_id())
    )]
    pub fn dispatch<A>(
        &self,
        command: A::Command,
        make_aggregate: impl FnOnce(AggregateId) -> A,
    ) -> Result<Dispatched<A>, DispatchError>
    where
        R: AggregateRepository<A>,
        A: Aggregate<Error = DomainError>,
        A::Command: Command,
    {
        let aggregate_id = command.target_aggregate_id();

        self.locks.with_lock(aggregate_id, || -> Result<Dispatched<A>, DispatchError> {
            // 1) Load + rehydrate
            let mut aggregate = match self.repository.load(aggregate_id)? {
                Some(existing) => existing,
                None => make_aggregate(aggregate_id),
            };
            let expected = ExpectedVersion::Exact(aggregate.version());

            // 2) Decide (no mutation)
            let events = aggregate.handle(&command)?;
            if events.is_empty() {
                tracing::debug!("command produced no events");
                return Ok(Dispatched {
                    aggregate,
                    events,
                    committed: Vec::new(),
                });
            }

            // 3) Persist (append-only, optimistic)
            let committed = self.repository.save(aggregate_id, expected, &events)?;

            // 4) Notify (after append)
            for observer in &self.observers {
                observer.committed(&committed);
            }

            // 5) Evolve
            for ev in &events {
                aggregate.apply(ev);
            }

            tracing::debug!(
                events = committed.len(),
                version = aggregate.version(),
                "command committed"
            );

            Ok(Dispatched {
                aggregate,
                events,
                committed,
            })
        })
    }
}

/// Ensure a loaded stream belongs to `aggregate_id` and is strictly increasing.
pub(crate) fn validate_loaded_stream(
    aggregate_id: AggregateId,
    stream: &[StoredEvent],
) -> Result<(), DispatchError> {
    let mut last = 0u64;
    for (idx, e) in stream.iter().enumerate() {
        if e.aggregate_id != aggregate_id {
            return Err(DispatchError::Store(EventStoreError::InvalidAppend(format!(
                "loaded stream contains wrong aggregate_id at index {idx}"
            ))));
        }
        if e.sequence_number == 0 {
            return Err(DispatchError::Store(EventStoreError::InvalidAppend(
                "stored event has sequence_number=0".to_string(),
            )));
        }
        if e.sequence_number <= last {
            return Err(DispatchError::Store(EventStoreError::InvalidAppend(format!(
                "non-monotonic sequence_number in loaded stream (last={last}, found={})",
                e.sequence_number
            ))));
        }
        last = e.sequence_number;
    }
    Ok(())
}

/// Decode a stored payload into a typed domain event.
pub(crate) fn decode_event<E: DeserializeOwned>(stored: &StoredEvent) -> Result<E, DispatchError> {
    serde_json::from_value(stored.payload.clone()).map_err(|e| {
        DispatchError::Deserialize(format!(
            "{} at sequence {}: {e}",
            stored.event_type, stored.sequence_number
        ))
    })
}
