use crate::{Event, EventEnvelope};

/// A projection builds a read model from an append-only event stream.
///
/// Read models are **disposable**: they can be dropped and rebuilt by replaying
/// the stream, which is how cached ledger balances are checked against the
/// expense history.
///
/// `apply` must be deterministic. Sequencing and duplicate handling are the
/// job of `ProjectionRunner`.
pub trait Projection {
    type Ev: Event;

    /// Apply a single event to the projection, updating the read model.
    fn apply(&mut self, envelope: &EventEnvelope<Self::Ev>);
}
