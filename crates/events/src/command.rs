use splitledger_core::AggregateId;

/// A command targets a specific aggregate.
///
/// Commands represent **intent** ("record this expense") and are transient;
/// the events they produce are what gets persisted. Because every command names
/// its target stream, infrastructure can serialize writers per aggregate while
/// letting different aggregates proceed in parallel.
pub trait Command: Clone + core::fmt::Debug + Send + Sync + 'static {
    fn target_aggregate_id(&self) -> AggregateId;
}
