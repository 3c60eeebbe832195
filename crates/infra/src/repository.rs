//! Event-sourced group repository.
//!
//! `load` rehydrates a `Group` from its stream and verifies the cached
//! balances against an independent replay of the `BalanceSheet` projection;
//! `save` appends newly decided events under optimistic concurrency.

use uuid::Uuid;

use splitledger_core::{Aggregate, AggregateId, ExpectedVersion, GroupId};
use splitledger_events::{EventEnvelope, ProjectionRunner};
use splitledger_groups::{AGGREGATE_TYPE, BalanceSheet, Group, GroupEvent};

use crate::command_dispatcher::{
    AggregateRepository, DispatchError, decode_event, validate_loaded_stream,
};
use crate::event_store::{EventStore, EventStoreError, StoredEvent, UncommittedEvent};

/// Storage collaborator of the group ledger.
pub trait GroupRepository: AggregateRepository<Group> {}

impl<T> GroupRepository for T where T: AggregateRepository<Group> {}

#[derive(Debug)]
pub struct EventSourcedGroupRepository<S> {
    store: S,
}

impl<S> EventSourcedGroupRepository<S>
where
    S: EventStore,
{
    pub fn new(store: S) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Typed history of one group, in sequence order.
    pub fn history(&self, group_id: GroupId) -> Result<Vec<EventEnvelope<GroupEvent>>, DispatchError> {
        let aggregate_id = AggregateId::from(group_id);
        let stored = self.store.load_stream(aggregate_id)?;
        validate_loaded_stream(aggregate_id, &stored)?;

        stored
            .iter()
            .map(|e| {
                if e.aggregate_type != AGGREGATE_TYPE {
                    return Err(DispatchError::Store(EventStoreError::AggregateTypeMismatch(
                        format!("stream {aggregate_id} has type '{}'", e.aggregate_type),
                    )));
                }
                let payload: GroupEvent = decode_event(e)?;
                Ok(envelope(e, payload))
            })
            .collect()
    }
}

fn envelope(stored: &StoredEvent, payload: GroupEvent) -> EventEnvelope<GroupEvent> {
    EventEnvelope::new(
        stored.event_id,
        stored.aggregate_id,
        stored.aggregate_type.clone(),
        stored.sequence_number,
        payload,
    )
}

impl<S> AggregateRepository<Group> for EventSourcedGroupRepository<S>
where
    S: EventStore,
{
    fn load(&self, aggregate_id: AggregateId) -> Result<Option<Group>, DispatchError> {
        let group_id = GroupId::from(aggregate_id);
        let history = self.history(group_id)?;
        if history.is_empty() {
            return Ok(None);
        }

        let mut group = Group::empty(group_id);
        for env in &history {
            group.apply(env.payload());
        }

        // The cached balances must equal a fresh replay and close to zero.
        let (replayed, _) =
            ProjectionRunner::rebuild_from_scratch(aggregate_id, BalanceSheet::new, &history)?;
        if replayed != *group.balances() {
            tracing::error!(group_id = %group_id, "cached balances diverge from replay");
            return Err(DispatchError::InvariantViolation(format!(
                "group {group_id}: cached balances diverge from event replay"
            )));
        }
        group.verify_closed_ledger()?;

        Ok(Some(group))
    }

    fn save(
        &self,
        aggregate_id: AggregateId,
        expected_version: ExpectedVersion,
        events: &[GroupEvent],
    ) -> Result<Vec<StoredEvent>, DispatchError> {
        let uncommitted = events
            .iter()
            .map(|ev| UncommittedEvent::from_typed(aggregate_id, AGGREGATE_TYPE, Uuid::now_v7(), ev))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(self.store.append(uncommitted, expected_version)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, Utc};
    use serde_json::json;
    use splitledger_core::{AggregateRoot, ExpenseId, MemberId, Money};
    use splitledger_groups::{AddExpense, CreateGroup, GroupCommand, Identity, Member};

    use crate::command_dispatcher::CommandDispatcher;
    use crate::event_store::InMemoryEventStore;

    fn member(name: &str) -> Member {
        Identity {
            id: MemberId::new(),
            name: name.to_string(),
            email: format!("{name}@example.com"),
        }
        .into_member()
    }

    fn seeded() -> (CommandDispatcher<EventSourcedGroupRepository<InMemoryEventStore>>, GroupId, Member, Member) {
        let dispatcher =
            CommandDispatcher::new(EventSourcedGroupRepository::new(InMemoryEventStore::new()));
        let (a, b) = (member("a"), member("b"));
        let group_id = GroupId::new();

        dispatcher
            .dispatch(
                GroupCommand::CreateGroup(CreateGroup {
                    group_id,
                    name: "Flat".to_string(),
                    description: "Rent and bills".to_string(),
                    founder: a.clone(),
                    invited: vec![b.clone()],
                    allow_solo_group: false,
                    occurred_at: Utc::now(),
                }),
                |id| Group::empty(GroupId::from(id)),
            )
            .unwrap();
        dispatcher
            .dispatch(
                GroupCommand::AddExpense(AddExpense {
                    group_id,
                    expense_id: ExpenseId::new(),
                    title: "Groceries".to_string(),
                    amount: Money::from_minor(4_000),
                    paid_by: a.id,
                    split_among: vec![a.id, b.id],
                    date: NaiveDate::from_ymd_opt(2024, 5, 1).unwrap(),
                    occurred_at: Utc::now(),
                }),
                |id| Group::empty(GroupId::from(id)),
            )
            .unwrap();

        (dispatcher, group_id, a, b)
    }

    #[test]
    fn load_round_trips_through_the_store() {
        let (dispatcher, group_id, a, b) = seeded();
        let group = dispatcher
            .repository()
            .load(group_id.into())
            .unwrap()
            .expect("group exists");

        assert_eq!(group.version(), 2);
        assert_eq!(group.balance_of(a.id), Some(Money::from_minor(2_000)));
        assert_eq!(group.balance_of(b.id), Some(Money::from_minor(-2_000)));
    }

    #[test]
    fn missing_stream_loads_as_none() {
        let repo = EventSourcedGroupRepository::new(InMemoryEventStore::new());
        assert!(repo.load(AggregateId::new()).unwrap().is_none());
    }

    #[test]
    fn corrupted_payload_is_a_deserialize_error() {
        let store = InMemoryEventStore::new();
        let id = AggregateId::new();
        store
            .append(
                vec![UncommittedEvent {
                    event_id: Uuid::now_v7(),
                    aggregate_id: id,
                    aggregate_type: AGGREGATE_TYPE.to_string(),
                    event_type: "groups.group.created".to_string(),
                    event_version: 1,
                    occurred_at: Utc::now(),
                    payload: json!({ "nonsense": true }),
                }],
                ExpectedVersion::Exact(0),
            )
            .unwrap();

        let repo = EventSourcedGroupRepository::new(store);
        assert!(matches!(repo.load(id), Err(DispatchError::Deserialize(_))));
    }

    #[test]
    fn save_with_stale_version_is_a_concurrency_error() {
        let (dispatcher, group_id, ..) = seeded();
        let history = dispatcher.repository().history(group_id).unwrap();
        let first = history[0].payload().clone();

        let err = dispatcher
            .repository()
            .save(group_id.into(), ExpectedVersion::Exact(1), &[first])
            .unwrap_err();
        assert!(matches!(err, DispatchError::Concurrency(_)));
    }
}
