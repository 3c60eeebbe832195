//! Group directory projection.
//!
//! Per-member listing of the groups a member belongs to, with that member's
//! balance in each. Disposable: rebuildable from group streams at any time.

use std::collections::HashMap;
use std::sync::{RwLock, RwLockWriteGuard};

use chrono::{DateTime, Utc};
use serde_json::Value as JsonValue;
use thiserror::Error;

use splitledger_core::{AggregateId, GroupId, MemberId, Money};
use splitledger_events::EventEnvelope;
use splitledger_groups::{AGGREGATE_TYPE, BalanceSheet, GroupEvent, normalize_email};

use crate::command_dispatcher::CommitObserver;
use crate::event_store::StoredEvent;
use crate::read_model::PartitionedStore;

/// Read model: one group as seen by one member.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupSummary {
    pub group_id: GroupId,
    pub name: String,
    pub description: String,
    pub member_count: usize,
    pub expense_count: usize,
    /// This member's balance in the group.
    pub balance: Money,
    pub created_at: DateTime<Utc>,
    pub last_activity_at: DateTime<Utc>,
}

#[derive(Debug, Error)]
pub enum GroupDirectoryError {
    #[error("failed to deserialize group event: {0}")]
    Deserialize(String),

    #[error("non-monotonic sequence number (last={last}, found={found})")]
    NonMonotonicSequence { last: u64, found: u64 },

    #[error("event for unknown group stream {0}")]
    UnknownGroup(AggregateId),

    #[error("failed to load group streams: {0}")]
    Source(String),
}

#[derive(Debug, Clone)]
struct GroupState {
    group_id: GroupId,
    name: String,
    description: String,
    members: Vec<MemberId>,
    expense_count: usize,
    balances: BalanceSheet,
    created_at: DateTime<Utc>,
    last_activity_at: DateTime<Utc>,
}

impl GroupState {
    fn summary_for(&self, member_id: MemberId) -> GroupSummary {
        GroupSummary {
            group_id: self.group_id,
            name: self.name.clone(),
            description: self.description.clone(),
            member_count: self.members.len(),
            expense_count: self.expense_count,
            balance: self.balances.get(member_id).unwrap_or_default(),
            created_at: self.created_at,
            last_activity_at: self.last_activity_at,
        }
    }
}

#[derive(Debug, Default)]
struct Inner {
    cursors: HashMap<AggregateId, u64>,
    groups: HashMap<AggregateId, GroupState>,
    /// Pending (unregistered) invitees by normalized e-mail.
    pending: HashMap<String, MemberId>,
}

#[derive(Debug)]
pub struct GroupDirectoryProjection<S>
where
    S: PartitionedStore<MemberId, GroupId, GroupSummary>,
{
    store: S,
    inner: RwLock<Inner>,
}

impl<S> GroupDirectoryProjection<S>
where
    S: PartitionedStore<MemberId, GroupId, GroupSummary>,
{
    pub fn new(store: S) -> Self {
        Self {
            store,
            inner: RwLock::new(Inner::default()),
        }
    }

    /// Groups of one member, newest first.
    pub fn list_for_member(&self, member_id: MemberId) -> Vec<GroupSummary> {
        let mut groups = self.store.list(&member_id);
        groups.sort_by(|a, b| {
            b.created_at
                .cmp(&a.created_at)
                .then(b.group_id.cmp(&a.group_id))
        });
        groups
    }

    pub fn get(&self, member_id: MemberId, group_id: GroupId) -> Option<GroupSummary> {
        self.store.get(&member_id, &group_id)
    }

    /// Id already given to an invited, unregistered e-mail address.
    pub fn pending_member_id(&self, email: &str) -> Option<MemberId> {
        let inner = self.inner.read().ok()?;
        inner.pending.get(&normalize_email(email)).copied()
    }

    /// Apply one envelope. Re-delivered envelopes are ignored.
    pub fn apply_envelope(&self, envelope: &EventEnvelope<JsonValue>) -> Result<(), GroupDirectoryError> {
        let mut inner = self.write_inner()?;
        self.apply_locked(&mut inner, envelope)
    }

    fn write_inner(&self) -> Result<RwLockWriteGuard<'_, Inner>, GroupDirectoryError> {
        self.inner
            .write()
            .map_err(|_| GroupDirectoryError::Deserialize("projection lock poisoned".to_string()))
    }

    fn apply_locked(
        &self,
        inner: &mut Inner,
        envelope: &EventEnvelope<JsonValue>,
    ) -> Result<(), GroupDirectoryError> {
        if envelope.aggregate_type() != AGGREGATE_TYPE {
            return Ok(());
        }

        let aggregate_id = envelope.aggregate_id();
        let seq = envelope.sequence_number();

        let last = inner.cursors.get(&aggregate_id).copied().unwrap_or(0);
        if seq == 0 {
            return Err(GroupDirectoryError::NonMonotonicSequence { last, found: seq });
        }
        if seq <= last {
            return Ok(());
        }
        if seq != last + 1 {
            return Err(GroupDirectoryError::NonMonotonicSequence { last, found: seq });
        }

        let ev: GroupEvent = serde_json::from_value(envelope.payload().clone())
            .map_err(|e| GroupDirectoryError::Deserialize(e.to_string()))?;

        if let GroupEvent::GroupCreated(e) = &ev {
            for m in e.members.iter().filter(|m| m.is_pending()) {
                inner.pending.entry(normalize_email(&m.email)).or_insert(m.id);
            }
            inner.groups.insert(
                aggregate_id,
                GroupState {
                    group_id: e.group_id,
                    name: e.name.clone(),
                    description: e.description.clone(),
                    members: e.members.iter().map(|m| m.id).collect(),
                    expense_count: 0,
                    balances: BalanceSheet::new(),
                    created_at: e.occurred_at,
                    last_activity_at: e.occurred_at,
                },
            );
        }

        let state = inner
            .groups
            .get_mut(&aggregate_id)
            .ok_or(GroupDirectoryError::UnknownGroup(aggregate_id))?;

        state.balances.apply_event(&ev);
        match &ev {
            GroupEvent::GroupCreated(_) | GroupEvent::SettlementProposed(_) => {}
            GroupEvent::ExpenseRecorded(e) => {
                state.expense_count += 1;
                state.last_activity_at = e.occurred_at;
            }
            GroupEvent::BalancesForgiven(e) => state.last_activity_at = e.occurred_at,
            GroupEvent::SettlementConfirmed(e) => state.last_activity_at = e.occurred_at,
        }

        for member_id in &state.members {
            self.store
                .upsert(*member_id, state.group_id, state.summary_for(*member_id));
        }

        inner.cursors.insert(aggregate_id, seq);
        Ok(())
    }

    /// Rebuild the read model from scratch.
    pub fn rebuild_from_scratch(
        &self,
        envelopes: impl IntoIterator<Item = EventEnvelope<JsonValue>>,
    ) -> Result<(), GroupDirectoryError> {
        self.rebuild_with(|| Ok(envelopes.into_iter().collect()))
    }

    /// Rebuild from the envelopes returned by `load`.
    ///
    /// The write guard is held from before `load` runs until the last envelope
    /// is applied. A commit racing the rebuild is either part of the loaded
    /// history or applied afterwards by its observer call.
    pub fn rebuild_with<F>(&self, load: F) -> Result<(), GroupDirectoryError>
    where
        F: FnOnce() -> Result<Vec<EventEnvelope<JsonValue>>, GroupDirectoryError>,
    {
        let mut inner = self.write_inner()?;
        let mut envs = load()?;

        self.store.clear();
        *inner = Inner::default();

        envs.sort_by_key(|e| (e.aggregate_id(), e.sequence_number()));
        for env in &envs {
            self.apply_locked(&mut inner, env)?;
        }
        Ok(())
    }
}

impl<S> CommitObserver for GroupDirectoryProjection<S>
where
    S: PartitionedStore<MemberId, GroupId, GroupSummary>,
{
    fn committed(&self, events: &[StoredEvent]) {
        for stored in events {
            let envelope = stored.to_envelope();
            if let Err(err) = self.apply_envelope(&envelope) {
                tracing::error!(
                    event_id = %envelope.event_id(),
                    aggregate_id = %envelope.aggregate_id(),
                    sequence_number = envelope.sequence_number(),
                    error = %err,
                    "group directory projection failed; rebuild required"
                );
            }
        }
    }
}
