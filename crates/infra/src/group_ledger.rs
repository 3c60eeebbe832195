//! `GroupLedger` service: the entry point callers use.
//!
//! Resolves identities through the member directory, turns requests into
//! `GroupCommand`s and runs them through the command dispatcher. Queries load
//! the group from its stream (no write lock) or read the group directory
//! projection.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{NaiveDate, Utc};
use thiserror::Error;

use splitledger_core::{AggregateRoot, DomainError, ExpenseId, GroupId, MemberId, Money, SettlementId};
use splitledger_groups::member::validate_email;
use splitledger_groups::{
    AGGREGATE_TYPE, AddExpense, ConfirmSettlement, CreateGroup, Expense, ForgiveBalances, Group,
    GroupCommand, GroupEvent, Identity, Member, ProposeSettlement, Settlement, SettlementPolicy,
    SettlementProposal, SettlementResult, normalize_email, parse_invitations,
};

use crate::command_dispatcher::{AggregateRepository, CommandDispatcher, DispatchError, Dispatched};
use crate::config::LedgerConfig;
use crate::directory::{DirectoryError, InMemoryMemberDirectory, MemberDirectory};
use crate::event_store::{EventStore, EventStoreError, InMemoryEventStore};
use crate::projections::{GroupDirectoryError, GroupDirectoryProjection, GroupSummary};
use crate::read_model::InMemoryPartitionedStore;
use crate::repository::EventSourcedGroupRepository;

/// Number of groups listed in a member summary.
pub const RECENT_GROUPS: usize = 5;

#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("validation failed: {0}")]
    Validation(String),

    #[error("invalid payer: {0}")]
    InvalidPayer(String),

    #[error("invalid split: {0}")]
    InvalidSplit(String),

    #[error("invalid amount: {0}")]
    InvalidAmount(String),

    #[error("group not found: {0}")]
    GroupNotFound(String),

    #[error("member not found: {0}")]
    MemberNotFound(String),

    #[error("settlement not found: {0}")]
    SettlementNotFound(String),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("invariant violation: {0}")]
    InvariantViolation(String),

    #[error("storage error: {0}")]
    Storage(String),
}

impl LedgerError {
    /// Stable machine-readable kind.
    pub fn code(&self) -> &'static str {
        match self {
            LedgerError::Validation(_) => "validation_error",
            LedgerError::InvalidPayer(_) => "invalid_payer",
            LedgerError::InvalidSplit(_) => "invalid_split",
            LedgerError::InvalidAmount(_) => "invalid_amount",
            LedgerError::GroupNotFound(_) => "group_not_found",
            LedgerError::MemberNotFound(_) => "member_not_found",
            LedgerError::SettlementNotFound(_) => "settlement_not_found",
            LedgerError::Conflict(_) => "conflict",
            LedgerError::InvariantViolation(_) => "invariant_violation",
            LedgerError::Storage(_) => "storage_error",
        }
    }

    fn from_dispatch(group_id: GroupId, err: DispatchError) -> Self {
        match err {
            DispatchError::NotFound => LedgerError::GroupNotFound(group_id.to_string()),
            DispatchError::Concurrency(msg) => LedgerError::Conflict(msg),
            DispatchError::Validation(msg) => LedgerError::Validation(msg),
            DispatchError::InvalidPayer(msg) => LedgerError::InvalidPayer(msg),
            DispatchError::InvalidSplit(msg) => LedgerError::InvalidSplit(msg),
            DispatchError::InvalidAmount(msg) => LedgerError::InvalidAmount(msg),
            DispatchError::MemberNotFound(msg) => LedgerError::MemberNotFound(msg),
            DispatchError::SettlementNotFound(msg) => LedgerError::SettlementNotFound(msg),
            DispatchError::InvariantViolation(msg) => LedgerError::InvariantViolation(msg),
            DispatchError::Deserialize(msg) => LedgerError::Storage(msg),
            DispatchError::Replay(e) => LedgerError::Storage(e.to_string()),
            DispatchError::Store(e) => LedgerError::Storage(e.to_string()),
        }
    }
}

impl From<DomainError> for LedgerError {
    fn from(value: DomainError) -> Self {
        match value {
            DomainError::Validation(msg) | DomainError::InvalidId(msg) => LedgerError::Validation(msg),
            DomainError::InvalidPayer(msg) => LedgerError::InvalidPayer(msg),
            DomainError::InvalidSplit(msg) => LedgerError::InvalidSplit(msg),
            DomainError::InvalidAmount(msg) => LedgerError::InvalidAmount(msg),
            DomainError::MemberNotFound(msg) => LedgerError::MemberNotFound(msg),
            DomainError::SettlementNotFound(msg) => LedgerError::SettlementNotFound(msg),
            DomainError::InvariantViolation(msg) => LedgerError::InvariantViolation(msg),
            DomainError::Conflict(msg) => LedgerError::Conflict(msg),
            DomainError::NotFound => LedgerError::GroupNotFound("group not found".to_string()),
        }
    }
}

impl From<DirectoryError> for LedgerError {
    fn from(value: DirectoryError) -> Self {
        match value {
            DirectoryError::DuplicateEmail(_) | DirectoryError::DuplicateId(_) => {
                LedgerError::Validation(value.to_string())
            }
            DirectoryError::Unavailable(msg) => LedgerError::Storage(msg),
        }
    }
}

pub type LedgerResult<T> = Result<T, LedgerError>;

/// Request to record an expense.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewExpense {
    pub title: String,
    pub amount: Money,
    pub paid_by: MemberId,
    pub split_among: Vec<MemberId>,
    pub date: NaiveDate,
}

/// Dashboard view of one member across all of their groups.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemberSummary {
    pub member_id: MemberId,
    pub total_groups: usize,
    pub total_expenses: usize,
    /// Sum of the member's balances over every group.
    pub net_balance: Money,
    /// Newest first.
    pub recent_groups: Vec<GroupSummary>,
}

pub type GroupDirectory = GroupDirectoryProjection<InMemoryPartitionedStore<MemberId, GroupId, GroupSummary>>;

pub type InMemoryGroupLedger = GroupLedger<InMemoryEventStore, InMemoryMemberDirectory>;

pub struct GroupLedger<S, D> {
    config: LedgerConfig,
    dispatcher: CommandDispatcher<EventSourcedGroupRepository<S>>,
    members: D,
    group_directory: Arc<GroupDirectory>,
}

impl InMemoryGroupLedger {
    pub fn in_memory(config: LedgerConfig) -> Self {
        Self::new(config, InMemoryEventStore::new(), InMemoryMemberDirectory::new())
    }
}

impl<S, D> GroupLedger<S, D>
where
    S: EventStore,
    D: MemberDirectory,
{
    pub fn new(config: LedgerConfig, store: S, members: D) -> Self {
        let group_directory = Arc::new(GroupDirectory::new(InMemoryPartitionedStore::new()));
        let dispatcher = CommandDispatcher::new(EventSourcedGroupRepository::new(store))
            .with_observer(group_directory.clone());

        Self {
            config,
            dispatcher,
            members,
            group_directory,
        }
    }

    pub fn config(&self) -> LedgerConfig {
        self.config
    }

    pub fn repository(&self) -> &EventSourcedGroupRepository<S> {
        self.dispatcher.repository()
    }

    fn dispatch(&self, command: GroupCommand) -> LedgerResult<Dispatched<Group>> {
        let group_id = command.group_id();
        self.dispatcher
            .dispatch(command, |id| Group::empty(GroupId::from(id)))
            .map_err(|e| LedgerError::from_dispatch(group_id, e))
    }

    fn load(&self, group_id: GroupId) -> LedgerResult<Group> {
        self.repository()
            .load(group_id.into())
            .map_err(|e| LedgerError::from_dispatch(group_id, e))?
            .ok_or_else(|| LedgerError::GroupNotFound(group_id.to_string()))
    }

    // ---- members ----

    /// Register a person in the member directory.
    ///
    /// If the address was already invited to groups, the registration takes
    /// over the id those groups know it by.
    pub fn register_member(&self, name: &str, email: &str) -> LedgerResult<Identity> {
        let name = name.trim();
        if name.is_empty() {
            return Err(LedgerError::Validation("name cannot be empty".to_string()));
        }
        let email = normalize_email(email);
        validate_email(&email)?;

        let id = self
            .group_directory
            .pending_member_id(&email)
            .unwrap_or_else(MemberId::new);
        let identity = self.members.register(Identity {
            id,
            name: name.to_string(),
            email,
        })?;

        tracing::info!(member_id = %identity.id, "member registered");
        Ok(identity)
    }

    pub fn find_member(&self, member_id: MemberId) -> LedgerResult<Identity> {
        self.members
            .find(member_id)
            .ok_or_else(|| LedgerError::MemberNotFound(member_id.to_string()))
    }

    fn resolve_invitee(&self, email: &str) -> Member {
        if let Some(identity) = self.members.find_by_email(email) {
            return identity.into_member();
        }
        let id = self.group_directory.pending_member_id(email).unwrap_or_else(MemberId::new);
        Member::pending(id, email)
    }

    // ---- commands ----

    pub fn create_group(
        &self,
        name: &str,
        description: &str,
        founder: Identity,
        invited: Vec<String>,
    ) -> LedgerResult<Group> {
        let emails = parse_invitations(&founder.email, &invited)?;
        let invited: Vec<Member> = emails.iter().map(|e| self.resolve_invitee(e)).collect();
        let group_id = GroupId::new();

        let dispatched = self.dispatch(GroupCommand::CreateGroup(CreateGroup {
            group_id,
            name: name.to_string(),
            description: description.to_string(),
            founder: founder.into_member(),
            invited,
            allow_solo_group: self.config.allow_solo_groups,
            occurred_at: Utc::now(),
        }))?;

        tracing::info!(
            group_id = %group_id,
            members = dispatched.aggregate.members().len(),
            "group created"
        );
        Ok(dispatched.aggregate)
    }

    pub fn add_expense(&self, group_id: GroupId, expense: NewExpense) -> LedgerResult<Expense> {
        let expense_id = ExpenseId::new();
        let dispatched = self.dispatch(GroupCommand::AddExpense(AddExpense {
            group_id,
            expense_id,
            title: expense.title,
            amount: expense.amount,
            paid_by: expense.paid_by,
            split_among: expense.split_among,
            date: expense.date,
            occurred_at: Utc::now(),
        }))?;

        let recorded = dispatched.events.into_iter().find_map(|ev| match ev {
            GroupEvent::ExpenseRecorded(e) => Some(e.expense),
            _ => None,
        });
        let recorded = recorded.ok_or_else(|| {
            LedgerError::InvariantViolation(format!("expense {expense_id} was not recorded"))
        })?;

        tracing::info!(
            group_id = %group_id,
            expense_id = %expense_id,
            amount = %recorded.amount,
            participants = recorded.split_among.len(),
            "expense recorded"
        );
        Ok(recorded)
    }

    /// Clear outstanding balances under `policy`.
    ///
    /// `Forgive` zeroes every balance at once; `Payment` only proposes the
    /// transfers (see `confirm_settlement`).
    pub fn settle_up(&self, group_id: GroupId, policy: SettlementPolicy) -> LedgerResult<SettlementResult> {
        match policy {
            SettlementPolicy::Forgive => {
                let dispatched = self.dispatch(GroupCommand::ForgiveBalances(ForgiveBalances {
                    group_id,
                    occurred_at: Utc::now(),
                }))?;

                let adjustments = dispatched.events.into_iter().find_map(|ev| match ev {
                    GroupEvent::BalancesForgiven(e) => Some(e.adjustments),
                    _ => None,
                });
                match adjustments {
                    None => Ok(SettlementResult::AlreadySettled),
                    Some(adjustments) => {
                        tracing::info!(
                            group_id = %group_id,
                            adjusted = adjustments.len(),
                            "balances forgiven"
                        );
                        Ok(SettlementResult::Forgiven { adjustments })
                    }
                }
            }
            SettlementPolicy::Payment => Ok(match self.propose_settlement(group_id)? {
                Some(proposal) => SettlementResult::Proposed(proposal),
                None => SettlementResult::AlreadySettled,
            }),
        }
    }

    /// Compute and record the minimal transfer plan. `None` when every
    /// balance is already zero.
    pub fn propose_settlement(&self, group_id: GroupId) -> LedgerResult<Option<SettlementProposal>> {
        let dispatched = self.dispatch(GroupCommand::ProposeSettlement(ProposeSettlement {
            group_id,
            settlement_id: SettlementId::new(),
            occurred_at: Utc::now(),
        }))?;

        let proposal = dispatched.events.into_iter().find_map(|ev| match ev {
            GroupEvent::SettlementProposed(e) => Some(e.proposal),
            _ => None,
        });
        if let Some(p) = &proposal {
            tracing::info!(
                group_id = %group_id,
                settlement_id = %p.settlement_id,
                transfers = p.transfers.len(),
                "settlement proposed"
            );
        }
        Ok(proposal)
    }

    pub fn confirm_settlement(&self, group_id: GroupId, settlement_id: SettlementId) -> LedgerResult<Settlement> {
        let dispatched = self.dispatch(GroupCommand::ConfirmSettlement(ConfirmSettlement {
            group_id,
            settlement_id,
            occurred_at: Utc::now(),
        }))?;

        let settlement = dispatched
            .aggregate
            .settlements()
            .iter()
            .rev()
            .find(|s| s.settlement_id == settlement_id)
            .cloned()
            .ok_or_else(|| LedgerError::SettlementNotFound(settlement_id.to_string()))?;

        tracing::info!(
            group_id = %group_id,
            settlement_id = %settlement_id,
            version = dispatched.aggregate.version(),
            "settlement confirmed"
        );
        Ok(settlement)
    }

    // ---- queries ----

    pub fn get_balances(&self, group_id: GroupId) -> LedgerResult<BTreeMap<MemberId, Money>> {
        let group = self.load(group_id)?;
        Ok(group
            .balances()
            .iter()
            .map(|b| (b.member_id, b.balance))
            .collect())
    }

    pub fn get_group(&self, group_id: GroupId) -> LedgerResult<Group> {
        self.load(group_id)
    }

    pub fn list_groups_for_member(&self, member_id: MemberId) -> LedgerResult<Vec<GroupSummary>> {
        let groups = self.group_directory.list_for_member(member_id);
        if groups.is_empty() && self.members.find(member_id).is_none() {
            return Err(LedgerError::MemberNotFound(member_id.to_string()));
        }
        Ok(groups)
    }

    pub fn member_summary(&self, member_id: MemberId) -> LedgerResult<MemberSummary> {
        let groups = self.list_groups_for_member(member_id)?;

        Ok(MemberSummary {
            member_id,
            total_groups: groups.len(),
            total_expenses: groups.iter().map(|g| g.expense_count).sum(),
            net_balance: groups
                .iter()
                .fold(Money::ZERO, |acc, g| acc.saturating_add(g.balance)),
            recent_groups: groups.into_iter().take(RECENT_GROUPS).collect(),
        })
    }

    /// Rebuild the group directory from every group stream.
    ///
    /// Commits made while the rebuild runs wait for it and are applied on top.
    pub fn rebuild_read_models(&self) -> LedgerResult<usize> {
        let store = self.repository().store();
        let mut groups = 0;

        self.group_directory
            .rebuild_with(|| {
                let source = |e: EventStoreError| GroupDirectoryError::Source(e.to_string());
                let ids = store.stream_ids(AGGREGATE_TYPE).map_err(source)?;
                groups = ids.len();

                let mut envelopes = Vec::new();
                for id in ids {
                    let stream = store.load_stream(id).map_err(source)?;
                    envelopes.extend(stream.iter().map(|e| e.to_envelope()));
                }
                Ok(envelopes)
            })
            .map_err(|e| LedgerError::Storage(e.to_string()))?;

        tracing::info!(groups, "group directory rebuilt");
        Ok(groups)
    }
}
