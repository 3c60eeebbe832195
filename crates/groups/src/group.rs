use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use splitledger_core::{
    Aggregate, AggregateId, AggregateRoot, DomainError, ExpenseId, GroupId, MemberId, Money,
    SettlementId,
};
use splitledger_events::{Command, Event};

use crate::balance::{BalanceAdjustment, BalanceSheet};
use crate::expense::{Expense, dedup_participants, split_equally};
use crate::member::{Member, normalize_email};
use crate::settlement::{Settlement, SettlementProposal, Transfer, minimal_transfers};

/// Stream type recorded in event envelopes for group aggregates.
pub const AGGREGATE_TYPE: &str = "groups.group";

/// Aggregate root: Group.
///
/// Owns the roster, the append-only expense history and the settlement record.
/// `balances` is a cache of the `BalanceSheet` projection over this group's
/// events and always sums to zero.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Group {
    id: GroupId,
    name: String,
    description: String,
    created_by: MemberId,
    created_at: DateTime<Utc>,
    members: Vec<Member>,
    expenses: Vec<Expense>,
    settlements: Vec<Settlement>,
    pending_settlement: Option<SettlementProposal>,
    balances: BalanceSheet,
    /// Version after the last balance-changing event.
    ledger_version: u64,
    version: u64,
    created: bool,
}

impl Group {
    /// Create an empty, not-yet-created aggregate instance for rehydration.
    pub fn empty(id: GroupId) -> Self {
        Self {
            id,
            name: String::new(),
            description: String::new(),
            created_by: MemberId::from_uuid(uuid::Uuid::nil()),
            created_at: DateTime::<Utc>::default(),
            members: Vec::new(),
            expenses: Vec::new(),
            settlements: Vec::new(),
            pending_settlement: None,
            balances: BalanceSheet::new(),
            ledger_version: 0,
            version: 0,
            created: false,
        }
    }

    pub fn id_typed(&self) -> GroupId {
        self.id
    }

    pub fn is_created(&self) -> bool {
        self.created
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn created_by(&self) -> MemberId {
        self.created_by
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Roster in insertion order (founder first).
    pub fn members(&self) -> &[Member] {
        &self.members
    }

    pub fn member(&self, member_id: MemberId) -> Option<&Member> {
        self.members.iter().find(|m| m.id == member_id)
    }

    pub fn is_member(&self, member_id: MemberId) -> bool {
        self.member(member_id).is_some()
    }

    pub fn expenses(&self) -> &[Expense] {
        &self.expenses
    }

    pub fn settlements(&self) -> &[Settlement] {
        &self.settlements
    }

    /// The open proposal, if balances have not moved since it was made.
    pub fn pending_settlement(&self) -> Option<&SettlementProposal> {
        self.pending_settlement
            .as_ref()
            .filter(|p| p.based_on_version == self.ledger_version)
    }

    pub fn balances(&self) -> &BalanceSheet {
        &self.balances
    }

    pub fn balance_of(&self, member_id: MemberId) -> Option<Money> {
        self.balances.get(member_id)
    }

    pub fn ledger_version(&self) -> u64 {
        self.ledger_version
    }

    /// Closed-ledger check: zero-sum, and exactly one balance per roster member.
    pub fn verify_closed_ledger(&self) -> Result<(), DomainError> {
        self.balances.ensure_closed()?;
        if self.balances.len() != self.members.len()
            || self.members.iter().any(|m| self.balances.get(m.id).is_none())
        {
            return Err(DomainError::invariant(
                "balance sheet does not match the group roster",
            ));
        }
        Ok(())
    }
}

impl AggregateRoot for Group {
    type Id = GroupId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

/// Command: CreateGroup.
///
/// Invitees are already resolved to roster entries (registered or pending).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateGroup {
    pub group_id: GroupId,
    pub name: String,
    pub description: String,
    pub founder: Member,
    pub invited: Vec<Member>,
    /// Accept a roster holding only the founder.
    pub allow_solo_group: bool,
    pub occurred_at: DateTime<Utc>,
}

/// Command: AddExpense.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddExpense {
    pub group_id: GroupId,
    pub expense_id: ExpenseId,
    pub title: String,
    pub amount: Money,
    pub paid_by: MemberId,
    pub split_among: Vec<MemberId>,
    pub date: NaiveDate,
    pub occurred_at: DateTime<Utc>,
}

/// Command: ForgiveBalances (zero every balance, no transfers).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ForgiveBalances {
    pub group_id: GroupId,
    pub occurred_at: DateTime<Utc>,
}

/// Command: ProposeSettlement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProposeSettlement {
    pub group_id: GroupId,
    pub settlement_id: SettlementId,
    pub occurred_at: DateTime<Utc>,
}

/// Command: ConfirmSettlement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfirmSettlement {
    pub group_id: GroupId,
    pub settlement_id: SettlementId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum GroupCommand {
    CreateGroup(CreateGroup),
    AddExpense(AddExpense),
    ForgiveBalances(ForgiveBalances),
    ProposeSettlement(ProposeSettlement),
    ConfirmSettlement(ConfirmSettlement),
}

impl GroupCommand {
    pub fn group_id(&self) -> GroupId {
        match self {
            GroupCommand::CreateGroup(c) => c.group_id,
            GroupCommand::AddExpense(c) => c.group_id,
            GroupCommand::ForgiveBalances(c) => c.group_id,
            GroupCommand::ProposeSettlement(c) => c.group_id,
            GroupCommand::ConfirmSettlement(c) => c.group_id,
        }
    }
}

impl Command for GroupCommand {
    fn target_aggregate_id(&self) -> AggregateId {
        self.group_id().into()
    }
}

/// Event: GroupCreated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupCreated {
    pub group_id: GroupId,
    pub name: String,
    pub description: String,
    pub created_by: MemberId,
    /// Full initial roster, founder first.
    pub members: Vec<Member>,
    pub occurred_at: DateTime<Utc>,
}

/// Event: ExpenseRecorded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExpenseRecorded {
    pub group_id: GroupId,
    pub expense: Expense,
    pub occurred_at: DateTime<Utc>,
}

/// Event: BalancesForgiven.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BalancesForgiven {
    pub group_id: GroupId,
    /// Offsets that zero each nonzero balance (sum to zero).
    pub adjustments: Vec<BalanceAdjustment>,
    pub occurred_at: DateTime<Utc>,
}

/// Event: SettlementProposed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SettlementProposed {
    pub group_id: GroupId,
    pub proposal: SettlementProposal,
    pub occurred_at: DateTime<Utc>,
}

/// Event: SettlementConfirmed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SettlementConfirmed {
    pub group_id: GroupId,
    pub settlement_id: SettlementId,
    pub transfers: Vec<Transfer>,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum GroupEvent {
    GroupCreated(GroupCreated),
    ExpenseRecorded(ExpenseRecorded),
    BalancesForgiven(BalancesForgiven),
    SettlementProposed(SettlementProposed),
    SettlementConfirmed(SettlementConfirmed),
}

impl GroupEvent {
    /// Whether the event changes any member balance.
    pub fn affects_balances(&self) -> bool {
        !matches!(self, GroupEvent::SettlementProposed(_))
    }
}

impl Event for GroupEvent {
    fn event_type(&self) -> &'static str {
        match self {
            GroupEvent::GroupCreated(_) => "groups.group.created",
            GroupEvent::ExpenseRecorded(_) => "groups.group.expense_recorded",
            GroupEvent::BalancesForgiven(_) => "groups.group.balances_forgiven",
            GroupEvent::SettlementProposed(_) => "groups.group.settlement_proposed",
            GroupEvent::SettlementConfirmed(_) => "groups.group.settlement_confirmed",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            GroupEvent::GroupCreated(e) => e.occurred_at,
            GroupEvent::ExpenseRecorded(e) => e.occurred_at,
            GroupEvent::BalancesForgiven(e) => e.occurred_at,
            GroupEvent::SettlementProposed(e) => e.occurred_at,
            GroupEvent::SettlementConfirmed(e) => e.occurred_at,
        }
    }
}

impl Aggregate for Group {
    type Command = GroupCommand;
    type Event = GroupEvent;
    type Error = DomainError;

    fn apply(&mut self, event: &Self::Event) {
        self.balances.apply_event(event);

        match event {
            GroupEvent::GroupCreated(e) => {
                self.id = e.group_id;
                self.name = e.name.clone();
                self.description = e.description.clone();
                self.created_by = e.created_by;
                self.created_at = e.occurred_at;
                self.members = e.members.clone();
                self.created = true;
            }
            GroupEvent::ExpenseRecorded(e) => {
                self.expenses.push(e.expense.clone());
            }
            GroupEvent::BalancesForgiven(_) => {}
            GroupEvent::SettlementProposed(e) => {
                self.pending_settlement = Some(e.proposal.clone());
            }
            GroupEvent::SettlementConfirmed(e) => {
                self.settlements.push(Settlement {
                    settlement_id: e.settlement_id,
                    transfers: e.transfers.clone(),
                    confirmed_at: e.occurred_at,
                });
                self.pending_settlement = None;
            }
        }

        // Deterministic version tracking: +1 per applied event.
        self.version += 1;
        if event.affects_balances() {
            self.ledger_version = self.version;
        }
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            GroupCommand::CreateGroup(cmd) => self.handle_create(cmd),
            GroupCommand::AddExpense(cmd) => self.handle_add_expense(cmd),
            GroupCommand::ForgiveBalances(cmd) => self.handle_forgive(cmd),
            GroupCommand::ProposeSettlement(cmd) => self.handle_propose(cmd),
            GroupCommand::ConfirmSettlement(cmd) => self.handle_confirm(cmd),
        }
    }
}

impl Group {
    fn ensure_created(&self) -> Result<(), DomainError> {
        if !self.created {
            return Err(DomainError::not_found());
        }
        Ok(())
    }

    fn ensure_group_id(&self, group_id: GroupId) -> Result<(), DomainError> {
        if self.id != group_id {
            return Err(DomainError::invariant("group_id mismatch"));
        }
        Ok(())
    }

    fn handle_create(&self, cmd: &CreateGroup) -> Result<Vec<GroupEvent>, DomainError> {
        if self.created {
            return Err(DomainError::conflict("group already exists"));
        }
        if cmd.name.trim().is_empty() {
            return Err(DomainError::validation("name cannot be empty"));
        }
        if cmd.description.trim().is_empty() {
            return Err(DomainError::validation("description cannot be empty"));
        }

        let mut members: Vec<Member> = vec![cmd.founder.clone()];
        for invitee in &cmd.invited {
            let email = normalize_email(&invitee.email);
            let duplicate = members
                .iter()
                .any(|m| m.id == invitee.id || normalize_email(&m.email) == email);
            if !duplicate {
                members.push(invitee.clone());
            }
        }

        if members.len() < 2 && !cmd.allow_solo_group {
            return Err(DomainError::validation(
                "a group needs at least one member besides the founder",
            ));
        }

        Ok(vec![GroupEvent::GroupCreated(GroupCreated {
            group_id: cmd.group_id,
            name: cmd.name.trim().to_string(),
            description: cmd.description.trim().to_string(),
            created_by: cmd.founder.id,
            members,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_add_expense(&self, cmd: &AddExpense) -> Result<Vec<GroupEvent>, DomainError> {
        self.ensure_created()?;
        self.ensure_group_id(cmd.group_id)?;

        let payer = self.member(cmd.paid_by).ok_or_else(|| {
            DomainError::invalid_payer(format!("{} is not a member of the group", cmd.paid_by))
        })?;

        let split_among = dedup_participants(&cmd.split_among);
        if split_among.is_empty() {
            return Err(DomainError::invalid_split("split_among cannot be empty"));
        }
        if let Some(outsider) = split_among.iter().find(|id| !self.is_member(**id)) {
            return Err(DomainError::invalid_split(format!(
                "{outsider} is not a member of the group"
            )));
        }

        if !cmd.amount.is_positive() {
            return Err(DomainError::invalid_amount(format!(
                "amount must be positive (got {})",
                cmd.amount
            )));
        }

        let shares = split_equally(cmd.amount, cmd.paid_by, &split_among)?;
        let allocated: Money = shares.iter().map(|s| s.amount).sum();
        if allocated != cmd.amount {
            return Err(DomainError::invariant(format!(
                "shares sum to {allocated}, expected {}",
                cmd.amount
            )));
        }

        // Timestamps never go backwards within a group.
        let created_at = match self.expenses.last() {
            Some(last) if last.created_at > cmd.occurred_at => last.created_at,
            _ => cmd.occurred_at,
        };

        let event = GroupEvent::ExpenseRecorded(ExpenseRecorded {
            group_id: cmd.group_id,
            expense: Expense {
                id: cmd.expense_id,
                title: cmd.title.clone(),
                amount: cmd.amount,
                paid_by: cmd.paid_by,
                paid_by_name: payer.name.clone(),
                split_among,
                shares,
                date: cmd.date,
                created_at,
            },
            occurred_at: created_at,
        });

        self.balances.checked_apply(&event).map_err(|_| {
            DomainError::invalid_amount(format!(
                "amount {} would push a member balance out of range",
                cmd.amount
            ))
        })?;

        Ok(vec![event])
    }

    fn handle_forgive(&self, cmd: &ForgiveBalances) -> Result<Vec<GroupEvent>, DomainError> {
        self.ensure_created()?;
        self.ensure_group_id(cmd.group_id)?;

        if self.balances.is_settled() {
            return Ok(Vec::new());
        }

        let event = GroupEvent::BalancesForgiven(BalancesForgiven {
            group_id: cmd.group_id,
            adjustments: self.balances.forgiveness_offsets(),
            occurred_at: cmd.occurred_at,
        });
        self.balances.checked_apply(&event)?;

        Ok(vec![event])
    }

    fn handle_propose(&self, cmd: &ProposeSettlement) -> Result<Vec<GroupEvent>, DomainError> {
        self.ensure_created()?;
        self.ensure_group_id(cmd.group_id)?;

        if self.balances.is_settled() {
            return Ok(Vec::new());
        }

        let transfers = minimal_transfers(self.balances.entries())?;

        Ok(vec![GroupEvent::SettlementProposed(SettlementProposed {
            group_id: cmd.group_id,
            proposal: SettlementProposal {
                settlement_id: cmd.settlement_id,
                transfers,
                based_on_version: self.ledger_version,
                proposed_at: cmd.occurred_at,
            },
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_confirm(&self, cmd: &ConfirmSettlement) -> Result<Vec<GroupEvent>, DomainError> {
        self.ensure_created()?;
        self.ensure_group_id(cmd.group_id)?;

        let proposal = self
            .pending_settlement
            .as_ref()
            .filter(|p| p.settlement_id == cmd.settlement_id)
            .ok_or_else(|| {
                DomainError::settlement_not_found(format!(
                    "no pending settlement {}",
                    cmd.settlement_id
                ))
            })?;

        if proposal.based_on_version != self.ledger_version {
            return Err(DomainError::conflict(format!(
                "settlement {} is stale: balances changed since it was proposed",
                cmd.settlement_id
            )));
        }

        let event = GroupEvent::SettlementConfirmed(SettlementConfirmed {
            group_id: cmd.group_id,
            settlement_id: proposal.settlement_id,
            transfers: proposal.transfers.clone(),
            occurred_at: cmd.occurred_at,
        });
        self.balances.checked_apply(&event)?;

        Ok(vec![event])
    }
}
