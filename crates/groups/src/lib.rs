//! Groups module (shared-expense ledger, event-sourced).
//!
//! Pure domain logic only: no IO, no HTTP, no persistence concerns.
//! A `Group` owns its roster and expense history; member balances are derived
//! from that history and always sum to zero.

pub mod balance;
pub mod expense;
pub mod group;
pub mod member;
pub mod settlement;

pub use balance::{BalanceAdjustment, BalanceSheet, MemberBalance};
pub use expense::{Expense, Share, split_equally};
pub use group::{
    AddExpense, BalancesForgiven, ConfirmSettlement, CreateGroup, ExpenseRecorded,
    ForgiveBalances, Group, GroupCommand, GroupCreated, GroupEvent, ProposeSettlement,
    SettlementConfirmed, SettlementProposed, AGGREGATE_TYPE,
};
pub use member::{Identity, Member, MemberKind, normalize_email, parse_invitations};
pub use settlement::{
    Settlement, SettlementPolicy, SettlementProposal, SettlementResult, Transfer,
    minimal_transfers,
};
