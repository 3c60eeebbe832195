//! Settling up: forgiveness offsets and minimal debtor-to-creditor transfers.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use splitledger_core::{DomainError, DomainResult, MemberId, Money, SettlementId, ValueObject};

use crate::balance::{BalanceAdjustment, MemberBalance};

/// A payment from a debtor to a creditor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transfer {
    pub from: MemberId,
    pub to: MemberId,
    pub amount: Money,
}

impl ValueObject for Transfer {}

/// How a group wants to clear its outstanding balances.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SettlementPolicy {
    /// Zero every balance without any money changing hands.
    Forgive,
    /// Propose the minimal set of transfers; balances change on confirmation.
    Payment,
}

/// A computed transfer plan awaiting confirmation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SettlementProposal {
    pub settlement_id: SettlementId,
    pub transfers: Vec<Transfer>,
    /// Ledger version the plan was computed against.
    pub based_on_version: u64,
    pub proposed_at: DateTime<Utc>,
}

/// A confirmed settlement (recorded transfers).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Settlement {
    pub settlement_id: SettlementId,
    pub transfers: Vec<Transfer>,
    pub confirmed_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SettlementResult {
    /// Every balance was already zero; nothing was recorded.
    AlreadySettled,
    Forgiven { adjustments: Vec<BalanceAdjustment> },
    Proposed(SettlementProposal),
}

#[derive(Debug, Clone, Copy)]
struct Open {
    rank: usize,
    member_id: MemberId,
    remaining: i64,
}

fn largest(open: &[Open]) -> Option<usize> {
    open.iter()
        .enumerate()
        .max_by(|(_, a), (_, b)| {
            a.remaining
                .cmp(&b.remaining)
                .then(b.rank.cmp(&a.rank))
        })
        .map(|(pos, _)| pos)
}

/// Greedy minimal-transfer plan for a zero-sum set of balances.
///
/// Repeatedly matches the largest creditor with the largest debtor (ties go to
/// the earlier entry) and moves the smaller of the two amounts. Every step
/// clears at least one member, so `n` nonzero balances need at most `n - 1`
/// transfers.
pub fn minimal_transfers(balances: &[MemberBalance]) -> DomainResult<Vec<Transfer>> {
    match Money::checked_sum(balances.iter().map(|b| b.balance)) {
        Some(total) if total.is_zero() => {}
        Some(total) => {
            return Err(DomainError::invariant(format!(
                "cannot settle balances that sum to {total}"
            )));
        }
        None => return Err(DomainError::invariant("balances sum out of range")),
    }

    let mut creditors: Vec<Open> = Vec::new();
    let mut debtors: Vec<Open> = Vec::new();
    for (rank, b) in balances.iter().enumerate() {
        let remaining = b.balance.minor().checked_abs().ok_or_else(|| {
            DomainError::invariant(format!("balance of member {} out of range", b.member_id))
        })?;
        let open = Open {
            rank,
            member_id: b.member_id,
            remaining,
        };
        if b.balance.is_positive() {
            creditors.push(open);
        } else if b.balance.is_negative() {
            debtors.push(open);
        }
    }

    let mut transfers = Vec::new();
    while let (Some(c), Some(d)) = (largest(&creditors), largest(&debtors)) {
        let amount = creditors[c].remaining.min(debtors[d].remaining);
        transfers.push(Transfer {
            from: debtors[d].member_id,
            to: creditors[c].member_id,
            amount: Money::from_minor(amount),
        });

        creditors[c].remaining -= amount;
        debtors[d].remaining -= amount;
        if creditors[c].remaining == 0 {
            creditors.swap_remove(c);
        }
        if debtors[d].remaining == 0 {
            debtors.swap_remove(d);
        }
    }

    Ok(transfers)
}
