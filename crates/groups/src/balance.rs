//! Derived member balances.
//!
//! A `BalanceSheet` is a projection of a group's event stream: it is folded
//! from `GroupEvent`s and never edited directly, so it can always be rebuilt
//! from history and compared with the cached copy held by the aggregate.

use serde::{Deserialize, Serialize};

use splitledger_core::{DomainError, DomainResult, MemberId, Money};
use splitledger_events::{EventEnvelope, Projection};

use crate::group::GroupEvent;

/// One member's net position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemberBalance {
    pub member_id: MemberId,
    /// Positive: the group owes the member. Negative: the member owes the group.
    pub balance: Money,
}

/// A signed correction applied to one member's balance (forgiveness offsets).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BalanceAdjustment {
    pub member_id: MemberId,
    pub amount: Money,
}

/// Balances for every roster member, in roster order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BalanceSheet {
    entries: Vec<MemberBalance>,
}

impl BalanceSheet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold one event into the sheet.
    ///
    /// Events reaching the sheet have passed `checked_apply` in the aggregate,
    /// so the postings always fit.
    pub fn apply_event(&mut self, event: &GroupEvent) {
        self.open_roster(event);
        for (member_id, delta) in postings(event) {
            match self.position(member_id) {
                Some(idx) => self.entries[idx].balance += delta,
                None => self.entries.push(MemberBalance {
                    member_id,
                    balance: delta,
                }),
            }
        }
    }

    /// The sheet as it would be after `event`.
    ///
    /// Fails when a balance would leave the representable range. `i64::MIN` is
    /// excluded as well so every balance can be negated by a forgiveness offset.
    pub fn checked_apply(&self, event: &GroupEvent) -> DomainResult<BalanceSheet> {
        let mut next = self.clone();
        next.open_roster(event);
        for (member_id, delta) in postings(event) {
            let current = next.get(member_id).unwrap_or(Money::ZERO);
            let updated = current
                .checked_add(delta)
                .filter(|b| b.checked_neg().is_some())
                .ok_or_else(|| {
                    DomainError::invariant(format!("balance of member {member_id} overflows"))
                })?;
            match next.position(member_id) {
                Some(idx) => next.entries[idx].balance = updated,
                None => next.entries.push(MemberBalance {
                    member_id,
                    balance: updated,
                }),
            }
        }
        Ok(next)
    }

    fn open_roster(&mut self, event: &GroupEvent) {
        if let GroupEvent::GroupCreated(e) = event {
            for m in &e.members {
                if self.position(m.id).is_none() {
                    self.entries.push(MemberBalance {
                        member_id: m.id,
                        balance: Money::ZERO,
                    });
                }
            }
        }
    }

    fn position(&self, member_id: MemberId) -> Option<usize> {
        self.entries.iter().position(|e| e.member_id == member_id)
    }

    pub fn get(&self, member_id: MemberId) -> Option<Money> {
        self.position(member_id).map(|idx| self.entries[idx].balance)
    }

    pub fn entries(&self) -> &[MemberBalance] {
        &self.entries
    }

    pub fn iter(&self) -> impl Iterator<Item = &MemberBalance> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Exact sum of all balances, `None` if it does not fit in `Money`.
    pub fn total(&self) -> Option<Money> {
        Money::checked_sum(self.entries.iter().map(|e| e.balance))
    }

    /// True when every balance is zero.
    pub fn is_settled(&self) -> bool {
        self.entries.iter().all(|e| e.balance.is_zero())
    }

    /// Closed-ledger check: balances must sum to exactly zero.
    pub fn ensure_closed(&self) -> DomainResult<()> {
        match self.total() {
            Some(total) if total.is_zero() => Ok(()),
            Some(total) => Err(DomainError::invariant(format!(
                "balances sum to {total}, expected 0.00"
            ))),
            None => Err(DomainError::invariant("balances sum out of range")),
        }
    }

    /// Offsets that would bring every nonzero balance back to zero.
    pub fn forgiveness_offsets(&self) -> Vec<BalanceAdjustment> {
        self.entries
            .iter()
            .filter(|e| !e.balance.is_zero())
            .map(|e| BalanceAdjustment {
                member_id: e.member_id,
                amount: -e.balance,
            })
            .collect()
    }
}

/// Signed balance movements carried by an event.
fn postings(event: &GroupEvent) -> Vec<(MemberId, Money)> {
    match event {
        GroupEvent::GroupCreated(_) | GroupEvent::SettlementProposed(_) => Vec::new(),
        GroupEvent::ExpenseRecorded(e) => {
            // Credit the payer in full, then debit every share (payer included).
            std::iter::once((e.expense.paid_by, e.expense.amount))
                .chain(e.expense.shares.iter().map(|s| (s.member_id, -s.amount)))
                .collect()
        }
        GroupEvent::BalancesForgiven(e) => e
            .adjustments
            .iter()
            .map(|adj| (adj.member_id, adj.amount))
            .collect(),
        GroupEvent::SettlementConfirmed(e) => e
            .transfers
            .iter()
            .flat_map(|t| [(t.from, t.amount), (t.to, -t.amount)])
            .collect(),
    }
}

impl Projection for BalanceSheet {
    type Ev = GroupEvent;

    fn apply(&mut self, envelope: &EventEnvelope<GroupEvent>) {
        self.apply_event(envelope.payload());
    }
}
