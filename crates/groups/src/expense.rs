use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use splitledger_core::{DomainError, DomainResult, ExpenseId, MemberId, Money};

/// One participant's portion of an expense.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Share {
    pub member_id: MemberId,
    pub amount: Money,
}

/// An immutable record of money paid by one member on behalf of others.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Expense {
    pub id: ExpenseId,
    pub title: String,
    pub amount: Money,
    pub paid_by: MemberId,
    /// Payer display name at the time the expense was recorded.
    pub paid_by_name: String,
    /// Participants, duplicates collapsed, first-occurrence order.
    pub split_among: Vec<MemberId>,
    /// Exact per-participant amounts; always sum to `amount`.
    pub shares: Vec<Share>,
    pub date: NaiveDate,
    pub created_at: DateTime<Utc>,
}

impl Expense {
    pub fn share_of(&self, member_id: MemberId) -> Option<Money> {
        self.shares
            .iter()
            .find(|s| s.member_id == member_id)
            .map(|s| s.amount)
    }
}

/// Collapse duplicate participant ids, keeping first-occurrence order.
pub fn dedup_participants(ids: &[MemberId]) -> Vec<MemberId> {
    let mut out: Vec<MemberId> = Vec::with_capacity(ids.len());
    for id in ids {
        if !out.contains(id) {
            out.push(*id);
        }
    }
    out
}

/// Equal split in minor units.
///
/// Every participant gets `amount / n`; the `amount % n` leftover cents go one
/// each to the payer first (when participating), then to the other
/// participants in list order. Shares are returned in `participants` order.
pub fn split_equally(
    amount: Money,
    paid_by: MemberId,
    participants: &[MemberId],
) -> DomainResult<Vec<Share>> {
    if !amount.is_positive() {
        return Err(DomainError::invalid_amount(format!(
            "amount must be positive (got {amount})"
        )));
    }
    if participants.is_empty() {
        return Err(DomainError::invalid_split("split_among cannot be empty"));
    }

    let allocation = amount
        .allocate_evenly(participants.len())
        .ok_or_else(|| DomainError::invariant("unable to allocate expense shares"))?;

    // Residual cents sit at the front of `allocation`; hand them out payer first.
    let mut priority: Vec<MemberId> = Vec::with_capacity(participants.len());
    if participants.contains(&paid_by) {
        priority.push(paid_by);
    }
    priority.extend(participants.iter().copied().filter(|id| *id != paid_by));

    let shares: Vec<Share> = participants
        .iter()
        .map(|id| {
            let rank = priority.iter().position(|p| p == id).unwrap_or_default();
            Share {
                member_id: *id,
                amount: allocation[rank],
            }
        })
        .collect();

    let total: Money = shares.iter().map(|s| s.amount).sum();
    if total != amount {
        return Err(DomainError::invariant(format!(
            "shares sum to {total}, expected {amount}"
        )));
    }

    Ok(shares)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn money(s: &str) -> Money {
        s.parse().unwrap()
    }

    #[test]
    fn residual_cent_goes_to_participating_payer() {
        let (a, b, c) = (MemberId::new(), MemberId::new(), MemberId::new());
        let shares = split_equally(money("100.00"), a, &[b, a, c]).unwrap();

        assert_eq!(shares[0], Share { member_id: b, amount: money("33.33") });
        assert_eq!(shares[1], Share { member_id: a, amount: money("33.34") });
        assert_eq!(shares[2], Share { member_id: c, amount: money("33.33") });
    }

    #[test]
    fn residual_follows_list_order_when_payer_does_not_participate() {
        let (payer, b, c, d) = (MemberId::new(), MemberId::new(), MemberId::new(), MemberId::new());
        let shares = split_equally(money("0.05"), payer, &[b, c, d]).unwrap();
        let amounts: Vec<Money> = shares.iter().map(|s| s.amount).collect();

        assert_eq!(amounts, vec![money("0.02"), money("0.02"), money("0.01")]);
    }

    #[test]
    fn rejects_non_positive_amounts_and_empty_splits() {
        let a = MemberId::new();
        assert!(matches!(
            split_equally(Money::ZERO, a, &[a]),
            Err(DomainError::InvalidAmount(_))
        ));
        assert!(matches!(
            split_equally(money("10"), a, &[]),
            Err(DomainError::InvalidSplit(_))
        ));
    }

    #[test]
    fn dedup_keeps_first_occurrence() {
        let (a, b) = (MemberId::new(), MemberId::new());
        assert_eq!(dedup_participants(&[a, b, a, b, a]), vec![a, b]);
    }
}
