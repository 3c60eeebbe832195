use std::collections::BTreeMap;

use axum::http::StatusCode;
use chrono::NaiveDate;
use serde::Deserialize;
use serde_json::json;

use splitledger_core::{MemberId, Money};
use splitledger_groups::{
    Expense, Group, Identity, Member, MemberKind, Settlement, SettlementPolicy, SettlementProposal,
    SettlementResult, Transfer,
};
use splitledger_infra::{GroupSummary, MemberSummary, NewExpense};

use crate::app::errors;

// -------------------------
// Request DTOs
// -------------------------

#[derive(Debug, Deserialize)]
pub struct RegisterMemberRequest {
    pub name: String,
    pub email: String,
}

#[derive(Debug, Deserialize)]
pub struct CreateGroupRequest {
    pub name: String,
    pub description: String,
    pub founder_id: String,
    #[serde(default)]
    pub invited_emails: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub struct AddExpenseRequest {
    pub title: String,
    /// Decimal string, e.g. "40.50".
    pub amount: String,
    pub paid_by: String,
    pub split_among: Vec<String>,
    /// `YYYY-MM-DD`.
    pub date: String,
}

#[derive(Debug, Deserialize)]
pub struct SettleRequest {
    pub policy: SettlementPolicy,
}

impl AddExpenseRequest {
    pub fn into_new_expense(self) -> Result<NewExpense, axum::response::Response> {
        let amount: Money = self.amount.parse().map_err(|_| {
            errors::json_error(
                StatusCode::BAD_REQUEST,
                "invalid_amount",
                format!("invalid amount '{}'", self.amount),
            )
        })?;
        let date = NaiveDate::parse_from_str(self.date.trim(), "%Y-%m-%d").map_err(|_| {
            errors::json_error(
                StatusCode::BAD_REQUEST,
                "validation_error",
                format!("invalid date '{}' (expected YYYY-MM-DD)", self.date),
            )
        })?;
        let paid_by: MemberId = errors::parse_id(&self.paid_by, "member")?;
        let split_among = self
            .split_among
            .iter()
            .map(|raw| errors::parse_id::<MemberId>(raw, "member"))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(NewExpense {
            title: self.title,
            amount,
            paid_by,
            split_among,
            date,
        })
    }
}

// -------------------------
// Response mapping
// -------------------------

pub fn identity_to_json(identity: &Identity) -> serde_json::Value {
    json!({
        "id": identity.id.to_string(),
        "name": identity.name,
        "email": identity.email,
    })
}

pub fn member_to_json(member: &Member, balance: Money) -> serde_json::Value {
    json!({
        "id": member.id.to_string(),
        "name": member.name,
        "email": member.email,
        "pending": member.kind == MemberKind::Pending,
        "balance": balance.to_string(),
    })
}

pub fn expense_to_json(expense: &Expense) -> serde_json::Value {
    json!({
        "id": expense.id.to_string(),
        "title": expense.title,
        "amount": expense.amount.to_string(),
        "paid_by": expense.paid_by.to_string(),
        "paid_by_name": expense.paid_by_name,
        "split_among": expense.split_among.iter().map(|id| id.to_string()).collect::<Vec<_>>(),
        "shares": expense.shares.iter().map(|s| json!({
            "member_id": s.member_id.to_string(),
            "amount": s.amount.to_string(),
        })).collect::<Vec<_>>(),
        "date": expense.date.format("%Y-%m-%d").to_string(),
        "created_at": expense.created_at.to_rfc3339(),
    })
}

pub fn transfer_to_json(t: &Transfer) -> serde_json::Value {
    json!({
        "from": t.from.to_string(),
        "to": t.to.to_string(),
        "amount": t.amount.to_string(),
    })
}

pub fn proposal_to_json(p: &SettlementProposal) -> serde_json::Value {
    json!({
        "settlement_id": p.settlement_id.to_string(),
        "transfers": p.transfers.iter().map(transfer_to_json).collect::<Vec<_>>(),
        "proposed_at": p.proposed_at.to_rfc3339(),
    })
}

pub fn settlement_to_json(s: &Settlement) -> serde_json::Value {
    json!({
        "settlement_id": s.settlement_id.to_string(),
        "transfers": s.transfers.iter().map(transfer_to_json).collect::<Vec<_>>(),
        "confirmed_at": s.confirmed_at.to_rfc3339(),
    })
}

pub fn settlement_result_to_json(result: &SettlementResult) -> serde_json::Value {
    match result {
        SettlementResult::AlreadySettled => json!({ "outcome": "already_settled" }),
        SettlementResult::Forgiven { adjustments } => json!({
            "outcome": "forgiven",
            "adjustments": adjustments.iter().map(|a| json!({
                "member_id": a.member_id.to_string(),
                "amount": a.amount.to_string(),
            })).collect::<Vec<_>>(),
        }),
        SettlementResult::Proposed(p) => json!({
            "outcome": "proposed",
            "proposal": proposal_to_json(p),
        }),
    }
}

pub fn balances_to_json(balances: &BTreeMap<MemberId, Money>) -> serde_json::Value {
    let map: serde_json::Map<String, serde_json::Value> = balances
        .iter()
        .map(|(id, m)| (id.to_string(), json!(m.to_string())))
        .collect();
    serde_json::Value::Object(map)
}

pub fn group_to_json(group: &Group) -> serde_json::Value {
    json!({
        "id": group.id_typed().to_string(),
        "name": group.name(),
        "description": group.description(),
        "created_by": group.created_by().to_string(),
        "created_at": group.created_at().to_rfc3339(),
        "members": group
            .members()
            .iter()
            .map(|m| member_to_json(m, group.balance_of(m.id).unwrap_or_default()))
            .collect::<Vec<_>>(),
        "expenses": group.expenses().iter().map(expense_to_json).collect::<Vec<_>>(),
        "settlements": group.settlements().iter().map(settlement_to_json).collect::<Vec<_>>(),
        "pending_settlement": group.pending_settlement().map(proposal_to_json),
    })
}

pub fn group_summary_to_json(s: &GroupSummary) -> serde_json::Value {
    json!({
        "id": s.group_id.to_string(),
        "name": s.name,
        "description": s.description,
        "member_count": s.member_count,
        "expense_count": s.expense_count,
        "balance": s.balance.to_string(),
        "created_at": s.created_at.to_rfc3339(),
        "last_activity_at": s.last_activity_at.to_rfc3339(),
    })
}

pub fn member_summary_to_json(s: &MemberSummary) -> serde_json::Value {
    json!({
        "member_id": s.member_id.to_string(),
        "total_groups": s.total_groups,
        "total_expenses": s.total_expenses,
        "net_balance": s.net_balance.to_string(),
        "recent_groups": s.recent_groups.iter().map(group_summary_to_json).collect::<Vec<_>>(),
    })
}
