//! Domain error model.

use thiserror::Error;

/// Result type used across the domain layer.
pub type DomainResult<T> = Result<T, DomainError>;

/// Domain-level error.
///
/// Keep this focused on deterministic, business/domain failures (validation,
/// ledger preconditions, invariants, conflicts). Infrastructure concerns belong
/// elsewhere.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// A value failed validation (e.g. malformed group creation input).
    #[error("validation failed: {0}")]
    Validation(String),

    /// The payer of an expense is not a member of the group.
    #[error("invalid payer: {0}")]
    InvalidPayer(String),

    /// The participant set of an expense is empty or references a non-member.
    #[error("invalid split: {0}")]
    InvalidSplit(String),

    /// An expense amount is zero or negative.
    #[error("invalid amount: {0}")]
    InvalidAmount(String),

    /// A referenced member does not exist.
    #[error("member not found: {0}")]
    MemberNotFound(String),

    /// A referenced settlement proposal does not exist (or is no longer pending).
    #[error("settlement not found: {0}")]
    SettlementNotFound(String),

    /// A domain invariant was violated.
    #[error("invariant violated: {0}")]
    InvariantViolation(String),

    /// An identifier was invalid (e.g. parse failure).
    #[error("invalid identifier: {0}")]
    InvalidId(String),

    /// The aggregate itself does not exist.
    #[error("not found")]
    NotFound,

    /// A conflict occurred (stale version, stale settlement proposal, duplicate creation).
    #[error("conflict: {0}")]
    Conflict(String),
}

impl DomainError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn invalid_payer(msg: impl Into<String>) -> Self {
        Self::InvalidPayer(msg.into())
    }

    pub fn invalid_split(msg: impl Into<String>) -> Self {
        Self::InvalidSplit(msg.into())
    }

    pub fn invalid_amount(msg: impl Into<String>) -> Self {
        Self::InvalidAmount(msg.into())
    }

    pub fn member_not_found(msg: impl Into<String>) -> Self {
        Self::MemberNotFound(msg.into())
    }

    pub fn settlement_not_found(msg: impl Into<String>) -> Self {
        Self::SettlementNotFound(msg.into())
    }

    pub fn invariant(msg: impl Into<String>) -> Self {
        Self::InvariantViolation(msg.into())
    }

    pub fn invalid_id(msg: impl Into<String>) -> Self {
        Self::InvalidId(msg.into())
    }

    pub fn conflict(msg: impl Into<String>) -> Self {
        Self::Conflict(msg.into())
    }

    pub fn not_found() -> Self {
        Self::NotFound
    }
}
