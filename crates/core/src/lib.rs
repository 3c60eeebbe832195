//! `splitledger-core`: domain foundation building blocks.
//!
//! This crate contains **pure domain** primitives (no infrastructure concerns):
//! identifiers, the fixed-point `Money` value object, the domain error model and
//! the aggregate traits used by the group ledger.

pub mod aggregate;
pub mod entity;
pub mod error;
pub mod id;
pub mod money;
pub mod value_object;

pub use aggregate::{Aggregate, AggregateRoot, ExpectedVersion};
pub use entity::Entity;
pub use error::{DomainError, DomainResult};
pub use id::{AggregateId, ExpenseId, GroupId, MemberId, SettlementId};
pub use money::Money;
pub use value_object::ValueObject;
