//! Value object trait: equality by value, not identity.

/// Marker trait for value objects.
///
/// Value objects are **immutable** and **compared by value**: two `Money`
/// amounts of 12.50 are the same amount, whereas two members called "Ana"
/// are different entities.
///
/// ```ignore
/// #[derive(Debug, Clone, PartialEq, Eq)]
/// struct Transfer { from: MemberId, to: MemberId, amount: Money }
///
/// impl ValueObject for Transfer {}
/// ```
pub trait ValueObject: Clone + PartialEq + core::fmt::Debug {}
