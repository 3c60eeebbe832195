//! Entity trait: identity + continuity across state changes.

/// Entity marker + minimal interface.
///
/// Group members are entities: two members with the same id are the same
/// participant even if their display name differs.
pub trait Entity {
    /// Strongly-typed entity identifier.
    type Id: Clone + Eq + core::hash::Hash + core::fmt::Debug;

    /// Returns the entity identifier.
    fn id(&self) -> &Self::Id;
}
