//! Member directory: registered identities, looked up by id or e-mail.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use thiserror::Error;

use splitledger_core::MemberId;
use splitledger_groups::{Identity, normalize_email};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DirectoryError {
    #[error("e-mail already registered: {0}")]
    DuplicateEmail(String),

    #[error("member id already registered: {0}")]
    DuplicateId(MemberId),

    #[error("member directory unavailable: {0}")]
    Unavailable(String),
}

pub trait MemberDirectory: Send + Sync {
    /// Register an identity. E-mails are unique case-insensitively.
    fn register(&self, identity: Identity) -> Result<Identity, DirectoryError>;

    fn find(&self, member_id: MemberId) -> Option<Identity>;

    fn find_by_email(&self, email: &str) -> Option<Identity>;
}

impl<D> MemberDirectory for Arc<D>
where
    D: MemberDirectory + ?Sized,
{
    fn register(&self, identity: Identity) -> Result<Identity, DirectoryError> {
        (**self).register(identity)
    }

    fn find(&self, member_id: MemberId) -> Option<Identity> {
        (**self).find(member_id)
    }

    fn find_by_email(&self, email: &str) -> Option<Identity> {
        (**self).find_by_email(email)
    }
}

#[derive(Debug, Default)]
struct Entries {
    by_id: HashMap<MemberId, Identity>,
    by_email: HashMap<String, MemberId>,
}

/// In-memory member directory for tests/dev.
#[derive(Debug, Default)]
pub struct InMemoryMemberDirectory {
    inner: RwLock<Entries>,
}

impl InMemoryMemberDirectory {
    pub fn new() -> Self {
        Self::default()
    }
}

impl MemberDirectory for InMemoryMemberDirectory {
    fn register(&self, identity: Identity) -> Result<Identity, DirectoryError> {
        let identity = Identity {
            email: normalize_email(&identity.email),
            ..identity
        };

        let mut entries = self
            .inner
            .write()
            .map_err(|_| DirectoryError::Unavailable("lock poisoned".to_string()))?;

        if entries.by_email.contains_key(&identity.email) {
            return Err(DirectoryError::DuplicateEmail(identity.email));
        }
        if entries.by_id.contains_key(&identity.id) {
            return Err(DirectoryError::DuplicateId(identity.id));
        }

        entries.by_email.insert(identity.email.clone(), identity.id);
        entries.by_id.insert(identity.id, identity.clone());
        Ok(identity)
    }

    fn find(&self, member_id: MemberId) -> Option<Identity> {
        let entries = self.inner.read().ok()?;
        entries.by_id.get(&member_id).cloned()
    }

    fn find_by_email(&self, email: &str) -> Option<Identity> {
        let entries = self.inner.read().ok()?;
        let id = entries.by_email.get(&normalize_email(email))?;
        entries.by_id.get(id).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn identity(name: &str, email: &str) -> Identity {
        Identity {
            id: MemberId::new(),
            name: name.to_string(),
            email: email.to_string(),
        }
    }

    #[test]
    fn lookups_are_case_insensitive_on_email() {
        let dir = InMemoryMemberDirectory::new();
        let alice = dir.register(identity("Alice", " Alice@Example.com")).unwrap();

        assert_eq!(alice.email, "alice@example.com");
        assert_eq!(dir.find_by_email("ALICE@example.COM"), Some(alice.clone()));
        assert_eq!(dir.find(alice.id), Some(alice));
        assert!(dir.find_by_email("bob@example.com").is_none());
    }

    #[test]
    fn duplicate_email_is_rejected() {
        let dir = InMemoryMemberDirectory::new();
        dir.register(identity("Alice", "alice@example.com")).unwrap();

        let err = dir.register(identity("Other", "ALICE@example.com")).unwrap_err();
        assert_eq!(err, DirectoryError::DuplicateEmail("alice@example.com".to_string()));
    }
}
