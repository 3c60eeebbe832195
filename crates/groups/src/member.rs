use serde::{Deserialize, Serialize};

use splitledger_core::{DomainError, DomainResult, Entity, MemberId};

/// How a member came to be on a roster.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MemberKind {
    /// Resolved from the member directory.
    Registered,
    /// Invited by e-mail with no registered account yet.
    Pending,
}

/// A registered person (directory entry / group founder).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub id: MemberId,
    pub name: String,
    pub email: String,
}

impl Identity {
    pub fn into_member(self) -> Member {
        Member {
            id: self.id,
            name: self.name,
            email: normalize_email(&self.email),
            kind: MemberKind::Registered,
        }
    }
}

/// A participant on a group roster.
///
/// Carries no balance: balances are derived from the group's history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Member {
    pub id: MemberId,
    pub name: String,
    pub email: String,
    pub kind: MemberKind,
}

impl Member {
    /// Placeholder member for an invited address that is not registered.
    ///
    /// The display name is the e-mail local part.
    pub fn pending(id: MemberId, email: &str) -> Self {
        let email = normalize_email(email);
        let name = email.split('@').next().unwrap_or_default().to_string();
        Self {
            id,
            name,
            email,
            kind: MemberKind::Pending,
        }
    }

    pub fn is_pending(&self) -> bool {
        self.kind == MemberKind::Pending
    }
}

impl Entity for Member {
    type Id = MemberId;

    fn id(&self) -> &Self::Id {
        &self.id
    }
}

/// Canonical form used for e-mail comparisons.
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Shape check: `local@domain.tld`, no whitespace, exactly one `@`.
pub fn validate_email(email: &str) -> DomainResult<()> {
    let invalid = || DomainError::validation(format!("invalid e-mail address '{email}'"));

    if email.chars().any(char::is_whitespace) {
        return Err(invalid());
    }
    let (local, domain) = email.split_once('@').ok_or_else(invalid)?;
    if local.is_empty() || domain.contains('@') {
        return Err(invalid());
    }
    match domain.rsplit_once('.') {
        Some((host, tld)) if !host.is_empty() && !tld.is_empty() => Ok(()),
        _ => Err(invalid()),
    }
}

/// Normalize an invitation list for a group founded by `founder_email`.
///
/// Blank entries are ignored, malformed addresses reject the whole list,
/// duplicates and the founder's own address collapse. Order of first
/// occurrence is kept.
pub fn parse_invitations(founder_email: &str, raw: &[String]) -> DomainResult<Vec<String>> {
    let founder = normalize_email(founder_email);
    let mut out: Vec<String> = Vec::new();

    for entry in raw {
        let email = normalize_email(entry);
        if email.is_empty() {
            continue;
        }
        validate_email(&email)?;
        if email == founder || out.contains(&email) {
            continue;
        }
        out.push(email);
    }

    Ok(out)
}
