//! Configuration loading and representation.
//!
//! Values come from environment variables. Parsing goes through a lookup
//! function so callers (and tests) can supply any source.

pub const ALLOW_SOLO_GROUPS_VAR: &str = "SPLITLEDGER_ALLOW_SOLO_GROUPS";

/// Ledger behaviour switches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct LedgerConfig {
    /// Permit groups whose roster is only the founder.
    pub allow_solo_groups: bool,
}

impl LedgerConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        Self {
            allow_solo_groups: lookup(ALLOW_SOLO_GROUPS_VAR)
                .map(|raw| parse_flag(ALLOW_SOLO_GROUPS_VAR, &raw, defaults.allow_solo_groups))
                .unwrap_or(defaults.allow_solo_groups),
        }
    }
}

/// Parse a boolean switch; unrecognised values fall back to `default`.
pub fn parse_flag(key: &str, raw: &str, default: bool) -> bool {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => true,
        "0" | "false" | "no" | "off" => false,
        _ => {
            tracing::warn!(key, value = raw, default, "invalid boolean setting; using default");
            default
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_when_unset() {
        assert_eq!(LedgerConfig::from_lookup(lookup(&[])), LedgerConfig::default());
        assert!(!LedgerConfig::default().allow_solo_groups);
    }

    #[test]
    fn accepts_common_boolean_spellings() {
        for raw in ["1", "true", "YES", " on "] {
            let cfg = LedgerConfig::from_lookup(lookup(&[(ALLOW_SOLO_GROUPS_VAR, raw)]));
            assert!(cfg.allow_solo_groups, "{raw}");
        }
        let cfg = LedgerConfig::from_lookup(lookup(&[(ALLOW_SOLO_GROUPS_VAR, "off")]));
        assert!(!cfg.allow_solo_groups);
    }

    #[test]
    fn garbage_falls_back_to_default() {
        let cfg = LedgerConfig::from_lookup(lookup(&[(ALLOW_SOLO_GROUPS_VAR, "maybe")]));
        assert!(!cfg.allow_solo_groups);
    }
}
