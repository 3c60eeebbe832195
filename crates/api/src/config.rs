//! API process configuration, read from the environment.

use std::net::SocketAddr;

use splitledger_infra::LedgerConfig;
use splitledger_observability::LogFormat;

pub const BIND_ADDR_VAR: &str = "SPLITLEDGER_BIND_ADDR";
pub const LOG_FORMAT_VAR: &str = "SPLITLEDGER_LOG_FORMAT";

pub const DEFAULT_BIND_ADDR: &str = "0.0.0.0:8080";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiConfig {
    pub bind_addr: SocketAddr,
    pub log_format: LogFormat,
    pub ledger: LedgerConfig,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([0, 0, 0, 0], 8080)),
            log_format: LogFormat::default(),
            ledger: LedgerConfig::default(),
        }
    }
}

impl ApiConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Invalid values are logged and replaced by their defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();

        let bind_addr = match lookup(BIND_ADDR_VAR) {
            None => defaults.bind_addr,
            Some(raw) => raw.trim().parse().unwrap_or_else(|_| {
                tracing::warn!(
                    key = BIND_ADDR_VAR,
                    value = %raw,
                    default = DEFAULT_BIND_ADDR,
                    "invalid bind address; using default"
                );
                defaults.bind_addr
            }),
        };

        Self {
            bind_addr,
            log_format: log_format_from_lookup(&lookup),
            ledger: LedgerConfig::from_lookup(&lookup),
        }
    }
}

/// Log format alone, needed before logging is initialized.
pub fn log_format_from_lookup(lookup: impl Fn(&str) -> Option<String>) -> LogFormat {
    match lookup(LOG_FORMAT_VAR) {
        None => LogFormat::default(),
        Some(raw) => raw.parse().unwrap_or_else(|err: String| {
            tracing::warn!(key = LOG_FORMAT_VAR, error = %err, "invalid log format; using default");
            LogFormat::default()
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lookup<'a>(pairs: &'a [(&'a str, &'a str)]) -> impl Fn(&str) -> Option<String> + 'a {
        move |key| {
            pairs
                .iter()
                .find(|(k, _)| *k == key)
                .map(|(_, v)| v.to_string())
        }
    }

    #[test]
    fn defaults_when_nothing_is_set() {
        assert_eq!(ApiConfig::from_lookup(lookup(&[])), ApiConfig::default());
    }

    #[test]
    fn reads_every_setting() {
        let cfg = ApiConfig::from_lookup(lookup(&[
            (BIND_ADDR_VAR, "127.0.0.1:3000"),
            (LOG_FORMAT_VAR, "pretty"),
            ("SPLITLEDGER_ALLOW_SOLO_GROUPS", "true"),
        ]));
        assert_eq!(cfg.bind_addr, "127.0.0.1:3000".parse().unwrap());
        assert_eq!(cfg.log_format, LogFormat::Pretty);
        assert!(cfg.ledger.allow_solo_groups);
    }

    #[test]
    fn invalid_values_fall_back() {
        let cfg = ApiConfig::from_lookup(lookup(&[
            (BIND_ADDR_VAR, "not-an-addr"),
            (LOG_FORMAT_VAR, "xml"),
        ]));
        assert_eq!(cfg, ApiConfig::default());
    }
}
