//! Service wiring: the ledger and its collaborators, shared by every handler.

use splitledger_infra::{GroupLedger, InMemoryGroupLedger, LedgerConfig};

/// Application services injected into handlers via `Extension<Arc<AppServices>>`.
pub struct AppServices {
    pub ledger: InMemoryGroupLedger,
}

impl AppServices {
    /// In-memory event store and member directory.
    pub fn in_memory(config: LedgerConfig) -> Self {
        Self {
            ledger: GroupLedger::in_memory(config),
        }
    }
}
