//! The single undo-entry type threaded through the history ledger.
//!
//! The registry and UTXO index each know how to invert their own writes
//! (`RegistryMutation`, `UtxoMutation`); this enum just lets both flavors
//! share one [`crate::history::HistoryLedger`] so a whole block's worth of
//! undo entries unwinds in one strict reverse-append-order pass.

use crate::registry::RegistryMutation;
use crate::utxo::UtxoMutation;

#[derive(Debug, Clone)]
pub enum CrMutation {
    Registry(RegistryMutation),
    Utxo(UtxoMutation),
}

impl From<RegistryMutation> for CrMutation {
    fn from(m: RegistryMutation) -> Self {
        CrMutation::Registry(m)
    }
}

impl From<UtxoMutation> for CrMutation {
    fn from(m: UtxoMutation) -> Self {
        CrMutation::Utxo(m)
    }
}
