//! Block Driver (BD) — the engine's public surface. Owns the registry,
//! UTXO index, and history ledger behind a single reader-writer lock, the
//! same single-writer-multi-reader shape this codebase uses to guard its
//! own chain state (a block-processing mutex serializing writers,
//! everything else taking a shared read).

use std::collections::HashSet;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use log::debug;

use crate::config::EngineConfig;
use crate::error::{EngineError, EngineResult};
use crate::history::HistoryLedger;
use crate::identity;
use crate::mutation::CrMutation;
use crate::primitives::{Block, Transaction, U168};
use crate::registry::{Candidate, CandidateRegistry, CandidateState};
use crate::transaction;
use crate::utxo::UtxoIndex;

/// A self-contained, immutable copy of the engine's state. Returned by
/// [`CrEngine::finish_voting`] and [`CrEngine::get_snapshot`]; holding one
/// never aliases the engine's live maps.
#[derive(Debug, Clone)]
pub struct StateSnapshot {
    pub registry: CandidateRegistry,
    pub utxo: UtxoIndex,
}

struct EngineState {
    registry: CandidateRegistry,
    utxo: UtxoIndex,
    history: HistoryLedger<CrMutation>,
    /// CIDs of candidates currently eligible for the active voting round.
    /// Kept in lockstep with activation, independent of the `Active` map
    /// itself so `finish_voting` can retire a round without touching
    /// candidate lifecycle state.
    activity_candidates: HashSet<U168>,
    config: EngineConfig,
}

pub struct CrEngine {
    inner: RwLock<EngineState>,
}

impl Default for CrEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl CrEngine {
    pub fn new() -> Self {
        Self::with_config(EngineConfig::default())
    }

    pub fn with_config(config: EngineConfig) -> Self {
        let state = EngineState {
            registry: CandidateRegistry::new(),
            utxo: UtxoIndex::new(),
            history: HistoryLedger::new(config.max_history_capacity),
            activity_candidates: HashSet::new(),
            config,
        };
        Self { inner: RwLock::new(state) }
    }

    fn read(&self) -> EngineResult<RwLockReadGuard<'_, EngineState>> {
        self.inner.read().map_err(|_| EngineError::Poisoned)
    }

    fn write(&self) -> EngineResult<RwLockWriteGuard<'_, EngineState>> {
        self.inner.write().map_err(|_| EngineError::Poisoned)
    }

    // ---- mutating surface -----------------------------------------------

    /// Purges stale vote-cache entries, applies every transaction in
    /// block order, sweeps `Pending` for candidates due for activation,
    /// then commits the history batch at `block.height`.
    pub fn process_block(&self, block: &Block) -> EngineResult<()> {
        let mut state = self.write()?;
        let EngineState { registry, utxo, history, activity_candidates, config } = &mut *state;

        utxo.purge_cache_older_than(block.height, config.cache_cr_votes_size);
        for tx in &block.transactions {
            transaction::process_transaction(registry, utxo, history, tx, block.height);
        }
        activate_due_candidates(registry, history, activity_candidates, block.height, config);
        history.commit(block.height);
        Ok(())
    }

    /// Like [`CrEngine::process_block`] but dispatches only the
    /// `ReturnCRDepositCoin` branch of each transaction — a catch-up pass
    /// for callers that process deposit returns separately.
    pub fn process_return_deposit_txs(&self, block: &Block) -> EngineResult<()> {
        let mut state = self.write()?;
        let EngineState { registry, utxo, history, activity_candidates, config } = &mut *state;

        utxo.purge_cache_older_than(block.height, config.cache_cr_votes_size);
        for tx in &block.transactions {
            transaction::process_return_deposit_only(registry, utxo, history, tx, block.height);
        }
        activate_due_candidates(registry, history, activity_candidates, block.height, config);
        history.commit(block.height);
        Ok(())
    }

    /// Unwinds every sealed batch above `height` by replaying its undo
    /// entries in strict reverse append order.
    pub fn rollback_to(&self, height: u32) -> EngineResult<()> {
        let mut state = self.write()?;
        let EngineState { registry, utxo, history, .. } = &mut *state;
        history.rollback_to(height, |m| match m {
            CrMutation::Registry(rm) => registry.apply_mutation(rm),
            CrMutation::Utxo(um) => utxo.apply_mutation(um),
        })
    }

    /// Retires a voting round: drops the given DIDs from the active-round
    /// bookkeeping, starts a fresh empty history ledger, and returns a
    /// deep snapshot of the resulting state.
    pub fn finish_voting(&self, dids: &[U168]) -> EngineResult<StateSnapshot> {
        let mut state = self.write()?;
        for did in dids {
            if let Some(candidate) = state.registry.get_candidate_by_id(did) {
                let cid = candidate.cid();
                state.activity_candidates.remove(&cid);
            }
        }
        state.history = HistoryLedger::new(state.config.max_history_capacity);
        debug!("finish_voting: history ledger reset, {} dids retired", dids.len());
        Ok(StateSnapshot { registry: state.registry.clone(), utxo: state.utxo.clone() })
    }

    /// A read-only counterpart to [`CrEngine::finish_voting`]: a deep
    /// snapshot of current state without ending the voting round or
    /// touching history.
    pub fn get_snapshot(&self) -> EngineResult<StateSnapshot> {
        let state = self.read()?;
        Ok(StateSnapshot { registry: state.registry.clone(), utxo: state.utxo.clone() })
    }

    // ---- read surface -----------------------------------------------------

    pub fn is_cr_transaction(&self, tx: &Transaction) -> EngineResult<bool> {
        Ok(transaction::is_cr_transaction(tx, &self.read()?.utxo))
    }

    pub fn get_candidate_by_cid(&self, cid: &U168) -> EngineResult<Option<Candidate>> {
        Ok(self.read()?.registry.get_candidate_by_cid(cid).cloned())
    }

    pub fn get_candidate_by_code(&self, code: &[u8]) -> EngineResult<Option<Candidate>> {
        Ok(self.read()?.registry.get_candidate_by_code(code).cloned())
    }

    pub fn get_candidate_by_id(&self, id: &U168) -> EngineResult<Option<Candidate>> {
        Ok(self.read()?.registry.get_candidate_by_id(id).cloned())
    }

    pub fn get_candidate_by_public_key(&self, pubkey: &[u8]) -> EngineResult<Option<Candidate>> {
        let code = identity::code_of(pubkey)?;
        Ok(self.read()?.registry.get_candidate_by_code(&code).cloned())
    }

    pub fn get_candidate_by_deposit_hash(&self, hash: &U168) -> EngineResult<Option<Candidate>> {
        Ok(self.read()?.registry.get_candidate_by_deposit_hash(hash).cloned())
    }

    pub fn exist_candidate_by_cid(&self, cid: &U168) -> EngineResult<bool> {
        Ok(self.read()?.registry.exist_candidate_by_cid(cid))
    }

    pub fn exist_candidate_by_nickname(&self, nickname: &str) -> EngineResult<bool> {
        Ok(self.read()?.registry.exist_candidate_by_nickname(nickname))
    }

    pub fn exist_candidate_by_code(&self, code: &[u8]) -> EngineResult<bool> {
        Ok(self.read()?.registry.exist_candidate_by_code(code))
    }

    pub fn exist_candidate_by_deposit_hash(&self, hash: &U168) -> EngineResult<bool> {
        Ok(self.read()?.registry.exist_candidate_by_deposit_hash(hash))
    }

    pub fn get_candidates(&self, state: CandidateState) -> EngineResult<Vec<Candidate>> {
        Ok(self.read()?.registry.get_candidates(state).into_iter().cloned().collect())
    }

    pub fn get_all_candidates(&self) -> EngineResult<Vec<Candidate>> {
        Ok(self.read()?.registry.get_all_candidates().into_iter().cloned().collect())
    }

    pub fn history_depth(&self) -> EngineResult<usize> {
        Ok(self.read()?.history.depth())
    }
}

fn activate_due_candidates(
    registry: &mut CandidateRegistry,
    history: &mut HistoryLedger<CrMutation>,
    activity_candidates: &mut HashSet<U168>,
    height: u32,
    config: &EngineConfig,
) {
    for cid in registry.pending_due_for_activation(height, config.activate_duration) {
        if let Some(m) = registry.activate(cid) {
            history.append(height, CrMutation::Registry(m));
            activity_candidates.insert(cid);
        }
    }
}
