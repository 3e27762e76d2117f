//! UTXO Index (UTXO) — the two outpoint-keyed maps the transaction
//! processor consults when crediting or cancelling votes, and when
//! tracking deposit outputs.
//!
//! The `votes_cache` exists purely to survive the gap between "a vote
//! output is cancelled" and "that cancellation falls out of the reorg
//! window": a cancel-of-cancel a few blocks later still needs to see the
//! output that was nulled out of `votes`, so it is parked here until
//! [`UtxoIndex::purge_cache_older_than`] sweeps it.

use std::collections::HashMap;

use crate::primitives::{Output, ReferKey};

/// Tagged inverse of a single UTXO-index write, mirroring
/// [`crate::registry::RegistryMutation`]'s shape.
#[derive(Debug, Clone)]
pub enum UtxoMutation {
    RemoveVote(ReferKey),
    RestoreVote(ReferKey, Option<Output>),
    RemoveDepositOutput(ReferKey),
    RestoreDepositOutput(ReferKey, Output),
    RemoveVotesCache(ReferKey),
    RestoreVotesCache(ReferKey, Output),
}

#[derive(Debug, Default, Clone)]
pub struct UtxoIndex {
    /// `None` once a spend has been observed; the key itself is never
    /// removed so rollback can re-index it as non-null.
    votes: HashMap<ReferKey, Option<Output>>,
    deposit_outputs: HashMap<ReferKey, Output>,
    votes_cache: HashMap<ReferKey, Output>,
    votes_cache_keys: HashMap<u32, Vec<ReferKey>>,
}

impl UtxoIndex {
    pub fn new() -> Self {
        Self::default()
    }

    // ---- read surface --------------------------------------------------

    /// `Some(Some(output))` if live, `Some(None)` if cancelled, `None` if
    /// never observed. The three-way distinction is load-bearing — see
    /// the module doc.
    pub fn get_vote(&self, key: &ReferKey) -> Option<&Option<Output>> {
        self.votes.get(key)
    }

    pub fn get_deposit_output(&self, key: &ReferKey) -> Option<&Output> {
        self.deposit_outputs.get(key)
    }

    pub fn cached_vote(&self, key: &ReferKey) -> Option<&Output> {
        self.votes_cache.get(key)
    }

    pub fn votes_len(&self) -> usize {
        self.votes.len()
    }

    pub fn deposit_outputs_len(&self) -> usize {
        self.deposit_outputs.len()
    }

    // ---- forward mutations (return their own inverse) ------------------

    pub fn insert_vote(&mut self, key: ReferKey, output: Output) -> UtxoMutation {
        match self.votes.insert(key.clone(), Some(output)) {
            Some(previous) => UtxoMutation::RestoreVote(key, previous),
            None => UtxoMutation::RemoveVote(key),
        }
    }

    pub fn insert_deposit_output(&mut self, key: ReferKey, output: Output) -> UtxoMutation {
        match self.deposit_outputs.insert(key.clone(), output) {
            Some(previous) => UtxoMutation::RestoreDepositOutput(key, previous),
            None => UtxoMutation::RemoveDepositOutput(key),
        }
    }

    /// Nulls a live `votes` entry and parks its output in the cache under
    /// `height`. Returns the output that was cancelled (so the caller can
    /// compute the vote amounts to subtract) plus the undo entries that
    /// reverse both the null-out and the cache insert. `None` if `key`
    /// was not present or was already null.
    pub fn cancel_vote(&mut self, key: &ReferKey, height: u32) -> Option<(Output, Vec<UtxoMutation>)> {
        let slot = self.votes.get_mut(key)?;
        let output = slot.take()?;

        let mut undo = vec![UtxoMutation::RestoreVote(key.clone(), Some(output.clone()))];
        undo.push(match self.votes_cache.insert(key.clone(), output.clone()) {
            Some(previous) => UtxoMutation::RestoreVotesCache(key.clone(), previous),
            None => UtxoMutation::RemoveVotesCache(key.clone()),
        });
        self.votes_cache_keys.entry(height).or_default().push(key.clone());

        Some((output, undo))
    }

    /// Purges every cache entry recorded at a height `<= current_height -
    /// window`. Not history-tracked: this is per-block housekeeping run
    /// before transactions are processed, not part of any one
    /// transaction's do/undo pair.
    pub fn purge_cache_older_than(&mut self, current_height: u32, window: u32) {
        let threshold = current_height.saturating_sub(window);
        let stale: Vec<u32> =
            self.votes_cache_keys.keys().filter(|&&h| h <= threshold).copied().collect();
        for h in stale {
            if let Some(keys) = self.votes_cache_keys.remove(&h) {
                for k in keys {
                    self.votes_cache.remove(&k);
                }
            }
        }
    }

    // ---- undo interpreter ----------------------------------------------

    pub(crate) fn apply_mutation(&mut self, m: UtxoMutation) {
        match m {
            UtxoMutation::RemoveVote(k) => {
                self.votes.remove(&k);
            }
            UtxoMutation::RestoreVote(k, v) => {
                self.votes.insert(k, v);
            }
            UtxoMutation::RemoveDepositOutput(k) => {
                self.deposit_outputs.remove(&k);
            }
            UtxoMutation::RestoreDepositOutput(k, v) => {
                self.deposit_outputs.insert(k, v);
            }
            UtxoMutation::RemoveVotesCache(k) => {
                self.votes_cache.remove(&k);
            }
            UtxoMutation::RestoreVotesCache(k, v) => {
                self.votes_cache.insert(k, v);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::primitives::{PrefixType, U168};

    fn sample_output(value: i64) -> Output {
        Output::standard(value, U168::new(PrefixType::Standard, [1u8; 20]))
    }

    #[test]
    fn insert_vote_then_cancel_nulls_without_removing_key() {
        let mut idx = UtxoIndex::new();
        idx.insert_vote("k1".into(), sample_output(100));
        let (cancelled, _undo) = idx.cancel_vote(&"k1".to_string(), 10).unwrap();
        assert_eq!(cancelled.value, 100);
        assert_eq!(idx.get_vote(&"k1".to_string()), Some(&None));
        assert_eq!(idx.cached_vote(&"k1".to_string()).unwrap().value, 100);
    }

    #[test]
    fn cancel_vote_twice_returns_none_second_time() {
        let mut idx = UtxoIndex::new();
        idx.insert_vote("k1".into(), sample_output(100));
        assert!(idx.cancel_vote(&"k1".to_string(), 10).is_some());
        assert!(idx.cancel_vote(&"k1".to_string(), 11).is_none());
    }

    #[test]
    fn purge_removes_only_entries_outside_window() {
        let mut idx = UtxoIndex::new();
        idx.insert_vote("old".into(), sample_output(1));
        idx.cancel_vote(&"old".to_string(), 1);
        idx.insert_vote("new".into(), sample_output(2));
        idx.cancel_vote(&"new".to_string(), 9);

        idx.purge_cache_older_than(10, 6);

        assert!(idx.cached_vote(&"old".to_string()).is_none());
        assert!(idx.cached_vote(&"new".to_string()).is_some());
    }

    #[test]
    fn undo_restores_prior_vote_value() {
        let mut idx = UtxoIndex::new();
        let m = idx.insert_vote("k1".into(), sample_output(5));
        idx.apply_mutation(m);
        assert!(idx.get_vote(&"k1".to_string()).is_none());
    }
}
