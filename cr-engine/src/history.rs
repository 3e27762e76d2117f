//! History Ledger (HL) — a bounded, append-only log of per-height undo
//! batches.
//!
//! Forward mutations are applied eagerly by the caller (the registry and
//! UTXO index mutate themselves directly); this ledger only retains the
//! *inverse* of each mutation, tagged by the height it was recorded at, so
//! [`HistoryLedger::rollback_to`] can unwind a run of committed blocks
//! without re-deriving state from scratch. This mirrors the bounded-undo
//! shape of this codebase's own chain reorg handling, but keeps the undo
//! log in memory as tagged records instead of replaying stored blocks.

use std::collections::VecDeque;

use crate::error::{EngineError, EngineResult};

/// One undo record together with the height its forward mutation was
/// recorded at. `T` is the mutation-inverse type the caller threads
/// through (a `Vec` of tagged enum variants covering registry + UTXO
/// index changes for one transaction or activation sweep).
struct HistoryBatch<T> {
    height: u32,
    /// Entries in append order; undo must run in reverse.
    undos: Vec<T>,
}

/// Bounded deque of sealed per-height batches plus one open (uncommitted)
/// batch accumulating undo entries for the height currently being
/// processed.
pub struct HistoryLedger<T> {
    capacity: u32,
    sealed: VecDeque<HistoryBatch<T>>,
    open: Option<HistoryBatch<T>>,
}

impl<T> HistoryLedger<T> {
    pub fn new(capacity: u32) -> Self {
        Self { capacity, sealed: VecDeque::new(), open: None }
    }

    /// Records `undo` against the batch open at `height`. Opens a new
    /// batch if none is open or the open batch is for an earlier height.
    /// Panics if `height` precedes the currently open batch — callers
    /// only ever append at a monotonically non-decreasing height within
    /// one `process_block` call.
    pub fn append(&mut self, height: u32, undo: T) {
        match &mut self.open {
            Some(batch) if batch.height == height => batch.undos.push(undo),
            Some(batch) => {
                assert!(height > batch.height, "history height must not move backward");
                let mut fresh = HistoryBatch { height, undos: Vec::new() };
                fresh.undos.push(undo);
                self.open = Some(fresh);
            }
            None => {
                let mut fresh = HistoryBatch { height, undos: Vec::new() };
                fresh.undos.push(undo);
                self.open = Some(fresh);
            }
        }
    }

    /// Seals the batch open at `height` (creating an empty one if
    /// `append` was never called for this height) and evicts the oldest
    /// sealed batch once the ledger exceeds `capacity`.
    pub fn commit(&mut self, height: u32) {
        let batch = match self.open.take() {
            Some(b) if b.height == height => b,
            Some(b) => {
                self.sealed.push_back(b);
                HistoryBatch { height, undos: Vec::new() }
            }
            None => HistoryBatch { height, undos: Vec::new() },
        };
        self.sealed.push_back(batch);
        while self.sealed.len() as u32 > self.capacity {
            self.sealed.pop_front();
        }
    }

    /// Newest sealed height, if any batch has been committed yet.
    pub fn newest_height(&self) -> Option<u32> {
        self.sealed.back().map(|b| b.height)
    }

    fn oldest_height(&self) -> Option<u32> {
        self.sealed.front().map(|b| b.height)
    }

    /// Pops sealed batches newest-first, invoking `apply` with each undo
    /// entry in reverse append order, until the newest remaining sealed
    /// height is `<= height`.
    pub fn rollback_to(
        &mut self,
        height: u32,
        mut apply: impl FnMut(T),
    ) -> EngineResult<()> {
        if let Some(oldest) = self.oldest_height() {
            if height < oldest {
                return Err(EngineError::InsufficientHistory {
                    requested: height,
                    oldest_retained: oldest,
                });
            }
        } else {
            // Nothing committed yet; rolling back to anything is a no-op.
            return Ok(());
        }

        while let Some(newest) = self.newest_height() {
            if newest <= height {
                break;
            }
            let batch = self.sealed.pop_back().expect("newest_height implies a back entry");
            for undo in batch.undos.into_iter().rev() {
                apply(undo);
            }
        }
        Ok(())
    }

    /// Number of sealed batches currently retained.
    pub fn depth(&self) -> usize {
        self.sealed.len()
    }

    /// Resets the ledger to empty, discarding all sealed and open
    /// batches. Used by `finish_voting` to start a fresh voting round.
    pub fn reset(&mut self) {
        self.sealed.clear();
        self.open = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn append_then_rollback_runs_undo_in_reverse() {
        let mut ledger: HistoryLedger<i32> = HistoryLedger::new(10);
        ledger.append(1, 1);
        ledger.append(1, 2);
        ledger.append(1, 3);
        ledger.commit(1);

        let mut order = Vec::new();
        ledger.rollback_to(0, |undo| order.push(undo)).unwrap();
        assert_eq!(order, vec![3, 2, 1]);
    }

    #[test]
    fn commit_evicts_oldest_beyond_capacity() {
        let mut ledger: HistoryLedger<i32> = HistoryLedger::new(2);
        for h in 1..=3 {
            ledger.append(h, h as i32);
            ledger.commit(h);
        }
        assert_eq!(ledger.depth(), 2);
        assert_eq!(ledger.oldest_height(), Some(2));
    }

    #[test]
    fn rollback_beyond_retained_depth_errors() {
        let mut ledger: HistoryLedger<i32> = HistoryLedger::new(2);
        for h in 1..=5 {
            ledger.append(h, h as i32);
            ledger.commit(h);
        }
        let result = ledger.rollback_to(1, |_| {});
        assert!(matches!(result, Err(EngineError::InsufficientHistory { .. })));
    }

    #[test]
    fn rollback_to_current_height_is_noop() {
        let mut ledger: HistoryLedger<i32> = HistoryLedger::new(10);
        ledger.append(1, 1);
        ledger.commit(1);
        let mut order = Vec::new();
        ledger.rollback_to(1, |undo| order.push(undo)).unwrap();
        assert!(order.is_empty());
    }

    #[test]
    fn reset_clears_all_batches() {
        let mut ledger: HistoryLedger<i32> = HistoryLedger::new(10);
        ledger.append(1, 1);
        ledger.commit(1);
        ledger.reset();
        assert_eq!(ledger.depth(), 0);
        assert_eq!(ledger.newest_height(), None);
    }
}
