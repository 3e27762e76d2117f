//! Candidate Registry (CR) — the core entity store: four disjoint
//! candidate maps plus the secondary indexes that must stay in lockstep
//! with them.
//!
//! Per §4.4, `Canceled` and `Returned` candidates share one backing map
//! (`canceled_or_returned`)
//! and are told apart by `Candidate::state`; `get_candidates` /
//! `get_all_candidates` still present them as the four logical buckets
//! callers expect.

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};

use crate::primitives::{CrInfo, Fixed64, U168};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CandidateState {
    Pending,
    Active,
    Canceled,
    Returned,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candidate {
    pub info: CrInfo,
    pub register_height: u32,
    pub cancel_height: u32,
    pub votes: Fixed64,
    pub deposit_amount: Fixed64,
    pub deposit_hash: U168,
    pub state: CandidateState,
}

impl Candidate {
    pub fn cid(&self) -> U168 {
        self.info.cid
    }
}

/// Which backing map a candidate lives in. `CanceledOrReturned` covers both
/// logical `Canceled` and `Returned` states, matching the source's single
/// `CanceledCandidates` table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum MapKind {
    Pending,
    Active,
    CanceledOrReturned,
}

/// Tagged inverse of a single registry write. Each variant fully
/// describes how to put the registry back the way it was; a whole
/// logical operation (e.g. `RegisterCR`) is represented as a `Vec` of
/// these so the history ledger can bundle them into one group.
#[derive(Debug, Clone)]
pub enum RegistryMutation {
    RemoveFromPending(U168),
    RemoveFromCanceled(U168),
    RestorePending(U168, Box<Candidate>),
    RestoreActive(U168, Box<Candidate>),
    RestoreCanceled(U168, Box<Candidate>),
    RestoreVotes(U168, Fixed64),
    RestoreDepositAmount(U168, Fixed64),
    RestoreInfo(U168, Box<CrInfo>),
    InsertNickname(String),
    RemoveNickname(String),
    RemoveCodeCid(String),
    RemoveDepositHash(U168),
    /// Undo of `activate`: move a candidate back from `Active` to `Pending`.
    MoveActiveToPending(U168),
}

#[derive(Debug, Default, Clone)]
pub struct CandidateRegistry {
    pending: HashMap<U168, Candidate>,
    active: HashMap<U168, Candidate>,
    canceled_or_returned: HashMap<U168, Candidate>,
    nicknames: HashSet<String>,
    code_cid: HashMap<String, U168>,
    deposit_hash: HashSet<U168>,
}

fn code_key(code: &[u8]) -> String {
    hex::encode(code)
}

impl CandidateRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn map(&self, kind: MapKind) -> &HashMap<U168, Candidate> {
        match kind {
            MapKind::Pending => &self.pending,
            MapKind::Active => &self.active,
            MapKind::CanceledOrReturned => &self.canceled_or_returned,
        }
    }

    fn map_mut(&mut self, kind: MapKind) -> &mut HashMap<U168, Candidate> {
        match kind {
            MapKind::Pending => &mut self.pending,
            MapKind::Active => &mut self.active,
            MapKind::CanceledOrReturned => &mut self.canceled_or_returned,
        }
    }

    fn locate(&self, cid: &U168) -> Option<MapKind> {
        if self.pending.contains_key(cid) {
            Some(MapKind::Pending)
        } else if self.active.contains_key(cid) {
            Some(MapKind::Active)
        } else if self.canceled_or_returned.contains_key(cid) {
            Some(MapKind::CanceledOrReturned)
        } else {
            None
        }
    }

    // ---- read surface -----------------------------------------------

    pub fn get_candidate_by_cid(&self, cid: &U168) -> Option<&Candidate> {
        self.pending
            .get(cid)
            .or_else(|| self.active.get(cid))
            .or_else(|| self.canceled_or_returned.get(cid))
    }

    pub fn get_candidate_by_code(&self, code: &[u8]) -> Option<&Candidate> {
        let cid = self.code_cid.get(&code_key(code))?;
        self.get_candidate_by_cid(cid)
    }

    /// Tries `cid` first; failing that, derives `did` from every stored
    /// candidate's code and compares.
    pub fn get_candidate_by_id(&self, id: &U168) -> Option<&Candidate> {
        if let Some(c) = self.get_candidate_by_cid(id) {
            return Some(c);
        }
        self.get_all_candidates()
            .into_iter()
            .find(|c| crate::identity::did_of(&c.info.code).map(|d| d == *id).unwrap_or(false))
    }

    pub fn get_candidate_by_deposit_hash(&self, hash: &U168) -> Option<&Candidate> {
        self.get_all_candidates().into_iter().find(|c| c.deposit_hash == *hash)
    }

    pub fn exist_candidate_by_cid(&self, cid: &U168) -> bool {
        self.get_candidate_by_cid(cid).is_some()
    }

    pub fn exist_candidate_by_nickname(&self, nickname: &str) -> bool {
        self.nicknames.contains(nickname)
    }

    pub fn exist_candidate_by_code(&self, code: &[u8]) -> bool {
        self.code_cid.contains_key(&code_key(code))
    }

    pub fn exist_candidate_by_deposit_hash(&self, hash: &U168) -> bool {
        self.deposit_hash.contains(hash)
    }

    pub fn get_candidates(&self, state: CandidateState) -> Vec<&Candidate> {
        match state {
            CandidateState::Pending => self.pending.values().collect(),
            CandidateState::Active => self.active.values().collect(),
            CandidateState::Canceled => self
                .canceled_or_returned
                .values()
                .filter(|c| c.state == CandidateState::Canceled)
                .collect(),
            CandidateState::Returned => self
                .canceled_or_returned
                .values()
                .filter(|c| c.state == CandidateState::Returned)
                .collect(),
        }
    }

    pub fn get_all_candidates(&self) -> Vec<&Candidate> {
        let mut all = Vec::with_capacity(
            self.pending.len() + self.active.len() + self.canceled_or_returned.len(),
        );
        all.extend(self.pending.values());
        all.extend(self.active.values());
        all.extend(
            self.canceled_or_returned.values().filter(|c| c.state == CandidateState::Canceled),
        );
        all.extend(
            self.canceled_or_returned.values().filter(|c| c.state == CandidateState::Returned),
        );
        all
    }

    pub(crate) fn pending_due_for_activation(&self, height: u32, activate_duration: u32) -> Vec<U168> {
        self.pending
            .iter()
            .filter(|(_, c)| height.saturating_sub(c.register_height) + 1 >= activate_duration)
            .map(|(cid, _)| *cid)
            .collect()
    }

    // ---- forward mutations (return their own inverse) ----------------

    /// Fresh `RegisterCR`: no prior candidate existed with this cid.
    pub fn register_fresh(&mut self, candidate: Candidate) -> Vec<RegistryMutation> {
        let cid = candidate.cid();
        let nickname = candidate.info.nickname.clone();
        let code_hex = code_key(&candidate.info.code);
        let deposit_hash = candidate.deposit_hash;

        self.pending.insert(cid, candidate);
        self.nicknames.insert(nickname.clone());
        self.code_cid.insert(code_hex.clone(), cid);
        self.deposit_hash.insert(deposit_hash);

        vec![
            RegistryMutation::RemoveFromPending(cid),
            RegistryMutation::RemoveNickname(nickname),
            RegistryMutation::RemoveCodeCid(code_hex),
            RegistryMutation::RemoveDepositHash(deposit_hash),
        ]
    }

    /// Re-register after cancel: carries over `votes` from the prior
    /// `Canceled` record. Per the source behavior this deliberately does
    /// *not* touch `CodeCIDMap`/`DepositHashMap` — they are assumed
    /// already present from the original registration.
    pub fn re_register(&mut self, old_cid: U168, mut candidate: Candidate) -> Vec<RegistryMutation> {
        let old = self.canceled_or_returned.remove(&old_cid);
        let carried_votes = old.as_ref().map(|c| c.votes).unwrap_or(0);
        candidate.votes = carried_votes;
        let cid = candidate.cid();
        let nickname = candidate.info.nickname.clone();

        self.pending.insert(cid, candidate);
        self.nicknames.insert(nickname.clone());

        let mut undo = vec![
            RegistryMutation::RemoveFromPending(cid),
            RegistryMutation::RemoveNickname(nickname),
        ];
        if let Some(old_candidate) = old {
            undo.push(RegistryMutation::RestoreCanceled(old_cid, Box::new(old_candidate)));
        }
        undo
    }

    pub fn update_info(&mut self, cid: U168, new_info: CrInfo) -> Option<Vec<RegistryMutation>> {
        let kind = self.locate(&cid)?;
        let candidate = self.map_mut(kind).get_mut(&cid)?;
        let old_info = candidate.info.clone();
        let nickname_changed = old_info.nickname != new_info.nickname;
        let new_nickname = new_info.nickname.clone();
        candidate.info = new_info;

        let mut undo = vec![RegistryMutation::RestoreInfo(cid, Box::new(old_info.clone()))];
        if nickname_changed {
            self.nicknames.remove(&old_info.nickname);
            self.nicknames.insert(new_nickname.clone());
            undo.push(RegistryMutation::RemoveNickname(new_nickname));
            undo.push(RegistryMutation::InsertNickname(old_info.nickname));
        }
        Some(undo)
    }

    pub fn unregister(&mut self, cid: U168, height: u32) -> Option<Vec<RegistryMutation>> {
        let kind = self.locate(&cid)?;
        if kind == MapKind::CanceledOrReturned {
            return None;
        }
        let original = self.map(kind).get(&cid)?.clone();
        let mut candidate = self.map_mut(kind).remove(&cid)?;
        let nickname = candidate.info.nickname.clone();

        candidate.cancel_height = height;
        candidate.state = CandidateState::Canceled;
        self.canceled_or_returned.insert(cid, candidate);
        let nickname_removed = self.nicknames.remove(&nickname);

        let mut undo = vec![
            RegistryMutation::RemoveFromCanceled(cid),
            match kind {
                MapKind::Pending => RegistryMutation::RestorePending(cid, Box::new(original)),
                MapKind::Active => RegistryMutation::RestoreActive(cid, Box::new(original)),
                MapKind::CanceledOrReturned => unreachable!(),
            },
        ];
        if nickname_removed {
            undo.push(RegistryMutation::InsertNickname(nickname));
        }
        Some(undo)
    }

    /// Per §4.5, `ReturnCRDepositCoin` may transition a candidate straight
    /// from `Pending` or `Active` to `Returned` — a prior `UnregisterCR` is
    /// not required. Moves the candidate into `canceled_or_returned`
    /// regardless of which map it started in.
    pub fn return_deposit(&mut self, cid: U168, input_value: Fixed64) -> Option<Vec<RegistryMutation>> {
        let kind = self.locate(&cid)?;
        let original = self.map(kind).get(&cid)?.clone();
        let mut candidate = self.map_mut(kind).remove(&cid)?;
        candidate.deposit_amount -= input_value;
        candidate.state = CandidateState::Returned;
        let nickname = candidate.info.nickname.clone();
        let nickname_removed = self.nicknames.remove(&nickname);
        self.canceled_or_returned.insert(cid, candidate);

        let mut undo = vec![
            RegistryMutation::RemoveFromCanceled(cid),
            match kind {
                MapKind::Pending => RegistryMutation::RestorePending(cid, Box::new(original)),
                MapKind::Active => RegistryMutation::RestoreActive(cid, Box::new(original)),
                MapKind::CanceledOrReturned => RegistryMutation::RestoreCanceled(cid, Box::new(original)),
            },
        ];
        if nickname_removed {
            undo.push(RegistryMutation::InsertNickname(nickname));
        }
        Some(undo)
    }

    pub fn add_votes(&mut self, cid: U168, amount: Fixed64) -> Option<RegistryMutation> {
        let kind = self.locate(&cid)?;
        let candidate = self.map_mut(kind).get_mut(&cid)?;
        let old = candidate.votes;
        candidate.votes += amount;
        Some(RegistryMutation::RestoreVotes(cid, old))
    }

    pub fn sub_votes(&mut self, cid: U168, amount: Fixed64) -> Option<RegistryMutation> {
        let kind = self.locate(&cid)?;
        let candidate = self.map_mut(kind).get_mut(&cid)?;
        let old = candidate.votes;
        candidate.votes -= amount;
        Some(RegistryMutation::RestoreVotes(cid, old))
    }

    pub fn add_deposit(&mut self, cid: U168, amount: Fixed64) -> Option<RegistryMutation> {
        let kind = self.locate(&cid)?;
        let candidate = self.map_mut(kind).get_mut(&cid)?;
        let old = candidate.deposit_amount;
        candidate.deposit_amount += amount;
        Some(RegistryMutation::RestoreDepositAmount(cid, old))
    }

    pub(crate) fn activate(&mut self, cid: U168) -> Option<RegistryMutation> {
        let candidate = self.pending.remove(&cid)?;
        self.active.insert(cid, candidate);
        Some(RegistryMutation::MoveActiveToPending(cid))
    }

    // ---- undo interpreter ---------------------------------------------

    pub(crate) fn apply_mutation(&mut self, m: RegistryMutation) {
        match m {
            RegistryMutation::RemoveFromPending(cid) => {
                self.pending.remove(&cid);
            }
            RegistryMutation::RemoveFromCanceled(cid) => {
                self.canceled_or_returned.remove(&cid);
            }
            RegistryMutation::RestorePending(cid, candidate) => {
                self.pending.insert(cid, *candidate);
            }
            RegistryMutation::RestoreActive(cid, candidate) => {
                self.active.insert(cid, *candidate);
            }
            RegistryMutation::RestoreCanceled(cid, candidate) => {
                self.canceled_or_returned.insert(cid, *candidate);
            }
            RegistryMutation::RestoreVotes(cid, votes) => {
                if let Some(kind) = self.locate(&cid) {
                    if let Some(c) = self.map_mut(kind).get_mut(&cid) {
                        c.votes = votes;
                    }
                }
            }
            RegistryMutation::RestoreDepositAmount(cid, amount) => {
                if let Some(kind) = self.locate(&cid) {
                    if let Some(c) = self.map_mut(kind).get_mut(&cid) {
                        c.deposit_amount = amount;
                    }
                }
            }
            RegistryMutation::RestoreInfo(cid, info) => {
                if let Some(kind) = self.locate(&cid) {
                    if let Some(c) = self.map_mut(kind).get_mut(&cid) {
                        c.info = *info;
                    }
                }
            }
            RegistryMutation::InsertNickname(nick) => {
                self.nicknames.insert(nick);
            }
            RegistryMutation::RemoveNickname(nick) => {
                self.nicknames.remove(&nick);
            }
            RegistryMutation::RemoveCodeCid(code_hex) => {
                self.code_cid.remove(&code_hex);
            }
            RegistryMutation::RemoveDepositHash(hash) => {
                self.deposit_hash.remove(&hash);
            }
            RegistryMutation::MoveActiveToPending(cid) => {
                if let Some(c) = self.active.remove(&cid) {
                    self.pending.insert(cid, c);
                }
            }
        }
    }
}
