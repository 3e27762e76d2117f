//! Transaction Processor (TP) — classifies a transaction by type and
//! dispatches to the registry/UTXO mutation routines, threading every
//! write through the history ledger as it goes.
//!
//! Every function here is free-standing rather than a method on
//! [`crate::engine::CrEngine`] so the engine can hold its write lock for
//! exactly one call into this module per transaction, matching the
//! "single write lock for the whole mutation" model in this codebase's
//! own block-processing path.

use log::warn;

use crate::config::{TX_VERSION_09, VOTE_PRODUCER_AND_CR_VERSION};
use crate::history::HistoryLedger;
use crate::identity;
use crate::mutation::CrMutation;
use crate::primitives::{
    Fixed64, OutPoint, Output, OutputType, PrefixType, Transaction, TxPayload, TxType,
};
use crate::registry::{Candidate, CandidateRegistry, CandidateState};
use crate::utxo::UtxoIndex;

/// `is_cr_transaction` per §4.5: a RegisterCR/UpdateCR/UnregisterCR/
/// ReturnCRDepositCoin by type, a version-9+ TransferAsset carrying a
/// CRC vote output, or any transaction whose input spends a currently
/// tracked vote outpoint.
pub fn is_cr_transaction(tx: &Transaction, utxo: &UtxoIndex) -> bool {
    let by_type = matches!(
        tx.tx_type,
        TxType::RegisterCr | TxType::UpdateCr | TxType::UnregisterCr | TxType::ReturnCrDepositCoin
    );
    let carries_crc_vote = tx.tx_type == TxType::TransferAsset
        && tx.version >= TX_VERSION_09
        && tx.outputs.iter().any(|o| {
            o.output_type == OutputType::Vote
                && o.payload
                    .as_ref()
                    .map_or(false, |p| p.version >= VOTE_PRODUCER_AND_CR_VERSION && p.has_crc_content())
        });
    let spends_tracked_vote = tx.inputs.iter().any(|i| utxo.get_vote(&i.previous.refer_key()).is_some());

    by_type || carries_crc_vote || spends_tracked_vote
}

/// Dispatches `tx` by type, then unconditionally runs `processCancelVotes`
/// (§4.5: "for every transaction type, finally call process_cancel_votes").
pub fn process_transaction(
    registry: &mut CandidateRegistry,
    utxo: &mut UtxoIndex,
    history: &mut HistoryLedger<CrMutation>,
    tx: &Transaction,
    height: u32,
) {
    match tx.tx_type {
        TxType::RegisterCr => process_register_cr(registry, utxo, history, tx, height),
        TxType::UpdateCr => process_update_cr(registry, history, tx, height),
        TxType::UnregisterCr => process_unregister_cr(registry, history, tx, height),
        TxType::ReturnCrDepositCoin => process_return_cr_deposit_coin(registry, utxo, history, tx, height),
        TxType::TransferAsset => {
            process_votes(registry, utxo, history, tx, height);
            process_deposit(registry, utxo, history, tx, height);
        }
        _ => {}
    }
    process_cancel_votes(registry, utxo, history, tx, height);
}

/// Only the deposit-return branch, for catch-up paths that handle
/// deposit returns in a second pass over the same block.
pub fn process_return_deposit_only(
    registry: &mut CandidateRegistry,
    utxo: &mut UtxoIndex,
    history: &mut HistoryLedger<CrMutation>,
    tx: &Transaction,
    height: u32,
) {
    if tx.tx_type == TxType::ReturnCrDepositCoin {
        process_return_cr_deposit_coin(registry, utxo, history, tx, height);
    }
}

fn record_registry(
    history: &mut HistoryLedger<CrMutation>,
    height: u32,
    muts: Vec<crate::registry::RegistryMutation>,
) {
    for m in muts {
        history.append(height, CrMutation::Registry(m));
    }
}

fn record_utxo(history: &mut HistoryLedger<CrMutation>, height: u32, muts: Vec<crate::utxo::UtxoMutation>) {
    for m in muts {
        history.append(height, CrMutation::Utxo(m));
    }
}

fn process_register_cr(
    registry: &mut CandidateRegistry,
    utxo: &mut UtxoIndex,
    history: &mut HistoryLedger<CrMutation>,
    tx: &Transaction,
    height: u32,
) {
    let info = match &tx.payload {
        TxPayload::CrInfo(info) => info.clone(),
        _ => {
            warn!("RegisterCR tx {} at height {} carries no CrInfo payload", tx.tx_hash.to_hex(), height);
            return;
        }
    };

    let deposit_hash = match identity::deposit_hash_of(&info.code) {
        Ok(h) => h,
        Err(e) => {
            warn!("RegisterCR tx {} at height {}: {}", tx.tx_hash.to_hex(), height, e);
            return;
        }
    };

    let mut amount: Fixed64 = 0;
    let mut deposit_muts = Vec::new();
    for (idx, output) in tx.outputs.iter().enumerate() {
        if output.program_hash == deposit_hash {
            amount += output.value;
            let key = OutPoint::new(tx.tx_hash, idx as u16).refer_key();
            deposit_muts.push(utxo.insert_deposit_output(key, output.clone()));
        }
    }

    let cid = info.cid;
    let candidate = Candidate {
        info,
        register_height: height,
        cancel_height: 0,
        votes: 0,
        deposit_amount: amount,
        deposit_hash,
        state: CandidateState::Pending,
    };

    let registry_muts = match registry.get_candidate_by_cid(&cid) {
        None => Some(registry.register_fresh(candidate)),
        Some(existing)
            if existing.state == CandidateState::Canceled || existing.state == CandidateState::Returned =>
        {
            Some(registry.re_register(cid, candidate))
        }
        Some(_) => {
            warn!(
                "RegisterCR tx {} at height {} duplicates a live candidate, ignoring",
                tx.tx_hash.to_hex(),
                height
            );
            None
        }
    };

    record_utxo(history, height, deposit_muts);
    if let Some(muts) = registry_muts {
        record_registry(history, height, muts);
    }
}

fn process_update_cr(
    registry: &mut CandidateRegistry,
    history: &mut HistoryLedger<CrMutation>,
    tx: &Transaction,
    height: u32,
) {
    let info = match &tx.payload {
        TxPayload::CrInfo(info) => info.clone(),
        _ => {
            warn!("UpdateCR tx {} at height {} carries no CrInfo payload", tx.tx_hash.to_hex(), height);
            return;
        }
    };
    let cid = info.cid;
    match registry.update_info(cid, info) {
        Some(muts) => record_registry(history, height, muts),
        None => warn!("UpdateCR tx {} at height {} references unknown cid", tx.tx_hash.to_hex(), height),
    }
}

fn process_unregister_cr(
    registry: &mut CandidateRegistry,
    history: &mut HistoryLedger<CrMutation>,
    tx: &Transaction,
    height: u32,
) {
    let info = match &tx.payload {
        TxPayload::UnregisterCr(info) => info.clone(),
        _ => {
            warn!("UnregisterCR tx {} at height {} carries no payload", tx.tx_hash.to_hex(), height);
            return;
        }
    };
    // No-op if the candidate doesn't exist, per §4.5.
    if let Some(muts) = registry.unregister(info.cid, height) {
        record_registry(history, height, muts);
    }
}

fn process_return_cr_deposit_coin(
    registry: &mut CandidateRegistry,
    utxo: &UtxoIndex,
    history: &mut HistoryLedger<CrMutation>,
    tx: &Transaction,
    height: u32,
) {
    let mut input_value: Fixed64 = 0;
    for input in &tx.inputs {
        let key = input.previous.refer_key();
        if let Some(output) = utxo.get_deposit_output(&key) {
            input_value += output.value;
        }
    }

    // Deliberately repeated once per matching program, not once per
    // transaction — see the §9 open question this preserves literally.
    for program in &tx.programs {
        if let Some(candidate) = registry.get_candidate_by_code(&program.code) {
            let cid = candidate.cid();
            if let Some(muts) = registry.return_deposit(cid, input_value) {
                record_registry(history, height, muts);
            }
        }
    }
}

fn process_votes(
    registry: &mut CandidateRegistry,
    utxo: &mut UtxoIndex,
    history: &mut HistoryLedger<CrMutation>,
    tx: &Transaction,
    height: u32,
) {
    if tx.version < TX_VERSION_09 {
        return;
    }
    for (idx, output) in tx.outputs.iter().enumerate() {
        if output.output_type != OutputType::Vote {
            continue;
        }
        let payload = match &output.payload {
            Some(p) if p.version >= VOTE_PRODUCER_AND_CR_VERSION && p.has_crc_content() => p,
            _ => continue,
        };

        let key = OutPoint::new(tx.tx_hash, idx as u16).refer_key();
        let utxo_mut = utxo.insert_vote(key, output.clone());
        history.append(height, CrMutation::Utxo(utxo_mut));

        for content in payload.contents.iter().filter(|c| c.is_crc()) {
            for cv in &content.candidate_votes {
                // Non-matching candidate ids are silently skipped per §4.5.
                if let Some(m) = registry.add_votes(cv.candidate, cv.votes) {
                    history.append(height, CrMutation::Registry(m));
                }
            }
        }
    }
}

fn process_deposit(
    registry: &mut CandidateRegistry,
    utxo: &mut UtxoIndex,
    history: &mut HistoryLedger<CrMutation>,
    tx: &Transaction,
    height: u32,
) {
    for (idx, output) in tx.outputs.iter().enumerate() {
        if output.program_hash.prefix_byte() != PrefixType::Deposit.byte() {
            continue;
        }
        let cid = match registry.get_candidate_by_deposit_hash(&output.program_hash) {
            Some(c) => c.cid(),
            None => continue,
        };
        if let Some(m) = registry.add_deposit(cid, output.value) {
            history.append(height, CrMutation::Registry(m));
        }
        let key = OutPoint::new(tx.tx_hash, idx as u16).refer_key();
        let um = utxo.insert_deposit_output(key, output.clone());
        history.append(height, CrMutation::Utxo(um));
    }
}

fn process_cancel_votes(
    registry: &mut CandidateRegistry,
    utxo: &mut UtxoIndex,
    history: &mut HistoryLedger<CrMutation>,
    tx: &Transaction,
    height: u32,
) {
    for input in &tx.inputs {
        let key = input.previous.refer_key();
        match utxo.get_vote(&key) {
            Some(Some(_)) => {
                if let Some((cancelled, undo)) = utxo.cancel_vote(&key, height) {
                    for m in undo {
                        history.append(height, CrMutation::Utxo(m));
                    }
                    subtract_votes(registry, history, &cancelled, height);
                }
            }
            Some(None) => match utxo.cached_vote(&key).cloned() {
                Some(cached) => subtract_votes(registry, history, &cached, height),
                None => {
                    warn!(
                        "tx {} at height {} cancels referkey {} absent from both votes and cache, aborting",
                        tx.tx_hash.to_hex(),
                        height,
                        key
                    );
                    return;
                }
            },
            None => {}
        }
    }
}

fn subtract_votes(
    registry: &mut CandidateRegistry,
    history: &mut HistoryLedger<CrMutation>,
    output: &Output,
    height: u32,
) {
    let payload = match &output.payload {
        Some(p) => p,
        None => return,
    };
    for content in payload.contents.iter().filter(|c| c.is_crc()) {
        for cv in &content.candidate_votes {
            if let Some(m) = registry.sub_votes(cv.candidate, cv.votes) {
                history.append(height, CrMutation::Registry(m));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::{cid_of, code_of, deposit_hash_of, did_of};
    use crate::primitives::{
        CandidateVote, CrInfo, Program, TxHash, TxInput, UnregisterCrInfo, VoteContent, VoteOutput, VoteType,
    };

    fn keypair_fixture(seed: u8) -> (Vec<u8>, crate::primitives::U168, crate::primitives::U168) {
        let mut pk = vec![0x02u8];
        pk.extend(std::iter::repeat(seed).take(32));
        let code = code_of(&pk).unwrap();
        let cid = cid_of(&code).unwrap();
        let did = did_of(&code).unwrap();
        (code, cid, did)
    }

    fn new_ledger() -> HistoryLedger<CrMutation> {
        HistoryLedger::new(10)
    }

    #[test]
    fn register_cr_enrolls_deposit_and_creates_pending_candidate() {
        let (code, cid, did) = keypair_fixture(1);
        let deposit_hash = deposit_hash_of(&code).unwrap();
        let info = CrInfo::new(code, cid, did, "alice");
        let outputs = vec![Output::standard(500_00000000, deposit_hash)];
        let tx = Transaction::new_register_cr(TxHash::from_seed(1), info, outputs);

        let mut registry = CandidateRegistry::new();
        let mut utxo = UtxoIndex::new();
        let mut history = new_ledger();
        process_transaction(&mut registry, &mut utxo, &mut history, &tx, 1);

        let candidate = registry.get_candidate_by_cid(&cid).unwrap();
        assert_eq!(candidate.state, CandidateState::Pending);
        assert_eq!(candidate.deposit_amount, 500_00000000);
        assert_eq!(candidate.votes, 0);
        assert!(registry.exist_candidate_by_nickname("alice"));
        assert_eq!(utxo.deposit_outputs_len(), 1);
    }

    #[test]
    fn unregister_moves_candidate_to_canceled_and_drops_nickname() {
        let (code, cid, did) = keypair_fixture(2);
        let info = CrInfo::new(code, cid, did, "bob");
        let reg_tx = Transaction::new_register_cr(TxHash::from_seed(2), info, vec![]);

        let mut registry = CandidateRegistry::new();
        let mut utxo = UtxoIndex::new();
        let mut history = new_ledger();
        process_transaction(&mut registry, &mut utxo, &mut history, &reg_tx, 1);

        let unreg_tx = Transaction::new_unregister_cr(
            TxHash::from_seed(3),
            UnregisterCrInfo { cid, signature: vec![] },
        );
        process_transaction(&mut registry, &mut utxo, &mut history, &unreg_tx, 2);

        let candidate = registry.get_candidate_by_cid(&cid).unwrap();
        assert_eq!(candidate.state, CandidateState::Canceled);
        assert_eq!(candidate.cancel_height, 2);
        assert!(!registry.exist_candidate_by_nickname("bob"));
    }

    #[test]
    fn vote_then_cancel_conserves_total_votes() {
        let (code, cid, did) = keypair_fixture(3);
        let info = CrInfo::new(code, cid, did, "carol");
        let reg_tx = Transaction::new_register_cr(TxHash::from_seed(4), info, vec![]);

        let mut registry = CandidateRegistry::new();
        let mut utxo = UtxoIndex::new();
        let mut history = new_ledger();
        process_transaction(&mut registry, &mut utxo, &mut history, &reg_tx, 1);

        let vote_payload = VoteOutput {
            version: VOTE_PRODUCER_AND_CR_VERSION,
            contents: vec![VoteContent {
                vote_type: VoteType::Crc,
                candidate_votes: vec![CandidateVote { candidate: cid, votes: 100_00000000 }],
            }],
        };
        let vote_output = Output::vote(0, crate::primitives::U168::new(PrefixType::Standard, [0u8; 20]), vote_payload);
        let vote_tx_hash = TxHash::from_seed(5);
        let vote_tx = Transaction::new_transfer(vote_tx_hash, TX_VERSION_09, vec![vote_output]);
        process_transaction(&mut registry, &mut utxo, &mut history, &vote_tx, 2);

        assert_eq!(registry.get_candidate_by_cid(&cid).unwrap().votes, 100_00000000);

        let spend_input = TxInput { previous: OutPoint::new(vote_tx_hash, 0) };
        let spend_tx = Transaction::new_transfer(TxHash::from_seed(6), TX_VERSION_09, vec![])
            .with_inputs(vec![spend_input]);
        // A pure vote-cancellation tx: no new CRC vote outputs, just an
        // input spending a tracked vote outpoint. The classifier must
        // agree with what process_transaction actually does with it.
        assert!(is_cr_transaction(&spend_tx, &utxo));
        process_transaction(&mut registry, &mut utxo, &mut history, &spend_tx, 3);

        assert_eq!(registry.get_candidate_by_cid(&cid).unwrap().votes, 0);
        assert_eq!(utxo.get_vote(&OutPoint::new(vote_tx_hash, 0).refer_key()), Some(&None));
    }

    #[test]
    fn return_deposit_subtracts_once_per_matching_program() {
        let (code, cid, did) = keypair_fixture(4);
        let deposit_hash = deposit_hash_of(&code).unwrap();
        let info = CrInfo::new(code.clone(), cid, did, "dave");
        let dep_tx_hash = TxHash::from_seed(7);
        let reg_tx =
            Transaction::new_register_cr(dep_tx_hash, info, vec![Output::standard(200_00000000, deposit_hash)]);

        let mut registry = CandidateRegistry::new();
        let mut utxo = UtxoIndex::new();
        let mut history = new_ledger();
        process_transaction(&mut registry, &mut utxo, &mut history, &reg_tx, 1);

        let program = Program { code: code.clone(), parameter: vec![] };
        let return_tx = Transaction::new_return_cr_deposit(
            TxHash::from_seed(8),
            vec![TxInput { previous: OutPoint::new(dep_tx_hash, 0) }],
            vec![program.clone(), program],
        );
        process_transaction(&mut registry, &mut utxo, &mut history, &return_tx, 2);

        let candidate = registry.get_candidate_by_cid(&cid).unwrap();
        assert_eq!(candidate.state, CandidateState::Returned);
        // Two matching programs -> subtracted twice, per the preserved open question.
        assert_eq!(candidate.deposit_amount, 200_00000000 - 2 * 200_00000000);
    }
}
