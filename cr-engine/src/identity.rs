//! Identity & Hashing (IDH) — pure, deterministic derivation of candidate
//! identifiers and deposit program hashes from a public key and script
//! opcodes.
//!
//! The 20-byte digest embedded in every [`U168`] is `RIPEMD160(SHA256(x))`,
//! the same double-hash construction this codebase already uses to turn a
//! public key into a versioned, checksum-free program hash (see the
//! `zion1...` address derivation this module's layout is adapted from).
//! `cid_of` and `deposit_hash_of` differ only in the prefix byte placed in
//! front of the digest; `did_of` additionally swaps the script's trailing
//! opcode for the DID opcode before hashing.

use ripemd::Ripemd160;
use sha2::{Digest, Sha256};

use crate::error::{EngineError, EngineResult};
use crate::primitives::{PrefixType, U168};

/// `OP_CHECKSIG`-family opcode terminating a standard redeem script.
const OP_CHECKSIG: u8 = 0xac;
/// Opcode substituted for the trailing `OP_CHECKSIG` when deriving a DID.
const OP_CHECKSIG_DID: u8 = 0xad;

fn double_hash(data: &[u8]) -> [u8; 20] {
    let sha = Sha256::digest(data);
    let ripe = Ripemd160::digest(sha);
    let mut out = [0u8; 20];
    out.copy_from_slice(&ripe);
    out
}

/// Standard redeem script: `<len><pubkey><CHECKSIG>`.
pub fn code_of(pubkey: &[u8]) -> EngineResult<Vec<u8>> {
    if pubkey.is_empty() {
        return Err(EngineError::MalformedKey("empty public key".into()));
    }
    if pubkey.len() != 33 && pubkey.len() != 65 {
        return Err(EngineError::MalformedKey(format!(
            "unexpected public key length {}",
            pubkey.len()
        )));
    }
    let mut code = Vec::with_capacity(pubkey.len() + 2);
    code.push(pubkey.len() as u8);
    code.extend_from_slice(pubkey);
    code.push(OP_CHECKSIG);
    Ok(code)
}

fn require_non_empty(code: &[u8]) -> EngineResult<()> {
    if code.is_empty() {
        return Err(EngineError::MalformedCode("empty redeem script".into()));
    }
    Ok(())
}

/// `cid_of(code) → U168`: hash script bytes with the CRID prefix.
pub fn cid_of(code: &[u8]) -> EngineResult<U168> {
    require_non_empty(code)?;
    Ok(U168::new(PrefixType::Crid, double_hash(code)))
}

/// `did_of(code) → U168`: replace the last opcode of `code` with the DID
/// opcode, then hash with the CRID prefix.
pub fn did_of(code: &[u8]) -> EngineResult<U168> {
    require_non_empty(code)?;
    let mut did_code = code.to_vec();
    let last = did_code.len() - 1;
    did_code[last] = OP_CHECKSIG_DID;
    Ok(U168::new(PrefixType::Crid, double_hash(&did_code)))
}

/// `deposit_hash_of(code) → U168`: hash with the deposit prefix.
pub fn deposit_hash_of(code: &[u8]) -> EngineResult<U168> {
    require_non_empty(code)?;
    Ok(U168::new(PrefixType::Deposit, double_hash(code)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_pubkey(seed: u8) -> Vec<u8> {
        let mut pk = vec![0x02u8];
        pk.extend(std::iter::repeat(seed).take(32));
        pk
    }

    #[test]
    fn code_of_rejects_empty_key() {
        assert!(matches!(code_of(&[]), Err(EngineError::MalformedKey(_))));
    }

    #[test]
    fn code_of_rejects_bad_length() {
        assert!(matches!(code_of(&[1, 2, 3]), Err(EngineError::MalformedKey(_))));
    }

    #[test]
    fn code_of_produces_standard_script_shape() {
        let pk = sample_pubkey(7);
        let code = code_of(&pk).unwrap();
        assert_eq!(code[0] as usize, pk.len());
        assert_eq!(*code.last().unwrap(), OP_CHECKSIG);
    }

    #[test]
    fn cid_and_deposit_hash_differ_only_by_prefix() {
        let pk = sample_pubkey(9);
        let code = code_of(&pk).unwrap();
        let cid = cid_of(&code).unwrap();
        let deposit = deposit_hash_of(&code).unwrap();
        assert_ne!(cid.prefix_byte(), deposit.prefix_byte());
        assert_eq!(&cid.0[1..], &deposit.0[1..]);
    }

    #[test]
    fn did_differs_from_cid() {
        let pk = sample_pubkey(11);
        let code = code_of(&pk).unwrap();
        let cid = cid_of(&code).unwrap();
        let did = did_of(&code).unwrap();
        assert_ne!(cid, did);
    }

    #[test]
    fn derivation_is_deterministic() {
        let pk = sample_pubkey(42);
        let code = code_of(&pk).unwrap();
        assert_eq!(cid_of(&code).unwrap(), cid_of(&code).unwrap());
        assert_eq!(did_of(&code).unwrap(), did_of(&code).unwrap());
    }

    #[test]
    fn empty_code_rejected_everywhere() {
        assert!(matches!(cid_of(&[]), Err(EngineError::MalformedCode(_))));
        assert!(matches!(did_of(&[]), Err(EngineError::MalformedCode(_))));
        assert!(matches!(deposit_hash_of(&[]), Err(EngineError::MalformedCode(_))));
    }

    #[test]
    fn different_keys_yield_different_identifiers() {
        let code_a = code_of(&sample_pubkey(1)).unwrap();
        let code_b = code_of(&sample_pubkey(2)).unwrap();
        assert_ne!(cid_of(&code_a).unwrap(), cid_of(&code_b).unwrap());
    }
}
