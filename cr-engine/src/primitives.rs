//! External-interface types the engine consumes but does not own the
//! construction of (§6): transaction payload records, outputs, vote
//! contents, and the identifier/amount newtypes they're built from.
//!
//! The constructors here (`CrInfo::new`, `Transaction::new_register_cr`,
//! ...) exist only to build well-formed fixtures for this crate's own
//! tests. They carry no signing logic and are not a general payload
//! builder — that lives upstream, out of scope for this engine.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Fixed-point amount with 8 decimal places, as a signed 64-bit integer.
pub type Fixed64 = i64;

/// Prefix tag for the first byte of a [`U168`] identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PrefixType {
    Standard,
    Deposit,
    Crid,
    Did,
}

impl PrefixType {
    pub fn byte(self) -> u8 {
        match self {
            PrefixType::Standard => 0x21,
            PrefixType::Deposit => 0x1f,
            PrefixType::Crid => 0x67,
            PrefixType::Did => 0x79,
        }
    }
}

/// A 21-byte identifier: one prefix byte followed by a 20-byte digest.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct U168(pub [u8; 21]);

impl U168 {
    pub fn new(prefix: PrefixType, digest20: [u8; 20]) -> Self {
        let mut bytes = [0u8; 21];
        bytes[0] = prefix.byte();
        bytes[1..].copy_from_slice(&digest20);
        U168(bytes)
    }

    pub fn prefix_byte(&self) -> u8 {
        self.0[0]
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl fmt::Debug for U168 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "U168({})", self.to_hex())
    }
}

impl fmt::Display for U168 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

/// A transaction hash. Stored raw; rendered as hex for `ReferKey`s and logs.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TxHash(pub [u8; 32]);

impl TxHash {
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Deterministic test-fixture hash derived from a small seed, so
    /// scenario tests can build distinct transactions without a real
    /// hashing pipeline.
    pub fn from_seed(seed: u64) -> Self {
        let mut bytes = [0u8; 32];
        bytes[..8].copy_from_slice(&seed.to_le_bytes());
        TxHash(bytes)
    }
}

impl fmt::Debug for TxHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TxHash({})", self.to_hex())
    }
}

/// Canonical string encoding of an outpoint, used as a map key throughout
/// the UTXO index and history ledger.
pub type ReferKey = String;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OutPoint {
    pub tx_hash: TxHash,
    pub index: u16,
}

impl OutPoint {
    pub fn new(tx_hash: TxHash, index: u16) -> Self {
        Self { tx_hash, index }
    }

    /// `hex(tx_hash) || hex(index_u16_le)`
    pub fn refer_key(&self) -> ReferKey {
        let mut s = self.tx_hash.to_hex();
        s.push_str(&hex::encode(self.index.to_le_bytes()));
        s
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum VoteType {
    Delegate,
    Crc,
    CrcProposal,
    CrcImpeachment,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CandidateVote {
    pub candidate: U168,
    pub votes: Fixed64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VoteContent {
    pub vote_type: VoteType,
    pub candidate_votes: Vec<CandidateVote>,
}

impl VoteContent {
    pub fn is_crc(&self) -> bool {
        matches!(self.vote_type, VoteType::Crc)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VoteOutput {
    pub version: u8,
    pub contents: Vec<VoteContent>,
}

impl VoteOutput {
    pub fn has_crc_content(&self) -> bool {
        self.contents.iter().any(VoteContent::is_crc)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OutputType {
    Standard,
    Vote,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Output {
    pub value: Fixed64,
    pub program_hash: U168,
    pub output_type: OutputType,
    pub payload: Option<VoteOutput>,
}

impl Output {
    pub fn standard(value: Fixed64, program_hash: U168) -> Self {
        Self { value, program_hash, output_type: OutputType::Standard, payload: None }
    }

    pub fn vote(value: Fixed64, program_hash: U168, payload: VoteOutput) -> Self {
        Self { value, program_hash, output_type: OutputType::Vote, payload: Some(payload) }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TxInput {
    pub previous: OutPoint,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Program {
    pub code: Vec<u8>,
    pub parameter: Vec<u8>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CrInfo {
    pub code: Vec<u8>,
    pub cid: U168,
    pub did: U168,
    pub nickname: String,
    pub url: String,
    pub location: u64,
    pub signature: Vec<u8>,
    pub payload_version: u8,
}

impl CrInfo {
    pub fn new(code: Vec<u8>, cid: U168, did: U168, nickname: impl Into<String>) -> Self {
        Self {
            code,
            cid,
            did,
            nickname: nickname.into(),
            url: String::new(),
            location: 0,
            signature: Vec::new(),
            payload_version: 0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UnregisterCrInfo {
    pub cid: U168,
    pub signature: Vec<u8>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TxType {
    CoinBase,
    TransferAsset,
    RegisterCr,
    UpdateCr,
    UnregisterCr,
    ReturnCrDepositCoin,
    RegisterProducer,
    UpdateProducer,
    CancelProducer,
    ActivateProducer,
    ReturnDepositCoin,
    SideChainPow,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum TxPayload {
    None,
    CrInfo(CrInfo),
    UnregisterCr(UnregisterCrInfo),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Transaction {
    pub tx_hash: TxHash,
    pub tx_type: TxType,
    pub version: u32,
    pub payload: TxPayload,
    pub inputs: Vec<TxInput>,
    pub outputs: Vec<Output>,
    pub programs: Vec<Program>,
}

impl Transaction {
    fn bare(tx_hash: TxHash, tx_type: TxType, version: u32) -> Self {
        Self {
            tx_hash,
            tx_type,
            version,
            payload: TxPayload::None,
            inputs: Vec::new(),
            outputs: Vec::new(),
            programs: Vec::new(),
        }
    }

    pub fn new_register_cr(tx_hash: TxHash, info: CrInfo, outputs: Vec<Output>) -> Self {
        let mut tx = Self::bare(tx_hash, TxType::RegisterCr, 9);
        tx.payload = TxPayload::CrInfo(info);
        tx.outputs = outputs;
        tx
    }

    pub fn new_update_cr(tx_hash: TxHash, info: CrInfo) -> Self {
        let mut tx = Self::bare(tx_hash, TxType::UpdateCr, 9);
        tx.payload = TxPayload::CrInfo(info);
        tx
    }

    pub fn new_unregister_cr(tx_hash: TxHash, info: UnregisterCrInfo) -> Self {
        let mut tx = Self::bare(tx_hash, TxType::UnregisterCr, 9);
        tx.payload = TxPayload::UnregisterCr(info);
        tx
    }

    pub fn new_return_cr_deposit(
        tx_hash: TxHash,
        inputs: Vec<TxInput>,
        programs: Vec<Program>,
    ) -> Self {
        let mut tx = Self::bare(tx_hash, TxType::ReturnCrDepositCoin, 9);
        tx.inputs = inputs;
        tx.programs = programs;
        tx
    }

    pub fn new_transfer(tx_hash: TxHash, version: u32, outputs: Vec<Output>) -> Self {
        let mut tx = Self::bare(tx_hash, TxType::TransferAsset, version);
        tx.outputs = outputs;
        tx
    }

    pub fn with_inputs(mut self, inputs: Vec<TxInput>) -> Self {
        self.inputs = inputs;
        self
    }
}

/// A committed block, reduced to the fields the CR engine needs: its
/// height and the ordered transactions it carries. Everything else
/// (header, proof, producer signature) belongs to the surrounding
/// consensus layer, out of scope here.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Block {
    pub height: u32,
    pub transactions: Vec<Transaction>,
}

impl Block {
    pub fn new(height: u32, transactions: Vec<Transaction>) -> Self {
        Self { height, transactions }
    }
}
