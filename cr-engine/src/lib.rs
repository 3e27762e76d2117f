//! Consensus Representative (CR) state engine.
//!
//! An in-memory, block-driven state machine tracking the lifecycle of CR
//! candidates, their deposits, and the votes cast for them. Given a
//! linear sequence of committed blocks it derives: which public
//! identities are candidates, in which lifecycle stage, how many votes
//! and how much deposit each holds, and which outputs currently carry
//! votes or deposits.
//!
//! The crate is organized leaves-first, matching the component layering
//! it's built from:
//!
//! - [`identity`] — pure CID/DID/deposit-hash derivation.
//! - [`history`] — the bounded undo ledger behind reversible rollback.
//! - [`utxo`] — the vote/deposit outpoint index and its cancel-of-cancel
//!   cache.
//! - [`registry`] — the four-way candidate store and its secondary
//!   indexes.
//! - [`transaction`] — per-transaction-type mutation routines.
//! - [`engine`] — the public, lock-guarded [`engine::CrEngine`] surface.

pub mod config;
pub mod engine;
pub mod error;
pub mod history;
pub mod identity;
pub mod mutation;
pub mod primitives;
pub mod registry;
pub mod transaction;
pub mod utxo;

pub use config::EngineConfig;
pub use engine::{CrEngine, StateSnapshot};
pub use error::{EngineError, EngineResult};
pub use registry::{Candidate, CandidateState};
