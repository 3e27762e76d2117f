//! Tunable constants for the CR state engine.
//!
//! Production callers should use [`EngineConfig::default`], which holds the
//! bit-exact values the rest of the network agrees on. Tests construct a
//! smaller [`EngineConfig`] directly so scenarios that depend on activation
//! depth or cache-purge windows don't need thousands of synthetic blocks.

/// Number of sealed history heights retained for rollback.
pub const MAX_HISTORY_CAPACITY: u32 = 10;

/// Confirmations required before a `Pending` candidate becomes `Active`.
pub const ACTIVATE_DURATION: u32 = 6;

/// Heights a cancelled vote output is kept in the votes cache after it
/// leaves the live `Votes` index.
pub const CACHE_CR_VOTES_SIZE: u32 = 6;

/// Transaction version at and above which vote outputs are recognised.
pub const TX_VERSION_09: u32 = 9;

/// Vote-output payload version at and above which CR-kind vote contents
/// are recognised (as opposed to producer-only votes).
pub const VOTE_PRODUCER_AND_CR_VERSION: u8 = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineConfig {
    pub max_history_capacity: u32,
    pub activate_duration: u32,
    pub cache_cr_votes_size: u32,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_history_capacity: MAX_HISTORY_CAPACITY,
            activate_duration: ACTIVATE_DURATION,
            cache_cr_votes_size: CACHE_CR_VOTES_SIZE,
        }
    }
}
