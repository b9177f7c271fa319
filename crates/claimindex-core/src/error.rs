//! Error types for the claim index pipeline.

use thiserror::Error;

/// Errors that can occur while advancing or querying the index.
#[derive(Debug, Error)]
pub enum TrieError {
    /// `advance` was called with a height at or below the last committed
    /// height. Blocks must be applied in strictly increasing order.
    #[error("advance out of order: got height {height}, last committed {last}")]
    NonMonotonicHeight { height: u64, last: u64 },

    /// A referenced claim does not exist in the store.
    #[error("unknown claim: {claim_id}")]
    UnknownClaim { claim_id: String },

    /// Two claims for a name compared equal on every tie-break key,
    /// including intra-block position. Positions are distinct within a
    /// block, so this indicates corrupted input or store state.
    #[error("ambiguous claim ordering for name '{name}'")]
    AmbiguousOrder { name: String },

    /// No snapshot is retained for the requested rollback height. The
    /// index must be rebuilt from a known-good height.
    #[error("rollback to height {height} unavailable (oldest retained: {oldest})")]
    RollbackUnavailable { height: u64, oldest: u64 },

    #[error("storage error: {0}")]
    Storage(String),
}

impl TrieError {
    /// Returns `true` if the error must halt block advancement.
    ///
    /// Only [`TrieError::UnknownClaim`] is locally absorbable: the
    /// orchestrator turns it into a skipped event. Everything else
    /// propagates until resolved externally (resync or rebuild).
    pub fn is_fatal(&self) -> bool {
        !matches!(self, Self::UnknownClaim { .. })
    }
}
