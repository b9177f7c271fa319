//! Index configuration.

use serde::{Deserialize, Serialize};

/// Consensus and engine parameters for the claim index.
///
/// The defaults are the mainnet consensus constants. They are configurable
/// for test networks, not something to tune on a live chain: every node
/// replaying the same chain must run the same values to reach the same
/// state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrieConfig {
    /// Activation delay grows by one block for every `delay_divisor` blocks
    /// between a claim's declared height and the name's takeover height.
    pub delay_divisor: u64,
    /// Upper bound on the activation delay (about a week of blocks).
    pub max_delay: u64,
    /// Trending window span in blocks. Scores are recomputed whenever a
    /// block height is a multiple of this.
    pub trending_window: u64,
    /// Number of trending windows retained for scoring.
    pub trending_retention: u64,
}

impl Default for TrieConfig {
    fn default() -> Self {
        Self {
            delay_divisor: 32,
            max_delay: 4032,
            trending_window: 134,
            trending_retention: 28,
        }
    }
}

impl TrieConfig {
    /// Number of blocks of trending history retained.
    pub fn trending_horizon(&self) -> u64 {
        self.trending_window * self.trending_retention
    }
}
