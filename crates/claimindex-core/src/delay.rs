//! Activation delay math.
//!
//! A claim or support declared at height `H` for a name whose control last
//! changed at `T` activates after a delay of `min((H - T) / 32, 4032)`
//! blocks. The longer a name has been held, the longer a challenger waits.
//!
//! Two cases activate immediately:
//! - the name has never been taken over (no trie row), and
//! - the target of the event is the claim currently controlling the name
//!   (supporting or re-asserting the incumbent carries no delay).

use crate::config::TrieConfig;
use crate::types::TrieRow;

/// Delay in blocks before an event declared at `declared` activates, given
/// the name's last takeover height.
pub fn activation_delay(declared: u64, takeover_height: u64, config: &TrieConfig) -> u64 {
    let distance = declared.saturating_sub(takeover_height);
    (distance / config.delay_divisor).min(config.max_delay)
}

/// Activation height for a claim or support declared at `declared`.
///
/// `trie` is the name's current trie row (from the previous block's state)
/// and `target_claim_id` the claim the event creates or supports.
pub fn activation_height(
    declared: u64,
    target_claim_id: &str,
    trie: Option<&TrieRow>,
    config: &TrieConfig,
) -> u64 {
    match trie {
        None => declared,
        Some(row) if row.claim_id == target_claim_id => declared,
        Some(row) => declared + activation_delay(declared, row.takeover_height, config),
    }
}
