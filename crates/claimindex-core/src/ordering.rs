//! Effective amounts and controlling-claim selection.
//!
//! The controlling claim for a name is the active claim with the highest
//! effective amount. Ties break toward the earlier activation height, then
//! the earlier declared height, then the earlier intra-block position.

use std::cmp::Ordering;

use crate::error::TrieError;
use crate::types::{ClaimRow, SupportRow};

/// A claim's effective amount at `height`: its own bid plus every activated
/// support. Pending claims weigh nothing.
pub fn effective_amount(claim: &ClaimRow, supports: &[SupportRow], height: u64) -> u64 {
    if !claim.is_active(height) {
        return 0;
    }
    claim.amount
        + supports
            .iter()
            .filter(|s| s.claim_id == claim.claim_id && s.is_active(height))
            .map(|s| s.amount)
            .sum::<u64>()
}

/// Ranking order between two claims of the same name, best first.
///
/// Compares stored `effective_amount` values, so callers must refresh them
/// for the height under consideration before ranking.
pub fn compare(a: &ClaimRow, b: &ClaimRow) -> Ordering {
    b.effective_amount
        .cmp(&a.effective_amount)
        .then(a.activation_height.cmp(&b.activation_height))
        .then(a.height.cmp(&b.height))
        .then(a.position.cmp(&b.position))
}

/// Sort claims best-ranked first, with the claim id as a final disambiguator
/// for presentation stability.
pub fn sort_ranked(claims: &mut [ClaimRow]) {
    claims.sort_by(|a, b| compare(a, b).then_with(|| a.claim_id.cmp(&b.claim_id)));
}

/// Pick the controlling claim among the *active* claims of one name.
///
/// Returns `None` when no claim is active. Two distinct claims comparing
/// equal on the full key is an internal invariant violation: intra-block
/// positions are unique, so the key is total over well-formed input.
pub fn winner(active: &[ClaimRow], name: &str) -> Result<Option<ClaimRow>, TrieError> {
    let mut best: Option<&ClaimRow> = None;
    let mut ambiguous = false;
    for claim in active {
        match best {
            None => best = Some(claim),
            Some(current) => match compare(claim, current) {
                Ordering::Less => {
                    best = Some(claim);
                    ambiguous = false;
                }
                Ordering::Equal => {
                    if claim.claim_id != current.claim_id {
                        ambiguous = true;
                    }
                }
                Ordering::Greater => {}
            },
        }
    }
    if ambiguous {
        return Err(TrieError::AmbiguousOrder { name: name.to_string() });
    }
    Ok(best.cloned())
}
