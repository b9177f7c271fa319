//! Typed query layer over committed index state.
//!
//! Queries are built from explicit predicates and sort keys, never from
//! interpolated query strings; backends evaluate them against whatever
//! indexes they have. The helpers here implement the shared ranking and
//! canonicalization logic so every backend resolves and sorts identically.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::ordering;
use crate::shortid;
use crate::types::{ClaimRow, TrendingScores, TrieRow};

// ─── Query shapes ─────────────────────────────────────────────────────────────

/// Sort key for [`SearchQuery`].
///
/// Trending and amount sorts are descending (best first); `Height` is
/// ascending. Ties fall back to the controlling-claim ordering, then the
/// claim id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SortField {
    TrendingLocal,
    TrendingGlobal,
    TrendingGroup,
    TrendingMixed,
    #[default]
    Height,
    EffectiveAmount,
}

/// A typed search over the committed claim table.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SearchQuery {
    /// Only claims for this exact name.
    pub name: Option<String>,
    /// Minimum declared height (inclusive).
    pub min_height: Option<u64>,
    /// Maximum declared height (inclusive).
    pub max_height: Option<u64>,
    /// Minimum effective amount (inclusive).
    pub min_effective_amount: Option<u64>,
    /// Sort key.
    pub sort: SortField,
    /// Maximum number of results.
    pub limit: Option<usize>,
}

impl SearchQuery {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn height_range(mut self, min: u64, max: u64) -> Self {
        self.min_height = Some(min);
        self.max_height = Some(max);
        self
    }

    pub fn min_effective_amount(mut self, amount: u64) -> Self {
        self.min_effective_amount = Some(amount);
        self
    }

    pub fn sort(mut self, sort: SortField) -> Self {
        self.sort = sort;
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    fn matches(&self, claim: &ClaimRow) -> bool {
        if let Some(name) = &self.name {
            if &claim.name != name {
                return false;
            }
        }
        if let Some(min) = self.min_height {
            if claim.height < min {
                return false;
            }
        }
        if let Some(max) = self.max_height {
            if claim.height > max {
                return false;
            }
        }
        if let Some(min) = self.min_effective_amount {
            if claim.effective_amount < min {
                return false;
            }
        }
        true
    }
}

// ─── Results ──────────────────────────────────────────────────────────────────

/// A claim record as returned to readers: a snapshot copy, annotated with
/// its canonical short-id name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClaimSummary {
    pub claim_id: String,
    pub name: String,
    /// `name` plus the shortest disambiguating `#prefix`, bare when the
    /// claim has the name to itself.
    pub canonical: String,
    pub amount: u64,
    pub effective_amount: u64,
    pub height: u64,
    pub creation_height: u64,
    pub activation_height: u64,
    pub trending: TrendingScores,
    pub value: Value,
}

/// The answer to "who holds this name right now".
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NameResolution {
    /// The name that was resolved.
    pub name: String,
    /// Height the resolution was computed at.
    pub height: u64,
    /// The controlling claim, if the name has any active claim.
    pub controlling: Option<ClaimSummary>,
    /// Active claims that are not controlling, best-ranked first.
    pub active: Vec<ClaimSummary>,
    /// Claims accepted but not yet activated, best-ranked first.
    pub accepted: Vec<ClaimSummary>,
}

// ─── Backend helpers ──────────────────────────────────────────────────────────

/// Summarize a claim, deriving its canonical name from `peers` (all claims
/// sharing the name, the claim itself included or not).
pub fn summarize(claim: &ClaimRow, peers: &[ClaimRow]) -> ClaimSummary {
    let canonical = shortid::canonical_name(
        &claim.name,
        &claim.claim_id,
        peers
            .iter()
            .filter(|p| p.claim_id != claim.claim_id)
            .map(|p| p.claim_id.as_str()),
    );
    ClaimSummary {
        claim_id: claim.claim_id.clone(),
        name: claim.name.clone(),
        canonical,
        amount: claim.amount,
        effective_amount: claim.effective_amount,
        height: claim.height,
        creation_height: claim.creation_height,
        activation_height: claim.activation_height,
        trending: claim.trending,
        value: claim.value.clone(),
    }
}

/// Build a [`NameResolution`] from one name's claim rows and trie row at
/// the given committed height.
pub fn build_resolution(
    name: &str,
    rows: &[ClaimRow],
    trie: Option<&TrieRow>,
    height: u64,
) -> NameResolution {
    let controlling_id = trie.map(|t| t.claim_id.as_str());
    let controlling = rows
        .iter()
        .find(|r| Some(r.claim_id.as_str()) == controlling_id && r.is_active(height))
        .map(|r| summarize(r, rows));

    let mut active: Vec<&ClaimRow> = rows
        .iter()
        .filter(|r| r.is_active(height) && Some(r.claim_id.as_str()) != controlling_id)
        .collect();
    let mut accepted: Vec<&ClaimRow> = rows.iter().filter(|r| !r.is_active(height)).collect();
    let rank = |a: &&ClaimRow, b: &&ClaimRow| {
        ordering::compare(a, b).then_with(|| a.claim_id.cmp(&b.claim_id))
    };
    active.sort_by(rank);
    accepted.sort_by(rank);

    NameResolution {
        name: name.to_string(),
        height,
        controlling,
        active: active.into_iter().map(|r| summarize(r, rows)).collect(),
        accepted: accepted.into_iter().map(|r| summarize(r, rows)).collect(),
    }
}

/// Evaluate a search query against the full committed claim table.
///
/// `rows` must be the complete table: canonical names are derived from all
/// same-named claims, including ones the filters exclude.
pub fn execute(query: &SearchQuery, rows: &[ClaimRow]) -> Vec<ClaimSummary> {
    let mut hits: Vec<&ClaimRow> = rows.iter().filter(|r| query.matches(r)).collect();
    hits.sort_by(|a, b| {
        let primary = match query.sort {
            SortField::TrendingLocal => b.trending.local.total_cmp(&a.trending.local),
            SortField::TrendingGlobal => b.trending.global.total_cmp(&a.trending.global),
            SortField::TrendingGroup => b.trending.group.cmp(&a.trending.group),
            SortField::TrendingMixed => b.trending.mixed.total_cmp(&a.trending.mixed),
            SortField::Height => a.height.cmp(&b.height),
            SortField::EffectiveAmount => b.effective_amount.cmp(&a.effective_amount),
        };
        primary
            .then_with(|| ordering::compare(a, b))
            .then_with(|| a.claim_id.cmp(&b.claim_id))
    });
    if let Some(limit) = query.limit {
        hits.truncate(limit);
    }
    hits.into_iter()
        .map(|claim| {
            let peers: Vec<ClaimRow> = rows
                .iter()
                .filter(|r| r.name == claim.name)
                .cloned()
                .collect();
            summarize(claim, &peers)
        })
        .collect()
}
