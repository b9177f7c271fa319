//! The record store trait: an abstract indexed table store for claims,
//! supports, per-name trie rows, and trending snapshots.
//!
//! The orchestrator is the only writer. All mutating methods operate on the
//! store's *working* state for the block being applied; [`RecordStore::commit`]
//! atomically publishes the working state as the new committed height.
//! Query methods ([`RecordStore::resolve`], [`RecordStore::search`],
//! [`RecordStore::last_commit`]) always observe the last committed height,
//! so concurrent readers never see a half-applied block.

use async_trait::async_trait;

use crate::error::TrieError;
use crate::query::{ClaimSummary, NameResolution, SearchQuery};
use crate::types::{ClaimRow, CommitInfo, OutPoint, SupportRow, TrendRow, TrendingScores, TrieRow};

/// Persistent table store behind the claim index.
///
/// Backends must provide point lookups, range scans by height, and an
/// atomic per-block commit with bounded rollback history.
#[async_trait]
pub trait RecordStore: Send + Sync {
    // ── claims ──

    /// Point lookup by claim id (working state).
    async fn claim(&self, claim_id: &str) -> Result<Option<ClaimRow>, TrieError>;

    /// All claims competing for `name`, in stable (claim id) order.
    async fn claims_for_name(&self, name: &str) -> Result<Vec<ClaimRow>, TrieError>;

    /// Insert or replace a claim row.
    async fn upsert_claim(&self, row: ClaimRow) -> Result<(), TrieError>;

    /// Remove a claim, returning the removed row if it existed. Support
    /// rows targeting the claim are left in place until their outputs are
    /// spent; they simply stop counting toward any effective amount.
    async fn remove_claim(&self, claim_id: &str) -> Result<Option<ClaimRow>, TrieError>;

    // ── supports ──

    /// All supports targeting `claim_id`, in stable (outpoint) order.
    async fn supports_for_claim(&self, claim_id: &str) -> Result<Vec<SupportRow>, TrieError>;

    /// Range scan: supports created at or after `height`.
    async fn supports_since(&self, height: u64) -> Result<Vec<SupportRow>, TrieError>;

    /// Insert or replace a support row, keyed by its outpoint.
    async fn insert_support(&self, row: SupportRow) -> Result<(), TrieError>;

    /// Remove a support by the output that anchored it.
    async fn remove_support(&self, outpoint: &OutPoint) -> Result<Option<SupportRow>, TrieError>;

    // ── trie ──

    /// The name's current controlling-claim row.
    async fn trie_row(&self, name: &str) -> Result<Option<TrieRow>, TrieError>;

    /// Insert or replace a trie row (takeover).
    async fn set_trie_row(&self, row: TrieRow) -> Result<(), TrieError>;

    /// Drop a name's trie row (the name no longer has an active claim).
    async fn remove_trie_row(&self, name: &str) -> Result<(), TrieError>;

    /// Names owning any claim or support whose activation height lies in
    /// `(after, through]`. These names need their controlling claim
    /// recomputed even when no event touched them.
    async fn activating_names(&self, after: u64, through: u64) -> Result<Vec<String>, TrieError>;

    // ── trending ──

    /// Append one window snapshot.
    async fn insert_trend_row(&self, row: TrendRow) -> Result<(), TrieError>;

    /// Drop snapshots older than `before` (exclusive cutoff).
    async fn prune_trend_rows(&self, before: u64) -> Result<(), TrieError>;

    /// All retained snapshots.
    async fn trend_rows(&self) -> Result<Vec<TrendRow>, TrieError>;

    /// Zero every claim's trending scores (start of a scoring pass).
    async fn reset_trending(&self) -> Result<(), TrieError>;

    /// Set one claim's trending scores. Unknown claim ids are ignored:
    /// trend snapshots can outlive the claim they were taken for.
    async fn set_trending(&self, claim_id: &str, scores: TrendingScores) -> Result<(), TrieError>;

    // ── commit / rollback ──

    /// Atomically publish the working state as the committed state for
    /// `info.height`, retaining a snapshot for rollback.
    async fn commit(&self, info: CommitInfo) -> Result<(), TrieError>;

    /// Metadata of the last committed block, if any.
    async fn last_commit(&self) -> Result<Option<CommitInfo>, TrieError>;

    /// Restore the committed snapshot at `height` and discard everything
    /// after it. Fails with [`TrieError::RollbackUnavailable`] when the
    /// snapshot is no longer retained.
    async fn rollback_to(&self, height: u64) -> Result<(), TrieError>;

    // ── queries (committed state) ──

    /// Resolve a name: controlling claim, active runners-up, and pending
    /// ("accepted") claims, each deterministically ordered.
    async fn resolve(&self, name: &str) -> Result<NameResolution, TrieError>;

    /// Ranked search over all claims.
    async fn search(&self, query: &SearchQuery) -> Result<Vec<ClaimSummary>, TrieError>;
}
