//! In-memory record store.
//!
//! Keeps a *working* state that the orchestrator mutates while applying a
//! block, and a *committed* state that queries read. `commit` publishes
//! the working state atomically and retains a bounded history of committed
//! snapshots for rollback. All data is lost when the process exits.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::RwLock;

use async_trait::async_trait;

use claimindex_core::error::TrieError;
use claimindex_core::query::{self, ClaimSummary, NameResolution, SearchQuery};
use claimindex_core::store::RecordStore;
use claimindex_core::types::{
    ClaimRow, CommitInfo, OutPoint, SupportRow, TrendRow, TrendingScores, TrieRow,
};

/// Default number of committed snapshots retained for rollback.
pub const DEFAULT_SNAPSHOT_DEPTH: usize = 128;

/// One consistent view of every table.
#[derive(Debug, Clone, Default)]
struct State {
    claims: HashMap<String, ClaimRow>,
    claims_by_name: HashMap<String, BTreeSet<String>>,
    supports: HashMap<OutPoint, SupportRow>,
    supports_by_claim: HashMap<String, BTreeSet<OutPoint>>,
    trie: HashMap<String, TrieRow>,
    /// Keyed by (height, claim id) so pruning is a range drop.
    trend: BTreeMap<(u64, String), u64>,
}

impl State {
    fn claims_for_name(&self, name: &str) -> Vec<ClaimRow> {
        self.claims_by_name
            .get(name)
            .into_iter()
            .flatten()
            .filter_map(|id| self.claims.get(id))
            .cloned()
            .collect()
    }
}

struct Inner {
    working: State,
    committed: State,
    history: BTreeMap<u64, (State, CommitInfo)>,
    last_commit: Option<CommitInfo>,
    snapshot_depth: usize,
}

/// In-memory [`RecordStore`].
pub struct MemoryStore {
    inner: RwLock<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::with_snapshot_depth(DEFAULT_SNAPSHOT_DEPTH)
    }

    /// Create a store retaining at most `depth` committed snapshots.
    pub fn with_snapshot_depth(depth: usize) -> Self {
        Self {
            inner: RwLock::new(Inner {
                working: State::default(),
                committed: State::default(),
                history: BTreeMap::new(),
                last_commit: None,
                snapshot_depth: depth.max(1),
            }),
        }
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, Inner> {
        self.inner.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, Inner> {
        self.inner.write().unwrap_or_else(|e| e.into_inner())
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl RecordStore for MemoryStore {
    async fn claim(&self, claim_id: &str) -> Result<Option<ClaimRow>, TrieError> {
        Ok(self.read().working.claims.get(claim_id).cloned())
    }

    async fn claims_for_name(&self, name: &str) -> Result<Vec<ClaimRow>, TrieError> {
        Ok(self.read().working.claims_for_name(name))
    }

    async fn upsert_claim(&self, row: ClaimRow) -> Result<(), TrieError> {
        let mut inner = self.write();
        let state = &mut inner.working;
        state
            .claims_by_name
            .entry(row.name.clone())
            .or_default()
            .insert(row.claim_id.clone());
        state.claims.insert(row.claim_id.clone(), row);
        Ok(())
    }

    async fn remove_claim(&self, claim_id: &str) -> Result<Option<ClaimRow>, TrieError> {
        let mut inner = self.write();
        let state = &mut inner.working;
        let removed = state.claims.remove(claim_id);
        if let Some(row) = &removed {
            if let Some(ids) = state.claims_by_name.get_mut(&row.name) {
                ids.remove(claim_id);
                if ids.is_empty() {
                    state.claims_by_name.remove(&row.name);
                }
            }
        }
        Ok(removed)
    }

    async fn supports_for_claim(&self, claim_id: &str) -> Result<Vec<SupportRow>, TrieError> {
        let inner = self.read();
        let state = &inner.working;
        Ok(state
            .supports_by_claim
            .get(claim_id)
            .into_iter()
            .flatten()
            .filter_map(|op| state.supports.get(op))
            .cloned()
            .collect())
    }

    async fn supports_since(&self, height: u64) -> Result<Vec<SupportRow>, TrieError> {
        let inner = self.read();
        let mut rows: Vec<SupportRow> = inner
            .working
            .supports
            .values()
            .filter(|s| s.height >= height)
            .cloned()
            .collect();
        rows.sort_by(|a, b| a.outpoint.cmp(&b.outpoint));
        Ok(rows)
    }

    async fn insert_support(&self, row: SupportRow) -> Result<(), TrieError> {
        let mut inner = self.write();
        let state = &mut inner.working;
        if let Some(previous) = state.supports.get(&row.outpoint) {
            if previous.claim_id != row.claim_id {
                if let Some(ops) = state.supports_by_claim.get_mut(&previous.claim_id) {
                    ops.remove(&row.outpoint);
                }
            }
        }
        state
            .supports_by_claim
            .entry(row.claim_id.clone())
            .or_default()
            .insert(row.outpoint.clone());
        state.supports.insert(row.outpoint.clone(), row);
        Ok(())
    }

    async fn remove_support(&self, outpoint: &OutPoint) -> Result<Option<SupportRow>, TrieError> {
        let mut inner = self.write();
        let state = &mut inner.working;
        let removed = state.supports.remove(outpoint);
        if let Some(row) = &removed {
            if let Some(ops) = state.supports_by_claim.get_mut(&row.claim_id) {
                ops.remove(outpoint);
                if ops.is_empty() {
                    state.supports_by_claim.remove(&row.claim_id);
                }
            }
        }
        Ok(removed)
    }

    async fn trie_row(&self, name: &str) -> Result<Option<TrieRow>, TrieError> {
        Ok(self.read().working.trie.get(name).cloned())
    }

    async fn set_trie_row(&self, row: TrieRow) -> Result<(), TrieError> {
        self.write().working.trie.insert(row.name.clone(), row);
        Ok(())
    }

    async fn remove_trie_row(&self, name: &str) -> Result<(), TrieError> {
        self.write().working.trie.remove(name);
        Ok(())
    }

    async fn activating_names(&self, after: u64, through: u64) -> Result<Vec<String>, TrieError> {
        // A full scan; a persistent backend would keep a height index for
        // pending activations instead.
        let inner = self.read();
        let state = &inner.working;
        let mut names: BTreeSet<String> = BTreeSet::new();
        for claim in state.claims.values() {
            if claim.activation_height > after && claim.activation_height <= through {
                names.insert(claim.name.clone());
            }
        }
        for support in state.supports.values() {
            if support.activation_height > after && support.activation_height <= through {
                if let Some(claim) = state.claims.get(&support.claim_id) {
                    names.insert(claim.name.clone());
                }
            }
        }
        Ok(names.into_iter().collect())
    }

    async fn insert_trend_row(&self, row: TrendRow) -> Result<(), TrieError> {
        self.write()
            .working
            .trend
            .insert((row.height, row.claim_id), row.amount);
        Ok(())
    }

    async fn prune_trend_rows(&self, before: u64) -> Result<(), TrieError> {
        let mut inner = self.write();
        let kept = inner.working.trend.split_off(&(before, String::new()));
        inner.working.trend = kept;
        Ok(())
    }

    async fn trend_rows(&self) -> Result<Vec<TrendRow>, TrieError> {
        Ok(self
            .read()
            .working
            .trend
            .iter()
            .map(|((height, claim_id), amount)| TrendRow {
                claim_id: claim_id.clone(),
                height: *height,
                amount: *amount,
            })
            .collect())
    }

    async fn reset_trending(&self) -> Result<(), TrieError> {
        for claim in self.write().working.claims.values_mut() {
            claim.trending = TrendingScores::default();
        }
        Ok(())
    }

    async fn set_trending(&self, claim_id: &str, scores: TrendingScores) -> Result<(), TrieError> {
        if let Some(claim) = self.write().working.claims.get_mut(claim_id) {
            claim.trending = scores;
        }
        Ok(())
    }

    async fn commit(&self, info: CommitInfo) -> Result<(), TrieError> {
        let mut inner = self.write();
        let snapshot = inner.working.clone();
        inner.committed = snapshot.clone();
        inner.history.insert(info.height, (snapshot, info.clone()));
        while inner.history.len() > inner.snapshot_depth {
            inner.history.pop_first();
        }
        tracing::debug!(height = info.height, snapshots = inner.history.len(), "Committed");
        inner.last_commit = Some(info);
        Ok(())
    }

    async fn last_commit(&self) -> Result<Option<CommitInfo>, TrieError> {
        Ok(self.read().last_commit.clone())
    }

    async fn rollback_to(&self, height: u64) -> Result<(), TrieError> {
        let mut inner = self.write();
        let (state, info) = match inner.history.get(&height) {
            Some((state, info)) => (state.clone(), info.clone()),
            None => {
                let oldest = inner.history.keys().next().copied().unwrap_or(0);
                return Err(TrieError::RollbackUnavailable { height, oldest });
            }
        };
        let discarded = inner.history.split_off(&(height + 1)).len();
        inner.working = state.clone();
        inner.committed = state;
        inner.last_commit = Some(info);
        tracing::debug!(height, discarded, "Rolled back to snapshot");
        Ok(())
    }

    async fn resolve(&self, name: &str) -> Result<NameResolution, TrieError> {
        let inner = self.read();
        let state = &inner.committed;
        let height = inner.last_commit.as_ref().map(|c| c.height).unwrap_or(0);
        let rows = state.claims_for_name(name);
        Ok(query::build_resolution(name, &rows, state.trie.get(name), height))
    }

    async fn search(&self, q: &SearchQuery) -> Result<Vec<ClaimSummary>, TrieError> {
        let inner = self.read();
        let mut rows: Vec<ClaimRow> = inner.committed.claims.values().cloned().collect();
        rows.sort_by(|a, b| a.claim_id.cmp(&b.claim_id));
        Ok(query::execute(q, &rows))
    }
}
