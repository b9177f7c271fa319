//! The block advance orchestrator.
//!
//! One call per block, strictly height-ordered:
//!
//! 1. removals (abandons, spent supports)
//! 2. new claims and updates
//! 3. new supports
//! 4. collect names with activations crossing into this block
//! 5. recompute effective amounts and controlling claims for every touched
//!    name; detect takeovers and re-anchor pending activations, repeating
//!    until the winner set is stable
//! 6. roll the trending windows
//! 7. commit atomically
//!
//! Malformed events (references to claims or supports the store does not
//! hold) are skipped and reported, never abort the block. Whether to alert
//! or reconcile on skips is the chain-validation layer's call.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::config::TrieConfig;
use crate::delay;
use crate::error::TrieError;
use crate::ordering;
use crate::store::RecordStore;
use crate::trending;
use crate::types::{
    BlockInput, ClaimEvent, ClaimRow, CommitInfo, SupportRow, TrendRow, TrendingScores, TrieRow,
};

// ─── Outcome ──────────────────────────────────────────────────────────────────

/// A change of control recorded while applying a block.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Takeover {
    pub name: String,
    /// The new controlling claim, or `None` when the name was released.
    pub claim_id: Option<String>,
}

/// An event that was skipped as malformed input.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SkippedEvent {
    /// Intra-block position of the event.
    pub position: u32,
    /// Event kind label.
    pub kind: &'static str,
    pub reason: String,
}

/// What applying one block did.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BlockOutcome {
    pub height: u64,
    /// Names whose claim set, support set, or activation eligibility
    /// changed in this block.
    pub touched: Vec<String>,
    /// Final control changes, one per name (intermediate flips within the
    /// block collapse to the last winner).
    pub takeovers: Vec<Takeover>,
    /// Malformed events that were skipped.
    pub skipped: Vec<SkippedEvent>,
}

// ─── Processor ────────────────────────────────────────────────────────────────

/// Single-writer state machine applying blocks to a [`RecordStore`].
///
/// Holds no per-name state of its own: everything lives in the store, so a
/// processor can be dropped and rebuilt around an existing store at any
/// time.
pub struct BlockProcessor<S> {
    store: S,
    config: TrieConfig,
}

impl<S: RecordStore> BlockProcessor<S> {
    pub fn new(store: S, config: TrieConfig) -> Self {
        Self { store, config }
    }

    /// Read access to the underlying store (for queries).
    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn config(&self) -> &TrieConfig {
        &self.config
    }

    /// Last committed height, if any block has been applied.
    pub async fn height(&self) -> Result<Option<u64>, TrieError> {
        Ok(self.store.last_commit().await?.map(|c| c.height))
    }

    /// Apply one block and commit the resulting state.
    ///
    /// On error nothing is committed and readers keep seeing the last
    /// committed height, but the store's working state may hold a
    /// partially applied block. Call [`BlockProcessor::rewind_to`] with
    /// the last committed height before retrying or resuming.
    pub async fn advance(&mut self, block: BlockInput) -> Result<BlockOutcome, TrieError> {
        let last = self.height().await?;
        if let Some(last) = last {
            if block.height <= last {
                return Err(TrieError::NonMonotonicHeight { height: block.height, last });
            }
        }
        let height = block.height;
        let mut touched: BTreeSet<String> = BTreeSet::new();
        let mut skipped: Vec<SkippedEvent> = Vec::new();

        self.apply_removals(&block, &mut touched, &mut skipped).await?;
        self.apply_claims(&block, &mut touched, &mut skipped).await?;
        self.apply_supports(&block, &mut touched, &mut skipped).await?;

        // Names with activations crossing into this block need their
        // controlling claim recomputed even without events.
        for name in self
            .store
            .activating_names(last.unwrap_or(0), height)
            .await?
        {
            touched.insert(name);
        }

        let takeovers = self.recompute_winners(&touched, height).await?;

        if height % self.config.trending_window == 0
            && height + self.config.trending_horizon() >= block.tip_height
        {
            self.roll_trending(height).await?;
        }

        self.store
            .commit(CommitInfo {
                height,
                timestamp: block.timestamp,
                committed_at: chrono::Utc::now().timestamp(),
            })
            .await?;

        let outcome = BlockOutcome {
            height,
            touched: touched.into_iter().collect(),
            takeovers: takeovers
                .into_iter()
                .map(|(name, claim_id)| Takeover { name, claim_id })
                .collect(),
            skipped,
        };
        tracing::info!(
            height,
            touched = outcome.touched.len(),
            takeovers = outcome.takeovers.len(),
            skipped = outcome.skipped.len(),
            "Block applied"
        );
        Ok(outcome)
    }

    /// Roll back to a previously committed height (chain reorganization).
    ///
    /// Failure is fatal for the index: without the snapshot the state can
    /// only be rebuilt from a known-good height.
    pub async fn rewind_to(&mut self, height: u64) -> Result<(), TrieError> {
        self.store.rollback_to(height).await?;
        tracing::info!(height, "Rolled back to committed snapshot");
        Ok(())
    }

    // ── step 1 ──

    async fn apply_removals(
        &mut self,
        block: &BlockInput,
        touched: &mut BTreeSet<String>,
        skipped: &mut Vec<SkippedEvent>,
    ) -> Result<(), TrieError> {
        for (position, event) in block.events.iter().enumerate() {
            let position = position as u32;
            match event {
                ClaimEvent::Abandon { claim_id } => {
                    match self.store.remove_claim(claim_id).await? {
                        Some(row) => {
                            touched.insert(row.name);
                        }
                        None => skip(skipped, position, event, "claim not found"),
                    }
                }
                ClaimEvent::WithdrawSupport { outpoint } => {
                    match self.store.remove_support(outpoint).await? {
                        Some(support) => {
                            if let Some(target) = self.store.claim(&support.claim_id).await? {
                                touched.insert(target.name);
                            }
                        }
                        None => skip(skipped, position, event, "support not found"),
                    }
                }
                _ => {}
            }
        }
        Ok(())
    }

    // ── step 2 ──

    async fn apply_claims(
        &mut self,
        block: &BlockInput,
        touched: &mut BTreeSet<String>,
        skipped: &mut Vec<SkippedEvent>,
    ) -> Result<(), TrieError> {
        for (position, event) in block.events.iter().enumerate() {
            let position = position as u32;
            match event {
                ClaimEvent::Claim { claim_id, name, outpoint, amount, value } => {
                    if self.store.claim(claim_id).await?.is_some() {
                        skip(skipped, position, event, "claim id already exists");
                        continue;
                    }
                    let trie = self.store.trie_row(name).await?;
                    let activation =
                        delay::activation_height(block.height, claim_id, trie.as_ref(), &self.config);
                    self.store
                        .upsert_claim(ClaimRow {
                            claim_id: claim_id.clone(),
                            name: name.clone(),
                            outpoint: outpoint.clone(),
                            amount: *amount,
                            height: block.height,
                            creation_height: block.height,
                            position,
                            activation_height: activation,
                            effective_amount: 0,
                            trending: TrendingScores::default(),
                            value: value.clone(),
                        })
                        .await?;
                    touched.insert(name.clone());
                }
                ClaimEvent::Update { claim_id, outpoint, amount, value } => {
                    match self.store.claim(claim_id).await? {
                        Some(mut row) => {
                            // Identity, name, creation height, and the
                            // already-earned activation height all survive
                            // an update.
                            row.outpoint = outpoint.clone();
                            row.amount = *amount;
                            row.height = block.height;
                            row.position = position;
                            row.value = value.clone();
                            touched.insert(row.name.clone());
                            self.store.upsert_claim(row).await?;
                        }
                        None => skip(skipped, position, event, "original claim not found"),
                    }
                }
                _ => {}
            }
        }
        Ok(())
    }

    // ── step 3 ──

    async fn apply_supports(
        &mut self,
        block: &BlockInput,
        touched: &mut BTreeSet<String>,
        skipped: &mut Vec<SkippedEvent>,
    ) -> Result<(), TrieError> {
        for (position, event) in block.events.iter().enumerate() {
            let position = position as u32;
            if let ClaimEvent::Support { outpoint, claim_id, amount } = event {
                match self.store.claim(claim_id).await? {
                    Some(target) => {
                        let trie = self.store.trie_row(&target.name).await?;
                        let activation = delay::activation_height(
                            block.height,
                            claim_id,
                            trie.as_ref(),
                            &self.config,
                        );
                        self.store
                            .insert_support(SupportRow {
                                outpoint: outpoint.clone(),
                                claim_id: claim_id.clone(),
                                amount: *amount,
                                height: block.height,
                                position,
                                activation_height: activation,
                            })
                            .await?;
                        touched.insert(target.name);
                    }
                    None => skip(skipped, position, event, "supported claim not found"),
                }
            }
        }
        Ok(())
    }

    // ── step 5 ──

    /// Recompute effective amounts and controlling claims for the touched
    /// names, looping until takeover-driven re-anchoring stops changing
    /// the active set. Re-anchoring only ever pulls activations down to
    /// the current height, so the loop terminates.
    async fn recompute_winners(
        &mut self,
        touched: &BTreeSet<String>,
        height: u64,
    ) -> Result<BTreeMap<String, Option<String>>, TrieError> {
        let mut takeovers: BTreeMap<String, Option<String>> = BTreeMap::new();
        loop {
            let mut reanchored = false;
            for name in touched {
                let rows = self.refresh_effective_amounts(name, height).await?;
                let active: Vec<ClaimRow> =
                    rows.iter().filter(|r| r.is_active(height)).cloned().collect();
                let new_winner = ordering::winner(&active, name)?.map(|c| c.claim_id);
                let current = self.store.trie_row(name).await?.map(|t| t.claim_id);
                if new_winner == current {
                    continue;
                }
                match &new_winner {
                    Some(claim_id) => {
                        self.store
                            .set_trie_row(TrieRow {
                                name: name.clone(),
                                claim_id: claim_id.clone(),
                                takeover_height: height,
                            })
                            .await?;
                        reanchored |= self.reanchor_pending(name, height).await?;
                        tracing::info!(name = %name, claim_id = %claim_id, height, "Takeover");
                    }
                    None => {
                        self.store.remove_trie_row(name).await?;
                        tracing::info!(name = %name, height, "Name released");
                    }
                }
                takeovers.insert(name.clone(), new_winner);
            }
            if !reanchored {
                break;
            }
        }
        Ok(takeovers)
    }

    /// Refresh stored effective amounts for one name and return its rows.
    async fn refresh_effective_amounts(
        &mut self,
        name: &str,
        height: u64,
    ) -> Result<Vec<ClaimRow>, TrieError> {
        let mut rows = self.store.claims_for_name(name).await?;
        for row in rows.iter_mut() {
            let supports = self.store.supports_for_claim(&row.claim_id).await?;
            let effective = ordering::effective_amount(row, &supports, height);
            if effective != row.effective_amount {
                row.effective_amount = effective;
                self.store.upsert_claim(row.clone()).await?;
            }
        }
        Ok(rows)
    }

    /// After a takeover, every still-pending claim and support for the name
    /// is re-anchored to the takeover height, activating immediately.
    /// Returns whether anything changed.
    async fn reanchor_pending(&mut self, name: &str, height: u64) -> Result<bool, TrieError> {
        let mut changed = false;
        for mut row in self.store.claims_for_name(name).await? {
            for mut support in self.store.supports_for_claim(&row.claim_id).await? {
                if support.activation_height > height {
                    support.activation_height = height;
                    self.store.insert_support(support).await?;
                    changed = true;
                }
            }
            if row.activation_height > height {
                row.activation_height = height;
                self.store.upsert_claim(row).await?;
                changed = true;
            }
        }
        Ok(changed)
    }

    // ── step 6 ──

    /// Snapshot the closing window's support totals and recompute every
    /// claim's trending scores.
    async fn roll_trending(&mut self, height: u64) -> Result<(), TrieError> {
        self.store
            .prune_trend_rows(height.saturating_sub(self.config.trending_horizon()))
            .await?;
        let window_start = height.saturating_sub(self.config.trending_window) + 1;
        let mut totals: BTreeMap<String, u64> = BTreeMap::new();
        for support in self.store.supports_since(window_start).await? {
            *totals.entry(support.claim_id).or_default() += support.amount;
        }
        for (claim_id, amount) in totals {
            self.store
                .insert_trend_row(TrendRow { claim_id, height, amount })
                .await?;
        }
        let rows = self.store.trend_rows().await?;
        let scores = trending::compute_scores(&rows, height);
        self.store.reset_trending().await?;
        for (claim_id, claim_scores) in scores {
            self.store.set_trending(&claim_id, claim_scores).await?;
        }
        tracing::debug!(height, "Trending window rolled");
        Ok(())
    }
}

fn skip(skipped: &mut Vec<SkippedEvent>, position: u32, event: &ClaimEvent, reason: &str) {
    tracing::warn!(position, kind = event.kind(), reason, "Skipping malformed event");
    skipped.push(SkippedEvent {
        position,
        kind: event.kind(),
        reason: reason.to_string(),
    });
}
