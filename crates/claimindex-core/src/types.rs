//! Shared types for the claim index pipeline.

use serde::{Deserialize, Serialize};
use serde_json::Value;

// ─── OutPoint ─────────────────────────────────────────────────────────────────

/// Reference to a transaction output, the on-chain anchor of a claim or
/// support. Spending the output removes the row it anchors.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct OutPoint {
    /// Transaction hash (hex).
    pub tx_hash: String,
    /// Output index within the transaction.
    pub vout: u32,
}

impl OutPoint {
    pub fn new(tx_hash: impl Into<String>, vout: u32) -> Self {
        Self {
            tx_hash: tx_hash.into(),
            vout,
        }
    }
}

impl std::fmt::Display for OutPoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.tx_hash, self.vout)
    }
}

// ─── Rows ─────────────────────────────────────────────────────────────────────

/// Trending scores for a single claim, recomputed on window rollover.
///
/// `mixed` is the score used for ranking; `group` classifies which of the
/// local/global components dominates it.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct TrendingScores {
    pub local: f64,
    pub global: f64,
    pub group: i32,
    pub mixed: f64,
}

/// One name registration, keyed by its stable claim identifier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClaimRow {
    /// Stable identifier derived from the originating transaction.
    /// Survives updates; a new claim transaction mints a new id.
    pub claim_id: String,
    /// The human-readable name this claim competes for.
    pub name: String,
    /// Output currently anchoring the claim (replaced on update).
    pub outpoint: OutPoint,
    /// Bid amount in the smallest currency unit.
    pub amount: u64,
    /// Height of the claim or its most recent update.
    pub height: u64,
    /// Height of the first claim of this identifier, preserved across updates.
    pub creation_height: u64,
    /// Intra-block position of the creating (or updating) event.
    pub position: u32,
    /// First height at which this claim counts toward controlling selection.
    pub activation_height: u64,
    /// Bid plus activated supports; 0 while the claim is still pending.
    pub effective_amount: u64,
    /// Windowed popularity scores.
    pub trending: TrendingScores,
    /// Claim metadata (title and friends), opaque to the engine.
    pub value: Value,
}

impl ClaimRow {
    /// A claim is active once its activation height has been reached.
    pub fn is_active(&self, height: u64) -> bool {
        self.activation_height <= height
    }
}

/// A value-bearing vote for a claim, without claiming the name itself.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SupportRow {
    /// Output anchoring the support; spending it withdraws the support.
    pub outpoint: OutPoint,
    /// The claim this support adds weight to.
    pub claim_id: String,
    /// Support amount in the smallest currency unit.
    pub amount: u64,
    /// Height the support was created at.
    pub height: u64,
    /// Intra-block position of the creating event.
    pub position: u32,
    /// First height at which this support counts toward effective amount.
    pub activation_height: u64,
}

impl SupportRow {
    pub fn is_active(&self, height: u64) -> bool {
        self.activation_height <= height
    }
}

/// Per-name trie state: who controls the name and since when.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrieRow {
    pub name: String,
    /// The controlling claim.
    pub claim_id: String,
    /// Height at which control was last established. Activation delays for
    /// later claims and supports are anchored to this height.
    pub takeover_height: u64,
}

/// One trending-window snapshot: the support amount a claim accumulated in
/// the window ending at `height`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrendRow {
    pub claim_id: String,
    /// Window boundary height the snapshot was taken at.
    pub height: u64,
    /// Sum of support amounts that landed in the window.
    pub amount: u64,
}

/// Metadata of the most recent atomic commit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitInfo {
    /// Committed block height.
    pub height: u64,
    /// Block timestamp (seconds since epoch).
    pub timestamp: i64,
    /// Wall-clock time the commit was made.
    pub committed_at: i64,
}

// ─── Events ───────────────────────────────────────────────────────────────────

/// A parsed, validated claim event, as supplied by the chain-validation
/// layer. Signature and script verification happen upstream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ClaimEvent {
    /// A new claim for `name` with a freshly minted `claim_id`.
    Claim {
        claim_id: String,
        name: String,
        outpoint: OutPoint,
        amount: u64,
        value: Value,
    },
    /// An update of an existing claim: same identity and name, new bid,
    /// anchor, and metadata.
    Update {
        claim_id: String,
        outpoint: OutPoint,
        amount: u64,
        value: Value,
    },
    /// The claim's output was spent without re-asserting the claim.
    Abandon { claim_id: String },
    /// A new support for `claim_id`.
    Support {
        outpoint: OutPoint,
        claim_id: String,
        amount: u64,
    },
    /// The support's output was spent.
    WithdrawSupport { outpoint: OutPoint },
}

impl ClaimEvent {
    /// Short label for logging.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Claim { .. } => "claim",
            Self::Update { .. } => "update",
            Self::Abandon { .. } => "abandon",
            Self::Support { .. } => "support",
            Self::WithdrawSupport { .. } => "withdraw-support",
        }
    }
}

/// One block's worth of input for the orchestrator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BlockInput {
    /// Height of the block being applied.
    pub height: u64,
    /// Block timestamp (seconds since epoch).
    pub timestamp: i64,
    /// Current daemon/chain tip height, used to gate trending during
    /// deep backfill.
    pub tip_height: u64,
    /// Claim events in intra-block order.
    pub events: Vec<ClaimEvent>,
}

impl BlockInput {
    pub fn new(height: u64, timestamp: i64, tip_height: u64) -> Self {
        Self {
            height,
            timestamp,
            tip_height,
            events: Vec::new(),
        }
    }

    /// Append an event, preserving intra-block order.
    pub fn event(mut self, event: ClaimEvent) -> Self {
        self.events.push(event);
        self
    }
}

// ─── Tests ────────────────────────────────────────────────────────────────────
