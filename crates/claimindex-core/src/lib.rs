//! claimindex-core — foundation for the deterministic claim-trie index engine.
//!
//! # Architecture
//!
//! ```text
//! BlockProcessor (one call per block, strictly height-ordered)
//!     ├── delay      (activation heights, takeover re-anchoring)
//!     ├── ordering   (effective amounts, controlling-claim selection)
//!     ├── trending   (windowed z-score popularity scoring)
//!     ├── shortid    (shortest-unique-prefix canonical names)
//!     └── RecordStore backend (memory, see claimindex-store)
//! ```
//!
//! The processor ingests one [`BlockInput`] at a time, applies its claim,
//! support, update, and abandon events to the record store, recomputes the
//! controlling claim for every touched name, rolls the trending windows,
//! and commits atomically. Readers only ever observe fully committed
//! heights.

pub mod config;
pub mod delay;
pub mod error;
pub mod ordering;
pub mod processor;
pub mod query;
pub mod shortid;
pub mod store;
pub mod trending;
pub mod types;

pub use config::TrieConfig;
pub use error::TrieError;
pub use processor::{BlockOutcome, BlockProcessor, Takeover};
pub use query::{ClaimSummary, NameResolution, SearchQuery, SortField};
pub use shortid::ShortId;
pub use store::RecordStore;
pub use types::{BlockInput, ClaimEvent, ClaimRow, CommitInfo, OutPoint, SupportRow, TrendRow, TrendingScores, TrieRow};
