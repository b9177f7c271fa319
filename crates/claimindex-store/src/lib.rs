//! Record-store backends for the claim index.
//!
//! Currently ships the in-memory backend. The engine only talks to the
//! [`claimindex_core::RecordStore`] trait, so a persistent backend can be
//! added without touching the consensus code.

pub mod memory;

pub use memory::MemoryStore;
