//! Document storage for the EDV service.
//!
//! This module provides a trait-based interface for document backends, the
//! per-document sequence ledger used for optimistic concurrency, and an
//! in-memory backend.
//!
//! # Design Principles
//! - Vault isolation: every vault is its own partition
//! - Atomic writes: sequence check, index update and document write happen
//!   under one partition lock
//! - Opaque payloads: content, chunks and index values are never interpreted

pub mod ledger;
pub mod memory;
pub mod provider;

pub use ledger::{SequenceLedger, Transition, WriteMode};
pub use memory::MemoryDocumentStore;
pub use provider::DocumentStorage;
