//! Keyed connection slots.
//!
//! The deduplication and retry engine behind the factory:
//! - [`pending`]: single-resolution result shared by every caller of one key
//! - [`slot`]: per-key connect / retry / reject state machine
//! - [`registry`]: key → live slot map, one per deduplicating kind
//! - [`retry`]: fixed-delay retry policy

pub mod pending;
pub mod registry;
pub mod retry;
pub mod slot;
