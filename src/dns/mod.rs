//! DNS Resolution Module
//!
//! Pluggable name resolution for the socket establisher:
//! - [`GaiResolver`]: system resolver (getaddrinfo)
//! - [`StaticResolver`]: fixed table with optional fallback, for tests and overrides
//!
//! A failed or empty resolution is what the slot layer classifies as
//! "destination not found".

mod gai;
mod resolve;

pub use gai::GaiResolver;
pub use resolve::{Name, Resolve, Resolving, StaticResolver};
