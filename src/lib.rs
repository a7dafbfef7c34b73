//! # transportnet
//!
//! Keyed transport connection factory for tokio.
//!
//! `transportnet` opens communication channels (TCP/IPC sockets, HTTP/1.1
//! connections, WebSockets, child processes and in-process pipes) on behalf of
//! many concurrent callers, making sure each destination has at most one
//! connection attempt in flight.
//!
//! ## Features
//!
//! - **Deduplication**: concurrent requests for one key share one attempt and one result
//! - **Retry**: transient socket errors are retried on a fixed delay
//! - **Classification**: "no such destination" and "nobody listening" reject immediately
//! - **Shutdown**: one call rejects every outstanding attempt and closes delivered channels
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use transportnet::factory::{Factory, TransportRequest};
//!
//! #[tokio::main]
//! async fn main() {
//!     let factory = Factory::new();
//!     let channel = factory
//!         .request(TransportRequest::initiating_socket("127.0.0.1", 7000))
//!         .await
//!         .unwrap();
//!     println!("connected to {}", channel.peer());
//! }
//! ```
//!
//! ## Modules
//!
//! - [`base`] - Error taxonomy, transport kinds and slot states
//! - [`channel`] - Live channel handles and shutdown tracking
//! - [`dns`] - Pluggable name resolution
//! - [`establish`] - The establisher seam and its tokio implementation
//! - [`socket`] - Registries, slots and the single-resolution result
//! - [`factory`] - Request dispatch, configuration and shutdown

pub mod base;
pub mod channel;
pub mod dns;
pub mod establish;
pub mod factory;
pub mod socket;

pub use base::kind::TransportKind;
pub use base::neterror::TransportError;
pub use channel::Channel;
pub use factory::{Factory, FactoryBuilder, FactoryConfig, TransportRequest};
pub use socket::pending::PendingResult;
